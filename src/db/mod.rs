use std::str::FromStr;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{PgPool, SqlitePool};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::*;

/// Connection pool for whichever backend the database URL names.
#[derive(Debug, Clone)]
pub enum Db {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

/// Runs `$body` with `$pool` bound to the concrete pool of either backend.
macro_rules! with_pool {
    ($db:expr, |$pool:ident| $body:expr) => {
        match $db {
            Db::Postgres($pool) => $body,
            Db::Sqlite($pool) => $body,
        }
    };
}

impl Db {
    /// Open a pool for `database_url`. `sqlite:` URLs get a file-backed SQLite
    /// store (created if missing), everything else is treated as PostgreSQL.
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        if database_url.starts_with("sqlite:") {
            let options = SqliteConnectOptions::from_str(database_url)
                .context("invalid SQLite database URL")?
                .create_if_missing(true);
            let pool = SqlitePoolOptions::new()
                .max_connections(max_connections)
                .connect_with(options)
                .await
                .context("failed to open SQLite database")?;
            Ok(Db::Sqlite(pool))
        } else {
            let pool = PgPoolOptions::new()
                .max_connections(max_connections)
                .connect(database_url)
                .await
                .context("failed to connect to PostgreSQL")?;
            Ok(Db::Postgres(pool))
        }
    }

    /// A private in-memory SQLite database. Pinned to one connection that never
    /// expires, since each SQLite memory connection is its own database.
    #[cfg(test)]
    pub async fn connect_in_memory() -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .context("failed to open in-memory SQLite database")?;
        Ok(Db::Sqlite(pool))
    }

    pub fn backend(&self) -> &'static str {
        match self {
            Db::Postgres(_) => "postgres",
            Db::Sqlite(_) => "sqlite",
        }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        match self {
            Db::Postgres(pool) => sqlx::migrate!("./migrations/postgres").run(pool).await?,
            Db::Sqlite(pool) => sqlx::migrate!("./migrations/sqlite").run(pool).await?,
        }
        info!(backend = self.backend(), "Migrations complete.");
        Ok(())
    }
}

// ── Items ─────────────────────────────────────────────────────────────────────

pub async fn fetch_all_items(db: &Db) -> AppResult<Vec<InventoryItem>> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM inventory_items ORDER BY id ASC");
    let items = with_pool!(db, |pool| {
        sqlx::query_as::<_, InventoryItem>(&sql).fetch_all(pool).await?
    });
    Ok(items)
}

pub async fn fetch_item_by_id(db: &Db, id: i64) -> AppResult<InventoryItem> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1");
    with_pool!(db, |pool| {
        sqlx::query_as::<_, InventoryItem>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?
    })
    .ok_or(AppError::NotFound)
}

/// Insert a new row. Absent fields take their column defaults; both timestamps
/// are set to the same instant.
pub async fn insert_item(db: &Db, changes: &ItemChanges) -> AppResult<InventoryItem> {
    let name = changes
        .name
        .as_deref()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("insert_item called without a name")))?;
    let now = now();
    let sql = format!(
        r#"
        INSERT INTO inventory_items (name, description, quantity, location, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {ITEM_COLUMNS}
        "#
    );

    let item = with_pool!(db, |pool| {
        sqlx::query_as::<_, InventoryItem>(&sql)
            .bind(name)
            .bind(changes.description.as_deref().unwrap_or(""))
            .bind(changes.quantity.unwrap_or(0))
            .bind(changes.location.as_deref().unwrap_or(""))
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await?
    });

    Ok(item)
}

pub async fn update_item(db: &Db, id: i64, changes: &ItemChanges) -> AppResult<InventoryItem> {
    // Fetch existing to merge optional fields
    let existing = fetch_item_by_id(db, id).await?;
    let updated_at = now().max(existing.created_at);
    let sql = format!(
        r#"
        UPDATE inventory_items
        SET name        = $1,
            description = $2,
            quantity    = $3,
            location    = $4,
            updated_at  = $5
        WHERE id = $6
        RETURNING {ITEM_COLUMNS}
        "#
    );

    with_pool!(db, |pool| {
        sqlx::query_as::<_, InventoryItem>(&sql)
            .bind(changes.name.as_deref().unwrap_or(&existing.name))
            .bind(changes.description.as_deref().unwrap_or(&existing.description))
            .bind(changes.quantity.unwrap_or(existing.quantity))
            .bind(changes.location.as_deref().unwrap_or(&existing.location))
            .bind(updated_at)
            .bind(id)
            .fetch_optional(pool)
            .await?
    })
    .ok_or(AppError::NotFound)
}

pub async fn delete_item(db: &Db, id: i64) -> AppResult<()> {
    let rows_affected = with_pool!(db, |pool| {
        sqlx::query("DELETE FROM inventory_items WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?
            .rows_affected()
    });

    if rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub async fn count_items(db: &Db) -> AppResult<i64> {
    let row: (i64,) = with_pool!(db, |pool| {
        sqlx::query_as("SELECT COUNT(*) FROM inventory_items")
            .fetch_one(pool)
            .await?
    });
    Ok(row.0)
}

/// Case-insensitive substring match on name or location, newest first.
///
/// Term and columns are folded by the same SQL `LOWER()`, so both sides agree:
/// full Unicode folding on Postgres, ASCII-only on SQLite.
pub async fn search_items(db: &Db, term: &str) -> AppResult<Vec<InventoryItem>> {
    let pattern = format!("%{}%", escape_like(term));
    let sql = format!(
        r#"
        SELECT {ITEM_COLUMNS}
        FROM inventory_items
        WHERE LOWER(name) LIKE LOWER($1) ESCAPE '\'
           OR LOWER(location) LIKE LOWER($1) ESCAPE '\'
        ORDER BY id DESC
        "#
    );

    let items = with_pool!(db, |pool| {
        sqlx::query_as::<_, InventoryItem>(&sql)
            .bind(&pattern)
            .fetch_all(pool)
            .await?
    });
    Ok(items)
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Db {
        let db = Db::connect_in_memory().await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    fn named(name: &str) -> ItemChanges {
        ItemChanges {
            name: Some(name.to_string()),
            ..ItemChanges::default()
        }
    }

    #[tokio::test]
    async fn insert_applies_defaults_and_timestamps() {
        let db = test_db().await;
        let item = insert_item(&db, &named("Stapler")).await.unwrap();

        assert_eq!(item.name, "Stapler");
        assert_eq!(item.description, "");
        assert_eq!(item.quantity, 0);
        assert_eq!(item.location, "");
        assert_eq!(item.created_at, item.updated_at);
    }

    #[tokio::test]
    async fn ids_are_never_reused() {
        let db = test_db().await;
        let first = insert_item(&db, &named("A")).await.unwrap();
        delete_item(&db, first.id).await.unwrap();
        let second = insert_item(&db, &named("B")).await.unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn fetch_round_trips_stored_row() {
        let db = test_db().await;
        let created = insert_item(&db, &named("Lamp")).await.unwrap();
        let fetched = fetch_item_by_id(&db, created.id).await.unwrap();
        assert_eq!(created, fetched);
    }

    #[tokio::test]
    async fn update_merges_only_supplied_fields() {
        let db = test_db().await;
        let created = insert_item(
            &db,
            &ItemChanges {
                name: Some("Chair".into()),
                location: Some("Floor 2".into()),
                quantity: Some(4),
                ..ItemChanges::default()
            },
        )
        .await
        .unwrap();

        let updated = update_item(
            &db,
            created.id,
            &ItemChanges {
                quantity: Some(-1),
                ..ItemChanges::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "Chair");
        assert_eq!(updated.location, "Floor 2");
        assert_eq!(updated.quantity, -1);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn missing_rows_report_not_found() {
        let db = test_db().await;
        assert!(matches!(fetch_item_by_id(&db, 42).await, Err(AppError::NotFound)));
        assert!(matches!(
            update_item(&db, 42, &named("x")).await,
            Err(AppError::NotFound)
        ));
        assert!(matches!(delete_item(&db, 42).await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn list_and_count_see_every_row() {
        let db = test_db().await;
        insert_item(&db, &named("Mouse")).await.unwrap();
        insert_item(&db, &named("Keyboard")).await.unwrap();

        let items = fetch_all_items(&db).await.unwrap();
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Mouse", "Keyboard"]);
        assert_eq!(count_items(&db).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn search_matches_name_or_location_case_insensitively() {
        let db = test_db().await;
        insert_item(&db, &named("Blue Pen")).await.unwrap();
        insert_item(
            &db,
            &ItemChanges {
                name: Some("Paper".into()),
                location: Some("Blue Cabinet".into()),
                ..ItemChanges::default()
            },
        )
        .await
        .unwrap();
        insert_item(&db, &named("Stapler")).await.unwrap();

        let names: Vec<String> = search_items(&db, "BLUE")
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["Paper".to_string(), "Blue Pen".to_string()]);
    }

    #[tokio::test]
    async fn search_treats_wildcards_literally() {
        let db = test_db().await;
        insert_item(&db, &named("100% cotton")).await.unwrap();
        insert_item(&db, &named("1000 sheets")).await.unwrap();

        let found = search_items(&db, "100%").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "100% cotton");
    }

    #[tokio::test]
    async fn search_finds_non_ascii_terms_in_their_stored_case() {
        let db = test_db().await;
        insert_item(&db, &named("Éclair tray")).await.unwrap();
        insert_item(&db, &named("Crème brûlée dish")).await.unwrap();

        let found = search_items(&db, "ÉCLAIR").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Éclair tray");

        let found = search_items(&db, "BRûlée").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Crème brûlée dish");
    }

    #[test]
    fn escape_like_prefixes_wildcards() {
        assert_eq!(escape_like(r"a%b_c\d"), r"a\%b\_c\\d");
    }
}
