use std::sync::Arc;

use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;

mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;


use crate::config::Config;
use crate::db::Db;
use crate::middleware::AllowedHosts;

/// Shared application state. Cheap to clone: the pool is reference counted.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (ignored in production where env vars are injected)
    dotenv::dotenv().ok();

    let config = Config::from_env()?;

    // Structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.default_log_filter())),
        )
        .with_target(false)
        .compact()
        .init();

    info!(debug = config.debug, "Starting inventory-api");

    info!("Connecting to database...");
    let db = Db::connect(&config.database_url, config.db_max_connections).await?;
    info!(backend = db.backend(), "Database connection pool established.");

    info!("Running migrations...");
    db.migrate().await?;

    let app = build_router(AppState { db }, &config)?;

    let addr = format!("{}:{}", config.host, config.port);
    info!("Listening on http://{}", addr);
    info!("API root: http://{}/api/  ·  admin: http://{}/admin/items", addr, addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: AppState, config: &Config) -> anyhow::Result<Router> {
    use crate::handlers::items;

    let allowed_hosts = Arc::new(AllowedHosts::from_config(config));

    let router = Router::new()
        // ── Health ──────────────────────────────────────────────────────────
        .route("/health", get(handlers::health))

        // ── API root ────────────────────────────────────────────────────────
        .route("/api", get(handlers::api_root))
        .route("/api/", get(handlers::api_root))

        // ── Items CRUD ──────────────────────────────────────────────────────
        .route("/api/items", get(items::list_items).post(items::create_item))
        .route("/api/items/", get(items::list_items).post(items::create_item))
        .route(
            "/api/items/:id",
            get(items::get_item)
                .put(items::replace_item)
                .patch(items::patch_item)
                .delete(items::delete_item),
        )
        .route(
            "/api/items/:id/",
            get(items::get_item)
                .put(items::replace_item)
                .patch(items::patch_item)
                .delete(items::delete_item),
        )

        // ── Admin ───────────────────────────────────────────────────────────
        .route("/admin", get(handlers::admin::items_page))
        .route("/admin/", get(handlers::admin::items_page))
        .route("/admin/items", get(handlers::admin::items_page))
        .route("/admin/items/", get(handlers::admin::items_page))
        .route(
            "/admin/items/add",
            get(handlers::admin::add_item_form).post(handlers::admin::add_item),
        )
        .route(
            "/admin/items/:id/change",
            get(handlers::admin::change_item_form).post(handlers::admin::change_item),
        )
        .route(
            "/admin/items/:id/delete",
            get(handlers::admin::delete_item_form).post(handlers::admin::delete_item),
        )

        // ── Frontend bundle ─────────────────────────────────────────────────
        .fallback_service(ServeDir::new(&config.static_dir))

        // ── Middleware ──────────────────────────────────────────────────────
        .layer(from_fn_with_state(allowed_hosts, middleware::validate_host))
        .layer(middleware::cors_layer(config)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(router)
}
