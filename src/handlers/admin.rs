use std::collections::HashMap;

use askama::Template;
use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::{
    db,
    error::{AppError, AppResult, FieldErrors},
    models::{format_timestamp, DecodeMode, InventoryItem, ItemChanges},
    AppState,
};

const LIST_URL: &str = "/admin/items";

#[derive(Debug, Deserialize, Default)]
pub struct AdminSearch {
    pub q: Option<String>,
}

struct ItemRow {
    id: i64,
    name: String,
    quantity: i32,
    location: String,
    updated_at: String,
}

impl From<InventoryItem> for ItemRow {
    fn from(item: InventoryItem) -> Self {
        Self {
            id: item.id,
            updated_at: format_timestamp(&item.updated_at),
            name: item.name,
            quantity: item.quantity,
            location: item.location,
        }
    }
}

#[derive(Template)]
#[template(path = "admin/items.html")]
struct ItemsTemplate {
    rows: Vec<ItemRow>,
    query: String,
    total: i64,
}

fn render<T: Template>(template: &T) -> AppResult<Html<String>> {
    template
        .render()
        .map(Html)
        .map_err(|e| AppError::Internal(e.into()))
}

/// Record browser: name, quantity, location and last update,
/// optionally narrowed by a search over name and location.
pub async fn items_page(
    State(state): State<AppState>,
    Query(search): Query<AdminSearch>,
) -> AppResult<Html<String>> {
    let query = search.q.unwrap_or_default().trim().to_string();
    let items = db::search_items(&state.db, &query).await?;
    let total = db::count_items(&state.db).await?;

    info!(count = items.len(), total, query = %query, "Rendered admin item list");

    let template = ItemsTemplate {
        rows: items.into_iter().map(ItemRow::from).collect(),
        query,
        total,
    };
    render(&template)
}

// ── Add / change forms ────────────────────────────────────────────────────────

struct FormField {
    name: &'static str,
    label: &'static str,
    value: String,
    multiline: bool,
    errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "admin/item_form.html")]
struct ItemFormTemplate {
    title: String,
    action: String,
    fields: Vec<FormField>,
    general_errors: Vec<String>,
    item_id: Option<i64>,
}

/// Field values as typed into the form, keyed by field name.
type FormValues = HashMap<String, String>;

const FORM_FIELDS: [(&str, &str, bool); 4] = [
    ("name", "Name", false),
    ("description", "Description", true),
    ("quantity", "Quantity", false),
    ("location", "Location", false),
];

fn item_values(item: &InventoryItem) -> FormValues {
    HashMap::from([
        ("name".to_string(), item.name.clone()),
        ("description".to_string(), item.description.clone()),
        ("quantity".to_string(), item.quantity.to_string()),
        ("location".to_string(), item.location.clone()),
    ])
}

fn form_template(
    title: String,
    action: String,
    item_id: Option<i64>,
    values: &FormValues,
    error: Option<AppError>,
) -> AppResult<ItemFormTemplate> {
    let (mut field_errors, general_errors) = match error {
        None => (FieldErrors::new(), Vec::new()),
        Some(AppError::Validation(errors)) => (errors, Vec::new()),
        Some(AppError::InvalidPayload(msg)) => (FieldErrors::new(), vec![msg]),
        Some(other) => return Err(other),
    };

    let fields = FORM_FIELDS
        .iter()
        .map(|&(name, label, multiline)| FormField {
            name,
            label,
            value: values.get(name).cloned().unwrap_or_default(),
            multiline,
            errors: field_errors.shift_remove(name).unwrap_or_default(),
        })
        .collect();

    Ok(ItemFormTemplate {
        title,
        action,
        fields,
        general_errors,
        item_id,
    })
}

/// Only the editable fields are submitted to the decoder, each as the raw string typed.
fn form_payload(values: &FormValues) -> Value {
    let fields: Map<String, Value> = FORM_FIELDS
        .iter()
        .filter_map(|&(name, _, _)| {
            values
                .get(name)
                .map(|value| (name.to_string(), Value::String(value.clone())))
        })
        .collect();
    Value::Object(fields)
}

fn parse_id(raw: &str) -> AppResult<i64> {
    raw.parse().map_err(|_| AppError::NotFound)
}

pub async fn add_item_form() -> AppResult<Html<String>> {
    let values = FormValues::from([("quantity".to_string(), "0".to_string())]);
    render(&form_template(
        "Add inventory item".into(),
        format!("{LIST_URL}/add"),
        None,
        &values,
        None,
    )?)
}

pub async fn add_item(
    State(state): State<AppState>,
    Form(values): Form<FormValues>,
) -> AppResult<Response> {
    let changes = match ItemChanges::decode(&form_payload(&values), DecodeMode::Create) {
        Ok(changes) => changes,
        Err(err) => {
            let template = form_template(
                "Add inventory item".into(),
                format!("{LIST_URL}/add"),
                None,
                &values,
                Some(err),
            )?;
            return Ok(render(&template)?.into_response());
        }
    };

    let item = db::insert_item(&state.db, &changes).await?;
    info!(id = item.id, name = %item.name, "Added item from admin");

    Ok(Redirect::to(LIST_URL).into_response())
}

pub async fn change_item_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Html<String>> {
    let id = parse_id(&id)?;
    let item = db::fetch_item_by_id(&state.db, id).await?;
    render(&form_template(
        format!("Change inventory item \"{}\"", item.name),
        format!("{LIST_URL}/{id}/change"),
        Some(id),
        &item_values(&item),
        None,
    )?)
}

pub async fn change_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(values): Form<FormValues>,
) -> AppResult<Response> {
    let id = parse_id(&id)?;
    let existing = db::fetch_item_by_id(&state.db, id).await?;

    let changes = match ItemChanges::decode(&form_payload(&values), DecodeMode::Replace) {
        Ok(changes) => changes,
        Err(err) => {
            let template = form_template(
                format!("Change inventory item \"{}\"", existing.name),
                format!("{LIST_URL}/{id}/change"),
                Some(id),
                &values,
                Some(err),
            )?;
            return Ok(render(&template)?.into_response());
        }
    };

    let item = db::update_item(&state.db, id, &changes).await?;
    info!(id, name = %item.name, "Changed item from admin");

    Ok(Redirect::to(LIST_URL).into_response())
}

// ── Delete ────────────────────────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "admin/item_delete.html")]
struct DeleteTemplate {
    id: i64,
    name: String,
}

pub async fn delete_item_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Html<String>> {
    let id = parse_id(&id)?;
    let item = db::fetch_item_by_id(&state.db, id).await?;
    render(&DeleteTemplate { id, name: item.name })
}

pub async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Redirect> {
    let id = parse_id(&id)?;
    db::delete_item(&state.db, id).await?;
    info!(id, "Deleted item from admin");
    Ok(Redirect::to(LIST_URL))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_payload_keeps_only_editable_fields() {
        let values = FormValues::from([
            ("name".to_string(), "Desk".to_string()),
            ("quantity".to_string(), "4".to_string()),
            ("csrf".to_string(), "token".to_string()),
        ]);
        assert_eq!(
            form_payload(&values),
            serde_json::json!({ "name": "Desk", "quantity": "4" })
        );
    }

    #[test]
    fn validation_errors_attach_to_their_fields() {
        let mut errors = FieldErrors::new();
        errors.insert("quantity", vec!["A valid integer is required.".to_string()]);
        let values = FormValues::from([("quantity".to_string(), "many".to_string())]);

        let template = form_template(
            "Add".into(),
            "/admin/items/add".into(),
            None,
            &values,
            Some(AppError::Validation(errors)),
        )
        .unwrap();

        let quantity = template.fields.iter().find(|f| f.name == "quantity").unwrap();
        assert_eq!(quantity.value, "many");
        assert_eq!(quantity.errors, vec!["A valid integer is required.".to_string()]);
        assert!(template.fields.iter().filter(|f| f.name != "quantity").all(|f| f.errors.is_empty()));
    }

    #[test]
    fn non_validation_errors_propagate() {
        let result = form_template(
            "Add".into(),
            "/admin/items/add".into(),
            None,
            &FormValues::new(),
            Some(AppError::NotFound),
        );
        assert!(matches!(result, Err(AppError::NotFound)));
    }
}
