pub mod admin;
pub mod items;

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Map, Value};

use crate::error::AppError;

pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(json!({ "status": "ok", "service": "inventory-api" })))
}

/// Browsable root of the JSON API: resource name → absolute collection URL.
pub async fn api_root(headers: HeaderMap) -> (StatusCode, Json<serde_json::Value>) {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    (
        StatusCode::OK,
        Json(json!({ "items": format!("http://{}/api/items/", host) })),
    )
}

/// A JSON request body whose rejections render as API errors instead of plain text.
///
/// An empty body reads as an empty object whatever its content type, so a bare
/// PATCH is a no-op update rather than a media-type error.
pub struct JsonBody(pub Value);

fn is_json_content_type(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    mime.eq_ignore_ascii_case("application/json") || mime.to_ascii_lowercase().ends_with("+json")
}

#[async_trait]
impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

        if body.is_empty() {
            return Ok(JsonBody(Value::Object(Map::new())));
        }
        if !is_json_content_type(&content_type) {
            return Err(AppError::UnsupportedMediaType(format!(
                "Unsupported media type \"{}\" in request.",
                content_type
            )));
        }

        serde_json::from_slice(&body)
            .map(JsonBody)
            .map_err(|e| AppError::BadRequest(format!("JSON parse error - {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    async fn extract(content_type: Option<&str>, body: &'static str) -> Result<Value, AppError> {
        let mut builder = axum::http::Request::builder().method("PATCH").uri("/");
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        let request = builder.body(Body::from(body)).unwrap();
        JsonBody::from_request(request, &()).await.map(|JsonBody(value)| value)
    }

    #[tokio::test]
    async fn empty_body_reads_as_empty_object() {
        assert_eq!(extract(None, "").await.unwrap(), json!({}));
        assert_eq!(extract(Some("text/plain"), "").await.unwrap(), json!({}));
    }

    #[tokio::test]
    async fn json_media_types_are_parsed() {
        let value = extract(Some("application/json; charset=utf-8"), r#"{"quantity": 2}"#)
            .await
            .unwrap();
        assert_eq!(value, json!({ "quantity": 2 }));
        assert!(extract(Some("application/merge-patch+json"), "{}").await.is_ok());
    }

    #[tokio::test]
    async fn non_json_body_is_unsupported() {
        assert!(matches!(
            extract(Some("text/plain"), "name=x").await,
            Err(AppError::UnsupportedMediaType(_))
        ));
        assert!(matches!(
            extract(None, "{}").await,
            Err(AppError::UnsupportedMediaType(_))
        ));
    }

    #[tokio::test]
    async fn malformed_json_is_a_parse_error() {
        match extract(Some("application/json"), r#"{"name": "#).await {
            Err(AppError::BadRequest(detail)) => assert!(detail.starts_with("JSON parse error - ")),
            other => panic!("unexpected result {:?}", other.map(|v| v.to_string())),
        }
    }
}
