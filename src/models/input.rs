use serde_json::{Map, Value};

use crate::error::{AppError, AppResult, FieldErrors};
use crate::models::item::MAX_TEXT_LENGTH;

const REQUIRED: &str = "This field is required.";
const NULL: &str = "This field may not be null.";
const BLANK: &str = "This field may not be blank.";
const NOT_A_STRING: &str = "Not a valid string.";
const NOT_AN_INTEGER: &str = "A valid integer is required.";
const INTEGER_STRING_TOO_LONG: &str = "String value too large.";
const MAX_INTEGER_STRING_LENGTH: usize = 1000;

/// How strictly an incoming payload is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// POST: `name` must be present, absent fields take their defaults.
    Create,
    /// PUT: `name` must be present, absent fields keep their stored values.
    Replace,
    /// PATCH: only supplied fields are checked and applied.
    Partial,
}

impl DecodeMode {
    fn name_required(self) -> bool {
        !matches!(self, DecodeMode::Partial)
    }
}

/// Client-writable fields of an item after validation. `None` means "not supplied".
///
/// `id`, `created_at`, `updated_at` and any unknown keys are dropped during decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<i32>,
    pub location: Option<String>,
}

struct TextRule {
    allow_blank: bool,
    max_length: Option<usize>,
}

const NAME_RULE: TextRule = TextRule { allow_blank: false, max_length: Some(MAX_TEXT_LENGTH) };
const DESCRIPTION_RULE: TextRule = TextRule { allow_blank: true, max_length: None };
const LOCATION_RULE: TextRule = TextRule { allow_blank: true, max_length: Some(MAX_TEXT_LENGTH) };

impl ItemChanges {
    /// Validate a JSON request body, collecting every field error before failing.
    pub fn decode(payload: &Value, mode: DecodeMode) -> AppResult<Self> {
        let fields = match payload {
            Value::Object(map) => map,
            other => {
                return Err(AppError::InvalidPayload(format!(
                    "Invalid data. Expected a dictionary, but got {}.",
                    json_type_name(other)
                )))
            }
        };

        let mut errors = FieldErrors::new();
        let mut changes = ItemChanges::default();

        match fields.get("name") {
            None if mode.name_required() => {
                errors.insert("name", vec![REQUIRED.to_string()]);
            }
            None => {}
            Some(value) => match decode_text(value, &NAME_RULE) {
                Ok(name) => changes.name = Some(name),
                Err(msg) => {
                    errors.insert("name", vec![msg]);
                }
            },
        }

        changes.description = decode_optional(fields, "description", &mut errors, |v| {
            decode_text(v, &DESCRIPTION_RULE)
        });
        changes.quantity = decode_optional(fields, "quantity", &mut errors, decode_integer);
        changes.location = decode_optional(fields, "location", &mut errors, |v| {
            decode_text(v, &LOCATION_RULE)
        });

        if errors.is_empty() {
            Ok(changes)
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

fn decode_optional<T>(
    fields: &Map<String, Value>,
    key: &'static str,
    errors: &mut FieldErrors,
    decode: impl FnOnce(&Value) -> Result<T, String>,
) -> Option<T> {
    let value = fields.get(key)?;
    match decode(value) {
        Ok(v) => Some(v),
        Err(msg) => {
            errors.insert(key, vec![msg]);
            None
        }
    }
}

fn decode_text(value: &Value, rule: &TextRule) -> Result<String, String> {
    let text = match value {
        Value::Null => return Err(NULL.to_string()),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(_) | Value::Array(_) | Value::Object(_) => return Err(NOT_A_STRING.to_string()),
    };

    if text.is_empty() && !rule.allow_blank {
        return Err(BLANK.to_string());
    }
    if let Some(max) = rule.max_length {
        if text.chars().count() > max {
            return Err(format!("Ensure this field has no more than {} characters.", max));
        }
    }
    Ok(text)
}

fn decode_integer(value: &Value) -> Result<i32, String> {
    let wide: i128 = match value {
        Value::Null => return Err(NULL.to_string()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i128::from(i)
            } else if let Some(u) = n.as_u64() {
                i128::from(u)
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e30 => f as i128,
                    _ => return Err(NOT_AN_INTEGER.to_string()),
                }
            }
        }
        Value::String(s) => {
            if s.len() > MAX_INTEGER_STRING_LENGTH {
                return Err(INTEGER_STRING_TOO_LONG.to_string());
            }
            parse_integer_string(s).ok_or_else(|| NOT_AN_INTEGER.to_string())?
        }
        Value::Bool(_) | Value::Array(_) | Value::Object(_) => {
            return Err(NOT_AN_INTEGER.to_string())
        }
    };

    if wide > i128::from(i32::MAX) {
        return Err(format!("Ensure this value is less than or equal to {}.", i32::MAX));
    }
    if wide < i128::from(i32::MIN) {
        return Err(format!("Ensure this value is greater than or equal to {}.", i32::MIN));
    }
    Ok(wide as i32)
}

/// Accepts `"12"`, `" -3 "`, `"+4"` and integral decimals such as `"5.00"`.
fn parse_integer_string(raw: &str) -> Option<i128> {
    let trimmed = raw.trim();
    let digits = match trimmed.split_once('.') {
        Some((whole, frac)) if frac.chars().all(|c| c == '0') => whole,
        Some(_) => return None,
        None => trimmed,
    };
    digits.parse::<i128>().ok()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}
