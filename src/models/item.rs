use chrono::{DateTime, SubsecRound, Utc};
use serde::{Serialize, Serializer};

/// Column list shared by every query that returns a full item row.
pub const ITEM_COLUMNS: &str = "id, name, description, quantity, location, created_at, updated_at";

/// Upper bound for `name` and `location`, counted in characters.
pub const MAX_TEXT_LENGTH: usize = 255;

/// Outgoing timestamp layout: fixed width, so string order equals time order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// One stock-keeping record. Serializes to exactly the seven public fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct InventoryItem {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub quantity: i32,
    pub location: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Current time at the precision both storage backends keep (microseconds).
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(ts))
}
