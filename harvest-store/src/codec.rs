//! JSON row shape shared by the SQL and REST backends.
//!
//! Rows travel as flat JSON objects keyed by column name. Writing goes through the `Serialize`
//! impls of the `New*` types, reading through the `Deserialize` impls of the stored types, so
//! steps, statuses and dates are encoded in exactly one place.

use chrono::{DateTime, Utc};
use harvest_schema::table_for;
use harvest_types::{
    ClimateImpact, CommunityFeedback, EntityKind, Guidebook, ImplementationPlan, NewRecord,
    PersonaCard, Record,
};
use serde_json::{Map, Value};

use crate::StoreError;

/// Column values for an insert, spine columns included (except `id`).
pub(crate) fn insert_columns(
    record: &NewRecord,
    seed_key: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Map<String, Value>, StoreError> {
    let table = table_for(record.kind());
    let mut row = match serde_json::to_value(record) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            return Err(StoreError::Backend(format!(
                "{} row serialized as {other}",
                table.name()
            )))
        }
        Err(e) => return Err(StoreError::Backend(format!("{} row: {e}", table.name()))),
    };

    let stamp = serde_json::to_value(now).map_err(|e| StoreError::Backend(e.to_string()))?;
    row.insert("created_at".into(), stamp.clone());
    if table.has_updated_at() {
        row.insert("updated_at".into(), stamp);
    }
    if let Some(key) = seed_key {
        row.insert("seed_key".into(), Value::String(key.to_string()));
    }
    Ok(row)
}

/// Decode one stored row. Unknown columns (such as `seed_key`) are ignored.
pub(crate) fn record_from_row(kind: EntityKind, row: Value) -> Result<Record, StoreError> {
    let decoded = match kind {
        EntityKind::Persona => serde_json::from_value::<PersonaCard>(row).map(Record::from),
        EntityKind::Guidebook => serde_json::from_value::<Guidebook>(row).map(Record::from),
        EntityKind::ImplementationPlan => {
            serde_json::from_value::<ImplementationPlan>(row).map(Record::from)
        }
        EntityKind::CommunityFeedback => {
            serde_json::from_value::<CommunityFeedback>(row).map(Record::from)
        }
        EntityKind::ClimateImpact => serde_json::from_value::<ClimateImpact>(row).map(Record::from),
    };
    decoded.map_err(|e| StoreError::Backend(format!("malformed {} row: {e}", kind.table_name())))
}
