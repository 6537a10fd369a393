use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::models::collection::Snapshot;

/// A student allowed (or no longer allowed) through the gate.
///
/// The card id is the store key, so it is not part of the stored payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRecord {
    pub card_id: String,
    pub full_name: String,
    pub registration_number: String,
    pub authorized: bool,
}

/// Wire shape of `autorizados/{cardId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentPayload {
    #[serde(default)]
    pub nome: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub ra: String,
    #[serde(default)]
    pub autorizado: bool,
}

impl StudentRecord {
    /// Decode one stored entry. Returns `None` when the payload is not an
    /// object of the expected shape.
    pub fn from_entry(card_id: &str, value: &Value) -> Option<Self> {
        let payload: StudentPayload = serde_json::from_value(value.clone()).ok()?;
        Some(Self {
            card_id: card_id.to_string(),
            full_name: payload.nome,
            registration_number: payload.ra,
            authorized: payload.autorizado,
        })
    }

    /// Stored representation of this record.
    pub fn to_payload(&self) -> StudentPayload {
        StudentPayload {
            nome: self.full_name.clone(),
            ra: self.registration_number.clone(),
            autorizado: self.authorized,
        }
    }
}

/// Decode an `autorizados` snapshot, skipping entries that do not fit the schema.
pub fn decode_students(entries: &Snapshot) -> Vec<StudentRecord> {
    entries
        .iter()
        .filter_map(|(card_id, value)| {
            let record = StudentRecord::from_entry(card_id, value);
            if record.is_none() {
                tracing::warn!(card_id = %card_id, "skipping malformed student record");
            }
            record
        })
        .collect()
}

/// Registration numbers are sometimes typed in as bare numbers on the console
/// of the store; accept both.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, found {other}"
        ))),
    }
}
