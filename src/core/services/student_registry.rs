use serde_json::{Map, Value, json};

use crate::core::errors::{AccessDeskError, Result};
use crate::core::models::collection::{Collection, validate_key};
use crate::core::models::student::{StudentRecord, decode_students};
use crate::core::traits::record_store::RecordStore;

/// Manages the authorized list through a `RecordStore` backend.
///
/// Every operation is a single store call; failures are returned once and
/// never retried.
pub struct StudentRegistry<S: RecordStore> {
    pub store: S,
}

/// Trim an input field and reject it if nothing is left.
fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AccessDeskError::validation(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

impl<S: RecordStore> StudentRegistry<S> {
    /// Register a student as authorized, replacing any record already
    /// stored for the same card.
    pub fn register(
        &self,
        full_name: &str,
        registration_number: &str,
        card_id: &str,
    ) -> Result<StudentRecord> {
        let record = StudentRecord {
            full_name: required("name", full_name)?,
            registration_number: required("registration number", registration_number)?,
            card_id: required("card id", card_id)?,
            authorized: true,
        };
        validate_key(&record.card_id, "card id")?;

        let payload = serde_json::to_value(record.to_payload())
            .map_err(|e| AccessDeskError::store("write", e))?;
        self.store
            .set(Collection::Authorized, &record.card_id, payload)?;
        tracing::info!(card_id = %record.card_id, "student registered");
        Ok(record)
    }

    /// Flip the authorization flag. Returns the value written.
    pub fn toggle_authorization(&self, card_id: &str, previous_value: bool) -> Result<bool> {
        let card_id = required("card id", card_id)?;
        validate_key(&card_id, "card id")?;

        let next = !previous_value;
        let mut fields = Map::new();
        fields.insert("autorizado".into(), Value::Bool(next));
        self.store
            .update_fields(Collection::Authorized, &card_id, fields)?;
        tracing::info!(%card_id, authorized = next, "authorization toggled");
        Ok(next)
    }

    /// Change name and registration number. The card id cannot change.
    pub fn edit(
        &self,
        card_id: &str,
        new_full_name: &str,
        new_registration_number: &str,
    ) -> Result<StudentRecord> {
        let card_id = required("card id", card_id)?;
        let full_name = required("name", new_full_name)?;
        let registration_number = required("registration number", new_registration_number)?;

        let current = self
            .find(&card_id)?
            .ok_or_else(|| AccessDeskError::StudentNotFound {
                card_id: card_id.clone(),
            })?;

        let fields = match json!({ "nome": full_name, "ra": registration_number }) {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        self.store
            .update_fields(Collection::Authorized, &card_id, fields)?;
        tracing::info!(%card_id, "student edited");

        Ok(StudentRecord {
            full_name,
            registration_number,
            ..current
        })
    }

    /// Remove a student from the authorized list.
    pub fn delete(&self, card_id: &str) -> Result<()> {
        let card_id = required("card id", card_id)?;
        validate_key(&card_id, "card id")?;
        self.store.delete(Collection::Authorized, &card_id)?;
        tracing::info!(%card_id, "student deleted");
        Ok(())
    }

    /// Look up one student by card.
    pub fn find(&self, card_id: &str) -> Result<Option<StudentRecord>> {
        validate_key(card_id, "card id")?;
        Ok(self
            .store
            .get(Collection::Authorized, card_id)?
            .and_then(|value| StudentRecord::from_entry(card_id, &value)))
    }

    /// All registered students in card order.
    pub fn list(&self) -> Result<Vec<StudentRecord>> {
        Ok(decode_students(
            &self.store.get_all(Collection::Authorized)?,
        ))
    }
}
