use std::collections::HashMap;

use crate::core::models::access_event::{AccessEvent, Outcome, TimestampKey};
use crate::core::models::student::StudentRecord;

/// Name shown when an event's card matches no registered student.
pub const UNKNOWN_NAME: &str = "unknown";

/// Registration number shown when an event's card matches no registered student.
pub const UNKNOWN_REGISTRATION: &str = "N/A";

/// An access event joined with the student its card belonged to at read time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedEvent {
    pub timestamp_key: TimestampKey,
    pub card_id: String,
    pub outcome: Outcome,
    pub display_name: String,
    pub display_registration_number: String,
}

impl EnrichedEvent {
    /// Join `event` against the current student mapping.
    pub fn enrich(event: &AccessEvent, students: &HashMap<String, StudentRecord>) -> Self {
        let (display_name, display_registration_number) = match students.get(&event.card_id) {
            Some(student) => (
                student.full_name.clone(),
                student.registration_number.clone(),
            ),
            None => (UNKNOWN_NAME.to_string(), UNKNOWN_REGISTRATION.to_string()),
        };
        Self {
            timestamp_key: event.timestamp_key.clone(),
            card_id: event.card_id.clone(),
            outcome: event.outcome.clone(),
            display_name,
            display_registration_number,
        }
    }

    /// True when the card matched no student.
    pub fn is_unknown(&self) -> bool {
        self.display_registration_number == UNKNOWN_REGISTRATION
    }
}
