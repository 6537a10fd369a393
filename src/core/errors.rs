/// All domain errors for accessdesk.
///
/// Each variant provides enough context to diagnose the issue
/// without needing a debugger.
#[derive(Debug, thiserror::Error)]
pub enum AccessDeskError {
    #[error("Invalid {field}: {detail}")]
    Validation { field: String, detail: String },

    #[error(
        "Store {operation} failed: {reason}\n\n  \
         Nothing was retried. Check the store connection and try again.\n  \
         Run 'accessdesk status' to see the configured backend."
    )]
    Store { operation: String, reason: String },

    #[error(
        "No student registered with card '{card_id}'\n\n  \
         Run 'accessdesk students' to list registered cards."
    )]
    StudentNotFound { card_id: String },

    #[error("Invalid configuration: {detail}")]
    InvalidConfig { detail: String },

    #[error(
        "This desk uses format version {project_version}, but your accessdesk \
         only supports up to version {supported_version}.\n\n  \
         Install a newer accessdesk release to open it."
    )]
    FormatVersionTooNew {
        project_version: u32,
        supported_version: u32,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AccessDeskError {
    /// Shorthand for an empty or malformed input field.
    pub fn validation(field: &str, detail: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            detail: detail.into(),
        }
    }

    /// Shorthand for a failed store operation.
    pub fn store(operation: &str, reason: impl std::fmt::Display) -> Self {
        Self::Store {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AccessDeskError>;
