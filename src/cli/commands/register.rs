use crate::cli::output;
use crate::core::errors::Result;

use super::store_helpers;

/// Execute the `accessdesk register` command.
pub fn execute(name: &str, ra: &str, card: &str) -> Result<()> {
    let registry = store_helpers::open_registry()?;

    if let Ok(Some(existing)) = registry.find(card.trim()) {
        output::warning(&format!(
            "Card {} was registered to {} ({}); replacing it",
            existing.card_id, existing.full_name, existing.registration_number
        ));
    }

    let student = registry.register(name, ra, card)?;
    output::success(&format!(
        "Registered {} (RA {}) with card {}",
        student.full_name, student.registration_number, student.card_id
    ));
    Ok(())
}
