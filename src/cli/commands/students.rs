use std::io::{self, BufRead, Write};

use colored::Colorize;

use crate::cli::StudentsAction;
use crate::cli::output;
use crate::core::errors::{AccessDeskError, Result};
use crate::core::models::student::StudentRecord;
use crate::core::services::student_registry::StudentRegistry;
use crate::core::traits::record_store::RecordStore;

use super::store_helpers;

/// Execute the `accessdesk students` command.
pub fn execute(action: Option<&StudentsAction>) -> Result<()> {
    let registry = store_helpers::open_registry()?;
    match action {
        None | Some(StudentsAction::List) => execute_list(&registry),
        Some(StudentsAction::Toggle { card }) => execute_toggle(&registry, card),
        Some(StudentsAction::Edit { card, name, ra }) => execute_edit(&registry, card, name, ra),
        Some(StudentsAction::Delete { card, yes }) => execute_delete(&registry, card, *yes),
    }
}

/// Look up a student or fail with a helpful message.
fn existing<S: RecordStore>(registry: &StudentRegistry<S>, card: &str) -> Result<StudentRecord> {
    let card = card.trim();
    registry
        .find(card)?
        .ok_or_else(|| AccessDeskError::StudentNotFound {
            card_id: card.to_string(),
        })
}

fn status_label(authorized: bool) -> String {
    if authorized {
        "authorized".green().to_string()
    } else {
        "not authorized".red().to_string()
    }
}

/// List all registered students.
fn execute_list<S: RecordStore>(registry: &StudentRegistry<S>) -> Result<()> {
    let students = registry.list()?;

    if students.is_empty() {
        output::warning("No students registered.");
        println!("  Run 'accessdesk register --name <name> --ra <ra> --card <card>' to add one.");
        return Ok(());
    }

    output::header(&format!("Registered students ({})", students.len()));

    let name_w = column_width("Name", students.iter().map(|s| s.full_name.as_str()));
    let ra_w = column_width("RA", students.iter().map(|s| s.registration_number.as_str()));
    let card_w = column_width("Card", students.iter().map(|s| s.card_id.as_str()));

    println!(
        "  {} {} {} {}",
        output::pad("Name", name_w).dimmed(),
        output::pad("RA", ra_w).dimmed(),
        output::pad("Card", card_w).dimmed(),
        "Status".dimmed()
    );
    for s in &students {
        println!(
            "  {} {} {} {}",
            output::pad(&s.full_name, name_w),
            output::pad(&s.registration_number, ra_w),
            output::pad(&s.card_id, card_w),
            status_label(s.authorized)
        );
    }
    Ok(())
}

fn column_width<'a>(title: &str, values: impl Iterator<Item = &'a str>) -> usize {
    values
        .map(|v| v.chars().count())
        .chain(std::iter::once(title.chars().count()))
        .max()
        .unwrap_or(0)
}

/// Flip the authorization of one student.
fn execute_toggle<S: RecordStore>(registry: &StudentRegistry<S>, card: &str) -> Result<()> {
    let student = existing(registry, card)?;
    let now = registry.toggle_authorization(&student.card_id, student.authorized)?;
    output::success(&format!(
        "{} (card {}) is now {}",
        student.full_name,
        student.card_id,
        status_label(now)
    ));
    Ok(())
}

/// Change name and RA of one student.
fn execute_edit<S: RecordStore>(
    registry: &StudentRegistry<S>,
    card: &str,
    name: &str,
    ra: &str,
) -> Result<()> {
    let updated = registry.edit(card, name, ra)?;
    output::success(&format!(
        "Updated card {}: {} (RA {})",
        updated.card_id, updated.full_name, updated.registration_number
    ));
    Ok(())
}

/// Remove one student after confirmation.
fn execute_delete<S: RecordStore>(
    registry: &StudentRegistry<S>,
    card: &str,
    yes: bool,
) -> Result<()> {
    let student = existing(registry, card)?;

    if !yes {
        print!(
            "  Delete {} (RA {}, card {})? [y/N]: ",
            student.full_name, student.registration_number, student.card_id
        );
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().lock().read_line(&mut input)?;
        let answer = input.trim().to_lowercase();
        if answer != "y" && answer != "yes" {
            output::warning("Deletion cancelled");
            return Ok(());
        }
    }

    registry.delete(&student.card_id)?;
    output::success(&format!(
        "Deleted {} (card {})",
        student.full_name, student.card_id
    ));
    Ok(())
}
