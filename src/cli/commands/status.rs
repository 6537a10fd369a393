use colored::Colorize;

use crate::cli::output;
use crate::core::errors::Result;
use crate::core::models::access_event::{Outcome, decode_events};
use crate::core::models::collection::Collection;
use crate::core::services::student_registry::StudentRegistry;
use crate::core::traits::record_store::RecordStore;

use super::store_helpers;

/// Execute the `accessdesk status` command.
///
/// Shows where the store lives and a short summary of both collections.
pub fn execute() -> Result<()> {
    let (desk_dir, config) = store_helpers::load_config()?;
    let offset = config.display.offset()?;
    let store = store_helpers::open_store(desk_dir, &config)?;

    output::header(&format!("accessdesk v{}", env!("CARGO_PKG_VERSION")));
    println!("  Backend: {}", store.name().cyan());
    println!(
        "  Store:   {}",
        store_helpers::describe_store(desk_dir, &config)
    );
    println!(
        "  Config:  {} (created by v{})",
        desk_dir.join("config.toml").display(),
        config.accessdesk.version
    );

    let sp = output::spinner("Reading the store...");
    let registry = StudentRegistry { store };
    let students = registry.list();
    let events = registry.store.get_all(Collection::Events);
    sp.finish_and_clear();

    let students = students?;
    let authorized = students.iter().filter(|s| s.authorized).count();
    println!("\n{}", "  Students".bold());
    println!(
        "  {} registered: {} authorized, {} blocked",
        students.len(),
        authorized.to_string().green(),
        (students.len() - authorized).to_string().red()
    );

    let events = decode_events(&events?);
    println!("\n{}", "  Access events".bold());
    match events.last() {
        None => println!("  {}", "none recorded".dimmed()),
        Some(latest) => {
            let denied = events
                .iter()
                .filter(|e| e.outcome != Outcome::Granted)
                .count();
            println!("  {} recorded, {} not granted", events.len(), denied);
            println!(
                "  Latest: {} ({})",
                latest.timestamp_key.display(offset),
                latest.outcome.label()
            );
        }
    }

    Ok(())
}
