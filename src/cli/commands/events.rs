use std::io::IsTerminal;
use std::time::Duration;

use chrono::FixedOffset;
use colored::Colorize;

use crate::cli::output;
use crate::core::errors::Result;
use crate::core::models::access_event::Outcome;
use crate::core::models::enriched_event::EnrichedEvent;
use crate::core::services::event_feed::{DisplayMode, EventFeed};
use crate::core::services::feed_session::FeedSession;

use super::store_helpers;

/// How long one watch iteration blocks before checking again.
const WATCH_TICK: Duration = Duration::from_secs(1);

/// Options of the `accessdesk events` command.
#[derive(Debug, Clone, Default)]
pub struct EventsOptions<'a> {
    pub history: bool,
    pub filter: Option<&'a str>,
    pub page: usize,
    pub watch: bool,
    pub max_updates: Option<usize>,
}

/// Execute the `accessdesk events` command.
///
/// Subscribes to students and events, waits for both initial snapshots,
/// and renders the recent list or a history page. With `--watch` it keeps
/// the subscriptions open and redraws on every change.
pub fn execute(opts: &EventsOptions<'_>) -> Result<()> {
    let (desk_dir, config) = store_helpers::load_config()?;
    let offset = config.display.offset()?;
    let store = store_helpers::open_store(desk_dir, &config)?;

    let sp = output::spinner("Waiting for the store...");
    let mut session = FeedSession::open(&store, config.display.history_limit())?;
    let settled = session.wait_until_settled(config.store.timeout());
    sp.finish_and_clear();
    settled?;

    let feed = session.feed_mut();
    if opts.history {
        feed.set_mode(DisplayMode::History);
    }
    if let Some(filter) = opts.filter {
        feed.set_filter(filter);
    }
    feed.set_page(opts.page);
    tracing::debug!(
        phase = ?feed.phase(),
        mode = ?feed.mode(),
        students = feed.student_count(),
        events = feed.enriched_events().len(),
        pages = feed.page_count(),
        "feed settled"
    );

    render(session.feed(), offset, false);
    if !opts.watch {
        return Ok(());
    }

    let mut updates = 0;
    while opts.max_updates.is_none_or(|max| updates < max) {
        if session.wait_for_update(WATCH_TICK)? {
            updates += 1;
            render(session.feed(), offset, true);
        }
    }
    Ok(())
}

/// Draw the current page of the feed.
fn render(feed: &EventFeed, offset: FixedOffset, redraw: bool) {
    if redraw && std::io::stdout().is_terminal() {
        print!("\x1B[2J\x1B[H");
    }

    for (collection, reason) in feed.failures() {
        output::error(&format!("Subscription to '{collection}' failed: {reason}"));
    }

    let page = feed.current_page();
    match page.mode {
        DisplayMode::Recent => output::header("Latest access events"),
        DisplayMode::History if feed.filter().is_empty() => output::header("Access history"),
        DisplayMode::History => output::header(&format!(
            "Access history for RA matching '{}'",
            feed.filter()
        )),
    }

    if page.rows.is_empty() {
        if !feed.failures().is_empty() {
            output::warning("Nothing to show: the store subscription failed");
        } else if !feed.filter().is_empty() {
            output::warning("No events found for the given registration number");
        } else {
            output::warning("No access events recorded yet");
        }
        return;
    }

    print_table(&page.rows, offset);

    if let Some(p) = page.pagination {
        println!(
            "\n  {}",
            format!("Page {} of {} · {} events", p.page, p.page_count, p.matched).dimmed()
        );
    }
}

fn print_table(rows: &[&EnrichedEvent], offset: FixedOffset) {
    let times: Vec<String> = rows.iter().map(|e| e.timestamp_key.display(offset)).collect();
    let time_w = width("Date/Time", times.iter().map(String::as_str));
    let name_w = width("Name", rows.iter().map(|e| e.display_name.as_str()));
    let ra_w = width("RA", rows.iter().map(|e| e.display_registration_number.as_str()));

    println!(
        "  {} {} {} {}",
        output::pad("Date/Time", time_w).dimmed(),
        output::pad("Name", name_w).dimmed(),
        output::pad("RA", ra_w).dimmed(),
        "Status".dimmed()
    );
    for (event, time) in rows.iter().zip(&times) {
        let name = output::pad(&event.display_name, name_w);
        let name = if event.is_unknown() {
            name.dimmed().to_string()
        } else {
            name
        };
        println!(
            "  {} {} {} {}",
            output::pad(time, time_w),
            name,
            output::pad(&event.display_registration_number, ra_w),
            format_outcome(&event.outcome)
        );
    }
}

fn width<'a>(title: &str, values: impl Iterator<Item = &'a str>) -> usize {
    values
        .map(|v| v.chars().count())
        .chain(std::iter::once(title.chars().count()))
        .max()
        .unwrap_or(0)
}

/// Format an outcome as a colored string.
fn format_outcome(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Granted => "granted".green().to_string(),
        Outcome::Denied => "denied".red().to_string(),
        Outcome::Unrecognized => "unrecognized".yellow().to_string(),
        Outcome::Other(status) => status.normal().to_string(),
    }
}
