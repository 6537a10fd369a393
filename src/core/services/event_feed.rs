use std::collections::HashMap;

use crate::core::models::access_event::{AccessEvent, decode_events};
use crate::core::models::collection::{Collection, Snapshot, StoreNotification};
use crate::core::models::enriched_event::EnrichedEvent;
use crate::core::models::student::{StudentRecord, decode_students};

/// Rows per page in both display modes.
pub const PAGE_SIZE: usize = 10;

/// Whether events may be enriched yet.
///
/// Starts in `AwaitingStudents` and moves to `Ready` exactly once, when the
/// first authorized snapshot arrives. Until then every event would look
/// unknown, so events are held back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPhase {
    AwaitingStudents,
    Ready,
}

/// Which list the operator is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// The latest `PAGE_SIZE` events, unfiltered.
    Recent,
    /// Every event, filtered by registration number and paginated.
    History,
}

/// Page position within the filtered history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// 1-indexed current page, clamped to the available pages.
    pub page: usize,
    pub page_count: usize,
    /// Events matching the filter across all pages.
    pub matched: usize,
}

/// What the view should render right now.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPage<'a> {
    pub mode: DisplayMode,
    pub rows: Vec<&'a EnrichedEvent>,
    /// `None` in recent mode, which has no pagination controls.
    pub pagination: Option<Pagination>,
}

/// Live access-event feed: joins events to students, orders them newest
/// first, and serves the recent and history views.
#[derive(Debug)]
pub struct EventFeed {
    phase: FeedPhase,
    students_by_card_id: HashMap<String, StudentRecord>,
    /// Newest first.
    raw_events: Vec<AccessEvent>,
    enriched_events: Vec<EnrichedEvent>,
    /// Latest events snapshot received before the gate opened.
    pending_events: Option<Snapshot>,
    events_received: bool,
    failures: Vec<(Collection, String)>,
    mode: DisplayMode,
    filter: String,
    page: usize,
}

impl Default for EventFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl EventFeed {
    pub fn new() -> Self {
        Self {
            phase: FeedPhase::AwaitingStudents,
            students_by_card_id: HashMap::new(),
            raw_events: Vec::new(),
            enriched_events: Vec::new(),
            pending_events: None,
            events_received: false,
            failures: Vec::new(),
            mode: DisplayMode::Recent,
            filter: String::new(),
            page: 1,
        }
    }

    /// Apply one notification from either subscription.
    pub fn apply(&mut self, notification: StoreNotification) {
        tracing::trace!(collection = %notification.collection(), "notification");
        match notification {
            StoreNotification::Snapshot {
                collection: Collection::Authorized,
                entries,
            } => self.apply_students(&entries),
            StoreNotification::Snapshot {
                collection: Collection::Events,
                entries,
            } => self.apply_events(entries),
            StoreNotification::Failed { collection, reason } => {
                self.record_failure(collection, reason)
            }
        }
    }

    /// Replace the student mapping with a new authorized snapshot.
    pub fn apply_students(&mut self, entries: &Snapshot) {
        self.students_by_card_id = decode_students(entries)
            .into_iter()
            .map(|s| (s.card_id.clone(), s))
            .collect();
        self.clear_failure(Collection::Authorized);
        tracing::debug!(students = self.students_by_card_id.len(), "student mapping rebuilt");

        if self.phase == FeedPhase::AwaitingStudents {
            self.phase = FeedPhase::Ready;
            if let Some(pending) = self.pending_events.take() {
                self.rebuild_events(pending);
                return;
            }
        }
        self.enrich();
    }

    /// Rebuild the event list from a new events snapshot, or hold it until
    /// the first student snapshot has arrived.
    pub fn apply_events(&mut self, entries: Snapshot) {
        self.clear_failure(Collection::Events);
        match self.phase {
            FeedPhase::AwaitingStudents => {
                tracing::debug!(events = entries.len(), "holding events until students arrive");
                self.pending_events = Some(entries);
            }
            FeedPhase::Ready => self.rebuild_events(entries),
        }
    }

    fn rebuild_events(&mut self, entries: Snapshot) {
        let mut events = decode_events(&entries);
        // Snapshots iterate oldest key first.
        events.reverse();
        self.raw_events = events;
        self.events_received = true;
        self.enrich();
    }

    fn enrich(&mut self) {
        self.enriched_events = self
            .raw_events
            .iter()
            .map(|event| EnrichedEvent::enrich(event, &self.students_by_card_id))
            .collect();
    }

    fn record_failure(&mut self, collection: Collection, reason: String) {
        tracing::error!(%collection, %reason, "subscription failed");
        self.clear_failure(collection);
        self.failures.push((collection, reason));
    }

    fn clear_failure(&mut self, collection: Collection) {
        self.failures.retain(|(c, _)| *c != collection);
    }

    pub fn phase(&self) -> FeedPhase {
        self.phase
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// All enriched events, newest first.
    pub fn enriched_events(&self) -> &[EnrichedEvent] {
        &self.enriched_events
    }

    pub fn student_count(&self) -> usize {
        self.students_by_card_id.len()
    }

    /// Subscription failures that have not been superseded by a snapshot.
    pub fn failures(&self) -> &[(Collection, String)] {
        &self.failures
    }

    /// True once there is something definite to show: both initial
    /// snapshots were applied, or a subscription failed.
    pub fn is_settled(&self) -> bool {
        (self.phase == FeedPhase::Ready && self.events_received) || !self.failures.is_empty()
    }

    /// Switch tabs. Always returns to page 1.
    pub fn set_mode(&mut self, mode: DisplayMode) {
        self.mode = mode;
        self.page = 1;
    }

    /// Change the registration-number filter.
    ///
    /// A non-empty filter typed while in recent mode switches to history.
    pub fn set_filter(&mut self, filter: &str) {
        let filter = filter.trim();
        if filter != self.filter {
            self.filter = filter.to_string();
            self.page = 1;
        }
        if !self.filter.is_empty() && self.mode == DisplayMode::Recent {
            self.set_mode(DisplayMode::History);
        }
    }

    /// Jump to a 1-indexed history page. Out-of-range pages are clamped
    /// when rendering.
    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    /// Events matching the current filter, newest first.
    pub fn filtered(&self) -> Vec<&EnrichedEvent> {
        if self.filter.is_empty() {
            return self.enriched_events.iter().collect();
        }
        let needle = self.filter.to_lowercase();
        self.enriched_events
            .iter()
            .filter(|e| {
                !e.is_unknown() && e.display_registration_number.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Number of history pages for the current filter.
    pub fn page_count(&self) -> usize {
        self.filtered().len().div_ceil(PAGE_SIZE)
    }

    /// Rows for the current mode, filter and page.
    pub fn current_page(&self) -> FeedPage<'_> {
        match self.mode {
            DisplayMode::Recent => FeedPage {
                mode: DisplayMode::Recent,
                rows: self.enriched_events.iter().take(PAGE_SIZE).collect(),
                pagination: None,
            },
            DisplayMode::History => {
                let filtered = self.filtered();
                let matched = filtered.len();
                let page_count = matched.div_ceil(PAGE_SIZE);
                let page = self.page.clamp(1, page_count.max(1));
                let rows = filtered
                    .into_iter()
                    .skip((page - 1) * PAGE_SIZE)
                    .take(PAGE_SIZE)
                    .collect();
                FeedPage {
                    mode: DisplayMode::History,
                    rows,
                    pagination: Some(Pagination {
                        page,
                        page_count,
                        matched,
                    }),
                }
            }
        }
    }
}
