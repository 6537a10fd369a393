use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::core::errors::{AccessDeskError, Result};
use crate::core::models::collection::{Collection, StoreNotification};
use crate::core::services::event_feed::EventFeed;
use crate::core::traits::record_store::{RecordStore, Subscription};

/// An `EventFeed` wired to live subscriptions on both collections.
///
/// Both subscriptions push into one channel, so notifications are applied
/// one at a time in arrival order on the caller's thread. Dropping the
/// session drops the subscriptions.
pub struct FeedSession {
    feed: EventFeed,
    receiver: Receiver<StoreNotification>,
    _subscriptions: Vec<Subscription>,
}

impl FeedSession {
    /// Subscribe to students and events. `history_limit` bounds the events
    /// subscription to the most recent keys.
    pub fn open<S: RecordStore + ?Sized>(store: &S, history_limit: Option<usize>) -> Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let students = store.subscribe(Collection::Authorized, None, sender.clone())?;
        // If this fails, `students` is dropped and unsubscribes on the way out.
        let events = store.subscribe(Collection::Events, history_limit, sender)?;
        tracing::debug!(
            backend = store.name(),
            collections = ?[students.collection(), events.collection()],
            ?history_limit,
            "feed session opened"
        );

        Ok(Self {
            feed: EventFeed::new(),
            receiver,
            _subscriptions: vec![students, events],
        })
    }

    pub fn feed(&self) -> &EventFeed {
        &self.feed
    }

    pub fn feed_mut(&mut self) -> &mut EventFeed {
        &mut self.feed
    }

    /// Apply everything already delivered without blocking.
    /// Returns how many notifications were applied.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(notification) = self.receiver.try_recv() {
            self.feed.apply(notification);
            applied += 1;
        }
        applied
    }

    /// Block until at least one notification arrives (then apply it and
    /// anything queued behind it). Returns `false` on timeout.
    pub fn wait_for_update(&mut self, timeout: Duration) -> Result<bool> {
        match self.receiver.recv_timeout(timeout) {
            Ok(notification) => {
                self.feed.apply(notification);
                self.drain();
                Ok(true)
            }
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => Err(AccessDeskError::store(
                "subscribe",
                "all subscriptions were closed by the store",
            )),
        }
    }

    /// Block until the feed has both initial snapshots or a failure.
    pub fn wait_until_settled(&mut self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        self.drain();
        while !self.feed.is_settled() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || !self.wait_for_update(remaining)? {
                return Err(AccessDeskError::store(
                    "subscribe",
                    format!("no data from the store after {}s", timeout.as_secs()),
                ));
            }
        }
        Ok(())
    }
}
