pub mod event_feed;
pub mod feed_session;
pub mod student_registry;
