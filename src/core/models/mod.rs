pub mod access_event;
pub mod collection;
pub mod enriched_event;
pub mod student;
