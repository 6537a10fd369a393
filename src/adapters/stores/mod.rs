pub mod event_stream;
pub mod file_store;
pub mod firebase_store;
#[cfg(test)]
pub mod memory_store;
