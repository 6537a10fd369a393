pub mod events;
pub mod init;
pub mod register;
pub mod status;
pub mod store_helpers;
pub mod students;
