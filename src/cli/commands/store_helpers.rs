use std::path::Path;

use crate::adapters::stores::file_store::FileStore;
use crate::adapters::stores::firebase_store::FirebaseStore;
use crate::cli::context;
use crate::config::app_config::{AppConfig, Backend};
use crate::core::errors::{AccessDeskError, Result};
use crate::core::services::student_registry::StudentRegistry;
use crate::core::traits::record_store::RecordStore;

/// Load the config of an initialized desk.
pub fn load_config() -> Result<(&'static Path, AppConfig)> {
    let desk_dir = context::desk_dir();
    if !desk_dir.exists() {
        return Err(AccessDeskError::InvalidConfig {
            detail: "accessdesk not initialized. Run 'accessdesk init' first.".into(),
        });
    }
    let config = AppConfig::load(desk_dir)?;
    Ok((desk_dir, config))
}

/// Build the store backend named in the config.
pub fn open_store(desk_dir: &Path, config: &AppConfig) -> Result<Box<dyn RecordStore>> {
    match config.store.backend {
        Backend::File => Ok(Box::new(FileStore::new(
            config.store_file(desk_dir),
            config.store.poll_interval(),
        ))),
        Backend::Firebase => {
            let url = config
                .store
                .url
                .as_deref()
                .ok_or_else(|| AccessDeskError::InvalidConfig {
                    detail: "[store] backend = \"firebase\" requires a url".into(),
                })?;
            Ok(Box::new(FirebaseStore::new(
                url,
                context::auth_token(),
                config.store.timeout(),
            )))
        }
    }
}

/// Human-readable location of the configured store.
pub fn describe_store(desk_dir: &Path, config: &AppConfig) -> String {
    match config.store.backend {
        Backend::File => config.store_file(desk_dir).display().to_string(),
        Backend::Firebase => config.store.url.clone().unwrap_or_default(),
    }
}

/// Registry over the configured store.
pub fn open_registry() -> Result<StudentRegistry<Box<dyn RecordStore>>> {
    let (desk_dir, config) = load_config()?;
    let store = open_store(desk_dir, &config)?;
    tracing::debug!(backend = store.name(), "store opened");
    Ok(StudentRegistry { store })
}
