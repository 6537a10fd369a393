use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static DESK_DIR: OnceLock<PathBuf> = OnceLock::new();
static AUTH_TOKEN: OnceLock<Option<String>> = OnceLock::new();
static QUIET: OnceLock<bool> = OnceLock::new();

/// Initialize the global invocation context.
/// If `custom_dir` is provided, uses that path; otherwise defaults to `.accessdesk`.
pub fn init(custom_dir: Option<&str>, auth_token: Option<String>, quiet: bool) {
    let dir = custom_dir
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".accessdesk"));
    let _ = DESK_DIR.set(dir);
    let _ = AUTH_TOKEN.set(auth_token.filter(|t| !t.trim().is_empty()));
    let _ = QUIET.set(quiet);
}

/// Get the current config directory path.
pub fn desk_dir() -> &'static Path {
    DESK_DIR
        .get()
        .map(|p| p.as_path())
        .unwrap_or(Path::new(".accessdesk"))
}

/// Token for the firebase backend, if one was given.
pub fn auth_token() -> Option<String> {
    AUTH_TOKEN.get().cloned().flatten()
}

/// Whether informational output is suppressed.
pub fn quiet() -> bool {
    QUIET.get().copied().unwrap_or(false)
}
