use crate::adapters::stores::file_store::FileStore;
use crate::cli::{context, output};
use crate::config::app_config::{AppConfig, Backend};
use crate::core::errors::{AccessDeskError, Result};

/// Execute the `accessdesk init` command.
///
/// Creates the config directory with a `config.toml` for the chosen
/// backend and, for the file backend, an empty store document.
pub fn execute(backend: Backend, url: Option<&str>, verbose: bool) -> Result<()> {
    let desk_dir = context::desk_dir();

    if desk_dir.join("config.toml").exists() {
        return Err(AccessDeskError::InvalidConfig {
            detail: format!(
                "accessdesk is already initialized here ({} exists)",
                desk_dir.display()
            ),
        });
    }

    let store_section = match (backend, url) {
        (Backend::File, _) => "backend = \"file\"\npath = \"store.json\"\npoll_interval_ms = 1000\n"
            .to_string(),
        (Backend::Firebase, Some(url)) => {
            format!("backend = \"firebase\"\nurl = \"{}\"\ntimeout_secs = 10\n", url.trim())
        }
        (Backend::Firebase, None) => {
            return Err(AccessDeskError::InvalidConfig {
                detail: "the firebase backend needs --url https://<project>.firebaseio.com".into(),
            });
        }
    };

    let config_content = format!(
        r#"[accessdesk]
version = "{version}"
format_version = 1

[store]
{store_section}
[display]
utc_offset = "-03:00"
history_limit = 1000
"#,
        version = env!("CARGO_PKG_VERSION"),
    );

    // Refuse to write a config we could not load back.
    AppConfig::parse(&config_content)?;

    output::header("accessdesk — Initializing");

    std::fs::create_dir_all(desk_dir)?;
    output::success(&format!("Created {}/", desk_dir.display()));

    std::fs::write(desk_dir.join("config.toml"), &config_content)?;
    output::success("Generated config.toml");

    if backend == Backend::File {
        let store_path = desk_dir.join("store.json");
        FileStore::create_empty(&store_path)?;
        output::success(&format!("Created empty store at {}", store_path.display()));
    }

    output::success("Desk ready.\n");
    print_next_steps(backend, verbose);
    Ok(())
}

fn print_next_steps(backend: Backend, verbose: bool) {
    if context::quiet() {
        return;
    }
    println!("  Next steps:");
    if backend == Backend::Firebase {
        println!("     0. Export ACCESSDESK_AUTH_TOKEN if the database requires auth");
    }
    println!("     1. Register a student: accessdesk register --name <name> --ra <ra> --card <card>");
    println!("     2. Follow the gate:    accessdesk events --watch");

    if verbose {
        println!();
        println!("  Files created:");
        println!("     config.toml   — store backend and display settings");
        if backend == Backend::File {
            println!("     store.json    — students (autorizados) and events (registros)");
        }
    }
}
