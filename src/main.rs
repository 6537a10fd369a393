mod adapters;
mod cli;
mod config;
mod core;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::commands::events::EventsOptions;
use cli::{Cli, Commands};

fn main() {
    let args = Cli::parse();
    init_logging(args.verbose);
    cli::context::init(args.config.as_deref(), args.auth_token.clone(), args.quiet);

    let result = match &args.command {
        Commands::Init { backend, url } => {
            cli::commands::init::execute(*backend, url.as_deref(), args.verbose)
        }
        Commands::Register { name, ra, card } => cli::commands::register::execute(name, ra, card),
        Commands::Students { action } => cli::commands::students::execute(action.as_ref()),
        Commands::Events {
            history,
            filter,
            page,
            watch,
            max_updates,
        } => cli::commands::events::execute(&EventsOptions {
            history: *history,
            filter: filter.as_deref(),
            page: *page,
            watch: *watch,
            max_updates: *max_updates,
        }),
        Commands::Status => cli::commands::status::execute(),
    };

    if let Err(e) = result {
        tracing::debug!(error = ?e, "command failed");
        cli::output::error(&format!("Error: {e}"));
        std::process::exit(1);
    }
}

/// Log to stderr. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "accessdesk=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
