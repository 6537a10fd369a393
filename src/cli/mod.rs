pub mod commands;
pub mod context;
pub mod output;

use clap::{Parser, Subcommand};

use crate::config::app_config::Backend;

/// Register students and follow the access events of a card-controlled gate.
#[derive(Parser, Debug)]
#[command(name = "accessdesk", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Auth token for the firebase backend
    #[arg(long, global = true, env = "ACCESSDESK_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,

    /// Verbose output (debug logging on stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode: only show errors and requested data
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to an alternative config directory (default: .accessdesk)
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the config directory for this desk
    Init {
        /// Store backend to use
        #[arg(long, value_enum, default_value = "file")]
        backend: Backend,
        /// Database URL (firebase backend)
        #[arg(long)]
        url: Option<String>,
    },

    /// Register a student as authorized
    Register {
        /// Full name
        #[arg(long)]
        name: String,
        /// Registration number (RA)
        #[arg(long)]
        ra: String,
        /// Card identifier read by the badge reader
        #[arg(long)]
        card: String,
    },

    /// List and manage registered students
    Students {
        #[command(subcommand)]
        action: Option<StudentsAction>,
    },

    /// Show access events
    Events {
        /// Show the paginated history instead of the latest events
        #[arg(long)]
        history: bool,
        /// Only events whose RA contains this text (implies --history)
        #[arg(long)]
        filter: Option<String>,
        /// History page to show (1-based)
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// Keep running and redraw on every change
        #[arg(long)]
        watch: bool,
        /// Stop watching after this many redraws
        #[arg(long, requires = "watch")]
        max_updates: Option<usize>,
    },

    /// Show store location and collection counts
    Status,
}

#[derive(Subcommand, Debug)]
pub enum StudentsAction {
    /// List registered students
    List,
    /// Flip a student's authorization
    Toggle {
        /// Card identifier
        card: String,
    },
    /// Change a student's name and RA
    Edit {
        /// Card identifier
        card: String,
        /// New full name
        #[arg(long)]
        name: String,
        /// New registration number
        #[arg(long)]
        ra: String,
    },
    /// Remove a student from the authorized list
    Delete {
        /// Card identifier
        card: String,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}
