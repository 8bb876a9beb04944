//! portal-db CLI - admin tooling for the study portal store

mod commands;

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use portal_db::config::{self, PortalConfig};
use portal_db::storage::DatabaseConfig;

#[derive(Parser)]
#[command(name = "portal-db")]
#[command(version)]
#[command(about = "Admin tooling for the study portal progress store")]
#[command(long_about = r#"
portal-db manages the SQLite store behind the study portal:
  • Initialize or upgrade the schema and bootstrap admin
  • Inspect users, progress, notes, quizzes and study sessions
  • Manage admin rights and remove users

Example usage:
  portal-db init
  portal-db stats
  portal-db progress set 2 chapter1 topic1
  portal-db --json user 2
"#)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the database file (overrides the config file)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the store and seed the bootstrap admin
    Init,

    /// Write a default portal.toml
    Config {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show system-wide statistics
    Stats,

    /// List every user with activity counts
    Users,

    /// Show one user's profile and totals
    User {
        user_id: i64,
    },

    /// Resolve a username to its id, creating the user if needed
    Login {
        username: String,

        #[arg(short, long)]
        email: Option<String>,

        /// Create the user as an admin (ignored for existing users)
        #[arg(long)]
        admin: bool,
    },

    /// Change a user's email address
    SetEmail {
        user_id: i64,
        email: String,
    },

    /// Grant or revoke admin rights
    Promote {
        username: String,

        /// Revoke instead of grant
        #[arg(long)]
        revoke: bool,
    },

    /// Remove a user and everything they own
    DeleteUser {
        user_id: i64,

        /// Username of the admin performing the deletion
        #[arg(long = "as")]
        acting_admin: String,
    },

    /// Topic progress
    #[command(subcommand)]
    Progress(ProgressCommand),

    /// Study notes
    #[command(subcommand)]
    Note(NoteCommand),

    /// Quiz results
    #[command(subcommand)]
    Quiz(QuizCommand),

    /// Study sessions
    #[command(subcommand)]
    Session(SessionCommand),
}

#[derive(Subcommand)]
pub enum ProgressCommand {
    /// Mark a topic complete (or incomplete with --incomplete)
    Set {
        user_id: i64,
        chapter: String,
        topic: String,

        #[arg(long)]
        incomplete: bool,
    },

    /// Show a user's progress by chapter
    Show {
        user_id: i64,
    },
}

#[derive(Subcommand)]
pub enum NoteCommand {
    Add {
        user_id: i64,
        chapter: String,
        content: String,
    },

    List {
        user_id: i64,

        #[arg(long)]
        chapter: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum QuizCommand {
    Record {
        user_id: i64,
        total: i64,
        correct: i64,

        #[arg(long)]
        chapter: Option<String>,
    },

    List {
        user_id: i64,
    },
}

#[derive(Subcommand)]
pub enum SessionCommand {
    Start {
        user_id: i64,
        chapter: String,
    },

    End {
        session_id: i64,
    },

    List {
        user_id: i64,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_human(self) -> bool {
        self == OutputMode::Human
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    ok: bool,
    command: &'a str,
    data: T,
}

pub fn emit_success<T: Serialize>(output_mode: OutputMode, command: &str, data: T) -> anyhow::Result<()> {
    if output_mode == OutputMode::Json {
        let envelope = Envelope { ok: true, command, data };
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    }
    Ok(())
}

fn emit_error(output_mode: OutputMode, err: &anyhow::Error) {
    match output_mode {
        OutputMode::Human => portal_db::ui::error(&format!("{err:#}")),
        OutputMode::Json => {
            let data = serde_json::json!({ "ok": false, "error": format!("{err:#}") });
            println!("{data}");
        }
    }
}

fn database_config(cli: &Cli) -> anyhow::Result<DatabaseConfig> {
    let base = std::env::current_dir()?;
    let file = config::load_config(cli.config.as_deref())?.unwrap_or_default();
    Ok(file.to_database_config(cli.database.as_deref(), &base))
}

fn run(cli: Cli, output_mode: OutputMode) -> anyhow::Result<()> {
    if let Commands::Config { force } = &cli.command {
        let path = cli.config.clone().unwrap_or_else(config::default_config_path);
        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or(std::env::current_dir()?);
        return commands::run_config(output_mode, &path, &PortalConfig::with_defaults(&base), *force);
    }

    let portal = portal_db::Portal::open(database_config(&cli)?)?;

    match cli.command {
        Commands::Config { .. } => Ok(()),
        Commands::Init => commands::run_init(output_mode, &portal),
        Commands::Stats => commands::run_stats(output_mode, &portal),
        Commands::Users => commands::run_users(output_mode, &portal),
        Commands::User { user_id } => commands::run_user(output_mode, &portal, user_id),
        Commands::Login { username, email, admin } => {
            commands::run_login(output_mode, &portal, &username, email.as_deref(), admin)
        }
        Commands::SetEmail { user_id, email } => commands::run_set_email(output_mode, &portal, user_id, &email),
        Commands::Promote { username, revoke } => commands::run_promote(output_mode, &portal, &username, !revoke),
        Commands::DeleteUser { user_id, acting_admin } => {
            commands::run_delete_user(output_mode, &portal, user_id, &acting_admin)
        }
        Commands::Progress(cmd) => commands::run_progress(output_mode, &portal, cmd),
        Commands::Note(cmd) => commands::run_note(output_mode, &portal, cmd),
        Commands::Quiz(cmd) => commands::run_quiz(output_mode, &portal, cmd),
        Commands::Session(cmd) => commands::run_session(output_mode, &portal, cmd),
    }
}

fn main() {
    let cli = Cli::parse();
    let output_mode = if cli.json { OutputMode::Json } else { OutputMode::Human };

    // Initialize logging; stdout is reserved for command output
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Err(err) = run(cli, output_mode) {
        emit_error(output_mode, &err);
        std::process::exit(1);
    }
}
