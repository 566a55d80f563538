//! tend CLI
//!
//! Command-line interface for tend - local-first tasks, goals, and notes.
//! Default mode shows today's board; `serve` runs the agent request loop
//! on stdio.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tend_core::{Config, Service};

mod commands;
mod output;
mod server;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "tend")]
#[command(about = "tend - local-first tasks, goals, and notes")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Data directory (overrides configuration)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a record
    Add {
        /// Record title
        title: String,
        /// Record kind: task, goal, or note
        #[arg(short, long)]
        kind: Option<String>,
        /// Body text
        #[arg(short, long)]
        body: Option<String>,
        /// Priority: low, medium, or high
        #[arg(short, long)]
        priority: Option<String>,
        /// Tags (repeatable)
        #[arg(short = 't', long = "tag")]
        tags: Vec<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(short, long)]
        due: Option<String>,
        /// Parent goal (id or prefix)
        #[arg(long)]
        goal: Option<String>,
    },
    /// List records
    #[command(alias = "ls")]
    List {
        /// Filter by status
        #[arg(short, long)]
        status: Option<String>,
        /// Filter by kind
        #[arg(short, long)]
        kind: Option<String>,
        /// Filter by tag
        #[arg(short, long)]
        tag: Option<String>,
        /// Filter by priority
        #[arg(short, long)]
        priority: Option<String>,
        /// Only records due on or before this date (YYYY-MM-DD)
        #[arg(long)]
        due_before: Option<String>,
        /// Include archived records
        #[arg(long)]
        archived: bool,
        /// Sort key: due_date, priority, or created_at
        #[arg(long)]
        sort: Option<String>,
        /// Maximum number of results
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Show a record in full (header and body)
    Show {
        /// Record id (full UUID or prefix)
        id: String,
    },
    /// Update one field of a record
    Set {
        /// Record id (full UUID or prefix)
        id: String,
        /// Field: title, status, priority, tags, due_date, parent_goal_id, body
        field: String,
        /// New value ('body' appends)
        value: String,
    },
    /// Mark a record done
    Done {
        /// Record id (full UUID or prefix)
        id: String,
    },
    /// Reconcile and publish explicitly
    Sync,
    /// Show store and sync status
    Status,
    /// Run the agent request/response loop on stdio
    Serve,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, sync_enabled, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    init_tracing();

    // Config commands work without opening the store
    if let Some(Commands::Config { command }) = &cli.command {
        return match command.clone() {
            None | Some(ConfigCommands::Show) => commands::config::show(&output),
            Some(ConfigCommands::Set { key, value }) => commands::config::set(key, value, &output),
        };
    }

    let mut config = Config::load()?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    // An inaccessible data directory is an unrecoverable init failure
    let mut service = Service::open(config)?;

    match cli.command {
        None => commands::board::show(&mut service, &output),
        Some(Commands::Add {
            title,
            kind,
            body,
            priority,
            tags,
            due,
            goal,
        }) => commands::record::add(
            &mut service,
            title,
            kind,
            body,
            priority,
            tags,
            due,
            goal,
            &output,
        ),
        Some(Commands::List {
            status,
            kind,
            tag,
            priority,
            due_before,
            archived,
            sort,
            limit,
        }) => commands::record::list(
            &service,
            status,
            kind,
            tag,
            priority,
            due_before,
            archived,
            sort,
            limit,
            &output,
        ),
        Some(Commands::Show { id }) => commands::record::show(&service, id, &output),
        Some(Commands::Set { id, field, value }) => {
            commands::record::set(&mut service, id, field, value, &output)
        }
        Some(Commands::Done { id }) => commands::record::done(&mut service, id, &output),
        Some(Commands::Sync) => commands::sync::sync(&mut service, &output),
        Some(Commands::Status) => commands::status::show(&service, &output),
        Some(Commands::Serve) => server::Server::new(service).run(),
        Some(Commands::Config { .. }) => unreachable!(), // Handled above
    }
}

/// Logs go to stderr; stdout belongs to command output and the server
/// protocol
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tend_core=warn,tend_cli=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
