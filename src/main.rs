mod commands;
mod render;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use makerspace_core::config::{PortalConfig, StoreBackend, parse_duration};
use makerspace_core::{Calendar, Category, DateRange, EventFilter, EventId, SharedStore};
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "makerspace")]
#[command(about = "Browse the MakerSpace calendar and see who's in the space")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List upcoming event instances
    Events {
        /// Show events from this date (YYYY-MM-DD, or "start" for everything)
        #[arg(long)]
        from: Option<String>,

        /// Show events until this date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Only these categories (repeatable)
        #[arg(short, long)]
        category: Vec<String>,

        /// Only events you created
        #[arg(long)]
        mine: bool,

        /// Case-insensitive title search
        #[arg(short, long)]
        search: Option<String>,

        /// Print JSON instead of a listing
        #[arg(long)]
        json: bool,
    },
    /// Create an event
    New {
        title: String,

        #[command(flatten)]
        fields: commands::new::EventArgs,
    },
    /// Change an event you own (admins may change any)
    Update {
        id: String,

        #[command(flatten)]
        changes: commands::update::ChangeArgs,
    },
    /// Delete an event you own (admins may delete any)
    Delete { id: String },
    /// Show who is online
    Online {
        /// How recent a heartbeat must be, e.g. "30s" (defaults to presence.liveness_threshold)
        #[arg(short, long)]
        threshold: Option<String>,

        /// Keep the list updated until Ctrl-C
        #[arg(short, long)]
        watch: bool,

        /// Print JSON instead of a listing
        #[arg(long)]
        json: bool,
    },
    /// Mark yourself online until Ctrl-C
    Heartbeat,
    /// Show the active configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = PortalConfig::load()?;

    match cli.command {
        Commands::Events {
            from,
            to,
            category,
            mine,
            search,
            json,
        } => {
            let today = chrono::Local::now().date_naive();
            let filter = EventFilter {
                categories: category
                    .iter()
                    .map(|c| c.parse::<Category>())
                    .collect::<Result<_, _>>()?,
                only_mine: mine,
                search,
                range: DateRange::from_args(from.as_deref(), to.as_deref(), today)?,
            };
            let calendar = Calendar::new(connect(&config)?, config.recurrence);
            commands::events::run(&calendar, filter, config.session.as_ref(), json).await
        }
        Commands::New { title, fields } => {
            let actor = config.session()?;
            let calendar = Calendar::new(connect(&config)?, config.recurrence);
            let today = chrono::Local::now().date_naive();
            commands::new::run(&calendar, actor, fields.into_draft(title, today)?).await
        }
        Commands::Update { id, changes } => {
            let actor = config.session()?;
            let calendar = Calendar::new(connect(&config)?, config.recurrence);
            commands::update::run(&calendar, actor, &EventId::new(id), changes).await
        }
        Commands::Delete { id } => {
            let actor = config.session()?;
            let calendar = Calendar::new(connect(&config)?, config.recurrence);
            commands::delete::run(&calendar, actor, &EventId::new(id)).await
        }
        Commands::Online {
            threshold,
            watch,
            json,
        } => {
            let explicit = threshold.as_deref().map(parse_duration).transpose()?;
            let threshold = config.liveness_threshold(explicit)?;
            if watch {
                commands::online::watch(connect(&config)?, config.watcher(threshold)).await
            } else {
                commands::online::run(connect(&config)?, threshold, json).await
            }
        }
        Commands::Heartbeat => {
            let actor = config.session()?;
            commands::heartbeat::run(connect(&config)?, actor, config.heartbeat()).await
        }
        Commands::Config => commands::config::run(&config),
    }
}

fn connect(config: &PortalConfig) -> Result<SharedStore> {
    tracing::debug!(backend = ?config.store.backend, "connecting to store");
    if config.store.backend == StoreBackend::Memory {
        eprintln!(
            "{}",
            "Using the in-memory store; nothing is shared or kept after this command.\n\
             Set [store] backend = \"rest\" to use the portal database."
                .yellow()
        );
    }
    Ok(makerspace_core::store::connect(&config.store)?)
}

/// Logs go to stderr so they never mix with command output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("makerspace=warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f == "json") {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}
