mod commands;
mod config;

use clap::{Parser, Subcommand};
use commands::Context;
use config::CliConfig;
use filmdeck_core::{EngineConfig, FilmdeckError, Storage};
use filmdeck_game::CooldownNotifier;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "filmdeck")]
#[command(about = "Filmdeck - card collection game engine")]
#[command(version)]
struct Cli {
    /// Data directory for the database and config
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// User id this invocation acts as
    #[arg(short, long, global = true)]
    user: Option<i64>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Card catalog management
    #[command(subcommand)]
    Card(commands::CardCommands),

    /// User accounts and leaderboards
    #[command(subcommand)]
    User(commands::UserCommands),

    /// Families
    #[command(subcommand)]
    Family(commands::FamilyCommands),

    /// Your collection: drawing, browsing, the shop
    #[command(subcommand)]
    Collection(commands::CollectionCommands),

    /// Trades and duels
    #[command(subcommand)]
    Play(commands::PlayCommands),

    /// Run the cooldown notifier in the foreground
    Notify {
        /// Seconds between polls
        #[arg(short, long, default_value_t = 60)]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "filmdeck={}",
            log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let data_dir = cli.data_dir.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("filmdeck")
    });
    tokio::fs::create_dir_all(&data_dir).await?;

    let config = CliConfig::load(&data_dir).await?;
    let storage = Storage::open(&config.db_path()).await?;
    let ctx = Context {
        storage,
        engine_config: EngineConfig {
            admin_ids: config.admin_ids.clone(),
        },
        acting_user: cli.user,
    };

    let result = match cli.command {
        Commands::Card(cmd) => commands::handle_card_command(cmd, &ctx).await,
        Commands::User(cmd) => commands::handle_user_command(cmd, &ctx).await,
        Commands::Family(cmd) => commands::handle_family_command(cmd, &ctx).await,
        Commands::Collection(cmd) => commands::handle_collection_command(cmd, &ctx).await,
        Commands::Play(cmd) => commands::handle_play_command(cmd, &ctx).await,
        Commands::Notify { interval } => {
            let notifier = CooldownNotifier::new(
                Arc::new(ctx.storage),
                Arc::new(commands::play::ConsolePresenter),
            )
            .with_poll_interval(Duration::from_secs(interval));
            println!("Watching cooldowns every {}s; Ctrl-C to stop.", interval);
            notifier.run().await;
            Ok(())
        }
    };

    if let Err(e) = result {
        match e.downcast_ref::<FilmdeckError>() {
            Some(FilmdeckError::CooldownActive { remaining_secs }) => {
                let h = remaining_secs / 3600;
                let m = (remaining_secs % 3600) / 60;
                let s = remaining_secs % 60;
                eprintln!("Not yet: next draw in {:02}:{:02}:{:02}", h, m, s);
            }
            Some(FilmdeckError::Banned(_)) => {
                eprintln!("This account is banned from drawing.");
            }
            Some(FilmdeckError::PassRequired) => {
                eprintln!("This needs an active pass.");
            }
            _ => eprintln!("Error: {}", e),
        }
        std::process::exit(1);
    }
    Ok(())
}
