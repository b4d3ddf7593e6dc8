//! Binary entrypoint for the ratrace CLI.
//!
//! Commands:
//! - `start` - run the game engine until interrupted
//! - `init` - create a starter `config.toml`
//! - `status` - print persisted rooms and a brief summary
//!
//! See the library crate docs for module-level details: `ratrace::`.
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

use ratrace::config::Config;
use ratrace::game::GameServer;
use ratrace::storage::RoomStore;

#[derive(Parser)]
#[command(name = "ratrace")]
#[command(about = "Turn-based economic board game engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the game engine
    Start,
    /// Initialize a new configuration file
    Init,
    /// Show persisted rooms and engine configuration
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config early to configure logging (Init writes the default later)
    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    if !matches!(cli.command, Commands::Init) {
        init_logging(&pre_config, cli.verbose);
    }

    match cli.command {
        Commands::Start => {
            let config = match pre_config {
                Some(config) => config,
                None => Config::load(&cli.config).await?,
            };
            info!("Starting ratrace v{}", env!("CARGO_PKG_VERSION"));
            let server = GameServer::start(config).await?;
            run_until_shutdown(server).await
        }
        Commands::Init => {
            Config::create_default(&cli.config).await?;
            println!("Created configuration file: {}", cli.config);
            println!("Edit it to adjust game limits, then run: ratrace start");
            Ok(())
        }
        Commands::Status => {
            let config = match pre_config {
                Some(config) => config,
                None => Config::load(&cli.config).await?,
            };
            print_status(&config).await
        }
    }
}

async fn run_until_shutdown(server: Arc<GameServer>) -> Result<()> {
    info!("engine running; press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutdown requested, stopping turn scheduler");
    server.shutdown().await;
    Ok(())
}

async fn print_status(config: &Config) -> Result<()> {
    let store = RoomStore::open_tiered(std::path::Path::new(&config.storage.data_dir));
    let rooms = store.load_all().await?;

    println!("ratrace v{}", env!("CARGO_PKG_VERSION"));
    println!("data dir:  {}", config.storage.data_dir);
    println!("backend:   {}", store.backend_name());
    println!("rooms:     {}", rooms.len());
    for room in &rooms {
        println!(
            "  {} \"{}\" [{:?}] {}/{} players, turn {}s",
            room.id,
            room.name,
            room.status,
            room.players.len(),
            room.max_players,
            room.turn_time_secs
        );
    }
    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|cfg| cfg.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let file = config.as_ref().and_then(|cfg| cfg.logging.file.clone());
    if let Some(path) = file {
        if let Ok(f) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
        {
            let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
            // When stdout is a terminal, mirror the log file to the console
            let is_tty = atty::is(atty::Stream::Stdout);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        } else {
            builder.format(|fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
            });
        }
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
