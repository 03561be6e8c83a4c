//! Binary entrypoint for the pixelrpg engine.
//!
//! Commands:
//! - `init` - create a starter `config.toml`
//! - `start` - open the store and drive the periodic sweeps
//! - `status` - print store counts and a brief summary
//!
//! `start` is a headless harness: it plays the role of the external
//! scheduler from the library docs, ticking the stamina, dungeon, and
//! restock sweeps once a minute. A chat-platform adapter embeds the library
//! and replaces this loop with its own event wiring.

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{info, warn};

use pixelrpg::config::Config;
use pixelrpg::game::GameStoreBuilder;

#[derive(Parser)]
#[command(name = "pixelrpg")]
#[command(about = "Progression and economy engine for a chat-platform RPG bot")]
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
    /// Create a starter configuration file
    Init,
    /// Run the sweep scheduler against the store
    Start,
    /// Show store statistics
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            init_logging(&None, cli.verbose);
            if tokio::fs::try_exists(&cli.config).await.unwrap_or(false) {
                warn!("{} already exists; leaving it untouched", cli.config);
                return Ok(());
            }
            Config::create_default(&cli.config).await?;
            info!("wrote default configuration to {}", cli.config);
            Ok(())
        }
        Commands::Start => {
            let config = Config::load(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose);
            info!("starting pixelrpg v{}", env!("CARGO_PKG_VERSION"));
            run_sweeps(config).await
        }
        Commands::Status => {
            let config = Config::load(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose);
            let store = GameStoreBuilder::new(&config.storage.data_dir)
                .with_config(config.game.clone())
                .open()?;
            let stats = store.stats()?;
            println!("players:         {}", stats.players);
            println!("items:           {}", stats.items);
            println!("active dungeons: {}", stats.active_dungeons);
            println!("open listings:   {}", stats.listings);
            Ok(())
        }
    }
}

/// Tick the three periodic sweeps once a minute until ctrl-c.
async fn run_sweeps(config: Config) -> Result<()> {
    let store = GameStoreBuilder::new(&config.storage.data_dir)
        .with_config(config.game.clone())
        .open()?;
    info!("store opened at {}", config.storage.data_dir);

    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Utc::now();
                match store.run_stamina_sweep(now) {
                    Ok(credited) if credited > 0 => {
                        info!("stamina sweep credited {} players", credited)
                    }
                    Ok(_) => {}
                    Err(err) => warn!("stamina sweep failed: {}", err),
                }
                match store.run_dungeon_sweep(now) {
                    Ok(resolved) => {
                        for outcome in resolved {
                            let reward = outcome.run.reward.clone().unwrap_or_default();
                            info!(
                                "player {} {:?} a tier {} dungeon: {} xp, {}{} coins, {} items",
                                outcome.player_id,
                                outcome.run.status,
                                outcome.run.tier,
                                reward.xp,
                                config.game.currency_icon,
                                reward.coins,
                                reward.items.len()
                            );
                        }
                    }
                    Err(err) => warn!("dungeon sweep failed: {}", err),
                }
                if let Err(err) = store.run_restock_sweep(now) {
                    warn!("restock sweep failed: {}", err);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
        }
    }
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    let level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|cfg| cfg.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(level);

    let file = config.as_ref().and_then(|cfg| {
        let path = cfg.logging.file.as_ref()?;
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });
    if let Some(file) = file {
        let sink = std::sync::Mutex::new(file);
        builder.format(move |fmt, record| {
            let ts = Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = sink.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            writeln!(fmt, "{}", line)
        });
    } else {
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}",
                Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}
