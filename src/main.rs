//! Stand-alone host that drives the presence bridge from a fixed game state.
//!
//! Useful to check the config and Discord assets without a game client.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use yarpc::config::default_config_path;
use yarpc::presence::{HostContext, ServerLink, TickPhase};
use yarpc::{ConfigStore, PresenceBridge};

const CONFIG_RELOAD_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
#[command(name = "yarpc", version, about = "Publish rich presence for a simulated game client")]
struct Args {
    /// Config file, defaults to the per-user config directory
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    username: Option<String>,

    /// Dimension id, e.g. minecraft:overworld (omit for the main menu)
    #[arg(long)]
    dimension: Option<String>,

    #[arg(long)]
    health: Option<f32>,

    #[arg(long)]
    hunger: Option<u32>,

    /// Remote server address, or "local" for a singleplayer world
    #[arg(long)]
    server: Option<String>,

    #[arg(long)]
    held_item: Option<String>,

    /// Host ticks per second
    #[arg(long, default_value_t = 20)]
    tick_rate: u32,

    /// Write the effective config back to disk before starting
    #[arg(long)]
    write_config: bool,
}

/// Game state taken verbatim from the command line
struct StaticHost {
    args: Args,
}

impl HostContext for StaticHost {
    fn dimension(&self) -> Option<String> {
        self.args.dimension.clone()
    }

    fn username(&self) -> Option<String> {
        self.args.username.clone()
    }

    fn health(&self) -> Option<f32> {
        self.args.health
    }

    fn hunger(&self) -> Option<u32> {
        self.args.hunger
    }

    fn server(&self) -> Option<ServerLink> {
        match self.args.server.as_deref() {
            Some("local") => Some(ServerLink::Local),
            Some(address) => Some(ServerLink::Remote(address.to_string())),
            None => None,
        }
    }

    fn held_item(&self) -> Option<String> {
        self.args.held_item.clone()
    }
}

#[tokio::main]
async fn main() {
    let _guard = yarpc::logging::init_logging();
    let args = Args::parse();

    if let Err(e) = run(args).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), yarpc::ConfigError> {
    let path = args.config.clone().unwrap_or_else(default_config_path);
    let config = ConfigStore::load(&path)?;
    if args.write_config {
        config.save()?;
        tracing::info!("Wrote config to {}", path.display());
    }

    let tick = Duration::from_secs(1) / args.tick_rate.max(1);
    let host = Arc::new(StaticHost { args });

    let Some(mut bridge) = PresenceBridge::start(config.clone(), host)? else {
        return Ok(());
    };

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(tick);
    let mut reload = tokio::time::interval(CONFIG_RELOAD_INTERVAL);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                bridge.on_tick(TickPhase::Start);
                bridge.on_tick(TickPhase::End);
            }
            _ = reload.tick() => {
                if let Err(e) = config.reload() {
                    tracing::warn!("Keeping previous config: {}", e);
                }
            }
        }
    }

    tracing::info!("Shutting down");
    bridge.shutdown().await;
    Ok(())
}
