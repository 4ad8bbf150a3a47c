use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod audio;
mod config;
mod error;
mod library;
mod listened;
mod playback;
mod runtime;
mod server;
mod store;

/// Music daemon with a play/pause/seek ledger.
#[derive(Parser, Debug)]
#[command(name = "encore")]
#[command(version, about)]
struct Args {
    /// Config file (default: $XDG_CONFIG_HOME/encore/config.toml)
    #[arg(short, long, env = "ENCORE_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Port for the command listener
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory to index on startup
    #[arg(short, long)]
    music_dir: Option<PathBuf>,

    /// SQLite database file
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Skip indexing the music directory on startup
    #[arg(long)]
    no_scan: bool,
}

impl Args {
    fn apply(&self, settings: &mut config::Settings) {
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(dir) = &self.music_dir {
            settings.library.music_dir = Some(dir.clone());
        }
        if let Some(database) = &self.database {
            settings.storage.database_path = Some(database.clone());
        }
        if self.no_scan {
            settings.library.scan_on_startup = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let loaded = runtime::load_settings(args.config.as_deref());
    let mut settings = loaded.as_ref().cloned().unwrap_or_default();
    args.apply(&mut settings);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&settings.logging.filter))
                .unwrap_or_else(|_| EnvFilter::new("encore=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Config is optional; a bad file should not keep the daemon from starting.
    if let Err(e) = &loaded {
        warn!(error = %e, "using default settings");
    }
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = settings.server.port,
        music_dir = ?settings.library.music_dir,
        "starting encore"
    );

    runtime::run(settings).await
}
