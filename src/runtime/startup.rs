use tokio::signal;
use tracing::{info, warn};

use crate::config::LibrarySettings;
use crate::library;
use crate::store::CatalogStore;

/// Index `music_dir` if configured. A failed pass is logged; the daemon
/// still serves whatever the catalog already holds.
pub async fn index_library(catalog: &CatalogStore, settings: &LibrarySettings) {
    if !settings.scan_on_startup {
        info!("startup scan disabled");
        return;
    }
    let Some(dir) = settings.music_dir.as_deref() else {
        info!("no music directory configured, skipping scan");
        return;
    };
    if let Err(e) = library::index(catalog, dir, settings).await {
        warn!(dir = %dir.display(), error = %e, "library scan failed");
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("received terminate signal, shutting down");
        },
    }
}
