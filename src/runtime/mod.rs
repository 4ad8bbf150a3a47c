use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::audio::RodioPipeline;
use crate::config::Settings;
use crate::library::Library;
use crate::playback::Engine;
use crate::server::{self, Dispatcher};
use crate::store::{self, CatalogStore, EventStore, SqliteEventStore};

mod settings;
mod startup;

pub use settings::load_settings;

/// Open the database, index and load the library, then serve commands until
/// a shutdown signal arrives.
pub async fn run(settings: Settings) -> Result<()> {
    let database = settings
        .database_path()
        .context("no database path: set storage.database_path or HOME")?;
    let pool = store::open(&database)
        .await
        .with_context(|| format!("failed to open database {}", database.display()))?;

    let catalog = CatalogStore::new(pool.clone());
    startup::index_library(&catalog, &settings.library).await;
    let library = Arc::new(
        Library::load(catalog)
            .await
            .context("failed to load the library")?,
    );

    let events: Arc<dyn EventStore> = Arc::new(SqliteEventStore::new(pool.clone()));
    let pipeline = Arc::new(RodioPipeline::new(&settings.audio));
    let engine = Engine::new(pipeline, events.clone(), &settings.audio);
    let dispatcher = Arc::new(Dispatcher::new(
        engine.clone(),
        library,
        events,
        &settings.library,
    ));

    let listener = server::bind(&settings.server)
        .await
        .context("failed to bind the command listener")?;
    server::serve(listener, dispatcher, startup::shutdown_signal()).await;

    engine
        .shutdown()
        .await
        .context("failed to close the open playback session")?;
    pool.close().await;
    info!("bye");
    Ok(())
}
