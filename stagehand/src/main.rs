use std::sync::Arc;

use stagehand::api::{ApiServer, ApiServerConfig, AppState};
use stagehand::config::{AppConfig, EngineKind, StoreKind};
use stagehand::logging;
use stagehand::media::{FfmpegEngine, MediaEngine, PassthroughEngine};
use stagehand::pipeline::{EventDispatcher, NotificationRelay};
use stagehand::store::{LocalStore, MemoryStore, NotifyingStore, ObjectStore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env_or_default();
    let (logging_config, _log_guard) = logging::init_logging(&config.log_dir)?;
    config.validate()?;

    let cancel_token = CancellationToken::new();
    logging_config.start_retention_cleanup(cancel_token.clone());

    let store: Arc<dyn ObjectStore> = match config.store {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::Local => Arc::new(LocalStore::new(&config.store_root)),
    };

    let engine: Arc<dyn MediaEngine> = match config.media_engine {
        EngineKind::Passthrough => Arc::new(PassthroughEngine::new(config.segment_secs)),
        EngineKind::Ffmpeg => Arc::new(FfmpegEngine::new(
            &config.ffmpeg_path,
            &config.ffprobe_path,
            config.segment_secs,
        )),
    };

    // Local notifications stand in for the platform's object-finalize events.
    let (store, notifications) = if config.local_notifications {
        let (store, rx) = NotifyingStore::new(store);
        (Arc::new(store) as Arc<dyn ObjectStore>, Some(rx))
    } else {
        (store, None)
    };

    info!(
        store = %config.store,
        engine = %config.media_engine,
        local_notifications = config.local_notifications,
        "stagehand starting"
    );

    let dispatcher = Arc::new(EventDispatcher::new(store, engine));
    let mut state = AppState::new(dispatcher.clone()).with_logging_config(logging_config);

    let relay_handle = notifications.map(|rx| {
        let relay = NotificationRelay::new(
            dispatcher,
            config.max_concurrent_dispatches,
            cancel_token.clone(),
        );
        state = state.clone().with_relay_stats(relay.stats());
        relay.spawn(rx)
    });

    let server = ApiServer::new(
        ApiServerConfig::from_app_config(&config),
        state,
        cancel_token.clone(),
    );

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received ctrl-c, shutting down");
                shutdown_token.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for ctrl-c"),
        }
    });

    let result = server.run().await;
    cancel_token.cancel();

    if let Some(handle) = relay_handle
        && let Err(e) = handle.await
    {
        warn!(error = %e, "Notification relay task failed");
    }

    result?;
    info!("stagehand stopped");
    Ok(())
}
