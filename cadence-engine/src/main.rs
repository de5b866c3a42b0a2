//! Cadence daemon - Main entry point
//!
//! Loads the media library, queues every entry for enrichment, plays the
//! playlist with simulated sessions and shuts down on a signal, or when the
//! playlist runs out with `--play-and-exit`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use cadence_common::config::{load_toml_or_default, resolve_config_path, CONFIG_ENV_VAR};
use cadence_common::events::EventBus;
use cadence_engine::config::TomlConfig;
use cadence_engine::enrichment::{Enrichment, EnrichmentOptions};
use cadence_engine::entry::Entry;
use cadence_engine::gc::{ResourceRegistry, ResourceTree};
use cadence_engine::local::{LocalMetaFetcher, LocalPreparser};
use cadence_engine::playlist::{JsonLibrary, MediaLibrary, MemoryPlaylist, PlaylistSource};
use cadence_engine::sim::SimulatedSessionFactory;
use cadence_engine::{Engine, EngineOptions, EngineRuntime, RuntimeTimings, Terminator};
use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for cadence
#[derive(Parser, Debug)]
#[command(name = "cadence")]
#[command(about = "Playback orchestration daemon")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Exit once there is nothing left to play
    #[arg(long)]
    play_and_exit: bool,

    /// JSON media library (overrides the config file)
    #[arg(short, long, env = "CADENCE_LIBRARY")]
    library: Option<PathBuf>,

    /// Start over at the end of the playlist
    #[arg(long)]
    repeat: bool,

    /// Log level (overrides the config file)
    #[arg(long)]
    log_level: Option<String>,

    /// Files or URIs appended after the library entries
    uris: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR);
    let mut config: TomlConfig =
        load_toml_or_default(config_path.as_deref()).context("Failed to load configuration")?;
    if args.play_and_exit {
        config.engine.play_and_exit = true;
    }
    if let Some(path) = args.library {
        config.library.path = Some(path);
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate().context("Invalid configuration")?;

    // Initialize tracing
    let default_filter = format!(
        "cadence={0},cadence_engine={0},cadence_common={0}",
        config.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cadence");
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }

    let events = EventBus::new(config.engine.event_capacity);
    spawn_event_logger(&events);

    // Playlist: library first, then command-line entries
    let library = config.library.path.clone().map(JsonLibrary::new);
    let playlist = Arc::new(MemoryPlaylist::new(args.repeat));
    if let Some(library) = &library {
        info!("Media library: {}", library.path().display());
        for entry in library.load().context("Failed to load media library")? {
            playlist.append(entry);
        }
    }
    for uri in args.uris {
        playlist.append(Entry::new(uri));
    }
    info!("Playlist has {} entries", playlist.len());

    let registry = Arc::new(ResourceRegistry::new());
    let sessions = Arc::new(SimulatedSessionFactory::new(
        Arc::clone(&registry),
        config.simulation.clone(),
    ));
    let engine = Arc::new(Engine::new(
        Arc::clone(&playlist) as Arc<dyn PlaylistSource>,
        sessions,
        registry as Arc<dyn ResourceTree>,
        events.clone(),
        EngineOptions {
            play_and_exit: config.engine.play_and_exit,
            gc_grace: config.engine.gc_grace(),
        },
    ));
    let enrichment = Arc::new(Enrichment::new(
        Arc::new(LocalPreparser),
        Arc::new(LocalMetaFetcher),
        engine.activity(),
        events.clone(),
        EnrichmentOptions::from(&config.engine),
    ));

    for entry in playlist.entries() {
        if let Err(e) = enrichment.enqueue(entry) {
            warn!("Entry not queued for enrichment: {}", e);
        }
    }

    engine.play();
    let runtime = EngineRuntime::start(
        Arc::clone(&engine),
        enrichment,
        RuntimeTimings::from(&config.engine),
    )
    .context("Failed to start engine runtime")?;

    wait_for_exit(engine.terminator()).await;

    tokio::task::spawn_blocking(move || runtime.shutdown())
        .await
        .context("Engine shutdown panicked")?;

    if let Some(library) = &library {
        library
            .dump(&playlist.entries())
            .context("Failed to save media library")?;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Log every engine event as JSON at debug level
fn spawn_event_logger(events: &EventBus) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => debug!(target: "cadence::events", "{}", json),
                    Err(e) => warn!("Failed to serialize event: {}", e),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event logger lagged, {} events skipped", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Resolve on Ctrl+C, SIGTERM or an engine termination request
async fn wait_for_exit(terminator: Terminator) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
        _ = terminator.wait() => {
            info!("Playlist finished, shutting down");
        },
    }
}
