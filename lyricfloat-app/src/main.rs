mod commands;
mod display;
mod playerctl;

use crate::commands::PanelCommand;
use crate::display::LyricsView;
use crate::playerctl::PlayerctlBridge;
use lyricfloat_core::{
    BridgeWatcher, CoreError, LyricFloatConfig, LyricsFetcher, LyricsLibrary, LyricsProvider,
    NowPlayingBridge, SyncEngine, SyncEvent, SyncHandle, SyncService,
};
use lyricfloat_lyrics_lrclib::LrclibProvider;
use std::fs::File;
use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Capacity of the bridge event channel between watcher and fetcher
const BRIDGE_EVENT_CAPACITY: usize = 16;

fn main() {
    // Check config for logging.enabled before full config load
    let file_logging_enabled = check_file_logging_enabled();
    init_tracing(file_logging_enabled);

    let config = match LyricFloatConfig::load_or_create() {
        Ok(config) => config,
        Err(CoreError::ConfigNotFound { path }) => {
            info!(
                "Created config template at {}, continuing with defaults",
                path.display()
            );
            LyricFloatConfig::default()
        }
        Err(e) => {
            error!("{e}");
            eprintln!(
                "Fix {} or delete it to regenerate the template.",
                LyricFloatConfig::config_path().display()
            );
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    // Create shared cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Set up Ctrl+C handler to trigger graceful shutdown
    let ctrlc_token = cancel_token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down gracefully...");
        ctrlc_token.cancel();
    }) {
        error!("Failed to set Ctrl+C handler: {}", e);
    }

    runtime.block_on(run(config, cancel_token));

    // stdin reads sit on a blocking thread that never returns on its own
    runtime.shutdown_timeout(Duration::from_millis(500));
}

async fn run(config: LyricFloatConfig, cancel_token: CancellationToken) {
    let bridge: Arc<dyn NowPlayingBridge> =
        Arc::new(PlayerctlBridge::new(config.player.identifier()));

    let engine = SyncEngine::new(config.lyrics.global_offset);
    let (service, handle) =
        SyncService::new(engine, Arc::clone(&bridge), Some(cancel_token.clone()));

    let (bridge_tx, bridge_rx) = mpsc::channel(BRIDGE_EVENT_CAPACITY);
    let watcher = BridgeWatcher::new(
        Arc::clone(&bridge),
        config.player.poll_interval(),
        bridge_tx,
        Some(cancel_token.clone()),
    );

    let library = LyricsLibrary::new(config.lyrics.folder());
    let fetcher = LyricsFetcher::new(
        bridge,
        library,
        create_providers(&config),
        handle.clone(),
        bridge_rx,
        Some(cancel_token.clone()),
    );

    info!(
        "Starting lyricfloat (player: {}, poll interval: {}ms)",
        config.player.identifier().unwrap_or("any"),
        config.player.poll_interval_ms
    );

    let tasks = [
        service.start(),
        watcher.start(),
        fetcher.start(),
        tokio::spawn(render_panel(handle.subscribe(), cancel_token.clone())),
        tokio::spawn(read_commands(handle, cancel_token.clone())),
    ];

    cancel_token.cancelled().await;
    for task in tasks {
        if let Err(e) = task.await {
            warn!("Task ended abnormally: {}", e);
        }
    }
    info!("lyricfloat stopped");
}

fn create_providers(config: &LyricFloatConfig) -> Vec<Box<dyn LyricsProvider>> {
    if !config.lyrics.auto_download {
        info!("Lyrics download disabled, using the local library only");
        return Vec::new();
    }

    info!("Initializing LRCLIB provider");
    match LrclibProvider::new() {
        Ok(provider) => vec![Box::new(provider)],
        Err(e) => {
            error!("Failed to create LRCLIB provider: {}", e);
            Vec::new()
        }
    }
}

/// Redraw the panel on stdout whenever the visible state changes
async fn render_panel(mut rx: broadcast::Receiver<SyncEvent>, cancel_token: CancellationToken) {
    let mut view = LyricsView::new();
    draw(&view);

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => break,
            event = rx.recv() => match event {
                Ok(event) => {
                    if view.apply(&event) {
                        draw(&view);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("Sync event channel closed");
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Panel missed {} sync events", n);
                }
            }
        }
    }
}

fn draw(view: &LyricsView) {
    let mut stdout = std::io::stdout().lock();
    // Clear screen and home the cursor
    let _ = write!(stdout, "\x1b[2J\x1b[H{}", view.render());
    let _ = stdout.flush();
}

/// Map stdin lines to sync commands until quit, EOF or cancellation
async fn read_commands(handle: SyncHandle, cancel_token: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            () = cancel_token.cancelled() => break,
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("stdin closed, panel commands disabled");
                break;
            }
            Err(e) => {
                warn!("Failed to read command: {}", e);
                break;
            }
        };

        let result = match commands::parse(&line) {
            Ok(None) => continue,
            Ok(Some(PanelCommand::Quit)) => {
                cancel_token.cancel();
                break;
            }
            Ok(Some(PanelCommand::Nudge(delta))) => handle.nudge(delta).await,
            Ok(Some(PanelCommand::Calibrate(elapsed))) => handle.recalibrate(elapsed).await,
            Ok(Some(PanelCommand::RecalibrateNow)) => handle.recalibrate_now().await,
            Ok(Some(PanelCommand::SetOffset(offset))) => {
                info!("Global offset set to {:+.2}s", offset);
                handle.set_global_offset(offset).await
            }
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };

        if let Err(e) = result {
            error!("Command failed: {}", e);
            break;
        }
    }
}

/// Check if file logging is enabled by reading the config file.
/// This is done before full config loading to set up tracing first.
/// Returns `false` if config doesn't exist or can't be parsed.
fn check_file_logging_enabled() -> bool {
    // Minimal structs to parse just the logging.enabled field
    #[derive(serde::Deserialize)]
    struct PartialConfig {
        #[serde(default)]
        logging: PartialLoggingConfig,
    }
    #[derive(serde::Deserialize, Default)]
    struct PartialLoggingConfig {
        #[serde(default)]
        enabled: bool,
    }

    let Ok(content) = std::fs::read_to_string(LyricFloatConfig::config_path()) else {
        return false;
    };

    toml::from_str::<PartialConfig>(&content)
        .map(|c| c.logging.enabled)
        .unwrap_or(false)
}

/// Initialize tracing with stderr output and optional file logging.
/// stdout belongs to the panel.
fn init_tracing(file_logging_enabled: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if file_logging_enabled {
        let log_path = lyricfloat_core::log_file_path();

        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        match File::create(&log_path) {
            Ok(file) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(stderr_layer)
                    .with(file_layer)
                    .init();

                return;
            }
            Err(e) => {
                eprintln!("Failed to create log file at {}: {e}", log_path.display());
            }
        }
    }

    // Fallback: stderr only
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}
