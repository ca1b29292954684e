use color_eyre::{eyre::eyre, Result};
use recoil_control::config::AppConfig;
use recoil_control::correction::{CorrectionEngine, PointerDevice};
use recoil_control::input::os::{start_listener, HostPointer};
use recoil_control::input::{InputEventRouter, RouterHandle, ShellCommand};
use recoil_control::persistence::{load_settings, PersistenceManager};
use recoil_control::profiles::{ProfileStore, TuningParameters, WeaponSlot};
use recoil_control::shell::ControlShell;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env();
    setup(config.log_level)?;
    for notice in &config.notices {
        warn!("{}", notice);
    }
    info!("Using configuration directory {}", config.config_dir.display());

    // Settings: fall back to defaults, report what was replaced
    let (record, notices) = load_settings(&config.settings_file()).await;
    for notice in &notices {
        warn!("{}", notice);
    }
    let mut settings = record.into_settings();
    if let Err(e) = settings.tuning.validate() {
        warn!("Loaded tuning is unusable ({}), using defaults", e);
        settings.tuning = TuningParameters::default();
    }
    let tuning = settings.tuning;

    let persistence = PersistenceManager::spawn(config.persistence_paths());
    let store = ProfileStore::new(settings).with_persistence(persistence.client());

    // Host capabilities are required; without them the tool cannot work
    let pointer: Arc<dyn PointerDevice> = Arc::new(
        HostPointer::open().map_err(|e| eyre!("Failed to open pointer backend: {}", e))?,
    );

    let engine = Arc::new(CorrectionEngine::new(pointer, tuning)?);
    engine.activate_weapon(WeaponSlot::Primary, store.offsets(WeaponSlot::Primary)?)?;
    if config.start_enabled {
        engine.start()?;
    }

    let shell = ControlShell::new(engine.clone(), store.clone(), persistence.client());

    let (event_tx, event_rx) = mpsc::channel(1000);
    let (shell_tx, mut shell_rx) = mpsc::channel(8);
    let router = RouterHandle::spawn(InputEventRouter::new(engine.clone(), store, shell_tx), event_rx);

    let listener =
        start_listener(event_tx).map_err(|e| eyre!("Failed to start input listener: {}", e))?;
    info!("Listening for input on thread '{}'", listener.thread_name());
    info!("{}", shell.status_line()?);

    loop {
        tokio::select! {
            command = shell_rx.recv() => match command {
                Some(ShellCommand::OpenSettings) => {
                    info!("Settings file: {}", config.settings_file().display());
                    info!("Presets directory: {}", config.presets_dir().display());
                    match shell.status_line() {
                        Ok(status) => info!("{}", status),
                        Err(e) => warn!("Could not read status: {}", e),
                    }
                }
                None => {
                    warn!("Shell command channel closed");
                    break;
                }
            },

            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    engine.stop()?;
    if let Err(e) = shell.flush().await {
        error!("{}", e);
    }
    router.shutdown().await;

    let stats = shell.session_stats()?;
    info!(
        "Session ended: {} loops, {} ticks, {} corrections over {}s",
        stats.loops_started,
        stats.ticks,
        stats.corrections_applied,
        stats.session_duration.num_seconds()
    );
    Ok(())
}

fn setup(level: Level) -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging_env(level);
    Ok(())
}

fn setup_logging_env(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
