use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use forum_watch::browser::{ChromiumConfig, ChromiumLauncher};
use forum_watch::config::Config;
use forum_watch::monitor::{self, Monitor};
use forum_watch::notify::{DiscordMessenger, Notifier};
use forum_watch::store::SnapshotStore;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    info!("Starting forum-watch");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(
        data_dir = %config.data_dir.display(),
        interval_secs = config.check_interval.as_secs(),
        "Configuration loaded"
    );

    let store = SnapshotStore::open(&config.data_dir).with_context(|| {
        format!(
            "Failed to open data directory: {}",
            config.data_dir.display()
        )
    })?;

    if !store.path_for(forum_watch::store::LOGIN_RECORD).exists() {
        warn!("No login record found - checks will fail until it is created");
    }
    let channels = store
        .load_config()
        .context("Failed to read notification config")?
        .channels
        .len();
    info!(channels, "Notification config loaded");

    let messenger = DiscordMessenger::new(&config.discord_api_base, &config.discord_bot_token)
        .context("Failed to build Discord client")?;

    let launcher = ChromiumLauncher::new(ChromiumConfig {
        chrome_path: config.chrome_path.clone(),
        ..ChromiumConfig::default()
    });

    let monitor = Arc::new(Monitor::new(
        &config,
        store,
        Arc::new(launcher),
        Notifier::new(Arc::new(messenger)),
    ));

    let interval = config.check_interval;
    let loop_handle = tokio::spawn(async move {
        monitor::run_loop(monitor, interval).await;
    });

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutting down...");
    loop_handle.abort();
    info!("Shutdown complete");

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,forum_watch=debug"));

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
