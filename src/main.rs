//! Portbridge: runs the host adapters against a line-oriented console core

mod console;

use clap::{Parser, Subcommand};
use console::Console;
use portbridge_adapters::native::{FixedSensor, TungsteniteConnector};
use portbridge_adapters::{Bridge, Hosts, MemoryStore, NetworkFlag, StorageAdapter};
use portbridge_core::{
    inbound, BridgeConfig, Coordinates, Features, PortSet, StartupFlags, MAP_POSITION_CHANGE,
};
use portbridge_map::{DomEvent, GeoMap, MapDriver, MockSurface};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "portbridge", about = "Host adapters for a message-passing core")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Bind the adapters and drive them from stdin
    Run {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override the socket endpoint
        #[arg(long)]
        socket_url: Option<String>,
        /// Also write logs to this file, rotated daily
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
    /// Print the effective configuration as TOML
    PrintConfig {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run {
            config,
            socket_url,
            log_file,
        }) => {
            let _guard = init_tracing(log_file.as_deref());
            let mut config = load_config(config.as_deref());
            if let Some(url) = socket_url {
                config.endpoints.socket_url = url;
            }
            run(config).await?;
        }

        Some(Commands::PrintConfig { config }) => {
            print!("{}", load_config(config.as_deref()).to_toml());
        }

        Some(Commands::Version) => {
            println!("portbridge v{}", env!("CARGO_PKG_VERSION"));
        }

        None => {
            let _guard = init_tracing(None);
            run(BridgeConfig::default()).await?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> BridgeConfig {
    path.map(BridgeConfig::load).unwrap_or_default()
}

/// Stderr logging plus an optional daily-rolling file. Keep the guard alive.
fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let prefix = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "portbridge.log".into());
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, prefix));
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portbridge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    guard
}

async fn run(config: BridgeConfig) -> anyhow::Result<()> {
    let (network, network_events) = NetworkFlag::new(true);
    let store = Arc::new(MemoryStore::with_quota(config.storage.quota_bytes));
    let user_token = StorageAdapter::new(store.clone()).get_token()?;

    // Endpoint problems are fatal before anything binds.
    let features = Features::detect(&config, true);
    let flags = StartupFlags::assemble(&config, &features, user_token)?;
    println!("{}", console::render("flags", &flags)?);

    let (core, ports) = PortSet::new();
    let hosts = Hosts {
        connector: Arc::new(TungsteniteConnector::new(Duration::from_millis(
            config.socket.connect_timeout_ms,
        ))),
        sensor: Arc::new(FixedSensor::new(
            Coordinates::new(
                config.geolocation.fixed_latitude,
                config.geolocation.fixed_longitude,
                config.geolocation.fixed_accuracy,
            ),
            Duration::from_millis(config.geolocation.fixed_interval_ms),
        )),
        store,
        network: Arc::new(network.clone()),
        network_events,
    };
    let bridge = Bridge::bind(&config, ports, hosts)?;

    let (position_change, map_position) = inbound(MAP_POSITION_CHANGE);
    let map = GeoMap::new(position_change, config.map.drift_epsilon);
    let surface = MockSurface::default();
    let surface_handle = surface.clone();
    let driver = MapDriver::new(map, Duration::from_millis(config.map.tick_interval_ms))
        .with_surface(move |initial| {
            surface.set_camera(initial);
            surface
        });
    let (dom_tx, dom_rx) = mpsc::unbounded_channel();
    dom_tx.send(DomEvent::Connected)?;
    let cancel = CancellationToken::new();
    let map_task = tokio::spawn(driver.run(dom_rx, cancel.child_token()));

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted");
            shutdown.cancel();
        }
    });

    let console = Console::new(core, network, dom_tx, surface_handle, map_position);
    let result = console.run(cancel.clone()).await;

    cancel.cancel();
    let _ = map_task.await;
    bridge.shutdown().await;
    result
}
