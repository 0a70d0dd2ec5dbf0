use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use clap::Parser;
use log::{error, info, warn};
use tokio::spawn;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

use crate::audio::mixer::SimulatedMixer;
use crate::config::io::{read_config_if_present, ConfigIO};
use crate::config::types::Config;
use crate::controller::device_controller::device_controller_task;
use crate::device::btle::BtleTransport;
use crate::device::connection::ConnectionManager;
use crate::error::{AppRunError, ConfigError};
use crate::sim::automation::DesktopAutomation;

pub mod audio;
pub mod config;
pub mod controller;
pub mod device;
pub mod error;
pub mod sim;

/// Turns a Tappie rotary encoder into a volume and media controller.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    /// Config file to use instead of the portable or per-user one
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Bluetooth name of the peripheral, overrides the config file
    #[arg(long)]
    pub device_name: Option<String>,

    /// Log debug messages
    #[arg(long, short)]
    pub verbose: bool,

    /// Print the effective config as json and exit
    #[arg(long)]
    pub print_config: bool,
}

pub fn init_logging(verbose: bool) {
    let level = if verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        // btleplug is chatty on debug
        .level_for("btleplug", log::LevelFilter::Info)
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        dispatch = dispatch.chain(
            fern::log_file(log_file).expect("Failed to open LOG_FILE")
        );
    }

    dispatch.apply().expect("Failed to initialize logger");
}

pub fn run(cli: Cli) -> Result<(), AppRunError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    if cli.print_config {
        let mut config = runtime.block_on(read_config_if_present(cli.config.as_deref()))?;
        if let Some(device_name) = cli.device_name {
            config.device_name = device_name;
        }

        let json = serde_json::to_string_pretty(&config).map_err(ConfigError::from)?;
        println!("{}", json);
        return Ok(());
    }

    let config_io = ConfigIO::open(cli.config.as_deref())?;
    let mut config = runtime.block_on(config_io.read())?;

    if let Some(device_name) = cli.device_name {
        config.device_name = device_name;
    }

    // only one instance may talk to the peripheral
    let mut lock = config_io.lock()?;
    let _guard = lock.acquire()?;

    runtime.block_on(run_controller(config))
}

async fn open_transport(cancel: &CancellationToken, retry_delay: Duration) -> Option<BtleTransport> {
    loop {
        match BtleTransport::new().await {
            Ok(transport) => return Some(transport),
            Err(err) => warn!("Bluetooth is not available: {}", err),
        }

        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = sleep(retry_delay) => {},
        }
    }
}

async fn run_controller(config: Config) -> Result<(), AppRunError> {
    let cancel = CancellationToken::new();

    let shutdown = cancel.clone();
    spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                shutdown.cancel();
            },
            Err(err) => error!("Failed to listen for the shutdown signal: {}", err),
        }
    });

    warn!("No host mixer backend is built in, volume and mute changes are simulated");
    let mixer = Arc::new(SimulatedMixer::new(config.targets.values().map(|target| target.mixer_index)));
    let automation = Arc::new(DesktopAutomation);

    let (events, controller_handle) = device_controller_task(cancel.clone(), config.clone(), mixer, automation)?;

    if let Some(transport) = open_transport(&cancel, Duration::from_secs(config.reconnect_delay_secs)).await {
        let manager = ConnectionManager::new(transport, &config, events);
        manager.run(cancel.clone()).await;
    }

    if let Err(err) = controller_handle.await {
        error!("Device controller task failed: {}", err);
    }

    info!("Stopped");
    Ok(())
}
