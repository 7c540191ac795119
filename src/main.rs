//! DHT climate bridge - main entry point

use clap::{Parser, Subcommand};
use dht_bridge::config::{BridgeConfig, SensorSection};
use dht_bridge::link::ProbeLinkDriver;
use dht_bridge::observability::init_default_logging;
use dht_bridge::sensor::{IioSensor, Sensor, SimSensor};
use dht_bridge::session::MqttSession;
use dht_bridge::Bridge;
use std::path::PathBuf;
use std::process;
use tokio::signal;
use tracing::{error, info};

/// DHT sensor to MQTT bridge
#[derive(Parser)]
#[command(name = "dht-bridge")]
#[command(about = "Publishes DHT sensor readings to an MQTT broker")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting dht-bridge v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_bridge(config).await,
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<BridgeConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(BridgeConfig::load_from_file(path)?)
        }
        None => {
            let default_paths = vec!["bridge.toml", "config/bridge.toml"];

            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(BridgeConfig::load_from_file(&path)?);
                }
            }

            error!(
                "No configuration file found. Please provide one with -c/--config or create bridge.toml"
            );
            process::exit(1);
        }
    }
}

/// Factory for sensor drivers named in the configuration
struct SensorFactory;

impl SensorFactory {
    fn create(config: &SensorSection) -> Result<Box<dyn Sensor>, Box<dyn std::error::Error>> {
        match config.driver.as_str() {
            "iio" => Ok(Box::new(IioSensor::new(&config.iio_path))),
            "sim" => Ok(Box::new(SimSensor::new())),
            other => Err(format!("Unsupported sensor driver: {other}").into()),
        }
    }
}

async fn run_bridge(config: BridgeConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(device_id = %config.device.id, "Bridge starting");

    let driver = ProbeLinkDriver::from_config(&config.wifi, &config.mqtt)?;
    let sensor = SensorFactory::create(&config.sensor)?;
    let session = MqttSession::new(&config.device.id, config.mqtt.clone());

    let mut bridge = Bridge::new(config, Box::new(driver), session, sensor);
    bridge.start().await?;

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    info!("Bridge is running, publishing sensor readings...");

    tokio::select! {
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }

    bridge.shutdown().await?;
    Ok(())
}

fn handle_config_command(
    config: BridgeConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    info!("Configuration is valid");

    if show {
        println!("{}", toml::to_string_pretty(&config)?);
    }
    Ok(())
}
