use clap::{Parser, Subcommand};
use lvolbus_dbus::BLOCK_INTERFACE;
use lvolbus_schema::{parse_config_file, BusKind, DeviceRecord, PropertyValue, ServiceConfig};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(
    name = "lvolbus",
    version,
    about = "Publish synthetic block devices on D-Bus"
)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the session bus instead of the system bus.
    #[arg(long, default_value_t = false, global = true)]
    session: bool,

    /// Number of block objects to publish.
    #[arg(long, global = true)]
    count: Option<u32>,

    /// Take the service name over from its current owner if allowed.
    #[arg(long, default_value_t = false, global = true)]
    replace: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Publish the block objects and serve requests (default).
    Serve,
    /// Print the properties of one block object as JSON.
    Describe {
        /// Generation index of the object.
        index: u32,
    },
    /// Measure the payload an object-manager service presents to clients.
    Survey {
        /// Well-known or unique bus name of the service.
        bus_name: String,
        /// Path of the object implementing ObjectManager.
        object_path: String,
        /// Output the summary as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Debug, Serialize)]
struct PropertyEntry<'a> {
    name: &'static str,
    signature: &'static str,
    value: PropertyValue<'a>,
}

#[derive(Debug, Serialize)]
struct DescribeResponse<'a> {
    path: String,
    interface: &'static str,
    properties: Vec<PropertyEntry<'a>>,
}

fn load_config(cli: &Cli) -> Result<ServiceConfig, lvolbus_schema::ConfigError> {
    let mut config = match &cli.config {
        Some(path) => parse_config_file(path)?,
        None => ServiceConfig::default(),
    };
    if cli.session {
        config.bus = BusKind::Session;
    }
    if let Some(count) = cli.count {
        config.device_count = count;
    }
    if cli.replace {
        config.replace_existing = true;
    }
    Ok(config)
}

fn describe(config: &ServiceConfig, index: u32) -> Result<String, serde_json::Error> {
    let record = DeviceRecord::new(index);
    let response = DescribeResponse {
        path: config.device_path(index),
        interface: BLOCK_INTERFACE,
        properties: record
            .properties()
            .map(|(name, value)| PropertyEntry {
                name,
                signature: value.wire_type().signature(),
                value,
            })
            .collect(),
    };
    serde_json::to_string_pretty(&response)
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            info!(
                "lvolbus starting: {} on {} bus, {} objects",
                config.service_name, config.bus, config.device_count
            );
            lvolbus_dbus::run_service(&config).await?;
        }
        Commands::Describe { index } => {
            println!("{}", describe(&config, index)?);
        }
        Commands::Survey {
            bus_name,
            object_path,
            json,
        } => {
            let conn = lvolbus_dbus::connect(config.bus).await?;
            let summary = lvolbus_dbus::survey(&conn, Some(&bus_name), &object_path).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{summary}");
            }
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("LVOLBUS_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .without_time()
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
