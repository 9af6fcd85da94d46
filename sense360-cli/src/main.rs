use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use sense360_core::client::DeviceApiClient;
use sense360_core::{DeviceSort, RegisterDevice};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Sense360 CLI - talk to the device registry from a terminal
#[derive(Parser)]
#[command(name = "sense360")]
#[command(about = "Command-line client for the Sense360 device registry", long_about = None)]
struct Cli {
    /// Registry server base URL
    #[arg(long, env = "SENSE360_SERVER", default_value = "http://127.0.0.1:5000")]
    server: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a device, or refresh an existing registration
    Register {
        /// Device MAC address
        #[arg(long)]
        mac: String,

        /// Chip type, e.g. ESP32-S3
        #[arg(long)]
        chip_type: String,

        /// Flash size, e.g. 16MB
        #[arg(long)]
        flash_size: Option<String>,

        /// Device type
        #[arg(long)]
        device_type: Option<String>,
    },

    /// Look up a device by public id
    Get { device_id: String },

    /// List active devices
    List {
        #[arg(long, value_enum)]
        sort: Option<SortArg>,
    },

    /// Refresh a device's last-seen time
    Ping { device_id: String },

    /// Deactivate a device
    Deactivate { device_id: String },

    /// Identify a board by MAC address
    Identify { mac: String },

    /// Show recent access log entries
    Logs {
        /// Only entries for this public device id
        #[arg(long)]
        identifier: Option<String>,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Check server health
    Health,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    LastSeen,
    ChipType,
    DeviceId,
}

impl From<SortArg> for DeviceSort {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::LastSeen => DeviceSort::LastSeenDesc,
            SortArg::ChipType => DeviceSort::ChipType,
            SortArg::DeviceId => DeviceSort::DeviceId,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let client = DeviceApiClient::new(&cli.server, Duration::from_secs(cli.timeout_secs))?;

    match cli.command {
        Commands::Register {
            mac,
            chip_type,
            flash_size,
            device_type,
        } => {
            let mut input = RegisterDevice::new(mac, chip_type);
            if let Some(flash_size) = flash_size {
                input = input.with_flash_size(flash_size);
            }
            if let Some(device_type) = device_type {
                input = input.with_device_type(device_type);
            }
            let device = client.register_device(&input).await?;
            info!("Registered device {}", device.device_id());
            print_json(&device)?;
        }
        Commands::Get { device_id } => {
            print_json(&client.get_device(&device_id).await?)?;
        }
        Commands::List { sort } => {
            let devices = client.list_active_devices(sort.map(Into::into)).await?;
            info!("{} active device(s)", devices.len());
            print_json(&devices)?;
        }
        Commands::Ping { device_id } => {
            client.ping_device(&device_id).await?;
            println!("Device {} activity updated", device_id);
        }
        Commands::Deactivate { device_id } => {
            client.deactivate_device(&device_id).await?;
            println!("Device {} deactivated", device_id);
        }
        Commands::Identify { mac } => {
            print_json(&client.identify_or_default(&mac).await)?;
        }
        Commands::Logs { identifier, limit } => {
            let logs = client.access_logs(identifier.as_deref(), limit).await?;
            print_json(&logs)?;
        }
        Commands::Health => {
            print_json(&client.health().await?)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
