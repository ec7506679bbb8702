use clap::{Parser, Subcommand};
use roomsense_cli::commands::{self, AppState};
use roomsense_cli::readline;
use roomsense_core::config;
use roomsense_core::registry::Registry;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = config::load().map_err(|e| e.to_string())?;
    let registry = Registry::from_config(&config).map_err(|e| e.to_string())?;
    println!(
        "Loaded {} beacon(s), {} merged tracker(s)",
        config.beacons.len(),
        config.merged.len()
    );

    let state = Arc::new(RwLock::new(AppState { registry, config }));

    loop {
        let line = readline()?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match respond(line, Arc::clone(&state)).await {
            Ok(quit) => {
                if quit {
                    break;
                }
            }
            Err(err) => {
                write!(std::io::stdout(), "{err}").map_err(|e| e.to_string())?;
                std::io::stdout().flush().map_err(|e| e.to_string())?;
            }
        }
    }

    state.write().await.registry.shutdown().await;
    Ok(())
}

#[derive(Parser)]
#[command(version, about = "roomsense")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure a new beacon
    AddBeacon {
        #[arg(short, long)]
        address: String,
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Deconfigure a beacon and cancel its timers
    RemoveBeacon {
        #[arg(short, long)]
        address: String,
    },
    /// Configure a merged tracker over existing beacons
    AddMerged {
        #[arg(short, long)]
        name: String,
        /// away_when_any or away_when_all
        #[arg(short, long)]
        mode: String,
        /// Comma-separated member beacon addresses
        #[arg(short = 'M', long)]
        members: String,
    },
    /// Deconfigure a merged tracker
    RemoveMerged {
        #[arg(short, long)]
        name: String,
    },
    /// Feed one advertisement to a beacon
    Advertise {
        #[arg(short, long)]
        address: String,
        #[arg(short, long)]
        room: String,
        #[arg(long, allow_hyphen_values = true)]
        rssi: i64,
        #[arg(short, long)]
        timestamp: Option<i64>,
    },
    /// Feed a raw topic + JSON payload through the wire layer
    Inject {
        #[arg(short, long)]
        topic: String,
        #[arg(short, long)]
        payload: String,
    },
    /// Change a beacon's expiration window (minutes, clamped to 1-10)
    SetExpiration {
        #[arg(short, long)]
        address: String,
        #[arg(short, long)]
        minutes: u32,
    },
    /// Change a beacon's signal floor (dBm, clamped to -100..-20)
    SetFloor {
        #[arg(short, long)]
        address: String,
        #[arg(short, long, allow_hyphen_values = true)]
        dbm: i64,
    },
    /// Show all beacons and merged trackers
    Status,
    Exit,
}

async fn respond(line: &str, state: Arc<RwLock<AppState>>) -> Result<bool, String> {
    let mut args = shlex::split(line).ok_or("error: Invalid quoting")?;
    args.insert(0, "roomsense".to_string());
    let cli = Cli::try_parse_from(args).map_err(|e| e.to_string())?;

    match &cli.command {
        Some(Commands::AddBeacon { address, name }) => {
            commands::add_beacon(state, address, name.clone()).await
        }
        Some(Commands::RemoveBeacon { address }) => commands::remove_beacon(state, address).await,
        Some(Commands::AddMerged { name, mode, members }) => {
            commands::add_merged(state, name, mode, members).await
        }
        Some(Commands::RemoveMerged { name }) => commands::remove_merged(state, name).await,
        Some(Commands::Advertise { address, room, rssi, timestamp }) => {
            commands::advertise(state, address, room, *rssi, *timestamp).await
        }
        Some(Commands::Inject { topic, payload }) => commands::inject(state, topic, payload).await,
        Some(Commands::SetExpiration { address, minutes }) => {
            commands::set_expiration(state, address, *minutes).await
        }
        Some(Commands::SetFloor { address, dbm }) => {
            commands::set_floor(state, address, *dbm).await
        }
        Some(Commands::Status) => commands::status(state).await,
        Some(Commands::Exit) => return Ok(true),
        None => {}
    }

    Ok(false)
}
