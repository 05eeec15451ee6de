mod commands;
mod config;
mod session;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{ModeArg, TripArgs};
use config::AppConfig;
use session::LoadedTrip;

#[derive(Parser, Debug)]
#[command(name = "trip-replay")]
#[command(about = "Replay recorded truck trips: metrics, playback and range projections", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Trip data directory (overrides `data_root` from the config)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Trip and stop metrics at a route position
    Metrics {
        #[command(flatten)]
        trip: TripArgs,
        #[arg(long, default_value_t = 0)]
        position: usize,
    },
    /// Whole-trip totals
    Summary {
        #[command(flatten)]
        trip: TripArgs,
    },
    /// Per-point speed and segment mileage
    Profile {
        #[command(flatten)]
        trip: TripArgs,
        /// Write CSV here instead of printing JSON
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Play the trip back in real time
    Replay {
        #[command(flatten)]
        trip: TripArgs,
        #[arg(long)]
        speed: Option<f64>,
        /// Start at this percentage of the route
        #[arg(long, default_value_t = 0.0)]
        from: f64,
        /// Print every n-th position
        #[arg(long, default_value_t = 100)]
        every: usize,
    },
    /// Fuel or rest range projection with amenity candidates
    Project {
        #[command(flatten)]
        trip: TripArgs,
        #[arg(long, value_enum)]
        mode: ModeArg,
        /// Route percentage to project from
        #[arg(long, default_value_t = 0.0)]
        at: f64,
        /// Local amenity catalog (JSON) instead of the amenity service
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Only compute the projection
        #[arg(long)]
        no_search: bool,
    },
    /// Write the normalized drive points as NDJSON
    Export {
        #[command(flatten)]
        trip: TripArgs,
        #[arg(long)]
        out: PathBuf,
    },
}

impl Command {
    fn trip(&self) -> &TripArgs {
        match self {
            Command::Metrics { trip, .. }
            | Command::Summary { trip }
            | Command::Profile { trip, .. }
            | Command::Replay { trip, .. }
            | Command::Project { trip, .. }
            | Command::Export { trip, .. } => trip,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut cfg = AppConfig::load(cli.config.as_deref())?;
    if let Some(data) = cli.data {
        cfg.data_root = Some(data);
    }
    let root = cfg.data_root.clone().unwrap_or_else(|| PathBuf::from("."));
    let provider = iox::JsonTripProvider::new(root);

    let key = cli.command.trip().key();
    let trip = LoadedTrip::load(&provider, key.clone())
        .await
        .with_context(|| format!("load trip {} @ {}", key.tractor_id, key.arrival))?;

    match cli.command {
        Command::Metrics { position, .. } => commands::metrics(&trip, &cfg, position).await,
        Command::Summary { .. } => commands::summary(&trip).await,
        Command::Profile { out, .. } => commands::profile(&trip, &cfg, out.as_deref()).await,
        Command::Replay { speed, from, every, .. } => {
            if let Some(speed) = speed {
                cfg.playback.speed = speed;
            }
            commands::replay(Arc::new(trip), cfg, from, every).await
        }
        Command::Project { mode, at, catalog, no_search, .. } => {
            commands::project(Arc::new(trip), cfg, mode, at, catalog, no_search).await
        }
        Command::Export { out, .. } => commands::export(&trip, &out).await,
    }
}
