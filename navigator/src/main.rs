//! main.rs — Sailing navigator daemon entry point
//!
//! Runs three concurrent loops:
//!   1. Telemetry hub: UDP JSON telemetry from the vehicle bridge
//!   2. Planner: waypoint batches on mission start, acknowledgements and waits
//!   3. Geofence refresh: nearby shoreline uploaded as the boat moves
//!
//! plus a small HTTP surface (`/health`, `/mission`) for monitoring.

mod autopilot_tx;
mod overpass;
mod state;
mod tasks;
mod telemetry_hub;

use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use sail_planner::{MissionPlanner, ObstacleRegistry, PlannerConfig, WaterBoundaryCache};
use sail_types::GeoPoint;
use serde::Deserialize;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use autopilot_tx::UdpUplink;
use overpass::{OverpassClient, OverpassConfig};
use state::{MissionStatus, NavState, SharedState};
use tasks::{NavEvent, Navigator};
use telemetry_hub::TelemetryHubConfig;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "navigator", about = "Autonomous sailboat waypoint navigator")]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    /// Boat identifier used for the mission started from the command line
    #[arg(long, default_value = "1")]
    boat_id: u32,
    /// Start position as "lat,lon"; requires --destination
    #[arg(long, value_parser = parse_lat_lon)]
    origin: Option<GeoPoint>,
    /// Destination as "lat,lon"
    #[arg(long, value_parser = parse_lat_lon)]
    destination: Option<GeoPoint>,
}

fn parse_lat_lon(raw: &str) -> Result<GeoPoint, String> {
    let (lat, lon) = raw.split_once(',').ok_or_else(|| format!("expected \"lat,lon\", got {raw:?}"))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("latitude: {e}"))?;
    let lon: f64 = lon.trim().parse().map_err(|e| format!("longitude: {e}"))?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(format!("{raw:?} is outside the globe"));
    }
    Ok(GeoPoint::new(lon, lat))
}

// ── Daemon config ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct NetworkConfig {
    telemetry_port: u16,
    autopilot_addr: String,
    http_port: u16,
}

/// Sections of config.toml only the daemon reads
#[derive(Debug, Deserialize)]
struct DaemonConfig {
    network: NetworkConfig,
    overpass: OverpassConfig,
}

// ── HTTP ──────────────────────────────────────────────────────────────────────

async fn mission_status(State(state): State<SharedState>) -> Json<MissionStatus> {
    Json(MissionStatus::from_state(&*state.read().await))
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "navigator=info,sail_planner=info".into()),
        )
        .init();

    let args = Args::parse();

    let config_str = std::fs::read_to_string(&args.config).unwrap_or_else(|e| {
        warn!("Config {} unreadable ({e}), using built-in defaults", args.config);
        include_str!("../config.toml").to_string()
    });
    let planner_cfg = Arc::new(PlannerConfig::from_toml_str(&config_str).context("planner config")?);
    let daemon_cfg: DaemonConfig = toml::from_str(&config_str).context("network/overpass config")?;

    info!(
        "⛵ Navigator starting — telemetry UDP {}, autopilot {}, batches of {}",
        daemon_cfg.network.telemetry_port,
        daemon_cfg.network.autopilot_addr,
        planner_cfg.mission_planner.waypoint_upload_limit
    );

    let overpass = OverpassClient::new(&daemon_cfg.overpass, Handle::current()).context("overpass client")?;
    let water = Arc::new(WaterBoundaryCache::new(overpass));
    let obstacles = Arc::new(ObstacleRegistry::new());
    let uplink = UdpUplink::new(&daemon_cfg.network.autopilot_addr).context("uplink socket")?;
    let shared: SharedState = Arc::new(RwLock::new(NavState::default()));
    let (events_tx, events_rx) = mpsc::channel::<NavEvent>(64);

    let nav = Arc::new(Navigator {
        planner: MissionPlanner::new(water),
        config: planner_cfg,
        obstacles: obstacles.clone(),
        uplink: Arc::new(uplink),
        state: shared.clone(),
        events: events_tx.clone(),
    });

    tokio::spawn(telemetry_hub::start_telemetry_hub(
        TelemetryHubConfig { udp_port: daemon_cfg.network.telemetry_port },
        shared.clone(),
        obstacles,
        events_tx.clone(),
    ));
    tokio::spawn(tasks::run_planner(nav.clone(), events_rx));
    tokio::spawn(tasks::run_geofence_refresh(nav));

    match (args.origin, args.destination) {
        (Some(origin), Some(destination)) => {
            shared.write().await.position = Some(origin);
            events_tx
                .send(NavEvent::StartMission { boat_id: args.boat_id, origin, destination })
                .await
                .context("planner task stopped before the first mission")?;
        }
        (None, None) => info!("Waiting for a start_mission message"),
        _ => warn!("--origin and --destination must be given together; waiting for a start_mission message"),
    }

    let app = Router::new()
        .route("/health", get(|| async { "navigator ok" }))
        .route("/mission", get(mission_status))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(shared);

    let addr = format!("0.0.0.0:{}", daemon_cfg.network.http_port);
    info!("🌐 Status HTTP on http://{addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("bind {addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lat_lon_argument_is_parsed_in_that_order() {
        assert_eq!(parse_lat_lon("52.1, 4.3"), Ok(GeoPoint::new(4.3, 52.1)));
        assert!(parse_lat_lon("4.3").is_err());
        assert!(parse_lat_lon("95.0,4.3").is_err());
    }

    #[test]
    fn shipped_config_parses() {
        let raw = include_str!("../config.toml");
        let planner = PlannerConfig::from_toml_str(raw).unwrap();
        assert_eq!(planner.mission_planner.waypoint_upload_limit, 10);
        let daemon: DaemonConfig = toml::from_str(raw).unwrap();
        assert_eq!(daemon.network.http_port, 8090);
    }
}
