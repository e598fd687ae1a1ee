//! # telemetry_hub
//!
//! Telemetry Hub — receives JSON telemetry envelopes from the vehicle bridge
//! via UDP and applies them to the shared navigation state.
//!
//! ## Architecture
//! Runs as its own Tokio task (tokio::spawn) next to the planner task. It:
//!   1. Binds a UDP socket on the configured telemetry port
//!   2. Decodes one `TelemetryMessage` per datagram
//!   3. Applies sensor readings (wind, GPS, speed) and obstacle changes directly
//!   4. Forwards mission events (start, waypoint reached) to the planner task
//!
//! Malformed datagrams and socket errors are logged and never stop the hub.

use std::net::SocketAddr;
use std::sync::Arc;

use sail_planner::geo_math::normalize_bearing;
use sail_planner::ObstacleRegistry;
use sail_types::{GeoPoint, TelemetryMessage};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::state::{NavState, SharedState};
use crate::tasks::NavEvent;

// ── Configuration ─────────────────────────────────────────────────────────────

pub struct TelemetryHubConfig {
    /// UDP port to listen on
    pub udp_port: u16,
}

// ── Message routing ───────────────────────────────────────────────────────────

/// Apply one telemetry message. Returns the event the planner task must
/// handle, if any.
pub fn route_message(msg: TelemetryMessage, state: &mut NavState, obstacles: &ObstacleRegistry) -> Option<NavEvent> {
    match msg {
        TelemetryMessage::Wind { direction_deg, speed } => {
            state.wind_dir_deg = normalize_bearing(direction_deg);
            state.wind_speed = speed.max(0.0);
            // A mission started before the first report is still unplanned
            let first = !std::mem::replace(&mut state.wind_received, true);
            (first && state.boat.is_some()).then_some(NavEvent::Replan)
        }
        TelemetryMessage::Gps { lat, lon } => {
            state.position = Some(GeoPoint::new(lon, lat));
            None
        }
        TelemetryMessage::Speed { speed_mps } => {
            state.boat_speed_mps = speed_mps.max(0.0);
            None
        }
        TelemetryMessage::ObstacleAdded { obstacle } => {
            obstacles.add(obstacle);
            None
        }
        TelemetryMessage::ObstacleRemoved { obstacle } => {
            obstacles.remove(&obstacle);
            None
        }
        TelemetryMessage::WaypointReached { index } => Some(NavEvent::WaypointReached(index)),
        TelemetryMessage::StartMission { boat_id, origin, destination } => {
            Some(NavEvent::StartMission { boat_id, origin, destination })
        }
    }
}

// ── Main UDP listener task ────────────────────────────────────────────────────

/// Start the telemetry UDP listener. Returns only if the socket cannot be bound.
pub async fn start_telemetry_hub(
    config: TelemetryHubConfig,
    state: SharedState,
    obstacles: Arc<ObstacleRegistry>,
    events: mpsc::Sender<NavEvent>,
) {
    let addr = format!("0.0.0.0:{}", config.udp_port);
    let socket = match UdpSocket::bind(&addr).await {
        Ok(s) => {
            info!("📡 Telemetry hub listening on UDP {addr}");
            s
        }
        Err(e) => {
            warn!("Telemetry hub: could not bind UDP {addr}: {e}");
            return;
        }
    };

    let mut buf = vec![0u8; 65_536];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, src)) => process_datagram(&buf[..len], src, &state, &obstacles, &events).await,
            Err(e) => warn!("Telemetry hub: UDP recv error: {e}"),
        }
    }
}

async fn process_datagram(
    data: &[u8],
    src: SocketAddr,
    state: &SharedState,
    obstacles: &ObstacleRegistry,
    events: &mpsc::Sender<NavEvent>,
) {
    let msg: TelemetryMessage = match serde_json::from_slice(data) {
        Ok(m) => m,
        Err(e) => {
            debug!("Telemetry: malformed datagram from {src}: {e}");
            return;
        }
    };

    let event = {
        let mut s = state.write().await;
        route_message(msg, &mut s, obstacles)
    };

    if let Some(ev) = event {
        if let Err(e) = events.send(ev).await {
            warn!("Telemetry: planner task gone, dropping event: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sail_types::{BoundingRegion, Obstacle};

    #[test]
    fn sensor_readings_update_state() {
        let mut state = NavState::default();
        let reg = ObstacleRegistry::new();

        let wind: TelemetryMessage =
            serde_json::from_str(r#"{"type":"wind","direction_deg":-90.0,"speed":7.5}"#).unwrap();
        assert!(route_message(wind, &mut state, &reg).is_none());
        assert_eq!(state.wind_dir_deg, 270.0);
        assert_eq!(state.wind_speed, 7.5);

        let gps: TelemetryMessage = serde_json::from_str(r#"{"type":"gps","lat":52.0,"lon":4.3}"#).unwrap();
        route_message(gps, &mut state, &reg);
        assert_eq!(state.position, Some(GeoPoint::new(4.3, 52.0)));
    }

    #[test]
    fn first_wind_report_releases_a_waiting_mission() {
        let mut state = NavState::default();
        let reg = ObstacleRegistry::new();
        state.boat = Some(sail_planner::add_new_mission(1, GeoPoint::new(4.0, 52.0), GeoPoint::new(4.0, 52.1)));
        assert!(state.readings().is_none());

        let wind = || TelemetryMessage::Wind { direction_deg: 180.0, speed: 6.0 };
        assert!(matches!(route_message(wind(), &mut state, &reg), Some(NavEvent::Replan)));
        assert_eq!(state.readings().map(|r| r.wind_dir_deg), Some(180.0));
        assert!(route_message(wind(), &mut state, &reg).is_none());
    }

    #[test]
    fn obstacle_messages_update_registry() {
        let mut state = NavState::default();
        let reg = ObstacleRegistry::new();
        let ship = Obstacle::new(BoundingRegion::new(52.0, 4.0, 52.001, 4.001), 4.0, 90.0);

        route_message(TelemetryMessage::ObstacleAdded { obstacle: ship.clone() }, &mut state, &reg);
        assert_eq!(reg.len(), 1);
        route_message(TelemetryMessage::ObstacleRemoved { obstacle: ship }, &mut state, &reg);
        assert!(reg.is_empty());
    }

    #[test]
    fn mission_events_are_forwarded() {
        let mut state = NavState::default();
        let reg = ObstacleRegistry::new();
        let ev = route_message(TelemetryMessage::WaypointReached { index: 4 }, &mut state, &reg);
        assert!(matches!(ev, Some(NavEvent::WaypointReached(4))));
    }
}
