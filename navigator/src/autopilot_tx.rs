//! autopilot_tx.rs — UDP uplink toward the autopilot bridge
//!
//! Each waypoint batch and each geofence goes out as one JSON `UplinkMessage`
//! datagram. Send errors are logged but never stop the navigator.

use std::net::UdpSocket;

use sail_planner::AutopilotSink;
use sail_types::{GeoPoint, OsmNodeData, UplinkMessage};
use tracing::{debug, info, warn};

pub struct UdpUplink {
    socket: UdpSocket,
    target_addr: String,
}

impl UdpUplink {
    pub fn new(target_addr: &str) -> Result<Self, std::io::Error> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        Ok(Self { socket, target_addr: target_addr.to_string() })
    }

    fn send(&self, msg: &UplinkMessage) {
        let bytes = match serde_json::to_vec(msg) {
            Ok(b) => b,
            Err(e) => {
                warn!("Uplink: serialize failed: {e}");
                return;
            }
        };
        match self.socket.send_to(&bytes, &self.target_addr) {
            Ok(n) => debug!("Uplink → {} ({n} bytes)", self.target_addr),
            Err(e) => warn!("Uplink: send to {} failed: {e}", self.target_addr),
        }
    }
}

impl AutopilotSink for UdpUplink {
    fn upload_mission(&self, boat_id: u32, first_index: usize, waypoints: &[GeoPoint]) {
        info!("Uplink: boat {boat_id} mission items {}..{}", first_index, first_index + waypoints.len());
        self.send(&UplinkMessage::Mission {
            boat_id,
            first_index,
            waypoints: waypoints.to_vec(),
            issued_at_ms: chrono::Utc::now().timestamp_millis(),
        });
    }

    fn upload_geofence(&self, center: GeoPoint, points: &[OsmNodeData]) {
        info!("Uplink: geofence of {} points around {center:?}", points.len());
        self.send(&UplinkMessage::Geofence {
            center,
            points: points.to_vec(),
            issued_at_ms: chrono::Utc::now().timestamp_millis(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn mission_batch_arrives_as_one_datagram() {
        let rx = UdpSocket::bind("127.0.0.1:0").unwrap();
        rx.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let uplink = UdpUplink::new(&rx.local_addr().unwrap().to_string()).unwrap();

        let wps = vec![GeoPoint::new(4.0, 52.0), GeoPoint::new(4.01, 52.01)];
        uplink.upload_mission(9, 3, &wps);

        let mut buf = [0u8; 4096];
        let (n, _) = rx.recv_from(&mut buf).unwrap();
        match serde_json::from_slice::<UplinkMessage>(&buf[..n]).unwrap() {
            UplinkMessage::Mission { boat_id, first_index, waypoints, .. } => {
                assert_eq!((boat_id, first_index), (9, 3));
                assert_eq!(waypoints, wps);
            }
            other => panic!("unexpected uplink {other:?}"),
        }
    }
}
