//! overpass.rs — Water outlines from the OpenStreetMap Overpass API
//!
//! Asks for `natural=water` relations in the region first; when there are
//! none, falls back to `natural=coastline` ways. Relation members are
//! stitched into closed rings, inner rings becoming holes (islands).
//!
//! `query` blocks on the runtime handle, so it must only be called from
//! blocking contexts (`spawn_blocking`), never from an async task.

use std::time::Duration;

use geo::{Contains, Coord, Geometry, GeometryCollection, LineString, MultiLineString, Point, Polygon};
use sail_planner::{WaterDataError, WaterDataProvider};
use sail_types::BoundingRegion;
use serde::Deserialize;
use tokio::runtime::Handle;
use tracing::{debug, info};

#[derive(Debug, Clone, Deserialize)]
pub struct OverpassConfig {
    pub endpoint: String,
    pub timeout_s: u64,
}

// ── Wire format (`out geom`) ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<Element>,
}

#[derive(Debug, Deserialize)]
struct Element {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    members: Vec<Member>,
    #[serde(default)]
    geometry: Vec<Node>,
}

#[derive(Debug, Deserialize)]
struct Member {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    geometry: Vec<Node>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Node {
    lat: f64,
    lon: f64,
}

impl From<Node> for Coord<f64> {
    fn from(n: Node) -> Self {
        Coord { x: n.lon, y: n.lat }
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

pub struct OverpassClient {
    client: reqwest::Client,
    endpoint: String,
    handle: Handle,
}

impl OverpassClient {
    pub fn new(config: &OverpassConfig, handle: Handle) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_s))
            .build()?;
        Ok(Self { client, endpoint: config.endpoint.clone(), handle })
    }

    async fn run(&self, ql: String) -> Result<OverpassResponse, WaterDataError> {
        let res = self
            .client
            .post(&self.endpoint)
            .body(ql)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| WaterDataError::Transport(e.to_string()))?;
        res.json::<OverpassResponse>()
            .await
            .map_err(|e| WaterDataError::Decode(e.to_string()))
    }
}

impl WaterDataProvider for OverpassClient {
    fn query(&self, region: &BoundingRegion) -> Result<Geometry<f64>, WaterDataError> {
        self.handle.block_on(async {
            let water = water_geometry(&self.run(query("relation", "water", region)).await?);
            if !water.0.is_empty() {
                info!("Overpass: {} water polygons for {region:?}", water.0.len());
                return Ok(Geometry::GeometryCollection(water));
            }
            let coast = coastline_geometry(&self.run(query("way", "coastline", region)).await?);
            debug!("Overpass: no water relation for {region:?}, {} coastline ways", coast.0.len());
            Ok(Geometry::MultiLineString(coast))
        })
    }
}

fn query(element: &str, natural: &str, r: &BoundingRegion) -> String {
    format!(
        "[out:json][timeout:25];{element}[\"natural\"=\"{natural}\"]({},{},{},{});out geom;",
        r.south, r.west, r.north, r.east
    )
}

// ── Geometry assembly ─────────────────────────────────────────────────────────

fn water_geometry(res: &OverpassResponse) -> GeometryCollection<f64> {
    let mut polygons = Vec::new();
    for el in &res.elements {
        match el.kind.as_str() {
            "relation" => polygons.extend(relation_polygons(&el.members)),
            "way" if is_closed(&el.geometry) => {
                polygons.push(Polygon::new(line(&el.geometry), vec![]));
            }
            _ => {}
        }
    }
    GeometryCollection(polygons.into_iter().map(Geometry::Polygon).collect())
}

fn relation_polygons(members: &[Member]) -> Vec<Polygon<f64>> {
    let ways = |role: &str| -> Vec<Vec<Coord<f64>>> {
        members
            .iter()
            .filter(|m| m.kind == "way" && m.role == role && m.geometry.len() > 1)
            .map(|m| m.geometry.iter().copied().map(Coord::from).collect())
            .collect()
    };
    let outers = assemble_rings(ways("outer"));
    let mut inners = assemble_rings(ways("inner"));

    outers
        .into_iter()
        .map(|outer| {
            let shell = Polygon::new(outer.clone(), vec![]);
            let (holes, rest): (Vec<_>, Vec<_>) = inners
                .drain(..)
                .partition(|ring| ring.0.first().is_some_and(|c| shell.contains(&Point::from(*c))));
            inners = rest;
            Polygon::new(outer, holes)
        })
        .collect()
}

/// Join way segments end to end into closed rings. Segments that never close
/// are dropped.
fn assemble_rings(mut segments: Vec<Vec<Coord<f64>>>) -> Vec<LineString<f64>> {
    let mut rings = Vec::new();
    while let Some(mut ring) = segments.pop() {
        while ring.first() != ring.last() {
            let Some(tail) = ring.last().copied() else { break };
            let next = segments.iter().position(|s| s.first() == Some(&tail) || s.last() == Some(&tail));
            let Some(i) = next else { break };
            let mut seg = segments.swap_remove(i);
            if seg.first() != Some(&tail) {
                seg.reverse();
            }
            ring.extend(seg.into_iter().skip(1));
        }
        if ring.len() >= 4 && ring.first() == ring.last() {
            rings.push(LineString::new(ring));
        } else {
            debug!("Overpass: dropping unclosed ring of {} nodes", ring.len());
        }
    }
    rings
}

fn coastline_geometry(res: &OverpassResponse) -> MultiLineString<f64> {
    MultiLineString::new(
        res.elements
            .iter()
            .filter(|el| el.kind == "way" && el.geometry.len() > 1)
            .map(|el| line(&el.geometry))
            .collect(),
    )
}

fn line(nodes: &[Node]) -> LineString<f64> {
    LineString::new(nodes.iter().copied().map(Coord::from).collect())
}

fn is_closed(nodes: &[Node]) -> bool {
    nodes.len() >= 4
        && nodes.first().map(|n| (n.lat, n.lon)) == nodes.last().map(|n| (n.lat, n.lon))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAKE_WITH_ISLAND: &str = r#"{
      "elements": [{
        "type": "relation",
        "members": [
          {"type": "way", "role": "outer", "geometry": [
            {"lat": 52.0, "lon": 4.0}, {"lat": 52.0, "lon": 4.1}, {"lat": 52.1, "lon": 4.1}]},
          {"type": "way", "role": "outer", "geometry": [
            {"lat": 52.0, "lon": 4.0}, {"lat": 52.1, "lon": 4.0}, {"lat": 52.1, "lon": 4.1}]},
          {"type": "way", "role": "inner", "geometry": [
            {"lat": 52.04, "lon": 4.04}, {"lat": 52.04, "lon": 4.06}, {"lat": 52.06, "lon": 4.06},
            {"lat": 52.06, "lon": 4.04}, {"lat": 52.04, "lon": 4.04}]}
        ]
      }]
    }"#;

    #[test]
    fn split_outer_ways_are_stitched_into_one_ring() {
        let res: OverpassResponse = serde_json::from_str(LAKE_WITH_ISLAND).unwrap();
        let water = water_geometry(&res);
        assert_eq!(water.0.len(), 1);
        let Geometry::Polygon(lake) = &water.0[0] else { panic!("expected a polygon") };
        assert_eq!(lake.exterior().0.len(), 5);
        assert_eq!(lake.interiors().len(), 1);
    }

    #[test]
    fn coastline_ways_become_line_work() {
        let res: OverpassResponse = serde_json::from_str(
            r#"{"elements":[{"type":"way","geometry":[{"lat":52.0,"lon":4.0},{"lat":52.1,"lon":4.1}]}]}"#,
        )
        .unwrap();
        assert_eq!(coastline_geometry(&res).0.len(), 1);
        assert!(water_geometry(&res).0.is_empty());
    }

    #[test]
    fn query_uses_south_west_north_east_order() {
        let q = query("relation", "water", &BoundingRegion::new(52.0, 4.0, 52.1, 4.1));
        assert!(q.contains("relation[\"natural\"=\"water\"](52,4,52.1,4.1)"), "{q}");
    }
}
