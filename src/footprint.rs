//! Building footprint reconstruction from raw node/way topology
//!
//! Input is the raw OSM-style primitive soup: a node-id -> (lon, lat) table
//! and ways referencing nodes by id. Only ways tagged `building` become
//! footprints. Unresolvable node references are dropped silently (extracts
//! are routinely truncated at the bounding box), but a way left with fewer
//! than 3 resolvable vertices cannot form a polygon and is excluded.
//!
//! Height attribution is tag-driven: an explicit `height` tag that parses as
//! a number wins; otherwise `building:levels` times the floor-height
//! heuristic; otherwise unknown. A present-but-unparsable tag falls through
//! to the next source rather than aborting the record.

use std::collections::HashMap;

use geo::{Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::crs::{Crs, Transformer, WGS84};
use crate::error::{Error, Result};

/// Meters per building level when only `building:levels` is tagged.
pub const DEFAULT_FLOOR_HEIGHT_M: f64 = 3.0;

/// A raw way: ordered node references plus its tag set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WayRecord {
    pub id: i64,
    pub nodes: Vec<i64>,
    pub tags: HashMap<String, String>,
}

impl WayRecord {
    pub fn is_building(&self) -> bool {
        self.tags.contains_key("building")
    }
}

/// A reconstructed building footprint.
///
/// Geometry is immutable after construction; the join and classification
/// stages annotate around it, never through it.
#[derive(Debug, Clone, Serialize)]
pub struct Building {
    pub way_id: i64,
    pub geometry: Polygon<f64>,
    /// Meters; `None` when neither a height tag nor a level count is usable.
    pub height: Option<f64>,
    pub name: Option<String>,
    /// Raw level count, kept for diagnostics.
    pub levels: Option<u32>,
}

/// Reconstruct building polygons from node/way topology.
///
/// Output geometries are in WGS84 (EPSG:4326), as the node table is. Use
/// [`reproject_buildings`] to move the collection into the working CRS.
pub fn reconstruct_buildings(
    nodes: &HashMap<i64, (f64, f64)>,
    ways: &[WayRecord],
    floor_height_m: f64,
) -> Result<Vec<Building>> {
    let mut buildings = Vec::new();
    let mut dropped_sparse = 0usize;

    for way in ways.iter().filter(|w| w.is_building()) {
        let coords: Vec<Coord<f64>> = way
            .nodes
            .iter()
            .filter_map(|nid| nodes.get(nid))
            .map(|&(lon, lat)| Coord { x: lon, y: lat })
            .collect();

        if coords.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return Err(Error::malformed(format!(
                "way {} references a node with non-finite coordinates",
                way.id
            )));
        }

        // Ring closure duplicates the first node in well-formed data; count
        // distinct vertices before deciding the way is polygonal.
        let mut distinct = coords.clone();
        distinct.dedup();
        if distinct.last() == distinct.first() && distinct.len() > 1 {
            distinct.pop();
        }
        if distinct.len() < 3 {
            dropped_sparse += 1;
            debug!(way_id = way.id, resolved = distinct.len(), "dropping degenerate way");
            continue;
        }

        // Polygon::new closes the ring if first != last. Self-intersecting
        // or zero-area rings pass through unrepaired.
        let geometry = Polygon::new(LineString::from(coords), vec![]);

        buildings.push(Building {
            way_id: way.id,
            geometry,
            height: derive_height(&way.tags, floor_height_m),
            name: way.tags.get("name").cloned(),
            levels: way.tags.get("building:levels").and_then(|v| v.trim().parse().ok()),
        });
    }

    info!(
        buildings = buildings.len(),
        dropped = dropped_sparse,
        "reconstructed footprints"
    );
    Ok(buildings)
}

/// Explicit height tag wins; levels heuristic second; unknown last.
fn derive_height(tags: &HashMap<String, String>, floor_height_m: f64) -> Option<f64> {
    if let Some(h) = tags.get("height").and_then(|v| v.trim().parse::<f64>().ok()) {
        return Some(h);
    }
    tags.get("building:levels")
        .and_then(|v| v.trim().parse::<u32>().ok())
        .map(|levels| levels as f64 * floor_height_m)
}

/// Reproject a building collection from WGS84 into the working CRS.
pub fn reproject_buildings(buildings: Vec<Building>, working: Crs) -> Result<Vec<Building>> {
    let t = Transformer::new(WGS84, working)?;
    buildings
        .into_iter()
        .map(|b| {
            Ok(Building {
                geometry: t.transform_polygon(&b.geometry)?,
                ..b
            })
        })
        .collect()
}
