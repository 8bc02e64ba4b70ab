//! Analysis configuration

use serde::{Deserialize, Serialize};

use crate::crs::Crs;
use crate::footprint::DEFAULT_FLOOR_HEIGHT_M;

/// Knobs for one analysis run.
///
/// Deserializable so deployments can carry it in a config file next to the
/// data paths handled by the loading layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Metric CRS used for setback erosion. Must be a projected system in
    /// meters matching the deployment region, e.g. the local UTM zone.
    pub metric_crs: Crs,
    /// Meters per building level for the `building:levels` height heuristic.
    pub floor_height_m: f64,
    /// Fan classification out over rayon. Each unit of work is independent,
    /// so this only changes wall-clock time, never results.
    pub parallel: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            // UTM 43N: the zone of the reference deployment (Chandigarh).
            metric_crs: Crs(32643),
            floor_height_m: DEFAULT_FLOOR_HEIGHT_M,
            parallel: true,
        }
    }
}
