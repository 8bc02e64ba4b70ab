//! End-to-end batch analysis
//!
//! One-shot, batch-oriented orchestration of the stages: harmonize CRSs,
//! build the height model, reconstruct footprints, derive buildable areas,
//! join, classify. Each stage consumes typed inputs and returns new typed
//! outputs; nothing mutates a previous stage's result in place.
//!
//! The DSM's CRS is the working frame for the whole run, as every other
//! dataset is harmonized into it exactly once.

use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::footprint::{reconstruct_buildings, reproject_buildings, WayRecord};
use crate::height::{build_height_model, HeightModel};
use crate::join::{evaluate, join_within, JoinRecord};
use crate::parcel::ParcelStore;
use crate::raster::Raster;
use std::collections::HashMap;

/// Everything the core consumes, already parsed by the loading layer.
pub struct AnalysisInput {
    /// Surface model: ground plus structures.
    pub dsm: Raster,
    /// Terrain model: bare ground.
    pub dtm: Raster,
    /// Parcels with caller-supplied rule attributes, in any supported CRS.
    pub parcels: ParcelStore,
    /// Node id -> (lon, lat), WGS84.
    pub nodes: HashMap<i64, (f64, f64)>,
    /// Raw ways referencing the node table.
    pub ways: Vec<WayRecord>,
}

/// Everything the rendering layer consumes.
pub struct AnalysisOutput {
    /// One record per building matched to a parcel, compliant ones included;
    /// filtering `violation_type == None` is the consumer's business.
    pub records: Vec<JoinRecord>,
    /// Supporting height-above-ground surface on the DSM grid. `None` when
    /// the parcel set had no raster coverage - the vector analysis is still
    /// valid in that case.
    pub height_model: Option<HeightModel>,
}

/// Run the full compliance analysis.
pub fn run_analysis(input: AnalysisInput, config: &AnalysisConfig) -> Result<AnalysisOutput> {
    let working = input.dsm.crs();
    info!(working = %working, parcels = input.parcels.len(), "starting analysis");

    let parcels = input.parcels.reproject(working)?;

    // Supporting layer: a parcel set outside the raster footprint degrades
    // to a vector-only run instead of aborting it.
    let height_model = match build_height_model(&input.dsm, &input.dtm, &parcels) {
        Ok(model) => Some(model),
        Err(e) if e.is_no_coverage() => {
            warn!("no raster coverage over parcels; skipping height model");
            None
        }
        Err(e) => return Err(e),
    };

    let buildings = reconstruct_buildings(&input.nodes, &input.ways, config.floor_height_m)?;
    let buildings = reproject_buildings(buildings, working)?;

    let mut parcels = parcels;
    parcels.derive_buildable_areas(config.metric_crs)?;

    let joined = join_within(buildings, &parcels);

    let records: Vec<JoinRecord> = if config.parallel {
        joined
            .into_par_iter()
            .map(|(building, idx)| evaluate(building, &parcels.parcels()[idx]))
            .collect()
    } else {
        joined
            .into_iter()
            .map(|(building, idx)| evaluate(building, &parcels.parcels()[idx]))
            .collect()
    };

    let flagged = records.iter().filter(|r| r.violation_type.is_violation()).count();
    info!(records = records.len(), flagged, "analysis complete");

    Ok(AnalysisOutput {
        records,
        height_model,
    })
}
