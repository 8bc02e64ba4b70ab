//! Spatial join of buildings to zoning parcels
//!
//! Containment join, inner semantics: a building must lie entirely *within*
//! a parcel (intersecting is not enough), and buildings inside no parcel are
//! dropped - there is no rule set to evaluate them against. Parcel bounding
//! boxes go into an R-tree so each building only runs the exact containment
//! test against a handful of candidates.
//!
//! Overlapping parcels are not expected input, but must not crash the join:
//! when a building is within more than one parcel, the lowest parcel index in
//! store order wins. Deterministic, documented, and exercised by a test.

use geo::{BoundingRect, Contains, MultiPolygon, Point};
use geo::Centroid;
use rstar::{primitives::GeomWithData, RTree, AABB};
use serde::Serialize;
use tracing::{debug, info};

use crate::classify::{height_violation, ViolationType};
use crate::footprint::Building;
use crate::parcel::{Parcel, ParcelStore};

/// A building annotated with its parcel association and compliance outcome.
#[derive(Debug, Clone, Serialize)]
pub struct JoinRecord {
    pub building: Building,
    /// Identifier of the containing parcel.
    pub parcel_ref: u64,
    /// True iff the footprint is not fully within the parcel's buildable area.
    pub boundary_violation: bool,
    /// True iff the tagged/estimated height exceeds the parcel maximum.
    pub height_violation: bool,
    pub violation_type: ViolationType,
}

impl JoinRecord {
    /// Footprint centroid, for marker placement by the rendering layer.
    pub fn marker(&self) -> Option<Point<f64>> {
        self.building.geometry.centroid()
    }
}

type ParcelEnvelope = GeomWithData<rstar::primitives::Rectangle<[f64; 2]>, usize>;

/// Spatial index over parcel bounding rectangles.
pub struct ParcelIndex {
    tree: RTree<ParcelEnvelope>,
}

impl ParcelIndex {
    pub fn build(store: &ParcelStore) -> Self {
        let envelopes: Vec<ParcelEnvelope> = store
            .parcels()
            .iter()
            .enumerate()
            .filter_map(|(idx, parcel)| {
                parcel.geometry.bounding_rect().map(|r| {
                    GeomWithData::new(
                        rstar::primitives::Rectangle::from_corners(
                            [r.min().x, r.min().y],
                            [r.max().x, r.max().y],
                        ),
                        idx,
                    )
                })
            })
            .collect();
        Self {
            tree: RTree::bulk_load(envelopes),
        }
    }

    /// Store indices of parcels whose bounding box intersects the building's,
    /// sorted ascending so the first-match rule is deterministic.
    fn candidates(&self, building: &Building) -> Vec<usize> {
        let Some(bbox) = building.geometry.bounding_rect() else {
            return Vec::new();
        };
        let envelope = AABB::from_corners(
            [bbox.min().x, bbox.min().y],
            [bbox.max().x, bbox.max().y],
        );
        let mut idxs: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|e| e.data)
            .collect();
        idxs.sort_unstable();
        idxs
    }
}

/// Associate each building with the parcel containing it (inner join).
///
/// Returns `(building, parcel index)` pairs; unmatched buildings are dropped.
pub fn join_within(buildings: Vec<Building>, store: &ParcelStore) -> Vec<(Building, usize)> {
    let index = ParcelIndex::build(store);
    let total = buildings.len();

    let joined: Vec<(Building, usize)> = buildings
        .into_iter()
        .filter_map(|building| {
            let parcel_idx = index.candidates(&building).into_iter().find(|&idx| {
                store.parcels()[idx].geometry.contains(&building.geometry)
            });
            match parcel_idx {
                Some(idx) => Some((building, idx)),
                None => {
                    debug!(way_id = building.way_id, "building outside all parcels, dropped");
                    None
                }
            }
        })
        .collect();

    info!(
        matched = joined.len(),
        dropped = total - joined.len(),
        "spatial join complete"
    );
    joined
}

/// Evaluate one joined building against its parcel's rule set.
///
/// The buildable-area check treats an underived (`None`) buildable area the
/// same as an empty one: nothing can be proven compliant against it, so the
/// footprint counts as encroaching.
pub fn evaluate(building: Building, parcel: &Parcel) -> JoinRecord {
    let empty = MultiPolygon::new(Vec::new());
    let buildable = parcel.buildable_area.as_ref().unwrap_or(&empty);

    let boundary = !buildable.contains(&building.geometry);
    let height = height_violation(&building, parcel);

    JoinRecord {
        parcel_ref: parcel.id,
        boundary_violation: boundary,
        height_violation: height,
        violation_type: ViolationType::from_flags(height, boundary),
        building,
    }
}
