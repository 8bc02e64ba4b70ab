//! Zoning parcels and buildable-area derivation
//!
//! A parcel carries its polygon plus the two rule attributes the caller
//! supplies: maximum permitted height and mandatory boundary setback. The
//! store derives each parcel's buildable area by eroding the boundary inward
//! by the setback distance - a negative buffer, which is only meaningful in a
//! metric CRS, so the store reprojects out to the configured metric frame,
//! erodes there, and brings the result home.
//!
//! Erosion can legitimately consume a parcel entirely (setback wider than the
//! parcel's half-width). That is a valid fully-encroached parcel, represented
//! as an empty multipolygon, never an error.

use geo::{BooleanOps, MultiPolygon, Polygon};
use geo_buffer::buffer_polygon;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::crs::{Crs, Transformer};
use crate::error::{Error, Result};

/// Rule attributes supplied with each parcel, never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParcelAttributes {
    /// Maximum permitted building height, meters.
    pub max_height: f64,
    /// Mandatory clearance from the parcel boundary, meters.
    pub setback: f64,
}

impl ParcelAttributes {
    pub fn new(max_height: f64, setback: f64) -> Self {
        Self {
            max_height,
            setback,
        }
    }
}

impl Default for ParcelAttributes {
    /// Placeholder values for parcel sources without attribute columns.
    fn default() -> Self {
        Self {
            max_height: 10.5,
            setback: 5.0,
        }
    }
}

/// A zoning parcel in the working CRS.
#[derive(Debug, Clone, Serialize)]
pub struct Parcel {
    pub id: u64,
    pub geometry: Polygon<f64>,
    pub attributes: ParcelAttributes,
    /// Derived once per run by [`ParcelStore::derive_buildable_areas`];
    /// `None` until then, possibly empty afterwards.
    pub buildable_area: Option<MultiPolygon<f64>>,
}

impl Parcel {
    pub fn new(id: u64, geometry: Polygon<f64>, attributes: ParcelAttributes) -> Self {
        Self {
            id,
            geometry,
            attributes,
            buildable_area: None,
        }
    }
}

/// All parcels of an analysis run, in one working CRS.
pub struct ParcelStore {
    parcels: Vec<Parcel>,
    crs: Crs,
}

impl ParcelStore {
    pub fn new(parcels: Vec<Parcel>, crs: Crs) -> Self {
        Self { parcels, crs }
    }

    pub fn parcels(&self) -> &[Parcel] {
        &self.parcels
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    pub fn len(&self) -> usize {
        self.parcels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parcels.is_empty()
    }

    /// Reproject all parcel geometries into a new working CRS. Derived
    /// buildable areas travel along when present.
    pub fn reproject(self, target: Crs) -> Result<ParcelStore> {
        let t = Transformer::new(self.crs, target)?;
        let parcels = self
            .parcels
            .into_iter()
            .map(|p| {
                Ok(Parcel {
                    geometry: t.transform_polygon(&p.geometry)?,
                    buildable_area: p
                        .buildable_area
                        .as_ref()
                        .map(|ba| t.transform_multi_polygon(ba))
                        .transpose()?,
                    ..p
                })
            })
            .collect::<Result<_>>()?;
        Ok(ParcelStore {
            parcels,
            crs: target,
        })
    }

    /// Derive every parcel's buildable area: erode the boundary inward by the
    /// setback distance in `metric` coordinates, normalize the result, and
    /// reproject it back into the working CRS.
    pub fn derive_buildable_areas(&mut self, metric: Crs) -> Result<()> {
        // A setback is meters; eroding in a degree-based CRS would apply it
        // as degrees and wipe out every parcel without a word.
        if !metric.is_metric() {
            return Err(Error::malformed(format!(
                "setback erosion requires a metric CRS, got geographic {metric}"
            )));
        }
        let to_metric = Transformer::new(self.crs, metric)?;
        let from_metric = Transformer::new(metric, self.crs)?;

        for parcel in &mut self.parcels {
            let projected = to_metric.transform_polygon(&parcel.geometry)?;
            let eroded = erode(&projected, parcel.attributes.setback);
            let back = from_metric.transform_multi_polygon(&eroded)?;
            debug!(
                parcel = parcel.id,
                setback = parcel.attributes.setback,
                parts = back.0.len(),
                "derived buildable area"
            );
            parcel.buildable_area = Some(back);
        }

        info!(parcels = self.parcels.len(), metric = %metric, "buildable areas derived");
        Ok(())
    }
}

/// Inward erosion by `setback` meters, with the cleanup union that repairs
/// self-touching output from eroding concave rings (the zero-distance-buffer
/// step of the classic recipe).
fn erode(geometry: &Polygon<f64>, setback: f64) -> MultiPolygon<f64> {
    if setback == 0.0 {
        return MultiPolygon::new(vec![geometry.clone()]);
    }
    let eroded = buffer_polygon(geometry, -setback);
    if eroded.0.is_empty() {
        return eroded;
    }
    eroded.union(&MultiPolygon::new(Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Area, Contains};

    fn square_100m() -> Polygon<f64> {
        polygon![
            (x: 0.0, y: 0.0),
            (x: 100.0, y: 0.0),
            (x: 100.0, y: 100.0),
            (x: 0.0, y: 100.0),
        ]
    }

    #[test]
    fn test_erosion_shrinks_square_by_setback() {
        let out = erode(&square_100m(), 5.0);
        let area = out.unsigned_area();
        // 90m x 90m = 8100 m^2, up to skeleton tolerance.
        assert!((area - 8100.0).abs() < 1.0, "area {area}");
    }

    #[test]
    fn test_erosion_consuming_parcel_yields_empty() {
        let out = erode(&square_100m(), 60.0);
        assert!(out.unsigned_area() < 1e-6, "fully consumed parcel must be empty");
    }

    #[test]
    fn test_zero_setback_is_identity() {
        let out = erode(&square_100m(), 0.0);
        assert!((out.unsigned_area() - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_buildable_area_subset_of_parcel() {
        let mut store = ParcelStore::new(
            vec![Parcel::new(
                1,
                square_100m(),
                ParcelAttributes::new(10.0, 5.0),
            )],
            Crs(32643),
        );
        store.derive_buildable_areas(Crs(32643)).unwrap();

        let parcel = &store.parcels()[0];
        let buildable = parcel.buildable_area.as_ref().unwrap();
        for part in &buildable.0 {
            assert!(
                parcel.geometry.contains(part),
                "buildable area leaked outside the parcel"
            );
        }
    }

    #[test]
    fn test_buildable_area_through_metric_roundtrip() {
        // Parcel in WGS84 degrees; erosion must happen in meters.
        let geom = polygon![
            (x: 76.7600, y: 30.7400),
            (x: 76.7610, y: 30.7400),
            (x: 76.7610, y: 30.7409),
            (x: 76.7600, y: 30.7409),
        ];
        let mut store = ParcelStore::new(
            vec![Parcel::new(1, geom, ParcelAttributes::new(10.0, 5.0))],
            Crs(4326),
        );
        store.derive_buildable_areas(Crs(32643)).unwrap();

        let parcel = &store.parcels()[0];
        let buildable = parcel.buildable_area.as_ref().unwrap();
        assert!(!buildable.0.is_empty());
        // Back in the working CRS (degrees), strictly smaller than the parcel.
        assert!(buildable.unsigned_area() < parcel.geometry.unsigned_area());
    }

    #[test]
    fn test_geographic_metric_crs_rejected() {
        // A 5m setback interpreted as 5 degrees would erase the parcel; the
        // store must refuse to erode in a degree-based frame instead.
        let geom = polygon![
            (x: 76.7600, y: 30.7400),
            (x: 76.7610, y: 30.7400),
            (x: 76.7610, y: 30.7409),
            (x: 76.7600, y: 30.7409),
        ];
        let mut store = ParcelStore::new(
            vec![Parcel::new(1, geom, ParcelAttributes::new(10.0, 5.0))],
            Crs(4326),
        );
        let err = store.derive_buildable_areas(Crs(4326)).unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)), "got {err:?}");
        assert!(
            store.parcels()[0].buildable_area.is_none(),
            "no buildable area may be derived from a rejected run"
        );
    }

    #[test]
    fn test_default_attributes_placeholder() {
        let attrs = ParcelAttributes::default();
        assert_eq!(attrs.max_height, 10.5);
        assert_eq!(attrs.setback, 5.0);
    }

    #[test]
    fn test_store_reproject_carries_buildable_area() {
        let mut store = ParcelStore::new(
            vec![Parcel::new(
                1,
                square_100m(),
                ParcelAttributes::new(10.0, 5.0),
            )],
            Crs(32643),
        );
        store.derive_buildable_areas(Crs(32643)).unwrap();
        let store = store.reproject(Crs(4326)).unwrap();
        assert_eq!(store.crs(), Crs(4326));
        assert!(store.parcels()[0].buildable_area.is_some());
    }
}
