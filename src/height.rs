//! Height-above-ground model from DSM/DTM differencing
//!
//! The DSM (surface model: ground plus structures) and DTM (terrain model:
//! bare ground) usually come from different sensors with different grids and
//! CRSs. The builder harmonizes everything into the DSM's frame: parcels are
//! reprojected into the DSM CRS, both rasters are clipped to the parcel set,
//! the DTM clip is resampled bilinearly onto the DSM clip's exact grid, and
//! the difference is clamped at zero - registration noise must never produce
//! a negative building height.
//!
//! The resulting surface is a supporting layer: the authoritative per-building
//! height for classification comes from footprint tags, not from this raster.

use ndarray::Array2;
use tracing::{debug, info};

use crate::crs::Transformer;
use crate::error::Result;
use crate::parcel::ParcelStore;
use crate::raster::{GridTransform, Raster};

/// Height-above-ground raster on the DSM clip's grid.
#[derive(Debug, Clone)]
pub struct HeightModel {
    raster: Raster,
}

impl HeightModel {
    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    pub fn transform(&self) -> GridTransform {
        self.raster.transform()
    }

    /// Height at a world coordinate in the model's CRS, bilinear. NaN outside
    /// coverage.
    pub fn height_at(&self, x: f64, y: f64) -> f64 {
        let (row_f, col_f) = self.raster.transform().world_to_pixel(x, y);
        self.raster.sample_bilinear(row_f, col_f)
    }
}

/// Clip both elevation rasters to the parcel set and difference them into a
/// non-negative height-above-ground surface aligned with the DSM grid.
pub fn build_height_model(dsm: &Raster, dtm: &Raster, parcels: &ParcelStore) -> Result<HeightModel> {
    // Parcels into the DSM frame; the DSM grid is the reference for the whole
    // height model.
    let to_dsm = Transformer::new(parcels.crs(), dsm.crs())?;
    let masks: Vec<_> = parcels
        .parcels()
        .iter()
        .map(|p| to_dsm.transform_polygon(&p.geometry))
        .collect::<Result<_>>()?;

    let dsm_clip = dsm.clip(&masks)?;
    info!(
        rows = dsm_clip.shape().0,
        cols = dsm_clip.shape().1,
        crs = %dsm_clip.crs(),
        "clipped surface raster"
    );

    // The DTM is clipped on its own native grid first, then resampled onto
    // the DSM clip. Clipping in the DTM frame needs the parcels there too.
    let to_dtm = Transformer::new(parcels.crs(), dtm.crs())?;
    let dtm_masks: Vec<_> = parcels
        .parcels()
        .iter()
        .map(|p| to_dtm.transform_polygon(&p.geometry))
        .collect::<Result<_>>()?;
    let dtm_clip = dtm.clip(&dtm_masks)?;
    debug!(
        rows = dtm_clip.shape().0,
        cols = dtm_clip.shape().1,
        "clipped terrain raster"
    );

    let dtm_resampled = dtm_clip.resample_onto(&dsm_clip)?;

    let (rows, cols) = dsm_clip.shape();
    let mut height = Array2::<f64>::from_elem((rows, cols), f64::NAN);
    for row in 0..rows {
        for col in 0..cols {
            let surface = dsm_clip.data()[[row, col]];
            let terrain = dtm_resampled[[row, col]];
            let diff = surface - terrain;
            // f64::max would swallow NaN; masked pixels must stay nodata.
            height[[row, col]] = if diff.is_nan() { f64::NAN } else { diff.max(0.0) };
        }
    }

    let raster = Raster::new(height, dsm_clip.transform(), dsm_clip.crs())?;
    info!(rows, cols, "height model built");
    Ok(HeightModel { raster })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::Crs;
    use crate::parcel::{Parcel, ParcelAttributes, ParcelStore};
    use geo::polygon;

    fn flat_raster(rows: usize, cols: usize, value: f64) -> Raster {
        let t = GridTransform::north_up(0.0, rows as f64, 1.0, 1.0).unwrap();
        Raster::new(Array2::from_elem((rows, cols), value), t, Crs(32643)).unwrap()
    }

    fn one_parcel_store() -> ParcelStore {
        let geometry = polygon![
            (x: 1.0, y: 1.0),
            (x: 9.0, y: 1.0),
            (x: 9.0, y: 9.0),
            (x: 1.0, y: 9.0),
        ];
        ParcelStore::new(
            vec![Parcel::new(0, geometry, ParcelAttributes::new(10.0, 0.0))],
            Crs(32643),
        )
    }

    #[test]
    fn test_identical_rasters_yield_zero_heights() {
        let dsm = flat_raster(10, 10, 412.0);
        let dtm = flat_raster(10, 10, 412.0);
        let model = build_height_model(&dsm, &dtm, &one_parcel_store()).unwrap();
        for v in model.raster().data().iter().filter(|v| !v.is_nan()) {
            assert_eq!(*v, 0.0);
        }
        // Some pixels must actually be covered.
        assert!(model.raster().data().iter().any(|v| !v.is_nan()));
    }

    #[test]
    fn test_surface_below_terrain_clamps_to_zero() {
        // Sensor noise: DSM reads 1.5m below DTM everywhere.
        let dsm = flat_raster(10, 10, 410.5);
        let dtm = flat_raster(10, 10, 412.0);
        let model = build_height_model(&dsm, &dtm, &one_parcel_store()).unwrap();
        for v in model.raster().data().iter().filter(|v| !v.is_nan()) {
            assert_eq!(*v, 0.0, "negative difference must clamp to zero");
        }
    }

    #[test]
    fn test_masked_pixels_stay_nan_through_clamp() {
        // DSM below DTM everywhere, so the zero clamp is active for every
        // covered pixel. Pixels outside the parcel mask must come out NaN,
        // not clamped to 0.
        let dsm = flat_raster(10, 10, 410.5);
        let dtm = flat_raster(10, 10, 412.0);
        let model = build_height_model(&dsm, &dtm, &one_parcel_store()).unwrap();
        let data = model.raster().data();

        // The parcel spans (1,1)-(9,9); the clip window keeps the full grid,
        // so the corner pixel center (0.5, 9.5) lies outside the mask.
        assert!(data[[0, 0]].is_nan(), "masked pixel must stay nodata");
        assert!(data.iter().any(|v| v.is_nan()));
        assert!(
            data.iter().filter(|v| !v.is_nan()).all(|v| *v == 0.0),
            "covered pixels clamp to zero, masked ones never do"
        );
    }

    #[test]
    fn test_structure_height_survives_differencing() {
        let dsm = flat_raster(10, 10, 420.0);
        let dtm = flat_raster(10, 10, 412.0);
        let model = build_height_model(&dsm, &dtm, &one_parcel_store()).unwrap();
        let h = model.height_at(5.0, 5.0);
        assert!((h - 8.0).abs() < 1e-9, "got {h}");
    }

    #[test]
    fn test_disjoint_parcels_signal_no_coverage() {
        let dsm = flat_raster(10, 10, 420.0);
        let dtm = flat_raster(10, 10, 412.0);
        let far = polygon![
            (x: 900.0, y: 900.0),
            (x: 950.0, y: 900.0),
            (x: 950.0, y: 950.0),
            (x: 900.0, y: 950.0),
        ];
        let store = ParcelStore::new(
            vec![Parcel::new(7, far, ParcelAttributes::new(10.0, 0.0))],
            Crs(32643),
        );
        let err = build_height_model(&dsm, &dtm, &store).unwrap_err();
        assert!(err.is_no_coverage(), "got {err:?}");
    }
}
