//! Single-band raster grids with affine georeferencing
//!
//! A `Raster` is a row-major `f64` array plus the affine transform mapping
//! pixel space to world space and the CRS those world coordinates live in.
//! `f64::NAN` is the nodata sentinel; masking and out-of-coverage sampling
//! produce NaN, and bilinear interpolation propagates it (any void neighbor
//! poisons the sample).
//!
//! Transform convention follows the usual affine layout:
//! `x = a*col + b*row + c`, `y = d*col + e*row + f`, with (col, row) measured
//! at pixel centers via the half-pixel offset.

use geo::{BoundingRect, Contains, Point, Polygon, Rect};
use ndarray::Array2;

use crate::crs::{Crs, Transformer};
use crate::error::{Error, Result};

/// Affine pixel-to-world mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl GridTransform {
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Result<Self> {
        let t = Self { a, b, c, d, e, f };
        if ![a, b, c, d, e, f].iter().all(|v| v.is_finite()) {
            return Err(Error::malformed("non-finite geotransform coefficient"));
        }
        if t.det().abs() < f64::EPSILON {
            return Err(Error::malformed("singular geotransform"));
        }
        Ok(t)
    }

    /// Standard north-up grid: square-ish pixels, no rotation, origin at the
    /// upper-left corner. `pixel_h` is the positive pixel height; the y step
    /// is negative because rows grow southward.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_w: f64, pixel_h: f64) -> Result<Self> {
        Self::new(pixel_w, 0.0, origin_x, 0.0, -pixel_h, origin_y)
    }

    fn det(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }

    /// World coordinates of the center of pixel (row, col).
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        let cf = col as f64 + 0.5;
        let rf = row as f64 + 0.5;
        (
            self.a * cf + self.b * rf + self.c,
            self.d * cf + self.e * rf + self.f,
        )
    }

    /// Fractional pixel coordinates (row_f, col_f) of a world point, in the
    /// pixel-center convention: (0.0, 0.0) is the center of the top-left
    /// pixel.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.det();
        let dx = x - self.c;
        let dy = y - self.f;
        let col = (self.e * dx - self.b * dy) / det;
        let row = (self.a * dy - self.d * dx) / det;
        (row - 0.5, col - 0.5)
    }

    /// Translate the origin to the center convention used when cropping:
    /// the transform of a sub-window starting at (row0, col0).
    pub fn window(&self, row0: usize, col0: usize) -> Self {
        Self {
            c: self.a * col0 as f64 + self.b * row0 as f64 + self.c,
            f: self.d * col0 as f64 + self.e * row0 as f64 + self.f,
            ..*self
        }
    }
}

/// A georeferenced single-band raster.
#[derive(Debug, Clone)]
pub struct Raster {
    data: Array2<f64>,
    transform: GridTransform,
    crs: Crs,
}

impl Raster {
    /// Wrap an array with its georeferencing. Zero-size arrays are the
    /// "raster with no bands" structural defect and are rejected here.
    pub fn new(data: Array2<f64>, transform: GridTransform, crs: Crs) -> Result<Self> {
        if data.nrows() == 0 || data.ncols() == 0 {
            return Err(Error::malformed("raster has zero-size band"));
        }
        Ok(Self {
            data,
            transform,
            crs,
        })
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn transform(&self) -> GridTransform {
        self.transform
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.data.nrows(), self.data.ncols())
    }

    /// World-space bounding rectangle of the full grid.
    pub fn extent(&self) -> Rect<f64> {
        let (rows, cols) = self.shape();
        let t = self.transform;
        let corners = [
            (t.c, t.f),
            (t.a * cols as f64 + t.c, t.d * cols as f64 + t.f),
            (t.b * rows as f64 + t.c, t.e * rows as f64 + t.f),
            (
                t.a * cols as f64 + t.b * rows as f64 + t.c,
                t.d * cols as f64 + t.e * rows as f64 + t.f,
            ),
        ];
        let min_x = corners.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let max_x = corners.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
        let min_y = corners.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let max_y = corners.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
        Rect::new((min_x, min_y), (max_x, max_y))
    }

    /// Clip to a polygon set: crop to the polygons' bounding window and mask
    /// out pixels whose center falls in none of the polygons.
    ///
    /// The polygons must already be in this raster's CRS; harmonizing is the
    /// caller's job and is deliberately not hidden here.
    ///
    /// Returns `Error::NoCoverage` when the polygon set is empty or entirely
    /// disjoint from the grid - an empty clip is a distinct condition, not a
    /// degenerate raster.
    pub fn clip(&self, polygons: &[Polygon<f64>]) -> Result<Raster> {
        let mut bounds: Option<Rect<f64>> = None;
        for poly in polygons {
            if let Some(r) = poly.bounding_rect() {
                bounds = Some(match bounds {
                    None => r,
                    Some(acc) => Rect::new(
                        (acc.min().x.min(r.min().x), acc.min().y.min(r.min().y)),
                        (acc.max().x.max(r.max().x), acc.max().y.max(r.max().y)),
                    ),
                });
            }
        }
        let bounds = bounds.ok_or(Error::NoCoverage)?;

        let ext = self.extent();
        if bounds.min().x > ext.max().x
            || bounds.max().x < ext.min().x
            || bounds.min().y > ext.max().y
            || bounds.max().y < ext.min().y
        {
            return Err(Error::NoCoverage);
        }

        let (rows, cols) = self.shape();

        // Corner-based pixel window of the bounding rect.
        let corners = [
            self.transform.world_to_pixel(bounds.min().x, bounds.min().y),
            self.transform.world_to_pixel(bounds.min().x, bounds.max().y),
            self.transform.world_to_pixel(bounds.max().x, bounds.min().y),
            self.transform.world_to_pixel(bounds.max().x, bounds.max().y),
        ];
        let row_min = corners.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let row_max = corners.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
        let col_min = corners.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let col_max = corners.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);

        let r0 = row_min.floor().max(0.0) as usize;
        let c0 = col_min.floor().max(0.0) as usize;
        let r1 = (row_max.ceil() + 1.0).min(rows as f64) as usize;
        let c1 = (col_max.ceil() + 1.0).min(cols as f64) as usize;

        if row_max < 0.0 || col_max < 0.0 || r0 >= rows || c0 >= cols || r0 >= r1 || c0 >= c1 {
            return Err(Error::NoCoverage);
        }

        let mut clipped = Array2::<f64>::from_elem((r1 - r0, c1 - c0), f64::NAN);
        let window = self.transform.window(r0, c0);

        for row in 0..(r1 - r0) {
            for col in 0..(c1 - c0) {
                let (x, y) = window.pixel_center(row, col);
                let center = Point::new(x, y);
                if polygons.iter().any(|p| p.contains(&center)) {
                    clipped[[row, col]] = self.data[[r0 + row, c0 + col]];
                }
            }
        }

        Raster::new(clipped, window, self.crs)
    }

    /// Bilinear sample at fractional pixel coordinates. NaN when the 2x2
    /// neighborhood leaves the grid or touches a nodata pixel.
    pub fn sample_bilinear(&self, row_f: f64, col_f: f64) -> f64 {
        let (rows, cols) = self.shape();
        if rows < 2 || cols < 2 {
            // Degenerate 1xN grids: nearest neighbor is the best we can do.
            let r = row_f.round();
            let c = col_f.round();
            if r < 0.0 || c < 0.0 || r as usize >= rows || c as usize >= cols {
                return f64::NAN;
            }
            return self.data[[r as usize, c as usize]];
        }

        if row_f < -0.5 || col_f < -0.5 || row_f > rows as f64 - 0.5 || col_f > cols as f64 - 0.5 {
            return f64::NAN;
        }

        // Clamp to keep a full 2x2 cell at the edges, as the SRTM sampler
        // does at tile boundaries.
        let row_f = row_f.clamp(0.0, (rows - 1) as f64);
        let col_f = col_f.clamp(0.0, (cols - 1) as f64);

        let r0 = (row_f.floor() as usize).min(rows - 2);
        let c0 = (col_f.floor() as usize).min(cols - 2);
        let dr = row_f - r0 as f64;
        let dc = col_f - c0 as f64;

        let v00 = self.data[[r0, c0]];
        let v01 = self.data[[r0, c0 + 1]];
        let v10 = self.data[[r0 + 1, c0]];
        let v11 = self.data[[r0 + 1, c0 + 1]];

        let top = v00 + (v01 - v00) * dc;
        let bot = v10 + (v11 - v10) * dc;
        top + (bot - top) * dr
    }

    /// Resample this raster onto another raster's exact grid (shape,
    /// transform and CRS), bilinear. Sample points are reprojected when the
    /// two rasters disagree on CRS - never silently assumed equal.
    pub fn resample_onto(&self, grid: &Raster) -> Result<Array2<f64>> {
        let (rows, cols) = grid.shape();
        let mut out = Array2::<f64>::from_elem((rows, cols), f64::NAN);
        let to_source = Transformer::new(grid.crs(), self.crs())?;

        for row in 0..rows {
            for col in 0..cols {
                let (x, y) = grid.transform.pixel_center(row, col);
                let (sx, sy) = to_source.transform(x, y)?;
                let (row_f, col_f) = self.transform.world_to_pixel(sx, sy);
                out[[row, col]] = self.sample_bilinear(row_f, col_f);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn make_raster(rows: usize, cols: usize, fill: impl Fn(usize, usize) -> f64) -> Raster {
        let data = Array2::from_shape_fn((rows, cols), |(r, c)| fill(r, c));
        // 1m pixels, origin at (0, rows) so y decreases with row.
        let t = GridTransform::north_up(0.0, rows as f64, 1.0, 1.0).unwrap();
        Raster::new(data, t, Crs(32643)).unwrap()
    }

    #[test]
    fn test_zero_size_raster_rejected() {
        let t = GridTransform::north_up(0.0, 0.0, 1.0, 1.0).unwrap();
        match Raster::new(Array2::zeros((0, 4)), t, Crs(32643)) {
            Err(Error::MalformedInput(_)) => {}
            other => panic!("expected MalformedInput, got {other:?}"),
        }
    }

    #[test]
    fn test_singular_transform_rejected() {
        match GridTransform::new(1.0, 0.0, 0.0, 2.0, 0.0, 0.0) {
            Err(Error::MalformedInput(_)) => {}
            other => panic!("expected MalformedInput, got {other:?}"),
        }
    }

    #[test]
    fn test_extent_spans_grid_corners() {
        let r = make_raster(10, 8, |_, _| 0.0);
        let ext = r.extent();
        assert_eq!(ext.min().x, 0.0);
        assert_eq!(ext.max().x, 8.0);
        assert_eq!(ext.min().y, 0.0);
        assert_eq!(ext.max().y, 10.0);
    }

    #[test]
    fn test_pixel_center_roundtrip() {
        let t = GridTransform::north_up(1000.0, 2000.0, 2.5, 2.5).unwrap();
        let (x, y) = t.pixel_center(3, 7);
        let (row_f, col_f) = t.world_to_pixel(x, y);
        assert!((row_f - 3.0).abs() < 1e-12);
        assert!((col_f - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_clip_masks_outside_pixels() {
        let r = make_raster(10, 10, |_, _| 7.0);
        // Covers pixel centers with x in (2, 5) and y in (2, 5).
        let poly: Polygon<f64> = polygon![
            (x: 2.0, y: 2.0),
            (x: 5.0, y: 2.0),
            (x: 5.0, y: 5.0),
            (x: 2.0, y: 5.0),
        ];
        let clipped = r.clip(std::slice::from_ref(&poly)).unwrap();
        let inside = clipped.data().iter().filter(|v| !v.is_nan()).count();
        assert_eq!(inside, 9, "3x3 pixel centers fall inside");
        assert!(clipped.data().iter().any(|v| v.is_nan()));
    }

    #[test]
    fn test_clip_disjoint_is_no_coverage() {
        let r = make_raster(10, 10, |_, _| 1.0);
        let poly: Polygon<f64> = polygon![
            (x: 500.0, y: 500.0),
            (x: 510.0, y: 500.0),
            (x: 510.0, y: 510.0),
            (x: 500.0, y: 510.0),
        ];
        match r.clip(std::slice::from_ref(&poly)) {
            Err(Error::NoCoverage) => {}
            other => panic!("expected NoCoverage, got {other:?}"),
        }
    }

    #[test]
    fn test_clip_empty_polygon_set_is_no_coverage() {
        let r = make_raster(4, 4, |_, _| 1.0);
        match r.clip(&[]) {
            Err(Error::NoCoverage) => {}
            other => panic!("expected NoCoverage, got {other:?}"),
        }
    }

    #[test]
    fn test_bilinear_interpolates_gradient() {
        // Value equals column index: halfway between col 2 and 3 is 2.5.
        let r = make_raster(4, 4, |_, c| c as f64);
        let v = r.sample_bilinear(1.0, 2.5);
        assert!((v - 2.5).abs() < 1e-12, "got {v}");
    }

    #[test]
    fn test_bilinear_nan_neighbor_poisons() {
        let mut r = make_raster(4, 4, |_, c| c as f64);
        r.data[[1, 2]] = f64::NAN;
        assert!(r.sample_bilinear(1.2, 2.2).is_nan());
    }

    #[test]
    fn test_bilinear_outside_grid_is_nan() {
        let r = make_raster(4, 4, |_, _| 1.0);
        assert!(r.sample_bilinear(-2.0, 1.0).is_nan());
        assert!(r.sample_bilinear(1.0, 9.0).is_nan());
    }

    #[test]
    fn test_resample_identity_grid_reproduces_values() {
        let r = make_raster(5, 5, |row, c| (row * 10 + c) as f64);
        let out = r.resample_onto(&r).unwrap();
        for row in 0..5 {
            for col in 0..5 {
                assert!((out[[row, col]] - r.data[[row, col]]).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_resample_coarser_grid() {
        // Source: 10x10 at 1m; target: 5x5 at 2m over the same extent.
        let src = make_raster(10, 10, |_, c| c as f64);
        let t = GridTransform::north_up(0.0, 10.0, 2.0, 2.0).unwrap();
        let grid = Raster::new(Array2::zeros((5, 5)), t, Crs(32643)).unwrap();
        let out = src.resample_onto(&grid).unwrap();
        // Target pixel (r, 0) center sits at x=1.0 => source col_f 0.5 => 0.5.
        assert!((out[[2, 0]] - 0.5).abs() < 1e-9, "got {}", out[[2, 0]]);
    }
}
