//! Coordinate reference system handling
//!
//! Every cross-source geometric or raster operation in this crate reprojects
//! into a common frame explicitly; nothing ever assumes two datasets share a
//! CRS. Transforms go through proj4rs (pure Rust, no native libproj), behind
//! a small `Transformer` wrapper that owns the degree/radian convention:
//! proj4rs expects geographic coordinates in radians, while all public APIs
//! in this crate speak degrees for geographic CRSs and meters for projected
//! ones.

use geo::{MapCoords, MultiPolygon, Polygon};
use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// WGS84 geographic longitude/latitude.
pub const WGS84: Crs = Crs(4326);

/// A coordinate reference system identified by EPSG code.
///
/// Supported codes: 4326 (WGS84 lon/lat), 3857 (Web Mercator) and the WGS84
/// UTM zones 32601-32660 (north) / 32701-32760 (south). Anything else is
/// rejected at `Transformer` construction with `Error::UnsupportedCrs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs(pub u32);

impl Crs {
    /// True if coordinates in this CRS are degrees rather than meters.
    pub fn is_geographic(&self) -> bool {
        self.0 == 4326
    }

    /// True if distances in this CRS are meters, i.e. buffering by a metric
    /// setback distance is meaningful.
    pub fn is_metric(&self) -> bool {
        !self.is_geographic()
    }

    fn proj_string(&self) -> Result<String> {
        match self.0 {
            4326 => Ok("+proj=longlat +datum=WGS84 +no_defs".to_string()),
            3857 => Ok(
                "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs"
                    .to_string(),
            ),
            32601..=32660 => Ok(format!(
                "+proj=utm +zone={} +datum=WGS84 +units=m +no_defs",
                self.0 - 32600
            )),
            32701..=32760 => Ok(format!(
                "+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs",
                self.0 - 32700
            )),
            other => Err(Error::UnsupportedCrs(other)),
        }
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// Reusable point transformer between two CRSs.
///
/// Identity pairs short-circuit without touching proj4rs, so callers can
/// unconditionally harmonize without paying for the no-op case.
pub struct Transformer {
    inner: Option<ProjPair>,
    source: Crs,
    target: Crs,
}

struct ProjPair {
    source_proj: Proj,
    target_proj: Proj,
    source_is_geographic: bool,
    target_is_geographic: bool,
}

impl Transformer {
    pub fn new(source: Crs, target: Crs) -> Result<Self> {
        if source == target {
            // Still validate the code so an unsupported identity pair fails
            // loudly instead of at first real use.
            source.proj_string()?;
            return Ok(Self {
                inner: None,
                source,
                target,
            });
        }

        let source_proj = Proj::from_proj_string(&source.proj_string()?)
            .map_err(|e| Error::Projection(format!("{source}: {e:?}")))?;
        let target_proj = Proj::from_proj_string(&target.proj_string()?)
            .map_err(|e| Error::Projection(format!("{target}: {e:?}")))?;

        Ok(Self {
            inner: Some(ProjPair {
                source_proj,
                target_proj,
                source_is_geographic: source.is_geographic(),
                target_is_geographic: target.is_geographic(),
            }),
            source,
            target,
        })
    }

    pub fn source(&self) -> Crs {
        self.source
    }

    pub fn target(&self) -> Crs {
        self.target
    }

    /// Transform a single coordinate from the source to the target CRS.
    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let Some(pair) = &self.inner else {
            return Ok((x, y));
        };

        let (in_x, in_y) = if pair.source_is_geographic {
            (x.to_radians(), y.to_radians())
        } else {
            (x, y)
        };

        let mut point = (in_x, in_y, 0.0);
        transform(&pair.source_proj, &pair.target_proj, &mut point)
            .map_err(|e| Error::Projection(format!("({x}, {y}): {e:?}")))?;

        if pair.target_is_geographic {
            Ok((point.0.to_degrees(), point.1.to_degrees()))
        } else {
            Ok((point.0, point.1))
        }
    }

    /// Reproject a polygon, coordinate by coordinate.
    pub fn transform_polygon(&self, polygon: &Polygon<f64>) -> Result<Polygon<f64>> {
        polygon.try_map_coords(|c| {
            let (x, y) = self.transform(c.x, c.y)?;
            Ok(geo::Coord { x, y })
        })
    }

    /// Reproject a multipolygon, coordinate by coordinate.
    pub fn transform_multi_polygon(&self, mp: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        mp.try_map_coords(|c| {
            let (x, y) = self.transform(c.x, c.y)?;
            Ok(geo::Coord { x, y })
        })
    }
}
