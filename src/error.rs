//! Error types for the ordinance analysis library
//!
//! The taxonomy keeps three failure families apart so callers can react to
//! each differently:
//!
//! - `NoCoverage` - a valid-but-empty geometric result (clip window outside
//!   the raster, disjoint parcel set). Not a malfunction; downstream code may
//!   treat it as "nothing to evaluate".
//! - `MalformedInput` - structural defects in a single input (zero-size
//!   raster, singular geotransform, non-finite coordinates). Aborts the
//!   affected operation.
//! - CRS errors (`UnsupportedCrs`, `Projection`) - always fatal; a cross-CRS
//!   comparison must never proceed on unprojected coordinates.
//!
//! Record-level sparsity (an unresolvable node reference, a missing height
//! tag) is *not* an error: those are recovered locally by skipping the record
//! or falling back to "unknown".

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The requested area does not overlap the available raster coverage.
    #[error("no raster coverage over the requested area")]
    NoCoverage,

    /// Structurally invalid input that aborts the affected operation.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// EPSG code outside the supported set (4326, 3857, WGS84 UTM zones).
    #[error("unsupported CRS: EPSG:{0}")]
    UnsupportedCrs(u32),

    /// Projection setup or coordinate transform failure.
    #[error("projection failed: {0}")]
    Projection(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for the empty-but-valid outcome, which callers often want to
    /// treat as "no work to do" rather than a failure.
    pub fn is_no_coverage(&self) -> bool {
        matches!(self, Error::NoCoverage)
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedInput(msg.into())
    }
}
