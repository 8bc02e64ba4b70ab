//! Zoning-ordinance compliance analysis
//!
//! Detects building-code violations - excess height and setback encroachment -
//! by combining two elevation rasters (surface and terrain models), building
//! footprints reconstructed from raw node/way topology, and zoning parcels
//! carrying a maximum height and a mandatory setback.
//!
//! The crate is the analysis core only. File readers (shapefile, GeoTIFF,
//! JSON extracts) and map rendering live outside; the core takes parsed
//! arrays, georeferencing and records, and emits annotated
//! [`JoinRecord`](join::JoinRecord)s plus a supporting height-above-ground
//! raster.
//!
//! ```no_run
//! use ordinance::{run_analysis, AnalysisConfig, AnalysisInput};
//!
//! # fn load() -> AnalysisInput { unimplemented!() }
//! let input = load(); // from the I/O layer
//! let output = run_analysis(input, &AnalysisConfig::default()).unwrap();
//! for record in output.records.iter().filter(|r| r.violation_type.is_violation()) {
//!     println!("{}: {}", record.building.way_id, record.violation_type);
//! }
//! ```

pub mod classify;
pub mod config;
pub mod crs;
pub mod error;
pub mod footprint;
pub mod height;
pub mod join;
pub mod parcel;
pub mod pipeline;
pub mod raster;

pub use classify::ViolationType;
pub use config::AnalysisConfig;
pub use crs::{Crs, Transformer, WGS84};
pub use error::{Error, Result};
pub use footprint::{Building, WayRecord};
pub use height::HeightModel;
pub use join::JoinRecord;
pub use parcel::{Parcel, ParcelAttributes, ParcelStore};
pub use pipeline::{run_analysis, AnalysisInput, AnalysisOutput};
pub use raster::{GridTransform, Raster};
