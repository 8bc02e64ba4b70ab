//! Violation classification
//!
//! Pure and total: the categorical outcome is a function of exactly two
//! booleans. The only policy decision lives in the height check - a building
//! with unknown height can never be proven in violation, so unknown never
//! violates. That default is deliberate and encoded here, not implied by a
//! falsy value somewhere upstream.

use serde::{Deserialize, Serialize};

use crate::footprint::Building;
use crate::parcel::Parcel;

/// Categorical compliance outcome for one building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationType {
    None,
    Height,
    Boundary,
    Both,
}

impl ViolationType {
    /// Truth table over (height_violation, boundary_violation).
    pub fn from_flags(height_violation: bool, boundary_violation: bool) -> Self {
        match (height_violation, boundary_violation) {
            (true, true) => ViolationType::Both,
            (true, false) => ViolationType::Height,
            (false, true) => ViolationType::Boundary,
            (false, false) => ViolationType::None,
        }
    }

    pub fn is_violation(&self) -> bool {
        !matches!(self, ViolationType::None)
    }
}

impl std::fmt::Display for ViolationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ViolationType::None => "None",
            ViolationType::Height => "Height",
            ViolationType::Boundary => "Boundary",
            ViolationType::Both => "Both",
        };
        f.write_str(s)
    }
}

/// `height > max_height`, with unknown height never violating.
pub fn height_violation(building: &Building, parcel: &Parcel) -> bool {
    match building.height {
        Some(h) => h > parcel.attributes.max_height,
        None => false,
    }
}
