/// Core data types for the GEOWAT well processing toolkit.
///
/// This module defines the shared domain model imported by all other modules:
/// the raw rows queried from the database, the per-well summaries built from
/// them, and the point records consumed and produced by the declustering
/// weight engine. It contains no I/O.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Database rows
// ---------------------------------------------------------------------------

/// One yearly groundwater head record from `_gwh_yearly_tb`.
///
/// Heads are stored in centimetres below surface level so the database can
/// keep them as integers.
#[derive(Debug, Clone, PartialEq)]
pub struct YearlyHead {
    pub id_gerbil: i64,
    pub year: i32,
    pub gw_head_cm: Option<f64>,
}

/// Well metadata from `_lookup_tb`.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupRecord {
    pub id_gerbil: i64,
    pub id_orig_src: Option<String>,
    pub x_wgs84: Option<f64>,
    pub y_wgs84: Option<f64>,
    pub orig_elev_m_asl: Option<f64>,
    pub glo90_elev_m_asl: Option<f64>,
}

// ---------------------------------------------------------------------------
// Per-well summaries
// ---------------------------------------------------------------------------

/// Yearly heads collapsed to one row per well.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadAggregate {
    pub id_gerbil: i64,
    /// Mean head in metres; `None` when every yearly head was null.
    pub mean_gwh_m: Option<f64>,
    /// Number of yearly records, null heads included.
    pub n_years: u32,
}

/// A well with its aggregated heads, lookup metadata and lithology.
#[derive(Debug, Clone, PartialEq)]
pub struct WellSummary {
    pub id_gerbil: i64,
    pub id_orig_src: Option<String>,
    pub x_wgs84: Option<f64>,
    pub y_wgs84: Option<f64>,
    pub orig_elev_m_asl: Option<f64>,
    pub glo90_elev_m_asl: Option<f64>,
    pub mean_gwh_m: Option<f64>,
    pub n_years: u32,
    /// GLiM code sampled at the well location, `None` for no data.
    pub glim_raw: Option<i32>,
    /// Reclassified lithology, -1 when undefined.
    pub litho_class: i32,
}

impl WellSummary {
    /// Coordinates, if both are present.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.x_wgs84, self.y_wgs84) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Weighting engine records
// ---------------------------------------------------------------------------

/// One observation site as seen by the declustering weight engine.
#[derive(Debug, Clone, PartialEq)]
pub struct WellPoint {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub observation_count: u32,
    pub geometry_valid: bool,
}

impl WellPoint {
    pub fn new(id: impl Into<String>, x: f64, y: f64, observation_count: u32) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            observation_count,
            geometry_valid: true,
        }
    }
}

impl From<&WellSummary> for WellPoint {
    fn from(well: &WellSummary) -> Self {
        let (x, y, geometry_valid) = match well.coordinates() {
            Some((x, y)) => (x, y, true),
            None => (f64::NAN, f64::NAN, false),
        };
        WellPoint {
            id: well.id_gerbil.to_string(),
            x,
            y,
            observation_count: well.n_years,
            geometry_valid,
        }
    }
}

/// A well annotated with its declustering attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedWell {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub observation_count: u32,
    pub nearest_neighbor_distance: f64,
    pub normalized_density: f64,
    /// Share of the total composite weight, before re-normalization.
    pub share: f64,
    pub weight: f64,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Which min-max scaling step of the engine hit an all-equal input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleStage {
    /// Scaling of nearest-neighbor distances into `normalized_density`.
    Density,
    /// Scaling of weight shares into the final `weight`.
    Weight,
}

impl fmt::Display for ScaleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleStage::Density => write!(f, "density"),
            ScaleStage::Weight => write!(f, "weight"),
        }
    }
}

/// Coarse classification of engine failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    DegenerateScale,
    Computation,
}

/// Errors raised by the declustering weight engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WeightingError {
    /// The point set was empty, or empty after dropping invalid geometry.
    #[error("no data: point set is empty after geometry validation")]
    NoData,
    /// Two valid records share an id.
    #[error("duplicate well id '{0}' in point set")]
    DuplicateId(String),
    /// Min-max scaling had a zero denominator and the policy is `fail`.
    #[error("degenerate {stage} scale: every value equals {value}")]
    DegenerateScale { stage: ScaleStage, value: f64 },
    /// The spatial index was given a coordinate it cannot order.
    #[error("non-finite coordinate for well '{id}'")]
    NonFiniteCoordinate { id: String },
    /// A scaling step was handed NaN or infinity.
    #[error("non-finite value entering {stage} scaling")]
    NonFiniteValue { stage: ScaleStage },
    /// All densities and observation counts were zero.
    #[error("composite weight total is zero (all densities and observation counts are zero)")]
    ZeroTotalWeight,
}

impl WeightingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WeightingError::NoData | WeightingError::DuplicateId(_) => ErrorKind::Input,
            WeightingError::DegenerateScale { .. } => ErrorKind::DegenerateScale,
            WeightingError::NonFiniteCoordinate { .. }
            | WeightingError::NonFiniteValue { .. }
            | WeightingError::ZeroTotalWeight => ErrorKind::Computation,
        }
    }
}
