/// Geometry validation for point sets entering the weight engine.

use std::collections::HashSet;

use crate::model::{WeightingError, WellPoint};

/// Longitude bound for geographic coordinates.
pub const MAX_ABS_LONGITUDE: f64 = 180.0;

/// Latitude bound for geographic coordinates.
pub const MAX_ABS_LATITUDE: f64 = 90.0;

/// Returns `true` if the point is flagged valid and its coordinates are
/// finite geographic longitude/latitude.
pub fn has_valid_geometry(point: &WellPoint) -> bool {
    point.geometry_valid
        && point.x.is_finite()
        && point.y.is_finite()
        && point.x.abs() <= MAX_ABS_LONGITUDE
        && point.y.abs() <= MAX_ABS_LATITUDE
}

/// Drops records with invalid geometry, preserving input order.
///
/// Returns `WeightingError::NoData` when nothing survives. Ids of survivors
/// must be unique; a repeat fails with `WeightingError::DuplicateId`.
pub fn filter_valid(points: &[WellPoint]) -> Result<Vec<WellPoint>, WeightingError> {
    let valid: Vec<WellPoint> = points
        .iter()
        .filter(|p| has_valid_geometry(p))
        .cloned()
        .collect();

    if valid.is_empty() {
        return Err(WeightingError::NoData);
    }

    let mut seen = HashSet::with_capacity(valid.len());
    for point in &valid {
        if !seen.insert(point.id.as_str()) {
            return Err(WeightingError::DuplicateId(point.id.clone()));
        }
    }

    Ok(valid)
}
