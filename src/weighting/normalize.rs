/// Min-max scaling.

/// Why a sequence could not be rescaled.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScaleError {
    #[error("cannot scale an empty sequence")]
    Empty,
    #[error("value at position {index} is not finite")]
    NonFinite { index: usize },
    /// `max == min`: the scaling denominator is zero.
    #[error("all values equal {value}; scaling denominator is zero")]
    Degenerate { value: f64 },
}

/// Rescales `values` to [0, 1] with `(v - min) / (max - min)`.
///
/// The minimum maps to exactly 0 and the maximum to exactly 1. An all-equal
/// input (including a single value) is reported as `ScaleError::Degenerate`
/// instead of producing NaN.
pub fn min_max(values: &[f64]) -> Result<Vec<f64>, ScaleError> {
    if values.is_empty() {
        return Err(ScaleError::Empty);
    }
    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(ScaleError::NonFinite { index });
    }

    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    let range = max - min;
    if range == 0.0 {
        return Err(ScaleError::Degenerate { value: min });
    }

    Ok(values
        .iter()
        .map(|&v| {
            if v == max {
                1.0
            } else {
                (v - min) / range
            }
        })
        .collect())
}
