/// Composite weight: spatial isolation plus data richness.

use crate::model::WeightingError;

/// Tolerance on `sum(share) == 1`.
pub const SHARE_SUM_TOLERANCE: f64 = 1e-9;

/// Returns each point's share of the total composite weight.
///
/// `raw[i] = normalized_density[i] + observation_count[i]` and
/// `share[i] = raw[i] / sum(raw)`. A zero total cannot be divided out and is
/// reported as `WeightingError::ZeroTotalWeight`.
pub fn weight_shares(
    normalized_density: &[f64],
    observation_counts: &[u32],
) -> Result<Vec<f64>, WeightingError> {
    debug_assert_eq!(normalized_density.len(), observation_counts.len());

    let raw: Vec<f64> = normalized_density
        .iter()
        .zip(observation_counts)
        .map(|(&d, &n)| d + f64::from(n))
        .collect();

    let total: f64 = raw.iter().sum();
    if total == 0.0 {
        return Err(WeightingError::ZeroTotalWeight);
    }

    let shares: Vec<f64> = raw.iter().map(|r| r / total).collect();
    debug_assert!((shares.iter().sum::<f64>() - 1.0).abs() <= SHARE_SUM_TOLERANCE);
    Ok(shares)
}
