/// Declustering weight engine.
///
/// Given a point set of wells with observation counts, computes each well's
/// nearest-neighbor distance, its min-max normalized density, and a composite
/// weight that balances spatial isolation against the number of yearly
/// measurements.
///
/// Submodules:
/// - `validate`: geometry filter and id uniqueness.
/// - `kdtree`: static spatial index.
/// - `nearest`: nearest distinct neighbor distances.
/// - `normalize`: min-max scaling.
/// - `compose`: composite weight shares.

pub mod compose;
pub mod kdtree;
pub mod nearest;
pub mod normalize;
pub mod validate;

use serde::{Deserialize, Serialize};

use crate::logging::{self, Stage};
use crate::model::{ScaleStage, WeightedWell, WeightingError, WellPoint};
use normalize::ScaleError;

pub use nearest::DEFAULT_ISOLATION_SENTINEL;

/// Density used for every well when all nearest-neighbor distances are equal.
pub const UNIFORM_DENSITY: f64 = 0.0;

/// Weight used for every well when all shares are equal.
pub const UNIFORM_WEIGHT: f64 = 1.0;

/// What to do when a min-max scaling step has a zero denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegeneratePolicy {
    /// Return `WeightingError::DegenerateScale`.
    Fail,
    /// Substitute `UNIFORM_DENSITY` or `UNIFORM_WEIGHT` and record the fallback.
    #[default]
    Uniform,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightingOptions {
    pub isolation_sentinel: f64,
    pub degenerate_policy: DegeneratePolicy,
}

impl Default for WeightingOptions {
    fn default() -> Self {
        Self {
            isolation_sentinel: DEFAULT_ISOLATION_SENTINEL,
            degenerate_policy: DegeneratePolicy::Uniform,
        }
    }
}

/// A degenerate scaling step that was replaced by a uniform value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScaleFallback {
    pub stage: ScaleStage,
    /// The value every input shared.
    pub shared_value: f64,
    /// The value substituted for every output.
    pub substituted: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeightingOutcome {
    /// Surviving wells in input order.
    pub wells: Vec<WeightedWell>,
    /// Records removed by geometry validation.
    pub dropped_invalid: usize,
    pub fallbacks: Vec<ScaleFallback>,
}

/// Runs the full engine over `points`.
///
/// The input is not modified; running twice on the same input yields the
/// same weights.
pub fn compute_weights(
    points: &[WellPoint],
    options: &WeightingOptions,
) -> Result<WeightingOutcome, WeightingError> {
    let valid = validate::filter_valid(points)?;
    let dropped_invalid = points.len() - valid.len();
    if dropped_invalid > 0 {
        logging::warn(
            Stage::Weighting,
            None,
            &format!("dropped {} of {} wells with invalid geometry", dropped_invalid, points.len()),
        );
    }

    let distances = nearest::nearest_neighbor_distances(&valid, options.isolation_sentinel)
        .inspect_err(|e| logging::error(Stage::Weighting, None, &e.to_string()))?;

    let mut fallbacks = Vec::new();

    let density = scale_or_fallback(
        &distances,
        ScaleStage::Density,
        UNIFORM_DENSITY,
        options.degenerate_policy,
        &mut fallbacks,
    )?;

    let counts: Vec<u32> = valid.iter().map(|p| p.observation_count).collect();
    let shares = compose::weight_shares(&density, &counts)?;

    let weights = scale_or_fallback(
        &shares,
        ScaleStage::Weight,
        UNIFORM_WEIGHT,
        options.degenerate_policy,
        &mut fallbacks,
    )?;

    let wells = valid
        .into_iter()
        .enumerate()
        .map(|(i, p)| WeightedWell {
            id: p.id,
            x: p.x,
            y: p.y,
            observation_count: p.observation_count,
            nearest_neighbor_distance: distances[i],
            normalized_density: density[i],
            share: shares[i],
            weight: weights[i],
        })
        .collect::<Vec<_>>();

    logging::info(
        Stage::Weighting,
        None,
        &format!("computed declustering weights for {} wells", wells.len()),
    );

    Ok(WeightingOutcome {
        wells,
        dropped_invalid,
        fallbacks,
    })
}

fn scale_or_fallback(
    values: &[f64],
    stage: ScaleStage,
    uniform: f64,
    policy: DegeneratePolicy,
    fallbacks: &mut Vec<ScaleFallback>,
) -> Result<Vec<f64>, WeightingError> {
    match normalize::min_max(values) {
        Ok(scaled) => Ok(scaled),
        Err(ScaleError::Degenerate { value }) => match policy {
            DegeneratePolicy::Fail => Err(WeightingError::DegenerateScale { stage, value }),
            DegeneratePolicy::Uniform => {
                logging::warn(
                    Stage::Weighting,
                    None,
                    &format!(
                        "all {} values equal {}; using uniform {} of {}",
                        stage, value, stage, uniform
                    ),
                );
                fallbacks.push(ScaleFallback {
                    stage,
                    shared_value: value,
                    substituted: uniform,
                });
                Ok(vec![uniform; values.len()])
            }
        },
        Err(ScaleError::Empty) => Err(WeightingError::NoData),
        Err(ScaleError::NonFinite { .. }) => Err(WeightingError::NonFiniteValue { stage }),
    }
}
