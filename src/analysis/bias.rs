/// Bias between two well attributes, typically observed and simulated
/// mean groundwater head, and its empirical cumulative distribution.

use serde::Serialize;

use crate::export::Feature;
use crate::lithology;

/// Property written by `calculate_bias`.
pub const BIAS_FIELD: &str = "bias";

/// Property written by `reclassify_glim`.
pub const RECLASSIFIED_GLIM_FIELD: &str = "reclassified_glim";

/// One step of an empirical CDF.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CdfPoint {
    pub value: f64,
    pub cumulative_probability: f64,
}

/// Sets `bias = attribute_a - attribute_b` on every feature.
///
/// Features missing either attribute get a null bias. Returns how many
/// features received a value.
pub fn calculate_bias(features: &mut [Feature], attribute_a: &str, attribute_b: &str) -> usize {
    let mut computed = 0;
    for f in features.iter_mut() {
        let bias = match (f.number(attribute_a), f.number(attribute_b)) {
            (Some(a), Some(b)) => Some(a - b),
            _ => None,
        };
        if bias.is_some() {
            computed += 1;
        }
        f.set_f64(BIAS_FIELD, bias);
    }
    computed
}

/// Adds the two-way GLiM class derived from `glim_raw`.
pub fn reclassify_glim(features: &mut [Feature]) {
    for f in features.iter_mut() {
        let raw = f.number("glim_raw").map(|v| v as i32);
        f.set(RECLASSIFIED_GLIM_FIELD, lithology::binary_class(raw));
    }
}

/// Bias values of all features that have one.
pub fn bias_values(features: &[Feature]) -> Vec<f64> {
    features.iter().filter_map(|f| f.number(BIAS_FIELD)).collect()
}

/// Sorted values with cumulative probability `i / (n - 1)`.
///
/// Non-finite values are dropped. A single value has probability 1.
pub fn empirical_cdf(values: &[f64]) -> Vec<CdfPoint> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    if n == 1 {
        return vec![CdfPoint {
            value: sorted[0],
            cumulative_probability: 1.0,
        }];
    }

    let denom = n.saturating_sub(1) as f64;
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, value)| CdfPoint {
            value,
            cumulative_probability: i as f64 / denom,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(observed: Option<f64>, simulated: Option<f64>) -> Feature {
        let mut f = Feature::new(Some([0.0, 0.0]));
        f.set_f64("mean_gwh_m", observed);
        f.set_f64("sim_gw_mea", simulated);
        f
    }

    #[test]
    fn test_bias_is_difference() {
        let mut features = vec![feature(Some(12.5), Some(10.0)), feature(Some(3.0), Some(4.5))];
        assert_eq!(calculate_bias(&mut features, "mean_gwh_m", "sim_gw_mea"), 2);
        assert_eq!(features[0].number(BIAS_FIELD), Some(2.5));
        assert_eq!(features[1].number(BIAS_FIELD), Some(-1.5));
    }

    #[test]
    fn test_missing_attribute_gives_null_bias() {
        let mut features = vec![feature(Some(12.5), None), feature(None, None)];
        assert_eq!(calculate_bias(&mut features, "mean_gwh_m", "sim_gw_mea"), 0);
        assert!(features[0].properties[BIAS_FIELD].is_null());
        assert!(bias_values(&features).is_empty());
    }

    #[test]
    fn test_reclassify_glim() {
        let mut a = Feature::new(None);
        a.set("glim_raw", 100);
        let mut b = Feature::new(None);
        b.set("glim_raw", 300);
        let c = Feature::new(None);
        let mut features = vec![a, b, c];
        reclassify_glim(&mut features);
        let classes: Vec<f64> = features
            .iter()
            .filter_map(|f| f.number(RECLASSIFIED_GLIM_FIELD))
            .collect();
        assert_eq!(classes, vec![1.0, 2.0, -1.0]);
    }

    #[test]
    fn test_cdf_sorted_with_even_steps() {
        let cdf = empirical_cdf(&[3.0, -1.0, 2.0, 0.0, 1.0]);
        let values: Vec<f64> = cdf.iter().map(|p| p.value).collect();
        let probs: Vec<f64> = cdf.iter().map(|p| p.cumulative_probability).collect();
        assert_eq!(values, vec![-1.0, 0.0, 1.0, 2.0, 3.0]);
        assert_eq!(probs, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_cdf_single_and_empty() {
        assert_eq!(
            empirical_cdf(&[4.2]),
            vec![CdfPoint { value: 4.2, cumulative_probability: 1.0 }]
        );
        assert!(empirical_cdf(&[]).is_empty());
        assert!(empirical_cdf(&[f64::NAN]).is_empty());
    }
}
