/// Tabular analysis for the GEOWAT well toolkit.
///
/// Submodules:
/// - `aggregate`: collapses yearly heads per well and joins the lookup table.
/// - `bias`: observed-minus-simulated bias and its empirical CDF.

pub mod aggregate;
pub mod bias;
