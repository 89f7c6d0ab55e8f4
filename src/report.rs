/// Run reports for the `summarize`, `weight` and `bias` commands.
///
/// Each report is a plain serde struct. It is printed to the console as a
/// short summary and saved as pretty JSON next to the command's output.
/// The weighting report can also be rendered as Markdown.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use crate::export::ExportError;
use crate::model::WeightedWell;
use crate::weighting::{DegeneratePolicy, ScaleFallback, WeightingOutcome};

const RULE: &str = "═══════════════════════════════════════════════════════════";

fn timestamp() -> String {
    Utc::now().to_rfc3339()
}

// ============================================================================
// Shared pieces
// ============================================================================

/// Min, max and mean of a set of values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl ValueStats {
    /// `None` when no finite value is present.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }
        let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = finite.iter().sum::<f64>() / finite.len() as f64;
        Some(Self {
            count: finite.len(),
            min,
            max,
            mean,
        })
    }
}

fn stats_line(label: &str, stats: Option<&ValueStats>) -> String {
    match stats {
        Some(s) => format!(
            "{:<18}min {:.4}  max {:.4}  mean {:.4}  (n = {})",
            label, s.min, s.max, s.mean, s.count
        ),
        None => format!("{:<18}no values", label),
    }
}

/// `<output>.report.json`
pub fn report_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_default();
    name.push(".report.json");
    output.with_file_name(name)
}

/// Saves any report as pretty JSON.
pub fn save_json<T: Serialize>(report: &T, path: &Path) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(report)?)?;
    Ok(())
}

// ============================================================================
// summarize
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SummarizeReport {
    pub timestamp: String,
    pub country: Option<String>,
    pub yearly_records: usize,
    pub lookup_rows: usize,
    pub wells_aggregated: usize,
    pub wells_joined: usize,
    pub unmatched_aggregates: usize,
    pub unmatched_lookups: usize,
    pub wells_without_coordinates: usize,
    pub wells_without_mean_head: usize,
    pub raster: Option<RasterSummary>,
    /// Wells per reclassified lithology; -1 is undefined.
    pub litho_class_counts: BTreeMap<i32, usize>,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct RasterSummary {
    pub path: PathBuf,
    pub sampled: usize,
    pub no_data: usize,
}

impl SummarizeReport {
    pub fn new(country: Option<&str>, output: &Path) -> Self {
        Self {
            timestamp: timestamp(),
            country: country.map(String::from),
            yearly_records: 0,
            lookup_rows: 0,
            wells_aggregated: 0,
            wells_joined: 0,
            unmatched_aggregates: 0,
            unmatched_lookups: 0,
            wells_without_coordinates: 0,
            wells_without_mean_head: 0,
            raster: None,
            litho_class_counts: BTreeMap::new(),
            output: output.to_path_buf(),
        }
    }

    pub fn print_summary(&self) {
        println!("\n{}", RULE);
        println!("WELL SUMMARY");
        println!("{}", RULE);
        if let Some(country) = &self.country {
            println!("Country:            {}", country);
        }
        println!("Yearly records:     {}", self.yearly_records);
        println!("Lookup rows:        {}", self.lookup_rows);
        println!(
            "Wells joined:       {}/{}  ({} without lookup, {} lookup rows without heads)",
            self.wells_joined, self.wells_aggregated, self.unmatched_aggregates, self.unmatched_lookups
        );
        println!("No coordinates:     {}", self.wells_without_coordinates);
        println!("No mean head:       {}", self.wells_without_mean_head);
        if let Some(raster) = &self.raster {
            println!(
                "Lithology sampled:  {}  ({} no data) from {}",
                raster.sampled,
                raster.no_data,
                raster.path.display()
            );
        }
        for (class, count) in &self.litho_class_counts {
            println!("  class {:>2}:         {}", class, count);
        }
        println!("Output:             {}", self.output.display());
        println!("{}", RULE);
    }
}

// ============================================================================
// weight
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct WeightingReport {
    pub timestamp: String,
    pub input: PathBuf,
    pub output: PathBuf,
    pub total_features: usize,
    pub weighted: usize,
    pub dropped_invalid: usize,
    pub degenerate_policy: DegeneratePolicy,
    pub isolation_sentinel: f64,
    pub fallbacks: Vec<ScaleFallback>,
    pub distance_stats: Option<ValueStats>,
    pub weight_stats: Option<ValueStats>,
    /// Wells with the highest weight, best first.
    pub top_wells: Vec<RankedWell>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedWell {
    pub id: String,
    pub observation_count: u32,
    pub nearest_neighbor_distance: f64,
    pub weight: f64,
}

impl From<&WeightedWell> for RankedWell {
    fn from(w: &WeightedWell) -> Self {
        Self {
            id: w.id.clone(),
            observation_count: w.observation_count,
            nearest_neighbor_distance: w.nearest_neighbor_distance,
            weight: w.weight,
        }
    }
}

const TOP_WELLS: usize = 10;

impl WeightingReport {
    pub fn new(
        input: &Path,
        output: &Path,
        total_features: usize,
        outcome: &WeightingOutcome,
        degenerate_policy: DegeneratePolicy,
        isolation_sentinel: f64,
    ) -> Self {
        let distances: Vec<f64> = outcome.wells.iter().map(|w| w.nearest_neighbor_distance).collect();
        let weights: Vec<f64> = outcome.wells.iter().map(|w| w.weight).collect();

        let mut ranked: Vec<&WeightedWell> = outcome.wells.iter().collect();
        // Stable sort keeps input order among equal weights.
        ranked.sort_by(|a, b| b.weight.total_cmp(&a.weight));

        Self {
            timestamp: timestamp(),
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            total_features,
            weighted: outcome.wells.len(),
            dropped_invalid: outcome.dropped_invalid,
            degenerate_policy,
            isolation_sentinel,
            fallbacks: outcome.fallbacks.clone(),
            distance_stats: ValueStats::from_values(&distances),
            weight_stats: ValueStats::from_values(&weights),
            top_wells: ranked.into_iter().take(TOP_WELLS).map(RankedWell::from).collect(),
        }
    }

    pub fn print_summary(&self) {
        println!("\n{}", RULE);
        println!("DECLUSTERING WEIGHTS");
        println!("{}", RULE);
        println!(
            "Wells weighted:    {}/{}  ({} dropped for invalid geometry)",
            self.weighted, self.total_features, self.dropped_invalid
        );
        println!("{}", stats_line("NN distance:", self.distance_stats.as_ref()));
        println!("{}", stats_line("Weight:", self.weight_stats.as_ref()));
        for fb in &self.fallbacks {
            println!(
                "⚠ all {} values equal {}; uniform {} used",
                fb.stage, fb.shared_value, fb.substituted
            );
        }
        println!("Output:            {}", self.output.display());
        println!("{}", RULE);
    }

    pub fn to_markdown(&self) -> String {
        WeightingMarkdown(self).to_string()
    }
}

/// Markdown rendering of a `WeightingReport`.
pub struct WeightingMarkdown<'a>(pub &'a WeightingReport);

impl fmt::Display for WeightingMarkdown<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        writeln!(f, "# Declustering weights\n")?;
        writeln!(f, "Generated: {}\n", report.timestamp)?;
        writeln!(f, "| | |")?;
        writeln!(f, "|---|---|")?;
        writeln!(f, "| Input | `{}` |", report.input.display())?;
        writeln!(f, "| Output | `{}` |", report.output.display())?;
        writeln!(f, "| Features | {} |", report.total_features)?;
        writeln!(f, "| Weighted | {} |", report.weighted)?;
        writeln!(f, "| Dropped (invalid geometry) | {} |", report.dropped_invalid)?;
        writeln!(f, "| Degenerate policy | {:?} |", report.degenerate_policy)?;
        writeln!(f, "| Isolation sentinel | {} |", report.isolation_sentinel)?;

        if !report.fallbacks.is_empty() {
            writeln!(f, "\n## Uniform fallbacks\n")?;
            for fb in &report.fallbacks {
                writeln!(
                    f,
                    "- {}: every value was {}, replaced by {}",
                    fb.stage, fb.shared_value, fb.substituted
                )?;
            }
        }

        if !report.top_wells.is_empty() {
            writeln!(f, "\n## Highest weights\n")?;
            writeln!(f, "| Well | Years | NN distance | Weight |")?;
            writeln!(f, "|---|---:|---:|---:|")?;
            for w in &report.top_wells {
                writeln!(
                    f,
                    "| {} | {} | {:.4} | {:.4} |",
                    w.id, w.observation_count, w.nearest_neighbor_distance, w.weight
                )?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// bias
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct BiasReport {
    pub timestamp: String,
    pub input: PathBuf,
    pub output: PathBuf,
    pub observed: String,
    pub simulated: String,
    pub features: usize,
    pub with_bias: usize,
    pub bias_stats: Option<ValueStats>,
    pub cdf_output: Option<PathBuf>,
}

impl BiasReport {
    pub fn print_summary(&self) {
        println!("\n{}", RULE);
        println!("BIAS ({} - {})", self.observed, self.simulated);
        println!("{}", RULE);
        println!("Wells with bias:   {}/{}", self.with_bias, self.features);
        println!("{}", stats_line("Bias:", self.bias_stats.as_ref()));
        if let Some(cdf) = &self.cdf_output {
            println!("CDF table:         {}", cdf.display());
        }
        println!("Output:            {}", self.output.display());
        println!("{}", RULE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScaleStage;

    fn well(id: &str, distance: f64, weight: f64) -> WeightedWell {
        WeightedWell {
            id: id.to_string(),
            x: 0.0,
            y: 0.0,
            observation_count: 3,
            nearest_neighbor_distance: distance,
            normalized_density: 0.0,
            share: 0.0,
            weight,
        }
    }

    fn outcome() -> WeightingOutcome {
        WeightingOutcome {
            wells: vec![well("a", 1.0, 0.0), well("b", 1.0, 0.0), well("c", 9.0, 1.0)],
            dropped_invalid: 1,
            fallbacks: vec![],
        }
    }

    #[test]
    fn test_value_stats() {
        let stats = ValueStats::from_values(&[1.0, f64::NAN, 3.0, 8.0]).unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 8.0);
        assert_eq!(stats.mean, 4.0);
        assert!(ValueStats::from_values(&[]).is_none());
    }

    #[test]
    fn test_report_path_sits_next_to_output() {
        assert_eq!(
            report_path(Path::new("out/wells_weighted.geojson")),
            PathBuf::from("out/wells_weighted.report.json")
        );
    }

    #[test]
    fn test_weighting_report_ranks_by_weight() {
        let report = WeightingReport::new(
            Path::new("in.geojson"),
            Path::new("out.geojson"),
            4,
            &outcome(),
            DegeneratePolicy::Uniform,
            1e6,
        );
        assert_eq!(report.weighted, 3);
        assert_eq!(report.dropped_invalid, 1);
        assert_eq!(report.top_wells[0].id, "c");
        assert_eq!(report.top_wells[1].id, "a");
        assert_eq!(report.distance_stats.unwrap().max, 9.0);
    }

    #[test]
    fn test_markdown_lists_fallbacks_and_top_wells() {
        let mut outcome = outcome();
        outcome.fallbacks.push(ScaleFallback {
            stage: ScaleStage::Density,
            shared_value: 0.0,
            substituted: 0.0,
        });
        let report = WeightingReport::new(
            Path::new("in.geojson"),
            Path::new("out.geojson"),
            4,
            &outcome,
            DegeneratePolicy::Uniform,
            1e6,
        );
        let md = report.to_markdown();
        assert!(md.starts_with("# Declustering weights"));
        assert!(md.contains("## Uniform fallbacks"));
        assert!(md.contains("| c | 3 | 9.0000 | 1.0000 |"));
    }

    #[test]
    fn test_markdown_display_omits_empty_sections() {
        let mut outcome = outcome();
        outcome.wells.clear();
        let report = WeightingReport::new(
            Path::new("in.geojson"),
            Path::new("out.geojson"),
            0,
            &outcome,
            DegeneratePolicy::Fail,
            1e6,
        );
        let md = format!("{}", WeightingMarkdown(&report));
        assert_eq!(md, report.to_markdown());
        assert!(md.contains("| Degenerate policy | Fail |"));
        assert!(!md.contains("## Uniform fallbacks"));
        assert!(!md.contains("## Highest weights"));
    }

    #[test]
    fn test_summarize_report_serializes_class_counts() {
        let mut report = SummarizeReport::new(Some("Afghanistan"), Path::new("wells.geojson"));
        report.litho_class_counts.insert(-1, 2);
        report.litho_class_counts.insert(4, 5);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["country"], "Afghanistan");
        assert_eq!(json["litho_class_counts"]["4"], 5);
        assert!(json["raster"].is_null());
    }
}
