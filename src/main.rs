/// geowat: groundwater well summaries and spatial declustering weights.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use geowat_wells::analysis::{aggregate, bias};
use geowat_wells::config::{Config, DEFAULT_CONFIG_PATH};
use geowat_wells::export::{self, Feature};
use geowat_wells::ingest::geowat;
use geowat_wells::logging::{self, LogLevel, Stage};
use geowat_wells::raster::{self, RasterSampler};
use geowat_wells::report::{self, BiasReport, RasterSummary, SummarizeReport, ValueStats, WeightingReport};
use geowat_wells::{db, lithology, weighting};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "geowat")]
#[command(author, version, about = "Groundwater well summaries and declustering weights", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the database connection and the required tables
    CheckDb,
    /// Aggregate yearly heads per well, join the lookup table and sample lithology
    Summarize {
        /// Only wells in this country (lookup table `country_name`)
        #[arg(long)]
        country: Option<String>,
        /// Output GeoJSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Skip lithology sampling even if a raster is configured
        #[arg(long)]
        no_raster: bool,
    },
    /// Compute declustering weights for a GeoJSON point file
    Weight {
        /// Input GeoJSON file
        input: PathBuf,
        /// Output GeoJSON file
        output: PathBuf,
    },
    /// Compute observed minus simulated bias and its CDF
    Bias {
        /// Input GeoJSON file
        input: PathBuf,
        /// Output GeoJSON file
        output: PathBuf,
        /// Observed attribute
        #[arg(long, default_value = "mean_gwh_m")]
        observed: String,
        /// Simulated attribute
        #[arg(long, default_value = "sim_gw_mea")]
        simulated: String,
        /// Write the bias CDF as CSV to this path
        #[arg(long)]
        cdf: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logging::error(Stage::System, None, &format!("{:#}", e));
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let (config_path, explicit) = match cli.config {
        Some(path) => (path, true),
        None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };
    let config = Config::load(&config_path, explicit)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        config.logging.level
    };
    logging::init_logger(level, config.logging.file.as_deref(), config.logging.timestamps);

    let start = Instant::now();
    match cli.command {
        Commands::CheckDb => check_db(&config)?,
        Commands::Summarize {
            country,
            output,
            no_raster,
        } => {
            let output = output.unwrap_or_else(|| default_summary_path(&config, country.as_deref()));
            summarize(&config, country.as_deref(), &output, no_raster)?
        }
        Commands::Weight { input, output } => weight(&config, &input, &output)?,
        Commands::Bias {
            input,
            output,
            observed,
            simulated,
            cdf,
        } => run_bias(&input, &output, &observed, &simulated, cdf.as_deref())?,
    }
    println!("  Processing time: {:.2?}", start.elapsed());
    Ok(())
}

// ─── Commands ───────────────────────────────────────────────────────────

fn check_db(config: &Config) -> Result<()> {
    let status = db::with_session(&config.database, db::verify_tables)
        .context("Database check failed")?;

    println!("Server time: {}", status.server_time);
    for table in &status.tables {
        match table.rows {
            Some(rows) => println!("  ✓ {}.{} ({} rows)", status.schema, table.table, rows),
            None => println!("  ✗ {}.{} missing", status.schema, table.table),
        }
    }
    if !status.all_present() {
        bail!("required tables are missing from schema '{}'", status.schema);
    }
    Ok(())
}

fn summarize(config: &Config, country: Option<&str>, output: &Path, no_raster: bool) -> Result<()> {
    let mut report = SummarizeReport::new(country, output);

    let (heads, lookups) = db::with_session(&config.database, |session| {
        db::require_tables(session)?;
        let heads = geowat::fetch_yearly_heads(session, country)?;
        let lookups = geowat::fetch_lookup(session, country)?;
        Ok((heads, lookups))
    })
    .context("Failed to query the well tables")?;
    report.yearly_records = heads.len();
    report.lookup_rows = lookups.len();

    let aggregates = aggregate::aggregate_heads(&heads);
    report.wells_aggregated = aggregates.len();

    let joined = aggregate::join_with_lookup(&aggregates, &lookups)
        .context("Failed to join yearly heads with the lookup table")?;
    report.wells_joined = joined.wells.len();
    report.unmatched_aggregates = joined.unmatched_aggregates;
    report.unmatched_lookups = joined.unmatched_lookups;
    let mut wells = joined.wells;
    if wells.is_empty() {
        bail!("no wells left after joining yearly heads with the lookup table");
    }

    report.wells_without_coordinates = wells.iter().filter(|w| w.coordinates().is_none()).count();
    report.wells_without_mean_head = wells.iter().filter(|w| w.mean_gwh_m.is_none()).count();

    match (&config.raster.lithology_path, no_raster) {
        (Some(path), false) => {
            let pb = spinner("Reading lithology raster...");
            let grid = raster::read_class_geotiff(path)
                .with_context(|| format!("Failed to read raster {}", path.display()))?;
            pb.finish_and_clear();
            let (rows, cols) = grid.shape();
            logging::debug(
                Stage::Raster,
                None,
                &format!("raster {} x {}, nodata {:?}", cols, rows, grid.nodata()),
            );

            let sampled = sample_lithology(&mut wells, &grid);
            logging::log_stage_summary(Stage::Raster, "lithology sampling", wells.len(), sampled);
            report.raster = Some(RasterSummary {
                path: path.clone(),
                sampled,
                no_data: wells.len() - sampled,
            });
        }
        (None, false) => logging::warn(
            Stage::Raster,
            None,
            "no lithology raster configured; litho_class left undefined",
        ),
        (_, true) => logging::info(Stage::Raster, None, "lithology sampling skipped"),
    }

    let mut class_counts = BTreeMap::new();
    for well in &wells {
        *class_counts.entry(well.litho_class).or_insert(0) += 1;
    }
    report.litho_class_counts = class_counts;

    let features: Vec<Feature> = wells.iter().map(Feature::from).collect();
    write_output(output, &features)?;

    finish_report(&report, output)?;
    report.print_summary();
    Ok(())
}

fn weight(config: &Config, input: &Path, output: &Path) -> Result<()> {
    let features = read_input(input)?;
    let points = export::well_points(
        &features,
        &config.weighting.id_field,
        &config.weighting.count_field,
    )
    .with_context(|| format!("Invalid well attributes in {}", input.display()))?;

    let options = config.weighting.options();
    let outcome = weighting::compute_weights(&points, &options)
        .map_err(|e| anyhow::anyhow!("{:?} error: {}", e.kind(), e))
        .context("Failed to compute declustering weights")?;

    let weighted = export::attach_weights(&features, &config.weighting.id_field, &outcome.wells);
    write_output(output, &weighted)?;

    let report = WeightingReport::new(
        input,
        output,
        features.len(),
        &outcome,
        options.degenerate_policy,
        options.isolation_sentinel,
    );
    let report_json = finish_report(&report, output)?;
    let markdown_path = report_json.with_extension("md");
    std::fs::write(&markdown_path, report.to_markdown())
        .with_context(|| format!("Failed to write {}", markdown_path.display()))?;
    report.print_summary();
    Ok(())
}

fn run_bias(
    input: &Path,
    output: &Path,
    observed: &str,
    simulated: &str,
    cdf_path: Option<&Path>,
) -> Result<()> {
    let mut features = read_input(input)?;

    let with_bias = bias::calculate_bias(&mut features, observed, simulated);
    logging::log_stage_summary(Stage::Export, "bias", features.len(), with_bias);
    bias::reclassify_glim(&mut features);
    write_output(output, &features)?;

    let values = bias::bias_values(&features);
    if let Some(path) = cdf_path {
        let cdf = bias::empirical_cdf(&values);
        export::write_cdf_csv(path, &cdf)
            .with_context(|| format!("Failed to write CDF table {}", path.display()))?;
    }

    let report = BiasReport {
        timestamp: chrono::Utc::now().to_rfc3339(),
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        observed: observed.to_string(),
        simulated: simulated.to_string(),
        features: features.len(),
        with_bias,
        bias_stats: ValueStats::from_values(&values),
        cdf_output: cdf_path.map(Path::to_path_buf),
    };
    finish_report(&report, output)?;
    report.print_summary();
    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn progress(len: usize, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos}/{len}") {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.set_message(msg.to_string());
    pb
}

/// Returns how many wells received a raster code.
fn sample_lithology<S: RasterSampler>(wells: &mut [geowat_wells::model::WellSummary], sampler: &S) -> usize {
    let pb = progress(wells.len(), "Sampling lithology");
    let mut sampled = 0;
    for well in wells.iter_mut() {
        lithology::annotate(well, sampler);
        if let Some(code) = well.glim_raw {
            sampled += 1;
            if lithology::find_class(code).is_none() {
                logging::warn(
                    Stage::Raster,
                    Some(&well.id_gerbil.to_string()),
                    &format!("GLiM code {} is not in the lithology registry", code),
                );
            }
        } else {
            logging::debug(
                Stage::Raster,
                Some(&well.id_gerbil.to_string()),
                "no lithology at well location",
            );
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    sampled
}

fn default_summary_path(config: &Config, country: Option<&str>) -> PathBuf {
    let name = match country {
        Some(c) => format!("wells_{}.geojson", c.to_lowercase().replace(' ', "_")),
        None => "wells.geojson".to_string(),
    };
    config.output.directory.join(name)
}

fn read_input(input: &Path) -> Result<Vec<Feature>> {
    let features = export::read_features(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    logging::info(
        Stage::Export,
        None,
        &format!("read {} features from {}", features.len(), input.display()),
    );
    Ok(features)
}

fn write_output(output: &Path, features: &[Feature]) -> Result<()> {
    let pb = spinner("Writing output...");
    export::write_features(output, features)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    pb.finish_and_clear();
    logging::info(
        Stage::Export,
        None,
        &format!("wrote {} features to {}", features.len(), output.display()),
    );
    Ok(())
}

fn finish_report<T: serde::Serialize>(report: &T, output: &Path) -> Result<PathBuf> {
    let path = report::report_path(output);
    report::save_json(report, &path)
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    Ok(path)
}
