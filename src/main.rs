//! raqdps-albedo CLI — batch deposition/albedo lag analysis.

use anyhow::{Context, Result};
use chrono::{NaiveDateTime, TimeDelta};
use clap::{Parser, Subcommand};
use std::{collections::BTreeMap, path::PathBuf, time::Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use raqdps_albedo::{
    analysis::{AnalysisConfig, AnalysisInputs, BatchReport, run_batch, write_batch_outputs},
    data::{
        albedo::{AlbedoEncoding, load_albedo_csv_as},
        fire::{FireSource, load_fire_csv},
        glacier::GlacierSelection,
        loader::{
            CsvSliceReader, SliceReader, check_availability, load_deposition_csv,
            load_glacier_csv, load_hourly_directory, parse_timestamp,
        },
        synthetic::SyntheticScenario,
    },
    statistical_tests::{
        correlation::{CorrelationEstimate, CorrelationMethod},
        lag::{LagDirection, LagOptions, compute_lag_analysis},
    },
};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "raqdps-albedo")]
#[command(author, version, about = "Lagged RAQDPS deposition / glacier albedo analysis")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the per-glacier pipeline and write the results tables
    Run(RunArgs),
    /// Lag sweep between the first two columns of a CSV file
    Lag {
        /// CSV with a header; column 1 is the driver, column 2 the response
        input: PathBuf,
        #[arg(long, default_value_t = 10)]
        max_lag: usize,
        /// pearson, spearman or kendall
        #[arg(long, default_value = "pearson")]
        method: String,
        /// forward or symmetric
        #[arg(long, default_value = "forward")]
        direction: String,
        #[arg(long, default_value_t = 3)]
        min_overlap: usize,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Deposition long-table CSV, or a directory of hourly model files
    #[arg(long, required_unless_present = "synthetic")]
    deposition: Option<PathBuf>,
    /// RGI-style glacier table
    #[arg(long, required_unless_present = "synthetic")]
    glaciers: Option<PathBuf>,
    /// Albedo table (date,albedo[,RGIId])
    #[arg(long, required_unless_present = "synthetic")]
    albedo: Option<PathBuf>,
    /// Albedo value encoding: broadband, modis or sentinel2
    #[arg(long, default_value = "broadband")]
    albedo_encoding: String,
    /// Active-fire detections
    #[arg(long)]
    fires: Option<PathBuf>,
    /// modis or viirs
    #[arg(long, default_value = "modis")]
    fire_source: String,
    /// Hourly file format inside a deposition directory: csv or netcdf
    #[arg(long, default_value = "csv")]
    format: String,
    /// First hour analysed (YYYY-MM-DD or YYYY-MM-DD HH:MM)
    #[arg(long)]
    start_date: Option<String>,
    /// Last hour analysed; a bare date covers the whole day
    #[arg(long)]
    end_date: Option<String>,
    /// Glacier id, comma-separated ids, or "all"
    #[arg(long, default_value = "all")]
    glacier: String,
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
    /// Generate seeded synthetic inputs instead of reading files
    #[arg(long)]
    synthetic: bool,
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn parse_start(text: &str) -> Result<NaiveDateTime> {
    parse_timestamp(text).with_context(|| format!("Invalid start date '{text}'"))
}

fn parse_end(text: &str) -> Result<NaiveDateTime> {
    let t = parse_timestamp(text).with_context(|| format!("Invalid end date '{text}'"))?;
    if text.trim().len() == 10 && text.contains('-') {
        return Ok(t + TimeDelta::hours(23));
    }
    Ok(t)
}

fn slice_reader(format: &str) -> Result<Box<dyn SliceReader>> {
    match format.to_ascii_lowercase().as_str() {
        "csv" => Ok(Box::new(CsvSliceReader)),
        #[cfg(feature = "netcdf")]
        "netcdf" | "nc" => Ok(Box::new(raqdps_albedo::data::netcdf_reader::NetcdfSliceReader)),
        #[cfg(not(feature = "netcdf"))]
        "netcdf" | "nc" => anyhow::bail!("NetCDF input requires the `netcdf` feature"),
        other => anyhow::bail!("Unknown hourly format: {}. Use csv or netcdf.", other),
    }
}

fn apply_overrides(config: &mut AnalysisConfig, args: &RunArgs) -> Result<()> {
    if let Some(text) = &args.start_date {
        config.start = Some(parse_start(text)?);
    }
    if let Some(text) = &args.end_date {
        config.end = Some(parse_end(text)?);
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    Ok(())
}

fn load_inputs(args: &RunArgs, config: &AnalysisConfig) -> Result<AnalysisInputs> {
    if args.synthetic {
        warn!("--synthetic: results are computed on generated data, not observations");
        let mut scenario = SyntheticScenario { seed: args.seed, ..SyntheticScenario::default() };
        if let Some(start) = config.start {
            scenario.start = start;
        }
        return Ok(scenario.generate().context("Failed to generate synthetic inputs")?.into());
    }

    // clap guarantees the three paths when not in synthetic mode.
    let (Some(deposition), Some(glaciers), Some(albedo)) =
        (&args.deposition, &args.glaciers, &args.albedo)
    else {
        anyhow::bail!("--deposition, --glaciers and --albedo are required without --synthetic");
    };
    let mut paths = vec![deposition.clone(), glaciers.clone(), albedo.clone()];
    paths.extend(args.fires.clone());
    check_availability(&paths).context("Input files are missing")?;
    let encoding: AlbedoEncoding =
        args.albedo_encoding.parse().context("Invalid albedo encoding")?;

    let field = if deposition.is_dir() {
        let (Some(start), Some(end)) = (config.start, config.end) else {
            anyhow::bail!("An hourly deposition directory needs --start-date and --end-date");
        };
        let reader = slice_reader(&args.format)?;
        load_hourly_directory(deposition, start, end, &config.deposition_variables, &*reader)
            .context("Failed to load hourly deposition")?
    } else {
        load_deposition_csv(deposition, &config.deposition_variables)
            .context("Failed to load deposition table")?
    };
    let inventory = load_glacier_csv(glaciers).context("Failed to load glacier inventory")?;
    let albedo =
        load_albedo_csv_as(albedo, encoding).context("Failed to load albedo table")?;
    let fires = match &args.fires {
        Some(path) => {
            let source: FireSource = args.fire_source.parse().context("Invalid fire source")?;
            load_fire_csv(path, source).context("Failed to load fire detections")?
        }
        None => Vec::new(),
    };
    Ok(AnalysisInputs { field, inventory, albedo, fires })
}

fn print_summary(report: &BatchReport, config: &AnalysisConfig) {
    println!("Glaciers: {} ok, {} failed", report.n_succeeded(), report.n_failed());
    for outcome in &report.outcomes {
        println!("  {:<20} {:<24} {}", outcome.site_id, outcome.label, outcome.status());
    }
    for site in report.analyses() {
        for v in &site.variables {
            if let Some(best) = v.lags.best_lag() {
                println!(
                    "  {} {}: best lag {} d, r = {:.3}, p = {:.3}",
                    site.site_id,
                    v.variable,
                    best.lag,
                    best.coefficient().unwrap_or(f64::NAN),
                    best.p_value().unwrap_or(f64::NAN)
                );
            }
        }
    }
    println!("Results saved to: {}", config.output_dir.display());
}

fn run(args: RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_file(path).context("Failed to read configuration")?,
        None => AnalysisConfig::default(),
    };
    apply_overrides(&mut config, &args)?;
    config.validate().context("Invalid configuration")?;

    let started = Instant::now();
    let mut inputs = load_inputs(&args, &config)?;
    inputs.inventory = inputs
        .inventory
        .select(&GlacierSelection::parse(&args.glacier))
        .context("Invalid glacier selection")?;
    let inputs = inputs.prepare(&config).context("Failed to prepare inputs")?;
    info!(glaciers = inputs.inventory.len(), "starting batch");

    let report = run_batch(&inputs, &config);
    write_batch_outputs(&config.output_dir, &report, &config)
        .context("Failed to write results")?;
    print_summary(&report, &config);
    println!("  Processing time: {:.2?}", started.elapsed());
    Ok(())
}

fn read_pair(input: &PathBuf) -> Result<(Vec<f64>, Vec<f64>)> {
    let mut reader = csv::Reader::from_path(input)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    let (mut x, mut y) = (Vec::new(), Vec::new());
    for (i, record) in reader.records().enumerate() {
        let record = record.context("Malformed CSV row")?;
        let cell = |k: usize| -> Result<f64> {
            match record.get(k).map(str::trim) {
                None | Some("") => Ok(f64::NAN),
                Some(text) => {
                    text.parse().with_context(|| format!("Row {}: invalid number '{text}'", i + 2))
                }
            }
        };
        x.push(cell(0)?);
        y.push(cell(1)?);
    }
    Ok((x, y))
}

fn lag(
    input: PathBuf, max_lag: usize, method: &str, direction: &str, min_overlap: usize,
) -> Result<()> {
    let method: CorrelationMethod =
        method.parse().map_err(|e: String| anyhow::anyhow!("Invalid method: {}", e))?;
    let direction: LagDirection =
        direction.parse().map_err(|e: String| anyhow::anyhow!("Invalid direction: {}", e))?;
    let (x, y) = read_pair(&input)?;
    let options = LagOptions { direction, min_overlap };
    let sweep = compute_lag_analysis(&x, &y, max_lag, method, &options)
        .context("Lag analysis failed")?;

    let mut by_status: BTreeMap<&str, usize> = BTreeMap::new();
    println!("lag,correlation,p_value,n_obs,status");
    for r in sweep.results() {
        let status = match &r.estimate {
            CorrelationEstimate::Defined { .. } => "ok",
            CorrelationEstimate::Undefined(reason) => reason.tag(),
        };
        *by_status.entry(status).or_default() += 1;
        let fmt = |v: Option<f64>| v.map(|v| format!("{v:.6}")).unwrap_or_default();
        let (r_text, p_text) = (fmt(r.coefficient()), fmt(r.p_value()));
        println!("{},{},{},{},{}", r.lag, r_text, p_text, r.n_obs, status);
    }
    info!(?by_status, method = %method, "lag sweep done");
    if let Some(best) = sweep.best_lag() {
        eprintln!("Best lag: {} (r = {:.3})", best.lag, best.coefficient().unwrap_or(f64::NAN));
    }
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging();

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Lag { input, max_lag, method, direction, min_overlap } => {
            lag(input, max_lag, &method, &direction, min_overlap)
        }
    }
}
