//! echostat CLI - Geostatistical estimation for acoustic surveys

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use echostat_algorithms::interpolation::{
    empirical_variogram, fit_best_variogram, EmpiricalVariogram, FittedVariogram, VariogramModel,
};
use echostat_algorithms::pipeline::{
    fit_model, prepare, resample_biomass, run_kriging, SurveyConfig, SurveyData,
};
use echostat_algorithms::resampling::{jolly_hampton, ResampleStrategy};
use echostat_algorithms::survey::{
    correct_transect_intervals, sum_strata_weight, summarize_transects, transect_extents,
    DEFAULT_INTERVAL_THRESHOLD,
};
use echostat_core::io::{read_table_file, write_table_file, TableRecord};
use echostat_core::survey::{CatchRecord, IntervalRecord, SpecimenRecord};
use echostat_core::ColumnMapping;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "echostat")]
#[command(author, version, about = "Geostatistical estimation for acoustic surveys", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Survey configuration (TOML); defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Tables needed to place a survey in the working plane
#[derive(clap::Args)]
struct SurveyInputs {
    /// Observation table (CSV)
    observations: PathBuf,
    /// Kriging mesh table (CSV)
    mesh: PathBuf,
    /// Reference track table (CSV)
    reference: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration
    Info,
    /// Compute the empirical variogram and fit a model
    Variogram {
        /// Observation table (CSV)
        observations: PathBuf,
        /// Reference track table (CSV)
        reference: PathBuf,
        /// Model family; overrides the configuration
        #[arg(short, long)]
        model: Option<VariogramModel>,
        /// Fit every model family and keep the lowest residual
        #[arg(long)]
        best: bool,
    },
    /// Krige observations onto the mesh
    Krige {
        #[command(flatten)]
        inputs: SurveyInputs,
        /// Output table of kriged cells (CSV)
        output: PathBuf,
    },
    /// Resample transects and re-krige to estimate the CV of the total
    Resample {
        #[command(flatten)]
        inputs: SurveyInputs,
        /// Number of draws
        #[arg(short = 'n', long)]
        iterations: Option<usize>,
        /// Selection strategy: bootstrap, jolly-hampton, subsample
        #[arg(short, long)]
        strategy: Option<String>,
        /// Random seed
        #[arg(long)]
        seed: Option<u64>,
        /// Optional per-draw output (CSV)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Correct interval lengths and summarize transects
    Transects {
        /// Acoustic interval table (CSV)
        input: PathBuf,
        /// Output table of transect summaries (CSV)
        output: PathBuf,
        /// Tolerance above the median interval (nmi)
        #[arg(short, long, default_value_t = DEFAULT_INTERVAL_THRESHOLD)]
        threshold: f64,
        /// Optional transect extents output (CSV)
        #[arg(long)]
        extents: Option<PathBuf>,
        /// Also report the Jolly-Hampton CV of the transect densities
        #[arg(long)]
        jolly_hampton: bool,
    },
    /// Sum haul and specimen weights per stratum
    StrataWeight {
        /// Catch table (CSV)
        catch: PathBuf,
        /// Specimen table (CSV)
        specimens: PathBuf,
        /// Optional per-stratum output (CSV)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// One row of the per-draw resampling output
#[derive(Serialize)]
struct DrawRow {
    draw_index: usize,
    transects: usize,
    estimate: Option<f64>,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("setting default subscriber failed: {}", e))
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

fn load_config(path: Option<&Path>) -> Result<SurveyConfig> {
    match path {
        Some(p) => SurveyConfig::load(p).with_context(|| format!("Failed to load config {}", p.display())),
        None => Ok(SurveyConfig::default()),
    }
}

fn read_csv<T: TableRecord>(path: &Path, columns: &ColumnMapping) -> Result<Vec<T>> {
    let rows: Vec<T> = read_table_file(path, columns)
        .with_context(|| format!("Failed to read {} table {}", T::TABLE, path.display()))?;
    info!("{}: {} rows", T::TABLE, rows.len());
    Ok(rows)
}

fn read_survey(inputs: &SurveyInputs, columns: &ColumnMapping) -> Result<SurveyData> {
    let pb = spinner("Reading survey tables...")?;
    let data = SurveyData {
        observations: read_csv(&inputs.observations, columns)?,
        mesh: read_csv(&inputs.mesh, columns)?,
        reference: read_csv(&inputs.reference, columns)?,
    };
    pb.finish_and_clear();
    Ok(data)
}

fn parse_strategy(s: &str) -> Result<ResampleStrategy> {
    match s.to_lowercase().replace('_', "-").as_str() {
        "bootstrap" | "boot" => Ok(ResampleStrategy::Bootstrap),
        "jolly-hampton" | "jh" => Ok(ResampleStrategy::JollyHampton),
        "subsample" | "sub" => Ok(ResampleStrategy::Subsample),
        _ => anyhow::bail!("Unknown strategy: {}. Use bootstrap, jolly-hampton or subsample.", s),
    }
}

fn print_variogram(empirical: &EmpiricalVariogram, variogram: &FittedVariogram) {
    println!("{:>10} {:>14} {:>8} {:>14}", "lag", "semivariance", "pairs", "model");
    for bin in empirical.populated() {
        println!(
            "{:>10.4} {:>14.4} {:>8} {:>14.4}",
            bin.lag,
            bin.semivariance,
            bin.pair_count,
            variogram.evaluate(bin.lag)
        );
    }
    println!("\nModel: {}", variogram.model);
    println!("  Nugget: {:.6}", variogram.nugget);
    println!("  Sill: {:.6}", variogram.sill);
    println!("  Range: {:.6}", variogram.range);
    if let Some(h) = variogram.hole_effect {
        println!("  Hole effect: {:.6}", h);
    }
    if let Some(p) = variogram.power {
        println!("  Power: {:.6}", p);
    }
    println!("  Weighted RSS: {:.6e}", variogram.rss);
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info => {
            let text = config.to_toml_string().context("Failed to serialize config")?;
            match &cli.config {
                Some(p) => println!("# {}", p.display()),
                None => println!("# defaults"),
            }
            println!("{}", text);
            println!("# worker threads: {}", echostat_algorithms::worker_threads());
        }

        // ── Variogram ────────────────────────────────────────────────
        Commands::Variogram {
            observations,
            reference,
            model,
            best,
        } => {
            if let Some(m) = model {
                config.variogram.fit.model = m;
            }
            let data = SurveyData {
                observations: read_csv(&observations, &config.columns)?,
                reference: read_csv(&reference, &config.columns)?,
                ..Default::default()
            };
            let prepared = prepare(&data, &config).context("Failed to transform coordinates")?;

            let start = Instant::now();
            let (empirical, variogram) = if best {
                let empirical = empirical_variogram(&prepared.observations, &config.variogram.lags)
                    .context("Failed to compute empirical variogram")?;
                let variogram = fit_best_variogram(&empirical, &config.variogram.fit, &VariogramModel::ALL)
                    .context("No variogram model could be fitted")?;
                (empirical, variogram)
            } else {
                fit_model(&prepared.observations, &config).context("Failed to fit variogram")?
            };
            let elapsed = start.elapsed();

            print_variogram(&empirical, &variogram);
            println!("  Processing time: {:.2?}", elapsed);
        }

        // ── Krige ────────────────────────────────────────────────────
        Commands::Krige { inputs, output } => {
            let data = read_survey(&inputs, &config.columns)?;
            let start = Instant::now();
            let prepared = prepare(&data, &config).context("Failed to transform coordinates")?;

            let pb = spinner("Kriging mesh...")?;
            let run = run_kriging(&prepared, &config).context("Failed to krige")?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();

            write_table_file(&output, &run.kriged.cells)
                .with_context(|| format!("Failed to write {}", output.display()))?;

            println!("Variogram: {} (nugget {:.4}, sill {:.4}, range {:.4})",
                run.variogram.model, run.variogram.nugget, run.variogram.sill, run.variogram.range);
            println!("Valid cells: {} / {}", run.kriged.valid_count(), run.kriged.cells.len());
            println!("Kriged total: {:.6e}", run.total);
            println!("Failures: {}", run.report);
            done("Kriged mesh", &output, elapsed);
        }

        // ── Resample ─────────────────────────────────────────────────
        Commands::Resample {
            inputs,
            iterations,
            strategy,
            seed,
            output,
        } => {
            if let Some(n) = iterations {
                config.resampling.iterations = n;
            }
            if let Some(s) = strategy {
                config.resampling.strategy = parse_strategy(&s)?;
            }
            if seed.is_some() {
                config.resampling.seed = seed;
            }
            config.validate().context("Invalid configuration")?;

            let data = read_survey(&inputs, &config.columns)?;
            let start = Instant::now();
            let prepared = prepare(&data, &config).context("Failed to transform coordinates")?;
            let (_, variogram) = fit_model(&prepared.observations, &config).context("Failed to fit variogram")?;

            let pb = spinner(&format!("Running {} draws...", config.resampling.iterations))?;
            let dist = resample_biomass(&prepared, &variogram, &config).context("Resampling failed")?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();

            println!("Strategy: {:?}", config.resampling.strategy);
            println!("Seed: {}", dist.seed);
            println!("Draws: {} ({} failed)", dist.draws.len(), dist.failed);
            println!("  Mean: {:.6e}", dist.mean);
            println!("  Std: {:.6e}", dist.std);
            match dist.cv {
                Some(cv) => println!("  CV: {:.4}", cv),
                None => println!("  CV: undefined (zero mean)"),
            }
            println!("  Processing time: {:.2?}", elapsed);

            if let Some(path) = output {
                let rows: Vec<DrawRow> = dist
                    .draws
                    .iter()
                    .map(|d| DrawRow {
                        draw_index: d.draw_index,
                        transects: d.transects.len(),
                        estimate: d.estimate,
                    })
                    .collect();
                write_table_file(&path, &rows)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Draws saved to: {}", path.display());
            }
        }

        // ── Transects ────────────────────────────────────────────────
        Commands::Transects {
            input,
            output,
            threshold,
            extents,
            jolly_hampton: with_cv,
        } => {
            let intervals: Vec<IntervalRecord> = read_csv(&input, &config.columns)?;
            let start = Instant::now();
            let corrected = correct_transect_intervals(&intervals, threshold);
            let extent_rows = transect_extents(&intervals);
            let summaries = summarize_transects(&corrected, &extent_rows);
            let elapsed = start.elapsed();

            write_table_file(&output, &summaries)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            if let Some(path) = extents {
                write_table_file(&path, &extent_rows)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Extents saved to: {}", path.display());
            }

            println!("Transects: {}", summaries.len());
            if with_cv {
                let jh = jolly_hampton(&summaries, &config.resampling)
                    .context("Jolly-Hampton CV failed")?;
                println!("Jolly-Hampton (seed {}):", jh.seed);
                println!("  Estimate: {:.6e}", jh.estimate);
                if let Some(cv) = jh.full_cv {
                    println!("  Full-sample CV: {:.4}", cv);
                }
                println!("  Mean CV over {} draws: {:.4}", jh.draw_cv.len(), jh.mean_cv);
            }
            done("Transect summaries", &output, elapsed);
        }

        // ── Strata weight ────────────────────────────────────────────
        Commands::StrataWeight {
            catch,
            specimens,
            output,
        } => {
            let catch: Vec<CatchRecord> = read_csv(&catch, &config.columns)?;
            let specimens: Vec<SpecimenRecord> = read_csv(&specimens, &config.columns)?;
            let (groups, totals) = sum_strata_weight(&catch, &specimens);

            println!("{:>8} {:>10} {:>14}", "stratum", "group", "weight");
            for g in &groups {
                println!("{:>8} {:>10} {:>14.6}", g.stratum_num, format!("{:?}", g.group), g.stratum_weight);
            }
            println!("\n{:>8} {:>14}", "stratum", "total");
            for t in &totals {
                println!("{:>8} {:>14.6}", t.stratum_num, t.weight_stratum_all);
            }

            if let Some(path) = output {
                write_table_file(&path, &totals)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Strata weights saved to: {}", path.display());
            }
        }
    }

    Ok(())
}
