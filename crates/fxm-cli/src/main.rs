//! fxm CLI — command-line FXm cell-volume analysis.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use fxm_core::{
    classify_outliers, measure, segment, Calibration, Connectivity, Measurement, MeasurementTable,
    OutlierColumn, SegmentConfig, VolumeSummary,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "fxm")]
#[command(about = "Quantify single-cell volumes from fluorescence-exclusion microscopy images")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze every image/mask unit found under a directory.
    Analyze(CliAnalyzeArgs),

    /// Re-read a saved analysis table and print its statistics.
    Stats(CliStatsArgs),
}

#[derive(Debug, Clone, Args)]
struct CliAnalyzeArgs {
    /// Path to the analysis directory.
    path: PathBuf,

    /// Height of the microfluidic chamber in µm.
    #[arg(long)]
    chamber_height: f64,

    /// Pixel size in µm, from the camera pixel size and the magnification
    /// used.
    #[arg(long, default_value = "0.325")]
    pixel_size: f64,

    /// IQR factor used to flag outliers; may be repeated. Lower thresholds
    /// are more restrictive.
    #[arg(short = 't', long = "threshold")]
    thresholds: Vec<f64>,

    /// File name of the normalized intensity image inside each unit.
    #[arg(long, default_value = "image.tif")]
    image_name: String,

    /// File name of the normalization mask inside each unit.
    #[arg(long, default_value = "mask.png")]
    mask_name: String,

    /// Path to write the analysis table (TSV).
    #[arg(long)]
    out: PathBuf,

    /// Optional path to write the table as JSON.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Pixel connectivity for component extraction.
    #[arg(long, value_enum, default_value_t = ConnectivityArg::Four)]
    connectivity: ConnectivityArg,

    /// Maximum region surface in pixels before a region is treated as a
    /// support pillar.
    #[arg(long, default_value = "20000")]
    max_region_px: u64,

    /// Minimum centroid distance to the image edge, in pixels.
    #[arg(long, default_value = "100")]
    edge_margin: u32,
}

#[derive(Debug, Clone, Args)]
struct CliStatsArgs {
    /// Path to a .tsv analysis table written by `fxm analyze`.
    table: PathBuf,

    /// Filter column to report on; defaults to every filter column present.
    #[arg(long)]
    filter: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ConnectivityArg {
    Four,
    Eight,
}

impl ConnectivityArg {
    fn to_core(self) -> Connectivity {
        match self {
            Self::Four => Connectivity::Four,
            Self::Eight => Connectivity::Eight,
        }
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(args) => run_analyze(&args),
        Commands::Stats(args) => run_stats(&args),
    }
}

// ── analyze ────────────────────────────────────────────────────────────

fn run_analyze(args: &CliAnalyzeArgs) -> CliResult<()> {
    if !args.path.is_dir() {
        return Err(format!("analysis directory {} does not exist", args.path.display()).into());
    }

    let segment_config = SegmentConfig {
        max_region_px: args.max_region_px,
        edge_margin_px: args.edge_margin,
        connectivity: args.connectivity.to_core(),
    };
    let calibration = Calibration {
        chamber_height_um: args.chamber_height,
        pixel_size_um: args.pixel_size,
    };

    let mut units = Vec::new();
    collect_units(&args.path, &args.image_name, &args.mask_name, &mut units)?;
    if units.is_empty() {
        return Err(format!(
            "no {}/{} pairs found under {}; have you normalized your images?",
            args.image_name,
            args.mask_name,
            args.path.display()
        )
        .into());
    }
    tracing::info!("Found {} analysis units", units.len());

    let mut table = MeasurementTable::new();
    for unit in &units {
        match analyze_unit(unit, args, &segment_config, &calibration) {
            Ok(measurements) if measurements.is_empty() => {
                tracing::info!("{}: no cells in image", unit.display());
            }
            Ok(measurements) => {
                tracing::info!("{}: {} cells", unit.display(), measurements.len());
                table.append(measurements, &unit.display().to_string());
            }
            Err(e) => {
                tracing::warn!("{}: analysis failed: {}", unit.display(), e);
            }
        }
    }

    if table.is_empty() {
        return Err("no data obtained: every unit was empty or failed".into());
    }

    let mut thresholds = if args.thresholds.is_empty() {
        vec![1.0]
    } else {
        args.thresholds.clone()
    };
    thresholds.sort_by(f64::total_cmp);
    thresholds.dedup();

    let columns = classify_outliers(&table.volumes(), &thresholds);
    for column in &columns {
        table.push_outlier_column(column)?;
    }

    for column in &columns {
        print_filter_report(&table, column);
    }
    println!("{}", "-".repeat(40));

    let file = File::create(&args.out)?;
    table.write_tsv(&mut BufWriter::new(file))?;
    println!("Output file: {}", args.out.display());

    if let Some(json_path) = &args.json {
        let json = serde_json::to_string_pretty(&table)?;
        std::fs::write(json_path, &json)?;
        tracing::info!("JSON table written to {}", json_path.display());
    }

    Ok(())
}

/// Recursively collect directories containing both the image and mask
/// files, in sorted order for deterministic output.
fn collect_units(
    dir: &Path,
    image_name: &str,
    mask_name: &str,
    units: &mut Vec<PathBuf>,
) -> CliResult<()> {
    if dir.join(image_name).is_file() && dir.join(mask_name).is_file() {
        units.push(dir.to_path_buf());
    }
    let mut subdirs: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_dir())
        .collect();
    subdirs.sort();
    for subdir in subdirs {
        collect_units(&subdir, image_name, mask_name, units)?;
    }
    Ok(())
}

fn analyze_unit(
    unit: &Path,
    args: &CliAnalyzeArgs,
    segment_config: &SegmentConfig,
    calibration: &Calibration,
) -> CliResult<Vec<Measurement>> {
    let image_path = unit.join(&args.image_name);
    let image = image::open(&image_path)
        .map_err(|e| -> CliError {
            format!("failed to open image {}: {}", image_path.display(), e).into()
        })?
        .to_luma32f();

    let mask_path = unit.join(&args.mask_name);
    let mask = image::open(&mask_path)
        .map_err(|e| -> CliError {
            format!("failed to open mask {}: {}", mask_path.display(), e).into()
        })?
        .to_luma8();

    let (labels, _) = segment(&mask, segment_config);
    let measurements = measure(&image, &mask, &labels, calibration)?;
    Ok(measurements)
}

fn print_filter_report(table: &MeasurementTable, column: &OutlierColumn) {
    println!("{}", "-".repeat(40));
    println!("AUTOMATICALLY FILTERED DATA ({}*IQR):", column.threshold);
    println!("{}", "-".repeat(40));

    let accepted = table
        .accepted_volumes(&column.name)
        .unwrap_or_else(|| table.volumes());
    print_summary(table.len(), &VolumeSummary::describe(&accepted));

    let c = &column.counts;
    println!();
    println!("{:16}{} ({:.1} %)", "Low outliers:", c.n_low, c.pct_low);
    println!("{:16}{} ({:.1} %)", "High outliers:", c.n_high, c.pct_high);
    println!("{:16}{} ({:.1} %)", "Total outliers:", c.n_total, c.pct_total);
    println!();
}

fn print_summary(n_objects: usize, summary: &VolumeSummary) {
    println!("Total number\n{:16}{}", "of objects:", n_objects);
    println!("{:16}{}", "Accepted cells:", summary.count);
    if summary.count == 0 {
        return;
    }
    println!();
    println!("{:16}{:.1} µm3", "Mean volume:", summary.mean);
    println!("{:16}{:.1} µm3", "Volume stdev:", summary.std_dev);
    println!("{:16}{:.1} µm3", "Min. volume:", summary.min);
    println!("{:16}{:.1} µm3", "1st quartile:", summary.q1);
    println!("{:16}{:.1} µm3", "Median:", summary.median);
    println!("{:16}{:.1} µm3", "Mean absdev:", summary.mad);
    println!("{:16}{:.1} µm3", "3rd quartile:", summary.q3);
    println!("{:16}{:.1} µm3", "Max. volume:", summary.max);
}

// ── stats ──────────────────────────────────────────────────────────────

fn run_stats(args: &CliStatsArgs) -> CliResult<()> {
    let file = File::open(&args.table)
        .map_err(|e| -> CliError { format!("cannot open {}: {}", args.table.display(), e).into() })?;
    let table = MeasurementTable::read_tsv(BufReader::new(file))?;

    let filter_names: Vec<String> = match &args.filter {
        Some(name) => {
            if table.filters().iter().all(|f| f.name != *name) {
                return Err(format!(
                    "table has no filter column '{}'; available: {}",
                    name,
                    table
                        .filters()
                        .iter()
                        .map(|f| f.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
                .into());
            }
            vec![name.clone()]
        }
        None => table.filters().iter().map(|f| f.name.clone()).collect(),
    };

    if filter_names.is_empty() {
        println!("{}", "-".repeat(40));
        println!("UNFILTERED DATA:");
        println!("{}", "-".repeat(40));
        print_summary(table.len(), &VolumeSummary::describe(&table.volumes()));
        return Ok(());
    }

    for name in &filter_names {
        let accepted = table
            .accepted_volumes(name)
            .expect("filter name checked above");
        println!("{}", "-".repeat(40));
        println!("FILTERED DATA, column {}:", name);
        println!("{}", "-".repeat(40));
        print_summary(table.len(), &VolumeSummary::describe(&accepted));
        println!();
    }

    Ok(())
}
