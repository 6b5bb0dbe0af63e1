// main.rs

// --- External Crate Imports ---
use anyhow::{anyhow, Context, Error, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use std::{fs, path::PathBuf, time::Instant};

use assoc_panel::associate::{associate, AssociationConfig};
use assoc_panel::bundle::{self, BundleEntry, MatrixSource};
use assoc_panel::matrix::{self, ValueType};
use assoc_panel::observer::LogObserver;
use assoc_panel::panel::{build_panel, PanelRenderer, TsvPanelWriter};
use assoc_panel::scoring;
use assoc_panel::selection::Selection;

// --- Main Function ---
fn main() -> Result<(), Error> {
    let total_time_start = Instant::now();
    let cli_args = cli::CliArgs::parse();

    // Initialize logger
    let log_level = cli_args
        .log_level
        .parse::<log::LevelFilter>()
        .unwrap_or_else(|_| {
            eprintln!(
                "Warning: Invalid log level '{}' provided. Defaulting to Info.",
                cli_args.log_level
            );
            log::LevelFilter::Info
        });
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_micros()
        .init();

    info!("Starting assoc_panel with args: {:?}", cli_args);

    // Configure Rayon thread pool
    let num_threads = cli_args.threads.unwrap_or_else(num_cpus::get);
    info!("Using {} threads for parallel operations.", num_threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()?;

    // --- 1. Load Target ---
    info!("Reading target from {}", cli_args.target.display());
    let mut target = matrix::read_target_tsv(&cli_args.target)
        .with_context(|| format!("failed to read target {}", cli_args.target.display()))?;
    if let Some(name) = &cli_args.target_name {
        target.name = name.clone();
    }
    let target_type: ValueType = cli_args.target_type.parse()?;
    info!("Target {}: {} samples.", target.name, target.len());

    // --- 2. Collect Bundle Entries ---
    let entries: Vec<BundleEntry> = if let Some(bundle_path) = &cli_args.bundle {
        info!("Reading features bundle from {}", bundle_path.display());
        bundle::read_bundle_file(bundle_path)?
    } else if let Some(features_path) = &cli_args.features {
        let name = features_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "features".to_string());
        vec![BundleEntry {
            name,
            source: MatrixSource::File(features_path.clone()),
            value_type: cli_args.features_type.parse()?,
            ascending: cli_args.ascending,
            extract: None,
        }]
    } else {
        return Err(anyhow!("either --features or --bundle must be given"));
    };
    info!("Processing {} feature matrix(es).", entries.len());

    // --- 3. Shared Run Configuration ---
    let selection = match cli_args.n_features.as_str() {
        "none" => None,
        other => Some(other.parse::<Selection>()?),
    };
    let metric = scoring::metric_by_name(&cli_args.metric)?;
    let config = AssociationConfig {
        n_jobs: num_threads,
        min_per_job: cli_args.min_per_job,
        ci_selection: selection,
        n_samplings: cli_args.n_samplings,
        confidence: cli_args.confidence,
        n_permutations: cli_args.n_permutations,
        ascending: cli_args.ascending,
        seed: cli_args.seed,
    };

    let output_prefix_path = PathBuf::from(&cli_args.output_prefix);
    if let Some(parent) = output_prefix_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                anyhow!("Failed to create output directory {}: {}", parent.display(), e)
            })?;
            info!("Created output directory: {}", parent.display());
        }
    }

    // --- 4. One Association Panel per Entry ---
    let pb_style = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} panels ({percent}%) ETA: {eta}",
        )
        .map_err(|e| anyhow!("Failed to create progress bar style: {}", e))?
        .progress_chars("=> ");
    let pb = ProgressBar::new(entries.len() as u64).with_style(pb_style);

    for entry in entries {
        let title = format!("{} vs {}", target.name, entry.name);
        info!("{} ...", title);

        let resolved = entry
            .resolve()
            .with_context(|| format!("failed to resolve bundle entry for {}", title))?;
        debug!(
            "Resolved {}: {} features x {} samples.",
            resolved.name,
            resolved.matrix.nrows(),
            resolved.matrix.ncols()
        );

        let mut entry_config = config.clone();
        entry_config.ascending = resolved.ascending;
        let result = associate(
            &target,
            &resolved.matrix,
            metric.as_ref(),
            &entry_config,
            &LogObserver,
        )
        .with_context(|| format!("association failed for {}", title))?;

        let slug = slugify(&title);
        let scores_path = PathBuf::from(format!("{}.{}.scores.tsv", cli_args.output_prefix, slug));
        result.table.write_tsv(&scores_path)?;
        info!("Wrote {}", scores_path.display());

        match &selection {
            Some(display) => {
                let panel = build_panel(
                    &result,
                    display,
                    target_type,
                    resolved.value_type,
                    title.clone(),
                );
                let panel_path =
                    PathBuf::from(format!("{}.{}.panel.tsv", cli_args.output_prefix, slug));
                TsvPanelWriter {
                    path: panel_path.clone(),
                }
                .render(&panel)?;
                info!("Wrote {}", panel_path.display());
            }
            None => debug!("No selection policy; skipping panel output for {}.", title),
        }
        pb.inc(1);
    }
    pb.finish_with_message("association panels complete");

    info!(
        "assoc_panel finished successfully in {:.2?}.",
        total_time_start.elapsed()
    );
    Ok(())
}

fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

// --- Module Implementations ---

mod cli {
    use clap::Parser; // For the derive macro to find Parser
    use std::path::PathBuf;

    #[derive(Parser, Debug)]
    #[command(author, version, about = "Feature-target association panels with bootstrap CIs and permutation FDR.", long_about = None, propagate_version = true)]
    pub(crate) struct CliArgs {
        /// Two-column TSV: sample identifier and target value.
        #[arg(short = 'T', long = "target", required = true)]
        pub(crate) target: PathBuf,

        /// Override the target name read from the file header.
        #[arg(long = "target-name")]
        pub(crate) target_name: Option<String>,

        #[arg(long = "target-type", default_value = "continuous")]
        pub(crate) target_type: String,

        /// Feature-by-sample TSV matrix.
        #[arg(
            short = 'f',
            long = "features",
            conflicts_with = "bundle",
            required_unless_present = "bundle"
        )]
        pub(crate) features: Option<PathBuf>,

        #[arg(long = "features-type", default_value = "continuous")]
        pub(crate) features_type: String,

        /// JSON bundle of feature-matrix descriptors; one panel per entry.
        #[arg(short = 'b', long = "bundle")]
        pub(crate) bundle: Option<PathBuf>,

        #[arg(short = 'o', long = "out", required = true)]
        pub(crate) output_prefix: String,

        /// Association measure: pearson or spearman.
        #[arg(long, default_value = "pearson")]
        pub(crate) metric: String,

        /// Count (>= 1), quantile fraction (< 1), or 'none' to skip CIs.
        #[arg(long = "n-features", default_value = "0.95")]
        pub(crate) n_features: String,

        /// Bootstrap resampling rounds for the confidence interval.
        #[arg(long = "n-samplings", default_value_t = 30)]
        pub(crate) n_samplings: usize,

        #[arg(long, default_value_t = 0.95)]
        pub(crate) confidence: f64,

        /// Permutation rounds for p-values and FDR.
        #[arg(long = "n-permutations", default_value_t = 30)]
        pub(crate) n_permutations: usize,

        /// Sort scores ascending (bundle entries override this per entry).
        #[arg(long)]
        pub(crate) ascending: bool,

        /// Minimum features per worker before parallel dispatch pays off.
        #[arg(long = "min-per-job", default_value_t = 100)]
        pub(crate) min_per_job: usize,

        #[arg(short = 't', long)]
        pub(crate) threads: Option<usize>,

        /// Seed for bootstrap draws and permutation shuffles.
        #[arg(long)]
        pub(crate) seed: Option<u64>,

        #[arg(long, default_value = "Info")]
        pub(crate) log_level: String,
    }
}
