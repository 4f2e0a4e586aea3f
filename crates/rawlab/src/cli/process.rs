//! The `rawlab process` command: batch export with progress.

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use rawlab_core::batch::NamingRule;
use rawlab_core::report::write_report_file;
use rawlab_core::{
    BatchEvent, BatchSummary, ColorSpace, Config, ConflictPolicy, OutputFormat, Resize, Session,
    Sharpening,
};
use std::path::PathBuf;

use super::{build_spec, expand_path};

/// Arguments for the `process` command.
#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Image files or directories to process
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output directory (defaults to export.output_dir)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Preset file to start from
    #[arg(short, long)]
    pub preset: Option<PathBuf>,

    /// Set an adjustment, e.g. --set exposure=0.5 (repeatable)
    #[arg(short, long = "set", value_name = "NAME=VALUE")]
    pub sets: Vec<String>,

    /// Output format: jpeg, png or tiff
    #[arg(short, long, value_parser = parse_format)]
    pub format: Option<OutputFormat>,

    /// JPEG quality (1-100)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: Option<u8>,

    /// Output name template using {stem}, {index} and {ext}
    #[arg(long)]
    pub naming: Option<String>,

    /// What to do when an output exists: overwrite, skip, auto-rename or fail
    #[arg(long, value_parser = parse_conflict)]
    pub on_conflict: Option<ConflictPolicy>,

    /// Output sharpening: none, low, standard or high
    #[arg(long, value_parser = parse_sharpening)]
    pub sharpen: Option<Sharpening>,

    /// Resize outputs to exactly WIDTHxHEIGHT
    #[arg(long, value_parser = parse_resize, value_name = "WxH")]
    pub resize: Option<Resize>,

    /// Color space of the sources: srgb, adobe, prophoto or linear
    #[arg(long, value_parser = parse_color_space)]
    pub color_space: Option<ColorSpace>,

    /// Number of parallel workers (defaults to processing.parallel_workers)
    #[arg(short = 'j', long)]
    pub parallel: Option<usize>,

    /// Write a JSON (.json) or JSON Lines (.jsonl) report of every job
    #[arg(long)]
    pub report: Option<PathBuf>,
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    OutputFormat::parse(s).ok_or_else(|| format!("unknown format '{s}' (expected jpeg, png or tiff)"))
}

fn parse_conflict(s: &str) -> Result<ConflictPolicy, String> {
    ConflictPolicy::parse(s)
        .ok_or_else(|| format!("unknown policy '{s}' (expected overwrite, skip, auto-rename or fail)"))
}

fn parse_sharpening(s: &str) -> Result<Sharpening, String> {
    Sharpening::parse(s)
        .ok_or_else(|| format!("unknown sharpening '{s}' (expected none, low, standard or high)"))
}

pub(crate) fn parse_color_space(s: &str) -> Result<ColorSpace, String> {
    ColorSpace::parse(s)
        .ok_or_else(|| format!("unknown color space '{s}' (expected srgb, adobe, prophoto or linear)"))
}

fn parse_resize(s: &str) -> Result<Resize, String> {
    let (w, h) = s
        .to_lowercase()
        .split_once('x')
        .map(|(w, h)| (w.trim().to_string(), h.trim().to_string()))
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let width: u32 = w.parse().map_err(|_| format!("invalid width '{w}'"))?;
    let height: u32 = h.parse().map_err(|_| format!("invalid height '{h}'"))?;
    if width == 0 || height == 0 {
        return Err("resize dimensions must be > 0".to_string());
    }
    Ok(Resize { width, height })
}

/// Fold command-line overrides into the loaded config.
fn apply_overrides(mut config: Config, args: &ProcessArgs) -> anyhow::Result<Config> {
    if let Some(output) = &args.output {
        config.export.output_dir = expand_path(output);
    }
    if let Some(format) = args.format {
        config.export.format = format;
    }
    if let Some(quality) = args.quality {
        config.export.quality = quality;
    }
    if let Some(naming) = &args.naming {
        NamingRule::parse(naming)?;
        config.export.naming_template = naming.clone();
    }
    if let Some(policy) = args.on_conflict {
        config.export.conflict_policy = policy;
    }
    if let Some(sharpening) = args.sharpen {
        config.export.sharpening = sharpening;
    }
    if args.resize.is_some() {
        config.export.resize = args.resize;
    }
    if let Some(color_space) = args.color_space {
        config.processing.color_space = color_space;
    }
    if let Some(parallel) = args.parallel {
        config.processing.parallel_workers = parallel;
    }
    config.validate()?;
    Ok(config)
}

/// Execute the process command.
pub async fn execute(args: ProcessArgs, config: Config) -> anyhow::Result<()> {
    for input in &args.inputs {
        if !input.exists() {
            anyhow::bail!(
                "Input path does not exist: {:?}\n\n  Hint: Check the file path and try again.",
                input
            );
        }
    }

    let config = apply_overrides(config, &args)?;
    let workers = config.processing.parallel_workers;
    let mut session = Session::new(config);
    session.set_spec(build_spec(args.preset.as_deref(), &args.sets)?);

    let found = session.add_inputs(&args.inputs);
    if found == 0 {
        tracing::warn!("No supported image files found in {:?}", args.inputs);
        return Ok(());
    }
    tracing::info!(
        "Found {} image(s); exporting to {:?}",
        found,
        session.config().output_dir()
    );

    let processor = session.build_processor()?;
    let mut run = processor.run(workers);
    let stop = run.stop_handle();
    let progress = create_progress_bar(found as u64);

    let mut interrupted = false;
    loop {
        tokio::select! {
            event = run.next_event() => match event {
                Some(BatchEvent::Started { source, .. }) => {
                    tracing::debug!("Processing {:?}", source);
                }
                Some(BatchEvent::Finished { result, completed, total }) => {
                    progress.set_position(completed as u64);
                    progress.set_message(format!("{}/{} {}", completed, total, result.outcome.label()));
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                progress.println("Stopping after the jobs in progress...");
                stop.stop();
            }
        }
    }
    progress.finish_and_clear();

    let summary = run.finish().await?;
    print_summary(&summary);

    if let Some(report) = &args.report {
        let report = expand_path(report);
        write_report_file(&report, &summary)
            .with_context(|| format!("Failed to write report {}", report.display()))?;
    }

    if summary.failed > 0 {
        anyhow::bail!("{} of {} job(s) failed", summary.failed, summary.total);
    }
    Ok(())
}

fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    pb.set_style(style);
    pb.set_message("starting...");
    pb
}

/// Print a formatted summary table after the batch.
fn print_summary(summary: &BatchSummary) {
    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Succeeded:    {:>8}", summary.succeeded);
    if summary.skipped > 0 {
        eprintln!("    Skipped:      {:>8}", summary.skipped);
    }
    if summary.failed > 0 {
        eprintln!("    Failed:       {:>8}", summary.failed);
    }
    if summary.cancelled > 0 {
        eprintln!("    Not started:  {:>8}", summary.cancelled);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", summary.total);
    eprintln!("    Duration:     {:>7.1}s", summary.elapsed.as_secs_f64());
    eprintln!("    Rate:         {:>7.1} img/sec", summary.rate());
    eprintln!("  ====================================");

    for failure in &summary.failures {
        eprintln!(
            "    {} {} [{}]: {}",
            failure.job_id,
            failure.source.display(),
            failure.kind,
            failure.message
        );
    }
}
