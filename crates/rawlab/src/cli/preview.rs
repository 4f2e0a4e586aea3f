//! The `rawlab preview` command: render one preview frame to a file.

use clap::Args;
use rawlab_core::codec::decode_with_timeout;
use rawlab_core::{
    AdjustmentPipeline, ColorSpace, Config, ImageDecoder, ImageEncoder, OutputFormat,
    PreviewEngine, PreviewStatus, SourceDecoder, StandardEncoder,
};
use std::path::PathBuf;
use std::sync::Arc;

use super::process::parse_color_space;
use super::{build_spec, expand_path};

/// Arguments for the `preview` command.
#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// Source image
    pub input: PathBuf,

    /// Where to write the preview (format from extension, PNG if unknown)
    #[arg(short, long, default_value = "preview.png")]
    pub output: PathBuf,

    /// Preset file to start from
    #[arg(short, long)]
    pub preset: Option<PathBuf>,

    /// Set an adjustment, e.g. --set clarity=30 (repeatable)
    #[arg(short, long = "set", value_name = "NAME=VALUE")]
    pub sets: Vec<String>,

    /// Longest side of the preview (defaults to preview.max_dimension)
    #[arg(long)]
    pub max_dimension: Option<u32>,

    /// Color space of the source: srgb, adobe, prophoto or linear
    #[arg(long, value_parser = parse_color_space)]
    pub color_space: Option<ColorSpace>,
}

/// Execute the preview command.
pub async fn execute(args: PreviewArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(max) = args.max_dimension {
        config.preview.max_dimension = max;
    }
    if let Some(color_space) = args.color_space {
        config.processing.color_space = color_space;
    }
    config.validate()?;
    let spec = build_spec(args.preset.as_deref(), &args.sets)?;

    let input = expand_path(&args.input);
    let decoder: Arc<dyn SourceDecoder> = Arc::new(
        ImageDecoder::new(config.limits.clone()).with_color_space(config.processing.color_space),
    );
    let source = decode_with_timeout(decoder, &input, config.limits.decode_timeout_ms).await?;
    tracing::info!(
        "Loaded {:?}: {}x{} {}-bit",
        input,
        source.width(),
        source.height(),
        source.bit_depth().bits()
    );

    let engine = PreviewEngine::new(
        Arc::new(AdjustmentPipeline::new()),
        &config.preview,
        Arc::new(source),
    );
    engine.request(spec);
    engine.wait_idle().await;

    let status = engine.status();
    let frame = engine.latest_frame();
    engine.shutdown().await;

    if let PreviewStatus::Failed { message, .. } = status {
        anyhow::bail!("Preview failed: {message}");
    }
    let Some(frame) = frame else {
        anyhow::bail!("Preview produced no frame");
    };

    let output = expand_path(&args.output);
    let format = output
        .extension()
        .and_then(|e| e.to_str())
        .and_then(OutputFormat::parse)
        .unwrap_or(OutputFormat::Png);
    StandardEncoder::new(config.export.quality).encode(&frame.image, format, &output)?;

    println!(
        "Preview {}x{} written to {} ({:.1}ms)",
        frame.image.width(),
        frame.image.height(),
        output.display(),
        frame.render_time.as_secs_f64() * 1000.0
    );
    Ok(())
}
