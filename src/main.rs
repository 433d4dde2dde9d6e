//! Process entry point.
//!
//! # Startup sequence
//!
//! 1. Initialise logging (`RUST_LOG`, default `info`).
//! 2. Load [`PipelineConfig`] (defaults when no file), apply CLI overrides,
//!    validate.
//! 3. Load the classifier weight blob.
//! 4. Scan the skills directory.
//! 5. Open the capture device and start the input stream.
//! 6. Build the speech engine and run the pipeline until the stream ends.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use wakeline::audio::AudioCapture;
use wakeline::classifier::load_weights;
use wakeline::config::PipelineConfig;
use wakeline::pipeline::Pipeline;
use wakeline::skills::load_skills;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Always-on offline wake-word detector with regex-routed skills.
#[derive(Debug, Parser)]
#[command(name = "wakeline", version, about)]
struct Cli {
    /// Classifier weight blob (flat little-endian f32).
    #[arg(long)]
    weights: PathBuf,

    /// Wake probability threshold in (0, 1).
    #[arg(long)]
    threshold: f32,

    /// Speech model directory.
    #[arg(long)]
    model: PathBuf,

    /// Optional TOML config file; defaults are used when absent.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured skills directory.
    #[arg(long)]
    skills_dir: Option<PathBuf>,

    /// Override the configured wake lexeme.
    #[arg(long)]
    lexeme: Option<String>,

    /// Input device name; the system default when omitted.
    #[arg(long)]
    device: Option<String>,
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config.threshold = cli.threshold;
    if let Some(dir) = cli.skills_dir {
        config.skills_dir = dir;
    }
    if let Some(lexeme) = cli.lexeme {
        config.wake_lexeme = lexeme;
    }
    config.validate().context("invalid configuration")?;

    let net = load_weights(&cli.weights)
        .with_context(|| format!("loading weights from {}", cli.weights.display()))?;

    let skills = load_skills(&config.skills_dir)
        .with_context(|| format!("loading skills from {}", config.skills_dir.display()))?;

    let capture = AudioCapture::new(cli.device.as_deref(), config.sample_rate)
        .context("opening capture device")?;
    let (source, _stream) = capture.start().context("starting capture stream")?;

    let engine = build_engine(&cli.model, config.sample_rate)?;

    log::info!(
        "wakeline: listening for \"{}\" (threshold {})",
        config.wake_lexeme,
        config.threshold
    );

    let pipeline = Pipeline::new(
        config,
        Box::new(source),
        Box::new(net),
        engine,
        Box::new(skills),
    )?;
    pipeline.run().context("pipeline failed")?;
    Ok(())
}

#[cfg(feature = "vosk")]
fn build_engine(
    model: &std::path::Path,
    sample_rate: u32,
) -> Result<Box<dyn wakeline::speech::SpeechEngine>> {
    let engine = wakeline::speech::VoskEngine::new(model, sample_rate)
        .with_context(|| format!("loading speech model from {}", model.display()))?;
    Ok(Box::new(engine))
}

#[cfg(not(feature = "vosk"))]
fn build_engine(
    _model: &std::path::Path,
    _sample_rate: u32,
) -> Result<Box<dyn wakeline::speech::SpeechEngine>> {
    anyhow::bail!("this build has no speech backend; rebuild with --features vosk")
}
