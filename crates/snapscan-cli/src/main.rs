//! snapscan CLI - detect, rectify and compress a photographed receipt.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use snapscan_core::{
    DetectStrategy, OriginalSpace, PreviewSpace, Quad, ScanConfig, ScanSession, OUTPUT_FILE_NAME,
};

#[derive(Parser, Debug)]
#[command(name = "snapscan")]
#[command(about = "Find a document in a photo, flatten it, and save a size-capped JPEG")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Detect the document quad and print it as JSON.
    Detect {
        /// Captured image (JPEG or PNG).
        input: PathBuf,

        #[command(flatten)]
        settings: Settings,
    },

    /// Detect, rectify and encode a capture.
    Scan {
        /// Captured image (JPEG or PNG).
        input: PathBuf,

        /// Output JPEG path.
        #[arg(short, long, default_value = OUTPUT_FILE_NAME)]
        output: PathBuf,

        /// Override the detected quad: eight comma-separated preview coordinates.
        #[arg(long, value_parser = parse_quad)]
        quad: Option<Quad<PreviewSpace>>,

        /// Starting JPEG quality, 0.0 to 1.0.
        #[arg(long)]
        quality: Option<f32>,

        #[command(flatten)]
        settings: Settings,
    },

    /// Print the default configuration as JSON.
    DefaultConfig,
}

#[derive(Args, Debug, Clone, Default)]
struct Settings {
    /// JSON configuration file; missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output size limit in KB.
    #[arg(long)]
    size_limit_kb: Option<u32>,

    /// Detection strategy: adaptive-threshold or edges.
    #[arg(long)]
    strategy: Option<DetectStrategy>,
}

impl Settings {
    fn resolve(&self) -> Result<ScanConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => ScanConfig::default(),
        };
        if let Some(kb) = self.size_limit_kb {
            config.size_limit_kb = kb;
        }
        if let Some(strategy) = self.strategy {
            config.detect_strategy = strategy;
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_quad(s: &str) -> Result<Quad<PreviewSpace>, String> {
    let coords = s
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid coordinate: {e}"))?;
    let flat: [f64; 8] = coords
        .as_slice()
        .try_into()
        .map_err(|_| format!("expected 8 coordinates, got {}", coords.len()))?;
    Ok(Quad::from_flat(flat))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect { input, settings } => {
            let report = run_detect(&input, &settings.resolve()?)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Scan {
            input,
            output,
            quad,
            quality,
            settings,
        } => {
            let summary = run_scan(&input, &output, quad, quality, &settings.resolve()?)?;
            println!("{summary}");
            Ok(())
        }
        Commands::DefaultConfig => {
            println!("{}", serde_json::to_string_pretty(&ScanConfig::default())?);
            Ok(())
        }
    }
}

fn load_session(input: &Path, config: &ScanConfig) -> Result<ScanSession> {
    let bytes = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let mut session = ScanSession::new(config.clone())?;
    let provenance = session
        .load_capture(&bytes)
        .with_context(|| format!("Failed to load {}", input.display()))?;
    tracing::info!(provenance = provenance.as_str(), "Capture loaded: {}", input.display());
    Ok(session)
}

fn run_detect(input: &Path, config: &ScanConfig) -> Result<serde_json::Value> {
    let session = load_session(input, config)?;
    let (Some(preview), Some(quad), Some(provenance)) =
        (session.preview(), session.quad(), session.provenance())
    else {
        bail!("No capture loaded from {}", input.display());
    };
    let original = quad.scale_to::<OriginalSpace>(preview.scale_factor);
    Ok(json!({
        "provenance": provenance.as_str(),
        "preview_size": [preview.image.width, preview.image.height],
        "scale_factor": preview.scale_factor,
        "quad": quad.to_flat(),
        "original_quad": original.to_flat(),
    }))
}

fn run_scan(
    input: &Path,
    output: &Path,
    quad: Option<Quad<PreviewSpace>>,
    quality: Option<f32>,
    config: &ScanConfig,
) -> Result<String> {
    let mut session = load_session(input, config)?;
    if let Some(quad) = quad {
        session.set_quad(quad)?;
    }
    if let Some(quality) = quality {
        session.set_quality(quality)?;
    }

    let rectified = session.commit_crop().context("Failed to rectify document")?;
    tracing::info!("Rectified to {}x{}", rectified.width, rectified.height);

    let result = session.encode().context("Failed to encode document")?;
    if !result.budget_met {
        tracing::warn!(
            achieved_size = result.achieved_size,
            "Output is still over the size limit"
        );
    }
    fs::write(output, &result.bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    tracing::info!("Wrote {}", output.display());

    session
        .summary()
        .map(|s| s.to_string())
        .context("Encode produced no summary")
}
