//! analyze_video - classify sampled frames of a survey video and print a geotagged report
//!
//! This tool:
//! 1. Loads configuration (file named by --config / ROADSCAN_CONFIG, env overrides)
//! 2. Builds the classifier registry once
//! 3. Analyzes the video, classifying every `stride`-th frame
//! 4. Writes the report as JSON (stdout or --output) and optionally GeoJSON

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use roadscan::{
    AnalysisError, AnalyzerConfig, ClassifierRegistry, FileConfig, FileSource, Frame,
    FrameSource, VideoAnalyzer,
};

#[path = "../ui.rs"]
mod ui;

const EXIT_BAD_INPUT: u8 = 2;
const EXIT_NO_OBSERVATIONS: u8 = 3;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Local video path, or stub://name?frames=N for a synthetic video.
    #[arg(long, value_name = "PATH")]
    video: String,
    /// Category to classify (defaults to the configured default category).
    #[arg(long)]
    category: Option<String>,
    /// Classify every Nth frame (defaults to the configured stride).
    #[arg(long)]
    stride: Option<u64>,
    /// Fixed trajectory seed for reproducible geotags.
    #[arg(long)]
    seed: Option<u64>,
    /// Configuration file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "ROADSCAN_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,
    /// Write the report JSON here instead of stdout.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    /// Also write geotags as a GeoJSON FeatureCollection.
    #[arg(long, value_name = "PATH")]
    geojson: Option<PathBuf>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

/// Ticks the frame progress bar as the analyzer pulls frames.
struct ProgressSource<'a> {
    inner: FileSource,
    ui: &'a ui::Ui,
    progress: Option<ui::FrameProgress>,
}

impl FrameSource for ProgressSource<'_> {
    fn describe(&self) -> String {
        self.inner.describe()
    }

    fn connect(&mut self) -> Result<()> {
        self.inner.connect()?;
        self.progress = Some(self.ui.frame_progress(self.inner.total_frame_count()));
        Ok(())
    }

    fn total_frame_count(&self) -> u64 {
        self.inner.total_frame_count()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame = self.inner.next_frame()?;
        if let (Some(_), Some(progress)) = (&frame, &self.progress) {
            progress.tick();
        }
        Ok(frame)
    }

    fn close(&mut self) {
        self.inner.close();
        self.progress = None;
    }
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty && args.output.is_none());

    let config = {
        let _stage = ui.stage("Load configuration");
        AnalyzerConfig::load_from(args.config.as_deref())?
    };
    let category = args
        .category
        .clone()
        .unwrap_or_else(|| config.default_category.clone());
    let stride = args.stride.unwrap_or(config.stride);

    let analyzer = {
        let _stage = ui.stage("Load classifier models");
        let registry = Arc::new(ClassifierRegistry::from_config(&config)?);
        VideoAnalyzer::from_config(&config, registry)?.with_seed(args.seed.or(config.seed))
    };

    let mut source = ProgressSource {
        inner: FileSource::new(FileConfig {
            path: args.video.clone(),
        })?,
        ui: &ui,
        progress: None,
    };

    let result = {
        let _stage = ui.stage("Analyze video");
        analyzer.analyze(&mut source, &category, stride)
    };
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            log::error!("{}", e);
            let code = match e {
                AnalysisError::NoObservations { .. } => EXIT_NO_OBSERVATIONS,
                ref other if other.is_client_error() => EXIT_BAD_INPUT,
                _ => 1,
            };
            return Ok(ExitCode::from(code));
        }
    };

    let json = serde_json::to_string_pretty(&report)?;
    match &args.output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("writing report to {}", path.display()))?,
        None => println!("{json}"),
    }
    if let Some(path) = &args.geojson {
        let geojson = serde_json::to_string_pretty(&report.to_geojson())?;
        std::fs::write(path, geojson)
            .with_context(|| format!("writing geojson to {}", path.display()))?;
    }

    eprintln!("analyze_video summary:");
    eprintln!("  category: {}", report.category);
    eprintln!("  frames declared: {}", report.total_frames);
    eprintln!("  frames analyzed: {}", report.analyzed_frame_count);
    eprintln!("  damaged: {:.2}%", report.damage_percentage);
    eprintln!("  critical frames: {}", report.critical_frames);
    for (label, percent) in &report.summary {
        eprintln!("  {label}: {percent:.2}%");
    }

    Ok(ExitCode::SUCCESS)
}
