//! casegen-analyze: Command-line video-to-test-case analyzer.
//!
//! Runs the analysis pipeline synchronously on one recording and prints the
//! result envelope as JSON.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use casegen_pipeline::{AnalysisConfig, Error, VideoAnalysisPipeline};

#[derive(Parser)]
#[command(name = "casegen-analyze")]
#[command(author, version, about = "Generate a QA test case from a screen recording")]
struct Cli {
    /// Video file to analyze
    #[arg(required_unless_present = "probe")]
    video: Option<PathBuf>,

    /// Filename to report (default: the video's file name)
    #[arg(short, long)]
    filename: Option<String>,

    /// Number of frames to sample (3-5)
    #[arg(long)]
    frames: Option<usize>,

    /// Print compact JSON instead of pretty-printed
    #[arg(long)]
    compact: bool,

    /// Print external tool availability and exit
    #[arg(long)]
    probe: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            match e.downcast_ref::<Error>() {
                Some(Error::InvalidInput(_)) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = AnalysisConfig::from_env();
    if let Some(frames) = cli.frames {
        config = config.with_frame_count(frames);
    }
    let pipeline = VideoAnalysisPipeline::from_config(config)?;

    if cli.probe {
        let report = pipeline.tool_report().await;
        print_json(&report, cli.compact)?;
        return Ok(());
    }

    let video = cli.video.context("a video path is required")?;
    let filename = cli.filename.unwrap_or_default();
    let envelope = pipeline.run(&video, &filename).await?;
    print_json(&envelope, cli.compact)
}

fn print_json<T: serde::Serialize>(value: &T, compact: bool) -> anyhow::Result<()> {
    let json = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", json);
    Ok(())
}
