//! reelgen: turn an X/Twitter video post into a vertical reel.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error, info};

use reelgen_media::{check_ffmpeg, check_ffprobe, check_ytdlp};
use reelgen_models::{is_supported_post_url, BackgroundMode, Resolution};
use reelgen_worker::logging::json_logs_requested;
use reelgen_worker::{init_tracing, ReelConfig, ReelPipeline, ReelSummary};

#[derive(Debug, Parser)]
#[command(name = "reelgen", version, about = "Compose a vertical reel from an X/Twitter video post")]
struct Cli {
    /// Post URL (x.com or twitter.com)
    url: String,

    /// Source resolution ceiling: 360p, 480p, 720p or 1080p
    #[arg(long, default_value = "720p")]
    resolution: String,

    /// Canvas background: light or dark
    #[arg(long, default_value = "light")]
    background: BackgroundMode,

    /// Output directory (overrides REEL_OUTPUT_DIR)
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }

    dotenvy::dotenv().ok();
    init_tracing(json_logs_requested()).context("invalid tracing filter")?;

    let cli = Cli::parse();

    if !is_supported_post_url(&cli.url) {
        error!(url = %cli.url, "Unsupported post URL");
        eprintln!("unsupported URL: only x.com and twitter.com posts are accepted");
        return Ok(ExitCode::from(2));
    }

    check_ffmpeg().context("ffmpeg is required")?;
    check_ffprobe().context("ffprobe is required")?;
    check_ytdlp().context("yt-dlp is required")?;

    let mut config = ReelConfig::from_env();
    if let Some(dir) = cli.output_dir {
        config = config.with_output_dir(dir);
    }
    info!("Reel config: {:?}", config);

    let resolution = Resolution::from_label_or_default(&cli.resolution);
    let pipeline = ReelPipeline::from_config(config).context("failed to initialise pipeline")?;

    match pipeline.run(&cli.url, resolution, cli.background).await {
        Ok((artifact, metadata)) => {
            let summary = ReelSummary::new(&artifact, &metadata).await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(error = %e, "Reel generation failed");
            eprintln!("{}", e.user_message());
            Ok(ExitCode::FAILURE)
        }
    }
}
