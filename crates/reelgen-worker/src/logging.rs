//! Tracing setup and structured run logging.
//!
//! Library crates only emit events. The binary installs the subscriber
//! once through [`init_tracing`].

use tracing::{error, info, warn, Span};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Directive added on top of `RUST_LOG`.
pub const DEFAULT_DIRECTIVE: &str = "reelgen=info";

/// Whether `LOG_FORMAT=json` is set.
pub fn json_logs_requested() -> bool {
    std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false)
}

/// Install the global subscriber: JSON lines when `json` is set, colored
/// human-readable output otherwise.
pub fn init_tracing(json: bool) -> Result<(), ParseError> {
    let env_filter = EnvFilter::from_default_env().add_directive(DEFAULT_DIRECTIVE.parse()?);

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    Ok(())
}

/// Run logger with the post URL and current stage attached to every event.
#[derive(Debug, Clone)]
pub struct RunLogger {
    post_url: String,
    stage: String,
}

impl RunLogger {
    pub fn new(post_url: &str, stage: &str) -> Self {
        Self {
            post_url: post_url.to_string(),
            stage: stage.to_string(),
        }
    }

    /// Logger for the next stage of the same run.
    pub fn for_stage(&self, stage: &str) -> Self {
        Self::new(&self.post_url, stage)
    }

    pub fn log_start(&self, message: &str) {
        info!(
            post_url = %self.post_url,
            stage = %self.stage,
            "Stage started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            post_url = %self.post_url,
            stage = %self.stage,
            "Stage progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            post_url = %self.post_url,
            stage = %self.stage,
            "Stage warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            post_url = %self.post_url,
            stage = %self.stage,
            "Stage error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            post_url = %self.post_url,
            stage = %self.stage,
            "Stage completed: {}", message
        );
    }

    pub fn post_url(&self) -> &str {
        &self.post_url
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Span covering the whole run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("reel_run", post_url = %self.post_url)
    }
}
