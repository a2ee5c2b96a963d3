//! Record command handler.
//!
//! Orchestrates: validate options -> record -> probe the video -> render summary.

use crate::commands::Cli;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::{OutputFormat, ProgressReporter};
use scrollreel::{
    probe_video, BrowserConfig, BrowserLauncher, FfmpegEncoder, ImageArtifact, OutcomeStatus,
    RecordOptions, RecorderSettings, RecordingOutcome, ScrollRecorder, VideoArtifact, VideoProbe,
    Viewport,
};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use tracing::debug;

/// Exit code for a run that produced every enabled artifact
pub const EXIT_COMPLETE: u8 = 0;
/// Exit code for fatal errors
pub const EXIT_FATAL: u8 = 1;
/// Exit code when the video exists but the GIF failed
pub const EXIT_IMAGE_FAILED: u8 = 2;
/// Exit code when transcoding failed and the raw capture was preserved
pub const EXIT_DEGRADED: u8 = 3;

/// Process exit code for a finished run
#[must_use]
pub const fn exit_code(status: OutcomeStatus) -> u8 {
    match status {
        OutcomeStatus::Complete => EXIT_COMPLETE,
        OutcomeStatus::ImageFailed => EXIT_IMAGE_FAILED,
        OutcomeStatus::Degraded => EXIT_DEGRADED,
    }
}

/// What a finished run reports to the user
#[derive(Debug, Clone, Serialize)]
pub struct RecordSummary {
    /// Overall classification
    pub status: OutcomeStatus,
    /// Title shown in the chrome
    pub title: String,
    /// Scroll steps executed
    pub scroll_steps: u64,
    /// Video artifact
    pub video: VideoArtifact,
    /// Derived image artifact
    pub image: ImageArtifact,
    /// ffprobe metadata of the transcoded video, when available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe: Option<VideoProbe>,
}

impl RecordSummary {
    /// Summarise an outcome
    #[must_use]
    pub fn new(outcome: RecordingOutcome, probe: Option<VideoProbe>) -> Self {
        Self {
            status: outcome.status(),
            title: outcome.title,
            scroll_steps: outcome.scroll_steps,
            video: outcome.video,
            image: outcome.image,
            probe,
        }
    }
}

/// Launch configuration from the browser flags
#[must_use]
pub fn browser_config(cli: &Cli) -> BrowserConfig {
    let mut config = BrowserConfig::default()
        .with_window(Viewport::new(cli.width, cli.height))
        .with_headless(!cli.headed);
    if let Some(ref path) = cli.chromium {
        config = config.with_chromium_path(path.clone());
    }
    if cli.no_sandbox {
        config = config.with_no_sandbox();
    }
    config
}

/// Execute the record command and return the outcome status
#[cfg(feature = "browser")]
pub fn execute_record(cli: &Cli, config: &CliConfig) -> CliResult<OutcomeStatus> {
    let options = cli.record_options();
    options.validate()?;
    let launcher = scrollreel::CdpLauncher::new(browser_config(cli));
    record_with(cli, config, &options, launcher)
}

/// Execute the record command and return the outcome status
#[cfg(not(feature = "browser"))]
pub fn execute_record(cli: &Cli, _config: &CliConfig) -> CliResult<OutcomeStatus> {
    cli.record_options().validate()?;
    Err(CliError::runtime(
        "built without browser support. Rebuild with --features browser",
    ))
}

#[cfg_attr(not(feature = "browser"), allow(dead_code))]
fn record_with<L: BrowserLauncher>(
    cli: &Cli,
    config: &CliConfig,
    options: &RecordOptions,
    launcher: L,
) -> CliResult<OutcomeStatus> {
    let reporter = ProgressReporter::new(config.color.should_color(), !config.narrates());
    let encoder = FfmpegEncoder::new(cli.ffmpeg.clone());
    let recorder = ScrollRecorder::new(RecorderSettings::default(), launcher, encoder);

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::runtime(format!("Failed to create async runtime: {e}")))?;
    let outcome = runtime.block_on(recorder.record(options, &reporter))?;

    let probe = match outcome.video {
        VideoArtifact::Encoded { ref path } => probe_output(&cli.ffprobe, path),
        VideoArtifact::Degraded { .. } => None,
    };
    let summary = RecordSummary::new(outcome, probe);
    report_problems(&reporter, &summary);

    match config.format {
        OutputFormat::Json => println!("{}", render_record_json(&summary)?),
        OutputFormat::Text => {
            if !config.verbosity.is_quiet() {
                print!("{}", render_record_text(&summary, options));
            }
        }
    }
    Ok(summary.status)
}

#[cfg_attr(not(feature = "browser"), allow(dead_code))]
fn probe_output(ffprobe: &Path, video: &Path) -> Option<VideoProbe> {
    match probe_video(ffprobe, video) {
        Ok(probe) => Some(probe),
        Err(e) => {
            debug!(error = %e, "could not probe output video");
            None
        }
    }
}

#[cfg_attr(not(feature = "browser"), allow(dead_code))]
fn report_problems(reporter: &ProgressReporter, summary: &RecordSummary) {
    if let VideoArtifact::Degraded {
        ref path,
        ref error,
    } = summary.video
    {
        reporter.failure(&format!("Transcode failed: {error}"));
        reporter.warning(&format!("Raw capture preserved at {}", path.display()));
    }
    if let ImageArtifact::Failed { ref error, .. } = summary.image {
        reporter.failure(&format!("GIF failed: {error}"));
    }
}

/// Render the summary as JSON
pub fn render_record_json(summary: &RecordSummary) -> CliResult<String> {
    Ok(serde_json::to_string_pretty(summary)?)
}

/// Render the summary as text
#[must_use]
pub fn render_record_text(summary: &RecordSummary, options: &RecordOptions) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Recorded: {}", options.url);
    let _ = writeln!(out, "  Title: {}", summary.title);
    let _ = writeln!(
        out,
        "  Scroll: {} steps over {}s at {} px/s",
        summary.scroll_steps, options.duration_secs, options.speed_px_per_sec
    );

    match summary.video {
        VideoArtifact::Encoded { ref path } => {
            let _ = write!(out, "  Video: {}", path.display());
            if let Some(ref probe) = summary.probe {
                let _ = write!(
                    out,
                    " ({} {}x{}, {:.2} fps, {:.2}s)",
                    probe.codec, probe.width, probe.height, probe.fps, probe.duration_secs
                );
            }
            out.push('\n');
        }
        VideoArtifact::Degraded { ref path, .. } => {
            let _ = writeln!(out, "  Video: {} (raw capture, not transcoded)", path.display());
        }
    }

    let image = match summary.image {
        ImageArtifact::Disabled => "disabled".to_string(),
        ImageArtifact::Derived { ref path } => path.display().to_string(),
        ImageArtifact::Failed { ref path, .. } => format!("{} (failed)", path.display()),
        ImageArtifact::Skipped => "skipped".to_string(),
    };
    let _ = writeln!(out, "  GIF: {image}");

    let status = match summary.status {
        OutcomeStatus::Complete => "complete",
        OutcomeStatus::ImageFailed => "video only, GIF failed",
        OutcomeStatus::Degraded => "degraded, transcode failed",
    };
    let _ = writeln!(out, "Status: {status}");
    out
}
