//! Scrollreel: record a web page auto-scrolling inside a synthetic browser window.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    SCROLLREEL Pipeline                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Setup pass │    │ Recording  │    │ Encoder    │            │
//! │   │ (untimed)  │───►│ pass       │───►│ (ffmpeg)   │───► mp4/gif│
//! │   │ title, css │    │ scroll+cap │    │ trim, gif  │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "browser")]
//! # async fn demo() -> scrollreel::RecordResult<()> {
//! use scrollreel::{
//!     BrowserConfig, CdpLauncher, FfmpegEncoder, NoopObserver, RecordOptions, RecorderSettings,
//!     ScrollRecorder,
//! };
//!
//! let recorder = ScrollRecorder::new(
//!     RecorderSettings::default(),
//!     CdpLauncher::new(BrowserConfig::default()),
//!     FfmpegEncoder::default(),
//! );
//! let options = RecordOptions::new("https://example.com/", "example.mp4").with_duration(6.0);
//! let outcome = recorder.record(&options, &NoopObserver).await?;
//! println!("{}", outcome.video.path().display());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

/// Browser control capability and its CDP implementation
pub mod browser;

/// Raw capture assembly (QuickTime Motion-JPEG)
pub mod capture;

/// External encoder capability and the ffmpeg implementation
pub mod encoder;

/// Synthetic window chrome
pub mod overlay;

/// ffprobe metadata for finished videos
pub mod probe;

/// The two-pass recording pipeline
pub mod recorder;

mod result;

/// Scroll animation planning
pub mod scroll;

/// Tunables, per-run options and validation
pub mod settings;

#[cfg(feature = "browser")]
pub use browser::CdpLauncher;
pub use browser::{
    BrowserConfig, BrowserHandle, BrowserLauncher, BrowserSession, CaptureSink, SessionOptions,
};
pub use capture::{CaptureConfig, CaptureWriter, TimedFrame, RAW_CAPTURE_EXTENSION};
pub use encoder::{Encoder, FfmpegEncoder};
pub use overlay::{display_url, escape_html, Overlay, OverlayAssets};
pub use probe::{probe_video, VideoProbe};
pub use recorder::{
    ImageArtifact, NoopObserver, OutcomeStatus, RecordObserver, RecordingOutcome, ScrollRecorder,
    Stage, VideoArtifact,
};
pub use result::{RecordError, RecordResult};
pub use scroll::ScrollPlan;
pub use settings::{
    ChromeGeometry, DerivedImageOptions, RecordOptions, RecorderSettings, TranscodeOptions,
    Viewport,
};
