//! The two-pass scroll recording pipeline.
//!
//! A run goes through these steps:
//!
//! 1. An untimed setup session loads the page, waits for network idle and the
//!    settle delay, reads the title and injects the chrome once. The session
//!    is then thrown away.
//! 2. A recording session reloads the page, re-injects the chrome, pauses
//!    briefly and scrolls. Closing it flushes the raw capture.
//! 3. The raw capture is transcoded to the output path. If that fails, the
//!    raw capture is preserved next to it instead.
//! 4. The derived image is made from the transcoded video, if enabled.
//!
//! Everything intermediate lives in a per-run temporary directory that is
//! removed on every exit path.

use crate::browser::{BrowserHandle, BrowserLauncher, BrowserSession, CaptureSink, SessionOptions};
use crate::capture::RAW_CAPTURE_EXTENSION;
use crate::encoder::Encoder;
use crate::overlay::{display_url, injection_script, Overlay, OverlayAssets};
use crate::result::{RecordError, RecordResult};
use crate::scroll::ScrollPlan;
use crate::settings::{RecordOptions, RecorderSettings};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const WORKSPACE_PREFIX: &str = "scrollreel-";
const MIN_STEP_INTERVAL: Duration = Duration::from_millis(1);

/// Pipeline progress reported to a [`RecordObserver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Setup pass is loading the page
    Loading {
        /// Page being loaded
        url: String,
    },
    /// Chrome overlay is being injected
    InjectingChrome,
    /// Recording session is open
    Recording,
    /// One scroll step was applied
    Scrolling {
        /// Steps done so far (1-based)
        step: u64,
        /// Total steps
        total: u64,
    },
    /// Recording session is closing and flushing its capture
    Saving,
    /// Raw capture is being transcoded
    Converting,
    /// Derived image is being generated
    DerivingImage,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading { url } => write!(f, "Loading {url}"),
            Self::InjectingChrome => write!(f, "Injecting browser chrome"),
            Self::Recording => write!(f, "Recording"),
            Self::Scrolling { step, total } => write!(f, "Scrolling {step}/{total}"),
            Self::Saving => write!(f, "Saving raw capture"),
            Self::Converting => write!(f, "Converting video"),
            Self::DerivingImage => write!(f, "Deriving GIF"),
        }
    }
}

/// Receives stage notifications during a run
pub trait RecordObserver: Send + Sync {
    /// Called on every stage transition and scroll step
    fn on_stage(&self, stage: &Stage);
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RecordObserver for NoopObserver {
    fn on_stage(&self, _stage: &Stage) {}
}

/// What happened to the video
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VideoArtifact {
    /// Transcoded video at the requested path
    Encoded {
        /// Output path
        path: PathBuf,
    },
    /// Transcode failed; the raw capture was preserved instead
    Degraded {
        /// Where the raw capture was preserved
        path: PathBuf,
        /// Transcode error
        error: String,
    },
}

impl VideoArtifact {
    /// Path of the video file left behind
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Encoded { path } | Self::Degraded { path, .. } => path,
        }
    }
}

/// What happened to the derived image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImageArtifact {
    /// Image step turned off
    Disabled,
    /// Image written
    Derived {
        /// Image path
        path: PathBuf,
    },
    /// Image generation failed; the video is unaffected
    Failed {
        /// Path that was attempted
        path: PathBuf,
        /// Encoder error
        error: String,
    },
    /// Not attempted because there was no transcoded video
    Skipped,
}

/// Overall result classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Every enabled artifact was produced
    Complete,
    /// Video produced, derived image failed
    ImageFailed,
    /// Transcode failed, raw capture preserved
    Degraded,
}

/// Result of a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordingOutcome {
    /// Title shown in the chrome
    pub title: String,
    /// Scroll steps executed
    pub scroll_steps: u64,
    /// Video artifact
    pub video: VideoArtifact,
    /// Derived image artifact
    pub image: ImageArtifact,
}

impl RecordingOutcome {
    /// Classify the run
    #[must_use]
    pub const fn status(&self) -> OutcomeStatus {
        match (&self.video, &self.image) {
            (VideoArtifact::Degraded { .. }, _) => OutcomeStatus::Degraded,
            (_, ImageArtifact::Failed { .. }) => OutcomeStatus::ImageFailed,
            _ => OutcomeStatus::Complete,
        }
    }

    /// Path of the derived image, if one was written
    #[must_use]
    pub fn image_path(&self) -> Option<&Path> {
        match self.image {
            ImageArtifact::Derived { ref path } => Some(path),
            _ => None,
        }
    }
}

/// What the recording pass leaves for transcoding
#[derive(Debug, Clone, Copy)]
struct Take {
    steps: u64,
    /// Offset of the first scroll step into the raw capture
    lead_in: Duration,
}

/// Records pages with a browser launcher and an encoder
#[derive(Debug)]
pub struct ScrollRecorder<L, E> {
    settings: RecorderSettings,
    launcher: L,
    encoder: E,
}

impl<L: BrowserLauncher, E: Encoder> ScrollRecorder<L, E> {
    /// Create a recorder
    pub const fn new(settings: RecorderSettings, launcher: L, encoder: E) -> Self {
        Self {
            settings,
            launcher,
            encoder,
        }
    }

    /// Recorder tunables
    pub const fn settings(&self) -> &RecorderSettings {
        &self.settings
    }

    /// Browser launcher
    pub const fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Encoder
    pub const fn encoder(&self) -> &E {
        &self.encoder
    }

    /// Record one page
    ///
    /// Options are validated before anything is launched.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid options, browser or navigation
    /// failures, a missing raw capture, or I/O errors. Transcode and image
    /// failures are reported through the returned [`RecordingOutcome`]
    /// instead, unless the raw capture cannot be kept either, which is a
    /// [`RecordError::PreserveCapture`] carrying both causes.
    pub async fn record(
        &self,
        options: &RecordOptions,
        observer: &dyn RecordObserver,
    ) -> RecordResult<RecordingOutcome> {
        options.validate()?;

        let workspace = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir()?;
        debug!(dir = %workspace.path().display(), "created workspace");

        let outcome = self.record_in(options, observer, workspace.path()).await;

        let dir = workspace.path().display().to_string();
        if let Err(e) = workspace.close() {
            warn!(dir = %dir, error = %e, "failed to remove workspace");
        }
        outcome
    }

    async fn record_in(
        &self,
        options: &RecordOptions,
        observer: &dyn RecordObserver,
        workdir: &Path,
    ) -> RecordResult<RecordingOutcome> {
        let capture_dir = workdir.join("capture");
        let scratch_dir = workdir.join("scratch");
        std::fs::create_dir_all(&capture_dir)?;
        std::fs::create_dir_all(&scratch_dir)?;

        let browser = self.launcher.launch().await?;
        let passes = self
            .run_passes(browser.as_ref(), options, observer, &capture_dir)
            .await;
        if let Err(e) = browser.close().await {
            warn!(error = %e, "browser did not close cleanly");
        }
        let (title, take) = passes?;

        let raw = find_raw_capture(&capture_dir)?;
        let video = self.transcode(&raw, take.lead_in, options, observer)?;
        let image = self.derive_image(&video, options, observer, &scratch_dir);

        Ok(RecordingOutcome {
            title,
            scroll_steps: take.steps,
            video,
            image,
        })
    }

    async fn run_passes(
        &self,
        browser: &dyn BrowserHandle,
        options: &RecordOptions,
        observer: &dyn RecordObserver,
        capture_dir: &Path,
    ) -> RecordResult<(String, Take)> {
        let (title, assets) = self.setup_pass(browser, options, observer).await?;
        let take = self
            .recording_pass(browser, options, observer, capture_dir, &assets)
            .await?;
        Ok((title, take))
    }

    async fn setup_pass(
        &self,
        browser: &dyn BrowserHandle,
        options: &RecordOptions,
        observer: &dyn RecordObserver,
    ) -> RecordResult<(String, OverlayAssets)> {
        observer.on_stage(&Stage::Loading {
            url: options.url.clone(),
        });
        info!(url = %options.url, "setup pass");

        let mut session = browser
            .new_session(&SessionOptions::untimed(options.viewport))
            .await?;
        let prepared = self.prepare(session.as_mut(), options, observer).await;
        if let Err(e) = session.close().await {
            warn!(error = %e, "setup session did not close cleanly");
        }
        prepared
    }

    async fn prepare(
        &self,
        session: &mut dyn BrowserSession,
        options: &RecordOptions,
        observer: &dyn RecordObserver,
    ) -> RecordResult<(String, OverlayAssets)> {
        self.load(session, &options.url).await?;
        tokio::time::sleep(options.wait()).await;

        let page_title = session.title().await?;
        let title = resolve_title(options.title.as_deref(), page_title.as_deref(), &options.url);
        debug!(title = %title, "resolved window title");

        let assets = Overlay::new(title.clone(), display_url(&options.url)).render(&self.settings.chrome);
        observer.on_stage(&Stage::InjectingChrome);
        inject(session, &assets).await?;
        Ok((title, assets))
    }

    async fn recording_pass(
        &self,
        browser: &dyn BrowserHandle,
        options: &RecordOptions,
        observer: &dyn RecordObserver,
        capture_dir: &Path,
        assets: &OverlayAssets,
    ) -> RecordResult<Take> {
        observer.on_stage(&Stage::Recording);
        info!("recording pass");

        let sink = CaptureSink {
            dir: capture_dir.to_path_buf(),
            frame_rate: self.settings.frame_rate,
            quality: self.settings.capture_quality,
        };
        let mut session = browser
            .new_session(&SessionOptions::recording(options.viewport, sink))
            .await?;
        let scrolled = self.perform(session.as_mut(), options, assets, observer).await;

        observer.on_stage(&Stage::Saving);
        let flushed = session.close().await;
        let take = scrolled?;
        flushed?;
        Ok(take)
    }

    async fn perform(
        &self,
        session: &mut dyn BrowserSession,
        options: &RecordOptions,
        assets: &OverlayAssets,
        observer: &dyn RecordObserver,
    ) -> RecordResult<Take> {
        self.load(session, &options.url).await?;
        inject(session, assets).await?;
        tokio::time::sleep(self.settings.recording_settle).await;

        let plan = ScrollPlan::new(
            options.duration_secs,
            options.speed_px_per_sec,
            self.settings.frame_rate,
        );
        // The first step fires immediately, so this is where motion begins
        let lead_in = session.capture_elapsed().unwrap_or_default();
        debug!(?lead_in, "capture lead-in before scrolling");
        let steps = scroll(session, &plan, observer).await?;
        Ok(Take { steps, lead_in })
    }

    async fn load(&self, session: &mut dyn BrowserSession, url: &str) -> RecordResult<()> {
        let started = Instant::now();
        let timeout = self.settings.navigation_timeout;
        session.goto(url, timeout).await?;
        session
            .wait_for_network_idle(
                self.settings.network_idle_quiet,
                timeout.saturating_sub(started.elapsed()),
            )
            .await?;
        debug!(url, elapsed = ?started.elapsed(), "page loaded");
        Ok(())
    }

    fn transcode(
        &self,
        raw: &Path,
        lead_in: Duration,
        options: &RecordOptions,
        observer: &dyn RecordObserver,
    ) -> RecordResult<VideoArtifact> {
        observer.on_stage(&Stage::Converting);
        ensure_parent(&options.output)?;

        let transcode = self.settings.transcode_for(lead_in, options);
        match self.encoder.transcode(raw, &options.output, &transcode) {
            Ok(()) => {
                info!(path = %options.output.display(), "video written");
                Ok(VideoArtifact::Encoded {
                    path: options.output.clone(),
                })
            }
            Err(error) => {
                warn!(error = %error, "transcode failed, preserving raw capture");
                remove_partial(&options.output);
                let path = degraded_path(&options.output);
                if let Err(copy) = std::fs::copy(raw, &path) {
                    return Err(RecordError::PreserveCapture {
                        path: path.display().to_string(),
                        transcode: error.to_string(),
                        message: copy.to_string(),
                    });
                }
                Ok(VideoArtifact::Degraded {
                    path,
                    error: error.to_string(),
                })
            }
        }
    }

    fn derive_image(
        &self,
        video: &VideoArtifact,
        options: &RecordOptions,
        observer: &dyn RecordObserver,
        scratch: &Path,
    ) -> ImageArtifact {
        let Some(path) = options.image_path() else {
            return ImageArtifact::Disabled;
        };
        let VideoArtifact::Encoded { path: ref video } = *video else {
            debug!("no transcoded video, skipping image");
            return ImageArtifact::Skipped;
        };

        observer.on_stage(&Stage::DerivingImage);
        if let Err(e) = ensure_parent(&path) {
            return ImageArtifact::Failed {
                path,
                error: e.to_string(),
            };
        }
        match self
            .encoder
            .derive_image(video, &path, &self.settings.derived_image, scratch)
        {
            Ok(()) => {
                info!(path = %path.display(), "image written");
                ImageArtifact::Derived { path }
            }
            Err(error) => {
                warn!(error = %error, "image derivation failed");
                remove_partial(&path);
                ImageArtifact::Failed {
                    path,
                    error: error.to_string(),
                }
            }
        }
    }
}

async fn inject(session: &dyn BrowserSession, assets: &OverlayAssets) -> RecordResult<()> {
    let script = injection_script(assets)?;
    session.evaluate(&script).await?;
    Ok(())
}

async fn scroll(
    session: &dyn BrowserSession,
    plan: &ScrollPlan,
    observer: &dyn RecordObserver,
) -> RecordResult<u64> {
    let total = plan.steps();
    info!(steps = total, delta_px = plan.delta_px(), "scrolling");

    let mut ticker = tokio::time::interval(plan.interval().max(MIN_STEP_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    for (step, offset) in (1..).zip(plan.offsets()) {
        ticker.tick().await;
        session.evaluate(&ScrollPlan::scroll_script(offset)).await?;
        observer.on_stage(&Stage::Scrolling { step, total });
    }
    // hold the final position for one frame
    ticker.tick().await;
    Ok(total)
}

/// Title for the chrome: override, then page title, then the display URL
#[must_use]
pub fn resolve_title(title_override: Option<&str>, page_title: Option<&str>, url: &str) -> String {
    title_override
        .or(page_title)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map_or_else(|| display_url(url), str::to_string)
}

/// Where a raw capture is preserved when transcoding fails
///
/// The output's extension is swapped for the raw one; an output that
/// already has it gets a `.raw` infix instead.
#[must_use]
pub fn degraded_path(output: &Path) -> PathBuf {
    let swapped = output.with_extension(RAW_CAPTURE_EXTENSION);
    if swapped == output {
        output.with_extension(format!("raw.{RAW_CAPTURE_EXTENSION}"))
    } else {
        swapped
    }
}

/// Locate the raw capture flushed into `dir`
///
/// # Errors
///
/// Returns [`RecordError::MissingCapture`] if the directory holds no file.
pub fn find_raw_capture(dir: &Path) -> RecordResult<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    if files.len() > 1 {
        warn!(count = files.len(), "more than one raw capture, using the first");
    }
    files
        .into_iter()
        .next()
        .ok_or_else(|| RecordError::MissingCapture {
            dir: dir.display().to_string(),
        })
}

fn ensure_parent(path: &Path) -> RecordResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn remove_partial(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "failed to remove partial output");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::overlay::OVERLAY_ID;
    use crate::settings::{DerivedImageOptions, TranscodeOptions};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const RAW_BYTES: &[u8] = b"raw-capture";

    #[derive(Debug, Clone, Default)]
    struct Behavior {
        fail_goto: bool,
        skip_capture: bool,
        page_title: Option<String>,
        lead_in: Duration,
    }

    #[derive(Debug, Default)]
    struct Log {
        launches: AtomicUsize,
        browser_closed: AtomicBool,
        sessions_opened: AtomicUsize,
        sessions_closed: AtomicUsize,
        capture_dirs: Mutex<Vec<PathBuf>>,
        // (recording session?, script)
        scripts: Mutex<Vec<(bool, String)>>,
    }

    impl Log {
        fn scripts(&self, recording: bool) -> Vec<String> {
            self.scripts
                .lock()
                .unwrap()
                .iter()
                .filter(|(r, _)| *r == recording)
                .map(|(_, s)| s.clone())
                .collect()
        }
    }

    #[derive(Debug, Default)]
    struct MockLauncher {
        behavior: Behavior,
        log: Arc<Log>,
    }

    #[derive(Debug)]
    struct MockBrowser {
        behavior: Behavior,
        log: Arc<Log>,
    }

    #[derive(Debug)]
    struct MockSession {
        behavior: Behavior,
        log: Arc<Log>,
        capture: Option<CaptureSink>,
    }

    #[async_trait]
    impl BrowserLauncher for MockLauncher {
        async fn launch(&self) -> RecordResult<Box<dyn BrowserHandle>> {
            self.log.launches.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockBrowser {
                behavior: self.behavior.clone(),
                log: Arc::clone(&self.log),
            }))
        }
    }

    #[async_trait]
    impl BrowserHandle for MockBrowser {
        async fn new_session(&self, options: &SessionOptions) -> RecordResult<Box<dyn BrowserSession>> {
            self.log.sessions_opened.fetch_add(1, Ordering::SeqCst);
            if let Some(ref sink) = options.capture {
                self.log.capture_dirs.lock().unwrap().push(sink.dir.clone());
            }
            Ok(Box::new(MockSession {
                behavior: self.behavior.clone(),
                log: Arc::clone(&self.log),
                capture: options.capture.clone(),
            }))
        }

        async fn close(self: Box<Self>) -> RecordResult<()> {
            self.log.browser_closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl BrowserSession for MockSession {
        async fn goto(&mut self, url: &str, _timeout: Duration) -> RecordResult<()> {
            if self.behavior.fail_goto {
                return Err(RecordError::Navigation {
                    url: url.to_string(),
                    message: "net::ERR_ADDRESS_UNREACHABLE".to_string(),
                });
            }
            Ok(())
        }

        async fn wait_for_network_idle(&self, _quiet: Duration, _timeout: Duration) -> RecordResult<()> {
            Ok(())
        }

        async fn title(&self) -> RecordResult<Option<String>> {
            Ok(self.behavior.page_title.clone())
        }

        async fn evaluate(&self, script: &str) -> RecordResult<serde_json::Value> {
            self.log
                .scripts
                .lock()
                .unwrap()
                .push((self.capture.is_some(), script.to_string()));
            Ok(serde_json::Value::Null)
        }

        fn capture_elapsed(&self) -> Option<Duration> {
            self.capture.as_ref().map(|_| self.behavior.lead_in)
        }

        async fn close(self: Box<Self>) -> RecordResult<()> {
            self.log.sessions_closed.fetch_add(1, Ordering::SeqCst);
            if let Some(ref sink) = self.capture {
                if !self.behavior.skip_capture {
                    std::fs::write(sink.dir.join("capture.mov"), RAW_BYTES)?;
                }
            }
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct MockEncoder {
        fail_transcode: bool,
        fail_image: bool,
        transcodes: AtomicUsize,
        images: AtomicUsize,
        last_transcode: Mutex<Option<TranscodeOptions>>,
    }

    impl Encoder for MockEncoder {
        fn transcode(&self, raw: &Path, output: &Path, options: &TranscodeOptions) -> RecordResult<()> {
            self.transcodes.fetch_add(1, Ordering::SeqCst);
            *self.last_transcode.lock().unwrap() = Some(options.clone());
            assert_eq!(std::fs::read(raw)?, RAW_BYTES);
            if self.fail_transcode {
                std::fs::write(output, b"partial")?;
                return Err(RecordError::Encoder {
                    tool: "ffmpeg".to_string(),
                    message: "Invalid data found when processing input".to_string(),
                });
            }
            std::fs::write(output, b"h264")?;
            Ok(())
        }

        fn derive_image(
            &self,
            video: &Path,
            image: &Path,
            _options: &DerivedImageOptions,
            scratch: &Path,
        ) -> RecordResult<()> {
            self.images.fetch_add(1, Ordering::SeqCst);
            assert!(video.exists());
            assert!(scratch.is_dir());
            if self.fail_image {
                return Err(RecordError::Encoder {
                    tool: "ffmpeg".to_string(),
                    message: "palettegen failed".to_string(),
                });
            }
            std::fs::write(image, b"GIF89a")?;
            Ok(())
        }
    }

    fn recorder(behavior: Behavior, encoder: MockEncoder) -> ScrollRecorder<MockLauncher, MockEncoder> {
        let settings = RecorderSettings::default().with_recording_settle(Duration::ZERO);
        let launcher = MockLauncher {
            behavior,
            log: Arc::default(),
        };
        ScrollRecorder::new(settings, launcher, encoder)
    }

    fn options(dir: &Path) -> RecordOptions {
        RecordOptions::new("https://example.com/", dir.join("out.mp4"))
            .with_duration(0.2)
            .with_speed(250.0)
            .with_wait_ms(0)
            .with_trim(0.0)
    }

    #[derive(Debug, Default)]
    struct StageLog(Mutex<Vec<Stage>>);

    impl RecordObserver for StageLog {
        fn on_stage(&self, stage: &Stage) {
            self.0.lock().unwrap().push(stage.clone());
        }
    }

    mod pipeline_tests {
        use super::*;

        #[tokio::test]
        async fn test_complete_run() {
            let dir = tempfile::tempdir().unwrap();
            let recorder = recorder(
                Behavior {
                    page_title: Some("Example Domain".to_string()),
                    ..Behavior::default()
                },
                MockEncoder::default(),
            );

            let outcome = recorder
                .record(&options(dir.path()), &NoopObserver)
                .await
                .unwrap();

            assert_eq!(outcome.status(), OutcomeStatus::Complete);
            assert_eq!(outcome.title, "Example Domain");
            assert_eq!(outcome.scroll_steps, 5);
            assert_eq!(outcome.video.path(), dir.path().join("out.mp4"));
            assert!(dir.path().join("out.mp4").exists());
            assert_eq!(outcome.image_path(), Some(dir.path().join("out.gif").as_path()));
            assert!(dir.path().join("out.gif").exists());
        }

        #[tokio::test]
        async fn test_scroll_steps_are_absolute() {
            let dir = tempfile::tempdir().unwrap();
            let recorder = recorder(Behavior::default(), MockEncoder::default());
            recorder
                .record(&options(dir.path()), &NoopObserver)
                .await
                .unwrap();

            let scrolls: Vec<String> = recorder
                .launcher()
                .log
                .scripts(true)
                .into_iter()
                .filter(|s| s.starts_with("window.scrollTo"))
                .collect();
            assert_eq!(
                scrolls,
                vec![
                    "window.scrollTo(0, 10)",
                    "window.scrollTo(0, 20)",
                    "window.scrollTo(0, 30)",
                    "window.scrollTo(0, 40)",
                    "window.scrollTo(0, 50)",
                ]
            );
            assert!(recorder.launcher().log.scripts(false).iter().all(|s| !s.starts_with("window.scrollTo")));
        }

        #[tokio::test]
        async fn test_overlay_injected_in_both_passes() {
            let dir = tempfile::tempdir().unwrap();
            let recorder = recorder(Behavior::default(), MockEncoder::default());
            recorder
                .record(&options(dir.path()), &NoopObserver)
                .await
                .unwrap();

            let log = &recorder.launcher().log;
            let setup: Vec<String> = log.scripts(false);
            let recording: Vec<String> = log.scripts(true);
            assert_eq!(setup.iter().filter(|s| s.contains(OVERLAY_ID)).count(), 1);
            assert_eq!(recording.iter().filter(|s| s.contains(OVERLAY_ID)).count(), 1);
            assert!(recording[0].contains(OVERLAY_ID));
        }

        #[tokio::test]
        async fn test_sessions_and_browser_closed() {
            let dir = tempfile::tempdir().unwrap();
            let recorder = recorder(Behavior::default(), MockEncoder::default());
            recorder
                .record(&options(dir.path()), &NoopObserver)
                .await
                .unwrap();

            let log = &recorder.launcher().log;
            assert_eq!(log.launches.load(Ordering::SeqCst), 1);
            assert_eq!(log.sessions_opened.load(Ordering::SeqCst), 2);
            assert_eq!(log.sessions_closed.load(Ordering::SeqCst), 2);
            assert!(log.browser_closed.load(Ordering::SeqCst));
        }

        #[tokio::test]
        async fn test_workspace_removed() {
            let dir = tempfile::tempdir().unwrap();
            let recorder = recorder(Behavior::default(), MockEncoder::default());
            recorder
                .record(&options(dir.path()), &NoopObserver)
                .await
                .unwrap();

            let capture_dirs = recorder.launcher().log.capture_dirs.lock().unwrap().clone();
            assert_eq!(capture_dirs.len(), 1);
            assert!(!capture_dirs[0].exists());
            assert!(!capture_dirs[0].parent().unwrap().exists());
        }

        #[tokio::test]
        async fn test_transcode_skips_lead_in_and_trim() {
            let dir = tempfile::tempdir().unwrap();
            let recorder = recorder(
                Behavior {
                    lead_in: Duration::from_millis(1504),
                    ..Behavior::default()
                },
                MockEncoder::default(),
            );
            let opts = options(dir.path()).with_duration(0.4).with_trim(0.1);
            recorder.record(&opts, &NoopObserver).await.unwrap();

            let transcode = recorder.encoder().last_transcode.lock().unwrap().clone().unwrap();
            // Seek past everything captured before the first scroll step, then the trim
            assert!((transcode.start_secs - 1.604).abs() < 1e-9, "{}", transcode.start_secs);
            let length = transcode.length_secs.unwrap();
            assert!((length - 0.3).abs() < 1e-9, "{length}");
        }

        #[tokio::test]
        async fn test_zero_lead_in_keeps_trim_only() {
            let dir = tempfile::tempdir().unwrap();
            let recorder = recorder(Behavior::default(), MockEncoder::default());
            let opts = options(dir.path()).with_trim(0.1);
            recorder.record(&opts, &NoopObserver).await.unwrap();

            let transcode = recorder.encoder().last_transcode.lock().unwrap().clone().unwrap();
            assert!((transcode.start_secs - 0.1).abs() < 1e-9);
            assert!((transcode.length_secs.unwrap() - 0.1).abs() < 1e-9);
        }

        #[tokio::test]
        async fn test_stage_order() {
            let dir = tempfile::tempdir().unwrap();
            let recorder = recorder(Behavior::default(), MockEncoder::default());
            let stages = StageLog::default();
            recorder.record(&options(dir.path()), &stages).await.unwrap();

            let stages = stages.0.lock().unwrap();
            assert_eq!(
                stages[0],
                Stage::Loading {
                    url: "https://example.com/".to_string()
                }
            );
            assert_eq!(stages[1], Stage::InjectingChrome);
            assert_eq!(stages[2], Stage::Recording);
            assert_eq!(stages[3], Stage::Scrolling { step: 1, total: 5 });
            assert_eq!(stages[7], Stage::Scrolling { step: 5, total: 5 });
            assert_eq!(stages[8..], [Stage::Saving, Stage::Converting, Stage::DerivingImage]);
        }
    }

    mod failure_tests {
        use super::*;

        #[tokio::test]
        async fn test_validation_never_launches() {
            let dir = tempfile::tempdir().unwrap();
            let recorder = recorder(Behavior::default(), MockEncoder::default());
            let mut opts = options(dir.path());
            opts.url = String::new();

            let err = recorder.record(&opts, &NoopObserver).await.unwrap_err();
            assert!(err.is_validation());
            assert_eq!(recorder.launcher().log.launches.load(Ordering::SeqCst), 0);
        }

        #[tokio::test]
        async fn test_navigation_failure_leaves_no_output() {
            let dir = tempfile::tempdir().unwrap();
            let recorder = recorder(
                Behavior {
                    fail_goto: true,
                    ..Behavior::default()
                },
                MockEncoder::default(),
            );

            let err = recorder
                .record(&options(dir.path()), &NoopObserver)
                .await
                .unwrap_err();
            assert!(matches!(err, RecordError::Navigation { .. }));
            assert!(!dir.path().join("out.mp4").exists());
            assert_eq!(recorder.encoder().transcodes.load(Ordering::SeqCst), 0);

            let log = &recorder.launcher().log;
            assert_eq!(log.sessions_closed.load(Ordering::SeqCst), 1);
            assert!(log.browser_closed.load(Ordering::SeqCst));
        }

        #[tokio::test]
        async fn test_missing_capture_is_fatal() {
            let dir = tempfile::tempdir().unwrap();
            let recorder = recorder(
                Behavior {
                    skip_capture: true,
                    ..Behavior::default()
                },
                MockEncoder::default(),
            );

            let err = recorder
                .record(&options(dir.path()), &NoopObserver)
                .await
                .unwrap_err();
            assert!(matches!(err, RecordError::MissingCapture { .. }));
            assert!(!dir.path().join("out.mp4").exists());
            assert_eq!(recorder.encoder().transcodes.load(Ordering::SeqCst), 0);
        }

        #[tokio::test]
        async fn test_transcode_failure_preserves_raw_capture() {
            let dir = tempfile::tempdir().unwrap();
            let recorder = recorder(
                Behavior::default(),
                MockEncoder {
                    fail_transcode: true,
                    ..MockEncoder::default()
                },
            );

            let outcome = recorder
                .record(&options(dir.path()), &NoopObserver)
                .await
                .unwrap();

            assert_eq!(outcome.status(), OutcomeStatus::Degraded);
            let preserved = dir.path().join("out.mov");
            match outcome.video {
                VideoArtifact::Degraded { ref path, ref error } => {
                    assert_eq!(path, &preserved);
                    assert!(error.contains("Invalid data"));
                }
                ref other => panic!("unexpected video artifact: {other:?}"),
            }
            assert_eq!(std::fs::read(&preserved).unwrap(), RAW_BYTES);
            assert!(!dir.path().join("out.mp4").exists());
            assert_eq!(outcome.image, ImageArtifact::Skipped);
            assert_eq!(recorder.encoder().images.load(Ordering::SeqCst), 0);
            assert!(!dir.path().join("out.gif").exists());
        }

        #[tokio::test]
        async fn test_unwritable_degraded_path_reports_both_errors() {
            let dir = tempfile::tempdir().unwrap();
            std::fs::create_dir(dir.path().join("out.mov")).unwrap();
            let recorder = recorder(
                Behavior::default(),
                MockEncoder {
                    fail_transcode: true,
                    ..MockEncoder::default()
                },
            );

            let err = recorder
                .record(&options(dir.path()), &NoopObserver)
                .await
                .unwrap_err();
            match err {
                RecordError::PreserveCapture {
                    ref path,
                    ref transcode,
                    ref message,
                } => {
                    assert!(path.ends_with("out.mov"));
                    assert!(transcode.contains("Invalid data"));
                    assert!(!message.is_empty());
                }
                ref other => panic!("unexpected error: {other:?}"),
            }
            assert!(err.to_string().contains("Invalid data"));
            assert!(!dir.path().join("out.mp4").exists());
            assert_eq!(recorder.encoder().images.load(Ordering::SeqCst), 0);
        }

        #[tokio::test]
        async fn test_image_failure_keeps_video() {
            let dir = tempfile::tempdir().unwrap();
            let recorder = recorder(
                Behavior::default(),
                MockEncoder {
                    fail_image: true,
                    ..MockEncoder::default()
                },
            );

            let outcome = recorder
                .record(&options(dir.path()), &NoopObserver)
                .await
                .unwrap();

            assert_eq!(outcome.status(), OutcomeStatus::ImageFailed);
            assert!(dir.path().join("out.mp4").exists());
            assert!(matches!(outcome.image, ImageArtifact::Failed { .. }));
            assert!(outcome.image_path().is_none());
        }

        #[tokio::test]
        async fn test_no_gif_writes_video_only() {
            let dir = tempfile::tempdir().unwrap();
            let recorder = recorder(Behavior::default(), MockEncoder::default());
            let opts = options(dir.path()).without_gif();

            let outcome = recorder.record(&opts, &NoopObserver).await.unwrap();
            assert_eq!(outcome.image, ImageArtifact::Disabled);
            assert_eq!(outcome.status(), OutcomeStatus::Complete);
            assert!(dir.path().join("out.mp4").exists());
            assert!(!dir.path().join("out.gif").exists());
            assert_eq!(recorder.encoder().images.load(Ordering::SeqCst), 0);
        }

        #[tokio::test]
        async fn test_custom_image_path() {
            let dir = tempfile::tempdir().unwrap();
            let recorder = recorder(Behavior::default(), MockEncoder::default());
            let gif = dir.path().join("gifs").join("preview.gif");
            let opts = options(dir.path()).with_gif_output(&gif);

            let outcome = recorder.record(&opts, &NoopObserver).await.unwrap();
            assert_eq!(outcome.image_path(), Some(gif.as_path()));
            assert!(gif.exists());
        }
    }

    mod helper_tests {
        use super::*;

        #[test]
        fn test_title_prefers_override() {
            assert_eq!(
                resolve_title(Some("Mine"), Some("Page"), "https://example.com/"),
                "Mine"
            );
        }

        #[test]
        fn test_title_falls_back_to_page() {
            assert_eq!(
                resolve_title(None, Some("  Page  "), "https://example.com/"),
                "Page"
            );
        }

        #[test]
        fn test_title_falls_back_to_url() {
            assert_eq!(resolve_title(None, Some(""), "https://example.com/"), "example.com");
            assert_eq!(resolve_title(None, None, "https://example.com/a"), "example.com/a");
        }

        #[test]
        fn test_degraded_path() {
            assert_eq!(degraded_path(Path::new("out/page.mp4")), PathBuf::from("out/page.mov"));
            assert_eq!(degraded_path(Path::new("page.mov")), PathBuf::from("page.raw.mov"));
            assert_eq!(degraded_path(Path::new("page")), PathBuf::from("page.mov"));
        }

        #[test]
        fn test_find_raw_capture() {
            let dir = tempfile::tempdir().unwrap();
            assert!(matches!(
                find_raw_capture(dir.path()),
                Err(RecordError::MissingCapture { .. })
            ));

            std::fs::write(dir.path().join("capture.mov"), RAW_BYTES).unwrap();
            assert_eq!(
                find_raw_capture(dir.path()).unwrap(),
                dir.path().join("capture.mov")
            );
        }

        #[test]
        fn test_outcome_serializes_tagged() {
            let outcome = RecordingOutcome {
                title: "T".to_string(),
                scroll_steps: 3,
                video: VideoArtifact::Encoded {
                    path: PathBuf::from("out.mp4"),
                },
                image: ImageArtifact::Disabled,
            };
            let json = serde_json::to_value(&outcome).unwrap();
            assert_eq!(json["video"]["status"], "encoded");
            assert_eq!(json["video"]["path"], "out.mp4");
            assert_eq!(json["image"]["status"], "disabled");
        }

        #[test]
        fn test_stage_display() {
            assert_eq!(Stage::Scrolling { step: 2, total: 9 }.to_string(), "Scrolling 2/9");
            assert_eq!(Stage::Converting.to_string(), "Converting video");
        }
    }
}
