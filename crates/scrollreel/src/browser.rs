//! Browser control for recording.
//!
//! The recorder drives pages through three capability traits:
//! [`BrowserLauncher`] starts a browser, [`BrowserHandle`] opens sessions
//! in it, and [`BrowserSession`] is one page bound to a viewport and,
//! optionally, a capture directory. Closing a capturing session is what
//! writes its raw capture.
//!
//! With the `browser` feature, [`CdpLauncher`] implements the traits over
//! the Chrome `DevTools` Protocol via chromiumoxide.

use crate::result::RecordResult;
use crate::settings::Viewport;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// Browser launch configuration
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Window size handed to the browser at launch
    pub window: Viewport,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<PathBuf>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window: Viewport::default(),
            chromium_path: None,
            sandbox: true,
        }
    }
}

impl BrowserConfig {
    /// Set window dimensions
    #[must_use]
    pub const fn with_window(mut self, window: Viewport) -> Self {
        self.window = window;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

/// Where and how a session records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSink {
    /// Directory that receives the raw capture when the session closes
    pub dir: PathBuf,
    /// Grid frame rate of the raw capture
    pub frame_rate: u32,
    /// JPEG quality of captured frames (1-100)
    pub quality: u8,
}

/// Options for opening a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Content-area size
    pub viewport: Viewport,
    /// Capture sink; `None` opens a session that records nothing
    pub capture: Option<CaptureSink>,
}

impl SessionOptions {
    /// A session that records nothing
    #[must_use]
    pub const fn untimed(viewport: Viewport) -> Self {
        Self {
            viewport,
            capture: None,
        }
    }

    /// A session that records into `sink`
    #[must_use]
    pub const fn recording(viewport: Viewport, sink: CaptureSink) -> Self {
        Self {
            viewport,
            capture: Some(sink),
        }
    }
}

/// Starts browsers
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launch a browser
    async fn launch(&self) -> RecordResult<Box<dyn BrowserHandle>>;
}

/// A running browser
#[async_trait]
pub trait BrowserHandle: Send + Sync {
    /// Open a fresh session (page)
    async fn new_session(&self, options: &SessionOptions) -> RecordResult<Box<dyn BrowserSession>>;

    /// Shut the browser down
    async fn close(self: Box<Self>) -> RecordResult<()>;
}

/// One page in a running browser
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate, failing if the load does not finish within `timeout`
    async fn goto(&mut self, url: &str, timeout: Duration) -> RecordResult<()>;

    /// Wait until no new resources were fetched for `quiet`, bounded by `timeout`
    async fn wait_for_network_idle(&self, quiet: Duration, timeout: Duration) -> RecordResult<()>;

    /// The document title, if any
    async fn title(&self) -> RecordResult<Option<String>>;

    /// Evaluate a page-side expression and return its JSON value
    async fn evaluate(&self, script: &str) -> RecordResult<serde_json::Value>;

    /// Time since the raw capture started, `None` for untimed sessions
    fn capture_elapsed(&self) -> Option<Duration>;

    /// Close the session, flushing any raw capture into its sink directory
    async fn close(self: Box<Self>) -> RecordResult<()>;
}

// ============================================================================
// Real CDP Implementation (when `browser` feature is enabled)
// ============================================================================

#[cfg(feature = "browser")]
mod cdp {
    use super::{
        BrowserConfig, BrowserHandle, BrowserLauncher, BrowserSession, CaptureSink,
        SessionOptions,
    };
    use crate::capture::{CaptureConfig, CaptureWriter, TimedFrame, RAW_CAPTURE_EXTENSION};
    use crate::result::{RecordError, RecordResult};
    use crate::settings::Viewport;
    use async_trait::async_trait;
    use base64::Engine;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
    use chromiumoxide::cdp::browser_protocol::page::{
        EventScreencastFrame, ScreencastFrameAckParams, StartScreencastFormat,
        StartScreencastParams, StopScreencastParams,
    };
    use chromiumoxide::page::Page as CdpPage;
    use futures::StreamExt;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tokio::sync::Mutex;
    use tokio::task::JoinHandle;
    use tracing::{debug, warn};

    const IDLE_POLL: Duration = Duration::from_millis(100);

    /// Resource count once the document finished loading, -1 before that
    const RESOURCE_COUNT_SCRIPT: &str = "document.readyState === 'complete' \
        ? performance.getEntriesByType('resource').length : -1";

    /// Launches Chromium over CDP
    #[derive(Debug, Clone, Default)]
    pub struct CdpLauncher {
        config: BrowserConfig,
    }

    impl CdpLauncher {
        /// Create a launcher
        #[must_use]
        pub const fn new(config: BrowserConfig) -> Self {
            Self { config }
        }

        /// Get the launch configuration
        #[must_use]
        pub const fn config(&self) -> &BrowserConfig {
            &self.config
        }
    }

    #[async_trait]
    impl BrowserLauncher for CdpLauncher {
        async fn launch(&self) -> RecordResult<Box<dyn BrowserHandle>> {
            let mut builder = CdpConfig::builder()
                .window_size(self.config.window.width, self.config.window.height);

            if !self.config.headless {
                builder = builder.with_head();
            }

            if !self.config.sandbox {
                builder = builder.no_sandbox();
            }

            if let Some(ref path) = self.config.chromium_path {
                builder = builder.chrome_executable(path);
            }

            let cdp_config = builder
                .build()
                .map_err(|message| RecordError::BrowserLaunch { message })?;

            let (browser, mut handler) =
                CdpBrowser::launch(cdp_config)
                    .await
                    .map_err(|e| RecordError::BrowserLaunch {
                        message: e.to_string(),
                    })?;

            let handler_task = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if let Err(e) = event {
                        debug!(error = %e, "cdp handler error");
                    }
                }
            });

            debug!(headless = self.config.headless, "browser launched");
            Ok(Box::new(CdpBrowserHandle {
                inner: Mutex::new(browser),
                handler_task,
            }))
        }
    }

    /// Browser instance with a live CDP connection
    #[derive(Debug)]
    struct CdpBrowserHandle {
        inner: Mutex<CdpBrowser>,
        handler_task: JoinHandle<()>,
    }

    #[async_trait]
    impl BrowserHandle for CdpBrowserHandle {
        async fn new_session(&self, options: &SessionOptions) -> RecordResult<Box<dyn BrowserSession>> {
            let page = {
                let browser = self.inner.lock().await;
                browser
                    .new_page("about:blank")
                    .await
                    .map_err(|e| RecordError::session(e.to_string()))?
            };

            let metrics = SetDeviceMetricsOverrideParams::builder()
                .width(i64::from(options.viewport.width))
                .height(i64::from(options.viewport.height))
                .device_scale_factor(1.0)
                .mobile(false)
                .build()
                .map_err(RecordError::session)?;
            page.execute(metrics)
                .await
                .map_err(|e| RecordError::session(e.to_string()))?;

            let capture = match options.capture {
                Some(ref sink) => Some(ActiveCapture::start(&page, sink, options.viewport).await?),
                None => None,
            };

            Ok(Box::new(CdpSession { page, capture }))
        }

        async fn close(self: Box<Self>) -> RecordResult<()> {
            let Self {
                inner,
                handler_task,
            } = *self;
            let mut browser = inner.into_inner();
            let closed = browser.close().await.map(|_| ()).map_err(|e| {
                RecordError::BrowserLaunch {
                    message: format!("close failed: {e}"),
                }
            });
            if let Err(e) = browser.wait().await {
                debug!(error = %e, "browser process wait failed");
            }
            handler_task.abort();
            closed
        }
    }

    /// Screencast frames collected for one recording session
    #[derive(Debug)]
    struct ActiveCapture {
        sink: CaptureSink,
        viewport: Viewport,
        started: Instant,
        frames: Arc<Mutex<Vec<TimedFrame>>>,
        pump: JoinHandle<()>,
    }

    impl ActiveCapture {
        async fn start(page: &CdpPage, sink: &CaptureSink, viewport: Viewport) -> RecordResult<Self> {
            let mut events = page
                .event_listener::<EventScreencastFrame>()
                .await
                .map_err(|e| RecordError::capture(e.to_string()))?;

            let started = Instant::now();
            let frames = Arc::new(Mutex::new(Vec::new()));
            let pump_frames = Arc::clone(&frames);
            let pump_page = page.clone();
            let pump = tokio::spawn(async move {
                while let Some(event) = events.next().await {
                    let elapsed = started.elapsed();
                    if let Err(e) = pump_page
                        .execute(ScreencastFrameAckParams::new(event.session_id))
                        .await
                    {
                        debug!(error = %e, "screencast ack failed");
                    }
                    match base64::engine::general_purpose::STANDARD.decode(&event.data) {
                        Ok(jpeg) => pump_frames.lock().await.push(TimedFrame { elapsed, jpeg }),
                        Err(e) => warn!(error = %e, "dropping undecodable screencast frame"),
                    }
                }
            });

            let params = StartScreencastParams::builder()
                .format(StartScreencastFormat::Jpeg)
                .quality(i64::from(sink.quality))
                .max_width(i64::from(viewport.width))
                .max_height(i64::from(viewport.height))
                .every_nth_frame(1)
                .build();
            if let Err(e) = page.execute(params).await {
                pump.abort();
                return Err(RecordError::capture(format!("screencast did not start: {e}")));
            }

            Ok(Self {
                sink: sink.clone(),
                viewport,
                started,
                frames,
                pump,
            })
        }

        /// Stop the screencast and write whatever was captured
        async fn finish(self, page: &CdpPage) -> RecordResult<()> {
            if let Err(e) = page.execute(StopScreencastParams::default()).await {
                warn!(error = %e, "screencast did not stop cleanly");
            }
            let total = self.started.elapsed();
            self.pump.abort();

            let frames = std::mem::take(&mut *self.frames.lock().await);
            debug!(frames = frames.len(), ?total, "screencast finished");
            if frames.is_empty() {
                return Ok(());
            }

            let config = CaptureConfig::new(self.viewport.width, self.viewport.height, self.sink.frame_rate)
                .with_jpeg_quality(self.sink.quality);
            let path = self
                .sink
                .dir
                .join(format!("capture.{RAW_CAPTURE_EXTENSION}"));
            tokio::task::spawn_blocking(move || {
                CaptureWriter::from_frames(config, &frames, total)?.write(&path)
            })
            .await
            .map_err(|e| RecordError::capture(format!("capture writer panicked: {e}")))?
        }
    }

    /// A page with a live CDP connection
    #[derive(Debug)]
    struct CdpSession {
        page: CdpPage,
        capture: Option<ActiveCapture>,
    }

    impl CdpSession {
        async fn resource_count(&self) -> RecordResult<i64> {
            let value = self.evaluate(RESOURCE_COUNT_SCRIPT).await?;
            Ok(value.as_i64().unwrap_or(-1))
        }
    }

    #[async_trait]
    impl BrowserSession for CdpSession {
        async fn goto(&mut self, url: &str, timeout: Duration) -> RecordResult<()> {
            match tokio::time::timeout(timeout, self.page.goto(url)).await {
                Err(_) => {
                    return Err(RecordError::NavigationTimeout {
                        url: url.to_string(),
                        secs: timeout.as_secs(),
                    })
                }
                Ok(Err(e)) => {
                    return Err(RecordError::Navigation {
                        url: url.to_string(),
                        message: e.to_string(),
                    })
                }
                Ok(Ok(_)) => {}
            }

            // Chromium swaps in its own error page instead of failing the command
            let landed = self.evaluate("window.location.href").await?;
            if landed
                .as_str()
                .is_some_and(|href| href.starts_with("chrome-error://"))
            {
                return Err(RecordError::Navigation {
                    url: url.to_string(),
                    message: "the page could not be loaded".to_string(),
                });
            }
            Ok(())
        }

        async fn wait_for_network_idle(&self, quiet: Duration, timeout: Duration) -> RecordResult<()> {
            let deadline = Instant::now() + timeout;
            let mut last_count = -1;
            let mut quiet_since = Instant::now();

            loop {
                let count = self.resource_count().await?;
                if count != last_count {
                    last_count = count;
                    quiet_since = Instant::now();
                } else if count >= 0 && quiet_since.elapsed() >= quiet {
                    debug!(resources = count, "network idle");
                    return Ok(());
                }

                if Instant::now() >= deadline {
                    let url = self
                        .page
                        .url()
                        .await
                        .ok()
                        .flatten()
                        .unwrap_or_default();
                    return Err(RecordError::NavigationTimeout {
                        url,
                        secs: timeout.as_secs(),
                    });
                }
                tokio::time::sleep(IDLE_POLL).await;
            }
        }

        async fn title(&self) -> RecordResult<Option<String>> {
            self.page
                .get_title()
                .await
                .map_err(|e| RecordError::Evaluation {
                    message: e.to_string(),
                })
        }

        async fn evaluate(&self, script: &str) -> RecordResult<serde_json::Value> {
            let result = self
                .page
                .evaluate(script)
                .await
                .map_err(|e| RecordError::Evaluation {
                    message: e.to_string(),
                })?;
            Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
        }

        fn capture_elapsed(&self) -> Option<Duration> {
            self.capture.as_ref().map(|capture| capture.started.elapsed())
        }

        async fn close(self: Box<Self>) -> RecordResult<()> {
            let Self { page, capture } = *self;
            let flushed = match capture {
                Some(capture) => capture.finish(&page).await,
                None => Ok(()),
            };
            let closed = page
                .close()
                .await
                .map_err(|e| RecordError::session(format!("close failed: {e}")));
            flushed?;
            closed
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::CdpLauncher;
