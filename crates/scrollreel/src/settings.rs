//! Recorder configuration.
//!
//! Two layers: [`RecorderSettings`] holds the tunables that stay fixed for a
//! deployment (frame rate, chrome geometry, encoder quality), while
//! [`RecordOptions`] is the per-run bag parsed from the command line. Every
//! recognised option is listed once in [`OPTION_TABLE`].

use crate::result::{RecordError, RecordResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default scroll duration in seconds
pub const DEFAULT_DURATION_SECS: f64 = 10.0;
/// Default scroll speed in pixels per second
pub const DEFAULT_SPEED_PX_PER_SEC: f64 = 300.0;
/// Default settle wait for the setup pass, in milliseconds
pub const DEFAULT_WAIT_MS: u64 = 3000;
/// Default seconds trimmed from the start of the encoded video
pub const DEFAULT_TRIM_SECS: f64 = 3.0;
/// Default viewport width
pub const DEFAULT_WIDTH: u32 = 900;
/// Default viewport height
pub const DEFAULT_HEIGHT: u32 = 900;
/// Largest accepted viewport edge
pub const MAX_VIEWPORT_EDGE: u32 = 8192;

/// Viewport (content area) dimensions in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

impl Viewport {
    /// Create a viewport
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Geometry of the synthetic browser window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChromeGeometry {
    /// Height of the top bar (title row plus address row)
    pub bar_height: u32,
    /// Width of the frame on the left, right and bottom edges
    pub border_width: u32,
}

impl Default for ChromeGeometry {
    fn default() -> Self {
        Self {
            bar_height: 76,
            border_width: 1,
        }
    }
}

/// Options for transcoding a raw capture into the distributable video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeOptions {
    /// Seconds skipped at the start of the capture
    pub start_secs: f64,
    /// Seconds of capture kept after `start_secs`; the rest of the capture when unset
    pub length_secs: Option<f64>,
    /// x264 constant rate factor (lower is better quality)
    pub crf: u8,
    /// x264 preset
    pub preset: String,
    /// Output pixel format, `yuv420p` for broad player compatibility
    pub pixel_format: String,
    /// Constant output frame rate
    pub frame_rate: u32,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            start_secs: 0.0,
            length_secs: None,
            crf: 23,
            preset: "medium".to_string(),
            pixel_format: "yuv420p".to_string(),
            frame_rate: 25,
        }
    }
}

impl TranscodeOptions {
    /// Keep `length_secs` of the capture starting `start_secs` into it
    #[must_use]
    pub const fn with_window(mut self, start_secs: f64, length_secs: f64) -> Self {
        self.start_secs = start_secs;
        self.length_secs = Some(length_secs);
        self
    }

    /// Set the output frame rate
    #[must_use]
    pub const fn with_frame_rate(mut self, frame_rate: u32) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    /// Set the constant rate factor (clamped to x264's 0-51)
    #[must_use]
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf.min(51);
        self
    }
}

/// Options for the palette-optimised animated image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedImageOptions {
    /// Frame rate of the animated image
    pub fps: u32,
    /// Output width in pixels; height follows the aspect ratio
    pub width: u32,
    /// Loop count (0 = infinite)
    pub loop_count: u16,
}

impl Default for DerivedImageOptions {
    fn default() -> Self {
        Self {
            fps: 10,
            width: 600,
            loop_count: 0,
        }
    }
}

/// Deployment-level recorder tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderSettings {
    /// Frame rate shared by the scroll stepper and the capture sampler
    pub frame_rate: u32,
    /// Upper bound for a single navigation
    pub navigation_timeout: Duration,
    /// Quiet window without new resource fetches that counts as network idle
    pub network_idle_quiet: Duration,
    /// Settle pause in the recording pass before scrolling starts
    pub recording_settle: Duration,
    /// JPEG quality of raw capture frames (1-100)
    pub capture_quality: u8,
    /// Synthetic window geometry
    pub chrome: ChromeGeometry,
    /// Transcode defaults; trim is filled in per run
    pub transcode: TranscodeOptions,
    /// Derived image parameters
    pub derived_image: DerivedImageOptions,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            frame_rate: 25,
            navigation_timeout: Duration::from_secs(60),
            network_idle_quiet: Duration::from_millis(500),
            recording_settle: Duration::from_millis(1000),
            capture_quality: 90,
            chrome: ChromeGeometry::default(),
            transcode: TranscodeOptions::default(),
            derived_image: DerivedImageOptions::default(),
        }
    }
}

impl RecorderSettings {
    /// Create default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shared frame rate (clamped to 1-60)
    #[must_use]
    pub fn with_frame_rate(mut self, frame_rate: u32) -> Self {
        self.frame_rate = frame_rate.clamp(1, 60);
        self
    }

    /// Set the navigation timeout
    #[must_use]
    pub const fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    /// Set the recording-pass settle pause
    #[must_use]
    pub const fn with_recording_settle(mut self, settle: Duration) -> Self {
        self.recording_settle = settle;
        self
    }

    /// Set the chrome geometry
    #[must_use]
    pub const fn with_chrome(mut self, chrome: ChromeGeometry) -> Self {
        self.chrome = chrome;
        self
    }

    /// Set the derived image parameters
    #[must_use]
    pub const fn with_derived_image(mut self, derived_image: DerivedImageOptions) -> Self {
        self.derived_image = derived_image;
        self
    }

    /// Transcode options for one run
    ///
    /// `lead_in` is how far into the raw capture the first scroll step
    /// landed. The kept window starts `trim` seconds after that and runs
    /// for the rest of the scroll.
    #[must_use]
    pub fn transcode_for(&self, lead_in: Duration, options: &RecordOptions) -> TranscodeOptions {
        self.transcode
            .clone()
            .with_window(
                lead_in.as_secs_f64() + options.trim_secs,
                options.duration_secs - options.trim_secs,
            )
            .with_frame_rate(self.frame_rate)
    }
}

/// Value kind of a recognised option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// Free text
    Text,
    /// Filesystem path
    Path,
    /// Seconds, fractional allowed
    Seconds,
    /// Whole milliseconds
    Milliseconds,
    /// Pixels per second, fractional allowed
    PixelsPerSecond,
    /// Whole pixels
    Pixels,
    /// Boolean switch
    Flag,
}

/// One entry of the option table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    /// Long flag name without dashes
    pub name: &'static str,
    /// Value kind
    pub kind: OptionKind,
    /// Default as written on the command line (None = no default)
    pub default: Option<&'static str>,
    /// Whether the option must be supplied
    pub required: bool,
    /// One-line description
    pub help: &'static str,
}

/// Every option a recording run recognises
pub const OPTION_TABLE: &[OptionSpec] = &[
    OptionSpec {
        name: "url",
        kind: OptionKind::Text,
        default: None,
        required: true,
        help: "Page to record",
    },
    OptionSpec {
        name: "output",
        kind: OptionKind::Path,
        default: None,
        required: true,
        help: "Video output path",
    },
    OptionSpec {
        name: "duration",
        kind: OptionKind::Seconds,
        default: Some("10"),
        required: false,
        help: "Seconds of scrolling",
    },
    OptionSpec {
        name: "speed",
        kind: OptionKind::PixelsPerSecond,
        default: Some("300"),
        required: false,
        help: "Scroll speed in pixels per second",
    },
    OptionSpec {
        name: "wait",
        kind: OptionKind::Milliseconds,
        default: Some("3000"),
        required: false,
        help: "Settle wait after the setup-pass page load",
    },
    OptionSpec {
        name: "trim",
        kind: OptionKind::Seconds,
        default: Some("3"),
        required: false,
        help: "Seconds cut from the start of the video",
    },
    OptionSpec {
        name: "title",
        kind: OptionKind::Text,
        default: None,
        required: false,
        help: "Window title (defaults to the page title)",
    },
    OptionSpec {
        name: "no-gif",
        kind: OptionKind::Flag,
        default: Some("false"),
        required: false,
        help: "Skip the animated image",
    },
    OptionSpec {
        name: "gif-output",
        kind: OptionKind::Path,
        default: None,
        required: false,
        help: "Animated image path (defaults next to the video)",
    },
    OptionSpec {
        name: "width",
        kind: OptionKind::Pixels,
        default: Some("900"),
        required: false,
        help: "Viewport width",
    },
    OptionSpec {
        name: "height",
        kind: OptionKind::Pixels,
        default: Some("900"),
        required: false,
        help: "Viewport height",
    },
];

/// Look up an option by name
#[must_use]
pub fn option_spec(name: &str) -> Option<&'static OptionSpec> {
    OPTION_TABLE.iter().find(|spec| spec.name == name)
}

/// Per-run recording options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordOptions {
    /// Page to record
    pub url: String,
    /// Video output path
    pub output: PathBuf,
    /// Viewport size
    pub viewport: Viewport,
    /// Seconds the scroll animation runs
    pub duration_secs: f64,
    /// Constant scroll speed
    pub speed_px_per_sec: f64,
    /// Settle wait after the setup-pass load
    pub wait_ms: u64,
    /// Seconds cut from the start of the encoded video
    pub trim_secs: f64,
    /// Window title override
    pub title: Option<String>,
    /// Skip the derived image
    pub no_gif: bool,
    /// Derived image path override
    pub gif_output: Option<PathBuf>,
}

impl RecordOptions {
    /// Create options with defaults for everything but the required pair
    #[must_use]
    pub fn new(url: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            output: output.into(),
            viewport: Viewport::default(),
            duration_secs: DEFAULT_DURATION_SECS,
            speed_px_per_sec: DEFAULT_SPEED_PX_PER_SEC,
            wait_ms: DEFAULT_WAIT_MS,
            trim_secs: DEFAULT_TRIM_SECS,
            title: None,
            no_gif: false,
            gif_output: None,
        }
    }

    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = Viewport::new(width, height);
        self
    }

    /// Set scroll duration
    #[must_use]
    pub const fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = secs;
        self
    }

    /// Set scroll speed
    #[must_use]
    pub const fn with_speed(mut self, px_per_sec: f64) -> Self {
        self.speed_px_per_sec = px_per_sec;
        self
    }

    /// Set setup-pass settle wait
    #[must_use]
    pub const fn with_wait_ms(mut self, wait_ms: u64) -> Self {
        self.wait_ms = wait_ms;
        self
    }

    /// Set lead-in trim
    #[must_use]
    pub const fn with_trim(mut self, secs: f64) -> Self {
        self.trim_secs = secs;
        self
    }

    /// Set window title override
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Skip the derived image
    #[must_use]
    pub const fn without_gif(mut self) -> Self {
        self.no_gif = true;
        self
    }

    /// Set the derived image path
    #[must_use]
    pub fn with_gif_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.gif_output = Some(path.into());
        self
    }

    /// Setup-pass settle wait as a duration
    #[must_use]
    pub const fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    /// Where the derived image goes, whether or not it is enabled
    #[must_use]
    pub fn derived_image_path(&self) -> PathBuf {
        self.gif_output
            .clone()
            .unwrap_or_else(|| self.output.with_extension("gif"))
    }

    /// Derived image path when the image step is enabled
    #[must_use]
    pub fn image_path(&self) -> Option<PathBuf> {
        (!self.no_gif).then(|| self.derived_image_path())
    }

    /// Reject malformed options before anything is launched
    pub fn validate(&self) -> RecordResult<()> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(RecordError::invalid_option("url", "a page URL is required"));
        }
        if !has_supported_scheme(url) {
            return Err(RecordError::invalid_option(
                "url",
                format!("'{url}' must start with http://, https:// or file://"),
            ));
        }
        if self.output.as_os_str().is_empty() {
            return Err(RecordError::invalid_option(
                "output",
                "an output path is required",
            ));
        }
        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(RecordError::invalid_option(
                "duration",
                format!("must be a positive number of seconds, got {}", self.duration_secs),
            ));
        }
        if !self.speed_px_per_sec.is_finite() || self.speed_px_per_sec < 0.0 {
            return Err(RecordError::invalid_option(
                "speed",
                format!("must be zero or more pixels per second, got {}", self.speed_px_per_sec),
            ));
        }
        if !self.trim_secs.is_finite() || self.trim_secs < 0.0 {
            return Err(RecordError::invalid_option(
                "trim",
                format!("must be zero or more seconds, got {}", self.trim_secs),
            ));
        }
        if self.trim_secs >= self.duration_secs {
            return Err(RecordError::invalid_option(
                "trim",
                format!(
                    "{}s would cut away the whole {}s recording",
                    self.trim_secs, self.duration_secs
                ),
            ));
        }
        validate_edge("width", self.viewport.width)?;
        validate_edge("height", self.viewport.height)?;
        if let Some(ref title) = self.title {
            if title.trim().is_empty() {
                return Err(RecordError::invalid_option("title", "must not be blank"));
            }
        }
        if let Some(image) = self.image_path() {
            if image == self.output {
                return Err(RecordError::invalid_option(
                    "gif-output",
                    "must differ from the video output path",
                ));
            }
        }
        Ok(())
    }
}

fn validate_edge(option: &'static str, value: u32) -> RecordResult<()> {
    if value == 0 || value > MAX_VIEWPORT_EDGE {
        return Err(RecordError::invalid_option(
            option,
            format!("must be between 1 and {MAX_VIEWPORT_EDGE} pixels, got {value}"),
        ));
    }
    Ok(())
}

fn has_supported_scheme(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    ["http://", "https://", "file://"]
        .iter()
        .any(|scheme| lower.starts_with(scheme) && lower.len() > scheme.len())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn valid() -> RecordOptions {
        RecordOptions::new("https://example.com/", "out/page.mp4")
    }

    mod option_table_tests {
        use super::*;

        #[test]
        fn test_required_options() {
            let required: Vec<_> = OPTION_TABLE
                .iter()
                .filter(|spec| spec.required)
                .map(|spec| spec.name)
                .collect();
            assert_eq!(required, vec!["url", "output"]);
        }

        #[test]
        fn test_table_defaults_match_constants() {
            let parse = |name: &str| -> f64 {
                option_spec(name)
                    .and_then(|spec| spec.default)
                    .unwrap()
                    .parse()
                    .unwrap()
            };
            assert_eq!(parse("duration"), DEFAULT_DURATION_SECS);
            assert_eq!(parse("speed"), DEFAULT_SPEED_PX_PER_SEC);
            assert_eq!(parse("wait"), DEFAULT_WAIT_MS as f64);
            assert_eq!(parse("trim"), DEFAULT_TRIM_SECS);
            assert_eq!(parse("width"), f64::from(DEFAULT_WIDTH));
            assert_eq!(parse("height"), f64::from(DEFAULT_HEIGHT));
        }

        #[test]
        fn test_names_are_unique() {
            for (i, a) in OPTION_TABLE.iter().enumerate() {
                for b in &OPTION_TABLE[i + 1..] {
                    assert_ne!(a.name, b.name);
                }
            }
        }

        #[test]
        fn test_unknown_option() {
            assert!(option_spec("fps").is_none());
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn test_defaults_are_valid() {
            assert!(valid().validate().is_ok());
        }

        #[test]
        fn test_missing_url() {
            let err = RecordOptions::new("", "out.mp4").validate().unwrap_err();
            assert!(matches!(err, RecordError::InvalidOption { option: "url", .. }));
        }

        #[test]
        fn test_url_without_scheme() {
            let err = RecordOptions::new("example.com", "out.mp4")
                .validate()
                .unwrap_err();
            assert!(err.to_string().contains("http://"));
        }

        #[test]
        fn test_bare_scheme_rejected() {
            assert!(RecordOptions::new("https://", "out.mp4").validate().is_err());
        }

        #[test]
        fn test_file_url_accepted() {
            assert!(RecordOptions::new("file:///tmp/page.html", "out.mp4")
                .validate()
                .is_ok());
        }

        #[test]
        fn test_missing_output() {
            let err = RecordOptions::new("https://example.com", "")
                .validate()
                .unwrap_err();
            assert!(matches!(err, RecordError::InvalidOption { option: "output", .. }));
        }

        #[test]
        fn test_non_positive_duration() {
            assert!(valid().with_duration(0.0).validate().is_err());
            assert!(valid().with_duration(-1.0).validate().is_err());
            assert!(valid().with_duration(f64::NAN).validate().is_err());
        }

        #[test]
        fn test_negative_speed() {
            assert!(valid().with_speed(-5.0).validate().is_err());
            assert!(valid().with_speed(0.0).validate().is_ok());
        }

        #[test]
        fn test_trim_must_leave_footage() {
            let err = valid().with_duration(3.0).with_trim(3.0).validate().unwrap_err();
            assert!(matches!(err, RecordError::InvalidOption { option: "trim", .. }));
            assert!(valid().with_duration(4.0).with_trim(3.0).validate().is_ok());
            assert!(valid().with_trim(-0.5).validate().is_err());
        }

        #[test]
        fn test_viewport_bounds() {
            assert!(valid().with_viewport(0, 900).validate().is_err());
            assert!(valid().with_viewport(900, MAX_VIEWPORT_EDGE + 1).validate().is_err());
            assert!(valid().with_viewport(1, 1).validate().is_ok());
        }

        #[test]
        fn test_blank_title() {
            assert!(valid().with_title("   ").validate().is_err());
            assert!(valid().with_title("Map").validate().is_ok());
        }

        #[test]
        fn test_gif_output_must_differ() {
            let err = valid()
                .with_gif_output("out/page.mp4")
                .validate()
                .unwrap_err();
            assert!(matches!(
                err,
                RecordError::InvalidOption {
                    option: "gif-output",
                    ..
                }
            ));
            assert!(valid()
                .with_gif_output("out/page.mp4")
                .without_gif()
                .validate()
                .is_ok());
        }
    }

    mod path_tests {
        use super::*;

        #[test]
        fn test_default_gif_is_sibling() {
            assert_eq!(valid().derived_image_path(), PathBuf::from("out/page.gif"));
        }

        #[test]
        fn test_gif_override() {
            let opts = valid().with_gif_output("docs/_static/page.gif");
            assert_eq!(opts.image_path(), Some(PathBuf::from("docs/_static/page.gif")));
        }

        #[test]
        fn test_no_gif_has_no_image_path() {
            assert_eq!(valid().without_gif().image_path(), None);
        }
    }

    mod settings_tests {
        use super::*;

        #[test]
        fn test_default_settings() {
            let settings = RecorderSettings::default();
            assert_eq!(settings.frame_rate, 25);
            assert_eq!(settings.navigation_timeout, Duration::from_secs(60));
            assert_eq!(settings.derived_image.loop_count, 0);
        }

        #[test]
        fn test_frame_rate_clamped() {
            assert_eq!(RecorderSettings::new().with_frame_rate(0).frame_rate, 1);
            assert_eq!(RecorderSettings::new().with_frame_rate(240).frame_rate, 60);
        }

        #[test]
        fn test_transcode_for_run() {
            let settings = RecorderSettings::new().with_frame_rate(30);
            let record = valid().with_duration(4.0).with_trim(1.0);
            let opts = settings.transcode_for(Duration::from_millis(1500), &record);
            assert!((opts.start_secs - 2.5).abs() < 1e-9);
            assert_eq!(opts.length_secs, Some(3.0));
            assert_eq!(opts.frame_rate, 30);
            assert_eq!(opts.pixel_format, "yuv420p");
        }

        #[test]
        fn test_crf_clamped() {
            assert_eq!(TranscodeOptions::default().with_crf(80).crf, 51);
        }
    }
}
