//! CLI argument definitions using clap
//!
//! Recording flags take their help text, defaults and required-ness from
//! [`OPTION_TABLE`]; parse through [`Cli::try_parse_args`] so they apply.

use crate::config::{CliConfig, ColorChoice, Verbosity};
use crate::output::OutputFormat;
use clap::{Command, CommandFactory, FromArgMatches, Parser, ValueEnum};
use scrollreel::settings::{OptionKind, OPTION_TABLE};
use scrollreel::RecordOptions;
use std::ffi::OsString;
use std::path::PathBuf;

/// Scrollreel: record a web page auto-scrolling inside a fake browser window
#[derive(Parser, Debug)]
#[command(name = "scrollreel")]
#[command(author, version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Page to record
    #[arg(long)]
    pub url: String,

    /// Video output path
    #[arg(short, long)]
    pub output: PathBuf,

    /// Seconds of scrolling
    #[arg(long)]
    pub duration: f64,

    /// Scroll speed in pixels per second
    #[arg(long)]
    pub speed: f64,

    /// Settle time in milliseconds after the first (unrecorded) page load
    #[arg(long)]
    pub wait: u64,

    /// Seconds cut from the start of the video
    #[arg(long)]
    pub trim: f64,

    /// Window title (defaults to the page's own title)
    #[arg(long)]
    pub title: Option<String>,

    /// Skip the GIF
    #[arg(long)]
    pub no_gif: bool,

    /// GIF output path (defaults to the video path with a .gif extension)
    #[arg(long, conflicts_with = "no_gif")]
    pub gif_output: Option<PathBuf>,

    /// Viewport width in pixels
    #[arg(long)]
    pub width: u32,

    /// Viewport height in pixels
    #[arg(long)]
    pub height: u32,

    /// ffmpeg executable
    #[arg(long, env = "SCROLLREEL_FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// ffprobe executable, used for the summary
    #[arg(long, env = "SCROLLREEL_FFPROBE", default_value = "ffprobe")]
    pub ffprobe: PathBuf,

    /// Chromium executable (auto-detected when unset)
    #[arg(long, env = "CHROMIUM_PATH")]
    pub chromium: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Disable the Chromium sandbox (containers/CI)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Summary format
    #[arg(long, value_enum, default_value = "text")]
    pub format: FormatArg,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, value_enum, default_value = "auto")]
    pub color: ColorArg,
}

impl Cli {
    /// The clap command with the option table applied
    #[must_use]
    pub fn command_with_table() -> Command {
        OPTION_TABLE.iter().fold(Self::command(), |command, spec| {
            command.mut_arg(spec.name.replace('-', "_"), |arg| {
                let arg = arg.help(spec.help).required(spec.required);
                match spec.default {
                    Some(default) if spec.kind != OptionKind::Flag => arg.default_value(default),
                    _ => arg,
                }
            })
        })
    }

    /// Parse the process arguments
    pub fn try_parse_args() -> Result<Self, clap::Error> {
        Self::try_parse_args_from(std::env::args_os())
    }

    /// Parse `args`, the first item being the program name
    pub fn try_parse_args_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut matches = Self::command_with_table().try_get_matches_from(args)?;
        Self::from_arg_matches_mut(&mut matches)
    }

    /// Presentation settings from the global flags
    #[must_use]
    pub fn config(&self) -> CliConfig {
        CliConfig::new()
            .with_verbosity(Verbosity::from_flags(self.verbose, self.quiet))
            .with_color(self.color.clone().into())
            .with_format(self.format.clone().into())
    }

    /// Per-run recording options (not yet validated)
    #[must_use]
    pub fn record_options(&self) -> RecordOptions {
        let mut options = RecordOptions::new(self.url.clone(), self.output.clone())
            .with_viewport(self.width, self.height)
            .with_duration(self.duration)
            .with_speed(self.speed)
            .with_wait_ms(self.wait)
            .with_trim(self.trim);
        if let Some(ref title) = self.title {
            options = options.with_title(title.clone());
        }
        if let Some(ref path) = self.gif_output {
            options = options.with_gif_output(path.clone());
        }
        if self.no_gif {
            options = options.without_gif();
        }
        options
    }
}

/// Summary format argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum FormatArg {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON document on stdout
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => Self::Text,
            FormatArg::Json => Self::Json,
        }
    }
}

/// Color argument for CLI
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
