//! CLI configuration

use crate::output::OutputFormat;
use serde::{Deserialize, Serialize};

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Quiet - errors only
    Quiet,
    /// Normal - progress narration
    #[default]
    Normal,
    /// Verbose - pipeline logs
    Verbose,
    /// Debug - everything, including subprocess arguments
    Debug,
}

impl Verbosity {
    /// Map `-v` count and `-q` to a level
    #[must_use]
    pub const fn from_flags(verbose: u8, quiet: bool) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Check if debug mode
    #[must_use]
    pub const fn is_debug(self) -> bool {
        matches!(self, Self::Debug)
    }

    /// Default log filter directive when `RUST_LOG` is unset
    #[must_use]
    pub const fn log_directive(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "scrollreel=info,scrollreel_cli=info,warn",
            Self::Debug => "scrollreel=debug,scrollreel_cli=debug,info",
        }
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when stderr is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
        }
    }
}

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Color output choice
    pub color: ColorChoice,
    /// Summary format
    pub format: OutputFormat,
}

impl CliConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set color choice
    #[must_use]
    pub const fn with_color(mut self, color: ColorChoice) -> Self {
        self.color = color;
        self
    }

    /// Set summary format
    #[must_use]
    pub const fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Whether progress narration is shown
    ///
    /// JSON summaries keep stderr quiet too, so callers get one document.
    #[must_use]
    pub const fn narrates(&self) -> bool {
        !self.verbosity.is_quiet() && matches!(self.format, OutputFormat::Text)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod verbosity_tests {
        use super::*;

        #[test]
        fn test_default_verbosity() {
            assert_eq!(Verbosity::default(), Verbosity::Normal);
        }

        #[test]
        fn test_from_flags() {
            assert_eq!(Verbosity::from_flags(0, false), Verbosity::Normal);
            assert_eq!(Verbosity::from_flags(1, false), Verbosity::Verbose);
            assert_eq!(Verbosity::from_flags(3, false), Verbosity::Debug);
            assert_eq!(Verbosity::from_flags(2, true), Verbosity::Quiet);
        }

        #[test]
        fn test_levels() {
            assert!(Verbosity::Quiet.is_quiet());
            assert!(Verbosity::Debug.is_debug());
            assert!(!Verbosity::Verbose.is_debug());
        }

        #[test]
        fn test_log_directive() {
            assert_eq!(Verbosity::Quiet.log_directive(), "error");
            assert_eq!(Verbosity::Normal.log_directive(), "warn");
            assert!(Verbosity::Debug.log_directive().contains("scrollreel=debug"));
        }

        #[test]
        fn test_deserialize() {
            let v: Verbosity = serde_json::from_str("\"Quiet\"").unwrap();
            assert_eq!(v, Verbosity::Quiet);
        }
    }

    mod color_choice_tests {
        use super::*;

        #[test]
        fn test_default_color() {
            assert_eq!(ColorChoice::default(), ColorChoice::Auto);
        }

        #[test]
        fn test_should_color_fixed() {
            assert!(ColorChoice::Always.should_color());
            assert!(!ColorChoice::Never.should_color());
        }

        #[test]
        fn test_should_color_auto() {
            // Auto depends on terminal detection, just ensure it doesn't panic
            let _ = ColorChoice::Auto.should_color();
        }
    }

    mod cli_config_tests {
        use super::*;

        #[test]
        fn test_default_config() {
            let config = CliConfig::default();
            assert_eq!(config.verbosity, Verbosity::Normal);
            assert_eq!(config.color, ColorChoice::Auto);
            assert_eq!(config.format, OutputFormat::Text);
            assert!(config.narrates());
        }

        #[test]
        fn test_chained_builders() {
            let config = CliConfig::new()
                .with_verbosity(Verbosity::Verbose)
                .with_color(ColorChoice::Never)
                .with_format(OutputFormat::Json);
            assert_eq!(config.verbosity, Verbosity::Verbose);
            assert_eq!(config.color, ColorChoice::Never);
            assert_eq!(config.format, OutputFormat::Json);
        }

        #[test]
        fn test_quiet_and_json_do_not_narrate() {
            assert!(!CliConfig::new().with_verbosity(Verbosity::Quiet).narrates());
            assert!(!CliConfig::new().with_format(OutputFormat::Json).narrates());
        }

        #[test]
        fn test_serialize() {
            let json = serde_json::to_string(&CliConfig::new().with_format(OutputFormat::Json)).unwrap();
            assert!(json.contains("\"format\":\"Json\""));
        }
    }
}
