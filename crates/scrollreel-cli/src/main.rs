//! Scrollreel: record a web page auto-scrolling inside a fake browser window
//!
//! ## Usage
//!
//! ```bash
//! scrollreel --url https://example.com --output example.mp4
//! scrollreel --url https://example.com --output demo.mp4 --duration 4 --speed 1000 --no-gif
//! scrollreel --url file:///tmp/page.html --output page.mp4 --format json
//! ```
//!
//! Exit codes: 0 complete, 1 fatal error, 2 video written but GIF failed,
//! 3 transcode failed and the raw capture was kept.

use scrollreel_cli::handlers::{exit_code, execute_record, EXIT_COMPLETE, EXIT_FATAL};
use scrollreel_cli::logging::init_logging;
use scrollreel_cli::{Cli, CliResult};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = match Cli::try_parse_args() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_FATAL)
            } else {
                ExitCode::from(EXIT_COMPLETE)
            };
        }
    };

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e}");
            if e.is_usage() {
                eprintln!("\nFor more information, try '--help'.");
            }
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn run(cli: &Cli) -> CliResult<u8> {
    let config = cli.config();
    init_logging(&config)?;
    let status = execute_record(cli, &config)?;
    Ok(exit_code(status))
}
