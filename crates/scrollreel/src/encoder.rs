//! External media encoding.
//!
//! The recorder only sees the [`Encoder`] capability; [`FfmpegEncoder`]
//! satisfies it by running `ffmpeg` as a blocking subprocess. Argument lists
//! are built by pure functions so they can be checked without the binary.

use crate::result::{RecordError, RecordResult};
use crate::settings::{DerivedImageOptions, TranscodeOptions};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Lines of encoder stderr kept in error messages
const STDERR_TAIL_LINES: usize = 12;

/// Name of the palette image written during image derivation
pub const PALETTE_FILE_NAME: &str = "palette.png";

/// Media encoding capability
pub trait Encoder: Send + Sync {
    /// Transcode a raw capture into the distributable video
    fn transcode(&self, raw: &Path, output: &Path, options: &TranscodeOptions) -> RecordResult<()>;

    /// Derive a palette-optimised animated image from a finished video
    ///
    /// `scratch` is a directory the encoder may use for intermediate files.
    fn derive_image(
        &self,
        video: &Path,
        image: &Path,
        options: &DerivedImageOptions,
        scratch: &Path,
    ) -> RecordResult<()>;
}

/// `ffmpeg`-backed encoder
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    program: PathBuf,
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegEncoder {
    /// Use the given ffmpeg executable
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Executable this encoder runs
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn run(&self, args: &[OsString]) -> RecordResult<()> {
        let tool = self.program.display().to_string();
        debug!(tool = %tool, ?args, "running encoder");

        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| RecordError::Encoder {
                tool: tool.clone(),
                message: format!("failed to execute: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecordError::Encoder {
                tool,
                message: format!("exited with {}: {}", output.status, stderr_tail(&stderr)),
            });
        }
        Ok(())
    }
}

impl Encoder for FfmpegEncoder {
    fn transcode(&self, raw: &Path, output: &Path, options: &TranscodeOptions) -> RecordResult<()> {
        self.run(&build_transcode_args(raw, output, options))
    }

    fn derive_image(
        &self,
        video: &Path,
        image: &Path,
        options: &DerivedImageOptions,
        scratch: &Path,
    ) -> RecordResult<()> {
        let palette = scratch.join(PALETTE_FILE_NAME);
        self.run(&build_palette_args(video, &palette, options))?;
        let result = self.run(&build_paletteuse_args(video, &palette, image, options));
        let _ = std::fs::remove_file(&palette);
        result
    }
}

fn args_of(items: &[&str]) -> Vec<OsString> {
    items.iter().map(OsString::from).collect()
}

/// Arguments that transcode the kept window of `raw` to H.264 at `output`
#[must_use]
pub fn build_transcode_args(raw: &Path, output: &Path, options: &TranscodeOptions) -> Vec<OsString> {
    let mut args = args_of(&["-hide_banner", "-loglevel", "error", "-y"]);
    if options.start_secs > 0.0 {
        args.extend(args_of(&["-ss", &format_secs(options.start_secs)]));
    }
    args.push("-i".into());
    args.push(raw.as_os_str().to_owned());
    if let Some(length) = options.length_secs {
        args.extend(args_of(&["-t", &format_secs(length)]));
    }
    args.extend(args_of(&[
        "-an",
        "-c:v",
        "libx264",
        "-crf",
        &options.crf.to_string(),
        "-preset",
        &options.preset,
        "-pix_fmt",
        &options.pixel_format,
        "-vf",
        "scale=trunc(iw/2)*2:trunc(ih/2)*2",
        "-r",
        &options.frame_rate.to_string(),
        "-movflags",
        "+faststart",
    ]));
    args.push(output.as_os_str().to_owned());
    args
}

fn image_filter(options: &DerivedImageOptions) -> String {
    format!(
        "fps={},scale={}:-1:flags=lanczos",
        options.fps, options.width
    )
}

/// Arguments for the palette-generation pass
#[must_use]
pub fn build_palette_args(video: &Path, palette: &Path, options: &DerivedImageOptions) -> Vec<OsString> {
    let mut args = args_of(&["-hide_banner", "-loglevel", "error", "-y", "-i"]);
    args.push(video.as_os_str().to_owned());
    args.extend(args_of(&[
        "-vf",
        &format!("{},palettegen", image_filter(options)),
    ]));
    args.push(palette.as_os_str().to_owned());
    args
}

/// Arguments for the palette-application pass
#[must_use]
pub fn build_paletteuse_args(
    video: &Path,
    palette: &Path,
    image: &Path,
    options: &DerivedImageOptions,
) -> Vec<OsString> {
    let mut args = args_of(&["-hide_banner", "-loglevel", "error", "-y", "-i"]);
    args.push(video.as_os_str().to_owned());
    args.push("-i".into());
    args.push(palette.as_os_str().to_owned());
    args.extend(args_of(&[
        "-lavfi",
        &format!("{}[x];[x][1:v]paletteuse", image_filter(options)),
        "-loop",
        &options.loop_count.to_string(),
    ]));
    args.push(image.as_os_str().to_owned());
    args
}

fn format_secs(secs: f64) -> String {
    let text = format!("{secs:.3}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    let tail = lines[start..].join("\n");
    if tail.is_empty() {
        "no error output".to_string()
    } else {
        tail
    }
}
