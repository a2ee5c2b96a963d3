//! Video probing via ffprobe.
//!
//! Extracts codec, resolution, frame rate and duration of a finished video
//! by shelling out to ffprobe with JSON output.

use crate::result::{RecordError, RecordResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Video metadata reported by ffprobe
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoProbe {
    /// Video codec name (e.g., "h264")
    pub codec: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Frame rate as a float
    pub fps: f64,
    /// Duration in seconds
    pub duration_secs: f64,
    /// Pixel format (e.g., "yuv420p")
    pub pixel_format: String,
}

/// Build ffprobe command arguments for JSON output.
#[must_use]
pub fn build_ffprobe_args(video_path: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "quiet".to_string(),
        "-print_format".to_string(),
        "json".to_string(),
        "-show_format".to_string(),
        "-show_streams".to_string(),
        video_path.to_string_lossy().to_string(),
    ]
}

/// Probe a video file with the given ffprobe executable.
pub fn probe_video(ffprobe: &Path, video_path: &Path) -> RecordResult<VideoProbe> {
    let output = std::process::Command::new(ffprobe)
        .args(build_ffprobe_args(video_path))
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .output()
        .map_err(|e| RecordError::Probe {
            message: format!("Failed to execute {}: {e}", ffprobe.display()),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RecordError::Probe {
            message: format!("ffprobe exited with {}: {stderr}", output.status),
        });
    }

    parse_ffprobe_json(&String::from_utf8_lossy(&output.stdout))
}

/// Parse ffprobe JSON output into a `VideoProbe`.
pub fn parse_ffprobe_json(json: &str) -> RecordResult<VideoProbe> {
    let parsed: serde_json::Value = serde_json::from_str(json).map_err(|e| RecordError::Probe {
        message: format!("Failed to parse ffprobe JSON: {e}"),
    })?;

    let video_stream = parsed
        .get("streams")
        .and_then(|s| s.as_array())
        .ok_or_else(|| RecordError::Probe {
            message: "ffprobe output missing 'streams' array".to_string(),
        })?
        .iter()
        .find(|s| s.get("codec_type").and_then(|t| t.as_str()) == Some("video"))
        .ok_or_else(|| RecordError::Probe {
            message: "No video stream found".to_string(),
        })?;

    let text = |key: &str| {
        video_stream
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string()
    };
    let dimension = |key: &str| {
        video_stream
            .get(key)
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32
    };

    let fps = video_stream
        .get("r_frame_rate")
        .and_then(|v| v.as_str())
        .map_or(0.0, parse_fps_fraction);

    let duration_secs = video_stream
        .get("duration")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<f64>().ok())
        .or_else(|| {
            parsed
                .get("format")
                .and_then(|f| f.get("duration"))
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<f64>().ok())
        })
        .unwrap_or(0.0);

    Ok(VideoProbe {
        codec: text("codec_name"),
        width: dimension("width"),
        height: dimension("height"),
        fps,
        duration_secs,
        pixel_format: text("pix_fmt"),
    })
}

/// Parse an FPS fraction string like "25/1" or "30000/1001" into a float.
fn parse_fps_fraction(fraction: &str) -> f64 {
    if let Some((num, den)) = fraction.split_once('/') {
        let num: f64 = num.parse().unwrap_or(0.0);
        let den: f64 = den.parse().unwrap_or(0.0);
        return if den > 0.0 { num / den } else { 0.0 };
    }
    fraction.parse().unwrap_or(0.0)
}
