//! Constant-speed, fixed-step scroll animation.
//!
//! The offset advances once per frame interval by a whole number of pixels
//! and is applied as an absolute position, so page-driven scroll adjustments
//! between steps cannot accumulate drift.

use std::time::Duration;

/// A precomputed scroll animation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollPlan {
    steps: u64,
    delta_px: u64,
    frame_rate: u32,
}

impl ScrollPlan {
    /// Plan `duration_secs` of scrolling at `speed_px_per_sec`, stepped at `frame_rate`
    ///
    /// Steps are `round(duration * frame_rate)`; each moves
    /// `max(1, ceil(speed / frame_rate))` pixels.
    #[must_use]
    pub fn new(duration_secs: f64, speed_px_per_sec: f64, frame_rate: u32) -> Self {
        let frame_rate = frame_rate.max(1);
        let fps = f64::from(frame_rate);
        let steps = (duration_secs.max(0.0) * fps).round() as u64;
        let delta_px = ((speed_px_per_sec.max(0.0) / fps).ceil() as u64).max(1);
        Self {
            steps,
            delta_px,
            frame_rate,
        }
    }

    /// Number of scroll steps
    #[must_use]
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    /// Pixels moved per step
    #[must_use]
    pub const fn delta_px(&self) -> u64 {
        self.delta_px
    }

    /// Step rate
    #[must_use]
    pub const fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// Pause between steps (1000 / frame_rate ms)
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.frame_rate))
    }

    /// Final scroll offset
    #[must_use]
    pub const fn total_px(&self) -> u64 {
        self.steps * self.delta_px
    }

    /// Absolute offset after each step
    pub fn offsets(&self) -> impl Iterator<Item = u64> {
        let delta = self.delta_px;
        (1..=self.steps).map(move |step| step * delta)
    }

    /// Page-side statement that jumps to an absolute offset
    #[must_use]
    pub fn scroll_script(offset_px: u64) -> String {
        format!("window.scrollTo(0, {offset_px})")
    }
}
