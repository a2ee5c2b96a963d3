//! Raw capture assembly.
//!
//! Screencast frames arrive only when the page repaints, with irregular
//! spacing. [`CaptureWriter`] snaps them onto the fixed frame-rate grid and
//! writes a QuickTime Motion-JPEG file in which each sample lasts until the
//! next repaint, so the file plays back at wall-clock speed.
//!
//! ```text
//! frames ──→ quantise to grid ──→ normalise size ──→ ftyp │ mdat │ moov
//! ```

use crate::result::{RecordError, RecordResult};
use image::ImageFormat;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

/// Extension of raw capture files
pub const RAW_CAPTURE_EXTENSION: &str = "mov";

/// Ticks per grid slot in the track timescale
const TICKS_PER_SLOT: u32 = 100;

/// Shape of the raw capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Grid frame rate
    pub frame_rate: u32,
    /// JPEG quality for re-encoded frames (1-100)
    pub jpeg_quality: u8,
}

impl CaptureConfig {
    /// Create a capture configuration
    #[must_use]
    pub fn new(width: u32, height: u32, frame_rate: u32) -> Self {
        Self {
            width,
            height,
            frame_rate: frame_rate.max(1),
            jpeg_quality: 90,
        }
    }

    /// Set JPEG quality (1-100)
    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Track timescale (ticks per second)
    #[must_use]
    pub const fn timescale(&self) -> u32 {
        self.frame_rate * TICKS_PER_SLOT
    }

    fn slot_of(&self, elapsed: Duration) -> u64 {
        (elapsed.as_secs_f64() * f64::from(self.frame_rate)).round() as u64
    }
}

/// A JPEG frame stamped with its arrival time relative to capture start
#[derive(Debug, Clone)]
pub struct TimedFrame {
    /// Time since the capture started
    pub elapsed: Duration,
    /// JPEG-encoded frame
    pub jpeg: Vec<u8>,
}

#[derive(Debug, Clone)]
struct Sample {
    data: Vec<u8>,
    slots: u32,
}

/// Builds a Motion-JPEG QuickTime file from timed frames
#[derive(Debug)]
pub struct CaptureWriter {
    config: CaptureConfig,
    samples: Vec<Sample>,
}

impl CaptureWriter {
    /// Quantise `frames` onto the grid, ending the last sample at `total`
    ///
    /// The first frame is held from time zero; frames sharing a grid slot
    /// keep the latest one.
    pub fn from_frames(
        config: CaptureConfig,
        frames: &[TimedFrame],
        total: Duration,
    ) -> RecordResult<Self> {
        let mut ordered: Vec<&TimedFrame> = frames.iter().collect();
        ordered.sort_by_key(|frame| frame.elapsed);

        let mut slotted: Vec<(u64, &TimedFrame)> = Vec::with_capacity(ordered.len());
        for frame in ordered {
            let slot = if slotted.is_empty() {
                0
            } else {
                config.slot_of(frame.elapsed)
            };
            match slotted.last_mut() {
                Some(last) if last.0 == slot => last.1 = frame,
                _ => slotted.push((slot, frame)),
            }
        }

        let end_slot = slotted
            .last()
            .map_or(0, |(slot, _)| (*slot + 1).max(config.slot_of(total)));

        let mut samples = Vec::with_capacity(slotted.len());
        for (i, (slot, frame)) in slotted.iter().enumerate() {
            let next = slotted.get(i + 1).map_or(end_slot, |(next, _)| *next);
            let slots = u32::try_from(next - slot)
                .map_err(|_| RecordError::capture("frame held for too long"))?;
            samples.push(Sample {
                data: normalize_frame(&config, &frame.jpeg)?,
                slots,
            });
        }

        Ok(Self { config, samples })
    }

    /// Number of stored samples (distinct repaints)
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Capture length in grid slots
    #[must_use]
    pub fn duration_slots(&self) -> u64 {
        self.samples.iter().map(|s| u64::from(s.slots)).sum()
    }

    /// Capture length in wall-clock time
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_slots() as f64 / f64::from(self.config.frame_rate))
    }

    /// Get the capture configuration
    #[must_use]
    pub const fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Write the capture to `path`
    pub fn write(&self, path: &Path) -> RecordResult<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Serialise the capture as a QuickTime file
    pub fn to_bytes(&self) -> RecordResult<Vec<u8>> {
        if self.samples.is_empty() {
            return Err(RecordError::capture("no frames captured"));
        }

        let mut out = Vec::new();
        self.write_ftyp_box(&mut out);
        let chunk_offset = out.len() + 8;
        self.write_mdat_box(&mut out)?;
        self.write_moov_box(&mut out, to_u32(chunk_offset)?)?;
        Ok(out)
    }

    fn write_ftyp_box(&self, out: &mut Vec<u8>) {
        let mut content = Vec::new();
        content.extend_from_slice(b"qt  ");
        content.extend_from_slice(&0x0000_0200u32.to_be_bytes());
        content.extend_from_slice(b"qt  ");
        write_box(out, b"ftyp", &content);
    }

    fn write_mdat_box(&self, out: &mut Vec<u8>) -> RecordResult<()> {
        let data_size: usize = self.samples.iter().map(|s| s.data.len()).sum();
        out.extend_from_slice(&to_u32(8 + data_size)?.to_be_bytes());
        out.extend_from_slice(b"mdat");
        for sample in &self.samples {
            out.extend_from_slice(&sample.data);
        }
        Ok(())
    }

    fn write_moov_box(&self, out: &mut Vec<u8>, chunk_offset: u32) -> RecordResult<()> {
        let mut moov = Vec::new();
        self.write_mvhd_box(&mut moov)?;
        self.write_trak_box(&mut moov, chunk_offset)?;
        write_box(out, b"moov", &moov);
        Ok(())
    }

    fn duration_ticks(&self) -> RecordResult<u32> {
        let ticks = self.duration_slots() * u64::from(TICKS_PER_SLOT);
        u32::try_from(ticks).map_err(|_| RecordError::capture("capture too long"))
    }

    fn write_mvhd_box(&self, out: &mut Vec<u8>) -> RecordResult<()> {
        let mut content = Vec::new();
        // Version and flags
        content.extend_from_slice(&[0, 0, 0, 0]);
        // Creation and modification time
        content.extend_from_slice(&[0u8; 8]);
        content.extend_from_slice(&self.config.timescale().to_be_bytes());
        content.extend_from_slice(&self.duration_ticks()?.to_be_bytes());
        // Rate 1.0, volume 1.0
        content.extend_from_slice(&0x0001_0000u32.to_be_bytes());
        content.extend_from_slice(&[0x01, 0x00]);
        content.extend_from_slice(&[0u8; 10]);
        write_identity_matrix(&mut content);
        // Pre-defined
        content.extend_from_slice(&[0u8; 24]);
        // Next track ID
        content.extend_from_slice(&2u32.to_be_bytes());
        write_box(out, b"mvhd", &content);
        Ok(())
    }

    fn write_trak_box(&self, out: &mut Vec<u8>, chunk_offset: u32) -> RecordResult<()> {
        let mut trak = Vec::new();
        self.write_tkhd_box(&mut trak)?;

        let mut mdia = Vec::new();
        self.write_mdhd_box(&mut mdia)?;
        write_hdlr_box(&mut mdia);

        let mut minf = Vec::new();
        write_vmhd_box(&mut minf);
        write_dinf_box(&mut minf);
        self.write_stbl_box(&mut minf, chunk_offset)?;

        write_box(&mut mdia, b"minf", &minf);
        write_box(&mut trak, b"mdia", &mdia);
        write_box(out, b"trak", &trak);
        Ok(())
    }

    fn write_tkhd_box(&self, out: &mut Vec<u8>) -> RecordResult<()> {
        let mut content = Vec::new();
        // Version 0, flags: enabled | in movie
        content.extend_from_slice(&[0, 0, 0, 3]);
        content.extend_from_slice(&[0u8; 8]);
        // Track ID
        content.extend_from_slice(&1u32.to_be_bytes());
        content.extend_from_slice(&[0u8; 4]);
        content.extend_from_slice(&self.duration_ticks()?.to_be_bytes());
        // Reserved, layer, alternate group, volume, reserved
        content.extend_from_slice(&[0u8; 16]);
        write_identity_matrix(&mut content);
        content.extend_from_slice(&(self.config.width << 16).to_be_bytes());
        content.extend_from_slice(&(self.config.height << 16).to_be_bytes());
        write_box(out, b"tkhd", &content);
        Ok(())
    }

    fn write_mdhd_box(&self, out: &mut Vec<u8>) -> RecordResult<()> {
        let mut content = Vec::new();
        content.extend_from_slice(&[0, 0, 0, 0]);
        content.extend_from_slice(&[0u8; 8]);
        content.extend_from_slice(&self.config.timescale().to_be_bytes());
        content.extend_from_slice(&self.duration_ticks()?.to_be_bytes());
        // Language (und), quality
        content.extend_from_slice(&0x55c4u16.to_be_bytes());
        content.extend_from_slice(&0u16.to_be_bytes());
        write_box(out, b"mdhd", &content);
        Ok(())
    }

    fn write_stbl_box(&self, out: &mut Vec<u8>, chunk_offset: u32) -> RecordResult<()> {
        let mut stbl = Vec::new();
        self.write_stsd_box(&mut stbl);
        self.write_stts_box(&mut stbl)?;
        self.write_stsc_box(&mut stbl)?;
        self.write_stsz_box(&mut stbl)?;

        let mut stco = Vec::new();
        stco.extend_from_slice(&[0, 0, 0, 0]);
        stco.extend_from_slice(&1u32.to_be_bytes());
        stco.extend_from_slice(&chunk_offset.to_be_bytes());
        write_box(&mut stbl, b"stco", &stco);

        write_box(out, b"stbl", &stbl);
        Ok(())
    }

    fn write_stsd_box(&self, out: &mut Vec<u8>) {
        let mut entry = Vec::new();
        // Reserved, data reference index
        entry.extend_from_slice(&[0u8; 6]);
        entry.extend_from_slice(&1u16.to_be_bytes());
        // Version, revision, vendor, temporal and spatial quality
        entry.extend_from_slice(&[0u8; 16]);
        entry.extend_from_slice(&(self.config.width as u16).to_be_bytes());
        entry.extend_from_slice(&(self.config.height as u16).to_be_bytes());
        // 72 dpi
        entry.extend_from_slice(&0x0048_0000u32.to_be_bytes());
        entry.extend_from_slice(&0x0048_0000u32.to_be_bytes());
        entry.extend_from_slice(&0u32.to_be_bytes());
        // Frames per sample
        entry.extend_from_slice(&1u16.to_be_bytes());
        let mut compressor = [0u8; 32];
        let name = b"Photo - JPEG";
        compressor[0] = name.len() as u8;
        compressor[1..=name.len()].copy_from_slice(name);
        entry.extend_from_slice(&compressor);
        // Depth, colour table id
        entry.extend_from_slice(&24u16.to_be_bytes());
        entry.extend_from_slice(&(-1i16).to_be_bytes());

        let mut content = Vec::new();
        content.extend_from_slice(&[0, 0, 0, 0]);
        content.extend_from_slice(&1u32.to_be_bytes());
        write_box(&mut content, b"jpeg", &entry);
        write_box(out, b"stsd", &content);
    }

    /// Time-to-sample table, run-length encoded over sample durations
    fn write_stts_box(&self, out: &mut Vec<u8>) -> RecordResult<()> {
        let mut runs: Vec<(u32, u32)> = Vec::new();
        for sample in &self.samples {
            let delta = sample.slots * TICKS_PER_SLOT;
            match runs.last_mut() {
                Some((count, last_delta)) if *last_delta == delta => *count += 1,
                _ => runs.push((1, delta)),
            }
        }

        let mut content = Vec::new();
        content.extend_from_slice(&[0, 0, 0, 0]);
        content.extend_from_slice(&to_u32(runs.len())?.to_be_bytes());
        for (count, delta) in runs {
            content.extend_from_slice(&count.to_be_bytes());
            content.extend_from_slice(&delta.to_be_bytes());
        }
        write_box(out, b"stts", &content);
        Ok(())
    }

    fn write_stsc_box(&self, out: &mut Vec<u8>) -> RecordResult<()> {
        let mut content = Vec::new();
        content.extend_from_slice(&[0, 0, 0, 0]);
        content.extend_from_slice(&1u32.to_be_bytes());
        // All samples in a single chunk
        content.extend_from_slice(&1u32.to_be_bytes());
        content.extend_from_slice(&to_u32(self.samples.len())?.to_be_bytes());
        content.extend_from_slice(&1u32.to_be_bytes());
        write_box(out, b"stsc", &content);
        Ok(())
    }

    fn write_stsz_box(&self, out: &mut Vec<u8>) -> RecordResult<()> {
        let mut content = Vec::new();
        content.extend_from_slice(&[0, 0, 0, 0]);
        // Variable sample size
        content.extend_from_slice(&0u32.to_be_bytes());
        content.extend_from_slice(&to_u32(self.samples.len())?.to_be_bytes());
        for sample in &self.samples {
            content.extend_from_slice(&to_u32(sample.data.len())?.to_be_bytes());
        }
        write_box(out, b"stsz", &content);
        Ok(())
    }
}

/// Decode, resize to the capture size if needed, and re-encode a JPEG frame
fn normalize_frame(config: &CaptureConfig, jpeg: &[u8]) -> RecordResult<Vec<u8>> {
    let img = image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg)
        .map_err(|e| RecordError::capture(format!("Failed to decode frame: {e}")))?;

    if img.width() == config.width && img.height() == config.height {
        return Ok(jpeg.to_vec());
    }

    let resized = img.resize_exact(
        config.width,
        config.height,
        image::imageops::FilterType::Lanczos3,
    );
    let rgb = resized.to_rgb8();
    let mut buffer = Cursor::new(Vec::new());
    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, config.jpeg_quality);
    encoder
        .encode(
            rgb.as_raw(),
            config.width,
            config.height,
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| RecordError::capture(format!("JPEG encoding failed: {e}")))?;
    Ok(buffer.into_inner())
}

fn write_box(out: &mut Vec<u8>, kind: &[u8; 4], content: &[u8]) {
    out.extend_from_slice(&((8 + content.len()) as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(content);
}

fn write_identity_matrix(out: &mut Vec<u8>) {
    let matrix: [u32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];
    for value in &matrix {
        out.extend_from_slice(&value.to_be_bytes());
    }
}

fn write_hdlr_box(out: &mut Vec<u8>) {
    let mut content = Vec::new();
    content.extend_from_slice(&[0, 0, 0, 0]);
    content.extend_from_slice(b"mhlr");
    content.extend_from_slice(b"vide");
    content.extend_from_slice(&[0u8; 12]);
    content.extend_from_slice(b"scrollreel capture\0");
    write_box(out, b"hdlr", &content);
}

fn write_vmhd_box(out: &mut Vec<u8>) {
    let mut content = Vec::new();
    content.extend_from_slice(&[0, 0, 0, 1]);
    // Graphics mode, op colour
    content.extend_from_slice(&[0u8; 8]);
    write_box(out, b"vmhd", &content);
}

fn write_dinf_box(out: &mut Vec<u8>) {
    let mut dref = Vec::new();
    dref.extend_from_slice(&[0, 0, 0, 0]);
    dref.extend_from_slice(&1u32.to_be_bytes());
    // Self-contained data reference
    write_box(&mut dref, b"alis", &[0, 0, 0, 1]);

    let mut dinf = Vec::new();
    write_box(&mut dinf, b"dref", &dref);
    write_box(out, b"dinf", &dinf);
}

fn to_u32(value: usize) -> RecordResult<u32> {
    u32::try_from(value).map_err(|_| RecordError::capture("capture exceeds 4 GiB"))
}
