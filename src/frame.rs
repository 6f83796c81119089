//! Decoded frames and the stream descriptor sources expose.
//!
//! - `Frame`: one decoded RGB frame with its index in the stream.
//! - `VideoDescriptor`: width, height, fps and frame count (when known).
//!
//! A frame lives for one iteration of the pipeline loop. Only the match
//! results computed from it outlive it.

use std::fmt;
use std::time::Duration;

use image::imageops::{self, FilterType};
use image::RgbImage;

/// Stream parameters reported by a video source.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoDescriptor {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// `None` for live sources where the length is not known up front.
    pub frame_count: Option<u64>,
}

impl VideoDescriptor {
    /// Stream length in whole seconds. `None` when the frame count or fps is unknown.
    pub fn video_length(&self) -> Option<u64> {
        let frames = self.frame_count?;
        if self.fps <= 0.0 {
            return None;
        }
        Some((frames as f64 / self.fps) as u64)
    }

    /// Progress through the stream in percent, if the stream length is known.
    pub fn progress_percent(&self, frames_read: u64) -> Option<f64> {
        match self.frame_count {
            Some(total) if total > 0 => Some(frames_read as f64 * 100.0 / total as f64),
            _ => None,
        }
    }
}

impl fmt::Display for VideoDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {}fps", self.width, self.height, self.fps)?;
        match (self.frame_count, self.video_length()) {
            (Some(frames), Some(length)) => write!(f, ", {} frames, {}s", frames, length),
            _ => write!(f, ", unknown length"),
        }
    }
}

/// A decoded RGB frame.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Zero-based position in the stream.
    pub index: u64,
    /// Decode timestamp relative to stream start.
    pub timestamp: Duration,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, timestamp: Duration, image: RgbImage) -> Self {
        Self {
            index,
            timestamp,
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Copy of the pixels downscaled by `scale`. Returns a plain copy when `scale >= 1`.
    pub fn downscaled(&self, scale: f64) -> RgbImage {
        if scale >= 1.0 {
            return self.image.clone();
        }
        let width = ((self.width() as f64 * scale).round() as u32).max(1);
        let height = ((self.height() as f64 * scale).round() as u32).max(1);
        imageops::resize(&self.image, width, height, FilterType::Triangle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(frame_count: Option<u64>) -> VideoDescriptor {
        VideoDescriptor {
            width: 640,
            height: 480,
            fps: 24.0,
            frame_count,
        }
    }

    #[test]
    fn length_is_undefined_for_live_sources() {
        assert_eq!(descriptor(Some(240)).video_length(), Some(10));
        assert_eq!(descriptor(None).video_length(), None);
        assert_eq!(descriptor(Some(0)).progress_percent(5), None);
        assert_eq!(descriptor(Some(200)).progress_percent(50), Some(25.0));
    }

    #[test]
    fn display_reports_unknown_length() {
        assert_eq!(
            descriptor(Some(240)).to_string(),
            "640x480 24fps, 240 frames, 10s"
        );
        assert_eq!(descriptor(None).to_string(), "640x480 24fps, unknown length");
    }

    #[test]
    fn downscale_halves_dimensions() {
        let frame = Frame::new(0, Duration::ZERO, RgbImage::new(640, 480));
        let small = frame.downscaled(0.5);
        assert_eq!(small.dimensions(), (320, 240));
        assert_eq!(frame.downscaled(1.0).dimensions(), (640, 480));
    }
}
