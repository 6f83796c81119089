//! Annotated frame output.
//!
//! The pipeline always writes through a `VideoSink`. Without an output path
//! that is the `NullSink`, so writing is always safe to call.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Serialize;

use crate::error::CastwatchError;
use crate::frame::{Frame, VideoDescriptor};

pub const DEFAULT_CODEC: &str = "MJPG";
const MANIFEST_NAME: &str = "sequence.json";

/// Output stream parameters.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SinkConfig {
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    /// FourCC label. Recorded in `sequence.json` only; frames are always
    /// written as still images in the chosen `FrameFormat`.
    pub codec: String,
}

impl SinkConfig {
    /// Same geometry and rate as the source.
    pub fn for_source(descriptor: &VideoDescriptor, codec: &str) -> Self {
        Self {
            fps: descriptor.fps,
            width: descriptor.width,
            height: descriptor.height,
            codec: codec.to_string(),
        }
    }
}

/// Still image encoding for sequence output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameFormat {
    Jpeg,
    Png,
}

impl FrameFormat {
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            other => Err(anyhow!("unsupported image format '{}' (expected jpg or png)", other)),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    fn image_format(&self) -> image::ImageFormat {
        match self {
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Png => image::ImageFormat::Png,
        }
    }
}

pub trait VideoSink {
    fn write(&mut self, frame: &Frame) -> Result<()>;

    /// Flushes anything pending. Called once after the last frame.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    /// False for sinks that discard everything; lets callers skip annotation.
    fn is_active(&self) -> bool {
        true
    }
}

/// Discards frames.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl VideoSink for NullSink {
    fn write(&mut self, _frame: &Frame) -> Result<()> {
        Ok(())
    }

    fn is_active(&self) -> bool {
        false
    }
}

#[derive(Serialize)]
struct SequenceManifest<'a> {
    #[serde(flatten)]
    config: &'a SinkConfig,
    format: &'static str,
    frames_written: u64,
}

/// Writes one image per frame (`frame_000000.jpg`, ...) plus a
/// `sequence.json` describing the stream.
pub struct ImageSequenceSink {
    dir: PathBuf,
    config: SinkConfig,
    format: FrameFormat,
    frames_written: u64,
}

impl ImageSequenceSink {
    pub fn create(dir: &Path, config: SinkConfig, format: FrameFormat) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| CastwatchError::SinkUnavailable {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !dir.is_dir() {
            return Err(CastwatchError::SinkUnavailable {
                path: dir.to_path_buf(),
                reason: "not a directory".to_string(),
            }
            .into());
        }
        log::info!(
            "sink: writing {} frames to {} ({}x{} @ {:.2}fps, {})",
            format.extension(),
            dir.display(),
            config.width,
            config.height,
            config.fps,
            config.codec
        );
        Ok(Self {
            dir: dir.to_path_buf(),
            config,
            format,
            frames_written: 0,
        })
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir
            .join(format!("frame_{:06}.{}", index, self.format.extension()))
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl VideoSink for ImageSequenceSink {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        let path = self.frame_path(frame.index);
        frame
            .image
            .save_with_format(&path, self.format.image_format())
            .with_context(|| format!("write frame {}", path.display()))?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let manifest = SequenceManifest {
            config: &self.config,
            format: self.format.extension(),
            frames_written: self.frames_written,
        };
        let path = self.dir.join(MANIFEST_NAME);
        let json = serde_json::to_string_pretty(&manifest)?;
        fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
        log::debug!("sink: {} frames written", self.frames_written);
        Ok(())
    }
}

/// `ImageSequenceSink` into `output` when given, else `NullSink`.
pub fn open_sink(
    output: Option<&Path>,
    config: SinkConfig,
    format: FrameFormat,
) -> Result<Box<dyn VideoSink>> {
    match output {
        Some(dir) => Ok(Box::new(ImageSequenceSink::create(dir, config, format)?)),
        None => Ok(Box::new(NullSink)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::time::Duration;

    fn config() -> SinkConfig {
        SinkConfig {
            fps: 24.0,
            width: 8,
            height: 6,
            codec: DEFAULT_CODEC.to_string(),
        }
    }

    #[test]
    fn image_sequence_writes_numbered_frames_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("annotated");
        let mut sink = open_sink(Some(&out), config(), FrameFormat::Png).unwrap();
        assert!(sink.is_active());
        for index in [0, 1, 7] {
            sink.write(&Frame::new(index, Duration::ZERO, RgbImage::new(8, 6)))
                .unwrap();
        }
        sink.finish().unwrap();

        assert!(out.join("frame_000007.png").is_file());
        let written = image::open(out.join("frame_000001.png")).unwrap();
        assert_eq!((written.width(), written.height()), (8, 6));

        let manifest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join("sequence.json")).unwrap()).unwrap();
        assert_eq!(manifest["frames_written"], 3);
        assert_eq!(manifest["codec"], "MJPG");
        assert_eq!(manifest["format"], "png");
    }

    #[test]
    fn unusable_output_is_sink_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("taken");
        fs::write(&file, b"x").unwrap();
        let err = ImageSequenceSink::create(&file, config(), FrameFormat::Jpeg)
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<CastwatchError>(),
            Some(CastwatchError::SinkUnavailable { .. })
        ));
    }

    #[test]
    fn frame_format_names() {
        assert_eq!(FrameFormat::parse("JPEG").unwrap(), FrameFormat::Jpeg);
        assert_eq!(FrameFormat::parse("png").unwrap().extension(), "png");
        assert!(FrameFormat::parse("gif").is_err());
    }

    #[test]
    fn null_sink_accepts_everything() {
        let mut sink = NullSink;
        assert!(!sink.is_active());
        sink.write(&Frame::new(0, Duration::ZERO, RgbImage::new(1, 1)))
            .unwrap();
        sink.finish().unwrap();
    }
}
