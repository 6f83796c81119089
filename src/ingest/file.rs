//! Source selection for a user-supplied input path.
//!
//! - `stub://...` opens a synthetic stream.
//! - Anything else is a local video file decoded with FFmpeg
//!   (feature: ingest-file-ffmpeg).
//!
//! Any failure to open is `CastwatchError::SourceUnavailable`.

use anyhow::Result;

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::synthetic::{SyntheticConfig, SyntheticSource};
use super::VideoSource;
use crate::error::CastwatchError;

/// Opens the source behind `path`.
pub fn open_source(path: &str) -> Result<Box<dyn VideoSource>> {
    if path.trim().is_empty() {
        return Err(CastwatchError::source_unavailable(path, "empty input path").into());
    }
    if path.starts_with("stub://") {
        let config = SyntheticConfig::from_url(path)
            .map_err(|e| CastwatchError::source_unavailable(path, format!("{:#}", e)))?;
        log::info!("source: {} (synthetic)", path);
        return Ok(Box::new(SyntheticSource::new(config)));
    }
    if path.contains("://") {
        return Err(CastwatchError::source_unavailable(
            path,
            "only local files and stub:// streams are supported",
        )
        .into());
    }
    open_file(path)
}

#[cfg(feature = "ingest-file-ffmpeg")]
fn open_file(path: &str) -> Result<Box<dyn VideoSource>> {
    let source = FfmpegFileSource::open(path)
        .map_err(|e| CastwatchError::source_unavailable(path, format!("{:#}", e)))?;
    log::info!("source: {} (ffmpeg)", path);
    Ok(Box::new(source))
}

#[cfg(not(feature = "ingest-file-ffmpeg"))]
fn open_file(path: &str) -> Result<Box<dyn VideoSource>> {
    Err(CastwatchError::source_unavailable(
        path,
        "file decoding requires the ingest-file-ffmpeg feature",
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_source_unavailable(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<CastwatchError>(),
            Some(CastwatchError::SourceUnavailable { .. })
        )
    }

    #[test]
    fn stub_paths_open_synthetic_streams() {
        let source = open_source("stub://demo?frames=12").unwrap();
        assert_eq!(source.descriptor().frame_count, Some(12));
    }

    #[test]
    fn unusable_paths_are_source_unavailable() {
        for path in ["", "rtsp://camera/stream", "stub://demo?fps=0"] {
            let err = open_source(path).err().unwrap();
            assert!(is_source_unavailable(&err), "{path}");
        }
    }
}
