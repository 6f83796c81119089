//! Frame ingestion sources.
//!
//! This module provides the sources the pipeline pulls frames from:
//! - Synthetic streams (`stub://` paths, testing and demos)
//! - Local video files (feature: ingest-file-ffmpeg)
//!
//! Sources are pull-based and strictly sequential. A source is not
//! restartable: reading again means opening it again.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
pub mod synthetic;

use anyhow::Result;

use crate::frame::{Frame, VideoDescriptor};

pub use file::open_source;
pub use synthetic::{SyntheticActor, SyntheticConfig, SyntheticSource};

/// Sequential frame source.
pub trait VideoSource {
    /// Stream parameters. Stable for the lifetime of the source.
    fn descriptor(&self) -> VideoDescriptor;

    /// Next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

impl<S: VideoSource + ?Sized> VideoSource for Box<S> {
    fn descriptor(&self) -> VideoDescriptor {
        (**self).descriptor()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }
}

/// Lazy frame sequence over a source. Ends at end of stream or after the first error.
pub struct Frames<'a, S: VideoSource + ?Sized> {
    source: &'a mut S,
    done: bool,
}

impl<S: VideoSource + ?Sized> Iterator for Frames<'_, S> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.source.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Iterate a source's frames in order.
pub fn frames<S: VideoSource + ?Sized>(source: &mut S) -> Frames<'_, S> {
    Frames {
        source,
        done: false,
    }
}
