//! Face matching against known encodings.
//!
//! Tie-break: the first matching encoding in encoder order wins, however
//! close a later one may be.

use std::fmt;

use anyhow::Result;
use image::RgbImage;

use crate::detect::{is_match, BoundingBox, FaceBackend};
use crate::encoder::Encoding;
use crate::frame::Frame;
use crate::sampler::FrameSampler;

/// Column / label used for faces matching no known encoding.
pub const UNKNOWN_LABEL: &str = "Unknown";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Identity {
    Known(String),
    Unknown,
}

impl Identity {
    pub fn known(name: impl Into<String>) -> Self {
        Self::Known(name.into())
    }

    /// Presence-table column for this identity.
    pub fn label(&self) -> &str {
        match self {
            Self::Known(name) => name,
            Self::Unknown => UNKNOWN_LABEL,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One recognised face, box in original-frame pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchResult {
    pub identity: Identity,
    pub bbox: BoundingBox,
}

/// Identity for `candidate`: the first encoding within `tolerance`, else Unknown.
pub fn assign_identity(encodings: &[Encoding], candidate: &[f32], tolerance: f32) -> Identity {
    encodings
        .iter()
        .find(|known| is_match(&known.vector, candidate, tolerance))
        .map(|known| Identity::Known(known.name.clone()))
        .unwrap_or(Identity::Unknown)
}

pub struct FaceMatcher<'a> {
    encodings: &'a [Encoding],
    tolerance: f32,
}

impl<'a> FaceMatcher<'a> {
    pub fn new(encodings: &'a [Encoding], tolerance: f32) -> Self {
        Self {
            encodings,
            tolerance,
        }
    }

    pub fn encodings(&self) -> &[Encoding] {
        self.encodings
    }

    /// Detects and names faces on an already prepared analysis image.
    ///
    /// Boxes stay in `image` pixel space. Output order is detection order.
    pub fn match_image(
        &self,
        image: &RgbImage,
        backend: &mut dyn FaceBackend,
    ) -> Result<Vec<MatchResult>> {
        let detections = backend.detect(image)?;
        Ok(detections
            .into_iter()
            .map(|detection| MatchResult {
                identity: assign_identity(self.encodings, &detection.embedding, self.tolerance),
                bbox: detection.bbox,
            })
            .collect())
    }

    /// Downscales `frame` per `sampler`, matches, and maps boxes back to frame pixels.
    pub fn match_frame(
        &self,
        frame: &Frame,
        sampler: &FrameSampler,
        backend: &mut dyn FaceBackend,
    ) -> Result<Vec<MatchResult>> {
        let analysis = frame.downscaled(sampler.scale());
        let mut results = self.match_image(&analysis, backend)?;
        for result in &mut results {
            result.bbox = sampler.to_original(result.bbox, frame.width(), frame.height());
        }
        Ok(results)
    }
}
