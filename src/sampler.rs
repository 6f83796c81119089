//! Frame sampling policy.
//!
//! Detection runs on every `stride`-th frame; frames in between reuse the
//! last analyzed result verbatim. Analysis also happens on a downscaled copy
//! of the frame, and boxes are mapped back to original pixels before anyone
//! else sees them.

use anyhow::Result;

use crate::detect::BoundingBox;
use crate::matcher::MatchResult;

/// Which frames to analyze and at what resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameSampler {
    stride: u64,
    scale: f64,
}

impl FrameSampler {
    /// `stride = max(1, floor(fps / analyzed_fps))`,
    /// `scale = min(analysis_height / source_height, 1)`.
    pub fn new(fps: f64, analyzed_fps: f64, source_height: u32, analysis_height: u32) -> Self {
        let stride = if analyzed_fps > 0.0 && fps.is_finite() {
            (fps / analyzed_fps).floor().max(1.0) as u64
        } else {
            1
        };
        let scale = if source_height == 0 || analysis_height == 0 {
            1.0
        } else {
            (analysis_height as f64 / source_height as f64).min(1.0)
        };
        Self { stride, scale }
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn should_analyze(&self, frame_index: u64) -> bool {
        frame_index % self.stride == 0
    }

    /// Box found on the downscaled frame, in original `width` x `height` pixels.
    pub fn to_original(&self, bbox: BoundingBox, width: u32, height: u32) -> BoundingBox {
        bbox.rescaled(self.scale, width, height)
    }
}

/// Outcome of sampling one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sampled {
    /// Detection ran on this frame.
    Analyzed,
    /// The previous result was reused.
    CarriedOver,
}

/// Holds the carry-over result between analyzed frames.
#[derive(Debug)]
pub struct SampledMatches {
    sampler: FrameSampler,
    current: Vec<MatchResult>,
}

impl SampledMatches {
    pub fn new(sampler: FrameSampler) -> Self {
        Self {
            sampler,
            current: Vec::new(),
        }
    }

    pub fn sampler(&self) -> &FrameSampler {
        &self.sampler
    }

    /// Runs `analyze` when `frame_index` is on the stride, otherwise keeps the last result.
    ///
    /// Before the first analyzed frame the carried result is empty.
    pub fn advance<F>(&mut self, frame_index: u64, analyze: F) -> Result<(Sampled, &[MatchResult])>
    where
        F: FnOnce(&FrameSampler) -> Result<Vec<MatchResult>>,
    {
        if self.sampler.should_analyze(frame_index) {
            self.current = analyze(&self.sampler)?;
            Ok((Sampled::Analyzed, &self.current))
        } else {
            Ok((Sampled::CarriedOver, &self.current))
        }
    }

    pub fn current(&self) -> &[MatchResult] {
        &self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::Identity;

    #[test]
    fn stride_from_frame_rates() {
        let sampler = FrameSampler::new(24.0, 4.0, 1080, 360);
        assert_eq!(sampler.stride(), 6);
        let analyzed: Vec<u64> = (0..25).filter(|f| sampler.should_analyze(*f)).collect();
        assert_eq!(analyzed, vec![0, 6, 12, 18, 24]);

        assert_eq!(FrameSampler::new(24.0, 30.0, 480, 360).stride(), 1);
        assert_eq!(FrameSampler::new(25.0, 4.0, 480, 360).stride(), 6);
        assert_eq!(FrameSampler::new(24.0, 0.0, 480, 360).stride(), 1);
    }

    #[test]
    fn scale_never_upsamples() {
        assert_eq!(FrameSampler::new(24.0, 4.0, 720, 360).scale(), 0.5);
        assert_eq!(FrameSampler::new(24.0, 4.0, 240, 360).scale(), 1.0);
    }

    #[test]
    fn boxes_map_back_to_original_pixels() {
        let sampler = FrameSampler::new(24.0, 4.0, 720, 360);
        let restored = sampler.to_original(BoundingBox::new(10, 50, 60, 5), 1280, 720);
        assert_eq!(restored, BoundingBox::new(20, 100, 120, 10));
    }

    #[test]
    fn skipped_frames_reuse_last_result() {
        let mut matches = SampledMatches::new(FrameSampler::new(3.0, 1.0, 100, 100));
        let alice = MatchResult {
            identity: Identity::known("Alice"),
            bbox: BoundingBox::new(1, 2, 3, 0),
        };

        let mut calls = 0;
        let mut seen = Vec::new();
        for f in 0..7u64 {
            let (sampled, result) = matches
                .advance(f, |_| {
                    calls += 1;
                    Ok(if f == 3 { vec![alice.clone()] } else { vec![] })
                })
                .unwrap();
            seen.push((sampled, result.len()));
        }

        assert_eq!(calls, 3);
        assert_eq!(seen[0], (Sampled::Analyzed, 0));
        assert_eq!(seen[4], (Sampled::CarriedOver, 1));
        assert_eq!(seen[5], (Sampled::CarriedOver, 1));
        assert_eq!(seen[6], (Sampled::Analyzed, 0));
    }
}
