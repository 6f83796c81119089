//! Synthetic frame source for `stub://` paths.
//!
//! Frames are dark with one bright square per on-screen actor. The squares
//! wander a little from frame to frame (seeded, so runs repeat exactly) and
//! never overlap, which makes them detectable by `StubBackend`.

use std::time::Duration;

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::VideoSource;
use crate::frame::{Frame, VideoDescriptor};

/// One square "face" in the synthetic stream.
#[derive(Clone, Debug, PartialEq)]
pub struct SyntheticActor {
    pub color: [u8; 3],
    /// On screen for frames `first_frame..last_frame` (exclusive end; `None` = forever).
    pub first_frame: u64,
    pub last_frame: Option<u64>,
}

impl SyntheticActor {
    pub fn always(color: [u8; 3]) -> Self {
        Self {
            color,
            first_frame: 0,
            last_frame: None,
        }
    }

    fn visible_at(&self, frame: u64) -> bool {
        frame >= self.first_frame && self.last_frame.map_or(true, |last| frame < last)
    }
}

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// `None` makes a live-style stream with no known length.
    pub frame_count: Option<u64>,
    pub actors: Vec<SyntheticActor>,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 24.0,
            frame_count: Some(240),
            actors: vec![
                SyntheticActor::always([255, 0, 0]),
                SyntheticActor {
                    color: [0, 255, 0],
                    first_frame: 48,
                    last_frame: Some(168),
                },
                SyntheticActor {
                    color: [0, 0, 255],
                    first_frame: 120,
                    last_frame: None,
                },
            ],
            seed: 7,
        }
    }
}

impl SyntheticConfig {
    /// Parses `stub://<name>[?frames=N&fps=F&width=W&height=H&seed=S]`.
    ///
    /// `frames=0` means unknown length.
    pub fn from_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("stub://")
            .ok_or_else(|| anyhow!("synthetic source path must start with stub://"))?;
        let mut config = Self::default();
        let Some((_, query)) = rest.split_once('?') else {
            return Ok(config);
        };
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("invalid stub parameter '{}'", pair))?;
            let bad = || anyhow!("invalid value for stub parameter '{}': '{}'", key, value);
            match key {
                "frames" => {
                    let frames: u64 = value.parse().map_err(|_| bad())?;
                    config.frame_count = (frames > 0).then_some(frames);
                }
                "fps" => config.fps = value.parse().map_err(|_| bad())?,
                "width" => config.width = value.parse().map_err(|_| bad())?,
                "height" => config.height = value.parse().map_err(|_| bad())?,
                "seed" => config.seed = value.parse().map_err(|_| bad())?,
                _ => return Err(anyhow!("unknown stub parameter '{}'", key)),
            }
        }
        if config.width == 0 || config.height == 0 || config.fps <= 0.0 {
            return Err(anyhow!("stub stream needs positive width, height and fps"));
        }
        Ok(config)
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
    rng: StdRng,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            frame_count: 0,
            rng,
        }
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    fn generate(&mut self, index: u64) -> RgbImage {
        let (width, height) = (self.config.width, self.config.height);
        let mut image = RgbImage::new(width, height);
        let slots = self.config.actors.len().max(1) as u32;
        let slot_w = width / slots;
        let side = (slot_w / 2).min(height / 3).max(4);
        let wander = ((slot_w.saturating_sub(side)) / 4).min(height / 8);

        for (i, actor) in self.config.actors.iter().enumerate() {
            let dx = self.rng.gen_range(0..=wander);
            let dy = self.rng.gen_range(0..=wander);
            if !actor.visible_at(index) {
                continue;
            }
            let x0 = i as u32 * slot_w + (slot_w.saturating_sub(side)) / 2 - wander / 2 + dx;
            let y0 = (height.saturating_sub(side)) / 2 - wander / 2 + dy;
            for y in y0..(y0 + side).min(height) {
                for x in x0..(x0 + side).min(width) {
                    image.put_pixel(x, y, Rgb(actor.color));
                }
            }
        }
        image
    }
}

impl VideoSource for SyntheticSource {
    fn descriptor(&self) -> VideoDescriptor {
        VideoDescriptor {
            width: self.config.width,
            height: self.config.height,
            fps: self.config.fps,
            frame_count: self.config.frame_count,
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self
            .config
            .frame_count
            .is_some_and(|total| self.frame_count >= total)
        {
            return Ok(None);
        }
        let index = self.frame_count;
        let image = self.generate(index);
        self.frame_count += 1;
        let timestamp = Duration::from_secs_f64(index as f64 / self.config.fps);
        Ok(Some(Frame::new(index, timestamp, image)))
    }
}
