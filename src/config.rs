use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::DEFAULT_TOLERANCE;
use crate::error::CastwatchError;
use crate::sink::{FrameFormat, DEFAULT_CODEC};

const DEFAULT_ANALYZED_FPS: f64 = 4.0;
const DEFAULT_ANALYSIS_HEIGHT: u32 = 360;
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_IMAGE_FORMAT: &str = "jpg";
const DEFAULT_PHOTOS_PER_ACTOR: usize = 5;
const DEFAULT_TOP_ACTORS: usize = 5;

#[derive(Debug, Deserialize, Default)]
struct CastwatchConfigFile {
    analysis: Option<AnalysisConfigFile>,
    output: Option<OutputConfigFile>,
    cast: Option<CastConfigFile>,
    limits: Option<LimitsConfigFile>,
    timeline: Option<TimelineConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct AnalysisConfigFile {
    analyzed_fps: Option<f64>,
    analysis_height: Option<u32>,
    tolerance: Option<f32>,
    backend: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputConfigFile {
    codec: Option<String>,
    highlight_faces: Option<bool>,
    image_format: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct CastConfigFile {
    dir: Option<PathBuf>,
    manifest: Option<PathBuf>,
    photos_per_actor: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct LimitsConfigFile {
    max_seconds: Option<f64>,
    max_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct TimelineConfigFile {
    top_actors: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct CastwatchConfig {
    pub analysis: AnalysisSettings,
    pub output: OutputSettings,
    pub cast: CastSettings,
    pub limits: LimitSettings,
    pub timeline: TimelineSettings,
}

#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub analyzed_fps: f64,
    pub analysis_height: u32,
    pub tolerance: f32,
    pub backend: String,
}

#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub codec: String,
    pub highlight_faces: bool,
    pub image_format: FrameFormat,
}

#[derive(Debug, Clone)]
pub struct CastSettings {
    pub dir: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub photos_per_actor: usize,
}

#[derive(Debug, Clone, Default)]
pub struct LimitSettings {
    pub max_seconds: Option<f64>,
    pub max_frames: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct TimelineSettings {
    pub top_actors: usize,
}

impl Default for CastwatchConfig {
    fn default() -> Self {
        Self {
            analysis: AnalysisSettings {
                analyzed_fps: DEFAULT_ANALYZED_FPS,
                analysis_height: DEFAULT_ANALYSIS_HEIGHT,
                tolerance: DEFAULT_TOLERANCE,
                backend: DEFAULT_BACKEND.to_string(),
            },
            output: OutputSettings {
                codec: DEFAULT_CODEC.to_string(),
                highlight_faces: false,
                image_format: FrameFormat::Jpeg,
            },
            cast: CastSettings {
                dir: None,
                manifest: None,
                photos_per_actor: DEFAULT_PHOTOS_PER_ACTOR,
            },
            limits: LimitSettings::default(),
            timeline: TimelineSettings {
                top_actors: DEFAULT_TOP_ACTORS,
            },
        }
    }
}

impl CastwatchConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CASTWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: CastwatchConfigFile) -> Result<Self> {
        let defaults = Self::default();
        let analysis = file.analysis.unwrap_or_default();
        let output = file.output.unwrap_or_default();
        let cast = file.cast.unwrap_or_default();
        let limits = file.limits.unwrap_or_default();
        let timeline = file.timeline.unwrap_or_default();

        let image_format = match output.image_format.as_deref() {
            Some(name) => FrameFormat::parse(name)?,
            None => FrameFormat::parse(DEFAULT_IMAGE_FORMAT)?,
        };

        Ok(Self {
            analysis: AnalysisSettings {
                analyzed_fps: analysis
                    .analyzed_fps
                    .unwrap_or(defaults.analysis.analyzed_fps),
                analysis_height: analysis
                    .analysis_height
                    .unwrap_or(defaults.analysis.analysis_height),
                tolerance: analysis.tolerance.unwrap_or(defaults.analysis.tolerance),
                backend: analysis.backend.unwrap_or(defaults.analysis.backend),
            },
            output: OutputSettings {
                codec: output.codec.unwrap_or(defaults.output.codec),
                highlight_faces: output
                    .highlight_faces
                    .unwrap_or(defaults.output.highlight_faces),
                image_format,
            },
            cast: CastSettings {
                dir: cast.dir,
                manifest: cast.manifest,
                photos_per_actor: cast
                    .photos_per_actor
                    .unwrap_or(defaults.cast.photos_per_actor),
            },
            limits: LimitSettings {
                max_seconds: limits.max_seconds,
                max_frames: limits.max_frames,
            },
            timeline: TimelineSettings {
                top_actors: timeline.top_actors.unwrap_or(defaults.timeline.top_actors),
            },
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(fps) = std::env::var("CASTWATCH_ANALYZED_FPS") {
            self.analysis.analyzed_fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("CASTWATCH_ANALYZED_FPS must be a number"))?;
        }
        if let Ok(height) = std::env::var("CASTWATCH_ANALYSIS_HEIGHT") {
            self.analysis.analysis_height = height
                .trim()
                .parse()
                .map_err(|_| anyhow!("CASTWATCH_ANALYSIS_HEIGHT must be an integer pixel height"))?;
        }
        if let Ok(tolerance) = std::env::var("CASTWATCH_TOLERANCE") {
            self.analysis.tolerance = tolerance
                .trim()
                .parse()
                .map_err(|_| anyhow!("CASTWATCH_TOLERANCE must be a number"))?;
        }
        if let Ok(backend) = std::env::var("CASTWATCH_BACKEND") {
            if !backend.trim().is_empty() {
                self.analysis.backend = backend.trim().to_string();
            }
        }
        if let Ok(dir) = std::env::var("CASTWATCH_CAST_DIR") {
            if !dir.trim().is_empty() {
                self.cast.dir = Some(PathBuf::from(dir));
            }
        }
        if let Ok(manifest) = std::env::var("CASTWATCH_CAST_MANIFEST") {
            if !manifest.trim().is_empty() {
                self.cast.manifest = Some(PathBuf::from(manifest));
            }
        }
        Ok(())
    }

    pub fn validate(&mut self) -> Result<()> {
        let invalid = |msg: &str| -> anyhow::Error { CastwatchError::Config(msg.to_string()).into() };

        if !(self.analysis.analyzed_fps.is_finite() && self.analysis.analyzed_fps > 0.0) {
            return Err(invalid("analyzed_fps must be greater than zero"));
        }
        if self.analysis.analysis_height == 0 {
            return Err(invalid("analysis_height must be greater than zero"));
        }
        if !(self.analysis.tolerance.is_finite() && self.analysis.tolerance > 0.0) {
            return Err(invalid("tolerance must be greater than zero"));
        }
        if self.analysis.backend.is_empty() {
            return Err(invalid("backend must not be empty"));
        }

        self.output.codec = self.output.codec.trim().to_ascii_uppercase();
        if self.output.codec.len() != 4 || !self.output.codec.is_ascii() {
            return Err(invalid("codec must be a four character code such as MJPG"));
        }

        if self.cast.photos_per_actor == 0 {
            return Err(invalid("photos_per_actor must be greater than zero"));
        }
        if self.cast.dir.is_some() && self.cast.manifest.is_some() {
            return Err(invalid("set either a cast directory or a cast manifest, not both"));
        }
        if self
            .limits
            .max_seconds
            .is_some_and(|secs| !(secs.is_finite() && secs > 0.0))
        {
            return Err(invalid("max_seconds must be greater than zero"));
        }
        if self.limits.max_frames == Some(0) {
            return Err(invalid("max_frames must be greater than zero"));
        }
        if self.timeline.top_actors == 0 {
            return Err(invalid("top_actors must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<CastwatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
