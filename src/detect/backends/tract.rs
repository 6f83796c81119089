#![cfg(feature = "backend-tract")]

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::backend::FaceBackend;
use crate::detect::result::{BoundingBox, Embedding};

type Plan = TypedRunnableModel<TypedModel>;

const DETECTOR_WIDTH: usize = 320;
const DETECTOR_HEIGHT: usize = 240;
const EMBEDDER_SIZE: usize = 112;

/// Model files for the tract backend.
#[derive(Clone, Debug)]
pub struct TractModelPaths {
    /// Ultra-light face detector (1x3x240x320 input, `scores` and `boxes` outputs).
    pub detector: PathBuf,
    /// Face embedder (1x3x112x112 input, 1xD output).
    pub embedder: PathBuf,
}

/// Tract-based backend for ONNX face detection and embedding.
///
/// Loads local model files once and runs both stages on RGB frames. Embeddings
/// are L2-normalised.
pub struct TractBackend {
    detector: Plan,
    embedder: Plan,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl TractBackend {
    pub fn new(paths: &TractModelPaths) -> Result<Self> {
        Ok(Self {
            detector: load_plan(&paths.detector, DETECTOR_HEIGHT, DETECTOR_WIDTH)?,
            embedder: load_plan(&paths.embedder, EMBEDDER_SIZE, EMBEDDER_SIZE)?,
            confidence_threshold: 0.7,
            iou_threshold: 0.3,
        })
    }

    /// Override the default detection confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }
}

fn load_plan(model_path: &Path, height: usize, width: usize) -> Result<Plan> {
    tract_onnx::onnx()
        .model_for_path(model_path)
        .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
        .with_input_fact(
            0,
            InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, height, width)),
        )
        .context("failed to set input fact")?
        .into_optimized()
        .context("failed to optimize ONNX model")?
        .into_runnable()
        .context("failed to build runnable ONNX model")
}

fn to_tensor(image: &RgbImage, mean: f32, scale: f32) -> Tensor {
    let (width, height) = (image.width() as usize, image.height() as usize);
    tract_ndarray::Array4::from_shape_fn((1, 3, height, width), |(_, channel, y, x)| {
        let px = image.get_pixel(x as u32, y as u32).0;
        (px[channel] as f32 - mean) / scale
    })
    .into_tensor()
}

fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let top = a.top.max(b.top);
    let left = a.left.max(b.left);
    let bottom = a.bottom.min(b.bottom);
    let right = a.right.min(b.right);
    if bottom <= top || right <= left {
        return 0.0;
    }
    let inter = ((bottom - top) * (right - left)) as f32;
    let union = (a.width() * a.height() + b.width() * b.height()) as f32 - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

impl FaceBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn locate_faces(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>> {
        let (width, height) = image.dimensions();
        let resized = imageops::resize(
            image,
            DETECTOR_WIDTH as u32,
            DETECTOR_HEIGHT as u32,
            FilterType::Triangle,
        );
        let outputs = self
            .detector
            .run(tvec!(to_tensor(&resized, 127.0, 128.0).into()))
            .context("face detection inference failed")?;
        let scores = outputs
            .first()
            .ok_or_else(|| anyhow!("detector produced no scores"))?
            .to_array_view::<f32>()
            .context("detector scores were not f32")?;
        let boxes = outputs
            .get(1)
            .ok_or_else(|| anyhow!("detector produced no boxes"))?
            .to_array_view::<f32>()
            .context("detector boxes were not f32")?;

        let anchors = scores.shape().get(1).copied().unwrap_or(0);
        let mut candidates: Vec<(f32, BoundingBox)> = Vec::new();
        for i in 0..anchors {
            let confidence = scores[[0, i, 1]];
            if confidence < self.confidence_threshold {
                continue;
            }
            let px = |v: f32, extent: u32| (v.clamp(0.0, 1.0) * extent as f32).round() as u32;
            let bbox = BoundingBox::new(
                px(boxes[[0, i, 1]], height),
                px(boxes[[0, i, 2]], width),
                px(boxes[[0, i, 3]], height),
                px(boxes[[0, i, 0]], width),
            );
            if bbox.width() > 0 && bbox.height() > 0 {
                candidates.push((confidence, bbox));
            }
        }

        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));
        let mut kept: Vec<BoundingBox> = Vec::new();
        for (_, bbox) in candidates {
            if kept.iter().all(|k| iou(k, &bbox) <= self.iou_threshold) {
                kept.push(bbox);
            }
        }
        Ok(kept)
    }

    fn encode_faces(&mut self, image: &RgbImage, faces: &[BoundingBox]) -> Result<Vec<Embedding>> {
        let mut embeddings = Vec::with_capacity(faces.len());
        for face in faces {
            let crop = imageops::crop_imm(image, face.left, face.top, face.width(), face.height())
                .to_image();
            let crop = imageops::resize(
                &crop,
                EMBEDDER_SIZE as u32,
                EMBEDDER_SIZE as u32,
                FilterType::Triangle,
            );
            let outputs = self
                .embedder
                .run(tvec!(to_tensor(&crop, 127.5, 128.0).into()))
                .context("face embedding inference failed")?;
            let output = outputs
                .first()
                .ok_or_else(|| anyhow!("embedder produced no outputs"))?;
            let values: Vec<f32> = output
                .to_array_view::<f32>()
                .context("embedder output was not f32")?
                .iter()
                .copied()
                .collect();
            let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > 0.0 {
                embeddings.push(values.iter().map(|v| v / norm).collect());
            } else {
                embeddings.push(values);
            }
        }
        Ok(embeddings)
    }
}
