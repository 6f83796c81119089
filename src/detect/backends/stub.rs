use std::collections::VecDeque;

use anyhow::Result;
use image::RgbImage;

use crate::detect::backend::FaceBackend;
use crate::detect::result::{BoundingBox, Embedding};

/// Pixels with every channel at or below this value are background.
const BACKGROUND_MAX: u8 = 40;

/// Smallest blob, in pixels, that counts as a face.
const DEFAULT_MIN_AREA: usize = 16;

/// Stub backend for tests and synthetic streams.
///
/// A "face" is a connected blob of bright pixels on a dark background. Its
/// embedding is the blob's mean colour scaled to `0..=1`, so blobs painted in
/// the same colour match each other and differently coloured ones do not.
/// Faces are reported in raster order of their first pixel.
pub struct StubBackend {
    min_area: usize,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            min_area: DEFAULT_MIN_AREA,
        }
    }

    pub fn with_min_area(mut self, min_area: usize) -> Self {
        self.min_area = min_area.max(1);
        self
    }

    fn is_foreground(image: &RgbImage, x: u32, y: u32) -> bool {
        image.get_pixel(x, y).0.iter().any(|&c| c > BACKGROUND_MAX)
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn locate_faces(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>> {
        let (width, height) = image.dimensions();
        let mut visited = vec![false; (width as usize) * (height as usize)];
        let mut faces = Vec::new();
        let mut queue = VecDeque::new();

        for y in 0..height {
            for x in 0..width {
                let idx = (y * width + x) as usize;
                if visited[idx] || !Self::is_foreground(image, x, y) {
                    continue;
                }
                visited[idx] = true;
                queue.push_back((x, y));
                let mut area = 0usize;
                let mut bbox = BoundingBox::new(y, x + 1, y + 1, x);

                while let Some((cx, cy)) = queue.pop_front() {
                    area += 1;
                    bbox.top = bbox.top.min(cy);
                    bbox.bottom = bbox.bottom.max(cy + 1);
                    bbox.left = bbox.left.min(cx);
                    bbox.right = bbox.right.max(cx + 1);

                    let neighbours = [
                        (cx.wrapping_sub(1), cy),
                        (cx + 1, cy),
                        (cx, cy.wrapping_sub(1)),
                        (cx, cy + 1),
                    ];
                    for (nx, ny) in neighbours {
                        if nx >= width || ny >= height {
                            continue;
                        }
                        let nidx = (ny * width + nx) as usize;
                        if !visited[nidx] && Self::is_foreground(image, nx, ny) {
                            visited[nidx] = true;
                            queue.push_back((nx, ny));
                        }
                    }
                }

                if area >= self.min_area {
                    faces.push(bbox);
                }
            }
        }

        Ok(faces)
    }

    fn encode_faces(&mut self, image: &RgbImage, faces: &[BoundingBox]) -> Result<Vec<Embedding>> {
        let mut embeddings = Vec::with_capacity(faces.len());
        for face in faces {
            let mut sum = [0f64; 3];
            let mut count = 0u64;
            for y in face.top..face.bottom.min(image.height()) {
                for x in face.left..face.right.min(image.width()) {
                    if !Self::is_foreground(image, x, y) {
                        continue;
                    }
                    let px = image.get_pixel(x, y).0;
                    for (acc, c) in sum.iter_mut().zip(px) {
                        *acc += c as f64;
                    }
                    count += 1;
                }
            }
            let count = count.max(1) as f64;
            embeddings.push(sum.iter().map(|s| (s / count / 255.0) as f32).collect());
        }
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn paint(image: &mut RgbImage, bbox: BoundingBox, color: [u8; 3]) {
        for y in bbox.top..bbox.bottom {
            for x in bbox.left..bbox.right {
                image.put_pixel(x, y, Rgb(color));
            }
        }
    }

    #[test]
    fn finds_blobs_in_raster_order() {
        let mut image = RgbImage::new(64, 48);
        paint(&mut image, BoundingBox::new(20, 50, 30, 40), [0, 255, 0]);
        paint(&mut image, BoundingBox::new(4, 20, 14, 10), [255, 0, 0]);

        let mut backend = StubBackend::new();
        let detections = backend.detect(&image).unwrap();

        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].bbox, BoundingBox::new(4, 20, 14, 10));
        assert_eq!(detections[0].embedding, vec![1.0, 0.0, 0.0]);
        assert_eq!(detections[1].bbox, BoundingBox::new(20, 50, 30, 40));
        assert_eq!(detections[1].embedding, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn ignores_specks_and_dark_frames() {
        let mut image = RgbImage::new(32, 32);
        paint(&mut image, BoundingBox::new(1, 3, 3, 1), [255, 255, 255]);

        let mut backend = StubBackend::new();
        assert!(backend.locate_faces(&image).unwrap().is_empty());
        assert!(backend
            .locate_faces(&RgbImage::new(8, 8))
            .unwrap()
            .is_empty());
    }
}
