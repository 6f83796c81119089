use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::detect::result::{BoundingBox, Detection, Embedding};

/// Euclidean distance at or below which two embeddings are the same person.
pub const DEFAULT_TOLERANCE: f32 = 0.6;

/// Face detector + embedder capability.
///
/// Backends locate faces and turn each one into a fixed-length embedding.
/// Matching policy lives in `FaceMatcher`; backends only measure.
pub trait FaceBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Face locations in `image` pixel space, in the backend's detection order.
    fn locate_faces(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>>;

    /// One embedding per entry of `faces`, same order.
    fn encode_faces(&mut self, image: &RgbImage, faces: &[BoundingBox]) -> Result<Vec<Embedding>>;

    /// Locate and encode in one pass.
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>> {
        let faces = self.locate_faces(image)?;
        let embeddings = self.encode_faces(image, &faces)?;
        if embeddings.len() != faces.len() {
            return Err(anyhow!(
                "backend {} returned {} embeddings for {} faces",
                self.name(),
                embeddings.len(),
                faces.len()
            ));
        }
        Ok(faces
            .into_iter()
            .zip(embeddings)
            .map(|(bbox, embedding)| Detection { bbox, embedding })
            .collect())
    }

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Euclidean distance between two embeddings. Infinite when lengths differ.
pub fn face_distance(known: &[f32], candidate: &[f32]) -> f32 {
    if known.len() != candidate.len() {
        return f32::INFINITY;
    }
    known
        .iter()
        .zip(candidate)
        .map(|(a, b)| (a - b) * (a - b))
        .sum::<f32>()
        .sqrt()
}

/// Same-person predicate used by the matcher.
pub fn is_match(known: &[f32], candidate: &[f32], tolerance: f32) -> bool {
    face_distance(known, candidate) <= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_uses_inclusive_tolerance() {
        assert!(is_match(&[0.0, 0.0], &[0.6, 0.0], 0.6));
        assert!(!is_match(&[0.0, 0.0], &[0.0, 0.61], 0.6));
    }

    #[test]
    fn mismatched_lengths_never_match() {
        assert_eq!(face_distance(&[1.0], &[1.0, 0.0]), f32::INFINITY);
        assert!(!is_match(&[1.0], &[1.0, 0.0], 10.0));
    }
}
