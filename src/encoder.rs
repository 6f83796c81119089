//! Cast photo encoding.
//!
//! Every photo gets exactly one embedding attempt. Photos without a face are
//! reported through `Diagnostics::skip` and dropped; survivors keep the
//! (actor, photo) order of the input because that order is the matcher's
//! tie-break.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;

use crate::cast::Cast;
use crate::detect::{Embedding, FaceBackend};
use crate::diagnostics::Diagnostics;

/// One known face.
#[derive(Clone, Debug, PartialEq)]
pub struct Encoding {
    pub name: String,
    pub vector: Embedding,
    pub source_photo: PathBuf,
}

/// Encodes a cast, one photo at a time, in cast order.
///
/// Unreadable photos are skipped like photos without a face. Only backend
/// failures abort.
pub fn encode_cast(
    cast: &Cast,
    backend: &mut dyn FaceBackend,
    diagnostics: &dyn Diagnostics,
) -> Result<Vec<Encoding>> {
    diagnostics.info(&format!(
        "encoding {} photos of {} actors",
        cast.photo_count(),
        cast.members().len()
    ));

    let mut encodings = Vec::with_capacity(cast.photo_count());
    for member in cast.members() {
        diagnostics.verbose(&format!("encoding {} photos:", member.name));
        for photo in &member.photos {
            let image = match load_photo(photo) {
                Ok(image) => image,
                Err(e) => {
                    diagnostics.verbose(&format!("\t{:#}", e));
                    diagnostics.skip(&member.name, photo);
                    continue;
                }
            };
            match encode_photo(&image, backend)? {
                Some(vector) => {
                    diagnostics.verbose(&format!("\t{} encoded", photo.display()));
                    encodings.push(Encoding {
                        name: member.name.clone(),
                        vector,
                        source_photo: photo.clone(),
                    });
                }
                None => diagnostics.skip(&member.name, photo),
            }
        }
    }

    diagnostics.info(&format!("finished encoding: {} known faces", encodings.len()));
    Ok(encodings)
}

fn load_photo(path: &Path) -> Result<RgbImage> {
    let image = image::open(path)
        .with_context(|| format!("failed to load photo {}", path.display()))?;
    Ok(image.to_rgb8())
}

/// Embedding of the first face the backend reports, if any.
pub fn encode_photo(image: &RgbImage, backend: &mut dyn FaceBackend) -> Result<Option<Embedding>> {
    let faces = backend.locate_faces(image)?;
    let Some(first) = faces.first() else {
        return Ok(None);
    };
    Ok(backend
        .encode_faces(image, std::slice::from_ref(first))?
        .into_iter()
        .next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::StubBackend;
    use crate::diagnostics::RecordingDiagnostics;
    use image::Rgb;

    fn write_photo(dir: &Path, name: &str, color: Option<[u8; 3]>) -> PathBuf {
        let mut image = RgbImage::new(40, 40);
        if let Some(color) = color {
            for y in 10..30 {
                for x in 10..30 {
                    image.put_pixel(x, y, Rgb(color));
                }
            }
        }
        let path = dir.join(name);
        image.save(&path).unwrap();
        path
    }

    #[test]
    fn actor_without_faces_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let mut cast = Cast::new();
        cast.add("Alice", vec![write_photo(dir.path(), "a1.png", Some([255, 0, 0]))]);
        cast.add("Bob", vec![write_photo(dir.path(), "b1.png", None)]);

        let diag = RecordingDiagnostics::new();
        let encodings = encode_cast(&cast, &mut StubBackend::new(), &diag).unwrap();

        assert_eq!(encodings.len(), 1);
        assert_eq!(encodings[0].name, "Alice");
        assert_eq!(encodings[0].vector, vec![1.0, 0.0, 0.0]);
        assert_eq!(diag.skipped(), vec![("Bob".to_string(), dir.path().join("b1.png"))]);
    }

    #[test]
    fn skipped_photos_never_reorder_survivors() {
        let dir = tempfile::tempdir().unwrap();
        let mut cast = Cast::new();
        cast.add(
            "Alice",
            vec![
                write_photo(dir.path(), "a1.png", Some([255, 0, 0])),
                write_photo(dir.path(), "a2.png", None),
                write_photo(dir.path(), "a3.png", Some([200, 0, 0])),
            ],
        );
        cast.add(
            "Bob",
            vec![
                dir.path().join("missing.png"),
                write_photo(dir.path(), "b2.png", Some([0, 0, 255])),
            ],
        );

        let diag = RecordingDiagnostics::new();
        let encodings = encode_cast(&cast, &mut StubBackend::new(), &diag).unwrap();

        let order: Vec<_> = encodings
            .iter()
            .map(|e| e.source_photo.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(order, vec!["a1.png", "a3.png", "b2.png"]);
        assert_eq!(diag.skipped().len(), 2);
    }
}
