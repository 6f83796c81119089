mod backend;
pub mod backends;
mod registry;
mod result;

pub use backend::{face_distance, is_match, FaceBackend, DEFAULT_TOLERANCE};
pub use backends::StubBackend;
pub use registry::{BackendRegistry, SharedBackend};
pub use result::{BoundingBox, Detection, Embedding};
