//! castwatch
//!
//! Tracks which cast members appear on screen in a video.
//!
//! # Architecture
//!
//! A run is a single-threaded, frame-at-a-time stream:
//!
//! 1. **Cast encoding**: each cast photo is turned into one face embedding,
//!    preserving actor order and photo order. Photos without a face are skipped.
//! 2. **Sampling**: detection runs on every `stride`-th frame of a downscaled
//!    copy; frames in between carry the last result over.
//! 3. **Matching**: each detected face takes the name of the first cast
//!    encoding within tolerance, or `Unknown`.
//! 4. **Aggregation**: analyzed frames become rows of a presence table,
//!    which can be saved as CSV.
//! 5. **Annotation**: frames are labelled and written to an optional sink.
//! 6. **Timeline**: a presence table plus the movie length renders to a
//!    per-actor bar chart.
//!
//! # Module Structure
//!
//! - `ingest`: frame sources (local files, synthetic `stub://` streams)
//! - `detect`: face backends, bounding boxes, embedding distance
//! - `cast`, `encoder`: cast lookup and cast photo encoding
//! - `sampler`, `matcher`, `stats`, `annotate`, `sink`: the frame loop stages
//! - `pipeline`: the frame loop itself
//! - `timeline`, `render`: timeline computation and drawing

pub mod annotate;
pub mod cast;
pub mod config;
pub mod detect;
pub mod diagnostics;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod matcher;
pub mod pipeline;
pub mod render;
pub mod sampler;
pub mod sink;
pub mod stats;
pub mod timeline;
pub mod ui;

pub use annotate::FrameAnnotator;
pub use cast::{Cast, CastMember, CastProvider, DirectoryCastProvider, ManifestCastProvider};
pub use config::CastwatchConfig;
pub use detect::{
    BackendRegistry, BoundingBox, Detection, Embedding, FaceBackend, SharedBackend, StubBackend,
};
pub use diagnostics::{Diagnostics, LogDiagnostics, RecordingDiagnostics};
pub use encoder::{encode_cast, Encoding};
pub use error::CastwatchError;
pub use frame::{Frame, VideoDescriptor};
pub use ingest::{open_source, SyntheticConfig, SyntheticSource, VideoSource};
pub use matcher::{FaceMatcher, Identity, MatchResult};
pub use pipeline::{Pipeline, PipelineOptions, RunOutput, RunSummary, StopReason};
pub use sampler::FrameSampler;
pub use sink::{open_sink, FrameFormat, ImageSequenceSink, NullSink, SinkConfig, VideoSink};
pub use stats::PresenceTable;
pub use timeline::{PresenceTimeline, TimelineEvent, TimelineVisualizer};
