//! Diagnostics sink passed explicitly into each component.
//!
//! Components never log through global progress state. They report to a
//! `Diagnostics` implementation handed to them by the caller, which keeps
//! skipped photos and other recoverable events observable in tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Recoverable event reported by a component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiagnosticEvent {
    Info(String),
    Verbose(String),
    /// A cast photo produced no face and was excluded.
    EncodingSkipped { actor: String, photo: PathBuf },
}

pub trait Diagnostics {
    fn info(&self, message: &str);

    fn verbose(&self, message: &str);

    /// A cast photo yielded no encoding. The actor stays eligible through other photos.
    fn skip(&self, actor: &str, photo: &Path);
}

/// Forwards events to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn info(&self, message: &str) {
        log::info!("{}", message);
    }

    fn verbose(&self, message: &str) {
        log::debug!("{}", message);
    }

    fn skip(&self, actor: &str, photo: &Path) {
        log::warn!(
            "failed to encode {} for {}: face not found",
            photo.display(),
            actor
        );
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn skipped(&self) -> Vec<(String, PathBuf)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DiagnosticEvent::EncodingSkipped { actor, photo } => Some((actor, photo)),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: DiagnosticEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn info(&self, message: &str) {
        self.push(DiagnosticEvent::Info(message.to_string()));
    }

    fn verbose(&self, message: &str) {
        self.push(DiagnosticEvent::Verbose(message.to_string()));
    }

    fn skip(&self, actor: &str, photo: &Path) {
        self.push(DiagnosticEvent::EncodingSkipped {
            actor: actor.to_string(),
            photo: photo.to_path_buf(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_keeps_event_order() {
        let diag = RecordingDiagnostics::new();
        diag.info("start");
        diag.skip("Bob", Path::new("b1.jpg"));
        diag.verbose("done");

        let events = diag.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], DiagnosticEvent::Info("start".to_string()));
        assert_eq!(
            diag.skipped(),
            vec![("Bob".to_string(), PathBuf::from("b1.jpg"))]
        );
    }
}
