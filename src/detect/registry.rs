use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::backend::FaceBackend;
use super::backends::StubBackend;

/// Backend handle shared between the cast encoder and the frame matcher.
pub type SharedBackend = Arc<Mutex<dyn FaceBackend>>;

/// Registry of face backends, looked up by name.
///
/// Backends are wrapped in `Mutex` because `FaceBackend` methods take `&mut self`.
pub struct BackendRegistry {
    backends: HashMap<String, SharedBackend>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Registry holding the always-available stub backend.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(StubBackend::new());
        registry
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: FaceBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Arc::new(Mutex::new(backend)));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<SharedBackend> {
        self.backends.get(name).cloned()
    }

    pub fn default_backend(&self) -> Option<SharedBackend> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    /// Registered backend names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Backend named `name`, or the default when `name` is `None`.
    pub fn select(&self, name: Option<&str>) -> Result<SharedBackend> {
        match name {
            Some(name) => self.get(name).ok_or_else(|| {
                anyhow!(
                    "backend '{}' not registered (available: {})",
                    name,
                    self.list().join(", ")
                )
            }),
            None => self
                .default_backend()
                .ok_or_else(|| anyhow!("no face backend registered")),
        }
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_registered_backend_is_default() {
        let registry = BackendRegistry::with_defaults();
        let backend = registry.select(None).unwrap();
        assert_eq!(backend.lock().unwrap().name(), "stub");
        assert_eq!(registry.list(), vec!["stub".to_string()]);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let mut registry = BackendRegistry::with_defaults();
        assert!(registry.select(Some("tract")).is_err());
        assert!(registry.set_default("tract").is_err());
        assert!(registry.set_default("stub").is_ok());
    }
}
