//! Cast photo sets and where they come from.
//!
//! A `Cast` is an ordered list of actors, each with an ordered photo list.
//! The order matters: it becomes the encoding order, which decides match
//! tie-breaks.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::CastwatchError;

const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CastMember {
    pub name: String,
    pub photos: Vec<PathBuf>,
}

/// Ordered actor → photos mapping.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cast {
    members: Vec<CastMember>,
}

impl Cast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds photos for `name`. A name seen before keeps its position and gains the photos.
    pub fn add(&mut self, name: impl Into<String>, photos: impl IntoIterator<Item = PathBuf>) {
        let name = name.into();
        match self.members.iter_mut().find(|m| m.name == name) {
            Some(member) => member.photos.extend(photos),
            None => self.members.push(CastMember {
                name,
                photos: photos.into_iter().collect(),
            }),
        }
    }

    pub fn members(&self) -> &[CastMember] {
        &self.members
    }

    /// Actor names in cast order.
    pub fn names(&self) -> Vec<String> {
        self.members.iter().map(|m| m.name.clone()).collect()
    }

    pub fn photo_count(&self) -> usize {
        self.members.iter().map(|m| m.photos.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Appends manually supplied identities after the looked-up cast.
    pub fn merge(&mut self, other: Cast) {
        for member in other.members {
            self.add(member.name, member.photos);
        }
    }
}

/// Parses one `NAME PHOTO [PHOTO...]` token list.
pub fn parse_additional_identity(tokens: &[String]) -> Result<CastMember, CastwatchError> {
    match tokens {
        [name, photos @ ..] if !photos.is_empty() && !name.trim().is_empty() => Ok(CastMember {
            name: name.trim().to_string(),
            photos: photos.iter().map(PathBuf::from).collect(),
        }),
        _ => Err(CastwatchError::MalformedAdditionalIdentity {
            tokens: tokens.to_vec(),
        }),
    }
}

/// Splits one `NAME=PHOTO[,PHOTO...]` command line value into tokens.
///
/// A value without `=` or without photos yields fewer than two tokens, which
/// `parse_additional_identity` rejects.
pub fn split_additional_identity(value: &str) -> Vec<String> {
    let (name, photos) = value.split_once('=').unwrap_or((value, ""));
    std::iter::once(name.trim().to_string())
        .chain(
            photos
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        )
        .collect()
}

/// Builds a cast from every `--add` entry, failing on the first malformed one.
pub fn additional_identities(entries: &[Vec<String>]) -> Result<Cast, CastwatchError> {
    let mut cast = Cast::new();
    for tokens in entries {
        let member = parse_additional_identity(tokens)?;
        cast.add(member.name, member.photos);
    }
    Ok(cast)
}

/// Source of cast photos for a movie title.
pub trait CastProvider {
    /// Cast for `title`. `CastwatchError::CastNotFound` when the title is unknown.
    fn lookup(&self, title: &str) -> Result<Cast>;
}

/// Looks up a cast, treating `CastNotFound` as an empty cast.
pub fn lookup_or_empty(provider: &dyn CastProvider, title: &str) -> Result<Cast> {
    match provider.lookup(title) {
        Ok(cast) => Ok(cast),
        Err(err) => match err.downcast_ref::<CastwatchError>() {
            Some(CastwatchError::CastNotFound { .. }) => {
                log::warn!("{}; matching against no known faces", err);
                Ok(Cast::new())
            }
            _ => Err(err),
        },
    }
}

/// Directory provider: `<root>/<actor name>/<photo>`.
///
/// Actors are ordered by directory name, photos by file name, capped at
/// `photos_per_actor`. The title is not used: the directory is the cast.
pub struct DirectoryCastProvider {
    root: PathBuf,
    photos_per_actor: usize,
}

impl DirectoryCastProvider {
    pub fn new(root: impl Into<PathBuf>, photos_per_actor: usize) -> Self {
        Self {
            root: root.into(),
            photos_per_actor,
        }
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read cast directory {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("failed to list {}", dir.display()))?;
    entries.sort();
    Ok(entries)
}

fn is_photo(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| PHOTO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

impl CastProvider for DirectoryCastProvider {
    fn lookup(&self, title: &str) -> Result<Cast> {
        if !self.root.is_dir() {
            return Err(CastwatchError::CastNotFound {
                title: title.to_string(),
            }
            .into());
        }
        let mut cast = Cast::new();
        for actor_dir in sorted_entries(&self.root)? {
            if !actor_dir.is_dir() {
                continue;
            }
            let Some(name) = actor_dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let photos: Vec<PathBuf> = sorted_entries(&actor_dir)?
                .into_iter()
                .filter(|p| p.is_file() && is_photo(p))
                .take(self.photos_per_actor)
                .collect();
            if !photos.is_empty() {
                cast.add(name, photos);
            }
        }
        Ok(cast)
    }
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    title: String,
    cast: Vec<ManifestMember>,
}

#[derive(Debug, Deserialize)]
struct ManifestMember {
    name: String,
    photos: Vec<PathBuf>,
}

/// JSON manifest provider.
///
/// ```json
/// [{"title": "Heat", "cast": [{"name": "Al Pacino", "photos": ["pacino/1.jpg"]}]}]
/// ```
///
/// Titles match case-insensitively. Relative photo paths resolve against the
/// manifest's directory.
pub struct ManifestCastProvider {
    entries: Vec<ManifestEntry>,
    base_dir: PathBuf,
    photos_per_actor: usize,
}

impl ManifestCastProvider {
    pub fn load(path: &Path, photos_per_actor: usize) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read cast manifest {}", path.display()))?;
        let entries = serde_json::from_str(&raw)
            .with_context(|| format!("invalid cast manifest {}", path.display()))?;
        Ok(Self {
            entries,
            base_dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            photos_per_actor,
        })
    }
}

impl CastProvider for ManifestCastProvider {
    fn lookup(&self, title: &str) -> Result<Cast> {
        let wanted = title.trim().to_lowercase();
        let entry = self
            .entries
            .iter()
            .find(|e| e.title.trim().to_lowercase() == wanted)
            .ok_or_else(|| CastwatchError::CastNotFound {
                title: title.to_string(),
            })?;
        let mut cast = Cast::new();
        for member in &entry.cast {
            let photos = member
                .photos
                .iter()
                .take(self.photos_per_actor)
                .map(|p| self.base_dir.join(p));
            cast.add(member.name.clone(), photos);
        }
        Ok(cast)
    }
}
