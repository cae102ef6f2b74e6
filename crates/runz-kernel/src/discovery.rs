//! Package discovery — the filesystem collaborator.
//!
//! The planner and resolver only ever see the [`PackageDiscovery`] trait:
//! locating package directories under a root and loading their manifests.
//! [`FsDiscovery`] is the real filesystem implementation; [`MapDiscovery`]
//! is an in-memory implementation for tests.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use runz_types::{Manifest, RunError, RunResult};

/// An abstract package location.
///
/// Locations are normalized `/`-separated paths without trailing slashes,
/// comparable as string prefixes to compute parent/child relations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    path: String,
}

impl Location {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: normalize(&path.into()) }
    }

    /// The normalized path string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The last path component.
    pub fn base_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// The parent location, if any.
    pub fn parent(&self) -> Option<Location> {
        let idx = self.path.rfind('/')?;
        if idx == 0 {
            if self.path.len() == 1 {
                return None;
            }
            return Some(Location { path: "/".to_string() });
        }
        Some(Location { path: self.path[..idx].to_string() })
    }

    /// Resolve a relative selector path (`.`, `..`, `./pkg`, `../sibling`)
    /// against this location.
    pub fn join(&self, relative: &str) -> Location {
        let mut parts: Vec<&str> = self
            .path
            .split('/')
            .filter(|p| !p.is_empty())
            .collect();
        let absolute = self.path.starts_with('/');
        for piece in relative.split('/') {
            match piece {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                other => parts.push(other),
            }
        }
        let mut path = if absolute { "/".to_string() } else { String::new() };
        path.push_str(&parts.join("/"));
        Location::new(&path)
    }

    /// Whether `self` is a strict ancestor directory of `other`.
    pub fn is_ancestor_of(&self, other: &Location) -> bool {
        other.path.len() > self.path.len()
            && other.path.starts_with(&self.path)
            && other.path.as_bytes()[self.path.len()] == b'/'
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)
    }
}

fn normalize(path: &str) -> String {
    let mut out = path.replace('\\', "/");
    while out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    if out.is_empty() {
        out.push('.');
    }
    out
}

/// Locates packages and loads their manifests.
#[async_trait]
pub trait PackageDiscovery: Send + Sync {
    /// Every package location under `root` (inclusive), parents before
    /// children.
    async fn locate(&self, root: &Location) -> RunResult<Vec<Location>>;

    /// Load the manifest at `location`. `None` when there is no package
    /// there.
    async fn load(&self, location: &Location) -> RunResult<Option<Manifest>>;
}

/// Filesystem discovery: a package is a directory with a `package.json`.
pub struct FsDiscovery;

impl FsDiscovery {
    fn manifest_path(location: &Location) -> PathBuf {
        PathBuf::from(location.path()).join("package.json")
    }
}

#[async_trait]
impl PackageDiscovery for FsDiscovery {
    async fn locate(&self, root: &Location) -> RunResult<Vec<Location>> {
        let mut found = Vec::new();
        let mut stack = vec![root.clone()];
        while let Some(dir) = stack.pop() {
            if tokio::fs::try_exists(Self::manifest_path(&dir)).await? {
                found.push(dir.clone());
            }
            let mut entries = match tokio::fs::read_dir(dir.path()).await {
                Ok(entries) => entries,
                Err(_) => continue,
            };
            let mut children = Vec::new();
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                // Dependency trees and hidden directories are not packages
                // of this project.
                if name.starts_with('.') || name == "node_modules" {
                    continue;
                }
                if entry.file_type().await?.is_dir() {
                    children.push(dir.join(&name));
                }
            }
            // The stack pops in reverse, so push children sorted descending
            // to visit them in lexicographic order.
            children.sort();
            for child in children.into_iter().rev() {
                stack.push(child);
            }
        }
        Ok(found)
    }

    async fn load(&self, location: &Location) -> RunResult<Option<Manifest>> {
        let path = Self::manifest_path(location);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let manifest = Manifest::from_json(&bytes).map_err(|source| RunError::Manifest {
            location: location.path().to_string(),
            source,
        })?;
        Ok(Some(manifest))
    }
}

/// In-memory discovery keyed by location path. Test double for
/// [`FsDiscovery`].
#[derive(Default)]
pub struct MapDiscovery {
    manifests: HashMap<Location, Manifest>,
}

impl MapDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a package at `path` with the given manifest.
    pub fn insert(&mut self, path: &str, manifest: Manifest) -> &mut Self {
        self.manifests.insert(Location::new(path), manifest);
        self
    }

    /// Register a package built from `(script name, command line)` pairs.
    pub fn package(
        &mut self,
        path: &str,
        name: Option<&str>,
        scripts: &[(&str, &str)],
    ) -> &mut Self {
        let mut manifest = Manifest {
            name: name.map(str::to_string),
            ..Manifest::default()
        };
        for (script, line) in scripts {
            manifest.scripts.insert(script.to_string(), line.to_string());
        }
        self.insert(path, manifest)
    }
}

#[async_trait]
impl PackageDiscovery for MapDiscovery {
    async fn locate(&self, root: &Location) -> RunResult<Vec<Location>> {
        let mut found: Vec<Location> = self
            .manifests
            .keys()
            .filter(|loc| *loc == root || root.is_ancestor_of(loc))
            .cloned()
            .collect();
        found.sort();
        Ok(found)
    }

    async fn load(&self, location: &Location) -> RunResult<Option<Manifest>> {
        Ok(self.manifests.get(location).cloned())
    }
}
