//! The package model.
//!
//! A [`Package`] is a location plus a manifest. It derives its alias list
//! from the manifest name (`@scope/name/sub` splits into scope, unscoped
//! name and sub-package name) and eagerly builds a task per declared script.
//!
//! The [`PackageResolver`] constructs packages on demand through the
//! [`PackageDiscovery`] collaborator, caching by location and wiring each
//! package to its nearest named ancestor.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use runz_types::{Manifest, RunResult, TaskSpec};
use tokio::sync::Mutex;

use crate::builder::TaskSpecBuilder;
use crate::discovery::{Location, PackageDiscovery};
use crate::task::Task;

/// A package: location, manifest, aliases and its task table.
pub struct Package {
    location: Location,
    manifest: Manifest,
    aliases: Vec<String>,
    scope_name: Option<String>,
    sub_package_name: Option<String>,
    /// Nearest named strict ancestor, when one exists.
    ancestor: Option<Arc<Package>>,
    tasks: IndexMap<String, Arc<Task>>,
}

impl Package {
    /// Construct a package, parsing every manifest script into a task.
    ///
    /// `ancestor` is the nearest named ancestor package in the directory
    /// tree, when the caller knows one.
    pub fn new(
        location: Location,
        manifest: Manifest,
        ancestor: Option<Arc<Package>>,
    ) -> RunResult<Arc<Package>> {
        // Parse specs up front: construction is fallible, the cyclic
        // allocation below is not.
        let mut specs: Vec<(String, TaskSpec)> = Vec::with_capacity(manifest.scripts.len());
        for (name, line) in &manifest.scripts {
            let mut builder = TaskSpecBuilder::new();
            builder.parse(line)?;
            let tail = builder.take_args();
            builder.apply_options(&tail, 0)?;
            specs.push((name.clone(), builder.spec()));
        }

        let (aliases, scope_name, sub_package_name) = derive_names(manifest.name.as_deref());

        Ok(Arc::new_cyclic(|weak| {
            let tasks = specs
                .into_iter()
                .map(|(name, spec)| {
                    let task = Arc::new(Task::new(weak.clone(), &name, spec));
                    (name, task)
                })
                .collect();
            Package {
                location,
                manifest,
                aliases,
                scope_name,
                sub_package_name,
                ancestor,
                tasks,
            }
        }))
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// The explicit manifest name, if any.
    pub fn name(&self) -> Option<&str> {
        self.manifest.name.as_deref()
    }

    /// Every name this package answers to, full manifest name first.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// The scope of a `@scope/…` name.
    pub fn scope_name(&self) -> Option<&str> {
        self.scope_name.as_deref()
    }

    /// The sub-package part of a `@scope/name/sub` name.
    pub fn sub_package_name(&self) -> Option<&str> {
        self.sub_package_name.as_deref()
    }

    /// The host package: this package when it is itself explicitly named
    /// (and not a sub-package), otherwise the nearest named ancestor.
    pub fn host_package(self: &Arc<Self>) -> Option<Arc<Package>> {
        if self.sub_package_name.is_none() && self.name().is_some() {
            return Some(self.clone());
        }
        self.ancestor.clone()
    }

    /// Look up a task by name.
    pub fn task(&self, name: &str) -> Option<Arc<Task>> {
        self.tasks.get(name).cloned()
    }

    /// All tasks, in manifest order.
    pub fn tasks(&self) -> impl Iterator<Item = &Arc<Task>> {
        self.tasks.values()
    }
}

impl std::fmt::Debug for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Package")
            .field("location", &self.location.path())
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// Derive `(aliases, scope_name, sub_package_name)` from a manifest name.
fn derive_names(name: Option<&str>) -> (Vec<String>, Option<String>, Option<String>) {
    let Some(name) = name else {
        return (Vec::new(), None, None);
    };
    let mut aliases = vec![name.to_string()];
    let mut scope_name = None;
    let mut unscoped = name;
    if name.starts_with('@') {
        if let Some(slash) = name.find('/') {
            scope_name = Some(name[..slash].to_string());
            unscoped = &name[slash + 1..];
            aliases.push(unscoped.to_string());
        }
    }
    let sub_package_name = unscoped.find('/').map(|slash| {
        let sub = unscoped[slash + 1..].to_string();
        aliases.push(sub.clone());
        sub
    });
    aliases.dedup();
    (aliases, scope_name, sub_package_name)
}

/// Resolves locations to constructed packages, caching per invocation.
pub struct PackageResolver {
    discovery: Arc<dyn PackageDiscovery>,
    cache: Mutex<HashMap<Location, Arc<Package>>>,
}

impl PackageResolver {
    pub fn new(discovery: Arc<dyn PackageDiscovery>) -> Self {
        Self { discovery, cache: Mutex::new(HashMap::new()) }
    }

    pub fn discovery(&self) -> &Arc<dyn PackageDiscovery> {
        &self.discovery
    }

    /// The package at `location`, constructing it (and any packaged
    /// ancestors) on first access. `None` when no manifest exists there.
    pub async fn get(&self, location: &Location) -> RunResult<Option<Arc<Package>>> {
        if let Some(pkg) = self.cache.lock().await.get(location) {
            return Ok(Some(pkg.clone()));
        }

        // Walk the ancestor chain top-down so every package can receive its
        // nearest named ancestor without recursion.
        let mut chain = vec![location.clone()];
        let mut cursor = location.parent();
        while let Some(loc) = cursor {
            cursor = loc.parent();
            chain.push(loc);
        }
        chain.reverse();

        let mut nearest_named: Option<Arc<Package>> = None;
        let mut target: Option<Arc<Package>> = None;
        for loc in chain {
            let pkg = {
                let cached = self.cache.lock().await.get(&loc).cloned();
                match cached {
                    Some(pkg) => Some(pkg),
                    None => match self.discovery.load(&loc).await? {
                        Some(manifest) => {
                            let pkg = Package::new(loc.clone(), manifest, nearest_named.clone())?;
                            self.cache.lock().await.insert(loc.clone(), pkg.clone());
                            Some(pkg)
                        }
                        None => None,
                    },
                }
            };
            if let Some(pkg) = pkg {
                if pkg.name().is_some() {
                    nearest_named = Some(pkg.clone());
                }
                if *pkg.location() == *location {
                    target = Some(pkg);
                }
            }
        }
        Ok(target)
    }

    /// Every package under `root`, constructed, parents before children.
    pub async fn discover(&self, root: &Location) -> RunResult<Vec<Arc<Package>>> {
        let mut packages = Vec::new();
        for location in self.discovery.locate(root).await? {
            if let Some(pkg) = self.get(&location).await? {
                packages.push(pkg);
            }
        }
        Ok(packages)
    }

    /// Resolve a package selector relative to `base`.
    pub async fn select(
        &self,
        base: &Location,
        selector: &str,
    ) -> RunResult<Option<Arc<Package>>> {
        self.get(&base.join(selector)).await
    }

    /// The first package under `root` answering to `name`: a full manifest
    /// name, an unscoped name, or a sub-package alias. Parents win over
    /// children on ties.
    pub async fn find_by_name(
        &self,
        root: &Location,
        name: &str,
    ) -> RunResult<Option<Arc<Package>>> {
        for pkg in self.discover(root).await? {
            if pkg.aliases().iter().any(|alias| alias == name) {
                return Ok(Some(pkg));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::MapDiscovery;

    fn package_named(name: Option<&str>) -> Arc<Package> {
        let manifest = Manifest {
            name: name.map(str::to_string),
            ..Manifest::default()
        };
        Package::new(Location::new("/p"), manifest, None).expect("construction succeeds")
    }

    #[test]
    fn plain_name_aliases() {
        let pkg = package_named(Some("my-pkg"));
        assert_eq!(pkg.aliases(), ["my-pkg"]);
        assert_eq!(pkg.scope_name(), None);
        assert_eq!(pkg.sub_package_name(), None);
        // An explicitly named package hosts itself.
        let host = pkg.host_package().expect("named package has a host");
        assert!(Arc::ptr_eq(&host, &pkg));
    }

    #[test]
    fn scoped_name_aliases() {
        let pkg = package_named(Some("@scope/pkg"));
        assert_eq!(pkg.aliases(), ["@scope/pkg", "pkg"]);
        assert_eq!(pkg.scope_name(), Some("@scope"));
        assert_eq!(pkg.sub_package_name(), None);
    }

    #[test]
    fn sub_package_aliases() {
        let pkg = package_named(Some("@scope/pkg/nested/sub"));
        assert_eq!(
            pkg.aliases(),
            ["@scope/pkg/nested/sub", "pkg/nested/sub", "nested/sub"]
        );
        assert_eq!(pkg.scope_name(), Some("@scope"));
        assert_eq!(pkg.sub_package_name(), Some("nested/sub"));
        // A sub-package without a named ancestor has no host.
        assert!(pkg.host_package().is_none());
    }

    #[test]
    fn unscoped_sub_package() {
        let pkg = package_named(Some("pkg/sub"));
        assert_eq!(pkg.aliases(), ["pkg/sub", "sub"]);
        assert_eq!(pkg.scope_name(), None);
        assert_eq!(pkg.sub_package_name(), Some("sub"));
    }

    #[test]
    fn unnamed_package_has_no_aliases() {
        let pkg = package_named(None);
        assert!(pkg.aliases().is_empty());
        assert!(pkg.scope_name().is_none() && pkg.sub_package_name().is_none());
        assert!(pkg.host_package().is_none());
    }

    #[test]
    fn tasks_follow_manifest_order() {
        let mut manifest = Manifest::default();
        manifest.scripts.insert("build".to_string(), "echo build".to_string());
        manifest.scripts.insert("test".to_string(), "run-z build".to_string());
        let pkg = Package::new(Location::new("/p"), manifest, None).unwrap();

        let names: Vec<&str> = pkg.tasks().map(|t| t.name()).collect();
        assert_eq!(names, ["build", "test"]);
        assert!(pkg.task("test").is_some());
        assert!(pkg.task("missing").is_none());
    }

    #[tokio::test]
    async fn host_package_is_nearest_named_ancestor() {
        let mut disc = MapDiscovery::new();
        disc.package("/repo", Some("host"), &[])
            .package("/repo/packages", None, &[])
            .package("/repo/packages/sub", Some("@scope/host/sub"), &[]);
        let resolver = PackageResolver::new(Arc::new(disc));

        let sub = resolver
            .get(&Location::new("/repo/packages/sub"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sub.sub_package_name(), Some("sub"));
        let host = sub.host_package().expect("sub-package has a host");
        assert_eq!(host.location().path(), "/repo");

        // The unnamed intermediate directory is hosted by the same ancestor.
        let packages = resolver
            .get(&Location::new("/repo/packages"))
            .await
            .unwrap()
            .unwrap();
        let host = packages.host_package().expect("unnamed package has a host");
        assert_eq!(host.location().path(), "/repo");
    }

    #[tokio::test]
    async fn find_by_name_matches_any_alias() {
        let mut disc = MapDiscovery::new();
        disc.package("/repo", Some("host"), &[])
            .package("/repo/a", Some("@scope/lib-a"), &[]);
        let resolver = PackageResolver::new(Arc::new(disc));
        let root = Location::new("/repo");

        let by_full = resolver.find_by_name(&root, "@scope/lib-a").await.unwrap().unwrap();
        assert_eq!(by_full.location().path(), "/repo/a");
        let by_unscoped = resolver.find_by_name(&root, "lib-a").await.unwrap().unwrap();
        assert_eq!(by_unscoped.location().path(), "/repo/a");
        assert!(resolver.find_by_name(&root, "nope").await.unwrap().is_none());
    }
}
