//! Batching — fanning one entry out across multiple packages.

use std::sync::Arc;

use async_trait::async_trait;
use runz_types::{Action, RunError, RunResult, TaskSpec};

use crate::package::PackageResolver;
use crate::parser;
use crate::task::Task;

/// Expands one entry invocation into per-package entries.
#[async_trait]
pub trait Batcher: Send + Sync {
    async fn batch(
        &self,
        resolver: &PackageResolver,
        entry: &Arc<Task>,
    ) -> RunResult<Vec<Arc<Task>>>;
}

/// The default: run the entry against the single given package.
pub struct SingleBatcher;

#[async_trait]
impl Batcher for SingleBatcher {
    async fn batch(
        &self,
        _resolver: &PackageResolver,
        entry: &Arc<Task>,
    ) -> RunResult<Vec<Arc<Task>>> {
        Ok(vec![entry.clone()])
    }
}

/// Expands a group entry's targets into one entry per selected package.
/// Entries without targets pass through unchanged.
///
/// A target is either a relative path (`./a`, `../b`) resolved against the
/// entry's package, or a package name. Names match any alias and are looked
/// up under the entry's host package, so sibling packages of one host are
/// addressable without paths.
pub struct TargetBatcher;

#[async_trait]
impl Batcher for TargetBatcher {
    async fn batch(
        &self,
        resolver: &PackageResolver,
        entry: &Arc<Task>,
    ) -> RunResult<Vec<Arc<Task>>> {
        let Action::Group { targets } = entry.action() else {
            return Ok(vec![entry.clone()]);
        };
        if targets.is_empty() {
            return Ok(vec![entry.clone()]);
        }

        let origin = entry.target();
        let scope = origin
            .host_package()
            .map(|host| host.location().clone())
            .unwrap_or_else(|| origin.location().clone());
        let mut entries = Vec::with_capacity(targets.len());
        for target in targets {
            let pkg = if parser::is_selector(target) {
                resolver.select(origin.location(), target).await?
            } else {
                resolver.find_by_name(&scope, target).await?
            };
            let Some(pkg) = pkg else {
                return Err(RunError::UnknownTask {
                    target: origin.location().path().to_string(),
                    task_name: target.clone(),
                    message: "no package at target".to_string(),
                });
            };
            let spec = TaskSpec {
                action: Action::Group { targets: Vec::new() },
                ..entry.spec().clone()
            };
            entries.push(Task::for_package(&pkg, entry.name(), spec));
        }
        Ok(entries)
    }
}
