//! Tasks — a named spec bound to its target package.

use std::sync::{Arc, Weak};

use runz_types::{Action, TaskSpec};

use crate::package::Package;

/// Identifies a task across the whole invocation: one task name within one
/// package location. The planner deduplicates calls by this key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub package: String,
    pub task: String,
}

impl std::fmt::Display for TaskKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.package, self.task)
    }
}

/// A task: `(target package, name, spec)`.
///
/// Behavior over the action variant lives in the planner and executor — the
/// task itself is data. Tasks are owned by their package and hold a weak
/// back-reference to it.
pub struct Task {
    target: Weak<Package>,
    name: String,
    spec: TaskSpec,
}

impl Task {
    pub(crate) fn new(target: Weak<Package>, name: impl Into<String>, spec: TaskSpec) -> Self {
        Self { target, name: name.into(), spec }
    }

    /// Materialize a task for a name that did not resolve. Executing it
    /// fails unless the `if-present` attribute is set on its call.
    pub fn unknown(target: &Arc<Package>, name: impl Into<String>) -> Arc<Task> {
        Arc::new(Task {
            target: Arc::downgrade(target),
            name: name.into(),
            spec: TaskSpec { action: Action::Unknown, ..TaskSpec::default() },
        })
    }

    /// Bind a synthesized spec to a package without the package owning it —
    /// entry tasks built by the CLI or the batcher.
    pub fn for_package(
        target: &Arc<Package>,
        name: impl Into<String>,
        spec: TaskSpec,
    ) -> Arc<Task> {
        Arc::new(Task { target: Arc::downgrade(target), name: name.into(), spec })
    }

    /// The package this task belongs to.
    ///
    /// Packages own their tasks and live for the whole invocation, so the
    /// back-reference always upgrades.
    pub fn target(&self) -> Arc<Package> {
        self.target.upgrade().expect("package outlives its tasks")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &TaskSpec {
        &self.spec
    }

    pub fn action(&self) -> &Action {
        &self.spec.action
    }

    pub fn key(&self) -> TaskKey {
        TaskKey {
            package: self.target().location().path().to_string(),
            task: self.name.clone(),
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("action", &self.spec.action)
            .finish_non_exhaustive()
    }
}
