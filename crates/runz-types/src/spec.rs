//! Task specifications — the parsed form of a task command line.
//!
//! A [`TaskSpec`] is the immutable output of the task grammar parser:
//! ordered prerequisites, multi-valued attributes, trailing arguments, and
//! the action describing how the task itself executes.

use crate::attrs::Attrs;

/// A reference to a prerequisite task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskRef {
    /// The referenced task name. Never empty.
    pub task: String,
    /// Whether this prerequisite may run in parallel with the one
    /// immediately preceding it.
    pub parallel: bool,
    /// Attributes set for this prerequisite only.
    pub attrs: Attrs,
    /// Arguments passed to this prerequisite only.
    pub args: Vec<String>,
}

impl TaskRef {
    pub fn new(task: impl Into<String>) -> Self {
        Self { task: task.into(), ..Self::default() }
    }
}

/// One entry of a task's prerequisite sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prerequisite {
    /// A call to another task.
    Task(TaskRef),
    /// A package selector: retargets subsequent task references to the
    /// package(s) at the given relative path. Does not execute anything
    /// by itself.
    Selector {
        /// Relative path such as `.`, `..`, `./pkg` or `../sibling`.
        host: String,
    },
}

/// How a task executes once its prerequisites are satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Execute an external command.
    Command {
        /// The program to run.
        command: String,
        /// Arguments following the program on the task line.
        args: Vec<String>,
        /// When set the command may overlap its own prerequisites.
        parallel: bool,
    },
    /// A grouping task: executes nothing itself, only its prerequisites.
    Group {
        /// Package paths this group fans out over. Empty means the
        /// task's own package.
        targets: Vec<String>,
    },
    /// An opaque shell script run by the manifest's script runner.
    Script,
    /// A task that could not be resolved. Fails at execution unless the
    /// `if-present` attribute is set.
    Unknown,
}

impl Default for Action {
    fn default() -> Self {
        Action::Group { targets: Vec::new() }
    }
}

impl Action {
    /// Whether this is the default empty group.
    pub fn is_default(&self) -> bool {
        matches!(self, Action::Group { targets } if targets.is_empty())
    }
}

/// Immutable, fully parsed task specification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSpec {
    /// Ordered prerequisites.
    pub pre: Vec<Prerequisite>,
    /// Attributes of the task itself, shared with its prerequisites.
    pub attrs: Attrs,
    /// Trailing arguments: everything from the first option-like token on.
    pub args: Vec<String>,
    /// The task's own action.
    pub action: Action,
}

impl TaskSpec {
    /// The spec of a native script line: no structure, opaque execution.
    pub fn script() -> Self {
        Self { action: Action::Script, ..Self::default() }
    }

    /// Whether the spec came from a native (non-`run-z`) script line.
    pub fn is_native(&self) -> bool {
        matches!(self.action, Action::Script)
    }

    /// Iterate only the task references among the prerequisites.
    pub fn task_refs(&self) -> impl Iterator<Item = &TaskRef> {
        self.pre.iter().filter_map(|p| match p {
            Prerequisite::Task(t) => Some(t),
            Prerequisite::Selector { .. } => None,
        })
    }
}
