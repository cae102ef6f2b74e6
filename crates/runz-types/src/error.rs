//! Error kinds surfaced by the runner.

use thiserror::Error;

/// Every failure mode of parsing, planning and execution.
#[derive(Debug, Error)]
pub enum RunError {
    /// A task command line could not be parsed.
    ///
    /// `command_line` is the space-rejoined token sequence and `position`
    /// the character offset of the offending token within it.
    #[error("invalid task at {position}: {message} in `{command_line}`")]
    InvalidTask {
        message: String,
        command_line: String,
        position: usize,
    },

    /// An option was not recognized by any reader.
    #[error("unrecognized option: {name}")]
    UnknownOption { name: String },

    /// A task name did not resolve within its target package.
    #[error("unknown task `{task_name}` in {target}: {message}")]
    UnknownTask {
        target: String,
        task_name: String,
        message: String,
    },

    /// A spawned job exited with a non-zero code.
    #[error("task `{call}` failed with exit code {exit_code}")]
    JobFailed { call: String, exit_code: i32 },

    /// The execution was cancelled before this job could complete.
    #[error("task `{call}` cancelled")]
    Cancelled { call: String },

    /// Filesystem or process-level failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A package manifest could not be read.
    #[error("invalid manifest at {location}: {source}")]
    Manifest {
        location: String,
        #[source]
        source: serde_json::Error,
    },
}

impl RunError {
    /// Shorthand for an [`RunError::InvalidTask`].
    pub fn invalid_task(
        message: impl Into<String>,
        command_line: impl Into<String>,
        position: usize,
    ) -> Self {
        RunError::InvalidTask {
            message: message.into(),
            command_line: command_line.into(),
            position,
        }
    }

    /// The process exit code this error maps to: `2` for command-line and
    /// resolution problems, `1` for execution failures.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunError::InvalidTask { .. }
            | RunError::UnknownOption { .. }
            | RunError::UnknownTask { .. } => 2,
            _ => 1,
        }
    }
}

/// Result alias used throughout the runner.
pub type RunResult<T> = Result<T, RunError>;
