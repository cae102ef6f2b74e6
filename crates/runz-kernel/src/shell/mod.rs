//! The shell collaborator — how jobs become OS processes.
//!
//! The executor only ever talks to the [`Shell`] trait: spawning an external
//! command or delegating to the manifest's script runner, both returning a
//! [`ProcessHandle`] the executor can await or kill.

mod local;
pub mod testing;

pub use local::LocalShell;

use async_trait::async_trait;
use runz_types::RunResult;

/// Everything the shell needs to spawn one job.
#[derive(Debug, Clone, Default)]
pub struct ExecParams {
    /// A human-readable job identity, for diagnostics.
    pub label: String,
    /// Working directory: the target package location.
    pub cwd: String,
    /// Arguments following the program or script name.
    pub args: Vec<String>,
    /// Extra environment entries (the exported attributes).
    pub env: Vec<(String, String)>,
}

/// A running process.
#[async_trait]
pub trait ProcessHandle: Send {
    /// Wait for completion and return the exit code.
    async fn wait(&mut self) -> RunResult<i32>;

    /// Request termination. The process may take a moment to die; callers
    /// bound the subsequent wait themselves.
    async fn kill(&mut self);
}

/// Spawns processes for the executor.
#[async_trait]
pub trait Shell: Send + Sync {
    /// Spawn an external command.
    async fn exec_command(
        &self,
        command: &str,
        params: &ExecParams,
    ) -> RunResult<Box<dyn ProcessHandle>>;

    /// Run a named manifest script through the script runner.
    async fn exec_script(
        &self,
        name: &str,
        params: &ExecParams,
    ) -> RunResult<Box<dyn ProcessHandle>>;
}
