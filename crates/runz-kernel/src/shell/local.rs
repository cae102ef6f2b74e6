//! Local process spawning over tokio.

use async_trait::async_trait;
use runz_types::RunResult;
use tokio::process::{Child, Command};

use super::{ExecParams, ProcessHandle, Shell};

/// Spawns real OS processes. Stdout and stderr are inherited: a task runner
/// streams its children's output straight through.
pub struct LocalShell {
    /// The script runner invocation, e.g. `["npm", "run"]`. The script name
    /// is appended, then `--` and the job arguments when there are any.
    script_runner: Vec<String>,
}

impl Default for LocalShell {
    fn default() -> Self {
        Self {
            script_runner: vec!["npm".to_string(), "run".to_string()],
        }
    }
}

impl LocalShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different script runner, e.g. `["yarn", "run"]`.
    pub fn with_script_runner(runner: Vec<String>) -> Self {
        Self { script_runner: runner }
    }

    fn spawn(&self, program: &str, args: &[String], params: &ExecParams) -> RunResult<Child> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        if !params.cwd.is_empty() {
            cmd.current_dir(&params.cwd);
        }
        for (key, value) in &params.env {
            cmd.env(key, value);
        }
        // Kill leftovers if the handle is dropped mid-cancellation.
        cmd.kill_on_drop(true);
        tracing::debug!(job = %params.label, %program, "spawning");
        Ok(cmd.spawn()?)
    }
}

#[async_trait]
impl Shell for LocalShell {
    async fn exec_command(
        &self,
        command: &str,
        params: &ExecParams,
    ) -> RunResult<Box<dyn ProcessHandle>> {
        let child = self.spawn(command, &params.args, params)?;
        Ok(Box::new(LocalProcess { child }))
    }

    async fn exec_script(
        &self,
        name: &str,
        params: &ExecParams,
    ) -> RunResult<Box<dyn ProcessHandle>> {
        let (program, prefix) = self
            .script_runner
            .split_first()
            .map(|(p, rest)| (p.clone(), rest.to_vec()))
            .unwrap_or_else(|| ("npm".to_string(), vec!["run".to_string()]));
        let mut args = prefix;
        args.push(name.to_string());
        if !params.args.is_empty() {
            args.push("--".to_string());
            args.extend(params.args.iter().cloned());
        }
        let child = self.spawn(&program, &args, params)?;
        Ok(Box::new(LocalProcess { child }))
    }
}

struct LocalProcess {
    child: Child,
}

#[async_trait]
impl ProcessHandle for LocalProcess {
    async fn wait(&mut self) -> RunResult<i32> {
        let status = self.child.wait().await?;
        // A signal-terminated child has no code; report the conventional 1.
        Ok(status.code().unwrap_or(1))
    }

    async fn kill(&mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::warn!("failed to signal child: {e}");
        }
    }
}
