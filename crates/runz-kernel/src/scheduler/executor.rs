//! The job executor.
//!
//! Turns a [`Plan`] into a process tree. The orchestration is cooperative
//! and single-threaded: one loop starts every runnable job, then awaits the
//! next completion. OS processes provide the actual parallelism.
//!
//! # Scheduling rules
//!
//! A pending job may start when:
//!
//! - every direct prerequisite is done — or has at least started, when the
//!   plan marks the pair parallel (a `--and` command overlapping its own
//!   prerequisites);
//! - every earlier job (planning-insertion order) that is neither related
//!   to it by prerequisite edges nor parallel with it has finished. This is
//!   the default serial ordering; parallel marks relax it.
//!
//! On the first failure, pending jobs are cancelled and running processes
//! are signalled; the executor waits a bounded grace period for them before
//! reporting the first error.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use runz_types::{Action, JobStatus, RunError, RunResult, IF_PRESENT};
use tokio::sync::watch;

use super::job::Job;
use crate::planner::{CallId, Plan};
use crate::shell::{ExecParams, ProcessHandle, Shell};

/// How long to wait for a signalled process before giving up on it.
const DEFAULT_GRACE: Duration = Duration::from_secs(10);

/// Executes plans through a shell collaborator.
pub struct Executor {
    shell: Arc<dyn Shell>,
    grace: Duration,
}

/// The ways starting a job can turn out.
enum Launch {
    /// The job is a pure synchronization point or no-op: done already.
    Instant(RunResult<()>),
    /// A process was spawned.
    Process(Box<dyn ProcessHandle>),
}

impl Executor {
    pub fn new(shell: Arc<dyn Shell>) -> Self {
        Self { shell, grace: DEFAULT_GRACE }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Run every job of the plan. Resolves once all jobs are terminal;
    /// fails with the first error.
    pub async fn execute(&self, plan: &Plan) -> RunResult<()> {
        let mut jobs: Vec<Job> = plan.calls().map(|(id, _)| Job::new(id)).collect();
        let related = reachability(plan);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let mut running: FuturesUnordered<BoxFuture<'static, (usize, RunResult<()>)>> =
            FuturesUnordered::new();
        let mut first_error: Option<RunError> = None;

        loop {
            // Start everything currently startable. Instant jobs complete
            // inline and may unblock more, hence the inner loop.
            while first_error.is_none() {
                let Some(idx) = next_runnable(plan, &jobs, &related) else {
                    break;
                };
                let id = CallId(idx);
                jobs[idx].start();
                tracing::debug!(job = %plan.call(id).label(), "starting");
                match self.launch(plan, id).await {
                    Ok(Launch::Instant(Ok(()))) => jobs[idx].finish(JobStatus::Done),
                    Ok(Launch::Instant(Err(e))) | Err(e) => {
                        jobs[idx].finish(JobStatus::Failed);
                        first_error = Some(e);
                        let _ = cancel_tx.send(true);
                    }
                    Ok(Launch::Process(handle)) => {
                        let cancel = cancel_rx.clone();
                        let grace = self.grace;
                        let label = plan.call(id).label();
                        running.push(Box::pin(run_process(handle, cancel, grace, label, idx)));
                    }
                }
            }

            if running.is_empty() {
                break;
            }
            let Some((idx, result)) = running.next().await else {
                break;
            };
            match result {
                Ok(()) => {
                    tracing::debug!(job = %plan.call(CallId(idx)).label(), "done");
                    jobs[idx].finish(JobStatus::Done);
                }
                Err(e) => {
                    let status = match &e {
                        RunError::Cancelled { .. } => JobStatus::Cancelled,
                        _ => JobStatus::Failed,
                    };
                    jobs[idx].finish(status);
                    if first_error.is_none() {
                        tracing::debug!(job = %plan.call(CallId(idx)).label(), error = %e, "failed");
                        first_error = Some(e);
                        let _ = cancel_tx.send(true);
                    }
                }
            }
        }

        if first_error.is_some() {
            for job in &mut jobs {
                if job.status() == JobStatus::Pending {
                    job.finish(JobStatus::Cancelled);
                }
            }
        }
        debug_assert!(
            first_error.is_some() || jobs.iter().all(|j| j.status() == JobStatus::Done),
            "executor finished with non-terminal jobs"
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Start one job.
    async fn launch(&self, plan: &Plan, id: CallId) -> RunResult<Launch> {
        let call = plan.call(id);
        let task = call.task();
        let attrs = call.effective_attrs();

        match task.action() {
            // A group is a pure synchronization point: it completes when
            // its prerequisites have.
            Action::Group { .. } => Ok(Launch::Instant(Ok(()))),

            Action::Unknown => {
                if attrs.contains(IF_PRESENT) {
                    Ok(Launch::Instant(Ok(())))
                } else {
                    Ok(Launch::Instant(Err(RunError::UnknownTask {
                        target: task.target().location().path().to_string(),
                        task_name: task.name().to_string(),
                        message: "task is not known".to_string(),
                    })))
                }
            }

            Action::Command { command, args, .. } => {
                let mut argv = args.clone();
                argv.extend(task.spec().args.iter().cloned());
                argv.extend(call.args().iter().cloned());
                let params = ExecParams {
                    label: call.label(),
                    cwd: task.target().location().path().to_string(),
                    args: argv,
                    env: attrs.to_env(),
                };
                let handle = self.shell.exec_command(command, &params).await?;
                Ok(Launch::Process(handle))
            }

            Action::Script => {
                let mut argv = task.spec().args.clone();
                argv.extend(call.args().iter().cloned());
                let params = ExecParams {
                    label: call.label(),
                    cwd: task.target().location().path().to_string(),
                    args: argv,
                    env: attrs.to_env(),
                };
                let handle = self.shell.exec_script(task.name(), &params).await?;
                Ok(Launch::Process(handle))
            }
        }
    }
}

/// Await one process, racing it against cancellation.
async fn run_process(
    mut handle: Box<dyn ProcessHandle>,
    mut cancel: watch::Receiver<bool>,
    grace: Duration,
    label: String,
    idx: usize,
) -> (usize, RunResult<()>) {
    tokio::select! {
        code = handle.wait() => {
            let result = match code {
                Ok(0) => Ok(()),
                Ok(exit_code) => Err(RunError::JobFailed { call: label, exit_code }),
                Err(e) => Err(e),
            };
            (idx, result)
        }
        _ = cancel.changed() => {
            handle.kill().await;
            // Bounded grace: do not wait forever for a stubborn child.
            let _ = tokio::time::timeout(grace, handle.wait()).await;
            (idx, Err(RunError::Cancelled { call: label }))
        }
    }
}

/// The first pending job whose prerequisites and ordering constraints are
/// satisfied.
fn next_runnable(plan: &Plan, jobs: &[Job], related: &[HashSet<usize>]) -> Option<usize> {
    'jobs: for idx in 0..jobs.len() {
        if jobs[idx].status() != JobStatus::Pending {
            continue;
        }
        let id = CallId(idx);

        for &p in plan.call(id).prerequisites() {
            let status = jobs[p.0].status();
            if plan.are_parallel(p, id) {
                // A parallel prerequisite only needs to have started.
                if status == JobStatus::Pending {
                    continue 'jobs;
                }
            } else if status != JobStatus::Done {
                continue 'jobs;
            }
        }

        for earlier in 0..idx {
            if jobs[earlier].status() == JobStatus::Done {
                continue;
            }
            // Prerequisite-related pairs are governed by the edge rule
            // above; parallel pairs may overlap.
            if related[idx].contains(&earlier) || related[earlier].contains(&idx) {
                continue;
            }
            if plan.are_parallel(CallId(earlier), id) {
                continue;
            }
            continue 'jobs;
        }

        return Some(idx);
    }
    None
}

/// Transitive prerequisite closure per call.
fn reachability(plan: &Plan) -> Vec<HashSet<usize>> {
    let n = plan.len();
    let mut reach: Vec<HashSet<usize>> = vec![HashSet::new(); n];
    for i in 0..n {
        let mut stack: Vec<usize> = plan
            .call(CallId(i))
            .prerequisites()
            .iter()
            .map(|c| c.0)
            .collect();
        while let Some(j) = stack.pop() {
            if reach[i].insert(j) {
                stack.extend(plan.call(CallId(j)).prerequisites().iter().map(|c| c.0));
            }
        }
    }
    reach
}
