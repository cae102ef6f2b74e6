//! The runner — wiring discovery, planning, batching and execution.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use runz_types::{RunError, RunResult};

use crate::discovery::{Location, PackageDiscovery};
use crate::package::{Package, PackageResolver};
use crate::planner::{CallParams, Plan, Planner};
use crate::scheduler::{Batcher, Executor, TargetBatcher};
use crate::shell::Shell;
use crate::task::Task;

/// Tunables for one runner instance.
pub struct RunnerConfig {
    /// Grace period granted to signalled processes on cancellation.
    pub grace: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self { grace: Duration::from_secs(10) }
    }
}

/// One invocation's engine: resolves packages, plans entry tasks, fans them
/// out and executes the plans.
pub struct Runner {
    resolver: PackageResolver,
    shell: Arc<dyn Shell>,
    batcher: Arc<dyn Batcher>,
    config: RunnerConfig,
}

impl Runner {
    pub fn new(discovery: Arc<dyn PackageDiscovery>, shell: Arc<dyn Shell>) -> Self {
        Self {
            resolver: PackageResolver::new(discovery),
            shell,
            batcher: Arc::new(TargetBatcher),
            config: RunnerConfig::default(),
        }
    }

    pub fn with_batcher(mut self, batcher: Arc<dyn Batcher>) -> Self {
        self.batcher = batcher;
        self
    }

    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn resolver(&self) -> &PackageResolver {
        &self.resolver
    }

    /// The package at `location`, when one exists there.
    pub async fn package_at(&self, location: &Location) -> RunResult<Option<Arc<Package>>> {
        self.resolver.get(location).await
    }

    /// Plan a single entry without executing it.
    pub async fn plan(&self, entry: Arc<Task>, params: CallParams) -> RunResult<Plan> {
        Planner::new(&self.resolver).plan(entry, params).await
    }

    /// Batch, plan and execute an entry task.
    ///
    /// The batcher may expand the entry across several packages; the
    /// sub-entries run concurrently and every one of them is awaited even
    /// when some fail. The first failure is the reported cause.
    pub async fn run(&self, entry: Arc<Task>, params: CallParams) -> RunResult<()> {
        let entries = self.batcher.batch(&self.resolver, &entry).await?;
        let runs = entries.into_iter().map(|entry| {
            let params = params.clone();
            async move {
                let plan = Planner::new(&self.resolver).plan(entry, params).await?;
                Executor::new(self.shell.clone())
                    .with_grace(self.config.grace)
                    .execute(&plan)
                    .await
            }
        });
        let results: Vec<RunResult<()>> = join_all(runs).await;
        let mut first: Option<RunError> = None;
        for result in results {
            if let Err(e) = result {
                first.get_or_insert(e);
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
