//! The call planner.
//!
//! Walks an entry task's prerequisites transitively into a [`Plan`]: a set
//! of [`Call`]s (one per task, deduplicated), a prerequisite relation, and a
//! symmetric parallel relation over qualifiers.
//!
//! Planning is reentrant and monotone: a second call to a task merges its
//! parameters into the existing call instead of creating a new one, and a
//! re-encounter of a task whose plan is still in progress records no edge —
//! which is what breaks reference cycles.
//!
//! # Qualifiers
//!
//! The parallel relation is stated over *qualifiers*, not calls. Every call
//! owns one qualifier; calls planned as prerequisites of a group inherit the
//! group's qualifier set on top of their own. Marking two sibling
//! prerequisites parallel marks their own qualifiers, so when one of them is
//! a group, everything the group expands into carries the mark too.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use runz_types::{Action, Attrs, Prerequisite, RunError, RunResult};

use crate::package::{Package, PackageResolver};
use crate::task::{Task, TaskKey};

/// Index of a call within its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallId(pub usize);

/// A small identity used to coalesce parallelism hints across tasks and
/// groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifierId(usize);

/// Parameters supplied at a call-site. Merged monotonically across all
/// call-sites of the same task.
#[derive(Debug, Clone, Default)]
pub struct CallParams {
    pub attrs: Attrs,
    pub args: Vec<String>,
}

impl CallParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attrs(attrs: Attrs) -> Self {
        Self { attrs, args: Vec::new() }
    }
}

/// A planned call: one task plus its effective parameters and direct
/// prerequisites.
#[derive(Debug)]
pub struct Call {
    task: Arc<Task>,
    attrs: Attrs,
    args: Vec<String>,
    prerequisites: Vec<CallId>,
    /// Own qualifier first, inherited group qualifiers after.
    qualifiers: Vec<QualifierId>,
}

impl Call {
    pub fn task(&self) -> &Arc<Task> {
        &self.task
    }

    /// Call-site attributes merged in planning order.
    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    /// Call-site arguments merged in planning order.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn prerequisites(&self) -> &[CallId] {
        &self.prerequisites
    }

    /// The task's own attributes overlaid with the call-site ones.
    pub fn effective_attrs(&self) -> Attrs {
        let mut attrs = self.task.spec().attrs.clone();
        attrs.extend(&self.attrs);
        attrs
    }

    /// A human-readable identity for error reporting.
    pub fn label(&self) -> String {
        self.task.key().to_string()
    }
}

/// The transitive set of calls produced from an entry task.
#[derive(Debug)]
pub struct Plan {
    calls: Vec<Call>,
    entry: CallId,
    /// Normalized `(low, high)` qualifier pairs that may overlap.
    parallel: HashSet<(QualifierId, QualifierId)>,
}

impl Plan {
    pub fn entry(&self) -> CallId {
        self.entry
    }

    pub fn call(&self, id: CallId) -> &Call {
        &self.calls[id.0]
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Calls in planning-insertion order.
    pub fn calls(&self) -> impl Iterator<Item = (CallId, &Call)> {
        self.calls.iter().enumerate().map(|(i, c)| (CallId(i), c))
    }

    /// Whether two calls may overlap. Symmetric, never reflexive.
    pub fn are_parallel(&self, a: CallId, b: CallId) -> bool {
        if a == b {
            return false;
        }
        for &qa in &self.calls[a.0].qualifiers {
            for &qb in &self.calls[b.0].qualifiers {
                if qa != qb && self.parallel.contains(&ordered(qa, qb)) {
                    return true;
                }
            }
        }
        false
    }
}

fn ordered(a: QualifierId, b: QualifierId) -> (QualifierId, QualifierId) {
    if a <= b { (a, b) } else { (b, a) }
}

struct PlanState {
    calls: Vec<Call>,
    by_task: HashMap<TaskKey, CallId>,
    /// Calls whose prerequisite walk has not finished yet. Edges to these
    /// are skipped: recording them would close a cycle.
    in_progress: HashSet<CallId>,
    parallel: HashSet<(QualifierId, QualifierId)>,
    next_qualifier: usize,
    entry_target: Arc<Package>,
}

impl PlanState {
    fn new_qualifier(&mut self) -> QualifierId {
        let q = QualifierId(self.next_qualifier);
        self.next_qualifier += 1;
        q
    }

    /// Mark every distinct pair of the given qualifiers parallel.
    fn make_parallel(&mut self, qualifiers: &[QualifierId]) {
        for (i, &a) in qualifiers.iter().enumerate() {
            for &b in &qualifiers[i + 1..] {
                if a != b {
                    self.parallel.insert(ordered(a, b));
                }
            }
        }
    }
}

/// Plans entry tasks against a package resolver.
pub struct Planner<'a> {
    resolver: &'a PackageResolver,
}

impl<'a> Planner<'a> {
    pub fn new(resolver: &'a PackageResolver) -> Self {
        Self { resolver }
    }

    /// Produce the plan for an entry task.
    pub async fn plan(&self, entry: Arc<Task>, params: CallParams) -> RunResult<Plan> {
        let mut state = PlanState {
            calls: Vec::new(),
            by_task: HashMap::new(),
            in_progress: HashSet::new(),
            parallel: HashSet::new(),
            next_qualifier: 0,
            entry_target: entry.target(),
        };
        let entry_id = self.plan_call(&mut state, entry, params, Vec::new()).await?;
        Ok(Plan {
            calls: state.calls,
            entry: entry_id,
            parallel: state.parallel,
        })
    }

    /// Plan one call. Returns the existing call when the task was already
    /// planned, after merging the new parameters into it.
    fn plan_call<'s>(
        &'s self,
        state: &'s mut PlanState,
        task: Arc<Task>,
        params: CallParams,
        inherited: Vec<QualifierId>,
    ) -> Pin<Box<dyn Future<Output = RunResult<CallId>> + Send + 's>> {
        Box::pin(async move {
            let key = task.key();
            if let Some(&id) = state.by_task.get(&key) {
                tracing::debug!(task = %key, "merging call parameters");
                let call = &mut state.calls[id.0];
                call.attrs.extend(&params.attrs);
                call.args.extend(params.args);
                for q in inherited {
                    if !call.qualifiers.contains(&q) {
                        call.qualifiers.push(q);
                    }
                }
                return Ok(id);
            }

            let id = CallId(state.calls.len());
            let own = state.new_qualifier();
            let mut qualifiers = vec![own];
            qualifiers.extend(inherited);
            tracing::debug!(task = %key, call = id.0, "planning call");
            state.calls.push(Call {
                task: task.clone(),
                attrs: params.attrs,
                args: params.args,
                prerequisites: Vec::new(),
                qualifiers,
            });
            state.by_task.insert(key, id);
            state.in_progress.insert(id);

            self.plan_prerequisites(state, id).await?;

            state.in_progress.remove(&id);
            Ok(id)
        })
    }

    /// Walk the prerequisites of a freshly created call.
    async fn plan_prerequisites(&self, state: &mut PlanState, id: CallId) -> RunResult<()> {
        let task = state.calls[id.0].task.clone();
        let spec = task.spec().clone();
        if spec.pre.is_empty() {
            return Ok(());
        }

        let parent_attrs = state.calls[id.0].effective_attrs();
        let parent_quals = state.calls[id.0].qualifiers.clone();
        let own_qual = parent_quals[0];
        let inherits_group = matches!(spec.action, Action::Group { .. });
        let origin = task.target();

        // Selector state: the package(s) subsequent task references resolve
        // against within this prerequisite walk. Consecutive selectors
        // accumulate into a set; a selector after a task reference starts a
        // fresh set.
        let mut targets: Vec<Arc<Package>> = vec![origin.clone()];
        let mut selecting = false;
        // Own qualifiers of the immediately preceding prerequisite.
        let mut prev: Option<Vec<QualifierId>> = None;

        for prereq in &spec.pre {
            match prereq {
                Prerequisite::Selector { host } => {
                    match self.resolver.select(origin.location(), host).await? {
                        Some(pkg) => {
                            tracing::debug!(selector = %host, target = %pkg.location(), "retargeting");
                            if selecting {
                                targets.push(pkg);
                            } else {
                                targets = vec![pkg];
                                selecting = true;
                            }
                        }
                        None => {
                            return Err(RunError::UnknownTask {
                                target: origin.location().path().to_string(),
                                task_name: host.clone(),
                                message: "no package at selector".to_string(),
                            });
                        }
                    }
                }
                Prerequisite::Task(tref) => {
                    selecting = false;
                    let mut attrs = parent_attrs.clone();
                    attrs.extend(&tref.attrs);
                    let params = CallParams { attrs, args: tref.args.clone() };

                    let mut current = Vec::new();
                    for pkg in targets.clone() {
                        let child_task = match pkg.task(&tref.task) {
                            Some(t) => t,
                            None => Task::unknown(&state.entry_target, &tref.task),
                        };
                        let inherited = if inherits_group {
                            parent_quals.clone()
                        } else {
                            Vec::new()
                        };
                        let child =
                            self.plan_call(state, child_task, params.clone(), inherited).await?;
                        if !state.in_progress.contains(&child)
                            && !state.calls[id.0].prerequisites.contains(&child)
                        {
                            state.calls[id.0].prerequisites.push(child);
                        }
                        current.push(state.calls[child.0].qualifiers[0]);
                    }

                    if tref.parallel {
                        if let Some(prev) = &prev {
                            let mut pair: Vec<QualifierId> = prev.clone();
                            pair.extend(current.iter().copied());
                            state.make_parallel(&pair);
                        }
                    }
                    prev = Some(current);
                }
            }
        }

        // A parallel command may overlap its own prerequisites.
        if let Action::Command { parallel: true, .. } = &spec.action {
            let prereq_quals: Vec<QualifierId> = state.calls[id.0]
                .prerequisites
                .clone()
                .into_iter()
                .map(|p| state.calls[p.0].qualifiers[0])
                .collect();
            for q in prereq_quals {
                state.make_parallel(&[own_qual, q]);
            }
        }

        Ok(())
    }
}
