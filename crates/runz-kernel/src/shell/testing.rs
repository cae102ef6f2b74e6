//! Test doubles for the shell collaborator.
//!
//! [`RecordingShell`] records every execution and lets tests script exit
//! codes and completion order: a held job stays running until the test
//! releases it, which is how overlap and happens-before are asserted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use runz_types::RunResult;
use tokio::sync::Notify;

use super::{ExecParams, ProcessHandle, Shell};

/// What kind of execution a record captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecKind {
    Command,
    Script,
}

/// One recorded execution.
#[derive(Debug, Clone)]
pub struct ExecRecord {
    pub kind: ExecKind,
    pub name: String,
    pub cwd: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

#[derive(Default)]
struct Inner {
    records: Vec<ExecRecord>,
    /// Interleaved `start`/`exit`/`killed` events, in wall order.
    events: Vec<String>,
    exit_codes: HashMap<String, i32>,
    gates: HashMap<String, Arc<Notify>>,
}

/// A shell that spawns no processes.
#[derive(Default)]
pub struct RecordingShell {
    inner: Arc<Mutex<Inner>>,
}

impl RecordingShell {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make executions of `name` exit with `code` instead of 0.
    pub fn exit_code(&self, name: &str, code: i32) {
        self.lock().exit_codes.insert(name.to_string(), code);
    }

    /// Hold executions of `name` until [`release`](Self::release) is called.
    pub fn hold(&self, name: &str) {
        self.lock()
            .gates
            .insert(name.to_string(), Arc::new(Notify::new()));
    }

    /// Let one held execution of `name` finish.
    pub fn release(&self, name: &str) {
        if let Some(gate) = self.lock().gates.get(name) {
            gate.notify_one();
        }
    }

    /// Every recorded execution, in start order.
    pub fn records(&self) -> Vec<ExecRecord> {
        self.lock().records.clone()
    }

    /// The names of every execution, in start order.
    pub fn started(&self) -> Vec<String> {
        self.lock().records.iter().map(|r| r.name.clone()).collect()
    }

    /// The interleaved `start NAME` / `exit NAME` / `killed NAME` events.
    pub fn events(&self) -> Vec<String> {
        self.lock().events.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("recording shell poisoned")
    }

    fn start(&self, kind: ExecKind, name: &str, params: &ExecParams) -> RecordedProcess {
        let mut inner = self.lock();
        inner.records.push(ExecRecord {
            kind,
            name: name.to_string(),
            cwd: params.cwd.clone(),
            args: params.args.clone(),
            env: params.env.clone(),
        });
        inner.events.push(format!("start {name}"));
        RecordedProcess {
            name: name.to_string(),
            exit_code: inner.exit_codes.get(name).copied().unwrap_or(0),
            gate: inner.gates.get(name).cloned(),
            killed: Arc::new(Notify::new()),
            shared: self.inner.clone(),
        }
    }
}

#[async_trait]
impl Shell for RecordingShell {
    async fn exec_command(
        &self,
        command: &str,
        params: &ExecParams,
    ) -> RunResult<Box<dyn ProcessHandle>> {
        Ok(Box::new(self.start(ExecKind::Command, command, params)))
    }

    async fn exec_script(
        &self,
        name: &str,
        params: &ExecParams,
    ) -> RunResult<Box<dyn ProcessHandle>> {
        Ok(Box::new(self.start(ExecKind::Script, name, params)))
    }
}

struct RecordedProcess {
    name: String,
    exit_code: i32,
    gate: Option<Arc<Notify>>,
    killed: Arc<Notify>,
    shared: Arc<Mutex<Inner>>,
}

impl RecordedProcess {
    fn push_event(&self, event: String) {
        if let Ok(mut inner) = self.shared.lock() {
            inner.events.push(event);
        }
    }
}

#[async_trait]
impl ProcessHandle for RecordedProcess {
    async fn wait(&mut self) -> RunResult<i32> {
        if let Some(gate) = self.gate.clone() {
            let killed = self.killed.clone();
            tokio::select! {
                _ = gate.notified() => {}
                _ = killed.notified() => {
                    self.push_event(format!("killed {}", self.name));
                    return Ok(130);
                }
            }
        }
        self.push_event(format!("exit {}", self.name));
        Ok(self.exit_code)
    }

    async fn kill(&mut self) {
        self.killed.notify_one();
    }
}
