//! The task spec builder.
//!
//! Accumulates prerequisites, attributes, arguments and the action across
//! any number of [`parse`](TaskSpecBuilder::parse) /
//! [`apply_options`](TaskSpecBuilder::apply_options) /
//! [`apply_argv`](TaskSpecBuilder::apply_argv) calls, then freezes into an
//! immutable [`TaskSpec`].

use std::sync::Arc;

use runz_types::{Action, Attrs, Manifest, Prerequisite, RunResult, TaskSpec};

use crate::options::{OptionParser, OptionReaders};
use crate::package::Package;
use crate::parser;
use crate::task::Task;

/// Mutable accumulator for a task specification.
#[derive(Default)]
pub struct TaskSpecBuilder {
    pre: Vec<Prerequisite>,
    attrs: Attrs,
    args: Vec<String>,
    action: Option<Action>,
}

impl TaskSpecBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a script line through the task grammar and merge the result.
    pub fn parse(&mut self, line: &str) -> RunResult<&mut Self> {
        let spec = parser::parse(line)?;
        self.merge(spec);
        Ok(self)
    }

    /// Like [`parse`](Self::parse), over an already tokenized argv tail.
    pub fn parse_tokens(&mut self, tokens: Vec<String>) -> RunResult<&mut Self> {
        let spec = parser::parse_tokens(tokens)?;
        self.merge(spec);
        Ok(self)
    }

    /// Apply `args[from..]` through the option engine with the task option
    /// set: `--then`/`--and` set the command action, attribute assignments
    /// extend the attributes, anything else accumulates as task arguments.
    pub fn apply_options(&mut self, args: &[String], from: usize) -> RunResult<&mut Self> {
        let tail = args.get(from..).unwrap_or_default().to_vec();
        if !tail.is_empty() {
            task_options().parse(self, &tail)?;
        }
        Ok(self)
    }

    /// Apply a full command-line argv for the named task.
    ///
    /// When the manifest declares a script for `task_name` whose tokens are
    /// a prefix of `argv[from..]` — the runner was invoked through that very
    /// script — the script's own line is applied first and only the extra
    /// tokens are applied as options. Otherwise the whole tail is applied
    /// as-is. The prefix comparison is case-sensitive and token-exact.
    pub fn apply_argv(
        &mut self,
        manifest: &Manifest,
        task_name: &str,
        argv: &[String],
        from: usize,
    ) -> RunResult<&mut Self> {
        let tail = argv.get(from..).unwrap_or_default();
        if let Some(script) = manifest.script(task_name) {
            if let Some(words) = parser::script_words(script) {
                if !words.is_empty()
                    && words.len() <= tail.len()
                    && words[..] == tail[..words.len()]
                {
                    self.parse(script)?;
                    let taken = std::mem::take(&mut self.args);
                    self.apply_options(&taken, 0)?;
                    let extra = tail[words.len()..].to_vec();
                    return self.apply_options(&extra, 0);
                }
            }
        }
        let mut tokens = tail.to_vec();
        if tokens.first().map(String::as_str) == Some("run-z") {
            tokens.remove(0);
        }
        self.parse_tokens(tokens)?;
        let taken = std::mem::take(&mut self.args);
        self.apply_options(&taken, 0)
    }

    /// Append an attribute assignment.
    pub fn attr(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.attrs.add(name, value);
        self
    }

    /// Append a trailing argument.
    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    /// Set the action, replacing any previous one.
    pub fn action(&mut self, action: Action) -> &mut Self {
        self.action = Some(action);
        self
    }

    /// Take the accumulated trailing arguments, leaving none behind.
    ///
    /// The usual flow: grammar-parse a line, take the raw option tail, feed
    /// it back through [`apply_options`](Self::apply_options).
    pub fn take_args(&mut self) -> Vec<String> {
        std::mem::take(&mut self.args)
    }

    fn merge(&mut self, spec: TaskSpec) {
        self.pre.extend(spec.pre);
        self.attrs.extend(&spec.attrs);
        self.args.extend(spec.args);
        if !spec.action.is_default() {
            self.action = Some(spec.action);
        }
    }

    /// Freeze into an immutable spec. The action defaults to an empty group
    /// when nothing set it.
    pub fn spec(&self) -> TaskSpec {
        TaskSpec {
            pre: self.pre.clone(),
            attrs: self.attrs.clone(),
            args: self.args.clone(),
            action: self.action.clone().unwrap_or_default(),
        }
    }

    /// Freeze the spec and bind it to a target package as a task.
    pub fn task(&self, target: &Arc<Package>, name: impl Into<String>) -> Arc<Task> {
        Task::for_package(target, name, self.spec())
    }
}

/// The task option set.
///
/// `--then CMD ARGS…` runs a command once the prerequisites complete;
/// `--and CMD ARGS…` is its parallel form — the command may overlap its own
/// prerequisites. Attribute assignments in option position extend the task
/// attributes. Every other option or positional accumulates as a task
/// argument, verbatim: a task line passes unrecognized options along rather
/// than rejecting them.
fn task_options() -> OptionParser<TaskSpecBuilder> {
    let mut readers = OptionReaders::new();
    readers
        .read("--then", |b: &mut TaskSpecBuilder, ctx| {
            let rest = ctx.rest();
            if let Some((command, args)) = rest.split_first() {
                b.action = Some(Action::Command {
                    command: command.clone(),
                    args: args.to_vec(),
                    parallel: false,
                });
            }
            Ok(())
        })
        .read("--and", |b: &mut TaskSpecBuilder, ctx| {
            let rest = ctx.rest();
            if let Some((command, args)) = rest.split_first() {
                b.action = Some(Action::Command {
                    command: command.clone(),
                    args: args.to_vec(),
                    parallel: true,
                });
            }
            Ok(())
        })
        .read("--*", |b: &mut TaskSpecBuilder, ctx| {
            let token = verbatim(ctx);
            ctx.accept();
            b.args.push(token);
            Ok(())
        })
        .read("-*", |b: &mut TaskSpecBuilder, ctx| {
            let token = verbatim(ctx);
            ctx.accept();
            b.args.push(token);
            Ok(())
        })
        .read("*", |b: &mut TaskSpecBuilder, ctx| {
            let token = verbatim(ctx);
            ctx.accept();
            match parser::split_attr(&token) {
                Some((name, value)) => {
                    b.attrs.add(name, value);
                }
                None => b.args.push(token),
            }
            Ok(())
        });
    OptionParser::new(readers)
}

/// Reassemble the original token from a candidate's name and bound values.
fn verbatim<S>(ctx: &crate::options::OptionReadCtx<S>) -> String {
    match ctx.bound_values() {
        Some([value]) => format!("{}={}", ctx.name(), value),
        _ => ctx.name().to_string(),
    }
}
