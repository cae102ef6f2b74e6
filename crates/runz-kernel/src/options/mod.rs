//! The option/syntax engine.
//!
//! Drives pluggable [`OptionSyntax`]es over an argv tail and dispatches the
//! resulting candidates to registered readers. Used by the top-level CLI and
//! by the task spec builder when applying task options.
//!
//! # Recognition algorithm
//!
//! For each argv position, every syntax proposes candidates in order. Each
//! candidate is tried in three stages:
//!
//! 1. Readers registered under the candidate's exact key, layer by layer,
//!    until one recognizes the option (consumes values or defers).
//! 2. If unrecognized and the candidate allows it, a **replacement retry**:
//!    recognition restarts on the candidate's expanded argv. Retries are
//!    refused once anything has been recognized in this parse, which stops
//!    replacement loops.
//! 3. The wildcard reader for the candidate's name class (`--*`, `-*`, `*`).
//!
//! When every candidate falls through, the parse fails with
//! [`RunError::UnknownOption`]. After the linear scan, deferred callbacks
//! run in registration order against the final value-sets of their options;
//! a deferral whose option was never actually read fails the same way.

pub mod syntax;

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use runz_types::{RunError, RunResult};

pub use syntax::{default_syntaxes, wildcard_key, OptionCandidate, OptionSyntax};

/// A first-pass option reader. Readers mutate the parse state `S` and record
/// what they consumed through the [`OptionReadCtx`].
pub type OptionReader<S> = Arc<dyn Fn(&mut S, &mut OptionReadCtx<S>) -> RunResult<()> + Send + Sync>;

/// A second-pass callback registered via [`OptionReadCtx::defer`].
pub type DeferredReader<S> =
    Box<dyn FnOnce(&mut S, &mut OptionReadCtx<S>) -> RunResult<()> + Send + Sync>;

/// Whether a token looks like an option (stops value consumption).
fn is_option_like(token: &str) -> bool {
    token.len() > 1 && token.starts_with('-')
}

/// The reading context handed to a reader for one candidate.
///
/// A reader recognizes its option by consuming values ([`values`],
/// [`values_up_to`], [`rest`], [`accept`]) or by registering a second-pass
/// callback ([`defer`]). Doing neither leaves the candidate unrecognized and
/// recognition moves on.
///
/// [`values`]: OptionReadCtx::values
/// [`values_up_to`]: OptionReadCtx::values_up_to
/// [`rest`]: OptionReadCtx::rest
/// [`accept`]: OptionReadCtx::accept
/// [`defer`]: OptionReadCtx::defer
pub struct OptionReadCtx<'a, S> {
    name: &'a str,
    /// Values bound by the syntax (`--name=value`); read as-is.
    explicit: Option<&'a [String]>,
    tail: &'a [String],
    taken: Option<Vec<String>>,
    consumed_tail: usize,
    deferred: Option<DeferredReader<S>>,
}

impl<'a, S> OptionReadCtx<'a, S> {
    fn new(name: &'a str, explicit: Option<&'a [String]>, tail: &'a [String]) -> Self {
        Self {
            name,
            explicit,
            tail,
            taken: None,
            consumed_tail: 0,
            deferred: None,
        }
    }

    /// The recognized option name.
    pub fn name(&self) -> &str {
        self.name
    }

    /// The values bound by the syntax itself (the `value` of
    /// `--name=value`), if any.
    pub fn bound_values(&self) -> Option<&[String]> {
        self.explicit
    }

    /// Consume all available values: the syntax-bound ones if any, otherwise
    /// following tokens up to the next option-like token.
    pub fn values(&mut self) -> Vec<String> {
        self.take_values(None)
    }

    /// Like [`values`](Self::values), capped at `max` tokens.
    pub fn values_up_to(&mut self, max: usize) -> Vec<String> {
        self.take_values(Some(max))
    }

    /// Consume every remaining token, option-like or not.
    pub fn rest(&mut self) -> Vec<String> {
        if let Some(taken) = &self.taken {
            return taken.clone();
        }
        let mut vals: Vec<String> = self.explicit.map(<[String]>::to_vec).unwrap_or_default();
        vals.extend(self.tail.iter().cloned());
        self.consumed_tail = self.tail.len();
        self.taken = Some(vals.clone());
        vals
    }

    /// Recognize the option without consuming any value (a flag).
    pub fn accept(&mut self) {
        self.take_values(Some(0));
    }

    /// Register a callback to run after the linear scan, with the final
    /// value-set of this option available through a fresh context.
    pub fn defer(&mut self, cb: DeferredReader<S>) {
        self.deferred = Some(cb);
    }

    /// Whether this reader recognized the option.
    fn recognized(&self) -> bool {
        self.taken.is_some() || self.deferred.is_some()
    }

    fn take_values(&mut self, max: Option<usize>) -> Vec<String> {
        if let Some(taken) = &self.taken {
            return taken.clone();
        }
        let vals = match self.explicit {
            Some(explicit) => {
                let n = max.map_or(explicit.len(), |m| m.min(explicit.len()));
                explicit[..n].to_vec()
            }
            None => {
                let cap = max.unwrap_or(usize::MAX);
                let mut vals = Vec::new();
                for token in self.tail {
                    if vals.len() >= cap || is_option_like(token) {
                        break;
                    }
                    vals.push(token.clone());
                }
                self.consumed_tail = vals.len();
                vals
            }
        };
        self.taken = Some(vals.clone());
        vals
    }
}

/// Layered reader registry with `--*`, `-*` and `*` wildcards.
///
/// Later layers extend earlier ones: all readers registered for a name are
/// invoked in layer order until one recognizes the option.
pub struct OptionReaders<S> {
    layers: Vec<IndexMap<String, OptionReader<S>>>,
}

impl<S> Default for OptionReaders<S> {
    fn default() -> Self {
        Self { layers: vec![IndexMap::new()] }
    }
}

impl<S> OptionReaders<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reader for `name` in the current layer.
    pub fn read<F>(&mut self, name: impl Into<String>, reader: F) -> &mut Self
    where
        F: Fn(&mut S, &mut OptionReadCtx<S>) -> RunResult<()> + Send + Sync + 'static,
    {
        // Unwrap is fine: layers always holds at least one map.
        self.layers
            .last_mut()
            .expect("registry has a layer")
            .insert(name.into(), Arc::new(reader));
        self
    }

    /// Start a new layer. Subsequent registrations are consulted after all
    /// earlier layers.
    pub fn layer(&mut self) -> &mut Self {
        self.layers.push(IndexMap::new());
        self
    }

    fn lookup(&self, key: &str) -> Vec<OptionReader<S>> {
        self.layers.iter().filter_map(|l| l.get(key)).cloned().collect()
    }
}

/// The values recognized for each option, in recognition order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognizedOptions {
    map: IndexMap<String, Vec<String>>,
}

impl RecognizedOptions {
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.map.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// The outcome of a recognized candidate.
struct ReadOutcome<S> {
    taken: Option<Vec<String>>,
    consumed_tail: usize,
    deferred: Option<DeferredReader<S>>,
}

/// The option parser: a syntax stack plus a reader registry, generic over
/// the mutable state readers operate on.
pub struct OptionParser<S> {
    syntaxes: Vec<Box<dyn OptionSyntax>>,
    readers: OptionReaders<S>,
}

impl<S> OptionParser<S> {
    /// A parser with the default syntax stack.
    pub fn new(readers: OptionReaders<S>) -> Self {
        Self { syntaxes: default_syntaxes(), readers }
    }

    /// A parser with a custom syntax stack.
    pub fn with_syntaxes(syntaxes: Vec<Box<dyn OptionSyntax>>, readers: OptionReaders<S>) -> Self {
        Self { syntaxes, readers }
    }

    /// Parse the whole of `args`, mutating `state` through the readers.
    pub fn parse(&self, state: &mut S, args: &[String]) -> RunResult<RecognizedOptions> {
        let mut argv: Vec<String> = args.to_vec();
        let mut recognized = RecognizedOptions::default();
        // Names recognized only by a deferral, awaiting an actual read.
        let mut provisional: Vec<String> = Vec::new();
        let mut completed: HashSet<String> = HashSet::new();
        let mut deferred: Vec<(String, DeferredReader<S>)> = Vec::new();
        let mut any_recognized = false;

        'scan: while !argv.is_empty() {
            let candidates: Vec<OptionCandidate> = self
                .syntaxes
                .iter()
                .flat_map(|s| s.candidates(&argv))
                .collect();

            for cand in &candidates {
                // Stage 1: exact-key readers.
                if let Some(outcome) = self.try_readers(state, cand, &cand.key)? {
                    Self::apply(
                        cand,
                        outcome,
                        &mut recognized,
                        &mut provisional,
                        &mut completed,
                        &mut deferred,
                        &mut argv,
                    );
                    any_recognized = true;
                    continue 'scan;
                }

                // Stage 2: replacement retry, refused once recognition is
                // established.
                if cand.retry && !any_recognized {
                    let mut next = Vec::with_capacity(1 + cand.tail.len());
                    next.push(cand.name.clone());
                    if let Some(values) = &cand.values {
                        next.extend(values.iter().cloned());
                    }
                    next.extend(cand.tail.iter().cloned());
                    argv = next;
                    continue 'scan;
                }

                // Stage 3: wildcard fallback.
                if let Some(outcome) = self.try_readers(state, cand, cand.wildcard_key())? {
                    Self::apply(
                        cand,
                        outcome,
                        &mut recognized,
                        &mut provisional,
                        &mut completed,
                        &mut deferred,
                        &mut argv,
                    );
                    any_recognized = true;
                    continue 'scan;
                }
            }

            return Err(RunError::UnknownOption { name: argv[0].clone() });
        }

        // Deferral pass, in registration order. Deferred callbacks may read
        // the final values and may defer again.
        let mut queue = std::collections::VecDeque::from(deferred);
        while let Some((name, cb)) = queue.pop_front() {
            let final_values: Vec<String> =
                recognized.map.get(&name).cloned().unwrap_or_default();
            let (read, again) = {
                let mut ctx = OptionReadCtx::new(&name, Some(&final_values), &[]);
                cb(state, &mut ctx)?;
                (ctx.taken.is_some(), ctx.deferred.take())
            };
            if read {
                completed.insert(name.clone());
            }
            if let Some(again) = again {
                queue.push_back((name, again));
            }
        }

        if let Some(name) = provisional.into_iter().find(|n| !completed.contains(n)) {
            return Err(RunError::UnknownOption { name });
        }

        Ok(recognized)
    }

    /// Invoke the readers registered under `key`, in layer order, until one
    /// recognizes the candidate.
    fn try_readers(
        &self,
        state: &mut S,
        cand: &OptionCandidate,
        key: &str,
    ) -> RunResult<Option<ReadOutcome<S>>> {
        let readers = self.readers.lookup(key);
        if readers.is_empty() {
            return Ok(None);
        }
        let mut ctx = OptionReadCtx::new(&cand.name, cand.values.as_deref(), &cand.tail);
        for reader in readers {
            reader(state, &mut ctx)?;
            if ctx.recognized() {
                return Ok(Some(ReadOutcome {
                    taken: ctx.taken.take(),
                    consumed_tail: ctx.consumed_tail,
                    deferred: ctx.deferred.take(),
                }));
            }
        }
        Ok(None)
    }

    #[allow(clippy::too_many_arguments)]
    fn apply(
        cand: &OptionCandidate,
        outcome: ReadOutcome<S>,
        recognized: &mut RecognizedOptions,
        provisional: &mut Vec<String>,
        completed: &mut HashSet<String>,
        deferred: &mut Vec<(String, DeferredReader<S>)>,
        argv: &mut Vec<String>,
    ) {
        if let Some(values) = outcome.taken {
            recognized
                .map
                .entry(cand.name.clone())
                .or_default()
                .extend(values);
            completed.insert(cand.name.clone());
        } else {
            provisional.push(cand.name.clone());
        }
        if let Some(cb) = outcome.deferred {
            deferred.push((cand.name.clone(), cb));
        }
        *argv = cand.tail[outcome.consumed_tail..].to_vec();
    }
}
