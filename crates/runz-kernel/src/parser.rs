//! The task grammar parser.
//!
//! Translates a manifest script line into a [`TaskSpec`]. A line is either
//! **native** — an opaque shell script the runner does not interpret — or a
//! runner line of the form:
//!
//! ```text
//! run-z dep1 dep2/-a //-b// ./pkg attr=val --then cmd…
//! ```
//!
//! A line is native when its first token is not `run-z`, when it contains an
//! environment-variable expansion, or when it contains a shell construct
//! (pipe, redirect, comment). A line that cannot be tokenized at all is
//! native for the same reason.
//!
//! Within a runner line, tokens before the first option are positional:
//! package selectors (`.`, `..`, `./…`, `../…`), attribute assignments
//! (`name=value`, `name=`, `=name`) and prerequisite tokens. Prerequisite
//! tokens are split on the `//` argument delimiter — the in/out-of-args flag
//! toggles at every `//` and carries across tokens — and, in name position,
//! on commas (the following task may run in parallel) and single `/`
//! shorthand arguments. The first option-like token ends the positional
//! prefix; it and everything after it land in `spec.args` verbatim.
//!
//! Parse errors carry the space-rejoined command line (without the leading
//! `run-z`) and the character position of the offending token.

use runz_types::{Attrs, Prerequisite, RunError, RunResult, TaskRef, TaskSpec};

use crate::lexer;

/// Error message for arguments that precede any task name.
const ORPHAN_ARGUMENT: &str = "Task argument specified, but not the task";

/// Parse a manifest script line into a task spec.
pub fn parse(line: &str) -> RunResult<TaskSpec> {
    let tokenized = match lexer::tokenize(line) {
        Ok(t) => t,
        Err(_) => return Ok(TaskSpec::script()),
    };
    let words = tokenized.words();
    let is_runner_line = words.first() == Some(&"run-z")
        && !tokenized.env_expansion
        && !tokenized.has_constructs();
    if !is_runner_line {
        return Ok(TaskSpec::script());
    }

    let tokens: Vec<String> = words[1..].iter().map(|w| w.to_string()).collect();
    TaskLineParser::new(tokens).run()
}

/// Parse an already tokenized argv tail through the positional grammar.
///
/// Skips the shell-quote pass and the native/runner decision: the tokens
/// came from a process argv, not from a script line.
pub fn parse_tokens(tokens: Vec<String>) -> RunResult<TaskSpec> {
    TaskLineParser::new(tokens).run()
}

/// Split an attribute token into `(name, value)`.
///
/// A token is an attribute when its first `=` precedes any `/`; anything
/// else falls through to prerequisite parsing. The leading-`=` form `=name`
/// assigns the empty string under `name`.
pub(crate) fn split_attr(token: &str) -> Option<(&str, &str)> {
    let eq = token.find('=')?;
    if let Some(slash) = token.find('/') {
        if slash < eq {
            return None;
        }
    }
    if eq == 0 {
        Some((&token[1..], ""))
    } else {
        Some((&token[..eq], &token[eq + 1..]))
    }
}

/// Whether a token is a package selector (a relative path).
pub(crate) fn is_selector(token: &str) -> bool {
    token == "." || token == ".." || token.starts_with("./") || token.starts_with("../")
}

/// A prerequisite under construction. Its raw arguments are classified into
/// attributes and plain arguments when the prerequisite is committed.
struct PendingTask {
    name: String,
    parallel: bool,
    raw_args: Vec<String>,
}

struct TaskLineParser {
    tokens: Vec<String>,
    /// Space-rejoined tokens, for error reporting.
    command_line: String,
    /// Character position of each token within `command_line`.
    positions: Vec<usize>,
    in_args: bool,
    pending: Option<PendingTask>,
    next_parallel: bool,
    spec: TaskSpec,
}

impl TaskLineParser {
    fn new(tokens: Vec<String>) -> Self {
        let command_line = tokens.join(" ");
        let mut positions = Vec::with_capacity(tokens.len());
        let mut pos = 0;
        for token in &tokens {
            positions.push(pos);
            pos += token.chars().count() + 1;
        }
        Self {
            tokens,
            command_line,
            positions,
            in_args: false,
            pending: None,
            next_parallel: false,
            spec: TaskSpec::default(),
        }
    }

    fn run(mut self) -> RunResult<TaskSpec> {
        for i in 0..self.tokens.len() {
            let token = self.tokens[i].clone();
            let token_pos = self.positions[i];

            if !self.in_args {
                if token.starts_with('-') {
                    // First option: the positional prefix ends here.
                    self.commit_pending();
                    self.spec.args = self.tokens[i..].to_vec();
                    break;
                }
                if is_selector(&token) {
                    self.commit_pending();
                    self.spec.pre.push(Prerequisite::Selector { host: token });
                    continue;
                }
                if let Some((name, value)) = split_attr(&token) {
                    self.commit_pending();
                    self.spec.attrs.add(name, value);
                    continue;
                }
            }

            self.prereq_token(&token, token_pos)?;
        }
        self.commit_pending();

        Ok(self.spec)
    }

    /// Process one prerequisite token, honoring the `//` args-mode toggle.
    fn prereq_token(&mut self, token: &str, token_pos: usize) -> RunResult<()> {
        let pieces: Vec<&str> = token.split("//").collect();
        let mut offset = 0;
        for (j, piece) in pieces.iter().enumerate() {
            if j > 0 {
                self.in_args = !self.in_args;
                offset += 2;
            }
            if self.in_args {
                if !piece.is_empty() {
                    match &mut self.pending {
                        Some(pending) => pending.raw_args.push(piece.to_string()),
                        None => return Err(self.error(ORPHAN_ARGUMENT, token_pos)),
                    }
                }
            } else {
                self.name_piece(piece, token_pos + offset)?;
            }
            offset += piece.chars().count();
        }
        Ok(())
    }

    /// Process a name-position piece: comma-separated fragments, each with
    /// optional `/` shorthand arguments.
    fn name_piece(&mut self, piece: &str, piece_pos: usize) -> RunResult<()> {
        let mut frag_offset = 0;
        for (k, fragment) in piece.split(',').enumerate() {
            if k > 0 {
                // A comma commits the current prerequisite and marks the
                // next one parallel with it.
                self.commit_pending();
                self.next_parallel = true;
                frag_offset += 1;
            }
            self.fragment(fragment, piece_pos + frag_offset, k == 0)?;
            frag_offset += fragment.chars().count();
        }
        Ok(())
    }

    fn fragment(&mut self, fragment: &str, fragment_pos: usize, is_first: bool) -> RunResult<()> {
        if fragment.is_empty() {
            return Ok(());
        }
        let mut parts = fragment.split('/');
        let name = parts.next().unwrap_or_default();
        let args: Vec<String> = parts
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();

        if name.is_empty() {
            if args.is_empty() {
                return Ok(());
            }
            // `/arg` on the very first fragment extends the task currently
            // under construction; anywhere else the arguments are orphaned.
            if is_first {
                if let Some(pending) = &mut self.pending {
                    pending.raw_args.extend(args);
                    return Ok(());
                }
            }
            return Err(self.error(ORPHAN_ARGUMENT, fragment_pos));
        }

        self.commit_pending();
        let parallel = std::mem::take(&mut self.next_parallel);
        self.pending = Some(PendingTask { name: name.to_string(), parallel, raw_args: args });
        Ok(())
    }

    /// Commit the prerequisite under construction, classifying its raw
    /// arguments: option-like tokens and plain words become arguments,
    /// `name=value` tokens become the prerequisite's own attributes.
    fn commit_pending(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let mut attrs = Attrs::new();
        let mut args = Vec::new();
        for raw in pending.raw_args {
            if raw.starts_with('-') {
                args.push(raw);
            } else if let Some((name, value)) = split_attr(&raw) {
                attrs.add(name, value);
            } else {
                args.push(raw);
            }
        }
        self.spec.pre.push(Prerequisite::Task(TaskRef {
            task: pending.name,
            parallel: pending.parallel,
            attrs,
            args,
        }));
    }

    fn error(&self, message: &str, position: usize) -> RunError {
        RunError::invalid_task(message, self.command_line.clone(), position)
    }
}

/// Re-tokenize a native script line for prefix comparison.
///
/// Used by the builder's argv application: when a manifest script's tokens
/// are a prefix of the argv, the script's options apply first.
pub(crate) fn script_words(line: &str) -> Option<Vec<String>> {
    let tokenized = lexer::tokenize(line).ok()?;
    if tokenized.has_constructs() || tokenized.env_expansion {
        return None;
    }
    Some(tokenized.words().into_iter().map(str::to_string).collect())
}
