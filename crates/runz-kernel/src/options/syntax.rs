//! Option syntaxes — functions that propose candidates for an argv tail.
//!
//! A syntax inspects the head of the remaining argv and yields zero or more
//! [`OptionCandidate`]s, in preference order. The engine then tries each
//! candidate's readers before moving to the next candidate.

/// A proposed interpretation of the argv head as one option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionCandidate {
    /// The reader lookup key. Usually equals `name`; differs for prefix
    /// forms such as `-t*`.
    pub key: String,
    /// The option name as recognized and reported.
    pub name: String,
    /// Values bound by the syntax itself (e.g. the `value` of
    /// `--name=value`). `None` means values are read from the tail.
    pub values: Option<Vec<String>>,
    /// The argv remaining after this option and its bound values.
    ///
    /// A candidate built with [`OptionCandidate::new`] carries an empty
    /// tail: it consumes everything the syntax saw unless a tail is given
    /// explicitly.
    pub tail: Vec<String>,
    /// Whether the engine may re-run recognition on the expanded form
    /// `[name, values…, tail…]` when no reader accepts this candidate.
    pub retry: bool,
}

impl OptionCandidate {
    /// A candidate with no bound values and an empty tail.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            key: name.clone(),
            name,
            values: None,
            tail: Vec::new(),
            retry: false,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_values(mut self, values: Vec<String>) -> Self {
        self.values = Some(values);
        self
    }

    pub fn with_tail(mut self, tail: Vec<String>) -> Self {
        self.tail = tail;
        self
    }

    pub fn retrying(mut self) -> Self {
        self.retry = true;
        self
    }

    /// The wildcard reader key matching this candidate's name class:
    /// `--*` for long options, `-*` for short ones, `*` for positionals.
    pub fn wildcard_key(&self) -> &'static str {
        wildcard_key(&self.name)
    }
}

/// The wildcard reader key for an option name.
pub fn wildcard_key(name: &str) -> &'static str {
    if name.starts_with("--") {
        "--*"
    } else if name.starts_with('-') && name.len() > 1 {
        "-*"
    } else {
        "*"
    }
}

/// A pluggable option syntax.
pub trait OptionSyntax: Send + Sync {
    /// Propose candidates for the head of `args`. `args` is never empty.
    fn candidates(&self, args: &[String]) -> Vec<OptionCandidate>;
}

impl<F> OptionSyntax for F
where
    F: Fn(&[String]) -> Vec<OptionCandidate> + Send + Sync,
{
    fn candidates(&self, args: &[String]) -> Vec<OptionCandidate> {
        self(args)
    }
}

/// `--name` and `--name=value`.
pub fn long_options(args: &[String]) -> Vec<OptionCandidate> {
    let token = &args[0];
    if !token.starts_with("--") || token.len() <= 2 {
        return Vec::new();
    }
    let tail = args[1..].to_vec();
    match token.find('=') {
        Some(eq) => vec![
            OptionCandidate::new(&token[..eq])
                .with_values(vec![token[eq + 1..].to_string()])
                .with_tail(tail),
        ],
        None => vec![OptionCandidate::new(token.clone()).with_tail(tail)],
    }
}

/// Short options: the exact token, then the one-letter prefix bearing the
/// remainder as a parameter (reader key `-X*`).
pub fn short_options(args: &[String]) -> Vec<OptionCandidate> {
    let token = &args[0];
    if !token.starts_with('-') || token.starts_with("--") || token.len() < 2 {
        return Vec::new();
    }
    let tail = args[1..].to_vec();
    let mut candidates = vec![OptionCandidate::new(token.clone()).with_tail(tail.clone())];
    if token.len() > 2 {
        let prefix = &token[..2];
        candidates.push(
            OptionCandidate::new(prefix)
                .with_key(format!("{prefix}*"))
                .with_values(vec![token[2..].to_string()])
                .with_tail(tail),
        );
    }
    candidates
}

/// One-letter cluster fallback: `-abc` as `-a` followed by `-bc`.
pub fn short_option_clusters(args: &[String]) -> Vec<OptionCandidate> {
    let token = &args[0];
    if !token.starts_with('-') || token.starts_with("--") || token.len() <= 2 {
        return Vec::new();
    }
    let mut tail = Vec::with_capacity(args.len());
    tail.push(format!("-{}", &token[2..]));
    tail.extend(args[1..].iter().cloned());
    vec![OptionCandidate::new(&token[..2]).with_tail(tail)]
}

/// Verbatim positional: the token as-is.
pub fn positional(args: &[String]) -> Vec<OptionCandidate> {
    vec![OptionCandidate::new(args[0].clone()).with_tail(args[1..].to_vec())]
}

/// The default syntax stack, in recognition order.
pub fn default_syntaxes() -> Vec<Box<dyn OptionSyntax>> {
    vec![
        Box::new(long_options as fn(&[String]) -> Vec<OptionCandidate>),
        Box::new(short_options as fn(&[String]) -> Vec<OptionCandidate>),
        Box::new(short_option_clusters as fn(&[String]) -> Vec<OptionCandidate>),
        Box::new(positional as fn(&[String]) -> Vec<OptionCandidate>),
    ]
}
