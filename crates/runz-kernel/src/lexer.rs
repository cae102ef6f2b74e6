//! Shell-quote tokenizer for script command lines.
//!
//! Splits a manifest script line into words using POSIX quoting rules
//! (single quotes, double quotes, backslash escapes) via the logos lexer
//! generator. Quoted and unquoted pieces that touch without intervening
//! whitespace join into a single word, so `foo"bar baz"` is one word.
//!
//! Beyond words, the tokenizer reports the two things the task parser's
//! go/no-go decision needs:
//!
//! - **Environment expansion**: `$NAME` or `${…}` anywhere in the line.
//! - **Shell constructs**: pipes, redirects, separators, subshells and
//!   comments — anything that is not a plain string token.

use logos::{Logos, Span};
use std::fmt;

/// Tokenizer error.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LexError {
    /// A character no pattern accepts — in practice an unterminated quote.
    #[default]
    UnexpectedCharacter,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::UnexpectedCharacter => write!(f, "unexpected character"),
        }
    }
}

impl std::error::Error for LexError {}

/// Raw lexeme produced by logos, before word joining.
///
/// The order of variants matters for logos priority: multi-character
/// operators come before their single-character prefixes, and the bare-word
/// pattern comes last.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexError)]
#[logos(skip r"[ \t\r\n]+")]
enum Piece {
    // Multi-character operators first.
    #[token("2>&1", op)]
    #[token("1>&2", op)]
    #[token(">&2", op)]
    #[token("2>", op)]
    #[token("&>", op)]
    #[token(">>", op)]
    #[token("<<", op)]
    #[token("&&", op)]
    #[token("||", op)]
    #[token("|", op)]
    #[token("&", op)]
    #[token(";", op)]
    #[token("<", op)]
    #[token(">", op)]
    #[token("(", op)]
    #[token(")", op)]
    Op(String),

    /// Single-quoted piece: literal content, no escape processing.
    #[regex(r"'[^']*'", |lex| { let s = lex.slice(); s[1..s.len() - 1].to_string() })]
    Single(String),

    /// Double-quoted piece. The callback strips quotes and processes the
    /// POSIX escapes; `contains_expansion` is computed separately.
    #[regex(r#""([^"\\]|\\.)*""#, lex_double)]
    Double(Quoted),

    /// Braced variable reference: `${…}`.
    #[regex(r"\$\{[^}]*\}", |lex| lex.slice().to_string())]
    BracedVar(String),

    /// Simple variable reference: `$NAME`, `$1`.
    #[regex(r"\$[A-Za-z0-9_]+", |lex| lex.slice().to_string())]
    SimpleVar(String),

    /// A lone `$` is a literal dollar sign.
    #[token("$")]
    Dollar,

    /// Backslash escape outside quotes: the next character, literally.
    #[regex(r"\\.", |lex| lex.slice().chars().nth(1))]
    Escaped(char),

    /// Comment to end of line. Only matches at the start of a word: the
    /// bare-word pattern below accepts `#` in non-leading position, so
    /// `foo#bar` stays one word.
    #[regex(r"#[^\n]*", |lex| lex.slice().to_string())]
    Comment(String),

    /// Unquoted word characters.
    #[regex(r#"[^ \t\r\n'"|&;<>()#$\\][^ \t\r\n'"|&;<>()$\\]*"#, |lex| lex.slice().to_string())]
    Bare(String),
}

/// Processed double-quoted content.
#[derive(Debug, Clone, PartialEq)]
struct Quoted {
    text: String,
    contains_expansion: bool,
}

fn op(lex: &mut logos::Lexer<Piece>) -> String {
    lex.slice().to_string()
}

/// Strip quotes and process escapes of a double-quoted piece.
///
/// Inside double quotes a backslash only escapes `"`, `\`, `$` and a
/// backtick; before any other character it stays literal. An unescaped `$`
/// marks the piece as containing an expansion.
fn lex_double(lex: &mut logos::Lexer<Piece>) -> Quoted {
    let raw = lex.slice();
    let inner = &raw[1..raw.len() - 1];
    let mut text = String::with_capacity(inner.len());
    let mut contains_expansion = false;
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(n @ ('"' | '\\' | '$' | '`')) => text.push(n),
                Some(n) => {
                    text.push('\\');
                    text.push(n);
                }
                None => text.push('\\'),
            }
        } else {
            if c == '$' {
                contains_expansion = true;
            }
            text.push(c);
        }
    }
    Quoted { text, contains_expansion }
}

/// One token of a shell command line, after word joining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellToken {
    /// A plain string token.
    Word(String),
    /// A shell operator (`|`, `>`, `;`, …).
    Op(String),
    /// A `#` comment to end of line.
    Comment(String),
}

impl ShellToken {
    /// The word text, if this is a plain string token.
    pub fn word(&self) -> Option<&str> {
        match self {
            ShellToken::Word(w) => Some(w),
            _ => None,
        }
    }
}

/// The result of tokenizing a command line.
#[derive(Debug, Clone, Default)]
pub struct Tokenized {
    /// Tokens in order of appearance.
    pub tokens: Vec<ShellToken>,
    /// Whether any environment-variable expansion was seen.
    pub env_expansion: bool,
}

impl Tokenized {
    /// Whether any token is not a plain string (operator or comment).
    pub fn has_constructs(&self) -> bool {
        self.tokens.iter().any(|t| !matches!(t, ShellToken::Word(_)))
    }

    /// All plain word tokens, in order.
    pub fn words(&self) -> Vec<&str> {
        self.tokens.iter().filter_map(ShellToken::word).collect()
    }
}

/// Tokenize a command line with POSIX shell-quote rules.
///
/// Returns an error only when the line cannot be lexed at all (an
/// unterminated quote, a trailing backslash). Callers that merely need the
/// native/structured decision treat that the same as a line with shell
/// constructs.
pub fn tokenize(line: &str) -> Result<Tokenized, LexError> {
    let mut out = Tokenized::default();
    // The current word under assembly and the source offset it ends at.
    let mut word: Option<(String, usize)> = None;

    for (piece, span) in Piece::lexer(line).spanned() {
        let piece = piece?;
        let Span { start, end } = span;

        let text = match piece {
            Piece::Single(s) | Piece::Bare(s) => s,
            Piece::Double(q) => {
                out.env_expansion |= q.contains_expansion;
                q.text
            }
            Piece::BracedVar(raw) | Piece::SimpleVar(raw) => {
                out.env_expansion = true;
                raw
            }
            Piece::Dollar => "$".to_string(),
            Piece::Escaped(c) => c.to_string(),
            Piece::Op(o) => {
                flush_word(&mut word, &mut out.tokens);
                out.tokens.push(ShellToken::Op(o));
                continue;
            }
            Piece::Comment(c) => {
                flush_word(&mut word, &mut out.tokens);
                out.tokens.push(ShellToken::Comment(c));
                continue;
            }
        };

        // A word piece extends the current word only when it starts exactly
        // where the previous piece ended.
        match &mut word {
            Some((acc, prev_end)) if *prev_end == start => {
                acc.push_str(&text);
                *prev_end = end;
            }
            _ => {
                flush_word(&mut word, &mut out.tokens);
                word = Some((text, end));
            }
        }
    }
    flush_word(&mut word, &mut out.tokens);

    Ok(out)
}

/// Commit the word under assembly, if any.
fn flush_word(word: &mut Option<(String, usize)>, tokens: &mut Vec<ShellToken>) {
    if let Some((text, _)) = word.take() {
        tokens.push(ShellToken::Word(text));
    }
}
