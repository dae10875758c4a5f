//! Command pattern matching.
//!
//! Patterns are whitespace-tokenised globs evaluated against the
//! whitespace-separated tokens of a command:
//!
//! | token      | matches                                                      |
//! |------------|--------------------------------------------------------------|
//! | `deploy`   | the identical token                                          |
//! | `v1.*`     | one token, `*` = any run of characters, `?` = one character  |
//! | `*`        | exactly one token; as the final token, one or more tokens    |
//! | `**`       | zero or more tokens, anywhere                                |
//! | `{a,b}`    | one token equal to any listed literal                        |
//!
//! So `deploy *` covers every invocation of `deploy` that has arguments,
//! and `** rm -rf **` covers any command containing `rm -rf`.
//!
//! A pattern that fails to parse matches nothing. [`matches`] never panics
//! and never reports an error to its caller.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default upper bound on the byte length of a pattern.
pub const DEFAULT_MAX_PATTERN_LEN: usize = 1024;

/// Why a pattern was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,

    #[error("pattern is {len} bytes, limit is {limit}")]
    TooLong { len: usize, limit: usize },

    #[error("pattern contains control character U+{0:04X}")]
    ControlCharacter(u32),

    #[error("unterminated alternative group in token {0:?}")]
    UnterminatedAlternatives(String),

    #[error("empty alternative in token {0:?}")]
    EmptyAlternative(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Glob(Vec<char>),
    One,
    Tail,
    Many,
    Alternatives(Vec<String>),
}

impl Token {
    fn matches_one(&self, word: &str) -> bool {
        match self {
            Token::Literal(lit) => lit == word,
            Token::Glob(glob) => glob_token(glob, word),
            Token::One | Token::Tail => true,
            Token::Alternatives(alts) => alts.iter().any(|a| a == word),
            Token::Many => true,
        }
    }
}

/// A parsed command pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPattern {
    source: String,
    tokens: Vec<Token>,
}

impl CommandPattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        Self::parse_with_limit(pattern, DEFAULT_MAX_PATTERN_LEN)
    }

    pub fn parse_with_limit(pattern: &str, limit: usize) -> Result<Self, PatternError> {
        if pattern.len() > limit {
            return Err(PatternError::TooLong {
                len: pattern.len(),
                limit,
            });
        }
        if let Some(c) = pattern.chars().find(|c| c.is_control() && !c.is_whitespace()) {
            return Err(PatternError::ControlCharacter(c as u32));
        }

        let raw: Vec<&str> = pattern.split_whitespace().collect();
        if raw.is_empty() {
            return Err(PatternError::Empty);
        }

        let last = raw.len() - 1;
        let tokens = raw
            .iter()
            .enumerate()
            .map(|(i, t)| parse_token(t, i == last))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source: pattern.to_string(),
            tokens,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Does `command` belong to this pattern?
    pub fn matches(&self, command: &str) -> bool {
        let words: Vec<&str> = command.split_whitespace().collect();
        let nc = words.len();

        // next[j]: tokens[i+1..] matches words[j..]
        let mut next = vec![false; nc + 1];
        next[nc] = true;
        let mut cur = vec![false; nc + 1];

        for token in self.tokens.iter().rev() {
            for j in (0..=nc).rev() {
                cur[j] = match token {
                    Token::Many => next[j] || (j < nc && cur[j + 1]),
                    // Tail is always the final token.
                    Token::Tail => j < nc,
                    _ => j < nc && token.matches_one(words[j]) && next[j + 1],
                };
            }
            std::mem::swap(&mut next, &mut cur);
        }

        next[0]
    }
}

impl FromStr for CommandPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CommandPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_token(token: &str, is_last: bool) -> Result<Token, PatternError> {
    match token {
        "**" => return Ok(Token::Many),
        "*" if is_last => return Ok(Token::Tail),
        "*" => return Ok(Token::One),
        _ => {}
    }

    if let Some(rest) = token.strip_prefix('{') {
        let inner = rest
            .strip_suffix('}')
            .ok_or_else(|| PatternError::UnterminatedAlternatives(token.to_string()))?;
        let alts: Vec<String> = inner.split(',').map(str::to_string).collect();
        if alts.iter().any(|a| a.is_empty() || a.contains(['{', '}'])) {
            return Err(PatternError::EmptyAlternative(token.to_string()));
        }
        return Ok(Token::Alternatives(alts));
    }

    if token.contains(['*', '?']) {
        Ok(Token::Glob(token.chars().collect()))
    } else {
        Ok(Token::Literal(token.to_string()))
    }
}

/// In-token wildcard match with single-star backtracking.
fn glob_token(glob: &[char], word: &str) -> bool {
    let text: Vec<char> = word.chars().collect();
    let (mut g, mut t) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if g < glob.len() && (glob[g] == '?' || glob[g] == text[t]) {
            g += 1;
            t += 1;
        } else if g < glob.len() && glob[g] == '*' {
            star = Some((g, t));
            g += 1;
        } else if let Some((sg, st)) = star {
            g = sg + 1;
            t = st + 1;
            star = Some((sg, st + 1));
        } else {
            return false;
        }
    }

    glob[g..].iter().all(|c| *c == '*')
}

/// Does `command` satisfy `pattern`? Malformed patterns match nothing.
pub fn matches(pattern: &str, command: &str) -> bool {
    match CommandPattern::parse(pattern) {
        Ok(p) => p.matches(command),
        Err(_) => false,
    }
}
