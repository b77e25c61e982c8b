//! Shell-style wildcard matching for tool names.
//!
//! | Pattern | Matches |
//! |---------|---------|
//! | `*` | everything |
//! | `read_file` | exactly `read_file` |
//! | `*delete*` | any name containing `delete` |
//! | `db_?` | `db_` plus one character |
//!
//! Matching ignores case, so `*delete*` also catches `Delete_User`.

use regex::Regex;

use crate::models::Result;

/// A compiled wildcard pattern.
#[derive(Debug, Clone)]
pub enum Wildcard {
    Any,
    Exact(String),
    Pattern(Regex),
}

impl Wildcard {
    /// Compile a pattern. Literal segments are regex-escaped.
    pub fn new(pattern: &str) -> Result<Self> {
        if pattern == "*" {
            return Ok(Self::Any);
        }
        if !pattern.contains(['*', '?']) {
            return Ok(Self::Exact(pattern.to_lowercase()));
        }

        let mut source = String::with_capacity(pattern.len() + 8);
        source.push_str("(?i)^");
        let mut literal = String::new();
        for c in pattern.chars() {
            match c {
                '*' | '?' => {
                    source.push_str(&regex::escape(&literal));
                    literal.clear();
                    source.push_str(if c == '*' { ".*" } else { "." });
                }
                _ => literal.push(c),
            }
        }
        source.push_str(&regex::escape(&literal));
        source.push('$');

        Ok(Self::Pattern(Regex::new(&source)?))
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(exact) => *exact == name.to_lowercase(),
            Self::Pattern(regex) => regex.is_match(name),
        }
    }
}

/// Compile a list of patterns.
pub fn compile_all(patterns: &[String]) -> Result<Vec<Wildcard>> {
    patterns.iter().map(|p| Wildcard::new(p)).collect()
}

/// One-shot match. Invalid patterns never match.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    Wildcard::new(pattern).is_ok_and(|w| w.matches(name))
}
