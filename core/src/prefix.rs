//! Instruction prefixes for asymmetric retrieval models.
//!
//! E5-style encoders are trained with `query: ` in front of search queries and `passage: ` in
//! front of documents. Any mode other than `"query"` is treated as a passage.

use std::fmt;

pub const QUERY_PREFIX: &str = "query: ";
pub const PASSAGE_PREFIX: &str = "passage: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrefixMode {
    Query,
    #[default]
    Passage,
}

impl PrefixMode {
    pub fn prefix(&self) -> &'static str {
        match self {
            PrefixMode::Query => QUERY_PREFIX,
            PrefixMode::Passage => PASSAGE_PREFIX,
        }
    }
}

impl From<&str> for PrefixMode {
    fn from(value: &str) -> Self {
        match value {
            "query" => PrefixMode::Query,
            _ => PrefixMode::Passage,
        }
    }
}

impl fmt::Display for PrefixMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PrefixMode::Query => write!(f, "query"),
            PrefixMode::Passage => write!(f, "passage"),
        }
    }
}

/// Prepend the mode's prefix to every text, keeping order
pub fn prefix<S: AsRef<str>>(texts: &[S], mode: PrefixMode) -> Vec<String> {
    let prefix = mode.prefix();
    texts
        .iter()
        .map(|text| {
            let text = text.as_ref();
            let mut prefixed = String::with_capacity(prefix.len() + text.len());
            prefixed.push_str(prefix);
            prefixed.push_str(text);
            prefixed
        })
        .collect()
}
