//! Engine error type.
//!
//! One typed enum covers every failure kind the engine can surface:
//! parse failures, predicate validation failures, index-backend
//! failures, and defensively-caught invariant violations. None of
//! these are ever downgraded to a logged warning and swallowed — see
//! the module docs on [`crate::execution`] for how errors propagate
//! through the threaded evaluators.

use std::ops::Range;

/// Where in the query text a parse error occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl From<Range<usize>> for Span {
    fn from(r: Range<usize>) -> Self {
        Span { start: r.start, end: r.end }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// Malformed query text; `span` marks the offending slice.
    #[error("parse error at {span:?}: {message}")]
    Parse { message: String, span: Span },

    /// A percentile predicate with `p` outside `(0, 1]` or an
    /// unrecognized comparator.
    #[error("invalid predicate: {0}")]
    InvalidPredicate(String),

    /// A `name(...)` predicate with `k < 0`.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A failure surfaced by one of the three index backends.
    #[error("{index} index error: {message}")]
    Index { index: IndexKind, message: String },

    /// An invariant the engine itself is responsible for maintaining
    /// was violated (e.g. a node missing its write group). Indicates a
    /// bug in the optimizer or annotator, never bad input.
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Keyword,
    Percentile,
    Name,
}

impl std::fmt::Display for IndexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Keyword => "keyword",
            Self::Percentile => "percentile",
            Self::Name => "name",
        };
        write!(f, "{s}")
    }
}

impl EngineError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn index(kind: IndexKind, message: impl Into<String>) -> Self {
        Self::Index { index: kind, message: message.into() }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
