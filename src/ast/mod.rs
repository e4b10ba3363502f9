//! Query AST — Abstract Syntax Tree types
//!
//! The node palette is fixed and shallow, so it is modeled as a tagged
//! enum with a single visitor-style match rather than an inheritance
//! hierarchy (see the optimizer, group annotator, and evaluators, which
//! all pattern-match on [`AstNode`] directly).
//!
//! A `ColScope` body yields `ColId`s; everything outside a `ColScope`
//! yields `DocId`s. This type distinction is a static property of the
//! grammar in [`crate::parser`], not something tracked at runtime.

pub mod builders;

use crate::ids::{ColId, DocId};
use std::collections::HashMap;

/// Comparator for a percentile predicate: `ge`/`gt`/`le`/`lt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Ge,
    Gt,
    Le,
    Lt,
}

impl CmpOp {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ge" => Some(Self::Ge),
            "gt" => Some(Self::Gt),
            "le" => Some(Self::Le),
            "lt" => Some(Self::Lt),
            _ => None,
        }
    }

    pub fn apply(self, value: f64, reference: f64) -> bool {
        match self {
            Self::Ge => value >= reference,
            Self::Gt => value > reference,
            Self::Le => value <= reference,
            Self::Lt => value < reference,
        }
    }
}

/// Stable identity assigned to every AST node at parse time. Used as
/// the key into the group-annotation side tables (see
/// [`crate::groups`]) instead of AST back-references, so optimizer
/// rewrites can freely rebuild subtrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

/// A query AST node.
///
/// `Conjunction`/`Disjunction` are n-ary (arity >= 2 by construction —
/// the parser and optimizer never emit a junction of arity < 2).
#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    Query(NodeId, Box<AstNode>),
    Conjunction(NodeId, Vec<AstNode>),
    Disjunction(NodeId, Vec<AstNode>),
    Negation(NodeId, Box<AstNode>),
    ColScope(NodeId, Box<AstNode>),
    KeywordLeaf(NodeId, String),
    PercentileLeaf(NodeId, f64, CmpOp, f64),
    NameLeaf(NodeId, String, i64),
}

impl AstNode {
    pub fn node_id(&self) -> NodeId {
        match self {
            Self::Query(id, _)
            | Self::Conjunction(id, _)
            | Self::Disjunction(id, _)
            | Self::Negation(id, _)
            | Self::ColScope(id, _)
            | Self::KeywordLeaf(id, _)
            | Self::PercentileLeaf(id, ..)
            | Self::NameLeaf(id, ..) => *id,
        }
    }

    /// Direct children, in order. Leaves have none.
    pub fn children(&self) -> &[AstNode] {
        match self {
            Self::Query(_, child) | Self::Negation(_, child) | Self::ColScope(_, child) => {
                std::slice::from_ref(child)
            }
            Self::Conjunction(_, children) | Self::Disjunction(_, children) => children,
            Self::KeywordLeaf(..) | Self::PercentileLeaf(..) | Self::NameLeaf(..) => &[],
        }
    }

    /// Whether this node evaluates to a `ColResult` (true) or a
    /// `DocResult` (false). A static property of the grammar: only the
    /// subtree under a `ColScope` (and `ColScope` itself, from the
    /// outside, is a `DocResult`-producing node) is column-shaped.
    pub fn is_column_shaped(&self) -> bool {
        matches!(self, Self::PercentileLeaf(..) | Self::NameLeaf(..))
    }
}

/// Per-(document, field) HTML snippets with `<mark>` spans, plus the
/// set of matching column IDs. See [`crate::execution::highlight`] for
/// how these merge across AND/OR.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Highlights {
    pub docs: HashMap<DocId, HashMap<String, String>>,
    pub cols: Vec<ColId>,
}

impl Highlights {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty() && self.cols.is_empty()
    }
}

/// Result of evaluating a `DocId`-shaped subtree: a sorted, deduplicated
/// array of document IDs plus accumulated highlights.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocResult {
    pub docs: Vec<DocId>,
    pub highlights: Highlights,
}

/// Result of evaluating a `ColId`-shaped subtree: a sorted,
/// deduplicated array of column IDs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColResult {
    pub cols: Vec<ColId>,
}
