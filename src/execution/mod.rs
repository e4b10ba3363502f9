//! Query evaluators.
//!
//! Four variants share one operator semantics (see [`NodeValue`] and
//! [`junction_doc`]/[`junction_col`] below) and differ only in how much
//! concurrency and filter propagation they add on top:
//!
//! - [`simple`]: postorder, no filter propagation, no concurrency.
//! - [`prefiltering`]: postorder, propagates intermediate doc/col IDs as
//!   histogram filters into percentile predicates (see [`slots`]).
//! - [`threaded`]: leaves dispatched to a worker pool, combinators await.
//! - [`threaded_prefiltering`]: both at once — a percentile leaf may
//!   block on a still-running sibling's future to build its filter.
//!
//! None of the four mutate shared state other than the per-query score
//! map and (for the prefiltering variants) the per-group slot store;
//! both are scoped to a single [`crate::engine::QueryEngine::query`] call.

pub mod cache;
pub mod highlight;
pub mod prefiltering;
pub mod scoring;
pub mod simple;
pub mod slots;
pub mod threaded;
pub mod threaded_prefiltering;

use crate::ast::{CmpOp, ColResult, DocResult, Highlights};
use crate::error::EngineError;
use crate::ids::{ColId, DocId, Metadata};

/// `p` must lie in `(0, 1]`; `cmp` is already a validated [`CmpOp`] by
/// construction (the parser rejects anything else), so only the
/// percentile bound needs a runtime check.
pub fn validate_percentile(p: f64, _cmp: CmpOp) -> Result<(), EngineError> {
    if p > 0.0 && p <= 1.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidPredicate(format!("percentile must be in (0, 1], got {p}")))
    }
}

pub fn validate_k(k: i64) -> Result<(), EngineError> {
    if k < 0 {
        Err(EngineError::InvalidArgument(format!("name search k must be >= 0, got {k}")))
    } else {
        Ok(())
    }
}

/// Either shape of intermediate result an AST subtree can produce. The
/// grammar statically determines which shape a given subtree has (only
/// code under a `ColScope` ever produces `Col`), but the AST itself is
/// a single tagged union, so the evaluators discover the shape at
/// evaluation time by inspecting a node's own result (or, for a
/// junction, its first child's).
#[derive(Debug, Clone)]
pub enum NodeValue {
    Doc(DocResult),
    Col(ColResult),
}

impl NodeValue {
    pub fn expect_doc(self, ctx: &str) -> Result<DocResult, EngineError> {
        match self {
            Self::Doc(d) => Ok(d),
            Self::Col(_) => Err(EngineError::internal(format!("{ctx}: expected a document result, found a column result"))),
        }
    }

    pub fn expect_col(self, ctx: &str) -> Result<ColResult, EngineError> {
        match self {
            Self::Col(c) => Ok(c),
            Self::Doc(_) => Err(EngineError::internal(format!("{ctx}: expected a column result, found a document result"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JunctionOp {
    And,
    Or,
}

pub fn intersect_sorted<T: Ord + Copy>(a: &[T], b: &[T]) -> Vec<T> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

pub fn union_sorted<T: Ord + Copy>(a: &[T], b: &[T]) -> Vec<T> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Complement of a sorted `DocId`/`ColId` array against `[0,
/// universe_size)`. `ids` must already be sorted and deduplicated.
pub fn complement_ids<T: From<u32> + Copy>(ids: &[T], universe_size: u32, get: impl Fn(T) -> u32) -> Vec<T> {
    let mut out = Vec::with_capacity(universe_size as usize - ids.len());
    let mut idx = 0;
    for n in 0..universe_size {
        if idx < ids.len() && get(ids[idx]) == n {
            idx += 1;
        } else {
            out.push(T::from(n));
        }
    }
    out
}

/// Combine a list of `DocResult`s with AND/OR, merging highlights.
pub fn junction_doc(mut items: Vec<DocResult>, op: JunctionOp, enable_highlighting: bool, metadata: &Metadata) -> DocResult {
    debug_assert!(items.len() >= 2, "junction must have at least two items");
    let mut acc = items.remove(0);
    for item in items {
        let combined_docs = match op {
            JunctionOp::And => intersect_sorted(&acc.docs, &item.docs),
            JunctionOp::Or => union_sorted(&acc.docs, &item.docs),
        };
        let combined_highlights = if enable_highlighting {
            highlight::merge_doc_highlights(&acc.highlights, &item.highlights, &combined_docs, metadata)
        } else {
            Highlights::empty()
        };
        acc = DocResult { docs: combined_docs, highlights: combined_highlights };
    }
    acc
}

/// Combine a list of `ColResult`s with AND/OR.
pub fn junction_col(mut items: Vec<ColResult>, op: JunctionOp) -> ColResult {
    debug_assert!(items.len() >= 2, "junction must have at least two items");
    let mut acc = items.remove(0);
    for item in items {
        acc.cols = match op {
            JunctionOp::And => intersect_sorted(&acc.cols, &item.cols),
            JunctionOp::Or => union_sorted(&acc.cols, &item.cols),
        };
    }
    acc
}

/// Combine already-evaluated children of a `Conjunction`/`Disjunction`.
/// All children of a junction share the same result shape by
/// construction (the grammar never mixes `ColResult` and `DocResult`
/// siblings), so the first child's shape decides which combinator runs.
pub(crate) fn combine_values(values: Vec<NodeValue>, op: JunctionOp, enable_highlighting: bool, metadata: &Metadata) -> Result<NodeValue, EngineError> {
    match values.first() {
        Some(NodeValue::Doc(_)) => {
            let docs = values.into_iter().map(|v| v.expect_doc("junction")).collect::<Result<Vec<_>, _>>()?;
            Ok(NodeValue::Doc(junction_doc(docs, op, enable_highlighting, metadata)))
        }
        Some(NodeValue::Col(_)) => {
            let cols = values.into_iter().map(|v| v.expect_col("junction")).collect::<Result<Vec<_>, _>>()?;
            Ok(NodeValue::Col(junction_col(cols, op)))
        }
        None => Err(EngineError::internal("junction with no children")),
    }
}

pub(crate) fn negate_docs(docs: &[DocId], num_docs: u32) -> Vec<DocId> {
    complement_ids(docs, num_docs, DocId::get)
}

pub(crate) fn negate_cols(cols: &[ColId], num_cols: u32) -> Vec<ColId> {
    complement_ids(cols, num_cols, ColId::get)
}
