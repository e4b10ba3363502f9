//! Fluent builders for constructing AST nodes without hand-assigning
//! [`NodeId`]s, used throughout the optimizer/evaluator test suites.
//!
//! ```
//! use dsquery::ast::builders::{and, kw, col, pp};
//! use dsquery::ast::CmpOp;
//!
//! let tree = and(vec![kw("germany"), col(pp(0.5, CmpOp::Ge, 20.0))]);
//! ```

use super::{AstNode, CmpOp, NodeId};
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_ID: AtomicU32 = AtomicU32::new(0);

fn fresh_id() -> NodeId {
    NodeId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

pub fn kw(text: &str) -> AstNode {
    AstNode::KeywordLeaf(fresh_id(), text.to_string())
}

pub fn pp(p: f64, cmp: CmpOp, reference: f64) -> AstNode {
    AstNode::PercentileLeaf(fresh_id(), p, cmp, reference)
}

pub fn name(text: &str, k: i64) -> AstNode {
    AstNode::NameLeaf(fresh_id(), text.to_string(), k)
}

pub fn and(children: Vec<AstNode>) -> AstNode {
    AstNode::Conjunction(fresh_id(), children)
}

pub fn or(children: Vec<AstNode>) -> AstNode {
    AstNode::Disjunction(fresh_id(), children)
}

pub fn not(child: AstNode) -> AstNode {
    AstNode::Negation(fresh_id(), Box::new(child))
}

pub fn col(child: AstNode) -> AstNode {
    AstNode::ColScope(fresh_id(), Box::new(child))
}

pub fn query(child: AstNode) -> AstNode {
    AstNode::Query(fresh_id(), Box::new(child))
}
