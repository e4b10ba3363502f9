//! Group annotator.
//!
//! Assigns every AST node a *write group* (the slot its evaluated
//! result is deposited into) and an ordered *read-group set* (the
//! slots whose contents may later be used as a filter when evaluating
//! that node). This is the proof, encoded as a slot identifier, that an
//! intermediate result may be used to filter a sibling only when the
//! filtered leaf's truth is not required outside the conjunctive chain
//! that produced it.
//!
//! Visiting is top-down, starting at the root with write group 0 and
//! read-group set `{0}`:
//!
//! - `Query`, `Conjunction`, and (under the sequential evaluator)
//!   `ColScope` pass their write/read groups down to every child
//!   unchanged.
//! - `Disjunction` and `Negation` give each child a fresh write group;
//!   the child's read-group set is that fresh group prepended to the
//!   parent's read-group set.
//! - Under the parallel evaluator, `ColScope` is treated like
//!   `Disjunction` so percentile predicates can be dispatched
//!   concurrently while keeping filter isolation.

use crate::ast::{AstNode, NodeId};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub u32);

pub const ROOT_GROUP: GroupId = GroupId(0);

#[derive(Debug, Clone)]
pub struct Annotation {
    pub write_group: GroupId,
    /// Ordered, most-specific-first; may contain duplicates-free groups
    /// only (each group appears at most once per node).
    pub read_groups: Vec<GroupId>,
}

/// Side table of per-node group annotations plus which groups are
/// actually consulted by a percentile predicate anywhere in the tree.
#[derive(Debug, Default)]
pub struct GroupAnnotations {
    by_node: HashMap<NodeId, Annotation>,
    usage_counts: HashMap<GroupId, u32>,
}

impl GroupAnnotations {
    pub fn get(&self, id: NodeId) -> Option<&Annotation> {
        self.by_node.get(&id)
    }

    pub fn write_group(&self, id: NodeId) -> GroupId {
        self.get(id).map_or(ROOT_GROUP, |a| a.write_group)
    }

    pub fn read_groups(&self, id: NodeId) -> &[GroupId] {
        self.get(id).map_or(&[], |a| &a.read_groups)
    }

    pub fn is_used(&self, group: GroupId) -> bool {
        self.usage_counts.get(&group).copied().unwrap_or(0) > 0
    }

    pub fn usage_count(&self, group: GroupId) -> u32 {
        self.usage_counts.get(&group).copied().unwrap_or(0)
    }
}

struct Annotator {
    parallel_col_scope: bool,
    next_group: u32,
    out: GroupAnnotations,
}

impl Annotator {
    fn fresh_group(&mut self) -> GroupId {
        self.next_group += 1;
        GroupId(self.next_group - 1)
    }

    fn record(&mut self, id: NodeId, write_group: GroupId, read_groups: &[GroupId]) {
        self.out.by_node.insert(
            id,
            Annotation { write_group, read_groups: read_groups.to_vec() },
        );
    }

    fn visit(&mut self, node: &AstNode, write_group: GroupId, read_groups: Vec<GroupId>) {
        self.record(node.node_id(), write_group, &read_groups);
        match node {
            AstNode::Query(_, child) => {
                self.visit(child, write_group, read_groups);
            }
            AstNode::Conjunction(_, children) => {
                for child in children {
                    self.visit(child, write_group, read_groups.clone());
                }
            }
            AstNode::ColScope(_, child) => {
                if self.parallel_col_scope {
                    let fresh = self.fresh_group();
                    let mut child_read = vec![fresh];
                    child_read.extend(read_groups.iter().copied());
                    self.visit(child, fresh, child_read);
                } else {
                    self.visit(child, write_group, read_groups);
                }
            }
            AstNode::Disjunction(_, children) => {
                for child in children {
                    let fresh = self.fresh_group();
                    let mut child_read = vec![fresh];
                    child_read.extend(read_groups.iter().copied());
                    self.visit(child, fresh, child_read);
                }
            }
            AstNode::Negation(_, child) => {
                let fresh = self.fresh_group();
                let mut child_read = vec![fresh];
                child_read.extend(read_groups.iter().copied());
                self.visit(child, fresh, child_read);
            }
            AstNode::PercentileLeaf(..) => {
                for group in &read_groups {
                    *self.out.usage_counts.entry(*group).or_insert(0) += 1;
                }
            }
            AstNode::KeywordLeaf(..) | AstNode::NameLeaf(..) => {}
        }
    }
}

/// Annotate an AST. `parallel_col_scope` should be `true` when the
/// evaluator that will consume this annotation dispatches `ColScope`
/// children concurrently (the threaded evaluator variants).
pub fn annotate(ast: &AstNode, parallel_col_scope: bool) -> GroupAnnotations {
    let mut annotator = Annotator {
        parallel_col_scope,
        next_group: 1,
        out: GroupAnnotations::default(),
    };
    annotator.visit(ast, ROOT_GROUP, vec![ROOT_GROUP]);
    annotator.out
}
