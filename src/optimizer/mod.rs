//! Query optimizer.
//!
//! Three independent, idempotent rewrite rules, applied once each in a
//! fixed order:
//!
//! 1. [`split_percentile_conjunctions`] — inside a `ColScope`, flatten a
//!    conjunction of `PercentileLeaf`s into a balanced binary tree so a
//!    parallel evaluator can dispatch each percentile independently.
//! 2. [`merge_keywords`] — fuse adjacent `KeywordLeaf`/`NOT KeywordLeaf`
//!    siblings under a single AND/OR into one native full-text query.
//! 3. [`sort_siblings`] — optional cost-based stable sibling ordering
//!    (ascending under AND, descending under OR).
//!
//! Rule 3 runs after rule 2 specifically so sorting never reorders
//! leaves that are still eligible for keyword fusion — by the time
//! siblings are sorted, adjacent keyword runs have already been fused
//! into single nodes.

use crate::ast::{AstNode, NodeId};

/// Tunables the annotator/config layer can toggle; cost sorting is the
/// only rule with a disable switch (the other two are always sound and
/// strictly reduce downstream work).
pub struct Optimizer {
    enable_cost_sorting: bool,
}

impl Optimizer {
    pub fn new(enable_cost_sorting: bool) -> Self {
        Self { enable_cost_sorting }
    }

    pub fn optimize(&self, ast: AstNode) -> AstNode {
        let mut next_id = max_node_id(&ast) + 1;
        let ast = split_percentile_conjunctions(ast, &mut next_id);
        let ast = merge_keywords(ast, &mut next_id);
        if self.enable_cost_sorting {
            sort_siblings(ast)
        } else {
            ast
        }
    }
}

fn fresh(next_id: &mut u32) -> NodeId {
    let id = NodeId(*next_id);
    *next_id += 1;
    id
}

fn max_node_id(ast: &AstNode) -> u32 {
    let mut max = ast.node_id().0;
    for child in ast.children() {
        max = max.max(max_node_id(child));
    }
    max
}

/// Rule 1. Splits an n-ary conjunction of `PercentileLeaf`s (n >= 2)
/// into a balanced binary tree of `Conjunction`s. AND is associative
/// and commutative over sets, so this changes nothing but the shape.
fn split_percentile_conjunctions(ast: AstNode, next_id: &mut u32) -> AstNode {
    match ast {
        AstNode::Query(id, child) => {
            AstNode::Query(id, Box::new(split_percentile_conjunctions(*child, next_id)))
        }
        AstNode::ColScope(id, child) => {
            AstNode::ColScope(id, Box::new(split_percentile_conjunctions(*child, next_id)))
        }
        AstNode::Negation(id, child) => {
            AstNode::Negation(id, Box::new(split_percentile_conjunctions(*child, next_id)))
        }
        AstNode::Conjunction(id, children) => {
            let children: Vec<AstNode> = children
                .into_iter()
                .map(|c| split_percentile_conjunctions(c, next_id))
                .collect();
            if children.len() >= 2
                && children.iter().all(|c| matches!(c, AstNode::PercentileLeaf(..)))
            {
                build_balanced_and(children, next_id)
            } else {
                AstNode::Conjunction(id, children)
            }
        }
        AstNode::Disjunction(id, children) => {
            let children = children
                .into_iter()
                .map(|c| split_percentile_conjunctions(c, next_id))
                .collect();
            AstNode::Disjunction(id, children)
        }
        leaf @ (AstNode::KeywordLeaf(..) | AstNode::PercentileLeaf(..) | AstNode::NameLeaf(..)) => leaf,
    }
}

fn build_balanced_and(mut nodes: Vec<AstNode>, next_id: &mut u32) -> AstNode {
    debug_assert!(nodes.len() >= 2);
    while nodes.len() > 1 {
        let mut next_level = Vec::with_capacity(nodes.len().div_ceil(2));
        let mut iter = nodes.into_iter();
        while let Some(a) = iter.next() {
            match iter.next() {
                Some(b) => next_level.push(AstNode::Conjunction(fresh(next_id), vec![a, b])),
                None => next_level.push(a),
            }
        }
        nodes = next_level;
    }
    nodes.pop().expect("loop invariant: at least one node remains")
}

/// Rule 2. Within a single AND/OR's direct children, fuses maximal
/// runs (length >= 2) of `KeywordLeaf`/`Negation(KeywordLeaf)` into a
/// single `KeywordLeaf` whose text is `(t1) OP (t2) ...`, where a
/// negated member contributes `-(t)`. A lone negated keyword with no
/// adjacent keyword peer is left untouched.
fn merge_keywords(ast: AstNode, next_id: &mut u32) -> AstNode {
    match ast {
        AstNode::Query(id, child) => AstNode::Query(id, Box::new(merge_keywords(*child, next_id))),
        AstNode::ColScope(id, child) => {
            AstNode::ColScope(id, Box::new(merge_keywords(*child, next_id)))
        }
        AstNode::Negation(id, child) => {
            AstNode::Negation(id, Box::new(merge_keywords(*child, next_id)))
        }
        AstNode::Conjunction(_, children) => {
            fuse_run(children, next_id, "AND", |c, nid| AstNode::Conjunction(nid, c))
        }
        AstNode::Disjunction(_, children) => {
            fuse_run(children, next_id, "OR", |c, nid| AstNode::Disjunction(nid, c))
        }
        leaf @ (AstNode::KeywordLeaf(..) | AstNode::PercentileLeaf(..) | AstNode::NameLeaf(..)) => leaf,
    }
}

/// Recurses into children, fuses keyword runs, and rebuilds the
/// junction via `rebuild`. If fusion collapses the junction to a
/// single remaining child, that child is returned directly (the
/// junction wrapper is dropped to preserve the arity >= 2 invariant).
fn fuse_run(
    children: Vec<AstNode>,
    next_id: &mut u32,
    op_text: &str,
    rebuild: impl FnOnce(Vec<AstNode>, NodeId) -> AstNode,
) -> AstNode {
    let children: Vec<AstNode> = children.into_iter().map(|c| merge_keywords(c, next_id)).collect();

    let mut fused = Vec::with_capacity(children.len());
    let mut run: Vec<(bool, String)> = Vec::new();

    let flush = |run: &mut Vec<(bool, String)>, fused: &mut Vec<AstNode>, next_id: &mut u32| {
        if run.is_empty() {
            return;
        }
        if run.len() == 1 {
            let (negated, text) = run.remove(0);
            if negated {
                fused.push(AstNode::Negation(
                    fresh(next_id),
                    Box::new(AstNode::KeywordLeaf(fresh(next_id), text)),
                ));
            } else {
                fused.push(AstNode::KeywordLeaf(fresh(next_id), text));
            }
        } else {
            let merged_text = run
                .drain(..)
                .map(|(negated, text)| if negated { format!("-({text})") } else { format!("({text})") })
                .collect::<Vec<_>>()
                .join(&format!(" {op_text} "));
            fused.push(AstNode::KeywordLeaf(fresh(next_id), merged_text));
        }
    };

    for child in children {
        match keyword_like(&child) {
            Some((negated, text)) => run.push((negated, text)),
            None => {
                flush(&mut run, &mut fused, next_id);
                fused.push(child);
            }
        }
    }
    flush(&mut run, &mut fused, next_id);

    match fused.len() {
        1 => fused.pop().expect("checked len == 1"),
        _ => {
            let id = fresh(next_id);
            rebuild(fused, id)
        }
    }
}

fn keyword_like(node: &AstNode) -> Option<(bool, String)> {
    match node {
        AstNode::KeywordLeaf(_, text) => Some((false, text.clone())),
        AstNode::Negation(_, inner) => match inner.as_ref() {
            AstNode::KeywordLeaf(_, text) => Some((true, text.clone())),
            _ => None,
        },
        _ => None,
    }
}

/// Rule 3. Reorders each junction's direct children by a static cost
/// estimate: ascending under AND, descending under OR. Stable, so
/// equal-cost siblings keep their parse order.
fn sort_siblings(ast: AstNode) -> AstNode {
    match ast {
        AstNode::Query(id, child) => AstNode::Query(id, Box::new(sort_siblings(*child))),
        AstNode::ColScope(id, child) => AstNode::ColScope(id, Box::new(sort_siblings(*child))),
        AstNode::Negation(id, child) => AstNode::Negation(id, Box::new(sort_siblings(*child))),
        AstNode::Conjunction(id, children) => {
            let mut children: Vec<AstNode> = children.into_iter().map(sort_siblings).collect();
            children.sort_by_key(cost);
            AstNode::Conjunction(id, children)
        }
        AstNode::Disjunction(id, children) => {
            let mut children: Vec<AstNode> = children.into_iter().map(sort_siblings).collect();
            children.sort_by(|a, b| cost(b).cmp(&cost(a)));
            AstNode::Disjunction(id, children)
        }
        leaf @ (AstNode::KeywordLeaf(..) | AstNode::PercentileLeaf(..) | AstNode::NameLeaf(..)) => leaf,
    }
}

fn cost(node: &AstNode) -> u32 {
    match node {
        AstNode::KeywordLeaf(..) => 1,
        AstNode::NameLeaf(..) => 2,
        AstNode::PercentileLeaf(..) => 4,
        AstNode::ColScope(_, child) => cost(child) + 1,
        AstNode::Negation(_, child) => cost(child),
        AstNode::Conjunction(_, children) | AstNode::Disjunction(_, children) => {
            children.iter().map(cost).sum()
        }
        AstNode::Query(_, child) => cost(child),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::{and, col, not, or, pp, query};
    use crate::ast::CmpOp;

    #[test]
    fn splits_percentile_conjunction_into_balanced_tree() {
        let leaves: Vec<AstNode> = (0..4)
            .map(|i| pp(0.5, CmpOp::Ge, i as f64))
            .collect();
        let ast = query(col(and(leaves)));
        let opt = Optimizer::new(false);
        let result = opt.optimize(ast);

        fn count_percentile_leaves(n: &AstNode) -> usize {
            match n {
                AstNode::PercentileLeaf(..) => 1,
                _ => n.children().iter().map(count_percentile_leaves).sum(),
            }
        }
        assert_eq!(count_percentile_leaves(&result), 4);

        fn max_depth(n: &AstNode) -> usize {
            match n {
                AstNode::PercentileLeaf(..) => 0,
                _ => 1 + n.children().iter().map(max_depth).max().unwrap_or(0),
            }
        }
        // balanced tree over 4 leaves should have depth 2, not 3 (a left fold would)
        let col_body = match &result {
            AstNode::Query(_, q) => match q.as_ref() {
                AstNode::ColScope(_, inner) => inner.as_ref(),
                _ => panic!("expected ColScope"),
            },
            _ => panic!("expected Query"),
        };
        assert_eq!(max_depth(col_body), 2);
    }

    #[test]
    fn merges_adjacent_keyword_leaves() {
        use crate::ast::builders::kw;
        let ast = query(and(vec![kw("a"), kw("b"), kw("c")]));
        let opt = Optimizer::new(false);
        let result = opt.optimize(ast);
        let AstNode::Query(_, child) = result else { panic!() };
        match *child {
            AstNode::KeywordLeaf(_, text) => assert_eq!(text, "(a) AND (b) AND (c)"),
            other => panic!("expected fused KeywordLeaf, got {other:?}"),
        }
    }

    #[test]
    fn lone_negated_keyword_is_not_fused() {
        use crate::ast::builders::kw;
        let ast = query(and(vec![kw("a"), not(kw("b"))]));
        let opt = Optimizer::new(false);
        let result = opt.optimize(ast);
        let AstNode::Query(_, child) = result else { panic!() };
        match *child {
            AstNode::KeywordLeaf(_, text) => assert_eq!(text, "(a) AND -(b)"),
            other => panic!("expected fused KeywordLeaf, got {other:?}"),
        }
    }

    #[test]
    fn negated_keyword_with_no_peer_is_untouched() {
        use crate::ast::builders::{kw, name};
        let ast = query(and(vec![not(kw("a")), col(name("x", 0))]));
        let opt = Optimizer::new(false);
        let result = opt.optimize(ast);
        let AstNode::Query(_, child) = result else { panic!() };
        let AstNode::Conjunction(_, children) = *child else { panic!("expected Conjunction") };
        assert_eq!(children.len(), 2);
        assert!(matches!(children[0], AstNode::Negation(..)));
    }

    #[test]
    fn cost_sort_orders_ascending_under_and() {
        use crate::ast::builders::{kw, name};
        let ast = query(and(vec![col(name("x", 1)), kw("a")]));
        let opt = Optimizer::new(true);
        let result = opt.optimize(ast);
        let AstNode::Query(_, child) = result else { panic!() };
        let AstNode::Conjunction(_, children) = *child else { panic!("expected Conjunction") };
        assert!(matches!(children[0], AstNode::KeywordLeaf(..)));
    }

    #[test]
    fn cost_sort_orders_descending_under_or() {
        use crate::ast::builders::{kw, name};
        let ast = query(or(vec![kw("a"), col(name("x", 1))]));
        let opt = Optimizer::new(true);
        let result = opt.optimize(ast);
        let AstNode::Query(_, child) = result else { panic!() };
        let AstNode::Disjunction(_, children) = *child else { panic!("expected Disjunction") };
        assert!(matches!(children[0], AstNode::ColScope(..)));
    }

    #[test]
    fn node_ids_remain_unique_after_rewrite() {
        use crate::ast::builders::kw;
        let leaves: Vec<AstNode> = (0..5).map(|i| pp(0.5, CmpOp::Ge, i as f64)).collect();
        let ast = query(and(vec![col(and(leaves)), kw("x")]));
        let opt = Optimizer::new(true);
        let result = opt.optimize(ast);

        fn collect_ids(n: &AstNode, out: &mut Vec<u32>) {
            out.push(n.node_id().0);
            for c in n.children() {
                collect_ids(c, out);
            }
        }
        let mut ids = Vec::new();
        collect_ids(&result, &mut ids);
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(ids.len(), sorted.len(), "duplicate NodeId after rewrite");
    }
}
