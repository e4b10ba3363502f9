//! Threaded (concurrent, non-filter-propagating) evaluator.
//!
//! Dispatches the children of every `Conjunction`/`Disjunction` to
//! rayon's worker pool and lets them run concurrently; a combinator
//! simply waits for all of its children's results before combining
//! them, the same way `Future.result()` blocks in the original
//! thread-pool-based implementation this is grounded on. Leaf
//! predicate calls are pure, so the only shared mutable state is the
//! score map, guarded by a lock.

use super::scoring::ScoreMap;
use super::simple::{EvalOptions, Indices};
use super::{combine_values, negate_cols, negate_docs, validate_k, validate_percentile, NodeValue};
use crate::ast::{AstNode, ColResult, DocResult, Highlights};
use crate::error::EngineResult;
use crate::ids::{ColId, Metadata};
use parking_lot::Mutex;
use rayon::prelude::*;

pub fn evaluate(ast: &AstNode, indices: &Indices, metadata: &Metadata, options: &EvalOptions, pool: &rayon::ThreadPool) -> EngineResult<(DocResult, ScoreMap)> {
    let scores = Mutex::new(ScoreMap::new());
    let value = pool.install(|| eval_node(ast, indices, metadata, options, &scores))?;
    Ok((value.expect_doc("query result")?, scores.into_inner()))
}

fn eval_node(node: &AstNode, indices: &Indices, metadata: &Metadata, options: &EvalOptions, scores: &Mutex<ScoreMap>) -> EngineResult<NodeValue> {
    match node {
        AstNode::Query(_, child) => eval_node(child, indices, metadata, options, scores),

        AstNode::KeywordLeaf(_, text) => {
            let hit = indices.keyword.search(text, options.enable_highlighting, options.min_keyword_score, options.rank_keyword_by_score)?;
            scores.lock().add(&hit.doc_ids, &hit.scores);
            Ok(NodeValue::Doc(DocResult { docs: hit.doc_ids, highlights: Highlights { docs: hit.highlights, cols: vec![] } }))
        }

        AstNode::PercentileLeaf(_, p, cmp, reference) => {
            validate_percentile(*p, *cmp)?;
            let hists = indices.percentile.search(*p, *cmp, *reference, options.mode, None)?;
            Ok(NodeValue::Col(ColResult { cols: hists.into_iter().map(ColId::from).collect() }))
        }

        AstNode::NameLeaf(_, name, k) => {
            validate_k(*k)?;
            let cols = indices.name.search(name, *k, None)?;
            Ok(NodeValue::Col(ColResult { cols }))
        }

        AstNode::ColScope(_, child) => {
            let inner = eval_node(child, indices, metadata, options, scores)?.expect_col("col scope")?;
            let docs = metadata.cols_to_docs(&inner.cols);
            let highlights =
                if options.enable_highlighting { Highlights { docs: std::collections::HashMap::new(), cols: inner.cols } } else { Highlights::empty() };
            Ok(NodeValue::Doc(DocResult { docs, highlights }))
        }

        AstNode::Conjunction(_, children) | AstNode::Disjunction(_, children) => {
            let op = if matches!(node, AstNode::Conjunction(..)) { super::JunctionOp::And } else { super::JunctionOp::Or };
            let values: EngineResult<Vec<NodeValue>> =
                children.par_iter().map(|c| eval_node(c, indices, metadata, options, scores)).collect();
            combine_values(values?, op, options.enable_highlighting, metadata)
        }

        AstNode::Negation(_, child) => match eval_node(child, indices, metadata, options, scores)? {
            NodeValue::Doc(d) => Ok(NodeValue::Doc(DocResult { docs: negate_docs(&d.docs, metadata.num_docs()), highlights: Highlights::empty() })),
            NodeValue::Col(c) => Ok(NodeValue::Col(ColResult { cols: negate_cols(&c.cols, metadata.num_cols()) })),
        },
    }
}
