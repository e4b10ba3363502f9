//! Prefiltering evaluator.
//!
//! Same postorder walk as [`crate::execution::simple`], except every
//! node that produces a result first deposits it into its own write
//! group (see [`crate::execution::slots`]) before returning it upward.
//! A `PercentileLeaf` consults its read-group set against that store to
//! build a `HistId` filter, letting an already-evaluated AND-sibling
//! narrow the percentile index's search instead of scanning every
//! histogram.

use super::scoring::ScoreMap;
use super::simple::{EvalOptions, Indices};
use super::slots::{FilterLimits, IntermediateResultStore};
use super::{combine_values, negate_cols, negate_docs, validate_k, validate_percentile, NodeValue};
use crate::ast::{AstNode, ColResult, DocResult, Highlights};
use crate::error::EngineResult;
use crate::groups::GroupAnnotations;
use crate::ids::{ColId, Metadata};

struct Ctx<'a> {
    indices: &'a Indices<'a>,
    metadata: &'a Metadata,
    options: &'a EvalOptions,
    groups: &'a GroupAnnotations,
    limits: &'a FilterLimits,
    store: IntermediateResultStore,
    scores: ScoreMap,
}

pub fn evaluate(
    ast: &AstNode,
    indices: &Indices,
    metadata: &Metadata,
    options: &EvalOptions,
    groups: &GroupAnnotations,
    limits: &FilterLimits,
) -> EngineResult<(DocResult, ScoreMap)> {
    let mut ctx = Ctx { indices, metadata, options, groups, limits, store: IntermediateResultStore::new(), scores: ScoreMap::new() };
    let value = eval_node(ast, &mut ctx)?;
    Ok((value.expect_doc("query result")?, ctx.scores))
}

fn eval_node(node: &AstNode, ctx: &mut Ctx) -> EngineResult<NodeValue> {
    let write_group = ctx.groups.write_group(node.node_id());

    match node {
        AstNode::Query(_, child) => eval_node(child, ctx),

        AstNode::KeywordLeaf(_, text) => {
            let hit = ctx.indices.keyword.search(text, ctx.options.enable_highlighting, ctx.options.min_keyword_score, ctx.options.rank_keyword_by_score)?;
            ctx.scores.add(&hit.doc_ids, &hit.scores);
            ctx.store.deposit_docs(write_group, hit.doc_ids.clone());
            Ok(NodeValue::Doc(DocResult { docs: hit.doc_ids, highlights: Highlights { docs: hit.highlights, cols: vec![] } }))
        }

        AstNode::PercentileLeaf(_, p, cmp, reference) => {
            validate_percentile(*p, *cmp)?;
            let read_groups = ctx.groups.read_groups(node.node_id());
            let filter = ctx.store.build_hist_filter(read_groups, ctx.metadata, ctx.options.mode, ctx.limits);
            if let Some(ref ids) = filter {
                if ids.is_empty() {
                    ctx.store.deposit_cols(write_group, vec![]);
                    return Ok(NodeValue::Col(ColResult { cols: vec![] }));
                }
            }
            let hists = ctx.indices.percentile.search(*p, *cmp, *reference, ctx.options.mode, filter.as_deref())?;
            let cols: Vec<ColId> = hists.into_iter().map(ColId::from).collect();
            ctx.store.deposit_cols(write_group, cols.clone());
            Ok(NodeValue::Col(ColResult { cols }))
        }

        AstNode::NameLeaf(_, name, k) => {
            validate_k(*k)?;
            let cols = ctx.indices.name.search(name, *k, None)?;
            ctx.store.deposit_cols(write_group, cols.clone());
            Ok(NodeValue::Col(ColResult { cols }))
        }

        AstNode::ColScope(_, child) => {
            let inner = eval_node(child, ctx)?.expect_col("col scope")?;
            let docs = ctx.metadata.cols_to_docs(&inner.cols);
            let highlights =
                if ctx.options.enable_highlighting { Highlights { docs: std::collections::HashMap::new(), cols: inner.cols } } else { Highlights::empty() };
            ctx.store.deposit_docs(write_group, docs.clone());
            Ok(NodeValue::Doc(DocResult { docs, highlights }))
        }

        AstNode::Conjunction(_, children) | AstNode::Disjunction(_, children) => {
            let op = if matches!(node, AstNode::Conjunction(..)) { super::JunctionOp::And } else { super::JunctionOp::Or };
            let values = children.iter().map(|c| eval_node(c, ctx)).collect::<EngineResult<Vec<_>>>()?;
            let combined = combine_values(values, op, ctx.options.enable_highlighting, ctx.metadata)?;
            match &combined {
                NodeValue::Doc(d) => ctx.store.deposit_docs(write_group, d.docs.clone()),
                NodeValue::Col(c) => ctx.store.deposit_cols(write_group, c.cols.clone()),
            }
            Ok(combined)
        }

        AstNode::Negation(_, child) => {
            let negated = match eval_node(child, ctx)? {
                NodeValue::Doc(d) => NodeValue::Doc(DocResult { docs: negate_docs(&d.docs, ctx.metadata.num_docs()), highlights: Highlights::empty() }),
                NodeValue::Col(c) => NodeValue::Col(ColResult { cols: negate_cols(&c.cols, ctx.metadata.num_cols()) }),
            };
            match &negated {
                NodeValue::Doc(d) => ctx.store.deposit_docs(write_group, d.docs.clone()),
                NodeValue::Col(c) => ctx.store.deposit_cols(write_group, c.cols.clone()),
            }
            Ok(negated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::{and, col, kw, pp, query};
    use crate::ast::CmpOp;
    use crate::groups::annotate;
    use crate::indices::keyword_index::{DocumentFields, InMemoryKeywordIndex};
    use crate::indices::name_index::HnswNameIndex;
    use crate::indices::percentile_index::{Histogram, InMemoryPercentileIndex};
    use crate::ids::{ColId, DocId, HistId};
    use crate::indices::EvaluationMode;
    use std::collections::HashMap;

    fn fixtures() -> (InMemoryKeywordIndex, InMemoryPercentileIndex, HnswNameIndex, Metadata) {
        let mut docs = HashMap::new();
        docs.insert(DocId(0), DocumentFields(HashMap::from([("description".to_string(), "weather in germany".to_string())])));
        docs.insert(DocId(1), DocumentFields(HashMap::from([("description".to_string(), "population of france".to_string())])));
        let keyword = InMemoryKeywordIndex::new(docs);

        let mut hists = HashMap::new();
        hists.insert(HistId(0), Histogram::new(0.0, 100.0, vec![10; 10]));
        hists.insert(HistId(1), Histogram::new(0.0, 100.0, vec![10; 10]));
        let percentile = InMemoryPercentileIndex::new(hists);

        let name = HnswNameIndex::new(vec![]);

        let metadata = Metadata::from_tables(
            vec![vec![ColId(0)], vec![ColId(1)]],
            vec![DocId(0), DocId(1)],
            HashMap::new(),
            vec![],
            2,
        )
        .unwrap();

        (keyword, percentile, name, metadata)
    }

    fn options() -> EvalOptions {
        EvalOptions { mode: EvaluationMode::Exact, enable_highlighting: false, min_keyword_score: 0.0, rank_keyword_by_score: true }
    }

    #[test]
    fn prefiltering_agrees_with_simple_on_a_conjunction() {
        let (keyword, percentile, name, metadata) = fixtures();
        let indices = Indices { keyword: &keyword, percentile: &percentile, name: &name };
        let ast = query(and(vec![kw("germany"), col(pp(0.5, CmpOp::Ge, 0.0))]));
        let groups = annotate(&ast, false);
        let limits = FilterLimits::default();

        let (prefiltered, _) = evaluate(&ast, &indices, &metadata, &options(), &groups, &limits).unwrap();
        let (simple_result, _) = super::super::simple::evaluate(&ast, &indices, &metadata, &options()).unwrap();
        assert_eq!(prefiltered.docs, simple_result.docs);
    }

    #[test]
    fn earlier_sibling_narrows_later_percentile_search() {
        let (keyword, percentile, name, metadata) = fixtures();
        let indices = Indices { keyword: &keyword, percentile: &percentile, name: &name };
        // germany -> doc 0 only -> col 0 only -> hist 0 only, so the percentile
        // leaf should only ever see HistId(0) once prefiltered.
        let ast = query(and(vec![kw("germany"), col(pp(0.5, CmpOp::Ge, 0.0))]));
        let groups = annotate(&ast, false);
        let limits = FilterLimits::default();
        let (result, _) = evaluate(&ast, &indices, &metadata, &options(), &groups, &limits).unwrap();
        assert_eq!(result.docs, vec![DocId(0)]);
    }
}
