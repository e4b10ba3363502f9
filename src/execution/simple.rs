//! Simple (sequential, non-filter-propagating) evaluator.
//!
//! A plain postorder walk: every node is evaluated once, in tree order,
//! with no concurrency and no intermediate-result filtering. This is
//! the baseline the other three variants are benchmarked against and
//! must agree with bit-for-bit.

use super::scoring::ScoreMap;
use super::{combine_values, negate_cols, negate_docs, validate_k, validate_percentile, NodeValue};
use crate::ast::{AstNode, ColResult, DocResult, Highlights};
use crate::error::EngineResult;
use crate::ids::{ColId, Metadata};
use crate::indices::{EvaluationMode, KeywordIndex, NameIndex, PercentileIndex};

#[derive(Debug, Clone, Copy)]
pub struct EvalOptions {
    pub mode: EvaluationMode,
    pub enable_highlighting: bool,
    pub min_keyword_score: f64,
    pub rank_keyword_by_score: bool,
}

pub struct Indices<'a> {
    pub keyword: &'a dyn KeywordIndex,
    pub percentile: &'a dyn PercentileIndex,
    pub name: &'a dyn NameIndex,
}

/// Evaluate `ast` to its final (unranked) document set plus the score
/// map used to rank it. `ast` must be a `Query` node (or any
/// document-shaped node, for evaluating subtrees directly in tests).
pub fn evaluate(ast: &AstNode, indices: &Indices, metadata: &Metadata, options: &EvalOptions) -> EngineResult<(DocResult, ScoreMap)> {
    let mut scores = ScoreMap::new();
    let value = eval_node(ast, indices, metadata, options, &mut scores)?;
    Ok((value.expect_doc("query result")?, scores))
}

fn eval_node(node: &AstNode, indices: &Indices, metadata: &Metadata, options: &EvalOptions, scores: &mut ScoreMap) -> EngineResult<NodeValue> {
    match node {
        AstNode::Query(_, child) => eval_node(child, indices, metadata, options, scores),

        AstNode::KeywordLeaf(_, text) => {
            let hit = indices.keyword.search(text, options.enable_highlighting, options.min_keyword_score, options.rank_keyword_by_score)?;
            scores.add(&hit.doc_ids, &hit.scores);
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
            let values = children.iter().map(|c| eval_node(c, indices, metadata, options, scores)).collect::<EngineResult<Vec<_>>>()?;
            combine_values(values, op, options.enable_highlighting, metadata)
        }

        AstNode::Negation(_, child) => match eval_node(child, indices, metadata, options, scores)? {
            NodeValue::Doc(d) => Ok(NodeValue::Doc(DocResult { docs: negate_docs(&d.docs, metadata.num_docs()), highlights: Highlights::empty() })),
            NodeValue::Col(c) => Ok(NodeValue::Col(ColResult { cols: negate_cols(&c.cols, metadata.num_cols()) })),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::{and, col, kw, name, not, or, pp, query};
    use crate::ast::CmpOp;
    use crate::indices::keyword_index::{DocumentFields, InMemoryKeywordIndex};
    use crate::indices::name_index::HnswNameIndex;
    use crate::indices::percentile_index::{Histogram, InMemoryPercentileIndex};
    use crate::ids::{ColId, DocId, HistId};
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

        let name = HnswNameIndex::new(vec![("humidity".to_string(), vec![ColId(0)])]);

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
        EvalOptions { mode: EvaluationMode::Exact, enable_highlighting: true, min_keyword_score: 0.0, rank_keyword_by_score: true }
    }

    #[test]
    fn keyword_leaf_resolves_through_the_index() {
        let (keyword, percentile, name, metadata) = fixtures();
        let indices = Indices { keyword: &keyword, percentile: &percentile, name: &name };
        let ast = query(kw("germany"));
        let (result, _) = evaluate(&ast, &indices, &metadata, &options()).unwrap();
        assert_eq!(result.docs, vec![DocId(0)]);
    }

    #[test]
    fn col_scope_lifts_columns_to_their_owning_documents() {
        let (keyword, percentile, name, metadata) = fixtures();
        let indices = Indices { keyword: &keyword, percentile: &percentile, name: &name };
        let ast = query(col(pp(0.5, CmpOp::Ge, 0.0)));
        let (result, _) = evaluate(&ast, &indices, &metadata, &options()).unwrap();
        assert_eq!(result.docs, vec![DocId(0), DocId(1)]);
    }

    #[test]
    fn conjunction_intersects_doc_results() {
        let (keyword, percentile, name, metadata) = fixtures();
        let indices = Indices { keyword: &keyword, percentile: &percentile, name: &name };
        let ast = query(and(vec![kw("germany"), col(pp(0.5, CmpOp::Ge, 0.0))]));
        let (result, _) = evaluate(&ast, &indices, &metadata, &options()).unwrap();
        assert_eq!(result.docs, vec![DocId(0)]);
    }

    #[test]
    fn disjunction_unions_doc_results() {
        let (keyword, percentile, name, metadata) = fixtures();
        let indices = Indices { keyword: &keyword, percentile: &percentile, name: &name };
        let ast = query(or(vec![kw("germany"), kw("france")]));
        let (result, _) = evaluate(&ast, &indices, &metadata, &options()).unwrap();
        assert_eq!(result.docs, vec![DocId(0), DocId(1)]);
    }

    #[test]
    fn negation_complements_against_all_documents() {
        let (keyword, percentile, name, metadata) = fixtures();
        let indices = Indices { keyword: &keyword, percentile: &percentile, name: &name };
        let ast = query(not(kw("germany")));
        let (result, _) = evaluate(&ast, &indices, &metadata, &options()).unwrap();
        assert_eq!(result.docs, vec![DocId(1)]);
    }

    #[test]
    fn out_of_range_percentile_is_rejected() {
        let (keyword, percentile, name, metadata) = fixtures();
        let indices = Indices { keyword: &keyword, percentile: &percentile, name: &name };
        let ast = query(col(pp(1.5, CmpOp::Ge, 0.0)));
        let err = evaluate(&ast, &indices, &metadata, &options()).unwrap_err();
        assert!(matches!(err, crate::error::EngineError::InvalidPredicate(_)));
    }

    #[test]
    fn negative_k_is_rejected() {
        let (keyword, percentile, name, metadata) = fixtures();
        let indices = Indices { keyword: &keyword, percentile: &percentile, name: &name };
        let ast = query(col(name("humidity", -1)));
        let err = evaluate(&ast, &indices, &metadata, &options()).unwrap_err();
        assert!(matches!(err, crate::error::EngineError::InvalidArgument(_)));
    }
}
