//! Query engine façade.
//!
//! [`QueryEngine`] owns everything a query needs for its entire
//! lifetime — metadata, configuration, the three index handles, the
//! worker pool, and the result cache — and exposes a single entry
//! point, [`QueryEngine::query`], that runs a query text through
//! parse → optimize → annotate → evaluate → rank, dispatching to
//! whichever of the four evaluator variants the configuration selects.

use crate::ast::Highlights;
use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::execution::cache::{CachedResult, ResultCache};
use crate::execution::simple::{EvalOptions, Indices};
use crate::execution::slots::FilterLimits;
use crate::execution::{prefiltering, simple, threaded, threaded_prefiltering};
use crate::groups::annotate;
use crate::ids::{DocId, Metadata};
use crate::indices::{EvaluationMode, KeywordIndex, NameIndex, PercentileIndex};
use crate::optimizer::Optimizer;
use crate::parser::parse_query;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info_span, warn};

/// The outcome of a single query: its ranked `DocId` list and the
/// highlights accumulated along the way.
#[derive(Debug, Clone, Default)]
pub struct QueryOutcome {
    pub docs: Vec<DocId>,
    pub highlights: Highlights,
}

pub struct QueryEngine {
    metadata: Arc<Metadata>,
    config: Arc<Config>,
    keyword: Box<dyn KeywordIndex>,
    percentile: Box<dyn PercentileIndex>,
    name: Box<dyn NameIndex>,
    cache: ResultCache,
    limits: FilterLimits,
    pool: rayon::ThreadPool,
}

impl QueryEngine {
    /// Build an engine over already-loaded metadata, configuration, and
    /// index handles. Index construction from `config.indices`'s paths
    /// is out of scope here — callers pass in whatever implements the
    /// three index traits, reference or real.
    pub fn new(
        metadata: Metadata,
        config: Config,
        keyword: Box<dyn KeywordIndex>,
        percentile: Box<dyn PercentileIndex>,
        name: Box<dyn NameIndex>,
    ) -> EngineResult<Self> {
        let worker_threads = if config.evaluation.worker_threads == 0 { num_cpus::get() } else { config.evaluation.worker_threads };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_threads)
            .build()
            .map_err(|e| EngineError::internal(format!("failed to build worker pool: {e}")))?;
        let cache = ResultCache::new(config.cache.capacity);
        Ok(Self {
            metadata: Arc::new(metadata),
            config: Arc::new(config),
            keyword,
            percentile,
            name,
            cache,
            limits: FilterLimits::default(),
            pool,
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Invalidate every cached result, e.g. after metadata is swapped out.
    pub fn invalidate_cache(&self) {
        self.cache.clear();
    }

    /// Run `text` under `mode`, returning the ranked document list and
    /// (if requested) merged highlights. Checks the result cache first;
    /// a cache hit skips parsing, optimizing, annotating, and
    /// evaluating entirely.
    pub fn query(&self, text: &str, mode: EvaluationMode, enable_highlighting: bool) -> EngineResult<QueryOutcome> {
        if let Some(cached) = self.cache.get(text, mode, enable_highlighting) {
            debug!(query = %truncate(text), %mode, "query_cache_hit");
            return Ok(QueryOutcome { docs: cached.docs, highlights: cached.highlights });
        }

        let span = info_span!("query", query = %truncate(text), %mode, highlight = enable_highlighting);
        let _guard = span.enter();
        let started = Instant::now();

        let ast = {
            let _parse = info_span!("parse").entered();
            parse_query(text)?
        };

        let ast = {
            let _optimize = info_span!("optimize").entered();
            Optimizer::new(self.config.evaluation.enable_cost_sorting).optimize(ast)
        };

        let parallel = self.config.evaluation.enable_threading;
        let groups = {
            let _annotate = info_span!("annotate").entered();
            annotate(&ast, parallel)
        };

        let options = EvalOptions {
            mode,
            enable_highlighting,
            min_keyword_score: 0.0,
            rank_keyword_by_score: true,
        };
        let indices = Indices { keyword: self.keyword.as_ref(), percentile: self.percentile.as_ref(), name: self.name.as_ref() };

        let (result, scores) = {
            let _evaluate = info_span!("evaluate", prefiltering = self.config.evaluation.enable_prefiltering, threaded = parallel).entered();
            match (parallel, self.config.evaluation.enable_prefiltering) {
                (false, false) => simple::evaluate(&ast, &indices, &self.metadata, &options)?,
                (false, true) => prefiltering::evaluate(&ast, &indices, &self.metadata, &options, &groups, &self.limits)?,
                (true, false) => threaded::evaluate(&ast, &indices, &self.metadata, &options, &self.pool)?,
                (true, true) => threaded_prefiltering::evaluate(&ast, &indices, &self.metadata, &options, &groups, &self.limits, &self.pool)?,
            }
        };

        let docs = scores.rank(result.docs);
        let elapsed = started.elapsed();
        debug!(elapsed_ms = elapsed.as_secs_f64() * 1000.0, result_count = docs.len(), "query_complete");

        let outcome = QueryOutcome { docs: docs.clone(), highlights: result.highlights.clone() };
        self.cache.put(text, mode, enable_highlighting, CachedResult { docs, highlights: result.highlights });
        Ok(outcome)
    }

    /// Run `text` under the configured default mode with highlighting
    /// disabled, the common case for programmatic callers that only
    /// need the document set.
    pub fn query_default(&self, text: &str) -> EngineResult<QueryOutcome> {
        self.query(text, self.config.evaluation.default_mode, false)
    }
}

fn truncate(text: &str) -> String {
    const MAX: usize = 80;
    if text.len() <= MAX {
        text.to_string()
    } else {
        let mut s = text.chars().take(MAX).collect::<String>();
        s.push('…');
        warn!(len = text.len(), "query_text_truncated_for_logging");
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indices::keyword_index::{DocumentFields, InMemoryKeywordIndex};
    use crate::indices::name_index::HnswNameIndex;
    use crate::indices::percentile_index::{Histogram, InMemoryPercentileIndex};
    use crate::ids::{ColId, HistId};
    use std::collections::HashMap;

    fn engine(config: Config) -> QueryEngine {
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

        QueryEngine::new(metadata, config, Box::new(keyword), Box::new(percentile), Box::new(name)).unwrap()
    }

    #[test]
    fn keyword_query_returns_the_matching_document() {
        let engine = engine(Config::default());
        let outcome = engine.query("kw('germany')", EvaluationMode::Exact, false).unwrap();
        assert_eq!(outcome.docs, vec![DocId(0)]);
    }

    #[test]
    fn all_four_evaluator_variants_agree() {
        let ast = "kw('germany') AND col(pp(0.5;ge;0.0))";
        for threaded in [false, true] {
            for prefiltering in [false, true] {
                let mut config = Config::default();
                config.evaluation.enable_threading = threaded;
                config.evaluation.enable_prefiltering = prefiltering;
                config.cache.capacity = 0;
                let engine = engine(config);
                let outcome = engine.query(ast, EvaluationMode::Exact, false).unwrap();
                assert_eq!(outcome.docs, vec![DocId(0)], "threaded={threaded} prefiltering={prefiltering}");
            }
        }
    }

    #[test]
    fn repeated_query_hits_the_cache() {
        let engine = engine(Config::default());
        let first = engine.query("kw('germany')", EvaluationMode::Exact, false).unwrap();
        let second = engine.query("kw('germany')", EvaluationMode::Exact, false).unwrap();
        assert_eq!(first.docs, second.docs);
    }

    #[test]
    fn invalid_percentile_is_rejected() {
        let engine = engine(Config::default());
        let err = engine.query("col(pp(1.5;ge;0.0))", EvaluationMode::Exact, false).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPredicate(_)));
    }

    #[test]
    fn parse_error_surfaces_with_span() {
        let engine = engine(Config::default());
        let err = engine.query("kw(", EvaluationMode::Exact, false).unwrap_err();
        assert!(matches!(err, EngineError::Parse { .. }));
    }
}
