//! Index contracts.
//!
//! The evaluator consumes three index kinds through narrow traits; it
//! never depends on a concrete backend. This module also defines
//! reference in-process implementations of all three, suitable for
//! tests and the demo CLI, but in no way standing in for a production
//! index (their docs say so at each call site where it matters).

pub mod keyword_index;
pub mod name_index;
pub mod percentile_index;

use crate::ast::CmpOp;
use crate::error::EngineResult;
use crate::ids::{ColId, DocId, HistId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use keyword_index::InMemoryKeywordIndex;
pub use name_index::HnswNameIndex;
pub use percentile_index::InMemoryPercentileIndex;

/// Which rebinning/conversion strategy a percentile query should use.
/// See [`PercentileIndex`] for what each trades off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// Recall-oriented, answered from a coarse rebinning index.
    LowMemory,
    /// Precision-oriented, answered from a conversion index.
    FullPrecision,
    /// Recall-oriented, answered from a conversion index.
    FullRecall,
    /// Answered directly from raw histogram bucket counts.
    Exact,
}

impl std::fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::LowMemory => "low_memory",
            Self::FullPrecision => "full_precision",
            Self::FullRecall => "full_recall",
            Self::Exact => "exact",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for EvaluationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low_memory" => Ok(Self::LowMemory),
            "full_precision" => Ok(Self::FullPrecision),
            "full_recall" => Ok(Self::FullRecall),
            "exact" => Ok(Self::Exact),
            other => Err(format!("unrecognized evaluation mode: {other}")),
        }
    }
}

/// Per-document, per-field `<mark>`-annotated snippets returned by a
/// keyword search, keyed by [`DocId`] then field name.
pub type DocHighlights = HashMap<DocId, HashMap<String, String>>;

/// Result of a [`KeywordIndex::search`] call.
#[derive(Debug, Clone, Default)]
pub struct KeywordHit {
    pub doc_ids: Vec<DocId>,
    pub scores: HashMap<DocId, f64>,
    pub highlights: DocHighlights,
}

/// Full-text search over an opaque Lucene-style query expression
/// (fielded, boolean, wildcards as far as a given backend supports).
pub trait KeywordIndex: Send + Sync {
    /// `min_score` filters out hits below the threshold; when
    /// `rank_by_score` is false, the returned order is backend-defined
    /// (the evaluator re-sorts by accumulated score regardless).
    /// `highlight` requests per-field `<mark>`-annotated snippets.
    fn search(
        &self,
        query_text: &str,
        highlight: bool,
        min_score: f64,
        rank_by_score: bool,
    ) -> EngineResult<KeywordHit>;
}

/// Percentile-bucket search over histogram-backed columns.
pub trait PercentileIndex: Send + Sync {
    /// `filter`, when `Some`, restricts the search to the given
    /// `HistId`s; `Some(&[])` short-circuits to an empty result without
    /// touching the index (see the prefiltering evaluator). `None`
    /// means unfiltered.
    fn search(
        &self,
        p: f64,
        cmp: CmpOp,
        reference: f64,
        mode: EvaluationMode,
        filter: Option<&[HistId]>,
    ) -> EngineResult<Vec<HistId>>;
}

/// Column-name search: `k=0` is an exact string match, `k>0` is a
/// cosine k-NN search over name embeddings.
pub trait NameIndex: Send + Sync {
    /// `filter`, when `Some`, restricts candidates to the given
    /// `ColId`s.
    fn search(&self, name: &str, k: i64, filter: Option<&[ColId]>) -> EngineResult<Vec<ColId>>;
}
