//! # dsquery
//!
//! A query engine for a dataset-discovery search index over tabular
//! dataset profiles. Each dataset has a document record (name,
//! description, keywords, creator, publisher) and, per numeric column,
//! a precomputed equi-width histogram. Queries mix three predicate
//! families — full-text keyword predicates, percentile predicates over
//! column histograms, and column-name predicates (exact or
//! nearest-neighbor) — composed with AND/OR/NOT and a column-scope
//! operator that lifts column-level predicates to the document level.
//!
//! ## Pipeline
//!
//! ```text
//! query text
//!     ↓
//! [parser]            → AstNode tree, stable NodeIds
//!     ↓
//! [optimizer]          → percentile-split / keyword-merge / cost-sort
//!     ↓
//! [group annotator]    → write/read group side table
//!     ↓
//! [evaluator]          → simple | prefiltering | threaded | threaded_prefiltering
//!     ↓
//! [scoring + cache]    → ranked DocId list + Highlights
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dsquery::{Config, QueryEngine};
//! use dsquery::indices::{InMemoryKeywordIndex, InMemoryPercentileIndex, HnswNameIndex};
//!
//! let metadata = dsquery::ids::Metadata::from_tables(/* ... */)?;
//! let engine = QueryEngine::new(
//!     metadata,
//!     Config::load()?,
//!     Box::new(InMemoryKeywordIndex::new(Default::default())),
//!     Box::new(InMemoryPercentileIndex::new(Default::default())),
//!     Box::new(HnswNameIndex::new(vec![])),
//! )?;
//!
//! let result = engine.query("kw('germany')", dsquery::indices::EvaluationMode::Exact, true)?;
//! println!("{:?}", result.docs);
//! ```

pub mod ast;
pub mod config;
pub mod engine;
pub mod error;
pub mod execution;
pub mod groups;
pub mod ids;
pub mod indices;
pub mod optimizer;
pub mod parser;

pub use ast::{AstNode, CmpOp, Highlights};
pub use config::Config;
pub use engine::{QueryEngine, QueryOutcome};
pub use error::{EngineError, EngineResult};
pub use ids::{ColId, DocId, HistId, Metadata, VecId};
pub use indices::EvaluationMode;
