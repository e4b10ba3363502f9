//! Per-query document scoring.
//!
//! Every `KeywordLeaf` adds its hits' scores into a shared map; the
//! final result is the document list sorted descending by accumulated
//! score, with documents the map never touched ranked last (in `DocId`
//! order), exactly as if they carried score `-inf`.

use crate::ids::DocId;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ScoreMap(HashMap<DocId, f64>);

impl ScoreMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, doc_ids: &[DocId], scores: &HashMap<DocId, f64>) {
        for doc in doc_ids {
            let delta = scores.get(doc).copied().unwrap_or(0.0);
            *self.0.entry(*doc).or_insert(0.0) += delta;
        }
    }

    pub fn get(&self, doc: DocId) -> f64 {
        self.0.get(&doc).copied().unwrap_or(f64::NEG_INFINITY)
    }

    /// Stable sort of `doc_ids` by `(-score, DocId)`.
    pub fn rank(&self, mut doc_ids: Vec<DocId>) -> Vec<DocId> {
        doc_ids.sort_by(|a, b| {
            self.get(*a)
                .partial_cmp(&self.get(*b))
                .unwrap_or(std::cmp::Ordering::Equal)
                .reverse()
                .then_with(|| a.cmp(b))
        });
        doc_ids
    }
}
