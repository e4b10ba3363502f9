//! Per-write-group intermediate result slots for the prefiltering
//! evaluators.
//!
//! A [`GroupId`]-keyed slot holds the most recently deposited result of
//! whichever node last wrote to that group. `Conjunction` children
//! share one write group, so an earlier AND-sibling's deposit is
//! visible to a later sibling's filter lookup even though neither node
//! is its own ancestor — that visibility is exactly what makes
//! prefiltering work, and it is legal precisely because the group
//! annotator (see [`crate::groups`]) only ever shares a write group
//! between nodes whose results may be freely intersected (AND
//! siblings), never between nodes whose truth must survive outside
//! that conjunction (OR/NOT children get a fresh group).

use crate::groups::GroupId;
use crate::ids::{ColId, DocId, HistId, Metadata};
use crate::indices::EvaluationMode;
use dashmap::DashMap;
use std::collections::HashMap;

/// A single write group's most recent result. Depositing a new result
/// of either shape replaces whatever was there before (mirrors a
/// `Conjunction`'s later sibling overwriting an earlier one's deposit;
/// only the most recent deposit is ever consulted by a filter lookup).
#[derive(Debug, Clone)]
pub enum IntermediateResult {
    Docs(Vec<DocId>),
    Cols(Vec<ColId>),
}

/// Mode-dependent size limits past which prefiltering gives up and
/// passes an unfiltered search to the percentile index rather than pay
/// for a filter conversion bigger than the query it would save. Coarse
/// limits apply to the two recall-oriented modes (served from a small
/// rebinning index in a real backend); fine limits apply to the two
/// precision-oriented/exact modes (served from a full conversion index
/// or raw histograms, which can afford a larger filter).
#[derive(Debug, Clone, Copy)]
pub struct FilterThresholds {
    pub max_hists: usize,
    pub max_cols: usize,
    pub max_docs: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct FilterLimits {
    pub coarse: FilterThresholds,
    pub fine: FilterThresholds,
}

impl Default for FilterLimits {
    fn default() -> Self {
        Self {
            coarse: FilterThresholds { max_hists: 10_000, max_cols: 10_000, max_docs: 1_000 },
            fine: FilterThresholds { max_hists: 300_000, max_cols: 300_000, max_docs: 20_000 },
        }
    }
}

impl FilterLimits {
    fn for_mode(&self, mode: EvaluationMode) -> FilterThresholds {
        match mode {
            EvaluationMode::LowMemory | EvaluationMode::FullRecall => self.coarse,
            EvaluationMode::FullPrecision | EvaluationMode::Exact => self.fine,
        }
    }
}

impl IntermediateResult {
    /// Convert to a sorted, deduplicated `HistId` filter, or `None` if
    /// this result is too large to be worth converting under `mode`.
    pub(crate) fn to_hist_filter(&self, metadata: &Metadata, mode: EvaluationMode, limits: &FilterLimits) -> Option<Vec<HistId>> {
        let thresholds = limits.for_mode(mode);
        match self {
            Self::Cols(cols) => {
                if cols.len() > thresholds.max_cols {
                    return None;
                }
                Some(metadata.cols_to_hists(cols))
            }
            Self::Docs(docs) => {
                if docs.len() > thresholds.max_docs {
                    return None;
                }
                let cols = metadata.docs_to_cols(docs);
                if cols.len() > thresholds.max_cols {
                    return None;
                }
                Some(metadata.cols_to_hists(&cols))
            }
        }
    }
}

/// Store of the latest intermediate result per write group, consulted
/// when building a percentile leaf's prefilter.
#[derive(Debug, Default)]
pub struct IntermediateResultStore {
    results: HashMap<GroupId, IntermediateResult>,
}

impl IntermediateResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit_docs(&mut self, group: GroupId, docs: Vec<DocId>) {
        self.results.insert(group, IntermediateResult::Docs(docs));
    }

    pub fn deposit_cols(&mut self, group: GroupId, cols: Vec<ColId>) {
        self.results.insert(group, IntermediateResult::Cols(cols));
    }

    /// Build a `HistId` filter by intersecting the deposited results of
    /// every group in `read_groups` that has one. `None` means "pass no
    /// filter" (either no group had anything yet, or a group's result
    /// was too large and filtering was abandoned). `Some(&[])` means
    /// the leaf is provably empty without consulting the index.
    pub fn build_hist_filter(&self, read_groups: &[GroupId], metadata: &Metadata, mode: EvaluationMode, limits: &FilterLimits) -> Option<Vec<HistId>> {
        let mut filter: Option<Vec<HistId>> = None;
        for group in read_groups {
            let Some(result) = self.results.get(group) else {
                continue;
            };
            let Some(converted) = result.to_hist_filter(metadata, mode, limits) else {
                return None;
            };
            if converted.is_empty() {
                return Some(converted);
            }
            filter = Some(match filter {
                None => converted,
                Some(existing) => super::intersect_sorted(&existing, &converted),
            });
        }
        filter
    }
}

/// Thread-safe counterpart to [`IntermediateResultStore`] for the
/// threaded-prefiltering evaluator.
///
/// Each write group lives behind its own `DashMap` shard rather than
/// one lock over the whole store, so a deposit into group A never
/// blocks a concurrent lookup of group B. Unlike the sequential
/// prefiltering evaluator, a `PercentileLeaf` here runs alongside its
/// own AND-siblings rather than strictly after them, so `build_hist_filter`
/// is a non-blocking peek at whatever has been deposited so far rather
/// than a wait for a sibling that is guaranteed to have finished. A
/// still-in-flight sibling is simply treated the same as a read group
/// nothing was ever deposited to (see [`IntermediateResultStore`]):
/// omitting its contribution only makes the resulting filter looser,
/// never wrong, which keeps this safe without a blocking handshake that
/// two percentile siblings sharing a write group (a common shape after
/// the optimizer's balanced-tree split) could deadlock on.
#[derive(Debug, Default)]
pub struct ConcurrentResultStore {
    results: DashMap<GroupId, IntermediateResult>,
}

impl ConcurrentResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit_docs(&self, group: GroupId, docs: Vec<DocId>) {
        self.results.insert(group, IntermediateResult::Docs(docs));
    }

    pub fn deposit_cols(&self, group: GroupId, cols: Vec<ColId>) {
        self.results.insert(group, IntermediateResult::Cols(cols));
    }

    pub fn build_hist_filter(&self, read_groups: &[GroupId], metadata: &Metadata, mode: EvaluationMode, limits: &FilterLimits) -> Option<Vec<HistId>> {
        let mut filter: Option<Vec<HistId>> = None;
        for group in read_groups {
            let Some(result) = self.results.get(group) else {
                continue;
            };
            let Some(converted) = result.to_hist_filter(metadata, mode, limits) else {
                return None;
            };
            if converted.is_empty() {
                return Some(converted);
            }
            filter = Some(match filter {
                None => converted,
                Some(existing) => super::intersect_sorted(&existing, &converted),
            });
        }
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::DocId;
    use std::collections::HashMap as Map;

    fn metadata() -> Metadata {
        Metadata::from_tables(
            vec![vec![ColId(0), ColId(1)], vec![ColId(2)]],
            vec![DocId(0), DocId(0), DocId(1)],
            Map::new(),
            vec![],
            2,
        )
        .unwrap()
    }

    #[test]
    fn missing_group_contributes_nothing() {
        let store = IntermediateResultStore::new();
        let meta = metadata();
        let limits = FilterLimits::default();
        let filter = store.build_hist_filter(&[GroupId(3)], &meta, EvaluationMode::Exact, &limits);
        assert!(filter.is_none());
    }

    #[test]
    fn doc_deposit_converts_through_cols_to_hists() {
        let mut store = IntermediateResultStore::new();
        store.deposit_docs(GroupId(1), vec![DocId(0)]);
        let meta = metadata();
        let limits = FilterLimits::default();
        let filter = store
            .build_hist_filter(&[GroupId(1)], &meta, EvaluationMode::Exact, &limits)
            .unwrap();
        assert_eq!(filter, vec![HistId(0), HistId(1)]);
    }

    #[test]
    fn empty_intermediate_short_circuits() {
        let mut store = IntermediateResultStore::new();
        store.deposit_docs(GroupId(1), vec![]);
        let meta = metadata();
        let limits = FilterLimits::default();
        let filter = store
            .build_hist_filter(&[GroupId(1)], &meta, EvaluationMode::Exact, &limits)
            .unwrap();
        assert!(filter.is_empty());
    }

    #[test]
    fn oversized_result_abandons_filtering() {
        let mut store = IntermediateResultStore::new();
        let many_docs: Vec<DocId> = (0..2000).map(DocId).collect();
        store.deposit_docs(GroupId(1), many_docs);
        let meta = metadata();
        let limits = FilterLimits::default();
        let filter = store.build_hist_filter(&[GroupId(1)], &meta, EvaluationMode::LowMemory, &limits);
        assert!(filter.is_none());
    }

    #[test]
    fn multiple_groups_intersect() {
        let mut store = IntermediateResultStore::new();
        store.deposit_cols(GroupId(1), vec![ColId(0), ColId(1)]);
        store.deposit_cols(GroupId(2), vec![ColId(1)]);
        let meta = metadata();
        let limits = FilterLimits::default();
        let filter = store
            .build_hist_filter(&[GroupId(1), GroupId(2)], &meta, EvaluationMode::Exact, &limits)
            .unwrap();
        assert_eq!(filter, vec![HistId(1)]);
    }

    #[test]
    fn concurrent_store_peeks_without_blocking_on_missing_groups() {
        let store = ConcurrentResultStore::new();
        let meta = metadata();
        let limits = FilterLimits::default();
        assert!(store.build_hist_filter(&[GroupId(1)], &meta, EvaluationMode::Exact, &limits).is_none());
    }

    #[test]
    fn concurrent_store_deposits_are_visible_across_threads() {
        use std::sync::Arc;

        let store = Arc::new(ConcurrentResultStore::new());
        let meta = Arc::new(metadata());
        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || store.deposit_docs(GroupId(1), vec![DocId(0)]))
        };
        writer.join().unwrap();

        let limits = FilterLimits::default();
        let filter = store.build_hist_filter(&[GroupId(1)], &meta, EvaluationMode::Exact, &limits).unwrap();
        assert_eq!(filter, vec![HistId(0), HistId(1)]);
    }
}
