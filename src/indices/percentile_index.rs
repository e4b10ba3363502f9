//! Reference percentile index: an equi-width histogram answerer.
//!
//! Stands in for the real rebinning/conversion index files (out of
//! scope — see crate docs) by keeping one equi-width histogram per
//! [`HistId`] and estimating the requested percentile's value directly
//! from bucket counts. All four [`EvaluationMode`]s are answered from
//! the same bucket data; they differ only in how a bucket whose exact
//! interior value is unknown is treated:
//!
//! - `Exact` interpolates a single value within the containing bucket
//!   (assumes uniform distribution inside it) and compares precisely.
//! - `FullPrecision` requires the *entire* bucket range to satisfy the
//!   comparator (the conservative, false-positive-free bound).
//! - `LowMemory`/`FullRecall` accept a `HistId` if *any* point in the
//!   bucket range could satisfy the comparator (the permissive,
//!   false-negative-free bound). The real rebinning and conversion
//!   indices trade memory for precision differently; this reference
//!   implementation does not model that distinction since it always
//!   holds the full histogram.

use super::EvaluationMode;
use crate::ast::CmpOp;
use crate::error::EngineResult;
use crate::ids::HistId;
use std::collections::HashMap;

/// An equi-width histogram over `[min, max)` with per-bucket counts.
#[derive(Debug, Clone)]
pub struct Histogram {
    min: f64,
    max: f64,
    bucket_counts: Vec<u64>,
}

impl Histogram {
    pub fn new(min: f64, max: f64, bucket_counts: Vec<u64>) -> Self {
        debug_assert!(max >= min);
        debug_assert!(!bucket_counts.is_empty());
        Self { min, max, bucket_counts }
    }

    fn total(&self) -> u64 {
        self.bucket_counts.iter().sum()
    }

    fn bucket_width(&self) -> f64 {
        (self.max - self.min) / self.bucket_counts.len() as f64
    }

    fn bucket_bounds(&self, idx: usize) -> (f64, f64) {
        let width = self.bucket_width();
        (self.min + idx as f64 * width, self.min + (idx + 1) as f64 * width)
    }

    /// Bucket index containing the `p`-th percentile by count, plus the
    /// cumulative count strictly before that bucket (for interpolation).
    fn bucket_for_percentile(&self, p: f64) -> Option<(usize, u64)> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        let target_rank = (p * total as f64).ceil().max(1.0) as u64;
        let mut cumulative = 0u64;
        for (idx, &count) in self.bucket_counts.iter().enumerate() {
            if cumulative + count >= target_rank {
                return Some((idx, cumulative));
            }
            cumulative += count;
        }
        let last = self.bucket_counts.len() - 1;
        Some((last, cumulative - self.bucket_counts[last]))
    }

    fn interpolated_value(&self, idx: usize, cumulative_before: u64, p: f64) -> f64 {
        let (lo, hi) = self.bucket_bounds(idx);
        let count_in_bucket = self.bucket_counts[idx].max(1) as f64;
        let total = self.total() as f64;
        let target_rank = p * total;
        let offset = ((target_rank - cumulative_before as f64) / count_in_bucket).clamp(0.0, 1.0);
        lo + offset * (hi - lo)
    }

    fn matches(&self, p: f64, cmp: CmpOp, reference: f64, mode: EvaluationMode) -> bool {
        let Some((idx, cumulative_before)) = self.bucket_for_percentile(p) else {
            return false;
        };
        let (lo, hi) = self.bucket_bounds(idx);
        match mode {
            EvaluationMode::Exact => {
                let value = self.interpolated_value(idx, cumulative_before, p);
                cmp.apply(value, reference)
            }
            EvaluationMode::FullPrecision => match cmp {
                CmpOp::Ge => lo >= reference,
                CmpOp::Gt => lo > reference,
                CmpOp::Le => hi <= reference,
                CmpOp::Lt => hi < reference,
            },
            EvaluationMode::LowMemory | EvaluationMode::FullRecall => match cmp {
                CmpOp::Ge => hi >= reference,
                CmpOp::Gt => hi > reference,
                CmpOp::Le => lo <= reference,
                CmpOp::Lt => lo < reference,
            },
        }
    }
}

pub struct InMemoryPercentileIndex {
    histograms: HashMap<HistId, Histogram>,
}

impl InMemoryPercentileIndex {
    pub fn new(histograms: HashMap<HistId, Histogram>) -> Self {
        Self { histograms }
    }
}

impl super::PercentileIndex for InMemoryPercentileIndex {
    fn search(
        &self,
        p: f64,
        cmp: CmpOp,
        reference: f64,
        mode: EvaluationMode,
        filter: Option<&[HistId]>,
    ) -> EngineResult<Vec<HistId>> {
        if let Some(allowed) = filter {
            if allowed.is_empty() {
                return Ok(Vec::new());
            }
            let mut out: Vec<HistId> = allowed
                .iter()
                .filter(|h| {
                    self.histograms
                        .get(h)
                        .is_some_and(|hist| hist.matches(p, cmp, reference, mode))
                })
                .copied()
                .collect();
            out.sort_unstable();
            out.dedup();
            return Ok(out);
        }

        let mut out: Vec<HistId> = self
            .histograms
            .iter()
            .filter(|(_, hist)| hist.matches(p, cmp, reference, mode))
            .map(|(id, _)| *id)
            .collect();
        out.sort_unstable();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indices::PercentileIndex;

    fn uniform(min: f64, max: f64, buckets: usize, per_bucket: u64) -> Histogram {
        Histogram::new(min, max, vec![per_bucket; buckets])
    }

    #[test]
    fn exact_mode_interpolates_median() {
        let hist = uniform(0.0, 100.0, 10, 10);
        let mut map = HashMap::new();
        map.insert(HistId(0), hist);
        let index = InMemoryPercentileIndex::new(map);
        let result = index
            .search(0.5, CmpOp::Ge, 40.0, EvaluationMode::Exact, None)
            .unwrap();
        assert_eq!(result, vec![HistId(0)]);
    }

    #[test]
    fn full_precision_is_conservative() {
        let hist = uniform(0.0, 100.0, 10, 10);
        let mut map = HashMap::new();
        map.insert(HistId(0), hist);
        let index = InMemoryPercentileIndex::new(map);
        // p50 bucket is [40, 50); ge 45 is not guaranteed for every point in it
        let result = index
            .search(0.5, CmpOp::Ge, 45.0, EvaluationMode::FullPrecision, None)
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn low_memory_is_permissive() {
        let hist = uniform(0.0, 100.0, 10, 10);
        let mut map = HashMap::new();
        map.insert(HistId(0), hist);
        let index = InMemoryPercentileIndex::new(map);
        let result = index
            .search(0.5, CmpOp::Ge, 45.0, EvaluationMode::LowMemory, None)
            .unwrap();
        assert_eq!(result, vec![HistId(0)]);
    }

    #[test]
    fn empty_filter_short_circuits_without_scanning() {
        let hist = uniform(0.0, 100.0, 10, 10);
        let mut map = HashMap::new();
        map.insert(HistId(0), hist);
        let index = InMemoryPercentileIndex::new(map);
        let result = index
            .search(0.5, CmpOp::Ge, 0.0, EvaluationMode::Exact, Some(&[]))
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn filter_restricts_candidates() {
        let mut map = HashMap::new();
        map.insert(HistId(0), uniform(0.0, 100.0, 10, 10));
        map.insert(HistId(1), uniform(0.0, 100.0, 10, 10));
        let index = InMemoryPercentileIndex::new(map);
        let result = index
            .search(0.5, CmpOp::Ge, 0.0, EvaluationMode::Exact, Some(&[HistId(1)]))
            .unwrap();
        assert_eq!(result, vec![HistId(1)]);
    }
}
