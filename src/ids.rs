//! Identifier spaces and the metadata tables that relate them.
//!
//! Four dense, 32-bit identifier spaces flow through the engine:
//!
//! - [`DocId`]: one per dataset.
//! - [`ColId`]: one per column of any dataset. Columns that have a
//!   histogram occupy the prefix `[0, num_hists)`; columns without one
//!   occupy `[num_hists, num_cols)`.
//! - [`HistId`]: equal to the [`ColId`] of a column that has a histogram,
//!   so `HistId < num_hists` always holds.
//! - [`VecId`]: one per distinct column-name string (the unit the name
//!   index's vectors are keyed by).
//!
//! [`Metadata`] owns the read-only tables that relate these spaces and
//! the pure set-algebra used to convert between them when building
//! prefilters (see [`crate::execution::prefiltering`]).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

macro_rules! dense_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            #[must_use]
            pub fn new(raw: u32) -> Self {
                Self(raw)
            }

            #[must_use]
            pub fn get(self) -> u32 {
                self.0
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

dense_id!(DocId);
dense_id!(ColId);
dense_id!(HistId);
dense_id!(VecId);

impl From<HistId> for ColId {
    /// A `HistId` is always a `ColId` under the prefix invariant.
    fn from(h: HistId) -> Self {
        ColId(h.0)
    }
}

/// Metadata tables loaded once at engine construction and shared
/// read-only by every component for the life of the process.
///
/// Invariants (checked at load time, see [`Metadata::load`]):
/// - `col_to_doc[c]` is a key of `doc_to_cols`, and `c` is a member of
///   `doc_to_cols[col_to_doc[c]]`, for every `c`.
/// - every array stored in, or derived from, these tables is sorted and
///   deduplicated before it leaves a component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "doc_to_cols")]
    doc_to_cols: Vec<Vec<ColId>>,
    #[serde(rename = "col_to_doc")]
    col_to_doc: Vec<DocId>,
    #[serde(rename = "name_to_vector")]
    name_to_vec: HashMap<String, VecId>,
    #[serde(rename = "vector_to_cols")]
    vec_to_cols: Vec<Vec<ColId>>,
    pub num_hists: u32,
}

/// Raised when a loaded metadata document violates one of the dense-ID
/// invariants described on [`Metadata`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum MetadataError {
    #[error("col_to_doc[{col}] = {doc} but doc_to_cols has no entry {doc}")]
    DanglingDocRef { col: u32, doc: u32 },
    #[error("col_to_doc[{col}] = {doc} but {col} is not a member of doc_to_cols[{doc}]")]
    MissingBackReference { col: u32, doc: u32 },
    #[error("num_hists ({num_hists}) exceeds num_cols ({num_cols})")]
    HistPrefixOverrun { num_hists: u32, num_cols: u32 },
}

impl Metadata {
    /// Validate and wrap raw tables loaded from the metadata JSON document
    /// described in the engine's external interface.
    pub fn from_tables(
        doc_to_cols: Vec<Vec<ColId>>,
        col_to_doc: Vec<DocId>,
        name_to_vec: HashMap<String, VecId>,
        vec_to_cols: Vec<Vec<ColId>>,
        num_hists: u32,
    ) -> Result<Self, MetadataError> {
        let num_cols = col_to_doc.len() as u32;
        if num_hists > num_cols {
            return Err(MetadataError::HistPrefixOverrun { num_hists, num_cols });
        }
        for (col_idx, doc) in col_to_doc.iter().enumerate() {
            let col = col_idx as u32;
            let cols_of_doc = doc_to_cols
                .get(doc.get() as usize)
                .ok_or(MetadataError::DanglingDocRef { col, doc: doc.get() })?;
            if !cols_of_doc.iter().any(|c| c.get() == col) {
                return Err(MetadataError::MissingBackReference { col, doc: doc.get() });
            }
        }

        let mut doc_to_cols = doc_to_cols;
        for cols in &mut doc_to_cols {
            cols.sort_unstable();
            cols.dedup();
        }
        let mut vec_to_cols = vec_to_cols;
        for cols in &mut vec_to_cols {
            cols.sort_unstable();
            cols.dedup();
        }

        Ok(Metadata {
            doc_to_cols,
            col_to_doc,
            name_to_vec,
            vec_to_cols,
            num_hists,
        })
    }

    pub fn num_docs(&self) -> u32 {
        self.doc_to_cols.len() as u32
    }

    pub fn num_cols(&self) -> u32 {
        self.col_to_doc.len() as u32
    }

    pub fn num_hists(&self) -> u32 {
        self.num_hists
    }

    pub fn cols_of_doc(&self, doc: DocId) -> &[ColId] {
        self.doc_to_cols
            .get(doc.get() as usize)
            .map_or(&[], Vec::as_slice)
    }

    pub fn doc_of_col(&self, col: ColId) -> Option<DocId> {
        self.col_to_doc.get(col.get() as usize).copied()
    }

    pub fn vec_of_name(&self, name: &str) -> Option<VecId> {
        self.name_to_vec.get(name).copied()
    }

    pub fn cols_of_vec(&self, vec: VecId) -> &[ColId] {
        self.vec_to_cols
            .get(vec.get() as usize)
            .map_or(&[], Vec::as_slice)
    }

    /// Is `col` in the histogram-bearing prefix `[0, num_hists)`?
    pub fn has_histogram(&self, col: ColId) -> bool {
        col.get() < self.num_hists
    }

    /// `col` reinterpreted as a [`HistId`] when it lies in the prefix,
    /// `None` otherwise. This is the "drop ColIds >= num_hists" rule
    /// used throughout the prefiltering converters.
    pub fn col_to_hist(&self, col: ColId) -> Option<HistId> {
        self.has_histogram(col).then(|| HistId(col.get()))
    }

    /// Map a sorted, deduplicated `DocId` array to the sorted,
    /// deduplicated `ColId` array of all columns belonging to those
    /// documents.
    pub fn docs_to_cols(&self, docs: &[DocId]) -> Vec<ColId> {
        let mut cols: Vec<ColId> = docs.iter().flat_map(|d| self.cols_of_doc(*d)).copied().collect();
        cols.sort_unstable();
        cols.dedup();
        cols
    }

    /// Map a sorted, deduplicated `ColId` array to the sorted,
    /// deduplicated `HistId` array, dropping any ColId >= num_hists
    /// (the explicit resolution of the ColScope-negation open question:
    /// negation complements against the full column universe, so
    /// downstream percentile filters may see non-histogram ColIds that
    /// must be dropped here).
    pub fn cols_to_hists(&self, cols: &[ColId]) -> Vec<HistId> {
        let mut hists: Vec<HistId> = cols.iter().filter_map(|c| self.col_to_hist(*c)).collect();
        hists.sort_unstable();
        hists.dedup();
        hists
    }

    /// Map a sorted, deduplicated `DocId` array directly to the sorted,
    /// deduplicated `HistId` array of histogram-bearing columns
    /// belonging to those documents.
    pub fn docs_to_hists(&self, docs: &[DocId]) -> Vec<HistId> {
        self.cols_to_hists(&self.docs_to_cols(docs))
    }

    /// Lift a sorted, deduplicated `ColId` array to the sorted,
    /// deduplicated `DocId` array of datasets owning those columns.
    pub fn cols_to_docs(&self, cols: &[ColId]) -> Vec<DocId> {
        let mut docs: Vec<DocId> = cols.iter().filter_map(|c| self.doc_of_col(*c)).collect();
        docs.sort_unstable();
        docs.dedup();
        docs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Metadata {
        // doc 0 -> cols {0, 1}; doc 1 -> cols {2}; num_hists = 2 (col 2 has no histogram)
        Metadata::from_tables(
            vec![vec![ColId(0), ColId(1)], vec![ColId(2)]],
            vec![DocId(0), DocId(0), DocId(1)],
            HashMap::new(),
            vec![],
            2,
        )
        .unwrap()
    }

    #[test]
    fn rejects_dangling_doc_reference() {
        let err = Metadata::from_tables(
            vec![vec![ColId(0)]],
            vec![DocId(5)],
            HashMap::new(),
            vec![],
            0,
        )
        .unwrap_err();
        assert!(matches!(err, MetadataError::DanglingDocRef { .. }));
    }

    #[test]
    fn rejects_missing_back_reference() {
        let err = Metadata::from_tables(
            vec![vec![ColId(7)]],
            vec![DocId(0)],
            HashMap::new(),
            vec![],
            0,
        )
        .unwrap_err();
        assert!(matches!(err, MetadataError::MissingBackReference { .. }));
    }

    #[test]
    fn cols_to_hists_drops_non_histogram_columns() {
        let meta = sample();
        let hists = meta.cols_to_hists(&[ColId(0), ColId(1), ColId(2)]);
        assert_eq!(hists, vec![HistId(0), HistId(1)]);
    }

    #[test]
    fn docs_to_hists_round_trips_through_cols() {
        let meta = sample();
        assert_eq!(meta.docs_to_hists(&[DocId(1)]), Vec::<HistId>::new());
        assert_eq!(meta.docs_to_hists(&[DocId(0)]), vec![HistId(0), HistId(1)]);
    }

    #[test]
    fn cols_to_docs_dedups() {
        let meta = sample();
        assert_eq!(meta.cols_to_docs(&[ColId(0), ColId(1)]), vec![DocId(0)]);
    }
}
