//! Reference name index: exact lookup plus an HNSW-backed approximate
//! nearest-neighbor search over synthetic column-name embeddings.
//!
//! Vectors are owned by the index (not borrowed from a caller-held
//! arena), and the graph borrows them through a `'static` reference
//! obtained by an `unsafe` transmute of an `Arc`-backed slice. That
//! transmute is sound: the `Arc` is moved into the same struct as the
//! graph that borrows it, struct fields drop in declaration order so
//! the graph is dropped before the storage it points into, and no code
//! path ever clones `_storage` out on its own. This index is built once
//! at construction and never mutated, so there is no tombstone or
//! rebuild bookkeeping to get wrong.

use super::NameIndex;
use crate::error::EngineResult;
use crate::ids::{ColId, VecId};
use hnsw_rs::hnsw::Hnsw;
use hnsw_rs::prelude::*;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

const EMBEDDING_DIM: usize = 64;
const NGRAM_SIZE: usize = 3;

/// Hashed bag-of-character-trigram embedding, a synthetic stand-in for
/// a real column-name embedding model. Deterministic and dependency-
/// free, sufficient to exercise k-NN behavior (similar names collide
/// on shared trigrams and land close together after normalization).
pub fn embed_name(name: &str) -> Vec<f32> {
    let lower = name.to_lowercase();
    let chars: Vec<char> = lower.chars().collect();
    let mut v = vec![0f32; EMBEDDING_DIM];

    let hash_into = |gram: &str, v: &mut [f32]| {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        gram.hash(&mut hasher);
        let h = hasher.finish();
        let idx = (h % v.len() as u64) as usize;
        let sign = if (h >> 63) & 1 == 1 { 1.0 } else { -1.0 };
        v[idx] += sign;
    };

    if chars.len() < NGRAM_SIZE {
        hash_into(&lower, &mut v);
    } else {
        for window in chars.windows(NGRAM_SIZE) {
            let gram: String = window.iter().collect();
            hash_into(&gram, &mut v);
        }
    }
    normalize(&mut v);
    v
}

fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-10 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

struct Entry {
    name: String,
    cols: Vec<ColId>,
}

struct HnswInnerOwned {
    hnsw: Box<Hnsw<'static, f32, DistL2>>,
    _storage: Arc<Vec<Vec<f32>>>,
    index_to_vec: Vec<VecId>,
}

unsafe impl Send for HnswInnerOwned {}
unsafe impl Sync for HnswInnerOwned {}

pub struct HnswNameIndex {
    entries: Vec<Entry>,
    name_to_vec: HashMap<String, VecId>,
    inner: RwLock<Option<HnswInnerOwned>>,
}

impl HnswNameIndex {
    /// Build the index from the full `(name, columns-with-that-name)`
    /// vocabulary, one entry per distinct name.
    pub fn new(entries: Vec<(String, Vec<ColId>)>) -> Self {
        let mut name_to_vec = HashMap::with_capacity(entries.len());
        let entries: Vec<Entry> = entries
            .into_iter()
            .enumerate()
            .map(|(i, (name, cols))| {
                name_to_vec.insert(name.clone(), VecId::new(i as u32));
                Entry { name, cols }
            })
            .collect();

        let index = Self { entries, name_to_vec, inner: RwLock::new(None) };
        index.rebuild_hnsw();
        index
    }

    fn rebuild_hnsw(&self) {
        if self.entries.is_empty() {
            *self.inner.write() = None;
            return;
        }

        let embeddings: Vec<Vec<f32>> = self.entries.iter().map(|e| embed_name(&e.name)).collect();
        let index_to_vec: Vec<VecId> = (0..self.entries.len() as u32).map(VecId::new).collect();
        let storage = Arc::new(embeddings);

        // SAFETY: `storage` is moved into `HnswInnerOwned::_storage` below,
        // keeping the Arc's refcount >= 1 for as long as `hnsw` (which
        // borrows through this reference) is alive. Struct fields drop
        // in declaration order, so `hnsw` is dropped before `_storage`.
        // The write lock below replaces the whole `Option` atomically, so
        // no reader ever observes a half-updated pair.
        let storage_ref: &'static Vec<Vec<f32>> =
            unsafe { &*Arc::as_ptr(&storage).cast::<Vec<Vec<f32>>>() };

        let max_elements = storage_ref.len();
        let max_layer = if max_elements <= 1 {
            4
        } else {
            let m = 16.0_f64;
            let layers = ((max_elements as f64).ln() / m.ln()).ceil() as usize;
            layers.clamp(4, 16)
        };
        let mut hnsw: Hnsw<'static, f32, DistL2> = Hnsw::new(16, max_elements, max_layer, 100, DistL2);
        hnsw.set_keeping_pruned(true);
        hnsw.set_extend_candidates(true);

        for (idx, vec) in storage_ref.iter().enumerate() {
            hnsw.insert((vec, idx));
        }

        *self.inner.write() = Some(HnswInnerOwned { hnsw: Box::new(hnsw), _storage: storage, index_to_vec });
    }

    fn cosine_knn(&self, query: &[f32], k: usize) -> Vec<VecId> {
        let guard = self.inner.read();
        let Some(inner) = guard.as_ref() else {
            return Vec::new();
        };
        let ef_search = (k * 4).max(64);
        inner
            .hnsw
            .search(query, k, ef_search)
            .into_iter()
            .filter_map(|neighbour| inner.index_to_vec.get(neighbour.d_id).copied())
            .collect()
    }
}

impl NameIndex for HnswNameIndex {
    fn search(&self, name: &str, k: i64, filter: Option<&[ColId]>) -> EngineResult<Vec<ColId>> {
        let exact_vec = self.name_to_vec.get(name).copied();

        let matched_vecs: Vec<VecId> = if k <= 0 {
            exact_vec.into_iter().collect()
        } else {
            let effective_k = if exact_vec.is_some() { k as usize + 1 } else { k as usize };
            let query = embed_name(name);
            self.cosine_knn(&query, effective_k)
        };

        let mut cols: Vec<ColId> = matched_vecs
            .into_iter()
            .flat_map(|v| self.entries[v.get() as usize].cols.iter().copied())
            .collect();
        cols.sort_unstable();
        cols.dedup();

        if let Some(allowed) = filter {
            let allowed_set: std::collections::HashSet<ColId> = allowed.iter().copied().collect();
            cols.retain(|c| allowed_set.contains(c));
        }

        Ok(cols)
    }
}
