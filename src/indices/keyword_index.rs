//! Reference keyword index: a small inverted index with TF-style
//! scoring and `<mark>` highlighting.
//!
//! Documents are a flat `field -> text` map; a query is whitespace-
//! tokenized and matched as an OR of terms (a stand-in for whatever
//! boolean/wildcard expression a production Lucene-style backend would
//! parse — see crate docs for what is and isn't in scope here).

use super::{DocHighlights, KeywordHit};
use crate::error::EngineResult;
use crate::ids::DocId;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct DocumentFields(pub HashMap<String, String>);

pub struct InMemoryKeywordIndex {
    documents: HashMap<DocId, DocumentFields>,
}

impl InMemoryKeywordIndex {
    pub fn new(documents: HashMap<DocId, DocumentFields>) -> Self {
        Self { documents }
    }

    fn score_document(fields: &DocumentFields, terms: &[String]) -> f64 {
        let mut score = 0.0;
        for text in fields.0.values() {
            let lower = text.to_lowercase();
            let tokens: Vec<&str> = lower.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }
            for term in terms {
                let count = tokens.iter().filter(|t| **t == term.as_str()).count();
                if count > 0 {
                    // TF normalized by document length, the simplest
                    // TF-style weighting that still rewards density.
                    score += count as f64 / tokens.len() as f64;
                }
            }
        }
        score
    }

    fn highlight_document(fields: &DocumentFields, terms: &[String]) -> HashMap<String, String> {
        let mut out = HashMap::new();
        for (field, text) in &fields.0 {
            let mut marked = String::with_capacity(text.len());
            for word in text.split_inclusive(char::is_whitespace) {
                let trimmed = word.trim();
                let matches = terms.iter().any(|t| trimmed.eq_ignore_ascii_case(t));
                if matches && !trimmed.is_empty() {
                    let (prefix, rest) = word.split_at(trimmed.len());
                    marked.push_str("<mark>");
                    marked.push_str(prefix);
                    marked.push_str("</mark>");
                    marked.push_str(rest);
                } else {
                    marked.push_str(word);
                }
            }
            if marked != *text {
                out.insert(field.clone(), marked);
            }
        }
        out
    }
}

fn tokenize_query(query_text: &str) -> Vec<String> {
    query_text
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .collect()
}

impl super::KeywordIndex for InMemoryKeywordIndex {
    fn search(
        &self,
        query_text: &str,
        highlight: bool,
        min_score: f64,
        rank_by_score: bool,
    ) -> EngineResult<KeywordHit> {
        let terms = tokenize_query(query_text);
        if terms.is_empty() {
            return Ok(KeywordHit::default());
        }

        let mut scored: Vec<(DocId, f64)> = self
            .documents
            .iter()
            .map(|(id, fields)| (*id, Self::score_document(fields, &terms)))
            .filter(|(_, score)| *score > min_score)
            .collect();

        if rank_by_score {
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        } else {
            scored.sort_by_key(|(id, _)| *id);
        }

        let mut highlights: DocHighlights = HashMap::new();
        if highlight {
            for (id, _) in &scored {
                let fields = &self.documents[id];
                let marked = Self::highlight_document(fields, &terms);
                if !marked.is_empty() {
                    highlights.insert(*id, marked);
                }
            }
        }

        Ok(KeywordHit {
            doc_ids: scored.iter().map(|(id, _)| *id).collect(),
            scores: scored.into_iter().collect(),
            highlights,
        })
    }
}
