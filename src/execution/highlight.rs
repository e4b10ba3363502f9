//! Highlight merging across AND/OR combination.
//!
//! A document's per-field highlight is an HTML snippet with `<mark>`
//! spans around matched terms. Combining two sides of a junction means
//! taking one side's snippet as the base and re-marking any word the
//! other side marked but this side's snippet left plain, detected by
//! scanning the other side's `<mark>(.*?)</mark>` spans.
//!
//! A field highlighted on only one side of the junction is kept
//! (matching the symmetric "one side empty, use the other" rule applied
//! everywhere else in this merge) rather than silently dropped.

use crate::ast::Highlights;
use crate::ids::DocId;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn mark_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<mark>(.*?)</mark>").expect("valid regex"))
}

fn merge_field(left_text: &str, right_text: &str) -> String {
    if left_text.is_empty() {
        return right_text.to_string();
    }
    if right_text.is_empty() {
        return left_text.to_string();
    }
    let right_marks: HashSet<&str> = mark_regex().captures_iter(right_text).map(|c| c.get(1).unwrap().as_str()).collect();
    let mut merged = left_text.to_string();
    for word in right_marks {
        let marked = format!("<mark>{word}</mark>");
        if !merged.contains(&marked) {
            merged = merged.replace(word, &marked);
        }
    }
    merged
}

pub fn merge_doc_highlights(left: &Highlights, right: &Highlights, doc_ids: &[DocId], metadata: &crate::ids::Metadata) -> Highlights {
    let mut docs = std::collections::HashMap::new();
    for &doc_id in doc_ids {
        let left_fields = left.docs.get(&doc_id);
        let right_fields = right.docs.get(&doc_id);
        if left_fields.is_none() && right_fields.is_none() {
            continue;
        }
        let mut keys: Vec<&String> = left_fields.into_iter().flat_map(|f| f.keys()).collect();
        if let Some(f) = right_fields {
            for k in f.keys() {
                if !keys.contains(&k) {
                    keys.push(k);
                }
            }
        }
        let mut merged_fields = std::collections::HashMap::new();
        for key in keys {
            let left_text = left_fields.and_then(|f| f.get(key)).map_or("", String::as_str);
            let right_text = right_fields.and_then(|f| f.get(key)).map_or("", String::as_str);
            merged_fields.insert(key.clone(), merge_field(left_text, right_text));
        }
        if !merged_fields.is_empty() {
            docs.insert(doc_id, merged_fields);
        }
    }

    let unioned_cols = super::union_sorted(&left.cols, &right.cols);
    let allowed_cols = metadata.docs_to_cols(doc_ids);
    let cols = super::intersect_sorted(&unioned_cols, &allowed_cols);

    Highlights { docs, cols }
}
