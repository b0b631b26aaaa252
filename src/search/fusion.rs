use std::collections::{HashMap, HashSet};

use crate::models::{RankedCandidate, ScoredDocument};

/// RRF smoothing constant.
pub const RRF_K: f64 = 60.0;

/// Per-retriever weights applied to each RRF contribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub keyword: f64,
    pub vector: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            keyword: 1.0,
            vector: 1.0,
        }
    }
}

/// Reciprocal Rank Fusion of a keyword list and a vector list.
///
/// Each appearance at 0-based rank `r` adds `weight / (r + 60)` to the
/// document's fused score, keyed by `section_id`. Only rank positions are
/// used; the retrievers' raw scores are never compared.
///
/// - Documents without a `section_id` are skipped.
/// - A `section_id` repeated inside one list counts once (first occurrence).
/// - Equal fused scores keep first-seen order: keyword list, then vector list.
pub fn rrf_fuse(
    keyword_results: &[ScoredDocument],
    vector_results: &[ScoredDocument],
    weights: FusionWeights,
    limit: usize,
) -> Vec<RankedCandidate> {
    let mut fused: Vec<RankedCandidate> = Vec::new();
    let mut slot_of: HashMap<String, usize> = HashMap::new();

    accumulate(&mut fused, &mut slot_of, keyword_results, weights.keyword, "keyword");
    accumulate(&mut fused, &mut slot_of, vector_results, weights.vector, "vector");

    // Stable sort: ties stay in first-seen order
    fused.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    fused.truncate(limit);
    fused
}

fn accumulate(
    fused: &mut Vec<RankedCandidate>,
    slot_of: &mut HashMap<String, usize>,
    results: &[ScoredDocument],
    weight: f64,
    list: &str,
) {
    let mut seen_in_list: HashSet<&str> = HashSet::new();

    for (rank, hit) in results.iter().enumerate() {
        let Some(section_id) = hit.document.section_id() else {
            tracing::debug!("Skipping {list} hit at rank {rank} without section_id");
            continue;
        };

        if !seen_in_list.insert(section_id) {
            tracing::warn!(
                "Duplicate section_id '{section_id}' at rank {rank} in {list} results; ignoring"
            );
            continue;
        }

        let contribution = weight / (rank as f64 + RRF_K);

        match slot_of.get(section_id) {
            Some(&slot) => fused[slot].fused_score += contribution,
            None => {
                slot_of.insert(section_id.to_string(), fused.len());
                fused.push(RankedCandidate {
                    document: hit.document.clone(),
                    fused_score: contribution,
                });
            }
        }
    }
}
