use std::{cmp::Ordering, collections::HashMap};

use crate::RetrievedChunk;

/// Configuration for weighted reciprocal rank fusion.
#[derive(Debug, Clone, Copy)]
pub struct RrfConfig {
    pub k: f32,
}

impl Default for RrfConfig {
    fn default() -> Self {
        Self { k: 60.0 }
    }
}

/// One retriever's ranked output and the weight its ranks carry.
#[derive(Debug, Clone)]
pub struct RankedList {
    pub weight: f32,
    pub hits: Vec<RetrievedChunk>,
}

fn sanitize_weight(weight: f32) -> f32 {
    if weight.is_finite() {
        weight.max(0.0)
    } else {
        0.0
    }
}

/// Merges ranked lists into one, scoring each chunk `Σ weight / (k + rank)`
/// over the lists containing it, with 1-based ranks.
///
/// Chunks are keyed by id. The input order of each list is its ranking;
/// scores within the lists are ignored. Equal fused scores keep the order
/// in which chunks were first seen, walking lists in order.
pub fn weighted_rank_fusion(lists: Vec<RankedList>, config: RrfConfig) -> Vec<RetrievedChunk> {
    let k = if config.k <= 0.0 || !config.k.is_finite() {
        60.0
    } else {
        config.k
    };

    let mut merged: Vec<RetrievedChunk> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for list in lists {
        let weight = sanitize_weight(list.weight);
        for (rank, candidate) in list.hits.into_iter().enumerate() {
            let contribution = weight / (k + rank as f32 + 1.0);
            match positions.get(&candidate.chunk.id) {
                Some(&position) => {
                    if let Some(existing) = merged.get_mut(position) {
                        existing.score += contribution;
                    }
                }
                None => {
                    positions.insert(candidate.chunk.id.clone(), merged.len());
                    merged.push(RetrievedChunk {
                        chunk: candidate.chunk,
                        score: contribution,
                    });
                }
            }
        }
    }

    // Stable sort keeps first-seen order among ties.
    merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    merged
}
