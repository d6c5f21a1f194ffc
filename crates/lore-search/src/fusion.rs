//! Reciprocal Rank Fusion (RRF).
//!
//! Combines keyword and vector rankings by summing `1 / (k + rank)` over the
//! lists a chunk appears in, with 1-based ranks.

use std::cmp::Ordering;
use std::collections::HashMap;

use lore_core::ChunkId;

/// Default RRF constant.
pub const DEFAULT_RRF_K: usize = 60;

/// A chunk's fused score and the ranks it held in each input list.
#[derive(Debug, Clone, PartialEq)]
pub struct Fused {
    /// The chunk.
    pub chunk_id: ChunkId,
    /// Sum of reciprocal-rank contributions.
    pub score: f64,
    /// 1-based rank in the keyword list, if present.
    pub keyword_rank: Option<usize>,
    /// 1-based rank in the vector list, if present.
    pub vector_rank: Option<usize>,
}

fn contribution(rank: Option<usize>, k: usize) -> f64 {
    rank.map_or(0.0, |r| 1.0 / (k as f64 + r as f64))
}

/// Fuse two ranked id lists, best first.
///
/// Equal scores are ordered by keyword rank (missing ranks last) and then by
/// chunk id, so output never depends on hash order.
///
/// # Examples
///
/// ```
/// use lore_search::fusion::reciprocal_rank_fusion;
///
/// let fused = reciprocal_rank_fusion(&[5, 2, 9], &[2, 5, 1], 60);
/// let order: Vec<usize> = fused.iter().map(|f| f.chunk_id).collect();
/// assert_eq!(order, vec![5, 2, 9, 1]);
///
/// assert!(reciprocal_rank_fusion(&[], &[], 60).is_empty());
/// ```
pub fn reciprocal_rank_fusion(keyword: &[ChunkId], vector: &[ChunkId], k: usize) -> Vec<Fused> {
    let mut ranks: HashMap<ChunkId, (Option<usize>, Option<usize>)> = HashMap::new();

    // Duplicate ids keep their best rank
    for (i, &id) in keyword.iter().enumerate() {
        ranks.entry(id).or_default().0.get_or_insert(i + 1);
    }
    for (i, &id) in vector.iter().enumerate() {
        ranks.entry(id).or_default().1.get_or_insert(i + 1);
    }

    let mut fused: Vec<Fused> = ranks
        .into_iter()
        .map(|(chunk_id, (keyword_rank, vector_rank))| Fused {
            chunk_id,
            score: contribution(keyword_rank, k) + contribution(vector_rank, k),
            keyword_rank,
            vector_rank,
        })
        .collect();

    fused.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| cmp_rank(a.keyword_rank, b.keyword_rank))
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });

    fused
}

/// Present ranks sort before missing ones; lower ranks first.
fn cmp_rank(a: Option<usize>, b: Option<usize>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
