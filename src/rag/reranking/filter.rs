// Threshold filtering over scored passages
use std::cmp::Ordering;

use crate::types::Passage;

/// Best score first; ties keep retrieval order
fn by_score_then_position(a: &Passage, b: &Passage) -> Ordering {
    b.effective_score()
        .partial_cmp(&a.effective_score())
        .unwrap_or(Ordering::Equal)
        .then(a.position.cmp(&b.position))
}

/// Keep passages scoring at or above `threshold`, best first, at most `k`
///
/// When nothing clears the threshold the single best-scoring passage is
/// returned instead of an empty list. Applying the filter to its own
/// output returns the same list.
pub fn filter_by_threshold(passages: Vec<Passage>, threshold: f32, k: usize) -> Vec<Passage> {
    if passages.is_empty() || k == 0 {
        return Vec::new();
    }

    let (mut kept, rejected): (Vec<Passage>, Vec<Passage>) = passages
        .into_iter()
        .partition(|p| p.effective_score() >= threshold);

    if kept.is_empty() {
        return rejected
            .into_iter()
            .min_by(by_score_then_position)
            .into_iter()
            .collect();
    }

    kept.sort_by(by_score_then_position);
    kept.truncate(k);
    kept
}
