//! Weighted random choice among a Url's mock contents.
//!
//! Weights are the contents' `randomness`, negatives counted as zero. When
//! every weight is zero each content is equally likely.

use crate::metrics;
use crate::model::MockContent;
use rand::Rng;
use tracing::warn;

fn weight(content: &MockContent) -> u64 {
    content.randomness.max(0) as u64
}

/// Pick one content, `None` only for an empty slice.
pub fn select<'a, R: Rng + ?Sized>(
    candidates: &'a [MockContent],
    rng: &mut R,
) -> Option<&'a MockContent> {
    if candidates.is_empty() {
        return None;
    }

    let total = candidates
        .iter()
        .map(weight)
        .fold(0u64, |acc, w| acc.saturating_add(w));
    if total == 0 {
        return candidates.get(rng.gen_range(0..candidates.len()));
    }

    let r = rng.gen_range(0..total);
    let mut cumulative = 0u64;
    for content in candidates {
        cumulative = cumulative.saturating_add(weight(content));
        if r < cumulative {
            return Some(content);
        }
    }

    // Unreachable while r < total and the running sum reaches total.
    debug_assert!(false, "weighted walk ended without a match");
    warn!(total, r, "Weighted selection fell through, choosing uniformly");
    metrics::record_selection_fallback();
    candidates.get(rng.gen_range(0..candidates.len()))
}

/// [`select`] with the thread-local generator.
pub fn select_random(candidates: &[MockContent]) -> Option<&MockContent> {
    select(candidates, &mut rand::thread_rng())
}
