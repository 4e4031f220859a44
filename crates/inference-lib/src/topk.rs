//! Top-K flagging over a batch's probability column

use std::cmp::Ordering;

/// Flag the `k` rows with the highest probability.
///
/// Returns `None` when `k == 0` (flagging disabled, no flag column). Ties are
/// broken by the lower row index and NaN ranks below every number, so the
/// result is deterministic. `k >= probabilities.len()` flags every row.
pub fn top_k_flags(probabilities: &[f64], k: usize) -> Option<Vec<u8>> {
    if k == 0 {
        return None;
    }

    let mut flags = vec![0u8; probabilities.len()];
    if k >= probabilities.len() {
        flags.fill(1);
        return Some(flags);
    }

    let mut order: Vec<usize> = (0..probabilities.len()).collect();
    // Stable sort keeps lower indices first among equal scores
    order.sort_by(|&a, &b| descending(probabilities[a], probabilities[b]));

    for &idx in order.iter().take(k) {
        flags[idx] = 1;
    }
    Some(flags)
}

fn descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}
