//! Weighted verse sampling with recency de-boost.
//!
//! The feed should feel fresh: verses shown recently or often are
//! de-prioritized, and a verse unseen for a full week regains its original
//! weight no matter how many times it has appeared. Selection is without
//! replacement — a single call never yields the same verse twice.
//!
//! With no history at all (cold start) sampling degenerates to uniform
//! without replacement, which is also the cheap path.

use rand::Rng;
use std::collections::HashMap;

use daily_bread_api::Verse;

use crate::store::VerseHistory;

/// Hours of absence after which a verse's decay factor is fully restored.
pub const DECAY_WINDOW_HOURS: f64 = 168.0;

/// Floor on the decay factor. Keeps a just-shown verse selectable at low
/// probability instead of locking it out entirely.
pub const DECAY_FLOOR: f64 = 0.01;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Select up to `n` verses from `pool` without duplicates.
///
/// Output length is exactly `min(n, pool.len())`. An empty `history` means
/// uniform sampling; otherwise each verse's probability is proportional to
/// [`sample_weight`].
pub fn sample(
    pool: Vec<Verse>,
    n: usize,
    history: &HashMap<String, VerseHistory>,
    now_millis: i64,
    rng: &mut impl Rng,
) -> Vec<Verse> {
    if history.is_empty() {
        uniform_sample(pool, n, rng)
    } else {
        weighted_sample(pool, n, history, now_millis, rng)
    }
}

/// Sampling weight for one verse.
///
/// `1/(1 + seen_count)` de-boosts frequency; the decay factor
/// `hours_since_last_seen / 168` (clamped to `[0.01, 1]`) de-boosts
/// recency. A verse with no history record weighs 1.0 — never shown means
/// maximum priority.
pub fn sample_weight(entry: Option<&VerseHistory>, now_millis: i64) -> f64 {
    match entry {
        None => 1.0,
        Some(history) => {
            let hours_since = (now_millis - history.last_seen_at) as f64 / MILLIS_PER_HOUR;
            let decay = (hours_since / DECAY_WINDOW_HOURS).clamp(DECAY_FLOOR, 1.0);
            1.0 / (1.0 + history.seen_count as f64) * decay
        }
    }
}

/// Uniform without replacement: pick a random index, swap-remove.
fn uniform_sample(mut pool: Vec<Verse>, n: usize, rng: &mut impl Rng) -> Vec<Verse> {
    let mut picked = Vec::with_capacity(n.min(pool.len()));
    while picked.len() < n && !pool.is_empty() {
        let index = rng.gen_range(0..pool.len());
        picked.push(pool.swap_remove(index));
    }
    picked
}

/// Weighted without replacement: each draw walks the remaining candidates
/// subtracting weights until the drawn value is exhausted.
fn weighted_sample(
    pool: Vec<Verse>,
    n: usize,
    history: &HashMap<String, VerseHistory>,
    now_millis: i64,
    rng: &mut impl Rng,
) -> Vec<Verse> {
    let mut candidates: Vec<(Verse, f64)> = pool
        .into_iter()
        .map(|verse| {
            let weight = sample_weight(history.get(&verse.id), now_millis);
            (verse, weight)
        })
        .collect();

    let mut picked = Vec::with_capacity(n.min(candidates.len()));
    while picked.len() < n && !candidates.is_empty() {
        let total: f64 = candidates.iter().map(|(_, w)| w).sum();
        let mut draw = rng.r#gen::<f64>() * total;

        // If accumulated floating-point error exhausts `draw` past the end
        // of the walk, the last remaining candidate is chosen; every draw
        // must land somewhere.
        let mut chosen = candidates.len() - 1;
        for (index, (_, weight)) in candidates.iter().enumerate() {
            draw -= weight;
            if draw <= 0.0 {
                chosen = index;
                break;
            }
        }

        picked.push(candidates.swap_remove(chosen).0);
    }
    picked
}
