//! "Did you mean" candidate ranking for unresolved symbol diagnostics.

use smol_str::SmolStr;

/// At most this many suggestions accompany an unresolved symbol error.
pub const MAX_SUGGESTIONS: usize = 5;

fn shared_prefix(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count()
}

fn weight(needle: &str, candidate: &str) -> i64 {
    let needle_lower = needle.to_ascii_lowercase();
    let candidate_lower = candidate.to_ascii_lowercase();
    let mut score = shared_prefix(&needle_lower, &candidate_lower) as i64 * 2;
    if candidate_lower.contains(&needle_lower) || needle_lower.contains(&candidate_lower) {
        score += 3;
    }
    score -= (needle.len() as i64 - candidate.len() as i64).abs();
    score
}

/// Rank `candidates` by closeness to `needle` and keep the best few.
///
/// Only candidates with a positive score survive; an unrelated table never
/// produces noise suggestions.
pub fn rank(needle: &str, candidates: impl IntoIterator<Item = SmolStr>) -> Vec<SmolStr> {
    let mut scored: Vec<(i64, SmolStr)> = candidates
        .into_iter()
        .map(|candidate| (weight(needle, &candidate), candidate))
        .filter(|(score, _)| *score > 0)
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    scored.dedup_by(|a, b| a.1 == b.1);
    scored.truncate(MAX_SUGGESTIONS);
    scored.into_iter().map(|(_, candidate)| candidate).collect()
}
