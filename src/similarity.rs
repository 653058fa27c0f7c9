use crate::squad::PlayerSet;

/// Jaccard overlap as a percentage in `[0.0, 100.0]`, one decimal place.
/// Either side empty scores exactly `0.0`.
pub fn similarity(a: &PlayerSet, b: &PlayerSet) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let common = common_player_count(a, b);
    let union = a.len() + b.len() - common;
    round_one_decimal(100.0 * common as f64 / union as f64)
}

pub fn common_player_count(a: &PlayerSet, b: &PlayerSet) -> usize {
    a.intersection(b).count()
}

/// Half away from zero.
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
