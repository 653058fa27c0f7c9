use serde::Serialize;

use crate::players::PlayerDirectory;
use crate::similarity::{common_player_count, similarity};
use crate::squad::{resolve, PlayerSet, RawSquad};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult<I> {
    pub candidate_identifier: I,
    pub similarity_score: f64,
    pub common_player_count: usize,
}

/// Scores every candidate against `user_set` and keeps the best `top_n`.
///
/// Candidates that resolve to nothing still take part (scoring `0.0`). Equal scores keep
/// their input order. Nothing here touches `directory` beyond reads.
pub fn rank<I: Clone>(
    user_set: &PlayerSet,
    candidates: &[(I, RawSquad)],
    directory: &PlayerDirectory,
    top_n: usize,
) -> Vec<ComparisonResult<I>> {
    let mut results: Vec<ComparisonResult<I>> = candidates
        .iter()
        .map(|(id, squad)| {
            let candidate_set = resolve(squad, directory);
            ComparisonResult {
                candidate_identifier: id.clone(),
                similarity_score: similarity(user_set, &candidate_set),
                common_player_count: common_player_count(user_set, &candidate_set),
            }
        })
        .collect();

    // `sort_by` is stable, which is the tie-break.
    results.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
    results.truncate(top_n);
    results
}
