use super::AppState;
use crate::types::*;
use std::collections::HashMap;

/// `count / total * 100`, rounded to one decimal; 0 for an empty ledger
pub fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 * 1000.0 / total as f64).round() / 10.0
}

/// Build the ranked tally for `roster` from a set of ledger entries.
///
/// Every roster candidate appears, zero-vote ones included. Ranking is by
/// vote count descending, ties broken by candidate id ascending.
pub fn tally<'a>(roster: &[Candidate], votes: impl IntoIterator<Item = &'a Vote>) -> ResultsSummary {
    let mut counts: HashMap<&str, u64> = roster.iter().map(|c| (c.id.as_str(), 0)).collect();

    for vote in votes {
        // Ledger entries are validated on insert; skip anything that slipped past
        if let Some(count) = counts.get_mut(vote.candidate_id.as_str()) {
            *count += 1;
        }
    }

    let total_votes: u64 = counts.values().sum();

    let mut results: Vec<ResultTally> = roster
        .iter()
        .map(|candidate| {
            let vote_count = counts.get(candidate.id.as_str()).copied().unwrap_or(0);
            ResultTally {
                candidate_id: candidate.id.clone(),
                candidate_name: candidate.name.clone(),
                party: candidate.party.clone(),
                party_color: candidate.party_color.clone(),
                vote_count,
                percentage: percentage(vote_count, total_votes),
            }
        })
        .collect();

    results.sort_by(|a, b| {
        b.vote_count
            .cmp(&a.vote_count)
            .then_with(|| a.candidate_id.cmp(&b.candidate_id))
    });

    ResultsSummary {
        total_votes,
        results,
    }
}

impl AppState {
    /// Aggregate the current ledger into ranked results
    pub async fn get_results(&self) -> ResultsSummary {
        let votes = self.votes.read().await;
        tally(&self.roster, votes.values())
    }
}
