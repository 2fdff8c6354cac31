use super::AppState;
use crate::error::{ElectionError, ElectionResult};
use crate::types::*;
use sha2::{Digest, Sha256};
use std::collections::hash_map::Entry;

/// Longest voter token the ledger accepts
pub const MAX_TOKEN_LEN: usize = 128;

/// Reject tokens that cannot have come from a well-behaved client
pub fn validate_token(token: &str) -> ElectionResult<()> {
    if token.is_empty() {
        return Err(ElectionError::InvalidToken("token is empty"));
    }
    if token.len() > MAX_TOKEN_LEN {
        return Err(ElectionError::InvalidToken("token is too long"));
    }
    if token.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ElectionError::InvalidToken("token contains whitespace"));
    }
    Ok(())
}

/// Short stable fingerprint so logs never carry the raw token
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(&digest[..6])
}

impl AppState {
    /// Record a vote for `candidate_id`.
    ///
    /// The duplicate check and the insert happen under one write guard, so two
    /// racing submissions with the same token cannot both land in the ledger.
    pub async fn submit_vote(&self, candidate_id: &str, voter_token: &str) -> ElectionResult<Vote> {
        validate_token(voter_token)?;

        if self.get_candidate(candidate_id).is_none() {
            tracing::warn!(candidate_id, "Vote for unknown candidate rejected");
            return Err(ElectionError::UnknownCandidate(candidate_id.to_string()));
        }

        let mut votes = self.votes.write().await;
        match votes.entry(voter_token.to_string()) {
            Entry::Occupied(_) => {
                tracing::info!(
                    voter = %token_fingerprint(voter_token),
                    "Duplicate vote rejected"
                );
                Err(ElectionError::DuplicateVote)
            }
            Entry::Vacant(slot) => {
                let vote = Vote {
                    id: ulid::Ulid::new().to_string(),
                    candidate_id: candidate_id.to_string(),
                    voter_token: voter_token.to_string(),
                    cast_at: chrono::Utc::now().to_rfc3339(),
                };
                slot.insert(vote.clone());
                self.bump_ledger_version();

                tracing::info!(
                    voter = %token_fingerprint(voter_token),
                    candidate_id,
                    total = votes.len(),
                    "Vote recorded"
                );
                Ok(vote)
            }
        }
    }

    /// Whether `voter_token` already has a ledger entry, and for whom
    pub async fn check_vote_status(&self, voter_token: &str) -> VoteStatus {
        match self.votes.read().await.get(voter_token) {
            Some(vote) => VoteStatus {
                has_voted: true,
                candidate_id: Some(vote.candidate_id.clone()),
            },
            None => VoteStatus::default(),
        }
    }

    pub async fn total_votes(&self) -> u64 {
        self.votes.read().await.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::candidate;
    use std::sync::Arc;

    fn state() -> AppState {
        AppState::try_new(vec![candidate("a"), candidate("b")]).unwrap()
    }

    #[tokio::test]
    async fn test_submit_vote_records_entry() {
        let state = state();
        let vote = state.submit_vote("a", "voter_1").await.unwrap();

        assert_eq!(vote.candidate_id, "a");
        assert_eq!(vote.voter_token, "voter_1");
        assert!(chrono::DateTime::parse_from_rfc3339(&vote.cast_at).is_ok());
        assert_eq!(state.total_votes().await, 1);
    }

    #[tokio::test]
    async fn test_same_token_votes_once() {
        let state = state();

        assert!(state.submit_vote("a", "voter_1").await.is_ok());
        assert_eq!(
            state.submit_vote("b", "voter_1").await,
            Err(ElectionError::DuplicateVote)
        );
        assert_eq!(
            state.submit_vote("a", "voter_1").await,
            Err(ElectionError::DuplicateVote)
        );

        // The original choice stands
        let status = state.check_vote_status("voter_1").await;
        assert_eq!(status.candidate_id.as_deref(), Some("a"));
        assert_eq!(state.total_votes().await, 1);
        assert_eq!(state.ledger_version(), 1);
    }

    #[tokio::test]
    async fn test_unknown_candidate_rejected_without_consuming_token() {
        let state = state();

        let result = state.submit_vote("nobody", "voter_1").await;
        assert_eq!(
            result,
            Err(ElectionError::UnknownCandidate("nobody".to_string()))
        );

        // Token is still free for a real vote
        assert!(state.submit_vote("b", "voter_1").await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_tokens_rejected() {
        let state = state();

        assert!(matches!(
            state.submit_vote("a", "").await,
            Err(ElectionError::InvalidToken(_))
        ));
        assert!(matches!(
            state.submit_vote("a", "has space").await,
            Err(ElectionError::InvalidToken(_))
        ));
        let long = "x".repeat(MAX_TOKEN_LEN + 1);
        assert!(matches!(
            state.submit_vote("a", &long).await,
            Err(ElectionError::InvalidToken(_))
        ));
        assert_eq!(state.total_votes().await, 0);
    }

    #[tokio::test]
    async fn test_check_vote_status_before_and_after() {
        let state = state();

        let before = state.check_vote_status("voter_1").await;
        assert!(!before.has_voted);
        assert!(before.candidate_id.is_none());

        state.submit_vote("b", "voter_1").await.unwrap();

        let after = state.check_vote_status("voter_1").await;
        assert!(after.has_voted);
        assert_eq!(after.candidate_id.as_deref(), Some("b"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_same_token_single_row() {
        let state = Arc::new(state());

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let state = state.clone();
                let candidate = if i % 2 == 0 { "a" } else { "b" };
                tokio::spawn(async move { state.submit_vote(candidate, "voter_race").await })
            })
            .collect();

        let mut accepted = 0;
        for result in futures::future::join_all(tasks).await {
            match result.unwrap() {
                Ok(_) => accepted += 1,
                Err(e) => assert_eq!(e, ElectionError::DuplicateVote),
            }
        }

        assert_eq!(accepted, 1);
        assert_eq!(state.total_votes().await, 1);
    }

    #[test]
    fn test_token_fingerprint_is_stable_and_short() {
        let a = token_fingerprint("voter_1");
        assert_eq!(a, token_fingerprint("voter_1"));
        assert_ne!(a, token_fingerprint("voter_2"));
        assert_eq!(a.len(), 12);
    }
}
