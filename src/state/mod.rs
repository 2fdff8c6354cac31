pub mod export;
mod results;
pub mod roster;
mod vote;

pub use results::{percentage, tally};
pub use roster::RosterError;
pub use vote::{token_fingerprint, validate_token, MAX_TOKEN_LEN};

use crate::types::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Candidate roster, fixed at startup
    pub roster: Arc<Vec<Candidate>>,
    /// Vote ledger keyed by voter token, so a token can hold at most one entry
    pub votes: Arc<RwLock<HashMap<VoterToken, Vote>>>,
    /// Bumped on every ledger mutation
    ledger_version: Arc<AtomicU64>,
}

impl AppState {
    /// Create state with the built-in roster
    pub fn new() -> Self {
        Self::from_validated(roster::default_roster())
    }

    /// Create state with a custom roster, rejecting empty or ambiguous rosters
    pub fn try_new(roster: Vec<Candidate>) -> Result<Self, RosterError> {
        roster::validate_roster(&roster)?;
        Ok(Self::from_validated(roster))
    }

    fn from_validated(roster: Vec<Candidate>) -> Self {
        Self {
            roster: Arc::new(roster),
            votes: Arc::new(RwLock::new(HashMap::new())),
            ledger_version: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Monotonic counter of ledger mutations since startup
    pub fn ledger_version(&self) -> u64 {
        self.ledger_version.load(Ordering::SeqCst)
    }

    fn bump_ledger_version(&self) {
        self.ledger_version.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::types::Candidate;

    pub fn candidate(id: &str) -> Candidate {
        Candidate {
            id: id.to_string(),
            name: format!("Candidate {}", id.to_uppercase()),
            party: format!("Party {}", id.to_uppercase()),
            party_color: "#003049".to_string(),
            party_symbol: "Bell".to_string(),
            slogan: String::new(),
            bio: String::new(),
            image_url: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::candidate;
    use super::*;

    #[test]
    fn test_new_uses_default_roster() {
        let state = AppState::new();
        assert!(!state.candidates().is_empty());
        assert_eq!(state.ledger_version(), 0);
    }

    #[test]
    fn test_try_new_rejects_duplicate_ids() {
        let result = AppState::try_new(vec![candidate("a"), candidate("a")]);
        assert!(matches!(result, Err(RosterError::DuplicateId(id)) if id == "a"));
    }

    #[tokio::test]
    async fn test_clones_share_ledger() {
        let state = AppState::try_new(vec![candidate("a")]).unwrap();
        let clone = state.clone();

        state.submit_vote("a", "voter_1").await.unwrap();

        assert!(clone.check_vote_status("voter_1").await.has_voted);
        assert_eq!(clone.ledger_version(), 1);
    }
}
