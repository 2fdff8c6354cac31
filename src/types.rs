use serde::{Deserialize, Serialize};

/// Opaque ID types for readability
pub type CandidateId = String;
pub type VoteId = String;
pub type VoterToken = String;

/// A candidate on the ballot. Seeded at startup, read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    pub party: String,
    /// CSS color used by the frontend for charts and accents
    pub party_color: String,
    /// Icon name for the party symbol (e.g. "Sun", "Bell")
    pub party_symbol: String,
    #[serde(default)]
    pub slogan: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub image_url: String,
}

/// A single ledger entry. At most one per voter token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vote {
    pub id: VoteId,
    pub candidate_id: CandidateId,
    pub voter_token: VoterToken,
    /// RFC 3339 timestamp (UTC)
    pub cast_at: String,
}

/// Body of `POST /api/vote`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub candidate_id: CandidateId,
    pub voter_token: VoterToken,
}

/// Response of `GET /api/check-vote/{voter_token}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct VoteStatus {
    pub has_voted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<CandidateId>,
}

/// Per-candidate aggregate, derived from the ledger on every query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultTally {
    pub candidate_id: CandidateId,
    pub candidate_name: String,
    pub party: String,
    pub party_color: String,
    pub vote_count: u64,
    /// Share of all votes, rounded to one decimal place
    pub percentage: f64,
}

/// Response of `GET /api/results`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ResultsSummary {
    pub total_votes: u64,
    pub results: Vec<ResultTally>,
}

impl ResultsSummary {
    /// Leading candidate, if anyone has voted yet
    pub fn leader(&self) -> Option<&ResultTally> {
        if self.total_votes == 0 {
            return None;
        }
        self.results.first()
    }
}

/// Error body returned by every failing API call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub code: String,
    pub msg: String,
}

/// Response of `GET /api/health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub total_votes: u64,
    pub candidates: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_status_omits_missing_candidate() {
        let json = serde_json::to_string(&VoteStatus::default()).unwrap();
        assert_eq!(json, r#"{"has_voted":false}"#);

        let parsed: VoteStatus = serde_json::from_str(r#"{"has_voted":false}"#).unwrap();
        assert_eq!(parsed.candidate_id, None);
    }

    #[test]
    fn test_candidate_optional_fields_default() {
        let candidate: Candidate = serde_json::from_str(
            r##"{"id":"a","name":"A","party":"P","party_color":"#fff","party_symbol":"Sun"}"##,
        )
        .unwrap();
        assert!(candidate.slogan.is_empty());
        assert!(candidate.image_url.is_empty());
    }

    #[test]
    fn test_leader_requires_votes() {
        let summary = ResultsSummary {
            total_votes: 0,
            results: vec![ResultTally {
                candidate_id: "a".to_string(),
                candidate_name: "A".to_string(),
                party: "P".to_string(),
                party_color: "#fff".to_string(),
                vote_count: 0,
                percentage: 0.0,
            }],
        };
        assert!(summary.leader().is_none());
    }
}
