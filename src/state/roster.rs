//! Candidate roster seeding and lookup

use super::AppState;
use crate::types::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("Failed to read roster file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse roster: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Roster must contain at least one candidate")]
    Empty,

    #[error("Candidate at position {0} has an empty id")]
    EmptyId(usize),

    #[error("Duplicate candidate id: {0}")]
    DuplicateId(CandidateId),
}

/// Check that a roster can back an election
pub fn validate_roster(roster: &[Candidate]) -> Result<(), RosterError> {
    if roster.is_empty() {
        return Err(RosterError::Empty);
    }

    let mut seen = HashSet::new();
    for (index, candidate) in roster.iter().enumerate() {
        if candidate.id.trim().is_empty() {
            return Err(RosterError::EmptyId(index));
        }
        if !seen.insert(candidate.id.as_str()) {
            return Err(RosterError::DuplicateId(candidate.id.clone()));
        }
    }

    Ok(())
}

/// Load and validate a roster from a JSON array of candidates
pub async fn load_roster(path: &Path) -> Result<Vec<Candidate>, RosterError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| RosterError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let roster: Vec<Candidate> = serde_json::from_str(&raw)?;
    validate_roster(&roster)?;

    tracing::info!(path = %path.display(), candidates = roster.len(), "Roster loaded");
    Ok(roster)
}

/// Built-in simulation roster, one candidate per party symbol the frontend knows
pub fn default_roster() -> Vec<Candidate> {
    vec![
        Candidate {
            id: "balen".to_string(),
            name: "Balen Shah".to_string(),
            party: "Independent".to_string(),
            party_color: "#F77F00".to_string(),
            party_symbol: "Gavel".to_string(),
            slogan: "Build the city, not the promises".to_string(),
            bio: "Structural engineer and rapper turned mayor.".to_string(),
            image_url: "/images/candidates/balen.jpg".to_string(),
        },
        Candidate {
            id: "deuba".to_string(),
            name: "Sher Bahadur Deuba".to_string(),
            party: "Nepali Congress".to_string(),
            party_color: "#2A9D8F".to_string(),
            party_symbol: "TreeDeciduous".to_string(),
            slogan: "Democracy rooted deep".to_string(),
            bio: "Veteran parliamentarian and five-time prime minister.".to_string(),
            image_url: "/images/candidates/deuba.jpg".to_string(),
        },
        Candidate {
            id: "oli".to_string(),
            name: "KP Sharma Oli".to_string(),
            party: "CPN (UML)".to_string(),
            party_color: "#EF233C".to_string(),
            party_symbol: "Sun".to_string(),
            slogan: "Prosperous Nepal, happy Nepali".to_string(),
            bio: "Party chairman and former prime minister.".to_string(),
            image_url: "/images/candidates/oli.jpg".to_string(),
        },
        Candidate {
            id: "rabi".to_string(),
            name: "Rabi Lamichhane".to_string(),
            party: "Rastriya Swatantra Party".to_string(),
            party_color: "#48CAE4".to_string(),
            party_symbol: "Bell".to_string(),
            slogan: "Ring the bell for change".to_string(),
            bio: "Former television host and party founder.".to_string(),
            image_url: "/images/candidates/rabi.jpg".to_string(),
        },
    ]
}

impl AppState {
    /// All candidates in roster order
    pub fn candidates(&self) -> &[Candidate] {
        &self.roster
    }

    pub fn get_candidate(&self, id: &str) -> Option<&Candidate> {
        self.roster.iter().find(|c| c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::candidate;
    use std::io::Write;

    #[test]
    fn test_default_roster_is_valid() {
        let roster = default_roster();
        assert!(validate_roster(&roster).is_ok());
        assert_eq!(roster.len(), 4);
    }

    #[test]
    fn test_validate_rejects_empty_and_blank_ids() {
        assert!(matches!(validate_roster(&[]), Err(RosterError::Empty)));

        let mut blank = candidate("a");
        blank.id = "  ".to_string();
        assert!(matches!(
            validate_roster(&[candidate("x"), blank]),
            Err(RosterError::EmptyId(1))
        ));
    }

    #[tokio::test]
    async fn test_load_roster_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::to_string(&vec![candidate("a"), candidate("b")]).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let roster = load_roster(file.path()).await.unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[1].id, "b");
    }

    #[tokio::test]
    async fn test_load_roster_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{not json").unwrap();

        let result = load_roster(file.path()).await;
        assert!(matches!(result, Err(RosterError::Parse(_))));
    }

    #[tokio::test]
    async fn test_load_roster_missing_file() {
        let result = load_roster(Path::new("/definitely/not/here.json")).await;
        assert!(matches!(result, Err(RosterError::Io { .. })));
    }

    #[test]
    fn test_get_candidate() {
        let state = AppState::try_new(vec![candidate("a"), candidate("b")]).unwrap();
        assert_eq!(state.get_candidate("b").map(|c| c.id.as_str()), Some("b"));
        assert!(state.get_candidate("zzz").is_none());
    }
}
