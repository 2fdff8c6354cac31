//! Ledger export/import for backup and restoration.
//!
//! A snapshot carries the full vote ledger plus the roster ids it was taken
//! against. Imports only ever grow the ledger: every vote already present must
//! appear unchanged in the snapshot, so restoring cannot rewrite or drop votes.

use super::{validate_token, AppState};
use crate::error::{ElectionError, ElectionResult};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Schema version for export format compatibility
/// Version 1: votes + candidate ids
pub const EXPORT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerExport {
    pub schema_version: u32,
    /// Export timestamp (ISO8601)
    pub exported_at: String,
    /// Roster ids at export time
    pub candidate_ids: Vec<CandidateId>,
    /// All votes, oldest first
    pub votes: Vec<Vote>,
}

impl LedgerExport {
    /// Check that the snapshot is self-consistent and fits `roster`
    pub fn validate(&self, roster: &[Candidate]) -> ElectionResult<()> {
        if self.schema_version > EXPORT_SCHEMA_VERSION {
            return Err(ElectionError::InvalidSnapshot(format!(
                "schema version {} is newer than supported version {}",
                self.schema_version, EXPORT_SCHEMA_VERSION
            )));
        }

        let known: HashSet<&str> = roster.iter().map(|c| c.id.as_str()).collect();
        let mut tokens = HashSet::new();

        for vote in &self.votes {
            if !known.contains(vote.candidate_id.as_str()) {
                return Err(ElectionError::InvalidSnapshot(format!(
                    "vote {} references unknown candidate '{}'",
                    vote.id, vote.candidate_id
                )));
            }
            validate_token(&vote.voter_token).map_err(|e| {
                ElectionError::InvalidSnapshot(format!("vote {}: {}", vote.id, e))
            })?;
            if !tokens.insert(vote.voter_token.as_str()) {
                return Err(ElectionError::InvalidSnapshot(format!(
                    "voter token appears more than once (vote {})",
                    vote.id
                )));
            }
        }

        Ok(())
    }
}

impl AppState {
    /// Snapshot the current ledger
    pub async fn export_ledger(&self) -> LedgerExport {
        let mut votes: Vec<Vote> = self.votes.read().await.values().cloned().collect();
        votes.sort_by(|a, b| a.cast_at.cmp(&b.cast_at).then_with(|| a.id.cmp(&b.id)));

        LedgerExport {
            schema_version: EXPORT_SCHEMA_VERSION,
            exported_at: chrono::Utc::now().to_rfc3339(),
            candidate_ids: self.roster.iter().map(|c| c.id.clone()).collect(),
            votes,
        }
    }

    /// Replace the ledger with `export`, provided no existing vote is lost or altered.
    ///
    /// Returns the number of votes added by the import.
    pub async fn import_ledger(&self, export: LedgerExport) -> ElectionResult<usize> {
        export.validate(&self.roster)?;

        let incoming: HashMap<VoterToken, Vote> = export
            .votes
            .into_iter()
            .map(|v| (v.voter_token.clone(), v))
            .collect();

        let mut votes = self.votes.write().await;
        for (token, existing) in votes.iter() {
            match incoming.get(token) {
                Some(vote) if vote == existing => {}
                Some(_) => {
                    return Err(ElectionError::InvalidSnapshot(format!(
                        "snapshot disagrees with recorded vote {}",
                        existing.id
                    )))
                }
                None => {
                    return Err(ElectionError::InvalidSnapshot(format!(
                        "snapshot is missing recorded vote {}",
                        existing.id
                    )))
                }
            }
        }

        let added = incoming.len() - votes.len();
        *votes = incoming;
        if added > 0 {
            self.bump_ledger_version();
        }

        tracing::info!(added, total = votes.len(), "Ledger imported");
        Ok(added)
    }
}
