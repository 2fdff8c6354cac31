use std::sync::Arc;

use super::{ClientError, ClientResult, ElectionApi, Notice};
use crate::identity::{get_or_create_token, KeyValueStore};
use crate::types::*;

/// What the voter currently sees
#[derive(Debug, Clone, PartialEq)]
pub enum BallotView {
    /// Candidates or vote status not fetched yet
    Loading,
    /// Durable storage is unavailable, so prior votes cannot be checked
    Unsupported { warning: String },
    Ballot { selected: Option<CandidateId> },
    /// Confirmation dialog for the pending choice
    Confirming { candidate_id: CandidateId },
    /// `candidate_id` is None when the server refused a duplicate and the
    /// earlier choice is unknown
    AlreadyVoted { candidate_id: Option<CandidateId> },
}

/// One voter's pass through the ballot
pub struct BallotSession {
    api: Arc<dyn ElectionApi>,
    voter_token: Option<VoterToken>,
    candidates: Vec<Candidate>,
    view: BallotView,
    notice: Option<Notice>,
}

impl BallotSession {
    /// Resolve the voter token; an unusable store disables voting
    pub fn start(api: Arc<dyn ElectionApi>, store: &dyn KeyValueStore) -> Self {
        let (voter_token, view) = match get_or_create_token(store) {
            Ok(token) => (Some(token), BallotView::Loading),
            Err(e) => {
                tracing::warn!(error = %e, "Voting disabled: voter storage unavailable");
                let warning = format!(
                    "{}. Voting is disabled because earlier votes from this device cannot be checked.",
                    ClientError::from(e)
                );
                (None, BallotView::Unsupported { warning })
            }
        };

        Self {
            api,
            voter_token,
            candidates: Vec::new(),
            view,
            notice: None,
        }
    }

    pub fn view(&self) -> &BallotView {
        &self.view
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn voter_token(&self) -> Option<&str> {
        self.voter_token.as_deref()
    }

    pub fn candidate(&self, candidate_id: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == candidate_id)
    }

    /// Pending notice, cleared once taken
    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    /// Fetch the roster and this voter's status.
    ///
    /// The status is consulted before the ballot is offered; if it cannot be
    /// fetched the view stays `Loading` and `load` may be called again.
    pub async fn load(&mut self) -> ClientResult<&BallotView> {
        self.candidates = self.api.candidates().await.inspect_err(|e| {
            tracing::error!(error = %e, "Failed to load candidates");
        })?;

        let Some(token) = self.voter_token.clone() else {
            return Ok(&self.view);
        };

        match self.api.vote_status(&token).await {
            Ok(status) if status.has_voted => {
                self.view = BallotView::AlreadyVoted {
                    candidate_id: status.candidate_id,
                };
            }
            Ok(_) => {
                self.view = BallotView::Ballot { selected: None };
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to check vote status");
                self.view = BallotView::Loading;
                self.notice = Some(Notice::error("Failed to check vote status"));
                return Err(e);
            }
        }

        Ok(&self.view)
    }

    /// Set the pending choice. Ignored outside the ballot view.
    pub fn select(&mut self, candidate_id: &str) -> ClientResult<()> {
        if self.candidate(candidate_id).is_none() {
            return Err(ClientError::UnknownCandidate(candidate_id.to_string()));
        }

        match self.view {
            BallotView::Ballot { .. } | BallotView::Confirming { .. } => {
                self.view = BallotView::Ballot {
                    selected: Some(candidate_id.to_string()),
                };
            }
            _ => tracing::debug!(view = ?self.view, "Selection ignored"),
        }
        Ok(())
    }

    /// Open the confirmation gate. Returns false if nothing is selected.
    pub fn request_confirmation(&mut self) -> bool {
        match &self.view {
            BallotView::Ballot {
                selected: Some(candidate_id),
            } => {
                self.view = BallotView::Confirming {
                    candidate_id: candidate_id.clone(),
                };
                true
            }
            BallotView::Ballot { selected: None } => {
                self.notice = Some(Notice::warning("Please select a candidate first"));
                false
            }
            BallotView::Confirming { .. } => true,
            _ => false,
        }
    }

    /// Close the confirmation dialog, keeping the selection
    pub fn cancel_confirmation(&mut self) {
        if let BallotView::Confirming { candidate_id } = &self.view {
            self.view = BallotView::Ballot {
                selected: Some(candidate_id.clone()),
            };
        }
    }

    /// Submit the confirmed choice. Sends exactly one request and never retries.
    pub async fn confirm(&mut self) -> ClientResult<Vote> {
        let BallotView::Confirming { candidate_id } = &self.view else {
            return Err(ClientError::NotConfirmed);
        };
        let candidate_id = candidate_id.clone();
        let Some(token) = self.voter_token.clone() else {
            return Err(ClientError::NotConfirmed);
        };

        match self.api.submit_vote(&candidate_id, &token).await {
            Ok(vote) => {
                let name = self
                    .candidate(&candidate_id)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| candidate_id.clone());
                tracing::info!(candidate_id = %candidate_id, "Vote cast");
                self.notice = Some(Notice::success(format!(
                    "Your vote for {} has been recorded",
                    name
                )));
                self.view = BallotView::AlreadyVoted {
                    candidate_id: Some(candidate_id),
                };
                Ok(vote)
            }
            Err(ClientError::DuplicateVote) => {
                tracing::warn!("Server reports this voter already voted");
                self.notice = Some(Notice::error(ClientError::DuplicateVote.to_string()));
                self.view = BallotView::AlreadyVoted { candidate_id: None };
                Err(ClientError::DuplicateVote)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to cast vote");
                self.notice = Some(Notice::error("Failed to cast vote. Please try again."));
                self.view = BallotView::Ballot {
                    selected: Some(candidate_id),
                };
                Err(e)
            }
        }
    }
}
