//! Client side of the election protocol: HTTP client, ballot flow and the
//! live results poller.

pub mod ballot;
pub mod poller;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use std::path::PathBuf;
use std::time::Duration;

use crate::abuse::VOTER_TOKEN_HEADER;
use crate::config::{non_empty_var, DEFAULT_PORT};
use crate::identity::IdentityError;
use crate::types::*;

pub use ballot::{BallotSession, BallotView};
pub use poller::{PollPhase, PollerHandle, ResultsView};

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    #[error("You have already voted in this election")]
    DuplicateVote,

    #[error("Unknown candidate: {0}")]
    UnknownCandidate(CandidateId),

    #[error("Voter storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Network failure: {0}")]
    NetworkFailure(String),

    #[error("No confirmed selection to submit")]
    NotConfirmed,

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// Transient failures the user may retry by hand
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::NetworkFailure(_))
    }
}

impl From<IdentityError> for ClientError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::StorageUnavailable(msg) => ClientError::StorageUnavailable(msg),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::NetworkFailure(e.to_string())
    }
}

/// Severity of a transient user-facing message (a toast in the web client)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// The election service as seen from a client
#[async_trait]
pub trait ElectionApi: Send + Sync {
    async fn candidates(&self) -> ClientResult<Vec<Candidate>>;

    async fn vote_status(&self, voter_token: &str) -> ClientResult<VoteStatus>;

    async fn submit_vote(&self, candidate_id: &str, voter_token: &str) -> ClientResult<Vote>;

    async fn results(&self) -> ClientResult<ResultsSummary>;
}

/// Client configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    /// Durable store holding the voter token
    pub store_path: PathBuf,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: format!("http://localhost:{}", DEFAULT_PORT),
            store_path: PathBuf::from(".ballot-store.json"),
            poll_interval: poller::DEFAULT_POLL_INTERVAL,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_url: non_empty_var("BALLOT_API_URL").unwrap_or(defaults.api_url),
            store_path: non_empty_var("BALLOT_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            poll_interval: non_empty_var("BALLOT_POLL_SECS")
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            request_timeout: defaults.request_timeout,
        }
    }
}

/// HTTP implementation of [`ElectionApi`]
#[derive(Debug, Clone)]
pub struct ElectionClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ElectionClient {
    pub fn new(base_url: &str, timeout: Duration) -> ClientResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ClientError::Config(format!("invalid API URL {:?}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Config(format!("API URL {} cannot be a base", base_url)));
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self { http, base_url })
    }

    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        Self::new(&config.api_url, config.request_timeout)
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("api").extend(segments);
        }
        url
    }

    /// Decode a non-success response into the matching client error
    async fn error_from(response: reqwest::Response) -> ClientError {
        let status = response.status();
        let body: Option<ErrorBody> = response.json().await.ok();
        let detail = body
            .map(|b| format!("{} ({})", b.msg, b.code))
            .unwrap_or_else(|| "no error body".to_string());
        ClientError::NetworkFailure(format!("server responded {}: {}", status, detail))
    }
}

#[async_trait]
impl ElectionApi for ElectionClient {
    async fn candidates(&self) -> ClientResult<Vec<Candidate>> {
        let response = self.http.get(self.endpoint(&["candidates"])).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(response.json().await?)
    }

    async fn vote_status(&self, voter_token: &str) -> ClientResult<VoteStatus> {
        let response = self
            .http
            .get(self.endpoint(&["check-vote", voter_token]))
            .header(VOTER_TOKEN_HEADER, voter_token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(response.json().await?)
    }

    async fn submit_vote(&self, candidate_id: &str, voter_token: &str) -> ClientResult<Vote> {
        let request = VoteRequest {
            candidate_id: candidate_id.to_string(),
            voter_token: voter_token.to_string(),
        };

        let response = self
            .http
            .post(self.endpoint(&["vote"]))
            .header(VOTER_TOKEN_HEADER, voter_token)
            .json(&request)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.json().await?),
            // Any bad request on /api/vote means this token already has a ballot
            StatusCode::BAD_REQUEST => Err(ClientError::DuplicateVote),
            StatusCode::NOT_FOUND => {
                let body: Option<ErrorBody> = response.json().await.ok();
                match body {
                    Some(b) if b.code == "UNKNOWN_CANDIDATE" => {
                        Err(ClientError::UnknownCandidate(candidate_id.to_string()))
                    }
                    _ => Err(ClientError::NetworkFailure(
                        "vote endpoint not found".to_string(),
                    )),
                }
            }
            _ => Err(Self::error_from(response).await),
        }
    }

    async fn results(&self) -> ClientResult<ResultsSummary> {
        let response = self.http.get(self.endpoint(&["results"])).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(response.json().await?)
    }
}
