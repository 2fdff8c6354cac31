//! Anti-abuse middleware for the ballot routes
//!
//! - `block_scripted_clients`: refuses command-line HTTP tools and crawlers on
//!   every ballot route
//! - `throttle_vote_attempts`: caps `POST /api/vote` attempts per voter token
//!   (sent by clients in `X-Voter-Token`); status checks never spend the quota

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;

use crate::config::non_empty_var;
use crate::state::token_fingerprint;
use crate::types::ErrorBody;

/// Header clients use to identify their voter token on every ballot request
pub const VOTER_TOKEN_HEADER: &str = "x-voter-token";

pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10);
/// Longest window accepted from the environment (one day)
const MAX_WINDOW_SECS: u64 = 86_400;

/// Substrings of user agents that belong to scripts rather than browsers
const SCRIPTED_AGENTS: &[&str] = &[
    "curl",
    "wget",
    "httpie",
    "python-requests",
    "python-urllib",
    "libwww-perl",
    "go-http-client",
    "java/",
    "spider",
    "crawler",
];

/// Sliding-window limiter over vote attempts, keyed by voter token.
///
/// Each key keeps the instants of its attempts inside the window, so a
/// rejected caller learns exactly when its oldest attempt expires.
#[derive(Debug, Clone)]
pub struct VoteThrottle {
    attempts: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    max_attempts: u32,
    window: Duration,
}

impl Default for VoteThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW)
    }
}

impl VoteThrottle {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            attempts: Arc::new(Mutex::new(HashMap::new())),
            max_attempts: max_attempts.max(1),
            window,
        }
    }

    /// Record an attempt for `key`, or return how long until one is allowed
    pub async fn admit(&self, key: &str) -> Result<(), Duration> {
        self.admit_at(key, Instant::now()).await
    }

    async fn admit_at(&self, key: &str, now: Instant) -> Result<(), Duration> {
        let mut attempts = self.attempts.lock().await;
        let log = attempts.entry(key.to_string()).or_default();

        while log
            .front()
            .is_some_and(|first| now.saturating_duration_since(*first) >= self.window)
        {
            log.pop_front();
        }

        if log.len() >= self.max_attempts as usize {
            let oldest = log.front().copied().unwrap_or(now);
            let retry_after = self.window.saturating_sub(now.saturating_duration_since(oldest));
            return Err(retry_after);
        }

        log.push_back(now);
        Ok(())
    }

    /// Forget tokens whose attempts have all left the window
    pub async fn prune(&self) {
        let now = Instant::now();
        let mut attempts = self.attempts.lock().await;
        attempts.retain(|_, log| {
            log.back()
                .is_some_and(|last| now.saturating_duration_since(*last) < self.window)
        });
    }

    pub async fn tracked_tokens(&self) -> usize {
        self.attempts.lock().await.len()
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Spawn a background task that periodically prunes the throttle
pub fn spawn_throttle_pruner(throttle: VoteThrottle) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let period = throttle
            .window()
            .saturating_mul(2)
            .max(Duration::from_secs(1));
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            throttle.prune().await;
        }
    })
}

#[derive(Debug, Clone)]
pub struct AbuseConfig {
    pub block_user_agents: bool,
    /// None = vote attempts are not throttled
    pub vote_throttle: Option<VoteThrottle>,
}

impl Default for AbuseConfig {
    fn default() -> Self {
        Self {
            block_user_agents: true,
            vote_throttle: Some(VoteThrottle::default()),
        }
    }
}

impl AbuseConfig {
    /// No filtering at all
    pub fn disabled() -> Self {
        Self {
            block_user_agents: false,
            vote_throttle: None,
        }
    }

    /// Load config from environment variables
    pub fn from_env() -> Self {
        let block_user_agents = flag("ABUSE_BLOCK_USER_AGENTS");
        let throttle_enabled = flag("ABUSE_RATE_LIMIT");

        let vote_throttle = throttle_enabled.then(|| {
            let max_attempts = non_empty_var("ABUSE_RATE_LIMIT_MAX")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_ATTEMPTS);

            let window = non_empty_var("ABUSE_RATE_LIMIT_WINDOW")
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| Duration::from_secs(secs.clamp(1, MAX_WINDOW_SECS)))
                .unwrap_or(DEFAULT_WINDOW);

            VoteThrottle::new(max_attempts, window)
        });

        tracing::info!(block_user_agents, throttle_enabled, "Anti-abuse config loaded");

        Self {
            block_user_agents,
            vote_throttle,
        }
    }
}

/// Boolean env flag, enabled unless set to "0" or "false"
fn flag(key: &str) -> bool {
    non_empty_var(key)
        .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
        .unwrap_or(true)
}

/// Scripts and crawlers, matched on the lowercased user agent
fn is_scripted_agent(user_agent: &str) -> bool {
    let ua = user_agent.to_lowercase();
    if SCRIPTED_AGENTS.iter().any(|marker| ua.contains(marker)) {
        return true;
    }
    // "bot" as a word suffix ("Googlebot/2.1", "bingbot"), not inside "ballot"
    ua.split(|c: char| c == '/' || c == ' ' || c == ';')
        .any(|word| word.ends_with("bot"))
}

fn voter_token(request: &Request<Body>) -> Option<&str> {
    let token = request.headers().get(VOTER_TOKEN_HEADER)?.to_str().ok()?;
    (!token.is_empty()).then_some(token)
}

fn rejection(status: StatusCode, code: &str, msg: &str) -> Response {
    let body = ErrorBody {
        code: code.to_string(),
        msg: msg.to_string(),
    };
    (status, Json(body)).into_response()
}

/// Refuse ballot requests from scripted clients or with no User-Agent at all
pub async fn block_scripted_clients(
    State(config): State<Arc<AbuseConfig>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if config.block_user_agents {
        let user_agent = request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|ua| ua.to_str().ok());

        let blocked = match user_agent {
            Some(ua) => is_scripted_agent(ua),
            None => true,
        };
        if blocked {
            tracing::warn!(user_agent = user_agent.unwrap_or("<none>"), uri = %request.uri(), "Blocked scripted client");
            return rejection(StatusCode::FORBIDDEN, "FORBIDDEN", "Access denied");
        }
    }

    next.run(request).await
}

/// Cap vote attempts per token; requests without a token header pass through
pub async fn throttle_vote_attempts(
    State(config): State<Arc<AbuseConfig>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if let (Some(throttle), Some(token)) = (&config.vote_throttle, voter_token(&request)) {
        if let Err(retry_after) = throttle.admit(token).await {
            tracing::warn!(voter = %token_fingerprint(token), "Vote attempts throttled");
            let mut response = rejection(
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                "Too many vote attempts. Please slow down.",
            );
            // Whole seconds, rounded up so an immediate retry is never invited
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response.headers_mut().insert(
                header::RETRY_AFTER,
                header::HeaderValue::from(secs.max(1)),
            );
            return response;
        }
    }

    next.run(request).await
}
