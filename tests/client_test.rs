use nepali_ballot::abuse::{AbuseConfig, VoteThrottle};
use nepali_ballot::api;
use nepali_ballot::auth::AuthConfig;
use nepali_ballot::client::{
    BallotSession, BallotView, ClientError, ElectionApi, ElectionClient, PollPhase, PollerHandle,
};
use nepali_ballot::identity::{self, FileStore, KeyValueStore};
use nepali_ballot::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Serve the API on an ephemeral port for the lifetime of the test
async fn spawn_server(abuse: AbuseConfig) -> (SocketAddr, Arc<AppState>) {
    let state = Arc::new(AppState::new());
    let app = api::router(state.clone(), Arc::new(AuthConfig::default()), Arc::new(abuse));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

fn client(addr: SocketAddr) -> Arc<ElectionClient> {
    Arc::new(ElectionClient::new(&format!("http://{}", addr), Duration::from_secs(5)).unwrap())
}

#[tokio::test]
async fn test_client_vote_mapping() {
    let (addr, state) = spawn_server(AbuseConfig::default()).await;
    let client = client(addr);

    let candidates = client.candidates().await.unwrap();
    assert_eq!(candidates.len(), 4);

    let vote = client.submit_vote("balen", "voter_1_client").await.unwrap();
    assert_eq!(vote.candidate_id, "balen");

    assert_eq!(
        client.submit_vote("oli", "voter_1_client").await,
        Err(ClientError::DuplicateVote)
    );
    assert_eq!(
        client.submit_vote("nobody", "voter_2_client").await,
        Err(ClientError::UnknownCandidate("nobody".to_string()))
    );

    let status = client.vote_status("voter_1_client").await.unwrap();
    assert!(status.has_voted);
    assert_eq!(status.candidate_id.as_deref(), Some("balen"));

    let results = client.results().await.unwrap();
    assert_eq!(results.total_votes, 1);
    assert_eq!(results.results[0].candidate_id, "balen");
    assert_eq!(results.results[0].percentage, 100.0);
    assert_eq!(state.total_votes().await, 1);
}

#[tokio::test]
async fn test_unreachable_server_is_network_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(addr).results().await.unwrap_err();
    assert!(matches!(err, ClientError::NetworkFailure(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_rate_limited_vote_is_retryable() {
    let abuse = AbuseConfig {
        block_user_agents: true,
        vote_throttle: Some(VoteThrottle::new(1, Duration::from_secs(60))),
    };
    let (addr, _state) = spawn_server(abuse).await;
    let client = client(addr);

    // Status checks do not spend the vote quota
    for _ in 0..3 {
        assert!(!client.vote_status("voter_1_limited").await.unwrap().has_voted);
    }
    client.submit_vote("rabi", "voter_1_limited").await.unwrap();

    let err = client
        .submit_vote("rabi", "voter_1_limited")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NetworkFailure(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_ballot_flow_over_http() {
    let (addr, _state) = spawn_server(AbuseConfig::default()).await;
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("store.json");

    {
        let store = FileStore::open(&store_path).unwrap();
        let mut session = BallotSession::start(client(addr), &store);
        assert_eq!(
            session.load().await.unwrap(),
            &BallotView::Ballot { selected: None }
        );
        session.select("deuba").unwrap();
        assert!(session.request_confirmation());
        session.confirm().await.unwrap();
    }

    // Same profile, fresh process
    let store = FileStore::open(&store_path).unwrap();
    assert!(store.get(identity::keys::VOTER_TOKEN).unwrap().is_some());

    let mut session = BallotSession::start(client(addr), &store);
    assert_eq!(
        session.load().await.unwrap(),
        &BallotView::AlreadyVoted {
            candidate_id: Some("deuba".to_string())
        }
    );
}

#[tokio::test]
async fn test_poller_tracks_server_results() {
    let (addr, state) = spawn_server(AbuseConfig::default()).await;
    let poller = PollerHandle::start(client(addr), Duration::from_secs(3600));

    let mut rx = poller.subscribe();
    let initial = rx
        .wait_for(|v| v.phase == PollPhase::Ready)
        .await
        .unwrap()
        .clone();
    assert_eq!(initial.results.unwrap().total_votes, 0);

    state.submit_vote("oli", "voter_1_poll").await.unwrap();
    poller.refresh_now().await.unwrap();

    let view = poller.view();
    assert_eq!(view.phase, PollPhase::Ready);
    let results = view.results.unwrap();
    assert_eq!(results.total_votes, 1);
    assert_eq!(results.leader().unwrap().candidate_id, "oli");
}
