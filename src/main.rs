use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nepali_ballot::{
    abuse, api, auth,
    config::ServerConfig,
    snapshot,
    state::{roster, AppState},
};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nepali_ballot=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting election service...");

    let config = ServerConfig::from_env();
    let auth_config = Arc::new(auth::AuthConfig::from_env());
    let abuse_config = Arc::new(abuse::AbuseConfig::from_env());

    let candidates = match &config.roster_path {
        Some(path) => match roster::load_roster(path).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!("Failed to load roster: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => {
            tracing::info!("No ROSTER_PATH set, using built-in roster");
            roster::default_roster()
        }
    };

    let state = match AppState::try_new(candidates) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            tracing::error!("Invalid roster: {}", e);
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(candidates = state.candidates().len(), "Roster seeded");

    let mut snapshot_writer = None;
    if let Some(path) = &config.snapshot_path {
        match snapshot::load_snapshot(&state, path).await {
            Ok(restored) => tracing::info!(restored, "Ledger restored from {}", path.display()),
            Err(e) => {
                // Starting empty would let the next autosave overwrite the snapshot
                tracing::error!("Failed to restore ledger from {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        }
        snapshot_writer = Some(snapshot::spawn_snapshot_writer(
            state.clone(),
            path.clone(),
            config.snapshot_interval,
        ));
    }

    if let Some(throttle) = &abuse_config.vote_throttle {
        abuse::spawn_throttle_pruner(throttle.clone());
    }

    let app = api::app(state.clone(), auth_config, abuse_config, &config.static_dir);

    let addr = config.addr();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("Listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    // The autosave must be gone before the final save starts
    if let Some(writer) = snapshot_writer {
        snapshot::stop_snapshot_writer(writer).await;
    }

    if let Some(path) = &config.snapshot_path {
        match snapshot::save_snapshot(&state, path).await {
            Ok(()) => tracing::info!("Final ledger snapshot written to {}", path.display()),
            Err(e) => {
                tracing::error!("Final snapshot failed: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
