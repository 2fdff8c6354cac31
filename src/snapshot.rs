//! On-disk ledger snapshots: restored at startup, rewritten in the background
//! whenever the ledger changed since the last save.

use crate::error::{ElectionError, ElectionResult};
use crate::state::export::LedgerExport;
use crate::state::AppState;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Restore the ledger from `path` if the file exists.
///
/// Returns the number of votes restored. A missing file is not an error.
pub async fn load_snapshot(state: &AppState, path: &Path) -> ElectionResult<usize> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "No ledger snapshot found, starting empty");
            return Ok(0);
        }
        Err(e) => {
            return Err(ElectionError::Internal(format!(
                "failed to read snapshot {}: {}",
                path.display(),
                e
            )))
        }
    };

    let export: LedgerExport = serde_json::from_str(&raw)
        .map_err(|e| ElectionError::InvalidSnapshot(format!("{}: {}", path.display(), e)))?;

    let restored = state.import_ledger(export).await?;
    tracing::info!(path = %path.display(), restored, "Ledger snapshot restored");
    Ok(restored)
}

/// Write the current ledger to `path` atomically (temp file + rename)
pub async fn save_snapshot(state: &AppState, path: &Path) -> ElectionResult<()> {
    let export = state.export_ledger().await;
    let json = serde_json::to_vec_pretty(&export)
        .map_err(|e| ElectionError::Internal(format!("failed to encode snapshot: {}", e)))?;

    // Each save owns its temp file, so overlapping saves never share one
    let tmp = tmp_path(path);
    if let Err(e) = tokio::fs::write(&tmp, &json).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(ElectionError::Internal(format!(
            "failed to write {}: {}",
            tmp.display(),
            e
        )));
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(ElectionError::Internal(format!(
            "failed to replace {}: {}",
            path.display(),
            e
        )));
    }

    tracing::debug!(path = %path.display(), votes = export.votes.len(), "Ledger snapshot saved");
    Ok(())
}

/// `<file>.<ulid>.tmp` next to `path`
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{}.tmp", ulid::Ulid::new()));
    path.with_file_name(name)
}

/// Spawn a background task that saves the ledger every `interval` when it changed
pub fn spawn_snapshot_writer(
    state: Arc<AppState>,
    path: PathBuf,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    let mut saved_version = state.ledger_version();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let version = state.ledger_version();
            if version == saved_version {
                continue;
            }

            match save_snapshot(&state, &path).await {
                Ok(()) => saved_version = version,
                // Retried on the next tick
                Err(e) => tracing::error!("Snapshot save failed: {}", e),
            }
        }
    })
}

/// Abort the background writer and wait until it has fully stopped
pub async fn stop_snapshot_writer(writer: tokio::task::JoinHandle<()>) {
    writer.abort();
    match writer.await {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => {}
        Err(e) => tracing::error!("Snapshot writer failed: {}", e),
    }
}
