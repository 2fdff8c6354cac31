//! Voter identity on the client side.
//!
//! A voter token is generated once per client profile and kept in a durable
//! key-value store, the same way the web client keeps it in local storage.
//! Stores are passed in explicitly; nothing here is global.
//!
//! Documented keys:
//! - [`keys::VOTER_TOKEN`]: string, the pseudonymous voter token
//! - [`keys::GAME_SCORE`]: integer, accumulated mini-game points

use rand::Rng;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::types::VoterToken;

pub mod keys {
    pub const VOTER_TOKEN: &str = "voter_token";
    pub const GAME_SCORE: &str = "game_score";
}

const TOKEN_PREFIX: &str = "voter";
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const RANDOM_LENGTH: usize = 13;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IdentityError {
    #[error("Client storage unavailable: {0}")]
    StorageUnavailable(String),
}

pub type IdentityResult<T> = Result<T, IdentityError>;

/// Durable string key-value storage owned by one client profile
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> IdentityResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> IdentityResult<()>;

    /// Return the value under `key`, storing `make()` first if it is absent.
    ///
    /// Implementations with interior locking should override this so the
    /// check and the write cannot interleave with another caller.
    fn get_or_insert_with(&self, key: &str, make: &dyn Fn() -> String) -> IdentityResult<String> {
        if let Some(existing) = self.get(key)?.filter(|v| !v.is_empty()) {
            return Ok(existing);
        }
        let value = make();
        self.set(key, &value)?;
        Ok(value)
    }
}

/// `voter_{unix millis}_{13 random base36 chars}`
pub fn generate_token() -> VoterToken {
    let mut rng = rand::rng();
    let random: String = (0..RANDOM_LENGTH)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect();
    format!(
        "{}_{}_{}",
        TOKEN_PREFIX,
        chrono::Utc::now().timestamp_millis(),
        random
    )
}

/// Return this profile's voter token, creating and persisting it on first use
pub fn get_or_create_token<S: KeyValueStore + ?Sized>(store: &S) -> IdentityResult<VoterToken> {
    store.get_or_insert_with(keys::VOTER_TOKEN, &generate_token)
}

/// Accumulated mini-game points (0 when unset or unreadable)
pub fn game_score<S: KeyValueStore + ?Sized>(store: &S) -> IdentityResult<u64> {
    Ok(store
        .get(keys::GAME_SCORE)?
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(0))
}

/// Add `points` to the mini-game score and return the new total
pub fn add_game_score<S: KeyValueStore + ?Sized>(store: &S, points: u64) -> IdentityResult<u64> {
    let total = game_score(store)?.saturating_add(points);
    store.set(keys::GAME_SCORE, &total.to_string())?;
    Ok(total)
}

fn lock(entries: &Mutex<HashMap<String, String>>) -> IdentityResult<MutexGuard<'_, HashMap<String, String>>> {
    entries
        .lock()
        .map_err(|_| IdentityError::StorageUnavailable("store lock poisoned".to_string()))
}

/// Volatile store for tests and throwaway sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> IdentityResult<Option<String>> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> IdentityResult<()> {
        lock(&self.entries)?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_or_insert_with(&self, key: &str, make: &dyn Fn() -> String) -> IdentityResult<String> {
        let mut entries = lock(&self.entries)?;
        if let Some(existing) = entries.get(key).filter(|v| !v.is_empty()) {
            return Ok(existing.clone());
        }
        let value = make();
        entries.insert(key.to_string(), value.clone());
        Ok(value)
    }
}

/// JSON-file backed store, one file per client profile
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, starting empty if the file does not exist yet
    pub fn open(path: impl AsRef<Path>) -> IdentityResult<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                IdentityError::StorageUnavailable(format!("{} is corrupt: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(IdentityError::StorageUnavailable(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, String>) -> IdentityResult<()> {
        let unavailable =
            |e: std::io::Error| IdentityError::StorageUnavailable(format!("{}: {}", self.path.display(), e));

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(unavailable)?;
        }

        let json = serde_json::to_vec_pretty(entries)
            .map_err(|e| IdentityError::StorageUnavailable(e.to_string()))?;

        let mut tmp_name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        std::fs::write(&tmp, json).map_err(unavailable)?;
        std::fs::rename(&tmp, &self.path).map_err(unavailable)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> IdentityResult<Option<String>> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> IdentityResult<()> {
        let mut entries = lock(&self.entries)?;
        let previous = entries.insert(key.to_string(), value.to_string());

        if let Err(e) = self.persist(&entries) {
            // Memory must not run ahead of disk
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn get_or_insert_with(&self, key: &str, make: &dyn Fn() -> String) -> IdentityResult<String> {
        let mut entries = lock(&self.entries)?;
        if let Some(existing) = entries.get(key).filter(|v| !v.is_empty()) {
            return Ok(existing.clone());
        }

        let value = make();
        entries.insert(key.to_string(), value.clone());
        if let Err(e) = self.persist(&entries) {
            entries.remove(key);
            return Err(e);
        }
        Ok(value)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::UnavailableStore;
    use super::*;

    #[test]
    fn test_generated_token_format() {
        let token = generate_token();
        let parts: Vec<&str> = token.split('_').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "voter");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), RANDOM_LENGTH);
        assert!(parts[2].bytes().all(|b| BASE36.contains(&b)));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let store = MemoryStore::new();
        let first = get_or_create_token(&store).unwrap();
        let second = get_or_create_token(&store).unwrap();

        assert_eq!(first, second);
        assert_eq!(store.get(keys::VOTER_TOKEN).unwrap(), Some(first));
    }

    #[test]
    fn test_existing_token_is_kept() {
        let store = MemoryStore::new();
        store.set(keys::VOTER_TOKEN, "voter_1_abc").unwrap();
        assert_eq!(get_or_create_token(&store).unwrap(), "voter_1_abc");
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile").join("store.json");

        let token = {
            let store = FileStore::open(&path).unwrap();
            get_or_create_token(&store).unwrap()
        };

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(get_or_create_token(&reopened).unwrap(), token);
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            FileStore::open(&path),
            Err(IdentityError::StorageUnavailable(_))
        ));
    }

    #[test]
    fn test_unavailable_storage_fails_cleanly() {
        assert!(matches!(
            get_or_create_token(&UnavailableStore),
            Err(IdentityError::StorageUnavailable(_))
        ));
    }

    #[test]
    fn test_game_score_shares_store() {
        let store = MemoryStore::new();
        assert_eq!(game_score(&store).unwrap(), 0);
        assert_eq!(add_game_score(&store, 10).unwrap(), 10);
        assert_eq!(add_game_score(&store, 20).unwrap(), 30);

        store.set(keys::GAME_SCORE, "garbage").unwrap();
        assert_eq!(game_score(&store).unwrap(), 0);

        // Score writes never touch the token
        let token = get_or_create_token(&store).unwrap();
        add_game_score(&store, 5).unwrap();
        assert_eq!(get_or_create_token(&store).unwrap(), token);
    }

    #[test]
    fn test_concurrent_first_use_yields_one_token() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || get_or_create_token(store.as_ref()).unwrap())
            })
            .collect();

        let tokens: std::collections::HashSet<_> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(tokens.len(), 1);
    }
}
