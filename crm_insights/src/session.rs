//! Per-dashboard query context: request generations, the session token
//! store, the user directory and the last committed results.
//!
//! Everything a retrieval needs from "the session" is reached through a
//! [`QueryContext`] passed in by the caller; there is no module-level state.
//! Readers load `Arc` snapshots through `arc-swap`, writers swap a whole new
//! snapshot in, so a reader never observes a half-written state.

use std::{
    collections::BTreeMap,
    fs,
    io,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use arc_swap::{ArcSwap, ArcSwapOption};
use chrono_tz::Tz;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::debug;

use crate::models::{
    filter::QueryFilter,
    retrieval::{RetrievalResult, StatsKind},
    user::UserDirectory,
};

/// Key under which [`FileTokenStore`] keeps the session token.
pub const TOKEN_KEY: &str = "access_token";

#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("Token store I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Token store is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
}

/// Persistent key-value home of the bearer token.
pub trait TokenStore: Send + Sync {
    fn get(&self) -> Option<Arc<SecretString>>;

    fn set(&self, token: SecretString) -> Result<(), TokenStoreError>;

    fn clear(&self) -> Result<(), TokenStoreError>;
}

/// In-memory token store for tests and one-shot runs.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: ArcSwapOption<SecretString>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let token: String = token.into();
        let store = Self::new();
        store.token.store(Some(Arc::new(SecretString::new(token.into()))));
        store
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<Arc<SecretString>> {
        self.token.load_full()
    }

    fn set(&self, token: SecretString) -> Result<(), TokenStoreError> {
        self.token.store(Some(Arc::new(token)));
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        self.token.store(None);
        Ok(())
    }
}

/// Token store backed by a small JSON object file (`{"access_token": "…"}`).
///
/// Other keys in the file are preserved. The token is read once on open and
/// cached; writes go to disk first, then to the cache.
pub struct FileTokenStore {
    path: PathBuf,
    cached: ArcSwapOption<SecretString>,
}

impl FileTokenStore {
    /// Opens `path`; a missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TokenStoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = read_entries(&path)?;
        let cached = entries
            .get(TOKEN_KEY)
            .filter(|t| !t.trim().is_empty())
            .map(|t| Arc::new(SecretString::new(t.clone().into())));
        Ok(Self {
            path,
            cached: ArcSwapOption::new(cached),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_token(&self, token: Option<&str>) -> Result<(), TokenStoreError> {
        let mut entries = read_entries(&self.path)?;
        match token {
            Some(t) => entries.insert(TOKEN_KEY.to_string(), t.to_string()),
            None => entries.remove(TOKEN_KEY),
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(&entries)?)?;
        Ok(())
    }
}

fn read_entries(path: &Path) -> Result<BTreeMap<String, String>, TokenStoreError> {
    match fs::read(path) {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(BTreeMap::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(e.into()),
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<Arc<SecretString>> {
        self.cached.load_full()
    }

    fn set(&self, token: SecretString) -> Result<(), TokenStoreError> {
        self.write_token(Some(token.expose_secret()))?;
        self.cached.store(Some(Arc::new(token)));
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        self.cached.store(None);
        self.write_token(None)
    }
}

/// Monotonic request counter. Starting a request bumps it, which
/// invalidates every request started before.
#[derive(Debug, Clone, Default)]
pub struct RequestGeneration(Arc<AtomicU64>);

impl RequestGeneration {
    pub fn begin(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.current() == generation
    }
}

/// Results last committed for display.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub generation: u64,
    pub filter: Option<QueryFilter>,
    pub activity: Option<RetrievalResult>,
    pub deals: Option<RetrievalResult>,
}

/// Shared state threaded through the orchestrator and aggregators.
pub struct QueryContext {
    generation: RequestGeneration,
    timezone: Tz,
    tokens: Arc<dyn TokenStore>,
    directory: ArcSwap<UserDirectory>,
    state: ArcSwap<DashboardState>,
}

impl QueryContext {
    pub fn new(timezone: Tz, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            generation: RequestGeneration::default(),
            timezone,
            tokens,
            directory: ArcSwap::from_pointee(UserDirectory::new()),
            state: ArcSwap::from_pointee(DashboardState::default()),
        }
    }

    pub fn with_directory(self, directory: UserDirectory) -> Self {
        self.directory.store(Arc::new(directory));
        self
    }

    /// Time zone for timestamps that arrive without an offset.
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn tokens(&self) -> Arc<dyn TokenStore> {
        Arc::clone(&self.tokens)
    }

    pub fn directory(&self) -> Arc<UserDirectory> {
        self.directory.load_full()
    }

    pub fn set_directory(&self, directory: UserDirectory) {
        self.directory.store(Arc::new(directory));
    }

    /// Starts a new request; earlier generations become stale.
    pub fn begin_request(&self) -> u64 {
        self.generation.begin()
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.current()
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.is_current(generation)
    }

    pub fn dashboard(&self) -> Arc<DashboardState> {
        self.state.load_full()
    }

    /// Stores a successful result for display.
    ///
    /// Refused (returns `false`) when `result` is a failure or belongs to a
    /// stale generation, so neither can overwrite what is on screen.
    pub fn commit(&self, kind: StatsKind, filter: &QueryFilter, result: &RetrievalResult) -> bool {
        if !result.is_success() || !self.is_current(result.generation) {
            debug!(generation = result.generation, "Result not committed");
            return false;
        }
        self.state.rcu(|current| {
            let mut next = DashboardState::clone(current);
            if next.generation != result.generation {
                next.filter = Some(filter.clone());
            }
            next.generation = result.generation;
            match kind {
                StatsKind::Activity => next.activity = Some(result.clone()),
                StatsKind::Deals => next.deals = Some(result.clone()),
            }
            next
        });
        true
    }
}
