use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::store::NodeStore;

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

type CacheKey = (PathBuf, PathBuf);

struct Entry {
    store: Arc<NodeStore>,
    expires_at: Instant,
}

/// Loaded graphs keyed by (repository root, graph directory), each reused
/// until its TTL runs out.
pub struct GraphCache<C: Clock = SystemClock> {
    clock: C,
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, Entry>>,
}

impl GraphCache<SystemClock> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }
}

impl<C: Clock> GraphCache<C> {
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        Self {
            clock,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Entry>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// `specgraph`, `specgraph/` and `./specgraph` share one entry.
    fn key(repo_dir: &Path, directory: &str) -> CacheKey {
        let repo = repo_dir
            .canonicalize()
            .unwrap_or_else(|_| repo_dir.to_path_buf());
        let directory: PathBuf = Path::new(directory)
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect();
        (repo, directory)
    }

    /// Cached store for the key, or a fresh one from `load` when the entry is
    /// missing, expired, or `force_reload` is set. Load errors are not cached.
    pub fn get<F>(
        &self,
        repo_dir: &Path,
        directory: &str,
        force_reload: bool,
        load: F,
    ) -> Result<Arc<NodeStore>>
    where
        F: FnOnce() -> Result<NodeStore>,
    {
        let key = Self::key(repo_dir, directory);
        let now = self.clock.now();

        if !force_reload {
            if let Some(entry) = self.lock().get(&key) {
                if now < entry.expires_at {
                    tracing::debug!("Graph cache hit for {}/{}", key.0.display(), key.1.display());
                    return Ok(Arc::clone(&entry.store));
                }
            }
        }

        tracing::debug!("Loading graph {}/{}", key.0.display(), key.1.display());
        let store = Arc::new(load()?);
        self.lock().insert(
            key,
            Entry {
                store: Arc::clone(&store),
                expires_at: now + self.ttl,
            },
        );
        Ok(store)
    }

    pub fn invalidate(&self, repo_dir: &Path, directory: &str) {
        self.lock().remove(&Self::key(repo_dir, directory));
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
