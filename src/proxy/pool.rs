use crate::proxy::source::ProxySource;
use crate::HarvestError;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// A candidate outbound HTTP proxy
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyEntry {
    pub address: String,
    pub port: u16,
}

impl ProxyEntry {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// Proxy URL in the form reqwest expects
    pub fn proxy_url(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }
}

impl fmt::Display for ProxyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// When the pool goes back to its source for a fresh listing
#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    /// Refresh whenever fewer entries than this remain
    pub min_size: usize,
    /// Refresh once this much time has passed since the last refresh
    pub refresh_offset: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            min_size: 5,
            refresh_offset: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Default)]
struct PoolState {
    entries: Vec<ProxyEntry>,
    last_refresh: Option<Instant>,
}

/// Refreshable set of proxies with random selection and eviction
///
/// Entries are unique: a refresh drops duplicate listings, so eviction by
/// value removes exactly one proxy.
pub struct ProxyPool {
    source: Arc<dyn ProxySource>,
    settings: PoolSettings,
    state: Mutex<PoolState>,
    /// Serializes refreshes so concurrent callers fetch the listing once
    refresh_lock: tokio::sync::Mutex<()>,
}

impl ProxyPool {
    pub fn new(source: Arc<dyn ProxySource>, settings: PoolSettings) -> Self {
        Self {
            source,
            settings,
            state: Mutex::new(PoolState::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Returns whether the pool is too small or too old
    pub fn needs_refresh(&self) -> bool {
        let state = self.state.lock();
        Self::is_stale(&state, &self.settings)
    }

    fn is_stale(state: &PoolState, settings: &PoolSettings) -> bool {
        if state.entries.len() < settings.min_size {
            return true;
        }
        match state.last_refresh {
            None => true,
            Some(at) => at.elapsed() >= settings.refresh_offset,
        }
    }

    /// Refreshes the pool if it is too small or too old
    ///
    /// Returns `Ok(true)` if a refresh happened. A failed refresh leaves the
    /// current entries in place and reports `ProxyRefresh`.
    pub async fn refresh_if_needed(&self) -> Result<bool, HarvestError> {
        if !self.needs_refresh() {
            return Ok(false);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited for the lock
        if !self.needs_refresh() {
            return Ok(false);
        }

        self.refresh_locked().await?;
        Ok(true)
    }

    /// Unconditionally replaces the pool with a fresh listing
    pub async fn refresh(&self) -> Result<usize, HarvestError> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<usize, HarvestError> {
        tracing::info!("Refreshing proxy pool");

        let listed = match self.source.fetch_entries().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("Proxy refresh failed: {}", e);
                return Err(match e {
                    HarvestError::ProxyRefresh(_) => e,
                    other => HarvestError::ProxyRefresh(other.to_string()),
                });
            }
        };

        let mut seen = HashSet::with_capacity(listed.len());
        let entries: Vec<ProxyEntry> = listed
            .into_iter()
            .filter(|entry| seen.insert(entry.clone()))
            .collect();
        let count = entries.len();

        let mut state = self.state.lock();
        state.entries = entries;
        state.last_refresh = Some(Instant::now());

        tracing::info!("Proxy pool refreshed with {} entries", count);
        Ok(count)
    }

    /// Picks one entry uniformly at random
    pub fn select(&self) -> Result<ProxyEntry, HarvestError> {
        let state = self.state.lock();
        state
            .entries
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or(HarvestError::EmptyPool)
    }

    /// Removes an entry from the pool
    ///
    /// Returns whether the entry was present; evicting an absent entry is a no-op.
    pub fn evict(&self, entry: &ProxyEntry) -> bool {
        let mut state = self.state.lock();
        match state.entries.iter().position(|e| e == entry) {
            Some(index) => {
                state.entries.swap_remove(index);
                tracing::warn!(
                    "Evicted proxy {} ({} remaining)",
                    entry,
                    state.entries.len()
                );
                true
            }
            None => {
                tracing::debug!("Proxy {} already evicted", entry);
                false
            }
        }
    }

    /// Returns whether the pool currently holds `entry`
    pub fn contains(&self, entry: &ProxyEntry) -> bool {
        self.state.lock().entries.contains(entry)
    }

    /// Snapshot of the current entries
    pub fn entries(&self) -> Vec<ProxyEntry> {
        self.state.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }
}

impl fmt::Debug for ProxyPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyPool")
            .field("settings", &self.settings)
            .field("len", &self.len())
            .finish()
    }
}
