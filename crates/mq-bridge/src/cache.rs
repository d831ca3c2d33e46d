//! Credential-scoped resource cache.
//!
//! One broker session and one private reply channel per distinct
//! [`Credential`], created lazily on first use and shared by every request
//! presenting that credential.
//!
//! ```text
//! Credential ──► CacheEntry ─┬─ OnceCell<ConnectionHandle>   (authenticate once)
//!                            ├─ OnceCell<ReplyChannel>       (allocate once, after the handle)
//!                            ├─ last_used                    (LRU / idle eviction)
//!                            └─ in_use                       (requests holding a lease)
//! ```
//!
//! Eviction never takes an entry with a request in flight: a [`ResourceLease`]
//! keeps its entry busy until dropped, and both idle and LRU eviction skip
//! busy entries. The busy check runs inside `remove_if`, under the same shard
//! lock a new lease is taken under.
//!
//! Concurrent first-time callers for the same credential share one creation:
//! the entry is inserted through the map's entry API and each resource is
//! produced through `OnceCell::get_or_try_init`. A failed creation leaves the
//! cell empty so the next request tries again.

use crate::domain::{BrokerError, CacheConfig, ConnectionError, Credential, ReplyChannel};
use crate::ports::{ConnectionHandle, EndpointDirectory, MessageBroker};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

struct CacheEntry {
    connection: OnceCell<ConnectionHandle>,
    reply_channel: OnceCell<ReplyChannel>,
    last_used: Mutex<Instant>,
    in_use: AtomicUsize,
}

impl CacheEntry {
    fn new() -> Self {
        Self {
            connection: OnceCell::new(),
            reply_channel: OnceCell::new(),
            last_used: Mutex::new(Instant::now()),
            in_use: AtomicUsize::new(0),
        }
    }

    fn is_busy(&self) -> bool {
        self.in_use.load(Ordering::Acquire) > 0
    }

    fn touch(&self) {
        *self.last_used.lock() = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_used.lock().elapsed()
    }

    async fn close(&self) {
        if let Some(handle) = self.connection.get() {
            handle.session().close().await;
        }
    }
}

/// Keeps an entry busy until dropped; the drop counts as a use.
struct InUse(Arc<CacheEntry>);

impl InUse {
    /// Must be called while the map guard for `entry` is still held.
    fn new(entry: &Arc<CacheEntry>) -> Self {
        entry.in_use.fetch_add(1, Ordering::AcqRel);
        entry.touch();
        Self(Arc::clone(entry))
    }
}

impl Deref for InUse {
    type Target = CacheEntry;

    fn deref(&self) -> &CacheEntry {
        &self.0
    }
}

impl Drop for InUse {
    fn drop(&mut self) {
        self.0.touch();
        self.0.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Connection and reply channel for one credential, held for the length of
/// a request.
///
/// While any lease is alive the cache entry is neither idle-evicted nor
/// chosen as the LRU victim.
pub struct ResourceLease {
    handle: ConnectionHandle,
    channel: ReplyChannel,
    _in_use: InUse,
}

impl ResourceLease {
    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    pub fn channel(&self) -> &ReplyChannel {
        &self.channel
    }
}

impl fmt::Debug for ResourceLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceLease")
            .field("handle", &self.handle)
            .field("channel", &self.channel)
            .finish()
    }
}

/// Cache counters
#[derive(Debug, Default)]
pub struct CacheStats {
    pub connections_created: AtomicU64,
    pub channels_created: AtomicU64,
    /// Acquisitions served from an already created resource
    pub hits: AtomicU64,
    /// Entries dropped by LRU or idle eviction
    pub evictions: AtomicU64,
    /// Entries dropped explicitly
    pub invalidations: AtomicU64,
    pub failures: AtomicU64,
}

/// Point-in-time copy of [`CacheStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheSnapshot {
    pub entries: usize,
    pub connections_created: u64,
    pub channels_created: u64,
    pub hits: u64,
    pub evictions: u64,
    pub invalidations: u64,
    pub failures: u64,
}

/// Credential-keyed cache of broker sessions and reply channels.
pub struct ResourceCache {
    directory: Arc<dyn EndpointDirectory>,
    broker: Arc<dyn MessageBroker>,
    entries: DashMap<Credential, Arc<CacheEntry>>,
    /// Soft bound: concurrent inserts of new credentials may overshoot briefly,
    /// and entries in use are never evicted to make room
    max_entries: Option<usize>,
    idle_ttl: Option<Duration>,
    stats: CacheStats,
}

impl ResourceCache {
    /// Unbounded cache.
    pub fn new(directory: Arc<dyn EndpointDirectory>, broker: Arc<dyn MessageBroker>) -> Self {
        Self {
            directory,
            broker,
            entries: DashMap::new(),
            max_entries: None,
            idle_ttl: None,
            stats: CacheStats::default(),
        }
    }

    /// Cache with the bounds from `config`.
    pub fn with_config(
        directory: Arc<dyn EndpointDirectory>,
        broker: Arc<dyn MessageBroker>,
        config: &CacheConfig,
    ) -> Self {
        let mut cache = Self::new(directory, broker);
        cache.max_entries = config.max_entries;
        cache.idle_ttl = config.idle_ttl;
        cache
    }

    /// Cached connection for `credential`, created on first use.
    pub async fn acquire_connection(
        &self,
        credential: &Credential,
    ) -> Result<ConnectionHandle, ConnectionError> {
        let entry = self.entry(credential).await;
        self.connection_of(&entry, credential).await
    }

    /// Cached reply channel for `credential`, allocated through `handle` on
    /// first use.
    ///
    /// `handle` must be the connection currently cached for `credential`.
    pub async fn acquire_reply_channel(
        &self,
        handle: &ConnectionHandle,
        credential: &Credential,
    ) -> Result<ReplyChannel, ConnectionError> {
        let entry = self.entry(credential).await;
        self.channel_of(&entry, handle, credential).await
    }

    /// Connection and reply channel in one step.
    ///
    /// The entry is only protected from eviction while this call runs; use
    /// [`lease`](Self::lease) to keep it for the length of a request.
    pub async fn acquire(
        &self,
        credential: &Credential,
    ) -> Result<(ConnectionHandle, ReplyChannel), ConnectionError> {
        let lease = self.lease(credential).await?;
        Ok((lease.handle.clone(), lease.channel.clone()))
    }

    /// Connection and reply channel, kept out of eviction until the lease is
    /// dropped.
    pub async fn lease(&self, credential: &Credential) -> Result<ResourceLease, ConnectionError> {
        let entry = self.entry(credential).await;
        let handle = self.connection_of(&entry, credential).await?;
        let channel = self.channel_of(&entry, &handle, credential).await?;
        Ok(ResourceLease {
            handle,
            channel,
            _in_use: entry,
        })
    }

    /// Drop the entry for `credential` and close its session.
    pub async fn invalidate(&self, credential: &Credential) -> bool {
        match self.entries.remove(credential) {
            Some((_, entry)) => {
                self.stats.invalidations.fetch_add(1, Ordering::Relaxed);
                info!(credential = credential.identity(), "Cache entry invalidated");
                entry.close().await;
                true
            }
            None => false,
        }
    }

    /// Drop the entry only if it still holds `handle`'s session.
    ///
    /// A request that saw a dead session must not throw away a replacement
    /// another request already created.
    pub async fn invalidate_session(&self, credential: &Credential, handle: &ConnectionHandle) -> bool {
        let removed = self.entries.remove_if(credential, |_, entry| {
            entry
                .connection
                .get()
                .is_some_and(|cached| cached.same_session(handle))
        });
        match removed {
            Some((_, entry)) => {
                self.stats.invalidations.fetch_add(1, Ordering::Relaxed);
                info!(
                    credential = credential.identity(),
                    session = %handle.session_id(),
                    "Cache entry invalidated after session loss"
                );
                entry.close().await;
                true
            }
            None => false,
        }
    }

    /// Remove entries idle longer than the configured TTL.
    ///
    /// Entries with a lease outstanding are not idle, however long ago they
    /// were taken. Returns the number of entries removed; always 0 without a
    /// TTL.
    pub async fn evict_idle(&self) -> usize {
        let Some(ttl) = self.idle_ttl else {
            return 0;
        };

        let idle: Vec<Credential> = self
            .entries
            .iter()
            .filter(|e| !e.value().is_busy() && e.value().idle_for() > ttl)
            .map(|e| e.key().clone())
            .collect();

        let mut removed = 0;
        for credential in idle {
            // Re-check: the entry may have been used since the scan.
            if let Some((_, entry)) = self
                .entries
                .remove_if(&credential, |_, entry| !entry.is_busy() && entry.idle_for() > ttl)
            {
                debug!(credential = credential.identity(), "Evicting idle cache entry");
                entry.close().await;
                removed += 1;
            }
        }

        if removed > 0 {
            self.stats
                .evictions
                .fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    /// Close every cached session and empty the cache.
    pub async fn close_all(&self) {
        let credentials: Vec<Credential> = self.entries.iter().map(|e| e.key().clone()).collect();
        for credential in credentials {
            if let Some((_, entry)) = self.entries.remove(&credential) {
                entry.close().await;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, credential: &Credential) -> bool {
        self.entries.contains_key(credential)
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            entries: self.len(),
            connections_created: self.stats.connections_created.load(Ordering::Relaxed),
            channels_created: self.stats.channels_created.load(Ordering::Relaxed),
            hits: self.stats.hits.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            invalidations: self.stats.invalidations.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
        }
    }

    /// Existing entry, or a fresh one inserted atomically, marked in use.
    async fn entry(&self, credential: &Credential) -> InUse {
        if let Some(entry) = self.entries.get(credential) {
            return InUse::new(entry.value());
        }

        if let Some(victim) = self.make_room() {
            victim.close().await;
        }

        let entry = self
            .entries
            .entry(credential.clone())
            .or_insert_with(|| Arc::new(CacheEntry::new()));
        InUse::new(entry.value())
    }

    /// Evict the least recently used idle entry when at capacity.
    fn make_room(&self) -> Option<Arc<CacheEntry>> {
        let max = self.max_entries?;
        if self.entries.len() < max {
            return None;
        }

        let oldest = self
            .entries
            .iter()
            .filter(|e| !e.value().is_busy())
            .min_by_key(|e| *e.value().last_used.lock())
            .map(|e| e.key().clone());
        let Some(oldest) = oldest else {
            debug!(max_entries = max, "Every cache entry in use, growing past capacity");
            return None;
        };

        let (credential, entry) = self.entries.remove_if(&oldest, |_, entry| !entry.is_busy())?;
        self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        debug!(
            credential = credential.identity(),
            max_entries = max,
            "Evicting least recently used cache entry"
        );
        Some(entry)
    }

    async fn connection_of(
        &self,
        entry: &CacheEntry,
        credential: &Credential,
    ) -> Result<ConnectionHandle, ConnectionError> {
        if let Some(handle) = entry.connection.get() {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(handle.clone());
        }

        entry
            .connection
            .get_or_try_init(|| self.connect(credential))
            .await
            .cloned()
            .inspect_err(|_| {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
            })
    }

    async fn channel_of(
        &self,
        entry: &CacheEntry,
        handle: &ConnectionHandle,
        credential: &Credential,
    ) -> Result<ReplyChannel, ConnectionError> {
        match entry.connection.get() {
            Some(cached) if cached.same_session(handle) => {}
            _ => {
                return Err(ConnectionError::ChannelAllocation(format!(
                    "connection {} is not the cached session for '{}'",
                    handle.session_id(),
                    credential.identity()
                )));
            }
        }

        if let Some(channel) = entry.reply_channel.get() {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(channel.clone());
        }

        entry
            .reply_channel
            .get_or_try_init(|| async {
                let channel = handle
                    .session()
                    .allocate_private_channel()
                    .await
                    .map_err(|e| {
                        error!(
                            credential = credential.identity(),
                            error = %e,
                            "Reply channel allocation failed"
                        );
                        ConnectionError::ChannelAllocation(e.to_string())
                    })?;
                self.stats.channels_created.fetch_add(1, Ordering::Relaxed);
                debug!(
                    credential = credential.identity(),
                    channel = %channel,
                    "Reply channel allocated"
                );
                Ok::<_, ConnectionError>(channel)
            })
            .await
            .cloned()
            .inspect_err(|_| {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
            })
    }

    async fn connect(&self, credential: &Credential) -> Result<ConnectionHandle, ConnectionError> {
        let endpoint = self.directory.resolve_endpoint().await.inspect_err(|e| {
            error!(error = %e, "Broker endpoint lookup failed");
        })?;

        let handle = self
            .broker
            .authenticate(&endpoint, credential.identity(), credential.secret())
            .await
            .map_err(|e| {
                error!(
                    credential = credential.identity(),
                    endpoint = %endpoint.name,
                    error = %e,
                    "Broker connection failed"
                );
                let reason = match e {
                    BrokerError::AuthenticationRejected(reason) => reason,
                    other => other.to_string(),
                };
                ConnectionError::AuthenticationRejected {
                    identity: credential.identity().to_string(),
                    reason,
                }
            })?;

        self.stats.connections_created.fetch_add(1, Ordering::Relaxed);
        info!(
            credential = credential.identity(),
            session = %handle.session_id(),
            "Broker connection established"
        );
        Ok(handle)
    }
}

/// Background task sweeping idle entries
pub async fn cleanup_task(cache: Arc<ResourceCache>, interval: Duration) {
    let mut cleanup_interval = tokio::time::interval(interval);
    cleanup_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        cleanup_interval.tick().await;
        let removed = cache.evict_idle().await;
        if removed > 0 {
            debug!(removed = removed, "Evicted idle cache entries");
        }
    }
}
