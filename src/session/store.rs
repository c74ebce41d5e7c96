//! Bounded LRU store of client identities.
//!
//! An identity is created the first time a client is seen, keeps the same
//! user-agent for its whole life, and picks up credentials and a session
//! cookie as the pipeline runs. Once `capacity` identities exist, the least
//! recently touched one is evicted.

use crate::portal::agent::assign_fingerprint;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use indexmap::IndexMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Source of "now" for last-touched bookkeeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Who a session belongs to: a client IP, or `"default"` when none is known.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub const DEFAULT: &'static str = "default";

    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        if key.trim().is_empty() {
            Self::default_identity()
        } else {
            Self(key)
        }
    }

    pub fn default_identity() -> Self {
        Self(Self::DEFAULT.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(custom_debug_derive::Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    #[debug(with = "crate::fmt::redacted")]
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

#[derive(custom_debug_derive::Debug, Clone)]
pub struct IdentityEntry {
    pub user_agent: String,
    pub credentials: Option<Credentials>,
    #[debug(with = "crate::fmt::redacted_opt")]
    pub session_cookie: Option<String>,
    pub last_touched: DateTime<Utc>,
}

struct Inner {
    capacity: usize,
    /// Ordered least- to most-recently touched.
    entries: IndexMap<IdentityKey, IdentityEntry>,
}

impl Inner {
    /// Move `key` to the most-recent end; returns its new index.
    fn promote(&mut self, key: &IdentityKey) -> Option<usize> {
        let index = self.entries.get_index_of(key)?;
        let last = self.entries.len() - 1;
        self.entries.move_index(index, last);
        Some(last)
    }

    fn evict_overflow(&mut self) -> Vec<IdentityKey> {
        let mut evicted = Vec::new();
        while self.entries.len() > self.capacity {
            match self.entries.shift_remove_index(0) {
                Some((key, _)) => evicted.push(key),
                None => break,
            }
        }
        evicted
    }
}

/// Shared, cloneable handle to the identity store.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<Inner>>,
    /// identity → single-flight guard for session acquisition
    locks: Arc<DashMap<IdentityKey, Arc<tokio::sync::Mutex<()>>>>,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                capacity: capacity.max(1),
                entries: IndexMap::new(),
            })),
            locks: Arc::new(DashMap::new()),
            clock,
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch an identity and mark it as recently used.
    pub fn get(&self, key: &IdentityKey) -> Option<IdentityEntry> {
        let now = self.clock.now();
        let mut inner = self.inner();
        let index = inner.promote(key)?;
        let (_, entry) = inner.entries.get_index_mut(index)?;
        entry.last_touched = now;
        Some(entry.clone())
    }

    /// Read an identity without affecting recency.
    pub fn peek(&self, key: &IdentityKey) -> Option<IdentityEntry> {
        self.inner().entries.get(key).cloned()
    }

    /// Insert or replace an identity as most recently used.
    pub fn put(&self, key: IdentityKey, entry: IdentityEntry) {
        let evicted = {
            let mut inner = self.inner();
            inner.entries.shift_remove(&key);
            inner.entries.insert(key, entry);
            inner.evict_overflow()
        };
        self.forget(evicted);
    }

    /// Mark an identity as recently used. Returns false if it is unknown.
    pub fn touch(&self, key: &IdentityKey) -> bool {
        self.get(key).is_some()
    }

    /// The identity's pinned user-agent, assigning one from the pool on first sight.
    pub fn user_agent_for(&self, key: &IdentityKey) -> String {
        self.upsert(key, |_| {}).user_agent
    }

    /// Remember the credentials last used by an identity so renewal can replay them.
    pub fn record_credentials(&self, key: &IdentityKey, credentials: Credentials) {
        self.upsert(key, |entry| entry.credentials = Some(credentials));
    }

    /// Store a freshly established session for an identity.
    pub fn record_session(&self, key: &IdentityKey, user_agent: &str, cookie: String) {
        self.upsert(key, |entry| {
            entry.user_agent = user_agent.to_owned();
            entry.session_cookie = Some(cookie);
        });
    }

    /// All identities, least recently used first.
    pub fn keys(&self) -> Vec<IdentityKey> {
        self.inner().entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner().capacity
    }

    /// Guard serializing session acquisition for one identity. Different
    /// identities get different guards and never contend.
    pub fn lock(&self, key: &IdentityKey) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn upsert(&self, key: &IdentityKey, update: impl FnOnce(&mut IdentityEntry)) -> IdentityEntry {
        let now = self.clock.now();
        let (entry, evicted) = {
            let mut inner = self.inner();
            let entry = inner.entries.entry(key.clone()).or_insert_with(|| {
                let user_agent = assign_fingerprint();
                debug!(identity = %key, user_agent, "new identity");
                IdentityEntry {
                    user_agent: user_agent.to_owned(),
                    credentials: None,
                    session_cookie: None,
                    last_touched: now,
                }
            });
            update(entry);
            entry.last_touched = now;
            let entry = entry.clone();
            inner.promote(key);
            (entry, inner.evict_overflow())
        };
        self.forget(evicted);
        entry
    }

    fn forget(&self, evicted: Vec<IdentityKey>) {
        for key in evicted {
            debug!(identity = %key, "identity evicted");
            // a guard still out means acquisition is in flight; keep it shared
            self.locks
                .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        }
    }
}
