//! Deduplicating request gate.
//!
//! The gate sits in front of every resolution and decides one of three
//! things for a cache key:
//!
//! - another caller is already resolving it: join that resolution
//! - the key's origin saw a new resolution less than `min_interval` ago:
//!   refuse, the caller answers with a fallback right away
//! - otherwise: register a new in-flight resolution and proceed
//!
//! Check and registration happen under the map entry lock for the key, so two
//! callers can never both observe "nothing in flight" and both proceed.
//!
//! Only attempts that reach a source count against the rate limit: a ticket
//! whose lookup is answered from the durable cache refunds its timestamp.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;
use tokio::time::Instant;

use markcache_core::{CacheKey, Error};

type Slot<T> = watch::Receiver<Option<Result<T, Error>>>;

/// Outcome of [`RequestGate::acquire`].
pub enum Admission<T> {
    /// A resolution for this key is already running.
    Joined(InFlight<T>),
    /// The origin was attempted too recently.
    RateLimited,
    /// The caller owns the resolution and must settle the ticket.
    Proceed(Ticket<T>),
}

impl<T> std::fmt::Debug for Admission<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Admission::Joined(_) => f.write_str("Joined"),
            Admission::RateLimited => f.write_str("RateLimited"),
            Admission::Proceed(ticket) => write!(f, "Proceed({})", ticket.key),
        }
    }
}

/// Handle on a resolution owned by another caller.
pub struct InFlight<T> {
    rx: Slot<T>,
}

impl<T: Clone> InFlight<T> {
    /// Wait for the owning caller to settle.
    ///
    /// Fails with [`Error::Internal`] if the owner went away without settling.
    pub async fn wait(mut self) -> Result<T, Error> {
        match self.rx.wait_for(Option::is_some).await {
            Ok(settled) => (*settled)
                .clone()
                .unwrap_or_else(|| Err(Error::Internal("in-flight slot settled empty".into()))),
            Err(_) => Err(Error::Internal("in-flight resolution was abandoned".into())),
        }
    }
}

/// Ownership of an in-flight resolution.
///
/// Dropping the ticket, settled or not, removes the in-flight entry.
pub struct Ticket<T> {
    key: CacheKey,
    tx: watch::Sender<Option<Result<T, Error>>>,
    inflight: Arc<DashMap<CacheKey, Slot<T>>>,
    attempt: Attempt,
}

/// The rate-limit timestamp a ticket recorded, and the one it replaced.
struct Attempt {
    origin: String,
    at: Instant,
    previous: Option<Instant>,
    last_attempt: Arc<DashMap<String, Instant>>,
}

impl<T> Ticket<T> {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Take back this ticket's rate-limit timestamp.
    ///
    /// Called when the lookup was answered without contacting any source.
    /// A newer timestamp recorded for the origin in the meantime is kept.
    pub fn refund_attempt(&self) {
        let attempt = &self.attempt;
        if let Entry::Occupied(mut entry) = attempt.last_attempt.entry(attempt.origin.clone())
            && *entry.get() == attempt.at
        {
            match attempt.previous {
                Some(previous) => {
                    entry.insert(previous);
                }
                None => {
                    entry.remove();
                }
            }
        }
    }

    /// Publish the result to every joined caller and release the key.
    pub fn settle(self, result: Result<T, Error>) {
        self.tx.send_replace(Some(result));
    }
}

impl<T> Drop for Ticket<T> {
    fn drop(&mut self) {
        self.inflight.remove(&self.key);
    }
}

/// Per-service gate holding the in-flight and rate-limit maps.
pub struct RequestGate<T> {
    inflight: Arc<DashMap<CacheKey, Slot<T>>>,
    last_attempt: Arc<DashMap<String, Instant>>,
    min_interval: Duration,
}

impl<T: Clone + Send + Sync + 'static> RequestGate<T> {
    pub fn new(min_interval: Duration) -> Self {
        Self { inflight: Arc::new(DashMap::new()), last_attempt: Arc::new(DashMap::new()), min_interval }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Decide how a lookup for `key` (whose origin is `origin`) proceeds.
    pub fn acquire(&self, key: &CacheKey, origin: &str) -> Admission<T> {
        match self.inflight.entry(key.clone()) {
            Entry::Occupied(entry) => Admission::Joined(InFlight { rx: entry.get().clone() }),
            Entry::Vacant(entry) => {
                let Some(attempt) = self.stamp(origin) else {
                    return Admission::RateLimited;
                };
                let (tx, rx) = watch::channel(None);
                entry.insert(rx);
                Admission::Proceed(Ticket { key: key.clone(), tx, inflight: Arc::clone(&self.inflight), attempt })
            }
        }
    }

    /// Record an attempt for `origin` unless the previous one is too recent.
    fn stamp(&self, origin: &str) -> Option<Attempt> {
        let now = Instant::now();
        let previous = match self.last_attempt.entry(origin.to_string()) {
            Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) < self.min_interval {
                    return None;
                }
                Some(entry.insert(now))
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                None
            }
        };
        Some(Attempt { origin: origin.to_string(), at: now, previous, last_attempt: Arc::clone(&self.last_attempt) })
    }

    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.inflight.contains_key(key)
    }

    /// Number of origins with a recorded attempt.
    pub fn tracked_origins(&self) -> usize {
        self.last_attempt.len()
    }

    /// Forget all rate-limit timestamps.
    pub fn clear_rate_limits(&self) {
        self.last_attempt.clear();
    }

    /// Drop timestamps that can no longer rate-limit anything.
    pub fn prune_rate_limits(&self) -> usize {
        let before = self.last_attempt.len();
        let min_interval = self.min_interval;
        self.last_attempt.retain(|_, last| last.elapsed() < min_interval);
        let pruned = before.saturating_sub(self.last_attempt.len());
        if pruned > 0 {
            tracing::debug!(pruned, "pruned rate-limit entries");
        }
        pruned
    }
}
