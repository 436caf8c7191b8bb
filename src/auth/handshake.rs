//! Pending OAuth handshakes
//!
//! A redirect to a provider leaves a correlation record here until the
//! matching callback arrives. Records are single use and expire after a TTL.
//! Expired entries are swept from `insert` at most once per sweep interval,
//! and the map never holds more than `max_pending` records.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use super::models::Provider;

const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Error, PartialEq)]
pub enum HandshakeError {
    #[error("too many pending sign-ins (limit {0})")]
    Full(usize),
}

#[derive(Debug, Clone)]
pub struct PendingHandshake {
    pub provider: Provider,
    /// OAuth1 request-token secret; unused by OAuth2 providers
    pub secret: Option<String>,
    created_at: Instant,
}

impl PendingHandshake {
    pub fn new(provider: Provider, secret: Option<String>) -> Self {
        Self {
            provider,
            secret,
            created_at: Instant::now(),
        }
    }
}

#[derive(Debug)]
struct Pending {
    entries: HashMap<String, PendingHandshake>,
    last_sweep: Instant,
}

#[derive(Debug)]
pub struct HandshakeStore {
    ttl: Duration,
    max_pending: usize,
    sweep_interval: Duration,
    pending: Mutex<Pending>,
}

impl HandshakeStore {
    pub fn new(ttl: Duration, max_pending: usize) -> Self {
        Self {
            ttl,
            max_pending,
            sweep_interval: ttl.min(MAX_SWEEP_INTERVAL),
            pending: Mutex::new(Pending {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Park a handshake; refused once `max_pending` live records exist
    pub fn insert(&self, key: String, handshake: PendingHandshake) -> Result<(), HandshakeError> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());

        if pending.last_sweep.elapsed() >= self.sweep_interval {
            let before = pending.entries.len();
            let ttl = self.ttl;
            pending.entries.retain(|_, h| h.created_at.elapsed() <= ttl);
            pending.last_sweep = Instant::now();
            if pending.entries.len() != before {
                debug!(
                    evicted = before - pending.entries.len(),
                    "Evicted expired OAuth handshakes"
                );
            }
        }

        if pending.entries.len() >= self.max_pending && !pending.entries.contains_key(&key) {
            warn!(limit = self.max_pending, "Pending OAuth handshake limit reached");
            return Err(HandshakeError::Full(self.max_pending));
        }

        pending.entries.insert(key, handshake);
        Ok(())
    }

    /// Remove and return the handshake for `key` if it exists, has not
    /// expired, and was started for `provider`
    pub fn take(&self, key: &str, provider: Provider) -> Option<PendingHandshake> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let handshake = pending.entries.remove(key)?;
        if handshake.created_at.elapsed() > self.ttl {
            debug!(provider = %handshake.provider, "OAuth handshake expired");
            return None;
        }
        if handshake.provider != provider {
            debug!(
                expected = %provider,
                found = %handshake.provider,
                "OAuth handshake belongs to another provider"
            );
            return None;
        }
        Some(handshake)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn google() -> PendingHandshake {
        PendingHandshake::new(Provider::Google, None)
    }

    #[test]
    fn test_take_is_single_use() {
        let store = HandshakeStore::new(Duration::from_secs(60), 100);
        store.insert("k1".into(), google()).unwrap();

        assert!(store.take("k1", Provider::Google).is_some());
        assert!(store.take("k1", Provider::Google).is_none());
    }

    #[test]
    fn test_provider_mismatch_rejected() {
        let store = HandshakeStore::new(Duration::from_secs(60), 100);
        store.insert("k1".into(), google()).unwrap();

        assert!(store.take("k1", Provider::Facebook).is_none());
        // A mismatched attempt still consumes the record
        assert!(store.take("k1", Provider::Google).is_none());
    }

    #[test]
    fn test_secret_round_trips() {
        let store = HandshakeStore::new(Duration::from_secs(60), 100);
        store
            .insert(
                "req-token".into(),
                PendingHandshake::new(Provider::Twitter, Some("req-secret".into())),
            )
            .unwrap();

        let handshake = store.take("req-token", Provider::Twitter).unwrap();
        assert_eq!(handshake.secret.as_deref(), Some("req-secret"));
    }

    #[test]
    fn test_expired_entries_not_returned_and_evicted() {
        let store = HandshakeStore::new(Duration::from_millis(20), 100);
        store.insert("old".into(), google()).unwrap();
        std::thread::sleep(Duration::from_millis(40));

        assert!(store.take("old", Provider::Google).is_none());

        store.insert("a".into(), google()).unwrap();
        std::thread::sleep(Duration::from_millis(40));
        store.insert("b".into(), google()).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_full_store_refuses_until_a_slot_frees() {
        let store = HandshakeStore::new(Duration::from_secs(60), 2);
        store.insert("k1".into(), google()).unwrap();
        store.insert("k2".into(), google()).unwrap();

        assert_eq!(
            store.insert("k3".into(), google()),
            Err(HandshakeError::Full(2))
        );

        assert!(store.take("k1", Provider::Google).is_some());
        store.insert("k3".into(), google()).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_expired_entries_free_capacity() {
        let store = HandshakeStore::new(Duration::from_millis(20), 1);
        store.insert("a".into(), google()).unwrap();
        std::thread::sleep(Duration::from_millis(40));

        store.insert("b".into(), google()).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.take("b", Provider::Google).is_some());
    }

    #[test]
    fn test_flood_of_redirects_stays_bounded() {
        let store = HandshakeStore::new(Duration::from_secs(600), 1_000);

        let accepted = (0..50_000)
            .filter(|i| store.insert(format!("H_{}", i), google()).is_ok())
            .count();

        assert_eq!(accepted, 1_000);
        assert_eq!(store.len(), 1_000);
    }
}
