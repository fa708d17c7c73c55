use super::fingerprint::fingerprint;
use crate::dns::clock::unix_now;
use doh_proxy_application::ports::QueryCache;
use doh_proxy_domain::message::ttl::min_ttl;
use hickory_proto::op::Message;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{debug, error};

struct CacheEntry {
    time_arrival: i64,
    expire_at: i64,
    packed: Vec<u8>,
}

#[derive(Default)]
struct CacheInner {
    store: HashMap<String, CacheEntry>,
    /// expire-instant → fingerprints, ordered so the next entry to expire
    /// is the first key.
    index: BTreeMap<i64, Vec<String>>,
}

pub struct ResponseCache {
    inner: RwLock<CacheInner>,
    next_expire: AtomicI64,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(CacheInner::default()),
            next_expire: AtomicI64::new(i64::MAX),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().store.is_empty()
    }

    /// Looks up the query's fingerprint and returns a freshly decoded
    /// message with the identifier rewritten and every Answer/Authority
    /// TTL decremented by the entry's age. A TTL that would reach zero
    /// turns the lookup into a miss.
    pub fn get(&self, query: &Message) -> Option<Message> {
        let key = fingerprint(query)?;
        let (time_arrival, packed) = {
            let inner = self.inner.read();
            let entry = inner.store.get(&key)?;
            (entry.time_arrival, entry.packed.clone())
        };

        let mut msg = match Message::from_vec(&packed) {
            Ok(msg) => msg,
            Err(e) => {
                error!(error = %e, "can't unpack cached message");
                return None;
            }
        };

        let elapsed = unix_now() - time_arrival;
        let mut answers = msg.take_answers();
        for record in &mut answers {
            let remaining = i64::from(record.ttl()) - elapsed;
            if remaining <= 0 {
                return None;
            }
            record.set_ttl(remaining as u32);
        }
        let mut authorities = msg.take_name_servers();
        for record in &mut authorities {
            let remaining = i64::from(record.ttl()) - elapsed;
            if remaining <= 0 {
                return None;
            }
            record.set_ttl(remaining as u32);
        }
        msg.insert_answers(answers);
        msg.insert_name_servers(authorities);
        msg.set_id(query.id());
        Some(msg)
    }

    /// Packs the response and stores it under its fingerprint; the expiry
    /// index gets a record at `now + min_ttl`.
    pub fn insert(&self, response: &Message) {
        let Some(key) = fingerprint(response) else {
            return;
        };
        let packed = match response.to_vec() {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(error = %e, "can't pack message for cache");
                return;
            }
        };

        let now = unix_now();
        let expire_at = now + i64::from(min_ttl(response));

        let mut inner = self.inner.write();
        inner.store.insert(
            key.clone(),
            CacheEntry {
                time_arrival: now,
                expire_at,
                packed,
            },
        );
        inner.index.entry(expire_at).or_default().push(key);
        self.next_expire.fetch_min(expire_at, Ordering::AcqRel);
        debug!(
            size = inner.store.len(),
            expire_at, "inserted response into cache"
        );
    }

    /// One expiry pass: drops every index record at or before `now`,
    /// removing store entries that are themselves due. A fingerprint
    /// re-inserted with a later deadline survives its stale index record.
    pub fn evict_expired(&self) {
        let now = unix_now();
        if self.next_expire.load(Ordering::Acquire) > now {
            return;
        }

        let mut inner = self.inner.write();
        while let Some((&when, _)) = inner.index.first_key_value() {
            if when > now {
                break;
            }
            let keys = inner.index.remove(&when).unwrap_or_default();
            for key in keys {
                let due = inner
                    .store
                    .get(&key)
                    .is_some_and(|entry| entry.expire_at <= now);
                if due {
                    debug!(key = %key, "cache entry expired");
                    inner.store.remove(&key);
                }
            }
        }
        let next = inner
            .index
            .first_key_value()
            .map(|(&when, _)| when)
            .unwrap_or(i64::MAX);
        self.next_expire.store(next, Ordering::Release);
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache for ResponseCache {
    fn get(&self, query: &Message) -> Option<Message> {
        ResponseCache::get(self, query)
    }

    fn insert(&self, response: &Message) {
        ResponseCache::insert(self, response);
    }
}
