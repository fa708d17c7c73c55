use hickory_proto::op::Message;

/// Response cache keyed by the query fingerprint.
///
/// `get` returns a freshly decoded message whose identifier equals the
/// query's and whose record TTLs have been decremented by the time the
/// entry spent in the cache; entries whose remaining TTL would be
/// non-positive are reported as misses. Lookups never perform I/O.
pub trait QueryCache: Send + Sync {
    fn get(&self, query: &Message) -> Option<Message>;

    fn insert(&self, response: &Message);
}
