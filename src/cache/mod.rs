//! The response cache: a bounded LRU store plus the freshness/cacheability
//! rules layered on top of it (§3, §4.1, §4.3).

mod lru;
mod policy;

pub use lru::LruCache;
pub use policy::{CachePolicy, NotCacheableReason};

use crate::http::Response;

/// A stored response together with the UTC epoch second it stops being
/// fresh.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub response: Response,
    pub expiry: i64,
}

/// The shared response cache, keyed on request target (§3's documented
/// host-less `CacheKey` simplification).
pub type ResponseCache = LruCache<String, CacheEntry>;
