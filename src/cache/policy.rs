//! Cacheability, expiry, and revalidation decisions (§4.3).

use http::HeaderValue;
use regex::Regex;
use std::sync::OnceLock;

use crate::http::{Request, Response};
use crate::time_util;

use super::CacheEntry;

/// Why a response was not stored, for the `not cacheable because <REASON>`
/// log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotCacheableReason {
    Private,
    NoStore,
    NoExpiryInformation,
}

impl NotCacheableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotCacheableReason::Private => "private",
            NotCacheableReason::NoStore => "no-store",
            NotCacheableReason::NoExpiryInformation => "no expiry information",
        }
    }
}

fn directive_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([A-Za-z][A-Za-z0-9_-]*)\s*=\s*(\d+)").expect("valid regex"))
}

fn directive_value(cache_control: &str, key: &str) -> Option<i64> {
    for cap in directive_regex().captures_iter(cache_control) {
        if cap[1].eq_ignore_ascii_case(key) {
            if let Ok(n) = cap[2].parse::<i64>() {
                return Some(n);
            }
        }
    }
    None
}

fn has_token(cache_control: &str, token: &str) -> bool {
    cache_control
        .split(',')
        .map(|part| part.trim())
        .any(|part| part.eq_ignore_ascii_case(token))
}

/// Stateless policy logic over a single request/response pair.
pub struct CachePolicy;

impl CachePolicy {
    /// Decides whether `response` (the one just received for this
    /// exchange) may be stored, and if so what its expiry is.
    pub fn classify(response: &Response) -> Result<i64, NotCacheableReason> {
        let cache_control = response.cache_control();

        if let Some(cc) = cache_control {
            if has_token(cc, "private") {
                return Err(NotCacheableReason::Private);
            }
            if has_token(cc, "no-store") {
                return Err(NotCacheableReason::NoStore);
            }
        }

        if cache_control.is_none() {
            let expires = response
                .header_str(http::header::EXPIRES.as_str())
                .and_then(time_util::parse_http_date);
            return expires.ok_or(NotCacheableReason::NoExpiryInformation);
        }

        Ok(Self::compute_expiry(response))
    }

    /// Expiry precedence: `s-maxage`, then `max-age`, then `Expires`.
    fn compute_expiry(response: &Response) -> i64 {
        let now = time_util::now_utc();
        if let Some(cc) = response.cache_control() {
            if let Some(n) = directive_value(cc, "s-maxage") {
                return now + n;
            }
            if let Some(n) = directive_value(cc, "max-age") {
                return now + n;
            }
        }
        response
            .header_str(http::header::EXPIRES.as_str())
            .and_then(time_util::parse_http_date)
            .unwrap_or(now)
    }

    /// Whether a cached entry must be revalidated before being served.
    pub fn needs_revalidation(entry: &CacheEntry) -> bool {
        if let Some(cc) = entry.response.cache_control() {
            if has_token(cc, "no-cache") {
                return true;
            }
        }
        time_util::now_utc() > entry.expiry
    }

    /// Builds the conditional request sent upstream to revalidate a stale
    /// entry: `If-None-Match` from `ETag`, `If-Modified-Since` from
    /// `Last-Modified`. Neither header is set if the cached response
    /// lacked the corresponding validator.
    pub fn build_conditional_request(original: &Request, cached: &Response) -> Request {
        let mut conditional = original.clone();
        if let Some(etag) = cached.header_str(http::header::ETAG.as_str()) {
            if let Ok(value) = HeaderValue::from_str(etag) {
                conditional.headers.insert(http::header::IF_NONE_MATCH, value);
            }
        }
        if let Some(last_modified) = cached.header_str(http::header::LAST_MODIFIED.as_str()) {
            if let Ok(value) = HeaderValue::from_str(last_modified) {
                conditional.headers.insert(http::header::IF_MODIFIED_SINCE, value);
            }
        }
        conditional
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Version;
    use http::HeaderMap;

    fn response_with(cache_control: Option<&str>, expires: Option<&str>) -> Response {
        let mut headers = HeaderMap::new();
        if let Some(cc) = cache_control {
            headers.insert(http::header::CACHE_CONTROL, HeaderValue::from_str(cc).unwrap());
        }
        if let Some(exp) = expires {
            headers.insert(http::header::EXPIRES, HeaderValue::from_str(exp).unwrap());
        }
        Response { status: 200, version: Version::Http11, headers, body: Vec::new(), reason: None }
    }

    #[test]
    fn private_is_not_cacheable() {
        let resp = response_with(Some("private"), None);
        assert_eq!(CachePolicy::classify(&resp), Err(NotCacheableReason::Private));
    }

    #[test]
    fn no_store_is_not_cacheable() {
        let resp = response_with(Some("no-store"), None);
        assert_eq!(CachePolicy::classify(&resp), Err(NotCacheableReason::NoStore));
    }

    #[test]
    fn missing_cache_control_and_expires_is_not_cacheable() {
        let resp = response_with(None, None);
        assert_eq!(
            CachePolicy::classify(&resp),
            Err(NotCacheableReason::NoExpiryInformation)
        );
    }

    #[test]
    fn max_age_wins_over_absent_expires() {
        let resp = response_with(Some("max-age=60"), None);
        let before = time_util::now_utc();
        let expiry = CachePolicy::classify(&resp).unwrap();
        assert!(expiry >= before + 60 && expiry <= before + 61);
    }

    #[test]
    fn s_maxage_takes_precedence_over_max_age() {
        let resp = response_with(Some("max-age=10, s-maxage=120"), None);
        let before = time_util::now_utc();
        let expiry = CachePolicy::classify(&resp).unwrap();
        assert!(expiry >= before + 120 && expiry <= before + 121);
    }

    #[test]
    fn expires_header_used_when_present_with_cache_control() {
        let resp = response_with(Some("public"), Some("Sun, 06 Nov 1994 08:49:37 GMT"));
        let expiry = CachePolicy::classify(&resp).unwrap();
        assert_eq!(expiry, 784111777);
    }

    #[test]
    fn no_cache_token_forces_revalidation_even_when_unexpired() {
        let resp = response_with(Some("no-cache"), None);
        let entry = CacheEntry { response: resp, expiry: time_util::now_utc() + 1000 };
        assert!(CachePolicy::needs_revalidation(&entry));
    }

    #[test]
    fn past_expiry_forces_revalidation() {
        let resp = response_with(Some("max-age=60"), None);
        let entry = CacheEntry { response: resp, expiry: time_util::now_utc() - 1 };
        assert!(CachePolicy::needs_revalidation(&entry));
    }

    #[test]
    fn fresh_entry_does_not_need_revalidation() {
        let resp = response_with(Some("max-age=60"), None);
        let entry = CacheEntry { response: resp, expiry: time_util::now_utc() + 60 };
        assert!(!CachePolicy::needs_revalidation(&entry));
    }

    #[test]
    fn conditional_request_uses_if_none_match_not_etag() {
        let original = Request {
            method: crate::http::Method::Get,
            target: "/a".to_string(),
            version: Version::Http11,
            headers: HeaderMap::new(),
            body: None,
        };
        let mut cached_headers = HeaderMap::new();
        cached_headers.insert(http::header::ETAG, HeaderValue::from_static("\"abc123\""));
        let cached = Response { status: 200, version: Version::Http11, headers: cached_headers, body: Vec::new(), reason: None };

        let conditional = CachePolicy::build_conditional_request(&original, &cached);
        assert_eq!(
            conditional.header_str("if-none-match"),
            Some("\"abc123\"")
        );
        assert!(conditional.headers.get(http::header::ETAG).is_none());
    }

    #[test]
    fn conditional_request_sets_if_modified_since() {
        let original = Request {
            method: crate::http::Method::Get,
            target: "/a".to_string(),
            version: Version::Http11,
            headers: HeaderMap::new(),
            body: None,
        };
        let mut cached_headers = HeaderMap::new();
        cached_headers.insert(
            http::header::LAST_MODIFIED,
            HeaderValue::from_static("Sun, 06 Nov 1994 08:49:37 GMT"),
        );
        let cached = Response { status: 200, version: Version::Http11, headers: cached_headers, body: Vec::new(), reason: None };

        let conditional = CachePolicy::build_conditional_request(&original, &cached);
        assert_eq!(
            conditional.header_str("if-modified-since"),
            Some("Sun, 06 Nov 1994 08:49:37 GMT")
        );
    }
}
