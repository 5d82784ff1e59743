//! Fetch policy hook
//!
//! A policy is consulted before a discovered link is enqueued and again
//! before a popped task is fetched. Implementations must be cheap and
//! side-effect free; they run on every worker.

use crate::url::{host_key, matches_wildcard};
use url::Url;

/// Decides whether a URL may be crawled
pub trait FetchPolicy: Send + Sync {
    fn allows(&self, url: &Url) -> bool;
}

/// Policy that lets every URL through
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl FetchPolicy for AllowAll {
    fn allows(&self, _url: &Url) -> bool {
        true
    }
}

/// Policy that only allows hosts matching one of the configured patterns
///
/// Patterns use the `example.com` / `*.example.com` forms understood by
/// [`matches_wildcard`]. An empty list allows everything.
#[derive(Debug, Clone, Default)]
pub struct DomainAllowList {
    patterns: Vec<String>,
}

impl DomainAllowList {
    pub fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl FetchPolicy for DomainAllowList {
    fn allows(&self, url: &Url) -> bool {
        if self.patterns.is_empty() {
            return true;
        }

        match host_key(url) {
            Some(host) => self.patterns.iter().any(|p| matches_wildcard(p, &host)),
            None => false,
        }
    }
}

/// Builds the policy for a list of allowed-domain patterns
pub fn from_allowed_domains(patterns: &[String]) -> Box<dyn FetchPolicy> {
    if patterns.is_empty() {
        Box::new(AllowAll)
    } else {
        Box::new(DomainAllowList::new(patterns.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_allow_all() {
        assert!(AllowAll.allows(&url("https://anything.example/")));
    }

    #[test]
    fn test_empty_allow_list_allows_everything() {
        let policy = DomainAllowList::new(Vec::new());
        assert!(policy.allows(&url("https://example.org/page")));
    }

    #[test]
    fn test_allow_list() {
        let policy = DomainAllowList::new(vec![
            "*.wikipedia.org".to_string(),
            "example.com".to_string(),
        ]);

        assert!(policy.allows(&url("https://en.wikipedia.org/wiki/Rust")));
        assert!(policy.allows(&url("https://wikipedia.org/")));
        assert!(policy.allows(&url("http://example.com/a")));
        assert!(policy.allows(&url("http://example.com:8080/a")));

        assert!(!policy.allows(&url("https://www.example.com/")));
        assert!(!policy.allows(&url("https://evil-wikipedia.org/")));
    }

    #[test]
    fn test_from_allowed_domains() {
        let policy = from_allowed_domains(&["localhost".to_string()]);
        assert!(policy.allows(&url("http://localhost:3000/")));
        assert!(!policy.allows(&url("http://127.0.0.1:3000/")));

        let policy = from_allowed_domains(&[]);
        assert!(policy.allows(&url("http://127.0.0.1:3000/")));
    }
}
