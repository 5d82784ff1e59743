/// Checks whether a host falls under an allowed-domain pattern
///
/// Two pattern shapes are understood:
/// - `example.com` matches that host only
/// - `*.example.com` matches `example.com` itself and every subdomain of it
///
/// Comparison is ASCII case-insensitive on both sides.
///
/// # Examples
///
/// ```
/// use linkdump::url::matches_wildcard;
///
/// assert!(matches_wildcard("example.com", "Example.com"));
/// assert!(!matches_wildcard("example.com", "blog.example.com"));
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("*.example.com", "notexample.com"));
/// ```
pub fn matches_wildcard(pattern: &str, host: &str) -> bool {
    let Some(base) = pattern.strip_prefix("*.") else {
        return pattern.eq_ignore_ascii_case(host);
    };

    if host.eq_ignore_ascii_case(base) {
        return true;
    }

    // `host` must end in ".{base}" with a non-empty label in front
    let (host, base) = (host.as_bytes(), base.as_bytes());
    host.len() > base.len() + 1
        && host[host.len() - base.len()..].eq_ignore_ascii_case(base)
        && host[host.len() - base.len() - 1] == b'.'
}
