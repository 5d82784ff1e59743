use url::Url;

/// Returns the key a URL is rate limited and policy matched under
///
/// This is the lowercase host of the URL. Ports are ignored, so
/// `example.com:8080` and `example.com` share one politeness budget.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use linkdump::url::host_key;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(host_key(&url), Some("example.com".to_string()));
/// ```
pub fn host_key(url: &Url) -> Option<String> {
    url.host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.to_lowercase())
}
