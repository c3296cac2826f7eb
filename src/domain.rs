//! Mapping of tab URLs onto the hostnames time is accounted against.

use url::Url;

const WEB_SCHEMES: [&str; 2] = ["http", "https"];
const INTERNAL_PAGES_SCHEME: &str = "chrome";

/// Decides which URL schemes count as trackable browsing.
///
/// Web pages (`http`, `https`) are always accepted. Browser internal pages such as
/// `chrome://newtab` are only accepted when explicitly enabled, everything else (extension
/// pages, `file://`, `about:`, `data:`) is unsupported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemePolicy {
    internal_pages: bool,
}

impl SchemePolicy {
    pub fn web_only() -> Self {
        Self {
            internal_pages: false,
        }
    }

    pub fn with_internal_pages() -> Self {
        Self {
            internal_pages: true,
        }
    }

    pub fn allows(&self, scheme: &str) -> bool {
        WEB_SCHEMES.contains(&scheme) || (self.internal_pages && scheme == INTERNAL_PAGES_SCHEME)
    }

    /// Returns the hostname of `url` or `None` when the url can't be parsed, has no host, or uses
    /// a scheme outside of the allow-list.
    pub fn extract(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url.trim()).ok()?;
        if !self.allows(parsed.scheme()) {
            return None;
        }
        match parsed.host_str() {
            Some(host) if !host.is_empty() => Some(host.to_ascii_lowercase()),
            _ => None,
        }
    }
}

/// Shorthand for [SchemePolicy::web_only] extraction.
pub fn extract_domain(url: &str) -> Option<String> {
    SchemePolicy::web_only().extract(url)
}

/// True when `host` is `blocked` itself or one of its subdomains.
pub fn matches_domain(host: &str, blocked: &str) -> bool {
    if host == blocked {
        return true;
    }
    host.strip_suffix(blocked)
        .is_some_and(|prefix| prefix.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_web_urls() {
        assert_eq!(
            extract_domain("https://www.example.com/search?q=1"),
            Some("www.example.com".into())
        );
        assert_eq!(
            extract_domain("http://Example.COM:8080/path"),
            Some("example.com".into())
        );
        assert_eq!(
            extract_domain("http://127.0.0.1/"),
            Some("127.0.0.1".into())
        );
    }

    #[test]
    fn test_extract_unsupported() {
        assert_eq!(extract_domain(""), None);
        assert_eq!(extract_domain("not a url"), None);
        assert_eq!(extract_domain("http://"), None);
        assert_eq!(extract_domain("file:///home/user/index.html"), None);
        assert_eq!(extract_domain("about:blank"), None);
        assert_eq!(extract_domain("chrome-extension://abcdef/block.html"), None);
        assert_eq!(extract_domain("ftp://example.com/file"), None);
        // Prefix matching would have accepted this one.
        assert_eq!(extract_domain("httpx://example.com"), None);
    }

    #[test]
    fn test_internal_pages_policy() {
        assert_eq!(extract_domain("chrome://newtab/"), None);
        assert_eq!(
            SchemePolicy::with_internal_pages().extract("chrome://newtab/"),
            Some("newtab".into())
        );
        assert_eq!(
            SchemePolicy::with_internal_pages().extract("https://example.com"),
            Some("example.com".into())
        );
        assert_eq!(
            SchemePolicy::with_internal_pages().extract("chrome-extension://abcdef/block.html"),
            None
        );
    }

    #[test]
    fn test_matches_domain() {
        assert!(matches_domain("example.com", "example.com"));
        assert!(matches_domain("sub.example.com", "example.com"));
        assert!(matches_domain("a.b.example.com", "example.com"));
        assert!(!matches_domain("notexample.com", "example.com"));
        assert!(!matches_domain("example.com", "sub.example.com"));
        assert!(!matches_domain("example.com.evil.org", "example.com"));
    }
}
