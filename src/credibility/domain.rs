// src/credibility/domain.rs
//! Registrable-domain extraction for article links.
//!
//! Used in the per-row aggregation loop, so it never fails: bad input maps to
//! one of the sentinels below instead of an error.

use url::Url;

/// Returned for missing or empty input.
pub const UNKNOWN_DOMAIN: &str = "unknown";
/// Returned when the input cannot be parsed as a URL, even after prefixing a scheme.
pub const INVALID_URL: &str = "invalid-url";

/// Two-label public suffixes that keep one extra label in the registrable domain.
const MULTI_PART_SUFFIXES: [&str; 4] = ["co.uk", "co.in", "com.au", "co.nz"];

/// Reduce a link to its registrable domain.
///
/// - `www.example.com` → `example.com`
/// - `news.example.co.uk` → `example.co.uk`
/// - single-label hosts (`localhost`) are returned unchanged
pub fn extract_registrable_domain(url: Option<&str>) -> String {
    let raw = match url.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => return UNKNOWN_DOMAIN.to_string(),
    };

    let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };

    let host = match Url::parse(&with_scheme) {
        Ok(u) => match u.host_str() {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => return INVALID_URL.to_string(),
        },
        Err(_) => return INVALID_URL.to_string(),
    };

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return host;
    }

    let n = labels.len();
    let suffix = format!("{}.{}", labels[n - 2], labels[n - 1]);
    if n >= 3 && MULTI_PART_SUFFIXES.contains(&suffix.as_str()) {
        return format!("{}.{}", labels[n - 3], suffix);
    }
    suffix
}

/// True for the `unknown` / `invalid-url` markers.
pub fn is_sentinel(domain: &str) -> bool {
    domain == UNKNOWN_DOMAIN || domain == INVALID_URL
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> String {
        extract_registrable_domain(Some(s))
    }

    #[test]
    fn strips_subdomains() {
        assert_eq!(d("https://www.example.com/path"), "example.com");
        assert_eq!(d("http://a.b.c.example.org/x?y=1"), "example.org");
    }

    #[test]
    fn keeps_multi_part_suffix() {
        assert_eq!(d("https://news.bbc.co.uk"), "bbc.co.uk");
        assert_eq!(d("https://www.smh.com.au/world"), "smh.com.au");
        assert_eq!(d("timesofindia.co.in"), "timesofindia.co.in");
    }

    #[test]
    fn missing_scheme_matches_prefixed_form() {
        assert_eq!(d("example.com/page"), d("https://example.com/page"));
        assert_eq!(d("www.example.com"), "example.com");
    }

    #[test]
    fn single_label_host_is_returned_unchanged() {
        assert_eq!(d("http://localhost:8080/a"), "localhost");
    }

    #[test]
    fn sentinels() {
        assert_eq!(extract_registrable_domain(None), UNKNOWN_DOMAIN);
        assert_eq!(d(""), UNKNOWN_DOMAIN);
        assert_eq!(d("   "), UNKNOWN_DOMAIN);
        assert_eq!(d("http://"), INVALID_URL);
        assert_eq!(d("not a url at all"), INVALID_URL);
        assert!(is_sentinel(&d("")));
        assert!(!is_sentinel(&d("example.com")));
    }

    #[test]
    fn host_case_is_normalised() {
        assert_eq!(d("https://WWW.Example.COM"), "example.com");
    }
}
