//! Space URL validation.

use url::Url;

use crate::error::{FetchError, Result};

const SPACE_HOSTS: &[&str] = &[
    "x.com",
    "www.x.com",
    "mobile.x.com",
    "twitter.com",
    "www.twitter.com",
    "mobile.twitter.com",
];

/// Extracts the Space id from a Space URL.
///
/// Accepts `https://x.com/i/spaces/<id>` and the twitter.com equivalents,
/// with or without a trailing path segment such as `/peek`.
pub fn space_id(raw: &str) -> Result<String> {
    let url = Url::parse(raw.trim()).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(FetchError::InvalidUrl(raw.to_string()));
    }
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    if !SPACE_HOSTS.contains(&host.as_str()) {
        return Err(FetchError::InvalidUrl(raw.to_string()));
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    match segments.as_slice() {
        ["i", "spaces", id, ..] if is_space_id(id) => Ok((*id).to_string()),
        _ => Err(FetchError::InvalidUrl(raw.to_string())),
    }
}

/// Returns true if `raw` is a valid Space URL.
pub fn is_space_url(raw: &str) -> bool {
    space_id(raw).is_ok()
}

fn is_space_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_space_urls() {
        assert_eq!(space_id("https://x.com/i/spaces/1vOxwdyYrlqKB").unwrap(), "1vOxwdyYrlqKB");
        assert_eq!(
            space_id("https://twitter.com/i/spaces/1ynJOyLyMOoKR/peek").unwrap(),
            "1ynJOyLyMOoKR"
        );
        assert!(is_space_url("https://mobile.twitter.com/i/spaces/1abc?s=20"));
    }

    #[test]
    fn test_rejects_other_urls() {
        assert!(!is_space_url("https://x.com/alice/status/123"));
        assert!(!is_space_url("https://example.com/i/spaces/1abc"));
        assert!(!is_space_url("ftp://x.com/i/spaces/1abc"));
        assert!(!is_space_url("https://x.com/i/spaces/"));
        assert!(!is_space_url("not a url"));
        assert!(matches!(space_id("x.com/i/spaces/1abc"), Err(FetchError::InvalidUrl(_))));
    }
}
