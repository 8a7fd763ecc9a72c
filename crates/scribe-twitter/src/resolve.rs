//! Finding the Space a mention refers to.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use scribe_audio::is_space_url;
use scribe_models::Mention;

use crate::client::SocialApi;

/// Hosts whose links are expanded before checking for a Space.
const SHORTENER_HOSTS: &[&str] = &["t.co"];

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"https?://[^\s<>"')]+"#).expect("Invalid regex pattern"))
}

/// URLs appearing in free text.
pub fn urls_in_text(text: &str) -> Vec<String> {
    url_pattern()
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', '!', '?']).to_string())
        .collect()
}

/// Candidate links of a post: the Space URL, URL entities, then text links.
fn candidates(mention: &Mention) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let links = mention
        .space_url
        .iter()
        .cloned()
        .chain(mention.urls.iter().cloned())
        .chain(urls_in_text(&mention.text));
    for link in links {
        if !out.contains(&link) {
            out.push(link);
        }
    }
    out
}

fn is_short_link(link: &str) -> bool {
    url::Url::parse(link)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        .map(|host| SHORTENER_HOSTS.contains(&host.as_str()))
        .unwrap_or(false)
}

/// Returns the Space URL carried by a single post, expanding short links.
pub async fn space_url_in(api: &dyn SocialApi, mention: &Mention) -> Option<String> {
    for link in candidates(mention) {
        if is_space_url(&link) {
            return Some(link);
        }
        if !is_short_link(&link) {
            continue;
        }
        match api.expand_url(&link).await {
            Ok(expanded) if is_space_url(&expanded) => {
                debug!(short = %link, expanded = %expanded, "Expanded short link to Space");
                return Some(expanded);
            }
            Ok(_) => {}
            Err(e) => warn!(url = %link, error = %e, "Failed to expand short link"),
        }
    }
    None
}

/// Returns the Space URL from a mention, falling back to its parent post.
pub async fn resolve_space_url(
    api: &dyn SocialApi,
    mention: &Mention,
    parent: Option<&Mention>,
) -> Option<String> {
    if let Some(url) = space_url_in(api, mention).await {
        return Some(url);
    }
    match parent {
        Some(parent) => space_url_in(api, parent).await,
        None => None,
    }
}
