//! X API v2 client.
//!
//! Reads use the app-only bearer token; replies are signed with OAuth 1.0a
//! on behalf of the bot account.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use scribe_audio::is_space_url;
use scribe_core::XCredentials;
use scribe_models::{Mention, PostId};

use crate::error::{Result, SocialError};
use crate::oauth::OAuthSigner;

/// X API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.twitter.com";

/// Pages fetched per search before giving up on the rest.
const MAX_SEARCH_PAGES: usize = 5;

const TWEET_FIELDS: &str = "created_at,author_id,referenced_tweets,entities";

/// Mentions collected from a paged search.
#[derive(Debug)]
struct Paged {
    mentions: Vec<Mention>,
    /// The page limit was reached while more pages remained.
    truncated: bool,
}

/// Follows `next_token` through at most `max_pages` pages.
async fn fetch_pages<F, Fut>(max_pages: usize, mut fetch_page: F) -> Result<Paged>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<(Vec<Mention>, Option<String>)>>,
{
    let mut mentions = Vec::new();
    let mut next_token = None;

    for _ in 0..max_pages {
        let (page, token) = fetch_page(next_token.take()).await?;
        mentions.extend(page);
        next_token = token;
        if next_token.is_none() {
            break;
        }
    }

    Ok(Paged {
        mentions,
        truncated: next_token.is_some(),
    })
}

/// Where a mention search starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Since {
    /// Only posts newer than this id.
    Id(PostId),
    /// Only posts created after this time.
    Time(DateTime<Utc>),
}

/// The operations Scribe needs from the social platform.
#[async_trait]
pub trait SocialApi: Send + Sync {
    /// Searches recent posts matching `query`.
    async fn search_mentions(&self, query: &str, since: &Since) -> Result<Vec<Mention>>;

    /// Fetches a single post.
    async fn lookup_mention(&self, id: &PostId) -> Result<Mention>;

    /// Posts `text` as a reply and returns the new post's id.
    async fn post_reply(&self, text: &str, in_reply_to: &PostId) -> Result<PostId>;

    /// Follows a short link to its destination.
    async fn expand_url(&self, url: &str) -> Result<String> {
        Ok(url.to_string())
    }
}

/// [`SocialApi`] over the X API v2.
pub struct XClient {
    http: reqwest::Client,
    resolver: reqwest::Client,
    bearer_token: String,
    signer: OAuthSigner,
    base_url: String,
}

impl XClient {
    /// Creates a client.
    pub fn new(credentials: &XCredentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let resolver = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            http,
            resolver,
            bearer_token: credentials.bearer_token.clone(),
            signer: OAuthSigner::new(credentials),
            base_url: DEFAULT_API_BASE.to_string(),
        })
    }

    /// Points the client at a different API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<TweetsResponse> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.bearer_token)
            .query(query)
            .send()
            .await?;
        let response = check_status(response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| SocialError::Parse(e.to_string()))
    }
}

#[async_trait]
impl SocialApi for XClient {
    async fn search_mentions(&self, query: &str, since: &Since) -> Result<Vec<Mention>> {
        let url = format!("{}/2/tweets/search/recent", self.base_url);
        let url = url.as_str();

        let paged = fetch_pages(MAX_SEARCH_PAGES, move |next_token| {
            let mut params = vec![
                ("query", query.to_string()),
                ("max_results", "100".to_string()),
                ("tweet.fields", TWEET_FIELDS.to_string()),
                ("expansions", "author_id".to_string()),
                ("user.fields", "username".to_string()),
            ];
            match since {
                Since::Id(id) => params.push(("since_id", id.to_string())),
                Since::Time(t) => params.push((
                    "start_time",
                    t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                )),
            }
            if let Some(token) = next_token {
                params.push(("next_token", token));
            }

            async move {
                let page = self.get_json(url, &params).await?;
                let next_token = page.meta.as_ref().and_then(|m| m.next_token.clone());
                Ok((page.mentions()?, next_token))
            }
        })
        .await?;

        if paged.truncated {
            warn!(
                pages = MAX_SEARCH_PAGES,
                fetched = paged.mentions.len(),
                "More mentions than the search page limit; older ones were skipped"
            );
        }
        debug!(count = paged.mentions.len(), "Fetched mentions");
        Ok(paged.mentions)
    }

    async fn lookup_mention(&self, id: &PostId) -> Result<Mention> {
        let url = format!("{}/2/tweets/{}", self.base_url, id);
        let params = [
            ("tweet.fields", TWEET_FIELDS.to_string()),
            ("expansions", "author_id".to_string()),
            ("user.fields", "username".to_string()),
        ];

        let response = self.get_json(&url, &params).await?;
        response
            .mentions()?
            .into_iter()
            .next()
            .ok_or_else(|| SocialError::NotFound(format!("post {}", id)))
    }

    async fn post_reply(&self, text: &str, in_reply_to: &PostId) -> Result<PostId> {
        let url = format!("{}/2/tweets", self.base_url);
        let body = json!({
            "text": text,
            "reply": {"in_reply_to_tweet_id": in_reply_to.as_str()}
        });

        let response = self
            .http
            .post(&url)
            .header("Authorization", self.signer.authorization("POST", &url, &[]))
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;

        let created: CreatedResponse = response.json().await?;
        let id = created
            .data
            .map(|d| d.id)
            .ok_or_else(|| SocialError::Parse("reply response has no data".to_string()))?;

        debug!(id = %id, in_reply_to = %in_reply_to, "Posted reply");
        Ok(PostId::from(id))
    }

    async fn expand_url(&self, url: &str) -> Result<String> {
        let response = self.resolver.head(url).send().await?;
        Ok(response.url().to_string())
    }
}

/// Maps error statuses to [`SocialError`].
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        if remaining(response.headers()) == Some(0) {
            warn!(reset_at = ?rate_limit_reset(response.headers()), "Rate limit window exhausted");
        }
        return Ok(response);
    }

    let reset_at = rate_limit_reset(response.headers());
    let message = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => SocialError::RateLimited { reset_at },
        StatusCode::UNAUTHORIZED => SocialError::Unauthorized(message),
        StatusCode::FORBIDDEN => SocialError::Forbidden(message),
        StatusCode::NOT_FOUND => SocialError::NotFound(message),
        _ => SocialError::Api {
            status: status.as_u16(),
            message,
        },
    })
}

/// Reads the `x-rate-limit-reset` header (epoch seconds).
pub fn rate_limit_reset(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    let secs: i64 = headers
        .get("x-rate-limit-reset")?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

fn remaining(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("x-rate-limit-remaining")?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    data: Option<CreatedTweet>,
}

#[derive(Debug, Deserialize)]
struct CreatedTweet {
    id: String,
}

/// Body of search and lookup responses.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TweetsResponse {
    #[serde(default)]
    data: Option<TweetData>,
    #[serde(default)]
    includes: Option<Includes>,
    #[serde(default)]
    meta: Option<Meta>,
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TweetData {
    Many(Vec<Tweet>),
    One(Tweet),
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    text: String,
    #[serde(default)]
    author_id: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    referenced_tweets: Vec<ReferencedTweet>,
    #[serde(default)]
    entities: Option<Entities>,
}

#[derive(Debug, Deserialize)]
struct ReferencedTweet {
    #[serde(rename = "type")]
    kind: String,
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct Entities {
    #[serde(default)]
    urls: Vec<UrlEntity>,
}

#[derive(Debug, Deserialize)]
struct UrlEntity {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    expanded_url: Option<String>,
    #[serde(default)]
    unwound_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct Meta {
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

impl TweetsResponse {
    /// Converts the payload into mentions.
    ///
    /// A response carrying only errors (for example a deleted post) is
    /// reported as [`SocialError::NotFound`].
    pub(crate) fn mentions(self) -> Result<Vec<Mention>> {
        let users = self.includes.map(|i| i.users).unwrap_or_default();
        let tweets = match self.data {
            Some(TweetData::Many(tweets)) => tweets,
            Some(TweetData::One(tweet)) => vec![tweet],
            None => {
                if let Some(err) = self.errors.first() {
                    let detail = err
                        .detail
                        .clone()
                        .or_else(|| err.title.clone())
                        .unwrap_or_default();
                    return Err(SocialError::NotFound(detail));
                }
                Vec::new()
            }
        };

        Ok(tweets
            .into_iter()
            .map(|tweet| {
                let author = tweet
                    .author_id
                    .as_ref()
                    .and_then(|id| users.iter().find(|u| &u.id == id))
                    .map(|u| u.username.clone())
                    .or_else(|| tweet.author_id.clone())
                    .unwrap_or_default();
                tweet.into_mention(author)
            })
            .collect())
    }
}

impl Tweet {
    fn into_mention(self, author: String) -> Mention {
        let created_at = self.created_at.unwrap_or_else(Utc::now);
        let mut mention = Mention::new(self.id, author, self.text, created_at);

        if let Some(parent) = self
            .referenced_tweets
            .iter()
            .find(|r| r.kind == "replied_to")
        {
            mention = mention.with_parent(parent.id.as_str());
        }

        for entity in self.entities.map(|e| e.urls).unwrap_or_default() {
            let Some(url) = entity.unwound_url.or(entity.expanded_url).or(entity.url) else {
                continue;
            };
            if mention.space_url.is_none() && is_space_url(&url) {
                mention = mention.with_space_url(url.clone());
            }
            mention = mention.with_url(url);
        }

        mention
    }
}
