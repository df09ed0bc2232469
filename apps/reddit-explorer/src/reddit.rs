use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::RedditApiError;

/// HTTP timeout for Reddit API calls
const FETCH_TIMEOUT_SECS: u64 = 30;

const REDDIT_API_BASE: &str = "https://oauth.reddit.com";
const REDDIT_AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const REDDIT_WEB_BASE: &str = "https://www.reddit.com";

// --- Listing envelope ---

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListing<T> {
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

// --- Submissions ---

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RedditVideo {
    pub fallback_url: Option<String>,
}

/// The `media` / `secure_media` descriptor attached to a submission.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MediaDescriptor {
    #[serde(default)]
    pub reddit_video: Option<RedditVideo>,
}

/// A submission as returned by the hot listing. Only the fields the digest
/// run reads are kept.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Submission {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "ups", default)]
    pub upvotes: i64,
    #[serde(default = "default_upvote_ratio")]
    pub upvote_ratio: f64,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub permalink: String,

    // Raw type hints
    #[serde(default)]
    pub post_hint: Option<String>,
    #[serde(default)]
    pub is_gallery: Option<bool>,
    #[serde(default)]
    pub is_video: bool,
    #[serde(default)]
    pub poll_data: Option<serde_json::Value>,
    #[serde(default)]
    pub crosspost_parent: Option<String>,
    #[serde(default)]
    pub is_self: bool,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub media: Option<MediaDescriptor>,
    #[serde(default)]
    pub secure_media: Option<MediaDescriptor>,
}

fn default_upvote_ratio() -> f64 {
    1.0
}

impl Submission {
    pub fn has_poll(&self) -> bool {
        self.poll_data.is_some()
    }

    pub fn is_crosspost(&self) -> bool {
        self.crosspost_parent.is_some()
    }

    /// Absolute link to the discussion page.
    pub fn full_permalink(&self) -> String {
        format!("{}{}", REDDIT_WEB_BASE, self.permalink)
    }
}

// --- Comments ---

/// Deleted and removed comments can carry `null` where a value is expected.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Deserialize)]
struct RawComment {
    #[serde(default, deserialize_with = "null_as_default")]
    body: String,
    #[serde(default, deserialize_with = "null_as_default")]
    ups: i64,
    #[serde(default)]
    replies: Replies,
}

/// `replies` is an empty string for leaf comments and a listing otherwise.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Replies {
    Listing(RedditListing<CommentThing>),
    Other(serde_json::Value),
}

impl Default for Replies {
    fn default() -> Self {
        Replies::Other(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", content = "data")]
enum CommentThing {
    #[serde(rename = "t1")]
    Comment(RawComment),
    /// "load more" placeholder
    #[serde(rename = "more")]
    More(serde::de::IgnoredAny),
}

/// A node of a submission's comment tree with "load more" placeholders removed.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentNode {
    pub body: String,
    pub upvotes: i64,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    pub fn leaf(body: impl Into<String>, upvotes: i64) -> Self {
        Self {
            body: body.into(),
            upvotes,
            replies: Vec::new(),
        }
    }
}

fn into_nodes(things: Vec<CommentThing>) -> Vec<CommentNode> {
    things
        .into_iter()
        .filter_map(|thing| match thing {
            CommentThing::Comment(raw) => Some(CommentNode {
                body: raw.body,
                upvotes: raw.ups,
                replies: match raw.replies {
                    Replies::Listing(listing) => into_nodes(listing.data.children),
                    Replies::Other(serde_json::Value::Null) => Vec::new(),
                    Replies::Other(serde_json::Value::String(s)) if s.is_empty() => Vec::new(),
                    Replies::Other(value) => {
                        debug!(replies = %value, "Dropping unreadable reply listing");
                        Vec::new()
                    }
                },
            }),
            CommentThing::More(_) => None,
        })
        .collect()
}

/// Parse the body of `GET /comments/{id}`: a two element array whose second
/// listing holds the top-level comments.
pub fn parse_comment_tree(body: &[u8]) -> Result<Vec<CommentNode>, RedditApiError> {
    let (_post, comments): (serde::de::IgnoredAny, RedditListing<CommentThing>) =
        serde_json::from_slice(body).map_err(|e| RedditApiError::InvalidResponse {
            details: format!("Failed to parse comment tree: {}", e),
        })?;
    Ok(into_nodes(comments.data.children))
}

/// Parse the body of `GET /r/{sub}/hot`.
pub fn parse_hot_listing(body: &[u8]) -> Result<Vec<Submission>, RedditApiError> {
    let listing: RedditListing<RedditListingChild<Submission>> = serde_json::from_slice(body)
        .map_err(|e| RedditApiError::InvalidResponse {
            details: format!("Failed to parse hot listing: {}", e),
        })?;

    Ok(listing
        .data
        .children
        .into_iter()
        .filter(|child| child.kind == "t3")
        .map(|child| child.data)
        .collect())
}

// --- Forum capability ---

/// Read access to the forum, as needed by the digest run.
#[async_trait]
pub trait ForumSource: Send + Sync {
    /// Up to `limit` submissions of `subreddit` in "hot" order.
    async fn hot_submissions(&self, subreddit: &str, limit: u32) -> Result<Vec<Submission>, RedditApiError>;

    /// The full comment tree of a submission, "load more" nodes suppressed.
    async fn comment_tree(&self, post_id: &str) -> Result<Vec<CommentNode>, RedditApiError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

/// Reddit OAuth client using the application-only (client credentials) grant.
pub struct RedditClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    api_base: String,
    auth_url: String,
    token: tokio::sync::OnceCell<String>,
}

impl RedditClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        user_agent: &str,
    ) -> Result<Self, RedditApiError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            api_base: REDDIT_API_BASE.to_string(),
            auth_url: REDDIT_AUTH_URL.to_string(),
            token: tokio::sync::OnceCell::new(),
        })
    }

    /// Point the client at another host (used by tests).
    pub fn with_endpoints(mut self, api_base: impl Into<String>, auth_url: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self.auth_url = auth_url.into();
        self
    }

    async fn access_token(&self) -> Result<&str, RedditApiError> {
        self.token
            .get_or_try_init(|| self.request_token())
            .await
            .map(String::as_str)
    }

    #[instrument(skip(self))]
    async fn request_token(&self) -> Result<String, RedditApiError> {
        debug!("Requesting Reddit application token");
        let res = self
            .http
            .post(&self.auth_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(RedditApiError::AuthenticationFailed {
                reason: format!("token endpoint returned {}", status),
            });
        }

        let token: TokenResponse = res.json().await?;
        match (token.access_token, token.error) {
            (Some(access_token), _) => {
                info!("Obtained Reddit application token");
                Ok(access_token)
            }
            (None, error) => Err(RedditApiError::AuthenticationFailed {
                reason: error.unwrap_or_else(|| "no access_token in response".to_string()),
            }),
        }
    }

    async fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Vec<u8>, RedditApiError> {
        let token = self.access_token().await?;

        let mut url = Url::parse(&format!("{}{}", self.api_base, endpoint))?;
        url.query_pairs_mut().extend_pairs(params).append_pair("raw_json", "1");

        let res = self.http.get(url).bearer_auth(token).send().await?;
        let status = res.status();

        if status.as_u16() == 429 {
            let retry_after = res
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            warn!(endpoint = %endpoint, retry_after, "Rate limited by Reddit");
            return Err(RedditApiError::RateLimitExceeded { retry_after });
        }
        if !status.is_success() {
            return Err(RedditApiError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(res.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ForumSource for RedditClient {
    #[instrument(skip(self))]
    async fn hot_submissions(&self, subreddit: &str, limit: u32) -> Result<Vec<Submission>, RedditApiError> {
        let limit = limit.to_string();
        let body = self
            .get(&format!("/r/{}/hot", subreddit), &[("limit", limit.as_str())])
            .await?;
        let submissions = parse_hot_listing(&body)?;
        debug!(subreddit = %subreddit, count = submissions.len(), "Fetched hot submissions");
        Ok(submissions)
    }

    #[instrument(skip(self))]
    async fn comment_tree(&self, post_id: &str) -> Result<Vec<CommentNode>, RedditApiError> {
        let body = self.get(&format!("/comments/{}", post_id), &[]).await?;
        parse_comment_tree(&body)
    }
}
