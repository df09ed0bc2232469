use gemini_engine::BoxError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RedditApiError {
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Request to {endpoint} failed with status {status}")]
    Status { endpoint: String, status: u16 },

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} environment variable not set")]
    MissingVar { name: &'static str },

    #[error("Invalid value for {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },

    #[error("Failed to read subreddit list {path}: {source}")]
    ReadSubreddits {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse subreddit list {path}: {source}")]
    ParseSubreddits {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Error, Debug)]
pub enum ExplorerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Reddit API error: {0}")]
    Reddit(#[from] RedditApiError),

    #[error("Summarization of post {post_id} failed: {source}")]
    Summarize {
        post_id: String,
        #[source]
        source: BoxError,
    },

    #[error("Client setup failed: {0}")]
    Setup(#[source] BoxError),
}
