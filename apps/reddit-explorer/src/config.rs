use gemini_engine::{env_var, DEFAULT_BUCKET};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::classifier::FilterPolicy;
use crate::comments::CommentOrder;
use crate::error::ConfigError;

// --- Configuration Constants ---
pub const DEFAULT_APP_NAME: &str = "reddit_explorer";
const DEFAULT_TOP_POSTS_LIMIT: u32 = 10;
const DEFAULT_TOP_COMMENTS_LIMIT: usize = 3;
const DEFAULT_POST_DELAY_SECS: u64 = 5;
const DEFAULT_USER_AGENT: &str = "reddit-explorer/0.1";
/// Used when `SUBREDDITS_PATH` is not set.
const BUNDLED_SUBREDDITS: &str = include_str!("../subreddits.toml");

/// What a failed comment fetch or summarization does to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop the run; nothing is published.
    #[default]
    AbortRun,
    /// Log the failure, leave the post out and carry on.
    SkipPost,
}

impl FromStr for FailurePolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::AbortRun),
            "skip" => Ok(FailurePolicy::SkipPost),
            _ => Err(()),
        }
    }
}

impl FromStr for CommentOrder {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api" => Ok(CommentOrder::Api),
            "upvotes" => Ok(CommentOrder::Upvotes),
            _ => Err(()),
        }
    }
}

/// Settings of one digest run. Loaded once at start and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplorerConfig {
    pub app_name: String,
    pub subreddits: Vec<String>,
    pub top_posts_limit: u32,
    pub top_comments_limit: usize,
    pub filter: FilterPolicy,
    pub post_delay: Duration,
    pub comment_order: CommentOrder,
    pub failure_policy: FailurePolicy,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            subreddits: Vec::new(),
            top_posts_limit: DEFAULT_TOP_POSTS_LIMIT,
            top_comments_limit: DEFAULT_TOP_COMMENTS_LIMIT,
            filter: FilterPolicy::default(),
            post_delay: Duration::from_secs(DEFAULT_POST_DELAY_SECS),
            comment_order: CommentOrder::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl ExplorerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let subreddits = match env_var("SUBREDDITS_PATH") {
            Some(path) => load_subreddits(Path::new(&path))?,
            None => parse_subreddits(BUNDLED_SUBREDDITS, "subreddits.toml (bundled)")?,
        };

        Ok(Self {
            app_name: env_var("APP_NAME").unwrap_or(defaults.app_name),
            subreddits,
            top_posts_limit: parse_var("REDDIT_TOP_POSTS_LIMIT", defaults.top_posts_limit)?,
            top_comments_limit: parse_var("REDDIT_TOP_COMMENTS_LIMIT", defaults.top_comments_limit)?,
            filter: FilterPolicy {
                min_upvote_ratio: parse_var("REDDIT_MIN_UPVOTE_RATIO", defaults.filter.min_upvote_ratio)?,
                ..defaults.filter
            },
            post_delay: Duration::from_secs(parse_var("REDDIT_POST_DELAY_SECS", DEFAULT_POST_DELAY_SECS)?),
            comment_order: parse_var("REDDIT_COMMENT_ORDER", defaults.comment_order)?,
            failure_policy: parse_var("REDDIT_FAILURE_POLICY", defaults.failure_policy)?,
        })
    }
}

/// Secrets and endpoints for the external services.
#[derive(Clone)]
pub struct Credentials {
    pub reddit_client_id: String,
    pub reddit_client_secret: String,
    pub reddit_user_agent: String,
    pub gemini_api_key: String,
    pub gemini_model: Option<String>,
    pub bucket: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            reddit_client_id: require_var("REDDIT_CLIENT_ID")?,
            reddit_client_secret: require_var("REDDIT_CLIENT_SECRET")?,
            reddit_user_agent: env_var("REDDIT_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            gemini_api_key: require_var("GEMINI_API_KEY")?,
            gemini_model: env_var("GEMINI_MODEL"),
            bucket: env_var("GCS_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
        })
    }
}

#[derive(Deserialize)]
struct SubredditsFile {
    #[serde(default)]
    subreddits: Vec<SubredditEntry>,
}

#[derive(Deserialize)]
struct SubredditEntry {
    name: String,
}

/// Parse a `[[subreddits]] name = "..."` list, keeping file order.
pub fn parse_subreddits(toml_text: &str, path: &str) -> Result<Vec<String>, ConfigError> {
    let file: SubredditsFile = toml::from_str(toml_text).map_err(|source| ConfigError::ParseSubreddits {
        path: path.to_string(),
        source,
    })?;
    Ok(file.subreddits.into_iter().map(|s| s.name).collect())
}

pub fn load_subreddits(path: &Path) -> Result<Vec<String>, ConfigError> {
    let path_str = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadSubreddits {
        path: path_str.clone(),
        source,
    })?;
    let subreddits = parse_subreddits(&text, &path_str)?;
    debug!(path = %path_str, count = subreddits.len(), "Loaded subreddit list");
    Ok(subreddits)
}

fn require_var(name: &'static str) -> Result<String, ConfigError> {
    env_var(name).ok_or(ConfigError::MissingVar { name })
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env_var(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
    }
}
