//! Daily Reddit digest: harvest hot posts from the configured communities,
//! summarize each with Gemini and publish one markdown document per day.

pub mod classifier;
pub mod comments;
pub mod config;
pub mod digest;
pub mod error;
pub mod explorer;
pub mod reddit;
pub mod summary;

pub use classifier::{classify, ClassifiedPost, ContentType, DropReason, FilterPolicy, Verdict};
pub use comments::{top_comments, Comment, CommentOrder};
pub use config::{Credentials, ExplorerConfig, FailurePolicy};
pub use error::{ConfigError, ExplorerError, RedditApiError};
pub use explorer::{RedditExplorer, RunReport};
pub use reddit::{CommentNode, ForumSource, RedditClient, Submission};
