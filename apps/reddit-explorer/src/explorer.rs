use chrono::NaiveDate;
use gemini_engine::{digest_key, LlmClient, ObjectStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::classifier::{ClassifiedPost, DropReason};
use crate::comments::top_comments;
use crate::config::{ExplorerConfig, FailurePolicy};
use crate::digest::{assemble, render};
use crate::error::ExplorerError;
use crate::reddit::ForumSource;
use crate::summary;

/// Outcome of one digest run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub key: String,
    pub fragments: usize,
    /// Drop counts keyed by reason, e.g. "megathread".
    pub dropped: BTreeMap<String, usize>,
    /// Posts or communities left out after a failure under `SkipPost`.
    pub skipped: Vec<String>,
    pub published: bool,
}

/// Harvests, summarizes and publishes one day's digest.
pub struct RedditExplorer {
    forum: Arc<dyn ForumSource>,
    llm: Arc<dyn LlmClient>,
    store: Arc<dyn ObjectStore>,
    config: ExplorerConfig,
}

impl RedditExplorer {
    pub fn new(
        forum: Arc<dyn ForumSource>,
        llm: Arc<dyn LlmClient>,
        store: Arc<dyn ObjectStore>,
        config: ExplorerConfig,
    ) -> Self {
        Self { forum, llm, store, config }
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    /// Build the digest for `date` and store it, overwriting any earlier one.
    #[instrument(skip(self), fields(app = %self.config.app_name))]
    pub async fn run(&self, date: NaiveDate) -> Result<RunReport, ExplorerError> {
        let mut report = RunReport {
            key: digest_key(&self.config.app_name, date),
            ..Default::default()
        };

        let fragments = self.collect_fragments(&mut report).await?;
        report.fragments = fragments.len();
        report.published = self.publish(&report.key, &fragments).await;

        Ok(report)
    }

    /// Walk every configured community in order and render its kept posts.
    pub async fn collect_fragments(&self, report: &mut RunReport) -> Result<Vec<String>, ExplorerError> {
        let mut fragments = Vec::new();

        for subreddit in &self.config.subreddits {
            let posts = match self.retrieve_hot_posts(subreddit, report).await {
                Ok(posts) => posts,
                Err(e) => {
                    self.contain(e, format!("r/{}", subreddit), report)?;
                    continue;
                }
            };
            info!(subreddit = %subreddit, kept = posts.len(), "Retrieved hot posts");

            for post in posts {
                match self.summarize_post(&post).await {
                    Ok(summary) => fragments.push(render(&post, &summary)),
                    Err(e) => self.contain(e, format!("r/{}/{}", subreddit, post.id()), report)?,
                }
                if !self.config.post_delay.is_zero() {
                    tokio::time::sleep(self.config.post_delay).await;
                }
            }
        }

        Ok(fragments)
    }

    /// Hot submissions of a community that pass the filter, in hot order.
    async fn retrieve_hot_posts(
        &self,
        subreddit: &str,
        report: &mut RunReport,
    ) -> Result<Vec<ClassifiedPost>, ExplorerError> {
        let submissions = self
            .forum
            .hot_submissions(subreddit, self.config.top_posts_limit)
            .await?;

        let mut posts = Vec::with_capacity(submissions.len());
        for submission in submissions {
            let id = submission.id.clone();
            match ClassifiedPost::from_submission(submission, &self.config.filter) {
                Ok(post) => posts.push(post),
                Err(reason) => {
                    debug!(subreddit = %subreddit, post_id = %id, reason = %reason, "Dropped post");
                    record_drop(report, reason);
                }
            }
        }
        Ok(posts)
    }

    #[instrument(skip(self, post), fields(post_id = %post.id(), content_type = %post.content_type))]
    async fn summarize_post(&self, post: &ClassifiedPost) -> Result<String, ExplorerError> {
        let comments = top_comments(
            self.forum.as_ref(),
            post.id(),
            self.config.top_comments_limit,
            self.config.comment_order,
        )
        .await?;

        let request = summary::build(post, &comments);
        let summary = self
            .llm
            .generate(&request.system_instruction, &request.content)
            .await
            .map_err(|source| ExplorerError::Summarize {
                post_id: post.id().to_string(),
                source,
            })?;

        debug!(summary_length = summary.len(), "Summary generated");
        Ok(summary)
    }

    /// Apply the failure policy: propagate, or log and record the skip.
    fn contain(&self, e: ExplorerError, what: String, report: &mut RunReport) -> Result<(), ExplorerError> {
        match self.config.failure_policy {
            FailurePolicy::AbortRun => {
                error!(item = %what, error = %e, "Aborting run, nothing will be published");
                Err(e)
            }
            FailurePolicy::SkipPost => {
                warn!(item = %what, error = %e, "Skipping after failure");
                report.skipped.push(what);
                Ok(())
            }
        }
    }

    /// Store the assembled digest. A failed write is logged, not raised.
    async fn publish(&self, key: &str, fragments: &[String]) -> bool {
        let document = assemble(fragments);
        info!(object = %key, fragments = fragments.len(), bytes = document.len(), "Publishing digest");

        match self.store.put(key, document.into_bytes()).await {
            Ok(()) => true,
            Err(e) => {
                error!(object = %key, error = %e, "Failed to store digest");
                false
            }
        }
    }
}

fn record_drop(report: &mut RunReport, reason: DropReason) {
    *report.dropped.entry(reason.to_string()).or_default() += 1;
}
