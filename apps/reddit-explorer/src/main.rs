use chrono::Utc;
use gemini_engine::{init_logging, GcsStore, GeminiClient};
use reddit_explorer::{Credentials, ExplorerConfig, ExplorerError, RedditClient, RedditExplorer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const HTTP_TIMEOUT_SECS: u64 = 60;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    init_logging();

    if let Err(e) = run().await {
        error!(error = %e, "Reddit explorer run failed");
        return Err(e.into());
    }
    Ok(())
}

async fn run() -> Result<(), ExplorerError> {
    let config = ExplorerConfig::from_env()?;
    let credentials = Credentials::from_env()?;

    info!(
        bucket = %credentials.bucket,
        subreddits = config.subreddits.len(),
        failure_policy = ?config.failure_policy,
        "Starting Reddit explorer"
    );

    let forum = RedditClient::new(
        credentials.reddit_client_id.clone(),
        credentials.reddit_client_secret.clone(),
        &credentials.reddit_user_agent,
    )?;

    // Shared HTTP client for Gemini (reused for connection pooling)
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        .map_err(|e| ExplorerError::Setup(e.into()))?;
    let mut llm = GeminiClient::new(http_client, credentials.gemini_api_key.clone());
    if let Some(model) = &credentials.gemini_model {
        llm = llm.with_model(model.clone());
    }

    let store = GcsStore::connect(credentials.bucket.clone())
        .await
        .map_err(ExplorerError::Setup)?;

    let explorer = RedditExplorer::new(Arc::new(forum), Arc::new(llm), Arc::new(store), config);
    let today = Utc::now().date_naive();
    let report = explorer.run(today).await?;

    info!(
        key = %report.key,
        fragments = report.fragments,
        dropped = ?report.dropped,
        skipped = report.skipped.len(),
        published = report.published,
        "Reddit explorer completed"
    );
    Ok(())
}
