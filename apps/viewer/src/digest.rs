use chrono::NaiveDate;
use gemini_engine::{digest_key, ObjectStore};
use tracing::{debug, warn};

use crate::error::ViewerError;

/// Apps whose digests the viewer shows, in display order.
pub const APP_NAMES: [&str; 5] = [
    "github_trending",
    "hacker_news",
    "paper_summarizer",
    "reddit_explorer",
    "tech_feed",
];

pub fn parse_date(value: &str) -> Result<NaiveDate, ViewerError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| ViewerError::InvalidDate(value.to_string()))
}

/// The digest `app_name` published for `date`, or `None` if there is none.
pub async fn fetch_markdown(
    store: &dyn ObjectStore,
    app_name: &str,
    date: NaiveDate,
) -> Result<Option<String>, ViewerError> {
    if !APP_NAMES.contains(&app_name) {
        return Err(ViewerError::UnknownApp(app_name.to_string()));
    }

    let key = digest_key(app_name, date);
    let Some(body) = store.get(&key).await.map_err(ViewerError::Storage)? else {
        debug!(key = %key, "Digest not found");
        return Ok(None);
    };

    String::from_utf8(body)
        .map(Some)
        .map_err(|_| ViewerError::InvalidDigest { key })
}

/// One app's entry on the daily overview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDigest {
    pub app_name: &'static str,
    /// Empty when the digest is missing or unreadable.
    pub content: String,
    pub exists: bool,
}

/// Every app's digest for `date`. Missing or unreadable digests show up
/// empty instead of failing the whole overview.
pub async fn fetch_all(store: &dyn ObjectStore, date: NaiveDate) -> Vec<AppDigest> {
    let mut digests = Vec::with_capacity(APP_NAMES.len());

    for app_name in APP_NAMES {
        let content = match fetch_markdown(store, app_name, date).await {
            Ok(content) => content,
            Err(e) => {
                warn!(app = %app_name, error = %e, "Failed to fetch digest");
                None
            }
        };
        digests.push(AppDigest {
            app_name,
            exists: content.is_some(),
            content: content.unwrap_or_default(),
        });
    }
    digests
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemini_engine::{BoxError, MemoryStore};

    struct BrokenStore;

    #[async_trait::async_trait]
    impl ObjectStore for BrokenStore {
        async fn put(&self, _: &str, _: Vec<u8>) -> Result<(), BoxError> {
            Err("read only".into())
        }

        async fn get(&self, _: &str) -> Result<Option<Vec<u8>>, BoxError> {
            Err("permission denied".into())
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_markdown_round_trip() {
        let store = MemoryStore::new();
        let digest = "\n# Title\n\n**Upvotes**: 1\n---\n\n# Other\n";
        store.put("reddit_explorer/2024-01-01.md", digest.as_bytes().to_vec()).await.unwrap();

        let fetched = fetch_markdown(&store, "reddit_explorer", date()).await.unwrap();
        assert_eq!(fetched.as_deref(), Some(digest));
    }

    #[tokio::test]
    async fn test_fetch_markdown_missing_and_unknown() {
        let store = MemoryStore::new();
        assert_eq!(fetch_markdown(&store, "hacker_news", date()).await.unwrap(), None);

        let err = fetch_markdown(&store, "weather", date()).await.unwrap_err();
        assert!(matches!(err, ViewerError::UnknownApp(app) if app == "weather"));
    }

    #[tokio::test]
    async fn test_fetch_markdown_propagates_storage_errors() {
        let err = fetch_markdown(&BrokenStore, "tech_feed", date()).await.unwrap_err();
        assert!(err.to_string().contains("permission denied"));
    }

    #[tokio::test]
    async fn test_fetch_all_marks_missing_apps() {
        let store = MemoryStore::new();
        store.put("tech_feed/2024-01-01.md", b"feed".to_vec()).await.unwrap();

        let digests = fetch_all(&store, date()).await;
        assert_eq!(digests.len(), APP_NAMES.len());
        let tech = digests.iter().find(|d| d.app_name == "tech_feed").unwrap();
        assert!(tech.exists);
        assert_eq!(tech.content, "feed");
        assert!(digests.iter().filter(|d| d.app_name != "tech_feed").all(|d| !d.exists && d.content.is_empty()));

        let broken = fetch_all(&BrokenStore, date()).await;
        assert!(broken.iter().all(|d| !d.exists));
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-01-01").unwrap(), date());
        assert!(matches!(parse_date("01/01/2024"), Err(ViewerError::InvalidDate(_))));
    }
}
