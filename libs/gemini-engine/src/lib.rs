use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

mod gemini;
pub mod storage;

pub use gemini::{
    GeminiCandidate, GeminiClient, GeminiContent, GeminiError, GeminiPart, GeminiRequest,
    GeminiResponse, GeminiTool, GoogleSearch, LlmClient, DEFAULT_MODEL,
};
pub use storage::{digest_key, GcsStore, MemoryStore, ObjectStore};

/// Error type shared by the engine's clients.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Default GCS bucket for storing digests
pub const DEFAULT_BUCKET: &str = "nook-digests";

// --- Shared Utilities ---

/// Extract the domain/host from a URL string safely.
/// Returns "unknown" if the URL cannot be parsed.
pub fn extract_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Read an environment variable, treating empty values as unset.
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

// --- Shared Logging ---

/// Initialize structured logging with JSON format in production (when RUST_LOG is set),
/// or pretty format for local development.
pub fn init_logging() {
    let is_production = std::env::var("RUST_LOG").is_ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if is_production {
        let _ = fmt()
            .with_env_filter(filter)
            .json()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    }
}
