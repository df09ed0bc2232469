use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

use crate::BoxError;

const MAX_RETRY_ELAPSED_SECS: u64 = 120;
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Model used when `GEMINI_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Text generation capability consumed by the digest run and the viewer chat.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a completion for `content` under the given system instruction.
    async fn generate(&self, system_instruction: &str, content: &str) -> Result<String, BoxError>;

    /// Answer a chat message with web search grounding enabled.
    async fn chat_with_search(&self, message: &str) -> Result<String, BoxError>;
}

// --- Gemini Structs ---
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GeminiPart {
    #[serde(default)]
    pub text: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn text(role: Option<&str>, text: &str) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![GeminiPart { text: text.to_string() }],
        }
    }
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct GoogleSearch {}

#[derive(Serialize, Debug, Clone)]
pub struct GeminiTool {
    pub google_search: GoogleSearch,
}

#[derive(Serialize, Debug, Clone)]
pub struct GeminiRequest {
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<GeminiTool>,
}

#[derive(Deserialize, Debug)]
pub struct GeminiCandidate {
    pub content: GeminiContent,
}

#[derive(Deserialize, Debug)]
pub struct GeminiResponse {
    pub candidates: Option<Vec<GeminiCandidate>>,
    pub error: Option<GeminiError>,
}

#[derive(Deserialize, Debug)]
pub struct GeminiError {
    pub message: String,
}

impl GeminiResponse {
    /// Concatenated text of the first candidate. Search-grounded answers
    /// arrive split over several parts.
    fn into_text(self) -> Result<String, BoxError> {
        if let Some(error) = self.error {
            return Err(format!("Gemini API Error: {}", error.message).into());
        }

        let text = self
            .candidates
            .and_then(|candidates| candidates.into_iter().next())
            .map(|first| {
                first
                    .content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err("No content returned from Gemini".into());
        }
        Ok(text)
    }
}

/// Gemini REST client with exponential backoff on transient failures.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_retry_elapsed: Duration,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retry_elapsed: Duration::from_secs(MAX_RETRY_ELAPSED_SECS),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_retry_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_retry_elapsed = max_elapsed;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Call Gemini API with exponential backoff retry for transient failures
    #[instrument(skip(self, request), fields(model = %self.model, search = !request.tools.is_empty()))]
    async fn call_with_retry(&self, request: GeminiRequest) -> Result<String, BoxError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_retry_elapsed),
            ..Default::default()
        };

        retry(backoff, || {
            let request = request.clone();

            async move {
                match self.call(&request).await {
                    Ok(response) => Ok(response),
                    Err(e) => {
                        // Retry on transient errors (network, rate limits, server errors)
                        if is_transient(&e) {
                            warn!(error = %e, "Transient Gemini error, retrying");
                            Err(backoff::Error::transient(e))
                        } else {
                            error!(error = %e, "Permanent Gemini error, not retrying");
                            Err(backoff::Error::permanent(e))
                        }
                    }
                }
            }
        })
        .await
    }

    async fn call(&self, request: &GeminiRequest) -> Result<String, BoxError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);

        debug!("Sending request to Gemini API");

        let res = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = res.status();
        debug!(status = %status, "Gemini API response received");

        if !status.is_success() {
            let error_body = res.text().await.unwrap_or_default();
            return Err(format!("Gemini API returned {}: {}", status, error_body).into());
        }

        let resp: GeminiResponse = res.json().await.map_err(reqwest::Error::without_url)?;
        resp.into_text()
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, system_instruction: &str, content: &str) -> Result<String, BoxError> {
        let request = GeminiRequest {
            system_instruction: Some(GeminiContent::text(None, system_instruction)),
            contents: vec![GeminiContent::text(Some("user"), content)],
            tools: Vec::new(),
        };
        self.call_with_retry(request).await
    }

    async fn chat_with_search(&self, message: &str) -> Result<String, BoxError> {
        let request = GeminiRequest {
            system_instruction: None,
            contents: vec![GeminiContent::text(Some("user"), message)],
            tools: vec![GeminiTool { google_search: GoogleSearch::default() }],
        };
        self.call_with_retry(request).await
    }
}

/// Connect failures and timeouts are transient whatever their message says.
fn is_transient(err: &BoxError) -> bool {
    if let Some(e) = err.downcast_ref::<reqwest::Error>() {
        if e.is_timeout() || e.is_connect() || e.is_request() {
            return true;
        }
    }
    is_transient_error(&err.to_string())
}

fn is_transient_error(err: &str) -> bool {
    let transient_patterns = [
        "timeout",
        "connection",
        "rate limit",
        "429",
        "500",
        "502",
        "503",
        "504",
        "temporarily",
        "overloaded",
    ];

    let err_lower = err.to_lowercase();
    transient_patterns.iter().any(|p| err_lower.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> GeminiClient {
        GeminiClient::new(reqwest::Client::new(), "test-key")
            .with_base_url(server.uri())
            .with_max_retry_elapsed(Duration::from_millis(200))
    }

    fn text_response(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] }
            }]
        })
    }

    #[test]
    fn test_is_transient_error_timeout() {
        assert!(is_transient_error("Connection timeout occurred"));
        assert!(is_transient_error("Request TIMEOUT"));
    }

    #[test]
    fn test_is_transient_error_rate_limit() {
        assert!(is_transient_error("Rate limit exceeded"));
        assert!(is_transient_error("HTTP 429 Too Many Requests"));
    }

    #[test]
    fn test_is_transient_error_server_errors() {
        assert!(is_transient_error("HTTP 500 Internal Server Error"));
        assert!(is_transient_error("502 Bad Gateway"));
        assert!(is_transient_error("503 Service Unavailable"));
        assert!(is_transient_error("504 Gateway Timeout"));
    }

    #[test]
    fn test_is_not_transient_error() {
        assert!(!is_transient_error("Invalid API key"));
        assert!(!is_transient_error("HTTP 400 Bad Request"));
        assert!(!is_transient_error("HTTP 401 Unauthorized"));
        assert!(!is_transient_error("HTTP 403 Forbidden"));
    }

    #[test]
    fn test_generate_request_serialization() {
        let request = GeminiRequest {
            system_instruction: Some(GeminiContent::text(None, "Be brief.")),
            contents: vec![GeminiContent::text(Some("user"), "Hello, Gemini!")],
            tools: Vec::new(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "Be brief.");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Hello, Gemini!");
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn test_search_request_serialization() {
        let request = GeminiRequest {
            system_instruction: None,
            contents: vec![GeminiContent::text(Some("user"), "What happened?")],
            tools: vec![GeminiTool { google_search: GoogleSearch::default() }],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("systemInstruction").is_none());
        assert_eq!(json["tools"][0]["google_search"], serde_json::json!({}));
    }

    #[test]
    fn test_response_joins_parts() {
        let json = r#"{
            "candidates": [{
                "content": { "parts": [{"text": "Hello "}, {"text": "from Gemini!"}] }
            }]
        }"#;

        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.into_text().unwrap(), "Hello from Gemini!");
    }

    #[test]
    fn test_response_error_and_empty() {
        let response: GeminiResponse =
            serde_json::from_str(r#"{"error": {"message": "API key invalid"}}"#).unwrap();
        let err = response.into_text().unwrap_err();
        assert!(err.to_string().contains("API key invalid"));

        let response: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert!(response.into_text().is_err());
    }

    #[tokio::test]
    async fn test_generate_sends_system_instruction() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "systemInstruction": { "parts": [{ "text": "system" }] }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response("summary")))
            .expect(1)
            .mount(&server)
            .await;

        let result = test_client(&server).generate("system", "content").await;
        assert_eq!(result.unwrap(), "summary");
    }

    #[tokio::test]
    async fn test_chat_with_search_enables_google_search() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-pro:generateContent"))
            .and(body_partial_json(serde_json::json!({ "tools": [{ "google_search": {} }] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response("answer")))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server).with_model("gemini-pro");
        assert_eq!(client.chat_with_search("question").await.unwrap(), "answer");
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .expect(1)
            .mount(&server)
            .await;

        let err = test_client(&server).generate("s", "c").await.unwrap_err();
        assert!(err.to_string().contains("400"));
    }

    #[tokio::test]
    async fn test_transport_errors_do_not_expose_api_key() {
        let client = GeminiClient::new(reqwest::Client::new(), "SECRET-KEY-123")
            .with_base_url("http://127.0.0.1:9")
            .with_max_retry_elapsed(Duration::from_millis(50));

        let err = client.generate("s", "c").await.unwrap_err();
        assert!(!err.to_string().contains("SECRET-KEY-123"));
        assert!(!format!("{:?}", err).contains("SECRET-KEY-123"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_retried() {
        let client = GeminiClient::new(reqwest::Client::new(), "test-key")
            .with_base_url("http://127.0.0.1:9")
            .with_max_retry_elapsed(Duration::from_secs(1));

        let err: BoxError = reqwest::Client::new()
            .get("http://127.0.0.1:9/")
            .send()
            .await
            .unwrap_err()
            .into();
        assert!(is_transient(&err));

        // The first backoff interval is at least 250ms, so a retried call
        // cannot fail faster than that.
        let started = Instant::now();
        assert!(client.generate("s", "c").await.is_err());
        assert!(started.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_timeout_is_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(text_response("late"))
                    .set_delay(Duration::from_secs(3)),
            )
            .expect(2..)
            .mount(&server)
            .await;

        let http = reqwest::Client::builder().timeout(Duration::from_millis(100)).build().unwrap();
        let client = GeminiClient::new(http, "test-key")
            .with_base_url(server.uri())
            .with_max_retry_elapsed(Duration::from_secs(1));

        assert!(client.generate("s", "c").await.is_err());
    }
}
