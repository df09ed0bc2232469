use gemini_engine::LlmClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::content::ContentFetcher;
use crate::error::ViewerError;
use crate::links::extract_links;

/// Stands in for the chat transcript on the first question.
pub const NO_HISTORY: &str = "(none)";

const EXTERNAL_CONTENT_HEADING: &str =
    "[Content of links in the article or the question] (may not have been retrieved correctly)";

/// A follow-up question about a digest.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub markdown: String,
    #[serde(default)]
    pub chat_history: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChatResponse {
    Answer { response: String },
    Error { error: String },
}

fn render_prompt(markdown: &str, additional_context: &str, chat_history: &str, message: &str) -> String {
    format!(
        "Answer the user's question about the article below in as much detail as possible, \
         checking facts with a search engine as you go.\n\
         Write the answer in Markdown.\n\
         \n\
         [Article]\n\
         \n\
         {markdown}\n\
         \n\
         {additional_context}\n\
         \n\
         [Chat history]\n\
         \n\
         '''\n\
         {chat_history}\n\
         '''\n\
         \n\
         [New question from the user]\n\
         \n\
         '''\n\
         {message}\n\
         '''\n\
         \n\
         Please answer now.\n"
    )
}

/// Fetch every link in the digest and the message, in that order, and
/// return one labelled block per page that could be read.
async fn external_context(fetcher: &ContentFetcher, digest_markdown: &str, user_message: &str) -> String {
    let mut links = extract_links(digest_markdown);
    links.extend(extract_links(user_message));

    let mut blocks = Vec::new();
    for url in &links {
        if let Some(content) = fetcher.fetch(url).await {
            blocks.push(format!("- Content from {}:\n\n'''{}'''\n\n", url, content));
        }
    }
    debug!(links = links.len(), fetched = blocks.len(), "Fetched linked content");

    if blocks.is_empty() {
        return String::new();
    }
    format!("\n\n{}\n\n{}", EXTERNAL_CONTENT_HEADING, blocks.join("\n\n"))
}

/// Assemble the augmented prompt: digest, linked page content (omitted when
/// nothing could be fetched), chat history, then the new message.
pub async fn build_prompt(
    fetcher: &ContentFetcher,
    digest_markdown: &str,
    prior_chat_text: Option<&str>,
    user_message: &str,
) -> String {
    let additional_context = external_context(fetcher, digest_markdown, user_message).await;
    let chat_history = prior_chat_text
        .filter(|history| !history.trim().is_empty())
        .unwrap_or(NO_HISTORY);

    render_prompt(digest_markdown, &additional_context, chat_history, user_message)
}

/// Answer a follow-up question with the search-grounded chat model.
#[instrument(skip_all, fields(message_len = request.message.len()))]
pub async fn answer(
    fetcher: &ContentFetcher,
    llm: &dyn LlmClient,
    request: &ChatRequest,
) -> Result<String, ViewerError> {
    if request.message.trim().is_empty() {
        return Err(ViewerError::InvalidRequest("message must not be empty".to_string()));
    }

    let prompt = build_prompt(
        fetcher,
        &request.markdown,
        request.chat_history.as_deref(),
        &request.message,
    )
    .await;

    let response = llm.chat_with_search(&prompt).await.map_err(ViewerError::Llm)?;
    info!(response_len = response.len(), "Chat answered");
    Ok(response)
}

/// Like [`answer`], but every failure becomes an error response.
pub async fn handle_chat(fetcher: &ContentFetcher, llm: &dyn LlmClient, request: &ChatRequest) -> ChatResponse {
    match answer(fetcher, llm, request).await {
        Ok(response) => ChatResponse::Answer { response },
        Err(e) => {
            error!(error = %e, "Chat request failed");
            ChatResponse::Error { error: e.to_string() }
        }
    }
}
