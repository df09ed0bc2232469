//! Reading published digests and answering follow-up questions about them
//! with context pulled from the pages they link to.

pub mod chat;
pub mod content;
pub mod digest;
pub mod error;
pub mod links;

pub use chat::{answer, build_prompt, handle_chat, ChatRequest, ChatResponse, NO_HISTORY};
pub use content::{create_http_client, ContentFetcher};
pub use digest::{fetch_all, fetch_markdown, parse_date, AppDigest, APP_NAMES};
pub use error::ViewerError;
pub use links::extract_links;
