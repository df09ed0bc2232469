use gemini_engine::extract_domain;
use select::document::Document;
use select::node::Node;
use select::predicate::Name;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// HTTP timeout for fetching linked pages
const FETCH_TIMEOUT_SECS: u64 = 10;
/// Maximum number of characters kept from a page
pub const MAX_CONTENT_CHARS: usize = 1000;
const TRUNCATION_MARKER: &str = "...";

/// Elements whose text never counts as page content.
const STRIPPED_ELEMENTS: [&str; 5] = ["script", "style", "nav", "header", "footer"];
/// Candidate content roots, most specific first.
const CONTENT_ROOTS: [&str; 3] = ["article", "main", "body"];

/// Create a shared HTTP client with configured timeout
pub fn create_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
        .build()
}

/// Retrieves the readable text of linked pages.
#[derive(Debug, Clone)]
pub struct ContentFetcher {
    client: reqwest::Client,
}

impl ContentFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Visible text of the page at `url`, or `None` if it cannot be fetched
    /// or has no visible text. Failures are logged and never returned.
    #[instrument(skip(self, url), fields(url_domain = %extract_domain(url)))]
    pub async fn fetch(&self, url: &str) -> Option<String> {
        let html = match self.download(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(error = %e, "Failed to fetch linked page");
                return None;
            }
        };

        let text = extract_text(&html);
        match &text {
            Some(text) => debug!(chars = text.chars().count(), "Extracted linked page text"),
            None => debug!("No visible text in linked page"),
        }
        text
    }

    async fn download(&self, url: &str) -> reqwest::Result<String> {
        self.client.get(url).send().await?.error_for_status()?.text().await
    }
}

/// Text of the first article/main/body element with navigation chrome and
/// scripts removed, whitespace collapsed and length bounded.
pub fn extract_text(html: &str) -> Option<String> {
    let document = Document::from(html);

    let root = CONTENT_ROOTS.iter().find_map(|name| {
        document
            .find(Name(*name))
            .find(|node| !has_stripped_ancestor(node))
    })?;

    let mut pieces = Vec::new();
    collect_text(&root, &mut pieces);
    let text = pieces.join(" ").split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return None;
    }

    Some(truncate(&text, MAX_CONTENT_CHARS))
}

fn is_stripped(node: &Node) -> bool {
    node.name().is_some_and(|name| STRIPPED_ELEMENTS.contains(&name))
}

fn has_stripped_ancestor(node: &Node) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if is_stripped(&parent) {
            return true;
        }
        current = parent.parent();
    }
    false
}

fn collect_text<'a>(node: &Node<'a>, pieces: &mut Vec<&'a str>) {
    for child in node.children() {
        if let Some(text) = child.as_text() {
            pieces.push(text);
        } else if !is_stripped(&child) {
            collect_text(&child, pieces);
        }
    }
}

/// Keep the first `max_chars` characters, marking the cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_prefers_article_and_strips_chrome() {
        let html = r#"<html><head><title>T</title><style>body { color: red }</style></head>
            <body>
              <header>Site header</header>
              <nav><a href="/">Home</a></nav>
              <main>Main text <article>  The   article
                 <script>var x = 1;</script> body.  </article></main>
              <footer>Copyright</footer>
            </body></html>"#;

        assert_eq!(extract_text(html).as_deref(), Some("The article body."));
    }

    #[test]
    fn test_extract_falls_back_to_main_then_body() {
        let main = "<body><nav>menu</nav><main><p>Hello</p><p>world</p></main></body>";
        assert_eq!(extract_text(main).as_deref(), Some("Hello world"));

        let body = "<body><header>top</header><div>Just <b>a</b> div</div><footer>end</footer></body>";
        assert_eq!(extract_text(body).as_deref(), Some("Just a div"));
    }

    #[test]
    fn test_article_inside_stripped_element_is_ignored() {
        let html = "<body><header><article>teaser</article></header><p>real text</p></body>";
        assert_eq!(extract_text(html).as_deref(), Some("real text"));
    }

    #[test]
    fn test_page_without_text_is_absent() {
        assert_eq!(extract_text("<body><nav>only navigation</nav></body>"), None);
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("abc", 3), "abc");
        assert_eq!(truncate("abcd", 3), "abc...");
        assert_eq!(truncate("日本語テキスト", 3), "日本語...");
    }

    #[test]
    fn test_extract_bounds_length() {
        let html = format!("<body><p>{}</p></body>", "word ".repeat(400));
        let text = extract_text(&html).unwrap();
        assert_eq!(text.chars().count(), MAX_CONTENT_CHARS + TRUNCATION_MARKER.len());
        assert!(text.ends_with("..."));
    }
}
