use regex::Regex;
use std::sync::LazyLock;

/// Link labels the digest uses for embedded media. These links point at
/// the media itself, not at anything worth reading.
const MEDIA_PLACEHOLDERS: [&str; 2] = ["Image", "Video"];

static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid markdown link pattern"));

static BARE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s)]+").expect("valid bare url pattern"));

/// Every link in `text`: markdown links first, then bare URLs, each in the
/// order found. Duplicates are kept.
pub fn extract_links(text: &str) -> Vec<String> {
    let mut links = markdown_links(text);
    links.extend(bare_urls(text));
    links
}

fn markdown_links(text: &str) -> Vec<String> {
    MARKDOWN_LINK
        .captures_iter(text)
        .filter(|caps| !MEDIA_PLACEHOLDERS.contains(&&caps[1]))
        .map(|caps| caps[2].to_string())
        .collect()
}

/// URLs not directly preceded by `(` or `[`, i.e. not the target or label
/// of a markdown link.
fn bare_urls(text: &str) -> Vec<String> {
    let mut urls = Vec::new();
    let mut pos = 0;

    while let Some(m) = BARE_URL.find_at(text, pos) {
        if matches!(text[..m.start()].chars().next_back(), Some('(' | '[')) {
            // a later match may still start inside this one
            pos = m.start() + 1;
            continue;
        }
        urls.push(m.as_str().to_string());
        pos = m.end();
    }
    urls
}
