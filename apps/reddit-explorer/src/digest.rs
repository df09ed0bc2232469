//! Markdown rendering of summarized posts and assembly of the daily digest.

use crate::classifier::{ClassifiedPost, ContentType};

/// Line placed between fragments.
pub const FRAGMENT_SEPARATOR: &str = "\n---\n";

fn media_block(post: &ClassifiedPost) -> String {
    match (post.content_type, post.resolved_media_url.as_deref()) {
        (ContentType::Image, Some(url)) => format!("![Image]({})", url),
        (ContentType::Video, Some(url)) => format!(
            r#"<video src="{}" controls style="width: 100%; height: auto; max-height: 500px;"></video>"#,
            url
        ),
        _ => String::new(),
    }
}

/// Render one post and its summary as a digest fragment.
pub fn render(post: &ClassifiedPost, summary: &str) -> String {
    format!(
        "\n# {title}\n\n**Upvotes**: {upvotes}\n\n{media}\n\n[View on Reddit]({permalink})\n\n{summary}\n",
        title = post.title(),
        upvotes = post.submission.upvotes,
        media = media_block(post),
        permalink = post.submission.full_permalink(),
        summary = summary,
    )
}

/// Join fragments into one document. No fragments gives an empty document.
pub fn assemble(fragments: &[String]) -> String {
    fragments.join(FRAGMENT_SEPARATOR)
}
