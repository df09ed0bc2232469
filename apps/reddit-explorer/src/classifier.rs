//! Content-type classification and the keep/drop filter applied to hot
//! submissions before they are summarized.

use std::fmt;

use crate::reddit::Submission;

/// What a submission carries, derived from its raw type hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Image,
    Gallery,
    Video,
    Poll,
    Crosspost,
    Text,
    Link,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Image => "image",
            ContentType::Gallery => "gallery",
            ContentType::Video => "video",
            ContentType::Poll => "poll",
            ContentType::Crosspost => "crosspost",
            ContentType::Text => "text",
            ContentType::Link => "link",
        }
    }

    /// Types the digest has no rendering for.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, ContentType::Gallery | ContentType::Poll | ContentType::Crosspost)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify by the first matching hint, in the order
/// image > gallery > video > poll > crosspost > self-text > link.
pub fn classify(submission: &Submission) -> ContentType {
    if submission.post_hint.as_deref() == Some("image") {
        ContentType::Image
    } else if submission.is_gallery.unwrap_or(false) {
        ContentType::Gallery
    } else if submission.is_video {
        ContentType::Video
    } else if submission.has_poll() {
        ContentType::Poll
    } else if submission.is_crosspost() {
        ContentType::Crosspost
    } else if submission.is_self {
        ContentType::Text
    } else {
        ContentType::Link
    }
}

/// Thresholds of the filter.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterPolicy {
    pub bot_author: String,
    pub min_upvote_ratio: f64,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            bot_author: "AutoModerator".to_string(),
            min_upvote_ratio: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    BotAuthor,
    Megathread,
    LowUpvoteRatio,
    UnsupportedType(ContentType),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::BotAuthor => f.write_str("bot author"),
            DropReason::Megathread => f.write_str("megathread"),
            DropReason::LowUpvoteRatio => f.write_str("low upvote ratio"),
            DropReason::UnsupportedType(kind) => write!(f, "unsupported type {}", kind),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    Drop(DropReason),
}

/// Checks run in order; the first that applies decides the drop reason.
pub fn verdict(submission: &Submission, content_type: ContentType, policy: &FilterPolicy) -> Verdict {
    if submission.author == policy.bot_author {
        Verdict::Drop(DropReason::BotAuthor)
    } else if submission.title.to_lowercase().contains("megathread") {
        Verdict::Drop(DropReason::Megathread)
    } else if submission.upvote_ratio < policy.min_upvote_ratio {
        Verdict::Drop(DropReason::LowUpvoteRatio)
    } else if content_type.is_unsupported() {
        Verdict::Drop(DropReason::UnsupportedType(content_type))
    } else {
        Verdict::Keep
    }
}

/// Playable URL for videos; the submission URL for everything else.
pub fn resolve_media_url(submission: &Submission, content_type: ContentType) -> Option<String> {
    if content_type != ContentType::Video {
        return submission.url.clone();
    }

    let fallback = |media: &Option<crate::reddit::MediaDescriptor>| {
        media
            .as_ref()
            .and_then(|m| m.reddit_video.as_ref())
            .and_then(|v| v.fallback_url.clone())
    };
    fallback(&submission.media).or_else(|| fallback(&submission.secure_media))
}

/// A submission that passed the filter, with its derived fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedPost {
    pub submission: Submission,
    pub content_type: ContentType,
    pub resolved_media_url: Option<String>,
}

impl ClassifiedPost {
    /// Classify and filter in one step.
    pub fn from_submission(submission: Submission, policy: &FilterPolicy) -> Result<Self, DropReason> {
        let content_type = classify(&submission);
        match verdict(&submission, content_type, policy) {
            Verdict::Drop(reason) => Err(reason),
            Verdict::Keep => Ok(Self {
                resolved_media_url: resolve_media_url(&submission, content_type),
                content_type,
                submission,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.submission.id
    }

    pub fn title(&self) -> &str {
        &self.submission.title
    }
}
