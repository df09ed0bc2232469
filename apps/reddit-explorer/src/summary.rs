use crate::classifier::ClassifiedPost;
use crate::comments::Comment;

/// The fixed question put to the model for every post.
const SUMMARY_CONTENT: &str = "\
Answer the following two questions in order, in detail and in plain language.

1. Explain what this post is about.
2. Point out the comments on this post that are especially interesting.

Do not output anything other than the answers to these questions.";

/// Payload of one summarization call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRequest {
    pub system_instruction: String,
    pub content: String,
}

/// One `"{upvotes} upvotes: {text}"` line per comment.
pub fn format_comments(comments: &[Comment]) -> String {
    comments
        .iter()
        .map(|c| format!("{} upvotes: {}", c.upvotes, c.text))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build(post: &ClassifiedPost, comments: &[Comment]) -> SummaryRequest {
    let selftext = post.submission.selftext.as_str();
    let has_selftext = !selftext.is_empty();

    let mut sections = vec![
        format!(
            "The text below is the title{} of a Reddit post, followed by its main comments.\n\
             Read it carefully and answer the user's questions.",
            if has_selftext { ", the body text" } else { "" }
        ),
        format!("Title\n'''\n{}\n'''", post.title()),
    ];
    if has_selftext {
        sections.push(format!("Body\n'''\n{}\n'''", selftext));
    }
    sections.push(format!("Comments\n'''\n{}\n'''", format_comments(comments)));

    SummaryRequest {
        system_instruction: sections.join("\n\n"),
        content: SUMMARY_CONTENT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassifiedPost, FilterPolicy};
    use crate::reddit::Submission;

    fn post(selftext: &str) -> ClassifiedPost {
        ClassifiedPost::from_submission(
            Submission {
                id: "abc".into(),
                title: "Rust 2.0 announced".into(),
                selftext: selftext.into(),
                author: "someone".into(),
                upvote_ratio: 0.9,
                is_self: true,
                ..Default::default()
            },
            &FilterPolicy::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_content_is_independent_of_post() {
        let a = build(&post(""), &[]);
        let b = build(&post("something"), &[Comment { text: "x".into(), upvotes: 1 }]);
        assert_eq!(a.content, b.content);
        assert!(a.content.contains("1. Explain"));
        assert!(a.content.contains("2. Point out"));
    }

    #[test]
    fn test_instruction_includes_title_and_comments() {
        let comments = vec![
            Comment { text: "Finally!".into(), upvotes: 120 },
            Comment { text: "Source?".into(), upvotes: 4 },
        ];
        let request = build(&post(""), &comments);

        assert!(request.system_instruction.contains("Title\n'''\nRust 2.0 announced\n'''"));
        assert!(request
            .system_instruction
            .contains("Comments\n'''\n120 upvotes: Finally!\n4 upvotes: Source?\n'''"));
    }

    #[test]
    fn test_selftext_block_only_when_present() {
        let without = build(&post(""), &[]);
        assert!(!without.system_instruction.contains("Body\n"));
        assert!(!without.system_instruction.contains("the body text"));

        let with = build(&post("We are excited to announce..."), &[]);
        assert!(with.system_instruction.contains("Body\n'''\nWe are excited to announce...\n'''"));
        assert!(with.system_instruction.contains("the title, the body text"));
    }

    #[test]
    fn test_empty_comment_block_is_valid() {
        let request = build(&post(""), &[]);
        assert!(request.system_instruction.ends_with("Comments\n'''\n\n'''"));
    }
}
