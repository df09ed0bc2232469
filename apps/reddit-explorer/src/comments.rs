use std::collections::VecDeque;
use tracing::debug;

use crate::error::RedditApiError;
use crate::reddit::{CommentNode, ForumSource};

/// A comment kept for summarization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub text: String,
    pub upvotes: i64,
}

/// How retained comments are chosen from the flattened tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommentOrder {
    /// Keep the API's own order.
    #[default]
    Api,
    /// Stable sort by upvotes, highest first.
    Upvotes,
}

/// Flatten a comment forest breadth-first: all top-level comments, then
/// their replies level by level. Tree structure is not recoverable.
pub fn flatten(tree: Vec<CommentNode>) -> Vec<Comment> {
    let mut queue: VecDeque<CommentNode> = tree.into();
    let mut flat = Vec::new();

    while let Some(node) = queue.pop_front() {
        queue.extend(node.replies);
        flat.push(Comment {
            text: node.body,
            upvotes: node.upvotes,
        });
    }
    flat
}

/// Select at most `limit` comments from a flattened list.
pub fn rank(mut comments: Vec<Comment>, limit: usize, order: CommentOrder) -> Vec<Comment> {
    if order == CommentOrder::Upvotes {
        // sort_by is stable, so ties keep API order
        comments.sort_by(|a, b| b.upvotes.cmp(&a.upvotes));
    }
    comments.truncate(limit);
    comments
}

/// Fetch a submission's comment tree and keep its top `limit` comments.
pub async fn top_comments(
    forum: &dyn ForumSource,
    post_id: &str,
    limit: usize,
    order: CommentOrder,
) -> Result<Vec<Comment>, RedditApiError> {
    let tree = forum.comment_tree(post_id).await?;
    let flat = flatten(tree);
    let total = flat.len();
    let ranked = rank(flat, limit, order);
    debug!(post_id = %post_id, total, kept = ranked.len(), "Ranked comments");
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reddit::Submission;
    use async_trait::async_trait;

    fn c(text: &str, upvotes: i64) -> Comment {
        Comment { text: text.into(), upvotes }
    }

    fn tree() -> Vec<CommentNode> {
        vec![
            CommentNode {
                body: "a".into(),
                upvotes: 5,
                replies: vec![
                    CommentNode {
                        body: "a1".into(),
                        upvotes: 40,
                        replies: vec![CommentNode::leaf("a1x", 1)],
                    },
                    CommentNode::leaf("a2", 9),
                ],
            },
            CommentNode {
                body: "b".into(),
                upvotes: 9,
                replies: vec![CommentNode::leaf("b1", 2)],
            },
        ]
    }

    struct FixedTree;

    #[async_trait]
    impl ForumSource for FixedTree {
        async fn hot_submissions(&self, _: &str, _: u32) -> Result<Vec<Submission>, RedditApiError> {
            Ok(Vec::new())
        }

        async fn comment_tree(&self, _: &str) -> Result<Vec<CommentNode>, RedditApiError> {
            Ok(tree())
        }
    }

    #[test]
    fn test_flatten_is_breadth_first() {
        let texts: Vec<String> = flatten(tree()).into_iter().map(|c| c.text).collect();
        assert_eq!(texts, vec!["a", "b", "a1", "a2", "b1", "a1x"]);
    }

    #[test]
    fn test_rank_api_order_truncates() {
        let ranked = rank(flatten(tree()), 3, CommentOrder::Api);
        assert_eq!(ranked, vec![c("a", 5), c("b", 9), c("a1", 40)]);
    }

    #[test]
    fn test_rank_by_upvotes_is_stable_on_ties() {
        let ranked = rank(flatten(tree()), 3, CommentOrder::Upvotes);
        assert_eq!(ranked, vec![c("a1", 40), c("b", 9), c("a2", 9)]);
    }

    #[test]
    fn test_rank_never_exceeds_limit() {
        for limit in 0..10 {
            let ranked = rank(flatten(tree()), limit, CommentOrder::Api);
            assert_eq!(ranked.len(), limit.min(6));
        }
    }

    #[tokio::test]
    async fn test_top_comments_uses_forum_tree() {
        let comments = top_comments(&FixedTree, "abc", 2, CommentOrder::Api).await.unwrap();
        assert_eq!(comments, vec![c("a", 5), c("b", 9)]);
    }
}
