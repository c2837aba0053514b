//! Two-level comment trees: top-level comments, each with a flat list of replies.
//!
//! Every function here is pure. Functions that "change" a tree return a new
//! `Vec`; entries they do not touch are cloned unchanged, so comparing the old
//! and new tree with `==` differs only where the change landed.

use connectsphere_types::{Comment, LikeState, Likeable};

/// Locate a comment by id: top-level comments first, then each one's replies
pub fn find_comment(tree: &[Comment], comment_id: i64) -> Option<&Comment> {
    tree.iter().find(|c| c.id == comment_id).or_else(|| {
        tree.iter()
            .flat_map(|top| top.replies.iter())
            .find(|reply| reply.id == comment_id)
    })
}

/// Replace the comment with `comment_id`, wherever it sits
///
/// A replaced top-level comment keeps its current replies unless
/// `new_value` carries a non-empty reply list of its own.
pub fn replace_comment(tree: &[Comment], comment_id: i64, new_value: &Comment) -> Vec<Comment> {
    tree.iter()
        .map(|top| {
            if top.id == comment_id {
                let mut replaced = new_value.clone();
                if replaced.replies.is_empty() {
                    replaced.replies = top.replies.clone();
                }
                replaced
            } else if top.replies.iter().any(|r| r.id == comment_id) {
                let mut parent = top.clone();
                parent.replies = top
                    .replies
                    .iter()
                    .map(|r| if r.id == comment_id { new_value.clone() } else { r.clone() })
                    .collect();
                parent
            } else {
                top.clone()
            }
        })
        .collect()
}

/// Remove a comment; a top-level comment takes its replies with it
pub fn remove_comment(tree: &[Comment], comment_id: i64) -> Vec<Comment> {
    tree.iter()
        .filter(|top| top.id != comment_id)
        .map(|top| {
            if top.replies.iter().any(|r| r.id == comment_id) {
                let mut parent = top.clone();
                parent.replies.retain(|r| r.id != comment_id);
                parent
            } else {
                top.clone()
            }
        })
        .collect()
}

/// Append `reply` to the replies of top-level comment `parent_id`
///
/// Returns the tree unchanged when `parent_id` is not a top-level comment,
/// including when it names a reply.
pub fn append_reply(tree: &[Comment], parent_id: i64, reply: Comment) -> Vec<Comment> {
    let mut next = tree.to_vec();
    if let Some(parent) = next.iter_mut().find(|c| c.id == parent_id) {
        parent.replies.push(reply);
    }
    next
}

/// Append a top-level comment at the end (chronological order)
pub fn insert_top_level(tree: &[Comment], comment: Comment) -> Vec<Comment> {
    let mut next = tree.to_vec();
    next.push(comment);
    next
}

/// Overwrite the like state of a comment, wherever it sits
pub fn update_like_state(tree: &[Comment], comment_id: i64, state: &LikeState) -> Vec<Comment> {
    let mut next = tree.to_vec();
    for top in next.iter_mut() {
        if top.id == comment_id {
            top.apply_like_state(state.clone());
            break;
        }
        if let Some(reply) = top.replies.iter_mut().find(|r| r.id == comment_id) {
            reply.apply_like_state(state.clone());
            break;
        }
    }
    next
}

/// Total number of comments, replies included
pub fn comment_count(tree: &[Comment]) -> usize {
    tree.iter().map(|top| 1 + top.replies.len()).sum()
}
