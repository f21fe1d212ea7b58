//! Assembles the flat comment rows of one post into a reply forest.
//!
//! The build runs in two passes over an index-addressed arena: every comment is
//! slotted first, then each one is linked to its parent by index. A comment
//! whose parent id does not resolve is left unlinked and never reaches the
//! output. It is not promoted to a root.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::Comment;

/// One comment and its direct replies.
///
/// Building, walking, comparing and dropping a node are iterative. `Debug`
/// and `Serialize` are derived and recurse once per level.
#[derive(Debug, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}

impl Drop for CommentNode {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.replies);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.replies);
        }
    }
}

impl PartialEq for CommentNode {
    fn eq(&self, other: &Self) -> bool {
        let mut pairs = vec![(self, other)];
        while let Some((a, b)) = pairs.pop() {
            if a.comment != b.comment || a.replies.len() != b.replies.len() {
                return false;
            }
            pairs.extend(a.replies.iter().zip(&b.replies));
        }
        true
    }
}

impl CommentNode {
    pub fn id(&self) -> &str {
        &self.comment.id
    }

    /// Pre-order walk of this node and all of its descendants.
    pub fn depth_first(&self) -> DepthFirst<'_> {
        DepthFirst {
            stack: vec![(0, self)],
        }
    }

    /// Number of descendants at any depth.
    pub fn reply_count(&self) -> usize {
        self.depth_first().count() - 1
    }
}

/// Pre-order iterator yielding `(depth, node)`; roots are depth 0.
pub struct DepthFirst<'a> {
    stack: Vec<(usize, &'a CommentNode)>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = (usize, &'a CommentNode);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        self.stack
            .extend(node.replies.iter().rev().map(|r| (depth + 1, r)));
        Some((depth, node))
    }
}

/// Pre-order walk over a whole forest.
pub fn walk(forest: &[CommentNode]) -> DepthFirst<'_> {
    DepthFirst {
        stack: forest.iter().rev().map(|n| (0, n)).collect(),
    }
}

pub fn count_nodes(forest: &[CommentNode]) -> usize {
    walk(forest).count()
}

/// Builds the reply forest for one post.
///
/// Input is sorted by `created_at` (stable, so equal timestamps keep their
/// fetch order) before the build; roots and every `replies` list come out in
/// ascending creation order. Duplicate ids keep their first occurrence.
pub fn build_thread(mut comments: Vec<Comment>) -> Vec<CommentNode> {
    comments.sort_by_key(|c| c.created_at);

    // pass 1: arena + id lookup
    let mut lookup: HashMap<String, usize> = HashMap::with_capacity(comments.len());
    let mut arena: Vec<Option<Comment>> = Vec::with_capacity(comments.len());
    for comment in comments {
        if lookup.contains_key(&comment.id) {
            continue;
        }
        lookup.insert(comment.id.clone(), arena.len());
        arena.push(Some(comment));
    }

    // pass 2: link by index
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); arena.len()];
    let mut roots = Vec::new();
    for (idx, slot) in arena.iter().enumerate() {
        let Some(comment) = slot else { continue };
        match comment.parent_id.as_deref() {
            None => roots.push(idx),
            Some(parent_id) => {
                if let Some(&parent_idx) = lookup.get(parent_id) {
                    children[parent_idx].push(idx);
                }
            }
        }
    }

    assemble(arena, &children, &roots)
}

// Every arena slot has at most one parent link, so the part reachable from the
// roots is a tree. Anything else (dangling parents, reference cycles) is
// simply never visited.
fn assemble(
    mut arena: Vec<Option<Comment>>,
    children: &[Vec<usize>],
    roots: &[usize],
) -> Vec<CommentNode> {
    let mut built: Vec<Option<CommentNode>> = (0..arena.len()).map(|_| None).collect();
    let mut stack: Vec<(usize, bool)> = roots.iter().rev().map(|&r| (r, false)).collect();

    while let Some((idx, expanded)) = stack.pop() {
        if expanded {
            let replies = children[idx]
                .iter()
                .filter_map(|&child| built[child].take())
                .collect();
            if let Some(comment) = arena[idx].take() {
                built[idx] = Some(CommentNode { comment, replies });
            }
        } else {
            stack.push((idx, true));
            stack.extend(children[idx].iter().map(|&child| (child, false)));
        }
    }

    roots.iter().filter_map(|&r| built[r].take()).collect()
}
