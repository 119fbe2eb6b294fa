//! One-dimensional traversal over the committed tree.
//!
//! The arena is stored in reading order, so every traversal context is a
//! contiguous arena range except the ancestor path, which walks parent
//! links. Readers are pure views and never mutate the tree.

use crate::token::TokenId;
use crate::tree::{SyntaxTree, TokenRef};

/// Traversal contexts anchored at one token.
///
/// - [`thereafter`](Self::thereafter): everything after the anchor, to EOF.
/// - [`therebefore`](Self::therebefore): everything before the anchor,
///   from the root.
/// - [`inner`](Self::inner): the anchor node's content, recursively,
///   excluding the anchor and its end.
/// - [`branch`](Self::branch): `inner` plus the anchor and its end.
/// - [`node_path`](Self::node_path): ancestor chain from the root to the
///   anchor.
#[derive(Clone, Copy)]
pub struct TokenReader<'a> {
    tree: &'a SyntaxTree,
    anchor: TokenId,
}

impl<'a> TokenReader<'a> {
    pub(crate) fn new(tree: &'a SyntaxTree, anchor: TokenId) -> Self {
        Self { tree, anchor }
    }

    /// Tokens after the anchor in reading order, anchor excluded.
    pub fn thereafter(&self) -> Tokens<'a> {
        Tokens {
            tree: self.tree,
            range: self.anchor.index() + 1..self.tree.tokens.len(),
        }
    }

    /// Tokens before the anchor in reading order, anchor excluded; the
    /// root comes first.
    pub fn therebefore(&self) -> Tokens<'a> {
        Tokens {
            tree: self.tree,
            range: 0..self.anchor.index(),
        }
    }

    /// Arena index just past the anchor's branch.
    fn branch_stop(&self) -> usize {
        match self.tree.data(self.anchor).end {
            Some(end) => end.index(),
            // Open node mid-parse: everything committed so far is inside.
            None => self.tree.tokens.len(),
        }
    }

    /// The anchor node's inner tokens, recursively, excluding the anchor
    /// and its end. Empty for non-node anchors.
    pub fn inner(&self) -> Tokens<'a> {
        let range = if self.tree.data(self.anchor).is_node() {
            self.anchor.index() + 1..self.branch_stop()
        } else {
            0..0
        };
        Tokens {
            tree: self.tree,
            range,
        }
    }

    /// The anchor's whole branch: the anchor, its inner tokens and its
    /// end. A non-node anchor yields just itself.
    pub fn branch(&self) -> Tokens<'a> {
        let start = self.anchor.index();
        let range = if self.tree.data(self.anchor).is_node() {
            let stop = self.branch_stop();
            start..(stop + 1).min(self.tree.tokens.len())
        } else {
            start..start + 1
        };
        Tokens {
            tree: self.tree,
            range,
        }
    }

    /// Ancestor chain from the root to the anchor. A node anchor is
    /// included; a leaf anchor contributes its owning node instead.
    pub fn node_path(&self) -> NodePath<'a> {
        let mut path = Vec::new();
        let mut id = if self.tree.data(self.anchor).is_node() {
            self.anchor
        } else {
            self.tree.data(self.anchor).parent
        };
        loop {
            path.push(id);
            let parent = self.tree.data(id).parent;
            if parent == id {
                break;
            }
            id = parent;
        }
        path.reverse();
        NodePath {
            tree: self.tree,
            path,
            next: 0,
        }
    }
}

/// Iterator over a contiguous arena range, cheap to clone and able to
/// reassemble the content it covers.
#[derive(Clone)]
pub struct Tokens<'a> {
    tree: &'a SyntaxTree,
    range: std::ops::Range<usize>,
}

impl<'a> Tokens<'a> {
    /// Concatenated content of the remaining tokens.
    pub fn content(&self) -> String {
        self.clone().map(|t| t.content()).collect()
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = TokenRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.range.next()?;
        Some(TokenRef {
            tree: self.tree,
            id: TokenId(index as u32),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.range.size_hint()
    }
}

impl DoubleEndedIterator for Tokens<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let index = self.range.next_back()?;
        Some(TokenRef {
            tree: self.tree,
            id: TokenId(index as u32),
        })
    }
}

impl ExactSizeIterator for Tokens<'_> {}

/// Iterator over an ancestor chain, root first.
pub struct NodePath<'a> {
    tree: &'a SyntaxTree,
    path: Vec<TokenId>,
    next: usize,
}

impl<'a> Iterator for NodePath<'a> {
    type Item = TokenRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = *self.path.get(self.next)?;
        self.next += 1;
        Some(TokenRef {
            tree: self.tree,
            id,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.path.len() - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for NodePath<'_> {}
