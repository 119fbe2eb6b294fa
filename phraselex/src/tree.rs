//! The committed result tree.
//!
//! Tokens live in an arena in commit order, which is exactly the
//! left-to-right depth-first reading order of the tree; the reader and
//! index components lean on that equivalence. Content is never copied:
//! a token's content is the slice of its row between its byte columns,
//! so concatenating content over the traversal reproduces the input by
//! construction.

use crate::coords::Coord;
use crate::index::{RowInfo, TokenIndex};
use crate::phrase::PhraseId;
use crate::reader::TokenReader;
use crate::token::{Extras, TokenData, TokenId, TokenKind};

/// The parse result: owned rows plus the token arena, rooted at
/// [`SyntaxTree::root`].
#[derive(Debug)]
pub struct SyntaxTree {
    pub(crate) rows: Vec<Box<str>>,
    pub(crate) tokens: Vec<TokenData>,
    pub(crate) index: Option<TokenIndex>,
}

pub(crate) const ROOT_TOKEN: TokenId = TokenId(0);

impl SyntaxTree {
    pub(crate) fn new(rows: Vec<Box<str>>) -> Self {
        Self {
            rows,
            tokens: vec![TokenData {
                kind: TokenKind::Root,
                label: None,
                phrase: Some(crate::Grammar::ROOT),
                behavior: Some(crate::Grammar::ROOT),
                row_no: 0,
                col_start: 0,
                col_end: 0,
                parent: ROOT_TOKEN,
                inner_index: 0,
                inner: Vec::new(),
                end: None,
                extras: Extras::default(),
            }],
            index: None,
        }
    }

    /// The synthesized outermost node.
    pub fn root(&self) -> TokenRef<'_> {
        TokenRef {
            tree: self,
            id: ROOT_TOKEN,
        }
    }

    /// The full input, reassembled from the rows.
    pub fn content(&self) -> String {
        self.rows.iter().map(|r| &**r).collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// The raw text of row `row_no`.
    pub fn row_text(&self, row_no: usize) -> Option<&str> {
        self.rows.get(row_no).map(|r| &**r)
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Looks a committed token up by arena id.
    pub fn token(&self, id: TokenId) -> TokenRef<'_> {
        debug_assert!(id.index() < self.tokens.len());
        TokenRef { tree: self, id }
    }

    /// The token covering `(row_no, column)`: the first token of the row
    /// whose end column lies beyond `column`.
    pub fn token_at_coord(&self, row_no: usize, column: usize) -> Option<TokenRef<'_>> {
        let index = self.index.as_ref()?;
        index
            .token_at_coord(self, row_no, column)
            .map(|id| TokenRef { tree: self, id })
    }

    /// The token covering the absolute byte offset `offset`.
    pub fn token_at_cursor(&self, offset: usize) -> Option<TokenRef<'_>> {
        let index = self.index.as_ref()?;
        index
            .token_at_cursor(self, offset)
            .map(|id| TokenRef { tree: self, id })
    }

    /// Per-row index record: data offsets and the tokens of the row.
    pub fn row_info(&self, row_no: usize) -> Option<RowInfo<'_>> {
        let index = self.index.as_ref()?;
        index.row_info(self, row_no)
    }

    #[inline]
    pub(crate) fn data(&self, id: TokenId) -> &TokenData {
        &self.tokens[id.index()]
    }

    #[inline]
    pub(crate) fn data_mut(&mut self, id: TokenId) -> &mut TokenData {
        &mut self.tokens[id.index()]
    }

    pub(crate) fn push_child(&mut self, parent: TokenId, mut data: TokenData) -> TokenId {
        let id = TokenId(self.tokens.len() as u32);
        data.parent = parent;
        data.inner_index = self.data(parent).inner.len();
        self.tokens.push(data);
        self.data_mut(parent).inner.push(id);
        id
    }

    pub(crate) fn push_end(&mut self, node: TokenId, mut data: TokenData) -> TokenId {
        let id = TokenId(self.tokens.len() as u32);
        data.parent = node;
        data.inner_index = 0;
        self.tokens.push(data);
        self.data_mut(node).end = Some(id);
        id
    }

    fn end_data(&self, kind: TokenKind) -> TokenData {
        let last = self.tokens.last().expect("the arena always holds the root");
        TokenData {
            kind,
            label: None,
            phrase: None,
            behavior: None,
            row_no: last.row_no,
            col_start: last.col_end,
            col_end: last.col_end,
            parent: ROOT_TOKEN,
            inner_index: 0,
            inner: Vec::new(),
            end: None,
            extras: Extras::default(),
        }
    }

    /// Installs the open-end chain from the still-active node up to the
    /// root, the root's EOF, and the token index.
    pub(crate) fn finalize(&mut self, active: TokenId) {
        let mut node = active;
        while node != ROOT_TOKEN {
            if self.data(node).end.is_none() {
                let data = self.end_data(TokenKind::OpenEnd);
                self.push_end(node, data);
            }
            node = self.data(node).parent;
        }
        let data = self.end_data(TokenKind::Eof);
        self.push_end(ROOT_TOKEN, data);
        self.index = Some(TokenIndex::build(&self.rows, &self.tokens));
    }

    /// Absolute byte offset of the token's first byte. Falls back to a
    /// traversal sum while the index is not built yet (hooks running
    /// mid-parse).
    pub(crate) fn data_start_of(&self, id: TokenId) -> usize {
        match &self.index {
            Some(index) => index.data_start(id),
            None => self.tokens[..id.index()].iter().map(TokenData::len).sum(),
        }
    }
}

/// Cheap copyable view of one committed token.
///
/// All navigation (`parent`, `next`, `children`, `end`, the reader) is
/// resolved against the owning [`SyntaxTree`].
#[derive(Clone, Copy)]
pub struct TokenRef<'a> {
    pub(crate) tree: &'a SyntaxTree,
    pub(crate) id: TokenId,
}

impl<'a> TokenRef<'a> {
    #[inline]
    pub fn id(&self) -> TokenId {
        self.id
    }

    #[inline]
    fn data(&self) -> &'a TokenData {
        self.tree.data(self.id)
    }

    pub fn kind(&self) -> TokenKind {
        self.data().kind
    }

    /// The user label of the token, if any was supplied.
    pub fn label(&self) -> Option<&'a str> {
        self.data().label.as_deref()
    }

    /// The exact input slice this token covers.
    pub fn content(&self) -> &'a str {
        let data = self.data();
        if data.col_start == data.col_end {
            return "";
        }
        &self.tree.rows[data.row_no][data.col_start..data.col_end]
    }

    pub fn row_no(&self) -> usize {
        self.data().row_no
    }

    pub fn column_start(&self) -> usize {
        self.data().col_start
    }

    pub fn column_end(&self) -> usize {
        self.data().col_end
    }

    pub fn data_start(&self) -> usize {
        self.tree.data_start_of(self.id)
    }

    pub fn data_end(&self) -> usize {
        self.data_start() + self.len()
    }

    pub fn start_coord(&self) -> Coord {
        let data = self.data();
        Coord::new(data.row_no, data.col_start, self.data_start())
    }

    pub fn end_coord(&self) -> Coord {
        let data = self.data();
        Coord::new(data.row_no, data.col_end, self.data_end())
    }

    /// Content length in bytes.
    pub fn len(&self) -> usize {
        self.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The owning node; `None` only for the root.
    pub fn parent(&self) -> Option<TokenRef<'a>> {
        if self.id == ROOT_TOKEN {
            return None;
        }
        Some(TokenRef {
            tree: self.tree,
            id: self.data().parent,
        })
    }

    /// Position among the parent's children. End tokens report 0.
    pub fn inner_index(&self) -> usize {
        self.data().inner_index
    }

    /// Identity phrase of the token, `None` on unclaimed plain tokens.
    pub fn phrase(&self) -> Option<PhraseId> {
        self.data().phrase
    }

    pub fn extras(&self) -> &'a Extras {
        &self.data().extras
    }

    pub fn is_node(&self) -> bool {
        self.data().is_node()
    }

    pub fn is_root(&self) -> bool {
        self.data().kind == TokenKind::Root
    }

    pub fn is_outer(&self) -> bool {
        self.data().kind == TokenKind::Outer
    }

    /// Whether this token terminates a node (end, open end, or EOF).
    pub fn is_end(&self) -> bool {
        matches!(
            self.data().kind,
            TokenKind::End | TokenKind::OpenEnd | TokenKind::Eof
        )
    }

    /// Whether this is the placeholder end of a never-closed node.
    pub fn is_open_end(&self) -> bool {
        self.data().kind == TokenKind::OpenEnd
    }

    pub fn is_eof(&self) -> bool {
        self.data().kind == TokenKind::Eof
    }

    /// Direct children of a node, in order.
    pub fn children(&self) -> impl ExactSizeIterator<Item = TokenRef<'a>> + 'a {
        let tree = self.tree;
        self.data().inner.iter().map(move |&id| TokenRef { tree, id })
    }

    pub fn child(&self, index: usize) -> Option<TokenRef<'a>> {
        let &id = self.data().inner.get(index)?;
        Some(TokenRef {
            tree: self.tree,
            id,
        })
    }

    pub fn child_count(&self) -> usize {
        self.data().inner.len()
    }

    /// The node's end slot. `None` while the node is still open mid-parse;
    /// always present in a finalized tree.
    pub fn end(&self) -> Option<TokenRef<'a>> {
        let id = self.data().end?;
        Some(TokenRef {
            tree: self.tree,
            id,
        })
    }

    /// The next token in one-dimensional reading order.
    pub fn next(&self) -> Option<TokenRef<'a>> {
        let next = self.id.index() + 1;
        if next >= self.tree.tokens.len() {
            return None;
        }
        Some(TokenRef {
            tree: self.tree,
            id: TokenId(next as u32),
        })
    }

    /// The previous token in one-dimensional reading order.
    pub fn previous(&self) -> Option<TokenRef<'a>> {
        let index = self.id.index().checked_sub(1)?;
        Some(TokenRef {
            tree: self.tree,
            id: TokenId(index as u32),
        })
    }

    /// One-dimensional traversal anchored at this token.
    pub fn reader(&self) -> TokenReader<'a> {
        TokenReader::new(self.tree, self.id)
    }
}

impl std::fmt::Debug for TokenRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.data();
        write!(
            f,
            "<{:?}{} {}:{}..{}>{:?}",
            data.kind,
            data.label
                .as_deref()
                .map(|l| format!(" {l}"))
                .unwrap_or_default(),
            data.row_no,
            data.col_start,
            data.col_end,
            self.content(),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::{Candidate, Coord, Grammar, Phrase, Stream, TokenKind};

    struct Pair;

    impl Phrase for Pair {
        fn label(&self) -> &str {
            "pair"
        }

        fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
            let at = stream.unparsed().find('<')?;
            Some(Candidate::node(at, at + 1))
        }

        fn ends(&self, stream: &Stream<'_>) -> Option<Candidate> {
            let at = stream.unparsed().find('>')?;
            Some(Candidate::end(at, at + 1))
        }
    }

    fn sample() -> crate::SyntaxTree {
        let mut grammar = Grammar::new();
        let pair = grammar.add(Pair);
        grammar.add_sub(Grammar::ROOT, pair);
        grammar.parse_string("a<b\nc>d").unwrap()
    }

    #[test]
    fn coords_resolve_rows_columns_and_offsets() {
        let tree = sample();
        let node = tree.root().child(1).unwrap();
        assert_eq!(node.start_coord(), Coord::new(0, 1, 1));
        assert_eq!(node.end_coord(), Coord::new(0, 2, 2));
        let end = node.end().unwrap();
        assert_eq!(end.start_coord(), Coord::new(1, 1, 5));
        assert_eq!(end.end_coord(), Coord::new(1, 2, 6));
    }

    #[test]
    fn one_dimensional_neighbors_follow_reading_order() {
        let tree = sample();
        let node = tree.root().child(1).unwrap();
        // Into the node: first inner token, then across its end.
        let first_inner = node.next().unwrap();
        assert_eq!(first_inner.content(), "b\n");
        assert_eq!(first_inner.previous().unwrap().id(), node.id());
        let end = first_inner.next().unwrap().next().unwrap();
        assert!(end.is_end());
        assert_eq!(end.next().unwrap().content(), "d");
        assert!(tree.root().previous().is_none());
        assert!(tree.root().end().unwrap().next().is_none());
    }

    #[test]
    fn content_is_the_row_slice() {
        let tree = sample();
        assert_eq!(tree.content(), "a<b\nc>d");
        let outer = tree.root().child(0).unwrap();
        assert_eq!(outer.kind(), TokenKind::Outer);
        assert_eq!(outer.content(), "a");
        assert!(tree.root().is_empty());
        assert_eq!(tree.root().content(), "");
    }
}
