//! Read-only windows over the unparsed input, handed to phrase hooks.

use crate::phrase::PhraseId;
use crate::token::TokenId;
use crate::tree::{SyntaxTree, TokenRef};

/// The window passed to [`Phrase::starts`] and [`Phrase::ends`]: the
/// unparsed remainder of the current row, plus the active parsing context.
///
/// The window never crosses a row boundary; a match that needs multi-row
/// lookahead has to be modelled as a node whose end is found on a later
/// row. Hooks express advancement only through the candidates they
/// return, never by mutating the stream.
///
/// [`Phrase::starts`]: crate::Phrase::starts
/// [`Phrase::ends`]: crate::Phrase::ends
pub struct Stream<'a> {
    pub(crate) tree: &'a SyntaxTree,
    pub(crate) row: &'a str,
    pub(crate) row_no: usize,
    pub(crate) viewpoint: usize,
    pub(crate) node: TokenId,
    pub(crate) phrase: PhraseId,
}

impl<'a> Stream<'a> {
    /// The unparsed remainder of the current row. Candidate offsets are
    /// relative to this slice.
    #[inline]
    pub fn unparsed(&self) -> &'a str {
        &self.row[self.viewpoint..]
    }

    /// The already parsed part of the current row.
    #[inline]
    pub fn parsed(&self) -> &'a str {
        &self.row[..self.viewpoint]
    }

    /// The whole current row, terminator included.
    #[inline]
    pub fn row(&self) -> &'a str {
        self.row
    }

    /// 0-based number of the current row.
    #[inline]
    pub fn row_no(&self) -> usize {
        self.row_no
    }

    /// Byte column of the viewpoint within the current row.
    #[inline]
    pub fn column(&self) -> usize {
        self.viewpoint
    }

    /// Behaviour phrase of the active node.
    #[inline]
    pub fn phrase(&self) -> PhraseId {
        self.phrase
    }

    /// The active node, for extras lookups and navigation over already
    /// committed tokens.
    #[inline]
    pub fn node(&self) -> TokenRef<'a> {
        TokenRef {
            tree: self.tree,
            id: self.node,
        }
    }
}

/// Which kind of span a tokenize window covers.
///
/// Lets one tokenizer treat a reserved span differently from ordinary
/// body runs, e.g. typing the name a node claimed through `RTokenize`
/// while leaving its gap fills untyped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizeContext {
    /// Characters stripped in front of a token by `LStrip`.
    LStrip,
    /// A pending inner run: the gap before a winner or a row remainder.
    Inner,
    /// The trailing span a token reserved through `RTokenize`.
    RTokenize,
}

/// The window passed to [`Phrase::tokenize`]: a finite span of one row
/// that the hook consumes slice by slice through the `eat_*` methods.
///
/// Every call must consume at least one byte while input remains; the
/// driver turns each consumed slice into one plain token of the returned
/// class.
///
/// [`Phrase::tokenize`]: crate::Phrase::tokenize
pub struct TokenizeStream<'a> {
    designated: &'a str,
    cursor: usize,
    context: TokenizeContext,
}

impl<'a> TokenizeStream<'a> {
    pub(crate) fn new(designated: &'a str, context: TokenizeContext) -> Self {
        Self {
            designated,
            cursor: 0,
            context,
        }
    }

    /// What kind of span this window covers.
    #[inline]
    pub fn context(&self) -> TokenizeContext {
        self.context
    }

    /// The not yet consumed part of the window.
    #[inline]
    pub fn unparsed(&self) -> &'a str {
        &self.designated[self.cursor..]
    }

    /// The already consumed part of the window.
    #[inline]
    pub fn parsed(&self) -> &'a str {
        &self.designated[..self.cursor]
    }

    /// Bytes left in the window.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.designated.len() - self.cursor
    }

    /// Consumes the next `n` bytes (clamped to the window) and returns
    /// them. `n` must land on a character boundary.
    pub fn eat(&mut self, n: usize) -> &'a str {
        let end = (self.cursor + n).min(self.designated.len());
        let slice = &self.designated[self.cursor..end];
        self.cursor = end;
        slice
    }

    /// Consumes and returns the rest of the window.
    pub fn eat_remain(&mut self) -> &'a str {
        let slice = &self.designated[self.cursor..];
        self.cursor = self.designated.len();
        slice
    }

    /// Consumes characters while `pred` holds and returns them.
    pub fn eat_while(&mut self, mut pred: impl FnMut(char) -> bool) -> &'a str {
        let start = self.cursor;
        for c in self.designated[self.cursor..].chars() {
            if !pred(c) {
                break;
            }
            self.cursor += c.len_utf8();
        }
        &self.designated[start..self.cursor]
    }

    #[inline]
    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_stream_eats_in_slices() {
        let mut ts = TokenizeStream::new("foo = 42", TokenizeContext::Inner);
        assert_eq!(ts.context(), TokenizeContext::Inner);
        assert_eq!(ts.eat_while(|c| c.is_alphanumeric()), "foo");
        assert_eq!(ts.parsed(), "foo");
        assert_eq!(ts.eat(3), " = ");
        assert_eq!(ts.remaining(), 2);
        assert_eq!(ts.eat_remain(), "42");
        assert_eq!(ts.remaining(), 0);
        assert_eq!(ts.unparsed(), "");
    }

    #[test]
    fn eat_clamps_to_the_window() {
        let mut ts = TokenizeStream::new("ab", TokenizeContext::RTokenize);
        assert_eq!(ts.eat(10), "ab");
        assert_eq!(ts.eat(1), "");
    }

    #[test]
    fn eat_while_walks_whole_characters() {
        let mut ts = TokenizeStream::new("löwe 42", TokenizeContext::Inner);
        assert_eq!(ts.eat_while(|c| c.is_alphabetic()), "löwe");
        assert_eq!(ts.unparsed(), " 42");
    }
}
