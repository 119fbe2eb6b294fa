//! Error surface of the parsing engine.
//!
//! The engine is fail-fast on configuration violations (a candidate that
//! does not fit its window, a feature chain that inverts a span, a hook
//! that refuses to advance the stream) and permissive on syntactic
//! non-closure, which is reported through the tree itself rather than as
//! an error. Every variant carries enough positional context to point at
//! the offending phrase and input location.

use thiserror::Error;

/// Errors raised by [`Grammar::parse_string`] and [`Grammar::parse_rows`].
///
/// [`Grammar::parse_string`]: crate::Grammar::parse_string
/// [`Grammar::parse_rows`]: crate::Grammar::parse_rows
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A hook returned a candidate whose span does not satisfy
    /// `at <= to <= unparsed.len()`.
    #[error(
        "candidate {at}..{to} from phrase {phrase:?} does not fit the unparsed \
         window (len {len}) at row {row_no}, column {column}"
    )]
    CandidateBounds {
        phrase: String,
        at: usize,
        to: usize,
        len: usize,
        row_no: usize,
        column: usize,
    },

    /// A hook returned a candidate of the wrong shape, e.g. an end
    /// candidate from `starts` or a masked end.
    #[error(
        "phrase {phrase:?} returned a {got} candidate where {expected} was \
         expected at row {row_no}, column {column}"
    )]
    CandidateShape {
        phrase: String,
        got: &'static str,
        expected: &'static str,
        row_no: usize,
        column: usize,
    },

    /// Feature application drove a candidate's start past its end.
    #[error(
        "features inverted the span of a {phrase:?} candidate ({at} > {to}) \
         at row {row_no}, column {column}"
    )]
    FeatureSpan {
        phrase: String,
        at: usize,
        to: usize,
        row_no: usize,
        column: usize,
    },

    /// A `tokenize` hook returned without consuming anything while input
    /// remained in its window.
    #[error(
        "tokenizer of phrase {phrase:?} stalled at row {row_no}, column \
         {column}: {unparsed:?}"
    )]
    TokenizerStalled {
        phrase: String,
        row_no: usize,
        column: usize,
        unparsed: String,
    },

    /// A committed token (or a whole forwarding chain) failed to advance
    /// the stream. This plugs the infinite-loop class that null candidates
    /// and non-advancing `ForwardTo` chains would otherwise open.
    #[error(
        "stream stalled on a {phrase:?} candidate at row {row_no}, column \
         {column}: {unparsed:?}"
    )]
    Stalled {
        phrase: String,
        row_no: usize,
        column: usize,
        unparsed: String,
    },
}
