//! Token model: the committed tree's storage cells, the candidate
//! instructions returned by phrase hooks, and the small value types they
//! carry.
//!
//! Mask, instant, default-end and wrap are properties of *candidates*,
//! decided during arbitration; they never appear in the committed tree.

use indexmap::IndexMap;
use smartstring::alias::String;

use crate::feature::{Feature, Features};
use crate::phrase::PhraseId;

/// Index of a committed token inside its [`SyntaxTree`] arena.
///
/// Tokens are stored in commit order, which is exactly the left-to-right
/// depth-first reading order of the tree.
///
/// [`SyntaxTree`]: crate::SyntaxTree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenId(pub(crate) u32);

impl TokenId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Shape of a committed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// The synthesized outermost node.
    Root,
    /// A leaf covering a tokenized span.
    Plain,
    /// A leaf attributed directly to the root while no phrase was active.
    Outer,
    /// A branch: owns inner children and an end slot.
    Node,
    /// The token that closed its node.
    End,
    /// Placeholder end of a node that was never closed.
    OpenEnd,
    /// End of input, installed as the root's end.
    Eof,
}

/// Storage cell for one committed token.
///
/// Content is not stored; it is the row slice `[col_start..col_end]`.
#[derive(Debug)]
pub(crate) struct TokenData {
    pub(crate) kind: TokenKind,
    pub(crate) label: Option<String>,
    /// Identity phrase, visible in results. `None` on plain tokens that no
    /// phrase claimed (gap fills).
    pub(crate) phrase: Option<PhraseId>,
    /// Behaviour phrase consulted for `ends`/subs/suffixes/tokenize.
    /// Diverges from `phrase` only through `SwitchTo`.
    pub(crate) behavior: Option<PhraseId>,
    pub(crate) row_no: usize,
    pub(crate) col_start: usize,
    pub(crate) col_end: usize,
    pub(crate) parent: TokenId,
    pub(crate) inner_index: usize,
    pub(crate) inner: Vec<TokenId>,
    pub(crate) end: Option<TokenId>,
    pub(crate) extras: Extras,
}

impl TokenData {
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.col_end - self.col_start
    }

    #[inline]
    pub(crate) fn is_node(&self) -> bool {
        matches!(self.kind, TokenKind::Node | TokenKind::Root)
    }
}

/// A value stored in a node's extras bag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl ExtraValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExtraValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ExtraValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ExtraValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for ExtraValue {
    fn from(s: &str) -> Self {
        ExtraValue::Str(s.into())
    }
}

impl From<String> for ExtraValue {
    fn from(s: String) -> Self {
        ExtraValue::Str(s)
    }
}

impl From<std::string::String> for ExtraValue {
    fn from(s: std::string::String) -> Self {
        ExtraValue::Str(s.into())
    }
}

impl From<i64> for ExtraValue {
    fn from(i: i64) -> Self {
        ExtraValue::Int(i)
    }
}

impl From<bool> for ExtraValue {
    fn from(b: bool) -> Self {
        ExtraValue::Bool(b)
    }
}

/// Keyword data attached to a node, populated from
/// [`Candidate::extra`] and hook-side [`TokenCtx::set_extra`].
///
/// [`TokenCtx::set_extra`]: crate::TokenCtx::set_extra
#[derive(Debug, Clone, Default)]
pub struct Extras(IndexMap<String, ExtraValue>);

impl Extras {
    pub fn get(&self, key: &str) -> Option<&ExtraValue> {
        self.0.get(key)
    }

    /// Shortcut for string-valued entries.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ExtraValue::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ExtraValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExtraValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Shape of a candidate returned by a phrase hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// A standalone plain token; does not open a phrase.
    Token,
    /// Opens a node of the matching phrase.
    Node,
    /// Closes the active node.
    End,
}

impl Shape {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Shape::Token => "standalone",
            Shape::Node => "node",
            Shape::End => "end",
        }
    }
}

/// A token instruction returned by [`Phrase::starts`] or [`Phrase::ends`].
///
/// `at` and `to` are byte offsets into `stream.unparsed()`, spanning the
/// whole match *including* any part later consumed by features. The driver
/// validates `0 <= at <= to <= unparsed.len()` and arbitrates among all
/// candidates of a pass; only the winner is committed.
///
/// ```
/// # use phraselex::Candidate;
/// let open = Candidate::node(3, 4).label("bracket-open");
/// let word = Candidate::node(0, 2).rtokenize(2).label("word");
/// let close = Candidate::end(1, 2);
/// ```
///
/// [`Phrase::starts`]: crate::Phrase::starts
/// [`Phrase::ends`]: crate::Phrase::ends
#[derive(Debug)]
pub struct Candidate {
    pub(crate) shape: Shape,
    pub(crate) at: usize,
    pub(crate) to: usize,
    pub(crate) label: Option<String>,
    pub(crate) instant: bool,
    pub(crate) mask: bool,
    pub(crate) default_end: bool,
    pub(crate) wrap: Option<PhraseId>,
    pub(crate) features: Features,
    pub(crate) extras: Extras,
    /// Originating phrase, stamped by the driver during collection.
    pub(crate) phrase: Option<PhraseId>,
}

impl Candidate {
    fn new(shape: Shape, at: usize, to: usize) -> Self {
        Self {
            shape,
            at,
            to,
            label: None,
            instant: false,
            mask: false,
            default_end: false,
            wrap: None,
            features: Features::default(),
            extras: Extras::default(),
            phrase: None,
        }
    }

    /// A standalone plain token attributed to the active node.
    pub fn token(at: usize, to: usize) -> Self {
        Self::new(Shape::Token, at, to)
    }

    /// Opens a node of the returning phrase.
    pub fn node(at: usize, to: usize) -> Self {
        Self::new(Shape::Node, at, to)
    }

    /// Closes the active node. Only meaningful from [`Phrase::ends`].
    ///
    /// [`Phrase::ends`]: crate::Phrase::ends
    pub fn end(at: usize, to: usize) -> Self {
        Self::new(Shape::End, at, to)
    }

    /// A null end that wins unconditionally: closes the active node right
    /// at the viewpoint without consuming anything.
    pub fn instant_end() -> Self {
        Self::end(0, 0).instant()
    }

    /// Sets the user label exposed as the committed token's `label`.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Wins unconditionally within its class during arbitration.
    pub fn instant(mut self) -> Self {
        self.instant = true;
        self
    }

    /// Marks the match as a mask: its content is re-attributed to the
    /// parent node and the token itself never appears in the result.
    /// Valid on standalone and node candidates.
    pub fn masked(mut self) -> Self {
        self.mask = true;
        self
    }

    /// Defers this end: it only participates in arbitration if no
    /// sub-phrase produced a candidate in the same pass. End shape only.
    pub fn default_end(mut self) -> Self {
        self.default_end = true;
        self
    }

    /// Turns a node candidate into a wrapper: on selection an empty shell
    /// node of the matching phrase opens at the match start, and the
    /// actual node (this candidate's span, label, features and extras)
    /// opens inside it with `phrase` as its phrase, becoming active.
    pub fn wrap(mut self, phrase: PhraseId) -> Self {
        self.wrap = Some(phrase);
        self
    }

    /// Strips `n` bytes off the front of the span pre-commit; they are
    /// tokenized into the parent before this token.
    pub fn lstrip(mut self, n: usize) -> Self {
        self.features.push(Feature::LStrip(n));
        self
    }

    /// Reserves the trailing `n` bytes of the span for the context
    /// phrase's tokenizer, run right after commit.
    pub fn rtokenize(mut self, n: usize) -> Self {
        self.features.push(Feature::RTokenize(n));
        self
    }

    /// Switches the behaviour phrase of the context node (the opened node
    /// for node candidates, the enclosing node otherwise).
    pub fn switch_to(mut self, phrase: PhraseId) -> Self {
        self.features.push(Feature::SwitchTo(phrase));
        self
    }

    /// Like [`switch_to`](Self::switch_to), but also reassigns the
    /// result-visible phrase identity.
    pub fn switch_phrase(mut self, phrase: PhraseId) -> Self {
        self.features.push(Feature::SwitchPh(phrase));
        self
    }

    /// Queries `phrase`'s `starts` directly after this token and commits
    /// the result in place. The whole chain must advance the stream.
    pub fn forward_to(mut self, phrase: PhraseId) -> Self {
        self.features.push(Feature::ForwardTo(phrase));
        self
    }

    /// Attaches keyword data, exposed as the node's `extras`.
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<ExtraValue>) -> Self {
        self.extras.set(key, value);
        self
    }

    #[inline]
    pub(crate) fn is_null(&self) -> bool {
        self.at == self.to
    }

    #[inline]
    pub(crate) fn span_len(&self) -> usize {
        self.to - self.at
    }
}

/// Classification of one tokenizer slice.
///
/// Returned by [`Phrase::tokenize`] for the span the call consumed.
///
/// [`Phrase::tokenize`]: crate::Phrase::tokenize
#[derive(Debug, Clone, Default)]
pub struct TokenClass {
    pub(crate) label: Option<String>,
}

impl TokenClass {
    /// An unlabeled plain token.
    pub fn untyped() -> Self {
        Self::default()
    }

    /// A plain token labeled `label`.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
        }
    }
}
