//! User-facing configuration surface: the [`Phrase`] hook trait and the
//! [`Grammar`] registry that wires phrases into a (possibly cyclic) graph.
//!
//! Phrases are registered once and addressed by [`PhraseId`]; sub- and
//! suffix-phrase tables are id edges, so recursive languages are expressed
//! by sharing ids instead of cloning configuration. The engine itself
//! recognizes nothing; every match decision is delegated to these hooks.

use smartstring::alias::String;

use crate::error::ParseError;
use crate::parser::Driver;
use crate::stream::{Stream, TokenizeStream};
use crate::token::{Candidate, ExtraValue, Extras, TokenClass, TokenId};
use crate::tree::{SyntaxTree, TokenRef};

/// Handle of a registered phrase within a [`Grammar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhraseId(pub(crate) u32);

/// A user phrase definition: how a construct starts, what can appear
/// inside it, and how it ends.
///
/// Only [`starts`](Self::starts) is mandatory. `ends` defaults to never
/// closing (suitable for phrases that finish through an instant end or
/// stay open to end of input); `tokenize` defaults to swallowing the whole
/// pending run as one untyped token; the observer hooks default to no-ops.
///
/// Hooks are called synchronously on the parsing thread, must return in
/// bounded time, and must not retain the stream views they are handed.
///
/// ```
/// use phraselex::{Candidate, Phrase, Stream};
///
/// struct Star;
///
/// impl Phrase for Star {
///     fn label(&self) -> &str {
///         "star"
///     }
///
///     fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
///         let at = stream.unparsed().find('*')?;
///         Some(Candidate::token(at, at + 1))
///     }
/// }
/// ```
pub trait Phrase {
    /// Short name used in results, traces and error messages.
    fn label(&self) -> &str;

    /// Proposes where this phrase could start in `stream.unparsed()`, or
    /// a standalone plain-token match, or `None` if it does not apply.
    fn starts(&self, stream: &Stream<'_>) -> Option<Candidate>;

    /// Proposes a close for this phrase while it is the active one.
    fn ends(&self, _stream: &Stream<'_>) -> Option<Candidate> {
        None
    }

    /// Classifies a pending raw run of characters into typed plain
    /// tokens, consuming the window one slice per call.
    ///
    /// The default takes the whole remainder as one untyped token.
    fn tokenize(&self, stream: &mut TokenizeStream<'_>) -> TokenClass {
        stream.eat_remain();
        TokenClass::untyped()
    }

    /// Called after a node of this phrase opened.
    fn at_start(&self, _node: &mut TokenCtx<'_>) {}

    /// Called after a node of this phrase closed, with the closed node.
    fn at_end(&self, _node: &mut TokenCtx<'_>) {}

    /// Called when a token produced by this phrase was committed.
    fn at_confirmed(&self, _token: &mut TokenCtx<'_>) {}

    /// Called after an arbitrated token was committed and featurized.
    fn at_featurized(&self, _token: &mut TokenCtx<'_>) {}
}

/// Mutable hook context: read access to the committed token plus the only
/// sanctioned side channel, its node extras.
pub struct TokenCtx<'a> {
    pub(crate) tree: &'a mut SyntaxTree,
    pub(crate) token: TokenId,
}

impl TokenCtx<'_> {
    /// The committed token this hook fires for.
    pub fn token(&self) -> TokenRef<'_> {
        TokenRef {
            tree: &*self.tree,
            id: self.token,
        }
    }

    pub fn content(&self) -> &str {
        self.token().content()
    }

    pub fn label(&self) -> Option<&str> {
        self.tree.data(self.token).label.as_deref()
    }

    /// Overrides the token's user label.
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.tree.data_mut(self.token).label = Some(label.into());
    }

    pub fn extras(&self) -> &Extras {
        &self.tree.data(self.token).extras
    }

    /// Sets a user-defined field on the token.
    pub fn set_extra(&mut self, key: impl Into<String>, value: impl Into<ExtraValue>) {
        self.tree.data_mut(self.token).extras.set(key, value);
    }
}

struct Slot {
    rules: Option<Box<dyn Phrase>>,
    subs: Vec<PhraseId>,
    suffixes: Vec<PhraseId>,
}

/// Registry of phrases plus the root configuration.
///
/// [`Grammar::ROOT`] is the distinguished entry phrase: it has no hooks,
/// only sub-phrases. Building a grammar is two-step (register phrases,
/// then wire edges), which is what lets cycles form:
///
/// ```
/// # use phraselex::{Candidate, Grammar, Phrase, Stream};
/// # struct Paren;
/// # impl Phrase for Paren {
/// #     fn label(&self) -> &str { "paren" }
/// #     fn starts(&self, s: &Stream<'_>) -> Option<Candidate> {
/// #         s.unparsed().find('(').map(|at| Candidate::node(at, at + 1))
/// #     }
/// #     fn ends(&self, s: &Stream<'_>) -> Option<Candidate> {
/// #         s.unparsed().find(')').map(|at| Candidate::end(at, at + 1))
/// #     }
/// # }
/// let mut grammar = Grammar::new();
/// let paren = grammar.add(Paren);
/// grammar.add_sub(Grammar::ROOT, paren);
/// grammar.add_sub(paren, paren); // recursive
/// let tree = grammar.parse_string("(a(b)c)").unwrap();
/// assert_eq!(tree.content(), "(a(b)c)");
/// ```
pub struct Grammar {
    slots: Vec<Slot>,
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

impl Grammar {
    /// The root configuration: no hooks, sub-phrases only.
    pub const ROOT: PhraseId = PhraseId(0);

    pub fn new() -> Self {
        Self {
            slots: vec![Slot {
                rules: None,
                subs: Vec::new(),
                suffixes: Vec::new(),
            }],
        }
    }

    /// Registers a phrase and returns its handle.
    pub fn add(&mut self, phrase: impl Phrase + 'static) -> PhraseId {
        let id = PhraseId(self.slots.len() as u32);
        self.slots.push(Slot {
            rules: Some(Box::new(phrase)),
            subs: Vec::new(),
            suffixes: Vec::new(),
        });
        id
    }

    /// Makes `child` a sub-phrase of `parent`. Adding a phrase to itself
    /// expresses recursion. The root cannot be a child.
    pub fn add_sub(&mut self, parent: PhraseId, child: PhraseId) {
        assert!(child != Self::ROOT, "the root phrase cannot be a sub-phrase");
        let subs = &mut self.slots[parent.0 as usize].subs;
        if !subs.contains(&child) {
            subs.push(child);
        }
    }

    pub fn add_subs(&mut self, parent: PhraseId, children: &[PhraseId]) {
        for &child in children {
            self.add_sub(parent, child);
        }
    }

    pub fn rm_sub(&mut self, parent: PhraseId, child: PhraseId) {
        self.slots[parent.0 as usize].subs.retain(|&c| c != child);
    }

    /// Makes `child` a suffix-phrase of `parent`: queried once right
    /// after a `parent` node closes, and only accepted when it continues
    /// immediately (`at == 0`).
    pub fn add_suffix(&mut self, parent: PhraseId, child: PhraseId) {
        assert!(
            child != Self::ROOT,
            "the root phrase cannot be a suffix-phrase"
        );
        let suffixes = &mut self.slots[parent.0 as usize].suffixes;
        if !suffixes.contains(&child) {
            suffixes.push(child);
        }
    }

    pub fn add_suffixes(&mut self, parent: PhraseId, children: &[PhraseId]) {
        for &child in children {
            self.add_suffix(parent, child);
        }
    }

    pub fn rm_suffix(&mut self, parent: PhraseId, child: PhraseId) {
        self.slots[parent.0 as usize]
            .suffixes
            .retain(|&c| c != child);
    }

    pub fn subs(&self, phrase: PhraseId) -> &[PhraseId] {
        &self.slots[phrase.0 as usize].subs
    }

    pub fn suffixes(&self, phrase: PhraseId) -> &[PhraseId] {
        &self.slots[phrase.0 as usize].suffixes
    }

    /// The phrase's label; the root reports `"root"`.
    pub fn label(&self, phrase: PhraseId) -> &str {
        match &self.slots[phrase.0 as usize].rules {
            Some(rules) => rules.label(),
            None => "root",
        }
    }

    pub(crate) fn rules(&self, phrase: PhraseId) -> &dyn Phrase {
        self.slots[phrase.0 as usize]
            .rules
            .as_deref()
            .expect("the root phrase has no hooks")
    }

    /// Parses `text`, splitting it into rows on line terminators (which
    /// stay attached to their row), and returns the committed tree.
    pub fn parse_string(&self, text: &str) -> Result<SyntaxTree, ParseError> {
        self.parse_rows(text.split_inclusive('\n'))
    }

    /// Parses caller-defined rows as-is. Rows are not required to be
    /// lines; the engine neither interprets nor appends terminators.
    pub fn parse_rows<I, S>(&self, rows: I) -> Result<SyntaxTree, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rows: Vec<Box<str>> = rows.into_iter().map(|r| r.as_ref().into()).collect();
        Driver::new(self, rows).run()
    }
}
