//! A generic, user-configurable syntax parsing engine.
//!
//! The caller supplies *phrase* definitions (objects describing how a
//! lexical construct begins, what can appear inside it, and how it ends)
//! wired into a [`Grammar`]. The engine drives those definitions over an
//! input row by row and produces a [`SyntaxTree`] of tokens and nodes
//! annotated with source coordinates, covering the input exactly.
//!
//! The engine itself has no built-in grammar: it never recognizes
//! comments, strings or numbers on its own. It arbitrates the candidates
//! returned by phrase hooks by a strict priority scheme, maintains the
//! stack of open nodes, applies candidate features (phrase switching,
//! re-tokenization, forwarding, stripping), fills un-tokenized gaps, and
//! guarantees termination on every finite input and well-formed
//! configuration.
//!
//! ```
//! use phraselex::{Candidate, Grammar, Phrase, Stream};
//!
//! struct Quoted;
//!
//! impl Phrase for Quoted {
//!     fn label(&self) -> &str {
//!         "quoted"
//!     }
//!
//!     fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
//!         let at = stream.unparsed().find('\'')?;
//!         Some(Candidate::node(at, at + 1))
//!     }
//!
//!     fn ends(&self, stream: &Stream<'_>) -> Option<Candidate> {
//!         let at = stream.unparsed().find('\'')?;
//!         Some(Candidate::end(at, at + 1))
//!     }
//! }
//!
//! let mut grammar = Grammar::new();
//! let quoted = grammar.add(Quoted);
//! grammar.add_sub(Grammar::ROOT, quoted);
//!
//! let tree = grammar.parse_string("say 'hi' now").unwrap();
//! assert_eq!(tree.content(), "say 'hi' now");
//! let node = tree.root().child(1).unwrap();
//! assert!(node.is_node());
//! assert_eq!(node.reader().inner().content(), "hi");
//! ```

mod coords;
mod error;
mod feature;
mod index;
mod parser;
mod phrase;
mod reader;
mod stream;
mod token;
mod tree;

pub use crate::coords::Coord;
pub use crate::error::ParseError;
pub use crate::feature::Feature;
pub use crate::index::RowInfo;
pub use crate::phrase::{Grammar, Phrase, PhraseId, TokenCtx};
pub use crate::reader::{NodePath, TokenReader, Tokens};
pub use crate::stream::{Stream, TokenizeContext, TokenizeStream};
pub use crate::token::{Candidate, ExtraValue, Extras, Shape, TokenClass, TokenId, TokenKind};
pub use crate::tree::{SyntaxTree, TokenRef};
