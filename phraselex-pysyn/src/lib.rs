//! A worked `phraselex` configuration: a simplified Python-flavoured
//! syntax with strings (plain, raw, byte and f-strings), escape masking,
//! numbers, typed words, bracket pairs, comments with debug anchors,
//! attribute/call suffix chains, string subscripts, and
//! indentation-closed decorator/function/class definitions.
//!
//! ```
//! use phraselex_pysyn::python_grammar;
//!
//! let syntax = python_grammar();
//! let tree = syntax.grammar.parse_string("foo = 42\n").unwrap();
//! assert_eq!(tree.content(), "foo = 42\n");
//! ```

pub mod phrases;

pub use crate::phrases::{
    python_grammar, AttributePhrase, BracketPhrase, CallPhrase, CommentPhrase,
    ConstructorInnerPhrase, ConstructorPhrase, DecoratorPhrase, DefinitionPhrase, EscapePhrase,
    FormatContentPhrase, FormatEscPhrase, NumberPhrase, PySyntax, ReturnHintPhrase, StringPhrase,
    SubscriptPhrase, WordPhrase,
};
