//! Phrase definitions for a simplified Python-flavoured syntax: string
//! literals (with `f`/`b`/`r` prefixes, escape masking and f-string
//! format content), numbers, typed words, bracket pairs, comments with
//! debug anchors, attribute/call suffix chains, and indentation-closed
//! decorator/function/class definitions with a shared signature phrase.

use once_cell::sync::Lazy;
use phraselex::{
    Candidate, Grammar, Phrase, PhraseId, Stream, TokenClass, TokenizeContext, TokenizeStream,
};
use regex::Regex;

static QUOTE_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)([frbu]{0,2})('''|"""|'|")"#).expect("static"));
static ESCAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\.").expect("static"));
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("static"));
static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.?\d[\d_.e+-]*j?").expect("static"));
static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"#.*").expect("static"));
static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\s*)\.(\s*\w+)").expect("static"));
static DECORATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"@(\w+)").expect("static"));
static RETURN_HINT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*->\s*").expect("static"));
static COLON_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*:").expect("static"));

const KEYWORDS: &[&str] = &["not", "is"];

/// Quote-delimited string. A prefix switches the node to the matching
/// variant phrase (`f` before `b` before `r`; a bare `u` stays plain);
/// the close quote is remembered through node extras, so triple quotes
/// work the same way as single ones.
pub struct StringPhrase {
    label: &'static str,
    content_label: &'static str,
    fstring: Option<PhraseId>,
    bstring: Option<PhraseId>,
    rstring: Option<PhraseId>,
}

impl StringPhrase {
    pub fn new(label: &'static str, content_label: &'static str) -> Self {
        Self {
            label,
            content_label,
            fstring: None,
            bstring: None,
            rstring: None,
        }
    }

    /// Wires the prefix-switch targets; only the plain instance needs
    /// them.
    pub fn with_variants(mut self, fstring: PhraseId, bstring: PhraseId, rstring: PhraseId) -> Self {
        self.fstring = Some(fstring);
        self.bstring = Some(bstring);
        self.rstring = Some(rstring);
        self
    }
}

impl Phrase for StringPhrase {
    fn label(&self) -> &str {
        self.label
    }

    fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
        let m = QUOTE_START.captures(stream.unparsed())?;
        let whole = m.get(0).expect("group 0 always matches");
        let quote = m.get(2).expect("quote group is not optional").as_str();
        let prefix = m
            .get(1)
            .map(|p| p.as_str().to_ascii_lowercase())
            .unwrap_or_default();
        let mut candidate = Candidate::node(whole.start(), whole.end())
            .label("string-quotes")
            .extra("quotes", quote);
        let target = if prefix.contains('f') {
            self.fstring
        } else if prefix.contains('b') {
            self.bstring
        } else if prefix.contains('r') {
            self.rstring
        } else {
            None
        };
        if let Some(target) = target {
            candidate = candidate.switch_phrase(target);
        }
        Some(candidate)
    }

    fn ends(&self, stream: &Stream<'_>) -> Option<Candidate> {
        let quote = stream.node().extras().get_str("quotes")?;
        let at = stream.unparsed().find(quote)?;
        Some(Candidate::end(at, at + quote.len()).label("string-quotes"))
    }

    fn tokenize(&self, stream: &mut TokenizeStream<'_>) -> TokenClass {
        stream.eat_remain();
        TokenClass::labeled(self.content_label)
    }
}

/// Backslash escape inside strings. Matched as a mask, so the escaped
/// quote cannot close the string while the characters stay string
/// content.
pub struct EscapePhrase;

impl Phrase for EscapePhrase {
    fn label(&self) -> &str {
        "mask"
    }

    fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
        let m = ESCAPE.find(stream.unparsed())?;
        Some(Candidate::token(m.start(), m.end()).masked())
    }
}

/// `{…}` inside an f-string; its content re-enters the top-level
/// phrases.
pub struct FormatContentPhrase;

impl Phrase for FormatContentPhrase {
    fn label(&self) -> &str {
        "fstring-format-content"
    }

    fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
        let at = stream.unparsed().find('{')?;
        Some(Candidate::node(at, at + 1).label("fstring-format-content-open"))
    }

    fn ends(&self, stream: &Stream<'_>) -> Option<Candidate> {
        let at = stream.unparsed().find('}')?;
        Some(Candidate::end(at, at + 1).label("fstring-format-content-close"))
    }
}

/// `{{` inside an f-string: an escaped brace, not a format field. Being
/// longer than the format-content match at the same position, it wins.
pub struct FormatEscPhrase;

impl Phrase for FormatEscPhrase {
    fn label(&self) -> &str {
        "fstring-format-esc"
    }

    fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
        let at = stream.unparsed().find("{{")?;
        Some(Candidate::node(at, at + 2).label("fstring-format-esc"))
    }

    fn ends(&self, _stream: &Stream<'_>) -> Option<Candidate> {
        Some(Candidate::instant_end())
    }
}

/// Numeric literal: underscores, decimal point, exponent, imaginary
/// suffix. Plain integers tie with the word phrase and deliberately lose
/// to it; this phrase carries the forms `\w+` cannot span.
pub struct NumberPhrase;

impl Phrase for NumberPhrase {
    fn label(&self) -> &str {
        "number"
    }

    fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
        let m = NUMBER.find(stream.unparsed())?;
        Some(Candidate::node(m.start(), m.end()).rtokenize(m.end() - m.start()))
    }

    fn ends(&self, _stream: &Stream<'_>) -> Option<Candidate> {
        Some(Candidate::instant_end())
    }

    fn tokenize(&self, stream: &mut TokenizeStream<'_>) -> TokenClass {
        stream.eat_remain();
        TokenClass::labeled("number")
    }
}

/// `\w+` run, opened as an empty node and typed through the tokenizer.
pub struct WordPhrase;

impl Phrase for WordPhrase {
    fn label(&self) -> &str {
        "word"
    }

    fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
        let m = WORD.find(stream.unparsed())?;
        Some(
            Candidate::node(m.start(), m.end())
                .label("word")
                .rtokenize(m.end() - m.start()),
        )
    }

    fn ends(&self, _stream: &Stream<'_>) -> Option<Candidate> {
        // A word carries no further content; close right after the start
        // processing.
        Some(Candidate::instant_end())
    }

    fn tokenize(&self, stream: &mut TokenizeStream<'_>) -> TokenClass {
        let run = stream.eat_remain();
        if KEYWORDS.contains(&run) {
            TokenClass::labeled("keyword")
        } else if run.chars().all(|c| c.is_ascii_digit()) {
            TokenClass::labeled("number")
        } else {
            TokenClass::labeled("variable")
        }
    }
}

/// `[`, `(` or `{` with the matching close remembered through extras;
/// nests through its sub-phrase table.
pub struct BracketPhrase;

impl Phrase for BracketPhrase {
    fn label(&self) -> &str {
        "bracket"
    }

    fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
        let at = stream.unparsed().find(['[', '(', '{'])?;
        let close = match &stream.unparsed()[at..at + 1] {
            "[" => "]",
            "(" => ")",
            _ => "}",
        };
        Some(
            Candidate::node(at, at + 1)
                .label("bracket")
                .extra("close", close),
        )
    }

    fn ends(&self, stream: &Stream<'_>) -> Option<Candidate> {
        let close = stream.node().extras().get_str("close")?;
        let at = stream.unparsed().find(close)?;
        Some(Candidate::end(at, at + close.len()).label("bracket"))
    }
}

/// `#` to end of row. The tokenizer splits `$name` debug anchors out of
/// the ordinary comment text.
pub struct CommentPhrase;

impl Phrase for CommentPhrase {
    fn label(&self) -> &str {
        "comment"
    }

    fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
        let m = COMMENT.find(stream.unparsed())?;
        Some(
            Candidate::node(m.start(), m.end())
                .label("comment")
                .rtokenize(m.end() - m.start() - 1),
        )
    }

    fn ends(&self, _stream: &Stream<'_>) -> Option<Candidate> {
        Some(Candidate::instant_end())
    }

    fn tokenize(&self, stream: &mut TokenizeStream<'_>) -> TokenClass {
        if stream.unparsed().starts_with('$') {
            stream.eat(1);
            stream.eat_while(|c| c.is_alphanumeric() || c == '_');
            TokenClass::labeled("comment-debug-anchor")
        } else {
            match stream.unparsed().find('$') {
                Some(i) => {
                    stream.eat(i);
                }
                None => {
                    stream.eat_remain();
                }
            }
            TokenClass::labeled("comment-content")
        }
    }
}

/// `[…]` chained directly behind a closed string.
pub struct SubscriptPhrase;

impl Phrase for SubscriptPhrase {
    fn label(&self) -> &str {
        "subscript"
    }

    fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
        let at = stream.unparsed().find('[')?;
        Some(Candidate::node(at, at + 1).label("subscript-open"))
    }

    fn ends(&self, stream: &Stream<'_>) -> Option<Candidate> {
        let at = stream.unparsed().find(']')?;
        Some(Candidate::end(at, at + 1).label("subscript-close"))
    }
}

/// `.name` access chained behind words and calls. Leading whitespace is
/// stripped into the parent; the name is typed through the tokenizer.
pub struct AttributePhrase;

impl Phrase for AttributePhrase {
    fn label(&self) -> &str {
        "attribute"
    }

    fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
        let m = ATTRIBUTE.captures(stream.unparsed())?;
        let whole = m.get(0).expect("group 0 always matches");
        let lead = m.get(1).map_or(0, |g| g.len());
        let name = m.get(2).expect("name group is not optional").len();
        let mut candidate = Candidate::node(whole.start(), whole.end()).rtokenize(name);
        if lead > 0 {
            candidate = candidate.lstrip(lead);
        }
        Some(candidate)
    }

    fn ends(&self, _stream: &Stream<'_>) -> Option<Candidate> {
        Some(Candidate::instant_end())
    }

    fn tokenize(&self, stream: &mut TokenizeStream<'_>) -> TokenClass {
        stream.eat_remain();
        TokenClass::labeled("attribute")
    }
}

/// `(…)` chained directly behind a word or attribute: an argument list.
pub struct CallPhrase;

impl Phrase for CallPhrase {
    fn label(&self) -> &str {
        "call"
    }

    fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
        let at = stream.unparsed().find('(')?;
        Some(Candidate::node(at, at + 1))
    }

    fn ends(&self, stream: &Stream<'_>) -> Option<Candidate> {
        let at = stream.unparsed().find(')')?;
        Some(Candidate::end(at, at + 1))
    }
}

/// The parenthesized part of a `def`/`class` head, reached only through
/// the definition's forward. Opens a zero-width parameter-list marker
/// inside itself and closes at `:`.
pub struct ConstructorPhrase {
    inner: PhraseId,
}

impl ConstructorPhrase {
    pub fn new(inner: PhraseId) -> Self {
        Self { inner }
    }
}

impl Phrase for ConstructorPhrase {
    fn label(&self) -> &str {
        "constructor"
    }

    fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
        let at = stream.unparsed().find('(')?;
        Some(
            Candidate::node(at, at + 1)
                .label("constructor-start")
                .forward_to(self.inner),
        )
    }

    fn ends(&self, stream: &Stream<'_>) -> Option<Candidate> {
        let m = COLON_END.find(stream.unparsed())?;
        Some(Candidate::end(m.start(), m.end()).label("constructor-end"))
    }
}

/// Zero-width marker holding the parameter list; closes at `)`.
pub struct ConstructorInnerPhrase;

impl Phrase for ConstructorInnerPhrase {
    fn label(&self) -> &str {
        "constructor-inner"
    }

    fn starts(&self, _stream: &Stream<'_>) -> Option<Candidate> {
        Some(Candidate::node(0, 0))
    }

    fn ends(&self, stream: &Stream<'_>) -> Option<Candidate> {
        let at = stream.unparsed().find(')')?;
        Some(Candidate::end(at, at + 1).label("constructor-close"))
    }
}

/// `-> hint` between a parameter list and the closing colon.
pub struct ReturnHintPhrase;

impl Phrase for ReturnHintPhrase {
    fn label(&self) -> &str {
        "constructor-return-hint"
    }

    fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
        let m = RETURN_HINT.find(stream.unparsed())?;
        Some(Candidate::node(m.start(), m.end()).label("constructor-return-hint"))
    }

    fn ends(&self, stream: &Stream<'_>) -> Option<Candidate> {
        let at = stream.unparsed().find(':')?;
        Some(Candidate::end(at, at + 1))
    }
}

/// `@name` at a row start; closed by the next `class`/`def`/`@` row and
/// chained into the decorated definition through suffixes.
pub struct DecoratorPhrase;

impl Phrase for DecoratorPhrase {
    fn label(&self) -> &str {
        "decorator"
    }

    fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
        if stream.column() != 0 {
            return None;
        }
        let m = DECORATOR.captures(stream.unparsed())?;
        let whole = m.get(0).expect("group 0 always matches");
        let name = m.get(1).expect("name group is not optional").len();
        Some(
            Candidate::node(whole.start(), whole.end())
                .label("decorator-operator")
                .rtokenize(name),
        )
    }

    fn ends(&self, stream: &Stream<'_>) -> Option<Candidate> {
        if stream.column() != 0 {
            return None;
        }
        let head = stream.row().trim_start();
        if head.starts_with("class") || head.starts_with("def") || head.starts_with('@') {
            return Some(Candidate::instant_end());
        }
        None
    }

    fn tokenize(&self, stream: &mut TokenizeStream<'_>) -> TokenClass {
        stream.eat_remain();
        if stream.context() == TokenizeContext::RTokenize {
            TokenClass::labeled("decorator-name")
        } else {
            TokenClass::untyped()
        }
    }
}

/// A `def` or `class` head at a row start: keyword node, typed name,
/// forward into the constructor, and an instant close when a
/// non-deeper-indented row begins.
pub struct DefinitionPhrase {
    label: &'static str,
    name_label: &'static str,
    head: Regex,
    constructor: PhraseId,
}

impl DefinitionPhrase {
    pub fn new(
        label: &'static str,
        keyword: &'static str,
        name_label: &'static str,
        constructor: PhraseId,
    ) -> Self {
        let head = Regex::new(&format!(r"^(\s*)({keyword}\s+)(\w+\s*)")).expect("static");
        Self {
            label,
            name_label,
            head,
            constructor,
        }
    }
}

impl Phrase for DefinitionPhrase {
    fn label(&self) -> &str {
        self.label
    }

    fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
        if stream.column() != 0 {
            return None;
        }
        let m = self.head.captures(stream.row())?;
        let whole = m.get(0).expect("group 0 always matches");
        let indent = m.get(1).map_or(0, |g| g.len());
        let name = m.get(3).expect("name group is not optional").len();
        Some(
            Candidate::node(0, whole.end())
                .label(self.label)
                .rtokenize(name)
                .forward_to(self.constructor)
                .extra("indent", indent as i64),
        )
    }

    fn ends(&self, stream: &Stream<'_>) -> Option<Candidate> {
        if stream.column() != 0 {
            return None;
        }
        let indent = stream
            .node()
            .extras()
            .get("indent")
            .and_then(|v| v.as_int())?;
        let row = stream.row();
        let leading = row.len() - row.trim_start_matches(' ').len();
        let rest = &row[leading..];
        if !rest.is_empty() && !rest.starts_with('\n') && (leading as i64) <= indent {
            return Some(Candidate::instant_end());
        }
        None
    }

    fn tokenize(&self, stream: &mut TokenizeStream<'_>) -> TokenClass {
        stream.eat_remain();
        if stream.context() == TokenizeContext::RTokenize {
            TokenClass::labeled(self.name_label)
        } else {
            TokenClass::untyped()
        }
    }
}

/// The wired-up configuration with handles to every phrase.
pub struct PySyntax {
    pub grammar: Grammar,
    pub string: PhraseId,
    pub fstring: PhraseId,
    pub bstring: PhraseId,
    pub rstring: PhraseId,
    pub format_content: PhraseId,
    pub format_esc: PhraseId,
    pub escape: PhraseId,
    pub number: PhraseId,
    pub word: PhraseId,
    pub bracket: PhraseId,
    pub comment: PhraseId,
    pub subscript: PhraseId,
    pub attribute: PhraseId,
    pub call: PhraseId,
    pub constructor: PhraseId,
    pub constructor_inner: PhraseId,
    pub return_hint: PhraseId,
    pub decorator: PhraseId,
    pub function: PhraseId,
    pub class_def: PhraseId,
}

/// Builds the Python-flavoured grammar: comments, strings, numbers,
/// words and brackets at the top level; escape masking and format
/// content inside strings; attribute/call chains behind words; a
/// subscript suffix behind strings; and decorator/function/class
/// definitions sharing the constructor phrase.
pub fn python_grammar() -> PySyntax {
    let mut grammar = Grammar::new();
    let escape = grammar.add(EscapePhrase);
    let format_content = grammar.add(FormatContentPhrase);
    let format_esc = grammar.add(FormatEscPhrase);
    let fstring = grammar.add(StringPhrase::new("fstring", "string-content"));
    let bstring = grammar.add(StringPhrase::new("bstring", "bstring-content"));
    let rstring = grammar.add(StringPhrase::new("rstring", "string-content"));
    let string = grammar.add(
        StringPhrase::new("string", "string-content").with_variants(fstring, bstring, rstring),
    );
    let number = grammar.add(NumberPhrase);
    let word = grammar.add(WordPhrase);
    let bracket = grammar.add(BracketPhrase);
    let comment = grammar.add(CommentPhrase);
    let subscript = grammar.add(SubscriptPhrase);
    let attribute = grammar.add(AttributePhrase);
    let call = grammar.add(CallPhrase);
    let constructor_inner = grammar.add(ConstructorInnerPhrase);
    let return_hint = grammar.add(ReturnHintPhrase);
    let constructor = grammar.add(ConstructorPhrase::new(constructor_inner));
    let decorator = grammar.add(DecoratorPhrase);
    let function = grammar.add(DefinitionPhrase::new(
        "function",
        "def",
        "function-name",
        constructor,
    ));
    let class_def = grammar.add(DefinitionPhrase::new(
        "class",
        "class",
        "class-name",
        constructor,
    ));

    // The string family shares the escape mask; the f-string adds the
    // format phrases.
    for phrase in [string, fstring, bstring, rstring] {
        grammar.add_sub(phrase, escape);
    }
    grammar.add_subs(fstring, &[format_esc, format_content]);

    // Word comes before number so a plain integer, which both match with
    // equal spans, stays a word run; the number phrase wins whenever the
    // literal extends beyond `\w+`.
    let prime = [comment, string, word, number, bracket];
    grammar.add_subs(Grammar::ROOT, &prime);
    grammar.add_subs(Grammar::ROOT, &[class_def, function, decorator]);

    grammar.add_suffixes(decorator, &[decorator, function, class_def]);
    grammar.add_subs(decorator, &[call, attribute, comment]);

    // Definition bodies and format content re-enter the top level.
    let top = grammar.subs(Grammar::ROOT).to_vec();
    grammar.add_subs(function, &top);
    grammar.add_subs(class_def, &top);
    grammar.add_subs(format_content, &top);

    grammar.add_subs(bracket, &prime);
    grammar.add_subs(call, &prime);
    grammar.add_suffix(call, attribute);
    grammar.add_suffix(attribute, call);
    grammar.add_suffixes(word, &[attribute, call]);
    grammar.add_suffix(string, subscript);
    grammar.add_suffix(fstring, subscript);

    grammar.add_sub(constructor, return_hint);
    grammar.add_subs(constructor_inner, &prime);
    grammar.add_subs(return_hint, &prime);

    PySyntax {
        grammar,
        string,
        fstring,
        bstring,
        rstring,
        format_content,
        format_esc,
        escape,
        number,
        word,
        bracket,
        comment,
        subscript,
        attribute,
        call,
        constructor,
        constructor_inner,
        return_hint,
        decorator,
        function,
        class_def,
    }
}
