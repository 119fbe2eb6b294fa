//! The parse driver: row loop, candidate arbitration, node stack,
//! feature application, masking and gap filling.
//!
//! One iteration asks the active phrase for an end candidate and every
//! sub-phrase for a start candidate, arbitrates, commits the winner and
//! applies its features. Un-tokenized spans in front of a winner and at
//! row ends are attributed to the active node through its tokenizer, so
//! the committed tree always covers the input exactly.

use crate::error::ParseError;
use crate::feature::Feature;
use crate::phrase::{Grammar, PhraseId, TokenCtx};
use crate::stream::{Stream, TokenizeContext, TokenizeStream};
use crate::token::{Candidate, Extras, Shape, TokenData, TokenId, TokenKind};
use crate::tree::{SyntaxTree, TokenRef, ROOT_TOKEN};

pub(crate) struct Driver<'g> {
    grammar: &'g Grammar,
    tree: SyntaxTree,
    /// Index of the current row.
    row_no: usize,
    /// Viewpoint into the current row; candidates are relative to it.
    viewpoint: usize,
    /// Data anchor for gap attribution. Trails the viewpoint only inside
    /// masking.
    position: usize,
    /// The active node; its behaviour phrase drives the iteration.
    node: TokenId,
    /// Suffix table of the most recently closed node, consulted once.
    pending_suffixes: Option<PhraseId>,
    exhausted: bool,
}

impl<'g> Driver<'g> {
    pub(crate) fn new(grammar: &'g Grammar, rows: Vec<Box<str>>) -> Self {
        let exhausted = rows.is_empty();
        Self {
            grammar,
            tree: SyntaxTree::new(rows),
            row_no: 0,
            viewpoint: 0,
            position: 0,
            node: ROOT_TOKEN,
            pending_suffixes: None,
            exhausted,
        }
    }

    pub(crate) fn run(mut self) -> Result<SyntaxTree, ParseError> {
        while !self.exhausted {
            let (row_no, viewpoint) = (self.row_no, self.viewpoint);
            if let Some((shape, phrase)) = self.iteration()? {
                // Node and standalone winners must advance the stream;
                // ends may be null since they pop the stack.
                if shape != Shape::End && self.row_no == row_no && self.viewpoint == viewpoint {
                    return Err(self.stalled(phrase));
                }
            }
        }
        log::trace!("input exhausted, closing {} open node(s)", {
            let mut n = 0;
            let mut id = self.node;
            while id != ROOT_TOKEN {
                n += 1;
                id = self.tree.data(id).parent;
            }
            n
        });
        self.tree.finalize(self.node);
        Ok(self.tree)
    }

    // ------------------------------------------------------------------
    // one iteration

    fn iteration(&mut self) -> Result<Option<(Shape, PhraseId)>, ParseError> {
        let mut end = self.collect_end()?;

        // Instant ends short-circuit everything, the suffix check included.
        if end.as_ref().is_some_and(|c| c.instant) {
            let c = end.take().expect("checked above");
            let phrase = c.phrase.expect("stamped at collection");
            self.commit_item(c)?;
            return Ok(Some((Shape::End, phrase)));
        }

        // Suffix phrases of a just-closed node get exactly one chance and
        // must continue immediately.
        if let Some(closed) = self.pending_suffixes.take() {
            let suffixes = self.grammar.suffixes(closed);
            if !suffixes.is_empty() {
                let (found, _) = self.search_phrases(suffixes)?;
                if let Some(c) = found {
                    if c.at == 0 {
                        let phrase = c.phrase.expect("stamped at collection");
                        let shape = self.commit_sub(c)?;
                        return Ok(Some((shape, phrase)));
                    }
                    log::trace!(
                        "suffix {:?} ignored, does not continue immediately",
                        self.grammar.label(c.phrase.expect("stamped at collection")),
                    );
                }
            }
        }

        let (sub, any_sub) = self.search_phrases(self.grammar.subs(self.active_behavior()))?;

        // A default end only participates if no sub-phrase proposed
        // anything at all in this pass.
        if end.as_ref().is_some_and(|c| c.default_end) && any_sub {
            end = None;
        }

        match (end, sub) {
            (end, Some(s)) => {
                // An instant start wins over any non-instant end.
                if !s.instant {
                    if let Some(e) = end {
                        if Self::end_beats(&e, &s) {
                            let phrase = e.phrase.expect("stamped at collection");
                            self.commit_item(e)?;
                            return Ok(Some((Shape::End, phrase)));
                        }
                    }
                }
                let phrase = s.phrase.expect("stamped at collection");
                let shape = self.commit_sub(s)?;
                Ok(Some((shape, phrase)))
            }
            (Some(e), None) => {
                let phrase = e.phrase.expect("stamped at collection");
                self.commit_item(e)?;
                Ok(Some((Shape::End, phrase)))
            }
            (None, None) => {
                self.flush_row()?;
                Ok(None)
            }
        }
    }

    // ------------------------------------------------------------------
    // candidate collection and arbitration

    fn collect_end(&self) -> Result<Option<Candidate>, ParseError> {
        if self.node == ROOT_TOKEN {
            return Ok(None);
        }
        self.call_ends(self.active_behavior())
    }

    fn call_ends(&self, phrase: PhraseId) -> Result<Option<Candidate>, ParseError> {
        let candidate = self.grammar.rules(phrase).ends(&self.stream());
        let Some(mut c) = candidate else {
            return Ok(None);
        };
        self.validate(&c, phrase, false)?;
        c.phrase = Some(phrase);
        log::trace!(
            "end candidate {}..{} from {:?}",
            c.at,
            c.to,
            self.grammar.label(phrase),
        );
        Ok(Some(c))
    }

    /// Collects one start candidate per phrase and arbitrates. The second
    /// result reports whether any phrase proposed anything, which is what
    /// default ends defer to.
    fn search_phrases(
        &self,
        phrases: &[PhraseId],
    ) -> Result<(Option<Candidate>, bool), ParseError> {
        let mut best: Option<Candidate> = None;
        let mut existed = false;
        for &phrase in phrases {
            let Some(mut c) = self.grammar.rules(phrase).starts(&self.stream()) else {
                continue;
            };
            self.validate(&c, phrase, true)?;
            c.phrase = Some(phrase);
            existed = true;
            log::trace!(
                "start candidate {}..{} from {:?}",
                c.at,
                c.to,
                self.grammar.label(phrase),
            );
            // A mask that consumes nothing can never re-attribute content.
            if c.mask && c.to == 0 {
                return Err(self.stalled(phrase));
            }
            if c.instant {
                // Remaining phrases are elided.
                return Ok((Some(c), true));
            }
            // A null non-end at the viewpoint can never advance the
            // stream; it is rejected outright unless a forward chain
            // takes over the advancement.
            if c.is_null() && c.at == 0 && c.features.forward().is_none() {
                log::trace!("rejected null candidate from {:?}", self.grammar.label(phrase));
                continue;
            }
            best = Some(match best.take() {
                None => c,
                Some(b) if Self::beats(&c, &b) => c,
                Some(b) => b,
            });
        }
        Ok((best, existed))
    }

    /// Does `a` strictly beat `b` among same-class candidates: closest to
    /// the viewpoint, then null preference, then longest span. Ties keep
    /// the incumbent.
    fn beats(a: &Candidate, b: &Candidate) -> bool {
        if a.at != b.at {
            return a.at < b.at;
        }
        match (a.is_null(), b.is_null()) {
            (true, false) => true,
            (false, true) => false,
            _ => a.span_len() > b.span_len(),
        }
    }

    /// End-versus-start arbitration: same rules, with the end preferred
    /// on a full tie.
    fn end_beats(end: &Candidate, start: &Candidate) -> bool {
        if end.at != start.at {
            return end.at < start.at;
        }
        match (end.is_null(), start.is_null()) {
            (true, _) => true,
            (false, true) => false,
            (false, false) => end.span_len() >= start.span_len(),
        }
    }

    fn validate(
        &self,
        c: &Candidate,
        phrase: PhraseId,
        from_starts: bool,
    ) -> Result<(), ParseError> {
        let len = self.unparsed_len();
        if c.at > c.to || c.to > len {
            return Err(ParseError::CandidateBounds {
                phrase: self.grammar.label(phrase).to_string(),
                at: c.at,
                to: c.to,
                len,
                row_no: self.row_no,
                column: self.viewpoint,
            });
        }
        let shape_error = |got, expected| ParseError::CandidateShape {
            phrase: self.grammar.label(phrase).to_string(),
            got,
            expected,
            row_no: self.row_no,
            column: self.viewpoint,
        };
        if from_starts && c.shape == Shape::End {
            return Err(shape_error("end", "a node or standalone"));
        }
        if !from_starts && c.shape != Shape::End {
            return Err(shape_error(c.shape.name(), "an end"));
        }
        if c.wrap.is_some() && c.shape != Shape::Node {
            return Err(shape_error(c.shape.name(), "a node (wrap)"));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // commits

    fn commit_sub(&mut self, c: Candidate) -> Result<Shape, ParseError> {
        if c.mask {
            return self.masking(c);
        }
        if c.wrap.is_some() {
            return self.commit_wrap(c);
        }
        let shape = c.shape;
        self.commit_item(c)?;
        Ok(shape)
    }

    /// Commits an arbitrated winner: gap fill, pre-commit features,
    /// structural link, hooks, post-commit features, forward chain.
    fn commit_item(&mut self, c: Candidate) -> Result<TokenId, ParseError> {
        let grammar = self.grammar;
        let shape = c.shape;
        let origin = c.phrase.expect("winners carry their phrase");
        let entry_node = self.node;
        let entry_behavior = self.active_behavior();
        let entry_stream = (self.row_no, self.viewpoint);

        // Attribute the span in front of the winner to the active node.
        if c.at > 0 {
            let gap_end = self.viewpoint + c.at;
            self.tokenize_span(entry_behavior, self.position, gap_end, TokenizeContext::Inner)?;
        }

        let token_viewpoint = self.viewpoint;
        let mut at = c.at;
        let mut to = c.to;
        self.carry(c.at);

        // Behaviour context the strip/rtokenize scopes run under, and the
        // pending phrase bindings of a node about to open.
        let mut ctx = match shape {
            Shape::Node => origin,
            _ => entry_behavior,
        };
        let mut node_identity = origin;
        let mut node_behavior = origin;

        for feature in c.features.pre_commit() {
            match feature {
                Feature::LStrip(n) => {
                    at += n;
                    self.tokenize_span(
                        ctx,
                        self.position,
                        token_viewpoint + at,
                        TokenizeContext::LStrip,
                    )?;
                    self.carry(n);
                }
                Feature::SwitchTo(ph) => {
                    ctx = ph;
                    match shape {
                        Shape::Node => node_behavior = ph,
                        _ => self.switch_node(entry_node, ph, false),
                    }
                }
                Feature::SwitchPh(ph) => {
                    ctx = ph;
                    match shape {
                        Shape::Node => {
                            node_behavior = ph;
                            node_identity = ph;
                        }
                        _ => self.switch_node(entry_node, ph, true),
                    }
                }
                Feature::RTokenize(_) | Feature::ForwardTo(_) => unreachable!(),
            }
        }

        to -= c.features.rtokenize_total();
        if at > to {
            return Err(ParseError::FeatureSpan {
                phrase: grammar.label(origin).to_string(),
                at,
                to,
                row_no: self.row_no,
                column: self.viewpoint,
            });
        }

        let data = TokenData {
            kind: match shape {
                Shape::Token => TokenKind::Plain,
                Shape::Node => TokenKind::Node,
                Shape::End => TokenKind::End,
            },
            label: c.label,
            phrase: match shape {
                Shape::Token => Some(origin),
                Shape::Node => Some(node_identity),
                Shape::End => None,
            },
            behavior: match shape {
                Shape::Node => Some(node_behavior),
                _ => None,
            },
            row_no: self.row_no,
            col_start: token_viewpoint + at,
            col_end: token_viewpoint + to,
            parent: ROOT_TOKEN, // fixed by the push below
            inner_index: 0,
            inner: Vec::new(),
            end: None,
            extras: c.extras,
        };
        let id = match shape {
            Shape::Token => self.tree.push_child(entry_node, data),
            Shape::Node => {
                let id = self.tree.push_child(entry_node, data);
                self.node = id;
                id
            }
            Shape::End => {
                let id = self.tree.push_end(entry_node, data);
                self.pending_suffixes = Some(self.active_behavior());
                self.node = self.tree.data(entry_node).parent;
                id
            }
        };
        self.carry(to - at);
        log::trace!(
            "committed {} {:?} from {:?}",
            shape.name(),
            self.tree.token(id),
            grammar.label(origin),
        );

        let hook_phrase = match shape {
            Shape::Token => origin,
            Shape::Node => node_behavior,
            Shape::End => ctx,
        };
        grammar.rules(hook_phrase).at_confirmed(&mut TokenCtx {
            tree: &mut self.tree,
            token: id,
        });

        for feature in c.features.post_commit() {
            match feature {
                Feature::RTokenize(n) => {
                    let end_col = self.viewpoint + n;
                    self.tokenize_span(ctx, self.viewpoint, end_col, TokenizeContext::RTokenize)?;
                    self.carry(n);
                }
                Feature::SwitchTo(ph) => {
                    ctx = ph;
                    let target = if shape == Shape::Node { id } else { entry_node };
                    self.switch_node(target, ph, false);
                }
                Feature::SwitchPh(ph) => {
                    ctx = ph;
                    let target = if shape == Shape::Node { id } else { entry_node };
                    self.switch_node(target, ph, true);
                }
                Feature::LStrip(_) | Feature::ForwardTo(_) => unreachable!(),
            }
        }

        if let Some(forward) = c.features.forward() {
            if let Some(mut fc) = {
                let found = grammar.rules(forward).starts(&self.stream());
                if let Some(c) = &found {
                    self.validate(c, forward, true)?;
                }
                found
            } {
                fc.phrase = Some(forward);
                log::trace!("forwarding to {:?}", grammar.label(forward));
                self.commit_sub(fc)?;
            }
            // The token and its forwarding chain must advance together.
            // Non-end winners are checked by the outer loop; an end alone
            // may be null (it pops the stack), so an end that forwards is
            // checked here.
            if shape == Shape::End && (self.row_no, self.viewpoint) == entry_stream {
                return Err(self.stalled(forward));
            }
        }

        grammar.rules(hook_phrase).at_featurized(&mut TokenCtx {
            tree: &mut self.tree,
            token: id,
        });

        match shape {
            Shape::Node => {
                let behavior = self.tree.data(id).behavior.expect("nodes carry a behavior");
                grammar.rules(behavior).at_start(&mut TokenCtx {
                    tree: &mut self.tree,
                    token: id,
                });
            }
            Shape::End => {
                let behavior = self
                    .tree
                    .data(entry_node)
                    .behavior
                    .expect("nodes carry a behavior");
                grammar.rules(behavior).at_end(&mut TokenCtx {
                    tree: &mut self.tree,
                    token: entry_node,
                });
            }
            Shape::Token => {}
        }

        Ok(id)
    }

    /// A wrap winner opens an empty shell node of the matching phrase at
    /// the match start; the wrapped node takes the candidate's span and
    /// becomes the active node inside it.
    fn commit_wrap(&mut self, c: Candidate) -> Result<Shape, ParseError> {
        let wrapped = c.wrap.expect("checked by the caller");
        let origin = c.phrase.expect("winners carry their phrase");
        if c.at > 0 {
            let gap_end = self.viewpoint + c.at;
            self.tokenize_span(
                self.active_behavior(),
                self.position,
                gap_end,
                TokenizeContext::Inner,
            )?;
        }
        self.carry(c.at);

        let shell_data = TokenData {
            kind: TokenKind::Node,
            label: None,
            phrase: Some(origin),
            behavior: Some(origin),
            row_no: self.row_no,
            col_start: self.viewpoint,
            col_end: self.viewpoint,
            parent: ROOT_TOKEN,
            inner_index: 0,
            inner: Vec::new(),
            end: None,
            extras: Extras::default(),
        };
        let shell = self.tree.push_child(self.node, shell_data);
        self.node = shell;
        log::trace!("opened wrap shell {:?}", self.grammar.label(origin));
        let grammar = self.grammar;
        grammar.rules(origin).at_confirmed(&mut TokenCtx {
            tree: &mut self.tree,
            token: shell,
        });
        grammar.rules(origin).at_start(&mut TokenCtx {
            tree: &mut self.tree,
            token: shell,
        });

        let mut inner = Candidate::node(0, c.to - c.at);
        inner.label = c.label;
        inner.features = c.features;
        inner.extras = c.extras;
        inner.phrase = Some(wrapped);
        self.commit_item(inner)?;
        Ok(Shape::Node)
    }

    // ------------------------------------------------------------------
    // masking

    /// A mask winner is consumed without being committed: the viewpoint
    /// runs past it (and past the mask node's end, across rows if need
    /// be), scanning resumes until a non-mask winner or row end, and the
    /// whole region is re-attributed to the active node. The winner that
    /// terminated the scan is rediscovered by the next iteration.
    fn masking(&mut self, mask: Candidate) -> Result<Shape, ParseError> {
        let shape = mask.shape;
        let phrase = mask.phrase.expect("winners carry their phrase");
        log::trace!(
            "masking {}..{} from {:?}",
            mask.at,
            mask.to,
            self.grammar.label(phrase),
        );
        if let Some(stop_at) = self.mask_item(mask)? {
            let end_col = self.viewpoint + stop_at;
            if end_col > self.position {
                self.tokenize_span(
                    self.active_behavior(),
                    self.position,
                    end_col,
                    TokenizeContext::Inner,
                )?;
            }
            self.viewpoint = end_col;
            self.position = end_col;
        }
        Ok(shape)
    }

    /// Consumes one mask match. Returns the relative position of the next
    /// non-mask winner, or `None` when the input ran out.
    fn mask_item(&mut self, mask: Candidate) -> Result<Option<usize>, ParseError> {
        self.viewpoint += mask.to;
        if self.viewpoint >= self.row_len() {
            self.flush_row()?;
            if self.exhausted {
                return Ok(None);
            }
        }
        if mask.shape == Shape::Node {
            let phrase = mask.phrase.expect("winners carry their phrase");
            loop {
                match self.call_ends(phrase)? {
                    Some(end) => {
                        self.viewpoint += end.to;
                        break;
                    }
                    None => {
                        self.flush_row()?;
                        if self.exhausted {
                            return Ok(None);
                        }
                    }
                }
            }
        }
        self.mask_continue()
    }

    /// Scans past a consumed mask for the token that delimits the masked
    /// region, swallowing further masks on the way.
    fn mask_continue(&mut self) -> Result<Option<usize>, ParseError> {
        loop {
            let mut end = self.collect_end()?;
            if end.as_ref().is_some_and(|c| c.instant) {
                return Ok(Some(end.expect("checked above").at));
            }
            let (sub, any_sub) =
                self.search_phrases(self.grammar.subs(self.active_behavior()))?;
            if end.as_ref().is_some_and(|c| c.default_end) && any_sub {
                end = None;
            }
            match (end, sub) {
                (end, Some(s)) => {
                    if let Some(e) = end {
                        if Self::end_beats(&e, &s) {
                            return Ok(Some(e.at));
                        }
                    }
                    if !s.mask {
                        return Ok(Some(s.at));
                    }
                    return self.mask_item(s);
                }
                (Some(e), None) => return Ok(Some(e.at)),
                (None, None) => {
                    self.flush_row()?;
                    if self.exhausted {
                        return Ok(None);
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // gap filling and stream state

    /// Attributes `[start_col, end_col)` of the current row to the active
    /// node, through `phrase`'s tokenizer. The root context produces
    /// untyped outer tokens.
    fn tokenize_span(
        &mut self,
        phrase: PhraseId,
        start_col: usize,
        end_col: usize,
        context: TokenizeContext,
    ) -> Result<(), ParseError> {
        debug_assert!(start_col <= end_col && end_col <= self.row_len());
        let grammar = self.grammar;
        let row_no = self.row_no;
        let mut pieces = Vec::new();
        {
            let row: &str = &self.tree.rows[row_no];
            let designated = &row[start_col..end_col];
            if phrase == Grammar::ROOT {
                if !designated.is_empty() {
                    pieces.push((0, designated.len(), None));
                }
            } else {
                let rules = grammar.rules(phrase);
                let mut ts = TokenizeStream::new(designated, context);
                while ts.remaining() > 0 {
                    let mark = ts.cursor();
                    let class = rules.tokenize(&mut ts);
                    if ts.cursor() == mark {
                        return Err(ParseError::TokenizerStalled {
                            phrase: grammar.label(phrase).to_string(),
                            row_no,
                            column: start_col + mark,
                            unparsed: ts.unparsed().to_string(),
                        });
                    }
                    pieces.push((mark, ts.cursor(), class.label));
                }
            }
        }
        for (from, to, label) in pieces {
            let kind = if phrase == Grammar::ROOT {
                TokenKind::Outer
            } else {
                TokenKind::Plain
            };
            let data = TokenData {
                kind,
                label,
                phrase: None,
                behavior: None,
                row_no,
                col_start: start_col + from,
                col_end: start_col + to,
                parent: ROOT_TOKEN,
                inner_index: 0,
                inner: Vec::new(),
                end: None,
                extras: Extras::default(),
            };
            let id = self.tree.push_child(self.node, data);
            if phrase != Grammar::ROOT {
                grammar.rules(phrase).at_confirmed(&mut TokenCtx {
                    tree: &mut self.tree,
                    token: id,
                });
            }
        }
        Ok(())
    }

    /// Attributes the row remainder to the active node and moves on.
    fn flush_row(&mut self) -> Result<(), ParseError> {
        let len = self.row_len();
        if len > self.position {
            self.tokenize_span(self.active_behavior(), self.position, len, TokenizeContext::Inner)?;
        }
        self.next_row();
        Ok(())
    }

    fn next_row(&mut self) {
        self.row_no += 1;
        self.viewpoint = 0;
        self.position = 0;
        if self.row_no >= self.tree.rows.len() {
            self.exhausted = true;
        } else {
            log::trace!("row {}: {:?}", self.row_no, &self.tree.rows[self.row_no]);
        }
    }

    /// Advances viewpoint and data anchor together.
    fn carry(&mut self, n: usize) {
        self.viewpoint += n;
        self.position = self.viewpoint;
    }

    fn switch_node(&mut self, node: TokenId, phrase: PhraseId, identity: bool) {
        let data = self.tree.data_mut(node);
        data.behavior = Some(phrase);
        if identity {
            data.phrase = Some(phrase);
        }
    }

    fn active_behavior(&self) -> PhraseId {
        self.tree
            .data(self.node)
            .behavior
            .expect("nodes carry a behavior")
    }

    fn row_len(&self) -> usize {
        self.tree.rows[self.row_no].len()
    }

    fn unparsed_len(&self) -> usize {
        self.row_len() - self.viewpoint
    }

    fn stream(&self) -> Stream<'_> {
        Stream {
            tree: &self.tree,
            row: &self.tree.rows[self.row_no],
            row_no: self.row_no,
            viewpoint: self.viewpoint,
            node: self.node,
            phrase: self.active_behavior(),
        }
    }

    fn stalled(&self, phrase: PhraseId) -> ParseError {
        ParseError::Stalled {
            phrase: self.grammar.label(phrase).to_string(),
            row_no: self.row_no,
            column: self.viewpoint,
            unparsed: self
                .tree
                .rows
                .get(self.row_no)
                .map(|r| r[self.viewpoint..].to_string())
                .unwrap_or_default(),
        }
    }
}

impl std::fmt::Debug for Driver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("row_no", &self.row_no)
            .field("viewpoint", &self.viewpoint)
            .field(
                "node",
                &TokenRef {
                    tree: &self.tree,
                    id: self.node,
                },
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        Candidate, Grammar, ParseError, Phrase, PhraseId, Stream, SyntaxTree, TokenClass,
        TokenKind, TokenizeStream,
    };

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// Opens on `open`, closes on `close`.
    struct Delim {
        label: &'static str,
        open: &'static str,
        close: &'static str,
    }

    impl Phrase for Delim {
        fn label(&self) -> &str {
            self.label
        }

        fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
            let at = stream.unparsed().find(self.open)?;
            Some(Candidate::node(at, at + self.open.len()).label(self.label))
        }

        fn ends(&self, stream: &Stream<'_>) -> Option<Candidate> {
            let at = stream.unparsed().find(self.close)?;
            Some(Candidate::end(at, at + self.close.len()).label(self.label))
        }
    }

    /// A standalone literal token.
    struct Lit {
        label: &'static str,
        pat: &'static str,
    }

    impl Phrase for Lit {
        fn label(&self) -> &str {
            self.label
        }

        fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
            let at = stream.unparsed().find(self.pat)?;
            Some(Candidate::token(at, at + self.pat.len()).label(self.label))
        }
    }

    fn word_span(s: &str) -> Option<(usize, usize)> {
        let is_word = |c: char| c.is_alphanumeric() || c == '_';
        let start = s.char_indices().find(|&(_, c)| is_word(c))?.0;
        let end = s[start..]
            .char_indices()
            .find(|&(_, c)| !is_word(c))
            .map(|(i, _)| start + i)
            .unwrap_or(s.len());
        Some((start, end))
    }

    /// `\w+` run opened as a node, typed through the tokenizer, closed by
    /// an instant null end.
    struct Word;

    impl Phrase for Word {
        fn label(&self) -> &str {
            "word"
        }

        fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
            let (at, to) = word_span(stream.unparsed())?;
            Some(Candidate::node(at, to).rtokenize(to - at))
        }

        fn ends(&self, _stream: &Stream<'_>) -> Option<Candidate> {
            Some(Candidate::instant_end())
        }

        fn tokenize(&self, stream: &mut TokenizeStream<'_>) -> TokenClass {
            let run = stream.eat_remain();
            if run.chars().all(|c| c.is_ascii_digit()) {
                TokenClass::labeled("number")
            } else if run == "not" || run == "is" {
                TokenClass::labeled("keyword")
            } else {
                TokenClass::labeled("variable")
            }
        }
    }

    /// Quote-delimited phrase remembering its close quote via extras.
    struct Quoted;

    impl Phrase for Quoted {
        fn label(&self) -> &str {
            "string"
        }

        fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
            let at = stream.unparsed().find(['\'', '"'])?;
            let quote = &stream.unparsed()[at..at + 1];
            Some(Candidate::node(at, at + 1).extra("quotes", quote))
        }

        fn ends(&self, stream: &Stream<'_>) -> Option<Candidate> {
            let quote = stream.node().extras().get_str("quotes")?;
            let at = stream.unparsed().find(quote)?;
            Some(Candidate::end(at, at + quote.len()))
        }
    }

    /// Masks a backslash escape.
    struct Escape;

    impl Phrase for Escape {
        fn label(&self) -> &str {
            "escape"
        }

        fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
            let at = stream.unparsed().find('\\')?;
            let escaped = stream.unparsed()[at + 1..].chars().next()?;
            Some(Candidate::token(at, at + 1 + escaped.len_utf8()).masked())
        }
    }

    fn assert_invariants(tree: &SyntaxTree, input: &str) {
        // Coverage: depth-first content equals the input.
        assert_eq!(tree.root().reader().branch().content(), input);
        // Adjacency over reading order, and structural links.
        let mut cursor = 0;
        let mut row = 0;
        for i in 0..tree.token_count() {
            let token = tree.token(crate::TokenId(i as u32));
            assert_eq!(token.data_start(), cursor, "token {i} not adjacent");
            cursor = token.data_end();
            assert!(token.row_no() >= row, "rows must be monotone");
            row = token.row_no();
            if let Some(parent) = token.parent() {
                if token.is_end() {
                    assert_eq!(parent.end().unwrap().id(), token.id());
                } else {
                    assert_eq!(parent.child(token.inner_index()).unwrap().id(), token.id());
                }
            }
        }
        assert_eq!(cursor, input.len());
        assert!(tree.root().end().unwrap().is_eof());
    }

    #[test]
    fn bare_rows_become_outer_tokens() {
        init_logger();
        let grammar = Grammar::new();
        let tree = grammar.parse_string("ab\ncd").unwrap();
        assert_invariants(&tree, "ab\ncd");
        let root = tree.root();
        assert_eq!(root.child_count(), 2);
        let first = root.child(0).unwrap();
        assert_eq!(first.kind(), TokenKind::Outer);
        assert_eq!(first.content(), "ab\n");
        assert_eq!(root.child(1).unwrap().content(), "cd");
    }

    #[test]
    fn empty_input_yields_root_and_eof() {
        init_logger();
        let grammar = Grammar::new();
        let tree = grammar.parse_string("").unwrap();
        assert_eq!(tree.token_count(), 2);
        assert!(tree.root().end().unwrap().is_eof());
        assert_eq!(tree.content(), "");
    }

    #[test]
    fn nested_delimited_nodes() {
        init_logger();
        let mut grammar = Grammar::new();
        let bracket = grammar.add(Delim {
            label: "bracket",
            open: "(",
            close: ")",
        });
        grammar.add_sub(Grammar::ROOT, bracket);
        grammar.add_sub(bracket, bracket);

        let input = "(a(b)c)";
        let tree = grammar.parse_string(input).unwrap();
        assert_invariants(&tree, input);

        let outer = tree.root().child(0).unwrap();
        assert!(outer.is_node());
        assert_eq!(outer.content(), "(");
        let children: Vec<_> = outer.children().collect();
        assert_eq!(children.len(), 3);
        assert_eq!(children[0].content(), "a");
        assert_eq!(children[1].content(), "(");
        assert!(children[1].is_node());
        assert_eq!(children[1].reader().inner().content(), "b");
        assert_eq!(children[2].content(), "c");
        assert_eq!(outer.end().unwrap().content(), ")");
    }

    #[test]
    fn node_spanning_rows() {
        init_logger();
        let mut grammar = Grammar::new();
        let bracket = grammar.add(Delim {
            label: "bracket",
            open: "(",
            close: ")",
        });
        grammar.add_sub(Grammar::ROOT, bracket);

        let input = "x(a\nb)y\n";
        let tree = grammar.parse_string(input).unwrap();
        assert_invariants(&tree, input);

        let node = tree.root().child(1).unwrap();
        assert!(node.is_node());
        assert_eq!(node.row_no(), 0);
        let inner: Vec<_> = node.children().map(|t| t.content().to_string()).collect();
        assert_eq!(inner, vec!["a\n", "b"]);
        assert_eq!(node.end().unwrap().row_no(), 1);
    }

    #[test]
    fn unterminated_node_keeps_an_open_end() {
        init_logger();
        let mut grammar = Grammar::new();
        let bracket = grammar.add(Delim {
            label: "bracket",
            open: "(",
            close: ")",
        });
        grammar.add_sub(Grammar::ROOT, bracket);

        let tree = grammar.parse_string("(").unwrap();
        assert_invariants(&tree, "(");
        let node = tree.root().child(0).unwrap();
        assert!(node.end().unwrap().is_open_end());
        assert!(tree.root().end().unwrap().is_eof());
    }

    #[test]
    fn earlier_candidate_wins() {
        init_logger();
        let mut grammar = Grammar::new();
        let a = grammar.add(Lit {
            label: "late",
            pat: "zz",
        });
        let b = grammar.add(Lit {
            label: "early",
            pat: "y",
        });
        grammar.add_subs(Grammar::ROOT, &[a, b]);

        let tree = grammar.parse_string("..y..zz").unwrap();
        let labels: Vec<_> = tree
            .root()
            .children()
            .filter_map(|t| t.label().map(str::to_owned))
            .collect();
        assert_eq!(labels, vec!["early", "late"]);
    }

    #[test]
    fn longest_candidate_wins_at_equal_position() {
        init_logger();
        let mut grammar = Grammar::new();
        let short = grammar.add(Lit {
            label: "short",
            pat: "ab",
        });
        let long = grammar.add(Lit {
            label: "long",
            pat: "abc",
        });
        grammar.add_subs(Grammar::ROOT, &[short, long]);

        let tree = grammar.parse_string("abc").unwrap();
        let first = tree.root().child(0).unwrap();
        assert_eq!(first.label(), Some("long"));
        assert_eq!(first.content(), "abc");
    }

    /// An end proposal far out, a sub start close by: the start wins.
    #[test]
    fn closer_start_beats_farther_end() {
        init_logger();
        let mut grammar = Grammar::new();
        let outer = grammar.add(Delim {
            label: "outer",
            open: "[",
            close: "]",
        });
        let inner = grammar.add(Delim {
            label: "inner",
            open: "(",
            close: ")",
        });
        grammar.add_sub(Grammar::ROOT, outer);
        grammar.add_sub(outer, inner);

        let input = "[(])]";
        let tree = grammar.parse_string(input).unwrap();
        assert_invariants(&tree, input);
        let o = tree.root().child(0).unwrap();
        let i = o.child(0).unwrap();
        assert_eq!(i.label_or("inner"), "inner");
        // The inner node swallowed the first `]` as its content run.
        assert_eq!(i.reader().inner().content(), "]");
        assert_eq!(o.end().unwrap().column_start(), 4);
    }

    #[test]
    fn instant_start_preempts_normal_end() {
        init_logger();

        struct InstantStar;
        impl Phrase for InstantStar {
            fn label(&self) -> &str {
                "star"
            }
            fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
                let at = stream.unparsed().find('*')?;
                Some(Candidate::token(at, at + 1).label("star").instant())
            }
        }

        let mut grammar = Grammar::new();
        let quoted = grammar.add(Quoted);
        let star = grammar.add(InstantStar);
        grammar.add_sub(Grammar::ROOT, quoted);
        grammar.add_sub(quoted, star);

        // The end quote sits before the star, but the star is instant.
        let input = "'a'*'";
        let tree = grammar.parse_string(input).unwrap();
        assert_invariants(&tree, input);
        let node = tree.root().child(0).unwrap();
        let stars: Vec<_> = node
            .children()
            .filter(|t| t.label() == Some("star"))
            .collect();
        assert_eq!(stars.len(), 1);
        // With the first close quote consumed as content, the node closes
        // at the trailing quote instead.
        assert!(node.end().unwrap().is_end());
        assert_eq!(node.end().unwrap().column_start(), 4);
    }

    #[test]
    fn default_end_defers_to_sub_candidates() {
        init_logger();

        struct SoftBlock;
        impl Phrase for SoftBlock {
            fn label(&self) -> &str {
                "block"
            }
            fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
                let at = stream.unparsed().find('{')?;
                Some(Candidate::node(at, at + 1))
            }
            fn ends(&self, _stream: &Stream<'_>) -> Option<Candidate> {
                // Closes at the viewpoint unless something inside matched.
                Some(Candidate::end(0, 0).default_end())
            }
        }

        let mut grammar = Grammar::new();
        let block = grammar.add(SoftBlock);
        let dot = grammar.add(Lit {
            label: "dot",
            pat: ".",
        });
        grammar.add_sub(Grammar::ROOT, block);
        grammar.add_sub(block, dot);

        let input = "{..x";
        let tree = grammar.parse_string(input).unwrap();
        assert_invariants(&tree, input);
        let node = tree.root().child(0).unwrap();
        let dots = node
            .children()
            .filter(|t| t.label() == Some("dot"))
            .count();
        assert_eq!(dots, 2);
        // After the dots no sub candidate existed, so the default end
        // closed the node before the remainder.
        assert!(node.end().unwrap().is_end());
        assert!(node.end().unwrap().is_empty());
        assert_eq!(tree.root().child(1).unwrap().content(), "x");
    }

    #[test]
    fn word_rtokenize_types_the_inner_run() {
        init_logger();
        let mut grammar = Grammar::new();
        let word = grammar.add(Word);
        grammar.add_sub(Grammar::ROOT, word);

        let input = "foo = 42\n";
        let tree = grammar.parse_string(input).unwrap();
        assert_invariants(&tree, input);

        let root = tree.root();
        let foo = root.child(0).unwrap();
        assert!(foo.is_node());
        assert!(foo.is_empty());
        assert_eq!(foo.child(0).unwrap().label(), Some("variable"));
        assert_eq!(foo.child(0).unwrap().content(), "foo");
        assert_eq!(root.child(1).unwrap().content(), " = ");
        assert_eq!(root.child(1).unwrap().kind(), TokenKind::Outer);
        let num = root.child(2).unwrap();
        assert_eq!(num.child(0).unwrap().label(), Some("number"));
        assert_eq!(num.child(0).unwrap().content(), "42");
        assert_eq!(root.child(3).unwrap().content(), "\n");
    }

    #[test]
    fn lstrip_emits_a_preceding_token() {
        init_logger();

        struct StripEnd;
        impl Phrase for StripEnd {
            fn label(&self) -> &str {
                "padded"
            }
            fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
                let at = stream.unparsed().find('<')?;
                Some(Candidate::node(at, at + 1))
            }
            fn ends(&self, stream: &Stream<'_>) -> Option<Candidate> {
                // Matches " >", stripping the space into the node body.
                let at = stream.unparsed().find(" >")?;
                Some(Candidate::end(at, at + 2).lstrip(1))
            }
        }

        let mut grammar = Grammar::new();
        let padded = grammar.add(StripEnd);
        grammar.add_sub(Grammar::ROOT, padded);

        let input = "<ab >";
        let tree = grammar.parse_string(input).unwrap();
        assert_invariants(&tree, input);
        let node = tree.root().child(0).unwrap();
        let inner: Vec<_> = node.children().map(|t| t.content().to_string()).collect();
        assert_eq!(inner, vec!["ab", " "]);
        assert_eq!(node.end().unwrap().content(), ">");
    }

    #[test]
    fn masked_escape_never_surfaces() {
        init_logger();
        let mut grammar = Grammar::new();
        let quoted = grammar.add(Quoted);
        let escape = grammar.add(Escape);
        grammar.add_sub(Grammar::ROOT, quoted);
        grammar.add_sub(quoted, escape);

        let input = "'a\\'b'";
        let tree = grammar.parse_string(input).unwrap();
        assert_invariants(&tree, input);

        let node = tree.root().child(0).unwrap();
        assert_eq!(node.content(), "'");
        // The escaped quote is plain content of the string node.
        assert_eq!(node.reader().inner().content(), "a\\'b");
        assert_eq!(node.end().unwrap().column_start(), 5);
        for token in tree.root().reader().branch() {
            assert!(token.label() != Some("escape"));
        }
    }

    #[test]
    fn mask_node_swallows_its_region_across_rows() {
        init_logger();

        struct MaskedPair;
        impl Phrase for MaskedPair {
            fn label(&self) -> &str {
                "masked-pair"
            }
            fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
                let at = stream.unparsed().find("#>")?;
                Some(Candidate::node(at, at + 2).masked())
            }
            fn ends(&self, stream: &Stream<'_>) -> Option<Candidate> {
                let at = stream.unparsed().find("<#")?;
                Some(Candidate::end(at, at + 2))
            }
        }

        let mut grammar = Grammar::new();
        let quoted = grammar.add(Quoted);
        let masked = grammar.add(MaskedPair);
        grammar.add_sub(Grammar::ROOT, quoted);
        grammar.add_sub(quoted, masked);

        // The close quote inside the masked region must not end the string.
        let input = "'a #> ' \n ' <# b'";
        let tree = grammar.parse_string(input).unwrap();
        assert_invariants(&tree, input);
        let node = tree.root().child(0).unwrap();
        assert_eq!(node.reader().inner().content(), "a #> ' \n ' <# b");
        assert_eq!(node.end().unwrap().row_no(), 1);
    }

    #[test]
    fn switch_to_changes_behavior_but_not_identity() {
        init_logger();

        struct Plain {
            other: PhraseId,
        }
        impl Phrase for Plain {
            fn label(&self) -> &str {
                "plain"
            }
            fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
                let at = stream.unparsed().find('<')?;
                Some(Candidate::node(at, at + 1).switch_to(self.other))
            }
            fn ends(&self, stream: &Stream<'_>) -> Option<Candidate> {
                let at = stream.unparsed().find('>')?;
                Some(Candidate::end(at, at + 1))
            }
        }

        struct Other;
        impl Phrase for Other {
            fn label(&self) -> &str {
                "other"
            }
            fn starts(&self, _stream: &Stream<'_>) -> Option<Candidate> {
                None
            }
            fn ends(&self, stream: &Stream<'_>) -> Option<Candidate> {
                let at = stream.unparsed().find('!')?;
                Some(Candidate::end(at, at + 1))
            }
        }

        let mut grammar = Grammar::new();
        let other = grammar.add(Other);
        let plain = grammar.add(Plain { other });
        grammar.add_sub(Grammar::ROOT, plain);

        let input = "<a!b>";
        let tree = grammar.parse_string(input).unwrap();
        assert_invariants(&tree, input);
        let node = tree.root().child(0).unwrap();
        // Closed by the switched-in behavior...
        assert_eq!(node.end().unwrap().content(), "!");
        // ...while the identity stays with the matching phrase.
        assert_eq!(node.phrase(), Some(plain));
    }

    #[test]
    fn switch_phrase_reassigns_identity() {
        init_logger();

        struct Plain {
            other: PhraseId,
        }
        impl Phrase for Plain {
            fn label(&self) -> &str {
                "plain"
            }
            fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
                let at = stream.unparsed().find('<')?;
                Some(Candidate::node(at, at + 1).switch_phrase(self.other))
            }
        }

        struct Other;
        impl Phrase for Other {
            fn label(&self) -> &str {
                "other"
            }
            fn starts(&self, _stream: &Stream<'_>) -> Option<Candidate> {
                None
            }
            fn ends(&self, stream: &Stream<'_>) -> Option<Candidate> {
                let at = stream.unparsed().find('!')?;
                Some(Candidate::end(at, at + 1))
            }
        }

        let mut grammar = Grammar::new();
        let other = grammar.add(Other);
        let plain = grammar.add(Plain { other });
        grammar.add_sub(Grammar::ROOT, plain);

        let tree = grammar.parse_string("<a!").unwrap();
        let node = tree.root().child(0).unwrap();
        assert_eq!(node.phrase(), Some(other));
        assert_eq!(node.end().unwrap().content(), "!");
    }

    #[test]
    fn forward_to_opens_the_target_in_place() {
        init_logger();

        struct Jump {
            target: PhraseId,
        }
        impl Phrase for Jump {
            fn label(&self) -> &str {
                "jump"
            }
            fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
                let at = stream.unparsed().find('@')?;
                Some(Candidate::token(at, at + 1).forward_to(self.target))
            }
        }

        let mut grammar = Grammar::new();
        let bracket = grammar.add(Delim {
            label: "bracket",
            open: "(",
            close: ")",
        });
        let jump = grammar.add(Jump { target: bracket });
        grammar.add_sub(Grammar::ROOT, jump);

        // `(` is not a root sub-phrase; only the forward reaches it.
        let input = "@(x)";
        let tree = grammar.parse_string(input).unwrap();
        assert_invariants(&tree, input);
        assert_eq!(tree.root().child(0).unwrap().content(), "@");
        let node = tree.root().child(1).unwrap();
        assert!(node.is_node());
        assert_eq!(node.reader().inner().content(), "x");
    }

    #[test]
    fn non_advancing_forward_chain_aborts() {
        init_logger();

        struct NullJump {
            target: PhraseId,
        }
        impl Phrase for NullJump {
            fn label(&self) -> &str {
                "null-jump"
            }
            fn starts(&self, _stream: &Stream<'_>) -> Option<Candidate> {
                Some(Candidate::token(0, 0).forward_to(self.target))
            }
        }

        struct Never;
        impl Phrase for Never {
            fn label(&self) -> &str {
                "never"
            }
            fn starts(&self, _stream: &Stream<'_>) -> Option<Candidate> {
                None
            }
        }

        let mut grammar = Grammar::new();
        let never = grammar.add(Never);
        let jump = grammar.add(NullJump { target: never });
        grammar.add_sub(Grammar::ROOT, jump);

        let err = grammar.parse_string("abc").unwrap_err();
        assert!(matches!(err, ParseError::Stalled { .. }));
    }

    /// An end may be null on its own (it pops the stack), but a null end
    /// whose forward produces nothing has made no progress at all.
    #[test]
    fn null_end_with_dead_forward_aborts() {
        init_logger();

        struct Trap {
            target: PhraseId,
        }
        impl Phrase for Trap {
            fn label(&self) -> &str {
                "trap"
            }
            fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
                let at = stream.unparsed().find('<')?;
                Some(Candidate::node(at, at + 1))
            }
            fn ends(&self, _stream: &Stream<'_>) -> Option<Candidate> {
                Some(Candidate::end(0, 0).forward_to(self.target))
            }
        }

        struct Never;
        impl Phrase for Never {
            fn label(&self) -> &str {
                "never"
            }
            fn starts(&self, _stream: &Stream<'_>) -> Option<Candidate> {
                None
            }
        }

        let mut grammar = Grammar::new();
        let never = grammar.add(Never);
        let trap = grammar.add(Trap { target: never });
        grammar.add_sub(Grammar::ROOT, trap);

        let err = grammar.parse_string("<x").unwrap_err();
        assert!(matches!(err, ParseError::Stalled { .. }));
    }

    #[test]
    fn null_mask_candidate_aborts() {
        init_logger();

        struct NullMask;
        impl Phrase for NullMask {
            fn label(&self) -> &str {
                "null-mask"
            }
            fn starts(&self, _stream: &Stream<'_>) -> Option<Candidate> {
                Some(Candidate::token(0, 0).masked())
            }
        }

        let mut grammar = Grammar::new();
        let quoted = grammar.add(Quoted);
        let null_mask = grammar.add(NullMask);
        grammar.add_sub(Grammar::ROOT, quoted);
        grammar.add_sub(quoted, null_mask);

        // A mask that consumes nothing cannot re-attribute anything.
        let err = grammar.parse_string("'x'").unwrap_err();
        assert!(matches!(err, ParseError::Stalled { .. }));
    }

    /// The forwarded phrase opens a zero-width marker node; the chain as
    /// a whole advanced through the forwarding winner, so this is legal.
    #[test]
    fn forward_may_open_a_null_marker_node() {
        init_logger();

        struct Gate {
            marker: PhraseId,
        }
        impl Phrase for Gate {
            fn label(&self) -> &str {
                "gate"
            }
            fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
                let at = stream.unparsed().find('(')?;
                Some(Candidate::node(at, at + 1).forward_to(self.marker))
            }
            fn ends(&self, _stream: &Stream<'_>) -> Option<Candidate> {
                Some(Candidate::instant_end())
            }
        }

        struct Marker;
        impl Phrase for Marker {
            fn label(&self) -> &str {
                "marker"
            }
            fn starts(&self, _stream: &Stream<'_>) -> Option<Candidate> {
                Some(Candidate::node(0, 0))
            }
            fn ends(&self, stream: &Stream<'_>) -> Option<Candidate> {
                let at = stream.unparsed().find(')')?;
                Some(Candidate::end(at, at + 1))
            }
        }

        let mut grammar = Grammar::new();
        let marker = grammar.add(Marker);
        let gate = grammar.add(Gate { marker });
        grammar.add_sub(Grammar::ROOT, gate);

        let input = "(x)";
        let tree = grammar.parse_string(input).unwrap();
        assert_invariants(&tree, input);

        let gate_node = tree.root().child(0).unwrap();
        assert_eq!(gate_node.content(), "(");
        let marker_node = gate_node.child(0).unwrap();
        assert_eq!(marker_node.phrase(), Some(marker));
        assert!(marker_node.is_empty());
        assert_eq!(marker_node.reader().inner().content(), "x");
        assert_eq!(marker_node.end().unwrap().content(), ")");
    }

    #[test]
    fn null_start_at_viewpoint_is_rejected() {
        init_logger();

        struct NullStart;
        impl Phrase for NullStart {
            fn label(&self) -> &str {
                "null-start"
            }
            fn starts(&self, _stream: &Stream<'_>) -> Option<Candidate> {
                Some(Candidate::node(0, 0))
            }
        }

        let mut grammar = Grammar::new();
        let null = grammar.add(NullStart);
        let dot = grammar.add(Lit {
            label: "dot",
            pat: ".",
        });
        grammar.add_subs(Grammar::ROOT, &[null, dot]);

        // The null candidate is proposed every pass; parsing proceeds
        // with the runner-up and still terminates.
        let input = "a.b";
        let tree = grammar.parse_string(input).unwrap();
        assert_invariants(&tree, input);
        let dots = tree
            .root()
            .children()
            .filter(|t| t.label() == Some("dot"))
            .count();
        assert_eq!(dots, 1);
    }

    #[test]
    fn stalling_tokenizer_aborts() {
        init_logger();

        struct Lazy;
        impl Phrase for Lazy {
            fn label(&self) -> &str {
                "lazy"
            }
            fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
                let at = stream.unparsed().find('(')?;
                Some(Candidate::node(at, at + 1))
            }
            fn tokenize(&self, _stream: &mut TokenizeStream<'_>) -> TokenClass {
                TokenClass::untyped()
            }
        }

        let mut grammar = Grammar::new();
        let lazy = grammar.add(Lazy);
        grammar.add_sub(Grammar::ROOT, lazy);

        let err = grammar.parse_string("(abc").unwrap_err();
        assert!(matches!(err, ParseError::TokenizerStalled { .. }));
    }

    #[test]
    fn out_of_bounds_candidate_aborts() {
        init_logger();

        struct TooFar;
        impl Phrase for TooFar {
            fn label(&self) -> &str {
                "too-far"
            }
            fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
                Some(Candidate::token(0, stream.unparsed().len() + 1))
            }
        }

        let mut grammar = Grammar::new();
        let too_far = grammar.add(TooFar);
        grammar.add_sub(Grammar::ROOT, too_far);

        let err = grammar.parse_string("x").unwrap_err();
        assert!(matches!(err, ParseError::CandidateBounds { .. }));
    }

    #[test]
    fn suffix_phrase_chains_after_the_close() {
        init_logger();
        let mut grammar = Grammar::new();
        let quoted = grammar.add(Quoted);
        let subscript = grammar.add(Delim {
            label: "subscript",
            open: "[",
            close: "]",
        });
        grammar.add_sub(Grammar::ROOT, quoted);
        grammar.add_suffix(quoted, subscript);

        let input = "\"ab\"[1:2] x [3]";
        let tree = grammar.parse_string(input).unwrap();
        assert_invariants(&tree, input);

        let root = tree.root();
        assert!(root.child(0).unwrap().is_node());
        let suffix = root.child(1).unwrap();
        assert!(suffix.is_node());
        assert_eq!(suffix.label_or("subscript"), "subscript");
        assert_eq!(suffix.reader().inner().content(), "1:2");
        // `[3]` does not follow a string close; the suffix phrase never
        // sees it.
        assert_eq!(root.child(2).unwrap().content(), " x [3]");
    }

    #[test]
    fn wrap_opens_a_shell_around_the_wrapped_node() {
        init_logger();

        struct Wrapper {
            inner: PhraseId,
        }
        impl Phrase for Wrapper {
            fn label(&self) -> &str {
                "wrapper"
            }
            fn starts(&self, stream: &Stream<'_>) -> Option<Candidate> {
                let at = stream.unparsed().find('(')?;
                Some(Candidate::node(at, at + 1).wrap(self.inner))
            }
            fn ends(&self, _stream: &Stream<'_>) -> Option<Candidate> {
                Some(Candidate::instant_end())
            }
        }

        let mut grammar = Grammar::new();
        let bracket = grammar.add(Delim {
            label: "bracket",
            open: "(",
            close: ")",
        });
        let wrapper = grammar.add(Wrapper { inner: bracket });
        grammar.add_sub(Grammar::ROOT, wrapper);

        let input = "(x)";
        let tree = grammar.parse_string(input).unwrap();
        assert_invariants(&tree, input);

        let shell = tree.root().child(0).unwrap();
        assert!(shell.is_node());
        assert!(shell.is_empty());
        assert_eq!(shell.phrase(), Some(wrapper));
        let wrapped = shell.child(0).unwrap();
        assert_eq!(wrapped.phrase(), Some(bracket));
        assert_eq!(wrapped.content(), "(");
        assert_eq!(wrapped.reader().inner().content(), "x");
        assert_eq!(wrapped.end().unwrap().content(), ")");
    }

    #[test]
    fn reparsing_the_result_content_is_stable() {
        init_logger();
        let mut grammar = Grammar::new();
        let quoted = grammar.add(Quoted);
        let escape = grammar.add(Escape);
        let word = grammar.add(Word);
        let bracket = grammar.add(Delim {
            label: "bracket",
            open: "(",
            close: ")",
        });
        grammar.add_subs(Grammar::ROOT, &[quoted, word, bracket]);
        grammar.add_sub(quoted, escape);
        grammar.add_sub(bracket, bracket);

        let input = "foo = (1 + 'a\\'b') * not2\n(x";
        let first = grammar.parse_string(input).unwrap();
        assert_invariants(&first, input);
        let second = grammar.parse_string(&first.content()).unwrap();

        let digest = |tree: &SyntaxTree| -> Vec<(TokenKind, String, String)> {
            tree.root()
                .reader()
                .branch()
                .map(|t| {
                    (
                        t.kind(),
                        t.label().unwrap_or_default().to_string(),
                        t.content().to_string(),
                    )
                })
                .collect()
        };
        assert_eq!(digest(&first), digest(&second));
    }

    impl<'a> crate::TokenRef<'a> {
        fn label_or(&self, fallback: &'a str) -> &'a str {
            self.label().unwrap_or(fallback)
        }
    }
}
