//! Post-selection directives carried on candidates.
//!
//! Features are applied in the order they were attached, split around the
//! content commit: everything before the first `RTokenize` (strips and
//! switches) runs pre-commit, the summed `RTokenize` amounts are deducted
//! from the candidate's end before its content span is fixed, the
//! remaining steps run post-commit, and a trailing `ForwardTo` runs last.

use crate::phrase::PhraseId;

/// A single directive attached to a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// Advance the candidate's start by `n` bytes; the stripped bytes are
    /// tokenized into the parent as a preceding plain token.
    LStrip(usize),
    /// Reserve the trailing `n` bytes of the span for the context
    /// phrase's tokenizer, producing typed inner tokens after commit.
    RTokenize(usize),
    /// Switch the context node's behaviour phrase.
    SwitchTo(PhraseId),
    /// Switch the context node's behaviour phrase and its result-visible
    /// identity.
    SwitchPh(PhraseId),
    /// Query the phrase's `starts` directly after the token and commit
    /// the result in place.
    ForwardTo(PhraseId),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Features {
    steps: Vec<Feature>,
}

impl Features {
    pub(crate) fn push(&mut self, feature: Feature) {
        self.steps.push(feature);
    }

    pub(crate) fn rtokenize_total(&self) -> usize {
        self.steps
            .iter()
            .map(|f| match f {
                Feature::RTokenize(n) => *n,
                _ => 0,
            })
            .sum()
    }

    /// The last `ForwardTo`, applied after everything else.
    pub(crate) fn forward(&self) -> Option<PhraseId> {
        self.steps.iter().rev().find_map(|f| match f {
            Feature::ForwardTo(ph) => Some(*ph),
            _ => None,
        })
    }

    fn split_point(&self) -> usize {
        self.steps
            .iter()
            .position(|f| matches!(f, Feature::RTokenize(_)))
            .unwrap_or(self.steps.len())
    }

    /// Pre-commit steps: every `LStrip`, plus switches attached before
    /// the first `RTokenize`.
    pub(crate) fn pre_commit(&self) -> impl Iterator<Item = Feature> + '_ {
        let split = self.split_point();
        self.steps.iter().copied().enumerate().filter_map(move |(i, f)| match f {
            Feature::LStrip(_) => Some(f),
            Feature::SwitchTo(_) | Feature::SwitchPh(_) if i < split => Some(f),
            _ => None,
        })
    }

    /// Post-commit steps: every `RTokenize`, plus switches attached after
    /// the first one.
    pub(crate) fn post_commit(&self) -> impl Iterator<Item = Feature> + '_ {
        let split = self.split_point();
        self.steps.iter().copied().enumerate().filter_map(move |(i, f)| match f {
            Feature::RTokenize(_) => Some(f),
            Feature::SwitchTo(_) | Feature::SwitchPh(_) if i >= split => Some(f),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn features_split_around_the_first_rtokenize() {
        let ph = PhraseId(7);
        let mut f = Features::default();
        f.push(Feature::SwitchTo(ph));
        f.push(Feature::LStrip(2));
        f.push(Feature::RTokenize(3));
        f.push(Feature::SwitchTo(ph));
        f.push(Feature::RTokenize(1));
        f.push(Feature::ForwardTo(ph));

        let pre: Vec<_> = f.pre_commit().collect();
        assert_eq!(pre, vec![Feature::SwitchTo(ph), Feature::LStrip(2)]);
        let post: Vec<_> = f.post_commit().collect();
        assert_eq!(
            post,
            vec![
                Feature::RTokenize(3),
                Feature::SwitchTo(ph),
                Feature::RTokenize(1),
            ]
        );
        assert_eq!(f.rtokenize_total(), 4);
        assert_eq!(f.forward(), Some(ph));
    }
}
