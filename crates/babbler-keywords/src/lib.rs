//! Keyword extraction: two-pass algorithm with swap table, banned and
//! auxiliary word lists.
//!
//! Keywords bias reply generation toward the topic of the input. Extraction
//! works in two passes over the swap-substituted input:
//!
//! 1. **Primary**: words the model already knows that start with a letter or
//!    digit and are neither banned nor auxiliary.
//! 2. **Auxiliary**: if the primary pass found anything, auxiliary words
//!    (pronouns, possessives) from the input are added as well.
//!
//! The result is a set of [`Symbol`]s in id order, so anything that draws
//! from it does so in a reproducible order.

use std::collections::{BTreeSet, HashSet};

use babbler_dict::{Dictionary, Symbol, Word};
use log::trace;

/// Perspective-swapping substitution table ("I" -> "you", "my" -> "your").
///
/// An input token is matched case-insensitively against every `from` entry;
/// each match contributes its `to` word as a keyword candidate. Several
/// entries may share a `from` ("you" -> "I", "you" -> "me").
#[derive(Debug, Clone, Default)]
pub struct SwapTable {
    pub pairs: Vec<(Word, Word)>,
}

impl SwapTable {
    pub fn new(pairs: Vec<(Word, Word)>) -> Self {
        SwapTable { pairs }
    }

    /// All substitutions for `token`, or the token itself if none apply.
    pub fn apply(&self, token: &Word) -> Vec<Word> {
        let swapped: Vec<Word> = self
            .pairs
            .iter()
            .filter(|(from, _)| from == token)
            .map(|(_, to)| to.clone())
            .collect();
        if swapped.is_empty() {
            vec![token.clone()]
        } else {
            swapped
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Static word lists consulted during extraction. Loaded once, read-only.
#[derive(Debug, Clone, Default)]
pub struct KeywordConfig {
    /// Never used as keywords.
    pub banned: HashSet<Word>,
    /// Used only to supplement primary keywords.
    pub auxiliary: HashSet<Word>,
    pub swap: SwapTable,
}

/// Keyword symbols for one reply, with the auxiliary ones marked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keywords {
    symbols: BTreeSet<Symbol>,
    auxiliary: BTreeSet<Symbol>,
}

impl Keywords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a keyword. Sentinels are ignored.
    pub fn insert(&mut self, symbol: Symbol, auxiliary: bool) {
        if symbol.is_sentinel() {
            return;
        }
        self.symbols.insert(symbol);
        if auxiliary {
            self.auxiliary.insert(symbol);
        }
    }

    #[inline]
    pub fn contains(&self, symbol: Symbol) -> bool {
        self.symbols.contains(&symbol)
    }

    #[inline]
    pub fn is_auxiliary(&self, symbol: Symbol) -> bool {
        self.auxiliary.contains(&symbol)
    }

    /// All keywords in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.symbols.iter().copied()
    }

    /// Non-auxiliary keywords in symbol order.
    pub fn primary(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.symbols
            .iter()
            .copied()
            .filter(|s| !self.auxiliary.contains(s))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Extract keywords from tokenized input.
///
/// Candidates come from swap substitution of each token. A candidate must be
/// in `dict` and start with an ASCII letter or digit. Primary candidates must
/// also be neither banned nor auxiliary; the auxiliary pass runs only when
/// the primary pass found at least one keyword.
pub fn extract_keywords(tokens: &[Word], dict: &Dictionary, config: &KeywordConfig) -> Keywords {
    let candidates: Vec<Word> = tokens
        .iter()
        .flat_map(|tok| config.swap.apply(tok))
        .collect();

    let mut keywords = Keywords::new();

    for candidate in &candidates {
        if config.banned.contains(candidate) || config.auxiliary.contains(candidate) {
            continue;
        }
        if let Some(sym) = eligible(candidate, dict) {
            keywords.insert(sym, false);
        }
    }

    if !keywords.is_empty() {
        for candidate in candidates.iter().filter(|c| config.auxiliary.contains(*c)) {
            if let Some(sym) = eligible(candidate, dict) {
                keywords.insert(sym, true);
            }
        }
    }

    trace!("extracted {} keywords from {} tokens", keywords.len(), tokens.len());
    keywords
}

fn eligible(candidate: &Word, dict: &Dictionary) -> Option<Symbol> {
    if !candidate.starts_alphanumeric() {
        return None;
    }
    dict.find(candidate).filter(|s| !s.is_sentinel())
}
