//! Reply generation: seeding, keyword-biased babble, bidirectional growth and
//! candidate selection by surprise.
//!
//! 1. **Seed** a starting symbol from the keywords, or from the forward root.
//! 2. **Forward phase**: babble from the seed to the end of the sentence.
//! 3. **Backward phase**: babble backward from the seed to its beginning.
//! 4. **Evaluate** candidates with [`score`].
//! 5. **Select** the highest-scoring candidate within the [`GenerationLimit`].
//!
//! Every random draw goes through the caller's [`Rng`] in a fixed order, so a
//! seeded generator and an iteration-bounded limit reproduce the same reply.

mod evaluate;

use std::time::{Duration, Instant};

use babbler_dict::Symbol;
use babbler_keywords::Keywords;
use babbler_model::{ContextWindow, Model};
use babbler_trie::Tree;
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub use evaluate::score;

/// Longest reply, in symbols, when nothing else is configured.
pub const DEFAULT_MAX_REPLY_LEN: usize = 200;

/// Controls how many candidate replies are generated before selecting the best.
///
/// Durations are written as milliseconds when serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationLimit {
    /// Stop after the given duration.
    Timeout(#[serde(with = "millis")] Duration),
    /// Stop after the given number of iterations.
    Iterations(usize),
    /// Stop when either limit is reached.
    Both {
        #[serde(with = "millis")]
        timeout: Duration,
        max_iterations: usize,
    },
}

impl GenerationLimit {
    fn reached(&self, started: Instant, iterations: usize) -> bool {
        match *self {
            GenerationLimit::Timeout(d) => started.elapsed() >= d,
            GenerationLimit::Iterations(n) => iterations >= n,
            GenerationLimit::Both {
                timeout,
                max_iterations,
            } => started.elapsed() >= timeout || iterations >= max_iterations,
        }
    }
}

impl Default for GenerationLimit {
    fn default() -> Self {
        GenerationLimit::Timeout(Duration::from_secs(1))
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis().try_into().unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Generate the best reply to `input`.
///
/// One unbiased baseline candidate is produced first, then keyword-biased
/// candidates until `limit` is reached. Candidates that are empty or that
/// hold the same symbols as the input (as a multiset) are rejected; the
/// highest-scoring survivor wins. `None` means nothing acceptable was found,
/// which callers answer with a canned reply.
pub fn generate_reply<R: Rng>(
    model: &Model,
    input: &[Symbol],
    keywords: &Keywords,
    limit: &GenerationLimit,
    max_len: usize,
    rng: &mut R,
) -> Option<Vec<Symbol>> {
    if model.forward.branch_count(model.forward.root()) == 0 {
        return None;
    }

    let input_bag = multiset(input);
    let acceptable = |c: &[Symbol]| !c.is_empty() && multiset(c) != input_bag;

    let baseline = generate_candidate(model, &Keywords::new(), max_len, rng);
    let mut best = acceptable(&baseline).then_some(baseline);
    let mut max_surprise = -1.0;

    let started = Instant::now();
    let mut iterations = 0;
    while !limit.reached(started, iterations) {
        let candidate = generate_candidate(model, keywords, max_len, rng);
        iterations += 1;
        if !acceptable(&candidate) {
            continue;
        }
        let surprise = score(model, &candidate, keywords);
        if surprise > max_surprise {
            max_surprise = surprise;
            best = Some(candidate);
        }
    }

    debug!(
        "generated {iterations} candidates, best surprise {max_surprise:.3}, {} keywords",
        keywords.len()
    );
    best
}

/// Build one candidate: seed, grow forward, then grow backward.
///
/// The result never holds a sentinel and is at most `max_len` symbols long.
/// An empty model yields an empty candidate.
pub fn generate_candidate<R: Rng>(
    model: &Model,
    keywords: &Keywords,
    max_len: usize,
    rng: &mut R,
) -> Vec<Symbol> {
    let mut reply = Vec::new();
    if max_len == 0 {
        return reply;
    }
    let Some(start) = seed(model, keywords, rng) else {
        return reply;
    };
    let mut used_key = false;

    reply.push(start);
    let mut ctx = model.forward_context();
    ctx.advance(&model.forward, start);
    while reply.len() < max_len {
        match babble(&model.forward, &ctx, keywords, &reply, &mut used_key, rng) {
            Some(sym) if !sym.is_sentinel() => {
                reply.push(sym);
                ctx.advance(&model.forward, sym);
            }
            _ => break,
        }
    }

    // Rebuild the backward context from the opening symbols, last first.
    let mut ctx = model.backward_context();
    let from = (reply.len() - 1).min(model.order as usize);
    for &sym in reply[..=from].iter().rev() {
        ctx.advance(&model.backward, sym);
    }
    while reply.len() < max_len {
        match babble(&model.backward, &ctx, keywords, &reply, &mut used_key, rng) {
            Some(sym) if !sym.is_sentinel() => {
                reply.insert(0, sym);
                ctx.advance(&model.backward, sym);
            }
            _ => break,
        }
    }

    reply
}

/// Pick the symbol a reply grows from.
///
/// Non-auxiliary keywords that start a context in the forward tree are
/// preferred; otherwise any non-sentinel root child. Both choices are
/// uniform. `None` for an empty model.
pub fn seed<R: Rng>(model: &Model, keywords: &Keywords, rng: &mut R) -> Option<Symbol> {
    let tree = &model.forward;
    let root = tree.root();

    let starts: Vec<Symbol> = keywords
        .primary()
        .filter(|&s| tree.child_for(root, s).is_some())
        .collect();
    if !starts.is_empty() {
        return Some(starts[rng.random_range(0..starts.len())]);
    }

    let children: Vec<Symbol> = tree
        .children(root)
        .iter()
        .map(|&c| tree.node(c).symbol)
        .filter(|s| !s.is_sentinel())
        .collect();
    if children.is_empty() {
        return None;
    }
    Some(children[rng.random_range(0..children.len())])
}

/// Keyword-biased weighted choice of the next symbol.
///
/// Scans the children of the deepest context from a random position. A
/// keyword not yet in the reply is taken at once, unless it is auxiliary and
/// no keyword has been used so far. Otherwise the scan subtracts child counts
/// from a random draw in `0..total` and stops where it goes negative.
fn babble<R: Rng>(
    tree: &Tree,
    ctx: &ContextWindow,
    keywords: &Keywords,
    reply: &[Symbol],
    used_key: &mut bool,
    rng: &mut R,
) -> Option<Symbol> {
    let node = ctx.deepest()?;
    let children = tree.children(node);
    let total: u64 = children
        .iter()
        .map(|&c| u64::from(tree.node(c).count))
        .sum();
    if total == 0 {
        return None;
    }

    let branch = children.len();
    let mut i = rng.random_range(0..branch);
    let mut count = rng.random_range(0..total) as i64;

    loop {
        let child = tree.node(children[i]);
        let sym = child.symbol;

        if keywords.contains(sym)
            && (*used_key || !keywords.is_auxiliary(sym))
            && !reply.contains(&sym)
        {
            *used_key = true;
            return Some(sym);
        }

        count -= i64::from(child.count);
        if count < 0 {
            return Some(sym);
        }
        i = (i + 1) % branch;
    }
}

fn multiset(symbols: &[Symbol]) -> Vec<Symbol> {
    let mut bag = symbols.to_vec();
    bag.sort_unstable();
    bag
}
