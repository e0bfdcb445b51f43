//! Surprise scoring of candidate replies.

use babbler_dict::Symbol;
use babbler_keywords::Keywords;
use babbler_model::{ContextWindow, Model};
use babbler_trie::Tree;

/// Score a candidate by how much information its scored symbols carry.
///
/// Both trees are walked read-only, exactly as training would walk them,
/// starting from the sentence-opening [`Symbol::FIN`]. For
/// every scored symbol the probability `count / usage` is averaged over the
/// context depths `0..order` that know the transition, and `-log2` of that
/// average is added. Symbols a direction has never seen add nothing. The
/// total is divided by the number of scored symbols in the reply.
///
/// Scored symbols are the keywords; with no keywords every non-sentinel
/// symbol is scored.
pub fn score(model: &Model, reply: &[Symbol], keywords: &Keywords) -> f64 {
    let scored = |s: Symbol| {
        if keywords.is_empty() {
            !s.is_sentinel()
        } else {
            keywords.contains(s)
        }
    };

    let num = reply.iter().filter(|&&s| scored(s)).count();
    if num == 0 {
        return 0.0;
    }

    let forward = surprise(
        &model.forward,
        model.forward_context(),
        reply.iter().copied(),
        &scored,
    );
    let backward = surprise(
        &model.backward,
        model.backward_context(),
        reply.iter().rev().copied(),
        &scored,
    );

    (forward + backward) / num as f64
}

fn surprise(
    tree: &Tree,
    mut ctx: ContextWindow,
    symbols: impl Iterator<Item = Symbol>,
    scored: &impl Fn(Symbol) -> bool,
) -> f64 {
    let mut entropy = 0.0;

    ctx.advance(tree, Symbol::FIN);
    for sym in symbols {
        if scored(sym) {
            let mut prob = 0.0;
            let mut contexts = 0usize;

            for j in 0..ctx.order() as usize {
                if let Some(parent_ref) = ctx.at_depth(j)
                    && let Some(child_ref) = tree.child_for(parent_ref, sym)
                {
                    let parent = tree.node(parent_ref);
                    let child = tree.node(child_ref);
                    if parent.usage > 0 && child.count > 0 {
                        prob += f64::from(child.count) / f64::from(parent.usage);
                        contexts += 1;
                    }
                }
            }

            if contexts > 0 {
                entropy -= (prob / contexts as f64).log2();
            }
        }
        ctx.advance(tree, sym);
    }

    entropy
}
