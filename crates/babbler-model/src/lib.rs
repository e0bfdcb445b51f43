//! Bidirectional Markov model with a sliding context window.
//!
//! [`Model`] combines a forward tree, a backward tree and the shared
//! [`Dictionary`]. The [`ContextWindow`] tracks where a traversal currently is
//! in one tree for every context length at once; it is used mutably while
//! training and read-only while generating and scoring.
//!
//! Snapshots of a whole model are written and read by the [`brain`] module.

pub mod brain;

use babbler_dict::{Dictionary, DictionaryFull, Symbol, Word};
use babbler_trie::{NodeRef, Tree};
use log::debug;

pub use brain::{BrainError, FORMAT_VERSION, MAGIC, load, save};

/// Context length used when nothing else is configured.
pub const DEFAULT_ORDER: u8 = 5;

/// A sliding context window tracking position in a context tree.
///
/// Stores `order + 2` slots (depths 0 through `order + 1`). Slot 0 is always
/// the tree root; slot `d` is the node reached by the last `d` symbols, or
/// `None` once that context has fallen off the known tree.
///
/// Slots hold [`NodeRef`] indices rather than borrows, so the window can be
/// used alongside `&mut Tree`.
#[derive(Debug, Clone)]
pub struct ContextWindow {
    slots: Vec<Option<NodeRef>>,
    order: u8,
}

impl ContextWindow {
    /// Create a window for a model of the given order, all slots empty.
    pub fn new(order: u8) -> Self {
        ContextWindow {
            slots: vec![None; order as usize + 2],
            order,
        }
    }

    /// Reset the window: slot 0 becomes `root`, all others `None`.
    pub fn initialize(&mut self, root: NodeRef) {
        self.slots.fill(None);
        self.slots[0] = Some(root);
    }

    /// Read-only advance: move every context one symbol forward by finding
    /// (not creating) children. Contexts the tree has never seen become `None`.
    pub fn advance(&mut self, tree: &Tree, symbol: Symbol) {
        for d in (1..=self.order as usize + 1).rev() {
            if let Some(parent) = self.slots[d - 1] {
                self.slots[d] = tree.child_for(parent, symbol);
            }
        }
    }

    /// Training advance: same walk as [`advance`](Self::advance), but each
    /// context gains the child and counts the transition.
    pub fn advance_and_learn(&mut self, tree: &mut Tree, symbol: Symbol) {
        for d in (1..=self.order as usize + 1).rev() {
            if let Some(parent) = self.slots[d - 1] {
                self.slots[d] = Some(tree.add_symbol(parent, symbol));
            }
        }
    }

    /// Context node at depth `j`, if any.
    #[inline]
    pub fn at_depth(&self, j: usize) -> Option<NodeRef> {
        self.slots.get(j).copied().flatten()
    }

    /// Deepest non-empty context among depths 0..=order.
    ///
    /// Depth `order + 1` is a prediction, not a context, and is never
    /// returned.
    pub fn deepest(&self) -> Option<NodeRef> {
        self.slots[..=self.order as usize]
            .iter()
            .rev()
            .find_map(|slot| *slot)
    }

    #[inline]
    pub fn order(&self) -> u8 {
        self.order
    }
}

/// Forward tree + backward tree + shared dictionary.
///
/// Training feeds both trees from the same sentence, left-to-right and
/// right-to-left, so a reply can be grown outward from a seed word in both
/// directions.
#[derive(Debug, Clone)]
pub struct Model {
    /// Maximum context length conditioned on.
    pub order: u8,
    /// Models left-to-right symbol sequences.
    pub forward: Tree,
    /// Models right-to-left symbol sequences.
    pub backward: Tree,
    pub dictionary: Dictionary,
}

impl Model {
    /// Create an empty model with the given order.
    pub fn new(order: u8) -> Self {
        Model {
            order,
            forward: Tree::new(),
            backward: Tree::new(),
            dictionary: Dictionary::new(),
        }
    }

    /// Intern a tokenized sentence and train both trees on it.
    ///
    /// Empty input is a no-op. Every word is interned before any tree is
    /// touched; if the dictionary cannot take the new words, nothing changes.
    pub fn learn(&mut self, words: &[Word]) -> Result<(), DictionaryFull> {
        if words.is_empty() {
            return Ok(());
        }
        let symbols = self.dictionary.intern_all(words)?;
        self.train(&symbols);
        Ok(())
    }

    /// Train both trees on a sentence of already-interned symbols.
    ///
    /// The sentence is framed by [`Symbol::FIN`] on both ends. The forward
    /// tree sees it left-to-right, the backward tree right-to-left.
    ///
    /// # Panics
    /// Panics if a symbol is not allocated in this model's dictionary.
    pub fn train(&mut self, symbols: &[Symbol]) {
        if symbols.is_empty() {
            return;
        }
        let limit = self.dictionary.len();
        assert!(
            symbols.iter().all(|s| s.as_usize() < limit),
            "training symbol outside dictionary (size {limit})"
        );

        train_tree(&mut self.forward, self.order, symbols.iter().copied());
        train_tree(&mut self.backward, self.order, symbols.iter().rev().copied());

        debug!(
            "trained {} symbols: forward {} nodes, backward {} nodes",
            symbols.len(),
            self.forward.len(),
            self.backward.len()
        );
    }

    /// Window positioned at the forward root.
    pub fn forward_context(&self) -> ContextWindow {
        let mut ctx = ContextWindow::new(self.order);
        ctx.initialize(self.forward.root());
        ctx
    }

    /// Window positioned at the backward root.
    pub fn backward_context(&self) -> ContextWindow {
        let mut ctx = ContextWindow::new(self.order);
        ctx.initialize(self.backward.root());
        ctx
    }

    /// Map words to symbols without interning; unknown words are skipped.
    pub fn known_symbols(&self, words: &[Word]) -> Vec<Symbol> {
        words
            .iter()
            .filter_map(|w| self.dictionary.find(w))
            .collect()
    }

    /// Whether two models hold the same dictionary (same ids, same bytes)
    /// and structurally identical trees.
    pub fn same_as(&self, other: &Model) -> bool {
        self.order == other.order
            && self.dictionary.len() == other.dictionary.len()
            && self
                .dictionary
                .iter()
                .zip(other.dictionary.iter())
                .all(|((a_sym, a), (b_sym, b))| a_sym == b_sym && a.as_bytes() == b.as_bytes())
            && self.forward.same_as(&other.forward)
            && self.backward.same_as(&other.backward)
    }
}

fn train_tree(tree: &mut Tree, order: u8, symbols: impl Iterator<Item = Symbol>) {
    let mut ctx = ContextWindow::new(order);
    ctx.initialize(tree.root());

    ctx.advance_and_learn(tree, Symbol::FIN);
    for symbol in symbols {
        ctx.advance_and_learn(tree, symbol);
    }
    ctx.advance_and_learn(tree, Symbol::FIN);
}
