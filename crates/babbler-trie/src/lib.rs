//! Arena-based symbol trie with sorted children and saturating counts.
//!
//! Nodes live in a contiguous arena (`Vec<Node>`) and are referenced by opaque
//! [`NodeRef`] handles, which are plain indices. Indices don't borrow the
//! arena, so a context window can hold many of them while the tree is being
//! extended.
//!
//! Children of each node are kept sorted by [`Symbol`] for O(log n) binary
//! search, and node creation order depends only on insertion order, so two
//! trees fed the same symbol stream are identical. Edge counts saturate at
//! `u16::MAX`; once reached, neither the child's count nor its parent's usage
//! moves again.

use babbler_dict::Symbol;

/// Opaque handle into the tree's node arena.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct NodeRef(u32);

impl NodeRef {
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[inline]
    fn from_usize(index: usize) -> Self {
        assert!(index <= u32::MAX as usize, "node arena overflow: {index}");
        NodeRef(index as u32)
    }
}

/// One edge-labelled position in an n-gram path.
///
/// `P(child | parent) = child.count / parent.usage`
#[derive(Debug, Clone)]
pub struct Node {
    /// Label of the incoming edge. The root carries [`Symbol::ERROR`].
    pub symbol: Symbol,
    /// Total traversals through this node, i.e. the sum of the counts that
    /// were added to its children.
    pub usage: u32,
    /// How many times this child was chosen from its parent. Saturates at
    /// `u16::MAX`.
    pub count: u16,
    /// Child handles, kept sorted by symbol.
    children: Vec<NodeRef>,
}

impl Node {
    fn new(symbol: Symbol) -> Self {
        Node {
            symbol,
            usage: 0,
            count: 0,
            children: Vec::new(),
        }
    }
}

/// Flat record used to rebuild a tree from a pre-order stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRecord {
    pub symbol: Symbol,
    pub usage: u32,
    pub count: u16,
    pub child_count: u16,
}

/// Arena-based context tree. The root node is always at index 0.
///
/// # Example
///
/// ```
/// use babbler_trie::Tree;
/// use babbler_dict::Symbol;
///
/// let mut tree = Tree::new();
/// let root = tree.root();
///
/// let child = tree.add_symbol(root, Symbol(2));
/// assert_eq!(tree.node(child).count, 1);
/// assert_eq!(tree.node(root).usage, 1);
///
/// let same = tree.add_symbol(root, Symbol(2));
/// assert_eq!(same, child);
/// assert_eq!(tree.node(child).count, 2);
/// ```
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Create a tree holding only the root ("no context yet").
    pub fn new() -> Self {
        Tree {
            nodes: vec![Node::new(Symbol::ERROR)],
        }
    }

    #[inline]
    pub fn root(&self) -> NodeRef {
        NodeRef(0)
    }

    /// Access a node by reference.
    #[inline]
    pub fn node(&self, r: NodeRef) -> &Node {
        &self.nodes[r.as_usize()]
    }

    fn search(&self, parent: NodeRef, symbol: Symbol) -> Result<usize, usize> {
        self.nodes[parent.as_usize()]
            .children
            .binary_search_by(|child| self.nodes[child.as_usize()].symbol.cmp(&symbol))
    }

    /// Find an existing child of `parent` labelled `symbol`.
    pub fn child_for(&self, parent: NodeRef, symbol: Symbol) -> Option<NodeRef> {
        self.search(parent, symbol)
            .ok()
            .map(|idx| self.nodes[parent.as_usize()].children[idx])
    }

    /// Find the child of `parent` labelled `symbol`, creating a zeroed one at
    /// its sorted position if absent. Counts are left untouched.
    pub fn child_for_or_insert(&mut self, parent: NodeRef, symbol: Symbol) -> NodeRef {
        match self.search(parent, symbol) {
            Ok(idx) => self.nodes[parent.as_usize()].children[idx],
            Err(idx) => {
                let child = NodeRef::from_usize(self.nodes.len());
                self.nodes.push(Node::new(symbol));
                self.nodes[parent.as_usize()].children.insert(idx, child);
                child
            }
        }
    }

    /// Increment a node's usage.
    #[inline]
    pub fn bump(&mut self, node: NodeRef) {
        let node = &mut self.nodes[node.as_usize()];
        node.usage = node.usage.saturating_add(1);
    }

    /// Record one traversal of the `parent -> child` edge: the child's count
    /// and the parent's usage both go up, unless the count is saturated.
    pub fn bump_edge(&mut self, parent: NodeRef, child: NodeRef) {
        let child = &mut self.nodes[child.as_usize()];
        if child.count < u16::MAX {
            child.count += 1;
            self.bump(parent);
        }
    }

    /// Training step: find or create `symbol` under `parent` and count the
    /// transition. Returns the child.
    pub fn add_symbol(&mut self, parent: NodeRef, symbol: Symbol) -> NodeRef {
        let child = self.child_for_or_insert(parent, symbol);
        self.bump_edge(parent, child);
        child
    }

    /// Child handles of a node, sorted by symbol.
    #[inline]
    pub fn children(&self, parent: NodeRef) -> &[NodeRef] {
        &self.nodes[parent.as_usize()].children
    }

    #[inline]
    pub fn branch_count(&self, parent: NodeRef) -> usize {
        self.nodes[parent.as_usize()].children.len()
    }

    /// Total number of nodes (including root).
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree contains only the root.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Length of the longest root-to-leaf path, in edges.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self.root(), 0usize)];
        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            for &child in self.children(node) {
                stack.push((child, depth + 1));
            }
        }
        deepest
    }

    /// Visit every node in pre-order (node, then children in symbol order).
    pub fn pre_order(&self) -> PreOrder<'_> {
        PreOrder {
            tree: self,
            stack: vec![self.root()],
        }
    }

    /// The record [`from_pre_order`](Self::from_pre_order) expects for `node`.
    pub fn record(&self, node: NodeRef) -> NodeRecord {
        let n = self.node(node);
        NodeRecord {
            symbol: n.symbol,
            usage: n.usage,
            count: n.count,
            child_count: n.children.len() as u16,
        }
    }

    /// Rebuild a tree from pre-order records pulled from `next`.
    ///
    /// `next` is called once per node; it returns the record or an error,
    /// which is passed straight through. `check` sees each record together
    /// with its depth and may reject it. Children must arrive in strictly
    /// ascending symbol order.
    pub fn from_pre_order<E>(
        mut next: impl FnMut() -> Result<NodeRecord, E>,
        mut check: impl FnMut(&NodeRecord, usize) -> Result<(), E>,
        unsorted: impl Fn(Symbol) -> E,
    ) -> Result<Tree, E> {
        let root_rec = next()?;
        check(&root_rec, 0)?;

        let mut tree = Tree::new();
        {
            let root = &mut tree.nodes[0];
            root.symbol = root_rec.symbol;
            root.usage = root_rec.usage;
            root.count = root_rec.count;
            root.children.reserve(root_rec.child_count as usize);
        }

        // (node, children still to read, depth)
        let mut stack = vec![(tree.root(), root_rec.child_count, 0usize)];
        while let Some(top) = stack.last_mut() {
            if top.1 == 0 {
                stack.pop();
                continue;
            }
            top.1 -= 1;
            let (parent, _, depth) = *top;

            let rec = next()?;
            check(&rec, depth + 1)?;
            if let Some(&last) = tree.nodes[parent.as_usize()].children.last()
                && tree.nodes[last.as_usize()].symbol >= rec.symbol
            {
                return Err(unsorted(rec.symbol));
            }

            let child = NodeRef::from_usize(tree.nodes.len());
            let mut node = Node::new(rec.symbol);
            node.usage = rec.usage;
            node.count = rec.count;
            node.children.reserve(rec.child_count as usize);
            tree.nodes.push(node);
            tree.nodes[parent.as_usize()].children.push(child);

            stack.push((child, rec.child_count, depth + 1));
        }

        Ok(tree)
    }

    /// Whether two trees have the same shape and the same counts everywhere.
    pub fn same_as(&self, other: &Tree) -> bool {
        self.len() == other.len()
            && self
                .pre_order()
                .zip(other.pre_order())
                .all(|(a, b)| self.record(a) == other.record(b))
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

/// Pre-order iterator over node handles. See [`Tree::pre_order`].
pub struct PreOrder<'a> {
    tree: &'a Tree,
    stack: Vec<NodeRef>,
}

impl Iterator for PreOrder<'_> {
    type Item = NodeRef;

    fn next(&mut self) -> Option<NodeRef> {
        let node = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(node).iter().rev().copied());
        Some(node)
    }
}
