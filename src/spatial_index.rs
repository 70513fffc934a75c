//! Persistent R*-tree mapping boxed keys to values.
//!
//! Nodes are immutable and shared through [`Arc`]. [`SpatialIndex::insert`] and
//! [`SpatialIndex::remove`] copy only the path from the root to the touched
//! leaf and return a new index; every earlier index value stays valid and keeps
//! answering queries for the snapshot it represents.
//!
//! **Supported Queries** (all lazy, restartable by calling them again):
//! - [`SpatialIndex::query_point`] - values whose box contains a block
//! - [`SpatialIndex::query_region`] - entries whose box intersects a region
//! - [`SpatialIndex::entries`] / [`SpatialIndex::values`] - full enumeration
//!
//! Insertion follows the R* heuristics: ChooseSubtree minimises overlap
//! enlargement just above the leaves and volume enlargement higher up, and an
//! overfull node is split along the axis with the least total margin, at the
//! distribution with the least overlap. Forced reinsertion is not used.

use std::fmt;
use std::slice;
use std::sync::Arc;

use crate::config::IndexConfig;
use crate::geometry::{Aabb3, BlockPos, Bounded};

/// Immutable spatial map from keys to values, keyed by each key's box.
///
/// Keys are compared by value equality; inserting a key equal to a stored one
/// replaces that entry. Cloning is O(1).
pub struct SpatialIndex<K, V> {
    root: Option<Arc<Node<K, V>>>,
    len: usize,
    config: IndexConfig,
}

struct Node<K, V> {
    aabb: Aabb3,
    kind: NodeKind<K, V>,
}

enum NodeKind<K, V> {
    Leaf(Vec<Entry<K, V>>),
    Branch(Vec<Arc<Node<K, V>>>),
}

#[derive(Clone)]
struct Entry<K, V> {
    aabb: Aabb3,
    key: K,
    value: V,
}

/// Result of inserting below a node: the replacement node, or two halves of a split.
enum Inserted<K, V> {
    One(Arc<Node<K, V>>),
    Split(Arc<Node<K, V>>, Arc<Node<K, V>>),
}

impl<K, V> Node<K, V> {
    fn leaf(entries: Vec<Entry<K, V>>) -> Arc<Self> {
        let aabb = enclosing(entries.iter().map(|e| e.aabb));
        Arc::new(Self {
            aabb,
            kind: NodeKind::Leaf(entries),
        })
    }

    fn branch(children: Vec<Arc<Self>>) -> Arc<Self> {
        let aabb = enclosing(children.iter().map(|c| c.aabb));
        Arc::new(Self {
            aabb,
            kind: NodeKind::Branch(children),
        })
    }

    const fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    fn sole_child(&self) -> Option<Arc<Self>> {
        match &self.kind {
            NodeKind::Branch(children) if children.len() == 1 => children.first().cloned(),
            _ => None,
        }
    }
}

impl<K: Clone, V: Clone> Node<K, V> {
    fn collect_entries(&self, out: &mut Vec<Entry<K, V>>) {
        match &self.kind {
            NodeKind::Leaf(entries) => out.extend(entries.iter().cloned()),
            NodeKind::Branch(children) => {
                for child in children {
                    child.collect_entries(out);
                }
            }
        }
    }
}

/// Union of a non-empty sequence of boxes. Only called on non-empty nodes.
fn enclosing(mut boxes: impl Iterator<Item = Aabb3>) -> Aabb3 {
    let first = boxes.next().unwrap_or(Aabb3::new(BlockPos::ORIGIN, BlockPos::ORIGIN));
    boxes.fold(first, |acc, b| acc.union(&b))
}

impl<K, V> SpatialIndex<K, V> {
    /// Creates an empty index with the default fan-out.
    ///
    /// # Example
    /// ```
    /// use claimbox::spatial_index::SpatialIndex;
    /// use claimbox::geometry::ClaimBox;
    /// let index: SpatialIndex<ClaimBox, u32> = SpatialIndex::new();
    /// assert!(index.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::with_config(IndexConfig::default())
    }

    /// Creates an empty index with an explicit fan-out.
    pub const fn with_config(config: IndexConfig) -> Self {
        Self {
            root: None,
            len: 0,
            config,
        }
    }

    /// Fan-out this index splits and condenses with.
    pub const fn config(&self) -> IndexConfig {
        self.config
    }

    /// Number of stored entries.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the index holds no entries.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of node levels, zero for an empty index.
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut node = self.root.as_deref();
        while let Some(n) = node {
            height += 1;
            node = match &n.kind {
                NodeKind::Leaf(_) => None,
                NodeKind::Branch(children) => children.first().map(|c| c.as_ref()),
            };
        }
        height
    }

    /// Box enclosing every stored key, `None` when empty.
    pub fn bounds(&self) -> Option<Aabb3> {
        self.root.as_ref().map(|r| r.aabb)
    }

    /// Iterates every `(key, value)` pair in tree order.
    pub fn entries(&self) -> Entries<'_, K, V> {
        Entries::new(self.root.as_deref(), Filter::All)
    }

    /// Iterates every stored key.
    pub fn keys(&self) -> impl Iterator<Item = &K> + Clone + '_ {
        self.entries().map(|(k, _)| k)
    }

    /// Iterates every stored value; used to export the whole index.
    pub fn values(&self) -> Values<'_, K, V> {
        Values {
            inner: self.entries(),
        }
    }

    /// Values whose box contains `pos`.
    ///
    /// # Example
    /// ```
    /// use claimbox::spatial_index::SpatialIndex;
    /// use claimbox::geometry::{BlockPos, ClaimBox};
    /// let home = ClaimBox::centered(BlockPos::new(0, 64, 0), 8, 8).unwrap();
    /// let index = SpatialIndex::new().insert(home, "home");
    /// assert_eq!(index.query_point(BlockPos::new(3, 60, -2)).collect::<Vec<_>>(), vec![&"home"]);
    /// assert_eq!(index.query_point(BlockPos::new(30, 60, 0)).count(), 0);
    /// ```
    pub fn query_point(&self, pos: BlockPos) -> Values<'_, K, V> {
        Values {
            inner: self.query_point_entries(pos),
        }
    }

    /// `(key, value)` pairs whose box contains `pos`.
    pub fn query_point_entries(&self, pos: BlockPos) -> Entries<'_, K, V> {
        Entries::new(self.root.as_deref(), Filter::Point(pos))
    }

    /// `(key, value)` pairs whose box intersects `region`.
    pub fn query_region(&self, region: &Aabb3) -> Entries<'_, K, V> {
        Entries::new(self.root.as_deref(), Filter::Region(*region))
    }
}

impl<K, V> SpatialIndex<K, V>
where
    K: Bounded + PartialEq,
{
    /// Value stored under `key`, matched by key equality.
    pub fn get(&self, key: &K) -> Option<&V> {
        let aabb = key.aabb();
        let mut stack: Vec<&Node<K, V>> = self.root.as_deref().into_iter().collect();
        while let Some(node) = stack.pop() {
            match &node.kind {
                NodeKind::Leaf(entries) => {
                    if let Some(e) = entries.iter().find(|e| e.key == *key) {
                        return Some(&e.value);
                    }
                }
                NodeKind::Branch(children) => {
                    stack.extend(children.iter().filter(|c| c.aabb.contains(&aabb)).map(|c| c.as_ref()));
                }
            }
        }
        None
    }

    /// Whether an entry is stored under `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }
}

impl<K, V> SpatialIndex<K, V>
where
    K: Bounded + PartialEq + Clone,
    V: Clone,
{
    /// Returns a new index that also maps `key` to `value`.
    ///
    /// An entry under an equal key is replaced. The receiver is unchanged.
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        let mut next = self.remove(&key);
        next.push_entry(Entry {
            aabb: key.aabb(),
            key,
            value,
        });
        next
    }

    /// Returns a new index without the entry stored under `key`.
    ///
    /// Matching is by key equality, not by box containment. Removing an absent
    /// key returns an index equal to the receiver.
    #[must_use]
    pub fn remove(&self, key: &K) -> Self {
        let Some(root) = &self.root else {
            return self.clone();
        };
        let aabb = key.aabb();
        let mut orphans = Vec::new();
        let Some(mut root) = remove_below(root, key, &aabb, self.config.min_children(), true, &mut orphans)
        else {
            return self.clone();
        };
        while let Some(only) = root.as_ref().and_then(|n| n.sole_child()) {
            root = Some(only);
        }
        let mut next = Self {
            root,
            len: self.len - 1 - orphans.len(),
            config: self.config,
        };
        for entry in orphans {
            next.push_entry(entry);
        }
        next
    }

    /// Inserts an entry whose key is known to be absent, replacing only the local root.
    fn push_entry(&mut self, entry: Entry<K, V>) {
        let root = match &self.root {
            None => Node::leaf(vec![entry]),
            Some(root) => match insert_below(root, entry, &self.config) {
                Inserted::One(node) => node,
                Inserted::Split(left, right) => Node::branch(vec![left, right]),
            },
        };
        self.root = Some(root);
        self.len += 1;
    }
}

fn insert_below<K: Clone, V: Clone>(node: &Node<K, V>, entry: Entry<K, V>, config: &IndexConfig) -> Inserted<K, V> {
    match &node.kind {
        NodeKind::Leaf(entries) => {
            let mut entries = entries.clone();
            entries.push(entry);
            if entries.len() <= config.max_children() {
                return Inserted::One(Node::leaf(entries));
            }
            let (left, right) = split(entries, |e| e.aabb, config.min_children());
            Inserted::Split(Node::leaf(left), Node::leaf(right))
        }
        NodeKind::Branch(children) => {
            let idx = choose_subtree(children, &entry.aabb);
            let mut children = children.clone();
            match insert_below(&children[idx], entry, config) {
                Inserted::One(child) => children[idx] = child,
                Inserted::Split(left, right) => {
                    children[idx] = left;
                    children.insert(idx + 1, right);
                }
            }
            if children.len() <= config.max_children() {
                return Inserted::One(Node::branch(children));
            }
            let (left, right) = split(children, |c| c.aabb, config.min_children());
            Inserted::Split(Node::branch(left), Node::branch(right))
        }
    }
}

/// R* ChooseSubtree over the children of a branch.
fn choose_subtree<K, V>(children: &[Arc<Node<K, V>>], aabb: &Aabb3) -> usize {
    let above_leaves = children.first().is_some_and(|c| c.is_leaf());
    children
        .iter()
        .enumerate()
        .min_by_key(|&(i, child)| {
            let enlarged = child.aabb.union(aabb);
            let overlap = if above_leaves {
                overlap_growth(children, i, &child.aabb, &enlarged)
            } else {
                0
            };
            (overlap, enlarged.volume() - child.aabb.volume(), child.aabb.volume())
        })
        .map_or(0, |(i, _)| i)
}

fn overlap_growth<K, V>(children: &[Arc<Node<K, V>>], skip: usize, before: &Aabb3, after: &Aabb3) -> i128 {
    children
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != skip)
        .map(|(_, other)| after.overlap_volume(&other.aabb) - before.overlap_volume(&other.aabb))
        .sum()
}

/// R* topological split of an overfull node into two groups of at least `min` items.
fn split<T>(mut items: Vec<T>, bbox_of: impl Fn(&T) -> Aabb3, min: usize) -> (Vec<T>, Vec<T>) {
    let n = items.len();
    let sort = |items: &mut Vec<T>, axis: usize, by_upper: bool| {
        items.sort_by_key(|t| {
            let (lo, hi) = bbox_of(t).axis_bounds(axis);
            if by_upper { (hi, lo) } else { (lo, hi) }
        });
    };

    // ChooseSplitAxis: least sum of margins over every distribution of both sortings.
    let mut best_axis = 0;
    let mut best_margin = i64::MAX;
    for axis in 0..3 {
        let mut margin = 0;
        for by_upper in [false, true] {
            sort(&mut items, axis, by_upper);
            let (prefix, suffix) = sweep(&items, &bbox_of);
            margin += (min..=n - min)
                .map(|k| prefix[k - 1].margin() + suffix[k].margin())
                .sum::<i64>();
        }
        if margin < best_margin {
            best_margin = margin;
            best_axis = axis;
        }
    }

    // ChooseSplitIndex: least overlap, then least combined volume.
    let mut best = (false, min, (i128::MAX, i128::MAX));
    for by_upper in [false, true] {
        sort(&mut items, best_axis, by_upper);
        let (prefix, suffix) = sweep(&items, &bbox_of);
        for k in min..=n - min {
            let (left, right) = (prefix[k - 1], suffix[k]);
            let cost = (left.overlap_volume(&right), left.volume() + right.volume());
            if cost < best.2 {
                best = (by_upper, k, cost);
            }
        }
    }

    sort(&mut items, best_axis, best.0);
    let right = items.split_off(best.1);
    (items, right)
}

/// Running unions from the left (`prefix[i]` covers `0..=i`) and right (`suffix[i]` covers `i..`).
fn sweep<T>(items: &[T], bbox_of: &impl Fn(&T) -> Aabb3) -> (Vec<Aabb3>, Vec<Aabb3>) {
    let boxes: Vec<Aabb3> = items.iter().map(bbox_of).collect();
    let mut prefix: Vec<Aabb3> = Vec::with_capacity(boxes.len());
    for (i, b) in boxes.iter().enumerate() {
        prefix.push(if i == 0 { *b } else { prefix[i - 1].union(b) });
    }
    let mut suffix = boxes.clone();
    for i in (0..boxes.len().saturating_sub(1)).rev() {
        suffix[i] = boxes[i].union(&suffix[i + 1]);
    }
    (prefix, suffix)
}

/// Removes `key` below `node`.
///
/// Returns `None` when the key is not in this subtree. Otherwise returns the
/// replacement node, or `Some(None)` when the node emptied or was dissolved
/// for falling under `min` children; a dissolved node's entries are moved
/// to `orphans` for reinsertion.
fn remove_below<K, V>(
    node: &Node<K, V>,
    key: &K,
    aabb: &Aabb3,
    min: usize,
    is_root: bool,
    orphans: &mut Vec<Entry<K, V>>,
) -> Option<Option<Arc<Node<K, V>>>>
where
    K: PartialEq + Clone,
    V: Clone,
{
    match &node.kind {
        NodeKind::Leaf(entries) => {
            let pos = entries.iter().position(|e| e.key == *key)?;
            let mut entries = entries.clone();
            drop(entries.remove(pos));
            if entries.is_empty() {
                return Some(None);
            }
            if !is_root && entries.len() < min {
                orphans.extend(entries);
                return Some(None);
            }
            Some(Some(Node::leaf(entries)))
        }
        NodeKind::Branch(children) => {
            for (i, child) in children.iter().enumerate() {
                if !child.aabb.contains(aabb) {
                    continue;
                }
                let Some(replacement) = remove_below(child, key, aabb, min, false, orphans) else {
                    continue;
                };
                let mut children = children.clone();
                match replacement {
                    Some(new_child) => children[i] = new_child,
                    None => drop(children.remove(i)),
                }
                if children.is_empty() {
                    return Some(None);
                }
                if !is_root && children.len() < min {
                    for c in &children {
                        c.collect_entries(orphans);
                    }
                    return Some(None);
                }
                return Some(Some(Node::branch(children)));
            }
            None
        }
    }
}

impl<K, V> Clone for SpatialIndex<K, V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            len: self.len,
            config: self.config,
        }
    }
}

impl<K, V> Default for SpatialIndex<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Extensional equality: same stored pairs, regardless of tree shape.
impl<K, V> PartialEq for SpatialIndex<K, V>
where
    K: Bounded + PartialEq,
    V: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.entries().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K, V> FromIterator<(K, V)> for SpatialIndex<K, V>
where
    K: Bounded + PartialEq + Clone,
    V: Clone,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter().fold(Self::new(), |index, (k, v)| index.insert(k, v))
    }
}

impl<K, V> fmt::Debug for SpatialIndex<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("len", &self.len)
            .field("height", &self.height())
            .field("bounds", &self.bounds())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug)]
enum Filter {
    All,
    Point(BlockPos),
    Region(Aabb3),
}

impl Filter {
    #[inline]
    const fn accepts(&self, aabb: &Aabb3) -> bool {
        match self {
            Self::All => true,
            Self::Point(p) => aabb.contains_point(*p),
            Self::Region(r) => aabb.intersects(r),
        }
    }
}

/// Lazy depth-first walk over the entries matching a query.
///
/// Yields in no particular order. A clone resumes from the same position.
pub struct Entries<'a, K, V> {
    filter: Filter,
    stack: Vec<&'a Node<K, V>>,
    leaf: slice::Iter<'a, Entry<K, V>>,
}

impl<'a, K, V> Entries<'a, K, V> {
    fn new(root: Option<&'a Node<K, V>>, filter: Filter) -> Self {
        Self {
            filter,
            stack: root.into_iter().filter(|r| filter.accepts(&r.aabb)).collect(),
            leaf: Default::default(),
        }
    }
}

impl<'a, K, V> Iterator for Entries<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let filter = self.filter;
        loop {
            if let Some(e) = self.leaf.by_ref().find(|e| filter.accepts(&e.aabb)) {
                return Some((&e.key, &e.value));
            }
            let node = self.stack.pop()?;
            match &node.kind {
                NodeKind::Leaf(entries) => self.leaf = entries.iter(),
                NodeKind::Branch(children) => self
                    .stack
                    .extend(children.iter().filter(|c| filter.accepts(&c.aabb)).map(|c| c.as_ref())),
            }
        }
    }
}

impl<K, V> Clone for Entries<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            filter: self.filter,
            stack: self.stack.clone(),
            leaf: self.leaf.clone(),
        }
    }
}

impl<K, V> fmt::Debug for Entries<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entries")
            .field("filter", &self.filter)
            .field("pending_nodes", &self.stack.len())
            .finish_non_exhaustive()
    }
}

/// Lazy iterator over the values of matching entries.
pub struct Values<'a, K, V> {
    inner: Entries<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }
}

impl<K, V> Clone for Values<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> fmt::Debug for Values<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Values").field(&self.inner).finish()
    }
}

#[cfg(test)]
impl<K, V> SpatialIndex<K, V> {
    /// Panics unless every structural invariant of the tree holds.
    pub(crate) fn assert_invariants(&self) {
        fn walk<K, V>(node: &Node<K, V>, depth: usize, is_root: bool, config: &IndexConfig, leaf_depths: &mut Vec<usize>) {
            let boxes: Vec<Aabb3> = match &node.kind {
                NodeKind::Leaf(entries) => {
                    leaf_depths.push(depth);
                    entries.iter().map(|e| e.aabb).collect()
                }
                NodeKind::Branch(children) => {
                    for c in children {
                        walk(c, depth + 1, false, config, leaf_depths);
                    }
                    children.iter().map(|c| c.aabb).collect()
                }
            };
            let count = boxes.len();
            assert!(count >= 1, "empty node");
            assert!(count <= config.max_children(), "overfull node: {count}");
            if !is_root {
                assert!(count >= config.min_children(), "underfull node: {count}");
            }
            assert_eq!(node.aabb, enclosing(boxes.into_iter()), "stale node box");
        }

        let Some(root) = &self.root else {
            assert_eq!(self.len, 0, "empty tree with nonzero len");
            return;
        };
        let mut leaf_depths = Vec::new();
        walk(root, 0, true, &self.config, &mut leaf_depths);
        assert!(leaf_depths.windows(2).all(|w| w[0] == w[1]), "unbalanced leaves");
        assert_eq!(self.entries().count(), self.len, "len out of sync");
        if let NodeKind::Branch(children) = &root.kind {
            assert!(children.len() >= 2, "branch root with a single child");
        }
    }
}
