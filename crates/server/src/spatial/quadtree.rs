//! Point quadtree for proximity queries.
//!
//! Leaves hold `(x, y, element)` entries and split into four quarters once
//! they hold more than the configured capacity. Points may coincide; a leaf
//! whose entries all share one coordinate never splits, since no split line
//! could separate them.

use std::fmt;

use super::view::{any_contains, any_overlaps};
use super::{SpatialError, View};

/// Entries a leaf holds before it splits.
pub const DEFAULT_LEAF_CAPACITY: usize = 5;

/// Depth at which leaves stop splitting regardless of their size.
pub const DEFAULT_MAX_DEPTH: u32 = 32;

#[derive(Debug, Clone)]
struct Entry<T> {
    x: f64,
    y: f64,
    elem: T,
}

#[derive(Debug, Clone, Copy)]
struct Limits {
    leaf_capacity: usize,
    max_depth: u32,
}

enum Node<T> {
    Leaf {
        view: View,
        entries: Vec<Entry<T>>,
    },
    Internal {
        view: View,
        /// Ordered as returned by [`View::quarters`].
        children: Box<[Node<T>; 4]>,
    },
}

impl<T> Node<T> {
    fn leaf(view: View) -> Self {
        Node::Leaf { view, entries: Vec::new() }
    }

    #[inline]
    fn view(&self) -> &View {
        match self {
            Node::Leaf { view, .. } | Node::Internal { view, .. } => view,
        }
    }

    fn insert(&mut self, entry: Entry<T>, depth: u32, limits: Limits) {
        let split = match self {
            Node::Internal { view, children } => {
                let idx = quarter_of(view, entry.x, entry.y);
                children[idx].insert(entry, depth + 1, limits);
                return;
            }
            Node::Leaf { entries, .. } => {
                entries.push(entry);
                entries.len() > limits.leaf_capacity
                    && depth < limits.max_depth
                    && !all_coincident(entries)
            }
        };
        if split {
            self.split(depth, limits);
        }
    }

    /// Turn a leaf into an internal node and redistribute its entries.
    fn split(&mut self, depth: u32, limits: Limits) {
        let Node::Leaf { view, entries } = self else {
            return;
        };
        let view = *view;
        let entries = std::mem::take(entries);
        let children = view.quarters().map(Node::leaf);
        *self = Node::Internal { view, children: Box::new(children) };
        for entry in entries {
            self.insert(entry, depth, limits);
        }
    }

    fn survey<F>(&self, regions: &[View], visit: &mut F)
    where
        F: FnMut(f64, f64, &T),
    {
        match self {
            Node::Internal { children, .. } => {
                for child in children.iter() {
                    if any_overlaps(regions, child.view()) {
                        child.survey(regions, visit);
                    }
                }
            }
            Node::Leaf { entries, .. } => {
                for e in entries {
                    if any_contains(regions, e.x, e.y) {
                        visit(e.x, e.y, &e.elem);
                    }
                }
            }
        }
    }

    fn delete<P>(&mut self, region: &View, pred: &mut P) -> usize
    where
        P: FnMut(f64, f64, &T) -> bool,
    {
        match self {
            Node::Internal { children, .. } => children
                .iter_mut()
                .filter(|child| child.view().overlaps(region))
                .map(|child| child.delete(region, pred))
                .sum(),
            Node::Leaf { entries, .. } => {
                let before = entries.len();
                entries.retain(|e| !(region.contains(e.x, e.y) && pred(e.x, e.y, &e.elem)));
                before - entries.len()
            }
        }
    }

    fn count_nodes(&self) -> (usize, u32) {
        match self {
            Node::Leaf { .. } => (1, 0),
            Node::Internal { children, .. } => {
                children.iter().fold((1, 0), |(nodes, depth), child| {
                    let (n, d) = child.count_nodes();
                    (nodes + n, depth.max(d + 1))
                })
            }
        }
    }
}

/// Index of the quarter owning `(x, y)`.
///
/// Points on the vertical split line go left, points on the horizontal one go
/// up, matching the closed views produced by [`View::quarters`].
#[inline]
fn quarter_of(view: &View, x: f64, y: f64) -> usize {
    let right = x > view.mid_x();
    let bottom = y > view.mid_y();
    (bottom as usize) * 2 + right as usize
}

fn all_coincident<T>(entries: &[Entry<T>]) -> bool {
    match entries.split_first() {
        Some((first, rest)) => rest.iter().all(|e| e.x == first.x && e.y == first.y),
        None => true,
    }
}

/// Quadtree over a fixed bounding view.
///
/// Elements are opaque to the tree; [`QuadTree::delete`] relies on the
/// caller's predicate to pick which of the elements under a region to drop.
pub struct QuadTree<T> {
    view: View,
    root: Node<T>,
    limits: Limits,
    len: usize,
}

impl<T> QuadTree<T> {
    /// Create a tree covering `view` with default leaf capacity and depth.
    pub fn new(view: View) -> Self {
        Self::with_limits(view, DEFAULT_LEAF_CAPACITY, DEFAULT_MAX_DEPTH)
    }

    /// Create a tree with a custom leaf capacity (at least 1) and max depth.
    pub fn with_limits(view: View, leaf_capacity: usize, max_depth: u32) -> Self {
        Self {
            view,
            root: Node::leaf(view),
            limits: Limits {
                leaf_capacity: leaf_capacity.max(1),
                max_depth,
            },
            len: 0,
        }
    }

    /// The bounding view fixed at construction.
    #[inline]
    pub fn view(&self) -> View {
        self.view
    }

    /// Number of stored elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert `elem` at `(x, y)`.
    ///
    /// Points outside the tree's view are rejected and leave the tree
    /// untouched.
    pub fn insert(&mut self, x: f64, y: f64, elem: T) -> Result<(), SpatialError> {
        if !self.view.contains(x, y) {
            return Err(SpatialError::OutOfBounds { x, y, view: self.view });
        }
        self.root.insert(Entry { x, y, elem }, 0, self.limits);
        self.len += 1;
        Ok(())
    }

    /// Visit every element lying in at least one of `regions`, exactly once.
    ///
    /// Regions are clipped to the tree's view and those already enclosed by
    /// an earlier region are dropped. A subtree is descended once if any
    /// region overlaps it, and each entry is tested once against the whole
    /// region set, so overlapping regions never yield duplicates. Visit order
    /// is fixed for a given tree and input.
    pub fn survey<F>(&self, regions: &[View], mut visit: F)
    where
        F: FnMut(f64, f64, &T),
    {
        let regions = self.clip_regions(regions);
        if regions.is_empty() {
            return;
        }
        self.root.survey(&regions, &mut visit);
    }

    /// Remove every element in `region` for which `pred` returns true.
    ///
    /// Returns how many were removed; zero is a normal outcome. Emptied
    /// leaves are kept, the tree never merges back.
    pub fn delete<P>(&mut self, region: &View, mut pred: P) -> usize
    where
        P: FnMut(f64, f64, &T) -> bool,
    {
        if !region.overlaps(&self.view) {
            return 0;
        }
        let removed = self.root.delete(region, &mut pred);
        self.len -= removed;
        removed
    }

    fn clip_regions(&self, regions: &[View]) -> Vec<View> {
        let mut clipped: Vec<View> = Vec::with_capacity(regions.len());
        for region in regions {
            let Some(v) = region.intersect(&self.view) else {
                continue;
            };
            if !clipped.iter().any(|c| c.encloses(&v)) {
                clipped.push(v);
            }
        }
        clipped
    }
}

impl<T> fmt::Debug for QuadTree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (nodes, depth) = self.root.count_nodes();
        f.debug_struct("QuadTree")
            .field("view", &self.view)
            .field("len", &self.len)
            .field("nodes", &nodes)
            .field("depth", &depth)
            .finish()
    }
}
