//! Arena-backed point quadtree.
//!
//! Quads are stored in a flat arena and addressed by [`QuadId`]. An internal
//! quad has up to four children indexed `bottom << 1 | right`; a leaf holds a
//! single point and a link to the next point sharing exactly the same
//! coordinates. The root square starts at an integer extent and only ever
//! doubles, so quadrant boundaries stay exact as the tree grows.

use std::iter;

/// Anything with a planar position.
pub trait QuadPoint {
    fn position(&self) -> (f64, f64);
}

impl QuadPoint for [f64; 2] {
    fn position(&self) -> (f64, f64) {
        (self[0], self[1])
    }
}

impl QuadPoint for (f64, f64) {
    fn position(&self) -> (f64, f64) {
        *self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuadId(usize);

/// Aggregate slot filled in by [`Quadtree::visit_after`] callbacks.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Mass {
    pub value: f64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Extent {
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    fn child(&self, quadrant: usize) -> Self {
        let xm = (self.x0 + self.x1) / 2.0;
        let ym = (self.y0 + self.y1) / 2.0;
        match quadrant {
            0 => Self { x0: self.x0, y0: self.y0, x1: xm, y1: ym },
            1 => Self { x0: xm, y0: self.y0, x1: self.x1, y1: ym },
            2 => Self { x0: self.x0, y0: ym, x1: xm, y1: self.y1 },
            _ => Self { x0: xm, y0: ym, x1: self.x1, y1: self.y1 },
        }
    }
}

#[derive(Debug, Clone)]
pub enum QuadKind<T> {
    Internal([Option<QuadId>; 4]),
    Leaf { point: T, next: Option<QuadId> },
}

#[derive(Debug, Clone)]
pub struct Quad<T> {
    pub kind: QuadKind<T>,
    pub mass: Mass,
}

impl<T> Quad<T> {
    fn leaf(point: T) -> Self {
        Self {
            kind: QuadKind::Leaf { point, next: None },
            mass: Mass::default(),
        }
    }

    fn internal(children: [Option<QuadId>; 4]) -> Self {
        Self {
            kind: QuadKind::Internal(children),
            mass: Mass::default(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, QuadKind::Leaf { .. })
    }

    pub fn children(&self) -> Option<&[Option<QuadId>; 4]> {
        match &self.kind {
            QuadKind::Internal(children) => Some(children),
            QuadKind::Leaf { .. } => None,
        }
    }

    pub fn point(&self) -> Option<&T> {
        match &self.kind {
            QuadKind::Leaf { point, .. } => Some(point),
            QuadKind::Internal(_) => None,
        }
    }

    fn next(&self) -> Option<QuadId> {
        match &self.kind {
            QuadKind::Leaf { next, .. } => *next,
            QuadKind::Internal(_) => None,
        }
    }
}

fn quadrant(right: bool, bottom: bool) -> usize {
    (usize::from(bottom) << 1) | usize::from(right)
}

#[derive(Debug, Clone)]
pub struct Quadtree<T> {
    quads: Vec<Option<Quad<T>>>,
    free: Vec<usize>,
    root: Option<QuadId>,
    extent: Option<Extent>,
}

impl<T> Default for Quadtree<T> {
    fn default() -> Self {
        Self {
            quads: Vec::new(),
            free: Vec::new(),
            root: None,
            extent: None,
        }
    }
}

impl<T: QuadPoint> Quadtree<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: impl IntoIterator<Item = T>) -> Self {
        let mut tree = Self::new();
        tree.add_all(points);
        tree
    }

    pub fn root(&self) -> Option<QuadId> {
        self.root
    }

    pub fn extent(&self) -> Option<Extent> {
        self.extent
    }

    pub fn quad(&self, id: QuadId) -> Option<&Quad<T>> {
        self.quads.get(id.0).and_then(Option::as_ref)
    }

    pub fn quad_mut(&mut self, id: QuadId) -> Option<&mut Quad<T>> {
        self.quads.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Points stored at a leaf, starting with the leaf itself and following
    /// the chain of coincident points.
    pub fn chain(&self, leaf: QuadId) -> impl Iterator<Item = &T> + '_ {
        let mut cursor = Some(leaf);
        iter::from_fn(move || {
            let quad = self.quad(cursor?)?;
            cursor = quad.next();
            quad.point()
        })
    }

    /// Inserts a point, growing the extent as needed. Points with a
    /// non-finite coordinate are ignored.
    pub fn add(&mut self, point: T) -> &mut Self {
        let (x, y) = point.position();
        if !x.is_finite() || !y.is_finite() {
            return self;
        }
        self.cover(x, y);
        self.insert(x, y, point);
        self
    }

    /// Inserts many points, covering their joint extent once up front.
    pub fn add_all(&mut self, points: impl IntoIterator<Item = T>) -> &mut Self {
        let points = points
            .into_iter()
            .filter(|point| {
                let (x, y) = point.position();
                x.is_finite() && y.is_finite()
            })
            .collect::<Vec<_>>();

        let mut bounds: Option<Extent> = None;
        for point in &points {
            let (x, y) = point.position();
            bounds = Some(match bounds {
                None => Extent { x0: x, y0: y, x1: x, y1: y },
                Some(b) => Extent {
                    x0: b.x0.min(x),
                    y0: b.y0.min(y),
                    x1: b.x1.max(x),
                    y1: b.y1.max(y),
                },
            });
        }
        let Some(bounds) = bounds else {
            return self;
        };

        self.cover(bounds.x0, bounds.y0).cover(bounds.x1, bounds.y1);
        for point in points {
            let (x, y) = point.position();
            self.insert(x, y, point);
        }
        self
    }

    /// Expands the extent until it contains `(x, y)`, doubling the square and
    /// re-rooting the tree once per doubling.
    pub fn cover(&mut self, x: f64, y: f64) -> &mut Self {
        if !x.is_finite() || !y.is_finite() {
            return self;
        }

        let Some(Extent {
            mut x0,
            mut y0,
            mut x1,
            mut y1,
        }) = self.extent
        else {
            let x0 = x.floor();
            let y0 = y.floor();
            self.extent = Some(Extent { x0, y0, x1: x0 + 1.0, y1: y0 + 1.0 });
            return self;
        };

        let wraps = self
            .root
            .and_then(|root| self.quad(root))
            .is_some_and(|root| !root.is_leaf());
        let mut node = self.root;
        let mut z = x1 - x0;

        while x0 > x || x >= x1 || y0 > y || y >= y1 {
            let i = quadrant(x < x0, y < y0);
            if wraps {
                let mut children = [None; 4];
                children[i] = node;
                node = Some(self.alloc(Quad::internal(children)));
            }
            z *= 2.0;
            match i {
                0 => {
                    x1 = x0 + z;
                    y1 = y0 + z;
                }
                1 => {
                    x0 = x1 - z;
                    y1 = y0 + z;
                }
                2 => {
                    x1 = x0 + z;
                    y0 = y1 - z;
                }
                _ => {
                    x0 = x1 - z;
                    y0 = y1 - z;
                }
            }
        }

        if wraps {
            self.root = node;
        }
        self.extent = Some(Extent { x0, y0, x1, y1 });
        self
    }

    /// Nearest point to `(x, y)`, optionally limited to `radius`.
    pub fn find(&self, x: f64, y: f64, radius: Option<f64>) -> Option<&T> {
        let extent = self.extent?;
        let root = self.root?;

        let (mut x0, mut y0, mut x3, mut y3) = (extent.x0, extent.y0, extent.x1, extent.y1);
        let mut radius2 = f64::INFINITY;
        if let Some(radius) = radius {
            x0 = x - radius;
            y0 = y - radius;
            x3 = x + radius;
            y3 = y + radius;
            radius2 = radius * radius;
        }

        let mut best = None;
        let mut stack: Vec<(Option<QuadId>, Extent)> = vec![(Some(root), extent)];

        while let Some((node, bounds)) = stack.pop() {
            let Some(quad) = node.and_then(|id| self.quad(id)) else {
                continue;
            };
            if bounds.x0 > x3 || bounds.y0 > y3 || bounds.x1 < x0 || bounds.y1 < y0 {
                continue;
            }

            match &quad.kind {
                QuadKind::Internal(children) => {
                    for i in (0..4).rev() {
                        stack.push((children[i], bounds.child(i)));
                    }

                    let xm = (bounds.x0 + bounds.x1) / 2.0;
                    let ym = (bounds.y0 + bounds.y1) / 2.0;
                    let closest = quadrant(x >= xm, y >= ym);
                    if closest != 0 {
                        let last = stack.len() - 1;
                        stack.swap(last, last - closest);
                    }
                }
                QuadKind::Leaf { point, .. } => {
                    let (px, py) = point.position();
                    let dx = x - px;
                    let dy = y - py;
                    let d2 = dx * dx + dy * dy;
                    if d2 < radius2 {
                        radius2 = d2;
                        let d = d2.sqrt();
                        x0 = x - d;
                        y0 = y - d;
                        x3 = x + d;
                        y3 = y + d;
                        best = Some(point);
                    }
                }
            }
        }

        best
    }

    /// Pre-order traversal. Returning `true` from the callback skips the
    /// children of that quad.
    pub fn visit(&self, mut callback: impl FnMut(QuadId, &Quad<T>, Extent) -> bool) {
        let (Some(root), Some(extent)) = (self.root, self.extent) else {
            return;
        };

        let mut stack = vec![(root, extent)];
        while let Some((id, bounds)) = stack.pop() {
            let Some(quad) = self.quad(id) else {
                continue;
            };
            if callback(id, quad, bounds) {
                continue;
            }
            if let QuadKind::Internal(children) = &quad.kind {
                for i in (0..4).rev() {
                    if let Some(child) = children[i] {
                        stack.push((child, bounds.child(i)));
                    }
                }
            }
        }
    }

    /// Post-order traversal: every quad is visited after all of its
    /// children. The callback gets the tree mutably so it can write
    /// aggregates into [`Quad::mass`].
    pub fn visit_after(&mut self, mut callback: impl FnMut(&mut Self, QuadId, Extent)) -> &mut Self {
        let (Some(root), Some(extent)) = (self.root, self.extent) else {
            return self;
        };

        let mut pending = vec![(root, extent)];
        let mut order = Vec::new();
        while let Some((id, bounds)) = pending.pop() {
            if let Some(children) = self.quad(id).and_then(Quad::children) {
                for (i, child) in children.iter().enumerate() {
                    if let Some(child) = child {
                        pending.push((*child, bounds.child(i)));
                    }
                }
            }
            order.push((id, bounds));
        }

        while let Some((id, bounds)) = order.pop() {
            callback(self, id, bounds);
        }
        self
    }

    pub fn data(&self) -> Vec<&T> {
        let mut data = Vec::new();
        self.visit(|id, quad, _| {
            if quad.is_leaf() {
                data.extend(self.chain(id));
            }
            false
        });
        data
    }

    pub fn size(&self) -> usize {
        let mut size = 0;
        self.visit(|id, quad, _| {
            if quad.is_leaf() {
                size += self.chain(id).count();
            }
            false
        });
        size
    }

    fn alloc(&mut self, quad: Quad<T>) -> QuadId {
        match self.free.pop() {
            Some(index) => {
                self.quads[index] = Some(quad);
                QuadId(index)
            }
            None => {
                self.quads.push(Some(quad));
                QuadId(self.quads.len() - 1)
            }
        }
    }

    fn release(&mut self, id: QuadId) {
        if let Some(slot) = self.quads.get_mut(id.0)
            && slot.take().is_some()
        {
            self.free.push(id.0);
        }
    }

    fn set_child(&mut self, parent: Option<(QuadId, usize)>, child: Option<QuadId>) {
        match parent {
            Some((parent, i)) => {
                if let Some(Quad {
                    kind: QuadKind::Internal(children),
                    ..
                }) = self.quad_mut(parent)
                {
                    children[i] = child;
                }
            }
            None => self.root = child,
        }
    }

    fn children_of(&self, id: QuadId) -> Option<[Option<QuadId>; 4]> {
        self.quad(id).and_then(Quad::children).copied()
    }

    fn insert(&mut self, x: f64, y: f64, point: T) {
        let Some(Extent {
            mut x0,
            mut y0,
            mut x1,
            mut y1,
        }) = self.extent
        else {
            return;
        };

        let leaf = self.alloc(Quad::leaf(point));
        let Some(mut node) = self.root else {
            self.root = Some(leaf);
            return;
        };

        let mut parent = None;
        while let Some(children) = self.children_of(node) {
            let xm = (x0 + x1) / 2.0;
            let ym = (y0 + y1) / 2.0;
            let right = x >= xm;
            let bottom = y >= ym;
            if right { x0 = xm } else { x1 = xm }
            if bottom { y0 = ym } else { y1 = ym }
            let i = quadrant(right, bottom);
            match children[i] {
                Some(child) => {
                    parent = Some((node, i));
                    node = child;
                }
                None => {
                    self.set_child(Some((node, i)), Some(leaf));
                    return;
                }
            }
        }

        let Some((xp, yp)) = self.quad(node).and_then(Quad::point).map(QuadPoint::position) else {
            return;
        };

        if x == xp && y == yp {
            if let Some(Quad {
                kind: QuadKind::Leaf { next, .. },
                ..
            }) = self.quad_mut(leaf)
            {
                *next = Some(node);
            }
            self.set_child(parent, Some(leaf));
            return;
        }

        loop {
            let split = self.alloc(Quad::internal([None; 4]));
            self.set_child(parent, Some(split));

            let xm = (x0 + x1) / 2.0;
            let ym = (y0 + y1) / 2.0;
            let right = x >= xm;
            let bottom = y >= ym;
            if right { x0 = xm } else { x1 = xm }
            if bottom { y0 = ym } else { y1 = ym }

            let i = quadrant(right, bottom);
            let j = quadrant(xp >= xm, yp >= ym);
            if i != j {
                self.set_child(Some((split, j)), Some(node));
                self.set_child(Some((split, i)), Some(leaf));
                return;
            }
            parent = Some((split, i));
        }
    }
}

impl<T: QuadPoint + PartialEq> Quadtree<T> {
    /// Removes one stored point equal to `point`. Returns whether a point
    /// was removed.
    pub fn remove(&mut self, point: &T) -> bool {
        let (x, y) = point.position();
        if !x.is_finite() || !y.is_finite() {
            return false;
        }
        let (Some(mut node), Some(extent)) = (self.root, self.extent) else {
            return false;
        };
        let Extent {
            mut x0,
            mut y0,
            mut x1,
            mut y1,
        } = extent;

        let mut parent: Option<(QuadId, usize)> = None;
        let mut retainer: Option<(QuadId, usize)> = None;

        while let Some(children) = self.children_of(node) {
            let xm = (x0 + x1) / 2.0;
            let ym = (y0 + y1) / 2.0;
            let right = x >= xm;
            let bottom = y >= ym;
            if right { x0 = xm } else { x1 = xm }
            if bottom { y0 = ym } else { y1 = ym }
            let i = quadrant(right, bottom);

            let Some(child) = children[i] else {
                return false;
            };
            parent = Some((node, i));
            let descends_further = self.quad(child).is_some_and(|quad| !quad.is_leaf());
            if descends_further
                && (children[(i + 1) & 3].is_some()
                    || children[(i + 2) & 3].is_some()
                    || children[(i + 3) & 3].is_some())
            {
                retainer = Some((node, i));
            }
            node = child;
        }

        let mut previous = None;
        let mut current = node;
        loop {
            let quad = match self.quad(current) {
                Some(quad) => quad,
                None => return false,
            };
            if quad.point() == Some(point) {
                break;
            }
            match quad.next() {
                Some(next) => {
                    previous = Some(current);
                    current = next;
                }
                None => return false,
            }
        }

        let next = self.quad(current).and_then(Quad::next);
        self.release(current);

        if let Some(previous) = previous {
            if let Some(Quad {
                kind: QuadKind::Leaf { next: link, .. },
                ..
            }) = self.quad_mut(previous)
            {
                *link = next;
            }
            return true;
        }

        let Some((parent_id, i)) = parent else {
            self.root = next;
            return true;
        };
        self.set_child(Some((parent_id, i)), next);

        let Some(children) = self.children_of(parent_id) else {
            return true;
        };
        let first = children.iter().flatten().next().copied();
        let last = children.iter().rev().flatten().next().copied();
        if let (Some(first), Some(last)) = (first, last)
            && first == last
            && self.quad(first).is_some_and(Quad::is_leaf)
        {
            let detached = match retainer {
                Some((retainer, j)) => self.children_of(retainer).and_then(|children| children[j]),
                None => self.root,
            };
            match retainer {
                Some(retainer) => self.set_child(Some(retainer), Some(first)),
                None => self.root = Some(first),
            }

            let mut cursor = detached;
            while let Some(id) = cursor {
                if id == first {
                    break;
                }
                cursor = self
                    .children_of(id)
                    .and_then(|children| children.iter().flatten().next().copied());
                self.release(id);
            }
        }

        true
    }

    pub fn remove_all<'a>(&mut self, points: impl IntoIterator<Item = &'a T>) -> &mut Self
    where
        T: 'a,
    {
        for point in points {
            self.remove(point);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tree_answers_nothing() {
        let tree = Quadtree::<[f64; 2]>::new();
        assert!(tree.find(0.0, 0.0, None).is_none());
        assert!(tree.extent().is_none());
        assert_eq!(tree.size(), 0);
    }

    #[test]
    fn first_point_gets_unit_integer_extent() {
        let mut tree = Quadtree::new();
        tree.add([0.5, 2.25]);
        assert_eq!(
            tree.extent(),
            Some(Extent { x0: 0.0, y0: 2.0, x1: 1.0, y1: 3.0 })
        );
    }

    #[test]
    fn cover_doubles_toward_the_point() {
        let mut tree = Quadtree::<[f64; 2]>::new();
        tree.cover(0.0, 0.0).cover(3.0, 0.5);
        assert_eq!(
            tree.extent(),
            Some(Extent { x0: 0.0, y0: 0.0, x1: 4.0, y1: 4.0 })
        );
        tree.cover(-1.0, -1.0);
        assert_eq!(
            tree.extent(),
            Some(Extent { x0: -4.0, y0: -4.0, x1: 4.0, y1: 4.0 })
        );
    }

    #[test]
    fn non_finite_points_are_ignored() {
        let mut tree = Quadtree::new();
        tree.add([f64::NAN, 1.0]).add([1.0, f64::INFINITY]);
        assert!(tree.root().is_none());
        assert!(!tree.remove(&[f64::NAN, 1.0]));
    }

    #[test]
    fn coincident_points_chain_instead_of_splitting() {
        let mut tree = Quadtree::new();
        tree.add_all([[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]]);
        let root = tree.root().unwrap();
        assert!(tree.quad(root).unwrap().is_leaf());
        assert_eq!(tree.chain(root).count(), 3);
    }

    #[test]
    fn split_separates_distinct_points() {
        let mut tree = Quadtree::new();
        tree.add_all([[0.0, 0.0], [0.9, 0.9]]);
        let root = tree.root().unwrap();
        let children = tree.quad(root).unwrap().children().copied().unwrap();
        assert!(children[0].is_some());
        assert!(children[3].is_some());
        assert_eq!(tree.size(), 2);
    }

    #[test]
    fn remove_collapses_single_leaf_parents() {
        let mut tree = Quadtree::new();
        tree.add_all([[0.0, 0.0], [0.1, 0.1], [0.9, 0.9]]);
        assert!(tree.remove(&[0.9, 0.9]));
        assert!(tree.remove(&[0.1, 0.1]));

        let root = tree.root().unwrap();
        assert!(tree.quad(root).unwrap().is_leaf());
        assert_eq!(tree.data(), vec![&[0.0, 0.0]]);
    }

    #[test]
    fn remove_from_coincident_chain_keeps_the_rest() {
        let mut tree = Quadtree::new();
        tree.add_all([(2.0, 2.0), (2.0, 2.0), (5.0, 5.0)]);
        assert!(tree.remove(&(2.0, 2.0)));
        assert_eq!(tree.size(), 2);
        assert_eq!(tree.find(2.1, 2.1, None), Some(&(2.0, 2.0)));
        assert!(!tree.remove(&(7.0, 7.0)));
    }

    #[test]
    fn find_honours_radius() {
        let mut tree = Quadtree::new();
        tree.add_all([[0.0, 0.0], [10.0, 10.0]]);
        assert_eq!(tree.find(9.0, 9.0, None), Some(&[10.0, 10.0]));
        assert_eq!(tree.find(5.0, 5.0, Some(1.0)), None);
        assert_eq!(tree.find(1.0, 0.0, Some(2.0)), Some(&[0.0, 0.0]));
    }

    #[test]
    fn visit_can_prune_and_visit_after_is_post_order() {
        let mut tree = Quadtree::new();
        tree.add_all([[0.0, 0.0], [3.0, 3.0], [3.5, 0.5]]);

        let mut visited = 0;
        tree.visit(|_, _, _| {
            visited += 1;
            true
        });
        assert_eq!(visited, 1);

        let root = tree.root().unwrap();
        let mut order = Vec::new();
        tree.visit_after(|_, id, _| order.push(id));
        assert_eq!(order.last(), Some(&root));
    }
}
