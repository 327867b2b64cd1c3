//! Ordered storage for the concurrent map
//!
//! An AVL tree of boxed nodes, ordered by a [`KeyOrder`] value rather than by
//! the key type's `Ord`, which is why `BTreeMap` cannot be used directly.
//! Lookups, lower bound, infimum, insert and remove are all O(log n).
//!
//! The tree has no synchronization of its own; the map only touches it while
//! holding its lock.

use super::order::KeyOrder;
use core::cmp::Ordering;
use core::mem;

type Link<K, V> = Option<Box<Node<K, V>>>;

#[derive(Debug, Clone)]
struct Node<K, V> {
    key: K,
    value: V,
    height: u32,
    left: Link<K, V>,
    right: Link<K, V>,
}

impl<K, V> Node<K, V> {
    fn leaf(key: K, value: V) -> Box<Self> {
        Box::new(Self {
            key,
            value,
            height: 1,
            left: None,
            right: None,
        })
    }

    #[inline]
    fn update_height(&mut self) {
        self.height = 1 + height(&self.left).max(height(&self.right));
    }

    /// Left height minus right height
    #[inline]
    fn balance(&self) -> i64 {
        i64::from(height(&self.left)) - i64::from(height(&self.right))
    }
}

#[inline]
fn height<K, V>(link: &Link<K, V>) -> u32 {
    link.as_ref().map_or(0, |node| node.height)
}

/// A balanced binary search tree keyed by `K` under the order `C`
#[derive(Debug, Clone)]
pub(crate) struct OrderedTree<K, V, C> {
    root: Link<K, V>,
    len: usize,
    order: C,
}

impl<K, V, C> OrderedTree<K, V, C> {
    pub(crate) const fn new(order: C) -> Self {
        Self {
            root: None,
            len: 0,
            order,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn clear(&mut self) {
        self.root = None;
        self.len = 0;
    }

    /// In-order iterator over the entries
    pub(crate) fn iter(&self) -> Iter<'_, K, V> {
        let mut iter = Iter {
            stack: Vec::with_capacity(height(&self.root) as usize),
            remaining: self.len,
        };
        iter.push_leftmost_path(self.root.as_deref());
        iter
    }

    /// Visit every entry mutably in ascending key order
    pub(crate) fn for_each_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &mut V),
    {
        fn walk<K, V, F: FnMut(&K, &mut V)>(link: &mut Link<K, V>, f: &mut F) {
            if let Some(node) = link {
                walk(&mut node.left, f);
                f(&node.key, &mut node.value);
                walk(&mut node.right, f);
            }
        }
        walk(&mut self.root, &mut f);
    }
}

impl<K, V, C: KeyOrder<K>> OrderedTree<K, V, C> {
    fn find_node(&self, key: &K) -> Option<&Node<K, V>> {
        let mut link = self.root.as_deref();
        while let Some(node) = link {
            link = match self.order.compare(key, &node.key) {
                Ordering::Less => node.left.as_deref(),
                Ordering::Greater => node.right.as_deref(),
                Ordering::Equal => return Some(node),
            };
        }
        None
    }

    pub(crate) fn get(&self, key: &K) -> Option<&V> {
        self.find_node(key).map(|node| &node.value)
    }

    pub(crate) fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        self.find_node(key).map(|node| (&node.key, &node.value))
    }

    pub(crate) fn get_key_value_mut(&mut self, key: &K) -> Option<(&K, &mut V)> {
        let order = &self.order;
        let mut link = self.root.as_deref_mut();
        while let Some(node) = link {
            match order.compare(key, &node.key) {
                Ordering::Less => link = node.left.as_deref_mut(),
                Ordering::Greater => link = node.right.as_deref_mut(),
                Ordering::Equal => return Some((&node.key, &mut node.value)),
            }
        }
        None
    }

    pub(crate) fn contains_key(&self, key: &K) -> bool {
        self.find_node(key).is_some()
    }

    /// Entry with the least key not less than `key`
    pub(crate) fn lower_bound(&self, key: &K) -> Option<(&K, &V)> {
        let mut best = None;
        let mut link = self.root.as_deref();
        while let Some(node) = link {
            match self.order.compare(&node.key, key) {
                Ordering::Less => link = node.right.as_deref(),
                Ordering::Equal => return Some((&node.key, &node.value)),
                Ordering::Greater => {
                    best = Some(node);
                    link = node.left.as_deref();
                }
            }
        }
        best.map(|node| (&node.key, &node.value))
    }

    /// Entry with the greatest key not greater than `key`
    ///
    /// An exact match wins; otherwise this is the entry just before the lower
    /// bound, and there is none when the lower bound is the first entry.
    pub(crate) fn infimum(&self, key: &K) -> Option<(&K, &V)> {
        let mut best = None;
        let mut link = self.root.as_deref();
        while let Some(node) = link {
            match self.order.compare(&node.key, key) {
                Ordering::Greater => link = node.left.as_deref(),
                Ordering::Equal => return Some((&node.key, &node.value)),
                Ordering::Less => {
                    best = Some(node);
                    link = node.right.as_deref();
                }
            }
        }
        best.map(|node| (&node.key, &node.value))
    }

    /// Insert `value` under `key`, returning the value it displaced
    ///
    /// An existing entry keeps its original key.
    pub(crate) fn insert(&mut self, key: K, value: V) -> Option<V> {
        let displaced = insert_into(&mut self.root, key, value, &self.order);
        if displaced.is_none() {
            self.len += 1;
        }
        displaced
    }

    pub(crate) fn remove(&mut self, key: &K) -> Option<(K, V)> {
        let removed = remove_from(&mut self.root, key, &self.order)?;
        self.len -= 1;
        let Node { key, value, .. } = *removed;
        Some((key, value))
    }
}

fn insert_into<K, V, C: KeyOrder<K>>(
    link: &mut Link<K, V>,
    key: K,
    value: V,
    order: &C,
) -> Option<V> {
    let Some(node) = link else {
        *link = Some(Node::leaf(key, value));
        return None;
    };

    let displaced = match order.compare(&key, &node.key) {
        Ordering::Less => insert_into(&mut node.left, key, value, order),
        Ordering::Greater => insert_into(&mut node.right, key, value, order),
        Ordering::Equal => return Some(mem::replace(&mut node.value, value)),
    };

    if displaced.is_none() {
        rebalance(link);
    }
    displaced
}

/// Detach the node holding `key`, keeping the subtree balanced
fn remove_from<K, V, C: KeyOrder<K>>(
    link: &mut Link<K, V>,
    key: &K,
    order: &C,
) -> Option<Box<Node<K, V>>> {
    let node = link.as_mut()?;
    let removed = match order.compare(key, &node.key) {
        Ordering::Less => remove_from(&mut node.left, key, order)?,
        Ordering::Greater => remove_from(&mut node.right, key, order)?,
        Ordering::Equal => {
            let mut target = link.take()?;
            *link = match (target.left.take(), target.right.take()) {
                (None, None) => None,
                (Some(child), None) | (None, Some(child)) => Some(child),
                (Some(left), Some(right)) => {
                    let mut right = Some(right);
                    match take_min(&mut right) {
                        Some(mut successor) => {
                            successor.left = Some(left);
                            successor.right = right;
                            Some(successor)
                        }
                        None => Some(left),
                    }
                }
            };
            target
        }
    };

    rebalance(link);
    Some(removed)
}

/// Detach the leftmost node of a subtree
fn take_min<K, V>(link: &mut Link<K, V>) -> Option<Box<Node<K, V>>> {
    let node = link.as_mut()?;
    if node.left.is_some() {
        let min = take_min(&mut node.left);
        rebalance(link);
        min
    } else {
        let mut min = link.take()?;
        *link = min.right.take();
        min.height = 1;
        Some(min)
    }
}

fn rebalance<K, V>(link: &mut Link<K, V>) {
    let Some(node) = link.as_mut() else {
        return;
    };
    node.update_height();

    let balance = node.balance();
    if balance > 1 {
        if node.left.as_ref().map_or(0, |left| left.balance()) < 0 {
            rotate_left(&mut node.left);
        }
        rotate_right(link);
    } else if balance < -1 {
        if node.right.as_ref().map_or(0, |right| right.balance()) > 0 {
            rotate_right(&mut node.right);
        }
        rotate_left(link);
    }
}

fn rotate_right<K, V>(link: &mut Link<K, V>) {
    let Some(mut node) = link.take() else {
        return;
    };
    let Some(mut pivot) = node.left.take() else {
        *link = Some(node);
        return;
    };
    node.left = pivot.right.take();
    node.update_height();
    pivot.right = Some(node);
    pivot.update_height();
    *link = Some(pivot);
}

fn rotate_left<K, V>(link: &mut Link<K, V>) {
    let Some(mut node) = link.take() else {
        return;
    };
    let Some(mut pivot) = node.right.take() else {
        *link = Some(node);
        return;
    };
    node.right = pivot.left.take();
    node.update_height();
    pivot.left = Some(node);
    pivot.update_height();
    *link = Some(pivot);
}

/// In-order iterator over an [`OrderedTree`]
pub(crate) struct Iter<'a, K, V> {
    stack: Vec<&'a Node<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    fn push_leftmost_path(&mut self, mut link: Option<&'a Node<K, V>>) {
        while let Some(node) = link {
            self.stack.push(node);
            link = node.left.as_deref();
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_leftmost_path(node.right.as_deref());
        self.remaining -= 1;
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

#[cfg(test)]
impl<K, V, C: KeyOrder<K>> OrderedTree<K, V, C> {
    /// Check ordering, AVL balance, cached heights and `len`
    pub(crate) fn assert_invariants(&self) {
        fn check<K, V, C: KeyOrder<K>>(link: &Link<K, V>, order: &C) -> (u32, usize) {
            let Some(node) = link else {
                return (0, 0);
            };
            if let Some(left) = &node.left {
                assert_eq!(order.compare(&left.key, &node.key), Ordering::Less);
            }
            if let Some(right) = &node.right {
                assert_eq!(order.compare(&right.key, &node.key), Ordering::Greater);
            }
            let (left_height, left_count) = check(&node.left, order);
            let (right_height, right_count) = check(&node.right, order);
            assert!(left_height.abs_diff(right_height) <= 1, "unbalanced node");
            assert_eq!(node.height, 1 + left_height.max(right_height), "stale height");
            (node.height, left_count + right_count + 1)
        }

        let (_, count) = check(&self.root, &self.order);
        assert_eq!(count, self.len);

        let mut iter = self.iter();
        if let Some((mut previous, _)) = iter.next() {
            for (key, _) in iter {
                assert_eq!(self.order.compare(previous, key), Ordering::Less);
                previous = key;
            }
        }
    }
}
