use std::cmp::{max, Ordering};
use std::fmt::Debug;
use std::iter;
use std::marker::PhantomData;

use itertools::Itertools;
use log::{debug, trace};

use crate::config::{BaselineConfig, ConfigT, OnDuplicate, StrictConfig, StrictConfigDebug};
use crate::error::{AvlError, Violation};

type Link<K> = Option<Box<Node<K>>>;

struct Node<K> {
    key: K,
    height: usize,
    left: Link<K>,
    right: Link<K>,
}

impl<K> Node<K> {
    fn leaf(key: K) -> Box<Self> {
        Box::new(Node {
            key,
            height: 1,
            left: None,
            right: None,
        })
    }

    fn update_height(&mut self) {
        self.height = max(height_of(&self.left), height_of(&self.right)) + 1;
    }

    fn balance_factor(&self) -> isize {
        height_of(&self.left) as isize - height_of(&self.right) as isize
    }
}

// Empty subtrees have height 0, leaves height 1.
fn height_of<K>(link: &Link<K>) -> usize {
    link.as_ref().map_or(0, |n| n.height)
}

fn balance_factor<K>(link: &Link<K>) -> isize {
    link.as_ref().map_or(0, |n| n.balance_factor())
}

fn rotate_right<K: Debug>(mut pivot: Box<Node<K>>) -> Box<Node<K>> {
    trace!("rotate_right at {:?}", pivot.key);
    let mut y = pivot.left.take().expect("rotate_right on None");
    pivot.left = y.right.take();
    pivot.update_height();
    y.right = Some(pivot);
    y.update_height();
    y
}

fn rotate_left<K: Debug>(mut pivot: Box<Node<K>>) -> Box<Node<K>> {
    trace!("rotate_left at {:?}", pivot.key);
    let mut y = pivot.right.take().expect("rotate_left on None");
    pivot.right = y.left.take();
    pivot.update_height();
    y.left = Some(pivot);
    y.update_height();
    y
}

/// Fixes `node` after a key was inserted below it. The heavy grandchild side
/// is read off the inserted key rather than the child's balance factor.
fn rebalance_after_insert<K: Ord + Debug>(mut node: Box<Node<K>>, key: &K) -> Box<Node<K>> {
    let bf = node.balance_factor();
    if bf > 1 {
        let left = node.left.as_ref().expect("left-heavy node without left child");
        if *key > left.key {
            node.left = node.left.take().map(rotate_left);
        }
        return rotate_right(node);
    }
    if bf < -1 {
        let right = node.right.as_ref().expect("right-heavy node without right child");
        if *key < right.key {
            node.right = node.right.take().map(rotate_right);
        }
        return rotate_left(node);
    }
    node
}

/// Fixes `node` after a removal below it. A child with balance factor 0 gets
/// the single rotation.
fn rebalance<K: Debug>(mut node: Box<Node<K>>) -> Box<Node<K>> {
    node.update_height();
    let bf = node.balance_factor();
    if bf > 1 {
        if balance_factor(&node.left) < 0 {
            node.left = node.left.take().map(rotate_left);
        }
        return rotate_right(node);
    }
    if bf < -1 {
        if balance_factor(&node.right) > 0 {
            node.right = node.right.take().map(rotate_right);
        }
        return rotate_left(node);
    }
    node
}

/// One parent-to-children step of the tree, as seen by a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge<'a, K> {
    pub key: &'a K,
    pub left: Option<&'a K>,
    pub right: Option<&'a K>,
}

/// Ascending iterator over the keys of an `AvlTree`.
pub struct Iter<'a, K> {
    stack: Vec<&'a Node<K>>,
}

impl<'a, K> Iter<'a, K> {
    fn new(root: &'a Link<K>) -> Self {
        let mut iter = Iter { stack: Vec::new() };
        iter.push_left_spine(root.as_deref());
        iter
    }

    fn push_left_spine(&mut self, mut cur: Option<&'a Node<K>>) {
        while let Some(node) = cur {
            self.stack.push(node);
            cur = node.left.as_deref();
        }
    }
}

impl<'a, K> Iterator for Iter<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left_spine(node.right.as_deref());
        Some(&node.key)
    }
}

/// Ordered set of unique keys. `Config` decides whether the tree rebalances
/// and what happens on duplicate inserts.
pub struct AvlTree<K, Config: ConfigT = StrictConfig> {
    root: Link<K>,
    len: usize,
    _config: PhantomData<Config>,
}

impl<K: Ord + Clone + Debug, Config: ConfigT> AvlTree<K, Config> {
    pub fn new() -> Self {
        AvlTree {
            root: None,
            len: 0,
            _config: PhantomData,
        }
    }

    /// Inserts every key in order. Under `OnDuplicate::Reject` the first
    /// repeated key aborts construction.
    pub fn from_keys<I: IntoIterator<Item = K>>(keys: I) -> Result<Self, AvlError<K>> {
        let mut tree = Self::new();
        for key in keys {
            tree.insert(key)?;
        }
        Ok(tree)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Height of the whole tree: 0 when empty, 1 for a single key.
    pub fn height(&self) -> usize {
        height_of(&self.root)
    }

    pub fn root_key(&self) -> Option<&K> {
        self.root.as_ref().map(|n| &n.key)
    }

    fn insert_node(link: Link<K>, key: &K) -> (Box<Node<K>>, bool) {
        let mut node = match link {
            None => return (Node::leaf(key.clone()), true),
            Some(node) => node,
        };
        let inserted = match key.cmp(&node.key) {
            Ordering::Less => {
                let (left, inserted) = Self::insert_node(node.left.take(), key);
                node.left = Some(left);
                inserted
            }
            Ordering::Greater => {
                let (right, inserted) = Self::insert_node(node.right.take(), key);
                node.right = Some(right);
                inserted
            }
            Ordering::Equal => false,
        };
        if !inserted {
            return (node, false);
        }
        node.update_height();
        (rebalance_after_insert(node, key), true)
    }

    /// Plain BST insert without recursion, so sorted input cannot exhaust
    /// the stack however deep the chain gets.
    fn insert_unbalanced(&mut self, key: &K) -> bool {
        let mut depth = 0;
        let mut cur = self.root.as_deref();
        while let Some(node) = cur {
            cur = match key.cmp(&node.key) {
                Ordering::Less => node.left.as_deref(),
                Ordering::Greater => node.right.as_deref(),
                Ordering::Equal => return false,
            };
            depth += 1;
        }
        // The new leaf sits at `depth`, so an ancestor at `level` is at least
        // `depth - level + 1` tall.
        let mut slot = &mut self.root;
        let mut level = 0;
        while let Some(node) = slot {
            node.height = max(node.height, depth - level + 1);
            slot = if *key < node.key {
                &mut node.left
            } else {
                &mut node.right
            };
            level += 1;
        }
        *slot = Some(Node::leaf(key.clone()));
        true
    }

    /// Adds `key` to the tree. A key that is already present never modifies
    /// the tree; whether that is an error depends on `Config::ON_DUPLICATE`.
    pub fn insert(&mut self, key: K) -> Result<(), AvlError<K>> {
        let inserted = if Config::BALANCE {
            let (root, inserted) = Self::insert_node(self.root.take(), &key);
            self.root = Some(root);
            inserted
        } else {
            self.insert_unbalanced(&key)
        };
        if !inserted {
            debug!("insert {:?}: already present", key);
            return match Config::ON_DUPLICATE {
                OnDuplicate::Ignore => Ok(()),
                OnDuplicate::Reject => Err(AvlError::DuplicateKey(key)),
            };
        }
        self.len += 1;
        debug!("insert {:?}: height now {}", key, self.height());
        self.check_invariants();
        Ok(())
    }

    fn restore(mut node: Box<Node<K>>) -> Box<Node<K>> {
        if Config::BALANCE {
            rebalance(node)
        } else {
            node.update_height();
            node
        }
    }

    /// Unlinks the leftmost node of `node`'s subtree, returning the remaining
    /// subtree and the removed key.
    fn take_min(mut node: Box<Node<K>>) -> (Link<K>, K) {
        match node.left.take() {
            None => {
                let Node { key, right, .. } = *node;
                (right, key)
            }
            Some(left) => {
                let (left, min) = Self::take_min(left);
                node.left = left;
                (Some(Self::restore(node)), min)
            }
        }
    }

    fn delete_node(link: Link<K>, key: &K) -> (Link<K>, bool) {
        let mut node = match link {
            None => return (None, false),
            Some(node) => node,
        };
        let removed = match key.cmp(&node.key) {
            Ordering::Less => {
                let (left, removed) = Self::delete_node(node.left.take(), key);
                node.left = left;
                removed
            }
            Ordering::Greater => {
                let (right, removed) = Self::delete_node(node.right.take(), key);
                node.right = right;
                removed
            }
            Ordering::Equal => {
                match (node.left.take(), node.right.take()) {
                    (None, None) => return (None, true),
                    (Some(child), None) | (None, Some(child)) => return (Some(child), true),
                    (Some(left), Some(right)) => {
                        let (right, successor) = Self::take_min(right);
                        node.key = successor;
                        node.left = Some(left);
                        node.right = right;
                    }
                }
                true
            }
        };
        if !removed {
            return (Some(node), false);
        }
        // Every ancestor of the removed node gets rebalanced, not just the first.
        (Some(Self::restore(node)), true)
    }

    /// Removes `key` if present. Returns whether a key was removed.
    pub fn delete(&mut self, key: &K) -> bool {
        let (root, removed) = Self::delete_node(self.root.take(), key);
        self.root = root;
        if removed {
            self.len -= 1;
            debug!("delete {:?}: height now {}", key, self.height());
            self.check_invariants();
        }
        removed
    }

    pub fn search(&self, key: &K) -> bool {
        self.depth_of(key).is_some()
    }

    /// Level of `key` counted from the root at 0, or `None` when absent.
    pub fn depth_of(&self, key: &K) -> Option<usize> {
        let mut cur = self.root.as_deref();
        let mut depth = 0;
        while let Some(node) = cur {
            cur = match key.cmp(&node.key) {
                Ordering::Less => node.left.as_deref(),
                Ordering::Greater => node.right.as_deref(),
                Ordering::Equal => return Some(depth),
            };
            depth += 1;
        }
        None
    }

    pub fn min(&self) -> Option<&K> {
        let mut node = self.root.as_deref()?;
        while let Some(left) = node.left.as_deref() {
            node = left;
        }
        Some(&node.key)
    }

    pub fn max(&self) -> Option<&K> {
        let mut node = self.root.as_deref()?;
        while let Some(right) = node.right.as_deref() {
            node = right;
        }
        Some(&node.key)
    }

    fn collect_range(link: &Link<K>, low: &K, high: &K, out: &mut Vec<K>) {
        let Some(node) = link else {
            return;
        };
        if node.key >= *low {
            Self::collect_range(&node.left, low, high, out);
        }
        if *low <= node.key && node.key <= *high {
            out.push(node.key.clone());
        }
        if node.key <= *high {
            Self::collect_range(&node.right, low, high, out);
        }
    }

    /// All keys in `low..=high`, ascending. Only subtrees that can hold such
    /// a key are visited.
    pub fn range_query(&self, low: &K, high: &K) -> Vec<K> {
        let mut out = Vec::new();
        Self::collect_range(&self.root, low, high, &mut out);
        out
    }

    pub fn iter(&self) -> Iter<'_, K> {
        Iter::new(&self.root)
    }

    pub fn in_order(&self) -> Vec<K> {
        self.iter().cloned().collect()
    }

    /// Pre-order walk yielding each node with its children's keys.
    pub fn edges(&self) -> impl Iterator<Item = Edge<'_, K>> + '_ {
        let mut stack: Vec<&Node<K>> = self.root.as_deref().into_iter().collect();
        iter::from_fn(move || {
            let node = stack.pop()?;
            if let Some(right) = node.right.as_deref() {
                stack.push(right);
            }
            if let Some(left) = node.left.as_deref() {
                stack.push(left);
            }
            Some(Edge {
                key: &node.key,
                left: node.left.as_ref().map(|n| &n.key),
                right: node.right.as_ref().map(|n| &n.key),
            })
        })
    }

    fn validate_node(link: &Link<K>) -> Result<usize, Violation<K>> {
        let Some(node) = link else {
            return Ok(0);
        };
        let lh = Self::validate_node(&node.left)?;
        let rh = Self::validate_node(&node.right)?;
        let actual = max(lh, rh) + 1;
        if node.height != actual {
            return Err(Violation::HeightMismatch {
                key: node.key.clone(),
                cached: node.height,
                actual,
            });
        }
        let balance = lh as isize - rh as isize;
        if Config::BALANCE && balance.abs() > 1 {
            return Err(Violation::Unbalanced {
                key: node.key.clone(),
                balance,
            });
        }
        Ok(actual)
    }

    /// Walks the whole tree checking cached heights, ordering and (for
    /// balancing configs) the AVL balance bound.
    pub fn validate(&self) -> Result<(), Violation<K>> {
        Self::validate_node(&self.root)?;
        if let Some((prev, next)) = self.iter().tuple_windows().find(|(a, b)| a >= b) {
            return Err(Violation::OutOfOrder {
                prev: prev.clone(),
                next: next.clone(),
            });
        }
        Ok(())
    }

    fn check_invariants(&self) {
        if Config::CHECK_INVARIANTS && cfg!(debug_assertions) {
            if let Err(violation) = self.validate() {
                panic!("tree invariant broken: {}", violation);
            }
        }
    }
}

impl<K: Ord + Clone + Debug, Config: ConfigT> std::default::Default for AvlTree<K, Config> {
    fn default() -> Self {
        AvlTree::new()
    }
}

// Unlinks nodes one at a time; the default recursive Box drop would follow
// an unbalanced chain as deep as it goes.
impl<K, Config: ConfigT> Drop for AvlTree<K, Config> {
    fn drop(&mut self) {
        let mut stack: Vec<Box<Node<K>>> = self.root.take().into_iter().collect();
        while let Some(mut node) = stack.pop() {
            stack.extend(node.left.take());
            stack.extend(node.right.take());
        }
    }
}

pub type Default<K> = AvlTree<K, StrictConfig>;
pub type DefaultDebug<K> = AvlTree<K, StrictConfigDebug>;
/// Unbalanced BST. Insert, lookups, iteration and drop are iterative;
/// `delete`, `range_query` and `validate` still recurse once per level, so
/// keep degenerate (sorted) baseline trees to a few thousand keys when using
/// those.
pub type Baseline<K> = AvlTree<K, BaselineConfig>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write;

    use expect_test::{expect, Expect};

    fn pretty_print_to_string<K, Config>(tree: &AvlTree<K, Config>) -> String
    where
        K: Ord + Clone + Debug + std::fmt::Display,
        Config: ConfigT,
    {
        fn traverse<K: std::fmt::Display>(link: &Link<K>, level: usize, mut out: String) -> String {
            if let Some(node) = link {
                out = traverse(&node.left, level + 1, out);
                writeln!(&mut out, "{}{}", "  ".repeat(level), &node.key)
                    .expect("writing to String cannot fail");
                out = traverse(&node.right, level + 1, out);
            }
            out
        }
        traverse(&tree.root, 0, String::new())
    }

    fn check<K, Config>(tree: &AvlTree<K, Config>, expect: Expect)
    where
        K: Ord + Clone + Debug + std::fmt::Display,
        Config: ConfigT,
    {
        assert_eq!(tree.validate(), Ok(()));
        expect.assert_eq(&pretty_print_to_string(tree));
    }

    #[test]
    fn test_height_and_balance_helpers() {
        let mut leaf = Node::leaf(1);
        assert_eq!(leaf.height, 1);
        assert_eq!(leaf.balance_factor(), 0);
        assert_eq!(height_of::<i32>(&None), 0);
        assert_eq!(balance_factor::<i32>(&None), 0);
        leaf.left = Some(Node::leaf(0));
        leaf.update_height();
        assert_eq!(leaf.height, 2);
        assert_eq!(leaf.balance_factor(), 1);
    }

    #[test]
    fn test_rotate_right_restructures_and_updates_heights() {
        let mut pivot = Node::leaf(3);
        let mut left = Node::leaf(2);
        left.left = Some(Node::leaf(1));
        left.update_height();
        pivot.left = Some(left);
        pivot.update_height();
        let root = rotate_right(pivot);
        assert_eq!(root.key, 2);
        assert_eq!(root.height, 2);
        assert_eq!(root.left.as_ref().map(|n| n.key), Some(1));
        assert_eq!(root.right.as_ref().map(|n| (n.key, n.height)), Some((3, 1)));
    }

    #[test]
    fn test_insert_rr_rotation() {
        let tree = DefaultDebug::from_keys([10, 20, 30]).unwrap();
        check(
            &tree,
            expect![[r#"
                  10
                20
                  30
            "#]],
        );
        assert_eq!(tree.root_key(), Some(&20));
        assert_eq!(tree.height(), 2);
    }

    #[test]
    fn test_insert_rl_rotation() {
        let tree = DefaultDebug::from_keys([10, 30, 20]).unwrap();
        assert_eq!(tree.root_key(), Some(&20));
        assert_eq!(tree.in_order(), vec![10, 20, 30]);
    }

    #[test]
    fn test_insert_ll_and_lr_rotations() {
        let ll = DefaultDebug::from_keys([30, 20, 10]).unwrap();
        assert_eq!(ll.root_key(), Some(&20));
        let lr = DefaultDebug::from_keys([30, 10, 20]).unwrap();
        assert_eq!(lr.root_key(), Some(&20));
        assert_eq!(lr.height(), 2);
    }

    #[test]
    fn test_insert_lr_deep_in_tree() {
        let tree = DefaultDebug::from_keys([9, 5, 10, 0, 6, 11, -1, 1, 2]).unwrap();
        check(
            &tree,
            expect![[r#"
                      -1
                    0
                  1
                      2
                    5
                      6
                9
                  10
                    11
            "#]],
        );
        assert_eq!(tree.height(), 4);
        assert_eq!(tree.len(), 9);
    }

    #[test]
    fn test_duplicate_rejected_without_mutation() {
        let mut tree = Default::from_keys([2, 1, 3]).unwrap();
        assert_eq!(tree.insert(1), Err(AvlError::DuplicateKey(1)));
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.in_order(), vec![1, 2, 3]);
        assert_eq!(Default::from_keys([4, 4]).err(), Some(AvlError::DuplicateKey(4)));
    }

    #[test]
    fn test_delete_successor_then_rebalance() {
        let mut tree = DefaultDebug::from_keys([9, 5, 10, 0, 6, 11, -1, 1, 2]).unwrap();
        assert!(tree.delete(&10));
        check(
            &tree,
            expect![[r#"
                    -1
                  0
                1
                      2
                    5
                      6
                  9
                    11
            "#]],
        );
        assert!(tree.delete(&11));
        check(
            &tree,
            expect![[r#"
                    -1
                  0
                1
                    2
                  5
                      6
                    9
            "#]],
        );
        assert_eq!(tree.depth_of(&6), Some(3));
        assert_eq!(tree.range_query(&1, &9), vec![1, 2, 5, 6, 9]);
    }

    #[test]
    fn test_delete_balanced_child_uses_single_rotation() {
        let mut tree = DefaultDebug::from_keys([5, 3, 8, 2, 4]).unwrap();
        tree.delete(&8);
        check(
            &tree,
            expect![[r#"
                  2
                3
                    4
                  5
            "#]],
        );
    }

    #[test]
    fn test_delete_rebalances_every_ancestor() {
        let mut tree =
            DefaultDebug::from_keys([5, 3, 8, 2, 4, 7, 10, 1, 6, 9, 11, 12]).unwrap();
        assert_eq!(tree.root_key(), Some(&5));
        assert_eq!(tree.height(), 5);
        tree.delete(&4);
        check(
            &tree,
            expect![[r#"
                      1
                    2
                      3
                  5
                      6
                    7
                8
                    9
                  10
                    11
                      12
            "#]],
        );
        assert_eq!(tree.height(), 4);
    }

    #[test]
    fn test_delete_two_children_root() {
        let mut tree = DefaultDebug::from_keys([2, 1, 3]).unwrap();
        assert!(tree.delete(&2));
        assert!(!tree.search(&2));
        assert_eq!(tree.in_order(), vec![1, 3]);
        assert_eq!(tree.root_key(), Some(&3));
    }

    #[test]
    fn test_delete_absent_and_empty() {
        let mut tree: Default<i32> = Default::new();
        assert!(!tree.delete(&1));
        assert!(!tree.search(&1));
        assert_eq!(tree.height(), 0);
        tree.insert(1).unwrap();
        assert!(!tree.delete(&7));
        assert_eq!(tree.in_order(), vec![1]);
        assert!(tree.delete(&1));
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 0);
    }

    #[test]
    fn test_baseline_keeps_insertion_shape() {
        let mut tree = Baseline::from_keys([1, 2, 3, 4, 5]).unwrap();
        assert_eq!(tree.insert(3), Ok(()));
        check(
            &tree,
            expect![[r#"
                1
                  2
                    3
                      4
                        5
            "#]],
        );
        assert_eq!(tree.height(), 5);
        assert_eq!(tree.depth_of(&5), Some(4));
        tree.delete(&1);
        assert_eq!(tree.root_key(), Some(&2));
        assert_eq!(tree.height(), 4);
    }

    #[test]
    fn test_baseline_sorted_inserts_stay_iterative() {
        let tree = Baseline::from_keys(0..20_000).unwrap();
        assert_eq!(tree.len(), 20_000);
        assert_eq!(tree.height(), 20_000);
        assert_eq!(tree.depth_of(&19_999), Some(19_999));
        assert_eq!(tree.max(), Some(&19_999));
        assert_eq!(tree.iter().count(), 20_000);
    }

    #[test]
    fn test_baseline_heights_track_deepest_leaf() {
        let mut tree = Baseline::from_keys([50, 20, 80, 10, 30, 25, 27]).unwrap();
        assert_eq!(tree.validate(), Ok(()));
        assert_eq!(tree.height(), 5);
        tree.insert(90).unwrap();
        assert_eq!(tree.validate(), Ok(()));
        assert_eq!(tree.height(), 5);
    }

    #[test]
    fn test_edges_pre_order() {
        let tree = Default::from_keys([2, 1, 3, 4]).unwrap();
        let edges = tree
            .edges()
            .map(|e| format!("{} -> {:?} {:?}", e.key, e.left, e.right))
            .join("\n");
        let expect = expect![[r#"
            2 -> Some(1) Some(3)
            1 -> None None
            3 -> None Some(4)
            4 -> None None"#]];
        expect.assert_eq(&edges);
    }

    #[test]
    fn test_min_max() {
        let tree = Default::from_keys([7, 3, 9, 1]).unwrap();
        assert_eq!(tree.min(), Some(&1));
        assert_eq!(tree.max(), Some(&9));
        assert_eq!(Default::<i32>::new().min(), None);
    }

    #[test]
    fn test_validate_reports_corruption() {
        let mut tree = Default::from_keys([1, 2, 3]).unwrap();
        if let Some(root) = tree.root.as_mut() {
            root.height = 7;
        }
        assert_eq!(
            tree.validate(),
            Err(Violation::HeightMismatch {
                key: 2,
                cached: 7,
                actual: 2
            })
        );
        let err = tree.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "node 2 caches height 7 but its subtree has height 2"
        );
    }
}
