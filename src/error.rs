use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AvlError<K> {
    /// The key is already stored; the tree was not modified.
    #[error("duplicate key: {0:?}")]
    DuplicateKey(K),
}

/// Structural corruption found by `AvlTree::validate`. Any of these is a bug
/// in the rebalancing code, never a caller error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Violation<K> {
    #[error("node {key:?} caches height {cached} but its subtree has height {actual}")]
    HeightMismatch { key: K, cached: usize, actual: usize },
    #[error("node {key:?} has balance factor {balance}")]
    Unbalanced { key: K, balance: isize },
    #[error("in-order keys not ascending: {prev:?} before {next:?}")]
    OutOfOrder { prev: K, next: K },
}
