/// What `insert` does when the key is already stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnDuplicate {
    /// Leave the tree untouched and report success.
    Ignore,
    /// Leave the tree untouched and hand the key back as an error.
    Reject,
}

pub trait ConfigT {
    /// Run AVL rebalancing after every mutation. Without it the tree is a
    /// plain BST that still caches heights.
    const BALANCE: bool;
    const ON_DUPLICATE: OnDuplicate;
    const CHECK_INVARIANTS: bool; // only honoured with debug_assertions
}

pub struct StrictConfig;
pub struct StrictConfigDebug;
pub struct BaselineConfig;

impl ConfigT for StrictConfig {
    const BALANCE: bool = true;
    const ON_DUPLICATE: OnDuplicate = OnDuplicate::Reject;
    const CHECK_INVARIANTS: bool = false;
}

impl ConfigT for StrictConfigDebug {
    const BALANCE: bool = true;
    const ON_DUPLICATE: OnDuplicate = OnDuplicate::Reject;
    const CHECK_INVARIANTS: bool = true;
}

impl ConfigT for BaselineConfig {
    const BALANCE: bool = false;
    const ON_DUPLICATE: OnDuplicate = OnDuplicate::Ignore;
    const CHECK_INVARIANTS: bool = false;
}
