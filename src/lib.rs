pub mod avl_tree;
pub mod config;
pub mod error;
pub mod sample;
