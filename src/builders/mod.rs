//! Builders to construct queue trees from configuration.

pub mod tree_builder;

pub use tree_builder::{build_queue_tree, in_memory_leaves, QueueTree, DEFAULT_POLICY};
