//! Leaf queue implementations.

pub mod memory;

pub use memory::InMemoryLeafQueue;
