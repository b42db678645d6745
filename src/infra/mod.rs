//! Infrastructure adapters: concrete leaf queues for development and testing.

pub mod leaf;
