//! Convoy Store - Follow records over the shared document store
//!
//! This crate provides:
//! - RelationStore: read and write leader/follower records through batches
//! - MemoryStore: an in-memory document store with a change log

pub mod memory;
pub mod relations;

pub use memory::*;
pub use relations::*;
