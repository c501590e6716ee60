//! Convoy Motion - Where followers go when their leader moves
//!
//! This crate implements:
//! - The follower position engine (vector and rel modes, elevation locks)
//! - Join-time offset computation
//! - Wall collision detection and the collision fallback policy

pub mod position;
pub mod delta;
pub mod collision;

pub use position::*;
pub use delta::*;
pub use collision::*;
