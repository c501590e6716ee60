//! Convoy Authority - Who applies each mutation
//!
//! There is no server. Every peer evaluates the same deterministic rule over
//! the same session list, so exactly one peer claims each entity:
//!
//! - only active sessions count, ordered by `(connected_at, user)`
//! - the first privileged session owns everything
//! - otherwise the session with the highest permission owns the entity,
//!   provided it reaches the policy minimum
//!
//! Peers that are not authoritative drop the event silently.

pub mod resolver;
pub mod sessions;

pub use resolver::*;
pub use sessions::*;
