//! Convoy Core - Fundamental types and collaborator seams
//!
//! This crate defines the types shared by every convoy component:
//! - Identifiers (EntityId, SceneId, UserId)
//! - Geometry primitives (Point, Location, FollowVector, Grid)
//! - Follow records (Relation, LeaderState, FollowerState, FollowFlags)
//! - Entities and batched updates
//! - Wire messages (EventKind, Envelope, Message)
//! - Collaborator traits (DocumentStore, SessionRegistry, CollisionQuery, Transport, Notifier)

pub mod id;
pub mod error;
pub mod geometry;
pub mod relation;
pub mod entity;
pub mod event;
pub mod world;

pub use id::*;
pub use error::*;
pub use geometry::*;
pub use relation::*;
pub use entity::*;
pub use event::*;
pub use world::*;
