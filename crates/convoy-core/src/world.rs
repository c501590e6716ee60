//! Collaborator seams
//!
//! Convoy never owns the world. Documents, sessions, wall geometry, the
//! broadcast channel and user feedback are injected through these traits.

use std::future::Future;
use std::pin::Pin;

use crate::{
    CollisionNotice, ConvoyResult, Entity, EntityId, EntityUpdate, Envelope, FollowMode, Grid,
    PermissionLevel, Point, SceneId, UpdateOptions, UserId,
};

/// Boxed future returned by object-safe async collaborator methods
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Shared document store holding every scene and entity
pub trait DocumentStore: Send + Sync {
    /// Look up one entity
    fn entity(&self, scene: SceneId, id: EntityId) -> Option<Entity>;

    /// All entities of a scene
    fn entities(&self, scene: SceneId) -> Vec<Entity>;

    /// All known scenes
    fn scenes(&self) -> Vec<SceneId>;

    /// Grid of a scene
    fn grid(&self, scene: SceneId) -> Option<Grid>;

    /// Apply a batch of updates atomically
    fn update_entities(
        &self,
        scene: SceneId,
        updates: Vec<EntityUpdate>,
        options: UpdateOptions,
    ) -> BoxFuture<'_, ConvoyResult<()>>;
}

/// A connected client
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Session {
    pub user: UserId,
    /// GM-class session with authority over everything
    pub privileged: bool,
    pub active: bool,
    /// Connection order stamp; lower connected earlier
    pub connected_at: u64,
}

impl Session {
    pub fn player(user: UserId, connected_at: u64) -> Self {
        Session {
            user,
            privileged: false,
            active: true,
            connected_at,
        }
    }

    pub fn gm(user: UserId, connected_at: u64) -> Self {
        Session {
            privileged: true,
            ..Session::player(user, connected_at)
        }
    }
}

/// Registry of connected sessions
pub trait SessionRegistry: Send + Sync {
    fn active_sessions(&self) -> Vec<Session>;

    /// Permission a session holds on an entity
    fn permission(&self, entity: &Entity, user: UserId) -> PermissionLevel {
        entity.permission(user)
    }
}

/// Wall geometry of the scene this client is looking at
pub trait CollisionQuery: Send + Sync {
    /// Scene currently loaded on this client
    fn viewed_scene(&self) -> Option<SceneId>;

    /// Is any blocking geometry between the two points?
    fn test_collision(&self, origin: Point, destination: Point) -> BoxFuture<'_, bool>;
}

/// Broadcast channel to every other peer
pub trait Transport: Send + Sync {
    fn broadcast(&self, envelope: &Envelope) -> ConvoyResult<()>;
}

/// User-facing feedback
pub trait Notifier: Send + Sync {
    /// A follower set up by this user was halted by a wall
    fn wall_collision(&self, notice: &CollisionNotice);

    /// A follow was requested without a leader
    fn missing_target(&self);

    /// A follow request went out
    fn follow_confirmed(&self, mode: FollowMode, count: usize);
}

/// Transport for a client with no peers
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPeers;

impl Transport for NoPeers {
    fn broadcast(&self, _envelope: &Envelope) -> ConvoyResult<()> {
        Ok(())
    }
}
