//! Entities and batched updates
//!
//! Entities are owned by the host document store. Convoy reads them,
//! and writes back through [`EntityUpdate`] batches.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    facing_from_rotation, EntityId, EventKind, FollowFlags, FollowerState, Grid, LeaderState,
    Location, Point, SceneId, Size, UserId,
};

/// Access level a session holds on an entity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum PermissionLevel {
    #[default]
    None = 0,
    Limited = 1,
    Observer = 2,
    Owner = 3,
}

/// A mobile object in a scene
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    /// Top-left corner
    pub x: f64,
    pub y: f64,
    pub elevation: f64,
    /// Rotation in degrees
    pub rotation: f64,
    /// Footprint in grid units
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub permissions: BTreeMap<UserId, PermissionLevel>,
    #[serde(default, deserialize_with = "FollowFlags::deserialize_any_version")]
    pub flags: FollowFlags,
}

impl Entity {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Entity {
            id,
            name: name.into(),
            x: 0.0,
            y: 0.0,
            elevation: 0.0,
            rotation: 0.0,
            width: 1.0,
            height: 1.0,
            permissions: BTreeMap::new(),
            flags: FollowFlags::default(),
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = elevation;
        self
    }

    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_footprint(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_permission(mut self, user: UserId, level: PermissionLevel) -> Self {
        self.permissions.insert(user, level);
        self
    }

    pub fn permission(&self, user: UserId) -> PermissionLevel {
        self.permissions.get(&user).copied().unwrap_or_default()
    }

    pub fn size(&self, grid: &Grid) -> Size {
        grid.footprint(self.width, self.height)
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn center(&self, grid: &Grid) -> Point {
        let half = self.size(grid).half();
        self.top_left().offset(half.x, half.y)
    }

    /// Location as currently stored
    pub fn location(&self, grid: &Grid) -> Location {
        let center = self.center(grid);
        Location::new(center.x, center.y, self.elevation, facing_from_rotation(self.rotation))
    }

    /// Location once `update` is applied
    pub fn location_after(&self, grid: &Grid, update: &EntityUpdate) -> Location {
        let half = self.size(grid).half();
        Location::new(
            update.x.unwrap_or(self.x) + half.x,
            update.y.unwrap_or(self.y) + half.y,
            update.elevation.unwrap_or(self.elevation),
            facing_from_rotation(update.rotation.unwrap_or(self.rotation)),
        )
    }

    pub fn leader_state(&self) -> Option<&LeaderState> {
        self.flags.leader.as_ref()
    }

    pub fn follower_state(&self) -> Option<&FollowerState> {
        self.flags.follower.as_ref()
    }

    /// Listed followers, empty when not leading
    pub fn followers(&self) -> &[EntityId] {
        self.flags
            .leader
            .as_ref()
            .map(|s| s.followers.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_leading(&self) -> bool {
        !self.followers().is_empty()
    }

    pub fn is_following(&self) -> bool {
        self.flags.follower.as_ref().is_some_and(|s| !s.is_empty())
    }

    /// Apply an update in place
    pub fn apply(&mut self, update: &EntityUpdate) {
        if let Some(x) = update.x {
            self.x = x;
        }
        if let Some(y) = update.y {
            self.y = y;
        }
        if let Some(elevation) = update.elevation {
            self.elevation = elevation;
        }
        if let Some(rotation) = update.rotation {
            self.rotation = rotation;
        }
        update.leader.apply_to(&mut self.flags.leader);
        update.follower.apply_to(&mut self.flags.follower);
    }
}

/// Change to one optional record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Patch<T> {
    Keep,
    Set(T),
    Clear,
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Keep
    }
}

impl<T: Clone> Patch<T> {
    pub fn apply_to(&self, slot: &mut Option<T>) {
        match self {
            Patch::Keep => {}
            Patch::Set(value) => *slot = Some(value.clone()),
            Patch::Clear => *slot = None,
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, Patch::Keep)
    }
}

/// One entity's share of a batched write
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityUpdate {
    pub id: EntityId,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub elevation: Option<f64>,
    pub rotation: Option<f64>,
    #[serde(default)]
    pub leader: Patch<LeaderState>,
    #[serde(default)]
    pub follower: Patch<FollowerState>,
}

impl EntityUpdate {
    pub fn new(id: EntityId) -> Self {
        EntityUpdate {
            id,
            ..EntityUpdate::default()
        }
    }

    pub fn position(mut self, x: f64, y: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    pub fn elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn rotation(mut self, rotation: f64) -> Self {
        self.rotation = Some(rotation);
        self
    }

    pub fn leader(mut self, patch: Patch<LeaderState>) -> Self {
        self.leader = patch;
        self
    }

    pub fn follower(mut self, patch: Patch<FollowerState>) -> Self {
        self.follower = patch;
        self
    }

    /// Drop every follow record from the entity
    pub fn clear_flags(id: EntityId) -> Self {
        EntityUpdate::new(id)
            .leader(Patch::Clear)
            .follower(Patch::Clear)
    }

    /// Position or elevation changed
    pub fn moves(&self) -> bool {
        self.x.is_some() || self.y.is_some() || self.elevation.is_some()
    }

    /// Position, elevation or rotation changed
    pub fn moves_or_turns(&self) -> bool {
        self.moves() || self.rotation.is_some()
    }
}

/// Options attached to a batched write
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOptions {
    /// User performing the write
    pub user: UserId,
    /// Event that caused the write, if any
    pub event: Option<EventKind>,
    /// Relocate without animating
    pub teleport: bool,
}

impl UpdateOptions {
    pub fn by(user: UserId) -> Self {
        UpdateOptions {
            user,
            event: None,
            teleport: false,
        }
    }

    pub fn caused_by(mut self, event: EventKind) -> Self {
        self.event = Some(event);
        self
    }

    pub fn teleporting(mut self) -> Self {
        self.teleport = true;
        self
    }
}

/// Notification of one applied entity update
#[derive(Clone, Debug)]
pub struct EntityChanged {
    pub scene: SceneId,
    pub before: Entity,
    pub after: Entity,
    pub update: EntityUpdate,
    pub options: UpdateOptions,
}
