//! End-to-end scenarios
//!
//! Every scenario runs the full path: a request or drag on one peer, the
//! broadcast through the hub, ownership checks on every peer and the writes
//! that land in the shared store.

use convoy_core::{Entity, EntityId, Grid, PermissionLevel, SceneId, UserId};

use crate::Table;

pub const SCENE: SceneId = SceneId(1);
pub const GM: UserId = UserId(1);
pub const ALICE: UserId = UserId(2);
pub const BOB: UserId = UserId(3);

/// Square-grid table with one GM and one player
pub fn gm_table(config: convoy_runtime::FollowConfig) -> Table {
    let mut table = Table::new(SCENE, Grid::square(100.0));
    table.join(GM, true, config.clone());
    table.join(ALICE, false, config);
    table
}

/// A 1×1 token owned by `owner`
pub fn token(id: u64, owner: UserId, x: f64, y: f64) -> Entity {
    Entity::new(EntityId::new(id), format!("token-{id}"))
        .at(x, y)
        .with_permission(owner, PermissionLevel::Owner)
}
