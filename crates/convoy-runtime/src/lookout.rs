//! Host document hooks
//!
//! The host calls these when entities change, disappear or get created.
//! Only the client whose user wrote a change reacts to it, so each change
//! produces at most one leader-move broadcast.

use convoy_core::{
    ConvoyResult, Entity, EntityChanged, EntityId, EventKind, FollowFlags, FollowVector,
    LeaderMove, LeaderRef, Link, Message, SceneId, UpdateOptions, UserId,
};
use tracing::{debug, info};

use crate::Convoy;

impl Convoy {
    /// React to an applied entity update
    pub async fn on_entity_updated(&self, change: &EntityChanged) -> ConvoyResult<()> {
        if change.options.user != self.user {
            return Ok(());
        }

        let before = &change.before;
        let after = &change.after;
        let grid = self.relations.grid(change.scene);

        if after.is_leading() && change.update.moves_or_turns() {
            let vector = FollowVector::new(
                before.location(&grid),
                before.location_after(&grid, &change.update),
            );
            if vector.is_planar_change() || vector.dz != 0.0 {
                debug!(leader = %after.id, dx = vector.dx, dy = vector.dy, "leader moved");
                self.emit(Message::LeaderMove(LeaderMove {
                    leader: LeaderRef {
                        entity_id: after.id,
                        scene_id: change.scene,
                        follow_vector: vector,
                    },
                    followers: after.followers().to_vec(),
                }))
                .await?;
            }
        }

        if change.options.event == Some(EventKind::LeaderMove) {
            return Ok(());
        }

        if !after.is_following() {
            return Ok(());
        }
        let Some(state) = after.follower_state() else {
            return Ok(());
        };
        let displaced =
            before.x != after.x || before.y != after.y || before.elevation != after.elevation;
        if !displaced || state.paused || state.always_follows() {
            return Ok(());
        }

        debug!(follower = %after.id, "moved independently, pausing");
        self.relations
            .set_paused(change.scene, &[after.id], true, UpdateOptions::by(self.user))
            .await?;
        Ok(())
    }

    /// Unlink a deleted entity from everything it was tied to
    pub async fn on_entity_deleted(
        &self,
        scene: SceneId,
        entity: &Entity,
        user: UserId,
    ) -> ConvoyResult<()> {
        if user != self.user {
            return Ok(());
        }

        for follower in entity.followers() {
            self.emit(Message::RemoveLeader(Link {
                leader_id: entity.id,
                follower_id: *follower,
                scene_id: scene,
            }))
            .await?;
        }

        if let Some(state) = entity.follower_state() {
            for leader in state.leaders.keys() {
                self.emit(Message::RemoveFollower(Link {
                    leader_id: *leader,
                    follower_id: entity.id,
                    scene_id: scene,
                }))
                .await?;
            }
        }

        if !entity.flags.is_empty() {
            info!(entity = %entity.id, "deleted entity unlinked");
        }
        Ok(())
    }

    /// Strip follow records from a freshly created or pasted entity
    pub fn sanitize_created(entity: &mut Entity) {
        entity.flags = FollowFlags::default();
    }

    /// Ids listed in `entity`'s leader record
    pub fn followers_of(&self, scene: SceneId, entity: EntityId) -> Vec<EntityId> {
        self.relations
            .leader_state(scene, entity)
            .map(|state| state.followers)
            .unwrap_or_default()
    }
}
