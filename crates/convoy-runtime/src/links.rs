//! Join and leave handlers
//!
//! A join is an add-follower / add-leader pair. The leader's owner lists
//! the follower; the follower's owner records the relation. Leaves run the
//! same split in reverse.

use convoy_core::{
    CollisionNotice, ConvoyResult, EntityId, EventKind, Join, Link, Relation, SceneId,
};
use convoy_motion::compute_delta;
use tracing::{debug, info, trace};

use crate::Convoy;

impl Convoy {
    pub(crate) async fn on_add_follower(&self, join: Join) -> ConvoyResult<()> {
        let leader = self.relations.entity(join.scene_id, join.leader_id);
        if !self.owns(leader.as_ref()) {
            return Ok(());
        }

        let listed = self
            .relations
            .add_follower(
                join.scene_id,
                join.leader_id,
                join.follower_id,
                self.write_options(EventKind::AddFollower),
            )
            .await?;
        if !listed {
            trace!(leader = %join.leader_id, follower = %join.follower_id, "already listed");
        }
        Ok(())
    }

    pub(crate) async fn on_add_leader(&self, join: Join) -> ConvoyResult<()> {
        let scene = join.scene_id;
        let follower = self.relations.entity(scene, join.follower_id);
        if !self.owns(follower.as_ref()) {
            return Ok(());
        }
        let (Some(follower), Some(leader)) = (follower, self.relations.entity(scene, join.leader_id)) else {
            debug!(leader = %join.leader_id, "leader gone before join");
            return Ok(());
        };

        let grid = self.relations.grid(scene);
        let leader_at = leader.location(&grid);
        let orientation = join.orientation.resolve(leader_at.t);
        let delta = compute_delta(
            leader_at.point(),
            leader.elevation,
            follower.center(&grid),
            follower.elevation,
            orientation,
        );

        let relation = Relation {
            delta,
            locks: join.locks,
            snap: join.snap,
        };
        self.relations
            .set_relation(
                scene,
                follower.id,
                leader.id,
                relation,
                join.initiator,
                self.write_options(EventKind::AddLeader),
            )
            .await?;

        info!(
            leader = %leader.id,
            follower = %follower.id,
            mode = ?orientation.mode(),
            "follow established"
        );
        Ok(())
    }

    pub(crate) async fn on_remove_follower(&self, link: Link) -> ConvoyResult<()> {
        let leader = self.relations.entity(link.scene_id, link.leader_id);
        if !self.owns(leader.as_ref()) {
            return Ok(());
        }

        self.relations
            .remove_follower(
                link.scene_id,
                link.leader_id,
                link.follower_id,
                self.write_options(EventKind::RemoveFollower),
            )
            .await?;
        Ok(())
    }

    pub(crate) async fn on_remove_leader(&self, link: Link) -> ConvoyResult<()> {
        let follower = self.relations.entity(link.scene_id, link.follower_id);
        if !self.owns(follower.as_ref()) {
            return Ok(());
        }

        let removed = self
            .relations
            .remove_relation(
                link.scene_id,
                link.follower_id,
                link.leader_id,
                self.write_options(EventKind::RemoveLeader),
            )
            .await?;
        if removed {
            info!(leader = %link.leader_id, follower = %link.follower_id, "follow ended");
        }
        Ok(())
    }

    pub(crate) fn on_collision_notice(&self, notice: &CollisionNotice) {
        if notice.user != Some(self.user) || self.config.silent_collisions {
            return;
        }
        self.notifier.wall_collision(notice);
    }

    /// Links between `follower` and every leader it tracks
    pub(crate) fn leader_links(&self, scene: SceneId, follower: EntityId) -> Vec<Link> {
        self.relations
            .follower_state(scene, follower)
            .map(|state| {
                state
                    .leaders
                    .keys()
                    .map(|leader| Link {
                        leader_id: *leader,
                        follower_id: follower,
                        scene_id: scene,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
