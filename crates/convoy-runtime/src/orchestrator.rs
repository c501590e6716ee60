//! Movement Orchestrator
//!
//! Handles a leader move on the client that owns the affected followers:
//! plan each follower's new position, check walls, then write the results
//! in three batches (stops, teleports, moves).

use convoy_core::{
    CollisionNotice, ConvoyResult, Entity, EntityId, EntityUpdate, EventKind, FollowVector,
    LeaderMove, Link, Message, Patch, Point, SceneId, Size,
};
use convoy_motion::CollisionPolicy;
use tracing::{debug, trace, warn};

use crate::Convoy;

/// What one leader move did on this client
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MoveReport {
    pub moved: Vec<EntityId>,
    /// Halted by a wall and paused
    pub stopped: Vec<EntityId>,
    /// Relocated next to the leader after hitting a wall
    pub teleported: Vec<EntityId>,
    /// Listed followers with no matching relation
    pub corrected: Vec<EntityId>,
}

impl MoveReport {
    pub fn is_empty(&self) -> bool {
        self.moved.is_empty()
            && self.stopped.is_empty()
            && self.teleported.is_empty()
            && self.corrected.is_empty()
    }
}

#[derive(Default)]
struct Buckets {
    moves: Vec<EntityUpdate>,
    stops: Vec<EntityUpdate>,
    teleports: Vec<EntityUpdate>,
    notices: Vec<CollisionNotice>,
}

impl Convoy {
    /// Reposition every follower of a moved leader that this client owns
    pub async fn process_leader_move(&self, moved: LeaderMove) -> ConvoyResult<MoveReport> {
        let scene = moved.leader.scene_id;
        let leader_id = moved.leader.entity_id;
        let vector = moved.leader.follow_vector;

        let owned: Vec<Entity> = moved
            .followers
            .iter()
            .filter_map(|id| self.relations.entity(scene, *id))
            .filter(|follower| self.owns(Some(follower)))
            .collect();

        let mut report = MoveReport::default();
        if owned.is_empty() {
            trace!(leader = %leader_id, "no owned followers");
            return Ok(report);
        }

        let grid = self.relations.grid(scene);
        let leader_size = self
            .relations
            .entity(scene, leader_id)
            .map(|leader| leader.size(&grid))
            .unwrap_or_default();

        let mut buckets = Buckets::default();

        for follower in owned {
            let Some(state) = follower.follower_state() else {
                self.correct(scene, leader_id, follower.id, &mut report).await?;
                continue;
            };
            let Some(relation) = state.relation(leader_id).copied() else {
                self.correct(scene, leader_id, follower.id, &mut report).await?;
                continue;
            };
            if state.paused && !relation.locks.follow {
                trace!(follower = %follower.id, "paused");
                continue;
            }

            let size = follower.size(&grid);
            let current = follower.top_left();
            let planned = self.engine.plan(&vector, &relation, size, current);
            if planned.is_empty() {
                continue;
            }

            let placement = planned.resolve(current);
            let target = if relation.snap {
                grid.snap_corner(placement.point)
            } else {
                placement.point
            };

            let half = size.half();
            let blocked = self
                .collisions
                .check(scene, follower.center(&grid), target.offset(half.x, half.y))
                .await;

            if !blocked {
                buckets.moves.push(position_update(follower.id, target, placement.elevation));
                report.moved.push(follower.id);
                continue;
            }

            match self.collisions.policy() {
                CollisionPolicy::Teleport => {
                    let slot = self.teleport_slot(&vector, leader_size, buckets.teleports.len());
                    buckets.teleports.push(position_update(follower.id, slot, placement.elevation));
                    report.teleported.push(follower.id);
                }
                CollisionPolicy::Stop | CollisionPolicy::Off => {
                    let mut halted = state.clone();
                    halted.paused = true;
                    buckets.notices.push(CollisionNotice {
                        entity_id: follower.id,
                        entity_name: follower.name.clone(),
                        user: state.last_user,
                    });
                    buckets.stops.push(EntityUpdate::new(follower.id).follower(Patch::Set(halted)));
                    report.stopped.push(follower.id);
                }
            }
        }

        self.persist(scene, buckets).await?;
        debug!(
            leader = %leader_id,
            moved = report.moved.len(),
            stopped = report.stopped.len(),
            teleported = report.teleported.len(),
            "leader move applied"
        );
        Ok(report)
    }

    /// Top-left of the `index`-th follower teleported by this move
    fn teleport_slot(&self, vector: &FollowVector, leader_size: Size, index: usize) -> Point {
        let step = self.config.teleport_step * (index + 1) as f64;
        let half = leader_size.half();
        vector.b.point().offset(step - half.x, step - half.y)
    }

    async fn correct(
        &self,
        scene: SceneId,
        leader: EntityId,
        follower: EntityId,
        report: &mut MoveReport,
    ) -> ConvoyResult<()> {
        warn!(leader = %leader, follower = %follower, "listed follower has no relation, unlisting");
        report.corrected.push(follower);
        self.emit(Message::RemoveFollower(Link {
            leader_id: leader,
            follower_id: follower,
            scene_id: scene,
        }))
        .await
    }

    async fn persist(&self, scene: SceneId, buckets: Buckets) -> ConvoyResult<()> {
        let Buckets {
            moves,
            stops,
            teleports,
            notices,
        } = buckets;
        let options = self.write_options(EventKind::LeaderMove);

        for notice in notices {
            self.emit(Message::NotifyCollision(notice)).await?;
        }

        self.relations.write_batch(scene, stops, options).await?;
        self.relations
            .write_batch(scene, teleports, options.teleporting())
            .await?;
        self.relations.write_batch(scene, moves, options).await
    }
}

fn position_update(id: EntityId, top_left: Point, elevation: Option<f64>) -> EntityUpdate {
    let update = EntityUpdate::new(id).position(top_left.x, top_left.y);
    match elevation {
        Some(z) => update.elevation(z),
        None => update,
    }
}
