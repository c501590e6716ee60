//! Relation store
//!
//! Leader and follower records live on the entities themselves. Every
//! mutation here reads the current record, edits a copy and writes it back
//! as one batched update, so the record stays whole even when two peers
//! write different entities at once.

use std::sync::Arc;

use convoy_core::{
    ConvoyError, ConvoyResult, DocumentStore, Entity, EntityId, EntityUpdate, FollowerState, Grid,
    LeaderState, Patch, Relation, SceneId, UpdateOptions, UserId,
};
use tracing::debug;

/// Typed access to follow records
#[derive(Clone)]
pub struct RelationStore {
    docs: Arc<dyn DocumentStore>,
}

impl RelationStore {
    pub fn new(docs: Arc<dyn DocumentStore>) -> Self {
        Self { docs }
    }

    pub fn documents(&self) -> &Arc<dyn DocumentStore> {
        &self.docs
    }

    pub fn entity(&self, scene: SceneId, id: EntityId) -> Option<Entity> {
        self.docs.entity(scene, id)
    }

    /// Scene grid, or the default square grid for unknown scenes
    pub fn grid(&self, scene: SceneId) -> Grid {
        self.docs.grid(scene).unwrap_or_default()
    }

    pub fn leader_state(&self, scene: SceneId, id: EntityId) -> Option<LeaderState> {
        self.entity(scene, id)?.flags.leader
    }

    pub fn follower_state(&self, scene: SceneId, id: EntityId) -> Option<FollowerState> {
        self.entity(scene, id)?.flags.follower
    }

    fn require(&self, scene: SceneId, id: EntityId) -> ConvoyResult<Entity> {
        self.entity(scene, id)
            .ok_or(ConvoyError::EntityNotFound { scene, entity: id })
    }

    /// Write a batch; empty batches are skipped
    pub async fn write_batch(
        &self,
        scene: SceneId,
        updates: Vec<EntityUpdate>,
        options: UpdateOptions,
    ) -> ConvoyResult<()> {
        if updates.is_empty() {
            return Ok(());
        }
        self.docs.update_entities(scene, updates, options).await
    }

    /// Append `follower` to the leader's list; false when already listed
    pub async fn add_follower(
        &self,
        scene: SceneId,
        leader: EntityId,
        follower: EntityId,
        options: UpdateOptions,
    ) -> ConvoyResult<bool> {
        let entity = self.require(scene, leader)?;
        let mut state = entity.flags.leader.unwrap_or_default();
        if !state.insert(follower) {
            return Ok(false);
        }

        let update = EntityUpdate::new(leader).leader(Patch::Set(state));
        self.write_batch(scene, vec![update], options).await?;
        debug!(leader = %leader, follower = %follower, "follower listed");
        Ok(true)
    }

    /// Drop `follower` from the leader's list, clearing the record when empty
    pub async fn remove_follower(
        &self,
        scene: SceneId,
        leader: EntityId,
        follower: EntityId,
        options: UpdateOptions,
    ) -> ConvoyResult<bool> {
        let entity = self.require(scene, leader)?;
        let Some(mut state) = entity.flags.leader else {
            return Ok(false);
        };
        if !state.remove(follower) {
            return Ok(false);
        }

        let patch = if state.is_empty() {
            Patch::Clear
        } else {
            Patch::Set(state)
        };
        self.write_batch(scene, vec![EntityUpdate::new(leader).leader(patch)], options)
            .await?;
        debug!(leader = %leader, follower = %follower, "follower unlisted");
        Ok(true)
    }

    /// Store the relation to `leader`, resuming the follower
    pub async fn set_relation(
        &self,
        scene: SceneId,
        follower: EntityId,
        leader: EntityId,
        relation: Relation,
        user: UserId,
        options: UpdateOptions,
    ) -> ConvoyResult<()> {
        let entity = self.require(scene, follower)?;
        let mut state = entity.flags.follower.unwrap_or_default();
        state.insert(leader, relation);
        state.paused = false;
        state.last_user = Some(user);

        let update = EntityUpdate::new(follower).follower(Patch::Set(state));
        self.write_batch(scene, vec![update], options).await
    }

    /// Forget the relation to `leader`; the record goes with the last one
    pub async fn remove_relation(
        &self,
        scene: SceneId,
        follower: EntityId,
        leader: EntityId,
        options: UpdateOptions,
    ) -> ConvoyResult<bool> {
        let entity = self.require(scene, follower)?;
        let Some(mut state) = entity.flags.follower else {
            return Ok(false);
        };
        if state.remove(leader).is_none() {
            return Ok(false);
        }

        let patch = if state.is_empty() {
            Patch::Clear
        } else {
            Patch::Set(state)
        };
        self.write_batch(scene, vec![EntityUpdate::new(follower).follower(patch)], options)
            .await?;
        Ok(true)
    }

    /// Set the paused flag on every listed entity holding a follower record.
    ///
    /// Returns how many records changed.
    pub async fn set_paused(
        &self,
        scene: SceneId,
        ids: &[EntityId],
        paused: bool,
        options: UpdateOptions,
    ) -> ConvoyResult<usize> {
        let updates: Vec<EntityUpdate> = ids
            .iter()
            .filter_map(|id| {
                let mut state = self.follower_state(scene, *id)?;
                if state.paused == paused {
                    return None;
                }
                state.paused = paused;
                Some(EntityUpdate::new(*id).follower(Patch::Set(state)))
            })
            .collect();

        let count = updates.len();
        self.write_batch(scene, updates, options).await?;
        Ok(count)
    }

    /// Strip every follow record from the listed entities
    pub async fn clear(
        &self,
        scene: SceneId,
        ids: &[EntityId],
        options: UpdateOptions,
    ) -> ConvoyResult<()> {
        let updates = ids.iter().copied().map(EntityUpdate::clear_flags).collect();
        self.write_batch(scene, updates, options).await
    }

    /// Strip follow records from every entity in `scene` that has one
    pub async fn disband_scene(&self, scene: SceneId, options: UpdateOptions) -> ConvoyResult<usize> {
        let ids: Vec<EntityId> = self
            .docs
            .entities(scene)
            .into_iter()
            .filter(|e| !e.flags.is_empty())
            .map(|e| e.id)
            .collect();

        self.clear(scene, &ids, options).await?;
        Ok(ids.len())
    }
}

impl std::fmt::Debug for RelationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationStore").finish_non_exhaustive()
    }
}
