//! In-memory document store
//!
//! Holds every scene's grid and entities behind one lock. A batch is
//! validated in full before anything is written, so it either lands
//! completely or not at all. Every applied update is appended to a change
//! log that hosts drain and feed back to each peer's update hook.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use convoy_core::{
    BoxFuture, ConvoyError, ConvoyResult, DocumentStore, Entity, EntityChanged, EntityId,
    EntityUpdate, Grid, SceneId, UpdateOptions,
};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

#[derive(Debug, Default, Clone)]
struct SceneDoc {
    grid: Grid,
    entities: BTreeMap<EntityId, Entity>,
}

/// Document store kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    scenes: RwLock<BTreeMap<SceneId, SceneDoc>>,
    changes: Mutex<Vec<EntityChanged>>,
    fail_writes: AtomicBool,
    batches: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or regrid a scene
    pub fn add_scene(&self, scene: SceneId, grid: Grid) {
        self.scenes.write().entry(scene).or_default().grid = grid;
    }

    /// Insert an entity without going through the change log
    pub fn insert(&self, scene: SceneId, entity: Entity) {
        self.scenes
            .write()
            .entry(scene)
            .or_default()
            .entities
            .insert(entity.id, entity);
    }

    /// Remove an entity, returning it
    pub fn remove(&self, scene: SceneId, id: EntityId) -> Option<Entity> {
        self.scenes.write().get_mut(&scene)?.entities.remove(&id)
    }

    /// Make every following batch fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of batches applied so far
    pub fn batch_count(&self) -> u64 {
        self.batches.load(Ordering::SeqCst)
    }

    /// Take every change recorded since the last drain
    pub fn drain_changes(&self) -> Vec<EntityChanged> {
        std::mem::take(&mut *self.changes.lock())
    }

    fn apply_batch(
        &self,
        scene: SceneId,
        updates: &[EntityUpdate],
        options: UpdateOptions,
    ) -> ConvoyResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ConvoyError::StoreWrite {
                scene,
                reason: "writes disabled".to_owned(),
            });
        }

        let mut scenes = self.scenes.write();
        let doc = scenes
            .get_mut(&scene)
            .ok_or(ConvoyError::SceneNotFound(scene))?;

        if let Some(missing) = updates.iter().find(|u| !doc.entities.contains_key(&u.id)) {
            return Err(ConvoyError::EntityNotFound {
                scene,
                entity: missing.id,
            });
        }

        let mut log = Vec::with_capacity(updates.len());
        for update in updates {
            if let Some(entity) = doc.entities.get_mut(&update.id) {
                let before = entity.clone();
                entity.apply(update);
                log.push(EntityChanged {
                    scene,
                    before,
                    after: entity.clone(),
                    update: update.clone(),
                    options,
                });
            }
        }
        drop(scenes);

        debug!(scene = %scene, count = log.len(), event = ?options.event, "batch applied");
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.changes.lock().extend(log);
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn entity(&self, scene: SceneId, id: EntityId) -> Option<Entity> {
        self.scenes.read().get(&scene)?.entities.get(&id).cloned()
    }

    fn entities(&self, scene: SceneId) -> Vec<Entity> {
        self.scenes
            .read()
            .get(&scene)
            .map(|doc| doc.entities.values().cloned().collect())
            .unwrap_or_default()
    }

    fn scenes(&self) -> Vec<SceneId> {
        self.scenes.read().keys().copied().collect()
    }

    fn grid(&self, scene: SceneId) -> Option<Grid> {
        self.scenes.read().get(&scene).map(|doc| doc.grid)
    }

    fn update_entities(
        &self,
        scene: SceneId,
        updates: Vec<EntityUpdate>,
        options: UpdateOptions,
    ) -> BoxFuture<'_, ConvoyResult<()>> {
        Box::pin(async move { self.apply_batch(scene, &updates, options) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoy_core::{EventKind, UserId};

    fn store() -> (MemoryStore, SceneId) {
        let scene = SceneId::new(1);
        let store = MemoryStore::new();
        store.add_scene(scene, Grid::square(100.0));
        store.insert(scene, Entity::new(EntityId::new(1), "a"));
        store.insert(scene, Entity::new(EntityId::new(2), "b"));
        (store, scene)
    }

    #[tokio::test]
    async fn test_batch_applies_and_logs() {
        let (store, scene) = store();
        let options = UpdateOptions::by(UserId::new(7)).caused_by(EventKind::LeaderMove);

        store
            .update_entities(
                scene,
                vec![
                    EntityUpdate::new(EntityId::new(1)).position(10.0, 20.0),
                    EntityUpdate::new(EntityId::new(2)).elevation(5.0),
                ],
                options,
            )
            .await
            .unwrap();

        assert_eq!(store.entity(scene, EntityId::new(1)).unwrap().x, 10.0);
        assert_eq!(store.entity(scene, EntityId::new(2)).unwrap().elevation, 5.0);
        assert_eq!(store.batch_count(), 1);

        let changes = store.drain_changes();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].before.x, 0.0);
        assert_eq!(changes[0].after.x, 10.0);
        assert_eq!(changes[0].options.event, Some(EventKind::LeaderMove));
        assert!(store.drain_changes().is_empty());
    }

    #[tokio::test]
    async fn test_missing_entity_fails_whole_batch() {
        let (store, scene) = store();
        let err = store
            .update_entities(
                scene,
                vec![
                    EntityUpdate::new(EntityId::new(1)).position(10.0, 20.0),
                    EntityUpdate::new(EntityId::new(99)).position(0.0, 0.0),
                ],
                UpdateOptions::by(UserId::new(1)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ConvoyError::EntityNotFound { .. }));
        assert_eq!(store.entity(scene, EntityId::new(1)).unwrap().x, 0.0);
        assert!(store.drain_changes().is_empty());
    }

    #[tokio::test]
    async fn test_failing_writes() {
        let (store, scene) = store();
        store.set_fail_writes(true);

        let result = store
            .update_entities(
                scene,
                vec![EntityUpdate::new(EntityId::new(1)).position(1.0, 1.0)],
                UpdateOptions::by(UserId::new(1)),
            )
            .await;
        assert!(matches!(result, Err(ConvoyError::StoreWrite { .. })));

        let missing = store
            .update_entities(SceneId::new(9), vec![], UpdateOptions::by(UserId::new(1)))
            .await;
        assert!(missing.is_err());
    }

    #[test]
    fn test_scene_listing() {
        let (store, scene) = store();
        assert_eq!(store.scenes(), vec![scene]);
        assert_eq!(store.entities(scene).len(), 2);
        assert_eq!(store.grid(scene), Some(Grid::square(100.0)));
        assert!(store.remove(scene, EntityId::new(1)).is_some());
        assert!(store.entity(scene, EntityId::new(1)).is_none());
    }
}
