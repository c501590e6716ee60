//! Public follow API

use convoy_core::{
    ConvoyError, ConvoyResult, DocumentStore, ElevationLock, EntityId, Envelope, Join, Link, Locks,
    Message, OrientationSpec, SceneId, UpdateOptions,
};
use convoy_bus::DispatchReport;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::Convoy;

/// How a new follower tracks its leader
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FollowOptions {
    pub orientation: OrientationSpec,
    pub locks: Locks,
    pub snap: bool,
}

impl Default for FollowOptions {
    fn default() -> Self {
        Self::formation()
    }
}

impl FollowOptions {
    /// Hold position around the leader's facing; snaps, pauses when moved
    pub fn formation() -> Self {
        FollowOptions {
            orientation: OrientationSpec::DETECT,
            locks: Locks {
                elevation: ElevationLock::Tether,
                follow: false,
            },
            snap: true,
        }
    }

    /// Repeat every leader step exactly, never pausing
    pub fn shadow() -> Self {
        FollowOptions {
            orientation: OrientationSpec::MIRROR,
            locks: Locks {
                elevation: ElevationLock::Offset,
                follow: true,
            },
            snap: false,
        }
    }

    pub fn orientation(mut self, orientation: OrientationSpec) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn locks(mut self, locks: Locks) -> Self {
        self.locks = locks;
        self
    }

    pub fn snap(mut self, snap: bool) -> Self {
        self.snap = snap;
        self
    }
}

/// A request to make entities follow a leader
#[derive(Clone, Debug, PartialEq)]
pub struct FollowRequest {
    pub scene: SceneId,
    pub leader: Option<EntityId>,
    pub followers: Vec<EntityId>,
    pub options: FollowOptions,
}

impl FollowRequest {
    pub fn new(scene: SceneId, leader: EntityId, followers: impl IntoIterator<Item = EntityId>) -> Self {
        FollowRequest {
            scene,
            leader: Some(leader),
            followers: followers.into_iter().collect(),
            options: FollowOptions::default(),
        }
    }

    pub fn with_options(mut self, options: FollowOptions) -> Self {
        self.options = options;
        self
    }
}

/// Which scenes `disband_all` clears
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisbandScope {
    Scene(SceneId),
    All,
}

impl Convoy {
    /// Link every requested follower to the leader.
    ///
    /// Returns how many join pairs were published.
    pub async fn start_follow(&self, request: FollowRequest, silent: bool) -> ConvoyResult<usize> {
        let Some(leader_id) = request.leader else {
            self.notifier.missing_target();
            return Err(ConvoyError::MissingLeader);
        };
        let scene = request.scene;
        let leader = self
            .relations
            .entity(scene, leader_id)
            .ok_or(ConvoyError::EntityNotFound {
                scene,
                entity: leader_id,
            })?;

        let mut followers: Vec<EntityId> = Vec::with_capacity(request.followers.len());
        for id in request.followers {
            if id != leader_id && !followers.contains(&id) {
                followers.push(id);
            }
        }
        if followers.is_empty() {
            return Err(ConvoyError::NoFollowers);
        }

        let grid = self.relations.grid(scene);
        let orientation = request.options.orientation.resolve(leader.location(&grid).t);

        for follower in &followers {
            let join = Join {
                leader_id,
                follower_id: *follower,
                scene_id: scene,
                orientation,
                locks: request.options.locks,
                snap: request.options.snap,
                initiator: self.user,
            };
            self.emit(Message::AddFollower(join.clone())).await?;
            self.emit(Message::AddLeader(join)).await?;
        }

        info!(leader = %leader_id, count = followers.len(), mode = ?orientation.mode(), "follow requested");
        if !silent {
            self.notifier.follow_confirmed(orientation.mode(), followers.len());
        }
        Ok(followers.len())
    }

    /// Detach `entity` from every leader it follows
    pub async fn stop_following(&self, scene: SceneId, entity: EntityId) -> ConvoyResult<usize> {
        let links = self.leader_links(scene, entity);
        for link in &links {
            self.unlink(*link).await?;
        }
        if !links.is_empty() {
            info!(follower = %entity, leaders = links.len(), "stopped following");
        }
        Ok(links.len())
    }

    /// Clear the paused flag
    pub async fn resume_following(&self, scene: SceneId, entity: EntityId) -> ConvoyResult<bool> {
        let changed = self
            .relations
            .set_paused(scene, &[entity], false, UpdateOptions::by(self.user))
            .await?;
        Ok(changed > 0)
    }

    /// Set the paused flag
    pub async fn pause_following(&self, scene: SceneId, entity: EntityId) -> ConvoyResult<bool> {
        let changed = self
            .relations
            .set_paused(scene, &[entity], true, UpdateOptions::by(self.user))
            .await?;
        Ok(changed > 0)
    }

    /// Drop every follow record in scope; returns how many entities changed
    pub async fn disband_all(&self, scope: DisbandScope) -> ConvoyResult<usize> {
        let scenes = match scope {
            DisbandScope::Scene(scene) => vec![scene],
            DisbandScope::All => self.relations.documents().scenes(),
        };

        let mut cleared = 0;
        for scene in scenes {
            cleared += self
                .relations
                .disband_scene(scene, UpdateOptions::by(self.user))
                .await?;
        }
        info!(?scope, cleared, "disbanded");
        Ok(cleared)
    }

    /// Dispatch an envelope received from a peer
    pub async fn receive(&self, envelope: Envelope) -> ConvoyResult<DispatchReport> {
        self.bus.receive(envelope).await
    }

    /// Dispatch raw wire text received from a peer
    pub async fn receive_text(&self, text: &str) -> ConvoyResult<DispatchReport> {
        self.bus.receive_text(text).await
    }

    /// Publish a follow link removal pair without looking anything up
    pub async fn unlink(&self, link: Link) -> ConvoyResult<()> {
        self.emit(Message::RemoveFollower(link)).await?;
        self.emit(Message::RemoveLeader(link)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Collaborators, FollowConfig};
    use convoy_authority::StaticSessions;
    use convoy_core::{
        CollisionNotice, Entity, FollowMode, Grid, NoPeers, Notifier, Point, Session, UserId,
    };
    use convoy_motion::SegmentWalls;
    use convoy_store::MemoryStore;
    use parking_lot::Mutex;
    use std::sync::Arc;

    const SCENE: SceneId = SceneId(1);
    const LEADER: EntityId = EntityId(1);
    const FOLLOWER: EntityId = EntityId(2);
    const GM: UserId = UserId(100);

    #[derive(Default)]
    struct Recorder {
        missing: Mutex<usize>,
        confirmed: Mutex<Vec<(FollowMode, usize)>>,
    }

    impl Notifier for Recorder {
        fn wall_collision(&self, _notice: &CollisionNotice) {}

        fn missing_target(&self) {
            *self.missing.lock() += 1;
        }

        fn follow_confirmed(&self, mode: FollowMode, count: usize) {
            self.confirmed.lock().push((mode, count));
        }
    }

    fn solo() -> (Arc<Convoy>, Arc<MemoryStore>, Arc<Recorder>) {
        let store = Arc::new(MemoryStore::new());
        store.add_scene(SCENE, Grid::square(100.0));
        store.insert(SCENE, Entity::new(LEADER, "leader"));
        store.insert(SCENE, Entity::new(FOLLOWER, "follower").at(0.0, 200.0));

        let notifier = Arc::new(Recorder::default());
        let convoy = Convoy::new(
            GM,
            FollowConfig::default(),
            Collaborators {
                store: store.clone(),
                sessions: Arc::new(StaticSessions::new([Session::gm(GM, 0)])),
                walls: Arc::new(SegmentWalls::new()),
                transport: Arc::new(NoPeers),
                notifier: notifier.clone(),
            },
        );
        (convoy, store, notifier)
    }

    async fn pump(convoy: &Convoy, store: &MemoryStore) {
        loop {
            let changes = store.drain_changes();
            if changes.is_empty() {
                break;
            }
            for change in &changes {
                convoy.on_entity_updated(change).await.unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_missing_leader_is_reported() {
        let (convoy, _, notifier) = solo();
        let request = FollowRequest {
            leader: None,
            ..FollowRequest::new(SCENE, LEADER, [FOLLOWER])
        };

        let err = convoy.start_follow(request, false).await.unwrap_err();
        assert!(matches!(err, ConvoyError::MissingLeader));
        assert_eq!(*notifier.missing.lock(), 1);
    }

    #[tokio::test]
    async fn test_leader_cannot_follow_itself() {
        let (convoy, _, _) = solo();
        let err = convoy
            .start_follow(FollowRequest::new(SCENE, LEADER, [LEADER]), false)
            .await
            .unwrap_err();
        assert!(matches!(err, ConvoyError::NoFollowers));
    }

    #[tokio::test]
    async fn test_join_is_idempotent_and_confirmed() {
        let (convoy, store, notifier) = solo();

        let request = FollowRequest::new(SCENE, LEADER, [FOLLOWER, FOLLOWER]);
        assert_eq!(convoy.start_follow(request.clone(), false).await.unwrap(), 1);
        assert_eq!(convoy.start_follow(request, true).await.unwrap(), 1);

        let leader = store.entity(SCENE, LEADER).unwrap();
        assert_eq!(leader.followers(), &[FOLLOWER]);
        let state = store.entity(SCENE, FOLLOWER).unwrap().flags.follower.unwrap();
        assert_eq!(state.leaders.len(), 1);
        assert_eq!(state.last_user, Some(GM));
        assert!(!state.paused);

        // Silent requests skip the confirmation
        assert_eq!(*notifier.confirmed.lock(), vec![(FollowMode::Formation, 1)]);
    }

    #[tokio::test]
    async fn test_leader_move_drags_follower() {
        let (convoy, store, _) = solo();
        convoy
            .start_follow(FollowRequest::new(SCENE, LEADER, [FOLLOWER]), true)
            .await
            .unwrap();
        pump(&convoy, &store).await;

        store
            .update_entities(
                SCENE,
                vec![convoy_core::EntityUpdate::new(LEADER).position(100.0, 0.0)],
                UpdateOptions::by(GM),
            )
            .await
            .unwrap();
        pump(&convoy, &store).await;

        // Follower stays 200 ahead of the leader's heading, snapped to the grid
        let follower = store.entity(SCENE, FOLLOWER).unwrap();
        assert_eq!(follower.top_left(), Point::new(300.0, 0.0));
        assert!(!follower.flags.follower.unwrap().paused);
    }

    #[tokio::test]
    async fn test_stop_pause_resume_disband() {
        let (convoy, store, _) = solo();
        convoy
            .start_follow(FollowRequest::new(SCENE, LEADER, [FOLLOWER]), true)
            .await
            .unwrap();

        assert!(convoy.pause_following(SCENE, FOLLOWER).await.unwrap());
        assert!(!convoy.pause_following(SCENE, FOLLOWER).await.unwrap());
        assert!(convoy.resume_following(SCENE, FOLLOWER).await.unwrap());

        assert_eq!(convoy.stop_following(SCENE, FOLLOWER).await.unwrap(), 1);
        assert!(store.entity(SCENE, LEADER).unwrap().flags.is_empty());
        assert!(store.entity(SCENE, FOLLOWER).unwrap().flags.is_empty());

        convoy
            .start_follow(FollowRequest::new(SCENE, LEADER, [FOLLOWER]), true)
            .await
            .unwrap();
        assert_eq!(convoy.disband_all(DisbandScope::All).await.unwrap(), 2);
        assert!(store.entities(SCENE).iter().all(|e| e.flags.is_empty()));
    }

    #[tokio::test]
    async fn test_follower_moved_by_hand_pauses() {
        let (convoy, store, _) = solo();
        convoy
            .start_follow(FollowRequest::new(SCENE, LEADER, [FOLLOWER]), true)
            .await
            .unwrap();
        pump(&convoy, &store).await;

        store
            .update_entities(
                SCENE,
                vec![convoy_core::EntityUpdate::new(FOLLOWER).position(500.0, 500.0)],
                UpdateOptions::by(GM),
            )
            .await
            .unwrap();
        pump(&convoy, &store).await;

        assert!(store.entity(SCENE, FOLLOWER).unwrap().flags.follower.unwrap().paused);
    }

    #[test]
    fn test_follow_option_presets() {
        let shadow = FollowOptions::shadow();
        assert_eq!(shadow.orientation, OrientationSpec::MIRROR);
        assert!(shadow.locks.follow);
        assert!(!shadow.snap);

        let formation = FollowOptions::default();
        assert_eq!(formation.orientation, OrientationSpec::DETECT);
        assert_eq!(formation.locks.elevation, ElevationLock::Tether);
        assert!(formation.snap);
    }

    #[test]
    fn test_sanitize_created() {
        let mut pasted = Entity::new(EntityId::new(9), "copy");
        pasted.flags.leader = Some(Default::default());
        Convoy::sanitize_created(&mut pasted);
        assert!(pasted.flags.is_empty());
    }
}
