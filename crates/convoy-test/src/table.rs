//! Multi-peer table
//!
//! A [`Table`] is one shared document store plus several connected peers,
//! each running its own [`Convoy`]. Broadcasts travel through a [`Hub`] and
//! sit in per-peer inboxes until [`Table::settle`] delivers them, together
//! with the store's change log. With a seed, pending deliveries are shuffled
//! before each round to exercise unordered processing.

use std::sync::Arc;

use convoy_authority::StaticSessions;
use convoy_bus::{Hub, Inbox};
use convoy_core::{
    ConvoyResult, DocumentStore, Entity, EntityId, EntityUpdate, Grid, SceneId, Session,
    UpdateOptions, UserId,
};
use convoy_motion::SegmentWalls;
use convoy_runtime::{Collaborators, Convoy, FollowConfig, FollowOptions, FollowRequest};
use convoy_store::MemoryStore;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::warn;

use crate::RecordingNotifier;

/// Rounds after which `settle` gives up on a feedback loop
const MAX_ROUNDS: usize = 256;

/// One connected client
pub struct Peer {
    pub user: UserId,
    pub convoy: Arc<Convoy>,
    pub notifier: Arc<RecordingNotifier>,
    inbox: Inbox,
}

/// Shared world with several peers
pub struct Table {
    pub scene: SceneId,
    pub store: Arc<MemoryStore>,
    pub sessions: Arc<StaticSessions>,
    pub hub: Arc<Hub>,
    pub walls: Arc<SegmentWalls>,
    peers: Vec<Peer>,
    rng: Option<StdRng>,
    next_stamp: u64,
}

impl Table {
    pub fn new(scene: SceneId, grid: Grid) -> Self {
        let store = Arc::new(MemoryStore::new());
        store.add_scene(scene, grid);
        let walls = Arc::new(SegmentWalls::new());
        walls.view(Some(scene));

        Table {
            scene,
            store,
            sessions: Arc::new(StaticSessions::default()),
            hub: Hub::new(),
            walls,
            peers: Vec::new(),
            rng: None,
            next_stamp: 0,
        }
    }

    /// Deliver pending messages in a seeded random order
    pub fn shuffled(mut self, seed: u64) -> Self {
        self.rng = Some(StdRng::seed_from_u64(seed));
        self
    }

    /// Connect a peer; earlier joins win ownership ties
    pub fn join(&mut self, user: UserId, privileged: bool, config: FollowConfig) -> Arc<Convoy> {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        self.sessions.connect(if privileged {
            Session::gm(user, stamp)
        } else {
            Session::player(user, stamp)
        });

        let (link, inbox) = self.hub.join(user);
        let notifier = Arc::new(RecordingNotifier::new());
        let convoy = Convoy::new(
            user,
            config,
            Collaborators {
                store: self.store.clone(),
                sessions: self.sessions.clone(),
                walls: self.walls.clone(),
                transport: Arc::new(link),
                notifier: notifier.clone(),
            },
        );

        self.peers.push(Peer {
            user,
            convoy: convoy.clone(),
            notifier,
            inbox,
        });
        convoy
    }

    pub fn peer(&self, user: UserId) -> Option<&Peer> {
        self.peers.iter().find(|p| p.user == user)
    }

    pub fn convoy(&self, user: UserId) -> Option<Arc<Convoy>> {
        self.peer(user).map(|p| p.convoy.clone())
    }

    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    /// Place an entity without emitting a change
    pub fn spawn(&self, entity: Entity) -> EntityId {
        let id = entity.id;
        self.store.insert(self.scene, entity);
        id
    }

    pub fn entity(&self, id: EntityId) -> Option<Entity> {
        self.store.entity(self.scene, id)
    }

    /// Write an update as `user`, the way a host would after a drag
    pub async fn update(&self, user: UserId, update: EntityUpdate) -> ConvoyResult<()> {
        self.store
            .update_entities(self.scene, vec![update], UpdateOptions::by(user))
            .await
    }

    pub async fn move_to(&self, user: UserId, id: EntityId, x: f64, y: f64) -> ConvoyResult<()> {
        self.update(user, EntityUpdate::new(id).position(x, y)).await
    }

    /// Issue a follow request from `user`'s peer
    pub async fn follow(
        &self,
        user: UserId,
        leader: EntityId,
        followers: impl IntoIterator<Item = EntityId>,
        options: FollowOptions,
    ) -> ConvoyResult<usize> {
        let Some(convoy) = self.convoy(user) else {
            return Ok(0);
        };
        let request = FollowRequest::new(self.scene, leader, followers).with_options(options);
        convoy.start_follow(request, true).await
    }

    /// Deliver broadcasts and store changes until nothing is pending.
    ///
    /// Returns the number of deliveries made.
    pub async fn settle(&mut self) -> ConvoyResult<usize> {
        let mut delivered = 0;

        for _ in 0..MAX_ROUNDS {
            let mut messages: Vec<(usize, String)> = Vec::new();
            for (index, peer) in self.peers.iter_mut().enumerate() {
                messages.extend(peer.inbox.drain().into_iter().map(|text| (index, text)));
            }
            let changes = self.store.drain_changes();

            if messages.is_empty() && changes.is_empty() {
                return Ok(delivered);
            }

            let mut order: Vec<usize> = (0..self.peers.len()).collect();
            if let Some(rng) = self.rng.as_mut() {
                messages.shuffle(rng);
                order.shuffle(rng);
            }

            for (index, text) in messages {
                self.peers[index].convoy.receive_text(&text).await?;
                delivered += 1;
            }
            for change in &changes {
                for index in &order {
                    self.peers[*index].convoy.on_entity_updated(change).await?;
                }
                delivered += 1;
            }
        }

        warn!(rounds = MAX_ROUNDS, "table did not settle");
        Ok(delivered)
    }

    /// Leader/follower pairs whose records disagree
    pub fn reciprocity_violations(&self) -> Vec<(EntityId, EntityId)> {
        let entities = self.store.entities(self.scene);
        let mut violations = Vec::new();

        for leader in &entities {
            for follower in leader.followers() {
                let tracked = entities
                    .iter()
                    .find(|e| e.id == *follower)
                    .and_then(|e| e.follower_state())
                    .is_some_and(|s| s.relation(leader.id).is_some());
                if !tracked {
                    violations.push((leader.id, *follower));
                }
            }
        }

        for follower in &entities {
            let Some(state) = follower.follower_state() else {
                continue;
            };
            for leader in state.leaders.keys() {
                let listed = entities
                    .iter()
                    .find(|e| e.id == *leader)
                    .is_some_and(|e| e.followers().contains(&follower.id));
                if !listed {
                    violations.push((*leader, follower.id));
                }
            }
        }

        violations
    }
}
