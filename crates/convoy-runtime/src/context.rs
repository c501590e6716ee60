//! Per-client follow context

use std::sync::{Arc, Weak};

use convoy_authority::OwnershipResolver;
use convoy_bus::EventBus;
use convoy_core::{
    CollisionQuery, ConvoyResult, DocumentStore, Entity, EventKind, Message, Notifier,
    SessionRegistry, Transport, UpdateOptions, UserId,
};
use convoy_motion::{CollisionDetector, MotionEngine};
use convoy_store::RelationStore;
use tracing::debug;

use crate::FollowConfig;

/// Host services a [`Convoy`] runs against
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn DocumentStore>,
    pub sessions: Arc<dyn SessionRegistry>,
    pub walls: Arc<dyn CollisionQuery>,
    pub transport: Arc<dyn Transport>,
    pub notifier: Arc<dyn Notifier>,
}

/// Follow runtime for one connected user
pub struct Convoy {
    pub(crate) user: UserId,
    pub(crate) config: FollowConfig,
    pub(crate) relations: RelationStore,
    pub(crate) authority: OwnershipResolver,
    pub(crate) engine: MotionEngine,
    pub(crate) collisions: CollisionDetector,
    pub(crate) bus: EventBus,
    pub(crate) notifier: Arc<dyn Notifier>,
}

impl Convoy {
    /// Build the context and subscribe its handlers
    pub fn new(user: UserId, config: FollowConfig, collaborators: Collaborators) -> Arc<Self> {
        let Collaborators {
            store,
            sessions,
            walls,
            transport,
            notifier,
        } = collaborators;

        let convoy = Arc::new(Convoy {
            user,
            relations: RelationStore::new(store),
            authority: OwnershipResolver::new(sessions, user, config.ownership),
            engine: MotionEngine::new(config.stationary_epsilon),
            collisions: CollisionDetector::new(walls, config.collision),
            bus: EventBus::new(transport),
            notifier,
            config,
        });
        convoy.install(Arc::downgrade(&convoy));
        convoy
    }

    fn install(&self, weak: Weak<Convoy>) {
        for kind in EventKind::ALL {
            let weak = weak.clone();
            self.bus.on(kind, move |message| {
                let weak = weak.clone();
                async move {
                    match weak.upgrade() {
                        Some(convoy) => convoy.handle(message).await,
                        None => Ok(()),
                    }
                }
            });
        }
    }

    /// Route one message to its handler
    async fn handle(&self, message: Message) -> ConvoyResult<()> {
        match message {
            Message::LeaderMove(moved) => self.process_leader_move(moved).await.map(|_| ()),
            Message::AddFollower(join) => self.on_add_follower(join).await,
            Message::AddLeader(join) => self.on_add_leader(join).await,
            Message::RemoveFollower(link) => self.on_remove_follower(link).await,
            Message::RemoveLeader(link) => self.on_remove_leader(link).await,
            Message::NotifyCollision(notice) => {
                self.on_collision_notice(&notice);
                Ok(())
            }
        }
    }

    /// Publish and log, ignoring local subscriber failures
    pub(crate) async fn emit(&self, message: Message) -> ConvoyResult<()> {
        let report = self.bus.publish(message).await?;
        if !report.is_clean() {
            debug!(event = %report.kind, failures = report.failures.len(), "local handlers failed");
        }
        Ok(())
    }

    /// Is this client the one that writes `entity`?
    pub(crate) fn owns(&self, entity: Option<&Entity>) -> bool {
        self.authority.is_authoritative(entity)
    }

    pub(crate) fn write_options(&self, event: EventKind) -> UpdateOptions {
        UpdateOptions::by(self.user).caused_by(event)
    }

    pub fn user(&self) -> UserId {
        self.user
    }

    pub fn config(&self) -> &FollowConfig {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn relations(&self) -> &RelationStore {
        &self.relations
    }

    pub fn authority(&self) -> &OwnershipResolver {
        &self.authority
    }
}

impl std::fmt::Debug for Convoy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Convoy")
            .field("user", &self.user)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
