//! Ownership Resolver

use std::sync::Arc;

use convoy_core::{Entity, PermissionLevel, Session, SessionRegistry, UserId};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Ownership rule parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipPolicy {
    /// Lowest permission that makes a non-privileged session eligible
    pub min_level: PermissionLevel,
}

impl Default for OwnershipPolicy {
    fn default() -> Self {
        Self {
            min_level: PermissionLevel::Owner,
        }
    }
}

/// Resolves the single authoritative session for an entity
#[derive(Clone)]
pub struct OwnershipResolver {
    registry: Arc<dyn SessionRegistry>,
    local: UserId,
    policy: OwnershipPolicy,
}

impl OwnershipResolver {
    pub fn new(registry: Arc<dyn SessionRegistry>, local: UserId, policy: OwnershipPolicy) -> Self {
        Self {
            registry,
            local,
            policy,
        }
    }

    /// The user this resolver answers for
    pub fn local_user(&self) -> UserId {
        self.local
    }

    pub fn policy(&self) -> OwnershipPolicy {
        self.policy
    }

    /// Active sessions in resolution order
    fn ordered_sessions(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .registry
            .active_sessions()
            .into_iter()
            .filter(|s| s.active)
            .collect();
        sessions.sort_by_key(|s| (s.connected_at, s.user));
        sessions
    }

    /// The authoritative user for `entity`, if any
    pub fn authority(&self, entity: Option<&Entity>) -> Option<UserId> {
        let entity = entity?;
        let sessions = self.ordered_sessions();

        if let Some(gm) = sessions.iter().find(|s| s.privileged) {
            return Some(gm.user);
        }

        let mut best: Option<(PermissionLevel, UserId)> = None;
        for session in &sessions {
            let level = self.registry.permission(entity, session.user);
            if level < self.policy.min_level {
                continue;
            }
            // Strictly greater keeps the earliest session on ties
            if best.map_or(true, |(top, _)| level > top) {
                best = Some((level, session.user));
            }
        }
        best.map(|(_, user)| user)
    }

    /// Is the local session authoritative for `entity`?
    pub fn is_authoritative(&self, entity: Option<&Entity>) -> bool {
        let owner = self.authority(entity);
        let mine = owner == Some(self.local);
        if !mine {
            trace!(
                entity = ?entity.map(|e| e.id),
                owner = ?owner,
                local = %self.local,
                "not authoritative"
            );
        }
        mine
    }
}

impl std::fmt::Debug for OwnershipResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnershipResolver")
            .field("local", &self.local)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
