//! In-memory session registry

use convoy_core::{Session, SessionRegistry, UserId};
use parking_lot::RwLock;

/// Session list held in memory, shared by every peer of a table
#[derive(Debug, Default)]
pub struct StaticSessions {
    sessions: RwLock<Vec<Session>>,
}

impl StaticSessions {
    pub fn new(sessions: impl IntoIterator<Item = Session>) -> Self {
        Self {
            sessions: RwLock::new(sessions.into_iter().collect()),
        }
    }

    /// Add or replace a session
    pub fn connect(&self, session: Session) {
        let mut sessions = self.sessions.write();
        sessions.retain(|s| s.user != session.user);
        sessions.push(session);
    }

    pub fn disconnect(&self, user: UserId) {
        self.sessions.write().retain(|s| s.user != user);
    }

    pub fn set_active(&self, user: UserId, active: bool) {
        for session in self.sessions.write().iter_mut().filter(|s| s.user == user) {
            session.active = active;
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl SessionRegistry for StaticSessions {
    fn active_sessions(&self) -> Vec<Session> {
        self.sessions.read().iter().filter(|s| s.active).copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_replaces_existing() {
        let sessions = StaticSessions::default();
        sessions.connect(Session::player(UserId::new(1), 0));
        sessions.connect(Session::gm(UserId::new(1), 5));

        assert_eq!(sessions.len(), 1);
        assert!(sessions.active_sessions()[0].privileged);

        sessions.disconnect(UserId::new(1));
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_inactive_are_filtered() {
        let sessions = StaticSessions::new([Session::player(UserId::new(1), 0), Session::player(UserId::new(2), 1)]);
        sessions.set_active(UserId::new(2), false);

        let active = sessions.active_sessions();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].user, UserId::new(1));
    }
}
