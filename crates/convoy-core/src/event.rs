//! Wire messages
//!
//! Every message travels as an [`Envelope`]: the event kind plus an ordered
//! argument list of JSON values. [`Message`] is the typed view; converting
//! between the two is the only place wire payloads are trusted to have a
//! shape.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    ConvoyError, ConvoyResult, EntityId, FollowVector, Locks, OrientationSpec, SceneId, UserId,
};

/// Event kind on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    LeaderMove,
    AddFollower,
    AddLeader,
    RemoveFollower,
    RemoveLeader,
    NotifyCollision,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::LeaderMove,
        EventKind::AddFollower,
        EventKind::AddLeader,
        EventKind::RemoveFollower,
        EventKind::RemoveLeader,
        EventKind::NotifyCollision,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EventKind::LeaderMove => "leaderMove",
            EventKind::AddFollower => "addFollower",
            EventKind::AddLeader => "addLeader",
            EventKind::RemoveFollower => "removeFollower",
            EventKind::RemoveLeader => "removeLeader",
            EventKind::NotifyCollision => "notifyCollision",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Serialized form broadcast to peers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: EventKind,
    pub data: Vec<Value>,
}

impl Envelope {
    pub fn encode(&self) -> ConvoyResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(text: &str) -> ConvoyResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// The leader half of a leader-move event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderRef {
    pub entity_id: EntityId,
    pub scene_id: SceneId,
    pub follow_vector: FollowVector,
}

/// A leader moved; listed followers should reposition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderMove {
    pub leader: LeaderRef,
    pub followers: Vec<EntityId>,
}

/// One half of a join pair
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Join {
    pub leader_id: EntityId,
    pub follower_id: EntityId,
    pub scene_id: SceneId,
    pub orientation: OrientationSpec,
    pub locks: Locks,
    pub snap: bool,
    pub initiator: UserId,
}

impl Join {
    pub fn link(&self) -> Link {
        Link {
            leader_id: self.leader_id,
            follower_id: self.follower_id,
            scene_id: self.scene_id,
        }
    }
}

/// A leader/follower pair being taken apart
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub leader_id: EntityId,
    pub follower_id: EntityId,
    pub scene_id: SceneId,
}

/// A follower was halted by a wall
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollisionNotice {
    pub entity_id: EntityId,
    pub entity_name: String,
    /// User who set up the follow
    pub user: Option<UserId>,
}

/// Typed message
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    LeaderMove(LeaderMove),
    AddFollower(Join),
    AddLeader(Join),
    RemoveFollower(Link),
    RemoveLeader(Link),
    NotifyCollision(CollisionNotice),
}

impl Message {
    pub fn kind(&self) -> EventKind {
        match self {
            Message::LeaderMove(_) => EventKind::LeaderMove,
            Message::AddFollower(_) => EventKind::AddFollower,
            Message::AddLeader(_) => EventKind::AddLeader,
            Message::RemoveFollower(_) => EventKind::RemoveFollower,
            Message::RemoveLeader(_) => EventKind::RemoveLeader,
            Message::NotifyCollision(_) => EventKind::NotifyCollision,
        }
    }

    pub fn to_envelope(&self) -> ConvoyResult<Envelope> {
        let payload = match self {
            Message::LeaderMove(m) => serde_json::to_value(m)?,
            Message::AddFollower(j) | Message::AddLeader(j) => serde_json::to_value(j)?,
            Message::RemoveFollower(l) | Message::RemoveLeader(l) => serde_json::to_value(l)?,
            Message::NotifyCollision(n) => serde_json::to_value(n)?,
        };
        Ok(Envelope {
            event: self.kind(),
            data: vec![payload],
        })
    }

    /// Rebuild the typed message from a received envelope
    pub fn from_envelope(envelope: Envelope) -> ConvoyResult<Self> {
        let kind = envelope.event;
        let payload = envelope
            .data
            .into_iter()
            .next()
            .ok_or(ConvoyError::EmptyPayload(kind))?;

        let message = match kind {
            EventKind::LeaderMove => Message::LeaderMove(serde_json::from_value(payload)?),
            EventKind::AddFollower => Message::AddFollower(serde_json::from_value(payload)?),
            EventKind::AddLeader => Message::AddLeader(serde_json::from_value(payload)?),
            EventKind::RemoveFollower => Message::RemoveFollower(serde_json::from_value(payload)?),
            EventKind::RemoveLeader => Message::RemoveLeader(serde_json::from_value(payload)?),
            EventKind::NotifyCollision => {
                Message::NotifyCollision(serde_json::from_value(payload)?)
            }
        };
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Location;
    use serde_json::json;

    #[test]
    fn test_event_kind_names_match_serde() {
        for kind in EventKind::ALL {
            let value = serde_json::to_value(kind).unwrap();
            assert_eq!(value, Value::String(kind.name().to_owned()));
        }
    }

    #[test]
    fn test_envelope_shape() {
        let message = Message::RemoveFollower(Link {
            leader_id: EntityId::new(1),
            follower_id: EntityId::new(2),
            scene_id: SceneId::new(3),
        });
        let envelope = message.to_envelope().unwrap();
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(
            value,
            json!({
                "event": "removeFollower",
                "data": [{"leaderId": 1, "followerId": 2, "sceneId": 3}]
            })
        );
    }

    #[test]
    fn test_leader_move_survives_the_wire() {
        let message = Message::LeaderMove(LeaderMove {
            leader: LeaderRef {
                entity_id: EntityId::new(10),
                scene_id: SceneId::new(1),
                follow_vector: FollowVector::new(
                    Location::new(0.0, 0.0, 0.0, 0.0),
                    Location::new(100.0, 0.0, 5.0, 0.0),
                ),
            },
            followers: vec![EntityId::new(11), EntityId::new(12)],
        });

        let text = message.to_envelope().unwrap().encode().unwrap();
        let back = Message::from_envelope(Envelope::decode(&text).unwrap()).unwrap();

        let Message::LeaderMove(moved) = &back else {
            panic!("wrong kind: {:?}", back.kind());
        };
        assert_eq!(moved.leader.follow_vector.dx, 100.0);
        assert_eq!(moved.leader.follow_vector.dz, 5.0);
        assert_eq!(back, message);
    }

    #[test]
    fn test_empty_payload_is_rejected() {
        let envelope = Envelope {
            event: EventKind::AddLeader,
            data: vec![],
        };
        let err = Message::from_envelope(envelope).unwrap_err();
        assert!(matches!(err, ConvoyError::EmptyPayload(EventKind::AddLeader)));
    }
}
