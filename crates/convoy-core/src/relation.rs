//! Follow records
//!
//! A follower stores one [`Relation`] per leader it tracks; a leader stores
//! the ordered list of its followers. Both live inside [`FollowFlags`], the
//! versioned record attached to every entity.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{normalize_angle, ConvoyError, ConvoyResult, EntityId, UserId};

/// How a follower's offset is interpreted
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum OrientationSpec {
    /// Fixed offset relative to the leader's heading; `(x, y)` is the
    /// leader's facing direction at join time
    Vector { x: f64, y: f64 },
    /// Offset proportional to the leader's displacement
    Rel { x: f64, y: f64 },
    /// Use the leader's current facing at join time
    Detect,
}

impl OrientationSpec {
    pub const LEFT: OrientationSpec = OrientationSpec::Vector { x: -1.0, y: 0.0 };
    pub const UP: OrientationSpec = OrientationSpec::Vector { x: 0.0, y: -1.0 };
    pub const DOWN: OrientationSpec = OrientationSpec::Vector { x: 0.0, y: 1.0 };
    pub const RIGHT: OrientationSpec = OrientationSpec::Vector { x: 1.0, y: 0.0 };
    /// Moves in lockstep with the leader
    pub const MIRROR: OrientationSpec = OrientationSpec::Rel { x: 1.0, y: 1.0 };
    /// Moves against the leader
    pub const SHADOW: OrientationSpec = OrientationSpec::Rel { x: -1.0, y: -1.0 };
    pub const DETECT: OrientationSpec = OrientationSpec::Detect;

    /// Vector orientation facing `angle`
    pub fn from_facing(angle: f64) -> Self {
        OrientationSpec::Vector {
            x: angle.cos(),
            y: angle.sin(),
        }
    }

    /// Replace `Detect` with the leader's current facing
    pub fn resolve(self, leader_facing: f64) -> Self {
        match self {
            OrientationSpec::Detect => OrientationSpec::from_facing(leader_facing),
            other => other,
        }
    }

    /// Angle of the orientation vector (zero for unresolved `Detect`)
    pub fn facing_angle(&self) -> f64 {
        match *self {
            OrientationSpec::Vector { x, y } | OrientationSpec::Rel { x, y } => y.atan2(x),
            OrientationSpec::Detect => 0.0,
        }
    }

    pub fn is_relative(&self) -> bool {
        matches!(self, OrientationSpec::Rel { .. })
    }

    /// Formation for heading-relative offsets, follow for everything else
    pub fn mode(&self) -> FollowMode {
        match self {
            OrientationSpec::Vector { .. } => FollowMode::Formation,
            OrientationSpec::Rel { .. } | OrientationSpec::Detect => FollowMode::Follow,
        }
    }
}

/// Kind of group a join creates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FollowMode {
    Formation,
    Follow,
}

/// Elevation coupling policy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElevationLock {
    /// Never change elevation
    Static,
    /// Keep a fixed gap above/below the leader
    Offset,
    /// Mirror the gap depending on whether the leader rose or fell
    #[default]
    Tether,
}

/// Per-relation locks
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locks {
    pub elevation: ElevationLock,
    /// Keep following even after moving independently
    pub follow: bool,
}

/// Stored offset of a follower from one leader
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    /// Bearing to the follower relative to the leader's facing
    pub angle: f64,
    /// Centre-to-centre distance
    pub distance: f64,
    /// Follower elevation minus leader elevation
    pub dz: f64,
    pub orientation: OrientationSpec,
}

/// Follower-side record for one leader
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub delta: Delta,
    pub locks: Locks,
    #[serde(default)]
    pub snap: bool,
}

/// Leader-side record
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderState {
    /// Followers in join order, no duplicates
    pub followers: Vec<EntityId>,
}

impl LeaderState {
    pub fn contains(&self, follower: EntityId) -> bool {
        self.followers.contains(&follower)
    }

    /// Append a follower; false if it was already listed
    pub fn insert(&mut self, follower: EntityId) -> bool {
        if self.contains(follower) {
            return false;
        }
        self.followers.push(follower);
        true
    }

    pub fn remove(&mut self, follower: EntityId) -> bool {
        let before = self.followers.len();
        self.followers.retain(|id| *id != follower);
        self.followers.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.followers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.followers.len()
    }
}

/// Follower-side record
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FollowerState {
    pub leaders: BTreeMap<EntityId, Relation>,
    pub paused: bool,
    /// User who created the most recent relation
    pub last_user: Option<UserId>,
}

impl FollowerState {
    pub fn relation(&self, leader: EntityId) -> Option<&Relation> {
        self.leaders.get(&leader)
    }

    pub fn insert(&mut self, leader: EntityId, relation: Relation) {
        self.leaders.insert(leader, relation);
    }

    pub fn remove(&mut self, leader: EntityId) -> Option<Relation> {
        self.leaders.remove(&leader)
    }

    pub fn is_empty(&self) -> bool {
        self.leaders.is_empty()
    }

    /// True when every relation keeps following through independent moves
    pub fn always_follows(&self) -> bool {
        !self.leaders.is_empty() && self.leaders.values().all(|r| r.locks.follow)
    }
}

/// Current follow record schema version
pub const SCHEMA_VERSION: u64 = 1;

/// Follow metadata attached to an entity
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FollowFlags {
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leader: Option<LeaderState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follower: Option<FollowerState>,
}

impl Default for FollowFlags {
    fn default() -> Self {
        FollowFlags {
            version: SCHEMA_VERSION,
            leader: None,
            follower: None,
        }
    }
}

impl FollowFlags {
    pub fn is_empty(&self) -> bool {
        self.leader.is_none() && self.follower.is_none()
    }

    /// Load a stored record of any known version
    pub fn from_value(value: Value) -> ConvoyResult<Self> {
        match value.get("version").and_then(Value::as_u64) {
            None | Some(0) => {
                let legacy: FlagsV0 = serde_json::from_value(value)?;
                Ok(legacy.migrate())
            }
            Some(SCHEMA_VERSION) => Ok(serde_json::from_value(value)?),
            Some(other) => Err(ConvoyError::UnsupportedSchema(other)),
        }
    }

    /// Field deserializer for records embedded in other documents
    pub fn deserialize_any_version<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(de::Error::custom)
    }
}

/// Version 0: flat keys, headings measured on the reversed follow vector
#[derive(Deserialize)]
struct FlagsV0 {
    #[serde(default)]
    followers: Vec<EntityId>,
    #[serde(default)]
    leaders: BTreeMap<EntityId, Relation>,
    paused: Option<bool>,
    user: Option<UserId>,
}

impl FlagsV0 {
    fn migrate(self) -> FollowFlags {
        let leader = if self.followers.is_empty() {
            None
        } else {
            let mut state = LeaderState::default();
            for id in self.followers {
                state.insert(id);
            }
            Some(state)
        };

        let follower = if self.leaders.is_empty() && self.paused.is_none() {
            None
        } else {
            Some(FollowerState {
                leaders: self
                    .leaders
                    .into_iter()
                    .map(|(id, relation)| (id, migrate_relation_v0(relation)))
                    .collect(),
                paused: self.paused.unwrap_or(false),
                last_user: self.user,
            })
        };

        FollowFlags {
            version: SCHEMA_VERSION,
            leader,
            follower,
        }
    }
}

fn migrate_relation_v0(mut relation: Relation) -> Relation {
    relation.delta.orientation = match relation.delta.orientation {
        OrientationSpec::Vector { x, y } => OrientationSpec::Vector { x: -x, y },
        OrientationSpec::Rel { x, y } => OrientationSpec::Rel { x: -x, y: -y },
        OrientationSpec::Detect => OrientationSpec::Detect,
    };
    relation.delta.angle = normalize_angle(relation.delta.angle - PI);
    relation
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn relation(follow: bool) -> Relation {
        Relation {
            delta: Delta {
                angle: 0.5,
                distance: 100.0,
                dz: 0.0,
                orientation: OrientationSpec::DOWN,
            },
            locks: Locks {
                elevation: ElevationLock::Offset,
                follow,
            },
            snap: false,
        }
    }

    #[test]
    fn test_leader_state_insert_is_idempotent() {
        let mut state = LeaderState::default();
        assert!(state.insert(EntityId::new(1)));
        assert!(!state.insert(EntityId::new(1)));
        assert!(state.insert(EntityId::new(2)));
        assert_eq!(state.followers, vec![EntityId::new(1), EntityId::new(2)]);

        assert!(state.remove(EntityId::new(1)));
        assert!(!state.remove(EntityId::new(1)));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_always_follows() {
        let mut state = FollowerState::default();
        assert!(!state.always_follows());

        state.insert(EntityId::new(1), relation(true));
        assert!(state.always_follows());

        state.insert(EntityId::new(2), relation(false));
        assert!(!state.always_follows());
    }

    #[test]
    fn test_orientation_wire_shape() {
        let value = serde_json::to_value(OrientationSpec::MIRROR).unwrap();
        assert_eq!(value, json!({"mode": "rel", "x": 1.0, "y": 1.0}));

        let detect: OrientationSpec = serde_json::from_value(json!({"mode": "detect"})).unwrap();
        assert_eq!(detect, OrientationSpec::Detect);
    }

    #[test]
    fn test_detect_resolves_to_leader_facing() {
        let resolved = OrientationSpec::DETECT.resolve(std::f64::consts::FRAC_PI_2);
        match resolved {
            OrientationSpec::Vector { x, y } => {
                assert_relative_eq!(x, 0.0, epsilon = 1e-12);
                assert_relative_eq!(y, 1.0, epsilon = 1e-12);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(OrientationSpec::SHADOW.resolve(1.0), OrientationSpec::SHADOW);
    }

    #[test]
    fn test_current_schema_roundtrip() {
        let mut follower = FollowerState::default();
        follower.insert(EntityId::new(3), relation(false));
        let flags = FollowFlags {
            follower: Some(follower),
            ..FollowFlags::default()
        };

        let value = serde_json::to_value(&flags).unwrap();
        assert_eq!(FollowFlags::from_value(value).unwrap(), flags);
    }

    #[test]
    fn test_migrate_flat_v0_record() {
        let legacy = json!({
            "followers": [7, 7, 9],
            "leaders": {
                "5": {
                    "delta": {
                        "angle": 0.0,
                        "distance": 50.0,
                        "dz": 10.0,
                        "orientation": {"x": 1.0, "y": 0.0, "mode": "vector"}
                    },
                    "locks": {"elevation": "tether", "follow": false},
                    "snap": true
                }
            },
            "paused": true,
            "user": 42
        });

        let flags = FollowFlags::from_value(legacy).unwrap();
        assert_eq!(flags.version, SCHEMA_VERSION);
        assert_eq!(
            flags.leader.unwrap().followers,
            vec![EntityId::new(7), EntityId::new(9)]
        );

        let follower = flags.follower.unwrap();
        assert!(follower.paused);
        assert_eq!(follower.last_user, Some(UserId::new(42)));

        let migrated = follower.relation(EntityId::new(5)).unwrap();
        assert_eq!(migrated.delta.orientation, OrientationSpec::Vector { x: -1.0, y: 0.0 });
        assert_relative_eq!(migrated.delta.angle, PI, epsilon = 1e-12);
        assert!(migrated.snap);
    }

    #[test]
    fn test_unknown_schema_is_rejected() {
        let err = FollowFlags::from_value(json!({"version": 9})).unwrap_err();
        assert!(matches!(err, ConvoyError::UnsupportedSchema(9)));
    }
}
