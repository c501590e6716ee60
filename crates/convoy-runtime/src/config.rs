//! Runtime configuration

use convoy_authority::OwnershipPolicy;
use convoy_motion::{CollisionPolicy, STATIONARY_EPSILON};
use serde::{Deserialize, Serialize};

/// Logging setup
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_owned(),
            json: false,
        }
    }
}

/// Follow behaviour for one client
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowConfig {
    /// What to do when a follower's path crosses a wall
    pub collision: CollisionPolicy,
    /// Suppress wall-collision notices for this user
    pub silent_collisions: bool,
    /// Spacing between followers teleported by the same leader move
    pub teleport_step: f64,
    /// Leader displacements shorter than this are pure turns
    pub stationary_epsilon: f64,
    pub ownership: OwnershipPolicy,
    pub log: LogConfig,
}

impl Default for FollowConfig {
    fn default() -> Self {
        FollowConfig {
            collision: CollisionPolicy::Off,
            silent_collisions: false,
            teleport_step: 10.0,
            stationary_epsilon: STATIONARY_EPSILON,
            ownership: OwnershipPolicy::default(),
            log: LogConfig::default(),
        }
    }
}

impl FollowConfig {
    /// Followers halt and pause at walls
    pub fn stop_at_walls() -> Self {
        FollowConfig {
            collision: CollisionPolicy::Stop,
            ..FollowConfig::default()
        }
    }

    /// Followers blocked by walls are gathered next to the leader
    pub fn teleport_through_walls() -> Self {
        FollowConfig {
            collision: CollisionPolicy::Teleport,
            ..FollowConfig::default()
        }
    }
}
