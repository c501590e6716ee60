//! Follower position engine
//!
//! Given one leader displacement and a stored [`Relation`], compute where
//! the follower should end up. Two planar modes exist:
//!
//! - **vector**: the follower keeps a fixed bearing and distance from the
//!   leader, measured from the leader's heading
//! - **rel**: the follower repeats the leader's displacement scaled per axis
//!   by the orientation vector, and swings around the leader when it turns
//!
//! Elevation follows the relation's [`ElevationLock`] whenever the leader
//! changed elevation.

use convoy_core::{ElevationLock, FollowVector, OrientationSpec, Point, Relation, Size};

/// Planar displacements shorter than this count as "leader did not move"
pub const STATIONARY_EPSILON: f64 = 1e-10;

/// Planned follower coordinates; `None` means "leave this axis alone"
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PlannedPosition {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub elevation: Option<f64>,
}

impl PlannedPosition {
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.elevation.is_none()
    }

    /// Fill unset planar axes from the follower's current top-left
    pub fn resolve(&self, current: Point) -> Placement {
        Placement {
            point: Point::new(self.x.unwrap_or(current.x), self.y.unwrap_or(current.y)),
            elevation: self.elevation,
        }
    }
}

/// A fully resolved planar target plus optional elevation change
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// Top-left corner
    pub point: Point,
    pub elevation: Option<f64>,
}

/// Position engine with a configurable stationary threshold
#[derive(Clone, Copy, Debug)]
pub struct MotionEngine {
    stationary_epsilon: f64,
}

impl Default for MotionEngine {
    fn default() -> Self {
        Self::new(STATIONARY_EPSILON)
    }
}

impl MotionEngine {
    pub fn new(stationary_epsilon: f64) -> Self {
        MotionEngine { stationary_epsilon }
    }

    /// Compute the follower's new position.
    ///
    /// `size` is the follower's pixel footprint and `current` its
    /// source-of-truth top-left corner.
    pub fn plan(
        &self,
        vector: &FollowVector,
        relation: &Relation,
        size: Size,
        current: Point,
    ) -> PlannedPosition {
        let mut planned = match relation.delta.orientation {
            OrientationSpec::Rel { x, y } => Self::plan_rel(vector, x, y, size, current),
            OrientationSpec::Vector { .. } | OrientationSpec::Detect => {
                self.plan_vector(vector, relation, size)
            }
        };

        planned.elevation = Self::plan_elevation(vector, relation);
        planned
    }

    fn plan_vector(&self, vector: &FollowVector, relation: &Relation, size: Size) -> PlannedPosition {
        if !vector.is_planar_change() {
            return PlannedPosition::default();
        }

        // A pure turn keeps the formation pinned to the leader's facing
        let heading = if vector.distance < self.stationary_epsilon {
            vector.b.t
        } else {
            vector.angle
        };

        let anchor = vector
            .b
            .point()
            .project(heading + relation.delta.angle, relation.delta.distance);
        let half = size.half();

        PlannedPosition {
            x: Some(anchor.x - half.x),
            y: Some(anchor.y - half.y),
            elevation: None,
        }
    }

    fn plan_rel(vector: &FollowVector, ox: f64, oy: f64, size: Size, current: Point) -> PlannedPosition {
        let mut point = Point::new(current.x + ox * vector.dx, current.y + oy * vector.dy);

        if vector.dt != 0.0 {
            let half = size.half();
            let center = point
                .offset(half.x, half.y)
                .rotate_about(vector.b.point(), vector.dt);
            point = center.offset(-half.x, -half.y);
        }

        PlannedPosition {
            x: Some(point.x),
            y: Some(point.y),
            elevation: None,
        }
    }

    fn plan_elevation(vector: &FollowVector, relation: &Relation) -> Option<f64> {
        if vector.dz == 0.0 {
            return None;
        }

        let gap = relation.delta.dz;
        match relation.locks.elevation {
            ElevationLock::Static => None,
            ElevationLock::Offset => Some(vector.b.z + gap),
            ElevationLock::Tether => {
                if vector.dz > 0.0 {
                    Some(vector.b.z + gap)
                } else {
                    Some(vector.b.z - gap)
                }
            }
        }
    }
}

/// [`MotionEngine::plan`] with the default stationary threshold
pub fn compute_follower_position(
    vector: &FollowVector,
    relation: &Relation,
    size: Size,
    current: Point,
) -> PlannedPosition {
    MotionEngine::default().plan(vector, relation, size, current)
}
