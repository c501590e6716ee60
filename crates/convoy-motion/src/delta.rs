//! Join-time offset capture

use convoy_core::{normalize_angle, Delta, OrientationSpec, Point};

/// Record where a follower sits relative to a leader.
///
/// The bearing is measured from the orientation's facing, so a vector-mode
/// follower keeps its side of the leader as the leader changes heading.
/// `orientation` must already be resolved (no `Detect`).
pub fn compute_delta(
    leader_center: Point,
    leader_z: f64,
    follower_center: Point,
    follower_z: f64,
    orientation: OrientationSpec,
) -> Delta {
    let bearing = leader_center.angle_to(follower_center);

    Delta {
        angle: normalize_angle(bearing - orientation.facing_angle()),
        distance: leader_center.distance_to(follower_center),
        dz: follower_z - leader_z,
        orientation,
    }
}
