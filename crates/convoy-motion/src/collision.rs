//! Collision Detector - wall checks for planned follower moves
//!
//! The detector only asks the injected [`CollisionQuery`] when a policy is
//! active and the evaluating client is looking at the leader's scene.
//! [`SegmentWalls`] is an in-memory query over straight wall segments.

use std::sync::Arc;

use convoy_core::{BoxFuture, CollisionQuery, Point, SceneId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// What happens to a follower whose path crosses a wall
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Walls are ignored
    #[default]
    Off,
    /// The follower stays put and pauses
    Stop,
    /// The follower is relocated next to the leader
    Teleport,
}

impl CollisionPolicy {
    pub fn is_active(self) -> bool {
        self != CollisionPolicy::Off
    }
}

/// Policy-aware wrapper around a [`CollisionQuery`]
#[derive(Clone)]
pub struct CollisionDetector {
    query: Arc<dyn CollisionQuery>,
    policy: CollisionPolicy,
}

impl CollisionDetector {
    pub fn new(query: Arc<dyn CollisionQuery>, policy: CollisionPolicy) -> Self {
        Self { query, policy }
    }

    pub fn policy(&self) -> CollisionPolicy {
        self.policy
    }

    /// Should moves in `scene` be checked at all?
    pub fn applies(&self, scene: SceneId) -> bool {
        self.policy.is_active() && self.query.viewed_scene() == Some(scene)
    }

    /// Raw wall test between two centres
    pub async fn test_blocked(&self, origin: Point, destination: Point) -> bool {
        self.query.test_collision(origin, destination).await
    }

    /// Is a follower moving from `origin` to `destination` in `scene` blocked?
    ///
    /// Trivial moves and scenes this client is not viewing never collide.
    pub async fn check(&self, scene: SceneId, origin: Point, destination: Point) -> bool {
        if origin == destination || !self.applies(scene) {
            return false;
        }
        let blocked = self.test_blocked(origin, destination).await;
        trace!(scene = %scene, blocked, "collision test");
        blocked
    }
}

impl std::fmt::Debug for CollisionDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollisionDetector")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// A straight wall segment
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    pub start: Point,
    pub end: Point,
}

impl Wall {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    /// Does the segment `p`–`q` touch this wall?
    pub fn crosses(&self, p: Point, q: Point) -> bool {
        segments_intersect(p, q, self.start, self.end)
    }
}

fn cross(o: Point, a: Point, b: Point) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

fn on_segment(p: Point, q: Point, r: Point) -> bool {
    r.x >= p.x.min(q.x) && r.x <= p.x.max(q.x) && r.y >= p.y.min(q.y) && r.y <= p.y.max(q.y)
}

fn segments_intersect(p1: Point, p2: Point, q1: Point, q2: Point) -> bool {
    let d1 = cross(q1, q2, p1);
    let d2 = cross(q1, q2, p2);
    let d3 = cross(p1, p2, q1);
    let d4 = cross(p1, p2, q2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(q1, q2, p1))
        || (d2 == 0.0 && on_segment(q1, q2, p2))
        || (d3 == 0.0 && on_segment(p1, p2, q1))
        || (d4 == 0.0 && on_segment(p1, p2, q2))
}

#[derive(Debug, Default)]
struct WallsInner {
    viewed: Option<SceneId>,
    walls: Vec<(SceneId, Wall)>,
}

/// In-memory wall geometry for every scene
#[derive(Debug, Default)]
pub struct SegmentWalls {
    inner: RwLock<WallsInner>,
}

impl SegmentWalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walls for one scene, with that scene viewed
    pub fn viewing(scene: SceneId, walls: impl IntoIterator<Item = Wall>) -> Self {
        let this = Self::new();
        this.view(Some(scene));
        for wall in walls {
            this.add_wall(scene, wall);
        }
        this
    }

    pub fn view(&self, scene: Option<SceneId>) {
        self.inner.write().viewed = scene;
    }

    pub fn add_wall(&self, scene: SceneId, wall: Wall) {
        self.inner.write().walls.push((scene, wall));
    }

    pub fn clear(&self, scene: SceneId) {
        self.inner.write().walls.retain(|(s, _)| *s != scene);
    }

    /// Walls of the viewed scene crossed by `origin`–`destination`
    pub fn blocking(&self, origin: Point, destination: Point) -> usize {
        let inner = self.inner.read();
        let Some(viewed) = inner.viewed else {
            return 0;
        };
        inner
            .walls
            .iter()
            .filter(|(scene, wall)| *scene == viewed && wall.crosses(origin, destination))
            .count()
    }
}

impl CollisionQuery for SegmentWalls {
    fn viewed_scene(&self) -> Option<SceneId> {
        self.inner.read().viewed
    }

    fn test_collision(&self, origin: Point, destination: Point) -> BoxFuture<'_, bool> {
        let blocked = self.blocking(origin, destination) > 0;
        Box::pin(async move { blocked })
    }
}
