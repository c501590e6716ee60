//! Planar geometry primitives
//!
//! Screen-space convention: x grows right, y grows down, angles are
//! radians measured from +x towards +y.

use serde::{Deserialize, Serialize};

/// A point on the scene plane
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    /// Point reached by travelling `distance` along `angle`
    #[inline]
    pub fn project(self, angle: f64, distance: f64) -> Point {
        Point {
            x: self.x + distance * angle.cos(),
            y: self.y + distance * angle.sin(),
        }
    }

    /// Heading from `self` towards `other`
    #[inline]
    pub fn angle_to(self, other: Point) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    #[inline]
    pub fn distance_to(self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    #[inline]
    pub fn offset(self, dx: f64, dy: f64) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }

    /// Rotate this point about `pivot`, preserving its distance to it
    pub fn rotate_about(self, pivot: Point, angle: f64) -> Point {
        let radius = pivot.distance_to(self);
        pivot.project(pivot.angle_to(self) + angle, radius)
    }
}

/// Pixel footprint of an entity
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    #[inline]
    pub fn new(width: f64, height: f64) -> Self {
        Size { width, height }
    }

    /// Offset from the top-left corner to the centre
    #[inline]
    pub fn half(self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }
}

/// Facing angle for a rotation in degrees (rotation 0 faces +y)
#[inline]
pub fn facing_from_rotation(degrees: f64) -> f64 {
    (degrees + 90.0).to_radians()
}

/// Wrap an angle into (-π, π]
pub fn normalize_angle(angle: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

/// Centre position, elevation and facing of an entity at one instant
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    /// Elevation
    pub z: f64,
    /// Facing angle (radians)
    pub t: f64,
}

impl Location {
    #[inline]
    pub fn new(x: f64, y: f64, z: f64, t: f64) -> Self {
        Location { x, y, z, t }
    }

    #[inline]
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// One leader displacement: origin `a`, destination `b` and derived deltas.
///
/// Only `a` and `b` cross the wire. Everything else is rebuilt by
/// [`FollowVector::new`] when a peer deserializes the value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "FollowVectorWire", into = "FollowVectorWire")]
pub struct FollowVector {
    pub a: Location,
    pub b: Location,
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    pub dt: f64,
    /// Planar heading of the displacement
    pub angle: f64,
    /// Planar length of the displacement
    pub distance: f64,
}

impl FollowVector {
    pub fn new(a: Location, b: Location) -> Self {
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        FollowVector {
            a,
            b,
            dx,
            dy,
            dz: b.z - a.z,
            dt: b.t - a.t,
            angle: dy.atan2(dx),
            distance: dx.hypot(dy),
        }
    }

    /// Did the leader move on the plane or turn?
    pub fn is_planar_change(&self) -> bool {
        self.dx != 0.0 || self.dy != 0.0 || self.dt != 0.0
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct FollowVectorWire {
    a: Location,
    b: Location,
}

impl From<FollowVectorWire> for FollowVector {
    fn from(wire: FollowVectorWire) -> Self {
        FollowVector::new(wire.a, wire.b)
    }
}

impl From<FollowVector> for FollowVectorWire {
    fn from(vector: FollowVector) -> Self {
        FollowVectorWire {
            a: vector.a,
            b: vector.b,
        }
    }
}

/// Grid layout of a scene
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GridKind {
    Gridless,
    #[default]
    Square,
    /// Hexagons in staggered columns
    HexColumns,
    /// Hexagons in staggered rows
    HexRows,
}

/// Scene grid: converts footprints to pixels and snaps points
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub kind: GridKind,
    pub size_x: f64,
    pub size_y: f64,
}

impl Default for Grid {
    fn default() -> Self {
        Grid::square(100.0)
    }
}

impl Grid {
    pub fn square(size: f64) -> Self {
        Grid {
            kind: GridKind::Square,
            size_x: size,
            size_y: size,
        }
    }

    pub fn gridless(size: f64) -> Self {
        Grid {
            kind: GridKind::Gridless,
            ..Grid::square(size)
        }
    }

    pub fn hex_columns(size_x: f64, size_y: f64) -> Self {
        Grid {
            kind: GridKind::HexColumns,
            size_x,
            size_y,
        }
    }

    pub fn hex_rows(size_x: f64, size_y: f64) -> Self {
        Grid {
            kind: GridKind::HexRows,
            size_x,
            size_y,
        }
    }

    /// Pixel size of a `width × height` footprint given in grid units
    pub fn footprint(&self, width: f64, height: f64) -> Size {
        let (width, height) = match self.kind {
            GridKind::HexColumns => (hex_span(width), height),
            GridKind::HexRows => (width, hex_span(height)),
            GridKind::Square | GridKind::Gridless => (width, height),
        };
        Size::new(width * self.size_x, height * self.size_y)
    }

    /// Nearest grid corner; identity on gridless scenes
    pub fn snap_corner(&self, point: Point) -> Point {
        if self.kind == GridKind::Gridless || self.size_x <= 0.0 || self.size_y <= 0.0 {
            return point;
        }
        Point::new(
            (point.x / self.size_x).round() * self.size_x,
            (point.y / self.size_y).round() * self.size_y,
        )
    }
}

/// Span of `cells` hexagons along the staggered axis, in cell units
fn hex_span(cells: f64) -> f64 {
    0.75 * cells.floor() + 0.5 * cells.fract() + 0.25
}
