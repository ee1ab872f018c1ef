//! Screen-space geometry shared by the host and guest sides.
//!
//! Guest rectangles use exclusive right/bottom edges. Host coordinates are
//! relative to the root window; [`CoordinateMap`] converts between the two.

use serde::{Deserialize, Serialize};

/// A point in either guest (virtual screen) or host (root) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Rectangle with exclusive right and bottom edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Build a rectangle from an origin and a size.
    #[allow(clippy::cast_possible_wrap)]
    pub const fn from_origin_size(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self::new(x, y, x + width as i32, y + height as i32)
    }

    pub const fn width(self) -> i32 {
        self.right - self.left
    }

    pub const fn height(self) -> i32 {
        self.bottom - self.top
    }

    pub const fn is_empty(self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    pub const fn top_left(self) -> Point {
        Point::new(self.left, self.top)
    }

    pub const fn contains(self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.left < other.right
            && self.right > other.left
            && self.top < other.bottom
            && self.bottom > other.top
    }

    /// True when `self` lies entirely within `outer` (equality included).
    pub const fn is_within(self, outer: Self) -> bool {
        self.left >= outer.left
            && self.top >= outer.top
            && self.right <= outer.right
            && self.bottom <= outer.bottom
    }

    /// True when at least one edge of `self` lies strictly inside `outer`,
    /// i.e. confining the pointer to `self` restricts it compared to `outer`.
    pub const fn restricts(self, outer: Self) -> bool {
        self.left > outer.left
            || self.right < outer.right
            || self.top > outer.top
            || self.bottom < outer.bottom
    }

    /// True when `self` is smaller than `previous` on any edge.
    pub const fn shrinks_from(self, previous: Self) -> bool {
        self.restricts(previous)
    }

    /// Clamp `self` to `bounds`. The result may be empty.
    pub fn clamp_to(self, bounds: Self) -> Self {
        Self::new(
            self.left.max(bounds.left),
            self.top.max(bounds.top),
            self.right.min(bounds.right),
            self.bottom.min(bounds.bottom),
        )
    }

    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.left + dx, self.top + dy, self.right + dx, self.bottom + dy)
    }

    /// Mirror horizontally inside `container`, for right-to-left layouts.
    #[must_use]
    pub const fn mirror_in(self, container: Self) -> Self {
        let width = container.width();
        Self::new(width - self.right, self.top, width - self.left, self.bottom)
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})-({},{})", self.left, self.top, self.right, self.bottom)
    }
}

/// Scaling between the resolution an application asked for ("user") and the
/// real output mode, with the user area centred at `offset` on the output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayScale {
    pub user_width: u32,
    pub user_height: u32,
    pub real_width: u32,
    pub real_height: u32,
    pub offset: Point,
}

impl DisplayScale {
    fn factors(&self) -> (f64, f64) {
        (
            f64::from(self.real_width) / f64::from(self.user_width.max(1)),
            f64::from(self.real_height) / f64::from(self.user_height.max(1)),
        )
    }

    pub fn user_to_real(&self, p: Point) -> Point {
        let (sx, sy) = self.factors();
        Point::new(
            self.offset.x + (f64::from(p.x) * sx).round() as i32,
            self.offset.y + (f64::from(p.y) * sy).round() as i32,
        )
    }

    pub fn real_to_user(&self, p: Point) -> Point {
        let (sx, sy) = self.factors();
        Point::new(
            (f64::from(p.x - self.offset.x) / sx).round() as i32,
            (f64::from(p.y - self.offset.y) / sy).round() as i32,
        )
    }

    /// Scale a relative delta from real to user units (no offset).
    pub fn scale_real_to_user(&self, dx: i32, dy: i32) -> (i32, i32) {
        let (sx, sy) = self.factors();
        (
            (f64::from(dx) / sx).round() as i32,
            (f64::from(dy) / sy).round() as i32,
        )
    }
}

/// Conversion between guest virtual-screen coordinates and host root
/// coordinates, optionally through a display-scaling transform.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CoordinateMap {
    /// Top-left corner of the virtual screen, in guest coordinates.
    pub virtual_origin: Point,
    #[serde(default)]
    pub scale: Option<DisplayScale>,
}

impl CoordinateMap {
    /// Guest (user) point to host root coordinates.
    pub fn to_root(&self, p: Point) -> Point {
        let real = self.scale.map_or(p, |s| s.user_to_real(p));
        Point::new(real.x - self.virtual_origin.x, real.y - self.virtual_origin.y)
    }

    /// Host root point to guest (user) coordinates.
    pub fn from_root(&self, p: Point) -> Point {
        let virt = Point::new(p.x + self.virtual_origin.x, p.y + self.virtual_origin.y);
        self.scale.map_or(virt, |s| s.real_to_user(virt))
    }

    /// Guest rectangle to host root coordinates.
    pub fn rect_to_root(&self, r: Rect) -> Rect {
        let tl = self.to_root(Point::new(r.left, r.top));
        let br = self.to_root(Point::new(r.right, r.bottom));
        Rect::new(tl.x, tl.y, br.x, br.y)
    }

    /// Relative delta from host (real) units into guest units.
    pub fn scale_delta(&self, dx: i32, dy: i32) -> (i32, i32) {
        self.scale.map_or((dx, dy), |s| s.scale_real_to_user(dx, dy))
    }

    pub fn user_to_real(&self, p: Point) -> Point {
        self.scale.map_or(p, |s| s.user_to_real(p))
    }

    pub fn real_to_user(&self, p: Point) -> Point {
        self.scale.map_or(p, |s| s.real_to_user(p))
    }
}
