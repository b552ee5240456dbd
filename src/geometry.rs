//! Small integer geometry used by pointing devices and window queries.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// `true` when `p` lies inside a client area of this size anchored at the origin.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= 0 && p.y >= 0 && p.x < self.width && p.y < self.height
    }
}

/// Rectangle with inclusive `left..=right`, `top..=bottom` edges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Nearest point inside the rectangle.
    pub fn clamp(&self, p: Point) -> Point {
        Point::new(p.x.clamp(self.x, self.right().max(self.x)), p.y.clamp(self.y, self.bottom().max(self.y)))
    }
}

/// Inclusive integer range used to constrain the wheel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub min: i32,
    pub max: i32,
}

impl Range {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, v: i32) -> i32 {
        v.clamp(self.min.min(self.max), self.max.max(self.min))
    }

    /// Distance between the bounds.
    pub fn span(&self) -> i32 {
        (self.max - self.min).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_clamps_to_nearest_edge() {
        let r = Rect::new(10, 20, 100, 50);
        assert_eq!(r.clamp(Point::new(-5, 300)), Point::new(10, 70));
        assert_eq!(r.clamp(Point::new(50, 30)), Point::new(50, 30));
        assert_eq!(r.clamp(Point::new(500, 0)), Point::new(110, 20));
    }

    #[test]
    fn range_clamp_tolerates_swapped_bounds() {
        let r = Range::new(10, -10);
        assert_eq!(r.clamp(50), 10);
        assert_eq!(r.clamp(-50), -10);
        assert_eq!(r.span(), 20);
    }
}
