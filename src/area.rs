//! Explicit sets of pixel coordinates.
//!
//! Transforms never run over an implicit "whole image"; callers always name
//! the points to recompute, which keeps partial updates cheap.

use std::collections::HashSet;

/// A pixel coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Point {
    /// Column, growing rightwards.
    pub x: u32,
    /// Row, growing downwards.
    pub y: u32,
}

impl Point {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// The point one mipmap level up (both axes halved, rounding down).
    #[inline]
    pub const fn halved(self) -> Self {
        Self {
            x: self.x >> 1,
            y: self.y >> 1,
        }
    }
}

impl From<(u32, u32)> for Point {
    fn from((x, y): (u32, u32)) -> Self {
        Self { x, y }
    }
}

/// Finite, duplicate-free set of points, iterated in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Area {
    points: Vec<Point>,
    seen: HashSet<Point>,
}

impl Area {
    /// Empty area.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every point of the `width × height` rectangle at `(x, y)`, row-major.
    ///
    /// The rectangle is clipped at `u32::MAX` on both axes.
    pub fn rect(x: u32, y: u32, width: u32, height: u32) -> Self {
        let (right, bottom) = (x.saturating_add(width), y.saturating_add(height));
        let capacity = (right - x) as usize * (bottom - y) as usize;
        let mut points = Vec::with_capacity(capacity);
        for row in y..bottom {
            for col in x..right {
                points.push(Point::new(col, row));
            }
        }
        let seen = points.iter().copied().collect();
        Self { points, seen }
    }

    /// Build an area from arbitrary points; later duplicates are dropped.
    pub fn from_points<I, P>(points: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Point>,
    {
        let mut seen = HashSet::new();
        let points = points
            .into_iter()
            .map(Into::into)
            .filter(|p| seen.insert(*p))
            .collect();
        Self { points, seen }
    }

    /// Add one point, ignoring it if already present.
    pub fn insert(&mut self, point: impl Into<Point>) {
        let point = point.into();
        if self.seen.insert(point) {
            self.points.push(point);
        }
    }

    /// Whether `point` is part of the area.
    pub fn contains(&self, point: Point) -> bool {
        self.seen.contains(&point)
    }

    /// Number of distinct points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points in insertion order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Point> + '_ {
        self.points.iter().copied()
    }
}

impl<P: Into<Point>> FromIterator<P> for Area {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Self::from_points(iter)
    }
}

impl<'a> IntoIterator for &'a Area {
    type Item = Point;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, Point>>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_is_row_major() {
        let area = Area::rect(1, 2, 2, 2);
        let points: Vec<_> = area.iter().collect();
        assert_eq!(
            points,
            vec![
                Point::new(1, 2),
                Point::new(2, 2),
                Point::new(1, 3),
                Point::new(2, 3)
            ]
        );
    }

    #[test]
    fn duplicates_are_dropped() {
        let mut area = Area::from_points([(0, 0), (1, 0), (0, 0)]);
        assert_eq!(area.len(), 2);
        area.insert((1, 0));
        area.insert((5, 5));
        assert_eq!(area.len(), 3);
    }

    #[test]
    fn rect_clips_at_coordinate_limit() {
        let area = Area::rect(u32::MAX - 1, u32::MAX - 2, u32::MAX, 2);
        let points: Vec<_> = area.iter().collect();
        assert_eq!(
            points,
            vec![Point::new(u32::MAX - 1, u32::MAX - 2), Point::new(u32::MAX - 1, u32::MAX - 1)]
        );
    }

    #[test]
    fn inserted_points_keep_order_and_are_tracked() {
        let mut area = Area::new();
        for i in (0..2000).rev() {
            area.insert((i % 1000, 0));
        }
        assert_eq!(area.len(), 1000);
        assert_eq!(area.iter().next(), Some(Point::new(999, 0)));
        assert!(area.contains(Point::new(0, 0)));
        assert!(!area.contains(Point::new(0, 1)));
        assert_eq!(area, Area::rect(0, 0, 1000, 1).iter().rev().collect());
    }

    #[test]
    fn empty_rect() {
        assert!(Area::rect(3, 3, 0, 5).is_empty());
    }

    #[test]
    fn halved_rounds_down() {
        assert_eq!(Point::new(5, 3).halved(), Point::new(2, 1));
    }
}
