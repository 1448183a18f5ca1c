use image::{GrayImage, Luma};

use super::point::Pointi32;
use super::rect::Rect;

pub const MASK_ON: Luma<u8> = Luma([255]);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polygon {
    pub points: Vec<Pointi32>,
}

impl Polygon {
    pub fn new(points: Vec<Pointi32>) -> Self {
        Self { points }
    }

    /// Bounding rect clipped to a `width`x`height` raster.
    pub fn bounds(&self, width: u32, height: u32) -> Option<Rect> {
        Rect::bounding(&self.points, 0, width, height)
    }

    /// Twice the signed area (shoelace).
    pub fn signed_area2(&self) -> i64 {
        let n = self.points.len();
        (0..n)
            .map(|i| {
                let a = self.points[i];
                let b = self.points[(i + 1) % n];
                a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64
            })
            .sum()
    }

    // Boundary counts as inside
    pub fn contains_point(&self, point: Pointi32) -> bool {
        let n = self.points.len();
        if n < 3 {
            return false;
        }

        if self.point_on_boundary(point) {
            return true;
        }

        // Ray casting for interior points
        let mut inside = false;
        let mut j = n - 1;

        for i in 0..n {
            let vi = self.points[i];
            let vj = self.points[j];

            if ((vi.y > point.y) != (vj.y > point.y)) && point_left_of_edge(point, vi, vj) {
                inside = !inside;
            }
            j = i;
        }

        inside
    }

    fn point_on_boundary(&self, point: Pointi32) -> bool {
        let n = self.points.len();

        if self.points.contains(&point) {
            return true;
        }

        (0..n).any(|i| point_on_edge(point, self.points[i], self.points[(i + 1) % n]))
    }

    /// Row-major scan of every pixel inside the polygon.
    pub fn iter_inner_points(&self) -> PolygonInteriorIter<'_> {
        PolygonInteriorIter::new(self)
    }

    /// Filled single-channel mask of a `width`x`height` raster whose origin
    /// sits at `origin` in the polygon's coordinate space.
    pub fn mask(&self, origin: Pointi32, width: u32, height: u32) -> GrayImage {
        let mut mask = GrayImage::new(width, height);
        let local = self.translate(-origin.x, -origin.y);

        if local.bounds(width, height).is_none() {
            return mask;
        }

        for p in local.iter_inner_points() {
            if p.x >= 0 && p.y >= 0 && (p.x as u32) < width && (p.y as u32) < height {
                mask.put_pixel(p.x as u32, p.y as u32, MASK_ON);
            }
        }

        mask
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Polygon {
        Polygon::new(self.points.iter().map(|p| p.offset(dx, dy)).collect())
    }
}

fn point_on_edge(point: Pointi32, p1: Pointi32, p2: Pointi32) -> bool {
    let cross_product = (point.y - p1.y) as i64 * (p2.x - p1.x) as i64
        - (point.x - p1.x) as i64 * (p2.y - p1.y) as i64;

    if cross_product != 0 {
        return false;
    }

    let min_x = p1.x.min(p2.x);
    let max_x = p1.x.max(p2.x);
    let min_y = p1.y.min(p2.y);
    let max_y = p1.y.max(p2.y);

    point.x >= min_x && point.x <= max_x && point.y >= min_y && point.y <= max_y
}

fn point_left_of_edge(point: Pointi32, p1: Pointi32, p2: Pointi32) -> bool {
    // point.x < p1.x + dx * (point.y - p1.y) / dy, without the division
    let dx = (p2.x - p1.x) as i64;
    let dy = (p2.y - p1.y) as i64;

    if dy == 0 {
        return false;
    }

    let left_side = (point.x - p1.x) as i64 * dy;
    let right_side = dx * (point.y - p1.y) as i64;

    if dy > 0 {
        left_side < right_side
    } else {
        left_side > right_side
    }
}

pub struct PolygonInteriorIter<'a> {
    polygon: &'a Polygon,
    next: Option<Pointi32>,
    min_x: i32,
    max_x: i32,
    max_y: i32,
}

impl<'a> PolygonInteriorIter<'a> {
    fn new(polygon: &'a Polygon) -> Self {
        let points = &polygon.points;
        let min_y = points.iter().map(|p| p.y).min();
        Self {
            polygon,
            next: min_y.map(|y| Pointi32::new(points.iter().map(|p| p.x).min().unwrap_or(0), y)),
            min_x: points.iter().map(|p| p.x).min().unwrap_or(0),
            max_x: points.iter().map(|p| p.x).max().unwrap_or(0),
            max_y: points.iter().map(|p| p.y).max().unwrap_or(0),
        }
    }

    fn advance(&self, p: Pointi32) -> Option<Pointi32> {
        if p.x < self.max_x {
            Some(p.offset(1, 0))
        } else if p.y < self.max_y {
            Some(Pointi32::new(self.min_x, p.y + 1))
        } else {
            None
        }
    }
}

impl Iterator for PolygonInteriorIter<'_> {
    type Item = Pointi32;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(p) = self.next {
            self.next = self.advance(p);
            if self.polygon.contains_point(p) {
                return Some(p);
            }
        }
        None
    }
}
