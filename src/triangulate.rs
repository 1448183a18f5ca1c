/*
ISC License

Copyright (c) 2024, Mapbox

Permission to use, copy, modify, and/or distribute this software for any purpose
with or without fee is hereby granted, provided that the above copyright notice
and this permission notice appear in all copies.

THE SOFTWARE IS PROVIDED "AS IS" AND THE AUTHOR DISCLAIMS ALL WARRANTIES WITH
REGARD TO THIS SOFTWARE INCLUDING ALL IMPLIED WARRANTIES OF MERCHANTABILITY AND
FITNESS. IN NO EVENT SHALL THE AUTHOR BE LIABLE FOR ANY SPECIAL, DIRECT,
INDIRECT, OR CONSEQUENTIAL DAMAGES OR ANY DAMAGES WHATSOEVER RESULTING FROM LOSS
OF USE, DATA OR PROFITS, WHETHER IN AN ACTION OF CONTRACT, NEGLIGENCE OR OTHER
TORTIOUS ACTION, ARISING OUT OF OR IN CONNECTION WITH THE USE OR PERFORMANCE OF
THIS SOFTWARE.



 ************

This is a port of Mapbox's Delaunay triangulation algorithm to rust.
 */
use crate::shapes::point::PointF32;
use robust::{Coord, orient2d};
use tracing::trace;

const EPSILON: f64 = f64::EPSILON;
const EMPTY: usize = usize::MAX;
const EDGE_STACK_CAP: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Vertex {
    x: f64,
    y: f64,
}

impl Vertex {
    fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.x,
            y: self.y,
        }
    }
}

impl From<&PointF32> for Vertex {
    fn from(p: &PointF32) -> Self {
        Vertex {
            x: p.x as f64,
            y: p.y as f64,
        }
    }
}

/// Delaunay triangles as index triples into the input, plus the
/// counter-clockwise (screen space) hull indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triangulation {
    pub triangles: Vec<[usize; 3]>,
    pub hull: Vec<usize>,
}

pub fn triangulate(points: &[PointF32]) -> Triangulation {
    let mut d = Delaunator::new(points.iter().map(Vertex::from).collect());
    d.triangulate();
    trace!(
        "Triangulated {} points into {} triangles",
        points.len(),
        d.triangles.len() / 3
    );

    Triangulation {
        triangles: d
            .triangles
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect(),
        hull: d.hull,
    }
}

struct Delaunator {
    points: Vec<Vertex>,
    edge_stack: Vec<usize>,
    triangles: Vec<usize>,
    half_edges: Vec<usize>,
    hash_size: usize,
    hull_start: usize,
    hull_prev: Vec<usize>,
    hull_next: Vec<usize>,
    hull_tri: Vec<usize>,
    hull_hash: Vec<usize>,
    hull: Vec<usize>,
    ids: Vec<usize>,
    dists: Vec<f64>,
    center: Vertex,
}

impl Delaunator {
    fn new(points: Vec<Vertex>) -> Self {
        let n = points.len();
        let max_triangles = (2 * n).saturating_sub(5);
        let hash_size = ((n as f64).sqrt().ceil() as usize).max(1);

        Self {
            points,
            edge_stack: Vec::with_capacity(EDGE_STACK_CAP),
            triangles: Vec::with_capacity(max_triangles * 3),
            half_edges: Vec::with_capacity(max_triangles * 3),
            hash_size,
            hull_start: 0,
            hull_prev: vec![0; n],
            hull_next: vec![0; n],
            hull_tri: vec![0; n],
            hull_hash: vec![EMPTY; hash_size],
            hull: Vec::new(),
            ids: (0..n).collect(),
            dists: vec![0.; n],
            center: Vertex { x: 0., y: 0. },
        }
    }

    fn triangulate(&mut self) {
        let n = self.points.len();
        if n < 3 {
            self.hull = (0..n).collect();
            return;
        }

        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for v in &self.points {
            min_x = min_x.min(v.x);
            min_y = min_y.min(v.y);
            max_x = max_x.max(v.x);
            max_y = max_y.max(v.y);
        }

        let c = Vertex {
            x: (min_x + max_x) / 2.,
            y: (min_y + max_y) / 2.,
        };

        // pick a seed point close to the center
        let mut i0 = 0;
        let mut min_dist = f64::INFINITY;
        for (i, v) in self.points.iter().enumerate() {
            let d = dist(&c, v);
            if d < min_dist {
                i0 = i;
                min_dist = d;
            }
        }
        let p0 = self.points[i0];

        // find the point closest to the seed
        let mut i1 = EMPTY;
        min_dist = f64::INFINITY;
        for (i, v) in self.points.iter().enumerate() {
            if i == i0 {
                continue;
            }
            let d = dist(&p0, v);
            if d < min_dist && d > 0. {
                i1 = i;
                min_dist = d;
            }
        }

        if i1 == EMPTY {
            // every point is a duplicate of the seed
            self.hull = vec![i0];
            return;
        }

        // find the third point which forms the smallest circumcircle with the first two
        let mut i2 = EMPTY;
        let mut min_radius = f64::INFINITY;
        for (i, v) in self.points.iter().enumerate() {
            if i == i0 || i == i1 {
                continue;
            }
            let r = circumradius(&p0, &self.points[i1], v);
            if r < min_radius {
                i2 = i;
                min_radius = r;
            }
        }

        if i2 == EMPTY {
            // order collinear points by dx (or dy if all x are identical)
            // and return the list as a hull
            let first = self.points[0];
            for (i, v) in self.points.iter().enumerate() {
                let dx = v.x - first.x;
                self.dists[i] = if dx != 0. { dx } else { v.y - first.y };
            }
            self.sort_ids();

            let mut d0 = f64::NEG_INFINITY;
            for &id in &self.ids {
                let d = self.dists[id];
                if d > d0 {
                    self.hull.push(id);
                    d0 = d;
                }
            }
            return;
        }

        // swap the order of the seed points for counter-clockwise orientation
        if orient(&p0, &self.points[i1], &self.points[i2]) < 0. {
            std::mem::swap(&mut i1, &mut i2);
        }
        let p1 = self.points[i1];
        let p2 = self.points[i2];

        self.center = circumcenter(&p0, &p1, &p2);
        for (i, v) in self.points.iter().enumerate() {
            self.dists[i] = dist(v, &self.center);
        }

        // sort the points by distance from the seed triangle circumcenter
        self.sort_ids();

        // set up the seed triangle as the starting hull
        self.hull_start = i0;
        let mut hull_size = 3;

        self.hull_next[i0] = i1;
        self.hull_prev[i2] = i1;
        self.hull_next[i1] = i2;
        self.hull_prev[i0] = i2;
        self.hull_next[i2] = i0;
        self.hull_prev[i1] = i0;

        self.hull_tri[i0] = 0;
        self.hull_tri[i1] = 1;
        self.hull_tri[i2] = 2;

        for (i, p) in [(i0, p0), (i1, p1), (i2, p2)] {
            let key = self.hash_key(&p);
            self.hull_hash[key] = i;
        }

        self.add_triangle(i0, i1, i2, EMPTY, EMPTY, EMPTY);

        let mut prev: Option<Vertex> = None;
        for k in 0..n {
            let i = self.ids[k];
            let p = self.points[i];

            // skip near-duplicate points
            if let Some(pp) = prev {
                if (p.x - pp.x).abs() <= EPSILON && (p.y - pp.y).abs() <= EPSILON {
                    continue;
                }
            }
            prev = Some(p);

            // skip seed triangle points
            if i == i0 || i == i1 || i == i2 {
                continue;
            }

            // find a visible edge on the convex hull using edge hash
            let mut start = EMPTY;
            let key = self.hash_key(&p);
            for j in 0..self.hash_size {
                start = self.hull_hash[(key + j) % self.hash_size];
                if start != EMPTY && start != self.hull_next[start] {
                    break;
                }
            }
            if start == EMPTY {
                continue;
            }

            start = self.hull_prev[start];
            let mut e = start;
            loop {
                let q = self.hull_next[e];
                if orient(&p, &self.points[e], &self.points[q]) < 0. {
                    break;
                }
                e = q;
                if e == start {
                    e = EMPTY;
                    break;
                }
            }
            if e == EMPTY {
                // likely a near-duplicate point; skip it
                continue;
            }

            // add the first triangle from the point
            let mut t = self.add_triangle(e, i, self.hull_next[e], EMPTY, EMPTY, self.hull_tri[e]);

            // recursively flip triangles from the point until they satisfy the Delaunay condition
            self.hull_tri[i] = self.legalize(t + 2);
            self.hull_tri[e] = t; // keep track of boundary triangles on the hull
            hull_size += 1;

            // walk forward through the hull, adding more triangles and flipping recursively
            let mut next = self.hull_next[e];
            loop {
                let q = self.hull_next[next];
                if orient(&p, &self.points[next], &self.points[q]) >= 0. {
                    break;
                }
                t = self.add_triangle(next, i, q, self.hull_tri[i], EMPTY, self.hull_tri[next]);
                self.hull_tri[i] = self.legalize(t + 2);
                self.hull_next[next] = next; // mark as removed
                hull_size -= 1;
                next = q;
            }

            // walk backward from the other side, adding more triangles and flipping
            if e == start {
                loop {
                    let q = self.hull_prev[e];
                    if orient(&p, &self.points[q], &self.points[e]) >= 0. {
                        break;
                    }
                    t = self.add_triangle(q, i, e, EMPTY, self.hull_tri[e], self.hull_tri[q]);
                    self.legalize(t + 2);
                    self.hull_tri[q] = t;
                    self.hull_next[e] = e; // mark as removed
                    hull_size -= 1;
                    e = q;
                }
            }

            // update the hull indices
            self.hull_start = e;
            self.hull_prev[i] = e;
            self.hull_next[e] = i;
            self.hull_prev[next] = i;
            self.hull_next[i] = next;

            // save the two new edges in the hash table
            let key = self.hash_key(&p);
            self.hull_hash[key] = i;
            let pe = self.points[e];
            let key = self.hash_key(&pe);
            self.hull_hash[key] = e;
        }

        let mut e = self.hull_start;
        for _ in 0..hull_size {
            self.hull.push(e);
            e = self.hull_next[e];
        }
    }

    fn sort_ids(&mut self) {
        let dists = &self.dists;
        self.ids.sort_by(|&a, &b| dists[a].total_cmp(&dists[b]));
    }

    fn hash_key(&self, v: &Vertex) -> usize {
        let angle = pseudo_angle(v.x - self.center.x, v.y - self.center.y);
        (self.hash_size as f64 * angle).floor() as usize % self.hash_size
    }

    fn legalize(&mut self, mut a: usize) -> usize {
        let mut ar;
        self.edge_stack.clear();

        // recursion eliminated with a bounded stack
        loop {
            let b = self.half_edges[a];

            /* if the pair of triangles doesn't satisfy the Delaunay condition
             * (p1 is inside the circumcircle of [p0, pl, pr]), flip them,
             * then do the same check/flip recursively for the new pair of triangles
             *
             *           pl                    pl
             *          /||\                  /  \
             *       al/ || \bl            al/    \a
             *        /  ||  \              /      \
             *       /  a||b  \    flip    /___ar___\
             *     p0\   ||   /p1   =>   p0\---bl---/p1
             *        \  ||  /              \      /
             *       ar\ || /br             b\    /br
             *          \||/                  \  /
             *           pr                    pr
             */
            let a0 = a - a % 3;
            ar = a0 + (a + 2) % 3;

            if b == EMPTY {
                // convex hull edge
                match self.edge_stack.pop() {
                    Some(next) => {
                        a = next;
                        continue;
                    }
                    None => break,
                }
            }

            let b0 = b - b % 3;
            let al = a0 + (a + 1) % 3;
            let bl = b0 + (b + 2) % 3;

            let p0 = self.triangles[ar];
            let pr = self.triangles[a];
            let pl = self.triangles[al];
            let p1 = self.triangles[bl];

            let illegal = in_circle(
                &self.points[p0],
                &self.points[pr],
                &self.points[pl],
                &self.points[p1],
            );

            if illegal {
                self.triangles[a] = p1;
                self.triangles[b] = p0;

                let hbl = self.half_edges[bl];

                // edge swapped on the other side of the hull (rare); fix the halfedge reference
                if hbl == EMPTY {
                    let mut e = self.hull_start;
                    loop {
                        if self.hull_tri[e] == bl {
                            self.hull_tri[e] = a;
                            break;
                        }
                        e = self.hull_prev[e];
                        if e == self.hull_start {
                            break;
                        }
                    }
                }

                let har = self.half_edges[ar];
                self.link(a, hbl);
                self.link(b, har);
                self.link(ar, bl);

                let br = b0 + (b + 1) % 3;
                if self.edge_stack.len() < EDGE_STACK_CAP {
                    self.edge_stack.push(br);
                }
            } else {
                match self.edge_stack.pop() {
                    Some(next) => a = next,
                    None => break,
                }
            }
        }

        ar
    }

    fn link(&mut self, a: usize, b: usize) {
        self.half_edges[a] = b;
        if b != EMPTY {
            self.half_edges[b] = a;
        }
    }

    // add a new triangle given vertex indices and adjacent half-edge ids
    fn add_triangle(
        &mut self,
        i0: usize,
        i1: usize,
        i2: usize,
        a: usize,
        b: usize,
        c: usize,
    ) -> usize {
        let t = self.triangles.len();

        self.triangles.extend_from_slice(&[i0, i1, i2]);
        self.half_edges.extend_from_slice(&[EMPTY, EMPTY, EMPTY]);

        self.link(t, a);
        self.link(t + 1, b);
        self.link(t + 2, c);

        t
    }
}

// Screen-space orientation (y down): negative when p, q, r turn counter-clockwise
// on screen. robust orients y up, hence the swapped arguments.
fn orient(p: &Vertex, q: &Vertex, r: &Vertex) -> f64 {
    orient2d(p.coord(), r.coord(), q.coord())
}

// monotonically increases with real angle, but doesn't need expensive trigonometry
fn pseudo_angle(dx: f64, dy: f64) -> f64 {
    let p = dx / (dx.abs() + dy.abs());
    let t = if dy > 0. { 3. - p } else { 1. + p };

    t / 4.
}

fn dist(a: &Vertex, b: &Vertex) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;

    dx * dx + dy * dy
}

fn in_circle(a: &Vertex, b: &Vertex, c: &Vertex, p: &Vertex) -> bool {
    let dx = a.x - p.x;
    let dy = a.y - p.y;
    let ex = b.x - p.x;
    let ey = b.y - p.y;
    let fx = c.x - p.x;
    let fy = c.y - p.y;

    let ap = dx * dx + dy * dy;
    let bp = ex * ex + ey * ey;
    let cp = fx * fx + fy * fy;

    dx * (ey * cp - bp * fy) - dy * (ex * cp - bp * fx) + ap * (ex * fy - ey * fx) < 0.
}

fn circumradius(a: &Vertex, b: &Vertex, c: &Vertex) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let ex = c.x - a.x;
    let ey = c.y - a.y;

    let bl = dx * dx + dy * dy;
    let cl = ex * ex + ey * ey;
    let d = 0.5 / (dx * ey - dy * ex);

    let x = (ey * bl - dy * cl) * d;
    let y = (dx * cl - ex * bl) * d;

    x * x + y * y
}

fn circumcenter(a: &Vertex, b: &Vertex, c: &Vertex) -> Vertex {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let ex = c.x - a.x;
    let ey = c.y - a.y;

    let bl = dx * dx + dy * dy;
    let cl = ex * ex + ey * ey;
    let d = 0.5 / (dx * ey - dy * ex);

    Vertex {
        x: a.x + (ey * bl - dy * cl) * d,
        y: a.y + (dx * cl - ex * bl) * d,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::point::triangle_area;

    fn pts(raw: &[(f32, f32)]) -> Vec<PointF32> {
        raw.iter().map(|&(x, y)| PointF32::new(x, y)).collect()
    }

    // deterministic scatter, no two points cocircular by construction of the jitter
    fn scatter(n: usize) -> Vec<PointF32> {
        let mut seed: u32 = 12345;
        let mut next = || {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
            (seed >> 8) as f32 / (1u32 << 24) as f32
        };
        (0..n).map(|_| PointF32::new(next() * 300., next() * 200.)).collect()
    }

    fn hull_area(points: &[PointF32], hull: &[usize]) -> f32 {
        let n = hull.len();
        (0..n)
            .map(|i| {
                let a = points[hull[i]];
                let b = points[hull[(i + 1) % n]];
                a.x * b.y - b.x * a.y
            })
            .sum::<f32>()
            .abs()
            / 2.
    }

    #[test]
    fn test_square() {
        let points = pts(&[(0., 0.), (10., 0.), (10., 10.), (0., 10.)]);
        let t = triangulate(&points);

        assert_eq!(t.triangles.len(), 2);
        assert_eq!(t.hull.len(), 4);
    }

    #[test]
    fn test_collinear_points_have_no_triangles() {
        let points = pts(&[(4., 4.), (0., 0.), (2., 2.), (1., 1.)]);
        let t = triangulate(&points);

        assert!(t.triangles.is_empty());
        assert_eq!(t.hull, vec![1, 3, 2, 0]);
    }

    #[test]
    fn test_too_few_points() {
        let t = triangulate(&pts(&[(0., 0.), (1., 0.)]));
        assert!(t.triangles.is_empty());
    }

    #[test]
    fn test_deterministic() {
        let points = scatter(60);
        assert_eq!(triangulate(&points), triangulate(&points));
    }

    #[test]
    fn test_covers_hull_without_overlap() {
        let points = scatter(80);
        let t = triangulate(&points);

        // Euler: a full triangulation of n points with h on the hull has 2n - h - 2 faces
        assert_eq!(t.triangles.len(), 2 * points.len() - t.hull.len() - 2);

        let covered: f32 = t
            .triangles
            .iter()
            .map(|&[a, b, c]| triangle_area(&[points[a], points[b], points[c]]))
            .sum();
        let expected = hull_area(&points, &t.hull);
        assert!((covered - expected).abs() / expected < 1e-3);
    }

    #[test]
    fn test_delaunay_condition() {
        let points = scatter(50);
        let t = triangulate(&points);
        let verts: Vec<Vertex> = points.iter().map(Vertex::from).collect();

        for &[a, b, c] in &t.triangles {
            let center = circumcenter(&verts[a], &verts[b], &verts[c]);
            let r2 = dist(&center, &verts[a]);
            for (i, v) in verts.iter().enumerate() {
                if i == a || i == b || i == c {
                    continue;
                }
                assert!(dist(&center, v) >= r2 * (1. - 1e-9), "point {i} inside circumcircle");
            }
        }
    }

    #[test]
    fn test_regular_polygon_with_center() {
        let mut points: Vec<PointF32> = (0..8)
            .map(|i| {
                let theta = i as f32 * std::f32::consts::TAU / 8.;
                PointF32::new(50. + 30. * theta.cos(), 50. + 30. * theta.sin())
            })
            .collect();
        points.push(PointF32::new(50., 50.));

        let t = triangulate(&points);
        assert_eq!(t.hull.len(), 8);
        assert_eq!(t.triangles.len(), 8);
        assert!(t.triangles.iter().all(|tri| tri.contains(&8)));
    }
}
