use crate::error::{Result, SwapError};
use crate::face::{LandmarkSchema, LandmarkSet};
use crate::shapes::{PointF32, Pointi32, Polygon, Rect};
use crate::triangulate::triangulate;
use image::GrayImage;
use imageproc::geometry::convex_hull;
use imageproc::point::Point;
use tracing::{Level, debug, span};

/// Integer-pixel convex polygon around a landmark set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvexHull {
    polygon: Polygon,
}

impl ConvexHull {
    pub fn from_landmarks(landmarks: &LandmarkSet) -> Result<ConvexHull> {
        let pixels: Vec<Point<i32>> = landmarks.pixels().into_iter().map(Point::from).collect();
        let hull: Vec<Pointi32> = convex_hull(pixels.as_slice())
            .into_iter()
            .map(Pointi32::from)
            .collect();

        let polygon = Polygon::new(hull);
        if polygon.points.len() < 3 || polygon.signed_area2() == 0 {
            return Err(SwapError::DegenerateShape(format!(
                "hull has {} vertices and no area",
                polygon.points.len()
            )));
        }

        Ok(ConvexHull { polygon })
    }

    pub fn polygon(&self) -> &Polygon {
        &self.polygon
    }

    pub fn points(&self) -> &[Pointi32] {
        &self.polygon.points
    }

    pub fn bounds(&self, width: u32, height: u32) -> Option<Rect> {
        self.polygon.bounds(width, height)
    }

    /// Filled hull over a full `width`x`height` image.
    pub fn mask(&self, width: u32, height: u32) -> GrayImage {
        self.polygon.mask(Pointi32::new(0, 0), width, height)
    }
}

/// Delaunay triangles over landmark indices. Built once per source face and
/// applied by index to any landmark set of the same schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriangleTopology {
    schema: LandmarkSchema,
    triangles: Vec<[usize; 3]>,
}

impl TriangleTopology {
    pub fn build(landmarks: &LandmarkSet) -> Result<TriangleTopology> {
        let span = span!(Level::DEBUG, "build_topology");
        let _guard = span.enter();

        if landmarks.len() < 3 {
            return Err(SwapError::DegenerateShape(format!(
                "{} landmarks cannot form a triangle",
                landmarks.len()
            )));
        }

        let triangulation = triangulate(landmarks.points());
        if triangulation.triangles.is_empty() {
            return Err(SwapError::DegenerateShape(format!(
                "{} landmarks are collinear",
                triangulation.hull.len()
            )));
        }

        debug!(
            "Built {} triangles over {} landmarks, {} on the hull",
            triangulation.triangles.len(),
            landmarks.len(),
            triangulation.hull.len()
        );

        Ok(TriangleTopology {
            schema: landmarks.schema(),
            triangles: triangulation.triangles,
        })
    }

    pub fn schema(&self) -> LandmarkSchema {
        self.schema
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Fails unless every triangle index resolves in `landmarks`.
    pub fn validate(&self, landmarks: &LandmarkSet) -> Result<()> {
        if landmarks.schema() != self.schema {
            return Err(SwapError::MismatchedTopology(format!(
                "topology built for {}, landmarks are {}",
                self.schema,
                landmarks.schema()
            )));
        }

        if let Some(&max) = self.triangles.iter().flatten().max() {
            if max >= landmarks.len() {
                return Err(SwapError::MismatchedTopology(format!(
                    "index {max} out of range for {} landmarks",
                    landmarks.len()
                )));
            }
        }

        Ok(())
    }

    /// The three points of `triangle` in `landmarks`.
    pub fn resolve(triangle: &[usize; 3], landmarks: &LandmarkSet) -> Option<[PointF32; 3]> {
        Some([
            landmarks.get(triangle[0])?,
            landmarks.get(triangle[1])?,
            landmarks.get(triangle[2])?,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRID: LandmarkSchema = LandmarkSchema::new("grid", 9);

    fn grid(offset: f32) -> LandmarkSet {
        let mut points = Vec::new();
        for y in 0..3 {
            for x in 0..3 {
                // slight jitter keeps the cells from being cocircular
                let jitter = ((x * 3 + y) % 4) as f32 * 0.7;
                points.push(PointF32::new(
                    offset + x as f32 * 20. + jitter,
                    offset + y as f32 * 20. - jitter,
                ));
            }
        }
        LandmarkSet::new(GRID, points).unwrap()
    }

    #[test]
    fn test_topology_is_deterministic() -> anyhow::Result<()> {
        let a = TriangleTopology::build(&grid(10.))?;
        let b = TriangleTopology::build(&grid(10.))?;

        assert_eq!(a, b);
        assert_eq!(a.schema(), GRID);
        assert!(!a.is_empty());
        Ok(())
    }

    #[test]
    fn test_validate_rejects_other_schema() -> anyhow::Result<()> {
        let topology = TriangleTopology::build(&grid(10.))?;
        let other = LandmarkSet::new(
            LandmarkSchema::new("triangle", 3),
            vec![
                PointF32::new(0., 0.),
                PointF32::new(1., 0.),
                PointF32::new(0., 1.),
            ],
        )?;

        assert!(topology.validate(&grid(40.)).is_ok());
        assert!(matches!(
            topology.validate(&other),
            Err(SwapError::MismatchedTopology(_))
        ));
        Ok(())
    }

    #[test]
    fn test_collinear_landmarks_are_degenerate() -> anyhow::Result<()> {
        let line = LandmarkSet::new(
            LandmarkSchema::new("line", 4),
            (0..4).map(|i| PointF32::new(i as f32, i as f32 * 2.)).collect(),
        )?;

        match TriangleTopology::build(&line) {
            Err(SwapError::DegenerateShape(reason)) => {
                assert_eq!(reason, "4 landmarks are collinear")
            }
            other => panic!("expected a degenerate shape, got {other:?}"),
        }
        assert!(matches!(
            ConvexHull::from_landmarks(&line),
            Err(SwapError::DegenerateShape(_))
        ));
        Ok(())
    }

    #[test]
    fn test_hull_encloses_landmarks() {
        let landmarks = grid(10.);
        let hull = ConvexHull::from_landmarks(&landmarks).unwrap();
        let mask = hull.mask(80, 80);

        assert!(hull.points().len() >= 3);
        for p in landmarks.pixels() {
            assert!(hull.polygon().contains_point(p));
            assert_eq!(mask.get_pixel(p.x as u32, p.y as u32)[0], 255);
        }
        assert_eq!(mask.get_pixel(5, 5)[0], 0);
        assert_eq!(mask.get_pixel(70, 70)[0], 0);
    }

    #[test]
    fn test_resolve_points() -> anyhow::Result<()> {
        let landmarks = grid(0.);
        let topology = TriangleTopology::build(&landmarks)?;
        for tri in topology.triangles() {
            let pts = TriangleTopology::resolve(tri, &landmarks).unwrap();
            assert_eq!(pts[0], landmarks.points()[tri[0]]);
        }
        assert!(TriangleTopology::resolve(&[0, 1, 99], &landmarks).is_none());
        Ok(())
    }
}
