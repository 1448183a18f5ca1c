#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointF32 {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Pointi32 {
    pub x: i32,
    pub y: i32,
}

impl PointF32 {
    pub fn new(x: f32, y: f32) -> PointF32 {
        PointF32 { x, y }
    }

    pub fn scale(&self, s: f32) -> PointF32 {
        PointF32::new(self.x * s, self.y * s)
    }

    pub fn translate(&self, dx: f32, dy: f32) -> PointF32 {
        PointF32::new(self.x + dx, self.y + dy)
    }
}

impl Pointi32 {
    pub fn new(x: i32, y: i32) -> Pointi32 {
        Pointi32 { x, y }
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Pointi32 {
        Pointi32::new(self.x + dx, self.y + dy)
    }
}

impl From<PointF32> for Pointi32 {
    fn from(p: PointF32) -> Pointi32 {
        Pointi32 {
            x: p.x.round() as i32,
            y: p.y.round() as i32,
        }
    }
}

impl From<Pointi32> for PointF32 {
    fn from(p: Pointi32) -> PointF32 {
        PointF32 {
            x: p.x as f32,
            y: p.y as f32,
        }
    }
}

impl From<Pointi32> for imageproc::point::Point<i32> {
    fn from(p: Pointi32) -> Self {
        imageproc::point::Point::new(p.x, p.y)
    }
}

impl From<imageproc::point::Point<i32>> for Pointi32 {
    fn from(p: imageproc::point::Point<i32>) -> Self {
        Pointi32::new(p.x, p.y)
    }
}

/// Centroid of a triangle.
pub fn centroid(pts: &[PointF32; 3]) -> PointF32 {
    PointF32::new(
        (pts[0].x + pts[1].x + pts[2].x) / 3.,
        (pts[0].y + pts[1].y + pts[2].y) / 3.,
    )
}

/// Absolute area of a triangle.
pub fn triangle_area(pts: &[PointF32; 3]) -> f32 {
    let [a, b, c] = pts;
    ((b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)).abs() / 2.
}
