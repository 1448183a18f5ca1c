use super::point::{PointF32, Pointi32};

// top-left anchored, pixel units
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RectF32 {
    // centerpoint
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Rect {
        Rect { x, y, w, h }
    }

    pub fn left(&self) -> u32 {
        self.x
    }
    pub fn right(&self) -> u32 {
        self.x + self.w
    }
    pub fn top(&self) -> u32 {
        self.y
    }
    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }
    pub fn area(&self) -> u32 {
        self.w * self.h
    }

    pub fn origin(&self) -> Pointi32 {
        Pointi32::new(self.x as i32, self.y as i32)
    }

    /// Inclusive bounding box of `points` grown by `margin`, clipped to a
    /// `width`x`height` image. `None` when nothing of it lies on the image.
    pub fn bounding(points: &[Pointi32], margin: u32, width: u32, height: u32) -> Option<Rect> {
        if points.is_empty() || width == 0 || height == 0 {
            return None;
        }

        let margin = margin as i32;
        let min_x = points.iter().map(|p| p.x).min()? - margin;
        let max_x = points.iter().map(|p| p.x).max()? + margin;
        let min_y = points.iter().map(|p| p.y).min()? - margin;
        let max_y = points.iter().map(|p| p.y).max()? + margin;

        let left = min_x.max(0);
        let top = min_y.max(0);
        let right = max_x.min(width as i32 - 1);
        let bottom = max_y.min(height as i32 - 1);

        if left > right || top > bottom {
            return None;
        }

        Some(Rect {
            x: left as u32,
            y: top as u32,
            w: (right - left + 1) as u32,
            h: (bottom - top + 1) as u32,
        })
    }

    pub fn overlap_pct(&self, other: &Rect) -> f32 {
        let x_min = self.left().max(other.left());
        let x_max = self.right().min(other.right());
        let y_min = self.top().max(other.top());
        let y_max = self.bottom().min(other.bottom());

        let overlap_area = if x_min < x_max && y_min < y_max {
            (x_max - x_min) * (y_max - y_min)
        } else {
            0
        };

        let area_delta = self.area() + other.area() - overlap_area;

        if area_delta > 0 {
            overlap_area as f32 / area_delta as f32 * 100.
        } else {
            0.
        }
    }
}

impl RectF32 {
    pub fn from_center(xc: f32, yc: f32, w: f32, h: f32) -> RectF32 {
        RectF32 { x: xc, y: yc, w, h }
    }

    pub fn center(&self) -> PointF32 {
        PointF32::new(self.x, self.y)
    }

    /// Offsets the center and replaces the size.
    pub fn adjust(&mut self, dx: f32, dy: f32, w: f32, h: f32) -> RectF32 {
        self.x += dx;
        self.y += dy;
        self.w = w;
        self.h = h;

        *self
    }

    pub fn scale(&mut self, scale_x: f32, scale_y: f32) -> RectF32 {
        self.x *= scale_x;
        self.y *= scale_y;
        self.w *= scale_x;
        self.h *= scale_y;

        *self
    }

    /// Grow around the center, keeping the aspect ratio.
    pub fn pad(&mut self, mag: f32) -> RectF32 {
        self.w *= mag;
        self.h *= mag;

        *self
    }

    pub fn clip(&self, width: u32, height: u32) -> Option<Rect> {
        let corners = [
            Pointi32::new(
                (self.x - self.w / 2.).floor() as i32,
                (self.y - self.h / 2.).floor() as i32,
            ),
            Pointi32::new(
                (self.x + self.w / 2.).ceil() as i32 - 1,
                (self.y + self.h / 2.).ceil() as i32 - 1,
            ),
        ];
        Rect::bounding(&corners, 0, width, height)
    }
}

impl From<Rect> for RectF32 {
    fn from(r: Rect) -> RectF32 {
        RectF32::from_center(
            r.x as f32 + r.w as f32 / 2.,
            r.y as f32 + r.h as f32 / 2.,
            r.w as f32,
            r.h as f32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_is_inclusive() {
        let pts = [
            Pointi32::new(2, 3),
            Pointi32::new(5, 3),
            Pointi32::new(4, 7),
        ];
        let r = Rect::bounding(&pts, 0, 100, 100).unwrap();
        assert_eq!(r, Rect::new(2, 3, 4, 5));
    }

    #[test]
    fn test_bounding_clips_to_image() {
        let pts = [Pointi32::new(-4, 1), Pointi32::new(12, 6)];
        let r = Rect::bounding(&pts, 1, 10, 10).unwrap();
        assert_eq!(r, Rect::new(0, 0, 10, 8));

        let off_image = [Pointi32::new(-5, -5), Pointi32::new(-2, -1)];
        assert!(Rect::bounding(&off_image, 0, 10, 10).is_none());
    }

    #[test]
    fn test_overlap_pct() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 0, 10, 10);
        assert!((a.overlap_pct(&b) - 100. / 3.).abs() < 1e-3);
        assert_eq!(a.overlap_pct(&Rect::new(20, 20, 2, 2)), 0.);
    }

    #[test]
    fn test_padded_rect_clip() {
        let mut r = RectF32::from_center(10., 10., 4., 4.);
        let padded = r.pad(1.5);
        assert_eq!(padded.clip(20, 20).unwrap(), Rect::new(7, 7, 6, 6));
        // right and bottom edges stop at the last column and row
        assert_eq!(padded.clip(12, 12).unwrap(), Rect::new(7, 7, 5, 5));
    }
}
