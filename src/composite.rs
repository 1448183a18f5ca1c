use crate::config::{BlendMode, SwapConfig};
use crate::shapes::polygon::MASK_ON;
use crate::topology::ConvexHull;
use crate::transform::WarpedTriangle;
use image::{GrayImage, RgbImage, imageops};
use imageproc::filter::median_filter;
use tracing::{Level, debug, span};

mod feather;
mod poisson;

pub use feather::feather_blend;
pub use poisson::seamless_clone;

/// Accumulates warped triangles into a destination-sized face canvas.
/// Overlapping pixels take the value of the triangle added last.
pub struct Compositor {
    canvas: RgbImage,
    coverage: GrayImage,
}

impl Compositor {
    pub fn new(width: u32, height: u32) -> Compositor {
        Compositor {
            canvas: RgbImage::new(width, height),
            coverage: GrayImage::new(width, height),
        }
    }

    pub fn add(&mut self, warped: &WarpedTriangle) {
        let (w, h) = self.canvas.dimensions();
        let origin = warped.placement;

        for (x, y, m) in warped.mask.enumerate_pixels() {
            if m[0] == 0 {
                continue;
            }
            let (cx, cy) = (origin.x + x, origin.y + y);
            if cx >= w || cy >= h {
                continue;
            }
            self.canvas.put_pixel(cx, cy, *warped.patch.get_pixel(x, y));
            self.coverage.put_pixel(cx, cy, MASK_ON);
        }
    }

    pub fn canvas(&self) -> &RgbImage {
        &self.canvas
    }

    pub fn coverage(&self) -> &GrayImage {
        &self.coverage
    }

    /// Cuts the canvas to `hull`, blends it into `destination` and
    /// smooths the seam. Pixels outside the hull keep their destination
    /// value.
    pub fn finish(
        self,
        destination: &RgbImage,
        hull: &ConvexHull,
        config: &SwapConfig,
    ) -> RgbImage {
        let span = span!(Level::DEBUG, "composite");
        let _guard = span.enter();

        let (w, h) = destination.dimensions();
        debug_assert_eq!((w, h), self.canvas.dimensions());

        let hull_mask = hull.mask(w, h);

        let mut merged = destination.clone();
        for (x, y, m) in hull_mask.enumerate_pixels() {
            if m[0] > 0 && self.coverage.get_pixel(x, y)[0] > 0 {
                merged.put_pixel(x, y, *self.canvas.get_pixel(x, y));
            }
        }

        let blended = match config.blend {
            BlendMode::Seamless { iterations } => {
                seamless_clone(destination, &merged, &hull_mask, iterations)
            }
            BlendMode::Feather { radius } => {
                feather_blend(destination, &merged, &hull_mask, &self.coverage, radius)
            }
            BlendMode::Paste => merged,
        };

        let smoothed = denoise(&blended, hull, config.denoise_radius);

        let mut out = destination.clone();
        for (x, y, m) in hull_mask.enumerate_pixels() {
            if m[0] > 0 {
                out.put_pixel(x, y, *smoothed.get_pixel(x, y));
            }
        }

        debug!("Composited {:?} blend into {w}x{h} frame", config.blend);
        out
    }
}

// Median filter over the hull's bounding box. Only hull pixels are read back.
fn denoise(img: &RgbImage, hull: &ConvexHull, radius: u32) -> RgbImage {
    if radius == 0 {
        return img.clone();
    }

    let Some(bounds) = hull.bounds(img.width(), img.height()) else {
        return img.clone();
    };

    let x = bounds.x.saturating_sub(radius);
    let y = bounds.y.saturating_sub(radius);
    let w = (bounds.right() + radius).min(img.width()) - x;
    let h = (bounds.bottom() + radius).min(img.height()) - y;

    let region = imageops::crop_imm(img, x, y, w, h).to_image();
    let filtered = median_filter(&region, radius, radius);

    let mut out = img.clone();
    imageops::replace(&mut out, &filtered, x as i64, y as i64);
    out
}
