use crate::shapes::point::{PointF32, Pointi32, triangle_area};
use crate::shapes::{Polygon, Rect};
use image::{GrayImage, Rgb, RgbImage, imageops};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::trace;

/// Source texture for one destination triangle. `patch` and `mask` share
/// the size of `placement`, which is in destination pixel coordinates.
#[derive(Debug, Clone)]
pub struct WarpedTriangle {
    pub patch: RgbImage,
    pub mask: GrayImage,
    pub placement: Rect,
}

/// 2x3 affine map: x' = a*x + b*y + c, y' = d*x + e*y + f
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub m: [f32; 6],
}

impl Affine {
    /// The unique map taking each `src` vertex onto the matching `dst` vertex.
    /// `None` for a collinear `src`.
    pub fn from_triangles(src: &[PointF32; 3], dst: &[PointF32; 3]) -> Option<Affine> {
        let rows = src.map(|p| [p.x, p.y, 1.]);
        let det = det3(rows);
        if det.abs() < f32::EPSILON {
            return None;
        }

        // Cramer's rule, once per output coordinate
        let solve = |out: [f32; 3]| -> [f32; 3] {
            let mut coef = [0.; 3];
            for (col, c) in coef.iter_mut().enumerate() {
                let mut replaced = rows;
                for (row, v) in replaced.iter_mut().zip(out) {
                    row[col] = v;
                }
                *c = det3(replaced) / det;
            }
            coef
        };

        let [a, b, c] = solve(dst.map(|p| p.x));
        let [d, e, f] = solve(dst.map(|p| p.y));

        Some(Affine {
            m: [a, b, c, d, e, f],
        })
    }

    pub fn apply(&self, p: PointF32) -> PointF32 {
        let [a, b, c, d, e, f] = self.m;
        PointF32::new(a * p.x + b * p.y + c, d * p.x + e * p.y + f)
    }

    fn projection(&self) -> Option<Projection> {
        let [a, b, c, d, e, f] = self.m;
        Projection::from_matrix([a, b, c, d, e, f, 0., 0., 1.])
    }
}

fn det3(m: [[f32; 3]; 3]) -> f32 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Maps the texture under `src` in `source` onto the `dst` triangle of a
/// `dest_width`x`dest_height` image. Triangles smaller than `min_area` on
/// either side, or entirely off either image, contribute nothing.
pub fn warp_triangle(
    source: &RgbImage,
    src: &[PointF32; 3],
    dst: &[PointF32; 3],
    dest_width: u32,
    dest_height: u32,
    min_area: f32,
) -> Option<WarpedTriangle> {
    if triangle_area(src) < min_area || triangle_area(dst) < min_area {
        trace!("Skipping degenerate triangle {src:?} -> {dst:?}");
        return None;
    }

    let src_px = src.map(Pointi32::from);
    let dst_px = dst.map(Pointi32::from);

    // bilinear sampling reads one pixel right/below, keep it inside the crop
    let src_rect = Rect::bounding(&src_px, 1, source.width(), source.height())?;
    let dst_rect = Rect::bounding(&dst_px, 0, dest_width, dest_height)?;

    let crop =
        imageops::crop_imm(source, src_rect.x, src_rect.y, src_rect.w, src_rect.h).to_image();

    let src_origin = PointF32::from(src_rect.origin());
    let dst_origin = PointF32::from(dst_rect.origin());
    let src_local = src.map(|p| p.translate(-src_origin.x, -src_origin.y));
    let dst_local = dst.map(|p| p.translate(-dst_origin.x, -dst_origin.y));

    let projection = Affine::from_triangles(&src_local, &dst_local)?.projection()?;

    let mut patch = RgbImage::new(dst_rect.w, dst_rect.h);
    warp_into(&crop, &projection, Interpolation::Bilinear, Rgb([0, 0, 0]), &mut patch);

    let mask = Polygon::new(dst_px.to_vec()).mask(dst_rect.origin(), dst_rect.w, dst_rect.h);
    for (px, m) in patch.pixels_mut().zip(mask.pixels()) {
        if m[0] == 0 {
            *px = Rgb([0, 0, 0]);
        }
    }

    Some(WarpedTriangle {
        patch,
        mask,
        placement: dst_rect,
    })
}
