use image::{GrayImage, Rgb, RgbImage};
use tracing::trace;

struct Stencil {
    at: usize,
    neighbours: [usize; 4],
    len: usize,
    // sum of guide gradients towards each neighbour
    guidance: [f32; 3],
}

/// Gradient-domain "normal clone": inside `mask` the result keeps the
/// gradients of `guide` while matching `destination` along the mask border.
/// Solved with Gauss-Seidel sweeps. Pixels outside the mask are copied from
/// `destination`.
pub fn seamless_clone(
    destination: &RgbImage,
    guide: &RgbImage,
    mask: &GrayImage,
    iterations: u32,
) -> RgbImage {
    let (w, h) = destination.dimensions();
    let idx = |x: u32, y: u32| (y * w + x) as usize;

    let g: Vec<[f32; 3]> = guide.pixels().map(|p| p.0.map(f32::from)).collect();
    let mut f: Vec<[f32; 3]> = destination
        .enumerate_pixels()
        .map(|(x, y, p)| {
            if mask.get_pixel(x, y)[0] > 0 {
                g[idx(x, y)]
            } else {
                p.0.map(f32::from)
            }
        })
        .collect();

    let stencils: Vec<Stencil> = mask
        .enumerate_pixels()
        .filter(|(_, _, m)| m[0] > 0)
        .map(|(x, y, _)| {
            let at = idx(x, y);
            let mut neighbours = [0; 4];
            let mut len = 0;

            let candidates = [
                (x > 0).then(|| idx(x - 1, y)),
                (x + 1 < w).then(|| idx(x + 1, y)),
                (y > 0).then(|| idx(x, y - 1)),
                (y + 1 < h).then(|| idx(x, y + 1)),
            ];
            for q in candidates.into_iter().flatten() {
                neighbours[len] = q;
                len += 1;
            }

            let mut guidance = [0.; 3];
            for &q in &neighbours[..len] {
                for c in 0..3 {
                    guidance[c] += g[at][c] - g[q][c];
                }
            }

            Stencil {
                at,
                neighbours,
                len,
                guidance,
            }
        })
        .collect();

    trace!("Solving {} pixels over {iterations} iterations", stencils.len());

    for _ in 0..iterations {
        for s in &stencils {
            if s.len == 0 {
                continue;
            }
            let mut sum = s.guidance;
            for &q in &s.neighbours[..s.len] {
                for c in 0..3 {
                    sum[c] += f[q][c];
                }
            }
            f[s.at] = sum.map(|v| v / s.len as f32);
        }
    }

    let mut out = destination.clone();
    for s in &stencils {
        let x = s.at as u32 % w;
        let y = s.at as u32 / w;
        out.put_pixel(x, y, Rgb(f[s.at].map(|v| v.round().clamp(0., 255.) as u8)));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::point::Pointi32;
    use crate::shapes::polygon::{MASK_ON, Polygon};

    fn square_mask(w: u32, h: u32, from: u32, to: u32) -> GrayImage {
        let square = Polygon::new(vec![
            Pointi32::new(from as i32, from as i32),
            Pointi32::new(to as i32, from as i32),
            Pointi32::new(to as i32, to as i32),
            Pointi32::new(from as i32, to as i32),
        ]);
        square.mask(Pointi32::new(0, 0), w, h)
    }

    #[test]
    fn test_flat_guide_converges_to_boundary() {
        let destination = RgbImage::from_pixel(20, 20, Rgb([100, 150, 200]));
        let guide = RgbImage::from_pixel(20, 20, Rgb([10, 10, 10]));
        let mask = square_mask(20, 20, 5, 14);

        let out = seamless_clone(&destination, &guide, &mask, 600);
        for (x, y, p) in out.enumerate_pixels() {
            for c in 0..3 {
                assert!(
                    p[c].abs_diff(destination.get_pixel(x, y)[c]) <= 2,
                    "{p:?} at {x},{y}"
                );
            }
        }
    }

    #[test]
    fn test_keeps_guide_detail() {
        let destination = RgbImage::from_pixel(24, 24, Rgb([50, 50, 50]));
        let guide = RgbImage::from_fn(24, 24, |x, y| {
            if (11..=12).contains(&x) && (11..=12).contains(&y) {
                Rgb([200, 0, 0])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let mask = square_mask(24, 24, 6, 17);
        assert_eq!(mask.get_pixel(10, 10), &MASK_ON);

        // the guide rides on top of the destination level
        let out = seamless_clone(&destination, &guide, &mask, 1000);
        assert!(out.get_pixel(11, 11)[0].abs_diff(250) <= 3);
        assert!(out.get_pixel(8, 8)[0].abs_diff(50) <= 3);
        assert!(out.get_pixel(11, 11)[1].abs_diff(50) <= 3);
    }

    #[test]
    fn test_outside_mask_untouched() {
        let destination = RgbImage::from_fn(16, 16, |x, y| Rgb([x as u8 * 9, y as u8 * 9, 7]));
        let guide = RgbImage::from_pixel(16, 16, Rgb([255, 0, 255]));
        let mask = square_mask(16, 16, 4, 10);

        let out = seamless_clone(&destination, &guide, &mask, 10);
        for (x, y, m) in mask.enumerate_pixels() {
            if m[0] == 0 {
                assert_eq!(out.get_pixel(x, y), destination.get_pixel(x, y));
            }
        }
    }
}
