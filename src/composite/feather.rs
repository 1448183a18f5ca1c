use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::distance_transform::{Norm, distance_transform};

/// Shifts the covered pixels of `face` to the mean color of the destination
/// beneath them, then fades the result into `destination` over the last
/// `radius` pixels inside `mask`.
pub fn feather_blend(
    destination: &RgbImage,
    face: &RgbImage,
    mask: &GrayImage,
    coverage: &GrayImage,
    radius: u32,
) -> RgbImage {
    let shift = mean_shift(destination, face, mask, coverage);

    // distance of every pixel to the nearest pixel outside the mask
    let outside = GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        if mask.get_pixel(x, y)[0] > 0 {
            Luma([0])
        } else {
            Luma([255])
        }
    });
    let depth = distance_transform(&outside, Norm::L1);

    let mut out = destination.clone();
    for (x, y, m) in mask.enumerate_pixels() {
        if m[0] == 0 || coverage.get_pixel(x, y)[0] == 0 {
            continue;
        }

        let alpha = if radius == 0 {
            1.
        } else {
            (depth.get_pixel(x, y)[0] as f32 / radius as f32).min(1.)
        };

        let d = destination.get_pixel(x, y);
        let f = face.get_pixel(x, y);
        let mut px = [0u8; 3];
        for c in 0..3 {
            let matched = (f[c] as f32 + shift[c]).clamp(0., 255.);
            px[c] = (alpha * matched + (1. - alpha) * d[c] as f32).round() as u8;
        }
        out.put_pixel(x, y, Rgb(px));
    }

    out
}

fn mean_shift(
    destination: &RgbImage,
    face: &RgbImage,
    mask: &GrayImage,
    coverage: &GrayImage,
) -> [f32; 3] {
    let mut dest_sum = [0f64; 3];
    let mut face_sum = [0f64; 3];
    let mut n = 0u64;

    for (x, y, m) in mask.enumerate_pixels() {
        if m[0] == 0 || coverage.get_pixel(x, y)[0] == 0 {
            continue;
        }
        let d = destination.get_pixel(x, y);
        let f = face.get_pixel(x, y);
        for c in 0..3 {
            dest_sum[c] += d[c] as f64;
            face_sum[c] += f[c] as f64;
        }
        n += 1;
    }

    if n == 0 {
        return [0.; 3];
    }

    [0, 1, 2].map(|c| ((dest_sum[c] - face_sum[c]) / n as f64) as f32)
}
