use crate::error::{Result, SwapError};
use image::imageops::{self, FilterType};
use image::{ImageReader, RgbImage};
use std::path::Path;

pub type Frame = RgbImage;

/// Downscales `img` to `max_width`, keeping the aspect ratio. Narrower
/// images are returned as is.
pub fn fit_width(img: Frame, max_width: u32) -> Frame {
    if max_width == 0 || img.width() <= max_width {
        return img;
    }

    let height = (img.height() as f32 * max_width as f32 / img.width() as f32)
        .round()
        .max(1.) as u32;
    imageops::resize(&img, max_width, height, FilterType::Triangle)
}

pub fn load(path: &Path) -> Result<Frame> {
    let context = || format!("reading {}", path.display());

    let img = ImageReader::open(path)
        .map_err(|e| SwapError::io(context(), e))?
        .with_guessed_format()
        .map_err(|e| SwapError::io(context(), e))?
        .decode()
        .map_err(|e| SwapError::io(context(), e))?;

    Ok(img.into_rgb8())
}

pub fn save(img: &Frame, path: &Path) -> Result<()> {
    img.save(path)
        .map_err(|e| SwapError::io(format!("writing {}", path.display()), e))
}
