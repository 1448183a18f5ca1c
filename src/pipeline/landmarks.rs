use super::detection::Face;
use super::model::{Session, initialize_model};
use crate::config::DetectorConfig;
use crate::shapes::point::PointF32;
use crate::shapes::rect::{Rect, RectF32};
use anyhow::{Result, anyhow, bail};
use image::RgbImage;
use image::imageops::{self, FilterType};
use ndarray::Array;
use ort::value::Tensor;
use tracing::{Level, debug, span};

const HEIGHT: u32 = 192;
const WIDTH: u32 = 192;

pub const MESH_POINTS: usize = 468;

pub struct FaceLandmarker {
    model: Session,
}

impl FaceLandmarker {
    pub fn new(config: &DetectorConfig) -> Result<FaceLandmarker> {
        Ok(FaceLandmarker {
            model: initialize_model(
                &config.models_dir,
                "mediapipe_face_landmark.onnx",
                config.threads,
            )?,
        })
    }

    pub fn run(&self, img: &RgbImage, face: &Face) -> Result<Vec<PointF32>> {
        let span = span!(Level::DEBUG, "face_landmarker");
        let _guard = span.enter();

        // pad 25% on each side
        let bounds = RectF32::from(face.bounds)
            .pad(1.5)
            .clip(img.width(), img.height())
            .ok_or_else(|| anyhow!("face {:?} lies outside the image", face.bounds))?;

        let face_img = imageops::crop_imm(img, bounds.x, bounds.y, bounds.w, bounds.h).to_image();
        let input_img = imageops::resize(&face_img, WIDTH, HEIGHT, FilterType::Triangle);

        let input_arr =
            Array::from_shape_fn((1, HEIGHT as usize, WIDTH as usize, 3), |(_, y, x, c)| {
                input_img.get_pixel(x as u32, y as u32)[c] as f32 / 255. // 0. - 1. range
            });

        let input = Tensor::from_array(input_arr)?;
        let outputs = self.model.run(ort::inputs!["input_1" => input]?)?;

        let output = outputs["conv2d_21"].try_extract_tensor::<f32>()?;
        let mesh = output
            .as_slice()
            .ok_or_else(|| anyhow!("landmark output is not contiguous"))?;

        let points = mesh_to_image(mesh, bounds)?;
        debug!("Extracted {} landmarks in {bounds:?}", points.len());

        Ok(points)
    }
}

// mesh values are (x, y, z) in model input pixels
fn mesh_to_image(mesh: &[f32], run_bounds: Rect) -> Result<Vec<PointF32>> {
    if mesh.len() < MESH_POINTS * 3 {
        bail!("Expected {} mesh values, got {}", MESH_POINTS * 3, mesh.len());
    }

    let x_scale = run_bounds.w as f32 / WIDTH as f32;
    let y_scale = run_bounds.h as f32 / HEIGHT as f32;
    let x_offset = run_bounds.left() as f32;
    let y_offset = run_bounds.top() as f32;

    Ok(mesh
        .chunks_exact(3)
        .take(MESH_POINTS)
        .map(|p| PointF32::new(x_offset + p[0] * x_scale, y_offset + p[1] * y_scale))
        .collect())
}
