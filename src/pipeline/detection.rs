use super::model::{Session, initialize_model};
use crate::config::DetectorConfig;
use crate::shapes::rect::{Rect, RectF32};
use anchors::{NUM_ANCHORS, gen_anchors};
use anyhow::{Result, anyhow, bail};
use image::RgbImage;
use image::imageops::{self, FilterType};
use ndarray::Array;
use ort::value::Tensor;
use tracing::{Level, span, trace};

mod anchors;

const WIDTH: u32 = 128;
const HEIGHT: u32 = 128;
// box, then six (x, y) keypoints we have no use for
const REGRESSOR_LEN: usize = 16;
const MIN_SCORE: f32 = 0.5;
const MAX_OVERLAP_PCT: f32 = 30.;

pub struct FaceDetector {
    model: Session,
    anchors: Vec<RectF32>,
}

#[derive(Debug, Clone)]
pub struct Face {
    pub bounds: Rect,
    pub confidence: f32,
}

impl FaceDetector {
    /*
    BlazeFace (short range) wrapper.

    Model Input: 1x128x128x3 f32 image in [-1, 1]
    Model Output:
    - classificators: 896 raw scores, one per anchor
    - regressors: 896x16 offsets. The first 4 are center x/y offsets
      from the anchor and box width/height, in input pixels. The
      remaining 12 are keypoints (eyes, nose, mouth, ears).
     */
    pub fn new(config: &DetectorConfig) -> Result<FaceDetector> {
        Ok(FaceDetector {
            model: initialize_model(
                &config.models_dir,
                "mediapipe_face_detection_short_range.onnx",
                config.threads,
            )?,
            anchors: gen_anchors(),
        })
    }

    pub fn run(&self, img: &RgbImage) -> Result<Vec<Face>> {
        let span = span!(Level::DEBUG, "face_detector");
        let _guard = span.enter();

        let input_img = imageops::resize(img, WIDTH, HEIGHT, FilterType::Triangle);
        let input_arr =
            Array::from_shape_fn((1, HEIGHT as usize, WIDTH as usize, 3), |(_, y, x, c)| {
                input_img.get_pixel(x as u32, y as u32)[c] as f32 / 127.5 - 1. // -1. - 1. range
            });

        let input = Tensor::from_array(input_arr)?;
        let outputs = self.model.run(ort::inputs!["input" => input]?)?;

        let regressors = outputs["regressors"].try_extract_tensor::<f32>()?;
        let classificators = outputs["classificators"].try_extract_tensor::<f32>()?;

        let scores = classificators
            .as_slice()
            .ok_or_else(|| anyhow!("classificators are not contiguous"))?;
        let regressors = regressors
            .as_slice()
            .ok_or_else(|| anyhow!("regressors are not contiguous"))?;

        decode(scores, regressors, &self.anchors, img.width(), img.height())
    }
}

fn decode(
    scores: &[f32],
    regressors: &[f32],
    anchors: &[RectF32],
    img_width: u32,
    img_height: u32,
) -> Result<Vec<Face>> {
    if scores.len() < NUM_ANCHORS || regressors.len() < NUM_ANCHORS * REGRESSOR_LEN {
        bail!(
            "Unexpected detector output: {} scores, {} regressors",
            scores.len(),
            regressors.len()
        );
    }

    let x_scale = img_width as f32;
    let y_scale = img_height as f32;
    let mut results: Vec<Face> = Vec::new();

    for (row_idx, res) in regressors.chunks_exact(REGRESSOR_LEN).take(NUM_ANCHORS).enumerate() {
        let score = sigmoid_stable(scores[row_idx]);
        if score <= MIN_SCORE {
            continue;
        }

        let mut anchor = anchors[row_idx];
        let Some(bounds) = anchor
            .adjust(
                res[0] / WIDTH as f32,
                res[1] / HEIGHT as f32,
                res[2] / WIDTH as f32,
                res[3] / HEIGHT as f32,
            )
            .scale(x_scale, y_scale)
            .clip(img_width, img_height)
        else {
            continue;
        };

        let mut better_found = false;
        for (i, d) in results.iter().enumerate() {
            if d.bounds.overlap_pct(&bounds) > MAX_OVERLAP_PCT {
                if d.confidence >= score {
                    better_found = true;
                } else {
                    results.swap_remove(i);
                }
                break;
            }
        }

        if !better_found {
            results.push(Face {
                bounds,
                confidence: score,
            });
        }
    }

    trace!("Detected {} faces", results.len());

    Ok(results)
}

fn sigmoid_stable(x: f32) -> f32 {
    if x >= 0. {
        1. / (1. + (-x).exp())
    } else {
        x.exp() / (1. + x.exp())
    }
}
