use crate::config::DetectorConfig;
use crate::face::{FaceCandidate, LandmarkDetector, LandmarkSchema, LandmarkSet, select_primary};
use anyhow::Result;
use detection::FaceDetector;
use image::RgbImage;
use landmarks::{FaceLandmarker, MESH_POINTS};
use tracing::{Level, debug, span};

mod detection;
mod landmarks;
mod model;

pub use detection::Face;

pub const FACE_MESH: LandmarkSchema = LandmarkSchema::new("mediapipe-facemesh", MESH_POINTS);

/// Two stage ONNX landmark detector: face boxes first, then a dense
/// mesh regressed on the primary face.
pub struct MeshPipeline {
    face_detector: FaceDetector,
    face_landmarker: FaceLandmarker,
}

impl MeshPipeline {
    pub fn new(config: &DetectorConfig) -> Result<MeshPipeline> {
        Ok(MeshPipeline {
            face_detector: FaceDetector::new(config)?,
            face_landmarker: FaceLandmarker::new(config)?,
        })
    }

    pub fn faces(&self, img: &RgbImage) -> Result<Vec<Face>> {
        self.face_detector.run(img)
    }
}

impl LandmarkDetector for MeshPipeline {
    fn schema(&self) -> LandmarkSchema {
        FACE_MESH
    }

    fn detect(&self, image: &RgbImage) -> Result<Option<LandmarkSet>> {
        let span = span!(Level::DEBUG, "mesh_pipeline");
        let _guard = span.enter();

        let faces = self.faces(image)?;
        let count = faces.len();
        let Some(face) = select_primary(faces, |f| FaceCandidate {
            confidence: f.confidence,
            bounds: f.bounds,
        }) else {
            return Ok(None);
        };
        debug!("Using face at {:?} of {count}", face.bounds);

        let points = self.face_landmarker.run(image, &face)?;
        Ok(Some(LandmarkSet::new(FACE_MESH, points)?))
    }
}
