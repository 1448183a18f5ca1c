use crate::error::{Result, SwapError};
use crate::shapes::point::{PointF32, Pointi32};
use crate::shapes::rect::Rect;
use image::RgbImage;
use std::cmp::Ordering;
use std::fmt;

/// Identifies a landmark layout. Index `i` means the same anatomical
/// location in every set sharing a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LandmarkSchema {
    pub name: &'static str,
    pub len: usize,
}

impl LandmarkSchema {
    pub const fn new(name: &'static str, len: usize) -> Self {
        Self { name, len }
    }
}

impl fmt::Display for LandmarkSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.len)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    schema: LandmarkSchema,
    points: Vec<PointF32>,
}

impl LandmarkSet {
    pub fn new(schema: LandmarkSchema, points: Vec<PointF32>) -> Result<Self> {
        if points.len() != schema.len {
            return Err(SwapError::MismatchedTopology(format!(
                "{} expects {} points, got {}",
                schema.name,
                schema.len,
                points.len()
            )));
        }

        Ok(Self { schema, points })
    }

    pub fn schema(&self) -> LandmarkSchema {
        self.schema
    }

    pub fn points(&self) -> &[PointF32] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<PointF32> {
        self.points.get(idx).copied()
    }

    /// Points rounded to the pixel grid.
    pub fn pixels(&self) -> Vec<Pointi32> {
        self.points.iter().map(|&p| p.into()).collect()
    }

    /// Same schema, every point mapped through `f`.
    pub fn map(&self, f: impl Fn(PointF32) -> PointF32) -> LandmarkSet {
        LandmarkSet {
            schema: self.schema,
            points: self.points.iter().map(|&p| f(p)).collect(),
        }
    }
}

/// Anything able to turn an image into an ordered set of facial landmarks.
pub trait LandmarkDetector: Send + Sync {
    fn schema(&self) -> LandmarkSchema;

    /// `Ok(None)` when the image holds no face.
    fn detect(&self, image: &RgbImage) -> anyhow::Result<Option<LandmarkSet>>;
}

/// Ranking data for one detected face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceCandidate {
    pub confidence: f32,
    pub bounds: Rect,
}

impl FaceCandidate {
    // highest confidence first, then the box nearest the top, then the left
    fn rank(&self, other: &FaceCandidate) -> Ordering {
        other
            .confidence
            .total_cmp(&self.confidence)
            .then(self.bounds.top().cmp(&other.bounds.top()))
            .then(self.bounds.left().cmp(&other.bounds.left()))
    }
}

/// Picks the face a single-face swap operates on.
pub fn select_primary<T>(faces: Vec<T>, candidate: impl Fn(&T) -> FaceCandidate) -> Option<T> {
    faces
        .into_iter()
        .min_by(|a, b| candidate(a).rank(&candidate(b)))
}
