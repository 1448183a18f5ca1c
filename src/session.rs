use crate::composite::Compositor;
use crate::config::SwapConfig;
use crate::error::{ImageRole, Result, SwapError};
use crate::face::{LandmarkDetector, LandmarkSet};
use crate::topology::{ConvexHull, TriangleTopology};
use crate::transform::{WarpedTriangle, warp_triangle};
use image::{GrayImage, RgbImage};
use rayon::prelude::*;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{Level, debug, info, span, warn};

/// Everything derived from the source face. Built once per `set_source`,
/// never mutated afterwards.
#[derive(Debug)]
pub struct SourceProfile {
    pub image: RgbImage,
    pub landmarks: LandmarkSet,
    pub hull: ConvexHull,
    pub mask: GrayImage,
    pub topology: TriangleTopology,
}

impl SourceProfile {
    pub fn build(image: RgbImage, landmarks: LandmarkSet) -> Result<SourceProfile> {
        let topology = TriangleTopology::build(&landmarks)?;
        let hull = ConvexHull::from_landmarks(&landmarks)?;
        let mask = hull.mask(image.width(), image.height());

        Ok(SourceProfile {
            image,
            landmarks,
            hull,
            mask,
            topology,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unconfigured,
    Ready,
}

/// Swaps a cached source face onto every processed frame.
pub struct SwapSession {
    detector: Box<dyn LandmarkDetector>,
    config: SwapConfig,
    profile: RwLock<Option<Arc<SourceProfile>>>,
}

impl SwapSession {
    pub fn new(detector: Box<dyn LandmarkDetector>, config: SwapConfig) -> SwapSession {
        SwapSession {
            detector,
            config,
            profile: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &SwapConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        match self.profile() {
            Some(_) => SessionState::Ready,
            None => SessionState::Unconfigured,
        }
    }

    /// Snapshot of the current source profile.
    pub fn profile(&self) -> Option<Arc<SourceProfile>> {
        self.profile
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the source face. On failure the previous profile stays
    /// in place.
    pub fn set_source(&self, image: RgbImage) -> Result<()> {
        let span = span!(Level::DEBUG, "set_source");
        let _guard = span.enter();

        let landmarks = self
            .detector
            .detect(&image)
            .map_err(SwapError::Detector)?
            .ok_or(SwapError::NoFaceDetected(ImageRole::Source))?;

        let expected = self.detector.schema();
        if landmarks.schema() != expected {
            return Err(SwapError::MismatchedTopology(format!(
                "detector advertises {expected}, produced {}",
                landmarks.schema()
            )));
        }

        let profile = Arc::new(SourceProfile::build(image, landmarks)?);
        info!(
            "Source face ready: {} landmarks, {} triangles",
            profile.landmarks.len(),
            profile.topology.len()
        );

        *self.profile.write().unwrap_or_else(PoisonError::into_inner) = Some(profile);
        Ok(())
    }

    /// Drops the source face.
    pub fn clear(&self) {
        *self.profile.write().unwrap_or_else(PoisonError::into_inner) = None;
        debug!("Source face cleared");
    }

    /// Returns `frame` with the source face swapped onto its face, or an
    /// unchanged copy when `frame` shows no face.
    pub fn process(&self, frame: &RgbImage) -> Result<RgbImage> {
        let span = span!(Level::DEBUG, "process");
        let _guard = span.enter();

        let profile = self.profile().ok_or(SwapError::NotConfigured)?;

        let Some(landmarks) = self.detector.detect(frame).map_err(SwapError::Detector)? else {
            warn!("{}, passing frame through", SwapError::NoFaceDetected(ImageRole::Destination));
            return Ok(frame.clone());
        };

        profile.topology.validate(&landmarks)?;

        let hull = match ConvexHull::from_landmarks(&landmarks) {
            Ok(hull) => hull,
            Err(SwapError::DegenerateShape(reason)) => {
                warn!("Destination face is degenerate ({reason}), passing frame through");
                return Ok(frame.clone());
            }
            Err(e) => return Err(e),
        };

        let warped = self.warp_all(&profile, &landmarks, frame.width(), frame.height());

        let mut compositor = Compositor::new(frame.width(), frame.height());
        let mut drawn = 0;
        for triangle in warped.iter().flatten() {
            compositor.add(triangle);
            drawn += 1;
        }
        debug!("Warped {drawn}/{} triangles", warped.len());

        Ok(compositor.finish(frame, &hull, &self.config))
    }

    // One entry per topology triangle, in topology order
    fn warp_all(
        &self,
        profile: &SourceProfile,
        landmarks: &LandmarkSet,
        width: u32,
        height: u32,
    ) -> Vec<Option<WarpedTriangle>> {
        let span = span!(Level::DEBUG, "warp");
        let _guard = span.enter();

        let min_area = self.config.min_triangle_area;
        let warp = |triangle: &[usize; 3]| {
            let src = TriangleTopology::resolve(triangle, &profile.landmarks)?;
            let dst = TriangleTopology::resolve(triangle, landmarks)?;
            warp_triangle(&profile.image, &src, &dst, width, height, min_area)
        };

        let triangles = profile.topology.triangles();
        if self.config.parallel {
            triangles.par_iter().map(warp).collect()
        } else {
            triangles.iter().map(warp).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlendMode;
    use crate::face::LandmarkSchema;
    use crate::shapes::point::{PointF32, centroid};
    use image::Rgb;
    use std::collections::HashMap;

    const RING: LandmarkSchema = LandmarkSchema::new("ring", 9);

    // Faces keyed by image width, so each test image decides what is "seen"
    struct ScriptedDetector {
        faces: HashMap<u32, LandmarkSet>,
    }

    impl LandmarkDetector for ScriptedDetector {
        fn schema(&self) -> LandmarkSchema {
            RING
        }

        fn detect(&self, image: &RgbImage) -> anyhow::Result<Option<LandmarkSet>> {
            Ok(self.faces.get(&image.width()).cloned())
        }
    }

    fn ring(cx: f32, cy: f32, r: f32) -> LandmarkSet {
        let mut points: Vec<PointF32> = (0..8)
            .map(|i| {
                let theta = i as f32 * std::f32::consts::TAU / 8. + 0.1;
                PointF32::new(cx + r * theta.cos(), cy + r * 0.8 * theta.sin())
            })
            .collect();
        points.push(PointF32::new(cx + 1.3, cy - 0.7));
        LandmarkSet::new(RING, points).unwrap()
    }

    fn source_image() -> RgbImage {
        RgbImage::from_fn(100, 80, |x, y| Rgb([(x * 2) as u8, (y * 3) as u8, 200]))
    }

    fn frame() -> RgbImage {
        RgbImage::from_fn(120, 90, |x, y| Rgb([40, (x + y) as u8, (y * 2) as u8]))
    }

    fn session(config: SwapConfig) -> SwapSession {
        let mut faces = HashMap::new();
        faces.insert(100, ring(50., 40., 25.));
        faces.insert(120, ring(60., 45., 30.));
        faces.insert(
            130,
            LandmarkSet::new(
                LandmarkSchema::new("other", 3),
                vec![
                    PointF32::new(10., 10.),
                    PointF32::new(40., 10.),
                    PointF32::new(20., 40.),
                ],
            )
            .unwrap(),
        );
        SwapSession::new(Box::new(ScriptedDetector { faces }), config)
    }

    fn quick() -> SwapConfig {
        SwapConfig {
            blend: BlendMode::Seamless { iterations: 20 },
            ..Default::default()
        }
    }

    #[test]
    fn test_process_requires_source() {
        let session = session(quick());
        assert_eq!(session.state(), SessionState::Unconfigured);
        assert!(matches!(session.process(&frame()), Err(SwapError::NotConfigured)));
    }

    #[test]
    fn test_source_without_face_keeps_previous_profile() -> anyhow::Result<()> {
        let session = session(quick());

        let err = session.set_source(RgbImage::new(50, 50)).unwrap_err();
        assert!(matches!(err, SwapError::NoFaceDetected(ImageRole::Source)));
        assert_eq!(session.state(), SessionState::Unconfigured);

        session.set_source(source_image())?;
        let before = session.profile().unwrap();

        assert!(session.set_source(RgbImage::new(50, 50)).is_err());
        let after = session.profile().unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(session.state(), SessionState::Ready);
        Ok(())
    }

    #[test]
    fn test_frame_without_face_passes_through() -> anyhow::Result<()> {
        let session = session(quick());
        session.set_source(source_image())?;

        let empty = RgbImage::from_fn(77, 33, |x, y| Rgb([x as u8, y as u8, 9]));
        assert_eq!(session.process(&empty)?, empty);
        Ok(())
    }

    #[test]
    fn test_swap_keeps_dimensions_and_outside_pixels() -> anyhow::Result<()> {
        let session = session(quick());
        session.set_source(source_image())?;

        let input = frame();
        let out = session.process(&input)?;
        assert_eq!(out.dimensions(), input.dimensions());

        let hull = ConvexHull::from_landmarks(&ring(60., 45., 30.))?;
        let mask = hull.mask(input.width(), input.height());
        let mut changed = 0;
        for (x, y, m) in mask.enumerate_pixels() {
            if m[0] == 0 {
                assert_eq!(out.get_pixel(x, y), input.get_pixel(x, y));
            } else if out.get_pixel(x, y) != input.get_pixel(x, y) {
                changed += 1;
            }
        }
        assert!(changed > 0);
        Ok(())
    }

    fn octagon(cx: f32, cy: f32, r: f32) -> LandmarkSet {
        let mut points: Vec<PointF32> = (0..8)
            .map(|i| {
                let theta = i as f32 * std::f32::consts::TAU / 8.;
                PointF32::new(cx + r * theta.cos(), cy + r * theta.sin())
            })
            .collect();
        points.push(PointF32::new(cx, cy));
        LandmarkSet::new(RING, points).unwrap()
    }

    fn inside(tri: &[PointF32; 3], x: f32, y: f32) -> bool {
        let side = |a: PointF32, b: PointF32| (b.x - a.x) * (y - a.y) - (b.y - a.y) * (x - a.x);
        let d = [
            side(tri[0], tri[1]),
            side(tri[1], tri[2]),
            side(tri[2], tri[0]),
        ];
        d.iter().all(|v| *v >= 0.) || d.iter().all(|v| *v <= 0.)
    }

    #[test]
    fn test_scaled_translated_face_lands_on_centroids() -> anyhow::Result<()> {
        let (dx, dy) = (10., 5.);
        let source_face = octagon(25., 20., 15.);
        let frame_face = source_face.map(|p| p.scale(2.).translate(dx, dy));

        let topology = TriangleTopology::build(&source_face)?;
        assert_eq!(topology.len(), 8);

        let colors: Vec<Rgb<u8>> = (0..topology.len())
            .map(|i| Rgb([30 * (i as u8 + 1), 250 - 30 * i as u8, 60]))
            .collect();
        let triangles: Vec<[PointF32; 3]> = topology
            .triangles()
            .iter()
            .map(|t| TriangleTopology::resolve(t, &source_face).unwrap())
            .collect();
        let source = RgbImage::from_fn(100, 80, |x, y| {
            triangles
                .iter()
                .position(|tri| inside(tri, x as f32, y as f32))
                .map_or(Rgb([128, 128, 128]), |i| colors[i])
        });

        let mut faces = HashMap::new();
        faces.insert(100, source_face);
        faces.insert(120, frame_face);
        let session = SwapSession::new(
            Box::new(ScriptedDetector { faces }),
            SwapConfig {
                blend: BlendMode::Paste,
                denoise_radius: 0,
                ..Default::default()
            },
        );
        session.set_source(source)?;

        let input = RgbImage::from_pixel(120, 90, Rgb([0, 0, 0]));
        let out = session.process(&input)?;

        for (tri, color) in triangles.iter().zip(&colors) {
            let c = centroid(tri).scale(2.).translate(dx, dy);
            let px = out.get_pixel(c.x.round() as u32, c.y.round() as u32);
            for ch in 0..3 {
                assert!(
                    (px[ch] as i32 - color[ch] as i32).abs() <= 1,
                    "centroid {c:?}: {px:?} != {color:?}"
                );
            }
        }
        Ok(())
    }

    #[test]
    fn test_process_is_deterministic() -> anyhow::Result<()> {
        let session = session(quick());
        session.set_source(source_image())?;

        assert_eq!(session.process(&frame())?, session.process(&frame())?);
        Ok(())
    }

    #[test]
    fn test_parallel_matches_sequential() -> anyhow::Result<()> {
        let sequential = session(quick());
        let parallel = session(SwapConfig {
            parallel: true,
            ..quick()
        });
        sequential.set_source(source_image())?;
        parallel.set_source(source_image())?;

        assert_eq!(sequential.process(&frame())?, parallel.process(&frame())?);
        Ok(())
    }

    #[test]
    fn test_mismatched_schema() -> anyhow::Result<()> {
        let session = session(quick());
        session.set_source(source_image())?;

        let other = RgbImage::new(130, 60);
        assert!(matches!(
            session.process(&other),
            Err(SwapError::MismatchedTopology(_))
        ));
        assert!(matches!(
            session.set_source(other),
            Err(SwapError::MismatchedTopology(_))
        ));
        Ok(())
    }

    #[test]
    fn test_clear() -> anyhow::Result<()> {
        let session = session(quick());
        session.set_source(source_image())?;
        session.clear();

        assert_eq!(session.state(), SessionState::Unconfigured);
        assert!(matches!(session.process(&frame()), Err(SwapError::NotConfigured)));
        Ok(())
    }

    #[test]
    fn test_concurrent_source_swaps() -> anyhow::Result<()> {
        let session = session(SwapConfig {
            blend: BlendMode::Paste,
            ..Default::default()
        });
        session.set_source(source_image())?;

        let input = frame();
        std::thread::scope(|s| {
            s.spawn(|| {
                for _ in 0..5 {
                    session.set_source(source_image()).unwrap();
                }
            });
            for _ in 0..5 {
                let out = session.process(&input).unwrap();
                assert_eq!(out.dimensions(), input.dimensions());
            }
        });
        Ok(())
    }
}
