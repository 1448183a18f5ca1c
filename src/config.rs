use std::path::PathBuf;

/// How the new face is merged into the destination around the hull seam.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlendMode {
    /// Gradient-domain clone solved inside the hull, destination as boundary.
    Seamless { iterations: u32 },
    /// Mean color matching plus an alpha ramp of `radius` px towards the hull edge.
    Feather { radius: u32 },
    /// Straight copy of the new face.
    Paste,
}

impl Default for BlendMode {
    fn default() -> Self {
        BlendMode::Seamless { iterations: 100 }
    }
}

#[derive(Debug, Clone)]
pub struct SwapConfig {
    /// Triangles with a smaller area (px²) on either side are skipped.
    pub min_triangle_area: f32,
    pub blend: BlendMode,
    /// Median filter radius applied inside the hull. 0 disables.
    pub denoise_radius: u32,
    /// Fan per-triangle warps out over the rayon pool.
    pub parallel: bool,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            min_triangle_area: 0.5,
            blend: BlendMode::default(),
            denoise_radius: 1,
            parallel: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Defaults to the last camera reported by the backend.
    pub camera_index: Option<u32>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30,
            camera_index: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub models_dir: PathBuf,
    pub threads: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("./models"),
            threads: num_cpus::get().max(1),
        }
    }
}
