pub mod composite;
pub mod config;
pub mod error;
pub mod face;
pub mod frame;
pub mod pipeline;
pub mod session;
pub mod shapes;
pub mod topology;
pub mod transform;
pub mod triangulate;
pub mod video;

pub use config::{BlendMode, CaptureConfig, DetectorConfig, SwapConfig};
pub use error::{ImageRole, SwapError};
pub use face::{LandmarkDetector, LandmarkSchema, LandmarkSet};
pub use session::{SessionState, SourceProfile, SwapSession};
