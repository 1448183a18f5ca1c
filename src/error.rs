use std::fmt;
use thiserror::Error;

/// Which side of a swap an image belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    Source,
    Destination,
}

impl fmt::Display for ImageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageRole::Source => write!(f, "source"),
            ImageRole::Destination => write!(f, "destination"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SwapError {
    #[error("no face detected in {0} image")]
    NoFaceDetected(ImageRole),

    #[error("no source face configured")]
    NotConfigured,

    #[error("landmarks incompatible with cached topology: {0}")]
    MismatchedTopology(String),

    #[error("landmarks cannot be triangulated: {0}")]
    DegenerateShape(String),

    #[error("landmark detector failed")]
    Detector(#[source] anyhow::Error),

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: anyhow::Error,
    },
}

impl SwapError {
    pub fn io(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        SwapError::Io {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Recoverable conditions a caller may retry or route around.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SwapError::NoFaceDetected(_) | SwapError::Io { .. })
    }
}

pub type Result<T> = std::result::Result<T, SwapError>;
