//! Frame sources
//!
//! Platform grabbers live outside of this crate: anything able to hand over a raw pixel
//! buffer can drive the pipeline by implementing [FrameSource].

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::image::{RawImage, RawImageError};
use crate::models::Capture;

mod pattern;
pub use pattern::*;

mod still;
pub use still::*;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decoding error: {0}")]
    Decode(#[from] ::image::ImageError),
    #[error("invalid frame: {0}")]
    RawImage(#[from] RawImageError),
    #[error("no new frame available")]
    NotReady,
    #[error("frame source closed")]
    Closed,
    #[error("capture task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl CaptureError {
    /// Transient failures only skip the current capture cycle
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CaptureError::NotReady | CaptureError::RawImage(_) | CaptureError::Join(_)
        )
    }
}

#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Grab the current screen contents
    async fn grab(&self) -> Result<RawImage, CaptureError>;

    fn name(&self) -> &str;
}

/// Open the frame source used by the daemon: a still image if a path is given, a test
/// pattern otherwise
pub async fn open_source(
    image: Option<&Path>,
    capture: &Capture,
) -> Result<Arc<dyn FrameSource>, CaptureError> {
    match image {
        Some(path) => Ok(Arc::new(StillImage::open(path).await?)),
        None => Ok(Arc::new(TestPattern::new(
            capture.screen_width,
            capture.screen_height,
        ))),
    }
}
