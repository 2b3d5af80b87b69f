use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{CaptureError, FrameSource};
use crate::image::{PixelFormat, RawImage};

/// Frame source repeating a single image loaded from disk
#[derive(Debug)]
pub struct StillImage {
    path: PathBuf,
    name: String,
    image: RawImage,
}

impl StillImage {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let path = path.as_ref().to_owned();

        let image = {
            let path = path.clone();
            tokio::task::spawn_blocking(move || -> Result<RawImage, CaptureError> {
                let decoded = ::image::open(&path)?.to_rgb8();
                let (width, height) = decoded.dimensions();
                Ok(RawImage::new(
                    decoded.into_raw(),
                    width,
                    height,
                    PixelFormat::Rgb,
                )?)
            })
            .await??
        };

        info!(path = %path.display(), width = image.width(), height = image.height(), "loaded still image");

        Ok(Self {
            name: format!("still({})", path.display()),
            path,
            image,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FrameSource for StillImage {
    async fn grab(&self) -> Result<RawImage, CaptureError> {
        Ok(self.image.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;

    #[tokio::test]
    async fn load_png() {
        let path = std::env::temp_dir().join(format!("lumistream-still-{}.png", std::process::id()));
        ::image::RgbImage::from_pixel(8, 4, ::image::Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let source = StillImage::open(&path).await.unwrap();
        let frame = source.grab().await.unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(frame.width(), 8);
        assert_eq!(frame.height(), 4);
        assert_eq!(frame.color_at(7, 3), Some(Color::new(10, 20, 30)));
    }

    #[tokio::test]
    async fn missing_file() {
        let result = StillImage::open("/nonexistent/lumistream.png").await;
        assert!(result.is_err());
    }
}
