//! Image normalization: resize a profile photo to fixed dimensions as RGB JPEG.

use super::{
    CapabilityKind, CapabilityOutput, CapabilityProvider, CapabilityRequest, FailureKind,
    ProviderFailure,
};
use crate::config::ImageConfig;
use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

const NAME: &str = "image_normalize";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedImage {
    pub source: PathBuf,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

pub struct ImageNormalizeProvider {
    output_dir: Option<PathBuf>,
}

impl ImageNormalizeProvider {
    /// Without an output directory the normalized file lands beside the source.
    pub fn new(output_dir: Option<PathBuf>) -> Self {
        Self { output_dir }
    }

    pub fn from_config(config: &ImageConfig) -> Self {
        Self::new(config.output_dir.clone())
    }

    fn output_path(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("image");
        let file_name = format!("normalized_{}.jpg", stem);
        match &self.output_dir {
            Some(dir) => dir.join(file_name),
            None => source
                .parent()
                .map(|p| p.join(&file_name))
                .unwrap_or_else(|| PathBuf::from(&file_name)),
        }
    }

    /// Blocking; call from a blocking context.
    pub fn normalize(
        &self,
        source: &Path,
        width: u32,
        height: u32,
    ) -> Result<NormalizedImage, ProviderFailure> {
        if width == 0 || height == 0 {
            return Err(ProviderFailure::new(
                NAME,
                FailureKind::InvalidRequest,
                format!("invalid target dimensions {}x{}", width, height),
            ));
        }
        if !source.is_file() {
            return Err(ProviderFailure::new(
                NAME,
                FailureKind::NotFound,
                format!("image not found: {}", source.display()),
            ));
        }

        let img = image::open(source).map_err(|e| {
            ProviderFailure::new(
                NAME,
                FailureKind::InvalidRequest,
                format!("failed to decode {}: {}", source.display(), e),
            )
        })?;
        let resized = img.resize_exact(width, height, FilterType::Lanczos3);
        let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());

        let out = self.output_path(source);
        if let Some(parent) = out.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ProviderFailure::new(NAME, FailureKind::Unavailable, e.to_string())
                })?;
            }
        }
        rgb.save_with_format(&out, ImageFormat::Jpeg).map_err(|e| {
            ProviderFailure::new(
                NAME,
                FailureKind::Unavailable,
                format!("failed to write {}: {}", out.display(), e),
            )
        })?;
        debug!(source = %source.display(), output = %out.display(), width, height, "Normalized image");

        Ok(NormalizedImage {
            source: source.to_path_buf(),
            path: out,
            width,
            height,
        })
    }
}

#[async_trait]
impl CapabilityProvider for ImageNormalizeProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> CapabilityKind {
        CapabilityKind::ImageNormalize
    }

    fn description(&self) -> &str {
        "Resizes a profile image to the requested dimensions and returns the normalized file path."
    }

    async fn invoke(&self, request: CapabilityRequest) -> Result<CapabilityOutput, ProviderFailure> {
        match request {
            CapabilityRequest::ImageNormalize {
                path,
                width,
                height,
            } => {
                let worker = ImageNormalizeProvider::new(self.output_dir.clone());
                let image = tokio::task::spawn_blocking(move || worker.normalize(&path, width, height))
                    .await
                    .map_err(|e| {
                        ProviderFailure::new(NAME, FailureKind::Unavailable, e.to_string())
                    })??;
                Ok(CapabilityOutput::Image(image))
            }
            other => Err(ProviderFailure::wrong_request(NAME, &other)),
        }
    }
}
