//! ImageTranscoder - resizes a source photo into one JPEG variant
//!
//! Sources are rotated upright from their EXIF orientation before scaling,
//! so derived variants never carry orientation metadata.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageReader};
use photolake_core::domain::{FitMode, ResizeSpec};
use photolake_core::ports::IImageTranscoder;
use tracing::{debug, instrument};

/// JPEG quality used for every derived variant
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Transcoder backed by the `image` crate
#[derive(Debug, Clone)]
pub struct ImageTranscoder {
    quality: u8,
    filter: FilterType,
}

impl ImageTranscoder {
    pub fn new() -> Self {
        Self {
            quality: DEFAULT_JPEG_QUALITY,
            filter: FilterType::Lanczos3,
        }
    }

    /// Overrides the JPEG quality (clamped to 1..=100)
    #[must_use]
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for ImageTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Scales `img` into the box described by `spec`
///
/// `Fit` only ever shrinks; a source already inside the box is kept as is.
/// `Fill` always yields exactly `width x height`, cropping the overflow.
fn resize(img: DynamicImage, spec: ResizeSpec, filter: FilterType) -> DynamicImage {
    match spec.fit {
        FitMode::Fit if img.width() <= spec.width && img.height() <= spec.height => img,
        FitMode::Fit => img.resize(spec.width, spec.height, filter),
        FitMode::Fill => img.resize_to_fill(spec.width, spec.height, filter),
    }
}

/// Decodes `source` and rotates it upright according to its EXIF orientation
fn decode_oriented(source: &Path) -> image::ImageResult<DynamicImage> {
    let mut decoder = ImageReader::open(source)?
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);
    Ok(img)
}

fn transcode_blocking(
    source: &Path,
    destination: &Path,
    spec: ResizeSpec,
    quality: u8,
    filter: FilterType,
) -> anyhow::Result<(u32, u32)> {
    let img = decode_oriented(source)
        .with_context(|| format!("Failed to decode {}", source.display()))?;
    let resized = resize(img, spec, filter);
    let rgb = resized.to_rgb8();

    let file = File::create(destination)
        .with_context(|| format!("Failed to create {}", destination.display()))?;
    let mut writer = BufWriter::new(file);
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, quality))
        .with_context(|| format!("Failed to encode {}", destination.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", destination.display()))?;
    Ok(rgb.dimensions())
}

#[async_trait::async_trait]
impl IImageTranscoder for ImageTranscoder {
    #[instrument(skip(self, spec), fields(width = spec.width, height = spec.height))]
    async fn transcode(
        &self,
        source: &Path,
        destination: &Path,
        spec: ResizeSpec,
    ) -> anyhow::Result<()> {
        let source: PathBuf = source.to_path_buf();
        let destination: PathBuf = destination.to_path_buf();
        let (quality, filter) = (self.quality, self.filter);

        let (width, height) = tokio::task::spawn_blocking(move || {
            transcode_blocking(&source, &destination, spec, quality, filter)
        })
        .await
        .context("Transcode task panicked")??;

        debug!(width, height, "variant written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use photolake_core::domain::PhotoSize;

    fn write_png(dir: &Path, width: u32, height: u32) -> PathBuf {
        let path = dir.join("source.png");
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128u8])
        });
        img.save(&path).unwrap();
        path
    }

    async fn transcode(size: PhotoSize, width: u32, height: u32) -> (u32, u32) {
        let dir = tempfile::tempdir().unwrap();
        let source = write_png(dir.path(), width, height);
        let destination = dir.path().join("out.jpg");

        ImageTranscoder::new()
            .transcode(&source, &destination, size.resize_spec().unwrap())
            .await
            .unwrap();

        let out = image::open(&destination).unwrap();
        assert_eq!(
            image::ImageFormat::from_path(&destination).unwrap(),
            image::ImageFormat::Jpeg
        );
        (out.width(), out.height())
    }

    #[tokio::test]
    async fn fit_preserves_aspect_ratio() {
        assert_eq!(transcode(PhotoSize::Thumbnail, 1000, 500).await, (250, 125));
    }

    #[tokio::test]
    async fn fill_produces_exact_box() {
        assert_eq!(
            transcode(PhotoSize::ThumbnailCropped, 1000, 500).await,
            (250, 250)
        );
    }

    #[tokio::test]
    async fn fit_never_upscales() {
        assert_eq!(transcode(PhotoSize::Small, 300, 200).await, (300, 200));
    }

    #[tokio::test]
    async fn undecodable_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("broken.jpg");
        std::fs::write(&source, b"\xFF\xD8\xFF\xE0 not really a jpeg").unwrap();

        let result = ImageTranscoder::new()
            .transcode(
                &source,
                &dir.path().join("out.jpg"),
                PhotoSize::Medium.resize_spec().unwrap(),
            )
            .await;
        assert!(result.is_err());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_png(dir.path(), 16, 16);

        let result = ImageTranscoder::new()
            .transcode(
                &source,
                Path::new("/dev/full"),
                PhotoSize::Thumbnail.resize_spec().unwrap(),
            )
            .await;
        let err = result.unwrap_err();
        assert!(format!("{err:#}").contains("/dev/full"));
    }

    #[test]
    fn quality_is_clamped() {
        assert_eq!(ImageTranscoder::new().with_quality(0).quality(), 1);
        assert_eq!(ImageTranscoder::new().with_quality(250).quality(), 100);
    }
}
