//! Image transcoder port
//!
//! Produces the derived size variants of a photo. The pixel work lives in an
//! adapter; the pipeline only decides which variant goes where.

use std::path::Path;

use crate::domain::photo::ResizeSpec;

/// Port trait for resizing a source image into a variant file
#[async_trait::async_trait]
pub trait IImageTranscoder: Send + Sync {
    /// Writes a resized copy of `source` to `destination`
    ///
    /// `spec.fit` selects fit-to-box or center-crop-fill. The destination is
    /// always encoded as JPEG.
    async fn transcode(
        &self,
        source: &Path,
        destination: &Path,
        spec: ResizeSpec,
    ) -> anyhow::Result<()>;
}
