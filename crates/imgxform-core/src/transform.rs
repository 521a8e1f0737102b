//! The transform orchestrator: sniff, decode, plan, resize, encode.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::task;

use crate::config::TransformConfig;
use crate::error::TransformError;
use crate::format::{ImageFormat, Quality};
use crate::plan::{plan, SizeRequest};
use crate::registry::{BuiltinCodecs, CodecLoader, CodecRegistry};
use crate::sniff;

/// Encoded source bytes of unknown format.
///
/// Cloning is cheap; the underlying buffer is reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage(Bytes);

impl RawImage {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn bytes(&self) -> &Bytes {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The format sniffed from the leading bytes.
    pub fn format(&self) -> Result<ImageFormat, TransformError> {
        sniff::detect(&self.0)
    }
}

impl From<Vec<u8>> for RawImage {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl From<Bytes> for RawImage {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

/// What a caller wants done to an image.
///
/// All fields are optional. With no size and no format the source bytes are
/// returned untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransformOptions {
    #[serde(flatten)]
    pub size: SizeRequest,
    pub format: Option<ImageFormat>,
    pub quality: Option<Quality>,
}

impl TransformOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target width; zero means "not requested".
    pub fn width(mut self, width: u32) -> Self {
        self.size = SizeRequest::new(Some(width), self.size.height.map(|h| h.get()));
        self
    }

    /// Target height; zero means "not requested".
    pub fn height(mut self, height: u32) -> Self {
        self.size = SizeRequest::new(self.size.width.map(|w| w.get()), Some(height));
        self
    }

    pub fn format(mut self, format: ImageFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn quality(mut self, quality: impl Into<Quality>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    /// Check whether the options ask for nothing at all.
    pub fn is_pass_through(&self) -> bool {
        self.size.is_empty() && self.format.is_none()
    }
}

/// Runs transforms against a shared [`CodecRegistry`].
///
/// Cheap to clone; clones share the registry, so codecs initialized by one
/// request are reused by every other.
pub struct Transformer<L: CodecLoader = BuiltinCodecs> {
    registry: Arc<CodecRegistry<L>>,
    config: TransformConfig,
}

impl<L: CodecLoader> Clone for Transformer<L> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
        }
    }
}

impl Transformer<BuiltinCodecs> {
    /// Transformer backed by the built-in codecs.
    pub fn new(config: TransformConfig) -> Self {
        let registry = CodecRegistry::builtin(config.clone());
        Self::with_registry(Arc::new(registry), config)
    }
}

impl Default for Transformer<BuiltinCodecs> {
    fn default() -> Self {
        Self::new(TransformConfig::default())
    }
}

impl<L: CodecLoader> Transformer<L> {
    pub fn with_registry(registry: Arc<CodecRegistry<L>>, config: TransformConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &CodecRegistry<L> {
        &self.registry
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Transform `raw` according to `options`.
    ///
    /// Returns the source bytes unchanged when nothing is requested.
    /// Otherwise the source is decoded, resized if a width or height is
    /// present, and re-encoded as `options.format` (or the source format).
    /// Quality only reaches lossy encoders.
    ///
    /// # Errors
    ///
    /// Any stage failure aborts the call; see [`TransformError`].
    pub async fn transform(
        &self,
        raw: &RawImage,
        options: &TransformOptions,
    ) -> Result<Bytes, TransformError> {
        if options.is_pass_through() {
            log::debug!("Nothing requested, passing {} bytes through", raw.len());
            return Ok(raw.bytes().clone());
        }

        let source_format = raw.format()?;
        let decoder = self.registry.decoder(source_format).await?;

        let bytes = raw.bytes().clone();
        let mut buffer = task::spawn_blocking(move || decoder.decode(&bytes))
            .await
            .map_err(|e| TransformError::decode(source_format, e))??;
        let source_dims = buffer.dimensions();
        log::debug!(
            "Decoded {source_format} source: {}x{}",
            source_dims.width,
            source_dims.height
        );

        if !options.size.is_empty() {
            let target = plan(source_dims, &options.size)?;
            let limit = self.config.max_source_pixels;
            if target.pixel_count() > limit {
                return Err(TransformError::TargetTooLarge {
                    pixels: target.pixel_count(),
                    limit,
                });
            }
            let resizer = self.registry.resizer().await?;
            buffer = task::spawn_blocking(move || resizer.resize(&buffer, target))
                .await
                .map_err(|e| TransformError::ResizeFailure(e.to_string()))??;
        }

        let output_format = options.format.unwrap_or(source_format);
        let quality = output_format
            .is_lossy()
            .then(|| options.quality.unwrap_or(self.config.default_quality));
        let encoder = self.registry.encoder(output_format).await?;

        let output_dims = buffer.dimensions();
        let encoded = task::spawn_blocking(move || encoder.encode(&buffer, quality))
            .await
            .map_err(|e| TransformError::encode(output_format, e))??;

        log::info!(
            "Transformed {source_format} {}x{} -> {output_format} {}x{} ({} -> {} bytes)",
            source_dims.width,
            source_dims.height,
            output_dims.width,
            output_dims.height,
            raw.len(),
            encoded.len()
        );

        Ok(Bytes::from(encoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::test_images::gradient;
    use crate::codec::{decoder_for, encoder_for};
    use crate::error::Capability;
    use crate::registry::test_loader::CountingLoader;
    use crate::registry::SlotState;
    use crate::types::Dimensions;

    fn source(format: ImageFormat, width: u32, height: u32) -> RawImage {
        let quality = format.is_lossy().then_some(Quality::new(95));
        RawImage::from(
            encoder_for(format)
                .encode(&gradient(width, height), quality)
                .unwrap(),
        )
    }

    fn decoded_dimensions(bytes: &[u8]) -> (ImageFormat, Dimensions) {
        let format = sniff::detect(bytes).unwrap();
        let buffer = decoder_for(format, &TransformConfig::default())
            .decode(bytes)
            .unwrap();
        (format, buffer.dimensions())
    }

    #[tokio::test]
    async fn test_pass_through_returns_source_bytes() {
        let transformer = Transformer::default();
        let raw = source(ImageFormat::Png, 20, 10);

        let out = transformer
            .transform(&raw, &TransformOptions::new())
            .await
            .unwrap();
        assert_eq!(&out, raw.bytes());
        // Same allocation, not a copy
        assert_eq!(out.as_ptr(), raw.bytes().as_ptr());
    }

    #[tokio::test]
    async fn test_pass_through_skips_sniffing() {
        let transformer = Transformer::default();
        let raw = RawImage::new(vec![0u8; 32]);

        let out = transformer
            .transform(&raw, &TransformOptions::new())
            .await
            .unwrap();
        assert_eq!(&out, raw.bytes());
    }

    #[tokio::test]
    async fn test_pass_through_with_zero_hints() {
        let transformer = Transformer::default();
        let raw = source(ImageFormat::Jpeg, 20, 10);

        let options = TransformOptions::new().width(0).height(0);
        let out = transformer.transform(&raw, &options).await.unwrap();
        assert_eq!(&out, raw.bytes());
    }

    #[tokio::test]
    async fn test_unknown_bytes_rejected() {
        let transformer = Transformer::default();
        let raw = RawImage::new(vec![0u8; 64]);

        let result = transformer
            .transform(&raw, &TransformOptions::new().format(ImageFormat::Png))
            .await;
        assert_eq!(result, Err(TransformError::UnsupportedFormat));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_jpeg_to_webp_with_explicit_size() {
        let transformer = Transformer::default();
        let raw = source(ImageFormat::Jpeg, 640, 480);

        let options = TransformOptions::new()
            .width(300)
            .height(171)
            .format(ImageFormat::WebP)
            .quality(80);
        let out = transformer.transform(&raw, &options).await.unwrap();

        assert_eq!(
            decoded_dimensions(&out),
            (ImageFormat::WebP, Dimensions::new(300, 171))
        );
    }

    #[tokio::test]
    async fn test_width_only_keeps_aspect_ratio() {
        let transformer = Transformer::default();
        let raw = source(ImageFormat::Png, 300, 171);

        let out = transformer
            .transform(&raw, &TransformOptions::new().width(150))
            .await
            .unwrap();
        assert_eq!(
            decoded_dimensions(&out),
            (ImageFormat::Png, Dimensions::new(150, 86))
        );
    }

    #[tokio::test]
    async fn test_height_only_keeps_aspect_ratio() {
        let transformer = Transformer::default();
        let raw = source(ImageFormat::WebP, 300, 342);

        let out = transformer
            .transform(&raw, &TransformOptions::new().height(171))
            .await
            .unwrap();
        assert_eq!(
            decoded_dimensions(&out),
            (ImageFormat::WebP, Dimensions::new(150, 171))
        );
    }

    #[tokio::test]
    async fn test_format_only_reencodes_without_resizing() {
        let registry = Arc::new(CodecRegistry::with_loader(CountingLoader::default()));
        let transformer = Transformer::with_registry(registry, TransformConfig::default());
        let raw = source(ImageFormat::Png, 40, 30);

        let out = transformer
            .transform(&raw, &TransformOptions::new().format(ImageFormat::Jpeg))
            .await
            .unwrap();
        assert_eq!(
            decoded_dimensions(&out),
            (ImageFormat::Jpeg, Dimensions::new(40, 30))
        );

        let registry = transformer.registry();
        assert_eq!(registry.loader().calls(Capability::Resize), 0);
        assert_eq!(
            registry.slot_state(Capability::Resize),
            SlotState::Uninitialized
        );
    }

    #[tokio::test]
    async fn test_png_output_ignores_quality() {
        let transformer = Transformer::default();
        let raw = source(ImageFormat::Jpeg, 64, 48);

        let base = TransformOptions::new().width(32).format(ImageFormat::Png);
        let low = transformer.transform(&raw, &base.quality(1)).await.unwrap();
        let high = transformer.transform(&raw, &base.quality(100)).await.unwrap();
        let none = transformer.transform(&raw, &base).await.unwrap();

        assert_eq!(low, high);
        assert_eq!(low, none);
    }

    #[tokio::test]
    async fn test_default_quality_comes_from_config() {
        let raw = source(ImageFormat::Png, 64, 64);
        let options = TransformOptions::new().format(ImageFormat::Jpeg);

        let configured = Transformer::new(TransformConfig {
            default_quality: Quality::new(20),
            ..TransformConfig::default()
        });
        let implicit = configured.transform(&raw, &options).await.unwrap();
        let explicit = Transformer::default()
            .transform(&raw, &options.quality(20))
            .await
            .unwrap();

        assert_eq!(implicit, explicit);
    }

    #[tokio::test]
    async fn test_oversized_source_rejected() {
        let transformer = Transformer::new(TransformConfig {
            max_source_pixels: 1_000,
            ..TransformConfig::default()
        });
        let raw = source(ImageFormat::Png, 50, 50);

        let result = transformer
            .transform(&raw, &TransformOptions::new().width(10))
            .await;
        assert_eq!(
            result,
            Err(TransformError::SourceTooLarge {
                pixels: 2_500,
                limit: 1_000
            })
        );
    }

    #[tokio::test]
    async fn test_oversized_target_rejected_before_resizing() {
        let registry = Arc::new(CodecRegistry::with_loader(CountingLoader::default()));
        let transformer = Transformer::with_registry(registry, TransformConfig::default());
        let raw = source(ImageFormat::Png, 1, 1000);

        // 5,000,000 / 1 * 1000 saturates the derived height at u32::MAX
        let result = transformer
            .transform(&raw, &TransformOptions::new().width(5_000_000))
            .await;
        assert_eq!(
            result,
            Err(TransformError::TargetTooLarge {
                pixels: 5_000_000 * u32::MAX as u64,
                limit: 40_000_000,
            })
        );
        assert_eq!(transformer.registry().loader().calls(Capability::Resize), 0);
    }

    #[tokio::test]
    async fn test_target_at_limit_is_accepted() {
        let transformer = Transformer::new(TransformConfig {
            max_source_pixels: 400,
            ..TransformConfig::default()
        });
        let raw = source(ImageFormat::Png, 10, 10);

        let out = transformer
            .transform(&raw, &TransformOptions::new().width(20).height(20))
            .await
            .unwrap();
        assert_eq!(
            decoded_dimensions(&out),
            (ImageFormat::Png, Dimensions::new(20, 20))
        );

        let result = transformer
            .transform(&raw, &TransformOptions::new().width(21).height(20))
            .await;
        assert_eq!(
            result,
            Err(TransformError::TargetTooLarge {
                pixels: 420,
                limit: 400
            })
        );
    }

    #[tokio::test]
    async fn test_codec_failure_is_retryable() {
        let capability = Capability::Encode(ImageFormat::WebP);
        let registry = Arc::new(CodecRegistry::with_loader(CountingLoader::failing(&[
            capability,
        ])));
        let transformer = Transformer::with_registry(registry, TransformConfig::default());
        let raw = source(ImageFormat::Png, 16, 16);
        let options = TransformOptions::new().format(ImageFormat::WebP);

        let err = transformer.transform(&raw, &options).await.unwrap_err();
        assert!(matches!(
            err,
            TransformError::CodecUnavailable { capability: c, .. } if c == capability
        ));
        assert!(err.is_retryable());

        transformer.registry().loader().recover();
        let out = transformer.transform(&raw, &options).await.unwrap();
        assert_eq!(sniff::detect(&out), Ok(ImageFormat::WebP));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_transforms_share_codecs() {
        let registry = Arc::new(CodecRegistry::with_loader(CountingLoader::default()));
        let transformer = Transformer::with_registry(registry, TransformConfig::default());
        let raw = source(ImageFormat::Jpeg, 64, 64);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let transformer = transformer.clone();
                let raw = raw.clone();
                tokio::spawn(async move {
                    let options = TransformOptions::new().width(32).format(ImageFormat::Png);
                    transformer.transform(&raw, &options).await
                })
            })
            .collect();

        for task in tasks {
            let out = task.await.unwrap().unwrap();
            assert_eq!(
                decoded_dimensions(&out),
                (ImageFormat::Png, Dimensions::new(32, 32))
            );
        }

        let loader = transformer.registry().loader();
        assert_eq!(loader.calls(Capability::Decode(ImageFormat::Jpeg)), 1);
        assert_eq!(loader.calls(Capability::Resize), 1);
        assert_eq!(loader.calls(Capability::Encode(ImageFormat::Png)), 1);
        assert_eq!(loader.total_calls(), 3);
    }

    #[test]
    fn test_raw_image_format_is_sniffed() {
        assert_eq!(source(ImageFormat::Jpeg, 8, 8).format(), Ok(ImageFormat::Jpeg));
        assert_eq!(
            RawImage::new(&b"not an image"[..]).format(),
            Err(TransformError::UnsupportedFormat)
        );
    }

    #[test]
    fn test_options_deserialize_flat() {
        let options: TransformOptions =
            serde_json::from_str(r#"{"width": 300, "format": "jpg", "quality": 80}"#).unwrap();
        assert_eq!(
            options,
            TransformOptions::new()
                .width(300)
                .format(ImageFormat::Jpeg)
                .quality(80)
        );

        let empty: TransformOptions = serde_json::from_str("{}").unwrap();
        assert!(empty.is_pass_through());

        // Zero edges are not valid sizes on the wire
        assert!(serde_json::from_str::<TransformOptions>(r#"{"height": 0}"#).is_err());
    }

    #[test]
    fn test_options_builder() {
        let options = TransformOptions::new()
            .width(300)
            .height(171)
            .format(ImageFormat::WebP)
            .quality(80);

        assert_eq!(options.size, SizeRequest::new(Some(300), Some(171)));
        assert_eq!(options.format, Some(ImageFormat::WebP));
        assert_eq!(options.quality, Some(Quality::new(80)));
        assert!(!options.is_pass_through());
        assert!(TransformOptions::new().is_pass_through());
    }
}
