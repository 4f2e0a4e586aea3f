//! Default source decoder backed by the `image` crate.

use image::{GenericImageView, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use super::validate::{is_raw_path, Validator};
use super::SourceDecoder;
use crate::buffer::{ColorSpace, ImageBuffer};
use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Decoder for raster inputs (JPEG, PNG, TIFF, WebP) with size limits.
///
/// Camera RAW containers are validated but not demosaiced; they fail with a
/// decode error naming the file. A RAW-capable decoder plugs in through
/// [`SourceDecoder`] instead.
pub struct ImageDecoder {
    limits: LimitsConfig,
    validator: Validator,
    color_space: ColorSpace,
}

impl ImageDecoder {
    pub fn new(limits: LimitsConfig) -> Self {
        Self {
            validator: Validator::new(limits.clone()),
            limits,
            color_space: ColorSpace::Srgb,
        }
    }

    /// Tag decoded buffers with `color_space` instead of sRGB.
    pub fn with_color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = color_space;
        self
    }

    fn decode_bytes(&self, bytes: Vec<u8>, path: &Path) -> Result<ImageBuffer, PipelineError> {
        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Cannot detect image format: {}", e),
            })?;
        if reader.format().is_none() {
            ImageFormat::from_path(path).map_err(|_| PipelineError::UnsupportedFormat {
                path: path.to_path_buf(),
                format: path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("unknown")
                    .to_string(),
            })?;
        }

        let image = reader.decode().map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let (width, height) = image.dimensions();
        if width > self.limits.max_image_dimension || height > self.limits.max_image_dimension {
            return Err(PipelineError::ImageTooLarge {
                path: path.to_path_buf(),
                width,
                height,
                max_dim: self.limits.max_image_dimension,
            });
        }

        Ok(ImageBuffer::from_dynamic(image, self.color_space).expand_gray())
    }
}

impl SourceDecoder for ImageDecoder {
    fn decode(&self, path: &Path) -> Result<ImageBuffer, PipelineError> {
        self.validator.validate(path)?;
        if is_raw_path(path) {
            return Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: "camera RAW files need a RAW-capable decoder".to_string(),
            });
        }
        let bytes = std::fs::read(path).map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("Cannot read file: {}", e),
        })?;
        let decoded = self.decode_bytes(bytes, path)?;
        tracing::debug!(
            "Decoded {:?}: {}x{} {}ch {}-bit",
            path,
            decoded.width(),
            decoded.height(),
            decoded.channels(),
            decoded.bit_depth().bits()
        );
        Ok(decoded)
    }
}

/// Decode on the blocking pool, giving up after `timeout_ms`.
pub async fn decode_with_timeout(
    decoder: Arc<dyn SourceDecoder>,
    path: &Path,
    timeout_ms: u64,
) -> Result<ImageBuffer, PipelineError> {
    let path_owned = path.to_path_buf();
    let decode_result = timeout(Duration::from_millis(timeout_ms), async {
        tokio::task::spawn_blocking(move || decoder.decode(&path_owned)).await
    })
    .await;

    match decode_result {
        Ok(Ok(Ok(image))) => Ok(image),
        Ok(Ok(Err(e))) => Err(e),
        Ok(Err(e)) => Err(PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("Task join error: {}", e),
        }),
        Err(_) => Err(PipelineError::Timeout {
            path: path.to_path_buf(),
            stage: "decode".to_string(),
            timeout_ms,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjust::{AdjustmentPipeline, AdjustmentSpec, Render};
    use crate::buffer::BitDepth;

    fn write_png(path: &Path, img: image::DynamicImage) {
        img.save_with_format(path, ImageFormat::Png).unwrap();
    }

    #[test]
    fn test_decode_rgb_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.png");
        write_png(
            &path,
            image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
                5,
                3,
                image::Rgb([10, 20, 30]),
            )),
        );

        let buf = ImageDecoder::new(LimitsConfig::default())
            .decode(&path)
            .unwrap();
        assert_eq!((buf.width(), buf.height(), buf.channels()), (5, 3, 3));
        assert_eq!(buf.bit_depth(), BitDepth::Eight);
        assert_eq!(buf.sample(4, 2, 2), Some(30));
    }

    #[test]
    fn test_decode_expands_gray() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");
        write_png(
            &path,
            image::DynamicImage::ImageLuma16(image::ImageBuffer::from_pixel(
                2,
                2,
                image::Luma([40000u16]),
            )),
        );

        let buf = ImageDecoder::new(LimitsConfig::default())
            .decode(&path)
            .unwrap();
        assert_eq!(buf.channels(), 3);
        assert_eq!(buf.bit_depth(), BitDepth::Sixteen);
        assert_eq!(buf.sample(1, 1, 1), Some(40000));
    }

    #[test]
    fn test_format_detected_by_content() {
        let dir = tempfile::tempdir().unwrap();
        let misnamed = dir.path().join("actually_png.jpg");
        write_png(
            &misnamed,
            image::DynamicImage::ImageRgba8(image::RgbaImage::new(4, 4)),
        );
        let buf = ImageDecoder::new(LimitsConfig::default())
            .decode(&misnamed)
            .unwrap();
        assert_eq!(buf.channels(), 4);
    }

    #[test]
    fn test_color_space_tag_drives_exposure_curve() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mid.png");
        write_png(
            &path,
            image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
                4,
                4,
                image::Rgb([77, 77, 77]),
            )),
        );

        let srgb = ImageDecoder::new(LimitsConfig::default())
            .decode(&path)
            .unwrap();
        let prophoto = ImageDecoder::new(LimitsConfig::default())
            .with_color_space(ColorSpace::ProPhoto)
            .decode(&path)
            .unwrap();
        assert_eq!(srgb.color_space(), ColorSpace::Srgb);
        assert_eq!(prophoto.color_space(), ColorSpace::ProPhoto);

        let spec = AdjustmentSpec::from_pairs([("exposure", 1.0)]).unwrap();
        let pipeline = AdjustmentPipeline::new();
        let a = pipeline.render(&srgb, &spec).unwrap();
        let b = pipeline.render(&prophoto, &spec).unwrap();
        assert_eq!(b.color_space(), ColorSpace::ProPhoto);
        // 77/255 doubled in linear light: ~107 on the sRGB curve, ~112 on ProPhoto's
        let (sa, sb) = (a.sample(0, 0, 0).unwrap(), b.sample(0, 0, 0).unwrap());
        assert!(sb > sa, "sRGB {sa} vs ProPhoto {sb}");
    }

    #[test]
    fn test_dimension_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        write_png(&path, image::DynamicImage::ImageRgb8(image::RgbImage::new(64, 8)));
        let decoder = ImageDecoder::new(LimitsConfig {
            max_image_dimension: 32,
            ..LimitsConfig::default()
        });
        assert!(matches!(
            decoder.decode(&path),
            Err(PipelineError::ImageTooLarge { width: 64, .. })
        ));
    }

    #[test]
    fn test_raw_container_fails_with_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("IMG_0001.dng");
        let mut data = vec![b'I', b'I', 0x2A, 0x00, 8, 0, 0, 0];
        data.resize(64, 0);
        std::fs::write(&path, data).unwrap();

        let err = ImageDecoder::new(LimitsConfig::default())
            .decode(&path)
            .unwrap_err();
        assert_eq!(err.kind(), "decode");
        assert!(err.to_string().contains("IMG_0001.dng"));
    }

    #[test]
    fn test_truncated_png_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0]).unwrap();
        let err = ImageDecoder::new(LimitsConfig::default())
            .decode(&path)
            .unwrap_err();
        assert_eq!(err.kind(), "decode");
    }

    #[tokio::test]
    async fn test_decode_with_timeout_passes_result_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.png");
        write_png(&path, image::DynamicImage::ImageRgb8(image::RgbImage::new(3, 3)));
        let decoder: Arc<dyn SourceDecoder> =
            Arc::new(ImageDecoder::new(LimitsConfig::default()));

        let buf = decode_with_timeout(decoder.clone(), &path, 5000)
            .await
            .unwrap();
        assert_eq!(buf.width(), 3);

        let missing = dir.path().join("missing.png");
        let err = decode_with_timeout(decoder, &missing, 5000)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::FileNotFound(_)));
    }
}
