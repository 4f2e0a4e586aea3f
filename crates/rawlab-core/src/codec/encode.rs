//! Default encoder writing JPEG, PNG and TIFF through the `image` crate.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tiff::TiffEncoder;
use image::DynamicImage;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::ImageEncoder;
use crate::buffer::ImageBuffer;
use crate::error::{PipelineError, PipelineResult};
use crate::export::OutputFormat;

/// Writes buffers to disk. JPEG output is always 8-bit RGB; PNG and TIFF keep
/// the buffer's depth and alpha.
#[derive(Debug, Clone)]
pub struct StandardEncoder {
    quality: u8,
}

impl StandardEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl Default for StandardEncoder {
    fn default() -> Self {
        Self::new(90)
    }
}

impl ImageEncoder for StandardEncoder {
    fn encode(
        &self,
        image: &ImageBuffer,
        format: OutputFormat,
        path: &Path,
    ) -> PipelineResult<()> {
        let encode_err = |message: String| PipelineError::Encode {
            path: path.to_path_buf(),
            message,
        };

        let img = image.to_dynamic().ok_or_else(|| {
            encode_err(format!(
                "cannot encode {}-channel buffer",
                image.channels()
            ))
        })?;

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir)
            .map_err(|e| encode_err(format!("Cannot create output directory: {}", e)))?;

        // Encode next to the destination and rename into place, so an existing
        // file survives a failed encode.
        let mut tmp = tempfile::Builder::new()
            .prefix(".rawlab-")
            .suffix(".part")
            .tempfile_in(dir)
            .map_err(|e| encode_err(format!("Cannot create file: {}", e)))?;

        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            let result = match format {
                OutputFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8())
                    .write_with_encoder(JpegEncoder::new_with_quality(&mut writer, self.quality)),
                OutputFormat::Png => img.write_with_encoder(PngEncoder::new(&mut writer)),
                OutputFormat::Tiff => img.write_with_encoder(TiffEncoder::new(&mut writer)),
            };
            result
                .map_err(|e| e.to_string())
                .and_then(|()| writer.flush().map_err(|e| e.to_string()))
                .map_err(encode_err)?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = tmp
                .as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o644));
        }

        tmp.persist(path)
            .map_err(|e| encode_err(format!("Cannot move output into place: {}", e.error)))?;

        tracing::debug!("Wrote {} {:?}", format, path);
        Ok(())
    }
}
