//! Input validation before decode.

use std::io::Read;
use std::path::Path;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Camera RAW extensions. These are recognized as inputs but need a
/// RAW-capable [`SourceDecoder`](super::SourceDecoder).
pub const RAW_EXTENSIONS: &[&str] = &[
    "nef", "cr2", "crw", "raf", "dng", "dcr", "mrw", "orf", "pef", "srf", "arw",
];

/// Whether `path` carries a camera RAW extension.
pub fn is_raw_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| RAW_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Validates files before decoding.
pub struct Validator {
    limits: LimitsConfig,
}

impl Validator {
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Quick checks before a full decode:
    /// - file exists and is readable
    /// - file size is within limits
    /// - header matches a known raster or RAW container signature
    pub fn validate(&self, path: &Path) -> Result<(), PipelineError> {
        if !path.exists() {
            return Err(PipelineError::FileNotFound(path.to_path_buf()));
        }

        let metadata = std::fs::metadata(path).map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("Cannot read metadata: {}", e),
        })?;

        let max_bytes = self.limits.max_file_size_mb * 1024 * 1024;
        if metadata.len() > max_bytes {
            return Err(PipelineError::FileTooLarge {
                path: path.to_path_buf(),
                size_mb: metadata.len() / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }

        self.check_magic_bytes(path)
    }

    fn check_magic_bytes(&self, path: &Path) -> Result<(), PipelineError> {
        let mut file = std::fs::File::open(path).map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("Cannot open file: {}", e),
        })?;

        let mut header = [0u8; 16];
        let bytes_read = file.read(&mut header).map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("Cannot read header: {}", e),
        })?;

        if bytes_read < 4 {
            return Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: "File too small to be a valid image".to_string(),
            });
        }

        if !Self::is_known_header(&header[..bytes_read]) {
            return Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: "Unrecognized image format (invalid magic bytes)".to_string(),
            });
        }
        Ok(())
    }

    /// Match raster formats the default decoder reads, plus RAW containers.
    fn is_known_header(header: &[u8]) -> bool {
        // JPEG
        if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return true;
        }
        // PNG
        if header.starts_with(&[0x89, b'P', b'N', b'G']) {
            return true;
        }
        // WebP: RIFF....WEBP
        if header.starts_with(b"RIFF") {
            return header.len() < 12 || &header[8..12] == b"WEBP";
        }
        // TIFF and TIFF-based RAW (DNG, NEF, CR2, ARW, PEF, DCR, SRF)
        if header.starts_with(&[b'I', b'I', 0x2A, 0x00])
            || header.starts_with(&[b'M', b'M', 0x00, 0x2A])
        {
            return true;
        }
        // Olympus ORF (IIRO / IIRS / MMOR)
        if header.starts_with(b"IIRO") || header.starts_with(b"IIRS") || header.starts_with(b"MMOR")
        {
            return true;
        }
        // Canon CRW (CIFF)
        if header.len() >= 14 && header.starts_with(b"II") && &header[6..14] == b"HEAPCCDR" {
            return true;
        }
        // Fujifilm RAF
        if header.starts_with(b"FUJIFILM") {
            return true;
        }
        // Minolta MRW
        if header.starts_with(&[0x00, b'M', b'R', b'M']) {
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(bytes: &[u8]) -> Vec<u8> {
        let mut h = bytes.to_vec();
        h.resize(16, 0);
        h
    }

    #[test]
    fn test_magic_bytes_raster() {
        assert!(Validator::is_known_header(&header(&[0xFF, 0xD8, 0xFF, 0xE0])));
        assert!(Validator::is_known_header(&header(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A])));
        assert!(Validator::is_known_header(&header(b"RIFF\0\0\0\0WEBP")));
        assert!(!Validator::is_known_header(&header(b"RIFF\0\0\0\0WAVE")));
    }

    #[test]
    fn test_magic_bytes_tiff_and_raw() {
        assert!(Validator::is_known_header(&header(&[b'I', b'I', 0x2A, 0x00])));
        assert!(Validator::is_known_header(&header(&[b'M', b'M', 0x00, 0x2A])));
        assert!(Validator::is_known_header(&header(b"IIRO")));
        assert!(Validator::is_known_header(&header(b"FUJIFILMCCD-RAW ")));
        assert!(Validator::is_known_header(&header(b"II\x1a\0\0\0HEAPCCDR")));
        assert!(Validator::is_known_header(&header(&[0x00, b'M', b'R', b'M'])));
    }

    #[test]
    fn test_magic_bytes_rejects_unknown() {
        assert!(!Validator::is_known_header(&header(&[0, 0, 0, 0])));
        assert!(!Validator::is_known_header(&header(&[b'I', b'I', 0x00, 0x00])));
        assert!(!Validator::is_known_header(&header(b"GIF89a")));
    }

    #[test]
    fn test_validate_missing_and_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        let validator = Validator::new(LimitsConfig {
            max_file_size_mb: 1,
            ..LimitsConfig::default()
        });

        let missing = dir.path().join("missing.png");
        assert!(matches!(
            validator.validate(&missing),
            Err(PipelineError::FileNotFound(_))
        ));

        let big = dir.path().join("big.jpg");
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
        data.resize(2 * 1024 * 1024, 0);
        std::fs::write(&big, data).unwrap();
        assert!(matches!(
            validator.validate(&big),
            Err(PipelineError::FileTooLarge { max_mb: 1, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.png");
        std::fs::write(&path, "definitely not an image").unwrap();
        let err = Validator::new(LimitsConfig::default())
            .validate(&path)
            .unwrap_err();
        assert_eq!(err.kind(), "decode");
    }

    #[test]
    fn test_is_raw_path() {
        assert!(is_raw_path(Path::new("/photos/DSC_0001.NEF")));
        assert!(is_raw_path(Path::new("img.dng")));
        assert!(!is_raw_path(Path::new("img.tif")));
        assert!(!is_raw_path(Path::new("no_extension")));
    }
}
