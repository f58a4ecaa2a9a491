//! Image validation, decoding and tensor preprocessing.

mod preprocessing;

pub use preprocessing::{DEFAULT_MAX_FILE_SIZE, DEFAULT_TARGET_SIZE, ImagePreprocessor};

use std::fmt;
use std::path::Path;

use image::ImageFormat;
use serde::{Deserialize, Serialize};

use crate::error::ImageError;

/// Media types accepted as image input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Jpeg,
    Png,
    Webp,
}

impl MediaType {
    /// Parse a declared MIME type, rejecting anything outside the allow-list.
    pub fn from_mime(mime: &str) -> Result<Self, ImageError> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Ok(MediaType::Jpeg),
            "image/png" => Ok(MediaType::Png),
            "image/webp" => Ok(MediaType::Webp),
            other => Err(ImageError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Infer the declared media type from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, ImageError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match extension.as_str() {
            "jpg" | "jpeg" => Ok(MediaType::Jpeg),
            "png" => Ok(MediaType::Png),
            "webp" => Ok(MediaType::Webp),
            _ => Err(ImageError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Canonical MIME string.
    pub fn mime(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Webp => "image/webp",
        }
    }

    pub(crate) fn image_format(&self) -> ImageFormat {
        match self {
            MediaType::Jpeg => ImageFormat::Jpeg,
            MediaType::Png => ImageFormat::Png,
            MediaType::Webp => ImageFormat::WebP,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_mime_allow_list() {
        assert_eq!(MediaType::from_mime("image/jpeg").unwrap(), MediaType::Jpeg);
        assert_eq!(MediaType::from_mime("image/jpg").unwrap(), MediaType::Jpeg);
        assert_eq!(MediaType::from_mime("IMAGE/PNG").unwrap(), MediaType::Png);
        assert_eq!(MediaType::from_mime("image/webp").unwrap(), MediaType::Webp);

        let err = MediaType::from_mime("image/gif").unwrap_err();
        assert!(matches!(err, ImageError::UnsupportedFormat(ref t) if t == "image/gif"));
    }

    #[test]
    fn test_from_path() {
        assert_eq!(MediaType::from_path(Path::new("cat.JPG")).unwrap(), MediaType::Jpeg);
        assert_eq!(MediaType::from_path(Path::new("a/b/dog.webp")).unwrap(), MediaType::Webp);
        assert!(MediaType::from_path(Path::new("scan.tiff")).is_err());
        assert!(MediaType::from_path(Path::new("no_extension")).is_err());
    }
}
