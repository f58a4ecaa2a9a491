//! Image-to-tensor preprocessing for classification models.

use std::fs;
use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbaImage};
use tracing::debug;

use super::MediaType;
use crate::error::ImageError;

/// Default square side of the model input.
pub const DEFAULT_TARGET_SIZE: u32 = 224;

/// Default upper bound for image files (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Turns user images into planar `[0, 1]`-scaled float buffers.
///
/// The output layout is channel-major: all red values, then all green, then
/// all blue, `S * S` each. Alpha is dropped and no mean/std normalization is
/// applied.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    /// Side of the square model input.
    target_size: u32,
    /// Largest accepted file, in bytes.
    max_file_size: u64,
    /// Resampling kernel used for the resize.
    filter: FilterType,
}

impl ImagePreprocessor {
    /// Create a new preprocessor with default settings.
    pub fn new() -> Self {
        Self {
            target_size: DEFAULT_TARGET_SIZE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            filter: FilterType::Triangle,
        }
    }

    /// Set the square target side.
    pub fn with_target_size(mut self, size: u32) -> Self {
        self.target_size = size.max(1);
        self
    }

    /// Set the file size ceiling.
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Square target side.
    pub fn target_size(&self) -> u32 {
        self.target_size
    }

    /// Length of the buffer produced by [`to_planar`](Self::to_planar).
    pub fn tensor_len(&self) -> usize {
        let side = self.target_size as usize;
        3 * side * side
    }

    /// Check a declared media type and byte size against the allow-list and ceiling.
    pub fn validate(&self, mime: &str, size: u64) -> Result<MediaType, ImageError> {
        let media_type = MediaType::from_mime(mime)?;
        self.check_size(size)?;
        Ok(media_type)
    }

    /// Decode image bytes of a declared media type.
    pub fn decode(&self, bytes: &[u8], media_type: MediaType) -> Result<DynamicImage, ImageError> {
        self.check_size(bytes.len() as u64)?;

        let image = image::load_from_memory_with_format(bytes, media_type.image_format())
            .map_err(|e| ImageError::Decode(e.to_string()))?;

        debug!(
            "Decoded {} image: {}x{}",
            media_type,
            image.width(),
            image.height()
        );

        Ok(image)
    }

    /// Read, validate and decode an image file.
    ///
    /// The media type is taken from the file extension and the size ceiling is
    /// checked before the file is read.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<DynamicImage, ImageError> {
        let path = path.as_ref();
        let media_type = MediaType::from_path(path)?;
        self.check_size(fs::metadata(path)?.len())?;

        let bytes = fs::read(path)?;
        self.decode(&bytes, media_type)
    }

    /// Resize an image to `S x S` and serialize it as a planar float buffer.
    pub fn to_planar(&self, image: &DynamicImage) -> Vec<f32> {
        let side = self.target_size;
        let (width, height) = image.dimensions();

        let rgba = if (width, height) == (side, side) {
            image.to_rgba8()
        } else {
            debug!("Resizing {}x{} to {}x{}", width, height, side, side);
            image.resize_exact(side, side, self.filter).to_rgba8()
        };

        planar_from_interleaved(rgba.as_raw(), side as usize * side as usize)
    }

    /// Same as [`to_planar`](Self::to_planar) for a raw interleaved RGBA buffer.
    pub fn planar_from_rgba(
        &self,
        rgba: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<f32>, ImageError> {
        if width == 0 || height == 0 {
            return Err(ImageError::InvalidBuffer(format!(
                "zero-sized image {}x{}",
                width, height
            )));
        }

        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(ImageError::InvalidBuffer(format!(
                "expected {} bytes for {}x{} RGBA, got {}",
                expected,
                width,
                height,
                rgba.len()
            )));
        }

        let image = RgbaImage::from_raw(width, height, rgba.to_vec())
            .ok_or_else(|| ImageError::InvalidBuffer("buffer too small".to_string()))?;

        Ok(self.to_planar(&DynamicImage::ImageRgba8(image)))
    }

    fn check_size(&self, size: u64) -> Result<(), ImageError> {
        if size > self.max_file_size {
            return Err(ImageError::TooLarge {
                size,
                limit: self.max_file_size,
            });
        }
        Ok(())
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Pixel `i` lands at `i`, `i + n` and `i + 2n` for R, G and B.
fn planar_from_interleaved(rgba: &[u8], pixels: usize) -> Vec<f32> {
    let mut planar = vec![0.0f32; 3 * pixels];

    for (i, px) in rgba.chunks_exact(4).take(pixels).enumerate() {
        planar[i] = px[0] as f32 / 255.0;
        planar[i + pixels] = px[1] as f32 / 255.0;
        planar[i + 2 * pixels] = px[2] as f32 / 255.0;
    }

    planar
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use pretty_assertions::assert_eq;
    use std::io::{Cursor, Write};

    fn encode_png(image: &DynamicImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_solid_red_planes() {
        let red = RgbaImage::from_pixel(224, 224, Rgba([255, 0, 0, 255]));
        let planar = ImagePreprocessor::new().to_planar(&DynamicImage::ImageRgba8(red));

        let n = 224 * 224;
        assert_eq!(planar.len(), 3 * n);
        assert!(planar[..n].iter().all(|&v| v == 1.0));
        assert!(planar[n..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_arbitrary_size_output_len_and_range() {
        let image = RgbaImage::from_fn(300, 170, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 128])
        });
        let preprocessor = ImagePreprocessor::new();
        let planar = preprocessor.to_planar(&DynamicImage::ImageRgba8(image));

        assert_eq!(planar.len(), preprocessor.tensor_len());
        assert!(planar.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_plane_offsets_without_resize() {
        // 2x2 image, pixels in row-major order
        let rgba = [
            10, 20, 30, 0, //
            40, 50, 60, 0, //
            70, 80, 90, 0, //
            100, 110, 120, 255,
        ];
        let planar = ImagePreprocessor::new()
            .with_target_size(2)
            .planar_from_rgba(&rgba, 2, 2)
            .unwrap();

        let expected: Vec<f32> = [10, 40, 70, 100, 20, 50, 80, 110, 30, 60, 90, 120]
            .iter()
            .map(|&v| v as f32 / 255.0)
            .collect();
        assert_eq!(planar, expected);
    }

    #[test]
    fn test_planar_from_rgba_rejects_bad_buffers() {
        let preprocessor = ImagePreprocessor::new();
        assert!(matches!(
            preprocessor.planar_from_rgba(&[0; 15], 2, 2),
            Err(ImageError::InvalidBuffer(_))
        ));
        assert!(matches!(
            preprocessor.planar_from_rgba(&[], 0, 4),
            Err(ImageError::InvalidBuffer(_))
        ));
    }

    #[test]
    fn test_validate_type_and_size() {
        let preprocessor = ImagePreprocessor::new();
        assert_eq!(preprocessor.validate("image/png", 1024).unwrap(), MediaType::Png);
        assert_eq!(
            preprocessor.validate("image/webp", DEFAULT_MAX_FILE_SIZE).unwrap(),
            MediaType::Webp
        );
        assert!(matches!(
            preprocessor.validate("image/bmp", 10),
            Err(ImageError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            preprocessor.validate("image/jpeg", DEFAULT_MAX_FILE_SIZE + 1),
            Err(ImageError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_decode_corrupt_data() {
        let err = ImagePreprocessor::new()
            .decode(b"definitely not a png", MediaType::Png)
            .unwrap_err();
        assert!(matches!(err, ImageError::Decode(_)));
    }

    #[test]
    fn test_decode_respects_ceiling() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 255])));
        let bytes = encode_png(&image);

        let tight = ImagePreprocessor::new().with_max_file_size(bytes.len() as u64 - 1);
        assert!(matches!(
            tight.decode(&bytes, MediaType::Png),
            Err(ImageError::TooLarge { .. })
        ));

        let decoded = ImagePreprocessor::new().decode(&bytes, MediaType::Png).unwrap();
        assert_eq!(decoded.dimensions(), (8, 8));
    }

    #[test]
    fn test_load_file() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([0, 255, 0, 255])));
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(&encode_png(&image)).unwrap();

        let preprocessor = ImagePreprocessor::new().with_target_size(8);
        let loaded = preprocessor.load_file(file.path()).unwrap();
        let planar = preprocessor.to_planar(&loaded);

        assert_eq!(planar.len(), 192);
        assert!(planar[..64].iter().all(|&v| v == 0.0));
        assert!(planar[64..128].iter().all(|&v| v == 1.0));
        assert!(planar[128..].iter().all(|&v| v == 0.0));
    }
}
