//! Pixel geometry from raw file bytes.
//!
//! PNG is read straight out of the IHDR layout. JPEG needs a walk over
//! variable-length marker segments, which is left to the `image` crate's
//! header-only reader. Everything else is reported as undetermined.

use crate::models::ImageDimensions;
use crate::utils::{BridgeError, BridgeResult};
use image::{ImageFormat, ImageReader};
use log::debug;
use std::io::Cursor;
use std::path::Path;

const PNG_SIGNATURE: [u8; 4] = [0x89, 0x50, 0x4E, 0x47];
const JPEG_SIGNATURE: [u8; 2] = [0xFF, 0xD8];

// IHDR width/height offsets: 8-byte signature + 4-byte length + 4-byte type
const PNG_WIDTH_OFFSET: usize = 16;
const PNG_HEIGHT_OFFSET: usize = 20;

fn read_u32_be(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw: [u8; 4] = bytes.get(offset..offset + 4)?.try_into().ok()?;
    Some(u32::from_be_bytes(raw))
}

fn sniff_png(bytes: &[u8]) -> Option<ImageDimensions> {
    let width = read_u32_be(bytes, PNG_WIDTH_OFFSET)?;
    let height = read_u32_be(bytes, PNG_HEIGHT_OFFSET)?;
    Some(ImageDimensions::new(width, height))
}

fn sniff_jpeg(bytes: &[u8]) -> Option<ImageDimensions> {
    match ImageReader::with_format(Cursor::new(bytes), ImageFormat::Jpeg).into_dimensions() {
        Ok((width, height)) => Some(ImageDimensions::new(width, height)),
        Err(e) => {
            debug!("JPEG header parse failed: {}", e);
            None
        }
    }
}

/// Width and height from the buffer's container header, without decoding pixels.
///
/// `None` means the format is unsupported or the header is unreadable. A
/// zero dimension can still come back; [`dimensions_from_bytes`] rejects it.
pub fn sniff(bytes: &[u8]) -> Option<ImageDimensions> {
    if bytes.starts_with(&PNG_SIGNATURE) {
        sniff_png(bytes)
    } else if bytes.starts_with(&JPEG_SIGNATURE) {
        sniff_jpeg(bytes)
    } else {
        None
    }
}

pub fn dimensions_from_bytes(bytes: &[u8]) -> BridgeResult<ImageDimensions> {
    sniff(bytes)
        .filter(|dims| !dims.is_empty())
        .ok_or(BridgeError::DimensionsUnavailable)
}

/// Re-reads the file on every call; nothing is cached
pub async fn read_dimensions(path: &Path) -> BridgeResult<ImageDimensions> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| BridgeError::file_read(path.to_string_lossy(), e))?;
    dimensions_from_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_header(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&13u32.to_be_bytes());
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&width.to_be_bytes());
        bytes.extend_from_slice(&height.to_be_bytes());
        bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
        bytes
    }

    fn encoded_jpeg(width: u32, height: u32) -> Vec<u8> {
        let pixels = vec![128u8; (width * height) as usize];
        let mut bytes = Vec::new();
        image::codecs::jpeg::JpegEncoder::new(&mut bytes)
            .encode(&pixels, width, height, image::ExtendedColorType::L8)
            .unwrap();
        bytes
    }

    #[test]
    fn test_png_800_by_600() {
        let dims = dimensions_from_bytes(&png_header(800, 600)).unwrap();
        assert_eq!(dims, ImageDimensions::new(800, 600));
    }

    #[test]
    fn test_png_signature_only_checks_four_bytes() {
        let mut bytes = png_header(32, 16);
        bytes[4..8].copy_from_slice(&[0, 0, 0, 0]);
        assert_eq!(sniff(&bytes), Some(ImageDimensions::new(32, 16)));
    }

    #[test]
    fn test_truncated_png_is_undetermined() {
        let bytes = png_header(800, 600);
        assert_eq!(sniff(&bytes[..20]), None);
    }

    #[test]
    fn test_zero_dimension_is_unavailable() {
        let err = dimensions_from_bytes(&png_header(0, 600)).unwrap_err();
        assert!(matches!(err, BridgeError::DimensionsUnavailable));
    }

    #[test]
    fn test_all_zero_buffer_is_unavailable() {
        let err = dimensions_from_bytes(&[0u8; 64]).unwrap_err();
        assert!(matches!(err, BridgeError::DimensionsUnavailable));
    }

    #[test]
    fn test_other_formats_are_undetermined() {
        assert_eq!(sniff(b"GIF89a\x10\x00\x10\x00"), None);
        assert_eq!(sniff(b"RIFF\x00\x00\x00\x00WEBPVP8 "), None);
        assert_eq!(sniff(b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>"), None);
        assert_eq!(sniff(&[]), None);
    }

    #[test]
    fn test_jpeg_frame_header() {
        let dims = dimensions_from_bytes(&encoded_jpeg(64, 48)).unwrap();
        assert_eq!(dims, ImageDimensions::new(64, 48));
    }

    #[test]
    fn test_garbage_after_jpeg_signature_is_unavailable() {
        let err = dimensions_from_bytes(&[0xFF, 0xD8, 0x00, 0x01, 0x02]).unwrap_err();
        assert!(matches!(err, BridgeError::DimensionsUnavailable));
    }

    #[tokio::test]
    async fn test_read_dimensions_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_dimensions(&dir.path().join("missing.png")).await.unwrap_err();
        assert_eq!(err.kind(), "file_read_error");
    }

    #[tokio::test]
    async fn test_read_dimensions_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, png_header(640, 480)).unwrap();

        let dims = read_dimensions(&path).await.unwrap();
        assert_eq!(dims, ImageDimensions::new(640, 480));
    }
}
