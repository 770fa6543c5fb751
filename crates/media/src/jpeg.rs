//! JPEG artifact helpers

use std::path::Path;

use image::{GrayImage, RgbImage};

use crate::MediaError;

/// Write a packed RGB24 buffer as a JPEG file.
pub fn save_rgb_jpeg(path: &Path, rgb: &[u8], width: u32, height: u32) -> Result<(), MediaError> {
    if rgb.len() != (width as usize) * (height as usize) * 3 {
        return Err(MediaError::Encode(format!(
            "rgb buffer size {} does not match {width}x{height}",
            rgb.len()
        )));
    }
    image::save_buffer_with_format(
        path,
        rgb,
        width,
        height,
        image::ExtendedColorType::Rgb8,
        image::ImageFormat::Jpeg,
    )
    .map_err(|e| MediaError::Encode(e.to_string()))
}

/// Load a frame artifact as grayscale for motion analysis.
pub fn load_gray(path: &Path) -> Result<GrayImage, MediaError> {
    let img = image::open(path).map_err(|e| MediaError::Decode(e.to_string()))?;
    Ok(img.to_luma8())
}

/// Load a frame artifact as RGB for histogram analysis.
pub fn load_rgb(path: &Path) -> Result<RgbImage, MediaError> {
    let img = image::open(path).map_err(|e| MediaError::Decode(e.to_string()))?;
    Ok(img.to_rgb8())
}

/// Read a frame artifact's raw bytes for LLM image blocks.
pub fn read_jpeg_bytes(path: &Path) -> Result<Vec<u8>, MediaError> {
    Ok(std::fs::read(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jpeg_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame_000000000.jpg");

        // 4x2 solid red frame
        let rgb: Vec<u8> = std::iter::repeat([255u8, 0, 0]).take(8).flatten().collect();
        save_rgb_jpeg(&path, &rgb, 4, 2).unwrap();

        let back = load_rgb(&path).unwrap();
        assert_eq!(back.width(), 4);
        assert_eq!(back.height(), 2);
        let px = back.get_pixel(0, 0);
        assert!(px[0] > 200 && px[1] < 60 && px[2] < 60);
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jpg");
        assert!(save_rgb_jpeg(&path, &[0u8; 5], 4, 2).is_err());
    }
}
