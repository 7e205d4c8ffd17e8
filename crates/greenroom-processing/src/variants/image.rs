//! Image variant generation via the `image` crate.

#![cfg(feature = "image")]

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{GenericImageView, ImageFormat, ImageReader};
use std::io::Cursor;

/// Decode and return `(width, height)` without keeping the pixels.
pub fn probe_dimensions(data: &[u8]) -> Result<(u32, u32)> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .context("Failed to sniff image format")?;
    let img = reader.decode().context("Failed to decode image")?;
    Ok(img.dimensions())
}

/// Resize to `target_width` (preserving aspect ratio) and re-encode as
/// JPEG. Returns the encoded bytes and the actual output dimensions.
pub fn generate_thumbnail(data: &[u8], target_width: u32) -> Result<(Vec<u8>, u32, u32)> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .context("Failed to sniff image format")?;
    let img = reader.decode().context("Failed to decode image")?;
    let (width, height) = img.dimensions();
    anyhow::ensure!(
        target_width <= width,
        "target width {} exceeds native width {}",
        target_width,
        width
    );

    let target_height = ((height as u64 * target_width as u64) / width as u64).max(1) as u32;
    let resized = img.resize_exact(target_width, target_height, FilterType::Lanczos3);

    let mut out = Cursor::new(Vec::new());
    // JPEG has no alpha channel; flatten before encoding.
    resized
        .to_rgb8()
        .write_to(&mut out, ImageFormat::Jpeg)
        .context("Failed to encode thumbnail")?;
    Ok((out.into_inner(), target_width, target_height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn test_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, _| Rgb([(x % 256) as u8, 40, 200]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Jpeg)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_probe_dimensions() {
        let data = test_jpeg(320, 200);
        assert_eq!(probe_dimensions(&data).unwrap(), (320, 200));
    }

    #[test]
    fn test_generate_thumbnail_scales_down() {
        let data = test_jpeg(400, 300);
        let (bytes, w, h) = generate_thumbnail(&data, 200).unwrap();
        assert_eq!((w, h), (200, 150));
        assert_eq!(probe_dimensions(&bytes).unwrap(), (200, 150));
    }

    #[test]
    fn test_generate_thumbnail_rejects_upscale() {
        let data = test_jpeg(100, 100);
        assert!(generate_thumbnail(&data, 200).is_err());
    }

    #[test]
    fn test_generate_thumbnail_rejects_garbage() {
        assert!(generate_thumbnail(b"not an image", 100).is_err());
    }
}
