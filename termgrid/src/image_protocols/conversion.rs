// ABOUTME: Image decoding and lossless transcoding at the pipeline boundary
// ABOUTME: Rejects malformed payloads before they ever reach a protocol encoder

use crate::error::{RenderError, Result};
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

pub fn is_png(data: &[u8]) -> bool {
    data.starts_with(&PNG_SIGNATURE)
}

/// Decode bytes of any supported format into a pixel buffer.
pub fn decode_image(data: &[u8]) -> Result<DynamicImage> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| RenderError::Decode(e.to_string()))?;
    if reader.format().is_none() {
        return Err(RenderError::Decode("unrecognized image format".to_string()));
    }
    reader
        .decode()
        .map_err(|e| RenderError::Decode(e.to_string()))
}

/// Pixel dimensions read from the image header, without decoding pixels.
pub fn image_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?;
    reader.format()?;
    reader
        .into_dimensions()
        .ok()
        .filter(|(width, height)| *width > 0 && *height > 0)
}

/// Return PNG bytes, transcoding losslessly when the input is another format.
pub fn ensure_png(data: &[u8]) -> Result<Vec<u8>> {
    if is_png(data) {
        return Ok(data.to_vec());
    }
    let img = decode_image(data)?;
    log::debug!(
        "Transcoding {:?} image ({}x{}) to PNG",
        image::guess_format(data).ok(),
        img.width(),
        img.height()
    );
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| RenderError::Encoding(e.to_string()))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn encoded(format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(6, 4, Rgb([200, 10, 10])));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), format).unwrap();
        buffer
    }

    #[test]
    fn test_png_signature() {
        assert!(is_png(&encoded(ImageFormat::Png)));
        assert!(!is_png(&encoded(ImageFormat::Bmp)));
        assert!(!is_png(&[0x89, 0x50]));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = decode_image(b"definitely not an image");
        assert!(matches!(result, Err(RenderError::Decode(_))));
        assert!(matches!(decode_image(&[]), Err(RenderError::Decode(_))));
    }

    #[test]
    fn test_decode_truncated_png() {
        let mut data = encoded(ImageFormat::Png);
        data.truncate(20);
        assert!(matches!(decode_image(&data), Err(RenderError::Decode(_))));
    }

    #[test]
    fn test_image_dimensions() {
        assert_eq!(image_dimensions(&encoded(ImageFormat::Png)), Some((6, 4)));
        assert_eq!(image_dimensions(&encoded(ImageFormat::Bmp)), Some((6, 4)));
        assert_eq!(image_dimensions(b"nope"), None);
    }

    #[test]
    fn test_ensure_png_passthrough() {
        let png = encoded(ImageFormat::Png);
        assert_eq!(ensure_png(&png).unwrap(), png);
    }

    #[test]
    fn test_ensure_png_transcodes_losslessly() {
        let bmp = encoded(ImageFormat::Bmp);
        let png = ensure_png(&bmp).unwrap();
        assert!(is_png(&png));

        let original = image::load_from_memory(&bmp).unwrap().to_rgb8();
        let roundtrip = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(original.as_raw(), roundtrip.as_raw());
    }

    #[test]
    fn test_ensure_png_rejects_garbage() {
        assert!(matches!(ensure_png(b"garbage bytes"), Err(RenderError::Decode(_))));
    }
}
