// ABOUTME: Contact-sheet compositor that tiles square thumbnails into one PNG
// ABOUTME: Center-crops, resamples with Catmull-Rom and blits source-over onto a canvas

use crate::error::{RenderError, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageFormat, RgbaImage};
use std::io::Cursor;

pub const MIN_THUMB_PX: u32 = 64;
pub const MAX_THUMB_PX: u32 = 2048;
/// Upper bound on one composite page, in pixels (256 MiB of RGBA).
pub const MAX_CANVAS_PIXELS: u64 = 64 * 1024 * 1024;

/// Encoded composite with its pixel size.
#[derive(Debug, Clone)]
pub struct GridImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Canvas size for `count` tiles laid out in `columns` columns.
///
/// `None` when a side overflows `u32`.
pub fn canvas_size(count: usize, columns: u32, thumb_px: u32, padding_px: u32) -> Option<(u32, u32)> {
    let columns = columns.max(1);
    let rows = u32::try_from(count).ok()?.div_ceil(columns);
    let span = |n: u32| {
        n.checked_mul(thumb_px)?
            .checked_add(n.saturating_sub(1).checked_mul(padding_px)?)
    };
    Some((span(columns)?, span(rows)?))
}

/// Checked canvas size, rejecting tiles or canvases too large to allocate.
pub fn bounded_canvas_size(
    count: usize,
    columns: u32,
    thumb_px: u32,
    padding_px: u32,
) -> Result<(u32, u32)> {
    if thumb_px > MAX_THUMB_PX {
        return Err(RenderError::Configuration(format!(
            "thumb_px {} exceeds the maximum of {}",
            thumb_px, MAX_THUMB_PX
        )));
    }
    canvas_size(count, columns, thumb_px, padding_px)
        .filter(|(width, height)| u64::from(*width) * u64::from(*height) <= MAX_CANVAS_PIXELS)
        .ok_or_else(|| {
            RenderError::Configuration(format!(
                "grid page of {} tiles in {} columns at {}px with {}px padding exceeds {} pixels",
                count, columns, thumb_px, padding_px, MAX_CANVAS_PIXELS
            ))
        })
}

/// Tile `images` into a single PNG, row-major in input order.
pub fn compose_grid(
    images: &[DynamicImage],
    columns: u32,
    thumb_px: u32,
    padding_px: u32,
) -> Result<GridImage> {
    if images.is_empty() {
        return Err(RenderError::EmptyInput);
    }
    let columns = columns.max(1);
    let thumb_px = thumb_px.max(MIN_THUMB_PX);
    let (width, height) = bounded_canvas_size(images.len(), columns, thumb_px, padding_px)?;
    let mut canvas = RgbaImage::new(width, height);

    for (index, img) in images.iter().enumerate() {
        let index = index as u32;
        let x = (index % columns) * (thumb_px + padding_px);
        let y = (index / columns) * (thumb_px + padding_px);
        let thumb = square_thumbnail(img, thumb_px);
        imageops::overlay(&mut canvas, &thumb, i64::from(x), i64::from(y));
    }

    log::debug!(
        "Composed {} thumbnails into {}x{} grid ({} columns)",
        images.len(),
        width,
        height,
        columns
    );

    let png = encode_png(&DynamicImage::ImageRgba8(canvas))?;
    Ok(GridImage { png, width, height })
}

/// Center-crop to a square and resample to `size`×`size`.
pub fn square_thumbnail(img: &DynamicImage, size: u32) -> RgbaImage {
    let (x, y, side) = center_square(img.width(), img.height());
    match img {
        // RGBA8 buffers can be viewed in place
        DynamicImage::ImageRgba8(buffer) => {
            let view = buffer.view(x, y, side, side);
            imageops::resize(&*view, size, size, FilterType::CatmullRom)
        }
        other => {
            let crop = crop_square_copy(other, x, y, side);
            imageops::resize(&crop, size, size, FilterType::CatmullRom)
        }
    }
}

/// Largest centered square `(x, y, side)` inside `width`×`height`.
pub fn center_square(width: u32, height: u32) -> (u32, u32, u32) {
    let side = width.min(height);
    ((width - side) / 2, (height - side) / 2, side)
}

fn crop_square_copy(img: &DynamicImage, x: u32, y: u32, side: u32) -> RgbaImage {
    let mut crop = RgbaImage::new(side, side);
    for (dx, dy, pixel) in crop.enumerate_pixels_mut() {
        *pixel = img.get_pixel(x + dx, y + dy);
    }
    crop
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| RenderError::Encoding(e.to_string()))?;
    Ok(buffer)
}
