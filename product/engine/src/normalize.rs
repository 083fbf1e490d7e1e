use crate::{HarvestError, Result};
use image::{ColorType, DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

pub const CANONICAL_EXTENSION: &str = "png";

#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
    pub raw_fallback: Option<String>,
}

pub fn normalize_image(data: &[u8]) -> NormalizedImage {
    match reencode(data) {
        Ok(bytes) => NormalizedImage {
            bytes,
            extension: CANONICAL_EXTENSION,
            raw_fallback: None,
        },
        Err(err) => NormalizedImage {
            bytes: data.to_vec(),
            extension: CANONICAL_EXTENSION,
            raw_fallback: Some(err.to_string()),
        },
    }
}

pub fn reencode(data: &[u8]) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(data).map_err(|e| HarvestError::Decode(e.to_string()))?;
    let standard = to_standard_mode(decoded);

    let mut out = Vec::new();
    standard
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .map_err(|e| HarvestError::Decode(format!("png encode failed: {e}")))?;
    Ok(out)
}

fn to_standard_mode(img: DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        return DynamicImage::ImageRgb8(flatten_alpha(&img));
    }
    match img.color() {
        ColorType::Rgb8 | ColorType::L8 => img,
        ColorType::L16 => DynamicImage::ImageLuma8(img.to_luma8()),
        _ => DynamicImage::ImageRgb8(img.to_rgb8()),
    }
}

/// Composites onto opaque white using the alpha channel as the blend mask.
pub fn flatten_alpha(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut out = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u32::from(a);
        let blend = |c: u8| -> u8 {
            let value = (u32::from(c) * alpha + 255 * (255 - alpha) + 127) / 255;
            value.min(255) as u8
        };
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}
