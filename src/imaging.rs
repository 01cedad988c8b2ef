//! Image plumbing: data URLs in and out, crop, composite.
//!
//! All pixel work is delegated to the `image` crate; this module only
//! converts between the encoded payloads that cross the message bus and
//! in-memory buffers.

use crate::error::CaptureError;
use crate::geometry::{Rect, Viewport};
use crate::host::EncodeFormat;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, RgbaImage};

const DATA_URL_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// Decode a `data:image/...;base64,...` URL (or bare base64) into pixels.
pub fn decode_data_url(data_url: &str) -> Result<DynamicImage, CaptureError> {
    let payload = match data_url.strip_prefix(DATA_URL_PREFIX) {
        Some(rest) => {
            let idx = rest
                .find(BASE64_MARKER)
                .ok_or_else(|| CaptureError::Decode("data URL is not base64-encoded".into()))?;
            &rest[idx + BASE64_MARKER.len()..]
        }
        None => data_url,
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| CaptureError::Decode(format!("bad base64: {}", e)))?;

    image::load_from_memory(&bytes).map_err(|e| CaptureError::Decode(e.to_string()))
}

/// Encode pixels to bytes in the requested format.
pub fn encode_bytes(img: &DynamicImage, format: EncodeFormat) -> Result<Vec<u8>, CaptureError> {
    let mut bytes = Vec::new();
    match format {
        EncodeFormat::Png => img
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .map_err(|e| CaptureError::Encode(format!("PNG encode failed: {}", e)))?,
        EncodeFormat::Jpeg(quality) => {
            // JPEG has no alpha channel.
            let rgb = img.to_rgb8();
            JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
                .encode_image(&rgb)
                .map_err(|e| CaptureError::Encode(format!("JPEG encode failed: {}", e)))?
        }
    }
    Ok(bytes)
}

pub fn encode_data_url(img: &DynamicImage, format: EncodeFormat) -> Result<String, CaptureError> {
    let bytes = encode_bytes(img, format)?;
    let b64 = base64::engine::general_purpose::STANDARD.encode(&bytes);
    Ok(format!("data:{};base64,{}", format.mime_type(), b64))
}

/// Pixel rectangle of `rect` (already in image space) clipped to the
/// image bounds. `None` if nothing of it lies inside the image.
pub fn pixel_bounds(img: &DynamicImage, rect: &Rect) -> Option<(u32, u32, u32, u32)> {
    let (iw, ih) = img.dimensions();
    let bounds = Rect::new(0.0, 0.0, iw as f64, ih as f64);
    let clipped = rect.intersection(&bounds)?;

    let x = clipped.x.round() as u32;
    let y = clipped.y.round() as u32;
    let w = (clipped.width.round() as u32).min(iw.saturating_sub(x));
    let h = (clipped.height.round() as u32).min(ih.saturating_sub(y));
    if w == 0 || h == 0 {
        return None;
    }
    Some((x, y, w, h))
}

/// Crop to `rect`, clipped to the image.
pub fn crop(img: &DynamicImage, rect: &Rect) -> Result<DynamicImage, CaptureError> {
    let (x, y, w, h) = pixel_bounds(img, rect).ok_or_else(|| {
        CaptureError::SelectionInvalid(format!(
            "{}x{} at ({},{}) lies outside the {}x{} capture",
            rect.width,
            rect.height,
            rect.x,
            rect.y,
            img.width(),
            img.height()
        ))
    })?;
    Ok(img.crop_imm(x, y, w, h))
}

/// Encoding matching an incoming data URL's container. Lossy sources are
/// re-encoded at full quality so a crop does not degrade them twice.
pub fn format_of(data_url: &str) -> EncodeFormat {
    if data_url.starts_with("data:image/jpeg") || data_url.starts_with("data:image/jpg") {
        EncodeFormat::Jpeg(100)
    } else {
        EncodeFormat::Png
    }
}

/// Crop a viewport capture to a page-space rectangle.
///
/// The rect is mapped through the viewport given here, so callers pass the
/// scroll position at crop time rather than at selection time.
pub fn crop_capture_to_page_rect(
    data_url: &str,
    page_rect: &Rect,
    viewport: &Viewport,
) -> Result<String, CaptureError> {
    let captured = decode_data_url(data_url)?;
    let in_pixels = viewport
        .rect_to_viewport(page_rect)
        .scaled(viewport.device_pixel_ratio);
    let cropped = crop(&captured, &in_pixels)?;
    encode_data_url(&cropped, format_of(data_url))
}

/// A drawing surface for compositing tiles.
pub struct Canvas {
    surface: RgbaImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            surface: RgbaImage::new(width, height),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.surface.dimensions()
    }

    /// Draw at most `clip_w × clip_h` of `tile` with its top-left at
    /// `(x, y)`. Pixels landing outside the surface are dropped.
    pub fn draw_clipped(&mut self, tile: &DynamicImage, x: u32, y: u32, clip_w: u32, clip_h: u32) {
        let w = clip_w.min(tile.width());
        let h = clip_h.min(tile.height());
        if w == 0 || h == 0 {
            return;
        }
        let region = tile.crop_imm(0, 0, w, h).to_rgba8();
        image::imageops::replace(&mut self.surface, &region, x as i64, y as i64);
    }

    pub fn into_image(self) -> DynamicImage {
        DynamicImage::ImageRgba8(self.surface)
    }
}
