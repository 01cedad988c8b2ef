//! Full-page capture by scrolling, tiling, and compositing.
//!
//! The page is cut into viewport-sized tiles in row-major order. For each
//! tile: scroll there, wait a fixed settle delay, capture the viewport,
//! decode, draw. Tiles are strictly sequential: the next scroll never
//! starts while a capture is in flight. Any tile failure aborts the whole
//! run; no partially composited image ever leaves this module. The
//! original scroll position is restored either way.
//!
//! One stitcher owns the page's scroll position while it runs, so runs are
//! serialized: a second request waits until the first has restored the
//! scroll, then records that as its own starting point.

use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::host::{EncodeFormat, PageHost};
use crate::imaging::{self, Canvas};
use crate::protocol::{CaptureRequest, Port};
use image::DynamicImage;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Largest composite edge, in device pixels.
pub const MAX_CANVAS_SIDE: u32 = 32_767;
/// Largest composite area, in device pixels (1 GiB of RGBA).
pub const MAX_CANVAS_PIXELS: u64 = 1 << 28;

/// Where one tile sits on the page, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileOrigin {
    pub row: u32,
    pub col: u32,
    pub offset_x: f64,
    pub offset_y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TilePlan {
    pub rows: u32,
    pub cols: u32,
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub tiles: Vec<TileOrigin>,
}

/// One captured tile, consumed by the compositor right away.
pub struct StitchTile {
    pub offset_x: f64,
    pub offset_y: f64,
    pub image: DynamicImage,
}

/// `rows = ceil(page_h / vp_h)`, `cols = ceil(page_w / vp_w)`, row-major.
pub fn plan_tiles(
    page_width: f64,
    page_height: f64,
    viewport_width: f64,
    viewport_height: f64,
) -> Result<TilePlan, CaptureError> {
    if !(viewport_width > 0.0 && viewport_height > 0.0) {
        return Err(CaptureError::StitchAbort {
            tile: 0,
            total: 0,
            reason: format!("viewport has no area ({}x{})", viewport_width, viewport_height),
        });
    }

    // A page smaller than the viewport still yields one tile.
    let rows = ((page_height / viewport_height).ceil() as u32).max(1);
    let cols = ((page_width / viewport_width).ceil() as u32).max(1);

    let mut tiles = Vec::with_capacity((rows * cols) as usize);
    for row in 0..rows {
        for col in 0..cols {
            tiles.push(TileOrigin {
                row,
                col,
                offset_x: col as f64 * viewport_width,
                offset_y: row as f64 * viewport_height,
            });
        }
    }

    Ok(TilePlan {
        rows,
        cols,
        viewport_width,
        viewport_height,
        tiles,
    })
}

/// Device-pixel size of the composite surface, or an abort if the page is
/// too large to hold in memory.
pub fn canvas_size(
    page_width: f64,
    page_height: f64,
    ratio: f64,
) -> Result<(u32, u32), CaptureError> {
    let (w, h) = ((page_width * ratio).round(), (page_height * ratio).round());
    let too_large = !(w.is_finite() && h.is_finite())
        || w > MAX_CANVAS_SIDE as f64
        || h > MAX_CANVAS_SIDE as f64
        || w.max(0.0) * h.max(0.0) > MAX_CANVAS_PIXELS as f64;
    if too_large {
        return Err(CaptureError::StitchAbort {
            tile: 0,
            total: 0,
            reason: format!(
                "page is too large to stitch ({}x{} device pixels, limit {} per side)",
                w, h, MAX_CANVAS_SIDE
            ),
        });
    }
    Ok((to_device(page_width, ratio), to_device(page_height, ratio)))
}

pub struct FullPageStitcher {
    page: Arc<dyn PageHost>,
    bus: Port,
    config: CaptureConfig,
    // Held for a whole run: scan plus scroll restore.
    running: Mutex<()>,
}

impl FullPageStitcher {
    pub fn new(page: Arc<dyn PageHost>, bus: Port, config: CaptureConfig) -> Self {
        Self {
            page,
            bus,
            config,
            running: Mutex::new(()),
        }
    }

    /// Capture the whole page and return it encoded as a data URL.
    pub async fn capture_data_url(&self, format: EncodeFormat) -> Result<String, CaptureError> {
        let image = self.capture().await?;
        let encode_start = std::time::Instant::now();
        let url = imaging::encode_data_url(&image, format)?;
        log::info!(
            "[STITCH] Encoded {}x{} as {} in {}ms",
            image.width(),
            image.height(),
            format.mime_type(),
            encode_start.elapsed().as_millis()
        );
        Ok(url)
    }

    /// Capture the whole page. Restores the scroll position on every path.
    pub async fn capture(&self) -> Result<DynamicImage, CaptureError> {
        let _run = match self.running.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                log::info!("[STITCH] Another full-page capture is running, waiting");
                self.running.lock().await
            }
        };
        let original = self.page.viewport();
        let result = self.scan().await;
        self.page.scroll_to(original.scroll_x, original.scroll_y).await;
        result
    }

    async fn scan(&self) -> Result<DynamicImage, CaptureError> {
        let start = std::time::Instant::now();
        let viewport = self.page.viewport();
        let (page_width, page_height) = self.page.page_size();
        let ratio = viewport.device_pixel_ratio;
        // Before planning: an oversized page allocates nothing.
        let (canvas_w, canvas_h) = canvas_size(page_width, page_height, ratio)?;
        let plan = plan_tiles(page_width, page_height, viewport.width, viewport.height)?;
        let total = plan.tiles.len();

        log::info!(
            "[STITCH] Page {}x{}, viewport {}x{} @{}x → {} rows × {} cols",
            page_width, page_height, viewport.width, viewport.height, ratio, plan.rows, plan.cols
        );

        let mut canvas = Canvas::new(canvas_w, canvas_h);
        let clip_w = to_device(plan.viewport_width, ratio);
        let clip_h = to_device(plan.viewport_height, ratio);

        for (index, origin) in plan.tiles.iter().enumerate() {
            let tile = self.capture_tile(origin, index + 1, total).await?;
            canvas.draw_clipped(
                &tile.image,
                to_device(tile.offset_x, ratio),
                to_device(tile.offset_y, ratio),
                clip_w,
                clip_h,
            );
        }

        log::info!(
            "[STITCH] {} tiles composited in {}ms",
            total,
            start.elapsed().as_millis()
        );
        Ok(canvas.into_image())
    }

    async fn capture_tile(
        &self,
        origin: &TileOrigin,
        tile: usize,
        total: usize,
    ) -> Result<StitchTile, CaptureError> {
        self.page.scroll_to(origin.offset_x, origin.offset_y).await;
        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }

        let abort = |reason: String| {
            log::warn!("[STITCH] Tile {}/{} failed: {}", tile, total, reason);
            CaptureError::StitchAbort {
                tile,
                total,
                reason,
            }
        };

        let data = self
            .bus
            .request_image(CaptureRequest::ScreenCapture)
            .await
            .map_err(&abort)?;
        let image = imaging::decode_data_url(&data).map_err(|e| abort(e.to_string()))?;

        log::debug!(
            "[STITCH] Tile {}/{} (row {}, col {}) at ({}, {})",
            tile, total, origin.row, origin.col, origin.offset_x, origin.offset_y
        );
        Ok(StitchTile {
            offset_x: origin.offset_x,
            offset_y: origin.offset_y,
            image,
        })
    }
}

fn to_device(css: f64, ratio: f64) -> u32 {
    (css * ratio).round().max(0.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offsets(plan: &TilePlan) -> Vec<(f64, f64)> {
        plan.tiles.iter().map(|t| (t.offset_x, t.offset_y)).collect()
    }

    #[test]
    fn square_page_needs_four_tiles() {
        let plan = plan_tiles(1000.0, 1000.0, 600.0, 600.0).unwrap();
        assert_eq!((plan.rows, plan.cols), (2, 2));
        assert_eq!(
            offsets(&plan),
            vec![(0.0, 0.0), (600.0, 0.0), (0.0, 600.0), (600.0, 600.0)]
        );
    }

    #[test]
    fn exact_multiple_has_no_extra_row() {
        let plan = plan_tiles(800.0, 1800.0, 800.0, 600.0).unwrap();
        assert_eq!((plan.rows, plan.cols), (3, 1));
    }

    #[test]
    fn small_page_is_one_tile() {
        let plan = plan_tiles(300.0, 200.0, 1280.0, 720.0).unwrap();
        assert_eq!(offsets(&plan), vec![(0.0, 0.0)]);
    }

    #[test]
    fn zero_viewport_is_rejected() {
        assert!(matches!(
            plan_tiles(100.0, 100.0, 0.0, 600.0),
            Err(CaptureError::StitchAbort { .. })
        ));
    }

    #[test]
    fn canvas_size_is_in_device_pixels() {
        assert_eq!(canvas_size(500.0, 700.0, 2.0).unwrap(), (1000, 1400));
    }

    #[test]
    fn oversized_page_is_refused_before_allocating() {
        match canvas_size(1280.0, 200_000.0, 2.0) {
            Err(CaptureError::StitchAbort { tile, reason, .. }) => {
                assert_eq!(tile, 0);
                assert!(reason.contains("too large"));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(canvas_size(f64::INFINITY, 100.0, 1.0).is_err());
        // Within each side limit but over the area limit.
        assert!(canvas_size(30_000.0, 30_000.0, 1.0).is_err());
    }

    #[test]
    fn device_scaling_rounds() {
        assert_eq!(to_device(600.0, 2.0), 1200);
        assert_eq!(to_device(333.3, 1.5), 500);
    }
}
