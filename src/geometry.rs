//! Page ↔ viewport coordinate transforms.
//!
//! Page coordinates are scroll-independent (origin at the document's
//! top-left). Viewport coordinates are relative to the visible window.
//! Capture primitives only ever see viewport pixels, while selections
//! live in page space so they survive scrolling.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle. `width`/`height` are never negative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    /// Normalized rectangle spanned by two corners, in either order.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (b.x - a.x).abs(),
            height: (b.y - a.y).abs(),
        }
    }

    /// Zero width or zero height counts as "no selection".
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// True when the two rectangles share any area. Touching edges do not count.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        if !self.intersects(other) {
            return None;
        }
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        Some(Rect::new(
            x,
            y,
            self.right().min(other.right()) - x,
            self.bottom().min(other.bottom()) - y,
        ))
    }

    /// Grow either dimension up to `min` without moving the origin.
    pub fn with_min_size(&self, min: f64) -> Rect {
        Rect::new(self.x, self.y, self.width.max(min), self.height.max(min))
    }

    /// Multiply every component, e.g. CSS pixels → device pixels.
    pub fn scaled(&self, factor: f64) -> Rect {
        Rect::new(
            self.x * factor,
            self.y * factor,
            self.width * factor,
            self.height * factor,
        )
    }
}

/// Snapshot of the visible window. Read fresh at use time: the user can
/// scroll between any two awaits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    #[serde(default)]
    pub scroll_x: f64,
    #[serde(default)]
    pub scroll_y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_pixel_ratio")]
    pub device_pixel_ratio: f64,
}

fn default_pixel_ratio() -> f64 {
    1.0
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            scroll_x: 0.0,
            scroll_y: 0.0,
            width,
            height,
            device_pixel_ratio: 1.0,
        }
    }

    pub fn scrolled_to(mut self, x: f64, y: f64) -> Self {
        self.scroll_x = x;
        self.scroll_y = y;
        self
    }

    pub fn with_pixel_ratio(mut self, ratio: f64) -> Self {
        self.device_pixel_ratio = if ratio > 0.0 { ratio } else { 1.0 };
        self
    }

    /// The visible region, expressed in page coordinates. Non-finite
    /// offsets are treated as 0.
    pub fn page_bounds(&self) -> Rect {
        Rect::new(
            finite_or_zero(self.scroll_x),
            finite_or_zero(self.scroll_y),
            self.width,
            self.height,
        )
    }

    pub fn page_to_viewport(&self, page: Point) -> Point {
        page_to_viewport(page, self.scroll_x, self.scroll_y)
    }

    pub fn viewport_to_page(&self, view: Point) -> Point {
        viewport_to_page(view, self.scroll_x, self.scroll_y)
    }

    pub fn rect_to_viewport(&self, rect: &Rect) -> Rect {
        let origin = self.page_to_viewport(Point::new(rect.x, rect.y));
        Rect::new(origin.x, origin.y, rect.width, rect.height)
    }

    /// True when any part of a page-space rect is on screen.
    pub fn shows(&self, rect: &Rect) -> bool {
        self.page_bounds().intersects(rect)
    }
}

/// Subtract the scroll offset. Non-finite offsets are treated as 0.
pub fn page_to_viewport(page: Point, scroll_x: f64, scroll_y: f64) -> Point {
    Point::new(page.x - finite_or_zero(scroll_x), page.y - finite_or_zero(scroll_y))
}

pub fn viewport_to_page(view: Point, scroll_x: f64, scroll_y: f64) -> Point {
    Point::new(view.x + finite_or_zero(scroll_x), view.y + finite_or_zero(scroll_y))
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}
