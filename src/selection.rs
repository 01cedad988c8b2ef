//! Rectangular selection state machine.
//!
//! `Idle → Selecting → Complete → Idle`. A drag that ends with zero area
//! is a tap, not a selection, and falls straight back to `Idle`.

use crate::geometry::{Point, Rect, Viewport};
use serde::Serialize;
use std::str::FromStr;
use thiserror::Error;

/// Smallest width/height a selection may be resized or captured at.
pub const MIN_SELECTION_SIZE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionState {
    Idle,
    Selecting,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot {op} while {state:?}")]
pub struct InvalidTransition {
    pub op: &'static str,
    pub state: SelectionState,
}

/// One of the eight resize grips around a completed selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeHandle {
    NorthWest,
    North,
    NorthEast,
    West,
    East,
    SouthWest,
    South,
    SouthEast,
}

impl ResizeHandle {
    pub const ALL: [ResizeHandle; 8] = [
        ResizeHandle::NorthWest,
        ResizeHandle::North,
        ResizeHandle::NorthEast,
        ResizeHandle::West,
        ResizeHandle::East,
        ResizeHandle::SouthWest,
        ResizeHandle::South,
        ResizeHandle::SouthEast,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            ResizeHandle::NorthWest => "nw",
            ResizeHandle::North => "n",
            ResizeHandle::NorthEast => "ne",
            ResizeHandle::West => "w",
            ResizeHandle::East => "e",
            ResizeHandle::SouthWest => "sw",
            ResizeHandle::South => "s",
            ResizeHandle::SouthEast => "se",
        }
    }

    fn moves_left(&self) -> bool {
        matches!(
            self,
            ResizeHandle::NorthWest | ResizeHandle::West | ResizeHandle::SouthWest
        )
    }

    fn moves_right(&self) -> bool {
        matches!(
            self,
            ResizeHandle::NorthEast | ResizeHandle::East | ResizeHandle::SouthEast
        )
    }

    fn moves_top(&self) -> bool {
        matches!(
            self,
            ResizeHandle::NorthWest | ResizeHandle::North | ResizeHandle::NorthEast
        )
    }

    fn moves_bottom(&self) -> bool {
        matches!(
            self,
            ResizeHandle::SouthWest | ResizeHandle::South | ResizeHandle::SouthEast
        )
    }
}

impl FromStr for ResizeHandle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResizeHandle::ALL
            .into_iter()
            .find(|h| h.key() == s)
            .ok_or_else(|| format!("Unknown resize handle: {}", s))
    }
}

/// An in-progress or completed selection, in page coordinates.
#[derive(Debug, Clone)]
pub struct Selection {
    state: SelectionState,
    origin: Option<Point>,
    rect: Option<Rect>,
    show_warning: bool,
    min_size: f64,
}

impl Default for Selection {
    fn default() -> Self {
        Self::new(MIN_SELECTION_SIZE)
    }
}

impl Selection {
    pub fn new(min_size: f64) -> Self {
        Self {
            state: SelectionState::Idle,
            origin: None,
            rect: None,
            show_warning: false,
            min_size,
        }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn rect(&self) -> Option<Rect> {
        self.rect
    }

    /// The rect only once it is a real selection (complete, positive area).
    pub fn completed_rect(&self) -> Option<Rect> {
        match self.state {
            SelectionState::Complete => self.rect.filter(|r| !r.is_empty()),
            _ => None,
        }
    }

    pub fn show_warning(&self) -> bool {
        self.show_warning
    }

    pub fn min_size(&self) -> f64 {
        self.min_size
    }

    pub fn is_selecting(&self) -> bool {
        self.state == SelectionState::Selecting
    }

    pub fn is_complete(&self) -> bool {
        self.state == SelectionState::Complete
    }

    /// Force the warning flag, e.g. after a failed capture.
    pub fn set_warning(&mut self, warning: bool) {
        self.show_warning = warning;
    }

    pub fn start_selection(&mut self, x: f64, y: f64) -> Result<(), InvalidTransition> {
        self.require(SelectionState::Idle, "start a selection")?;
        let origin = Point::new(x, y);
        self.origin = Some(origin);
        self.rect = Some(Rect::new(x, y, 0.0, 0.0));
        self.show_warning = false;
        self.state = SelectionState::Selecting;
        Ok(())
    }

    pub fn update_selection(
        &mut self,
        x: f64,
        y: f64,
        viewport: &Viewport,
    ) -> Result<Rect, InvalidTransition> {
        self.require(SelectionState::Selecting, "update a selection")?;
        let origin = self.origin.unwrap_or(Point::new(x, y));
        let rect = Rect::from_corners(origin, Point::new(x, y));
        self.rect = Some(rect);
        self.refresh_warning(viewport);
        Ok(rect)
    }

    pub fn complete_selection(&mut self) -> Result<SelectionState, InvalidTransition> {
        self.require(SelectionState::Selecting, "complete a selection")?;
        match self.rect {
            Some(rect) if !rect.is_empty() => {
                self.state = SelectionState::Complete;
                log::debug!(
                    "[SELECTION] Complete: {}x{} at ({},{})",
                    rect.width, rect.height, rect.x, rect.y
                );
            }
            _ => {
                log::debug!("[SELECTION] Zero-area drag treated as a tap");
                self.clear();
            }
        }
        Ok(self.state)
    }

    /// Drag a grip by `(dx, dy)`. New edges are computed first and the
    /// size clamp applied afterwards, so once the minimum is hit the
    /// origin keeps following the cursor while the size stays put.
    pub fn resize_via_handle(
        &mut self,
        handle: ResizeHandle,
        dx: f64,
        dy: f64,
        viewport: &Viewport,
    ) -> Result<Rect, InvalidTransition> {
        self.require(SelectionState::Complete, "resize a selection")?;
        let current = self.rect.unwrap_or_default();
        let (mut x, mut y) = (current.x, current.y);
        let (mut width, mut height) = (current.width, current.height);

        if handle.moves_left() {
            x += dx;
            width -= dx;
        }
        if handle.moves_right() {
            width += dx;
        }
        if handle.moves_top() {
            y += dy;
            height -= dy;
        }
        if handle.moves_bottom() {
            height += dy;
        }

        let rect = Rect::new(x, y, width.max(self.min_size), height.max(self.min_size));
        self.rect = Some(rect);
        self.refresh_warning(viewport);
        Ok(rect)
    }

    /// Valid from any state.
    pub fn cancel_selection(&mut self) {
        if self.state != SelectionState::Idle {
            log::debug!("[SELECTION] Cancelled from {:?}", self.state);
        }
        self.clear();
    }

    /// Recompute the off-screen warning against a fresh viewport.
    pub fn refresh_warning(&mut self, viewport: &Viewport) {
        self.show_warning = match self.rect {
            Some(rect) => !viewport.shows(&rect),
            None => false,
        };
    }

    fn clear(&mut self) {
        self.state = SelectionState::Idle;
        self.origin = None;
        self.rect = None;
        self.show_warning = false;
    }

    fn require(&self, expected: SelectionState, op: &'static str) -> Result<(), InvalidTransition> {
        if self.state == expected {
            Ok(())
        } else {
            Err(InvalidTransition {
                op,
                state: self.state,
            })
        }
    }
}
