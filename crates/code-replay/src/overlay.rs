//! Synthetic cursor and selection overlays.
//!
//! The replay widget is read-only and never focused, so its native cursor and selection are
//! useless for showing the recorded caret. The replayer draws its own: a cursor bar placed
//! with the widget's coordinate lookup and blinking at the widget's blink rate, and a
//! selection made of one rectangle per covered line.
//!
//! Overlays only compute geometry. Hosts read [`CursorOverlay::rect`] and
//! [`SelectionOverlay::rects`] and draw them however they draw.

use crate::ops::{Position, SelectionRange};
use crate::widget::EditorWidget;
use std::time::Duration;

/// Geometry of the synthetic cursor bar.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CursorRect {
    /// Left edge.
    pub left: f64,
    /// Top edge.
    pub top: f64,
    /// Bar height.
    pub height: f64,
}

/// One row of a synthetic selection.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SelectionRect {
    /// Left edge.
    pub left: f64,
    /// Top edge.
    pub top: f64,
    /// Row width.
    pub width: f64,
    /// Row height.
    pub height: f64,
}

/// Fixed-period blink timer.
#[derive(Debug, Clone)]
pub struct Blinker {
    interval: Duration,
    elapsed: Duration,
}

impl Blinker {
    /// A blinker that toggles every `interval`. A zero interval never toggles.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            elapsed: Duration::ZERO,
        }
    }

    /// Blink period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Advance by `dt`; returns how many toggles are due.
    pub fn advance(&mut self, dt: Duration) -> u32 {
        if self.interval.is_zero() {
            return 0;
        }
        self.elapsed += dt;
        let mut toggles = 0;
        while self.elapsed >= self.interval {
            self.elapsed -= self.interval;
            toggles += 1;
        }
        toggles
    }
}

/// The replayer-owned cursor.
#[derive(Debug, Clone)]
pub struct CursorOverlay {
    position: Position,
    rect: CursorRect,
    visible: bool,
    blinker: Blinker,
}

impl CursorOverlay {
    /// A visible cursor at the start of the document.
    pub fn new(blink_rate: Duration) -> Self {
        Self {
            position: Position::default(),
            rect: CursorRect::default(),
            visible: true,
            blinker: Blinker::new(blink_rate),
        }
    }

    /// Move the cursor to `pos`, measuring it against `widget`.
    pub fn place(&mut self, widget: &dyn EditorWidget, pos: Position) {
        let coords = widget.cursor_coords(pos);
        self.rect = CursorRect {
            left: coords.left,
            top: coords.top,
            height: coords.height() * widget.cursor_height(),
        };
        self.position = pos;
    }

    /// Logical position of the cursor.
    pub fn position(&self) -> Position {
        self.position
    }

    /// Current geometry.
    pub fn rect(&self) -> CursorRect {
        self.rect
    }

    /// Whether the cursor is in the "on" phase of its blink.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Toggle visibility once (one blink timer firing).
    pub fn blink(&mut self) {
        self.visible = !self.visible;
    }

    /// Advance the blink timer by `dt`, toggling as many times as intervals elapsed.
    pub fn advance(&mut self, dt: Duration) {
        for _ in 0..self.blinker.advance(dt) {
            self.blink();
        }
    }

    /// Blink period.
    pub fn blink_interval(&self) -> Duration {
        self.blinker.interval()
    }
}

/// The replayer-owned selection.
#[derive(Debug, Clone, Default)]
pub struct SelectionOverlay {
    range: Option<SelectionRange>,
    rects: Vec<SelectionRect>,
}

impl SelectionOverlay {
    /// An empty overlay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the drawn selection. `None` or an empty range clears it.
    pub fn render(&mut self, widget: &dyn EditorWidget, range: Option<SelectionRange>) {
        self.range = range;
        self.rects.clear();

        let Some(range) = range.filter(|r| !r.is_empty()) else {
            return;
        };
        let (from, to) = range.ordered();

        let from_coords = widget.cursor_coords(from);
        let to_coords = widget.cursor_coords(to);
        let start_coords = widget.cursor_coords(Position::new(0, 0));

        let height = from_coords.height() * widget.cursor_height();
        let max_width = widget.wrapper_width();

        for line in from.line..=to.line {
            let top = from_coords.top + (line - from.line) as f64 * height;
            let (left, width) = if line == from.line {
                if from.line == to.line {
                    (from_coords.left, to_coords.left - from_coords.left)
                } else {
                    (from_coords.left, max_width - from_coords.left)
                }
            } else if line == to.line {
                (start_coords.left, to_coords.left - start_coords.left)
            } else {
                (start_coords.left, max_width)
            };

            self.rects.push(SelectionRect {
                left,
                top,
                width,
                height,
            });
        }
    }

    /// The selection currently drawn.
    pub fn range(&self) -> Option<SelectionRange> {
        self.range
    }

    /// One rectangle per covered line, top to bottom.
    pub fn rects(&self) -> &[SelectionRect] {
        &self.rects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blinker_counts_whole_intervals() {
        let mut blinker = Blinker::new(Duration::from_millis(500));
        assert_eq!(blinker.advance(Duration::from_millis(200)), 0);
        assert_eq!(blinker.advance(Duration::from_millis(300)), 1);
        assert_eq!(blinker.advance(Duration::from_millis(1100)), 2);
    }

    #[test]
    fn test_zero_interval_never_blinks() {
        let mut cursor = CursorOverlay::new(Duration::ZERO);
        cursor.advance(Duration::from_secs(10));
        assert!(cursor.is_visible());
    }

    #[test]
    fn test_blink_toggles_visibility() {
        let mut cursor = CursorOverlay::new(Duration::from_millis(530));
        cursor.advance(Duration::from_millis(530));
        assert!(!cursor.is_visible());
        cursor.blink();
        assert!(cursor.is_visible());
    }
}
