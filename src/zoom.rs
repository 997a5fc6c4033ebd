/// User-drawn selection in canvas pixels. Width and height are signed; the
/// drag direction is unconstrained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Axis-aligned, in-bounds crop region produced by normalizing a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl SelectionRect {
    /// Flip negative extents, clamp to the square `[0, bounds]` surface and
    /// drop boxes with no remaining area.
    pub fn normalized(&self, bounds: usize) -> Option<CropBox> {
        let (x0, x1) = if self.width < 0.0 {
            (self.x + self.width, self.x)
        } else {
            (self.x, self.x + self.width)
        };
        let (y0, y1) = if self.height < 0.0 {
            (self.y + self.height, self.y)
        } else {
            (self.y, self.y + self.height)
        };

        let bounds = bounds as f32;
        let x0 = x0.clamp(0.0, bounds);
        let y0 = y0.clamp(0.0, bounds);
        let width = (x1.clamp(0.0, bounds) - x0) as usize;
        let height = (y1.clamp(0.0, bounds) - y0) as usize;
        if width == 0 || height == 0 {
            return None;
        }
        Some(CropBox {
            x: x0 as usize,
            y: y0 as usize,
            width,
            height,
        })
    }
}

/// Zoom interaction states. The selection only exists inside the two states
/// that can use it, so stale rectangles cannot linger while zoom is off.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ZoomState {
    #[default]
    Idle,
    Armed,
    Dragging(SelectionRect),
    Zoomed(SelectionRect),
}

/// Tracks the rectangle the user drags over the canvas. Driven purely by
/// discrete UI events; every method is synchronous.
#[derive(Debug, Default)]
pub struct ZoomSelector {
    state: ZoomState,
}

impl ZoomSelector {
    /// Whether zoom mode is on (any state but `Idle`).
    pub fn is_enabled(&self) -> bool {
        self.state != ZoomState::Idle
    }

    /// Flip zoom mode. Turning it off drops any selection, whatever the
    /// current state.
    pub fn toggle(&mut self) {
        self.state = match self.state {
            ZoomState::Idle => ZoomState::Armed,
            _ => ZoomState::Idle,
        };
    }

    /// Start a drag at the given canvas position. A drag may also start over
    /// an already magnified view, replacing the committed selection.
    pub fn pointer_down(&mut self, x: f32, y: f32) {
        if let ZoomState::Armed | ZoomState::Zoomed(_) = self.state {
            self.state = ZoomState::Dragging(SelectionRect {
                x,
                y,
                width: 0.0,
                height: 0.0,
            });
        }
    }

    /// Grow the active selection to the signed delta from the drag origin.
    pub fn pointer_move(&mut self, x: f32, y: f32) {
        if let ZoomState::Dragging(rect) = &mut self.state {
            rect.width = x - rect.x;
            rect.height = y - rect.y;
        }
    }

    /// Commit the drag; the caller applies the magnification.
    pub fn pointer_up(&mut self) {
        if let ZoomState::Dragging(rect) = self.state {
            self.state = ZoomState::Zoomed(rect);
        }
    }

    /// The selection to magnify with, once a drag has been committed.
    pub fn committed(&self) -> Option<SelectionRect> {
        match self.state {
            ZoomState::Zoomed(rect) => Some(rect),
            _ => None,
        }
    }

    /// A new volume invalidates the selection but keeps the mode.
    pub fn reset(&mut self) {
        if self.is_enabled() {
            self.state = ZoomState::Armed;
        }
    }
}
