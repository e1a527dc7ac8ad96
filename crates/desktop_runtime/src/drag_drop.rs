//! Pointer gesture translator.
//!
//! Turns headless pointer events addressed to a [`PointerTarget`] into [`WindowManager`]
//! commands. The only state held here is the gesture in progress.

use serde_json::json;

use crate::{
    event_bus::topics,
    model::{
        DragSession, Gesture, PointerPosition, PointerTarget, ResizeEdge, ResizeSession,
        WindowControl, WindowId, WindowRect, WINDOW_HEADER_HEIGHT,
    },
    window_manager::{resize_rect, WindowManager},
};

#[derive(Debug)]
pub struct DragDropManager {
    windows: WindowManager,
    gesture: Gesture,
    header_height: i32,
}

impl DragDropManager {
    pub fn new(windows: WindowManager) -> Self {
        Self::with_header_height(windows, WINDOW_HEADER_HEIGHT)
    }

    pub fn with_header_height(windows: WindowManager, header_height: i32) -> Self {
        Self {
            windows,
            gesture: Gesture::Idle,
            header_height,
        }
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn is_idle(&self) -> bool {
        self.gesture == Gesture::Idle
    }

    /// Double-clicking a header toggles maximize. Returns `true` when handled.
    pub fn double_click(&mut self, target: PointerTarget) -> bool {
        match target {
            PointerTarget::Header(id) => self.windows.maximize_window(id),
            _ => false,
        }
    }

    pub fn pointer_down(&mut self, target: PointerTarget, pointer: PointerPosition) {
        match target {
            PointerTarget::ResizeHandle(id, edge) => self.begin_resize(id, edge, pointer),
            PointerTarget::Header(id) => self.begin_drag(id, pointer),
            PointerTarget::Control(id, control) => {
                match control {
                    WindowControl::Minimize => self.windows.minimize_window(id),
                    WindowControl::Maximize => self.windows.maximize_window(id),
                    WindowControl::Close => self.windows.close_window(id),
                };
            }
            PointerTarget::Body(id) => {
                self.windows.focus_window(id);
            }
            PointerTarget::Desktop => {}
        }
    }

    fn begin_resize(&mut self, id: WindowId, edge: ResizeEdge, pointer: PointerPosition) {
        let Some(record) = self.windows.window(id) else {
            return;
        };
        if record.is_maximized() || record.is_minimized() || record.closing {
            return;
        }
        self.windows.focus_window(id);
        self.gesture = Gesture::Resizing(ResizeSession {
            window_id: id,
            edge,
            pointer_start: pointer,
            rect_start: record.rect,
        });
    }

    fn begin_drag(&mut self, id: WindowId, pointer: PointerPosition) {
        let Some(record) = self.windows.window(id) else {
            return;
        };
        if record.closing {
            return;
        }

        let rect_start = if record.is_maximized() {
            // Keep the pointer at the same fraction of the header width after restoring.
            let ratio = if record.rect.w > 0 {
                f64::from(pointer.x - record.rect.x) / f64::from(record.rect.w)
            } else {
                0.0
            };
            self.windows.maximize_window(id);
            let Some(restored) = self.windows.window(id) else {
                return;
            };
            let left = pointer.x - (f64::from(restored.rect.w) * ratio).round() as i32;
            let top = pointer.y - self.header_height / 2;
            let placed = restored.rect.with_origin(left, top).clamped_origin();
            self.windows.set_window_rect(id, placed);
            placed
        } else {
            record.rect
        };

        self.windows.focus_window(id);
        self.gesture = Gesture::Dragging(DragSession {
            window_id: id,
            pointer_start: pointer,
            rect_start,
        });
    }

    pub fn pointer_move(&mut self, pointer: PointerPosition) {
        match &self.gesture {
            Gesture::Idle => {}
            Gesture::Dragging(session) => {
                let rect = session
                    .rect_start
                    .offset(
                        pointer.x - session.pointer_start.x,
                        pointer.y - session.pointer_start.y,
                    )
                    .clamped_origin();
                self.windows.set_window_rect(session.window_id, rect);
            }
            Gesture::Resizing(session) => {
                let settings = self.windows.settings();
                let rect = resize_rect(
                    session.rect_start,
                    session.edge,
                    pointer.x - session.pointer_start.x,
                    pointer.y - session.pointer_start.y,
                    settings.min_width,
                    settings.min_height,
                );
                self.windows.set_window_rect(session.window_id, rect);
            }
        }
    }

    /// Ends the active gesture and announces the final geometry.
    pub fn pointer_up(&mut self) {
        let gesture = std::mem::take(&mut self.gesture);
        let (event, id) = match gesture {
            Gesture::Idle => return,
            Gesture::Dragging(session) => (topics::WINDOW_MOVED, session.window_id),
            Gesture::Resizing(session) => (topics::WINDOW_RESIZED, session.window_id),
        };
        let (Some(bus), Some(record)) = (self.windows.bus(), self.windows.window(id)) else {
            return;
        };
        let WindowRect { x, y, w, h } = record.rect;
        let data = if event == topics::WINDOW_MOVED {
            json!({ "windowId": id, "x": x, "y": y })
        } else {
            json!({ "windowId": id, "x": x, "y": y, "width": w, "height": h })
        };
        bus.emit(event, data);
    }

    /// Drops the active gesture without announcing it.
    pub fn cancel(&mut self) {
        self.gesture = Gesture::Idle;
    }
}
