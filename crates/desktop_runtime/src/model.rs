use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_WINDOW_WIDTH: i32 = 600;
pub const DEFAULT_WINDOW_HEIGHT: i32 = 400;
/// Minimum managed window width.
pub const MIN_WINDOW_WIDTH: i32 = 400;
/// Minimum managed window height.
pub const MIN_WINDOW_HEIGHT: i32 = 300;
/// Height of a window's title bar, used to place a window restored by a header drag.
pub const WINDOW_HEADER_HEIGHT: i32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl WindowRect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }

    pub fn with_origin(self, x: i32, y: i32) -> Self {
        Self { x, y, ..self }
    }

    pub fn clamped_min(self, min_w: i32, min_h: i32) -> Self {
        Self {
            w: self.w.max(min_w),
            h: self.h.max(min_h),
            ..self
        }
    }

    /// Clamps the origin so the rect never sits left of or above the viewport origin.
    pub fn clamped_origin(self) -> Self {
        Self {
            x: self.x.max(0),
            y: self.y.max(0),
            ..self
        }
    }
}

impl Default for WindowRect {
    fn default() -> Self {
        Self {
            x: 100,
            y: 100,
            w: DEFAULT_WINDOW_WIDTH,
            h: DEFAULT_WINDOW_HEIGHT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
/// Display state of a window.
///
/// Minimized and maximized are exclusive, and the pre-maximize geometry exists only while the
/// window is maximized.
pub enum WindowMode {
    #[default]
    Normal,
    Minimized,
    Maximized {
        /// Geometry to return to when the window is restored.
        restore_rect: WindowRect,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRecord {
    pub id: WindowId,
    pub title: String,
    pub rect: WindowRect,
    pub content: String,
    pub persistent: bool,
    pub mode: WindowMode,
    pub z_index: u32,
    /// Set while the close animation runs; the window is removed when it finishes.
    pub closing: bool,
}

impl WindowRecord {
    pub fn is_minimized(&self) -> bool {
        matches!(self.mode, WindowMode::Minimized)
    }

    pub fn is_maximized(&self) -> bool {
        matches!(self.mode, WindowMode::Maximized { .. })
    }

    pub fn restore_rect(&self) -> Option<WindowRect> {
        match self.mode {
            WindowMode::Maximized { restore_rect } => Some(restore_rect),
            _ => None,
        }
    }

    /// Geometry the window occupies when shown normally.
    pub fn normal_rect(&self) -> WindowRect {
        self.restore_rect().unwrap_or(self.rect)
    }

    pub fn state_label(&self) -> &'static str {
        match self.mode {
            WindowMode::Normal => "normal",
            WindowMode::Minimized => "minimized",
            WindowMode::Maximized { .. } => "maximized",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowStats {
    pub total: usize,
    pub active: Option<WindowId>,
    pub minimized: usize,
    pub maximized: usize,
    pub normal: usize,
    pub z_index: u32,
}

/// Persistence-worthy subset of a window, as saved under the layout snapshot key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedWindow {
    pub id: WindowId,
    pub title: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub minimized: bool,
    #[serde(default)]
    pub maximized: bool,
    #[serde(default)]
    pub persistent: bool,
}

impl PersistedWindow {
    /// Captures a record. Maximized windows persist the geometry they restore to.
    pub fn from_record(record: &WindowRecord) -> Self {
        let rect = record.normal_rect();
        Self {
            id: record.id,
            title: record.title.clone(),
            x: rect.x,
            y: rect.y,
            width: rect.w,
            height: rect.h,
            minimized: record.is_minimized(),
            maximized: record.is_maximized(),
            persistent: record.persistent,
        }
    }

    pub fn rect(&self) -> WindowRect {
        WindowRect::new(self.x, self.y, self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerPosition {
    pub x: i32,
    pub y: i32,
}

impl PointerPosition {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResizeEdge {
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl ResizeEdge {
    /// Parses a handle direction such as `"n"`, `"se"` or `"resize-nw"`.
    pub fn from_direction(direction: &str) -> Option<Self> {
        let direction = direction.strip_prefix("resize-").unwrap_or(direction);
        match direction.to_ascii_lowercase().as_str() {
            "n" => Some(Self::North),
            "s" => Some(Self::South),
            "e" => Some(Self::East),
            "w" => Some(Self::West),
            "ne" => Some(Self::NorthEast),
            "nw" => Some(Self::NorthWest),
            "se" => Some(Self::SouthEast),
            "sw" => Some(Self::SouthWest),
            _ => None,
        }
    }

    pub fn moves_north(self) -> bool {
        matches!(self, Self::North | Self::NorthEast | Self::NorthWest)
    }

    pub fn moves_south(self) -> bool {
        matches!(self, Self::South | Self::SouthEast | Self::SouthWest)
    }

    pub fn moves_east(self) -> bool {
        matches!(self, Self::East | Self::NorthEast | Self::SouthEast)
    }

    pub fn moves_west(self) -> bool {
        matches!(self, Self::West | Self::NorthWest | Self::SouthWest)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowControl {
    Minimize,
    Maximize,
    Close,
}

/// Element of the window chrome a pointer event landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTarget {
    Desktop,
    Header(WindowId),
    Body(WindowId),
    Control(WindowId, WindowControl),
    ResizeHandle(WindowId, ResizeEdge),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSession {
    pub window_id: WindowId,
    pub pointer_start: PointerPosition,
    pub rect_start: WindowRect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeSession {
    pub window_id: WindowId,
    pub edge: ResizeEdge,
    pub pointer_start: PointerPosition,
    pub rect_start: WindowRect,
}

/// Pointer gesture in progress. At most one exists at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Gesture {
    #[default]
    Idle,
    Dragging(DragSession),
    Resizing(ResizeSession),
}
