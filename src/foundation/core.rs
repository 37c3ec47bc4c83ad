pub use kurbo::{Point, Rect, Vec2};

/// Output canvas size in pixels, serialized as `[width, height]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl From<[u32; 2]> for Canvas {
    fn from(v: [u32; 2]) -> Self {
        Self {
            width: v[0],
            height: v[1],
        }
    }
}

impl From<Canvas> for [u32; 2] {
    fn from(c: Canvas) -> Self {
        [c.width, c.height]
    }
}

/// Axis-aligned pixel rectangle, serialized as `[x, y, w, h]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct BoxPx {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl BoxPx {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn is_degenerate(self) -> bool {
        self.w <= 0 || self.h <= 0
    }
}

impl From<[i32; 4]> for BoxPx {
    fn from(v: [i32; 4]) -> Self {
        Self {
            x: v[0],
            y: v[1],
            w: v[2],
            h: v[3],
        }
    }
}

impl From<BoxPx> for [i32; 4] {
    fn from(b: BoxPx) -> Self {
        [b.x, b.y, b.w, b.h]
    }
}
