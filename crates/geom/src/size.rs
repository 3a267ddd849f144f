use super::{Point, Rect};

/// A `Size` is a rectangle that has a width and height but no location.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Default)]
pub struct Size {
    pub w: i32,
    pub h: i32,
}

impl Size {
    pub fn new(w: i32, h: i32) -> Self {
        Self { w, h }
    }

    pub fn zero() -> Self {
        Self { w: 0, h: 0 }
    }

    /// True if either dimension is zero or negative.
    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    /// Width over height. Zero heights yield an aspect ratio of zero.
    pub fn aspect_ratio(&self) -> f32 {
        if self.h == 0 {
            0.0
        } else {
            self.w as f32 / self.h as f32
        }
    }

    /// Return a `Rect` with the same dimensions as the `Size`, located at (0, 0).
    pub fn rect(&self) -> Rect {
        Rect {
            tl: Point::default(),
            w: self.w,
            h: self.h,
        }
    }
}

impl From<Rect> for Size {
    fn from(r: Rect) -> Self {
        Self { w: r.w, h: r.h }
    }
}

impl From<(i32, i32)> for Size {
    fn from(v: (i32, i32)) -> Self {
        Self { w: v.0, h: v.1 }
    }
}
