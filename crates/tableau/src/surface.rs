//! Traits for the external collaborators of the engine: the draw surface,
//! the font metrics provider, and the cursor/tooltip chrome.

use std::collections::HashMap;

use geom::{Point, Rect};

use crate::{draw::DrawList, event::CursorShape};

/// A directly-addressable region of the render surface that an opaque
/// top-level layer draws into without routing through its container.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct SectionId(pub u32);

/// The surface adapter that turns drawing commands into pixels.
///
/// `draw` receives the root buffer; sections receive opaque sublayer
/// buffers with stable surface coordinates. Called from layer worker
/// threads, so implementations must be thread-safe.
pub trait DrawSink: Send + Sync {
    fn draw(&self, commands: DrawList);
    fn draw_section(&self, section: SectionId, commands: DrawList, rect: Rect);
    fn remove_section(&self, section: SectionId);
}

/// Measured extents of a text run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    pub width: i32,
    pub height: i32,
    pub ascent: i32,
    pub descent: i32,
}

/// Measures text for leaf items sizing to their content.
pub trait FontMetrics {
    fn measure(&self, font: &str, text: &str) -> TextMetrics;
}

/// Cursor and tooltip chrome owned by the embedding widget toolkit.
pub trait ChromeSink {
    fn set_cursor(&mut self, shape: Option<CursorShape>);
    fn show_tooltip(&mut self, text: &str, at: Point);
}

/// Drag-and-drop payload: an opaque format-to-bytes map.
#[derive(Debug, Clone, Default)]
pub struct MimeData {
    formats: HashMap<String, Vec<u8>>,
}

impl MimeData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, format: impl Into<String>, data: Vec<u8>) {
        self.formats.insert(format.into(), data);
    }

    pub fn get(&self, format: &str) -> Option<&[u8]> {
        self.formats.get(format).map(Vec::as_slice)
    }

    pub fn has_format(&self, format: &str) -> bool {
        self.formats.contains_key(format)
    }
}
