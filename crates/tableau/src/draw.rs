//! The drawing-command stream produced by composers.
//!
//! No serialization format is defined here; the surface adapter receives
//! the in-memory command list and owns turning it into pixels.

use std::sync::Arc;

use geom::{Point, Rect};

/// A color token. Carried opaquely to the draw surface.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct Color(pub String);

impl From<&str> for Color {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One drawing command.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Push the current transform/clip state.
    Save,
    /// Pop the transform/clip state.
    Restore,
    /// Translate the coordinate system.
    Translate { dx: i32, dy: i32 },
    /// Clip subsequent drawing to a rect in the current coordinate system.
    ClipRect(Rect),
    /// Fill a rect with a solid color.
    FillRect { rect: Rect, color: Color },
    /// Stroke a straight line.
    StrokeLine {
        from: Point,
        to: Point,
        width: f32,
        color: Color,
    },
    /// Draw a run of text with its baseline origin.
    Text {
        text: String,
        origin: Point,
        color: Color,
        font: String,
    },
    /// Splice a previously produced list. Cached composer output and text
    /// paint shared through the composer cache re-enter the stream here.
    List(Arc<DrawList>),
}

/// An ordered buffer of drawing commands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn save(&mut self) {
        self.commands.push(DrawCommand::Save);
    }

    pub fn restore(&mut self) {
        self.commands.push(DrawCommand::Restore);
    }

    pub fn translate(&mut self, dx: i32, dy: i32) {
        self.commands.push(DrawCommand::Translate { dx, dy });
    }

    pub fn clip_rect(&mut self, rect: Rect) {
        self.commands.push(DrawCommand::ClipRect(rect));
    }

    pub fn fill_rect(&mut self, rect: Rect, color: impl Into<Color>) {
        self.commands.push(DrawCommand::FillRect {
            rect,
            color: color.into(),
        });
    }

    pub fn stroke_line(&mut self, from: Point, to: Point, width: f32, color: impl Into<Color>) {
        self.commands.push(DrawCommand::StrokeLine {
            from,
            to,
            width,
            color: color.into(),
        });
    }

    pub fn text(
        &mut self,
        text: impl Into<String>,
        origin: Point,
        color: impl Into<Color>,
        font: impl Into<String>,
    ) {
        self.commands.push(DrawCommand::Text {
            text: text.into(),
            origin,
            color: color.into(),
            font: font.into(),
        });
    }

    /// Splice a shared list into this one without copying its commands.
    pub fn splice(&mut self, list: Arc<DrawList>) {
        if !list.is_empty() {
            self.commands.push(DrawCommand::List(list));
        }
    }

    /// Walk the stream depth-first, expanding spliced lists.
    pub fn visit(&self, f: &mut dyn FnMut(&DrawCommand)) {
        for command in &self.commands {
            if let DrawCommand::List(inner) = command {
                inner.visit(f);
            } else {
                f(command);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splice_shares_rather_than_copies() {
        let mut inner = DrawList::new();
        inner.fill_rect(Rect::new(0, 0, 4, 4), "#888");
        let inner = Arc::new(inner);

        let mut outer = DrawList::new();
        outer.save();
        outer.splice(inner.clone());
        outer.restore();
        assert_eq!(outer.len(), 3);

        let mut flat = 0;
        outer.visit(&mut |_| flat += 1);
        assert_eq!(flat, 3);
        assert_eq!(Arc::strong_count(&inner), 2);
    }

    #[test]
    fn empty_splice_is_dropped() {
        let mut outer = DrawList::new();
        outer.splice(Arc::new(DrawList::new()));
        assert!(outer.is_empty());
    }
}
