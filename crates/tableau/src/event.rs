//! Input value types routed by the root dispatcher.

/// Keyboard modifier state attached to mouse and key events.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub control: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    /// No modifiers held.
    pub fn none() -> Self {
        Self::default()
    }

    /// True if any modifier is held.
    pub fn any(&self) -> bool {
        self.shift || self.control || self.alt || self.meta
    }
}

/// A key press delivered to the focused item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    pub code: KeyCode,
    pub modifiers: Modifiers,
}

impl Key {
    pub fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::none(),
        }
    }
}

/// Key identity. Only the keys the dispatcher itself interprets are named;
/// everything else arrives as a character.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum KeyCode {
    Char(char),
    Tab,
    Enter,
    Escape,
    Backspace,
    Delete,
    Up,
    Down,
    Left,
    Right,
}

impl From<char> for Key {
    fn from(c: char) -> Self {
        Self::new(KeyCode::Char(c))
    }
}

/// Response to a drag-and-drop event.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Default)]
pub enum DragAction {
    /// The item does not handle this drag.
    #[default]
    Ignore,
    /// The drag is acceptable here.
    Accept,
    /// A drop would copy the payload.
    Copy,
    /// A drop would move the payload.
    Move,
}

impl DragAction {
    /// True for any response other than `Ignore`.
    pub fn is_handled(&self) -> bool {
        !matches!(self, Self::Ignore)
    }
}

/// Cursor shapes an item can request while tracked by the mouse.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum CursorShape {
    Arrow,
    Hand,
    IBeam,
    Crosshair,
    /// Resize cursor for a horizontal splitter bar.
    SplitHorizontal,
    /// Resize cursor for a vertical splitter bar.
    SplitVertical,
}
