//! Canvas item nodes and the leaf behavior trait.
//!
//! Items live in the `CanvasTree` arena and are addressed by `ItemId`.
//! The container back-reference is a plain `Option<ItemId>`, never an
//! owning pointer; composites own their children through the arena.

use std::{
    any::Any,
    sync::{Arc, atomic::AtomicU64},
};

use geom::{Point, Rect};
use slotmap::new_key_type;

use crate::{
    cache::ComposerCache,
    composer::{Composer, LeafPaint},
    draw::Color,
    event::{CursorShape, DragAction, Key, Modifiers},
    layer::Layer,
    layout::Layout,
    sizing::Sizing,
    surface::MimeData,
};

new_key_type! {
    /// Opaque identifier for an item stored in the tree arena.
    pub struct ItemId;
}

/// Behavior attached to leaf items.
///
/// Input callbacks return a handled flag and default to "not handled", so
/// the dispatcher can fall through to ancestors and siblings. Coordinates
/// are local to the item.
pub trait LeafItem: Any {
    /// Produce the paint snapshot for this leaf, consulting the shared
    /// cache for reusable sub-results. `None` means "not yet paintable".
    fn composer(&self, cache: &ComposerCache) -> Option<Arc<dyn LeafPaint>>;

    fn mouse_clicked(&mut self, _p: Point, _modifiers: Modifiers) -> bool {
        false
    }

    fn mouse_double_clicked(&mut self, _p: Point, _modifiers: Modifiers) -> bool {
        false
    }

    fn mouse_entered(&mut self) -> bool {
        false
    }

    fn mouse_exited(&mut self) -> bool {
        false
    }

    fn mouse_pressed(&mut self, _p: Point, _modifiers: Modifiers) -> bool {
        false
    }

    fn mouse_released(&mut self, _p: Point, _modifiers: Modifiers) -> bool {
        false
    }

    fn mouse_position_changed(&mut self, _p: Point, _modifiers: Modifiers) -> bool {
        false
    }

    fn wheel_changed(&mut self, _dx: i32, _dy: i32, _horizontal: bool) -> bool {
        false
    }

    fn pan_gesture(&mut self, _dx: i32, _dy: i32) -> bool {
        false
    }

    /// Key press while this item holds focus.
    fn key_pressed(&mut self, _key: &Key) -> bool {
        false
    }

    /// Focus was gained or lost. `modifiers` carries the state recorded
    /// when the triggering press happened, not the release-time state.
    fn focus_changed(&mut self, _focused: bool, _modifiers: Modifiers) {}

    fn drag_enter(&mut self, _mime: &MimeData) -> DragAction {
        DragAction::Ignore
    }

    fn drag_leave(&mut self) -> DragAction {
        DragAction::Ignore
    }

    fn drag_move(&mut self, _mime: &MimeData, _p: Point) -> DragAction {
        DragAction::Ignore
    }

    fn drop(&mut self, _mime: &MimeData, _p: Point) -> DragAction {
        DragAction::Ignore
    }

    /// Tooltip shown while the mouse tracks this item.
    fn tooltip(&self) -> Option<String> {
        None
    }
}

/// Composite bookkeeping: ordered children (insertion order is paint and
/// hit-test order, later is frontmost), the placement strategy, and the
/// background repaint machinery for layers.
pub(crate) struct CompositeState {
    pub(crate) children: Vec<ItemId>,
    pub(crate) layout: Layout,
    pub(crate) layer: Option<Layer>,
}

impl CompositeState {
    pub(crate) fn new(layout: Layout) -> Self {
        Self {
            children: Vec::new(),
            layout,
            layer: None,
        }
    }
}

/// Item variants.
pub(crate) enum ItemKind {
    Leaf(Box<dyn LeafItem>),
    Composite(CompositeState),
}

/// One node in the canvas item arena.
pub(crate) struct ItemNode {
    pub(crate) kind: ItemKind,
    /// Back-reference to the container. Relation only, never ownership.
    pub(crate) parent: Option<ItemId>,
    /// Intrinsic sizing, settable by the caller.
    pub(crate) sizing: Sizing,
    /// Rect assigned by the parent's layout pass, in parent-local
    /// coordinates. `None` until the first layout.
    pub(crate) rect: Option<Rect>,
    pub(crate) visible: bool,
    pub(crate) enabled: bool,
    pub(crate) focusable: bool,
    pub(crate) wants_mouse: bool,
    pub(crate) wants_drag: bool,
    pub(crate) cursor: Option<CursorShape>,
    pub(crate) background: Option<Color>,
    /// Memoized composer for this node's own content.
    pub(crate) composer: Option<Composer>,
    /// Memoized passthrough composer wrapping a layer's published buffer.
    /// Only used for layer nodes.
    pub(crate) passthrough: Option<Composer>,
    /// Repaint counter shared with this node's composers.
    pub(crate) repaints: Arc<AtomicU64>,
    /// Layout observation hook, fired whenever the rect is assigned.
    pub(crate) on_layout: Option<Box<dyn FnMut(Rect)>>,
}

impl ItemNode {
    pub(crate) fn new(kind: ItemKind) -> Self {
        Self {
            kind,
            parent: None,
            sizing: Sizing::new(),
            rect: None,
            visible: true,
            enabled: true,
            focusable: false,
            wants_mouse: false,
            wants_drag: false,
            cursor: None,
            background: None,
            composer: None,
            passthrough: None,
            repaints: Arc::new(AtomicU64::new(0)),
            on_layout: None,
        }
    }

    pub(crate) fn composite(&self) -> Option<&CompositeState> {
        match &self.kind {
            ItemKind::Composite(state) => Some(state),
            ItemKind::Leaf(_) => None,
        }
    }

    pub(crate) fn composite_mut(&mut self) -> Option<&mut CompositeState> {
        match &mut self.kind {
            ItemKind::Composite(state) => Some(state),
            ItemKind::Leaf(_) => None,
        }
    }

    pub(crate) fn leaf_mut(&mut self) -> Option<&mut dyn LeafItem> {
        match &mut self.kind {
            ItemKind::Leaf(leaf) => Some(leaf.as_mut()),
            ItemKind::Composite(_) => None,
        }
    }

    pub(crate) fn is_layer(&self) -> bool {
        self.composite().is_some_and(|c| c.layer.is_some())
    }
}
