//! tableau is the layout, compositing, and event-dispatch engine for a
//! retained-mode UI.
//!
//! A tree of canvas items is sized by a constraint solver, snapshotted
//! into immutable composers, painted on per-layer worker threads into
//! drawing-command streams, and driven by a root dispatcher that routes
//! mouse, keyboard, focus, and drag input back down the tree. The widget
//! toolkit that turns commands into pixels and delivers raw input sits
//! behind the traits in [`surface`].

/// Weakly-held cache for painted sub-results.
pub mod cache;
/// Immutable per-frame snapshots used for off-thread layout and paint.
pub mod composer;
/// The drawing-command stream produced by composers.
pub mod draw;
/// Error types.
pub mod error;
/// Input value types.
pub mod event;
/// Canvas item nodes and the leaf behavior trait.
pub mod item;
/// Concrete leaf items.
pub mod items;
/// Per-layer background repaint machinery.
pub mod layer;
/// Child-placement strategies.
pub mod layout;
/// The root dispatcher.
pub mod root;
/// Sizing descriptors and resolved constraints.
pub mod sizing;
/// The constraint solver.
pub mod solver;
/// Traits for external collaborators.
pub mod surface;
/// Test support.
#[cfg(any(test, feature = "testing"))]
pub mod testing;
/// The canvas item tree.
pub mod tree;

pub use geom;

pub use crate::{
    cache::{CacheKey, ComposerCache},
    composer::{Composer, LeafPaint},
    draw::{Color, DrawCommand, DrawList},
    error::{Error, Result},
    event::{CursorShape, DragAction, Key, KeyCode, Modifiers},
    item::{ItemId, LeafItem},
    items::{BackgroundItem, EmptyItem, TextItem},
    layer::CancelToken,
    layout::{Align, Layout},
    root::{Root, RootOptions},
    sizing::{Constraint, Dim, Sizing},
    solver::{Solved, solve},
    surface::{ChromeSink, DrawSink, FontMetrics, MimeData, SectionId, TextMetrics},
    tree::CanvasTree,
};
