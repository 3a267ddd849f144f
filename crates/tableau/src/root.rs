//! The root of the canvas: event dispatch and the bridge to the
//! embedding widget toolkit.
//!
//! The root owns the tree and the dispatch state machine: which item the
//! mouse is tracking, which item captured a press-drag sequence, which
//! item holds keyboard focus, and which item is the current drag target.
//! The surface adapter feeds raw input in through the methods here and
//! drains finished layer buffers with `poll`.

use std::{
    sync::{Arc, mpsc},
    time::Duration,
};

use geom::{Orientation, Point, Size};
use tracing::debug;

use crate::{
    event::{CursorShape, DragAction, Key, KeyCode, Modifiers},
    item::ItemId,
    layer::RootEvent,
    sizing::{Dim, Sizing},
    surface::{ChromeSink, DrawSink, MimeData},
    tree::CanvasTree,
};

/// Snap targets during a splitter drag sit at thirds and the midpoint;
/// a boundary within this distance of one snaps to it.
const SNAP_TOLERANCE: i32 = 12;

/// Root construction options.
#[derive(Debug, Clone, Copy)]
pub struct RootOptions {
    /// Upper bound on background repaints per layer, in frames per
    /// second.
    pub max_frame_rate: u32,
}

impl Default for RootOptions {
    fn default() -> Self {
        Self { max_frame_rate: 40 }
    }
}

/// A focus request recorded at press time and applied at release, so
/// modifier keys held mid-drag cannot churn focus.
struct DeferredFocus {
    item: ItemId,
    modifiers: Modifiers,
}

/// In-flight splitter boundary drag.
struct SplitterDrag {
    splitter: ItemId,
    /// Boundary index: between panes `index` and `index + 1`.
    index: usize,
    /// Press position, splitter-local.
    start: Point,
    /// Pane extents at press time.
    start_sizes: Vec<i32>,
    /// Pane sizings at press time, restored around each re-solve.
    saved: Vec<Sizing>,
}

/// The root canvas item and event dispatcher.
pub struct Root {
    tree: CanvasTree,
    events: mpsc::Receiver<RootEvent>,
    chrome: Box<dyn ChromeSink>,
    mouse_tracking: Option<ItemId>,
    mouse_capture: Option<ItemId>,
    focused: Option<ItemId>,
    last_focused: Option<ItemId>,
    widget_focused: bool,
    drag_tracking: Option<ItemId>,
    deferred_focus: Option<DeferredFocus>,
    splitter_drag: Option<SplitterDrag>,
}

impl Root {
    pub fn new(
        sink: Arc<dyn DrawSink>,
        chrome: Box<dyn ChromeSink>,
        options: RootOptions,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        let min_interval = Duration::from_secs(1).div_f64(f64::from(options.max_frame_rate.max(1)));
        Self {
            tree: CanvasTree::new(sink, tx, min_interval),
            events: rx,
            chrome,
            mouse_tracking: None,
            mouse_capture: None,
            focused: None,
            last_focused: None,
            widget_focused: true,
            drag_tracking: None,
            deferred_focus: None,
            splitter_drag: None,
        }
    }

    pub fn tree(&self) -> &CanvasTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut CanvasTree {
        &mut self.tree
    }

    /// The surface resized: lay out the whole tree and repaint.
    pub fn size_changed(&mut self, width: i32, height: i32) {
        if width > 0 && height > 0 {
            let root = self.tree.root();
            self.tree
                .update_layout(root, Point::zero(), Size::new(width, height));
            self.tree.update(root);
        }
    }

    /// Drain layer notifications, forwarding published buffers and
    /// turning coalesced update flags into fresh repaints. Call from the
    /// embedding event loop.
    pub fn poll(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
        }
    }

    /// Like `poll`, but block up to `timeout` for the first
    /// notification.
    pub fn poll_timeout(&mut self, timeout: Duration) {
        if let Ok(event) = self.events.recv_timeout(timeout) {
            self.handle_event(event);
        }
        self.poll();
    }

    fn handle_event(&mut self, event: RootEvent) {
        match event {
            RootEvent::LayerPublished(item) => self.tree.layer_published(item),
            RootEvent::RepaintAgain(item) => self.tree.schedule_repaint(item),
        }
    }

    /// Tear down the whole tree. Every layer is cancelled and joined
    /// before its state is released.
    pub fn close(&mut self) {
        let root = self.tree.root();
        if self.tree.contains(root) {
            debug!("closing root canvas");
            self.tree.close_item(root);
        }
    }

    // ------------------------------------------------------------------
    // Focus

    pub fn focused_item(&self) -> Option<ItemId> {
        self.focused
    }

    /// Move focus to the nearest focusable ancestor of `item`.
    pub fn request_focus(&mut self, item: ItemId) {
        self.request_focus_with(item, Modifiers::none());
    }

    fn request_focus_with(&mut self, item: ItemId, modifiers: Modifiers) {
        let mut cur = Some(item);
        while let Some(id) = cur {
            if !self.tree.contains(id) {
                return;
            }
            if self.tree.focusable(id) {
                if self.widget_focused {
                    self.set_focused_item(Some(id), modifiers);
                } else {
                    // Remember the target; widget focus-in restores it.
                    self.last_focused = Some(id);
                }
                return;
            }
            cur = self.tree.parent(id);
        }
    }

    /// Drop keyboard focus entirely.
    pub fn clear_focus(&mut self) {
        self.set_focused_item(None, Modifiers::none());
    }

    fn set_focused_item(&mut self, item: Option<ItemId>, modifiers: Modifiers) {
        if item == self.focused {
            return;
        }
        if let Some(old) = self.focused {
            if let Some(leaf) = self.tree.leaf_mut(old) {
                leaf.focus_changed(false, modifiers);
            }
        }
        self.focused = item;
        if let Some(new) = self.focused {
            if let Some(leaf) = self.tree.leaf_mut(new) {
                leaf.focus_changed(true, modifiers);
            }
            self.last_focused = self.focused;
        }
    }

    /// Widget-level focus changed. Focus-out remembers the focused item;
    /// focus-in restores it.
    pub fn widget_focus_changed(&mut self, focused: bool) {
        self.widget_focused = focused;
        if focused {
            if self.focused.is_none() {
                let restore = self.last_focused.filter(|&id| self.tree.is_attached(id));
                self.set_focused_item(restore, Modifiers::none());
            }
        } else if self.focused.is_some() {
            let remember = self.focused;
            self.set_focused_item(None, Modifiers::none());
            self.last_focused = remember;
        }
    }

    // ------------------------------------------------------------------
    // Keyboard

    /// Forward a key press to the focused item. `Tab` clears focus when
    /// the item leaves it unhandled.
    pub fn key_pressed(&mut self, key: &Key) -> bool {
        let Some(item) = self.focused else {
            return false;
        };
        if let Some(leaf) = self.tree.leaf_mut(item) {
            if leaf.key_pressed(key) {
                self.tree.update(item);
                return true;
            }
        }
        if key.code == KeyCode::Tab {
            self.clear_focus();
            return true;
        }
        false
    }

    // ------------------------------------------------------------------
    // Mouse

    /// The item that should receive mouse events at a root point: the
    /// captured item if a press is in flight, else the frontmost hit item
    /// that wants mouse events. A splitter counts when the point rides
    /// one of its boundaries.
    fn mouse_item_at(&self, p: Point) -> Option<ItemId> {
        if let Some(capture) = self.mouse_capture {
            return Some(capture);
        }
        self.tree.items_at_point(p).into_iter().find(|&id| {
            self.tree.wants_mouse(id)
                || self
                    .tree
                    .splitter_boundary_at(id, self.tree.map_to_item(id, p))
                    .is_some()
        })
    }

    fn cursor_for(&self, id: ItemId, p: Point) -> Option<CursorShape> {
        let local = self.tree.map_to_item(id, p);
        if self.tree.splitter_boundary_at(id, local).is_some() {
            return Some(match self.tree.splitter_orientation(id) {
                Some(Orientation::Horizontal) => CursorShape::SplitHorizontal,
                _ => CursorShape::SplitVertical,
            });
        }
        self.tree.cursor(id)
    }

    /// Move mouse tracking to whatever sits under the point, firing
    /// exit/enter and refreshing cursor and tooltip. Items detached since
    /// the last event get no exit call.
    fn update_tracking(&mut self, p: Point, _modifiers: Modifiers) {
        let new = self.mouse_item_at(p);
        if new == self.mouse_tracking {
            if let Some(id) = new {
                self.chrome.set_cursor(self.cursor_for(id, p));
            }
            return;
        }
        if let Some(old) = self.mouse_tracking {
            if self.tree.is_attached(old) {
                if let Some(leaf) = self.tree.leaf_mut(old) {
                    leaf.mouse_exited();
                }
            }
            self.chrome.set_cursor(None);
        }
        self.mouse_tracking = new;
        if let Some(id) = new {
            if let Some(leaf) = self.tree.leaf_mut(id) {
                leaf.mouse_entered();
            }
            self.chrome.set_cursor(self.cursor_for(id, p));
            if let Some(tip) = self.tree.leaf_mut(id).and_then(|leaf| leaf.tooltip()) {
                self.chrome.show_tooltip(&tip, p);
            }
        }
    }

    /// An item's cursor shape changed; re-report it if that item is the
    /// one the mouse is tracking.
    pub fn set_cursor_shape(&mut self, id: ItemId, cursor: Option<CursorShape>) {
        self.tree.set_cursor(id, cursor);
        if self.mouse_tracking == Some(id) {
            self.chrome.set_cursor(cursor);
        }
    }

    pub fn mouse_pressed(&mut self, x: i32, y: i32, modifiers: Modifiers) -> bool {
        let p = Point::new(x, y);
        self.update_tracking(p, modifiers);
        let Some(item) = self.mouse_tracking else {
            return false;
        };
        self.mouse_capture = Some(item);
        // Focus moves on release, with the modifiers seen now.
        self.deferred_focus = Some(DeferredFocus { item, modifiers });
        let local = self.tree.map_to_item(item, p);
        if let Some(index) = self.tree.splitter_boundary_at(item, local) {
            self.begin_splitter_drag(item, index, local);
            return true;
        }
        if let Some(leaf) = self.tree.leaf_mut(item) {
            if leaf.mouse_pressed(local, modifiers) {
                self.tree.update(item);
                return true;
            }
        }
        false
    }

    pub fn mouse_released(&mut self, x: i32, y: i32, modifiers: Modifiers) -> bool {
        let p = Point::new(x, y);
        if let Some(deferred) = self.deferred_focus.take() {
            if self.tree.is_attached(deferred.item) {
                self.request_focus_with(deferred.item, deferred.modifiers);
            }
        }
        if self.splitter_drag.is_some() {
            self.finish_splitter_drag();
            self.mouse_capture = None;
            self.update_tracking(p, modifiers);
            return true;
        }
        let Some(item) = self.mouse_capture.take() else {
            return false;
        };
        let mut handled = false;
        if self.tree.contains(item) {
            let local = self.tree.map_to_item(item, p);
            if let Some(leaf) = self.tree.leaf_mut(item) {
                handled = leaf.mouse_released(local, modifiers);
            }
            if handled {
                self.tree.update(item);
            }
        }
        self.update_tracking(p, modifiers);
        handled
    }

    pub fn mouse_position_changed(&mut self, x: i32, y: i32, modifiers: Modifiers) -> bool {
        let p = Point::new(x, y);
        if self.splitter_drag.is_some() {
            self.track_splitter_drag(p, modifiers);
            return true;
        }
        if let Some(item) = self.mouse_capture {
            // Capture overrides hit testing so drags keep reporting to
            // the pressed item even outside its bounds.
            if !self.tree.contains(item) {
                self.mouse_capture = None;
                return false;
            }
            let local = self.tree.map_to_item(item, p);
            let mut handled = false;
            if let Some(leaf) = self.tree.leaf_mut(item) {
                handled = leaf.mouse_position_changed(local, modifiers);
            }
            if handled {
                self.tree.update(item);
            }
            return handled;
        }
        self.update_tracking(p, modifiers);
        let Some(item) = self.mouse_tracking else {
            return false;
        };
        let local = self.tree.map_to_item(item, p);
        let mut handled = false;
        if let Some(leaf) = self.tree.leaf_mut(item) {
            handled = leaf.mouse_position_changed(local, modifiers);
        }
        if handled {
            self.tree.update(item);
        }
        handled
    }

    pub fn mouse_clicked(&mut self, x: i32, y: i32, modifiers: Modifiers) -> bool {
        self.forward_click(Point::new(x, y), modifiers, false)
    }

    pub fn mouse_double_clicked(&mut self, x: i32, y: i32, modifiers: Modifiers) -> bool {
        self.forward_click(Point::new(x, y), modifiers, true)
    }

    fn forward_click(&mut self, p: Point, modifiers: Modifiers, double: bool) -> bool {
        let Some(item) = self.mouse_item_at(p) else {
            return false;
        };
        self.request_focus_with(item, modifiers);
        let local = self.tree.map_to_item(item, p);
        let mut handled = false;
        if let Some(leaf) = self.tree.leaf_mut(item) {
            handled = if double {
                leaf.mouse_double_clicked(local, modifiers)
            } else {
                leaf.mouse_clicked(local, modifiers)
            };
        }
        if handled {
            self.tree.update(item);
        }
        handled
    }

    /// The mouse left the surface entirely.
    pub fn mouse_exited(&mut self) {
        if let Some(old) = self.mouse_tracking.take() {
            if self.tree.is_attached(old) {
                if let Some(leaf) = self.tree.leaf_mut(old) {
                    leaf.mouse_exited();
                }
            }
        }
        self.chrome.set_cursor(None);
    }

    pub fn wheel_changed(&mut self, dx: i32, dy: i32, horizontal: bool) -> bool {
        let root = self.tree.root();
        self.tree.route_wheel(root, dx, dy, horizontal)
    }

    pub fn pan_gesture(&mut self, dx: i32, dy: i32) -> bool {
        let root = self.tree.root();
        self.tree.route_pan(root, dx, dy)
    }

    // ------------------------------------------------------------------
    // Drag and drop

    pub fn drag_enter(&mut self, _mime: &MimeData) -> DragAction {
        self.drag_tracking = None;
        DragAction::Accept
    }

    pub fn drag_move(&mut self, mime: &MimeData, x: i32, y: i32) -> DragAction {
        let p = Point::new(x, y);
        let new = self
            .tree
            .items_at_point(p)
            .into_iter()
            .find(|&id| self.tree.wants_drag(id));
        if new != self.drag_tracking {
            if let Some(old) = self.drag_tracking {
                if self.tree.is_attached(old) {
                    if let Some(leaf) = self.tree.leaf_mut(old) {
                        leaf.drag_leave();
                    }
                }
            }
            self.drag_tracking = new;
            if let Some(id) = new {
                if let Some(leaf) = self.tree.leaf_mut(id) {
                    leaf.drag_enter(mime);
                }
            }
        }
        let Some(item) = self.drag_tracking else {
            return DragAction::Ignore;
        };
        let local = self.tree.map_to_item(item, p);
        self.tree
            .leaf_mut(item)
            .map_or(DragAction::Ignore, |leaf| leaf.drag_move(mime, local))
    }

    pub fn drag_leave(&mut self) -> DragAction {
        if let Some(old) = self.drag_tracking.take() {
            if self.tree.is_attached(old) {
                if let Some(leaf) = self.tree.leaf_mut(old) {
                    leaf.drag_leave();
                }
            }
        }
        DragAction::Accept
    }

    pub fn drop(&mut self, mime: &MimeData, x: i32, y: i32) -> DragAction {
        let p = Point::new(x, y);
        let mut action = DragAction::Ignore;
        if let Some(item) = self.drag_tracking {
            if self.tree.contains(item) {
                let local = self.tree.map_to_item(item, p);
                if let Some(leaf) = self.tree.leaf_mut(item) {
                    action = leaf.drop(mime, local);
                }
                if action.is_handled() {
                    self.tree.update(item);
                }
            }
        }
        self.drag_leave();
        action
    }

    // ------------------------------------------------------------------
    // Splitter drags

    fn begin_splitter_drag(&mut self, splitter: ItemId, index: usize, start: Point) {
        self.splitter_drag = Some(SplitterDrag {
            splitter,
            index,
            start,
            start_sizes: self.tree.splitter_pane_sizes(splitter),
            saved: self.tree.splitter_sizings(splitter),
        });
    }

    fn track_splitter_drag(&mut self, p: Point, modifiers: Modifiers) {
        let Some(drag) = &self.splitter_drag else {
            return;
        };
        let splitter = drag.splitter;
        let index = drag.index;
        let start = drag.start;
        let start_sizes = drag.start_sizes.clone();
        let saved = drag.saved.clone();
        if !self.tree.contains(splitter) {
            self.splitter_drag = None;
            return;
        }
        let orientation = self.tree.splitter_orientation(splitter).unwrap();
        let local = self.tree.map_to_item(splitter, p);
        let (coord, start_coord, extent) = match orientation {
            Orientation::Vertical => (local.x, start.x, self.tree.rect(splitter).map_or(0, |r| r.w)),
            Orientation::Horizontal => {
                (local.y, start.y, self.tree.rect(splitter).map_or(0, |r| r.h))
            }
        };
        let boundary_start: i32 = start_sizes[..=index].iter().sum();
        let mut boundary = boundary_start + (coord - start_coord);
        // Snap to thirds and the midpoint; holding control drags freely.
        if !modifiers.control {
            for snap in [extent / 3, extent / 2, 2 * extent / 3] {
                if (boundary - snap).abs() <= SNAP_TOLERANCE {
                    boundary = snap;
                    break;
                }
            }
        }
        let delta = boundary - boundary_start;

        // Pin every pane except the two being adjusted, re-solve, then
        // give the others their freedom back for the next layout pass.
        let mut sizings = saved.clone();
        for (i, sizing) in sizings.iter_mut().enumerate() {
            let target = if i == index {
                start_sizes[i] + delta
            } else if i == index + 1 {
                start_sizes[i] - delta
            } else {
                start_sizes[i]
            };
            let pinned = i != index && i != index + 1;
            match orientation {
                Orientation::Vertical if pinned => sizing.set_fixed_width(target),
                Orientation::Vertical => sizing.preferred_width = Some(Dim::Absolute(target)),
                Orientation::Horizontal if pinned => sizing.set_fixed_height(target),
                Orientation::Horizontal => sizing.preferred_height = Some(Dim::Absolute(target)),
            }
        }
        self.tree.set_splitter_sizings(splitter, sizings.clone());
        self.tree.relayout(splitter);
        for (i, sizing) in sizings.iter_mut().enumerate() {
            if i != index && i != index + 1 {
                *sizing = saved[i].clone();
            }
        }
        self.tree.set_splitter_sizings(splitter, sizings);
        self.tree.update(splitter);
    }

    /// Re-normalize every pane's resolved extent into its persisted
    /// sizing, so the drag result survives later layout passes.
    fn finish_splitter_drag(&mut self) {
        let Some(drag) = self.splitter_drag.take() else {
            return;
        };
        if !self.tree.contains(drag.splitter) {
            return;
        }
        let orientation = self.tree.splitter_orientation(drag.splitter).unwrap();
        let sizes = self.tree.splitter_pane_sizes(drag.splitter);
        let mut sizings = self.tree.splitter_sizings(drag.splitter);
        for (sizing, &size) in sizings.iter_mut().zip(&sizes) {
            match orientation {
                Orientation::Vertical => sizing.preferred_width = Some(Dim::Absolute(size)),
                Orientation::Horizontal => sizing.preferred_height = Some(Dim::Absolute(size)),
            }
        }
        self.tree.set_splitter_sizings(drag.splitter, sizings);
        self.tree.update(drag.splitter);
    }
}

impl Drop for Root {
    fn drop(&mut self) {
        self.close();
    }
}
