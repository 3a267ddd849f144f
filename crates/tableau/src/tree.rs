//! The canvas item tree.
//!
//! `CanvasTree` owns every item in a slotmap arena and is confined to the
//! UI thread: all mutation, layout, and composer production happen here.
//! Layer workers only ever see the immutable composer snapshots the tree
//! hands them.

use std::{
    sync::{Arc, atomic::Ordering, mpsc},
    time::Duration,
};

use geom::{Orientation, Point, Rect, Size};
use slotmap::SlotMap;
use tracing::trace;

use crate::{
    cache::ComposerCache,
    composer::{Composer, ComposerChild},
    draw::{Color, DrawList},
    error::{Error, Result},
    event::CursorShape,
    item::{CompositeState, ItemId, ItemKind, ItemNode, LeafItem},
    items::EmptyItem,
    layer::{Layer, PublishMode, RepaintJob, RootEvent},
    layout::{Layout, LayoutChild},
    sizing::{Dim, Sizing},
    surface::{DrawSink, SectionId},
};

/// Distance from a splitter boundary within which a hit lands on the
/// splitter itself rather than its panes.
const SPLITTER_HIT_SLOP: i32 = 6;

/// The arena of canvas items plus the machinery to keep layers painting.
pub struct CanvasTree {
    items: SlotMap<ItemId, ItemNode>,
    root: ItemId,
    cache: Arc<ComposerCache>,
    sink: Arc<dyn DrawSink>,
    events: mpsc::Sender<RootEvent>,
    min_interval: Duration,
    next_section: u32,
}

impl CanvasTree {
    /// Build a tree whose root is itself a layer publishing straight to
    /// the draw sink.
    pub(crate) fn new(
        sink: Arc<dyn DrawSink>,
        events: mpsc::Sender<RootEvent>,
        min_interval: Duration,
    ) -> Self {
        let mut items = SlotMap::with_key();
        let root = items.insert(ItemNode::new(ItemKind::Composite(CompositeState::new(
            Layout::overlap(),
        ))));
        let mut tree = Self {
            items,
            root,
            cache: Arc::new(ComposerCache::new()),
            sink,
            events,
            min_interval,
            next_section: 0,
        };
        let layer = tree.make_layer(root, PublishMode::Root);
        tree.items[root].composite_mut().unwrap().layer = Some(layer);
        tree
    }

    fn make_layer(&self, item: ItemId, mode: PublishMode) -> Layer {
        Layer::new(
            item,
            mode,
            self.sink.clone(),
            self.events.clone(),
            self.min_interval,
        )
    }

    /// The root item.
    pub fn root(&self) -> ItemId {
        self.root
    }

    /// The shared composer cache.
    pub fn cache(&self) -> &Arc<ComposerCache> {
        &self.cache
    }

    // ------------------------------------------------------------------
    // Construction and structure

    /// Create a detached leaf item.
    pub fn new_leaf(&mut self, leaf: Box<dyn LeafItem>) -> ItemId {
        self.items.insert(ItemNode::new(ItemKind::Leaf(leaf)))
    }

    /// Create a detached composite item with the given layout.
    pub fn new_composite(&mut self, layout: Layout) -> ItemId {
        self.items
            .insert(ItemNode::new(ItemKind::Composite(CompositeState::new(
                layout,
            ))))
    }

    /// Create a detached composite whose subtree is painted on its own
    /// background task and published to its container.
    pub fn new_layer(&mut self, layout: Layout) -> ItemId {
        let id = self.new_composite(layout);
        let layer = self.make_layer(id, PublishMode::ToParent);
        self.items[id].composite_mut().unwrap().layer = Some(layer);
        id
    }

    /// Create a detached opaque layer that draws into its own section of
    /// the render surface, bypassing its container's composer.
    pub fn new_section_layer(&mut self, layout: Layout) -> ItemId {
        let id = self.new_composite(layout);
        let section = SectionId(self.next_section);
        self.next_section += 1;
        let layer = self.make_layer(id, PublishMode::Section(section));
        self.items[id].composite_mut().unwrap().layer = Some(layer);
        id
    }

    /// Append a child to a composite.
    pub fn add(&mut self, parent: ItemId, child: ItemId) {
        let index = self.children(parent).len();
        self.insert(parent, index, child);
    }

    /// Insert a child at an index. Panics if `child` is already attached
    /// or `parent` is a leaf.
    pub fn insert(&mut self, parent: ItemId, index: usize, child: ItemId) {
        assert!(
            self.items[child].parent.is_none(),
            "item is already attached to a container"
        );
        let pane = self.pane_sizing_for(parent, child);
        self.items[child].parent = Some(parent);
        let state = self.items[parent]
            .composite_mut()
            .expect("cannot insert into a leaf item");
        assert!(index <= state.children.len(), "insert index out of range");
        state.children.insert(index, child);
        match &mut state.layout {
            Layout::Grid { cells, .. } => {
                // Keep cell indices pointing at the same items.
                for cell in cells.iter_mut().flatten() {
                    if *cell >= index {
                        *cell += 1;
                    }
                }
            }
            Layout::Splitter { sizings, .. } => {
                sizings.insert(index, pane.unwrap());
            }
            _ => {}
        }
        self.relayout(parent);
        self.update(parent);
    }

    /// Append a child to a grid composite at an explicit cell position.
    /// Panics if the position is out of range or already occupied.
    pub fn add_to_grid(&mut self, parent: ItemId, child: ItemId, col: usize, row: usize) {
        assert!(
            self.items[child].parent.is_none(),
            "item is already attached to a container"
        );
        self.items[child].parent = Some(parent);
        let state = self.items[parent]
            .composite_mut()
            .expect("cannot insert into a leaf item");
        let index = state.children.len();
        state.children.push(child);
        let Layout::Grid {
            columns,
            rows,
            cells,
            ..
        } = &mut state.layout
        else {
            panic!("add_to_grid on a non-grid composite");
        };
        assert!(col < *columns && row < *rows, "grid position out of range");
        let cell = &mut cells[col * *rows + row];
        assert!(cell.is_none(), "grid position already occupied");
        *cell = Some(index);
        self.relayout(parent);
        self.update(parent);
    }

    /// Remove a child from its composite and close its whole subtree.
    /// Panics if `child` is not a child of `parent`.
    pub fn remove(&mut self, parent: ItemId, child: ItemId) {
        let state = self.items[parent]
            .composite_mut()
            .expect("cannot remove from a leaf item");
        let index = state
            .children
            .iter()
            .position(|&c| c == child)
            .expect("item is not a child of this container");
        state.children.remove(index);
        match &mut state.layout {
            Layout::Grid { cells, .. } => {
                for cell in cells.iter_mut() {
                    *cell = match *cell {
                        Some(i) if i == index => None,
                        Some(i) if i > index => Some(i - 1),
                        other => other,
                    };
                }
            }
            Layout::Splitter { sizings, .. } => {
                sizings.remove(index);
            }
            _ => {}
        }
        self.items[child].parent = None;
        self.close_item(child);
        self.relayout(parent);
        self.update(parent);
    }

    /// Replace a composite's children wholesale. The previous children
    /// are closed.
    pub fn replace_all(&mut self, parent: ItemId, children: Vec<ItemId>) {
        let old = std::mem::take(
            &mut self.items[parent]
                .composite_mut()
                .expect("cannot replace children of a leaf item")
                .children,
        );
        for child in old {
            self.items[child].parent = None;
            self.close_item(child);
        }
        if let Layout::Splitter { sizings, .. } =
            &mut self.items[parent].composite_mut().unwrap().layout
        {
            sizings.clear();
        }
        for child in children {
            self.add(parent, child);
        }
    }

    /// Append a fixed-size spacer to a row or column.
    pub fn add_spacing(&mut self, parent: ItemId, spacing: i32) -> ItemId {
        let id = self.new_leaf(Box::new(EmptyItem));
        self.items[id].sizing = Sizing::new().with_fixed_size(Size::new(spacing, spacing));
        self.add(parent, id);
        id
    }

    /// Append an unconstrained stretch item that soaks up leftover space.
    pub fn add_stretch(&mut self, parent: ItemId) -> ItemId {
        let id = self.new_leaf(Box::new(EmptyItem));
        self.add(parent, id);
        id
    }

    /// For splitter containers: the persisted pane sizing for a child
    /// about to be inserted. The primary-axis preference is cleared so the
    /// solver owns it, with a small fractional minimum.
    fn pane_sizing_for(&self, parent: ItemId, child: ItemId) -> Option<Sizing> {
        let state = self.items[parent].composite()?;
        let Layout::Splitter { orientation, .. } = &state.layout else {
            return None;
        };
        let mut sizing = self.items[child].sizing.clone();
        match orientation {
            Orientation::Vertical => {
                sizing.preferred_width = None;
                if sizing.minimum_width.is_none() {
                    sizing.minimum_width = Some(Dim::Fraction(0.1));
                }
            }
            Orientation::Horizontal => {
                sizing.preferred_height = None;
                if sizing.minimum_height.is_none() {
                    sizing.minimum_height = Some(Dim::Fraction(0.1));
                }
            }
        }
        Some(sizing)
    }

    /// Close an item's subtree and drop it from the arena. A layer is
    /// cancelled and joined before anything it might still read goes away.
    pub(crate) fn close_item(&mut self, id: ItemId) {
        let children = if let Some(state) = self.items[id].composite_mut() {
            if let Some(mut layer) = state.layer.take() {
                layer.close();
            }
            std::mem::take(&mut state.children)
        } else {
            Vec::new()
        };
        for child in children {
            self.close_item(child);
        }
        self.items.remove(id);
    }

    // ------------------------------------------------------------------
    // Attributes

    /// Does the arena still hold this item?
    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(id)
    }

    /// Attached means reachable from the root: it has a container, or it
    /// is the root itself.
    pub fn is_attached(&self, id: ItemId) -> bool {
        self.items
            .get(id)
            .is_some_and(|n| n.parent.is_some() || id == self.root)
    }

    pub fn parent(&self, id: ItemId) -> Option<ItemId> {
        self.items[id].parent
    }

    pub fn children(&self, id: ItemId) -> &[ItemId] {
        self.items[id]
            .composite()
            .map_or(&[], |state| state.children.as_slice())
    }

    /// The rect assigned by the parent's last layout pass, parent-local.
    pub fn rect(&self, id: ItemId) -> Option<Rect> {
        self.items[id].rect
    }

    pub fn sizing(&self, id: ItemId) -> &Sizing {
        &self.items[id].sizing
    }

    /// Set the intrinsic sizing, re-laying-out and repainting on change.
    pub fn set_sizing(&mut self, id: ItemId, sizing: Sizing) {
        if self.items[id].sizing == sizing {
            return;
        }
        self.items[id].sizing = sizing;
        self.sizing_changed(id);
    }

    /// A sizing change lays out again from the container, since sibling
    /// placement depends on it.
    fn sizing_changed(&mut self, id: ItemId) {
        let target = self.items[id].parent.unwrap_or(id);
        self.relayout(target);
        self.update(target);
    }

    pub fn visible(&self, id: ItemId) -> bool {
        self.items[id].visible
    }

    pub fn set_visible(&mut self, id: ItemId, visible: bool) {
        if self.items[id].visible == visible {
            return;
        }
        self.items[id].visible = visible;
        self.sizing_changed(id);
    }

    pub fn enabled(&self, id: ItemId) -> bool {
        self.items[id].enabled
    }

    pub fn set_enabled(&mut self, id: ItemId, enabled: bool) {
        self.items[id].enabled = enabled;
    }

    pub fn set_focusable(&mut self, id: ItemId, focusable: bool) {
        self.items[id].focusable = focusable;
    }

    pub fn focusable(&self, id: ItemId) -> bool {
        self.items[id].focusable
    }

    pub fn set_wants_mouse(&mut self, id: ItemId, wants: bool) {
        self.items[id].wants_mouse = wants;
    }

    pub fn set_wants_drag(&mut self, id: ItemId, wants: bool) {
        self.items[id].wants_drag = wants;
    }

    pub fn cursor(&self, id: ItemId) -> Option<CursorShape> {
        self.items[id].cursor
    }

    pub(crate) fn set_cursor(&mut self, id: ItemId, cursor: Option<CursorShape>) {
        self.items[id].cursor = cursor;
    }

    pub fn set_background(&mut self, id: ItemId, color: Option<Color>) {
        if self.items[id].background == color {
            return;
        }
        self.items[id].background = color;
        self.update(id);
    }

    /// Install a layout observation hook, fired whenever the item's rect
    /// is assigned.
    pub fn set_on_layout(&mut self, id: ItemId, hook: Box<dyn FnMut(Rect)>) {
        self.items[id].on_layout = Some(hook);
    }

    /// Number of repaints this item's composers have performed, including
    /// those on layer worker threads.
    pub fn repaint_count(&self, id: ItemId) -> u64 {
        self.items[id].repaints.load(Ordering::Relaxed)
    }

    /// Borrow a leaf's behavior as its concrete type.
    pub fn with_leaf<T: LeafItem, R>(&mut self, id: ItemId, f: impl FnOnce(&mut T) -> R) -> R {
        let leaf = self.items[id].leaf_mut().expect("item is not a leaf");
        let any: &mut dyn std::any::Any = leaf;
        f(any.downcast_mut::<T>().expect("leaf has a different type"))
    }

    // ------------------------------------------------------------------
    // Layout

    /// The sizing the container's layout should use for this item. Leaves
    /// report their intrinsic sizing; composites defer to their layout
    /// strategy, overridden by any bound the composite sets itself, and
    /// collapse to zero when collapsible with no visible children.
    pub fn layout_sizing(&self, id: ItemId) -> Sizing {
        let node = &self.items[id];
        let Some(state) = node.composite() else {
            return node.sizing.clone();
        };
        let children = self.layout_children(&state.children);
        let mut sizing = state.layout.aggregate_sizing(&children);
        let own = &node.sizing;
        if own.minimum_width.is_some() {
            sizing.minimum_width = own.minimum_width;
        }
        if own.maximum_width.is_some() {
            sizing.maximum_width = own.maximum_width;
        }
        if own.preferred_width.is_some() {
            sizing.preferred_width = own.preferred_width;
        }
        if own.minimum_height.is_some() {
            sizing.minimum_height = own.minimum_height;
        }
        if own.maximum_height.is_some() {
            sizing.maximum_height = own.maximum_height;
        }
        if own.preferred_height.is_some() {
            sizing.preferred_height = own.preferred_height;
        }
        sizing.minimum_aspect_ratio = own.minimum_aspect_ratio;
        sizing.maximum_aspect_ratio = own.maximum_aspect_ratio;
        sizing.preferred_aspect_ratio = own.preferred_aspect_ratio;
        let any_visible = state.children.iter().any(|&c| self.items[c].visible);
        if own.collapsible && !any_visible {
            sizing.collapse();
        }
        sizing
    }

    fn layout_children(&self, children: &[ItemId]) -> Vec<LayoutChild> {
        children
            .iter()
            .map(|&c| LayoutChild {
                sizing: self.layout_sizing(c),
                rect: self.items[c].rect,
            })
            .collect()
    }

    /// Assign an item's rect and lay out its subtree. Child rects are
    /// parent-local. A layer whose rect changed schedules a repaint for
    /// the new geometry.
    pub fn update_layout(&mut self, id: ItemId, origin: Point, size: Size) {
        let rect = Rect::from_origin_size(origin, size);
        let changed = self.items[id].rect != Some(rect);
        {
            let node = &mut self.items[id];
            node.rect = Some(rect);
            if let Some(hook) = &mut node.on_layout {
                hook(rect);
            }
        }
        if let Some(state) = self.items[id].composite() {
            let children = state.children.clone();
            let layout = state.layout.clone();
            let layout_children = self.layout_children(&children);
            let placements = layout.place(Point::zero(), size, &layout_children);
            for (&child, placement) in children.iter().zip(placements) {
                if let Some(r) = placement {
                    self.update_layout(child, r.origin(), r.size());
                }
            }
            let layer = self.items[id].composite().and_then(|s| s.layer.as_ref());
            let is_layer = layer.is_some();
            if layer.is_some_and(Layer::is_section) {
                // Hand the surface coordinates to the worker; it blocks
                // on them before direct-drawing.
                let global = self.map_to_global(id, Point::zero());
                if let Some(layer) = self.items[id].composite().and_then(|s| s.layer.as_ref()) {
                    layer.set_section_rect(Rect::from_origin_size(global, size));
                }
            }
            if is_layer && changed {
                self.schedule_repaint(id);
            }
        }
    }

    /// Re-run layout with the item's existing geometry.
    pub fn relayout(&mut self, id: ItemId) {
        if let Some(rect) = self.items[id].rect {
            self.update_layout(id, rect.origin(), rect.size());
        }
    }

    // ------------------------------------------------------------------
    // Coordinates and hit testing

    /// Map an item-local point into root coordinates.
    pub fn map_to_global(&self, id: ItemId, p: Point) -> Point {
        let mut p = p;
        let mut cur = id;
        while cur != self.root {
            if let Some(rect) = self.items[cur].rect {
                p = p + rect.origin();
            }
            match self.items[cur].parent {
                Some(parent) => cur = parent,
                None => break,
            }
        }
        p
    }

    /// Map a root-coordinate point into an item's local space.
    pub fn map_to_item(&self, id: ItemId, p: Point) -> Point {
        p - self.map_to_global(id, Point::zero())
    }

    /// All items under a root-coordinate point, frontmost first. Later
    /// siblings paint on top, so they come back before earlier ones, and
    /// descendants before their containers. A point within the hit slop
    /// of a splitter boundary returns the splitter itself instead of its
    /// panes.
    pub fn items_at_point(&self, p: Point) -> Vec<ItemId> {
        let mut out = Vec::new();
        if let Some(rect) = self.items[self.root].rect {
            if rect.contains(p) {
                self.collect_at_point(self.root, p - rect.origin(), &mut out);
            }
        }
        out
    }

    fn collect_at_point(&self, id: ItemId, p: Point, out: &mut Vec<ItemId>) {
        if let Some(state) = self.items[id].composite() {
            if self.splitter_boundary_at(id, p).is_some() {
                out.push(id);
                return;
            }
            for &child in state.children.iter().rev() {
                let node = &self.items[child];
                if !node.visible {
                    continue;
                }
                if let Some(rect) = node.rect {
                    if rect.contains(p) {
                        self.collect_at_point(child, p - rect.origin(), out);
                    }
                }
            }
        }
        out.push(id);
    }

    /// The splitter boundary near an item-local point, if this item is a
    /// splitter. Boundary `i` separates panes `i` and `i + 1`.
    pub(crate) fn splitter_boundary_at(&self, id: ItemId, p: Point) -> Option<usize> {
        let node = self.items.get(id)?;
        let state = node.composite()?;
        let Layout::Splitter { orientation, .. } = &state.layout else {
            return None;
        };
        let size = node.rect?.size();
        let coord = match orientation {
            Orientation::Vertical => p.x,
            Orientation::Horizontal => p.y,
        };
        state
            .layout
            .splitter_boundaries(size, state.children.len())
            .iter()
            .position(|&b| (coord - b).abs() < SPLITTER_HIT_SLOP)
    }

    pub(crate) fn splitter_orientation(&self, id: ItemId) -> Option<Orientation> {
        match &self.items.get(id)?.composite()?.layout {
            Layout::Splitter { orientation, .. } => Some(*orientation),
            _ => None,
        }
    }

    /// Current primary-axis extents of a splitter's panes.
    pub(crate) fn splitter_pane_sizes(&self, id: ItemId) -> Vec<i32> {
        let state = self.items[id].composite().expect("not a composite");
        let orientation = self
            .splitter_orientation(id)
            .expect("not a splitter composite");
        state
            .children
            .iter()
            .map(|&c| {
                let rect = self.items[c].rect.unwrap_or_default();
                match orientation {
                    Orientation::Vertical => rect.w,
                    Orientation::Horizontal => rect.h,
                }
            })
            .collect()
    }

    pub(crate) fn splitter_sizings(&self, id: ItemId) -> Vec<Sizing> {
        match &self.items[id].composite().expect("not a composite").layout {
            Layout::Splitter { sizings, .. } => sizings.clone(),
            _ => panic!("not a splitter composite"),
        }
    }

    pub(crate) fn set_splitter_sizings(&mut self, id: ItemId, new: Vec<Sizing>) {
        match &mut self.items[id]
            .composite_mut()
            .expect("not a composite")
            .layout
        {
            Layout::Splitter { sizings, .. } => {
                assert_eq!(sizings.len(), new.len());
                *sizings = new;
            }
            _ => panic!("not a splitter composite"),
        }
    }

    /// Pane extents as fractions of the splitter's primary axis. `None`
    /// before the first layout.
    pub fn splits(&self, id: ItemId) -> Option<Vec<f32>> {
        let rect = self.items[id].rect?;
        let orientation = self.splitter_orientation(id)?;
        let extent = match orientation {
            Orientation::Vertical => rect.w,
            Orientation::Horizontal => rect.h,
        };
        if extent == 0 {
            return None;
        }
        Some(
            self.splitter_pane_sizes(id)
                .iter()
                .map(|&s| s as f32 / extent as f32)
                .collect(),
        )
    }

    /// Set pane extents as fractions of the primary axis.
    pub fn set_splits(&mut self, id: ItemId, splits: &[f32]) {
        let orientation = self.splitter_orientation(id).expect("not a splitter");
        let mut sizings = self.splitter_sizings(id);
        assert_eq!(sizings.len(), splits.len(), "one split per pane");
        for (sizing, &split) in sizings.iter_mut().zip(splits) {
            match orientation {
                Orientation::Vertical => sizing.preferred_width = Some(Dim::Fraction(split)),
                Orientation::Horizontal => sizing.preferred_height = Some(Dim::Fraction(split)),
            }
        }
        self.set_splitter_sizings(id, sizings);
        self.relayout(id);
        self.update(id);
    }

    /// Scroll a scroll area's content by a delta, clamped so the content
    /// never exposes space beyond its own extent. Fails until the scroll
    /// area and its content have been laid out.
    pub fn scroll_content_by(&mut self, id: ItemId, dx: i32, dy: i32) -> Result<()> {
        let state = self.items[id].composite().expect("not a composite");
        assert!(
            matches!(state.layout, Layout::Scroll { .. }),
            "not a scroll area"
        );
        let Some(&content) = state.children.first() else {
            return Ok(());
        };
        let Some(viewport) = self.items[id].rect else {
            return Err(Error::Layout("scroll area has no layout yet".into()));
        };
        let Some(rect) = self.items[content].rect else {
            return Err(Error::Layout("scroll content has no layout yet".into()));
        };
        let clamp = |pos: i32, view: i32, extent: i32| pos.clamp((view - extent).min(0), 0);
        let origin = Point::new(
            clamp(rect.tl.x - dx, viewport.w, rect.w),
            clamp(rect.tl.y - dy, viewport.h, rect.h),
        );
        if origin != rect.origin() {
            self.update_layout(content, origin, rect.size());
            self.update(content);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Input routing through the structure

    /// Route a wheel event front-to-back through the subtree.
    pub(crate) fn route_wheel(&mut self, id: ItemId, dx: i32, dy: i32, horizontal: bool) -> bool {
        let children: Vec<ItemId> = self.children(id).iter().rev().copied().collect();
        for child in children {
            if self.items[child].visible && self.route_wheel(child, dx, dy, horizontal) {
                return true;
            }
        }
        if let Some(leaf) = self.items[id].leaf_mut() {
            if leaf.wheel_changed(dx, dy, horizontal) {
                self.update(id);
                return true;
            }
        }
        false
    }

    /// Route a pan gesture front-to-back through the subtree.
    pub(crate) fn route_pan(&mut self, id: ItemId, dx: i32, dy: i32) -> bool {
        let children: Vec<ItemId> = self.children(id).iter().rev().copied().collect();
        for child in children {
            if self.items[child].visible && self.route_pan(child, dx, dy) {
                return true;
            }
        }
        if let Some(leaf) = self.items[id].leaf_mut() {
            if leaf.pan_gesture(dx, dy) {
                self.update(id);
                return true;
            }
        }
        false
    }

    pub(crate) fn leaf_mut(&mut self, id: ItemId) -> Option<&mut dyn LeafItem> {
        self.items.get_mut(id).and_then(ItemNode::leaf_mut)
    }

    pub(crate) fn wants_mouse(&self, id: ItemId) -> bool {
        let node = &self.items[id];
        node.wants_mouse && node.enabled
    }

    pub(crate) fn wants_drag(&self, id: ItemId) -> bool {
        let node = &self.items[id];
        node.wants_drag && node.enabled
    }

    // ------------------------------------------------------------------
    // Composers and repainting

    /// This item's state changed in a way that affects layout or paint:
    /// drop memoized composers up to the nearest layer and schedule that
    /// layer's repaint.
    pub fn update(&mut self, id: ItemId) {
        let mut cur = id;
        loop {
            let Some(node) = self.items.get_mut(cur) else {
                return;
            };
            node.composer = None;
            if node.is_layer() {
                self.schedule_repaint(cur);
                return;
            }
            match node.parent {
                Some(parent) => cur = parent,
                None => return,
            }
        }
    }

    /// The memoized composer snapshot for an item, built on demand. A
    /// composite with a visible child that is not yet paintable yields
    /// `None`; layers contribute their last published buffer.
    pub fn get_composer(&mut self, id: ItemId) -> Option<Composer> {
        self.item_composer(id)
    }

    fn item_composer(&mut self, id: ItemId) -> Option<Composer> {
        let node = &self.items[id];
        match &node.kind {
            ItemKind::Composite(state) if state.layer.is_some() => {
                if let Some(composer) = &node.passthrough {
                    return Some(composer.clone());
                }
                let layer = state.layer.as_ref().unwrap();
                // An opaque section layer draws straight to the surface;
                // its container paints nothing in its place.
                let list = if layer.is_section() {
                    Arc::new(DrawList::new())
                } else {
                    layer.published()?
                };
                let composer = Composer::passthrough(list, node.rect);
                self.items[id].passthrough = Some(composer.clone());
                Some(composer)
            }
            ItemKind::Composite(_) => self.subtree_composer(id),
            ItemKind::Leaf(_) => {
                if let Some(composer) = &node.composer {
                    return Some(composer.clone());
                }
                let ItemKind::Leaf(leaf) = &node.kind else {
                    unreachable!()
                };
                let paint = leaf.composer(&self.cache)?;
                let composer =
                    Composer::leaf(paint, node.background.clone(), node.repaints.clone(), node.rect);
                self.items[id].composer = Some(composer.clone());
                Some(composer)
            }
        }
    }

    /// The composite composer for a subtree, ignoring the item's own
    /// layer: this is what the layer's repaint job runs against. Nested
    /// layers still enter as passthroughs.
    fn subtree_composer(&mut self, id: ItemId) -> Option<Composer> {
        if let Some(composer) = &self.items[id].composer {
            return Some(composer.clone());
        }
        let state = self.items[id].composite()?;
        let children = state.children.clone();
        let layout = state.layout.clone();
        let mut slots = Vec::with_capacity(children.len());
        for child in children {
            let sizing = self.layout_sizing(child);
            let composer = if self.items[child].visible {
                // A visible child with no composer means "not yet
                // paintable", which the whole composite inherits.
                Some(self.item_composer(child)?)
            } else {
                None
            };
            slots.push(ComposerChild { composer, sizing });
        }
        let node = &self.items[id];
        let composer = Composer::composite(
            slots,
            layout,
            node.background.clone(),
            node.repaints.clone(),
            node.rect,
        );
        self.items[id].composer = Some(composer.clone());
        Some(composer)
    }

    /// Schedule a background repaint of a layer. While a repaint is
    /// running this coalesces into a single follow-up pass.
    pub(crate) fn schedule_repaint(&mut self, id: ItemId) {
        let Some(node) = self.items.get(id) else {
            return;
        };
        let Some(rect) = node.rect else {
            // Not laid out yet; the first layout pass schedules.
            return;
        };
        {
            let Some(layer) = node.composite().and_then(|s| s.layer.as_ref()) else {
                return;
            };
            if !layer.wants_job() {
                return;
            }
        }
        let Some(composer) = self.subtree_composer(id) else {
            trace!("layer subtree not yet paintable");
            return;
        };
        let node = &self.items[id];
        if let Some(layer) = node.composite().and_then(|s| s.layer.as_ref()) {
            layer.submit(RepaintJob {
                composer,
                size: rect.size(),
                visible: rect.size().rect(),
            });
        }
    }

    /// A layer worker finished a buffer: drop the stale passthrough so
    /// the container picks up the new output, and repaint upward.
    pub(crate) fn layer_published(&mut self, id: ItemId) {
        let Some(node) = self.items.get_mut(id) else {
            // The layer closed between publishing and the poll.
            return;
        };
        node.passthrough = None;
        if let Some(parent) = node.parent {
            self.update(parent);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        items::{BackgroundItem, TextItem},
        testing::{CaptureSink, ScriptedLeaf},
    };

    fn tree() -> CanvasTree {
        let (tx, _rx) = mpsc::channel();
        CanvasTree::new(CaptureSink::new(), tx, Duration::from_millis(1))
    }

    #[test]
    fn root_is_a_layer() {
        let tree = tree();
        assert!(tree.is_attached(tree.root()));
        assert!(tree.items[tree.root()].is_layer());
    }

    #[test]
    #[should_panic(expected = "already attached")]
    fn double_attach_panics() {
        let mut tree = tree();
        let root = tree.root();
        let a = tree.new_composite(Layout::row(0));
        let leaf = tree.new_leaf(Box::new(BackgroundItem::new("#888")));
        tree.add(root, a);
        tree.add(a, leaf);
        tree.add(root, leaf);
    }

    #[test]
    #[should_panic(expected = "not a child")]
    fn removing_a_non_child_panics() {
        let mut tree = tree();
        let root = tree.root();
        let a = tree.new_composite(Layout::row(0));
        let leaf = tree.new_leaf(Box::new(BackgroundItem::new("#888")));
        tree.add(root, a);
        tree.add(a, leaf);
        tree.remove(root, leaf);
    }

    #[test]
    fn remove_closes_the_subtree() {
        let mut tree = tree();
        let root = tree.root();
        let a = tree.new_composite(Layout::row(0));
        let leaf = tree.new_leaf(Box::new(BackgroundItem::new("#888")));
        tree.add(root, a);
        tree.add(a, leaf);
        tree.remove(root, a);
        assert!(!tree.contains(a));
        assert!(!tree.contains(leaf));
    }

    #[test]
    fn hit_testing_is_frontmost_first() {
        let mut tree = tree();
        let root = tree.root();
        let back = tree.new_leaf(Box::new(BackgroundItem::new("#111")));
        let front = tree.new_leaf(Box::new(BackgroundItem::new("#222")));
        tree.add(root, back);
        tree.add(root, front);
        tree.update_layout(root, Point::zero(), Size::new(100, 100));
        let hits = tree.items_at_point(Point::new(50, 50));
        assert_eq!(hits, vec![front, back, root]);
    }

    #[test]
    fn invisible_items_are_not_hit() {
        let mut tree = tree();
        let root = tree.root();
        let leaf = tree.new_leaf(Box::new(BackgroundItem::new("#111")));
        tree.add(root, leaf);
        tree.update_layout(root, Point::zero(), Size::new(100, 100));
        tree.set_visible(leaf, false);
        assert_eq!(tree.items_at_point(Point::new(50, 50)), vec![root]);
    }

    #[test]
    fn collapsible_composite_collapses_without_visible_children() {
        let mut tree = tree();
        let root = tree.root();
        let group = tree.new_composite(Layout::row(0));
        tree.set_sizing(group, Sizing::new().with_collapsible(true));
        let leaf = tree.new_leaf(Box::new(BackgroundItem::new("#111")));
        tree.set_sizing(leaf, Sizing::new().with_fixed_width(40));
        tree.add(root, group);
        tree.add(group, leaf);

        let open = tree.layout_sizing(group);
        assert_eq!(open.preferred_width, Some(Dim::Absolute(40)));

        tree.set_visible(leaf, false);
        let collapsed = tree.layout_sizing(group);
        assert_eq!(collapsed.maximum_width, Some(Dim::Absolute(0)));
        assert_eq!(collapsed.maximum_height, Some(Dim::Absolute(0)));
    }

    #[test]
    fn own_sizing_overrides_aggregate() {
        let mut tree = tree();
        let root = tree.root();
        let group = tree.new_composite(Layout::row(0));
        let leaf = tree.new_leaf(Box::new(BackgroundItem::new("#111")));
        tree.set_sizing(leaf, Sizing::new().with_preferred_width(40));
        tree.add(root, group);
        tree.add(group, leaf);
        tree.set_sizing(group, Sizing::new().with_preferred_width(99));
        assert_eq!(
            tree.layout_sizing(group).preferred_width,
            Some(Dim::Absolute(99))
        );
    }

    #[test]
    fn layout_hook_observes_assigned_rects() {
        let mut tree = tree();
        let root = tree.root();
        let leaf = tree.new_leaf(Box::new(BackgroundItem::new("#111")));
        tree.add(root, leaf);
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = seen.clone();
        tree.set_on_layout(leaf, Box::new(move |rect| log.lock().unwrap().push(rect)));
        tree.update_layout(root, Point::zero(), Size::new(50, 40));
        assert_eq!(seen.lock().unwrap().last(), Some(&Rect::new(0, 0, 50, 40)));
    }

    #[test]
    fn with_leaf_reaches_the_concrete_type() {
        let mut tree = tree();
        let root = tree.root();
        let id = tree.new_leaf(Box::new(TextItem::new("before")));
        tree.add(root, id);
        tree.with_leaf(id, |text: &mut TextItem| text.set_text("after"));
        tree.update(id);
        tree.with_leaf(id, |text: &mut TextItem| assert_eq!(text.text(), "after"));
    }

    #[test]
    fn coordinate_mapping_round_trips() {
        let mut tree = tree();
        let root = tree.root();
        let outer = tree.new_composite(Layout::overlap().with_margins(geom::Margins::uniform(10)));
        let leaf = tree.new_leaf(Box::new(BackgroundItem::new("#111")));
        tree.add(root, outer);
        tree.add(outer, leaf);
        tree.update_layout(root, Point::zero(), Size::new(100, 100));

        assert_eq!(tree.rect(leaf), Some(Rect::new(10, 10, 80, 80)));
        let global = tree.map_to_global(leaf, Point::new(5, 5));
        assert_eq!(global, Point::new(15, 15));
        assert_eq!(tree.map_to_item(leaf, global), Point::new(5, 5));
    }

    #[test]
    fn composer_is_memoized_until_update() {
        let mut tree = tree();
        let root = tree.root();
        let leaf = tree.new_leaf(Box::new(BackgroundItem::new("#111")));
        tree.add(root, leaf);
        tree.update_layout(root, Point::zero(), Size::new(10, 10));

        let first = tree.get_composer(leaf).unwrap();
        let second = tree.get_composer(leaf).unwrap();
        assert!(first.same(&second));

        tree.update(leaf);
        let third = tree.get_composer(leaf).unwrap();
        assert!(!first.same(&third));
    }

    #[test]
    fn unpaintable_child_blocks_the_composite() {
        let mut tree = tree();
        let root = tree.root();
        let group = tree.new_composite(Layout::row(0));
        let leaf = ScriptedLeaf::new();
        let state = leaf.state();
        let id = tree.new_leaf(Box::new(leaf));
        tree.add(root, group);
        tree.add(group, id);
        tree.update_layout(root, Point::zero(), Size::new(10, 10));

        state.set_paintable(false);
        tree.update(id);
        assert!(tree.get_composer(group).is_none());
        state.set_paintable(true);
        tree.update(id);
        assert!(tree.get_composer(group).is_some());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn grid_position_out_of_range_panics() {
        let mut tree = tree();
        let root = tree.root();
        let grid = tree.new_composite(Layout::grid(2, 2));
        tree.add(root, grid);
        let leaf = tree.new_leaf(Box::new(BackgroundItem::new("#111")));
        tree.add_to_grid(grid, leaf, 2, 0);
    }

    #[test]
    fn grid_cells_survive_removal() {
        let mut tree = tree();
        let root = tree.root();
        let grid = tree.new_composite(Layout::grid(2, 1));
        tree.add(root, grid);
        let a = tree.new_leaf(Box::new(BackgroundItem::new("#111")));
        let b = tree.new_leaf(Box::new(BackgroundItem::new("#222")));
        tree.add_to_grid(grid, a, 0, 0);
        tree.add_to_grid(grid, b, 1, 0);
        tree.remove(grid, a);
        tree.update_layout(root, Point::zero(), Size::new(100, 50));
        // b keeps its cell and its placement; a's cell is empty again.
        assert_eq!(tree.rect(b), Some(Rect::new(50, 0, 50, 50)));
    }
}
