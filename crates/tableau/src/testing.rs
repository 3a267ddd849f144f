//! Test support: capturing sinks, a scriptable leaf, and input
//! simulation helpers.
//!
//! Available to this crate's own tests and, behind the `testing`
//! feature, to downstream harnesses.

use std::{
    sync::{
        Arc, Condvar, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use geom::{Point, Rect, Size};

use crate::{
    cache::ComposerCache,
    composer::LeafPaint,
    draw::{Color, DrawList},
    error::{Error, Result},
    event::{CursorShape, DragAction, Key, Modifiers},
    item::LeafItem,
    root::Root,
    surface::{ChromeSink, DrawSink, MimeData, SectionId},
};

/// A draw sink that records everything it is handed. Waiting helpers
/// block on a condvar so tests can synchronize with layer workers
/// without sleeping.
#[derive(Default)]
pub struct CaptureSink {
    state: Mutex<CaptureState>,
    cv: Condvar,
}

#[derive(Default)]
struct CaptureState {
    draws: Vec<DrawList>,
    sections: Vec<(SectionId, DrawList, Rect)>,
    removed: Vec<SectionId>,
}

impl CaptureSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn draw_count(&self) -> usize {
        self.state.lock().unwrap().draws.len()
    }

    pub fn last_draw(&self) -> Option<DrawList> {
        self.state.lock().unwrap().draws.last().cloned()
    }

    pub fn sections(&self) -> Vec<(SectionId, Rect)> {
        self.state
            .lock()
            .unwrap()
            .sections
            .iter()
            .map(|(id, _, rect)| (*id, *rect))
            .collect()
    }

    pub fn removed_sections(&self) -> Vec<SectionId> {
        self.state.lock().unwrap().removed.clone()
    }

    /// Block until at least `n` root draws have arrived.
    pub fn wait_for_draws(&self, n: usize, timeout: Duration) -> bool {
        let mut state = self.state.lock().unwrap();
        let deadline = Instant::now() + timeout;
        while state.draws.len() < n {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self.cv.wait_timeout(state, deadline - now).unwrap();
            state = guard;
        }
        true
    }

    /// Block until at least `n` section draws have arrived.
    pub fn wait_for_sections(&self, n: usize, timeout: Duration) -> bool {
        let mut state = self.state.lock().unwrap();
        let deadline = Instant::now() + timeout;
        while state.sections.len() < n {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self.cv.wait_timeout(state, deadline - now).unwrap();
            state = guard;
        }
        true
    }
}

impl DrawSink for CaptureSink {
    fn draw(&self, commands: DrawList) {
        self.state.lock().unwrap().draws.push(commands);
        self.cv.notify_all();
    }

    fn draw_section(&self, section: SectionId, commands: DrawList, rect: Rect) {
        self.state
            .lock()
            .unwrap()
            .sections
            .push((section, commands, rect));
        self.cv.notify_all();
    }

    fn remove_section(&self, section: SectionId) {
        self.state.lock().unwrap().removed.push(section);
        self.cv.notify_all();
    }
}

/// A chrome sink that logs cursor and tooltip reports. Clone the handle
/// before moving it into the root.
#[derive(Default, Clone)]
pub struct RecordingChrome {
    log: Arc<Mutex<ChromeLog>>,
}

#[derive(Default)]
struct ChromeLog {
    cursors: Vec<Option<CursorShape>>,
    tooltips: Vec<(String, Point)>,
}

impl RecordingChrome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_cursor(&self) -> Option<CursorShape> {
        self.log.lock().unwrap().cursors.last().copied().flatten()
    }

    pub fn cursor_reports(&self) -> usize {
        self.log.lock().unwrap().cursors.len()
    }

    pub fn tooltips(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .tooltips
            .iter()
            .map(|(text, _)| text.clone())
            .collect()
    }
}

impl ChromeSink for RecordingChrome {
    fn set_cursor(&mut self, shape: Option<CursorShape>) {
        self.log.lock().unwrap().cursors.push(shape);
    }

    fn show_tooltip(&mut self, text: &str, at: Point) {
        self.log.lock().unwrap().tooltips.push((text.into(), at));
    }
}

/// One-shot gate a scripted paint blocks on. `wait_entered` lets the
/// test observe that a worker is inside paint; `release` lets the worker
/// continue (and stays open for later paints).
#[derive(Default)]
pub struct PaintGate {
    entered: Mutex<u32>,
    entered_cv: Condvar,
    open: Mutex<bool>,
    open_cv: Condvar,
}

impl PaintGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn pass(&self) {
        {
            let mut entered = self.entered.lock().unwrap();
            *entered += 1;
        }
        self.entered_cv.notify_all();
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.open_cv.wait(open).unwrap();
        }
    }

    /// Block until a paint has reached the gate.
    pub fn wait_entered(&self, timeout: Duration) -> bool {
        let mut entered = self.entered.lock().unwrap();
        let deadline = Instant::now() + timeout;
        while *entered == 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self.entered_cv.wait_timeout(entered, deadline - now).unwrap();
            entered = guard;
        }
        true
    }

    /// Open the gate, permanently.
    pub fn release(&self) {
        let mut open = self.open.lock().unwrap();
        *open = true;
        self.open_cv.notify_all();
    }
}

/// Shared state behind a `ScriptedLeaf`, inspectable after the leaf has
/// moved into the tree.
#[derive(Default)]
pub struct ScriptedState {
    events: Mutex<Vec<String>>,
    paints: AtomicU64,
    paintable: AtomicBool,
    fail_paint: AtomicBool,
    handle_mouse: AtomicBool,
    accept_drags: AtomicBool,
    gate: Mutex<Option<Arc<PaintGate>>>,
}

impl ScriptedState {
    /// Every callback the leaf received, in order, formatted.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn paint_count(&self) -> u64 {
        self.paints.load(Ordering::SeqCst)
    }

    /// When false, `composer` yields nothing ("not yet paintable").
    pub fn set_paintable(&self, paintable: bool) {
        self.paintable.store(paintable, Ordering::SeqCst);
    }

    /// When true, every paint fails with a paint error.
    pub fn set_fail_paint(&self, fail: bool) {
        self.fail_paint.store(fail, Ordering::SeqCst);
    }

    /// When true, mouse callbacks report handled.
    pub fn set_handle_mouse(&self, handle: bool) {
        self.handle_mouse.store(handle, Ordering::SeqCst);
    }

    /// When true, drag callbacks respond with `Accept`.
    pub fn set_accept_drags(&self, accept: bool) {
        self.accept_drags.store(accept, Ordering::SeqCst);
    }

    /// Install a gate every subsequent paint must pass.
    pub fn set_gate(&self, gate: Arc<PaintGate>) {
        *self.gate.lock().unwrap() = Some(gate);
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    fn handled(&self) -> bool {
        self.handle_mouse.load(Ordering::SeqCst)
    }

    fn drag_action(&self) -> DragAction {
        if self.accept_drags.load(Ordering::SeqCst) {
            DragAction::Accept
        } else {
            DragAction::Ignore
        }
    }
}

/// A leaf with programmable responses that records every callback.
pub struct ScriptedLeaf {
    state: Arc<ScriptedState>,
    color: Color,
    tooltip: Option<String>,
}

impl ScriptedLeaf {
    pub fn new() -> Self {
        let state = Arc::new(ScriptedState::default());
        state.set_paintable(true);
        Self {
            state,
            color: "#4a6".into(),
            tooltip: None,
        }
    }

    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    pub fn state(&self) -> Arc<ScriptedState> {
        self.state.clone()
    }
}

impl Default for ScriptedLeaf {
    fn default() -> Self {
        Self::new()
    }
}

struct ScriptedPaint {
    state: Arc<ScriptedState>,
    color: Color,
}

impl LeafPaint for ScriptedPaint {
    fn paint(&self, list: &mut DrawList, size: Size) -> Result<()> {
        self.state.paints.fetch_add(1, Ordering::SeqCst);
        let gate = self.state.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.pass();
        }
        if self.state.fail_paint.load(Ordering::SeqCst) {
            return Err(Error::Paint("scripted failure".into()));
        }
        list.fill_rect(size.rect(), self.color.clone());
        Ok(())
    }
}

impl LeafItem for ScriptedLeaf {
    fn composer(&self, _cache: &ComposerCache) -> Option<Arc<dyn LeafPaint>> {
        if !self.state.paintable.load(Ordering::SeqCst) {
            return None;
        }
        Some(Arc::new(ScriptedPaint {
            state: self.state.clone(),
            color: self.color.clone(),
        }))
    }

    fn mouse_clicked(&mut self, p: Point, _modifiers: Modifiers) -> bool {
        self.state.record(format!("clicked {},{}", p.x, p.y));
        self.state.handled()
    }

    fn mouse_double_clicked(&mut self, p: Point, _modifiers: Modifiers) -> bool {
        self.state.record(format!("double-clicked {},{}", p.x, p.y));
        self.state.handled()
    }

    fn mouse_entered(&mut self) -> bool {
        self.state.record("entered".into());
        false
    }

    fn mouse_exited(&mut self) -> bool {
        self.state.record("exited".into());
        false
    }

    fn mouse_pressed(&mut self, p: Point, _modifiers: Modifiers) -> bool {
        self.state.record(format!("pressed {},{}", p.x, p.y));
        self.state.handled()
    }

    fn mouse_released(&mut self, p: Point, _modifiers: Modifiers) -> bool {
        self.state.record(format!("released {},{}", p.x, p.y));
        self.state.handled()
    }

    fn mouse_position_changed(&mut self, p: Point, _modifiers: Modifiers) -> bool {
        self.state.record(format!("moved {},{}", p.x, p.y));
        self.state.handled()
    }

    fn wheel_changed(&mut self, dx: i32, dy: i32, _horizontal: bool) -> bool {
        self.state.record(format!("wheel {dx},{dy}"));
        self.state.handled()
    }

    fn key_pressed(&mut self, key: &Key) -> bool {
        self.state.record(format!("key {:?}", key.code));
        self.state.handled()
    }

    fn focus_changed(&mut self, focused: bool, modifiers: Modifiers) {
        self.state
            .record(format!("focus {focused} shift={}", modifiers.shift));
    }

    fn drag_enter(&mut self, _mime: &MimeData) -> DragAction {
        self.state.record("drag-enter".into());
        self.state.drag_action()
    }

    fn drag_leave(&mut self) -> DragAction {
        self.state.record("drag-leave".into());
        self.state.drag_action()
    }

    fn drag_move(&mut self, _mime: &MimeData, p: Point) -> DragAction {
        self.state.record(format!("drag-move {},{}", p.x, p.y));
        self.state.drag_action()
    }

    fn drop(&mut self, _mime: &MimeData, p: Point) -> DragAction {
        self.state.record(format!("drop {},{}", p.x, p.y));
        self.state.drag_action()
    }

    fn tooltip(&self) -> Option<String> {
        self.tooltip.clone()
    }
}

impl Root {
    /// Press and release at a point.
    pub fn simulate_click(&mut self, x: i32, y: i32, modifiers: Modifiers) {
        self.mouse_pressed(x, y, modifiers);
        self.mouse_released(x, y, modifiers);
        self.mouse_clicked(x, y, modifiers);
    }

    /// Press, drag through the midpoint, release.
    pub fn simulate_drag(&mut self, from: (i32, i32), to: (i32, i32), modifiers: Modifiers) {
        self.mouse_pressed(from.0, from.1, modifiers);
        self.mouse_position_changed(from.0, from.1, modifiers);
        let mid = ((from.0 + to.0) / 2, (from.1 + to.1) / 2);
        self.mouse_position_changed(mid.0, mid.1, modifiers);
        self.mouse_position_changed(to.0, to.1, modifiers);
        self.mouse_released(to.0, to.1, modifiers);
    }
}
