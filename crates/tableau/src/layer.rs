//! Per-layer background repaint machinery.
//!
//! Each layer owns one worker thread and a single-slot job mailbox. The
//! mailbox realizes the scheduling state machine: an empty idle slot, a
//! scheduled job waiting to be taken, a running repaint, and a coalescing
//! "needs another pass" flag for updates that arrive mid-repaint. Closing
//! a layer cancels cooperatively and joins the worker before any
//! layer-owned state is released.

use std::{
    sync::{
        Arc, Condvar, Mutex,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    thread,
    time::{Duration, Instant},
};

use geom::{Point, Rect, Size};
use tracing::{debug, trace};

use crate::{
    composer::Composer,
    draw::DrawList,
    item::ItemId,
    surface::{DrawSink, SectionId},
};

/// Cooperative cancellation flag checked before each paint step.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Where a finished buffer goes.
pub(crate) enum PublishMode {
    /// The root layer hands its buffer straight to the draw surface.
    Root,
    /// An opaque top-level layer draws into a dedicated surface section
    /// once the root layout has published the section's rect.
    Section(SectionId),
    /// Publish into the layer's slot for the container tree to pick up.
    ToParent,
}

/// Notifications drained by `Root::poll` on the UI thread.
pub(crate) enum RootEvent {
    /// A layer published a buffer for its container to forward.
    LayerPublished(ItemId),
    /// Updates arrived while a repaint was in flight; schedule exactly
    /// one more.
    RepaintAgain(ItemId),
}

/// A unit of background work: the snapshot to lay out and paint.
pub(crate) struct RepaintJob {
    pub(crate) composer: Composer,
    pub(crate) size: Size,
    pub(crate) visible: Rect,
}

#[derive(Default)]
struct Mailbox {
    job: Option<RepaintJob>,
    running: bool,
    pending: bool,
    closing: bool,
}

struct LayerShared {
    mailbox: Mutex<Mailbox>,
    work_cv: Condvar,
    cancel: CancelToken,
    /// Latest successfully painted buffer, for passthrough composers.
    published: Mutex<Option<Arc<DrawList>>>,
    /// Section handshake: the root layout pass publishes the layer's
    /// surface rect here; the worker blocks on it before direct-drawing.
    section_rect: Mutex<Option<Rect>>,
    section_cv: Condvar,
}

/// The repaint scheduling handle owned by a layer node.
pub(crate) struct Layer {
    shared: Arc<LayerShared>,
    worker: Option<thread::JoinHandle<()>>,
    mode_is_section: Option<SectionId>,
    sink: Arc<dyn DrawSink>,
}

impl Layer {
    pub(crate) fn new(
        item: ItemId,
        mode: PublishMode,
        sink: Arc<dyn DrawSink>,
        events: mpsc::Sender<RootEvent>,
        min_interval: Duration,
    ) -> Self {
        let shared = Arc::new(LayerShared {
            mailbox: Mutex::new(Mailbox::default()),
            work_cv: Condvar::new(),
            cancel: CancelToken::new(),
            published: Mutex::new(None),
            section_rect: Mutex::new(None),
            section_cv: Condvar::new(),
        });
        let mode_is_section = match mode {
            PublishMode::Section(id) => Some(id),
            _ => None,
        };
        let worker = {
            let shared = shared.clone();
            let sink = sink.clone();
            thread::spawn(move || worker_loop(item, &mode, &shared, sink.as_ref(), &events, min_interval))
        };
        Self {
            shared,
            worker: Some(worker),
            mode_is_section,
            sink,
        }
    }

    /// True if the caller should build and submit a fresh job. While a
    /// repaint is running this instead records that one more pass is
    /// needed, so any number of updates coalesce into a single repaint
    /// after the current one completes.
    pub(crate) fn wants_job(&self) -> bool {
        let mut mailbox = self.shared.mailbox.lock().unwrap();
        if mailbox.closing {
            return false;
        }
        if mailbox.running {
            mailbox.pending = true;
            return false;
        }
        true
    }

    /// Submit a job, replacing any not-yet-started one.
    pub(crate) fn submit(&self, job: RepaintJob) {
        {
            let mut mailbox = self.shared.mailbox.lock().unwrap();
            if mailbox.closing {
                return;
            }
            if mailbox.running {
                mailbox.pending = true;
                return;
            }
            mailbox.job = Some(job);
        }
        self.shared.work_cv.notify_all();
    }

    /// The most recently published buffer, if any.
    pub(crate) fn published(&self) -> Option<Arc<DrawList>> {
        self.shared.published.lock().unwrap().clone()
    }

    /// True if this layer direct-draws into a surface section.
    pub(crate) fn is_section(&self) -> bool {
        self.mode_is_section.is_some()
    }

    /// Publish the layer's surface rect for the section handshake.
    pub(crate) fn set_section_rect(&self, rect: Rect) {
        {
            let mut slot = self.shared.section_rect.lock().unwrap();
            *slot = Some(rect);
        }
        self.shared.section_cv.notify_all();
    }

    /// Cancel, wake, and join the worker. Blocks until the in-flight
    /// repaint (if any) has observed cancellation; no new job can be
    /// scheduled once this begins. Must not be called from the layer's
    /// own repaint task.
    pub(crate) fn close(&mut self) {
        {
            let mut mailbox = self.shared.mailbox.lock().unwrap();
            mailbox.closing = true;
            mailbox.job = None;
        }
        self.shared.cancel.cancel();
        self.shared.work_cv.notify_all();
        self.shared.section_cv.notify_all();
        if let Some(worker) = self.worker.take() {
            // The worker exits promptly: every paint step checks the token.
            let _ = worker.join();
        }
        if let Some(section) = self.mode_is_section {
            self.sink.remove_section(section);
        }
        debug!("layer closed");
    }
}

impl Drop for Layer {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.close();
        }
    }
}

fn worker_loop(
    item: ItemId,
    mode: &PublishMode,
    shared: &LayerShared,
    sink: &dyn DrawSink,
    events: &mpsc::Sender<RootEvent>,
    min_interval: Duration,
) {
    let mut last_paint: Option<Instant> = None;
    loop {
        // Wait for a job or cancellation.
        let job = {
            let mut mailbox = shared.mailbox.lock().unwrap();
            loop {
                if shared.cancel.is_cancelled() {
                    return;
                }
                if let Some(job) = mailbox.job.take() {
                    mailbox.running = true;
                    break job;
                }
                mailbox = shared.work_cv.wait(mailbox).unwrap();
            }
        };

        // Debounce: hold the configured frame interval between paints.
        if let Some(last) = last_paint {
            let deadline = last + min_interval;
            let mut mailbox = shared.mailbox.lock().unwrap();
            while !shared.cancel.is_cancelled() {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                let (guard, _) = shared
                    .work_cv
                    .wait_timeout(mailbox, deadline - now)
                    .unwrap();
                mailbox = guard;
            }
        }
        if shared.cancel.is_cancelled() {
            return;
        }

        trace!("layer repaint starting");
        job.composer.update_layout(Point::zero(), job.size);
        let mut list = DrawList::new();
        let completed = job.composer.repaint(&mut list, job.visible, &shared.cancel);
        last_paint = Some(Instant::now());

        if completed && !shared.cancel.is_cancelled() {
            match mode {
                PublishMode::Root => sink.draw(list),
                PublishMode::Section(section) => {
                    // Block until the root layout pass has published this
                    // layer's surface coordinates; the two layouts race
                    // independently.
                    match wait_for_section_rect(shared) {
                        Some(rect) => sink.draw_section(*section, list, rect),
                        None => return,
                    }
                }
                PublishMode::ToParent => {
                    {
                        let mut published = shared.published.lock().unwrap();
                        *published = Some(Arc::new(list));
                    }
                    let _ = events.send(RootEvent::LayerPublished(item));
                }
            }
        }

        let mut mailbox = shared.mailbox.lock().unwrap();
        mailbox.running = false;
        if mailbox.pending && !shared.cancel.is_cancelled() {
            mailbox.pending = false;
            let _ = events.send(RootEvent::RepaintAgain(item));
        }
        if shared.cancel.is_cancelled() {
            return;
        }
    }
}

fn wait_for_section_rect(shared: &LayerShared) -> Option<Rect> {
    let mut slot = shared.section_rect.lock().unwrap();
    loop {
        if shared.cancel.is_cancelled() {
            return None;
        }
        if let Some(rect) = *slot {
            return Some(rect);
        }
        slot = shared.section_cv.wait(slot).unwrap();
    }
}
