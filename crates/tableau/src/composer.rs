//! Composers: immutable per-frame snapshots of canvas items.
//!
//! A composer mirrors one node and owns its children's composers. It is
//! `Send + Sync` so layer workers can lay it out and paint it while the
//! live tree keeps mutating on the UI thread. Layout and paint results
//! are cached behind a per-composer lock; the snapshot itself never
//! changes after construction.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use geom::{Point, Rect, Size};
use tracing::warn;

use crate::{
    draw::{Color, DrawList},
    error::Result,
    layer::CancelToken,
    layout::{Layout, LayoutChild},
    sizing::Sizing,
};

/// Paint behavior captured from a leaf item. Implementations must be
/// self-contained values: they run on layer worker threads.
pub trait LeafPaint: Send + Sync {
    /// Paint into `list` within `(0, 0)..size`. Errors are caught at the
    /// composer boundary and logged; the frame paints as empty space.
    fn paint(&self, list: &mut DrawList, size: Size) -> Result<()>;
}

/// One child slot of a composite composer. Slots parallel the live
/// child list so index-addressed layouts (grids, splitters) line up;
/// invisible children occupy their slot with no composer.
pub(crate) struct ComposerChild {
    pub(crate) composer: Option<Composer>,
    pub(crate) sizing: Sizing,
}

pub(crate) enum ComposerKind {
    Leaf(Arc<dyn LeafPaint>),
    Composite {
        children: Vec<ComposerChild>,
        layout: Layout,
    },
    /// Pre-rendered output of another layer, forwarded verbatim.
    Passthrough(Arc<DrawList>),
}

/// Cached paint output for one visible region.
struct CachedPaint {
    visible: Rect,
    list: Arc<DrawList>,
}

#[derive(Default)]
struct ComposerState {
    /// Rect assigned by the last `update_layout`, parent-local.
    rect: Option<Rect>,
    cached: Option<CachedPaint>,
}

struct ComposerInner {
    kind: ComposerKind,
    background: Option<Color>,
    /// Repaint counter shared with the live node. Passthrough composers
    /// forward pre-rendered output and carry no counter.
    repaints: Option<Arc<AtomicU64>>,
    state: Mutex<ComposerState>,
}

/// An immutable snapshot of one canvas item, cheap to clone.
#[derive(Clone)]
pub struct Composer {
    inner: Arc<ComposerInner>,
}

impl Composer {
    pub(crate) fn leaf(
        paint: Arc<dyn LeafPaint>,
        background: Option<Color>,
        repaints: Arc<AtomicU64>,
        rect: Option<Rect>,
    ) -> Self {
        Self::build(ComposerKind::Leaf(paint), background, Some(repaints), rect)
    }

    pub(crate) fn composite(
        children: Vec<ComposerChild>,
        layout: Layout,
        background: Option<Color>,
        repaints: Arc<AtomicU64>,
        rect: Option<Rect>,
    ) -> Self {
        Self::build(
            ComposerKind::Composite { children, layout },
            background,
            Some(repaints),
            rect,
        )
    }

    pub(crate) fn passthrough(list: Arc<DrawList>, rect: Option<Rect>) -> Self {
        Self::build(ComposerKind::Passthrough(list), None, None, rect)
    }

    fn build(
        kind: ComposerKind,
        background: Option<Color>,
        repaints: Option<Arc<AtomicU64>>,
        rect: Option<Rect>,
    ) -> Self {
        Self {
            inner: Arc::new(ComposerInner {
                kind,
                background,
                repaints,
                state: Mutex::new(ComposerState {
                    rect,
                    cached: None,
                }),
            }),
        }
    }

    /// True if two handles refer to the same snapshot.
    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The rect assigned by the last layout, parent-local.
    pub fn rect(&self) -> Option<Rect> {
        self.inner.state.lock().unwrap().rect
    }

    /// Assign this composer's rect. A no-op if the rect is unchanged;
    /// otherwise the cached paint output is dropped and all children are
    /// re-laid-out through the layout strategy snapshot.
    pub fn update_layout(&self, origin: Point, size: Size) {
        let rect = Rect::from_origin_size(origin, size);
        {
            let mut state = self.inner.state.lock().unwrap();
            if state.rect == Some(rect) {
                return;
            }
            state.rect = Some(rect);
            state.cached = None;
        }
        if let ComposerKind::Composite { children, layout } = &self.inner.kind {
            let layout_children: Vec<LayoutChild> = children
                .iter()
                .map(|child| LayoutChild {
                    sizing: child.sizing.clone(),
                    rect: child.composer.as_ref().and_then(Composer::rect),
                })
                .collect();
            // Children are placed in this composer's local coordinates.
            let placements = layout.place(Point::zero(), size, &layout_children);
            for (child, placement) in children.iter().zip(placements) {
                if let (Some(composer), Some(rect)) = (&child.composer, placement) {
                    composer.update_layout(rect.origin(), rect.size());
                }
            }
        }
    }

    /// Paint into `out`, reusing cached output when the visible region is
    /// unchanged. Returns false if cancellation was observed, in which
    /// case nothing may be published.
    pub fn repaint(&self, out: &mut DrawList, visible: Rect, cancel: &CancelToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        let mut state = self.inner.state.lock().unwrap();
        let Some(rect) = state.rect else {
            // Repaint can race ahead of the first layout; there is
            // nothing to draw yet.
            return true;
        };
        if let Some(cached) = &state.cached {
            if cached.visible == visible {
                out.splice(cached.list.clone());
                return true;
            }
        }

        let mut list = DrawList::new();
        if let Some(background) = &self.inner.background {
            list.fill_rect(rect.size().rect(), background.clone());
        }
        match &self.inner.kind {
            ComposerKind::Leaf(paint) => {
                let mut own = DrawList::new();
                match paint.paint(&mut own, rect.size()) {
                    Ok(()) => list.splice(Arc::new(own)),
                    Err(err) => {
                        // A failing leaf paints as empty space this frame
                        // and recovers on the next successful repaint.
                        warn!(%err, "leaf paint failed");
                        list = DrawList::new();
                    }
                }
            }
            ComposerKind::Composite { children, .. } => {
                for child in children {
                    if cancel.is_cancelled() {
                        return false;
                    }
                    let Some(composer) = &child.composer else {
                        continue;
                    };
                    let Some(child_rect) = composer.rect() else {
                        continue;
                    };
                    let Some(overlap) = visible.intersect(child_rect) else {
                        continue;
                    };
                    let child_visible = overlap.translate(-child_rect.origin());
                    list.save();
                    list.translate(child_rect.tl.x, child_rect.tl.y);
                    if !composer.repaint(&mut list, child_visible, cancel) {
                        return false;
                    }
                    list.restore();
                }
            }
            ComposerKind::Passthrough(buffer) => {
                list.splice(buffer.clone());
            }
        }
        if let Some(repaints) = &self.inner.repaints {
            repaints.fetch_add(1, Ordering::Relaxed);
        }
        let list = Arc::new(list);
        out.splice(list.clone());
        state.cached = Some(CachedPaint { visible, list });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct FillPaint;

    impl LeafPaint for FillPaint {
        fn paint(&self, list: &mut DrawList, size: Size) -> Result<()> {
            list.fill_rect(size.rect(), "#abc");
            Ok(())
        }
    }

    struct FailPaint;

    impl LeafPaint for FailPaint {
        fn paint(&self, _list: &mut DrawList, _size: Size) -> Result<()> {
            Err(Error::Paint("broken".into()))
        }
    }

    fn counter() -> Arc<AtomicU64> {
        Arc::new(AtomicU64::new(0))
    }

    fn flat_len(list: &DrawList) -> usize {
        let mut n = 0;
        list.visit(&mut |_| n += 1);
        n
    }

    #[test]
    fn update_layout_is_idempotent() {
        let repaints = counter();
        let composer = Composer::leaf(Arc::new(FillPaint), None, repaints.clone(), None);
        composer.update_layout(Point::zero(), Size::new(10, 10));

        let mut out = DrawList::new();
        let cancel = CancelToken::new();
        assert!(composer.repaint(&mut out, Size::new(10, 10).rect(), &cancel));
        assert_eq!(repaints.load(Ordering::Relaxed), 1);

        // Same rect: the paint cache survives.
        composer.update_layout(Point::zero(), Size::new(10, 10));
        let mut out = DrawList::new();
        assert!(composer.repaint(&mut out, Size::new(10, 10).rect(), &cancel));
        assert_eq!(repaints.load(Ordering::Relaxed), 1);

        // New rect: cache cleared, repaint happens.
        composer.update_layout(Point::zero(), Size::new(20, 10));
        let mut out = DrawList::new();
        assert!(composer.repaint(&mut out, Size::new(20, 10).rect(), &cancel));
        assert_eq!(repaints.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn visible_rect_change_invalidates_paint() {
        let repaints = counter();
        let composer = Composer::leaf(Arc::new(FillPaint), None, repaints.clone(), None);
        composer.update_layout(Point::zero(), Size::new(40, 40));
        let cancel = CancelToken::new();

        let mut out = DrawList::new();
        composer.repaint(&mut out, Rect::new(0, 0, 40, 40), &cancel);
        let mut out = DrawList::new();
        composer.repaint(&mut out, Rect::new(0, 0, 20, 40), &cancel);
        assert_eq!(repaints.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn failing_leaf_paints_empty() {
        let composer = Composer::leaf(
            Arc::new(FailPaint),
            Some("#fff".into()),
            counter(),
            None,
        );
        composer.update_layout(Point::zero(), Size::new(10, 10));
        let mut out = DrawList::new();
        assert!(composer.repaint(&mut out, Size::new(10, 10).rect(), &CancelToken::new()));
        assert_eq!(flat_len(&out), 0);
    }

    #[test]
    fn composite_repaints_only_intersecting_children() {
        let make_leaf = |repaints: &Arc<AtomicU64>| {
            Composer::leaf(Arc::new(FillPaint), None, repaints.clone(), None)
        };
        let left = counter();
        let right = counter();
        let children = vec![
            ComposerChild {
                composer: Some(make_leaf(&left)),
                sizing: Sizing::new(),
            },
            ComposerChild {
                composer: Some(make_leaf(&right)),
                sizing: Sizing::new(),
            },
        ];
        let composite = Composer::composite(
            children,
            Layout::row(0),
            None,
            counter(),
            None,
        );
        composite.update_layout(Point::zero(), Size::new(100, 10));

        // Only the left half is visible.
        let mut out = DrawList::new();
        assert!(composite.repaint(&mut out, Rect::new(0, 0, 50, 10), &CancelToken::new()));
        assert_eq!(left.load(Ordering::Relaxed), 1);
        assert_eq!(right.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn cancellation_stops_publishing() {
        let composer = Composer::composite(
            vec![ComposerChild {
                composer: Some(Composer::leaf(Arc::new(FillPaint), None, counter(), None)),
                sizing: Sizing::new(),
            }],
            Layout::overlap(),
            None,
            counter(),
            None,
        );
        composer.update_layout(Point::zero(), Size::new(10, 10));
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut out = DrawList::new();
        assert!(!composer.repaint(&mut out, Size::new(10, 10).rect(), &cancel));
    }
}
