//! Integration tests for the threaded layer pipeline: publishing,
//! coalescing, cancellation, and sections.

#[cfg(test)]
mod tests {
    use std::{
        sync::Arc,
        thread,
        time::{Duration, Instant},
    };

    use tableau::{
        DrawCommand, ItemId, Layout, Root, RootOptions,
        geom::Rect,
        testing::{CaptureSink, PaintGate, RecordingChrome, ScriptedLeaf, ScriptedState},
    };

    const WAIT: Duration = Duration::from_secs(5);

    fn fixture() -> (Root, Arc<CaptureSink>) {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let sink = CaptureSink::new();
        let chrome = RecordingChrome::new();
        let root = Root::new(
            sink.clone(),
            Box::new(chrome),
            RootOptions {
                max_frame_rate: 1000,
            },
        );
        (root, sink)
    }

    /// A layer with one scripted leaf, attached under the root.
    fn layer_with_leaf(root: &mut Root) -> (ItemId, ItemId, Arc<ScriptedState>) {
        let tree = root.tree_mut();
        let base = tree.root();
        let layer = tree.new_layer(Layout::overlap());
        tree.add(base, layer);
        let leaf = ScriptedLeaf::new();
        let state = leaf.state();
        let id = tree.new_leaf(Box::new(leaf));
        tree.add(layer, id);
        (layer, id, state)
    }

    /// Drive the event loop until `done` or the deadline passes.
    fn pump(root: &mut Root, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            root.poll_timeout(Duration::from_millis(10));
        }
        done()
    }

    #[test]
    fn published_layer_buffers_reach_the_draw_sink() {
        let (mut root, sink) = fixture();
        let (layer, _, state) = layer_with_leaf(&mut root);
        root.size_changed(80, 60);
        assert!(pump(&mut root, || sink.draw_count() >= 1));
        assert!(state.paint_count() >= 1);
        // The off-thread repaint shows up on the layer's own counter.
        assert!(root.tree().repaint_count(layer) >= 1);

        // The leaf's fill made it through layer publish and root repaint.
        let mut filled = false;
        sink.last_draw().unwrap().visit(&mut |cmd| {
            if matches!(cmd, DrawCommand::FillRect { .. }) {
                filled = true;
            }
        });
        assert!(filled);
    }

    #[test]
    fn updates_during_a_repaint_coalesce_into_one_more_pass() {
        let (mut root, _sink) = fixture();
        let (_, leaf, state) = layer_with_leaf(&mut root);
        let gate = PaintGate::new();
        state.set_gate(gate.clone());
        root.size_changed(80, 60);
        assert!(gate.wait_entered(WAIT));

        // Five updates land while the first repaint is still painting.
        for _ in 0..5 {
            root.tree_mut().update(leaf);
        }
        gate.release();

        assert!(pump(&mut root, || state.paint_count() >= 2));
        // Let any stray repaints surface, then confirm there were none.
        let deadline = Instant::now() + Duration::from_millis(200);
        while Instant::now() < deadline {
            root.poll_timeout(Duration::from_millis(10));
        }
        assert_eq!(state.paint_count(), 2);
    }

    #[test]
    fn closing_a_layer_joins_the_inflight_repaint() {
        let (mut root, sink) = fixture();
        let (layer, _, state) = layer_with_leaf(&mut root);
        let gate = PaintGate::new();
        state.set_gate(gate.clone());
        root.size_changed(80, 60);
        assert!(gate.wait_entered(WAIT));

        let release = {
            let gate = gate.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(100));
                gate.release();
            })
        };
        let before = Instant::now();
        let base = root.tree().root();
        root.tree_mut().remove(base, layer);
        // Close blocked until the worker observed cancellation.
        assert!(before.elapsed() >= Duration::from_millis(100));
        release.join().unwrap();

        // The cancelled pass published nothing: whatever the root draws
        // after the removal, the leaf's fill is not in it.
        let deadline = Instant::now() + Duration::from_millis(200);
        while Instant::now() < deadline {
            root.poll_timeout(Duration::from_millis(10));
        }
        if let Some(draw) = sink.last_draw() {
            draw.visit(&mut |cmd| {
                assert!(!matches!(cmd, DrawCommand::FillRect { .. }));
            });
        }
    }

    #[test]
    fn section_layers_draw_directly_to_the_surface() {
        let (mut root, sink) = fixture();
        let tree = root.tree_mut();
        let base = tree.root();
        let section = tree.new_section_layer(Layout::overlap());
        tree.add(base, section);
        let leaf = tree.new_leaf(Box::new(ScriptedLeaf::new()));
        tree.add(section, leaf);
        root.size_changed(100, 100);

        assert!(pump(&mut root, || !sink.sections().is_empty()));
        let (_, rect) = sink.sections()[0];
        assert_eq!(rect, Rect::new(0, 0, 100, 100));

        let id = sink.sections()[0].0;
        root.tree_mut().remove(base, section);
        assert_eq!(sink.removed_sections(), vec![id]);
    }

    #[test]
    fn a_failing_leaf_paints_empty_and_recovers() {
        let (mut root, sink) = fixture();
        let (_, leaf, state) = layer_with_leaf(&mut root);
        state.set_fail_paint(true);
        root.size_changed(80, 60);

        // The failing frame still publishes and draws, just without the
        // leaf's content.
        assert!(pump(&mut root, || sink.draw_count() >= 1));
        let mut filled = false;
        sink.last_draw().unwrap().visit(&mut |cmd| {
            if matches!(cmd, DrawCommand::FillRect { .. }) {
                filled = true;
            }
        });
        assert!(!filled);

        state.set_fail_paint(false);
        root.tree_mut().update(leaf);
        assert!(pump(&mut root, || {
            let mut filled = false;
            if let Some(draw) = sink.last_draw() {
                draw.visit(&mut |cmd| {
                    if matches!(cmd, DrawCommand::FillRect { .. }) {
                        filled = true;
                    }
                });
            }
            filled
        }));
    }
}
