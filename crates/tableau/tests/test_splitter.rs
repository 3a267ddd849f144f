//! Integration tests for splitter boundary drags and snapping.

#[cfg(test)]
mod tests {
    use tableau::{
        CursorShape, ItemId, Layout, Modifiers, Root, RootOptions,
        geom::{Orientation, Point},
        testing::{CaptureSink, RecordingChrome, ScriptedLeaf},
    };

    struct Fixture {
        root: Root,
        chrome: RecordingChrome,
        splitter: ItemId,
        left: ItemId,
        right: ItemId,
    }

    /// A vertical two-pane splitter filling a 200x100 canvas, boundary
    /// at the midpoint.
    fn fixture() -> Fixture {
        let sink = CaptureSink::new();
        let chrome = RecordingChrome::new();
        let mut root = Root::new(
            sink,
            Box::new(chrome.clone()),
            RootOptions {
                max_frame_rate: 1000,
            },
        );
        let tree = root.tree_mut();
        let base = tree.root();
        let splitter = tree.new_composite(Layout::splitter(Orientation::Vertical));
        tree.add(base, splitter);
        let left = tree.new_leaf(Box::new(ScriptedLeaf::new()));
        tree.add(splitter, left);
        let right = tree.new_leaf(Box::new(ScriptedLeaf::new()));
        tree.add(splitter, right);
        root.size_changed(200, 100);
        Fixture {
            root,
            chrome,
            splitter,
            left,
            right,
        }
    }

    fn pane_widths(f: &Fixture) -> (i32, i32) {
        (
            f.root.tree().rect(f.left).unwrap().w,
            f.root.tree().rect(f.right).unwrap().w,
        )
    }

    #[test]
    fn panes_start_at_an_even_split() {
        let f = fixture();
        assert_eq!(pane_widths(&f), (100, 100));
        assert_eq!(f.root.tree().splits(f.splitter), Some(vec![0.5, 0.5]));
    }

    #[test]
    fn boundary_hits_return_the_splitter_itself() {
        let f = fixture();
        let hits = f.root.tree().items_at_point(Point::new(100, 50));
        assert_eq!(hits[0], f.splitter);
        // Away from the boundary the panes are hit as usual.
        let hits = f.root.tree().items_at_point(Point::new(30, 50));
        assert_eq!(hits[0], f.left);
    }

    #[test]
    fn dragging_the_boundary_transfers_width_between_panes() {
        let mut f = fixture();
        f.root.mouse_pressed(100, 50, Modifiers::none());
        // +20 lands at 120: no snap target within reach.
        f.root.mouse_position_changed(120, 50, Modifiers::none());
        assert_eq!(pane_widths(&f), (120, 80));
        f.root.mouse_released(120, 50, Modifiers::none());
        assert_eq!(pane_widths(&f), (120, 80));
    }

    #[test]
    fn the_drag_result_survives_release_and_relayout() {
        let mut f = fixture();
        f.root
            .simulate_drag((100, 50), (120, 50), Modifiers::none());
        assert_eq!(pane_widths(&f), (120, 80));
        let splits = f.root.tree().splits(f.splitter).unwrap();
        assert!((splits[0] - 0.6).abs() < 1e-6);

        f.root.size_changed(200, 100);
        assert_eq!(pane_widths(&f), (120, 80));
    }

    #[test]
    fn boundaries_snap_to_thirds() {
        let mut f = fixture();
        f.root.mouse_pressed(100, 50, Modifiers::none());
        // 125 is within the snap tolerance of 133.
        f.root.mouse_position_changed(125, 50, Modifiers::none());
        assert_eq!(pane_widths(&f), (133, 67));
    }

    #[test]
    fn control_suppresses_snapping() {
        let mut f = fixture();
        let control = Modifiers {
            control: true,
            ..Modifiers::none()
        };
        f.root.mouse_pressed(100, 50, control);
        f.root.mouse_position_changed(125, 50, control);
        assert_eq!(pane_widths(&f), (125, 75));
    }

    #[test]
    fn hovering_a_boundary_reports_a_resize_cursor() {
        let mut f = fixture();
        f.root.mouse_position_changed(100, 50, Modifiers::none());
        assert_eq!(f.chrome.last_cursor(), Some(CursorShape::SplitVertical));
        f.root.mouse_position_changed(30, 50, Modifiers::none());
        assert_eq!(f.chrome.last_cursor(), None);
    }

    #[test]
    fn set_splits_reapportions_the_panes() {
        let mut f = fixture();
        f.root.tree_mut().set_splits(f.splitter, &[0.25, 0.75]);
        assert_eq!(pane_widths(&f), (50, 150));
    }
}
