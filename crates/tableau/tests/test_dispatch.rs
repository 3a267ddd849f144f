//! Integration tests for root event dispatch: tracking, capture, focus,
//! and drag-and-drop routing.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tableau::{
        CursorShape, DragAction, ItemId, Key, KeyCode, Layout, MimeData, Modifiers, Root,
        RootOptions, Sizing,
        testing::{CaptureSink, RecordingChrome, ScriptedLeaf, ScriptedState},
    };

    struct Fixture {
        root: Root,
        chrome: RecordingChrome,
        row: ItemId,
        a: ItemId,
        a_state: Arc<ScriptedState>,
        b: ItemId,
        b_state: Arc<ScriptedState>,
    }

    /// Two 50-unit leaves side by side in a 100x100 canvas.
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
        let row = tree.new_composite(Layout::row(0));
        tree.add(base, row);
        let mut add_leaf = |tree: &mut tableau::CanvasTree| {
            let leaf = ScriptedLeaf::new();
            let state = leaf.state();
            state.set_handle_mouse(true);
            let id = tree.new_leaf(Box::new(leaf));
            tree.set_sizing(id, Sizing::new().with_fixed_width(50));
            tree.set_wants_mouse(id, true);
            tree.add(row, id);
            (id, state)
        };
        let (a, a_state) = add_leaf(tree);
        let (b, b_state) = add_leaf(tree);
        root.size_changed(100, 100);
        Fixture {
            root,
            chrome,
            row,
            a,
            a_state,
            b,
            b_state,
        }
    }

    #[test]
    fn capture_overrides_hit_testing() {
        let mut f = fixture();
        f.root.mouse_pressed(25, 10, Modifiers::none());
        // The cursor leaves a's bounds mid-drag; a still gets the event.
        f.root.mouse_position_changed(75, 10, Modifiers::none());
        assert!(f.a_state.events().contains(&"pressed 25,10".to_string()));
        assert!(f.a_state.events().contains(&"moved 75,10".to_string()));
        assert!(f.b_state.events().is_empty());

        f.root.mouse_released(75, 10, Modifiers::none());
        assert!(f.a_state.events().contains(&"released 75,10".to_string()));
    }

    #[test]
    fn tracking_fires_exit_and_enter_on_crossings() {
        let mut f = fixture();
        f.root.mouse_position_changed(25, 10, Modifiers::none());
        assert_eq!(f.a_state.events()[0], "entered");
        f.root.mouse_position_changed(75, 10, Modifiers::none());
        assert!(f.a_state.events().contains(&"exited".to_string()));
        assert_eq!(f.b_state.events()[0], "entered");
    }

    #[test]
    fn detached_items_receive_no_exit() {
        let mut f = fixture();
        f.root.mouse_position_changed(25, 10, Modifiers::none());
        let before = f.a_state.events();
        f.root.tree_mut().remove(f.row, f.a);
        // The row re-laid-out, so b now starts at x = 0.
        f.root.mouse_position_changed(25, 10, Modifiers::none());
        assert_eq!(f.a_state.events(), before);
        assert_eq!(f.b_state.events()[0], "entered");
    }

    #[test]
    fn focus_is_deferred_to_release_with_press_modifiers() {
        let mut f = fixture();
        f.root.tree_mut().set_focusable(f.a, true);
        let shift = Modifiers {
            shift: true,
            ..Modifiers::none()
        };
        f.root.mouse_pressed(25, 10, shift);
        assert_eq!(f.root.focused_item(), None);
        // Shift is gone by release time; focus still reports press state.
        f.root.mouse_released(25, 10, Modifiers::none());
        assert_eq!(f.root.focused_item(), Some(f.a));
        let events = f.a_state.events();
        let focus_at = events
            .iter()
            .position(|e| e == "focus true shift=true")
            .expect("focus event with press-time modifiers");
        let release_at = events.iter().position(|e| e.starts_with("released")).unwrap();
        assert!(focus_at < release_at);
    }

    #[test]
    fn focus_walks_to_the_nearest_focusable_ancestor() {
        let mut f = fixture();
        f.root.tree_mut().set_focusable(f.row, true);
        f.root.simulate_click(25, 10, Modifiers::none());
        assert_eq!(f.root.focused_item(), Some(f.row));
    }

    #[test]
    fn tab_clears_focus_when_unhandled() {
        let mut f = fixture();
        f.root.tree_mut().set_focusable(f.a, true);
        f.root.request_focus(f.a);
        assert_eq!(f.root.focused_item(), Some(f.a));
        f.a_state.set_handle_mouse(false);
        assert!(f.root.key_pressed(&Key::new(KeyCode::Tab)));
        assert_eq!(f.root.focused_item(), None);
    }

    #[test]
    fn keys_go_to_the_focused_item_only() {
        let mut f = fixture();
        f.root.tree_mut().set_focusable(f.b, true);
        f.root.request_focus(f.b);
        f.root.key_pressed(&Key::from('x'));
        assert!(f.b_state.events().contains(&"key Char('x')".to_string()));
        assert!(!f.a_state.events().iter().any(|e| e.starts_with("key")));
    }

    #[test]
    fn widget_focus_out_remembers_and_restores() {
        let mut f = fixture();
        f.root.tree_mut().set_focusable(f.a, true);
        f.root.request_focus(f.a);
        f.root.widget_focus_changed(false);
        assert_eq!(f.root.focused_item(), None);
        assert!(f.a_state.events().contains(&"focus false shift=false".to_string()));
        f.root.widget_focus_changed(true);
        assert_eq!(f.root.focused_item(), Some(f.a));
    }

    #[test]
    fn cursor_follows_the_tracked_item() {
        let mut f = fixture();
        f.root.set_cursor_shape(f.a, Some(CursorShape::Hand));
        f.root.mouse_position_changed(25, 10, Modifiers::none());
        assert_eq!(f.chrome.last_cursor(), Some(CursorShape::Hand));
        f.root.mouse_position_changed(75, 10, Modifiers::none());
        assert_eq!(f.chrome.last_cursor(), None);

        // Changing the tracked item's shape re-reports immediately.
        f.root.set_cursor_shape(f.b, Some(CursorShape::IBeam));
        assert_eq!(f.chrome.last_cursor(), Some(CursorShape::IBeam));
    }

    #[test]
    fn tooltip_is_shown_on_enter() {
        let sink = CaptureSink::new();
        let chrome = RecordingChrome::new();
        let mut root = Root::new(sink, Box::new(chrome.clone()), RootOptions::default());
        let tree = root.tree_mut();
        let base = tree.root();
        let id = tree.new_leaf(Box::new(ScriptedLeaf::new().with_tooltip("hint")));
        tree.set_wants_mouse(id, true);
        tree.add(base, id);
        root.size_changed(40, 40);
        root.mouse_position_changed(10, 10, Modifiers::none());
        assert_eq!(chrome.tooltips(), vec!["hint".to_string()]);
    }

    #[test]
    fn drag_routes_through_wanting_items_only() {
        let mut f = fixture();
        f.root.tree_mut().set_wants_drag(f.a, true);
        f.a_state.set_accept_drags(true);
        let mime = MimeData::new();

        assert_eq!(f.root.drag_enter(&mime), DragAction::Accept);
        assert_eq!(f.root.drag_move(&mime, 25, 10), DragAction::Accept);
        assert!(f.a_state.events().contains(&"drag-enter".to_string()));

        // b does not want drags: moving over it leaves a and goes nowhere.
        assert_eq!(f.root.drag_move(&mime, 75, 10), DragAction::Ignore);
        assert!(f.a_state.events().contains(&"drag-leave".to_string()));
        assert!(f.b_state.events().is_empty());

        f.root.drag_move(&mime, 30, 10);
        assert_eq!(f.root.drop(&mime, 30, 10), DragAction::Accept);
        assert!(f.a_state.events().contains(&"drop 30,10".to_string()));
    }

    #[test]
    fn wheel_routes_front_to_back() {
        let mut f = fixture();
        assert!(f.root.wheel_changed(0, 5, false));
        // b was inserted later, so it sits in front and wins.
        assert!(f.b_state.events().contains(&"wheel 0,5".to_string()));
        assert!(f.a_state.events().is_empty());
    }
}
