use code_replay::{
    CodeReplay, Direction, EditorWidget, HeadlessConfig, HeadlessEditor, Operation, PlaybackHub,
    Position, ReplayConfig, ReplayError, ReplayState, SelectionRange, SelectionRect, TextChange,
    Trace,
};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

fn insert(line: usize, ch: usize, text: &str) -> Operation {
    let at = Position::new(line, ch);
    Operation::Text(TextChange::new(
        at,
        at,
        text.split('\n').map(str::to_string).collect(),
        vec![String::new()],
    ))
}

fn typing_trace() -> Trace<Operation> {
    Trace::new(vec![(0.0, insert(0, 0, "ab")), (100.0, insert(0, 2, "c"))]).unwrap()
}

fn mounted(trace: Trace<Operation>, text: &str) -> CodeReplay<HeadlessEditor> {
    let mut replay = CodeReplay::new(trace, ReplayConfig::default(), &()).unwrap();
    replay.mount(HeadlessEditor::new(text, HeadlessConfig::default()));
    replay
}

fn lines(replay: &CodeReplay<HeadlessEditor>) -> Vec<String> {
    replay.state().value.lines().to_vec()
}

#[test]
fn test_forward_then_back_scenario() {
    let mut replay = mounted(typing_trace(), "");

    replay.on_time_update(50.0);
    assert_eq!(lines(&replay), vec!["ab"]);

    replay.on_time_update(150.0);
    assert_eq!(lines(&replay), vec!["abc"]);
    assert_eq!(replay.widget().unwrap().value(), "abc");

    replay.on_time_update(50.0);
    assert_eq!(lines(&replay), vec!["ab"]);
    assert_eq!(replay.widget().unwrap().value(), "ab");
    assert_eq!(replay.index(), 1);
}

#[test]
fn test_same_time_twice_commits_once() {
    let mut replay = mounted(typing_trace(), "");
    assert!(replay.on_time_update(150.0));
    assert!(!replay.on_time_update(150.0));
    assert!(!replay.on_time_update(160.0));
    assert_eq!(replay.last_time(), 160.0);
}

#[test]
fn test_ticks_before_mount_are_ignored() {
    let mut replay: CodeReplay<HeadlessEditor> =
        CodeReplay::new(typing_trace(), ReplayConfig::default(), &()).unwrap();
    assert!(!replay.on_time_update(1_000.0));
    assert_eq!(replay.index(), 0);
    assert_eq!(replay.state(), &ReplayState::default());
}

#[test]
fn test_unmounted_replay_stops_reacting() {
    let mut replay = mounted(typing_trace(), "");
    replay.on_time_update(50.0);
    let widget = replay.unmount().unwrap();
    assert_eq!(widget.value(), "ab");
    assert!(!replay.on_time_update(150.0));
}

#[test]
fn test_remount_replays_from_the_first_entry() {
    let mut replay = mounted(typing_trace(), "");
    replay.on_time_update(150.0);
    assert_eq!(replay.index(), 2);
    replay.unmount();

    replay.mount(HeadlessEditor::default());
    assert_eq!(replay.index(), 0);
    assert_eq!(replay.last_time(), 0.0);
    assert_eq!(lines(&replay), vec![""]);

    assert!(replay.on_time_update(150.0));
    assert_eq!(lines(&replay), vec!["abc"]);
    assert_eq!(replay.widget().unwrap().value(), "abc");
}

#[test]
fn test_empty_trace() {
    let mut replay = mounted(Trace::empty(), "untouched");
    assert_eq!(replay.duration(), None);
    assert!(!replay.on_time_update(500.0));
    assert!(!replay.on_time_update(0.0));
    assert_eq!(replay.widget().unwrap().value(), "untouched");
}

#[test]
fn test_out_of_range_text_is_clamped() {
    let trace = Trace::new(vec![(
        10.0,
        Operation::Text(TextChange::new(
            Position::new(0, 1),
            Position::new(5, 9),
            vec!["X".into()],
            vec!["bc".into(), "def".into()],
        )),
    )])
    .unwrap();

    let mut replay = mounted(trace, "abc\ndef");
    replay.on_time_update(20.0);
    assert_eq!(lines(&replay), vec!["aX"]);

    replay.on_time_update(0.0);
    assert_eq!(lines(&replay), vec!["abc", "def"]);
}

#[test]
fn test_trace_is_replayed_onto_widget_text() {
    let trace = Trace::new(vec![(0.0, insert(1, 0, "// "))]).unwrap();
    let mut replay = mounted(trace, "fn a() {}\nfn b() {}");
    replay.on_time_update(1.0);
    assert_eq!(
        replay.widget().unwrap().value(),
        "fn a() {}\n// fn b() {}"
    );
}

#[test]
fn test_start_marker_offsets_the_trace() {
    let markers = HashMap::from([("typing".to_string(), 1_000.0)]);
    let config = ReplayConfig::default().with_start("typing");
    let mut replay = CodeReplay::new(typing_trace(), config, &markers).unwrap();
    replay.mount(HeadlessEditor::default());

    replay.on_time_update(999.0);
    assert_eq!(lines(&replay), vec![""]);
    replay.on_time_update(1_050.0);
    assert_eq!(lines(&replay), vec!["ab"]);
    assert_eq!(replay.start(), 1_000.0);
}

#[test]
fn test_unknown_start_marker_is_an_error() {
    let config = ReplayConfig::default().with_start("nowhere");
    let result = CodeReplay::<HeadlessEditor>::new(typing_trace(), config, &());
    assert!(matches!(result, Err(ReplayError::UnknownMarker(name)) if name == "nowhere"));
}

#[test]
fn test_invalid_trace_json_is_an_error() {
    let result = CodeReplay::<HeadlessEditor>::from_json(
        r#"[[-5, ["cursor", {"line": 0, "ch": 0}]]]"#,
        ReplayConfig::default(),
        &(),
    );
    assert!(matches!(result, Err(ReplayError::Trace(_))));

    let result = CodeReplay::<HeadlessEditor>::from_json(
        r#"[[5, ["teleport", {}]]]"#,
        ReplayConfig::default(),
        &(),
    );
    assert!(matches!(result, Err(ReplayError::Trace(_))));
}

#[test]
fn test_commands_go_to_handler_in_both_directions() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();

    let trace = Trace::new(vec![
        (0.0, Operation::Command("run".into())),
        (100.0, insert(0, 0, "x")),
    ])
    .unwrap();
    let mut replay = CodeReplay::new(trace, ReplayConfig::default().with_start(100.0), &())
        .unwrap()
        .with_command_handler(Box::new(
            move |dir: Direction, name: &str, state: &ReplayState| {
                sink.borrow_mut()
                    .push(format!("{}:{}:{}", dir.as_str(), name, state.value.text()));
            },
        ));
    replay.mount(HeadlessEditor::default());

    replay.on_time_update(150.0);
    replay.on_time_update(300.0);
    replay.on_time_update(50.0);

    assert_eq!(*log.borrow(), vec!["fwd:run:", "back:run:"]);
    assert_eq!(lines(&replay), vec![""]);
}

#[test]
fn test_viewer_scroll_and_selection_survive_commit() {
    let mut replay = mounted(typing_trace(), "");
    {
        let widget = replay.widget_mut().unwrap();
        widget.scroll_to(12.0, 40.0);
        widget.set_selection(SelectionRange::caret(Position::new(0, 0)));
    }

    replay.on_time_update(150.0);

    let widget = replay.widget().unwrap();
    assert_eq!(widget.scroll_info().left, 12.0);
    assert_eq!(widget.scroll_info().top, 40.0);
    assert_eq!(
        widget.selection(),
        SelectionRange::caret(Position::new(0, 0))
    );
}

#[test]
fn test_single_line_selection_renders_one_rect() {
    let range = SelectionRange::new(Position::new(0, 0), Position::new(0, 2));
    let trace = Trace::new(vec![(0.0, Operation::Selection(range))]).unwrap();
    let mut replay = mounted(trace, "abcd");

    replay.on_time_update(10.0);

    assert_eq!(replay.state().selection, Some(range));
    assert_eq!(
        replay.selection_overlay().rects(),
        &[SelectionRect {
            left: 0.0,
            top: 0.0,
            width: 16.0,
            height: 16.0,
        }]
    );
    assert_eq!(replay.cursor_overlay().position(), Position::new(0, 2));
    assert_eq!(replay.cursor_overlay().rect().left, 16.0);
}

#[test]
fn test_multi_line_selection_rects() {
    let range = SelectionRange::new(Position::new(2, 1), Position::new(0, 1));
    let trace = Trace::new(vec![(0.0, Operation::Selection(range))]).unwrap();
    let mut replay = mounted(trace, "abc\ndefgh\nij");

    replay.on_time_update(0.0);

    let rects = replay.selection_overlay().rects();
    assert_eq!(rects.len(), 3);
    assert_eq!((rects[0].left, rects[0].width, rects[0].top), (8.0, 632.0, 0.0));
    assert_eq!((rects[1].left, rects[1].width, rects[1].top), (0.0, 640.0, 16.0));
    assert_eq!((rects[2].left, rects[2].width, rects[2].top), (0.0, 8.0, 32.0));
}

#[test]
fn test_reverting_caret_ops_restores_previous_caret() {
    let range = SelectionRange::new(Position::new(0, 1), Position::new(0, 3));
    let trace = Trace::new(vec![
        (0.0, Operation::Cursor(Position::new(0, 2))),
        (100.0, Operation::Selection(range)),
        (100.0, Operation::Cursor(Position::new(0, 4))),
    ])
    .unwrap();
    let mut replay = mounted(trace, "abcdef");

    replay.on_time_update(250.0);
    assert_eq!(replay.state().cursor, Position::new(0, 4));
    assert_eq!(replay.state().selection, None);

    replay.on_time_update(150.0);
    assert_eq!(replay.state().cursor, Position::new(0, 3));
    assert_eq!(replay.state().selection, Some(range));
    assert_eq!(replay.selection_overlay().rects().len(), 1);

    replay.on_time_update(50.0);
    assert_eq!(replay.state().cursor, Position::new(0, 2));
    assert_eq!(replay.state().selection, None);
    assert!(replay.selection_overlay().rects().is_empty());
}

#[test]
fn test_cursor_overlay_uses_widget_geometry() {
    let config = HeadlessConfig::default()
        .with_cell_size(10.0, 20.0)
        .with_cursor_height(0.5)
        .with_cursor_blink_rate(400);
    let trace = Trace::new(vec![(0.0, Operation::Cursor(Position::new(1, 3)))]).unwrap();
    let mut replay = CodeReplay::new(trace, ReplayConfig::default(), &()).unwrap();
    replay.mount(HeadlessEditor::new("a\nbcdef", config));

    replay.on_time_update(0.0);
    let rect = replay.cursor_overlay().rect();
    assert_eq!((rect.left, rect.top, rect.height), (30.0, 20.0, 10.0));

    assert_eq!(
        replay.cursor_overlay().blink_interval(),
        Duration::from_millis(400)
    );
    replay
        .cursor_overlay_mut()
        .advance(Duration::from_millis(400));
    assert!(!replay.cursor_overlay().is_visible());
    replay.blink_cursor();
    assert!(replay.cursor_overlay().is_visible());
}

#[test]
fn test_playback_hub_drives_attached_replay() {
    let replay = Rc::new(RefCell::new(mounted(typing_trace(), "")));
    let mut hub = PlaybackHub::new();
    let id = CodeReplay::attach(&replay, &mut hub);

    hub.time_update(150.0);
    assert_eq!(lines(&replay.borrow()), vec!["abc"]);
    hub.seek(20.0);
    assert_eq!(lines(&replay.borrow()), vec!["ab"]);

    assert!(hub.off(id));
    hub.time_update(500.0);
    assert_eq!(lines(&replay.borrow()), vec!["ab"]);
}

#[test]
fn test_dropped_replay_is_not_kept_alive_by_hub() {
    let replay = Rc::new(RefCell::new(mounted(typing_trace(), "")));
    let mut hub = PlaybackHub::new();
    CodeReplay::attach(&replay, &mut hub);

    let weak = Rc::downgrade(&replay);
    drop(replay);
    assert!(weak.upgrade().is_none());
    hub.time_update(150.0);
    assert_eq!(hub.current_time(), 150.0);
}
