mod common;

use common::{copying_keyboard, ctrl_alt, fast_config, harness, harness_with, text_of, Harness};
use multi_clipboards::clipboard::memory::MemoryClipboard;
use multi_clipboards::interceptor::{
    MessageInterceptor, MessageOutcome, ViewerChain, WindowMessage, DUPLICATE_WINDOW,
    WM_CHANGECBCHAIN, WM_DRAWCLIPBOARD, WM_HOTKEY,
};
use multi_clipboards::keyboard::RecordingKeyboard;
use multi_clipboards::slots::SYSTEM_CLIPBOARD_ID;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const HWND: isize = 0x1234;
// Ctrl+Alt in the low word, the key in the high word.
const CTRL_ALT_C: isize = (0x43 << 16) | 0x0003;
const CTRL_ALT_V: isize = (0x56 << 16) | 0x0003;

#[derive(Clone, Default)]
struct RecordingChain(Rc<RefCell<Vec<(isize, u32, usize, isize)>>>);

impl ViewerChain for RecordingChain {
    fn forward(&self, next_viewer: isize, message: &WindowMessage) {
        self.0
            .borrow_mut()
            .push((next_viewer, message.msg, message.wparam, message.lparam));
    }
}

impl RecordingChain {
    fn forwarded(&self) -> Vec<(isize, u32, usize, isize)> {
        self.0.borrow().clone()
    }
}

fn interceptor(h: &Harness) -> (MessageInterceptor, RecordingChain) {
    let chain = RecordingChain::default();
    let interceptor = MessageInterceptor::new(Arc::clone(&h.manager), Box::new(chain.clone()));
    (interceptor, chain)
}

fn hot_key_at(lparam: isize, at: Instant) -> WindowMessage {
    WindowMessage::at(HWND, WM_HOTKEY, 0xC000, lparam, at)
}

fn draw_at(at: Instant) -> WindowMessage {
    WindowMessage::at(HWND, WM_DRAWCLIPBOARD, 0, 0, at)
}

fn join(outcome: MessageOutcome) {
    match outcome {
        MessageOutcome::Dispatched(handle) => handle.join().unwrap(),
        other => panic!("expected a dispatch, got {other:?}"),
    }
}

#[test]
fn duplicate_window_detection() {
    let t0 = Instant::now();
    let first = hot_key_at(CTRL_ALT_C, t0);
    assert!(hot_key_at(CTRL_ALT_C, t0 + Duration::from_millis(499)).is_duplicate_of(&first));
    assert!(!hot_key_at(CTRL_ALT_C, t0 + DUPLICATE_WINDOW).is_duplicate_of(&first));
    assert!(!hot_key_at(CTRL_ALT_V, t0).is_duplicate_of(&first));
    assert!(!WindowMessage::at(HWND + 1, WM_HOTKEY, 0xC000, CTRL_ALT_C, t0).is_duplicate_of(&first));
}

#[test]
fn redelivered_hot_key_is_discarded() {
    let clipboard = Arc::new(MemoryClipboard::new());
    let keyboard = copying_keyboard(&clipboard, "copied");
    let h = harness_with(fast_config(), clipboard, keyboard, vec![ctrl_alt(1)]);
    let (interceptor, _chain) = interceptor(&h);

    let t0 = Instant::now();
    join(interceptor.handle(hot_key_at(CTRL_ALT_C, t0)));
    assert!(matches!(
        interceptor.handle(hot_key_at(CTRL_ALT_C, t0 + Duration::from_millis(100))),
        MessageOutcome::Duplicate
    ));
    assert_eq!(h.keyboard.chords().len(), 1);

    join(interceptor.handle(hot_key_at(CTRL_ALT_C, t0 + Duration::from_secs(2))));
    assert_eq!(h.keyboard.chords().len(), 2);
    assert_eq!(h.manager.slot_preview(1).as_deref(), Some("copied"));
}

#[test]
fn overlapping_hot_key_is_dropped() {
    let clipboard = Arc::new(MemoryClipboard::new());
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);
    let keyboard = RecordingKeyboard::new().on_send(move |_, _| {
        let _ = release_rx.lock().unwrap().recv();
        Ok(())
    });
    let h = harness_with(fast_config(), clipboard, keyboard, vec![ctrl_alt(1)]);
    let (interceptor, _chain) = interceptor(&h);

    let t0 = Instant::now();
    let first = interceptor.handle(hot_key_at(CTRL_ALT_C, t0));
    assert!(interceptor.in_use().is_set());
    assert!(matches!(
        interceptor.handle(hot_key_at(CTRL_ALT_V, t0 + Duration::from_millis(10))),
        MessageOutcome::Busy
    ));

    release_tx.send(()).unwrap();
    join(first);
    assert!(!interceptor.in_use().is_set());
    assert_eq!(h.keyboard.chords().len(), 1);
}

#[test]
fn shutdown_waits_for_running_hot_key_to_restore_clipboard() {
    let clipboard = Arc::new(MemoryClipboard::new());
    clipboard.set_text("user");
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);
    let target = Arc::clone(&clipboard);
    let keyboard = RecordingKeyboard::new().on_send(move |_, _| {
        let _ = release_rx.lock().unwrap().recv();
        target.set_text("selection");
        Ok(())
    });
    let h = harness_with(fast_config(), clipboard, keyboard, vec![ctrl_alt(1)]);
    let (interceptor, _chain) = interceptor(&h);
    let in_use = interceptor.in_use().clone();

    let _worker = interceptor.handle(hot_key_at(CTRL_ALT_C, Instant::now()));
    assert!(!in_use.wait_until_clear(Duration::from_millis(30)));

    release_tx.send(()).unwrap();
    assert!(in_use.wait_until_clear(Duration::from_secs(5)));
    assert_eq!(text_of(&h.clipboard).as_deref(), Some("user"));
    assert_eq!(h.manager.slot_preview(1).as_deref(), Some("selection"));
}

#[test]
fn clipboard_change_while_in_use_is_skipped_but_forwarded() {
    let h = harness(vec![ctrl_alt(1)]);
    let (interceptor, chain) = interceptor(&h);
    interceptor.set_next_viewer(42);

    let t0 = Instant::now();
    // Startup: the first message is the one sent while joining the chain.
    assert!(matches!(interceptor.handle(draw_at(t0)), MessageOutcome::Ignored));

    let guard = interceptor.in_use().try_acquire().unwrap();
    h.clipboard.set_text("written by us");
    assert!(matches!(
        interceptor.handle(draw_at(t0 + Duration::from_secs(1))),
        MessageOutcome::Busy
    ));
    drop(guard);

    assert_eq!(chain.forwarded().len(), 2);
    assert!(chain.forwarded().iter().all(|(next, msg, _, _)| *next == 42 && *msg == WM_DRAWCLIPBOARD));
    assert!(h.manager.history_entries().is_empty());
}

#[test]
fn external_clipboard_change_is_stored() {
    let h = harness(vec![]);
    let (interceptor, chain) = interceptor(&h);
    interceptor.set_next_viewer(42);

    let t0 = Instant::now();
    interceptor.handle(draw_at(t0));
    h.clipboard.set_text("from another app");
    join(interceptor.handle(draw_at(t0 + Duration::from_secs(1))));

    assert_eq!(
        h.manager.slot_preview(SYSTEM_CLIPBOARD_ID).as_deref(),
        Some("from another app")
    );
    assert_eq!(h.manager.history_entries().len(), 1);
    assert_eq!(chain.forwarded().len(), 2);
}

#[test]
fn duplicate_clipboard_change_is_still_forwarded() {
    let h = harness(vec![]);
    let (interceptor, chain) = interceptor(&h);
    interceptor.set_next_viewer(42);

    let t0 = Instant::now();
    interceptor.handle(draw_at(t0));
    assert!(matches!(
        interceptor.handle(draw_at(t0 + Duration::from_millis(50))),
        MessageOutcome::Duplicate
    ));
    assert_eq!(chain.forwarded().len(), 2);
}

#[test]
fn nothing_is_forwarded_without_a_next_viewer() {
    let h = harness(vec![]);
    let (interceptor, chain) = interceptor(&h);
    interceptor.handle(draw_at(Instant::now()));
    assert!(chain.forwarded().is_empty());
}

#[test]
fn chain_change_tracks_or_forwards() {
    let h = harness(vec![]);
    let (interceptor, chain) = interceptor(&h);
    interceptor.set_next_viewer(42);

    let removed_next = WindowMessage::new(HWND, WM_CHANGECBCHAIN, 42, 77);
    assert!(matches!(interceptor.handle(removed_next), MessageOutcome::ChainUpdated));
    assert_eq!(interceptor.next_viewer(), 77);
    assert!(chain.forwarded().is_empty());

    let removed_other = WindowMessage::new(HWND, WM_CHANGECBCHAIN, 99, 5);
    assert!(matches!(interceptor.handle(removed_other), MessageOutcome::Forwarded));
    assert_eq!(chain.forwarded(), vec![(77, WM_CHANGECBCHAIN, 99, 5)]);
    assert_eq!(interceptor.next_viewer(), 77);
}

#[test]
fn hot_key_waits_for_modifier_release() {
    let h = harness(vec![ctrl_alt(1)]);
    h.keyboard.hold_modifiers_for(2);
    let (interceptor, _chain) = interceptor(&h);
    join(interceptor.handle(hot_key_at(CTRL_ALT_C, Instant::now())));
    assert_eq!(h.keyboard.poll_count(), 3);
    assert_eq!(h.keyboard.chords().len(), 1);
}

#[test]
fn panicking_worker_is_contained_and_clipboard_restored() {
    let clipboard = Arc::new(MemoryClipboard::new());
    clipboard.set_text("user data");
    let target = Arc::clone(&clipboard);
    let keyboard = RecordingKeyboard::new().on_send(move |_, _| {
        target.set_text("garbage");
        panic!("foreground application vanished");
    });
    let h = harness_with(fast_config(), clipboard, keyboard, vec![ctrl_alt(1)]);
    let (interceptor, _chain) = interceptor(&h);

    join(interceptor.handle(hot_key_at(CTRL_ALT_C, Instant::now())));
    assert!(!interceptor.in_use().is_set());
    assert_eq!(text_of(&h.clipboard).as_deref(), Some("user data"));
}

#[test]
fn unmatched_hot_key_does_not_poison_the_loop() {
    let h = harness(vec![ctrl_alt(1)]);
    let (interceptor, _chain) = interceptor(&h);
    // Shift+C is not bound.
    join(interceptor.handle(hot_key_at((0x43 << 16) | 0x0004, Instant::now())));
    assert!(!interceptor.in_use().is_set());
    assert!(h.keyboard.chords().is_empty());
}

#[test]
fn other_messages_are_unhandled() {
    let h = harness(vec![]);
    let (interceptor, _chain) = interceptor(&h);
    assert!(matches!(
        interceptor.handle(WindowMessage::new(HWND, 0x0010, 0, 0)),
        MessageOutcome::Unhandled
    ));
}
