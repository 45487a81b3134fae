use multi_clipboards::notify::{
    Notification, NotificationKind, NotificationQueue, NotificationSink, ToastLogSink,
};
use tempfile::tempdir;

#[test]
fn queue_drops_oldest_when_full() {
    let queue = NotificationQueue::new(2);
    queue.notify(Notification::error("one"));
    queue.notify(Notification::warning("two"));
    queue.notify(Notification::success("three"));
    assert_eq!(queue.len(), 2);

    let drained = queue.drain();
    let texts: Vec<&str> = drained.iter().map(|n| n.text.as_str()).collect();
    assert_eq!(texts, vec!["two", "three"]);
    assert_eq!(drained[1].kind, NotificationKind::Success);
    assert!(queue.is_empty());
}

#[test]
fn toast_log_appends_lines() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("notifications.log");
    let sink = ToastLogSink::new(&path);
    sink.notify(Notification::warning("Unable to register hot key combination Ctrl+Alt+C."));
    sink.notify(Notification::error("The clipboard is busy."));

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with(" - WARNING - Unable to register hot key combination Ctrl+Alt+C."));
    assert!(lines[1].contains(" - ERROR - "));
}
