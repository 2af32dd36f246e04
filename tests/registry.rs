use pdfp_progress::{
    event::{self, ChannelSink, ProgressEvent, ProgressSink},
    key::{WorkerKey, make_key},
    registry::Registry,
};

fn key(name: &str) -> WorkerKey {
    make_key("OCR", &format!("/scans/{name}"))
}

#[test]
fn done_twice_is_a_no_op() {
    let mut reg = Registry::default();
    let k = key("a.pdf");
    reg.on_progress(&k, 10.0);
    reg.on_done(&k);
    reg.on_done(&k);
    assert!(reg.is_empty());
    assert!(!reg.is_visible());
}

#[test]
fn done_for_unknown_key_is_ignored() {
    let mut reg = Registry::default();
    reg.on_progress(&key("a.pdf"), 5.0);
    reg.on_done(&key("b.pdf"));
    assert_eq!(reg.len(), 1);
    assert!(reg.is_visible());
}

#[test]
fn first_progress_creates_entry_and_shows_panel() {
    let mut reg = Registry::default();
    let k = key("a.pdf");
    assert!(!reg.is_visible());
    reg.on_progress(&k, 42.5);
    let entry = reg.get(&k).expect("entry");
    assert_eq!(entry.percent(), 42.5);
    assert_eq!(entry.label(), "OCR a.pdf:");
    assert!(reg.is_visible());
}

#[test]
fn progress_is_clamped() {
    let mut reg = Registry::default();
    let k = key("a.pdf");
    reg.on_progress(&k, 140.0);
    assert_eq!(reg.get(&k).unwrap().percent(), 100.0);
    reg.on_progress(&k, -3.0);
    assert_eq!(reg.get(&k).unwrap().percent(), 0.0);
    reg.on_progress(&k, f64::NAN);
    assert_eq!(reg.get(&k).unwrap().percent(), 0.0);
}

#[test]
fn relabel_of_unknown_key_creates_entry() {
    let mut reg = Registry::default();
    let k = key("book.pdf");
    reg.on_relabel(&k, "OCR Postprocessing");
    let entry = reg.get(&k).expect("entry");
    assert_eq!(entry.label(), "OCR Postprocessing book.pdf:");
    assert_eq!(entry.percent(), 0.0);
    assert!(reg.is_visible());
}

#[test]
fn relabel_keeps_percent() {
    let mut reg = Registry::default();
    let k = key("book.pdf");
    reg.on_progress(&k, 60.0);
    reg.on_relabel(&k, "TTS");
    let entry = reg.get(&k).unwrap();
    assert_eq!(entry.label(), "TTS book.pdf:");
    assert_eq!(entry.percent(), 60.0);
}

#[test]
fn panel_hides_after_last_entry_retires() {
    let mut reg = Registry::default();
    let keys: Vec<_> = (0..4).map(|i| key(&format!("{i}.pdf"))).collect();
    for k in &keys {
        reg.on_progress(k, 0.0);
    }
    assert_eq!(reg.len(), 4);
    for (i, k) in keys.iter().enumerate() {
        assert!(reg.is_visible());
        if i % 2 == 0 {
            reg.on_done(k);
        } else {
            reg.on_failed(k, "boom");
        }
    }
    assert!(reg.is_empty());
    assert!(!reg.is_visible());
}

#[test]
fn entries_keep_creation_order() {
    let mut reg = Registry::default();
    for name in ["c.pdf", "a.pdf", "b.pdf"] {
        reg.on_progress(&key(name), 1.0);
    }
    reg.on_progress(&key("c.pdf"), 50.0);
    let names: Vec<_> = reg.entries().map(|e| e.key().display_name().to_string()).collect();
    assert_eq!(names, vec!["c.pdf", "a.pdf", "b.pdf"]);
}

#[test]
fn resize_applies_to_live_and_later_entries() {
    let mut reg = Registry::new(35);
    reg.on_progress(&key("a.pdf"), 0.0);
    reg.on_resize(100);
    reg.on_progress(&key("b.pdf"), 0.0);
    assert!(reg.entries().all(|e| e.max_label_width() == 65));

    reg.on_resize(20);
    assert_eq!(reg.label_width(), 0);
}

#[test]
fn pump_applies_queued_events_in_order() {
    let (tx, rx) = event::channel();
    let sink = ChannelSink::new(tx);
    let a = key("a.pdf");
    let b = make_key("TTS", "/texts/b.txt");
    sink.progress(&a, 10.0);
    sink.progress(&b, 20.0);
    sink.relabel(&a, "OCR Postprocessing");
    sink.done(&b);

    let mut reg = Registry::default();
    assert_eq!(reg.pump(&rx), 4);
    assert_eq!(reg.len(), 1);
    assert_eq!(reg.get(&a).unwrap().label(), "OCR Postprocessing a.pdf:");
    assert_eq!(reg.pump(&rx), 0);
}

#[test]
fn snapshot_serializes_entries() {
    let mut reg = Registry::default();
    reg.apply(ProgressEvent::Progress {
        key: make_key("CROP", "/in/x.pdf"),
        percent: 25.0,
    });
    let json = serde_json::to_value(reg.snapshot()).unwrap();
    assert_eq!(json[0]["operation"], "CROP");
    assert_eq!(json[0]["file"], "x.pdf");
    assert_eq!(json[0]["percent"], 25.0);
}
