use pdfp_progress::{
    adapters::PhaseBars,
    event::{self, ChannelSink, EventRx, ProgressEvent, ProgressSink, Reporter},
    key::make_key,
    state::Phase,
};
use std::sync::Arc;

fn reporter() -> (Arc<Reporter>, EventRx) {
    let (tx, rx) = event::channel();
    let sink: Arc<dyn ProgressSink> = Arc::new(ChannelSink::new(tx));
    (Arc::new(Reporter::new(make_key("CROP", "/c/a.pdf"), sink)), rx)
}

fn done_count(events: &[ProgressEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::Done { .. }))
        .count()
}

#[test]
fn closing_terminal_phase_retires_entry() {
    let (rep, rx) = reporter();
    let mut bars = PhaseBars::new(rep, "Cropping");
    {
        let mut bar = bars.open("Loading", 5);
        bar.update(5);
        assert_eq!(bar.percent(), 100.0);
    }
    assert_eq!(done_count(&rx.try_iter().collect::<Vec<_>>()), 0);

    {
        let mut bar = bars.open("Cropping", 4);
        bar.update(2);
        assert_eq!(bar.percent(), 50.0);
    }
    let events: Vec<_> = rx.try_iter().collect();
    assert!(matches!(
        &events[0],
        ProgressEvent::Relabel { label, .. } if label == "Cropping"
    ));
    assert_eq!(done_count(&events), 1);
    assert_eq!(bars.state().phase(), Phase::Done);
}

#[test]
fn open_resets_counter() {
    let (rep, _rx) = reporter();
    let mut bars = PhaseBars::new(rep, "Cropping");
    bars.open("Loading", 10).update(7);
    let bar = bars.open("Analyzing", 10);
    assert_eq!(bar.percent(), 0.0);
    bar.abort();
    assert_eq!(bars.state().label(), "Analyzing");
    assert_eq!(bars.state().current_unit(), 0);
}

#[test]
fn aborted_terminal_phase_sends_nothing_terminal() {
    let (rep, rx) = reporter();
    let mut bars = PhaseBars::new(Arc::clone(&rep), "Cropping");
    let mut bar = bars.open("cropping", 3);
    bar.update(1);
    bar.abort();
    let events: Vec<_> = rx.try_iter().collect();
    assert_eq!(done_count(&events), 0);
    assert!(!rep.is_terminated());
}
