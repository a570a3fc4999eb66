use hotkeyapp_core::error::InjectionError;
use hotkeyapp_core::injector::{clamp_hold_ms, parse_hold_ms, Injector, InputSink, SharedInjector};
use hotkeyapp_core::types::{InputEvent, Timings};
use hotkeyapp_core::vk::{VK_C, VK_CONTROL, VK_RETURN};
use std::time::{Duration, Instant};

/// Records every batch; optionally accepts fewer events than requested.
#[derive(Default)]
struct RecordingSink {
    batches: Vec<Vec<InputEvent>>,
    accept_at_most: Option<u32>,
}

impl RecordingSink {
    fn events(&self) -> Vec<InputEvent> {
        self.batches.iter().flatten().copied().collect()
    }
}

impl InputSink for RecordingSink {
    fn send(&mut self, events: &[InputEvent]) -> u32 {
        self.batches.push(events.to_vec());
        let n = events.len() as u32;
        self.accept_at_most.map_or(n, |max| max.min(n))
    }

    fn vk_to_scan(&self, _vk: u16) -> u16 {
        0
    }
}

fn injector() -> Injector<RecordingSink> {
    Injector::new(RecordingSink::default(), Timings::zero())
}

#[test]
fn bmp_text_emits_two_events_per_char() {
    for text in ["a", "hello", "Привет, мир", "日本語テキスト", "tab\tand spaces"] {
        let mut inj = injector();
        inj.type_unicode_text(text, Duration::ZERO).unwrap();
        let events = inj.sink().events();
        assert_eq!(events.len(), 2 * text.chars().count(), "{:?}", text);

        for (pair, c) in events.chunks(2).zip(text.chars()) {
            let unit = c as u32 as u16;
            assert_eq!(pair, [InputEvent::Unicode(unit, false), InputEvent::Unicode(unit, true)]);
        }
    }
}

#[test]
fn supplementary_char_emits_surrogates_in_nested_order() {
    let mut inj = injector();
    inj.type_unicode_text("\u{1F600}", Duration::ZERO).unwrap();
    assert_eq!(
        inj.sink().events(),
        vec![
            InputEvent::Unicode(0xD83D, false),
            InputEvent::Unicode(0xDE00, false),
            InputEvent::Unicode(0xDE00, true),
            InputEvent::Unicode(0xD83D, true),
        ]
    );
    // The pair is one batch.
    assert_eq!(inj.sink().batches.len(), 1);
}

#[test]
fn newline_is_an_enter_press() {
    let mut inj = injector();
    inj.type_unicode_text("a\nb", Duration::ZERO).unwrap();
    let events = inj.sink().events();
    assert_eq!(events.len(), 6);
    assert_eq!(events[2], InputEvent::VirtualKey(VK_RETURN, false));
    assert_eq!(events[3], InputEvent::VirtualKey(VK_RETURN, true));
}

#[test]
fn per_char_delay_is_applied_between_characters() {
    let mut inj = injector();
    let start = Instant::now();
    inj.type_unicode_text("abcd", Duration::from_millis(3)).unwrap();
    assert!(start.elapsed() >= Duration::from_millis(9));
}

#[test]
fn short_submission_is_an_error() {
    let mut inj = injector();
    inj.sink_mut().accept_at_most = Some(3);
    let err = inj.press_chord(VK_C, &[VK_CONTROL], 0).unwrap_err();
    assert_eq!(err, InjectionError::PartialSubmission { sent: 3, requested: 4 });

    let mut inj = injector();
    inj.sink_mut().accept_at_most = Some(0);
    let err = inj.type_unicode_text("x", Duration::ZERO).unwrap_err();
    assert!(matches!(err, InjectionError::PartialSubmission { sent: 0, requested: 2 }));
}

#[test]
fn hold_values_are_normalized() {
    assert_eq!(clamp_hold_ms(-5), 0);
    assert_eq!(clamp_hold_ms(5000), 1000);
    assert_eq!(parse_hold_ms("abc"), 0);
    assert_eq!(parse_hold_ms(""), 0);
    for raw in ["-5", "5000", "abc", "999", "0"] {
        assert!(parse_hold_ms(raw) <= 1000);
    }
}

#[test]
fn zero_hold_skips_the_wait() {
    let mut inj = injector();
    inj.press_chord(VK_C, &[VK_CONTROL], parse_hold_ms("abc")).unwrap();
    // Down and up went out together: no pause was possible between them.
    assert_eq!(inj.sink().batches.len(), 1);
    assert_eq!(inj.sink().batches[0].len(), 4);
}

#[test]
fn oversized_hold_is_capped() {
    let mut inj = injector();
    let start = Instant::now();
    inj.press_chord(VK_C, &[VK_CONTROL], clamp_hold_ms(5000) + 10).unwrap();
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(1000));
    assert!(elapsed < Duration::from_millis(1500));
    assert_eq!(inj.sink().batches.len(), 2);
}

#[test]
fn shared_injector_serializes_chords() {
    let shared = SharedInjector::new(injector());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let s = shared.clone();
            std::thread::spawn(move || {
                for _ in 0..25 {
                    s.lock().press_chord(VK_C, &[VK_CONTROL], 0).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let inj = shared.lock();
    assert_eq!(inj.sink().batches.len(), 100);
    for batch in &inj.sink().batches {
        assert_eq!(batch[0], InputEvent::VirtualKey(VK_CONTROL, false));
        assert_eq!(batch[3], InputEvent::VirtualKey(VK_CONTROL, true));
    }
}
