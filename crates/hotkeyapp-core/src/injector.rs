//! Synthetic keyboard input.
//!
//! [`Injector`] builds batches of [`InputEvent`]s and hands each batch to an
//! [`InputSink`] in one call. On Windows the sink is `SendInputSink`; tests
//! use a recording sink.
//!
//! The injector does no locking of its own. Wrap it in a [`SharedInjector`]
//! when more than one thread needs it.

use crate::error::InjectionError;
use crate::types::{InputEvent, Timings};
use crate::vk::{is_extended, key_name, MODIFIER_VKS, VK_RETURN};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

pub const MAX_HOLD_MS: u64 = 1000;

/// Below this the coarse sleep is skipped and the whole wait is spun.
const SPIN_TAIL: Duration = Duration::from_millis(2);

/// Destination of synthetic input.
pub trait InputSink {
    /// Submits `events` as one unit. Returns how many were accepted.
    fn send(&mut self, events: &[InputEvent]) -> u32;

    /// Hardware scan code of `vk` under the current layout, 0 if none.
    fn vk_to_scan(&self, vk: u16) -> u16;
}

impl<S: InputSink + ?Sized> InputSink for Box<S> {
    fn send(&mut self, events: &[InputEvent]) -> u32 {
        (**self).send(events)
    }

    fn vk_to_scan(&self, vk: u16) -> u16 {
        (**self).vk_to_scan(vk)
    }
}

/// Normalizes a user supplied hold into `[0, MAX_HOLD_MS]`.
pub fn clamp_hold_ms(ms: i64) -> u64 {
    ms.clamp(0, MAX_HOLD_MS as i64) as u64
}

/// Like [`clamp_hold_ms`] for text input. Anything that is not a number
/// means 0; fractions are truncated.
pub fn parse_hold_ms(raw: &str) -> u64 {
    let raw = raw.trim();
    if let Ok(ms) = raw.parse::<i64>() {
        return clamp_hold_ms(ms);
    }
    match raw.parse::<f64>() {
        Ok(ms) if ms.is_finite() => clamp_hold_ms(ms as i64),
        _ => 0,
    }
}

/// Blocks for `d`: a regular sleep for all but the last couple of
/// milliseconds, then a spin until the deadline.
pub fn precise_sleep(d: Duration) {
    if d.is_zero() {
        return;
    }
    let deadline = Instant::now() + d;
    if d > SPIN_TAIL {
        std::thread::sleep(d - SPIN_TAIL);
    }
    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
}

fn sleep_if(d: Duration) {
    if !d.is_zero() {
        std::thread::sleep(d);
    }
}

/// Text with `\r\n`, `\r` and `\n` all turned into a single Enter each.
fn for_each_text_unit(text: &str, mut f: impl FnMut(Option<char>)) {
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                f(None);
            }
            '\n' => f(None),
            c => f(Some(c)),
        }
    }
}

/// Events for one character: a down/up pair, or for a supplementary-plane
/// character both surrogate downs then both ups in reverse order.
pub fn unicode_events(c: char) -> Vec<InputEvent> {
    let mut buf = [0u16; 2];
    match c.encode_utf16(&mut buf) {
        [unit] => vec![InputEvent::Unicode(*unit, false), InputEvent::Unicode(*unit, true)],
        [high, low] => vec![
            InputEvent::Unicode(*high, false),
            InputEvent::Unicode(*low, false),
            InputEvent::Unicode(*low, true),
            InputEvent::Unicode(*high, true),
        ],
        _ => Vec::new(),
    }
}

/// Modifiers in order without duplicates or `main`, then `main`.
fn chord_keys(main: u16, modifiers: &[u16]) -> Vec<u16> {
    let mut keys: Vec<u16> = Vec::with_capacity(modifiers.len() + 1);
    for &m in modifiers {
        if m != main && !keys.contains(&m) {
            keys.push(m);
        }
    }
    keys.push(main);
    keys
}

pub struct Injector<S: InputSink> {
    sink: S,
    timings: Timings,
}

impl<S: InputSink> Injector<S> {
    pub fn new(sink: S, timings: Timings) -> Self {
        Self { sink, timings }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn timings(&self) -> Timings {
        self.timings
    }

    pub fn set_timings(&mut self, timings: Timings) {
        self.timings = timings;
    }

    /// Submits one batch. An empty batch is not sent. Anything short of
    /// full acceptance is an error.
    pub fn submit(&mut self, events: &[InputEvent]) -> Result<(), InjectionError> {
        if events.is_empty() {
            return Ok(());
        }
        let requested = events.len() as u32;
        let sent = self.sink.send(events);
        trace!("Submitted {}/{} input events", sent, requested);
        if sent != requested {
            return Err(InjectionError::PartialSubmission { sent, requested });
        }
        Ok(())
    }

    /// Sends `ups` after a failed submission. Failures are only logged so
    /// the caller's original error survives.
    fn release_best_effort(&mut self, ups: &[InputEvent]) {
        if ups.is_empty() {
            return;
        }
        let sent = self.sink.send(ups);
        if sent as usize != ups.len() {
            warn!("Safety release accepted {}/{} events", sent, ups.len());
        } else {
            debug!("Safety release of {} keys", ups.len());
        }
    }

    /// [`Injector::submit`]; on failure the keys in `release` are let go
    /// before the error is returned.
    fn submit_or_release(
        &mut self,
        batch: &[InputEvent],
        release: &[InputEvent],
    ) -> Result<(), InjectionError> {
        match self.submit(batch) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.release_best_effort(release);
                Err(e)
            }
        }
    }

    /// Presses `modifiers` in order, then `main`, holds, and releases in
    /// reverse. `hold_ms` is capped at [`MAX_HOLD_MS`]; 0 sends the whole
    /// chord as a single batch with no wait.
    pub fn press_chord(
        &mut self,
        main: u16,
        modifiers: &[u16],
        hold_ms: u64,
    ) -> Result<(), InjectionError> {
        let keys = chord_keys(main, modifiers);
        let downs: Vec<_> = keys
            .iter()
            .map(|&vk| InputEvent::VirtualKey(vk, false))
            .collect();
        let ups: Vec<_> = keys
            .iter()
            .rev()
            .map(|&vk| InputEvent::VirtualKey(vk, true))
            .collect();
        let hold = hold_ms.min(MAX_HOLD_MS);
        debug!(
            "Chord {} hold={}ms",
            keys.iter().map(|&k| key_name(k)).collect::<Vec<_>>().join("+"),
            hold
        );

        if hold == 0 {
            let batch: Vec<_> = downs.iter().chain(ups.iter()).copied().collect();
            self.submit_or_release(&batch, &ups)?;
        } else {
            self.submit_or_release(&downs, &ups)?;
            precise_sleep(Duration::from_millis(hold));
            self.submit_or_release(&ups, &ups)?;
        }

        sleep_if(self.timings.after());
        Ok(())
    }

    /// Down, press delay, up, after delay.
    pub fn tap(&mut self, vk: u16) -> Result<(), InjectionError> {
        let down = InputEvent::VirtualKey(vk, false);
        let up = InputEvent::VirtualKey(vk, true);
        let press = self.timings.press();
        if press.is_zero() {
            self.submit_or_release(&[down, up], &[up])?;
        } else {
            self.submit_or_release(&[down], &[up])?;
            precise_sleep(press);
            self.submit_or_release(&[up], &[up])?;
        }
        sleep_if(self.timings.after());
        Ok(())
    }

    /// Types `text` as Unicode input, one character per batch. Line breaks
    /// become Enter presses.
    pub fn type_unicode_text(
        &mut self,
        text: &str,
        per_char_delay: Duration,
    ) -> Result<(), InjectionError> {
        let mut units = Vec::with_capacity(text.len());
        for_each_text_unit(text, |c| units.push(c));
        debug!("Typing {} characters", units.len());

        for (i, unit) in units.into_iter().enumerate() {
            if i > 0 {
                precise_sleep(per_char_delay);
            }
            let batch = match unit {
                Some(c) => unicode_events(c),
                None => vec![
                    InputEvent::VirtualKey(VK_RETURN, false),
                    InputEvent::VirtualKey(VK_RETURN, true),
                ],
            };
            let ups: Vec<_> = batch.iter().filter(|e| e.is_up()).copied().collect();
            self.submit_or_release(&batch, &ups)?;
        }
        Ok(())
    }

    fn scan_event(&self, vk: u16, up: bool) -> Result<InputEvent, InjectionError> {
        match self.sink.vk_to_scan(vk) {
            0 => Err(InjectionError::UnknownKey(key_name(vk))),
            sc => Ok(InputEvent::Scancode(sc, is_extended(vk), up)),
        }
    }

    /// Presses `vk` by hardware scan code. Extended keys get the extended
    /// flag.
    pub fn press_scan_code(&mut self, vk: u16, hold_ms: u64) -> Result<(), InjectionError> {
        let down = self.scan_event(vk, false)?;
        let up = self.scan_event(vk, true)?;
        let hold = hold_ms.min(MAX_HOLD_MS);

        if hold == 0 {
            self.submit_or_release(&[down, up], &[up])?;
        } else {
            self.submit_or_release(&[down], &[up])?;
            precise_sleep(Duration::from_millis(hold));
            self.submit_or_release(&[up], &[up])?;
        }
        sleep_if(self.timings.after());
        Ok(())
    }

    /// Whole chord by scan code, one batch.
    pub fn press_scan_chord(&mut self, main: u16, modifiers: &[u16]) -> Result<(), InjectionError> {
        let keys = chord_keys(main, modifiers);
        let mut batch = Vec::with_capacity(keys.len() * 2);
        for &vk in &keys {
            batch.push(self.scan_event(vk, false)?);
        }
        for &vk in keys.iter().rev() {
            batch.push(self.scan_event(vk, true)?);
        }

        let ups: Vec<_> = batch[keys.len()..].to_vec();
        self.submit_or_release(&batch, &ups)?;
        sleep_if(self.timings.after());
        Ok(())
    }

    /// Key-up for every modifier, so text typed next is not read as
    /// shortcuts while the user still holds the hotkey's modifier.
    pub fn release_modifiers(&mut self) -> Result<(), InjectionError> {
        let ups: Vec<_> = MODIFIER_VKS
            .iter()
            .map(|&vk| InputEvent::VirtualKey(vk, true))
            .collect();
        self.submit(&ups)?;
        sleep_if(self.timings.combo());
        Ok(())
    }
}

/// An [`Injector`] behind one lock. Every operation holds the lock for its
/// full duration, so chords from different threads never interleave.
pub struct SharedInjector<S: InputSink> {
    inner: Arc<Mutex<Injector<S>>>,
}

impl<S: InputSink> SharedInjector<S> {
    pub fn new(injector: Injector<S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(injector)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Injector<S>> {
        self.inner.lock()
    }
}

impl<S: InputSink> Clone for SharedInjector<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
