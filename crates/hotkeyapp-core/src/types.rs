use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Key transition reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyDirection {
    Down,
    Up,
}

/// One keyboard event as seen by the low-level hook.
/// Only lives for the duration of a single callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub vk: u16,
    pub scan_code: u16,
    pub direction: KeyDirection,
    /// Synthesized by some process (ours included).
    pub injected: bool,
    pub extended: bool,
    pub timestamp_ms: u32,
}

impl KeyEvent {
    pub const fn down(vk: u16) -> Self {
        Self {
            vk,
            scan_code: 0,
            direction: KeyDirection::Down,
            injected: false,
            extended: false,
            timestamp_ms: 0,
        }
    }

    pub const fn up(vk: u16) -> Self {
        Self {
            vk,
            scan_code: 0,
            direction: KeyDirection::Up,
            injected: false,
            extended: false,
            timestamp_ms: 0,
        }
    }

    pub const fn is_down(&self) -> bool {
        matches!(self.direction, KeyDirection::Down)
    }
}

/// What the hook tells the OS to do with the current event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Pass,
    Block,
}

/// Event to be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Virtual key injection (vk, up).
    VirtualKey(u16, bool),
    /// Scancode injection (scancode, ext, up).
    Scancode(u16, bool, bool),
    /// One UTF-16 code unit (unit, up).
    Unicode(u16, bool),
}

impl InputEvent {
    pub const fn is_up(&self) -> bool {
        match *self {
            InputEvent::VirtualKey(_, up) => up,
            InputEvent::Scancode(_, _, up) => up,
            InputEvent::Unicode(_, up) => up,
        }
    }
}

/// Pauses that make synthetic input acceptable to applications that poll
/// key state instead of reacting to messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Between down and up of a single tapped key.
    pub press_ms: u64,
    /// After a whole operation completes.
    pub after_ms: u64,
    /// Between consecutive steps of a multi-step operation
    /// (modifier release before typing, clipboard write before paste).
    pub combo_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            press_ms: 30,
            after_ms: 30,
            combo_ms: 30,
        }
    }
}

impl Timings {
    pub const fn zero() -> Self {
        Self {
            press_ms: 0,
            after_ms: 0,
            combo_ms: 0,
        }
    }

    pub fn press(&self) -> Duration {
        Duration::from_millis(self.press_ms)
    }

    pub fn after(&self) -> Duration {
        Duration::from_millis(self.after_ms)
    }

    pub fn combo(&self) -> Duration {
        Duration::from_millis(self.combo_ms)
    }
}
