//! OS-registered hotkeys (RegisterHotKey): registration bookkeeping and
//! trigger decoding. The OS calls themselves sit behind [`HotkeyBackend`].

use crate::error::HotkeyError;
use crate::vk::key_name;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;
use tracing::{debug, error, info, warn};

pub const MOD_ALT: u32 = 0x0001;
pub const MOD_CONTROL: u32 = 0x0002;
pub const MOD_SHIFT: u32 = 0x0004;
pub const MOD_WIN: u32 = 0x0008;
pub const MOD_NOREPEAT: u32 = 0x4000;

pub const WM_HOTKEY: u32 = 0x0312;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierName {
    Alt,
    Control,
    Shift,
    Win,
    NoRepeat,
}

impl ModifierName {
    pub const fn mask(self) -> u32 {
        match self {
            ModifierName::Alt => MOD_ALT,
            ModifierName::Control => MOD_CONTROL,
            ModifierName::Shift => MOD_SHIFT,
            ModifierName::Win => MOD_WIN,
            ModifierName::NoRepeat => MOD_NOREPEAT,
        }
    }

    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<ModifierName>, HotkeyError> {
        names.iter().map(|n| n.as_ref().parse()).collect()
    }
}

impl FromStr for ModifierName {
    type Err = HotkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "alt" => Ok(ModifierName::Alt),
            "control" | "ctrl" => Ok(ModifierName::Control),
            "shift" => Ok(ModifierName::Shift),
            "win" => Ok(ModifierName::Win),
            "norepeat" => Ok(ModifierName::NoRepeat),
            _ => Err(HotkeyError::UnknownModifier(s.to_string())),
        }
    }
}

impl fmt::Display for ModifierName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModifierName::Alt => "alt",
            ModifierName::Control => "control",
            ModifierName::Shift => "shift",
            ModifierName::Win => "win",
            ModifierName::NoRepeat => "norepeat",
        };
        f.write_str(name)
    }
}

/// Combined RegisterHotKey mask. No-repeat is always included so a held
/// combination fires once.
pub fn modifier_mask(modifiers: &[ModifierName]) -> u32 {
    modifiers.iter().fold(MOD_NOREPEAT, |acc, m| acc | m.mask())
}

/// What to do when one combination of a batch cannot be registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationPolicy {
    /// Stop at the first failure and return it. Combinations registered
    /// before it stay registered until `unregister_all`.
    AbortOnFirstFailure,
    /// Log every failure and keep going.
    #[default]
    BestEffort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeyRegistration {
    pub id: i32,
    pub modifiers: u32,
    pub vk: u16,
}

/// Outcome of a best-effort batch.
#[derive(Debug, Default)]
pub struct RegistrationReport {
    pub registered: Vec<HotkeyRegistration>,
    pub failures: Vec<HotkeyError>,
}

impl RegistrationReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The OS side of hotkey registration.
pub trait HotkeyBackend {
    fn register(&mut self, id: i32, modifiers: u32, vk: u16) -> Result<(), HotkeyError>;
    fn unregister(&mut self, id: i32) -> Result<(), HotkeyError>;
}

/// Owns every combination registered through it. Ids are positional:
/// the n-th combination this manager attempts gets id n, starting at 1,
/// whether or not the OS accepted it.
pub struct HotkeyManager<B: HotkeyBackend> {
    backend: B,
    registered: Vec<HotkeyRegistration>,
    next_id: i32,
}

impl<B: HotkeyBackend> HotkeyManager<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            registered: Vec::new(),
            next_id: 1,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn registrations(&self) -> &[HotkeyRegistration] {
        &self.registered
    }

    pub fn registration(&self, id: i32) -> Option<&HotkeyRegistration> {
        self.registered.iter().find(|r| r.id == id)
    }

    /// Registers `modifiers + key` for every key, in order. Duplicate keys
    /// are registered once.
    pub fn register_all(
        &mut self,
        keys: &[u16],
        modifiers: &[ModifierName],
        policy: RegistrationPolicy,
    ) -> Result<RegistrationReport, HotkeyError> {
        let mask = modifier_mask(modifiers);
        let mut report = RegistrationReport::default();
        let mut seen = Vec::with_capacity(keys.len());

        for &vk in keys {
            if seen.contains(&vk) {
                continue;
            }
            seen.push(vk);

            let id = self.next_id;
            self.next_id += 1;

            match self.backend.register(id, mask, vk) {
                Ok(()) => {
                    let reg = HotkeyRegistration {
                        id,
                        modifiers: mask,
                        vk,
                    };
                    info!("Registered hotkey id={} mods=0x{:X} key={}", id, mask, key_name(vk));
                    self.registered.push(reg);
                    report.registered.push(reg);
                }
                Err(e) => match policy {
                    RegistrationPolicy::AbortOnFirstFailure => {
                        error!("{}", e);
                        return Err(e);
                    }
                    RegistrationPolicy::BestEffort => {
                        warn!("{} (continuing)", e);
                        report.failures.push(e);
                    }
                },
            }
        }

        Ok(report)
    }

    /// Unregisters everything. Every id is attempted; the first failure is
    /// returned after the set has been cleared. A second call is a no-op.
    pub fn unregister_all(&mut self) -> Result<(), HotkeyError> {
        let mut first_err = None;
        for reg in self.registered.drain(..) {
            match self.backend.unregister(reg.id) {
                Ok(()) => debug!("Unregistered hotkey id={}", reg.id),
                Err(e) => {
                    warn!("{}", e);
                    first_err.get_or_insert(e);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl<B: HotkeyBackend> Drop for HotkeyManager<B> {
    fn drop(&mut self) {
        if !self.registered.is_empty() {
            warn!("HotkeyManager dropped with {} live hotkeys", self.registered.len());
            let _ = self.unregister_all();
        }
    }
}

/// A decoded WM_HOTKEY notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeyTrigger {
    pub id: i32,
    pub vk: u16,
    pub modifiers: u32,
}

impl HotkeyTrigger {
    /// `wparam` is the logical id; `lparam` packs the modifier mask in the
    /// low word and the virtual key in the high word.
    pub fn from_raw(wparam: usize, lparam: isize) -> Self {
        let (modifiers, vk) = decode_lparam(lparam);
        Self {
            id: wparam as i32,
            vk,
            modifiers,
        }
    }
}

pub fn decode_lparam(lparam: isize) -> (u32, u16) {
    let modifiers = (lparam & 0xFFFF) as u32;
    let vk = ((lparam >> 16) & 0xFFFF) as u16;
    (modifiers, vk)
}

pub type HotkeyHandler = Box<dyn FnMut(&HotkeyTrigger) -> anyhow::Result<()> + Send>;

/// Routes triggers to handlers by logical id.
#[derive(Default)]
pub struct HotkeyDispatcher {
    handlers: HashMap<i32, HotkeyHandler>,
}

impl HotkeyDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_hotkey<F>(&mut self, id: i32, handler: F) -> &mut Self
    where
        F: FnMut(&HotkeyTrigger) -> anyhow::Result<()> + Send + 'static,
    {
        if self.handlers.insert(id, Box::new(handler)).is_some() {
            warn!("Replacing hotkey handler for id={}", id);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs the handler for `trigger.id`. Returns whether one ran to
    /// completion; failures and panics are logged and reported as `false`.
    pub fn dispatch(&mut self, trigger: &HotkeyTrigger) -> bool {
        let Some(handler) = self.handlers.get_mut(&trigger.id) else {
            debug!("No handler for hotkey id={}", trigger.id);
            return false;
        };
        match catch_unwind(AssertUnwindSafe(|| handler(trigger))) {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Hotkey handler id={} failed: {:#}", trigger.id, e);
                false
            }
            Err(_) => {
                error!("Hotkey handler id={} panicked", trigger.id);
                false
            }
        }
    }
}

impl fmt::Debug for HotkeyDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.handlers.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("HotkeyDispatcher").field("ids", &ids).finish()
    }
}
