//! Boundary between the key engines and the application.
//!
//! Handlers built here never do the work themselves: they post an
//! [`AppEvent`] to a channel and return. The hook callback has a hard
//! time limit and must not wait on injection, dialogs or processes.

use crate::error::DispatchError;
use crate::hook::HandlerRegistry;
use crate::hotkey::{HotkeyDispatcher, HotkeyRegistration, HotkeyTrigger};
use crate::vk::{key_name, parse_key_name};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Something the application does in response to a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Alt+Shift, the default Windows input language toggle.
    SwitchLayout,
    /// Re-type the selected text as if it had been typed in the other
    /// keyboard layout.
    SwapSelection,
    InsertVariable {
        name: String,
    },
    /// Launch the program whose path is held in a variable.
    RunProgram {
        variable: String,
    },
    PressChord {
        key: String,
        #[serde(default)]
        modifiers: Vec<String>,
        #[serde(default)]
        hold_ms: i64,
    },
    Quit,
}

/// Where an [`AppEvent`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    /// A key swallowed by the low-level hook.
    SingletonKey(u16),
    Hotkey(HotkeyTrigger),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppEvent {
    pub source: EventSource,
    pub action: Action,
}

pub struct Dispatcher {
    tx: Sender<AppEvent>,
    singleton: Vec<(u16, Action)>,
    hotkeys: Vec<(u16, Action)>,
}

impl Dispatcher {
    /// Fails if a key is bound both to the hook and as a hotkey.
    pub fn new(
        tx: Sender<AppEvent>,
        singleton: Vec<(u16, Action)>,
        hotkeys: Vec<(u16, Action)>,
    ) -> Result<Self, DispatchError> {
        if let Some((vk, _)) = singleton
            .iter()
            .find(|(vk, _)| hotkeys.iter().any(|(h, _)| h == vk))
        {
            return Err(DispatchError::OverlappingKey(*vk));
        }
        Ok(Self {
            tx,
            singleton,
            hotkeys,
        })
    }

    /// Like [`Dispatcher::new`] with bindings keyed by key name.
    pub fn from_names(
        tx: Sender<AppEvent>,
        singleton: &BTreeMap<String, Action>,
        hotkeys: &BTreeMap<String, Action>,
    ) -> Result<Self, DispatchError> {
        Self::new(tx, resolve(singleton)?, resolve(hotkeys)?)
    }

    /// Keys to register as hotkeys, in binding order.
    pub fn hotkey_keys(&self) -> Vec<u16> {
        self.hotkeys.iter().map(|(vk, _)| *vk).collect()
    }

    pub fn singleton_keys(&self) -> Vec<u16> {
        self.singleton.iter().map(|(vk, _)| *vk).collect()
    }

    /// One hook handler per singleton key. Each swallows its key and posts
    /// the bound action; if nobody is listening any more the key is
    /// forwarded instead.
    pub fn hook_handlers(&self) -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        for (vk, action) in &self.singleton {
            let tx = self.tx.clone();
            let vk = *vk;
            let action = action.clone();
            registry.on_key(vk, move || {
                tx.send(AppEvent {
                    source: EventSource::SingletonKey(vk),
                    action: action.clone(),
                })?;
                Ok(true)
            });
        }
        info!("Hook handlers: {:?}", registry);
        registry
    }

    /// Binds each successful registration's id to the action of its key.
    pub fn hotkey_dispatcher(&self, registrations: &[HotkeyRegistration]) -> HotkeyDispatcher {
        let mut dispatcher = HotkeyDispatcher::new();
        for reg in registrations {
            let Some((_, action)) = self.hotkeys.iter().find(|(vk, _)| *vk == reg.vk) else {
                debug!("Registration id={} has no bound action", reg.id);
                continue;
            };
            debug!("Hotkey id={} ({}) -> {:?}", reg.id, key_name(reg.vk), action);
            let tx = self.tx.clone();
            let action = action.clone();
            dispatcher.on_hotkey(reg.id, move |trigger| {
                tx.send(AppEvent {
                    source: EventSource::Hotkey(*trigger),
                    action: action.clone(),
                })?;
                Ok(())
            });
        }
        dispatcher
    }
}

/// Resolves every binding it can. Names that are not keys are returned
/// separately, in map order.
pub fn resolve_lenient(bindings: &BTreeMap<String, Action>) -> (Vec<(u16, Action)>, Vec<String>) {
    let mut resolved = Vec::with_capacity(bindings.len());
    let mut unknown = Vec::new();
    for (name, action) in bindings {
        match parse_key_name(name) {
            Some(vk) => resolved.push((vk, action.clone())),
            None => unknown.push(name.clone()),
        }
    }
    (resolved, unknown)
}

fn resolve(bindings: &BTreeMap<String, Action>) -> Result<Vec<(u16, Action)>, DispatchError> {
    bindings
        .iter()
        .map(|(name, action)| {
            parse_key_name(name)
                .map(|vk| (vk, action.clone()))
                .ok_or_else(|| DispatchError::UnknownKey(name.clone()))
        })
        .collect()
}
