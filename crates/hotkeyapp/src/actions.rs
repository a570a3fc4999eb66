//! Executes [`Action`]s on the worker thread. This is the only place that
//! injects input, so injections from different triggers never overlap.

use crate::layout_swap::swap_layout;
use crate::settings::Settings;
use anyhow::{anyhow, Context, Result};
use crossbeam_channel::Receiver;
use hotkeyapp_core::clipboard::{capture_selection, paste_via_clipboard, ClipboardAccess};
use hotkeyapp_core::vk::{parse_key_name, VK_MENU, VK_SHIFT};
use hotkeyapp_core::{Action, AppEvent, EventSource, InjectionError, InputSink, SharedInjector};
use std::process::Command;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Settings values are single-line; a literal `\n` stands for a line break.
pub fn expand_escapes(text: &str) -> String {
    text.replace("\\n", "\n")
}

fn parse_key(name: &str) -> Result<u16, InjectionError> {
    parse_key_name(name).ok_or_else(|| InjectionError::UnknownKey(name.to_string()))
}

pub struct ActionRunner<S: InputSink, C: ClipboardAccess> {
    injector: SharedInjector<S>,
    clipboard: C,
    settings: Arc<Settings>,
    on_quit: Box<dyn FnMut() + Send>,
}

impl<S: InputSink, C: ClipboardAccess> ActionRunner<S, C> {
    pub fn new<Q>(
        injector: SharedInjector<S>,
        clipboard: C,
        settings: Arc<Settings>,
        on_quit: Q,
    ) -> Self
    where
        Q: FnMut() + Send + 'static,
    {
        Self {
            injector,
            clipboard,
            settings,
            on_quit: Box::new(on_quit),
        }
    }

    pub fn execute(&mut self, event: &AppEvent) -> Result<()> {
        debug!("Executing {:?} from {:?}", event.action, event.source);
        // A hotkey's modifier is still physically held when we get here.
        let from_hotkey = matches!(event.source, EventSource::Hotkey(_));

        match &event.action {
            Action::SwitchLayout => {
                self.injector.lock().press_chord(VK_SHIFT, &[VK_MENU], 0)?;
            }
            Action::SwapSelection => {
                if from_hotkey {
                    self.injector.lock().release_modifiers()?;
                }
                let captured = {
                    let options = self.settings.capture_options();
                    let mut inj = self.injector.lock();
                    capture_selection(&mut self.clipboard, &mut *inj, options)?
                };
                match captured {
                    Some(text) => self.insert_text(&swap_layout(&text))?,
                    None => info!("Nothing selected, swap skipped"),
                }
            }
            Action::InsertVariable { name } => {
                let value = self
                    .settings
                    .variable(name)
                    .ok_or_else(|| anyhow!("variable {:?} is not set", name))?;
                if from_hotkey {
                    self.injector.lock().release_modifiers()?;
                }
                self.insert_text(&expand_escapes(&value))?;
            }
            Action::RunProgram { variable } => {
                let program = self
                    .settings
                    .variable(variable)
                    .ok_or_else(|| anyhow!("variable {:?} is not set", variable))?;
                let child = Command::new(&program)
                    .spawn()
                    .with_context(|| format!("failed to start {}", program))?;
                info!("Started {} (pid {})", program, child.id());
            }
            Action::PressChord {
                key,
                modifiers,
                hold_ms,
            } => {
                let vk = parse_key(key)?;
                let mods = modifiers
                    .iter()
                    .map(|m| parse_key(m))
                    .collect::<Result<Vec<_>, _>>()?;
                let hold = hotkeyapp_core::injector::clamp_hold_ms(*hold_ms);
                self.injector.lock().press_chord(vk, &mods, hold)?;
            }
            Action::Quit => {
                info!("Quit requested");
                (self.on_quit)();
            }
        }
        Ok(())
    }

    /// Short text is typed, long text goes through the clipboard.
    fn insert_text(&mut self, text: &str) -> Result<()> {
        let mut inj = self.injector.lock();
        if text.chars().count() > self.settings.paste_threshold_chars {
            let options = self.settings.paste_options();
            paste_via_clipboard(&mut self.clipboard, &mut *inj, text, options)?;
        } else {
            inj.type_unicode_text(text, self.settings.per_char_delay())?;
        }
        Ok(())
    }

    /// Runs until every sender is gone. Failures are logged per action.
    pub fn run(mut self, rx: Receiver<AppEvent>) {
        info!("Action worker started");
        for event in rx.iter() {
            if let Err(e) = self.execute(&event) {
                warn!("Action {:?} failed: {:#}", event.action, e);
            }
        }
        info!("Action worker stopped");
    }
}

/// Spawns the worker thread. The runner is built on that thread.
pub fn spawn_worker<S, C, F>(rx: Receiver<AppEvent>, make_runner: F) -> Result<JoinHandle<()>>
where
    S: InputSink + 'static,
    C: ClipboardAccess + 'static,
    F: FnOnce() -> ActionRunner<S, C> + Send + 'static,
{
    std::thread::Builder::new()
        .name("action-worker".into())
        .spawn(move || make_runner().run(rx))
        .context("failed to spawn action worker")
}
