//! Wires the engines together on the main thread and runs the message loop.

use crate::actions::{spawn_worker, ActionRunner};
use crate::settings::Settings;
use anyhow::Result;
use hotkeyapp_core::keyboard_hook::{run_event_loop, KeyboardHook, LoopHandle};
use hotkeyapp_core::send_input::SendInputSink;
use hotkeyapp_core::win_clipboard::SystemClipboard;
use hotkeyapp_core::win_hotkey::{trigger_from_msg, Win32HotkeyBackend};
use hotkeyapp_core::{Dispatcher, HotkeyManager, Injector, SharedInjector};
use std::sync::Arc;
use tracing::{error, info, warn};

pub fn run(settings: Settings) -> Result<()> {
    let settings = Arc::new(settings);
    let (tx, rx) = crossbeam_channel::unbounded();
    let bindings = settings.bindings();
    let dispatcher = Dispatcher::new(tx, bindings.singleton, bindings.hotkeys)?;
    let loop_handle = LoopHandle::current();

    let injector = SharedInjector::new(Injector::new(SendInputSink, settings.timings));
    let worker = {
        let injector = injector.clone();
        let settings = settings.clone();
        spawn_worker(rx, move || {
            ActionRunner::new(injector, SystemClipboard::new(), settings, move || {
                loop_handle.quit()
            })
        })?
    };

    // Without the hook the rest still works; only the singleton keys are lost.
    let mut hook = match KeyboardHook::install(dispatcher.hook_handlers()) {
        Ok(hook) => Some(hook),
        Err(e) => {
            error!("{}; CapsLock/ScrollLock actions disabled", e);
            None
        }
    };

    let mut manager = HotkeyManager::new(Win32HotkeyBackend::new());
    match manager.register_all(
        &dispatcher.hotkey_keys(),
        &bindings.modifiers,
        settings.registration_policy,
    ) {
        Ok(report) if report.is_complete() => {
            info!("Registered {} hotkeys", report.registered.len())
        }
        Ok(report) => warn!(
            "Registered {} hotkeys, {} failed",
            report.registered.len(),
            report.failures.len()
        ),
        Err(e) => error!("Hotkey registration stopped: {}", e),
    }
    let mut hotkeys = dispatcher.hotkey_dispatcher(manager.registrations());
    drop(dispatcher);

    run_event_loop(|msg| {
        if let Some(trigger) = trigger_from_msg(msg) {
            hotkeys.dispatch(&trigger);
        }
    });

    info!("Shutting down...");
    if let Err(e) = manager.unregister_all() {
        warn!("{}", e);
    }
    if let Some(hook) = hook.as_mut() {
        hook.uninstall();
    }
    // The worker exits once the last sender (held by the handlers) is gone.
    drop(hook);
    drop(hotkeys);
    if worker.join().is_err() {
        error!("Action worker panicked");
    }
    if let Err(e) = injector.lock().release_modifiers() {
        warn!("Final modifier release failed: {}", e);
    }
    Ok(())
}
