use crate::error::HookError;
use crate::hook::{HandlerRegistry, HookEngine};
use crate::types::KeyAction;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error, info, warn};
use windows::Win32::Foundation::{HINSTANCE, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW,
    SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, HHOOK, KBDLLHOOKSTRUCT, MSG,
    PEEK_MESSAGE_REMOVE_TYPE, WH_KEYBOARD_LL, WM_QUIT,
};

thread_local! {
    // The OS calls hook_proc on the installing thread, so the engine lives
    // in that thread's slot. Boxed so its address stays put until uninstall.
    static ACTIVE_ENGINE: RefCell<Option<Box<HookEngine>>> = const { RefCell::new(None) };
}

/// An installed `WH_KEYBOARD_LL` hook. Dropping it uninstalls the hook.
///
/// Not `Send`: the hook must be removed from the thread that installed it,
/// and that thread has to pump messages (see [`run_event_loop`]) or Windows
/// will time the callback out and silently drop the hook.
pub struct KeyboardHook {
    handle: Option<HHOOK>,
    _not_send: PhantomData<*const ()>,
}

impl KeyboardHook {
    pub fn install(handlers: HandlerRegistry) -> Result<Self, HookError> {
        info!("Installing keyboard hook for {} keys...", handlers.len());

        let occupied = ACTIVE_ENGINE
            .try_with(|slot| slot.borrow().is_some())
            .unwrap_or(true);
        if occupied {
            return Err(HookError::AlreadyInstalled);
        }
        set_engine(Some(Box::new(HookEngine::new(handlers))));

        // Low-level hooks take no module handle when threadId is 0.
        let result =
            unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(hook_proc), HINSTANCE::default(), 0) };

        match result {
            Ok(hook) if !hook.is_invalid() => {
                info!("Keyboard hook installed. Handle: {:?}", hook);
                Ok(Self {
                    handle: Some(hook),
                    _not_send: PhantomData,
                })
            }
            Ok(_) => {
                set_engine(None);
                Err(HookError::RegistrationFailed("invalid hook handle".into()))
            }
            Err(e) => {
                set_engine(None);
                Err(HookError::RegistrationFailed(e.to_string()))
            }
        }
    }

    /// Removes the hook. Safe to call more than once.
    pub fn uninstall(&mut self) {
        let Some(hook) = self.handle.take() else {
            return;
        };
        if let Err(e) = unsafe { UnhookWindowsHookEx(hook) } {
            warn!("UnhookWindowsHookEx failed: {}", e);
        }
        set_engine(None);
        info!("Keyboard hook uninstalled.");
    }

    pub fn is_installed(&self) -> bool {
        self.handle.is_some()
    }

    /// Number of keys whose down was swallowed and whose up is still pending.
    pub fn pending_suppressed(&self) -> usize {
        ACTIVE_ENGINE
            .try_with(|slot| {
                slot.try_borrow()
                    .ok()
                    .and_then(|e| e.as_ref().map(|e| e.pending_suppressed()))
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }
}

impl Drop for KeyboardHook {
    fn drop(&mut self) {
        self.uninstall();
    }
}

fn set_engine(engine: Option<Box<HookEngine>>) {
    let _ = ACTIVE_ENGINE.try_with(|slot| match slot.try_borrow_mut() {
        Ok(mut s) => *s = engine,
        Err(_) => error!("Hook engine busy while being replaced"),
    });
}

unsafe extern "system" fn hook_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code < 0 {
        return CallNextHookEx(None, code, wparam, lparam);
    }

    let kbd = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
    let msg = wparam.0 as u32;

    // Nothing may unwind into the OS frame.
    let action = catch_unwind(AssertUnwindSafe(|| {
        ACTIVE_ENGINE
            .try_with(|slot| match slot.try_borrow_mut() {
                Ok(mut engine) => match engine.as_mut() {
                    Some(engine) => {
                        engine.on_raw(msg, kbd.vkCode, kbd.scanCode, kbd.flags.0, kbd.time)
                    }
                    None => KeyAction::Pass,
                },
                // Re-entered from inside a handler.
                Err(_) => {
                    debug!("Hook re-entered, vk={:02X} passed", kbd.vkCode);
                    KeyAction::Pass
                }
            })
            .unwrap_or(KeyAction::Pass)
    }))
    .unwrap_or(KeyAction::Pass);

    match action {
        KeyAction::Pass => CallNextHookEx(None, code, wparam, lparam),
        KeyAction::Block => LRESULT(1),
    }
}

/// Handle to a thread running [`run_event_loop`], usable from any thread.
#[derive(Debug, Clone, Copy)]
pub struct LoopHandle {
    thread_id: u32,
}

impl LoopHandle {
    /// Handle for the calling thread.
    pub fn current() -> Self {
        Self {
            thread_id: unsafe { GetCurrentThreadId() },
        }
    }

    /// Asks the loop to exit by posting WM_QUIT to its thread.
    pub fn quit(&self) {
        let posted = unsafe { PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) };
        if let Err(e) = posted {
            warn!("Failed to post WM_QUIT to thread {}: {}", self.thread_id, e);
        }
    }
}

/// Runs a blocking message loop on the calling thread until WM_QUIT.
///
/// Thread messages (no target window, e.g. WM_HOTKEY from a thread-global
/// RegisterHotKey) are handed to `on_thread_message` before dispatch.
pub fn run_event_loop<F: FnMut(&MSG)>(mut on_thread_message: F) {
    info!("Starting message loop...");
    let mut msg = MSG::default();
    unsafe {
        // Force message queue creation
        let _ = PeekMessageW(&mut msg, None, 0, 0, PEEK_MESSAGE_REMOVE_TYPE(0));

        while GetMessageW(&mut msg, None, 0, 0).as_bool() {
            if msg.hwnd.0 == 0 {
                on_thread_message(&msg);
            }
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
    info!("Message loop exited.");
}
