use crate::error::HotkeyError;
use crate::hotkey::{HotkeyBackend, HotkeyTrigger, WM_HOTKEY};
use std::marker::PhantomData;
use windows::Win32::Foundation::{ERROR_HOTKEY_ALREADY_REGISTERED, HWND};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    RegisterHotKey, UnregisterHotKey, HOT_KEY_MODIFIERS,
};
use windows::Win32::UI::WindowsAndMessaging::MSG;

/// Thread-global RegisterHotKey (no window). WM_HOTKEY is posted to the
/// registering thread's queue, so this stays on that thread.
pub struct Win32HotkeyBackend {
    _not_send: PhantomData<*const ()>,
}

impl Win32HotkeyBackend {
    pub fn new() -> Self {
        Self {
            _not_send: PhantomData,
        }
    }
}

impl Default for Win32HotkeyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HotkeyBackend for Win32HotkeyBackend {
    fn register(&mut self, id: i32, modifiers: u32, vk: u16) -> Result<(), HotkeyError> {
        unsafe { RegisterHotKey(HWND(0), id, HOT_KEY_MODIFIERS(modifiers), vk as u32) }.map_err(
            |e| {
                if e.code() == ERROR_HOTKEY_ALREADY_REGISTERED.to_hresult() {
                    HotkeyError::Conflict { id, modifiers, vk }
                } else {
                    HotkeyError::RegistrationFailed {
                        id,
                        modifiers,
                        vk,
                        reason: e.to_string(),
                    }
                }
            },
        )
    }

    fn unregister(&mut self, id: i32) -> Result<(), HotkeyError> {
        unsafe { UnregisterHotKey(HWND(0), id) }.map_err(|e| HotkeyError::UnregisterFailed {
            id,
            reason: e.to_string(),
        })
    }
}

/// Decodes a WM_HOTKEY thread message; `None` for anything else.
pub fn trigger_from_msg(msg: &MSG) -> Option<HotkeyTrigger> {
    (msg.message == WM_HOTKEY).then(|| HotkeyTrigger::from_raw(msg.wParam.0, msg.lParam.0))
}
