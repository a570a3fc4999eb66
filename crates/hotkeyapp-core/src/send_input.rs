use crate::injector::InputSink;
use crate::types::InputEvent;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    MapVirtualKeyW, SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, KEYEVENTF_SCANCODE, KEYEVENTF_UNICODE,
    MAPVK_VK_TO_VSC, VIRTUAL_KEY,
};

/// Tag written into `dwExtraInfo` of everything we inject.
pub const INJECTED_EXTRA_INFO: usize = 0xFFC3C3C3;

/// `InputSink` backed by `SendInput`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SendInputSink;

fn to_input(event: &InputEvent) -> INPUT {
    let (vk, scan, mut flags, up) = match *event {
        InputEvent::VirtualKey(vk, up) => (vk, 0, KEYBD_EVENT_FLAGS(0), up),
        InputEvent::Scancode(sc, ext, up) => {
            let mut f = KEYEVENTF_SCANCODE;
            if ext {
                f |= KEYEVENTF_EXTENDEDKEY;
            }
            (0, sc, f, up)
        }
        InputEvent::Unicode(unit, up) => (0, unit, KEYEVENTF_UNICODE, up),
    };
    if up {
        flags |= KEYEVENTF_KEYUP;
    }

    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(vk),
                wScan: scan,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: INJECTED_EXTRA_INFO,
            },
        },
    }
}

impl InputSink for SendInputSink {
    fn send(&mut self, events: &[InputEvent]) -> u32 {
        let inputs: Vec<INPUT> = events.iter().map(to_input).collect();
        unsafe { SendInput(&inputs, std::mem::size_of::<INPUT>() as i32) }
    }

    fn vk_to_scan(&self, vk: u16) -> u16 {
        unsafe { MapVirtualKeyW(vk as u32, MAPVK_VK_TO_VSC) as u16 }
    }
}
