//! Virtual-key codes and the name table used by the settings file.

use std::collections::HashMap;

pub const VK_BACK: u16 = 0x08;
pub const VK_TAB: u16 = 0x09;
pub const VK_RETURN: u16 = 0x0D;
pub const VK_SHIFT: u16 = 0x10;
pub const VK_CONTROL: u16 = 0x11;
pub const VK_MENU: u16 = 0x12; // Alt
pub const VK_PAUSE: u16 = 0x13;
pub const VK_CAPITAL: u16 = 0x14; // CapsLock
pub const VK_ESCAPE: u16 = 0x1B;
pub const VK_SPACE: u16 = 0x20;
pub const VK_PRIOR: u16 = 0x21; // PgUp
pub const VK_NEXT: u16 = 0x22; // PgDn
pub const VK_END: u16 = 0x23;
pub const VK_HOME: u16 = 0x24;
pub const VK_LEFT: u16 = 0x25;
pub const VK_UP: u16 = 0x26;
pub const VK_RIGHT: u16 = 0x27;
pub const VK_DOWN: u16 = 0x28;
pub const VK_INSERT: u16 = 0x2D;
pub const VK_DELETE: u16 = 0x2E;
pub const VK_C: u16 = 0x43;
pub const VK_V: u16 = 0x56;
pub const VK_LWIN: u16 = 0x5B;
pub const VK_RWIN: u16 = 0x5C;
pub const VK_APPS: u16 = 0x5D;
pub const VK_F1: u16 = 0x70;
pub const VK_SCROLL: u16 = 0x91; // ScrollLock
pub const VK_LSHIFT: u16 = 0xA0;
pub const VK_RSHIFT: u16 = 0xA1;
pub const VK_LCONTROL: u16 = 0xA2;
pub const VK_RCONTROL: u16 = 0xA3;
pub const VK_LMENU: u16 = 0xA4;
pub const VK_RMENU: u16 = 0xA5;

/// Keys that need KEYEVENTF_EXTENDEDKEY when injected by scan code
/// (E0-prefixed on the keyboard controller).
pub const EXTENDED_VKS: &[u16] = &[
    VK_PRIOR, VK_NEXT, VK_END, VK_HOME, // nav
    VK_LEFT, VK_UP, VK_RIGHT, VK_DOWN, // arrows
    VK_INSERT, VK_DELETE, //
    VK_LWIN, VK_RWIN, VK_APPS, //
    VK_RCONTROL, VK_RMENU, // right-side modifiers
];

pub fn is_extended(vk: u16) -> bool {
    EXTENDED_VKS.contains(&vk)
}

/// Modifier keys released before typing text, in release order.
pub const MODIFIER_VKS: &[u16] = &[VK_SHIFT, VK_CONTROL, VK_MENU, VK_LWIN, VK_RWIN];

const NAMED_KEYS: &[(&str, u16)] = &[
    ("backspace", VK_BACK),
    ("tab", VK_TAB),
    ("enter", VK_RETURN),
    ("return", VK_RETURN),
    ("shift", VK_SHIFT),
    ("control", VK_CONTROL),
    ("ctrl", VK_CONTROL),
    ("alt", VK_MENU),
    ("menu", VK_MENU),
    ("pause", VK_PAUSE),
    ("capslock", VK_CAPITAL),
    ("capital", VK_CAPITAL),
    ("escape", VK_ESCAPE),
    ("esc", VK_ESCAPE),
    ("space", VK_SPACE),
    ("pageup", VK_PRIOR),
    ("pagedown", VK_NEXT),
    ("end", VK_END),
    ("home", VK_HOME),
    ("left", VK_LEFT),
    ("up", VK_UP),
    ("right", VK_RIGHT),
    ("down", VK_DOWN),
    ("insert", VK_INSERT),
    ("delete", VK_DELETE),
    ("del", VK_DELETE),
    ("lwin", VK_LWIN),
    ("rwin", VK_RWIN),
    ("win", VK_LWIN),
    ("apps", VK_APPS),
    ("scrolllock", VK_SCROLL),
    ("scroll", VK_SCROLL),
    ("lshift", VK_LSHIFT),
    ("rshift", VK_RSHIFT),
    ("lcontrol", VK_LCONTROL),
    ("rcontrol", VK_RCONTROL),
    ("lalt", VK_LMENU),
    ("ralt", VK_RMENU),
];

lazy_static::lazy_static! {
    static ref NAME_TO_VK: HashMap<&'static str, u16> = NAMED_KEYS.iter().copied().collect();
}

/// Parses a key name from the settings file into a virtual-key code.
///
/// Accepts single letters and digits, `F1`..`F24`, the names in the
/// table above (case and `_`/`-`/space insensitive) and hex literals
/// such as `0x91`.
pub fn parse_key_name(name: &str) -> Option<u16> {
    let norm: String = name
        .trim()
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect();
    if norm.is_empty() {
        return None;
    }

    if let Some(hex) = norm.strip_prefix("0x") {
        return u16::from_str_radix(hex, 16).ok().filter(|v| *v > 0 && *v < 0xFF);
    }

    let mut chars = norm.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphanumeric() {
            return Some(c.to_ascii_uppercase() as u16);
        }
    }

    if let Some(num) = norm.strip_prefix('f') {
        if let Ok(n) = num.parse::<u16>() {
            return (1..=24).contains(&n).then(|| VK_F1 + n - 1);
        }
    }

    NAME_TO_VK.get(norm.as_str()).copied()
}

/// Human readable name, for log lines.
pub fn key_name(vk: u16) -> String {
    match vk {
        0x30..=0x39 | 0x41..=0x5A => (vk as u8 as char).to_string(),
        0x70..=0x87 => format!("F{}", vk - VK_F1 + 1),
        _ => NAMED_KEYS
            .iter()
            .find(|(_, v)| *v == vk)
            .map(|(n, _)| n.to_string())
            .unwrap_or_else(|| format!("0x{:02X}", vk)),
    }
}
