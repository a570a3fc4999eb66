use thiserror::Error;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("failed to install keyboard hook: {0}")]
    RegistrationFailed(String),
    #[error("a keyboard hook is already installed on this thread")]
    AlreadyInstalled,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HotkeyError {
    /// The exact combination is owned by another process.
    #[error("hotkey id={id} mods=0x{modifiers:X} vk=0x{vk:X} is taken by another application")]
    Conflict { id: i32, modifiers: u32, vk: u16 },
    #[error("failed to register hotkey id={id} mods=0x{modifiers:X} vk=0x{vk:X}: {reason}")]
    RegistrationFailed {
        id: i32,
        modifiers: u32,
        vk: u16,
        reason: String,
    },
    #[error("failed to unregister hotkey id={id}: {reason}")]
    UnregisterFailed { id: i32, reason: String },
    #[error("unknown modifier name: {0}")]
    UnknownModifier(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InjectionError {
    /// The OS accepted only part of a batch. Nothing about the target
    /// window's state can be assumed.
    #[error("SendInput accepted {sent}/{requested} events")]
    PartialSubmission { sent: u32, requested: u32 },
    #[error("clipboard unavailable after {attempts} attempts")]
    ClipboardUnavailable { attempts: u32 },
    #[error("unknown key: {0}")]
    UnknownKey(String),
}

/// Raw clipboard backend failure, before retries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClipboardError {
    #[error("clipboard busy: {0}")]
    Busy(String),
    #[error("clipboard does not hold text")]
    Unsupported,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("key 0x{0:X} is bound both as a hook key and as a hotkey")]
    OverlappingKey(u16),
    #[error("unknown key name in bindings: {0}")]
    UnknownKey(String),
}
