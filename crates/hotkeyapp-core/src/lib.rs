pub mod clipboard;
pub mod dispatch;
pub mod error;
pub mod hook;
pub mod hotkey;
pub mod injector;
pub mod types;
pub mod vk;

#[cfg(windows)]
pub mod keyboard_hook;
#[cfg(windows)]
pub mod send_input;
#[cfg(windows)]
pub mod win_clipboard;
#[cfg(windows)]
pub mod win_hotkey;

pub use dispatch::{Action, AppEvent, Dispatcher, EventSource};
pub use error::{ClipboardError, DispatchError, HookError, HotkeyError, InjectionError};
pub use hook::{HandlerRegistry, HookEngine};
pub use hotkey::{HotkeyManager, HotkeyTrigger, ModifierName, RegistrationPolicy};
pub use injector::{Injector, InputSink, SharedInjector};
pub use types::{InputEvent, KeyAction, KeyDirection, KeyEvent, Timings};
