//! Decision logic of the low-level keyboard hook.
//!
//! Nothing here touches the OS: `keyboard_hook` feeds raw `KBDLLHOOKSTRUCT`
//! fields into [`HookEngine::on_raw`] and turns the returned [`KeyAction`]
//! into either `CallNextHookEx` or a non-zero `LRESULT`.

use crate::types::{KeyAction, KeyDirection, KeyEvent};
use crate::vk::key_name;
use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error, trace, warn};

pub const WM_KEYDOWN: u32 = 0x0100;
pub const WM_KEYUP: u32 = 0x0101;
pub const WM_SYSKEYDOWN: u32 = 0x0104;
pub const WM_SYSKEYUP: u32 = 0x0105;

pub const LLKHF_EXTENDED: u32 = 0x01;
pub const LLKHF_LOWER_IL_INJECTED: u32 = 0x02;
pub const LLKHF_INJECTED: u32 = 0x10;

/// Handler for a single key. `Ok(true)` swallows the key press
/// (down and the matching up), `Ok(false)` lets it through.
pub type KeyHandler = Box<dyn FnMut() -> anyhow::Result<bool> + Send>;

/// Virtual-key code to handler table owned by the composition root and
/// moved into the hook when it is installed.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<u16, KeyHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_key<F>(&mut self, vk: u16, handler: F) -> &mut Self
    where
        F: FnMut() -> anyhow::Result<bool> + Send + 'static,
    {
        if self.handlers.insert(vk, Box::new(handler)).is_some() {
            warn!("Replacing hook handler for {}", key_name(vk));
        }
        self
    }

    pub fn contains(&self, vk: u16) -> bool {
        self.handlers.contains_key(&vk)
    }

    pub fn keys(&self) -> impl Iterator<Item = u16> + '_ {
        self.handlers.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    fn get_mut(&mut self, vk: u16) -> Option<&mut KeyHandler> {
        self.handlers.get_mut(&vk)
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.handlers.keys().copied().collect();
        keys.sort_unstable();
        f.debug_struct("HandlerRegistry").field("keys", &keys).finish()
    }
}

/// Builds a [`KeyEvent`] from the hook parameters, or `None` for anything
/// that is not a key down/up message.
pub fn classify(msg: u32, vk: u32, scan_code: u32, flags: u32, time: u32) -> Option<KeyEvent> {
    let direction = match msg {
        WM_KEYDOWN | WM_SYSKEYDOWN => KeyDirection::Down,
        WM_KEYUP | WM_SYSKEYUP => KeyDirection::Up,
        _ => return None,
    };
    Some(KeyEvent {
        vk: vk as u16,
        scan_code: scan_code as u16,
        direction,
        injected: flags & (LLKHF_INJECTED | LLKHF_LOWER_IL_INJECTED) != 0,
        extended: flags & LLKHF_EXTENDED != 0,
        timestamp_ms: time,
    })
}

#[derive(Debug, Default)]
pub struct HookEngine {
    handlers: HandlerRegistry,
    /// Keys whose most recent down was swallowed; their up is swallowed too.
    suppressed: HashSet<u16>,
}

impl HookEngine {
    pub fn new(handlers: HandlerRegistry) -> Self {
        Self {
            handlers,
            suppressed: HashSet::new(),
        }
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn is_suppressed(&self, vk: u16) -> bool {
        self.suppressed.contains(&vk)
    }

    pub fn pending_suppressed(&self) -> usize {
        self.suppressed.len()
    }

    pub fn on_raw(
        &mut self,
        msg: u32,
        vk: u32,
        scan_code: u32,
        flags: u32,
        time: u32,
    ) -> KeyAction {
        match classify(msg, vk, scan_code, flags, time) {
            Some(event) => self.on_event(&event),
            None => KeyAction::Pass,
        }
    }

    pub fn on_event(&mut self, event: &KeyEvent) -> KeyAction {
        // Our own SendInput output (and everybody else's) goes straight
        // through, otherwise a handler that injects would retrigger itself.
        if event.injected {
            trace!("Injected vk={:02X} passed", event.vk);
            return KeyAction::Pass;
        }

        match event.direction {
            KeyDirection::Down => self.on_down(event.vk),
            KeyDirection::Up => {
                if self.suppressed.remove(&event.vk) {
                    debug!("Swallowed up of {}", key_name(event.vk));
                    KeyAction::Block
                } else {
                    KeyAction::Pass
                }
            }
        }
    }

    /// Every down runs the handler, auto-repeat included, and its latest
    /// decision replaces the record. An up lost to a secure desktop switch
    /// or a hook timeout therefore never swallows the next press unseen.
    fn on_down(&mut self, vk: u16) -> KeyAction {
        let Some(handler) = self.handlers.get_mut(vk) else {
            return KeyAction::Pass;
        };

        let swallow = match catch_unwind(AssertUnwindSafe(|| handler())) {
            Ok(Ok(swallow)) => swallow,
            Ok(Err(e)) => {
                warn!("Handler for {} failed: {:#}", key_name(vk), e);
                false
            }
            Err(_) => {
                error!("Handler for {} panicked, key forwarded", key_name(vk));
                false
            }
        };

        if swallow {
            self.suppressed.insert(vk);
            debug!("Swallowed down of {}", key_name(vk));
            KeyAction::Block
        } else {
            if self.suppressed.remove(&vk) {
                debug!("Dropped stale suppression of {}", key_name(vk));
            }
            KeyAction::Pass
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vk::{VK_CAPITAL, VK_SCROLL};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(ret: bool) -> (Arc<AtomicUsize>, impl FnMut() -> anyhow::Result<bool> + Send) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(ret)
        })
    }

    #[test]
    fn test_classify_messages() {
        let ev = classify(WM_SYSKEYDOWN, 0x14, 0x3A, LLKHF_EXTENDED, 77).unwrap();
        assert_eq!(ev.vk, VK_CAPITAL);
        assert_eq!(ev.scan_code, 0x3A);
        assert_eq!(ev.direction, KeyDirection::Down);
        assert!(ev.extended);
        assert!(!ev.injected);
        assert_eq!(ev.timestamp_ms, 77);

        assert_eq!(classify(WM_KEYUP, 0x14, 0, 0, 0).unwrap().direction, KeyDirection::Up);
        assert!(classify(WM_KEYUP, 0x14, 0, LLKHF_LOWER_IL_INJECTED, 0).unwrap().injected);
        assert!(classify(0x0200, 0x14, 0, 0, 0).is_none()); // WM_MOUSEMOVE
    }

    #[test]
    fn test_swallow_down_and_matching_up() {
        let (count, handler) = counting(true);
        let mut reg = HandlerRegistry::new();
        reg.on_key(VK_CAPITAL, handler);
        let mut engine = HookEngine::new(reg);

        assert_eq!(engine.on_event(&KeyEvent::down(VK_CAPITAL)), KeyAction::Block);
        assert!(engine.is_suppressed(VK_CAPITAL));
        assert_eq!(engine.on_event(&KeyEvent::up(VK_CAPITAL)), KeyAction::Block);
        assert_eq!(engine.pending_suppressed(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // The record is gone: a stray up is forwarded.
        assert_eq!(engine.on_event(&KeyEvent::up(VK_CAPITAL)), KeyAction::Pass);
    }

    #[test]
    fn test_forwarding_handler_leaves_up_alone() {
        let (count, handler) = counting(false);
        let mut reg = HandlerRegistry::new();
        reg.on_key(VK_SCROLL, handler);
        let mut engine = HookEngine::new(reg);

        assert_eq!(engine.on_event(&KeyEvent::down(VK_SCROLL)), KeyAction::Pass);
        assert_eq!(engine.on_event(&KeyEvent::up(VK_SCROLL)), KeyAction::Pass);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(engine.pending_suppressed(), 0);
    }

    #[test]
    fn test_every_down_runs_handler() {
        let (count, handler) = counting(true);
        let mut reg = HandlerRegistry::new();
        reg.on_key(VK_CAPITAL, handler);
        let mut engine = HookEngine::new(reg);

        for _ in 0..5 {
            assert_eq!(engine.on_event(&KeyEvent::down(VK_CAPITAL)), KeyAction::Block);
        }
        assert_eq!(count.load(Ordering::SeqCst), 5);
        assert_eq!(engine.pending_suppressed(), 1);
        assert_eq!(engine.on_event(&KeyEvent::up(VK_CAPITAL)), KeyAction::Block);
        assert_eq!(engine.pending_suppressed(), 0);
    }

    #[test]
    fn test_lost_up_does_not_eat_next_press() {
        let mut swallow = true;
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let mut reg = HandlerRegistry::new();
        // Swallows the first press only.
        reg.on_key(VK_CAPITAL, move || {
            c.fetch_add(1, Ordering::SeqCst);
            let ret = swallow;
            swallow = false;
            Ok(ret)
        });
        let mut engine = HookEngine::new(reg);

        assert_eq!(engine.on_event(&KeyEvent::down(VK_CAPITAL)), KeyAction::Block);
        // The up never arrives (Win+L, hook timeout). Next physical press:
        assert_eq!(engine.on_event(&KeyEvent::down(VK_CAPITAL)), KeyAction::Pass);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!engine.is_suppressed(VK_CAPITAL));
        assert_eq!(engine.on_event(&KeyEvent::up(VK_CAPITAL)), KeyAction::Pass);
    }

    #[test]
    fn test_injected_never_reaches_handler() {
        let (count, handler) = counting(true);
        let mut reg = HandlerRegistry::new();
        reg.on_key(VK_CAPITAL, handler);
        let mut engine = HookEngine::new(reg);

        for flags in [LLKHF_INJECTED, LLKHF_LOWER_IL_INJECTED, LLKHF_INJECTED | LLKHF_EXTENDED] {
            assert_eq!(engine.on_raw(WM_KEYDOWN, 0x14, 0, flags, 0), KeyAction::Pass);
            assert_eq!(engine.on_raw(WM_KEYUP, 0x14, 0, flags, 0), KeyAction::Pass);
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(engine.pending_suppressed(), 0);
    }

    #[test]
    fn test_failing_handler_forwards() {
        let mut reg = HandlerRegistry::new();
        reg.on_key(VK_CAPITAL, || Err(anyhow::anyhow!("boom")));
        reg.on_key(VK_SCROLL, || panic!("handler bug"));
        let mut engine = HookEngine::new(reg);

        assert_eq!(engine.on_event(&KeyEvent::down(VK_CAPITAL)), KeyAction::Pass);
        assert_eq!(engine.on_event(&KeyEvent::up(VK_CAPITAL)), KeyAction::Pass);
        assert_eq!(engine.on_event(&KeyEvent::down(VK_SCROLL)), KeyAction::Pass);
        assert_eq!(engine.on_event(&KeyEvent::up(VK_SCROLL)), KeyAction::Pass);
        assert_eq!(engine.pending_suppressed(), 0);
    }

    #[test]
    fn test_interleaved_keys_keep_separate_records() {
        let (_, caps) = counting(true);
        let (_, scroll) = counting(true);
        let mut reg = HandlerRegistry::new();
        reg.on_key(VK_CAPITAL, caps).on_key(VK_SCROLL, scroll);
        let mut engine = HookEngine::new(reg);

        engine.on_event(&KeyEvent::down(VK_CAPITAL));
        engine.on_event(&KeyEvent::down(VK_SCROLL));
        assert_eq!(engine.pending_suppressed(), 2);
        assert_eq!(engine.on_event(&KeyEvent::up(VK_CAPITAL)), KeyAction::Block);
        assert!(engine.is_suppressed(VK_SCROLL));
        assert_eq!(engine.on_event(&KeyEvent::up(VK_SCROLL)), KeyAction::Block);
        assert_eq!(engine.pending_suppressed(), 0);
    }
}
