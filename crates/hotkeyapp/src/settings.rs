use anyhow::{Context, Result};
use hotkeyapp_core::clipboard::{CaptureOptions, PasteOptions};
use hotkeyapp_core::dispatch::resolve_lenient;
use hotkeyapp_core::injector::{clamp_hold_ms, parse_hold_ms};
use hotkeyapp_core::{Action, ModifierName, RegistrationPolicy, Timings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, warn};

pub const APP_DIR: &str = "hotkeyapp";
pub const SETTINGS_FILE: &str = "settings.json";

pub const ENV_CONSOLE_LOG_LEVEL: &str = "HOTKEYAPP_CONSOLE_LOG_LEVEL";
pub const ENV_FILE_LOG_LEVEL: &str = "HOTKEYAPP_FILE_LOG_LEVEL";
pub const ENV_FILE_LOG_DIR: &str = "HOTKEYAPP_FILE_LOG_DIR";
pub const ENV_COPY_HOLD_MS: &str = "HOTKEYAPP_COPY_HOLD_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub console_level: String,
    pub file_level: String,
    /// Defaults to the platform data dir.
    pub file_dir: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            console_level: "info".into(),
            file_level: "debug".into(),
            file_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Modifiers shared by every entry of `hotkeys`.
    pub hotkey_modifiers: Vec<String>,
    /// Key name to action, registered with the OS.
    pub hotkeys: BTreeMap<String, Action>,
    /// Key name to action, taken by the low-level hook.
    pub singleton_keys: BTreeMap<String, Action>,
    pub registration_policy: RegistrationPolicy,
    pub timings: Timings,
    /// Ctrl+C hold when capturing the selection. Clamped to [0, 1000].
    pub copy_hold_ms: i64,
    pub paste_settle_ms: u64,
    /// Longer texts go through the clipboard, shorter ones are typed.
    pub paste_threshold_chars: usize,
    pub per_char_delay_ms: u64,
    pub variables: BTreeMap<String, String>,
    pub log: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        let insert = |name: &str| Action::InsertVariable { name: name.into() };
        let hotkeys = BTreeMap::from([
            ("3".to_string(), insert("e-mail")),
            ("4".to_string(), insert("telephone")),
            (
                "5".to_string(),
                Action::RunProgram {
                    variable: "calculator".into(),
                },
            ),
            ("9".to_string(), insert("signature")),
        ]);
        let singleton_keys = BTreeMap::from([
            ("CapsLock".to_string(), Action::SwitchLayout),
            ("ScrollLock".to_string(), Action::SwapSelection),
        ]);

        Self {
            hotkey_modifiers: vec!["control".into()],
            hotkeys,
            singleton_keys,
            registration_policy: RegistrationPolicy::default(),
            timings: Timings::default(),
            copy_hold_ms: 30,
            paste_settle_ms: 100,
            paste_threshold_chars: 200,
            per_char_delay_ms: 0,
            variables: BTreeMap::new(),
            log: LogSettings::default(),
        }
    }
}

/// Key bindings ready for the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bindings {
    pub singleton: Vec<(u16, Action)>,
    pub hotkeys: Vec<(u16, Action)>,
    pub modifiers: Vec<ModifierName>,
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE))
    }

    /// `Ok(None)` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Settings>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let settings = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Some(settings))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Applies `HOTKEYAPP_*` overrides read through `get`.
    pub fn apply_env<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = get(ENV_CONSOLE_LOG_LEVEL) {
            self.log.console_level = level;
        }
        if let Some(level) = get(ENV_FILE_LOG_LEVEL) {
            self.log.file_level = level;
        }
        if let Some(dir) = get(ENV_FILE_LOG_DIR) {
            self.log.file_dir = Some(PathBuf::from(dir));
        }
        if let Some(hold) = get(ENV_COPY_HOLD_MS) {
            self.copy_hold_ms = parse_hold_ms(&hold) as i64;
        }
    }

    /// Value of a text variable; falls back to the environment variable of
    /// the same name.
    pub fn variable(&self, name: &str) -> Option<String> {
        self.variables
            .get(name)
            .cloned()
            .or_else(|| std::env::var(name).ok())
    }

    /// Bindings with unknown key names skipped. An unknown modifier drops
    /// every hotkey, so bare keys are never registered by mistake.
    pub fn bindings(&self) -> Bindings {
        let (singleton, unknown_singleton) = resolve_lenient(&self.singleton_keys);
        let (mut hotkeys, unknown_hotkeys) = resolve_lenient(&self.hotkeys);
        for name in unknown_singleton.iter().chain(&unknown_hotkeys) {
            warn!("Unknown key {:?} in settings, binding skipped", name);
        }

        let modifiers = match ModifierName::parse_list(&self.hotkey_modifiers) {
            Ok(modifiers) => modifiers,
            Err(e) => {
                error!("{}; hotkeys disabled", e);
                hotkeys.clear();
                Vec::new()
            }
        };

        Bindings {
            singleton,
            hotkeys,
            modifiers,
        }
    }

    pub fn copy_hold(&self) -> u64 {
        clamp_hold_ms(self.copy_hold_ms)
    }

    pub fn per_char_delay(&self) -> Duration {
        Duration::from_millis(self.per_char_delay_ms)
    }

    pub fn paste_options(&self) -> PasteOptions {
        PasteOptions {
            settle: Duration::from_millis(self.paste_settle_ms),
        }
    }

    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            copy_hold_ms: self.copy_hold(),
            ..CaptureOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_round_trip_through_json() {
        let s = Settings::default();
        let json = serde_json::to_string(&s).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
        assert_eq!(back.hotkeys.len(), 4);
        assert_eq!(back.singleton_keys["CapsLock"], Action::SwitchLayout);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let s: Settings = serde_json::from_str(
            r#"{
                "registration_policy": "abort_on_first_failure",
                "timings": { "press_ms": 10 },
                "variables": { "e-mail": "me@example.com" }
            }"#,
        )
        .unwrap();
        assert_eq!(s.registration_policy, RegistrationPolicy::AbortOnFirstFailure);
        assert_eq!(s.timings.press_ms, 10);
        assert_eq!(s.timings.after_ms, 30);
        assert_eq!(s.hotkey_modifiers, vec!["control".to_string()]);
        assert_eq!(s.variable("e-mail").as_deref(), Some("me@example.com"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_CONSOLE_LOG_LEVEL, "warn"),
            (ENV_FILE_LOG_DIR, "/tmp/hk"),
            (ENV_COPY_HOLD_MS, "abc"),
        ]);
        let mut s = Settings::default();
        s.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(s.log.console_level, "warn");
        assert_eq!(s.log.file_level, "debug");
        assert_eq!(s.log.file_dir, Some(PathBuf::from("/tmp/hk")));
        assert_eq!(s.copy_hold_ms, 0);
    }

    #[test]
    fn test_copy_hold_is_clamped() {
        let mut s = Settings::default();
        s.copy_hold_ms = 5000;
        assert_eq!(s.copy_hold(), 1000);
        s.copy_hold_ms = -5;
        assert_eq!(s.capture_options().copy_hold_ms, 0);
    }

    #[test]
    fn test_bad_names_degrade_instead_of_failing() {
        let mut s = Settings::default();
        s.singleton_keys.insert("Hyper".into(), Action::Quit);
        let b = s.bindings();
        assert_eq!(b.singleton.len(), 2);
        assert_eq!(b.hotkeys.len(), 4);
        assert_eq!(b.modifiers, vec![ModifierName::Control]);

        s.hotkey_modifiers = vec!["control".into(), "meta".into()];
        let b = s.bindings();
        assert!(b.hotkeys.is_empty());
        assert!(b.modifiers.is_empty());
        assert_eq!(b.singleton.len(), 2);
    }

    #[test]
    fn test_load_missing_and_malformed() {
        let dir = std::env::temp_dir().join(format!("hotkeyapp-settings-{}", std::process::id()));
        let path = dir.join(SETTINGS_FILE);
        let _ = fs::remove_dir_all(&dir);

        assert!(Settings::load(&path).unwrap().is_none());

        Settings::default().save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), Some(Settings::default()));

        fs::write(&path, "{ not json").unwrap();
        assert!(Settings::load(&path).is_err());

        let _ = fs::remove_dir_all(&dir);
    }
}
