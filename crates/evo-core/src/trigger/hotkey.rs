//! Restart on a global key combination.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use tracing::{debug, info, warn};

use super::{RestartEvent, RestartSender, TriggerSource};
use crate::error::{SessionError, SessionResult};

/// How often the listener checks whether it has been stopped.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

const LETTERS: [Code; 26] = [
    Code::KeyA, Code::KeyB, Code::KeyC, Code::KeyD, Code::KeyE, Code::KeyF, Code::KeyG,
    Code::KeyH, Code::KeyI, Code::KeyJ, Code::KeyK, Code::KeyL, Code::KeyM, Code::KeyN,
    Code::KeyO, Code::KeyP, Code::KeyQ, Code::KeyR, Code::KeyS, Code::KeyT, Code::KeyU,
    Code::KeyV, Code::KeyW, Code::KeyX, Code::KeyY, Code::KeyZ,
];

const DIGITS: [Code; 10] = [
    Code::Digit0, Code::Digit1, Code::Digit2, Code::Digit3, Code::Digit4,
    Code::Digit5, Code::Digit6, Code::Digit7, Code::Digit8, Code::Digit9,
];

const FUNCTION_KEYS: [Code; 12] = [
    Code::F1, Code::F2, Code::F3, Code::F4, Code::F5, Code::F6,
    Code::F7, Code::F8, Code::F9, Code::F10, Code::F11, Code::F12,
];

/// Registers a system-wide hotkey and emits a restart on every press.
pub struct HotkeyTrigger {
    combo: String,
    manager: Option<GlobalHotKeyManager>,
    hotkey: Option<HotKey>,
    running: Arc<AtomicBool>,
    listener: Option<JoinHandle<()>>,
}

impl HotkeyTrigger {
    /// `combo` is a `+`-separated combination such as `ctrl+0` or `ctrl+shift+r`.
    pub fn new(combo: impl Into<String>) -> Self {
        Self {
            combo: combo.into(),
            manager: None,
            hotkey: None,
            running: Arc::new(AtomicBool::new(false)),
            listener: None,
        }
    }
}

impl TriggerSource for HotkeyTrigger {
    fn start(&mut self, events: RestartSender) -> SessionResult<()> {
        let (modifiers, code) = parse_combo(&self.combo).ok_or_else(|| {
            SessionError::TriggerSetupFailed(format!("unrecognised hotkey '{}'", self.combo))
        })?;
        let hotkey = HotKey::new(Some(modifiers), code);

        let manager = GlobalHotKeyManager::new().map_err(|e| {
            SessionError::TriggerSetupFailed(format!("failed to create hotkey manager: {e}"))
        })?;
        manager.register(hotkey).map_err(|e| {
            SessionError::TriggerSetupFailed(format!(
                "failed to register hotkey '{}': {e}",
                self.combo
            ))
        })?;

        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let id = hotkey.id();
        let listener = thread::Builder::new()
            .name("evo-hotkey".into())
            .spawn(move || listen(id, running, events));
        let listener = match listener {
            Ok(handle) => handle,
            Err(e) => {
                let _ = manager.unregister(hotkey);
                return Err(SessionError::TriggerSetupFailed(format!(
                    "failed to start hotkey listener: {e}"
                )));
            }
        };

        info!(hotkey = %self.combo, "hotkey registered");
        self.manager = Some(manager);
        self.hotkey = Some(hotkey);
        self.listener = Some(listener);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let (Some(manager), Some(hotkey)) = (self.manager.take(), self.hotkey.take()) {
            if let Err(e) = manager.unregister(hotkey) {
                warn!("failed to unregister hotkey '{}': {e}", self.combo);
            }
        }
        if let Some(handle) = self.listener.take() {
            let _ = handle.join();
        }
    }

    fn describe(&self) -> String {
        format!("hotkey {}", self.combo)
    }
}

impl Drop for HotkeyTrigger {
    fn drop(&mut self) {
        self.stop();
    }
}

fn listen(id: u32, running: Arc<AtomicBool>, events: RestartSender) {
    let receiver = GlobalHotKeyEvent::receiver();
    while running.load(Ordering::Acquire) {
        match receiver.recv_timeout(POLL_INTERVAL) {
            Ok(event) if event.id == id && event.state == HotKeyState::Pressed => {
                debug!("restart hotkey pressed");
                if events.send(RestartEvent).is_err() {
                    break;
                }
            }
            Ok(_) => {}
            Err(e) if e.is_timeout() => {}
            Err(_) => break,
        }
    }
}

/// Parse a combination like `ctrl+shift+r` into modifiers and a key code.
///
/// Returns `None` for unknown modifiers or keys, or a missing key.
pub fn parse_combo(combo: &str) -> Option<(Modifiers, Code)> {
    let lower = combo.trim().to_lowercase();
    let mut parts: Vec<&str> = lower.split('+').map(str::trim).collect();
    let key = parts.pop()?;

    let mut modifiers = Modifiers::empty();
    for part in parts {
        modifiers |= match part {
            "cmd" | "command" | "super" | "win" => Modifiers::SUPER,
            "ctrl" | "control" => Modifiers::CONTROL,
            "alt" | "option" => Modifiers::ALT,
            "shift" => Modifiers::SHIFT,
            _ => return None,
        };
    }

    Some((modifiers, key_code(key)?))
}

fn key_code(key: &str) -> Option<Code> {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c @ 'a'..='z'), None) => return Some(LETTERS[(c as u8 - b'a') as usize]),
        (Some(c @ '0'..='9'), None) => return Some(DIGITS[(c as u8 - b'0') as usize]),
        _ => {}
    }
    let code = match key {
        "space" => Code::Space,
        "enter" | "return" => Code::Enter,
        "escape" | "esc" => Code::Escape,
        "tab" => Code::Tab,
        "backspace" => Code::Backspace,
        "delete" => Code::Delete,
        _ => {
            let n: usize = key.strip_prefix('f')?.parse().ok()?;
            return FUNCTION_KEYS.get(n.checked_sub(1)?).copied();
        }
    };
    Some(code)
}
