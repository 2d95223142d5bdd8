//! Key name normalization and key events

use crate::core::{EditorError, Platform, Result};
use std::fmt;

/// Normalize a key binding name
///
/// Modifier aliases are resolved (`Cmd`, `Control`, `a`, `s`, ...), `Mod`
/// becomes `Meta` on mac and `Ctrl` elsewhere, modifiers are written in the
/// order `Alt-Ctrl-Meta-Shift` and `Space` becomes `" "`.
pub fn normalize_key_name(name: &str, platform: Platform) -> Result<String> {
    if name.is_empty() {
        return Err(invalid(name, "empty key name"));
    }

    let mut parts: Vec<&str> = name.split('-').collect();
    let mut key = parts.pop().unwrap_or_default();
    if key.is_empty() {
        // A trailing `-` binds the minus key itself
        parts.pop();
        key = "-";
    }
    let key = if key == "Space" { " " } else { key };

    let mut modifiers = Modifiers::default();
    for modifier in parts {
        match modifier.to_ascii_lowercase().as_str() {
            "cmd" | "meta" | "m" => modifiers.meta = true,
            "a" | "alt" => modifiers.alt = true,
            "c" | "ctrl" | "control" => modifiers.ctrl = true,
            "s" | "shift" => modifiers.shift = true,
            "mod" => {
                if platform.is_mac() {
                    modifiers.meta = true;
                } else {
                    modifiers.ctrl = true;
                }
            }
            _ => return Err(invalid(name, format!("unrecognized modifier '{modifier}'"))),
        }
    }

    Ok(modifiers.apply(key))
}

fn invalid(pattern: &str, message: impl Into<String>) -> EditorError {
    EditorError::InvalidKeyPattern {
        pattern: pattern.to_string(),
        message: message.into(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Modifiers {
    alt: bool,
    ctrl: bool,
    meta: bool,
    shift: bool,
}

impl Modifiers {
    fn apply(self, key: &str) -> String {
        let mut name = String::with_capacity(key.len() + 20);
        if self.alt {
            name.push_str("Alt-");
        }
        if self.ctrl {
            name.push_str("Ctrl-");
        }
        if self.meta {
            name.push_str("Meta-");
        }
        if self.shift {
            name.push_str("Shift-");
        }
        name.push_str(key);
        name
    }
}

/// A key press delivered by the host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyEvent {
    /// Key value, e.g. `"a"`, `"Enter"`, `" "`
    pub key: String,
    pub alt: bool,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn with_alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    /// `Mod` for the platform: `Meta` on mac, `Ctrl` elsewhere
    pub fn with_mod(self, platform: Platform) -> Self {
        if platform.is_mac() {
            self.with_meta()
        } else {
            self.with_ctrl()
        }
    }

    /// Binding names to try, most specific first
    ///
    /// A shifted single character is also tried without `Shift`, so a
    /// binding for `Mod->` matches the key press that produced `>`.
    pub fn names(&self) -> Vec<String> {
        let modifiers = Modifiers {
            alt: self.alt,
            ctrl: self.ctrl,
            meta: self.meta,
            shift: self.shift,
        };
        let mut names = vec![modifiers.apply(&self.key)];

        if self.shift && self.key.chars().count() == 1 && self.key != " " {
            names.push(
                Modifiers {
                    shift: false,
                    ..modifiers
                }
                .apply(&self.key),
            );
        }
        names
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = Modifiers {
            alt: self.alt,
            ctrl: self.ctrl,
            meta: self.meta,
            shift: self.shift,
        }
        .apply(&self.key);
        f.write_str(&name)
    }
}
