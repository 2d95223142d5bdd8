//! Manager configuration
//!
//! `ManagerSettings` is plain data that can be read from JSON so hosts can
//! keep editor configuration next to the rest of their settings. The only
//! non-serializable field is the invalid-content handler.

use super::errors::{EditorError, Result};
use super::priority::Priority;
use crate::keymap::ShortcutPreset;
use quill_model::InvalidContentHandler;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Platform used to resolve the `Mod` key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Platform {
    /// `Mod` resolves to `Meta`
    Mac,
    /// `Mod` resolves to `Ctrl`
    Other,
}

impl Platform {
    /// Platform of the running binary
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(target_os = "macos") || cfg!(target_os = "ios") {
            Self::Mac
        } else {
            Self::Other
        }
    }

    #[must_use]
    pub const fn is_mac(self) -> bool {
        matches!(self, Self::Mac)
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

/// Contributions disabled for the whole manager
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExcludeOptions {
    /// Skip building the merged keymap
    pub keymap: bool,
    /// Ignore every input rule
    pub input_rules: bool,
}

/// Options forwarded to the builtin extensions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuiltinOptions {
    /// Named shortcut preset used by the keymap extension
    pub shortcuts: ShortcutPreset,
    /// Leave out the base keymap (`Enter`, `Backspace`, ...)
    pub exclude_base_keymap: bool,
    /// Bind `Escape` to select the node around the selection
    pub select_parent_node_on_escape: bool,
}

impl Default for BuiltinOptions {
    fn default() -> Self {
        Self {
            shortcuts: ShortcutPreset::Default,
            exclude_base_keymap: false,
            select_parent_node_on_escape: false,
        }
    }
}

/// Settings applied when a manager is created
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ManagerSettings {
    /// Priority overrides keyed by extension name
    pub priority: BTreeMap<String, Priority>,
    pub exclude: ExcludeOptions,
    /// Name of the string handler used for string content
    pub string_handler: Option<String>,
    pub platform: Platform,
    pub builtin: BuiltinOptions,
    /// Called when JSON content contains nodes or marks missing from the schema
    #[serde(skip)]
    pub on_error: Option<InvalidContentHandler>,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            priority: BTreeMap::new(),
            exclude: ExcludeOptions::default(),
            string_handler: None,
            platform: Platform::current(),
            builtin: BuiltinOptions::default(),
            on_error: None,
        }
    }
}

impl ManagerSettings {
    /// Read settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(EditorError::config)
    }

    pub fn with_priority(mut self, extension: impl Into<String>, priority: Priority) -> Self {
        self.priority.insert(extension.into(), priority);
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_exclude(mut self, exclude: ExcludeOptions) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn with_string_handler(mut self, name: impl Into<String>) -> Self {
        self.string_handler = Some(name.into());
        self
    }

    pub fn with_builtin(mut self, builtin: BuiltinOptions) -> Self {
        self.builtin = builtin;
        self
    }

    pub fn with_on_error(mut self, handler: InvalidContentHandler) -> Self {
        self.on_error = Some(handler);
        self
    }

    /// Priority override for an extension, if any
    pub fn priority_of(&self, name: &str) -> Option<Priority> {
        self.priority.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_read_from_json() {
        let settings = ManagerSettings::from_json(
            r#"{
                "priority": { "bold": 20 },
                "exclude": { "inputRules": true },
                "platform": "mac",
                "builtin": { "shortcuts": "googleDoc", "selectParentNodeOnEscape": true }
            }"#,
        )
        .unwrap();

        assert_eq!(settings.priority_of("bold"), Some(Priority(20)));
        assert!(settings.exclude.input_rules);
        assert!(!settings.exclude.keymap);
        assert_eq!(settings.platform, Platform::Mac);
        assert_eq!(settings.builtin.shortcuts, ShortcutPreset::GoogleDoc);
        assert!(settings.builtin.select_parent_node_on_escape);
        assert!(!settings.builtin.exclude_base_keymap);
    }

    #[test]
    fn empty_json_gives_defaults() {
        let settings = ManagerSettings::from_json("{}").unwrap();
        assert!(settings.priority.is_empty());
        assert_eq!(settings.platform, Platform::current());
        assert_eq!(settings.builtin, BuiltinOptions::default());
    }

    #[test]
    fn malformed_json_is_config_error() {
        let err = ManagerSettings::from_json("{ \"platform\": 3 }").unwrap_err();
        assert!(matches!(err, EditorError::Config { .. }));
    }
}
