//! Named shortcuts and the presets that resolve them

use crate::core::Platform;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shortcut referred to by meaning instead of by key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NamedShortcut {
    Undo,
    Redo,
    Bold,
    Italic,
    Underline,
    Strike,
    Code,
    Paragraph,
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    NumberList,
    BulletList,
    Quote,
    Divider,
    Codeblock,
    ClearFormatting,
}

impl NamedShortcut {
    pub const ALL: [Self; 20] = [
        Self::Undo,
        Self::Redo,
        Self::Bold,
        Self::Italic,
        Self::Underline,
        Self::Strike,
        Self::Code,
        Self::Paragraph,
        Self::H1,
        Self::H2,
        Self::H3,
        Self::H4,
        Self::H5,
        Self::H6,
        Self::NumberList,
        Self::BulletList,
        Self::Quote,
        Self::Divider,
        Self::Codeblock,
        Self::ClearFormatting,
    ];

    /// Heading shortcut for levels 1 to 6
    pub const fn heading(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::H1),
            2 => Some(Self::H2),
            3 => Some(Self::H3),
            4 => Some(Self::H4),
            5 => Some(Self::H5),
            6 => Some(Self::H6),
            _ => None,
        }
    }
}

impl fmt::Display for NamedShortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_|{self:?}|")
    }
}

/// Built in shortcut maps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShortcutPreset {
    #[default]
    Default,
    GoogleDoc,
}

/// Keys assigned to named shortcuts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortcutMap {
    keys: AHashMap<NamedShortcut, String>,
}

impl ShortcutMap {
    /// Empty map, for building custom presets
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preset(preset: ShortcutPreset, platform: Platform) -> Self {
        let mut map = Self::default_map(platform);
        if preset == ShortcutPreset::GoogleDoc {
            map = map
                .with(NamedShortcut::Strike, "Mod-Shift-S")
                .with(NamedShortcut::Code, "Mod-Shift-M")
                .with(NamedShortcut::H1, "Mod-Alt-1")
                .with(NamedShortcut::H2, "Mod-Alt-2")
                .with(NamedShortcut::H3, "Mod-Alt-3")
                .with(NamedShortcut::H4, "Mod-Alt-4")
                .with(NamedShortcut::H5, "Mod-Alt-5")
                .with(NamedShortcut::H6, "Mod-Alt-6")
                .with(NamedShortcut::NumberList, "Mod-Alt-7")
                .with(NamedShortcut::BulletList, "Mod-Alt-8")
                .with(NamedShortcut::Quote, "Mod-Alt-9")
                .with(NamedShortcut::ClearFormatting, "Mod-\\");
        }
        map
    }

    fn default_map(platform: Platform) -> Self {
        let redo = if platform.is_mac() {
            "Shift-Mod-z"
        } else {
            "Mod-y"
        };

        Self::new()
            .with(NamedShortcut::Undo, "Mod-z")
            .with(NamedShortcut::Redo, redo)
            .with(NamedShortcut::Bold, "Mod-b")
            .with(NamedShortcut::Italic, "Mod-i")
            .with(NamedShortcut::Underline, "Mod-u")
            .with(NamedShortcut::Strike, "Mod-d")
            .with(NamedShortcut::Code, "Mod-`")
            .with(NamedShortcut::Paragraph, "Mod-Alt-0")
            .with(NamedShortcut::H1, "Mod-Shift-1")
            .with(NamedShortcut::H2, "Mod-Shift-2")
            .with(NamedShortcut::H3, "Mod-Shift-3")
            .with(NamedShortcut::H4, "Mod-Shift-4")
            .with(NamedShortcut::H5, "Mod-Shift-5")
            .with(NamedShortcut::H6, "Mod-Shift-6")
            .with(NamedShortcut::NumberList, "Mod-Shift-9")
            .with(NamedShortcut::BulletList, "Mod-Shift-8")
            .with(NamedShortcut::Quote, "Mod->")
            .with(NamedShortcut::Divider, "Mod-Shift-|")
            .with(NamedShortcut::Codeblock, "Mod-Shift-~")
            .with(NamedShortcut::ClearFormatting, "Mod-Shift-C")
    }

    pub fn with(mut self, shortcut: NamedShortcut, key: impl Into<String>) -> Self {
        self.keys.insert(shortcut, key.into());
        self
    }

    pub fn get(&self, shortcut: NamedShortcut) -> Option<&str> {
        self.keys.get(&shortcut).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_preset_covers_every_shortcut() {
        let map = ShortcutMap::preset(ShortcutPreset::Default, Platform::Other);
        for shortcut in NamedShortcut::ALL {
            assert!(map.get(shortcut).is_some(), "{shortcut} missing");
        }
        assert_eq!(map.get(NamedShortcut::Bold), Some("Mod-b"));
        assert_eq!(map.get(NamedShortcut::Redo), Some("Mod-y"));
    }

    #[test]
    fn redo_differs_on_mac() {
        let map = ShortcutMap::preset(ShortcutPreset::Default, Platform::Mac);
        assert_eq!(map.get(NamedShortcut::Redo), Some("Shift-Mod-z"));
    }

    #[test]
    fn google_doc_overrides() {
        let map = ShortcutMap::preset(ShortcutPreset::GoogleDoc, Platform::Other);
        assert_eq!(map.get(NamedShortcut::Strike), Some("Mod-Shift-S"));
        assert_eq!(map.get(NamedShortcut::H3), Some("Mod-Alt-3"));
        assert_eq!(map.get(NamedShortcut::ClearFormatting), Some("Mod-\\"));
        // Shared with the default preset
        assert_eq!(map.get(NamedShortcut::Bold), Some("Mod-b"));
    }

    #[test]
    fn presets_deserialize_from_camel_case() {
        let preset: ShortcutPreset = serde_json::from_str("\"googleDoc\"").unwrap();
        assert_eq!(preset, ShortcutPreset::GoogleDoc);
        assert_eq!(NamedShortcut::Bold.to_string(), "_|Bold|");
    }
}
