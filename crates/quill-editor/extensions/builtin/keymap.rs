//! Base key bindings and the active shortcut map

use crate::commands::CommandArgs;
use crate::core::{BuiltinOptions, Platform, Priority, Result};
use crate::extensions::{Extension, ExtensionCapability, ExtensionOptions, OptionChanges};
use crate::helpers::{HelperProps, HelperTable};
use crate::keymap::{
    KeyBindingProps, KeyBindings, NamedShortcut, PrioritizedKeyBindings, ShortcutMap,
    ShortcutPreset,
};
use crate::manager::ExtensionStore;
use quill_model::Selection;
use serde_json::Value;
use tracing::{debug, warn};

const SHORTCUTS: &str = "shortcuts";
const EXCLUDE_BASE_KEYMAP: &str = "excludeBaseKeymap";
const SELECT_PARENT_NODE_ON_ESCAPE: &str = "selectParentNodeOnEscape";

const fn preset_name(preset: ShortcutPreset) -> &'static str {
    match preset {
        ShortcutPreset::Default => "default",
        ShortcutPreset::GoogleDoc => "googleDoc",
    }
}

/// Base keymap and named shortcut resolution
///
/// `shortcuts` is either a preset name (`"default"`, `"googleDoc"`) or an
/// object mapping shortcut names to keys on top of the default preset.
#[derive(Debug, Clone)]
pub struct KeymapExtension {
    options: ExtensionOptions,
}

impl Default for KeymapExtension {
    fn default() -> Self {
        Self::from_builtin(&BuiltinOptions::default())
    }
}

impl KeymapExtension {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_builtin(builtin: &BuiltinOptions) -> Self {
        Self {
            options: ExtensionOptions::new()
                .with(SHORTCUTS, Value::from(preset_name(builtin.shortcuts)))
                .with(EXCLUDE_BASE_KEYMAP, Value::Bool(builtin.exclude_base_keymap))
                .with(
                    SELECT_PARENT_NODE_ON_ESCAPE,
                    Value::Bool(builtin.select_parent_node_on_escape),
                ),
        }
    }

    /// Shortcut map selected by the `shortcuts` option
    pub fn shortcut_map(&self, platform: Platform) -> ShortcutMap {
        match self.options.get(SHORTCUTS) {
            Some(Value::Object(overrides)) => {
                let mut map = ShortcutMap::preset(ShortcutPreset::Default, platform);
                for (name, key) in overrides {
                    let shortcut =
                        serde_json::from_value::<NamedShortcut>(Value::String(name.clone()));
                    match (shortcut, key.as_str()) {
                        (Ok(shortcut), Some(key)) => map = map.with(shortcut, key),
                        _ => warn!(shortcut = %name, "ignoring unknown shortcut override"),
                    }
                }
                map
            }
            Some(preset) => {
                let preset = serde_json::from_value(preset.clone()).unwrap_or_else(|err| {
                    warn!(error = %err, "unknown shortcut preset, using the default");
                    ShortcutPreset::Default
                });
                ShortcutMap::preset(preset, platform)
            }
            None => ShortcutMap::preset(ShortcutPreset::Default, platform),
        }
    }

    fn base_keymap(&self) -> KeyBindings {
        let mut bindings = KeyBindings::new()
            .with("Enter", enter)
            .with("Backspace", backspace)
            .with("Delete", delete_forward)
            .with("Mod-a", select_all);
        if self
            .options
            .get_bool(SELECT_PARENT_NODE_ON_ESCAPE)
            .unwrap_or(false)
        {
            bindings = bindings.with("Escape", select_parent);
        }
        bindings
    }

    fn get_named_shortcut(props: HelperProps<'_>, args: &CommandArgs) -> Result<Value> {
        let shortcut: NamedShortcut = args.decode("getNamedShortcut", 0)?;
        let platform = props.store.settings()?.platform;
        let map = props
            .store
            .with_extension(|keymap: &KeymapExtension| keymap.shortcut_map(platform))?;
        Ok(map.get(shortcut).map_or(Value::Null, Value::from))
    }
}

fn enter(props: KeyBindingProps<'_>) -> Result<bool> {
    props.tr.edit(|tr| tr.insert_text("\n"))?;
    props.commit()
}

fn backspace(props: KeyBindingProps<'_>) -> Result<bool> {
    let selection = props.tr.read(|tr| tr.selection())?;
    if selection.empty() {
        let pos = selection.from();
        if pos == 0 {
            return Ok(false);
        }
        props.tr.edit(|tr| tr.delete(pos - 1, pos))?;
    } else {
        props.tr.edit(|tr| tr.delete_selection())?;
    }
    props.commit()
}

fn delete_forward(props: KeyBindingProps<'_>) -> Result<bool> {
    let (selection, size) = props
        .tr
        .read(|tr| (tr.selection(), tr.doc().content_size()))?;
    if selection.empty() {
        let pos = selection.from();
        if pos >= size {
            return Ok(false);
        }
        props.tr.edit(|tr| tr.delete(pos, pos + 1))?;
    } else {
        props.tr.edit(|tr| tr.delete_selection())?;
    }
    props.commit()
}

fn select_all(props: KeyBindingProps<'_>) -> Result<bool> {
    props.tr.edit(|tr| {
        let all = Selection::all(tr.doc());
        tr.set_selection(all)
    })?;
    props.commit()
}

/// Text sits directly in the document, so the parent of any selection is
/// the whole document
fn select_parent(props: KeyBindingProps<'_>) -> Result<bool> {
    let already = props
        .tr
        .read(|tr| tr.selection() == Selection::all(tr.doc()))?;
    if already {
        return Ok(false);
    }
    select_all(props)
}

impl Extension for KeymapExtension {
    fn name(&self) -> &str {
        "keymap"
    }

    fn default_priority(&self) -> Priority {
        Priority::LOW
    }

    fn options(&self) -> &ExtensionOptions {
        &self.options
    }

    fn options_mut(&mut self) -> Option<&mut ExtensionOptions> {
        Some(&mut self.options)
    }

    fn capabilities(&self) -> ExtensionCapability {
        ExtensionCapability::KEYMAP | ExtensionCapability::HELPERS
    }

    fn create_helpers(&self) -> HelperTable {
        HelperTable::new().with("getNamedShortcut", Self::get_named_shortcut)
    }

    fn create_keymap(&self, _shortcuts: &ShortcutMap) -> Option<PrioritizedKeyBindings> {
        if self.options.get_bool(EXCLUDE_BASE_KEYMAP).unwrap_or(false) {
            return None;
        }
        Some(PrioritizedKeyBindings::with_priority(
            Priority::LOW,
            self.base_keymap(),
        ))
    }

    fn on_set_options(&mut self, changes: &OptionChanges, store: &ExtensionStore) -> Result<()> {
        let relevant = [SHORTCUTS, EXCLUDE_BASE_KEYMAP, SELECT_PARENT_NODE_ON_ESCAPE]
            .iter()
            .any(|key| changes.changed(key));
        if relevant {
            debug!("keymap options changed");
            store.rebuild_keymap()?;
        }
        Ok(())
    }

    fn clone_with_options(&self, options: ExtensionOptions) -> Box<dyn Extension> {
        Box::new(Self { options })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn base_keymap_follows_options() {
        let shortcuts = ShortcutMap::new();
        let keymap = KeymapExtension::new().create_keymap(&shortcuts).unwrap();
        assert_eq!(keymap.priority, Some(Priority::LOW));
        assert_eq!(
            keymap.bindings.keys().collect::<Vec<_>>(),
            vec!["Enter", "Backspace", "Delete", "Mod-a"]
        );

        let escaping = KeymapExtension::from_builtin(&BuiltinOptions {
            select_parent_node_on_escape: true,
            ..BuiltinOptions::default()
        });
        let keymap = escaping.create_keymap(&shortcuts).unwrap();
        assert!(keymap.bindings.get("Escape").is_some());

        let excluded = KeymapExtension::from_builtin(&BuiltinOptions {
            exclude_base_keymap: true,
            ..BuiltinOptions::default()
        });
        assert!(excluded.create_keymap(&shortcuts).is_none());
    }

    #[test]
    fn shortcut_option_accepts_presets_and_overrides() {
        let google = KeymapExtension::from_builtin(&BuiltinOptions {
            shortcuts: ShortcutPreset::GoogleDoc,
            ..BuiltinOptions::default()
        });
        assert_eq!(
            google
                .shortcut_map(Platform::Other)
                .get(NamedShortcut::Strike),
            Some("Mod-Shift-S")
        );

        let custom = KeymapExtension {
            options: ExtensionOptions::new()
                .with(SHORTCUTS, json!({ "bold": "Mod-Shift-b", "nope": "x" })),
        }
        .shortcut_map(Platform::Other);
        assert_eq!(custom.get(NamedShortcut::Bold), Some("Mod-Shift-b"));
        assert_eq!(custom.get(NamedShortcut::Italic), Some("Mod-i"));
    }
}
