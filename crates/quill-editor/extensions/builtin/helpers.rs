//! Helpers answering questions about the current state

use crate::commands::CommandArgs;
use crate::core::Result;
use crate::extensions::{Disposer, Extension, ExtensionCapability, ExtensionOptions};
use crate::helpers::{mark_active, HelperProps, HelperTable};
use crate::manager::{ExtensionStore, DEFAULT_STRING_HANDLER};
use quill_model::{EditorState, StringHandler};
use serde_json::Value;
use tracing::debug;

/// Builtin helpers, manager getters and the plain text string handler
#[derive(Debug, Clone, Default)]
pub struct HelpersExtension {
    options: ExtensionOptions,
}

impl HelpersExtension {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_selection_empty(props: HelperProps<'_>, _: &CommandArgs) -> Result<Value> {
        Ok(Value::Bool(props.state.selection().empty()))
    }

    /// Text of the document, or of `from..to` when both are given
    fn get_text(props: HelperProps<'_>, args: &CommandArgs) -> Result<Value> {
        let doc = props.state.doc();
        let text = match (args.usize(0), args.usize(1)) {
            (Some(from), Some(to)) => doc.text_between(from, to)?,
            _ => doc.text(),
        };
        Ok(Value::String(text))
    }

    fn get_json(props: HelperProps<'_>, _: &CommandArgs) -> Result<Value> {
        Ok(props.state.to_json())
    }

    fn get_character_count(props: HelperProps<'_>, _: &CommandArgs) -> Result<Value> {
        Ok(Value::from(props.state.doc().text().chars().count()))
    }

    fn is_active(props: HelperProps<'_>, args: &CommandArgs) -> Result<Value> {
        let mark = args.require_str("isActive", 0)?;
        Ok(Value::Bool(mark_active(props.state, mark)))
    }
}

fn state_text(state: &EditorState) -> Value {
    Value::String(state.doc().text())
}

fn state_json(state: &EditorState) -> Value {
    state.to_json()
}

impl Extension for HelpersExtension {
    fn name(&self) -> &str {
        "helpers"
    }

    fn options(&self) -> &ExtensionOptions {
        &self.options
    }

    fn capabilities(&self) -> ExtensionCapability {
        ExtensionCapability::HELPERS | ExtensionCapability::LIFECYCLE
    }

    fn create_helpers(&self) -> HelperTable {
        HelperTable::new()
            .with("isSelectionEmpty", Self::is_selection_empty)
            .with("getText", Self::get_text)
            .with("getJSON", Self::get_json)
            .with("getCharacterCount", Self::get_character_count)
            .with("isActive", Self::is_active)
    }

    fn on_create(&mut self, store: &ExtensionStore) -> Result<Option<Disposer>> {
        store.set_string_handler(DEFAULT_STRING_HANDLER, StringHandler::plain_text())?;
        store.set_manager_getter("text", state_text)?;
        store.set_manager_getter("json", state_json)?;
        debug!("registered builtin getters and string handler");
        Ok(None)
    }

    fn clone_with_options(&self, options: ExtensionOptions) -> Box<dyn Extension> {
        Box::new(Self { options })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contributes_helpers() {
        let names: Vec<String> = HelpersExtension::new()
            .create_helpers()
            .names()
            .map(str::to_owned)
            .collect();
        assert_eq!(
            names,
            vec![
                "isSelectionEmpty",
                "getText",
                "getJSON",
                "getCharacterCount",
                "isActive"
            ]
        );
    }
}
