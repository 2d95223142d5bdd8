//! Core editing commands every manager provides

use crate::commands::{
    add_placeholder, command, force_update_transaction, CommandArgs, CommandDecl,
    CommandFunction, CommandOptions, CommandProps, CommandTable, DelayedCommand, DelayedValue,
    PlaceholderId, UpdatableViewProp,
};
use crate::core::{EditorError, Priority, Result};
use crate::extensions::{Extension, ExtensionCapability, ExtensionOptions};
use quill_model::{Mark, PrimitiveSelection, Selection};
use serde::Deserialize;
use serde_json::Value;
use std::cell::Cell;
use std::rc::Rc;
use tracing::warn;

/// Explicit `from`/`to` argument; missing ends fall back to the selection
#[derive(Debug, Clone, Copy, Default, Deserialize)]
struct RangeArg {
    from: Option<usize>,
    to: Option<usize>,
}

impl RangeArg {
    fn read(args: &CommandArgs, command: &str, index: usize) -> Result<Option<Self>> {
        match args.value(index) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => args.decode(command, index).map(Some),
        }
    }

    fn resolve(self, selection: Selection) -> (usize, usize) {
        let from = self.from.unwrap_or_else(|| selection.from());
        let to = self.to.unwrap_or(from).max(from);
        (from, to)
    }
}

/// Range given as argument `index`, else the current selection
fn target_range(props: &CommandProps<'_>, range: Option<RangeArg>) -> Result<(usize, usize)> {
    let selection = props.tr.read(|tr| tr.selection())?;
    Ok(match range {
        Some(range) => range.resolve(selection),
        None => (selection.from(), selection.to()),
    })
}

/// Builtin commands
///
/// Runs at `HIGHEST` priority so its commands are registered first.
#[derive(Debug, Clone, Default)]
pub struct CommandsExtension {
    options: ExtensionOptions,
}

impl CommandsExtension {
    pub fn new() -> Self {
        Self::default()
    }

    fn custom_dispatch(args: &CommandArgs) -> Result<CommandFunction> {
        let raw = args.require_command("customDispatch", 0)?.clone();
        Ok(command(move |props| raw(props)))
    }

    fn custom(args: &CommandArgs) -> Result<CommandFunction> {
        let tr = args.require_transaction("custom", 0)?.clone();
        Ok(command(move |props| {
            if props.can_dispatch() {
                props.store.set_custom_transaction(tr)?;
            }
            Ok(true)
        }))
    }

    fn restore(_: &CommandArgs) -> Result<CommandFunction> {
        Ok(command(|props| {
            if props.can_dispatch() {
                props.store.restore_transaction()?;
            }
            Ok(true)
        }))
    }

    fn insert_text(args: &CommandArgs) -> Result<CommandFunction> {
        if let Some(delayed) = args.delayed(0) {
            return Ok(Self::insert_delayed_text(delayed.clone()));
        }

        let text = args.require_str("insertText", 0)?.to_string();
        let range = RangeArg::read(args, "insertText", 1)?;
        Ok(command(move |props| {
            match range {
                Some(range) => {
                    let (from, to) = target_range(&props, Some(range))?;
                    props.tr.edit(|tr| tr.insert_text_at(&text, from, to))?;
                }
                None => props.tr.edit(|tr| tr.insert_text(&text))?,
            }
            props.commit()
        }))
    }

    /// Insert a value once it resolves
    ///
    /// The selection at call time becomes a placeholder that follows every
    /// later edit; the value replaces whatever the placeholder covers then.
    fn insert_delayed_text(delayed: DelayedValue) -> CommandFunction {
        let id: Rc<Cell<Option<PlaceholderId>>> = Rc::default();
        let recorded = id.clone();
        let cleared = id.clone();

        DelayedCommand::new(delayed)
            .immediate(move |props| {
                if !props.can_dispatch() {
                    return Ok(true);
                }
                let placeholder = props.store.next_placeholder_id()?;
                props.tr.update(|tr| {
                    add_placeholder(tr, placeholder);
                    Ok(())
                })?;
                recorded.set(Some(placeholder));
                props.commit()
            })
            .on_done(move |props, value| {
                let Some(placeholder) = id.get() else {
                    return Ok(false);
                };
                let Some((from, to)) = props.store.remove_placeholder(placeholder)? else {
                    warn!(%placeholder, "placeholder removed before the value arrived");
                    return Ok(false);
                };
                let text = match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                props.tr.update(|tr| {
                    let size = tr.doc().content_size();
                    let from = from.min(size);
                    tr.insert_text_at(&text, from, to.clamp(from, size))?;
                    Ok(())
                })?;
                props.commit()
            })
            .on_fail(move |props| {
                if let Some(placeholder) = cleared.get() {
                    props.store.remove_placeholder(placeholder)?;
                }
                Ok(false)
            })
            .generate()
    }

    fn select_text(args: &CommandArgs) -> Result<CommandFunction> {
        let selection: PrimitiveSelection = args.decode("selectText", 0)?;
        Ok(command(move |props| {
            props.tr.update(|tr| {
                let resolved = selection.resolve(tr.doc())?;
                tr.set_selection(resolved)?;
                Ok(())
            })?;
            props.commit()
        }))
    }

    fn delete(args: &CommandArgs) -> Result<CommandFunction> {
        let range = RangeArg::read(args, "delete", 0)?;
        Ok(command(move |props| {
            let (from, to) = target_range(&props, range)?;
            if from == to {
                return Ok(false);
            }
            props.tr.edit(|tr| tr.delete(from, to))?;
            props.commit()
        }))
    }

    /// Dispatch without changes; `action` runs first when dispatching
    fn empty_update(args: &CommandArgs) -> Result<CommandFunction> {
        let action = args.callback(0).cloned();
        Ok(command(move |props| {
            if props.can_dispatch() {
                if let Some(action) = &action {
                    action();
                }
            }
            props.commit()
        }))
    }

    fn force_update(args: &CommandArgs) -> Result<CommandFunction> {
        let updates: Vec<UpdatableViewProp> = match args.value(0) {
            Some(_) => args.decode("forceUpdate", 0)?,
            None => vec![UpdatableViewProp::Attributes, UpdatableViewProp::Editable],
        };
        Ok(command(move |props| {
            props.tr.update(|tr| {
                force_update_transaction(tr, &updates);
                Ok(())
            })?;
            props.commit()
        }))
    }

    fn update_doc_attributes(args: &CommandArgs) -> Result<CommandFunction> {
        let Value::Object(attributes) = args.require_value("updateDocAttributes", 0)?.clone() else {
            return Err(EditorError::invalid_arguments(
                "updateDocAttributes",
                "argument 0 must be an object",
            ));
        };
        Ok(command(move |props| {
            props.tr.update(|tr| {
                for (key, value) in &attributes {
                    tr.set_doc_attribute(key, value.clone())?;
                }
                Ok(())
            })?;
            props.commit()
        }))
    }

    fn empty_selection(_: &CommandArgs) -> Result<CommandFunction> {
        Ok(command(|props| {
            let selection = props.tr.read(|tr| tr.selection())?;
            if selection.empty() {
                return Ok(false);
            }
            props
                .tr
                .edit(|tr| tr.set_selection(Selection::cursor(selection.anchor)))?;
            props.commit()
        }))
    }

    fn insert_new_line(_: &CommandArgs) -> Result<CommandFunction> {
        Ok(command(|props| {
            props.tr.edit(|tr| tr.insert_text("\n"))?;
            props.commit()
        }))
    }

    fn add_mark(args: &CommandArgs) -> Result<CommandFunction> {
        let name = args.require_str("addMark", 0)?.to_string();
        let mut mark = Mark::new(name);
        if let Some(Value::Object(attrs)) = args.value(1) {
            for (key, value) in attrs {
                mark = mark.with_attr(key.as_str(), value.clone());
            }
        }
        let range = RangeArg::read(args, "addMark", 2)?;

        Ok(command(move |props| {
            let (from, to) = target_range(&props, range)?;
            if from == to {
                return Ok(false);
            }
            props.tr.edit(|tr| tr.add_mark(from, to, mark))?;
            props.commit()
        }))
    }

    fn remove_mark(args: &CommandArgs) -> Result<CommandFunction> {
        let name = args.require_str("removeMark", 0)?.to_string();
        let range = RangeArg::read(args, "removeMark", 1)?;

        Ok(command(move |props| {
            let (from, to) = target_range(&props, range)?;
            if from == to {
                return Ok(false);
            }
            props.tr.edit(|tr| tr.remove_mark(from, to, &name))?;
            props.commit()
        }))
    }

    fn focus(args: &CommandArgs) -> Result<CommandFunction> {
        let position: Option<PrimitiveSelection> = match args.value(0) {
            None | Some(Value::Null) => None,
            Some(_) => Some(args.decode("focus", 0)?),
        };
        Ok(command(move |props| {
            if props.view.has_focus() && position.is_none() {
                return Ok(false);
            }
            let Some(position) = position else {
                if props.can_dispatch() {
                    props.view.focus();
                }
                return Ok(true);
            };

            props.tr.update(|tr| {
                let resolved = position.resolve(tr.doc())?;
                tr.set_selection(resolved)?.scroll_into_view();
                Ok(())
            })?;
            if props.can_dispatch() {
                props.view.focus();
            }
            props.commit()
        }))
    }

    fn blur(_: &CommandArgs) -> Result<CommandFunction> {
        Ok(command(|props| {
            if !props.view.has_focus() {
                return Ok(false);
            }
            if props.can_dispatch() {
                props.view.blur();
            }
            Ok(true)
        }))
    }
}

impl Extension for CommandsExtension {
    fn name(&self) -> &str {
        "commands"
    }

    fn default_priority(&self) -> Priority {
        Priority::HIGHEST
    }

    fn options(&self) -> &ExtensionOptions {
        &self.options
    }

    fn options_mut(&mut self) -> Option<&mut ExtensionOptions> {
        Some(&mut self.options)
    }

    fn capabilities(&self) -> ExtensionCapability {
        ExtensionCapability::COMMANDS
    }

    fn create_commands(&self) -> CommandTable {
        CommandTable::new()
            .with("customDispatch", CommandDecl::new(Self::custom_dispatch))
            .with("custom", CommandDecl::new(Self::custom))
            .with("restore", CommandDecl::new(Self::restore))
            .with("insertText", CommandDecl::new(Self::insert_text))
            .with("selectText", CommandDecl::new(Self::select_text))
            .with("delete", CommandDecl::new(Self::delete))
            .with("emptyUpdate", CommandDecl::new(Self::empty_update))
            .with("forceUpdate", CommandDecl::new(Self::force_update))
            .with(
                "updateDocAttributes",
                CommandDecl::new(Self::update_doc_attributes),
            )
            .with("emptySelection", CommandDecl::new(Self::empty_selection))
            .with("insertNewLine", CommandDecl::new(Self::insert_new_line))
            .with("addMark", CommandDecl::new(Self::add_mark))
            .with("removeMark", CommandDecl::new(Self::remove_mark))
    }

    fn decorated_commands(&self) -> CommandTable {
        CommandTable::new()
            .with(
                "focus",
                CommandDecl::new(Self::focus).with_options(
                    CommandOptions::default()
                        .with_label("Focus")
                        .with_description("Focus the editor, optionally moving the selection"),
                ),
            )
            .with(
                "blur",
                CommandDecl::new(Self::blur).with_options(
                    CommandOptions::default()
                        .with_label("Blur")
                        .with_description("Remove focus from the editor"),
                ),
            )
    }

    fn clone_with_options(&self, options: ExtensionOptions) -> Box<dyn Extension> {
        Box::new(Self { options })
    }
}
