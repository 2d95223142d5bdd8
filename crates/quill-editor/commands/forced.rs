//! Forced view property updates carried in transaction meta

use super::{commands_meta, set_commands_meta};
use quill_model::Transaction;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const FORCED_UPDATES: &str = "forcedUpdates";

/// View properties a transaction can force the view to re-read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdatableViewProp {
    Attributes,
    Editable,
}

/// Record view properties to refresh once the transaction is dispatched
///
/// Repeated calls accumulate; each property is stored once.
pub fn force_update_transaction<'t>(
    tr: &'t mut Transaction,
    updates: &[UpdatableViewProp],
) -> &'t mut Transaction {
    let mut forced = get_forced_updates(tr);
    for update in updates {
        if !forced.contains(update) {
            forced.push(*update);
        }
    }

    let value = serde_json::to_value(&forced).unwrap_or(Value::Null);
    set_commands_meta(tr, FORCED_UPDATES, value)
}

/// View properties recorded with [`force_update_transaction`]
///
/// Unknown entries are ignored.
pub fn get_forced_updates(tr: &Transaction) -> Vec<UpdatableViewProp> {
    commands_meta(tr, FORCED_UPDATES)
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_model::{EditorState, Schema, StateConfig};
    use serde_json::json;
    use std::sync::Arc;

    fn transaction() -> Transaction {
        let schema = Arc::new(Schema::builder().build().unwrap());
        EditorState::create(StateConfig::new(schema)).unwrap().tr()
    }

    #[test]
    fn updates_accumulate_without_duplicates() {
        let mut tr = transaction();
        force_update_transaction(&mut tr, &[UpdatableViewProp::Editable]);
        force_update_transaction(
            &mut tr,
            &[UpdatableViewProp::Attributes, UpdatableViewProp::Editable],
        );

        assert_eq!(
            get_forced_updates(&tr),
            vec![UpdatableViewProp::Editable, UpdatableViewProp::Attributes]
        );
        assert_eq!(
            tr.get_meta("commands"),
            Some(&json!({ "forcedUpdates": ["editable", "attributes"] }))
        );
    }

    #[test]
    fn other_command_meta_is_kept() {
        let mut tr = transaction();
        tr.set_meta("commands", json!({ "origin": "toolbar" }));
        force_update_transaction(&mut tr, &[UpdatableViewProp::Attributes]);
        assert_eq!(
            tr.get_meta("commands"),
            Some(&json!({ "origin": "toolbar", "forcedUpdates": ["attributes"] }))
        );
    }

    #[test]
    fn unknown_entries_are_skipped() {
        let mut tr = transaction();
        tr.set_meta("commands", json!({ "forcedUpdates": ["editable", "color"] }));
        assert_eq!(get_forced_updates(&tr), vec![UpdatableViewProp::Editable]);
    }

    #[test]
    fn no_meta_means_no_updates() {
        assert!(get_forced_updates(&transaction()).is_empty());
    }
}
