//! Integration tests for transactions, step replay and JSON content

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use quill_model::{
    create_document_node, Content, CreateDocumentOptions, Doc, EditorState, InvalidContentHandler,
    Mark, MarkSpec, PrimitiveSelection, Schema, StateConfig, Step,
};
use serde_json::json;
use std::sync::Arc;

fn schema() -> Arc<Schema> {
    Arc::new(
        Schema::builder()
            .mark(MarkSpec::new("bold"))
            .mark(MarkSpec::new("italic"))
            .build()
            .unwrap(),
    )
}

fn state(text: &str) -> EditorState {
    EditorState::create(
        StateConfig::new(schema())
            .with_doc(Doc::from_text(text))
            .with_selection(PrimitiveSelection::End),
    )
    .unwrap()
}

#[test]
fn steps_replay_onto_newer_snapshot() {
    let original = state("hello");
    let mut pending = original.tr();
    pending.insert_text(" world").unwrap();
    pending.add_mark(0, 5, Mark::new("bold")).unwrap();

    // An unrelated edit lands first
    let mut other = original.tr();
    other.set_doc_attribute("lang", json!("en")).unwrap();
    let newer = original.apply(other).unwrap();

    let mut replay = newer.tr();
    for step in pending.steps() {
        replay.step(step.clone()).unwrap();
    }
    let result = newer.apply(replay).unwrap();

    assert_eq!(result.doc().text(), "hello world");
    assert!(result.doc().has_mark(0, 5, "bold"));
    assert_eq!(result.doc().attr("lang"), Some(&json!("en")));
}

#[test]
fn state_json_round_trip_through_content() {
    let mut tr = state("quill").tr();
    tr.add_mark(0, 2, Mark::new("italic")).unwrap();
    let doc = tr.doc().clone();

    let schema = schema();
    let read = create_document_node(
        Content::Json(doc.to_json()),
        CreateDocumentOptions::new(&schema),
    )
    .unwrap();
    assert_eq!(read, doc);
}

#[test]
fn invalid_content_is_repaired_on_request() {
    let schema = schema();
    let handler = InvalidContentHandler::remove_invalid();
    let doc = create_document_node(
        Content::Json(json!({
            "type": "doc",
            "content": [{ "type": "text", "text": "x", "marks": [{ "type": "sparkle" }] }]
        })),
        CreateDocumentOptions::new(&schema).with_on_error(&handler),
    )
    .unwrap();
    assert_eq!(doc.text(), "x");
    assert!(doc.marks().is_empty());
}

#[test]
fn steps_serialize_for_collaboration() {
    let mut tr = state("").tr();
    tr.insert_text("hi").unwrap();
    let json = serde_json::to_value(tr.steps()).unwrap();
    assert_eq!(
        json,
        json!([{ "stepType": "replace", "from": 0, "to": 0, "text": "hi" }])
    );
    let steps: Vec<Step> = serde_json::from_value(json).unwrap();
    assert_eq!(steps, tr.steps());
}

proptest! {
    #[test]
    fn insertions_grow_doc_by_inserted_length(
        base in "[a-z]{0,20}",
        insert in "[a-z ]{0,10}",
        offset in 0usize..=20,
    ) {
        let state = state(&base);
        let pos = offset.min(base.chars().count());
        let mut tr = state.tr();
        tr.insert_text_at(&insert, pos, pos).unwrap();

        prop_assert_eq!(
            tr.doc().content_size(),
            base.chars().count() + insert.chars().count()
        );
        prop_assert_eq!(tr.before(), state.doc());
    }

    #[test]
    fn marks_never_escape_the_doc(
        base in "[a-z]{1,20}",
        from in 0usize..20,
        len in 0usize..20,
        delete_from in 0usize..20,
        delete_len in 0usize..20,
    ) {
        let size = base.chars().count();
        let from = from.min(size);
        let to = (from + len).min(size);
        let doc = Doc::from_text(&base).with_mark(from, to, Mark::new("bold")).unwrap();

        let delete_from = delete_from.min(size);
        let delete_to = (delete_from + delete_len).min(size);
        let next = doc.replace(delete_from, delete_to, "").unwrap();

        for span in next.marks() {
            prop_assert!(span.from < span.to);
            prop_assert!(span.to <= next.content_size());
        }
    }
}
