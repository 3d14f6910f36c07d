//! Integration tests for the model crate

use verso_model::{Attrs, Node, Schema, Selection, Step, Transform};

fn marked_doc(schema: &Schema) -> Node {
    let strong = schema.mark("strong", Attrs::new()).unwrap();
    let p1 = schema
        .node(
            "paragraph",
            Attrs::new(),
            vec![
                schema.text("plain ", Vec::new()).unwrap(),
                schema.text("bold", vec![strong]).unwrap(),
            ],
        )
        .unwrap();
    let quote = schema
        .node(
            "blockquote",
            Attrs::new(),
            vec![schema
                .node("paragraph", Attrs::new(), vec![schema.text("quoted", Vec::new()).unwrap()])
                .unwrap()],
        )
        .unwrap();
    schema.node("doc", Attrs::new(), vec![p1, quote]).unwrap()
}

#[test]
fn test_edit_preserves_untouched_subtrees() {
    let schema = Schema::basic();
    let doc = marked_doc(&schema);

    let mut tr = Transform::new(doc.clone());
    tr.step(Step::ReplaceText {
        from: 1,
        to: 1,
        text: "very ".to_string(),
        marks: None,
    })
    .unwrap();

    let after = tr.doc();
    assert_eq!(after.child(0).unwrap().text_content(), "very plain bold");
    assert!(Node::ptr_eq(after.child(1).unwrap(), doc.child(1).unwrap()));
    assert!(!Node::ptr_eq(after.child(0).unwrap(), doc.child(0).unwrap()));
    assert!(Node::ptr_eq(tr.before(), &doc));
}

#[test]
fn test_selection_follows_edit() -> anyhow::Result<()> {
    let schema = Schema::basic();
    let doc = marked_doc(&schema);
    let sel = Selection::cursor(&doc, 15)?;

    let mut tr = Transform::new(doc);
    tr.step(Step::ReplaceText {
        from: 1,
        to: 7,
        text: String::new(),
        marks: None,
    })?;

    let mapped = sel.map(tr.mapping(), tr.doc());
    assert_eq!(mapped, Selection::Text { anchor: 9, head: 9 });
    assert_eq!(tr.doc().node_at(7).map(|n| n.type_name().to_string()), Some("paragraph".to_string()));
    Ok(())
}

#[test]
fn test_json_round_trip_of_edited_document() -> anyhow::Result<()> {
    let schema = Schema::basic();
    let mut tr = Transform::new(marked_doc(&schema));
    let em = schema.mark("em", Attrs::new())?;
    tr.step(Step::AddMark { from: 1, to: 6, mark: em })?;
    tr.step(Step::SetAttr {
        pos: 0,
        name: "align".to_string(),
        value: Some("center".to_string()),
    })?;

    let json = tr.doc().to_json()?;
    assert_eq!(json["content"][0]["attrs"]["align"], "center");
    let parsed = schema.node_from_json(&json)?;
    assert_eq!(&parsed, tr.doc());
    assert_eq!(parsed.child(0).unwrap().attr("align"), Some("center"));
    Ok(())
}

#[test]
fn test_invalid_step_leaves_transform_untouched() {
    let schema = Schema::basic();
    let doc = marked_doc(&schema);
    let mut tr = Transform::new(doc.clone());
    let err = tr.step(Step::ReplaceText {
        from: 3,
        to: 14,
        text: "x".to_string(),
        marks: None,
    });
    assert!(err.is_err());
    assert!(!tr.doc_changed());
    assert!(Node::ptr_eq(tr.doc(), &doc));
}
