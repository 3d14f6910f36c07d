use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use verso_model::{Schema, Selection};
use verso_view::{DecoAttrs, Decoration, DecorationSet, EditorProps, EditorState, EditorView, StateConfig, ViewConfig};

fn large_state(paragraphs: usize) -> EditorState {
    let schema = Arc::new(Schema::basic());
    let texts: Vec<String> = (0..paragraphs)
        .map(|i| format!("Paragraph {i} with a little text to lay out"))
        .collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let doc = schema.doc_of_paragraphs(&refs).unwrap();
    EditorState::create(StateConfig::new(schema, doc))
}

fn mount_large_document(c: &mut Criterion) {
    let state = large_state(500);

    c.bench_function("mount_500_paragraphs", |b| {
        b.iter(|| EditorView::headless(ViewConfig::new(black_box(state.clone()))))
    });
}

fn single_text_edit(c: &mut Criterion) {
    let mut view = EditorView::headless(ViewConfig::new(large_state(500)));
    let mut tr = view.state().tr();
    tr.set_selection(Selection::Text { anchor: 1, head: 1 });
    view.dispatch(tr).unwrap();

    c.bench_function("single_text_edit", |b| {
        b.iter(|| {
            let mut tr = view.state().tr();
            tr.insert_text(black_box("x")).unwrap();
            view.dispatch(tr).unwrap()
        })
    });
}

fn idempotent_apply(c: &mut Criterion) {
    let props = EditorProps::new().with_decorations(|state: &EditorState| {
        let decos = (0..50)
            .map(|i| Decoration::inline(i * 40 + 2, i * 40 + 8, DecoAttrs::class("hl")))
            .collect();
        DecorationSet::create(state.doc(), decos)
    });
    let mut view = EditorView::headless(ViewConfig::new(large_state(500)).with_props(props));

    c.bench_function("idempotent_apply", |b| {
        b.iter(|| {
            let state = view.state().clone();
            view.apply(black_box(state), false)
        })
    });
}

criterion_group!(benches, mount_large_document, single_text_edit, idempotent_apply);
criterion_main!(benches);
