use fontara::core::css::InlineStyle;
use fontara::core::dom::*;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn test_html_document_structure() {
    let doc = Document::create_html_document(Some("https://example.com/")).unwrap();
    let html = doc.document_element().unwrap();
    assert_eq!(doc.get_parent(html), Some(doc.root()));
    assert_eq!(doc.get_parent(doc.head().unwrap()), Some(html));
    assert_eq!(doc.get_parent(doc.body().unwrap()), Some(html));
    assert_eq!(doc.get_url().as_deref(), Some("https://example.com/"));
}

#[test]
fn test_detached_nodes_are_not_connected() {
    let doc = Document::create_html_document(None).unwrap();
    let body = doc.body().unwrap();
    let outer = doc.create_element("div");
    let inner = doc.create_element("span");
    doc.append_child(outer, inner).unwrap();
    assert!(!doc.is_connected(inner));

    doc.append_child(body, outer).unwrap();
    assert!(doc.is_connected(inner));

    doc.remove_node(outer).unwrap();
    assert!(!doc.is_connected(inner));
    assert!(doc.get_node(inner).is_some());
}

#[test]
fn test_element_lookup_ignores_detached_ids() {
    let doc = Document::create_html_document(None).unwrap();
    let body = doc.body().unwrap();
    let detached = doc.create_element("div");
    doc.set_attribute(detached, "id", "target").unwrap();
    assert_eq!(doc.get_element_by_id("target"), None);

    let attached = doc.create_element("div");
    doc.set_attribute(attached, "id", "target").unwrap();
    doc.append_child(body, attached).unwrap();
    assert_eq!(doc.get_element_by_id("target"), Some(attached));
}

#[test]
fn test_observer_receives_child_list_batches_only() {
    let doc = Document::create_html_document(None).unwrap();
    let body = doc.body().unwrap();
    let batches = Arc::new(AtomicUsize::new(0));
    let added = Arc::new(AtomicUsize::new(0));

    let callback: MutationCallback = {
        let batches = batches.clone();
        let added = added.clone();
        Arc::new(move |records: &[MutationRecord]| {
            batches.fetch_add(1, Ordering::SeqCst);
            for record in records {
                assert_eq!(record.mutation_type, MutationType::ChildList);
                added.fetch_add(record.added_nodes.len(), Ordering::SeqCst);
            }
        })
    };
    let observer = doc
        .add_mutation_observer(body, ObserverOptions::child_list_subtree(), callback)
        .unwrap();

    let list = doc.create_element("ul");
    doc.append_child(body, list).unwrap();
    for _ in 0..4 {
        let item = doc.create_element("li");
        doc.append_child(list, item).unwrap();
        doc.set_attribute(item, "class", "row").unwrap();
    }
    doc.set_text_content(list, "ignored").unwrap();

    assert_eq!(doc.deliver_mutation_records(), 5);
    assert_eq!(batches.load(Ordering::SeqCst), 1);
    assert_eq!(added.load(Ordering::SeqCst), 5);

    assert!(doc.disconnect_observer(observer));
    doc.append_child(body, doc.create_element("p")).unwrap();
    assert_eq!(doc.deliver_mutation_records(), 0);
}

#[test]
fn test_observer_scope_without_subtree() {
    let doc = Document::create_html_document(None).unwrap();
    let body = doc.body().unwrap();
    let section = doc.create_element("section");
    doc.append_child(body, section).unwrap();

    let options = ObserverOptions {
        child_list: true,
        ..ObserverOptions::default()
    };
    let observer = doc
        .add_mutation_observer(body, options, Arc::new(|_: &[MutationRecord]| {}))
        .unwrap();
    doc.append_child(section, doc.create_element("p")).unwrap();
    doc.append_child(body, doc.create_element("p")).unwrap();

    let records = doc.take_records(observer);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].target, body);
}

#[test]
fn test_tree_walker_covers_every_element() {
    let doc = Document::create_html_document(None).unwrap();
    let body = doc.body().unwrap();
    let mut expected = Vec::new();
    let mut parent = body;
    for depth in 0..5 {
        let node = doc.create_element("div");
        doc.append_child(parent, node).unwrap();
        expected.push(node);
        let sibling = doc.create_element("span");
        doc.append_child(parent, sibling).unwrap();
        doc.append_child(sibling, doc.create_comment(&format!("level {depth}")))
            .unwrap();
        parent = node;
    }

    let mut walker = TreeWalker::elements(body);
    let mut seen = Vec::new();
    while let Some(node) = walker.next_node(&doc) {
        seen.push(node);
    }
    assert_eq!(seen.len(), 10);
    assert!(expected.iter().all(|node| seen.contains(node)));
    assert_eq!(walker.get_root(), body);
}

#[test]
fn test_inline_style_round_trip_keeps_order_and_priority() {
    let style = InlineStyle::parse("color: red; font-family: \"A; B\", serif !important;;broken");
    assert_eq!(style.len(), 2);
    assert_eq!(style.effective_value("font-family"), Some("\"A; B\", serif"));
    assert_eq!(
        style.css_text(),
        "color: red; font-family: \"A; B\", serif !important;"
    );
}

#[test]
fn test_host_trait_reports_layout_boxes() {
    let doc = Document::create_html_document(None).unwrap();
    let body = doc.body().unwrap();
    let shown = doc.create_element("div");
    let hidden = doc.create_element("div");
    doc.append_child(body, shown).unwrap();
    doc.append_child(body, hidden).unwrap();
    doc.set_layout(shown, Some(LayoutData::new(0.0, 0.0, 10.0, 10.0)))
        .unwrap();

    let host: &dyn DocumentHost = &doc;
    assert!(host.has_layout_box(shown));
    assert!(!host.has_layout_box(hidden));

    doc.remove_node(shown).unwrap();
    assert!(!host.has_layout_box(shown));
}
