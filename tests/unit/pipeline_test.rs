use fontara::core::dom::*;
use fontara::pipeline::*;
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const VAR: &str = "--fontara-font";

/// Delegates to an in-memory document but refuses style reads for chosen
/// elements.
struct FlakyHost {
    doc: Document,
    broken: parking_lot::Mutex<HashSet<NodeId>>,
}

impl DocumentHost for FlakyHost {
    fn url(&self) -> Option<String> {
        self.doc.get_url()
    }
    fn root(&self) -> NodeId {
        self.doc.root()
    }
    fn head(&self) -> Option<NodeId> {
        self.doc.head()
    }
    fn body(&self) -> Option<NodeId> {
        self.doc.body()
    }
    fn is_element(&self, node: NodeId) -> bool {
        self.doc.is_element(node)
    }
    fn is_connected(&self, node: NodeId) -> bool {
        self.doc.is_connected(node)
    }
    fn tag_name(&self, node: NodeId) -> Option<String> {
        self.doc.tag_name(node)
    }
    fn class_list(&self, node: NodeId) -> Vec<String> {
        self.doc.class_list(node)
    }
    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.doc.get_attribute(node, name)
    }
    fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DocumentError> {
        self.doc.set_attribute(node, name, value)
    }
    fn remove_attribute(&self, node: NodeId, name: &str) -> Result<(), DocumentError> {
        self.doc.remove_attribute(node, name).map(|_| ())
    }
    fn computed_font_family(&self, node: NodeId) -> Result<String, DocumentError> {
        if self.broken.lock().contains(&node) {
            return Err(DocumentError::Style("style engine unavailable".to_string()));
        }
        self.doc.computed_font_family(node)
    }
    fn has_layout_box(&self, node: NodeId) -> bool {
        DocumentHost::has_layout_box(&self.doc, node)
    }
    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.doc.get_parent(node)
    }
    fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.doc.first_child(node)
    }
    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.doc.next_sibling(node)
    }
    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.doc.get_element_by_id(id)
    }
    fn append_style_element(&self, marker_id: &str, css: &str) -> Result<NodeId, DocumentError> {
        DocumentHost::append_style_element(&self.doc, marker_id, css)
    }
    fn text_content(&self, node: NodeId) -> Option<String> {
        self.doc.text_content(node)
    }
    fn set_text_content(&self, node: NodeId, text: &str) -> Result<(), DocumentError> {
        self.doc.set_text_content(node, text)
    }
    fn remove_node(&self, node: NodeId) -> Result<(), DocumentError> {
        self.doc.remove_node(node)
    }
    fn observe(
        &self,
        root: NodeId,
        options: ObserverOptions,
        callback: MutationCallback,
    ) -> Result<ObserverId, DocumentError> {
        self.doc.add_mutation_observer(root, options, callback)
    }
    fn disconnect(&self, observer: ObserverId) {
        self.doc.disconnect_observer(observer);
    }
}

struct Pipeline<H: DocumentHost + 'static> {
    state: SharedState,
    scheduler: Arc<BatchScheduler<H>>,
    enumerator: TreeEnumerator<H>,
    watcher: Arc<MutationWatcher<H>>,
}

fn pipeline<H: DocumentHost + 'static>(host: &Arc<H>) -> Pipeline<H> {
    let state = shared_state();
    let scheduler = Arc::new(BatchScheduler::new(
        host.clone(),
        state.clone(),
        ElementClassifier::new(VAR),
        50,
        SchedulePrimitive::Idle {
            timeout: Duration::from_millis(100),
        },
    ));
    let enumerator = TreeEnumerator::new(host.clone(), state.clone(), scheduler.clone(), 50);
    let watcher = Arc::new(MutationWatcher::new(
        host.clone(),
        state.clone(),
        scheduler.clone(),
        Duration::from_millis(150),
        100,
    ));
    Pipeline {
        state,
        scheduler,
        enumerator,
        watcher,
    }
}

fn populate(doc: &Document, parent: NodeId, count: usize) -> Vec<NodeId> {
    (0..count)
        .map(|i| {
            let node = doc.create_element(if i % 2 == 0 { "p" } else { "div" });
            doc.append_child(parent, node).unwrap();
            node
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_initial_walk_restyles_every_eligible_element() {
    let doc = Arc::new(Document::create_html_document(Some("https://example.com")).unwrap());
    let body = doc.body().unwrap();
    let section = doc.create_element("section");
    doc.append_child(body, section).unwrap();
    let paragraphs = populate(&doc, section, 230);
    let script = doc.create_element("script");
    let icon = doc.create_element("i");
    doc.set_attribute(icon, "class", "fa-icon").unwrap();
    doc.append_child(body, script).unwrap();
    doc.append_child(body, icon).unwrap();

    let p = pipeline(&doc);
    let outcome = p.enumerator.enumerate(Some(body)).await;
    assert_eq!(outcome, EnumerationOutcome::Completed { visited: 233 });

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(p.state.lock().queue.is_empty());
    assert!(paragraphs
        .iter()
        .all(|&node| doc.has_attribute(node, PROCESSED_ATTRIBUTE)));
    assert!(doc.has_attribute(section, PROCESSED_ATTRIBUTE));
    assert_eq!(doc.get_attribute(script, "style"), None);
    assert_eq!(doc.get_attribute(icon, "style"), None);
    assert!(!doc.has_attribute(icon, PROCESSED_ATTRIBUTE));
}

#[tokio::test(start_paused = true)]
async fn test_processing_twice_changes_nothing() {
    let doc = Arc::new(Document::create_html_document(None).unwrap());
    let body = doc.body().unwrap();
    let nodes = populate(&doc, body, 20);
    doc.set_attribute(nodes[0], "style", "color: green").unwrap();

    let p = pipeline(&doc);
    p.enumerator.enumerate(Some(body)).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    let first: Vec<Option<String>> = nodes
        .iter()
        .map(|&node| doc.get_attribute(node, "style"))
        .collect();

    p.state.lock().queue.extend(nodes.iter().copied());
    p.scheduler.run_once();
    let second: Vec<Option<String>> = nodes
        .iter()
        .map(|&node| doc.get_attribute(node, "style"))
        .collect();
    assert_eq!(first, second);
    assert_eq!(
        first[0].as_deref(),
        Some("font-family: var(--fontara-font), serif !important; color: green;")
    );
}

#[tokio::test(start_paused = true)]
async fn test_enqueue_is_deduplicated_across_sources() {
    let doc = Arc::new(Document::create_html_document(None).unwrap());
    let body = doc.body().unwrap();
    let p = pipeline(&doc);
    p.watcher.start(body).unwrap();

    let node = doc.create_element("article");
    doc.append_child(body, node).unwrap();
    doc.deliver_mutation_records();
    p.enumerator.enumerate(Some(body)).await;
    p.state.lock().queue.add(node);

    assert_eq!(p.state.lock().queue.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_large_off_screen_insertions_are_not_queued() {
    let doc = Arc::new(Document::create_html_document(None).unwrap());
    let body = doc.body().unwrap();
    let p = pipeline(&doc);
    p.watcher.start(body).unwrap();

    let container = doc.create_element("div");
    doc.append_child(body, container).unwrap();
    doc.deliver_mutation_records();
    assert_eq!(p.state.lock().queue.len(), 1);
    p.scheduler.run_once();

    let rows = populate(&doc, container, 150);
    assert_eq!(doc.deliver_mutation_records(), 150);
    assert!(p.state.lock().queue.is_empty());
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(rows
        .iter()
        .all(|&row| !doc.has_attribute(row, PROCESSED_ATTRIBUTE)));
}

#[tokio::test(start_paused = true)]
async fn test_hidden_page_pauses_and_resumes_with_queue_intact() {
    let doc = Arc::new(Document::create_html_document(None).unwrap());
    let body = doc.body().unwrap();
    let nodes = populate(&doc, body, 120);
    let p = pipeline(&doc);

    p.enumerator.enumerate(Some(body)).await;
    p.state.lock().activation.is_page_visible = false;
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(p.state.lock().queue.len(), 120);
    assert_eq!(p.scheduler.run_once(), SliceOutcome::Skipped);

    p.state.lock().activation.is_page_visible = true;
    assert!(matches!(
        p.scheduler.run_once(),
        SliceOutcome::Drained { processed: 50, .. }
    ));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(p.state.lock().queue.is_empty());
    assert!(nodes
        .iter()
        .all(|&node| doc.has_attribute(node, PROCESSED_ATTRIBUTE)));
}

#[tokio::test(start_paused = true)]
async fn test_style_failures_skip_only_the_failing_element() {
    let doc = Document::create_html_document(None).unwrap();
    let body = doc.body().unwrap();
    let nodes = populate(&doc, body, 10);
    let host = Arc::new(FlakyHost {
        doc,
        broken: parking_lot::Mutex::new(HashSet::from([nodes[3], nodes[7]])),
    });

    let p = pipeline(&host);
    p.state.lock().queue.extend(nodes.iter().copied());
    match p.scheduler.run_once() {
        SliceOutcome::Drained {
            processed,
            restyled,
            ..
        } => assert_eq!((processed, restyled), (10, 8)),
        other => panic!("unexpected outcome {other:?}"),
    }
    for (i, &node) in nodes.iter().enumerate() {
        let broken = i == 3 || i == 7;
        assert_eq!(host.doc.has_attribute(node, PROCESSED_ATTRIBUTE), !broken);
    }
    assert!(!p.state.lock().activation.is_processing);
}

#[tokio::test(start_paused = true)]
async fn test_watcher_stop_discards_pending_work() {
    let doc = Arc::new(Document::create_html_document(None).unwrap());
    let body = doc.body().unwrap();
    let p = pipeline(&doc);
    p.watcher.start(body).unwrap();

    let late = populate(&doc, body, 5);
    doc.deliver_mutation_records();
    assert_eq!(p.state.lock().queue.len(), 5);

    p.watcher.stop();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(p.state.lock().queue.is_empty());
    assert!(late
        .iter()
        .all(|&node| !doc.has_attribute(node, PROCESSED_ATTRIBUTE)));
}
