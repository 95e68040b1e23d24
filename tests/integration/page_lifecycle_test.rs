use fontara::activation::DYNAMIC_FONT_ID;
use fontara::pipeline::PROCESSED_ATTRIBUTE;
use fontara::{
    ActivationMode, Document, EventSystem, FontaraConfig, FontaraEngine, MemorySettingsStore,
    NodeId, PageEvent, SettingKey, StaticFontCatalog,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn fill(doc: &Document, count: usize) -> Vec<NodeId> {
    let body = doc.body().unwrap();
    (0..count)
        .map(|_| {
            let node = doc.create_element("span");
            doc.append_child(body, node).unwrap();
            node
        })
        .collect()
}

fn settings() -> Arc<MemorySettingsStore> {
    let store = Arc::new(MemorySettingsStore::new());
    store.set(
        SettingKey::WebsiteList,
        json!([{ "regex": "^https://news\\.example\\.org/", "url": "news.example.org" }]),
    );
    store.set(SettingKey::SelectedFont, json!("Inter"));
    store
}

fn launch(
    doc: &Arc<Document>,
    store: &Arc<MemorySettingsStore>,
    config: FontaraConfig,
) -> (
    Arc<FontaraEngine<Document>>,
    fontara::EventSender,
    tokio::task::JoinHandle<()>,
) {
    let engine = Arc::new(
        FontaraEngine::new(
            doc.clone(),
            store.clone(),
            Arc::new(StaticFontCatalog::new("@font-face{}")),
            config,
        )
        .unwrap(),
    );
    let events = EventSystem::new();
    let sender = events.sender();
    let task = tokio::spawn({
        let engine = engine.clone();
        async move { engine.run(events.into_receiver()).await }
    });
    (engine, sender, task)
}

fn processed(doc: &Document, nodes: &[NodeId]) -> usize {
    nodes
        .iter()
        .filter(|&&node| doc.has_attribute(node, PROCESSED_ATTRIBUTE))
        .count()
}

#[tokio::test(start_paused = true)]
async fn test_page_lifecycle_through_the_event_loop() {
    let doc = Arc::new(
        Document::create_html_document(Some("https://news.example.org/today")).unwrap(),
    );
    let initial = fill(&doc, 60);
    let store = settings();
    let (engine, sender, task) = launch(&doc, &store, FontaraConfig::default());

    assert!(sender.send(PageEvent::Load));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(engine.mode(), ActivationMode::ActiveGeneric);
    assert_eq!(processed(&doc, &initial), 60);

    // Hidden: new content is queued but left alone.
    assert!(sender.visibility_changed(true));
    tokio::time::sleep(Duration::from_millis(10)).await;
    let late = fill(&doc, 80);
    doc.deliver_mutation_records();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(processed(&doc, &late), 0);
    assert_eq!(engine.queue_len(), 80);
    assert!(!engine.state_snapshot().is_page_visible);

    // Visible again: the retained queue drains.
    assert!(sender.visibility_changed(false));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(processed(&doc, &late), 80);
    assert_eq!(engine.queue_len(), 0);

    // Store changes reach the loop without a page event.
    store.set(SettingKey::SelectedFont, json!("Vazirmatn"));
    tokio::time::sleep(Duration::from_millis(10)).await;
    let variable = doc.get_element_by_id(DYNAMIC_FONT_ID).unwrap();
    assert_eq!(
        doc.text_content(variable).as_deref(),
        Some(":root{--fontara-font:\"Vazirmatn\";}")
    );

    store.set(SettingKey::WebsiteList, json!([]));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(engine.mode(), ActivationMode::Inactive);
    assert_eq!(processed(&doc, &initial), 0);

    assert!(sender.send(PageEvent::Unload));
    task.await.unwrap();
    assert!(engine.is_shutdown());
    assert!(!sender.send(PageEvent::Load));
}

#[tokio::test(start_paused = true)]
async fn test_idle_events_wake_waiting_slices() {
    let doc = Arc::new(
        Document::create_html_document(Some("https://news.example.org/")).unwrap(),
    );
    let nodes = fill(&doc, 30);
    let store = settings();
    let config = FontaraConfig {
        idle_timeout_ms: 60_000,
        ..FontaraConfig::default()
    };
    let (engine, sender, _task) = launch(&doc, &store, config);

    sender.send(PageEvent::Load);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(engine.mode(), ActivationMode::ActiveGeneric);
    assert_eq!(processed(&doc, &nodes), 0);
    assert_eq!(engine.queue_len(), 30);

    sender.send(PageEvent::Idle);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(processed(&doc, &nodes), 30);
}

#[tokio::test(start_paused = true)]
async fn test_unload_keeps_applied_styles() {
    let doc = Arc::new(
        Document::create_html_document(Some("https://news.example.org/")).unwrap(),
    );
    let nodes = fill(&doc, 10);
    let store = settings();
    let config = FontaraConfig {
        idle_callbacks: false,
        ..FontaraConfig::default()
    };
    let (engine, sender, task) = launch(&doc, &store, config);

    sender.send(PageEvent::Load);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(processed(&doc, &nodes), 10);

    drop(sender);
    task.await.unwrap();
    assert!(engine.is_shutdown());
    assert_eq!(processed(&doc, &nodes), 10);
    assert_eq!(doc.observer_count(), 0);
}
