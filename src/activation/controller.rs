use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, trace, warn};

use super::{ActivationMode, StyleInjector, CUSTOM_CSS_ID};
use crate::core::dom::{DocumentHost, TreeWalker};
use crate::core::events::PageEvent;
use crate::fonts::FontCatalog;
use crate::pipeline::{
    shared_state, ActivationState, BatchScheduler, ElementClassifier, MutationWatcher,
    SharedState, SiteOverride, TreeEnumerator,
};
use crate::settings::{
    custom_font_list, selected_font, ActivationOracle, CustomFont, RuleListOracle, SettingChange,
    SettingKey, SettingsStore, SiteMatch, StoreError,
};
use crate::{FontaraConfig, Result};

/// Per-page engine: resolves whether the page is active, injects the
/// stylesheet fragments and runs the restyling pipeline.
pub struct FontaraEngine<H: ?Sized> {
    config: FontaraConfig,
    host: Arc<H>,
    store: Arc<dyn SettingsStore>,
    oracle: Arc<dyn ActivationOracle>,
    state: SharedState,
    injector: StyleInjector<H>,
    scheduler: Arc<BatchScheduler<H>>,
    enumerator: Arc<TreeEnumerator<H>>,
    watcher: Arc<MutationWatcher<H>>,
    mode: Mutex<ActivationMode>,
    enumeration: Mutex<Option<AbortHandle>>,
    apply_lock: tokio::sync::Mutex<()>,
    is_shutdown: AtomicBool,
}

impl<H: DocumentHost + ?Sized + 'static> FontaraEngine<H> {
    /// Engine whose activation follows the store's `websiteList` rules.
    pub fn new(
        host: Arc<H>,
        store: Arc<dyn SettingsStore>,
        catalog: Arc<dyn FontCatalog>,
        config: FontaraConfig,
    ) -> Result<Self> {
        let oracle: Arc<dyn ActivationOracle> = Arc::new(RuleListOracle::new(store.clone()));
        Self::with_oracle(host, store, oracle, catalog, config)
    }

    pub fn with_oracle(
        host: Arc<H>,
        store: Arc<dyn SettingsStore>,
        oracle: Arc<dyn ActivationOracle>,
        catalog: Arc<dyn FontCatalog>,
        config: FontaraConfig,
    ) -> Result<Self> {
        config.validate()?;

        let state = shared_state();
        let classifier = ElementClassifier::new(config.font_variable.clone());
        let scheduler = Arc::new(BatchScheduler::new(
            host.clone(),
            state.clone(),
            classifier,
            config.slice_size,
            config.schedule_primitive(),
        ));
        let enumerator = Arc::new(TreeEnumerator::new(
            host.clone(),
            state.clone(),
            scheduler.clone(),
            config.enumeration_chunk,
        ));
        let watcher = Arc::new(MutationWatcher::new(
            host.clone(),
            state.clone(),
            scheduler.clone(),
            config.debounce(),
            config.large_batch_threshold,
        ));
        let injector = StyleInjector::new(host.clone(), catalog, config.font_variable.clone());

        Ok(Self {
            config,
            host,
            store,
            oracle,
            state,
            injector,
            scheduler,
            enumerator,
            watcher,
            mode: Mutex::new(ActivationMode::Inactive),
            enumeration: Mutex::new(None),
            apply_lock: tokio::sync::Mutex::new(()),
            is_shutdown: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &FontaraConfig {
        &self.config
    }

    pub fn mode(&self) -> ActivationMode {
        *self.mode.lock()
    }

    pub fn state_snapshot(&self) -> ActivationState {
        self.state.lock().activation.clone()
    }

    pub fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::SeqCst)
    }

    /// Re-evaluates the page against the current settings and moves to the
    /// matching mode. Concurrent calls are serialized.
    pub async fn apply_if_active(&self) -> Result<ActivationMode> {
        let _serialized = self.apply_lock.lock().await;
        if self.is_shutdown() {
            return Ok(self.mode());
        }

        let url = self.host.url().unwrap_or_default();
        let site = self.oracle.resolve(&url).await?;
        if !site.active {
            debug!("{} does not match any enabled rule", url);
            self.deactivate();
            return Ok(ActivationMode::Inactive);
        }

        let font = selected_font(&*self.store).await?;
        let fonts = custom_font_list(&*self.store).await?;
        {
            let mut state = self.state.lock();
            state.activation.is_active = true;
            state.activation.selected_font = font.clone();
            state.activation.site_override = site
                .matched_rule
                .as_ref()
                .filter(|rule| rule.custom_css)
                .map(|rule| SiteOverride {
                    url_pattern: rule.regex.clone(),
                    custom_css_id: rule.url.clone(),
                });
        }

        let previous = self.mode();
        let mode = if self.inject_styles(&site, font.as_deref(), &fonts) {
            self.stop_pipeline();
            if previous == ActivationMode::ActiveGeneric {
                self.strip_all();
            }
            ActivationMode::ActiveCustomCss
        } else {
            self.start_generic();
            ActivationMode::ActiveGeneric
        };
        *self.mode.lock() = mode;
        info!("{} is {}", url, mode);
        Ok(mode)
    }

    /// Injects the fragments an active page needs and reports whether the
    /// site is handled by custom CSS. Injection failures are logged and the
    /// page falls back to per-element restyling.
    fn inject_styles(&self, site: &SiteMatch, font: Option<&str>, fonts: &[CustomFont]) -> bool {
        if !site.wants_custom_css() {
            if let Err(e) = self.injector.remove(CUSTOM_CSS_ID) {
                warn!("failed to remove custom css: {}", e);
            }
        }

        // A page that already carries the catalog reports `false` here and
        // falls through to per-element restyling.
        let custom = self
            .injector
            .inject_font_styles(site)
            .unwrap_or_else(|e| {
                warn!("failed to inject font styles: {}", e);
                false
            });

        if let Some(font) = font {
            if let Err(e) = self.injector.update_font_variable(font) {
                warn!("failed to set font variable: {}", e);
            }
        }
        if let Err(e) = self.injector.inject_custom_fonts(fonts) {
            warn!("failed to inject custom fonts: {}", e);
        }
        custom
    }

    fn start_generic(&self) {
        self.scheduler.cancel();
        self.abort_enumeration();

        let body = self.host.body();
        match body {
            Some(body) => {
                // Subscribing first means the walk below is not wiped by the
                // watcher's own reset.
                if let Err(e) = self.watcher.start(body) {
                    warn!("failed to observe mutations: {}", e);
                }
            }
            None => self.watcher.stop(),
        }

        let enumerator = self.enumerator.clone();
        let task = tokio::spawn(async move {
            let outcome = enumerator.enumerate(body).await;
            trace!("initial walk finished: {:?}", outcome);
        });
        *self.enumeration.lock() = Some(task.abort_handle());
    }

    fn abort_enumeration(&self) {
        if let Some(task) = self.enumeration.lock().take() {
            task.abort();
        }
    }

    /// Stops the watcher, any pending slice and the initial walk, and empties
    /// the queue. Restyled elements keep their declarations.
    fn stop_pipeline(&self) {
        self.watcher.stop();
        self.scheduler.cancel();
        self.abort_enumeration();
        self.state.lock().teardown();
    }

    /// Returns the page to how it looked before activation.
    pub fn deactivate(&self) {
        self.stop_pipeline();
        {
            let mut state = self.state.lock();
            state.activation.is_active = false;
            state.activation.site_override = None;
        }
        if let Err(e) = self.injector.remove_all() {
            warn!("failed to remove injected styles: {}", e);
        }
        self.strip_all();
        *self.mode.lock() = ActivationMode::Inactive;
    }

    fn strip_all(&self) {
        let classifier = self.scheduler.classifier();
        let mut walker = TreeWalker::elements(self.host.root());
        let mut stripped = 0;
        while let Some(node) = walker.next_node(&*self.host) {
            match classifier.strip(&*self.host, node) {
                Ok(true) => stripped += 1,
                Ok(false) => {}
                Err(e) => trace!("could not strip {:?}: {}", node, e),
            }
        }
        debug!("stripped font declarations from {} elements", stripped);
    }

    pub async fn on_setting_changed(&self, change: &SettingChange) -> Result<()> {
        if self.is_shutdown() {
            return Ok(());
        }
        debug!("setting {} changed", change.key);
        match change.key {
            SettingKey::IsExtensionEnabled | SettingKey::WebsiteList => {
                self.apply_if_active().await?;
            }
            SettingKey::SelectedFont => {
                let font = change
                    .new_value
                    .as_ref()
                    .and_then(Value::as_str)
                    .filter(|font| !font.is_empty())
                    .map(str::to_string);
                self.state.lock().activation.selected_font = font.clone();
                if !self.mode().is_active() {
                    return Ok(());
                }
                if let Some(font) = font {
                    self.injector.update_font_variable(&font)?;
                }
            }
            SettingKey::CustomFontList => {
                if !self.mode().is_active() {
                    return Ok(());
                }
                let fonts: Vec<CustomFont> = match &change.new_value {
                    None | Some(Value::Null) => Vec::new(),
                    Some(value) => serde_json::from_value(value.clone()).map_err(|source| {
                        StoreError::Decode {
                            key: SettingKey::CustomFontList.as_str(),
                            source,
                        }
                    })?,
                };
                self.injector.inject_custom_fonts(&fonts)?;
            }
        }
        Ok(())
    }

    /// Pauses draining while hidden; becoming visible with queued work runs
    /// a slice right away.
    pub fn set_page_visible(&self, visible: bool) {
        let resume = {
            let mut state = self.state.lock();
            let was_visible = state.activation.is_page_visible;
            state.activation.is_page_visible = visible;
            visible && !was_visible && !state.queue.is_empty()
        };
        if !visible {
            self.scheduler.cancel();
        } else if resume {
            self.scheduler.run_once();
        }
    }

    pub fn notify_idle(&self) {
        self.scheduler.notify_idle();
    }

    pub async fn handle_event(&self, event: PageEvent) -> Result<()> {
        trace!("page event {}", event.name());
        match event {
            PageEvent::Load => self.apply_if_active().await.map(|_| ()),
            PageEvent::VisibilityChange { hidden } => {
                self.set_page_visible(!hidden);
                Ok(())
            }
            PageEvent::Settings(change) => self.on_setting_changed(&change).await,
            PageEvent::Idle => {
                self.notify_idle();
                Ok(())
            }
            PageEvent::Unload => {
                self.shutdown();
                Ok(())
            }
        }
    }

    /// Drives the engine until the page unloads or every event sender is
    /// gone. Store changes are handled alongside page events.
    pub async fn run(&self, mut events: UnboundedReceiver<PageEvent>) {
        let mut changes = self.store.watch();
        let mut watching_store = true;

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(PageEvent::Unload) | None => break,
                    Some(event) => self.report(self.handle_event(event).await),
                },
                change = changes.recv(), if watching_store => match change {
                    Ok(change) => self.report(self.on_setting_changed(&change).await),
                    Err(RecvError::Lagged(missed)) => {
                        warn!("missed {} setting changes, re-evaluating page", missed);
                        self.report(self.apply_if_active().await.map(|_| ()));
                    }
                    Err(RecvError::Closed) => {
                        debug!("settings store closed its change feed");
                        watching_store = false;
                    }
                },
            }
        }
        self.shutdown();
    }

    fn report(&self, outcome: Result<()>) {
        if let Err(e) = outcome {
            error!("failed to apply page settings: {}", e);
        }
    }

    /// Stops all pipeline work. Styles already applied stay on the page.
    pub fn shutdown(&self) {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop_pipeline();
        debug!("engine shut down");
    }
}
