use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::settings::SettingChange;

/// Notifications a page host feeds into a running engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PageEvent {
    /// The document finished loading (or the script was injected late).
    Load,
    VisibilityChange { hidden: bool },
    Settings(SettingChange),
    /// The host's event loop went idle; wakes slices waiting on an idle slot.
    Idle,
    Unload,
}

impl PageEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PageEvent::Load => "load",
            PageEvent::VisibilityChange { .. } => "visibilitychange",
            PageEvent::Settings(_) => "storage",
            PageEvent::Idle => "idle",
            PageEvent::Unload => "unload",
        }
    }
}

/// Channel pair connecting a host to the engine's event loop.
pub struct EventSystem {
    event_sender: mpsc::UnboundedSender<PageEvent>,
    event_receiver: mpsc::UnboundedReceiver<PageEvent>,
}

impl EventSystem {
    pub fn new() -> Self {
        let (event_sender, event_receiver) = mpsc::unbounded_channel();
        Self {
            event_sender,
            event_receiver,
        }
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            inner: self.event_sender.clone(),
        }
    }

    pub fn into_receiver(self) -> mpsc::UnboundedReceiver<PageEvent> {
        self.event_receiver
    }
}

impl Default for EventSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    inner: mpsc::UnboundedSender<PageEvent>,
}

impl EventSender {
    /// Returns `false` once the engine's loop has shut down.
    pub fn send(&self, event: PageEvent) -> bool {
        let name = event.name();
        match self.inner.send(event) {
            Ok(()) => true,
            Err(_) => {
                tracing::debug!("dropping {} event, engine loop has stopped", name);
                false
            }
        }
    }

    pub fn visibility_changed(&self, hidden: bool) -> bool {
        self.send(PageEvent::VisibilityChange { hidden })
    }
}
