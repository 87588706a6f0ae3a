use std::sync::Arc;

use crate::core::config::Settings;
use crate::services::link_store::LinkStore;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    links: LinkStore,
}

impl AppState {
    pub(crate) fn new(settings: Settings, links: LinkStore) -> Self {
        Self { inner: Arc::new(InnerState { settings, links }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn links(&self) -> &LinkStore {
        &self.inner.links
    }
}
