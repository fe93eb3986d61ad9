// Application state module
// Long-lived dependencies shared by every request handler

use std::sync::Arc;

use super::types::Config;
use crate::store::PageStore;
use crate::templates::{Render, RenderError, TemplateSet};

/// Application state
pub struct AppState {
    pub config: Config,
    pub store: PageStore,
    /// Loaded once at startup, read-only afterwards
    pub templates: Arc<dyn Render>,
}

impl AppState {
    /// Build state from configuration, loading the template set once
    pub fn new(config: &Config) -> Result<Self, RenderError> {
        let templates = match &config.templates.dir {
            Some(dir) => TemplateSet::load_dir(dir)?,
            None => TemplateSet::builtin()?,
        };
        Ok(Self::with_renderer(config, Arc::new(templates)))
    }

    /// Build state around an already constructed renderer
    pub fn with_renderer(config: &Config, templates: Arc<dyn Render>) -> Self {
        Self {
            config: config.clone(),
            store: PageStore::new(&config.storage.dir),
            templates,
        }
    }
}
