//! Reload logic for runtime filter changes

use std::sync::Arc;

use parking_lot::RwLock;
use tracing_subscriber::{EnvFilter, Registry, layer::Layer, reload};

use crate::error::{LogError, LogResult};

/// Handle for swapping the filter of a running logger
#[derive(Clone)]
pub struct ReloadHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    current_filter: Arc<RwLock<String>>,
}

impl ReloadHandle {
    /// Replace the active filter directives.
    ///
    /// # Errors
    /// Returns error if the directives do not parse or the subscriber is gone
    pub fn reload(&self, filter: &str) -> LogResult<()> {
        let new_filter = EnvFilter::try_new(filter).map_err(|e| LogError::Filter {
            filter: filter.to_string(),
            reason: e.to_string(),
        })?;
        self.filter
            .reload(new_filter)
            .map_err(|e| LogError::Reload(e.to_string()))?;
        *self.current_filter.write() = filter.to_string();
        Ok(())
    }

    /// The directives currently in effect
    #[must_use]
    pub fn current_filter(&self) -> String {
        self.current_filter.read().clone()
    }
}

impl std::fmt::Debug for ReloadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadHandle")
            .field("current_filter", &*self.current_filter.read())
            .finish_non_exhaustive()
    }
}

/// Create a filter layer, wrapped in a reloadable layer when asked.
pub(super) fn create_filter_layer(
    filter: EnvFilter,
    level: &str,
    reloadable: bool,
) -> (
    Box<dyn Layer<Registry> + Send + Sync + 'static>,
    Option<ReloadHandle>,
) {
    if reloadable {
        let (layer, handle) = reload::Layer::new(filter);
        let reload_handle = ReloadHandle {
            filter: handle,
            current_filter: Arc::new(RwLock::new(level.to_string())),
        };
        (Box::new(layer), Some(reload_handle))
    } else {
        (Box::new(filter), None)
    }
}
