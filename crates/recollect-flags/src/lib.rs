//! recollect-flags: feature toggles.
//!
//! Toggles follow five categories, each with its own key namespace:
//!
//! - `release.<key>`: hide unfinished code paths
//! - `experiment.<key>`: per-user A/B split
//! - `operational.<key>`: typed operational settings
//! - `killswitch.<key>`: manual circuit breakers, off by default
//! - `permission.<key>`: per-actor grants
//!
//! Values come from a [`FlagSource`]. A failed or mistyped evaluation falls
//! back to the toggle's default and logs a warning.

pub mod error;
pub mod source;
pub mod toggle;

use std::sync::Arc;

use serde::de::DeserializeOwned;

pub use error::FlagError;
pub use source::{FileFlagSource, FileFormat, FlagSource, InMemoryFlagSource, DEFAULT_CONTEXT};
pub use toggle::{evaluate, Experiment, Killswitch, Operational, Permission, Release, ToggleKind};

/// Killswitch that puts servers and workers into maintenance
pub const MAINTENANCE_MODE: &str = "maintenance-mode";

/// Hands out toggles backed by one flag source
#[derive(Clone)]
pub struct Features {
    source: Arc<dyn FlagSource>,
}

impl Features {
    pub fn new(source: Arc<dyn FlagSource>) -> Self {
        Self { source }
    }

    /// Features backed by an empty in-memory source, so every toggle is at its default
    pub fn defaults() -> Self {
        Self::new(Arc::new(InMemoryFlagSource::new()))
    }

    pub fn source(&self) -> &Arc<dyn FlagSource> {
        &self.source
    }

    pub fn release(&self, key: &str, default_enabled: bool) -> Release {
        Release::new(key, default_enabled, self.source.clone())
    }

    pub fn experiment(&self, key: &str, default_enabled: bool) -> Experiment {
        Experiment::new(key, default_enabled, self.source.clone())
    }

    pub fn operational<T>(&self, key: &str, default_value: T) -> Operational<T>
    where
        T: DeserializeOwned + Clone + std::fmt::Debug,
    {
        Operational::new(key, default_value, self.source.clone())
    }

    pub fn killswitch(&self, key: &str) -> Killswitch {
        Killswitch::new(key, self.source.clone())
    }

    pub fn permission(&self, key: &str, default_allowed: bool) -> Permission {
        Permission::new(key, default_allowed, self.source.clone())
    }

    /// The global maintenance killswitch
    pub fn maintenance(&self) -> Killswitch {
        self.killswitch(MAINTENANCE_MODE)
    }
}

impl std::fmt::Debug for Features {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Features")
            .field("source", &self.source.name())
            .finish()
    }
}
