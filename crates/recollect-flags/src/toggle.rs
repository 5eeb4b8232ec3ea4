//! Toggle types and evaluation

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::error::FlagError;
use crate::source::{FlagSource, DEFAULT_CONTEXT};

/// The five toggle categories. Each owns a key namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToggleKind {
    /// Hides unfinished code paths
    Release,
    /// Splits users between two code paths
    Experiment,
    /// Tunes operational settings (timeouts, delays, batch sizes)
    Operational,
    /// Manually operated circuit breaker
    Killswitch,
    /// Grants features to particular actors
    Permission,
}

impl ToggleKind {
    pub const ALL: [ToggleKind; 5] = [
        Self::Release,
        Self::Experiment,
        Self::Operational,
        Self::Killswitch,
        Self::Permission,
    ];

    /// Key namespace, without the trailing dot
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Release => "release",
            Self::Experiment => "experiment",
            Self::Operational => "operational",
            Self::Killswitch => "killswitch",
            Self::Permission => "permission",
        }
    }

    pub fn from_prefix(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.prefix() == s)
    }

    /// Full source key for a short toggle key
    pub fn key(&self, key: &str) -> String {
        format!("{}.{}", self.prefix(), key)
    }
}

/// Evaluate `key` for `context` as a `T`.
///
/// When the source fails, or holds a value of the wrong type, `default` is
/// returned with a warning. Without a default the error is returned.
pub fn evaluate<T>(source: &dyn FlagSource, key: &str, context: &str, default: Option<T>) -> Result<T, FlagError>
where
    T: DeserializeOwned + std::fmt::Debug,
{
    let error = match source.evaluate(key, context) {
        Ok(value) => match serde_json::from_value::<T>(value) {
            Ok(typed) => return Ok(typed),
            Err(e) => FlagError::WrongType {
                key: key.to_string(),
                expected: std::any::type_name::<T>(),
                reason: e.to_string(),
            },
        },
        Err(e) => e,
    };

    match default {
        Some(default) => {
            if matches!(error, FlagError::NotFound(_)) {
                tracing::debug!(source = source.name(), "{} is unset; returning default value ({:?})", key, default);
            } else {
                tracing::warn!(source = source.name(), "Error evaluating {}: {}; returning default value ({:?})", key, error, default);
            }
            Ok(default)
        }
        None => Err(error),
    }
}

fn evaluate_bool(source: &dyn FlagSource, key: &str, context: &str, default: bool) -> bool {
    evaluate(source, key, context, Some(default)).unwrap_or(default)
}

/// Enables an unfinished code path for everyone
#[derive(Clone)]
pub struct Release {
    key: String,
    default: bool,
    source: Arc<dyn FlagSource>,
}

impl Release {
    pub(crate) fn new(key: &str, default: bool, source: Arc<dyn FlagSource>) -> Self {
        Self {
            key: ToggleKind::Release.key(key),
            default,
            source,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_enabled(&self) -> bool {
        evaluate_bool(self.source.as_ref(), &self.key, DEFAULT_CONTEXT, self.default)
    }
}

/// Chooses between two code paths per user
#[derive(Clone)]
pub struct Experiment {
    key: String,
    default: bool,
    source: Arc<dyn FlagSource>,
}

impl Experiment {
    pub(crate) fn new(key: &str, default: bool, source: Arc<dyn FlagSource>) -> Self {
        Self {
            key: ToggleKind::Experiment.key(key),
            default,
            source,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_enabled(&self, user: &str) -> bool {
        evaluate_bool(self.source.as_ref(), &self.key, user, self.default)
    }
}

/// Typed operational setting
pub struct Operational<T> {
    key: String,
    default: T,
    source: Arc<dyn FlagSource>,
    _value: PhantomData<fn() -> T>,
}

impl<T: Clone> Clone for Operational<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            default: self.default.clone(),
            source: self.source.clone(),
            _value: PhantomData,
        }
    }
}

impl<T> Operational<T>
where
    T: DeserializeOwned + Clone + std::fmt::Debug,
{
    pub(crate) fn new(key: &str, default: T, source: Arc<dyn FlagSource>) -> Self {
        Self {
            key: ToggleKind::Operational.key(key),
            default,
            source,
            _value: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> T {
        evaluate(self.source.as_ref(), &self.key, DEFAULT_CONTEXT, Some(self.default.clone()))
            .unwrap_or_else(|_| self.default.clone())
    }
}

/// Manually operated circuit breaker; off unless the source says otherwise
#[derive(Clone)]
pub struct Killswitch {
    key: String,
    source: Arc<dyn FlagSource>,
}

impl Killswitch {
    pub(crate) fn new(key: &str, source: Arc<dyn FlagSource>) -> Self {
        Self {
            key: ToggleKind::Killswitch.key(key),
            source,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_enabled(&self) -> bool {
        evaluate_bool(self.source.as_ref(), &self.key, DEFAULT_CONTEXT, false)
    }
}

/// Grants a feature to particular actors
#[derive(Clone)]
pub struct Permission {
    key: String,
    default: bool,
    source: Arc<dyn FlagSource>,
}

impl Permission {
    pub(crate) fn new(key: &str, default: bool, source: Arc<dyn FlagSource>) -> Self {
        Self {
            key: ToggleKind::Permission.key(key),
            default,
            source,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_allowed(&self, actor: &str) -> bool {
        evaluate_bool(self.source.as_ref(), &self.key, actor, self.default)
    }
}
