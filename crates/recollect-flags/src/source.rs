//! Flag sources
//!
//! A source maps a full flag key (`killswitch.maintenance-mode`) and an
//! evaluation context to a JSON value. Typing and defaults are applied by
//! the toggles on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde_json::Value;

use crate::error::FlagError;
use crate::toggle::ToggleKind;

/// Context used for toggles that do not depend on a user
pub const DEFAULT_CONTEXT: &str = "default";

/// Backend that stores flag values
pub trait FlagSource: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Value of `key` for `context` (a user or actor ID, or [`DEFAULT_CONTEXT`])
    fn evaluate(&self, key: &str, context: &str) -> Result<Value, FlagError>;
}

#[derive(Debug, Default)]
struct Values {
    global: HashMap<String, Value>,
    per_context: HashMap<(String, String), Value>,
}

impl Values {
    fn lookup(&self, key: &str, context: &str) -> Result<Value, FlagError> {
        self.per_context
            .get(&(key.to_string(), context.to_string()))
            .or_else(|| self.global.get(key))
            .cloned()
            .ok_or_else(|| FlagError::NotFound(key.to_string()))
    }
}

fn poisoned(key: &str) -> FlagError {
    FlagError::Source {
        key: key.to_string(),
        reason: "lock poisoned".to_string(),
    }
}

/// Settable source for tests and local development
#[derive(Debug, Default)]
pub struct InMemoryFlagSource {
    values: RwLock<Values>,
}

impl InMemoryFlagSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value of a full key for every context
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        if let Ok(mut values) = self.values.write() {
            values.global.insert(key.into(), value.into());
        }
    }

    /// Override the value of a full key for one context
    pub fn set_for(&self, key: impl Into<String>, context: impl Into<String>, value: impl Into<Value>) {
        if let Ok(mut values) = self.values.write() {
            values.per_context.insert((key.into(), context.into()), value.into());
        }
    }

    /// Forget a key, including its per-context overrides
    pub fn remove(&self, key: &str) {
        if let Ok(mut values) = self.values.write() {
            values.global.remove(key);
            values.per_context.retain(|(k, _), _| k != key);
        }
    }
}

impl FlagSource for InMemoryFlagSource {
    fn name(&self) -> &str {
        "memory"
    }

    fn evaluate(&self, key: &str, context: &str) -> Result<Value, FlagError> {
        self.values.read().map_err(|_| poisoned(key))?.lookup(key, context)
    }
}

/// Flag file encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Toml,
}

impl FileFormat {
    /// Guess from the file extension; anything but `.toml` is read as JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

/// Source backed by a JSON or TOML file.
///
/// The file holds full keys mapped to values. A top-level table named after a
/// toggle kind is flattened, so these are equivalent:
///
/// ```toml
/// "killswitch.maintenance-mode" = true
///
/// [killswitch]
/// maintenance-mode = true
/// ```
#[derive(Debug)]
pub struct FileFlagSource {
    path: PathBuf,
    format: FileFormat,
    values: RwLock<Values>,
}

impl FileFlagSource {
    /// Load flags from `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, FlagError> {
        let path = path.into();
        let format = FileFormat::from_path(&path);
        let values = Self::load(&path, format)?;
        tracing::info!(path = %path.display(), flags = values.global.len(), "Loaded flag file");
        Ok(Self {
            path,
            format,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file. On failure the previous values stay in effect.
    pub fn reload(&self) -> Result<usize, FlagError> {
        let loaded = Self::load(&self.path, self.format)?;
        let count = loaded.global.len();
        let mut values = self.values.write().map_err(|_| poisoned(&self.path.display().to_string()))?;
        *values = loaded;
        tracing::debug!(path = %self.path.display(), flags = count, "Reloaded flag file");
        Ok(count)
    }

    fn load(path: &Path, format: FileFormat) -> Result<Values, FlagError> {
        let file_error = |reason: String| FlagError::File {
            path: path.display().to_string(),
            reason,
        };

        let text = std::fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
        let document: Value = match format {
            FileFormat::Json => serde_json::from_str(&text).map_err(|e| file_error(e.to_string()))?,
            FileFormat::Toml => toml::from_str(&text).map_err(|e| file_error(e.to_string()))?,
        };

        let Value::Object(entries) = document else {
            return Err(file_error("top level must be a table".to_string()));
        };

        let mut global = HashMap::new();
        for (key, value) in entries {
            match value {
                Value::Object(table) if ToggleKind::from_prefix(&key).is_some() => {
                    for (name, value) in table {
                        global.insert(format!("{}.{}", key, name), value);
                    }
                }
                value => {
                    global.insert(key, value);
                }
            }
        }

        Ok(Values {
            global,
            per_context: HashMap::new(),
        })
    }
}

impl FlagSource for FileFlagSource {
    fn name(&self) -> &str {
        "file"
    }

    fn evaluate(&self, key: &str, context: &str) -> Result<Value, FlagError> {
        self.values.read().map_err(|_| poisoned(key))?.lookup(key, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn in_memory_prefers_context_override() {
        let source = InMemoryFlagSource::new();
        source.set("experiment.new-ranking", false);
        source.set_for("experiment.new-ranking", "user-1", true);

        assert_eq!(source.evaluate("experiment.new-ranking", "user-1").unwrap(), json!(true));
        assert_eq!(source.evaluate("experiment.new-ranking", "user-2").unwrap(), json!(false));

        source.remove("experiment.new-ranking");
        assert!(matches!(
            source.evaluate("experiment.new-ranking", "user-1"),
            Err(FlagError::NotFound(_))
        ));
    }

    #[test]
    fn toml_file_flattens_kind_tables() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
"release.graph-v2" = true

[killswitch]
maintenance-mode = true

[operational]
publish-timeout-ms = 2500
"#
        )
        .unwrap();

        let source = FileFlagSource::open(file.path()).unwrap();
        assert_eq!(source.evaluate("release.graph-v2", DEFAULT_CONTEXT).unwrap(), json!(true));
        assert_eq!(
            source.evaluate("killswitch.maintenance-mode", DEFAULT_CONTEXT).unwrap(),
            json!(true)
        );
        assert_eq!(
            source.evaluate("operational.publish-timeout-ms", DEFAULT_CONTEXT).unwrap(),
            json!(2500)
        );
    }

    #[test]
    fn json_file_reload_picks_up_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flags.json");
        std::fs::write(&path, r#"{"killswitch.maintenance-mode": false}"#).unwrap();

        let source = FileFlagSource::open(&path).unwrap();
        assert_eq!(
            source.evaluate("killswitch.maintenance-mode", DEFAULT_CONTEXT).unwrap(),
            json!(false)
        );

        std::fs::write(&path, r#"{"killswitch": {"maintenance-mode": true}, "release.x": true}"#).unwrap();
        assert_eq!(source.reload().unwrap(), 2);
        assert_eq!(
            source.evaluate("killswitch.maintenance-mode", DEFAULT_CONTEXT).unwrap(),
            json!(true)
        );
    }

    #[test]
    fn failed_reload_keeps_previous_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flags.json");
        std::fs::write(&path, r#"{"release.x": true}"#).unwrap();
        let source = FileFlagSource::open(&path).unwrap();

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(source.reload(), Err(FlagError::File { .. })));
        assert_eq!(source.evaluate("release.x", DEFAULT_CONTEXT).unwrap(), json!(true));
    }

    #[test]
    fn non_table_document_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flags.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(FileFlagSource::open(&path).is_err());
    }
}
