//! Sync checkpoint stored as `last_sync_time` in `.planbook.json`.
//!
//! The value is an RFC 3339 timestamp with an offset. Absent, null or
//! empty means no prior sync. Anything else that does not parse is also
//! treated as no prior sync, with a warning.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::path::Path;
use tracing::warn;

use crate::config::{config_path, ProjectConfig};
use crate::error::Result;
use crate::sync::file::atomic_write;
use crate::sync::types::SyncError;

/// Config key holding the checkpoint.
pub const CHECKPOINT_KEY: &str = "last_sync_time";

/// Interpret a raw `last_sync_time` value.
///
/// # Errors
///
/// Returns a description of the problem if the value is present but not
/// a valid RFC 3339 timestamp.
pub fn parse_checkpoint(value: Option<&Value>) -> std::result::Result<Option<DateTime<Utc>>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s.trim())
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| format!("'{s}' is not an RFC 3339 timestamp ({e})")),
        Some(other) => Err(format!("expected a timestamp string, found {other}")),
    }
}

/// Load the checkpoint of the project at `root`.
///
/// An unparsable value is logged, pushed onto `warnings` and treated as
/// absent.
///
/// # Errors
///
/// Returns an error only if the config file itself cannot be read.
pub fn load_checkpoint(root: &Path, warnings: &mut Vec<String>) -> Result<Option<DateTime<Utc>>> {
    let config = ProjectConfig::load(root)?;
    match parse_checkpoint(config.last_sync_time.as_ref()) {
        Ok(checkpoint) => Ok(checkpoint),
        Err(problem) => {
            warn!(%problem, "Ignoring invalid sync checkpoint; running a full scan");
            warnings.push(format!("ignoring {CHECKPOINT_KEY}: {problem}; running a full scan"));
            Ok(None)
        }
    }
}

/// Checkpoint rendering used in the config file and reports.
#[must_use]
pub fn format_checkpoint(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Persist `at` as the new checkpoint.
///
/// Only `last_sync_time` is touched; every other key in the file is
/// written back as found. The file is replaced atomically.
///
/// # Errors
///
/// Returns `SyncError::Checkpoint` if the file cannot be read, parsed or
/// replaced.
pub fn save_checkpoint(root: &Path, at: DateTime<Utc>) -> std::result::Result<(), SyncError> {
    let path = config_path(root);
    let failed = |source: std::io::Error| SyncError::Checkpoint {
        path: path.clone(),
        source,
    };

    let mut map = if path.exists() {
        let content = std::fs::read_to_string(&path).map_err(failed)?;
        if content.trim().is_empty() {
            serde_json::Map::new()
        } else {
            serde_json::from_str::<serde_json::Map<String, Value>>(&content)
                .map_err(|e| failed(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?
        }
    } else {
        serde_json::Map::new()
    };

    map.insert(CHECKPOINT_KEY.to_string(), Value::String(format_checkpoint(at)));

    let mut content = serde_json::to_string_pretty(&map)
        .map_err(|e| failed(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    content.push('\n');
    atomic_write(&path, &content).map_err(failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_parse_absent_and_empty() {
        assert_eq!(parse_checkpoint(None), Ok(None));
        assert_eq!(parse_checkpoint(Some(&Value::Null)), Ok(None));
        assert_eq!(parse_checkpoint(Some(&json!("  "))), Ok(None));
    }

    #[test]
    fn test_parse_offset_timestamp() {
        let parsed = parse_checkpoint(Some(&json!("2025-12-17T14:30:45-08:00"))).unwrap();
        assert_eq!(parsed, Some(Utc.with_ymd_and_hms(2025, 12, 17, 22, 30, 45).unwrap()));
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(parse_checkpoint(Some(&json!("yesterday"))).is_err());
        assert!(parse_checkpoint(Some(&json!(12345))).is_err());
    }

    #[test]
    fn test_load_warns_on_garbage() {
        let dir = TempDir::new().unwrap();
        std::fs::write(config_path(dir.path()), r#"{"last_sync_time": "not-a-date"}"#).unwrap();

        let mut warnings = Vec::new();
        assert_eq!(load_checkpoint(dir.path(), &mut warnings).unwrap(), None);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("not-a-date"));
    }

    #[test]
    fn test_load_absent_is_silent() {
        let dir = TempDir::new().unwrap();
        std::fs::write(config_path(dir.path()), "{}").unwrap();

        let mut warnings = Vec::new();
        assert_eq!(load_checkpoint(dir.path(), &mut warnings).unwrap(), None);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_save_preserves_other_keys() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            config_path(dir.path()),
            r#"{"docs_root": "plans", "custom": {"x": 1}, "last_sync_time": "old"}"#,
        )
        .unwrap();

        let at = Utc.with_ymd_and_hms(2025, 12, 17, 14, 0, 0).unwrap();
        save_checkpoint(dir.path(), at).unwrap();

        let raw: Value =
            serde_json::from_str(&std::fs::read_to_string(config_path(dir.path())).unwrap()).unwrap();
        assert_eq!(raw["docs_root"], "plans");
        assert_eq!(raw["custom"]["x"], 1);
        assert_eq!(raw[CHECKPOINT_KEY], "2025-12-17T14:00:00.000Z");

        let mut warnings = Vec::new();
        assert_eq!(load_checkpoint(dir.path(), &mut warnings).unwrap(), Some(at));
    }

    #[test]
    fn test_save_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        save_checkpoint(dir.path(), at).unwrap();
        assert!(config_path(dir.path()).is_file());
    }
}
