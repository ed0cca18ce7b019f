//! Per-user document store standing in for the cloud backend.

use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{DisplaySettings, Event, Template};
use crate::storage::decode_items;

const EVENTS_FIELD: &str = "timelineEvents";
const TEMPLATES_FIELD: &str = "presetTemplates";
const SETTINGS_FIELD: &str = "displaySettings";
const UPDATED_AT_FIELD: &str = "updatedAt";

/// Remote persistence for a signed-in user.
///
/// Each save replaces one field of the user's document and leaves the others alone.
pub trait RemoteBackend {
    fn save_events(&self, user_id: &str, events: &[Event]) -> Result<()>;
    fn get_events(&self, user_id: &str) -> Result<Vec<Event>>;
    fn save_templates(&self, user_id: &str, templates: &[Template]) -> Result<()>;
    fn get_templates(&self, user_id: &str) -> Result<Vec<Template>>;
    fn save_display_settings(&self, user_id: &str, settings: &DisplaySettings) -> Result<()>;
    fn get_display_settings(&self, user_id: &str) -> Result<DisplaySettings>;
}

/// Stores `users/<uid>.json` documents under a root directory, typically a
/// folder shared through a file sync service.
#[derive(Debug, Clone)]
pub struct DirectoryBackend {
    root: PathBuf,
}

impl DirectoryBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryBackend { root: root.into() }
    }

    fn document_path(&self, user_id: &str) -> Result<PathBuf> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(Error::Remote("user id must not be empty".into()));
        }
        if user_id.contains(['/', '\\']) || user_id.starts_with('.') {
            return Err(Error::Remote(format!("invalid user id '{user_id}'")));
        }
        Ok(self.root.join("users").join(format!("{user_id}.json")))
    }

    fn read_document(&self, user_id: &str) -> Result<Map<String, Value>> {
        let path = self.document_path(user_id)?;
        if !path.exists() {
            debug!(user_id, "no remote document yet");
            return Ok(Map::new());
        }
        let raw = fs::read_to_string(&path)
            .map_err(|e| Error::Remote(format!("failed to read {}: {e}", path.display())))?;
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(doc)) => Ok(doc),
            Ok(_) | Err(_) => {
                warn!(user_id, "remote document is malformed, treating it as empty");
                Ok(Map::new())
            }
        }
    }

    fn write_field(&self, user_id: &str, field: &str, value: Value) -> Result<()> {
        let path = self.document_path(user_id)?;
        let mut doc = self.read_document(user_id)?;
        doc.insert(field.to_string(), value);
        doc.insert(UPDATED_AT_FIELD.to_string(), Value::String(Utc::now().to_rfc3339()));

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Remote(format!("failed to create {}: {e}", parent.display())))?;
        }
        let s = serde_json::to_string_pretty(&Value::Object(doc))?;
        fs::write(&path, s).map_err(|e| Error::Remote(format!("failed to write {}: {e}", path.display())))?;
        debug!(user_id, field, "remote document updated");
        Ok(())
    }

    fn read_field<T: DeserializeOwned + Default>(&self, user_id: &str, field: &str) -> Result<T> {
        let mut doc = self.read_document(user_id)?;
        let Some(value) = doc.remove(field) else {
            return Ok(T::default());
        };
        match serde_json::from_value(value) {
            Ok(v) => Ok(v),
            Err(e) => {
                warn!(user_id, field, "ignoring malformed remote field: {e}");
                Ok(T::default())
            }
        }
    }

    /// Reads a list field, skipping items that do not decode.
    fn read_list<T: DeserializeOwned>(&self, user_id: &str, field: &str) -> Result<Vec<T>> {
        let mut doc = self.read_document(user_id)?;
        Ok(doc.remove(field).map(|value| decode_items(field, value)).unwrap_or_default())
    }

    /// When the document was last written, if ever.
    pub fn updated_at(&self, user_id: &str) -> Result<Option<String>> {
        let doc = self.read_document(user_id)?;
        Ok(doc.get(UPDATED_AT_FIELD).and_then(Value::as_str).map(str::to_string))
    }
}

impl RemoteBackend for DirectoryBackend {
    fn save_events(&self, user_id: &str, events: &[Event]) -> Result<()> {
        self.write_field(user_id, EVENTS_FIELD, serde_json::to_value(events)?)
    }

    fn get_events(&self, user_id: &str) -> Result<Vec<Event>> {
        let mut events: Vec<Event> = self.read_list(user_id, EVENTS_FIELD)?;
        for event in events.iter_mut() {
            event.normalize_origin();
        }
        Ok(events)
    }

    fn save_templates(&self, user_id: &str, templates: &[Template]) -> Result<()> {
        self.write_field(user_id, TEMPLATES_FIELD, serde_json::to_value(templates)?)
    }

    fn get_templates(&self, user_id: &str) -> Result<Vec<Template>> {
        self.read_list(user_id, TEMPLATES_FIELD)
    }

    fn save_display_settings(&self, user_id: &str, settings: &DisplaySettings) -> Result<()> {
        self.write_field(user_id, SETTINGS_FIELD, serde_json::to_value(settings)?)
    }

    fn get_display_settings(&self, user_id: &str) -> Result<DisplaySettings> {
        self.read_field(user_id, SETTINGS_FIELD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LookaheadCount;

    #[test]
    fn saves_merge_into_one_document() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = DirectoryBackend::new(tmp.path());
        let settings = DisplaySettings { timeline_future_count: LookaheadCount::new(5).unwrap() };

        backend.save_display_settings("ada", &settings).unwrap();
        backend.save_events("ada", &[]).unwrap();

        assert_eq!(backend.get_display_settings("ada").unwrap(), settings);
        assert!(backend.get_events("ada").unwrap().is_empty());
        assert!(backend.updated_at("ada").unwrap().is_some());
    }

    #[test]
    fn missing_document_reads_as_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = DirectoryBackend::new(tmp.path());
        assert!(backend.get_templates("nobody").unwrap().is_empty());
        assert_eq!(backend.get_display_settings("nobody").unwrap(), DisplaySettings::default());
        assert_eq!(backend.updated_at("nobody").unwrap(), None);
    }

    #[test]
    fn one_bad_remote_event_keeps_the_rest() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("users");
        fs::create_dir_all(&dir).unwrap();
        let doc = r#"{"timelineEvents": [
            {"id":"1","date":"2024-06-01","time":"25:00","title":"Broken","createdAt":""},
            {"id":"2","date":"2024-06-02","title":"Kept","createdAt":""}
        ]}"#;
        fs::write(dir.join("ada.json"), doc).unwrap();

        let backend = DirectoryBackend::new(tmp.path());
        let events = backend.get_events("ada").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Kept");
    }

    #[test]
    fn malformed_field_reads_as_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("users");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("ada.json"), r#"{"timelineEvents": "oops", "presetTemplates": []}"#).unwrap();

        let backend = DirectoryBackend::new(tmp.path());
        assert!(backend.get_events("ada").unwrap().is_empty());
        assert!(backend.get_templates("ada").unwrap().is_empty());
    }

    #[test]
    fn rejects_unusable_user_ids() {
        let backend = DirectoryBackend::new("/nonexistent");
        assert!(matches!(backend.get_events(""), Err(Error::Remote(_))));
        assert!(matches!(backend.get_events("../x"), Err(Error::Remote(_))));
    }
}
