use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{Event, LookaheadCount, Template};

/// Merged events, generated instances included, cached for offline display.
pub const EVENTS_KEY: &str = "all-timeline-events";
/// Manual events as written by older versions. Read only as a fallback.
pub const LEGACY_EVENTS_KEY: &str = "timeline-events";
pub const TEMPLATES_KEY: &str = "preset-templates";
pub const LOOKAHEAD_KEY: &str = "timeline-future-count";
pub const AUTH_USER_KEY: &str = "auth-user";

const ALL_KEYS: [&str; 5] = [EVENTS_KEY, LEGACY_EVENTS_KEY, TEMPLATES_KEY, LOOKAHEAD_KEY, AUTH_USER_KEY];

/// Durable string storage keyed by name.
pub trait KeyValueStore {
    /// Returns `None` when the key is absent or unreadable.
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &S {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

/// One file per key inside a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.path(key);
        if !path.exists() {
            return None;
        }
        let mut f = match OpenOptions::new().read(true).open(&path) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %path.display(), "failed to open store file: {e}");
                return None;
            }
        };
        let mut s = String::new();
        if let Err(e) = f.read_to_string(&mut s) {
            warn!(path = %path.display(), "failed to read store file: {e}");
            return None;
        }
        Some(s)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(self.path(key))?;
        f.write_all(value.as_bytes())?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Volatile store for tests and previews.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        if let Ok(mut values) = self.values.lock() {
            values.remove(key);
        }
        Ok(())
    }
}

/// Decodes a JSON list item by item.
///
/// Items that do not decode are skipped; anything other than an array reads as empty.
pub(crate) fn decode_items<T: DeserializeOwned>(key: &str, value: serde_json::Value) -> Vec<T> {
    let serde_json::Value::Array(items) = value else {
        warn!(key, "ignoring stored data that is not a list");
        return Vec::new();
    };
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, index, "skipping malformed stored item: {e}");
                None
            }
        })
        .collect()
}

fn decode_list<T: DeserializeOwned>(key: &str, raw: &str) -> Vec<T> {
    match serde_json::from_str(raw) {
        Ok(value) => decode_items(key, value),
        Err(e) => {
            warn!(key, "ignoring malformed stored data: {e}");
            Vec::new()
        }
    }
}

fn encode<S: KeyValueStore + ?Sized, T: Serialize + ?Sized>(store: &S, key: &str, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    store.set(key, &s)
}

/// Loads the manual events.
///
/// Generated instances in the cache are dropped; they are recomputed from
/// templates on every render.
pub fn load_events<S: KeyValueStore + ?Sized>(store: &S) -> Vec<Event> {
    let mut events: Vec<Event> = match store.get(EVENTS_KEY) {
        Some(raw) => decode_list(EVENTS_KEY, &raw),
        None => match store.get(LEGACY_EVENTS_KEY) {
            Some(raw) => {
                debug!("loading events from legacy key");
                decode_list(LEGACY_EVENTS_KEY, &raw)
            }
            None => Vec::new(),
        },
    };
    for event in events.iter_mut() {
        event.normalize_origin();
    }
    events.retain(|e| !e.is_generated());
    events
}

/// Saves the full event set, generated instances included.
pub fn save_events<S: KeyValueStore + ?Sized>(store: &S, events: &[Event]) -> Result<()> {
    encode(store, EVENTS_KEY, events)
}

pub fn load_templates<S: KeyValueStore + ?Sized>(store: &S) -> Vec<Template> {
    store
        .get(TEMPLATES_KEY)
        .map(|raw| decode_list(TEMPLATES_KEY, &raw))
        .unwrap_or_default()
}

pub fn save_templates<S: KeyValueStore + ?Sized>(store: &S, templates: &[Template]) -> Result<()> {
    encode(store, TEMPLATES_KEY, templates)
}

/// Loads the lookahead count. Missing or unparseable values fall back to the default.
pub fn load_lookahead<S: KeyValueStore + ?Sized>(store: &S) -> LookaheadCount {
    let Some(raw) = store.get(LOOKAHEAD_KEY) else {
        return LookaheadCount::default();
    };
    match raw.trim().trim_matches('"').parse::<i64>() {
        Ok(n) => LookaheadCount::clamped(n),
        Err(e) => {
            warn!(key = LOOKAHEAD_KEY, "ignoring malformed lookahead '{raw}': {e}");
            LookaheadCount::default()
        }
    }
}

pub fn save_lookahead<S: KeyValueStore + ?Sized>(store: &S, count: LookaheadCount) -> Result<()> {
    store.set(LOOKAHEAD_KEY, &count.to_string())
}

/// Deletes every key this crate writes.
pub fn clear<S: KeyValueStore + ?Sized>(store: &S) -> Result<()> {
    for key in ALL_KEYS {
        store.remove(key)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_json_reads_as_empty() {
        let store = MemoryStore::default();
        store.set(EVENTS_KEY, "{not json").unwrap();
        store.set(TEMPLATES_KEY, "[{\"id\": 1}]").unwrap();
        store.set(LOOKAHEAD_KEY, "many").unwrap();
        assert!(load_events(&store).is_empty());
        assert!(load_templates(&store).is_empty());
        assert_eq!(load_lookahead(&store), LookaheadCount::default());
    }

    #[test]
    fn one_bad_item_does_not_drop_the_list() {
        let store = MemoryStore::default();
        let raw = r#"[
            {"id":"1","date":"2024-06-01","time":"25:00","title":"Broken","createdAt":""},
            {"id":"2","date":"2024-06-02","title":"Kept","createdAt":""}
        ]"#;
        store.set(EVENTS_KEY, raw).unwrap();
        store.set(TEMPLATES_KEY, r#"[{"id": 1}, "junk"]"#).unwrap();

        let events = load_events(&store);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Kept");
        assert!(load_templates(&store).is_empty());

        // Persisting what was kept must not lose the good item either
        save_events(&store, &events).unwrap();
        assert_eq!(load_events(&store)[0].id, "2");
    }

    #[test]
    fn cached_generated_events_are_dropped_on_load() {
        let store = MemoryStore::default();
        let raw = r#"[
            {"id":"1717000000000","date":"2024-06-01","title":"Dentist","createdAt":"x"},
            {"id":"auto-5-20240601-0","date":"2024-06-01","time":"","title":"Gym","createdAt":"x"}
        ]"#;
        store.set(EVENTS_KEY, raw).unwrap();
        let events = load_events(&store);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Dentist");
    }

    #[test]
    fn legacy_key_is_a_fallback_only() {
        let store = MemoryStore::default();
        store
            .set(LEGACY_EVENTS_KEY, r#"[{"id":"1","date":"2024-06-01","title":"Old","createdAt":""}]"#)
            .unwrap();
        assert_eq!(load_events(&store).len(), 1);

        store.set(EVENTS_KEY, "[]").unwrap();
        assert!(load_events(&store).is_empty());
    }

    #[test]
    fn lookahead_is_string_encoded_and_clamped() {
        let store = MemoryStore::default();
        save_lookahead(&store, LookaheadCount::new(7).unwrap()).unwrap();
        assert_eq!(store.get(LOOKAHEAD_KEY).as_deref(), Some("7"));
        store.set(LOOKAHEAD_KEY, "\"35\"").unwrap();
        assert_eq!(load_lookahead(&store).get(), 20);
    }

    #[test]
    fn file_store_creates_its_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path().join("nested"));
        assert_eq!(store.get("missing"), None);
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v"));
        store.remove("k").unwrap();
        assert_eq!(store.get("k"), None);
    }
}
