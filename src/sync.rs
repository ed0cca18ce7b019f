//! Reconciling local state with the remote copy.
//!
//! There is no automatic conflict strategy: the caller picks [`SyncChoice`]
//! after looking at a [`SyncPreview`]. Pushes are last-write-wins.

use std::collections::HashSet;
use std::fmt;

use tracing::{error, info};

use crate::error::Result;
use crate::merge::merge;
use crate::models::{DisplaySettings, Event, Template};
use crate::remote::RemoteBackend;

/// Which side wins when local and remote data disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncChoice {
    /// Overwrite the remote copy with local data.
    Local,
    /// Replace local data with the remote copy.
    Cloud,
    /// Union both sides by id, local entries first, and write the result to both.
    Merge,
}

impl fmt::Display for SyncChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncChoice::Local => "local",
            SyncChoice::Cloud => "cloud",
            SyncChoice::Merge => "merge",
        };
        f.write_str(s)
    }
}

/// The synchronized part of the user's data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Manual events only.
    pub events: Vec<Event>,
    pub templates: Vec<Template>,
    pub settings: DisplaySettings,
}

/// Differences shown to the user before choosing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPreview {
    pub local_events: usize,
    pub remote_events: usize,
    pub only_local_events: usize,
    pub only_remote_events: usize,
    pub local_templates: usize,
    pub remote_templates: usize,
    pub settings_differ: bool,
}

impl SyncPreview {
    pub fn in_sync(&self) -> bool {
        self.only_local_events == 0
            && self.only_remote_events == 0
            && self.local_templates == self.remote_templates
            && !self.settings_differ
    }
}

/// Outcome of applying a [`SyncChoice`].
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// What local state should become.
    pub snapshot: Snapshot,
    /// Whether `snapshot` must be written to the remote.
    pub push: bool,
}

pub fn fetch<R: RemoteBackend + ?Sized>(remote: &R, user_id: &str) -> Result<Snapshot> {
    let mut events = remote.get_events(user_id)?;
    events.retain(|e| !e.is_generated());
    Ok(Snapshot {
        events,
        templates: remote.get_templates(user_id)?,
        settings: remote.get_display_settings(user_id)?,
    })
}

pub fn push<R: RemoteBackend + ?Sized>(remote: &R, user_id: &str, snapshot: &Snapshot) -> Result<()> {
    remote.save_events(user_id, &snapshot.events)?;
    remote.save_templates(user_id, &snapshot.templates)?;
    remote.save_display_settings(user_id, &snapshot.settings)?;
    info!(
        user_id,
        events = snapshot.events.len(),
        templates = snapshot.templates.len(),
        "pushed to remote"
    );
    Ok(())
}

/// Pushes without failing the caller. Local state stays authoritative either way.
///
/// Returns the error message for display, if the push failed.
pub fn push_best_effort<R: RemoteBackend + ?Sized>(remote: &R, user_id: &str, snapshot: &Snapshot) -> Option<String> {
    match push(remote, user_id, snapshot) {
        Ok(()) => None,
        Err(e) => {
            error!(user_id, "sync to remote failed: {e}");
            Some(e.to_string())
        }
    }
}

pub fn preview(local: &Snapshot, remote: &Snapshot) -> SyncPreview {
    let local_ids: HashSet<&str> = local.events.iter().map(|e| e.id.as_str()).collect();
    let remote_ids: HashSet<&str> = remote.events.iter().map(|e| e.id.as_str()).collect();
    SyncPreview {
        local_events: local.events.len(),
        remote_events: remote.events.len(),
        only_local_events: local_ids.difference(&remote_ids).count(),
        only_remote_events: remote_ids.difference(&local_ids).count(),
        local_templates: local.templates.len(),
        remote_templates: remote.templates.len(),
        settings_differ: local.settings != remote.settings,
    }
}

pub fn resolve(choice: SyncChoice, local: Snapshot, remote: Snapshot) -> Resolution {
    info!(%choice, "resolving sync");
    match choice {
        SyncChoice::Local => Resolution { snapshot: local, push: true },
        SyncChoice::Cloud => Resolution { snapshot: remote, push: false },
        SyncChoice::Merge => {
            let mut seen: HashSet<String> = HashSet::new();
            let templates = local
                .templates
                .into_iter()
                .chain(remote.templates)
                .filter(|t| seen.insert(t.id.clone()))
                .collect();
            Resolution {
                snapshot: Snapshot {
                    events: merge(local.events, remote.events),
                    templates,
                    settings: local.settings,
                },
                push: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventOrigin, LookaheadCount, RepeatType};
    use crate::remote::DirectoryBackend;
    use chrono::NaiveDate;

    fn event(id: &str) -> Event {
        Event {
            id: id.into(),
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            end_date: None,
            time: None,
            end_time: None,
            title: id.into(),
            description: None,
            color: None,
            created_at: String::new(),
            origin: EventOrigin::from_id(id),
        }
    }

    fn template(id: &str) -> Template {
        Template {
            id: id.into(),
            title: id.into(),
            description: None,
            color: None,
            time: None,
            end_time: None,
            start_date: None,
            repeat_type: RepeatType::Day,
            repeat_interval: 1,
            show_on_timeline: true,
        }
    }

    fn sides() -> (Snapshot, Snapshot) {
        let local = Snapshot {
            events: vec![event("1"), event("2")],
            templates: vec![template("a")],
            settings: DisplaySettings { timeline_future_count: LookaheadCount::new(3).unwrap() },
        };
        let remote = Snapshot {
            events: vec![event("2"), event("3")],
            templates: vec![template("a"), template("b")],
            settings: DisplaySettings::default(),
        };
        (local, remote)
    }

    #[test]
    fn preview_counts_differences() {
        let (local, remote) = sides();
        let p = preview(&local, &remote);
        assert_eq!(p.only_local_events, 1);
        assert_eq!(p.only_remote_events, 1);
        assert!(p.settings_differ);
        assert!(!p.in_sync());
        assert!(preview(&local, &local).in_sync());
    }

    #[test]
    fn each_choice_resolves_differently() {
        let (local, remote) = sides();

        let kept = resolve(SyncChoice::Local, local.clone(), remote.clone());
        assert!(kept.push);
        assert_eq!(kept.snapshot, local);

        let taken = resolve(SyncChoice::Cloud, local.clone(), remote.clone());
        assert!(!taken.push);
        assert_eq!(taken.snapshot, remote);

        let merged = resolve(SyncChoice::Merge, local, remote);
        let ids: Vec<&str> = merged.snapshot.events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        let tids: Vec<&str> = merged.snapshot.templates.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(tids, ["a", "b"]);
        assert_eq!(merged.snapshot.settings.timeline_future_count.get(), 3);
    }

    #[test]
    fn fetch_drops_generated_events() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = DirectoryBackend::new(tmp.path());
        backend.save_events("ada", &[event("1"), event("auto-a-20240601-0")]).unwrap();
        let snapshot = fetch(&backend, "ada").unwrap();
        assert_eq!(snapshot.events.len(), 1);
    }

    #[test]
    fn push_then_fetch() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = DirectoryBackend::new(tmp.path());
        let (local, _) = sides();
        assert_eq!(push_best_effort(&backend, "ada", &local), None);
        assert_eq!(fetch(&backend, "ada").unwrap(), local);
        assert!(push_best_effort(&backend, "", &local).is_some());
    }
}
