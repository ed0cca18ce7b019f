use chrono::{DateTime, Local, NaiveDateTime};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{
    DisplaySettings, Event, EventDraft, EventOrigin, EventPatch, LookaheadCount, Template, TemplateDraft,
    TemplatePatch,
};
use crate::retention::prune;
use crate::storage::{self, KeyValueStore};
use crate::sync::Snapshot;
use crate::timeline::{self, Timeline};

/// In-memory state of one session, backed by a local store.
///
/// Mutations change memory only; call [`Tracker::persist`] to write them out.
pub struct Tracker<S: KeyValueStore> {
    store: S,
    events: Vec<Event>,
    templates: Vec<Template>,
    lookahead: LookaheadCount,
}

impl<S: KeyValueStore> Tracker<S> {
    /// Loads everything from `store` without touching it.
    pub fn load(store: S) -> Self {
        let events = storage::load_events(&store);
        let templates = storage::load_templates(&store);
        let lookahead = storage::load_lookahead(&store);
        debug!(events = events.len(), templates = templates.len(), %lookahead, "loaded local state");
        Tracker { store, events, templates, lookahead }
    }

    /// Loads and runs the retention policy once, persisting if anything expired.
    pub fn open_session(store: S, now: NaiveDateTime, horizon_days: i64) -> Result<Self> {
        let mut tracker = Self::load(store);
        let before = tracker.events.len();
        tracker.events = prune(std::mem::take(&mut tracker.events), now, horizon_days);
        if tracker.events.len() != before {
            tracker.persist(now)?;
        }
        Ok(tracker)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Manual events.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn lookahead(&self) -> LookaheadCount {
        self.lookahead
    }

    pub fn timeline(&self, now: NaiveDateTime) -> Timeline {
        timeline::build(&self.events, &self.templates, self.lookahead, now)
    }

    pub fn find_event(&self, id: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn find_template(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// The template a generated event was expanded from. Edits to generated
    /// events go to their template.
    pub fn template_for_event(&self, event_id: &str) -> Option<&Template> {
        match EventOrigin::from_id(event_id) {
            EventOrigin::Generated { template_id, .. } => self.find_template(&template_id),
            EventOrigin::Manual => None,
        }
    }

    pub fn add_event(&mut self, draft: EventDraft, now: DateTime<Local>) -> Result<Event> {
        let id = self.next_id(now);
        let event = draft.into_event(id, now)?;
        self.events.push(event.clone());
        Ok(event)
    }

    pub fn update_event(&mut self, id: &str, patch: EventPatch) -> Result<Event> {
        let slot = self
            .events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| Error::NotFound(format!("event {id}")))?;
        let updated = patch.apply(slot)?;
        *slot = updated.clone();
        Ok(updated)
    }

    pub fn remove_event(&mut self, id: &str) -> Result<Event> {
        let pos = self
            .events
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| Error::NotFound(format!("event {id}")))?;
        Ok(self.events.remove(pos))
    }

    pub fn add_template(&mut self, draft: TemplateDraft, now: DateTime<Local>) -> Result<Template> {
        let id = self.next_id(now);
        let template = draft.into_template(id)?;
        self.templates.push(template.clone());
        Ok(template)
    }

    pub fn update_template(&mut self, id: &str, patch: TemplatePatch) -> Result<Template> {
        let slot = self.template_mut(id)?;
        let updated = patch.apply(slot)?;
        *slot = updated.clone();
        Ok(updated)
    }

    pub fn remove_template(&mut self, id: &str) -> Result<Template> {
        let pos = self
            .templates
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| Error::NotFound(format!("template {id}")))?;
        Ok(self.templates.remove(pos))
    }

    /// Flips whether the template shows on the timeline; returns the new value.
    pub fn toggle_template(&mut self, id: &str) -> Result<bool> {
        let slot = self.template_mut(id)?;
        slot.show_on_timeline = !slot.show_on_timeline;
        Ok(slot.show_on_timeline)
    }

    pub fn set_lookahead(&mut self, count: i64) -> Result<LookaheadCount> {
        self.lookahead = LookaheadCount::new(count)?;
        Ok(self.lookahead)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            events: self.events.clone(),
            templates: self.templates.clone(),
            settings: DisplaySettings { timeline_future_count: self.lookahead },
        }
    }

    /// Adopts a snapshot, e.g. after choosing the cloud copy.
    pub fn replace(&mut self, snapshot: Snapshot) {
        self.events = snapshot.events.into_iter().filter(|e| !e.is_generated()).collect();
        self.templates = snapshot.templates;
        self.lookahead = snapshot.settings.timeline_future_count;
    }

    /// Writes events (with the current generated instances), templates and lookahead.
    pub fn persist(&self, now: NaiveDateTime) -> Result<()> {
        let all = timeline::materialize(&self.events, &self.templates, self.lookahead, now);
        storage::save_events(&self.store, &all)?;
        storage::save_templates(&self.store, &self.templates)?;
        storage::save_lookahead(&self.store, self.lookahead)?;
        Ok(())
    }

    fn template_mut(&mut self, id: &str) -> Result<&mut Template> {
        self.templates
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::NotFound(format!("template {id}")))
    }

    /// Millisecond timestamp, bumped until unused.
    fn next_id(&self, now: DateTime<Local>) -> String {
        let mut candidate = now.timestamp_millis();
        loop {
            let id = candidate.to_string();
            let taken = self.events.iter().any(|e| e.id == id) || self.templates.iter().any(|t| t.id == id);
            if !taken {
                return id;
            }
            candidate += 1;
        }
    }
}
