use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Id prefix shared by every event expanded from a template.
pub const GENERATED_ID_PREFIX: &str = "auto-";

/// Reserved id of the "now" divider on the timeline. Never persisted.
pub const CURRENT_TIME_ID: &str = "current-time";

/// Where an event came from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EventOrigin {
    /// Entered by the user.
    #[default]
    Manual,
    /// The `index`-th instance expanded from a template.
    #[serde(rename_all = "camelCase")]
    Generated { template_id: String, index: usize },
}

impl EventOrigin {
    pub fn is_manual(&self) -> bool {
        matches!(self, EventOrigin::Manual)
    }

    /// Recovers the origin of an event persisted without an origin tag.
    ///
    /// Generated ids look like `auto-{templateId}-{YYYYMMDD}-{index}`. The
    /// template id may itself contain dashes, so the id is split from the right.
    pub fn from_id(id: &str) -> EventOrigin {
        let Some(rest) = id.strip_prefix(GENERATED_ID_PREFIX) else {
            return EventOrigin::Manual;
        };
        let mut parts = rest.rsplitn(3, '-');
        let index = parts.next().and_then(|i| i.parse::<usize>().ok());
        let stamp = parts.next().filter(|s| s.len() == 8 && s.chars().all(|c| c.is_ascii_digit()));
        let template_id = parts.next();
        match (template_id, stamp, index) {
            (Some(template_id), Some(_), Some(index)) => EventOrigin::Generated {
                template_id: template_id.to_string(),
                index,
            },
            _ => EventOrigin::Generated { template_id: rest.to_string(), index: 0 },
        }
    }
}

/// Builds the composite id of a generated instance.
pub fn generated_id(template_id: &str, date: NaiveDate, index: usize) -> String {
    format!("{}{}-{}-{}", GENERATED_ID_PREFIX, template_id, date.format("%Y%m%d"), index)
}

/// A dated occurrence on the timeline.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique identifier. Timestamp digits for manual events.
    pub id: String,
    /// First day of the event.
    pub date: NaiveDate,
    /// Last day of the event; a missing value means single-day.
    #[serde(default, with = "opt_date", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, with = "hhmm", skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    #[serde(default, with = "hhmm", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<NaiveTime>,
    pub title: String,
    #[serde(default, with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Named colour or `#rrggbb`.
    #[serde(default, with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Creation timestamp (RFC 3339). Informational only.
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "EventOrigin::is_manual")]
    pub origin: EventOrigin,
}

impl Event {
    pub fn is_generated(&self) -> bool {
        !self.origin.is_manual()
    }

    /// The template this event was expanded from, if any.
    pub fn template_id(&self) -> Option<&str> {
        match &self.origin {
            EventOrigin::Generated { template_id, .. } => Some(template_id),
            EventOrigin::Manual => None,
        }
    }

    /// Fills in `origin` for events stored before the tag existed.
    pub fn normalize_origin(&mut self) {
        if self.origin.is_manual() {
            self.origin = EventOrigin::from_id(&self.id);
        }
    }
}

/// Unit of a template's repeat step.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepeatType {
    Hour,
    #[default]
    Day,
    Week,
    Month,
}

impl FromStr for RepeatType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hour" | "hourly" => Ok(RepeatType::Hour),
            "day" | "daily" => Ok(RepeatType::Day),
            "week" | "weekly" => Ok(RepeatType::Week),
            "month" | "monthly" => Ok(RepeatType::Month),
            _ => Err(ValidationError::BadRepeatType(s.to_string())),
        }
    }
}

impl fmt::Display for RepeatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RepeatType::Hour => "hour",
            RepeatType::Day => "day",
            RepeatType::Week => "week",
            RepeatType::Month => "month",
        };
        f.write_str(s)
    }
}

/// A recurrence rule from which events are generated on demand.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub title: String,
    #[serde(default, with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, with = "hhmm", skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    #[serde(default, with = "hhmm", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<NaiveTime>,
    /// Anchor date of the first instance. Defaults to "now" when absent.
    #[serde(default, with = "opt_date", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    pub repeat_type: RepeatType,
    pub repeat_interval: u32,
    /// Hidden templates persist but produce no timeline events.
    #[serde(default)]
    pub show_on_timeline: bool,
}

/// How many instances each template materializes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(from = "i64", into = "i64")]
pub struct LookaheadCount(u8);

impl LookaheadCount {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 20;

    pub fn new(count: i64) -> Result<Self, ValidationError> {
        if count < Self::MIN as i64 || count > Self::MAX as i64 {
            return Err(ValidationError::LookaheadOutOfRange {
                got: count,
                min: Self::MIN,
                max: Self::MAX,
            });
        }
        Ok(LookaheadCount(count as u8))
    }

    /// Forces an arbitrary stored value into range.
    pub fn clamped(count: i64) -> Self {
        LookaheadCount(count.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }

    pub fn increment(self) -> Self {
        Self::clamped(self.0 as i64 + 1)
    }

    pub fn decrement(self) -> Self {
        Self::clamped(self.0 as i64 - 1)
    }
}

impl Default for LookaheadCount {
    fn default() -> Self {
        LookaheadCount(Self::MIN)
    }
}

impl From<i64> for LookaheadCount {
    fn from(count: i64) -> Self {
        Self::clamped(count)
    }
}

impl From<LookaheadCount> for i64 {
    fn from(count: LookaheadCount) -> Self {
        count.0 as i64
    }
}

impl fmt::Display for LookaheadCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-user display preferences mirrored to the remote backend.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySettings {
    #[serde(default)]
    pub timeline_future_count: LookaheadCount,
}

/// Raw form input for a manual event.
#[derive(Debug, Clone, Default)]
pub struct EventDraft {
    pub date: String,
    pub end_date: Option<String>,
    pub time: Option<String>,
    pub end_time: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub color: Option<String>,
}

impl EventDraft {
    pub fn from_event(event: &Event) -> Self {
        EventDraft {
            date: event.date.to_string(),
            end_date: event.end_date.map(|d| d.to_string()),
            time: event.time.map(format_hhmm),
            end_time: event.end_time.map(format_hhmm),
            title: event.title.clone(),
            description: event.description.clone(),
            color: event.color.clone(),
        }
    }

    /// Checks the form and builds a manual event.
    pub fn into_event(self, id: String, created_at: DateTime<Local>) -> Result<Event, ValidationError> {
        let date_raw = self.date.trim();
        if date_raw.is_empty() {
            return Err(ValidationError::MissingDate);
        }
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ValidationError::MissingTitle);
        }
        let date = parse_date(date_raw)?;
        let end_date = non_empty(self.end_date).map(|d| parse_date(&d)).transpose()?;
        let time = non_empty(self.time).map(|t| parse_hhmm(&t)).transpose()?;
        let end_time = non_empty(self.end_time).map(|t| parse_hhmm(&t)).transpose()?;

        if let Some(end) = end_date {
            if end < date {
                return Err(ValidationError::EndDateBeforeStart);
            }
        }
        check_time_order(time, end_time)?;

        Ok(Event {
            id,
            date,
            end_date,
            time,
            end_time,
            title: title.to_string(),
            description: non_empty(self.description),
            color: non_empty(self.color),
            created_at: created_at.to_rfc3339(),
            origin: EventOrigin::Manual,
        })
    }
}

/// Partial update of a manual event. `Some("")` clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    pub date: Option<String>,
    pub end_date: Option<String>,
    pub time: Option<String>,
    pub end_time: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
}

impl EventPatch {
    pub fn apply(self, event: &Event) -> Result<Event, ValidationError> {
        let mut draft = EventDraft::from_event(event);
        if let Some(d) = self.date { draft.date = d; }
        if let Some(d) = self.end_date { draft.end_date = Some(d); }
        if let Some(t) = self.time { draft.time = Some(t); }
        if let Some(t) = self.end_time { draft.end_time = Some(t); }
        if let Some(t) = self.title { draft.title = t; }
        if let Some(d) = self.description { draft.description = Some(d); }
        if let Some(c) = self.color { draft.color = Some(c); }

        let mut updated = draft.into_event(event.id.clone(), Local::now())?;
        updated.created_at = event.created_at.clone();
        Ok(updated)
    }
}

/// Raw form input for a template.
#[derive(Debug, Clone)]
pub struct TemplateDraft {
    pub title: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub time: Option<String>,
    pub end_time: Option<String>,
    pub start_date: Option<String>,
    pub repeat_type: String,
    pub repeat_interval: i64,
    pub show_on_timeline: bool,
}

impl Default for TemplateDraft {
    fn default() -> Self {
        TemplateDraft {
            title: String::new(),
            description: None,
            color: None,
            time: None,
            end_time: None,
            start_date: None,
            repeat_type: RepeatType::Day.to_string(),
            repeat_interval: 1,
            show_on_timeline: true,
        }
    }
}

impl TemplateDraft {
    pub fn from_template(template: &Template) -> Self {
        TemplateDraft {
            title: template.title.clone(),
            description: template.description.clone(),
            color: template.color.clone(),
            time: template.time.map(format_hhmm),
            end_time: template.end_time.map(format_hhmm),
            start_date: template.start_date.map(|d| d.to_string()),
            repeat_type: template.repeat_type.to_string(),
            repeat_interval: template.repeat_interval as i64,
            show_on_timeline: template.show_on_timeline,
        }
    }

    pub fn into_template(self, id: String) -> Result<Template, ValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ValidationError::MissingTitle);
        }
        let repeat_type: RepeatType = self.repeat_type.parse()?;
        if self.repeat_interval < 1 {
            return Err(ValidationError::ZeroInterval);
        }
        let repeat_interval = u32::try_from(self.repeat_interval)
            .map_err(|_| ValidationError::BadInterval(self.repeat_interval.to_string()))?;
        let time = non_empty(self.time).map(|t| parse_hhmm(&t)).transpose()?;
        let end_time = non_empty(self.end_time).map(|t| parse_hhmm(&t)).transpose()?;
        check_time_order(time, end_time)?;
        let start_date = non_empty(self.start_date).map(|d| parse_date(&d)).transpose()?;

        Ok(Template {
            id,
            title: title.to_string(),
            description: non_empty(self.description),
            color: non_empty(self.color),
            time,
            end_time,
            start_date,
            repeat_type,
            repeat_interval,
            show_on_timeline: self.show_on_timeline,
        })
    }
}

/// Partial update of a template. `Some("")` clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct TemplatePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub time: Option<String>,
    pub end_time: Option<String>,
    pub start_date: Option<String>,
    pub repeat_type: Option<String>,
    pub repeat_interval: Option<i64>,
}

impl TemplatePatch {
    pub fn apply(self, template: &Template) -> Result<Template, ValidationError> {
        let mut draft = TemplateDraft::from_template(template);
        if let Some(t) = self.title { draft.title = t; }
        if let Some(d) = self.description { draft.description = Some(d); }
        if let Some(c) = self.color { draft.color = Some(c); }
        if let Some(t) = self.time { draft.time = Some(t); }
        if let Some(t) = self.end_time { draft.end_time = Some(t); }
        if let Some(d) = self.start_date { draft.start_date = Some(d); }
        if let Some(r) = self.repeat_type { draft.repeat_type = r; }
        if let Some(i) = self.repeat_interval { draft.repeat_interval = i; }
        draft.into_template(template.id.clone())
    }
}

fn check_time_order(time: Option<NaiveTime>, end_time: Option<NaiveTime>) -> Result<(), ValidationError> {
    match (time, end_time) {
        (Some(start), Some(end)) if end <= start => Err(ValidationError::EndTimeNotAfterStart),
        _ => Ok(()),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| ValidationError::BadDate(raw.to_string()))
}

pub fn parse_hhmm(raw: &str) -> Result<NaiveTime, ValidationError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|_| ValidationError::BadTime(raw.to_string()))
}

pub fn format_hhmm(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// `HH:mm` strings; an empty string reads as absent.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => s.serialize_str(&super::format_hhmm(*t)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => super::parse_hhmm(s).map(Some).map_err(serde::de::Error::custom),
        }
    }
}

/// `YYYY-MM-DD` strings; an empty string reads as absent.
mod opt_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_str(&d.format("%Y-%m-%d").to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => super::parse_date(s).map(Some).map_err(serde::de::Error::custom),
        }
    }
}

mod opt_text {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => s.serialize_str(v),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        Ok(raw.filter(|v| !v.trim().is_empty()))
    }
}
