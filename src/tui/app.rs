use chrono::{Local, NaiveDateTime};
use ratatui::widgets::TableState;

use crate::commands::commit;
use crate::config::Config;
use crate::grouping::{Dated, YearMonthIndex};
use crate::models::{Event, EventDraft, EventPatch, Template, TemplateDraft, TemplatePatch};
use crate::partition::TimelineEntry;
use crate::state::Tracker;
use crate::storage::FileStore;

#[derive(PartialEq)]
pub enum InputMode {
    Normal,
    Editing,
    Adding,
}

#[derive(PartialEq)]
pub enum ViewMode {
    Timeline,
    Templates,
}

#[derive(PartialEq, Clone, Copy)]
pub enum Column {
    Past,
    Upcoming,
}

/// What an in-progress title edit applies to.
pub enum EditTarget {
    Event(String),
    Template(String),
}

/// One line of a timeline column.
#[derive(Debug, Clone)]
pub enum DisplayRow {
    Year(i32),
    Month(u32),
    Marker(NaiveDateTime),
    Event(Event),
}

pub const EVENT_STEPS: [&str; 6] = [
    "Title",
    "Date (YYYY-MM-DD, empty for today)",
    "End date (optional)",
    "Start time HH:MM (optional)",
    "End time HH:MM (optional)",
    "Color (optional)",
];

pub const TEMPLATE_STEPS: [&str; 6] = [
    "Title",
    "Repeat every (hour/day/week/month, empty for day)",
    "Interval (empty for 1)",
    "Start time HH:MM (optional)",
    "End time HH:MM (optional)",
    "Start date (optional, empty for now)",
];

/// Answers collected by the add wizard, one per step.
#[derive(Default)]
pub struct AddState {
    pub step: usize,
    pub answers: Vec<String>,
}

pub struct App {
    config: Config,
    tracker: Tracker<FileStore>,
    pub now: NaiveDateTime,
    pub past_rows: Vec<DisplayRow>,
    pub upcoming_rows: Vec<DisplayRow>,
    pub past_state: TableState,
    pub upcoming_state: TableState,
    pub template_state: TableState,
    pub view_mode: ViewMode,
    pub column: Column,
    pub input_mode: InputMode,
    pub input_buffer: String,
    pub edit_target: Option<EditTarget>,
    pub add_state: AddState,
    /// Last error or sync warning, shown in the help bar.
    pub status: Option<String>,
}

impl App {
    /// Opens a session on the configured store and builds the first view.
    pub fn new(config: Config) -> crate::Result<App> {
        let now = Local::now().naive_local();
        let tracker = Tracker::open_session(config.store(), now, config.retention_days)?;
        let mut app = App {
            config,
            tracker,
            now,
            past_rows: Vec::new(),
            upcoming_rows: Vec::new(),
            past_state: TableState::default(),
            upcoming_state: TableState::default(),
            template_state: TableState::default(),
            view_mode: ViewMode::Timeline,
            column: Column::Upcoming,
            input_mode: InputMode::Normal,
            input_buffer: String::new(),
            edit_target: None,
            add_state: AddState::default(),
            status: None,
        };
        app.reload();
        app.upcoming_state.select(app.marker_position());
        Ok(app)
    }

    pub fn templates(&self) -> &[Template] {
        self.tracker.templates()
    }

    pub fn lookahead(&self) -> usize {
        self.tracker.lookahead().get()
    }

    /// Row index of the current-time marker in the upcoming column.
    pub fn marker_position(&self) -> Option<usize> {
        self.upcoming_rows.iter().position(|r| matches!(r, DisplayRow::Marker(_)))
    }

    /// Rebuilds both columns from the tracker at `self.now`.
    pub fn reload(&mut self) {
        let timeline = self.tracker.timeline(self.now);
        self.past_rows = flatten(&timeline.past, |e| DisplayRow::Event(e.clone()));
        self.upcoming_rows = flatten(&timeline.current_and_future, |entry| match entry {
            TimelineEntry::Marker { at } => DisplayRow::Marker(*at),
            TimelineEntry::Event(e) => DisplayRow::Event(e.clone()),
        });
        clamp_selection(&mut self.past_state, self.past_rows.len());
        clamp_selection(&mut self.upcoming_state, self.upcoming_rows.len());
        clamp_selection(&mut self.template_state, self.tracker.templates().len());
    }

    /// Moves "now" to the wall clock and jumps to the marker.
    pub fn refresh(&mut self) {
        self.now = Local::now().naive_local();
        self.reload();
        self.upcoming_state.select(self.marker_position());
        self.status = None;
    }

    fn active(&mut self) -> (&mut TableState, usize) {
        match (&self.view_mode, self.column) {
            (ViewMode::Templates, _) => (&mut self.template_state, self.tracker.templates().len()),
            (ViewMode::Timeline, Column::Past) => (&mut self.past_state, self.past_rows.len()),
            (ViewMode::Timeline, Column::Upcoming) => (&mut self.upcoming_state, self.upcoming_rows.len()),
        }
    }

    /// Selects the next row in the focused list.
    pub fn next(&mut self) {
        let (state, len) = self.active();
        if len == 0 { return; }
        let i = match state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        state.select(Some(i));
    }

    /// Selects the previous row in the focused list.
    pub fn previous(&mut self) {
        let (state, len) = self.active();
        if len == 0 { return; }
        let i = match state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        state.select(Some(i));
    }

    pub fn switch_column(&mut self) {
        self.column = match self.column {
            Column::Past => Column::Upcoming,
            Column::Upcoming => Column::Past,
        };
    }

    pub fn toggle_view(&mut self) {
        self.view_mode = match self.view_mode {
            ViewMode::Timeline => ViewMode::Templates,
            ViewMode::Templates => ViewMode::Timeline,
        };
    }

    pub fn selected_event(&self) -> Option<&Event> {
        let (state, rows) = match self.column {
            Column::Past => (&self.past_state, &self.past_rows),
            Column::Upcoming => (&self.upcoming_state, &self.upcoming_rows),
        };
        match rows.get(state.selected()?) {
            Some(DisplayRow::Event(e)) => Some(e),
            _ => None,
        }
    }

    fn selected_template_id(&self) -> Option<String> {
        let i = self.template_state.selected()?;
        self.tracker.templates().get(i).map(|t| t.id.clone())
    }

    /// Deletes the selected manual event or template. A generated event
    /// hides its template instead.
    pub fn delete_selected(&mut self) {
        let result = match self.view_mode {
            ViewMode::Timeline => {
                let Some(event) = self.selected_event().cloned() else { return };
                match self.tracker.template_for_event(&event.id).map(|t| (t.id.clone(), t.show_on_timeline)) {
                    Some((template_id, true)) => self.tracker.toggle_template(&template_id).map(|_| ()),
                    Some((_, false)) => Ok(()),
                    None => self.tracker.remove_event(&event.id).map(|_| ()),
                }
            }
            ViewMode::Templates => {
                let Some(id) = self.selected_template_id() else { return };
                self.tracker.remove_template(&id).map(|_| ())
            }
        };
        self.finish(result);
    }

    /// Shows or hides the selected template's instances.
    pub fn toggle_selected_template(&mut self) {
        if self.view_mode != ViewMode::Templates { return; }
        let Some(id) = self.selected_template_id() else { return };
        let result = self.tracker.toggle_template(&id).map(|_| ());
        self.finish(result);
    }

    pub fn increase_lookahead(&mut self) {
        let next = self.tracker.lookahead().increment();
        let result = self.tracker.set_lookahead(next.get() as i64).map(|_| ());
        self.finish(result);
    }

    pub fn decrease_lookahead(&mut self) {
        let next = self.tracker.lookahead().decrement();
        let result = self.tracker.set_lookahead(next.get() as i64).map(|_| ());
        self.finish(result);
    }

    /// Starts the add wizard for the current view.
    pub fn start_add(&mut self) {
        self.input_mode = InputMode::Adding;
        self.add_state = AddState::default();
        self.input_buffer.clear();
    }

    /// Starts editing the title of the selection. Generated events edit their template.
    pub fn start_edit(&mut self) {
        let target = match self.view_mode {
            ViewMode::Timeline => {
                let Some(event) = self.selected_event() else { return };
                match self.tracker.template_for_event(&event.id) {
                    Some(t) => (EditTarget::Template(t.id.clone()), t.title.clone()),
                    None => (EditTarget::Event(event.id.clone()), event.title.clone()),
                }
            }
            ViewMode::Templates => {
                let Some(i) = self.template_state.selected() else { return };
                let Some(t) = self.tracker.templates().get(i) else { return };
                (EditTarget::Template(t.id.clone()), t.title.clone())
            }
        };
        self.edit_target = Some(target.0);
        self.input_buffer = target.1;
        self.input_mode = InputMode::Editing;
    }

    pub fn cancel_input(&mut self) {
        self.input_mode = InputMode::Normal;
        self.input_buffer.clear();
        self.edit_target = None;
    }

    /// Handles Enter in the input box.
    pub fn handle_input(&mut self) {
        match self.input_mode {
            InputMode::Adding => self.handle_adding_input(),
            InputMode::Editing => self.handle_editing_input(),
            InputMode::Normal => {}
        }
    }

    pub fn current_prompt(&self) -> &'static str {
        let steps = match self.view_mode {
            ViewMode::Timeline => &EVENT_STEPS,
            ViewMode::Templates => &TEMPLATE_STEPS,
        };
        steps.get(self.add_state.step).copied().unwrap_or("")
    }

    fn handle_adding_input(&mut self) {
        let answer = self.input_buffer.trim().to_string();
        if self.add_state.step == 0 && answer.is_empty() {
            return;
        }
        self.add_state.answers.push(answer);
        self.add_state.step += 1;
        self.input_buffer.clear();

        let total = match self.view_mode {
            ViewMode::Timeline => EVENT_STEPS.len(),
            ViewMode::Templates => TEMPLATE_STEPS.len(),
        };
        if self.add_state.step < total {
            return;
        }

        let answers = std::mem::take(&mut self.add_state.answers);
        let result = match self.view_mode {
            ViewMode::Timeline => self.tracker.add_event(event_draft(&answers, self.now), Local::now()).map(|_| ()),
            ViewMode::Templates => match template_draft(&answers) {
                Ok(draft) => self.tracker.add_template(draft, Local::now()).map(|_| ()),
                Err(e) => Err(e),
            },
        };
        self.input_mode = InputMode::Normal;
        self.finish(result);
    }

    fn handle_editing_input(&mut self) {
        let title = self.input_buffer.clone();
        let result = match self.edit_target.take() {
            Some(EditTarget::Event(id)) => self
                .tracker
                .update_event(&id, EventPatch { title: Some(title), ..Default::default() })
                .map(|_| ()),
            Some(EditTarget::Template(id)) => self
                .tracker
                .update_template(&id, TemplatePatch { title: Some(title), ..Default::default() })
                .map(|_| ()),
            None => Ok(()),
        };
        self.input_mode = InputMode::Normal;
        self.input_buffer.clear();
        self.finish(result);
    }

    /// Persists after a successful mutation and refreshes the view.
    fn finish(&mut self, result: crate::Result<()>) {
        self.status = match result.and_then(|()| commit(&self.config, &self.tracker)) {
            Ok(None) => None,
            Ok(Some(warning)) => Some(format!("Sync failed, local changes kept: {warning}")),
            Err(e) => Some(e.to_string()),
        };
        self.now = Local::now().naive_local();
        self.reload();
    }
}

fn flatten<T: Dated>(index: &YearMonthIndex<T>, row: impl Fn(&T) -> DisplayRow) -> Vec<DisplayRow> {
    let mut rows = Vec::with_capacity(index.len());
    for year in index.years() {
        rows.push(DisplayRow::Year(year.year));
        for month in &year.months {
            rows.push(DisplayRow::Month(month.month));
            rows.extend(month.items.iter().map(&row));
        }
    }
    rows
}

fn clamp_selection(state: &mut TableState, len: usize) {
    if len == 0 {
        state.select(None);
    } else {
        match state.selected() {
            Some(i) if i >= len => state.select(Some(len - 1)),
            None => state.select(Some(0)),
            _ => {}
        }
    }
}

fn optional(answers: &[String], i: usize) -> Option<String> {
    answers.get(i).filter(|a| !a.is_empty()).cloned()
}

fn event_draft(answers: &[String], now: NaiveDateTime) -> EventDraft {
    EventDraft {
        title: answers.first().cloned().unwrap_or_default(),
        date: optional(answers, 1).unwrap_or_else(|| now.date().to_string()),
        end_date: optional(answers, 2),
        time: optional(answers, 3),
        end_time: optional(answers, 4),
        color: optional(answers, 5),
        description: None,
    }
}

fn template_draft(answers: &[String]) -> crate::Result<TemplateDraft> {
    let mut draft = TemplateDraft {
        title: answers.first().cloned().unwrap_or_default(),
        time: optional(answers, 3),
        end_time: optional(answers, 4),
        start_date: optional(answers, 5),
        ..Default::default()
    };
    if let Some(repeat) = optional(answers, 1) {
        draft.repeat_type = repeat;
    }
    if let Some(interval) = optional(answers, 2) {
        draft.repeat_interval = interval
            .parse()
            .map_err(|_| crate::Error::Validation(crate::error::ValidationError::BadInterval(interval)))?;
    }
    Ok(draft)
}
