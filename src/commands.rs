use std::io::{self, Write};

use chrono::{Local, NaiveDateTime};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use crate::clock::is_in_progress;
use crate::config::Config;
use crate::grouping::YearMonthIndex;
use crate::models::{format_hhmm, Event, EventDraft, EventPatch, TemplateDraft, TemplatePatch};
use crate::partition::TimelineEntry;
use crate::session;
use crate::state::Tracker;
use crate::storage::{self, FileStore};
use crate::sync::{self, SyncChoice};

/// Opens the local store and starts a session (runs retention once).
pub fn open_tracker(config: &Config, silent: bool) -> Option<Tracker<FileStore>> {
    match Tracker::open_session(config.store(), Local::now().naive_local(), config.retention_days) {
        Ok(t) => Some(t),
        Err(e) => {
            if !silent { eprintln!("Failed to open timeline data: {}", e); }
            None
        }
    }
}

/// Saves locally, then pushes to the remote when signed in.
///
/// Local data stays as saved even if the push fails; the push error is
/// returned as a warning rather than an error.
pub fn commit(config: &Config, tracker: &Tracker<FileStore>) -> crate::Result<Option<String>> {
    tracker.persist(Local::now().naive_local())?;
    Ok(session::current_user(tracker.store())
        .and_then(|user| sync::push_best_effort(&config.remote(), &user, &tracker.snapshot())))
}

fn save(config: &Config, tracker: &Tracker<FileStore>, silent: bool) -> bool {
    match commit(config, tracker) {
        Ok(warning) => {
            if let Some(err) = warning {
                if !silent { eprintln!("Sync failed, local changes kept: {}", err); }
            }
            true
        }
        Err(e) => {
            if !silent { eprintln!("Failed to save: {}", e); }
            false
        }
    }
}

/// Adds a new manual event.
pub fn cmd_add(config: &Config, draft: EventDraft, silent: bool) {
    let Some(mut tracker) = open_tracker(config, silent) else { return };
    match tracker.add_event(draft, Local::now()) {
        Ok(event) => {
            if save(config, &tracker, silent) && !silent {
                println!("Event added (id = {})", event.id);
            }
        }
        Err(e) => { if !silent { eprintln!("Cannot add event: {}", e); } }
    }
}

/// Edits a manual event. Generated events point the user at their template.
pub fn cmd_edit(config: &Config, id: &str, patch: EventPatch, silent: bool) {
    let Some(mut tracker) = open_tracker(config, silent) else { return };
    if let Some(template) = tracker.template_for_event(id) {
        if !silent {
            eprintln!("Event {} is generated by template '{}' ({}). Edit the template instead.", id, template.title, template.id);
        }
        return;
    }
    match tracker.update_event(id, patch) {
        Ok(_) => {
            if save(config, &tracker, silent) && !silent {
                println!("Event {} updated.", id);
            }
        }
        Err(e) => { if !silent { eprintln!("Cannot update event {}: {}", id, e); } }
    }
}

/// Removes a manual event.
pub fn cmd_remove(config: &Config, id: &str, silent: bool) {
    let Some(mut tracker) = open_tracker(config, silent) else { return };
    if let Some(template) = tracker.template_for_event(id) {
        if !silent {
            eprintln!("Event {} is generated by template '{}'. Hide it with `timeliner template toggle {}`.", id, template.title, template.id);
        }
        return;
    }
    match tracker.remove_event(id) {
        Ok(_) => {
            if save(config, &tracker, silent) && !silent {
                println!("Event {} removed.", id);
            }
        }
        Err(e) => { if !silent { eprintln!("Cannot remove event: {}", e); } }
    }
}

/// Prints the timeline: the current and future column, and the past column on request.
pub fn cmd_show(config: &Config, show_past: bool) {
    let Some(tracker) = open_tracker(config, false) else { return };
    let now = Local::now().naive_local();
    let timeline = tracker.timeline(now);

    if show_past {
        if timeline.past.is_empty() {
            println!("No past events.");
        } else {
            let past = past_table(&timeline.past);
            println!("Past\n{past}");
        }
    }
    let upcoming = upcoming_table(&timeline.current_and_future, now);
    println!("Now & Upcoming\n{upcoming}");
}

/// Renders the past column.
pub fn past_table(index: &YearMonthIndex<Event>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Date").add_attribute(Attribute::Bold),
            Cell::new("Time").add_attribute(Attribute::Bold),
            Cell::new("Title").add_attribute(Attribute::Bold),
            Cell::new("ID").add_attribute(Attribute::Bold),
        ]);
    for year in index.years() {
        for month in &year.months {
            table.add_row(vec![Cell::new(format!("{}-{:02}", year.year, month.month)).add_attribute(Attribute::Bold)]);
            for event in &month.items {
                table.add_row(vec![
                    Cell::new(date_span(event)).fg(Color::DarkGrey),
                    Cell::new(time_span(event)).fg(Color::DarkGrey),
                    Cell::new(&event.title).fg(Color::DarkGrey),
                    Cell::new(&event.id).fg(Color::DarkGrey),
                ]);
            }
        }
    }
    table
}

/// Renders the current and future column, with the "now" divider.
pub fn upcoming_table(index: &YearMonthIndex<TimelineEntry>, now: NaiveDateTime) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Date").add_attribute(Attribute::Bold),
            Cell::new("Time").add_attribute(Attribute::Bold),
            Cell::new("Title").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
            Cell::new("ID").add_attribute(Attribute::Bold),
        ]);
    for year in index.years() {
        for month in &year.months {
            table.add_row(vec![Cell::new(format!("{}-{:02}", year.year, month.month)).add_attribute(Attribute::Bold)]);
            for entry in &month.items {
                match entry {
                    TimelineEntry::Marker { at } => {
                        table.add_row(vec![
                            Cell::new(at.date()).fg(Color::Green).add_attribute(Attribute::Bold),
                            Cell::new(at.format("%H:%M")).fg(Color::Green).add_attribute(Attribute::Bold),
                            Cell::new("── now ──").fg(Color::Green).add_attribute(Attribute::Bold),
                            Cell::new(""),
                            Cell::new(""),
                        ]);
                    }
                    TimelineEntry::Event(event) => {
                        let running = is_in_progress(event, now);
                        let (status, status_color) = if running {
                            ("In progress", Color::Yellow)
                        } else {
                            ("Upcoming", Color::Reset)
                        };
                        let title = if event.is_generated() { format!("{} ↻", event.title) } else { event.title.clone() };
                        table.add_row(vec![
                            Cell::new(date_span(event)),
                            Cell::new(time_span(event)),
                            Cell::new(title).fg(event_color(event.color.as_deref())),
                            Cell::new(status).fg(status_color),
                            Cell::new(&event.id),
                        ]);
                    }
                }
            }
        }
    }
    table
}

fn date_span(event: &Event) -> String {
    match event.end_date {
        Some(end) if end != event.date => format!("{} → {}", event.date, end),
        _ => event.date.to_string(),
    }
}

fn time_span(event: &Event) -> String {
    match (event.time, event.end_time) {
        (Some(s), Some(e)) => format!("{}-{}", format_hhmm(s), format_hhmm(e)),
        (Some(s), None) => format_hhmm(s),
        (None, Some(e)) => format!("until {}", format_hhmm(e)),
        (None, None) => "all day".to_string(),
    }
}

/// Maps a stored colour (named or `#rrggbb`) to a terminal colour.
pub fn event_color(color: Option<&str>) -> Color {
    let Some(color) = color else { return Color::Reset };
    if let Some(hex) = color.strip_prefix('#') {
        if hex.len() == 6 {
            if let (Ok(r), Ok(g), Ok(b)) = (
                u8::from_str_radix(&hex[0..2], 16),
                u8::from_str_radix(&hex[2..4], 16),
                u8::from_str_radix(&hex[4..6], 16),
            ) {
                return Color::Rgb { r, g, b };
            }
        }
        return Color::Reset;
    }
    match color.to_lowercase().as_str() {
        "blue" => Color::Blue,
        "green" => Color::Green,
        "purple" => Color::Magenta,
        "orange" => Color::DarkYellow,
        "red" => Color::Red,
        "pink" => Color::Rgb { r: 236, g: 72, b: 153 },
        "yellow" => Color::Yellow,
        _ => Color::Reset,
    }
}

/// Adds a new template.
pub fn cmd_template_add(config: &Config, draft: TemplateDraft, silent: bool) {
    let Some(mut tracker) = open_tracker(config, silent) else { return };
    match tracker.add_template(draft, Local::now()) {
        Ok(t) => {
            if save(config, &tracker, silent) && !silent {
                println!("Template '{}' added (id = {}).", t.title, t.id);
            }
        }
        Err(e) => { if !silent { eprintln!("Cannot add template: {}", e); } }
    }
}

/// Lists all templates.
pub fn cmd_template_list(config: &Config) {
    let Some(tracker) = open_tracker(config, false) else { return };
    if tracker.templates().is_empty() {
        println!("No templates found.");
        return;
    }
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["ID", "Title", "Repeats", "Time", "Starts", "Shown"]);
    for t in tracker.templates() {
        let time = match (t.time, t.end_time) {
            (Some(s), Some(e)) => format!("{}-{}", format_hhmm(s), format_hhmm(e)),
            (Some(s), None) => format_hhmm(s),
            (None, Some(e)) => format!("until {}", format_hhmm(e)),
            (None, None) => "-".into(),
        };
        table.add_row(vec![
            Cell::new(&t.id),
            Cell::new(&t.title).fg(event_color(t.color.as_deref())),
            Cell::new(format!("every {} {}", t.repeat_interval, t.repeat_type)),
            Cell::new(time),
            Cell::new(t.start_date.map(|d| d.to_string()).unwrap_or_else(|| "now".into())),
            Cell::new(if t.show_on_timeline { "yes" } else { "no" })
                .fg(if t.show_on_timeline { Color::Green } else { Color::DarkGrey }),
        ]);
    }
    println!("{table}");
    println!("Each shown template materializes {} instance(s).", tracker.lookahead());
}

/// Edits a template.
pub fn cmd_template_edit(config: &Config, id: &str, patch: TemplatePatch, silent: bool) {
    let Some(mut tracker) = open_tracker(config, silent) else { return };
    match tracker.update_template(id, patch) {
        Ok(t) => {
            if save(config, &tracker, silent) && !silent {
                println!("Template '{}' updated.", t.title);
            }
        }
        Err(e) => { if !silent { eprintln!("Cannot update template {}: {}", id, e); } }
    }
}

/// Removes a template. Its instances disappear from the timeline.
pub fn cmd_template_remove(config: &Config, id: &str, silent: bool) {
    let Some(mut tracker) = open_tracker(config, silent) else { return };
    match tracker.remove_template(id) {
        Ok(t) => {
            if save(config, &tracker, silent) && !silent {
                println!("Template '{}' removed.", t.title);
            }
        }
        Err(e) => { if !silent { eprintln!("Cannot remove template: {}", e); } }
    }
}

/// Shows or hides a template's instances on the timeline.
pub fn cmd_template_toggle(config: &Config, id: &str, silent: bool) {
    let Some(mut tracker) = open_tracker(config, silent) else { return };
    match tracker.toggle_template(id) {
        Ok(shown) => {
            if save(config, &tracker, silent) && !silent {
                println!("Template {} is now {}.", id, if shown { "shown" } else { "hidden" });
            }
        }
        Err(e) => { if !silent { eprintln!("Cannot toggle template: {}", e); } }
    }
}

/// Prints or sets how many instances each template materializes.
pub fn cmd_lookahead(config: &Config, count: Option<i64>, silent: bool) {
    let Some(mut tracker) = open_tracker(config, silent) else { return };
    let Some(count) = count else {
        if !silent { println!("{}", tracker.lookahead()); }
        return;
    };
    match tracker.set_lookahead(count) {
        Ok(n) => {
            if save(config, &tracker, silent) && !silent {
                println!("Lookahead set to {}.", n);
            }
        }
        Err(e) => { if !silent { eprintln!("Cannot set lookahead: {}", e); } }
    }
}

/// Signs in as `user`. Later changes are pushed to that user's remote document.
pub fn cmd_login(config: &Config, user: &str, silent: bool) {
    match session::sign_in(&config.store(), user) {
        Ok(()) => { if !silent { println!("Signed in as {}.", user.trim()); } }
        Err(e) => { if !silent { eprintln!("Sign-in failed: {}", e); } }
    }
}

pub fn cmd_logout(config: &Config, silent: bool) {
    match session::sign_out(&config.store()) {
        Ok(()) => { if !silent { println!("Signed out."); } }
        Err(e) => { if !silent { eprintln!("Sign-out failed: {}", e); } }
    }
}

/// Compares local data with the remote copy.
pub fn cmd_sync_status(config: &Config) {
    let Some(tracker) = open_tracker(config, false) else { return };
    let user = match session::require_user(tracker.store()) {
        Ok(u) => u,
        Err(e) => {
            eprintln!("{}. Run `timeliner login <user>` first.", e);
            return;
        }
    };
    let remote = match sync::fetch(&config.remote(), &user) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Could not read remote data: {}", e);
            return;
        }
    };
    let p = sync::preview(&tracker.snapshot(), &remote);
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["", "Local", "Cloud"]);
    table.add_row(vec![Cell::new("Events"), Cell::new(p.local_events), Cell::new(p.remote_events)]);
    table.add_row(vec![Cell::new("Only here"), Cell::new(p.only_local_events), Cell::new(p.only_remote_events)]);
    table.add_row(vec![Cell::new("Templates"), Cell::new(p.local_templates), Cell::new(p.remote_templates)]);
    println!("Signed in as {}", user);
    println!("{table}");
    match config.remote().updated_at(&user) {
        Ok(Some(at)) => println!("Cloud last updated: {}", at),
        Ok(None) => println!("Nothing in the cloud yet."),
        Err(e) => eprintln!("Could not read cloud timestamp: {}", e),
    }
    if p.in_sync() {
        println!("Local and cloud data match.");
    } else {
        println!("Choose one: `timeliner sync push` (keep local), `timeliner sync pull` (keep cloud) or `timeliner sync merge`.");
    }
}

/// Applies the caller's choice between local and cloud data.
pub fn cmd_sync(config: &Config, choice: SyncChoice, silent: bool) {
    let Some(mut tracker) = open_tracker(config, silent) else { return };
    let user = match session::require_user(tracker.store()) {
        Ok(u) => u,
        Err(e) => {
            if !silent { eprintln!("{}. Run `timeliner login <user>` first.", e); }
            return;
        }
    };
    let remote_backend = config.remote();
    let remote = match sync::fetch(&remote_backend, &user) {
        Ok(s) => s,
        Err(e) => {
            if !silent { eprintln!("Could not read remote data: {}", e); }
            return;
        }
    };
    let resolution = sync::resolve(choice, tracker.snapshot(), remote);
    tracker.replace(resolution.snapshot);
    if let Err(e) = tracker.persist(Local::now().naive_local()) {
        if !silent { eprintln!("Failed to save: {}", e); }
        return;
    }
    if resolution.push {
        if let Err(e) = sync::push(&remote_backend, &user, &tracker.snapshot()) {
            if !silent { eprintln!("Sync failed, local data kept: {}", e); }
            return;
        }
    }
    if !silent {
        println!(
            "Synced ({}): {} events, {} templates.",
            choice,
            tracker.events().len(),
            tracker.templates().len()
        );
    }
}

/// Resets local data by deleting all events, templates and settings.
pub fn cmd_reset(config: &Config, force: bool) {
    if !force {
        print!("Are you sure you want to delete all local events, templates and settings? This cannot be undone. [y/N] ");
        let _ = io::stdout().flush();
        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() || input.trim().to_lowercase() != "y" {
            println!("Aborted.");
            return;
        }
    }

    let store = config.store();
    if let Err(e) = storage::clear(&store) {
        eprintln!("Failed to reset local data: {}", e);
    } else {
        println!("Local data in {} reset successfully.", store.dir().display());
    }
}

pub fn cmd_version() {
    println!("timeliner {}", env!("CARGO_PKG_VERSION"));
}
