//! # Timeliner
//!
//! A terminal personal timeline. Events sit on a two-column timeline: what
//! already happened on the left, and what is happening now or coming up on the
//! right, split by a "now" marker and grouped by year and month. Recurring
//! templates (hourly, daily, weekly, monthly) fill the timeline with their next
//! few occurrences.
//!
//! ## Usage
//!
//! ### Interactive Mode (TUI)
//!
//! Run without arguments to open the timeline:
//!
//! ```bash
//! timeliner
//! # or explicitly
//! timeliner ui
//! ```
//!
//! #### TUI Key Bindings
//!
//! *   `q`: Quit
//! *   `j`/`k`: Move selection
//! *   `Tab`: Switch between the Past and Now & Upcoming columns
//! *   `a`: Add an event (or a template in the Templates view)
//! *   `e`: Edit title (a generated event edits its template)
//! *   `d`: Delete selected (a generated event hides its template)
//! *   `t`: Switch to/from the Templates view
//! *   `Space`: Show/hide the selected template on the timeline
//! *   `+`/`-`: More/fewer upcoming occurrences per template (1 to 20)
//! *   `r`: Refresh "now"
//!
//! ### Command Line Interface (CLI)
//!
//! ```bash
//! timeliner add "Dentist" --date 2025-03-14 --time 09:30 --end-time 10:15
//! timeliner add "Holiday" --date 2025-08-01 --end-date 2025-08-14 --color green
//! timeliner show --past
//!
//! timeliner template add "Gym" --every week --time 18:00 --end-time 19:00
//! timeliner template toggle <ID>
//! timeliner lookahead 5
//! ```
//!
//! **Sync**
//! ```bash
//! timeliner login alice
//! timeliner sync status
//! timeliner sync merge    # or push (keep local) / pull (keep cloud)
//! ```
//!
//! ## Data Storage
//!
//! Data is saved as JSON in your local data directory:
//! *   Linux: `~/.local/share/timeliner/`
//! *   macOS: `~/Library/Application Support/timeliner/`
//! *   Windows: `%LOCALAPPDATA%\timeliner\`
//!
//! Override it with `TIMELINER_DATA_DIR`. An optional `config.toml` in that
//! directory sets `remote_dir`, `retention_days` and `log_filter`.
//! Manual events that ended more than `retention_days` (default 14) ago are
//! removed when a session starts.

use std::fs::{self, OpenOptions};
use std::io;
use std::sync::Mutex;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::EnvFilter;

use timeliner::commands::*;
use timeliner::config::Config;
use timeliner::models::{EventDraft, EventPatch, TemplateDraft, TemplatePatch};
use timeliner::sync::SyncChoice;
use timeliner::tui::run_tui;

#[derive(Parser)]
#[command(name = "timeliner")]
#[command(about = "Personal timeline with recurring events", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new event
    Add {
        /// Event title (quoted if it has spaces)
        title: String,
        /// Start date in YYYY-MM-DD (defaults to today)
        #[arg(short, long)]
        date: Option<String>,
        /// Last day of a multi-day event
        #[arg(short, long)]
        end_date: Option<String>,
        /// Start time HH:MM
        #[arg(short, long)]
        time: Option<String>,
        /// End time HH:MM
        #[arg(short = 'T', long)]
        end_time: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Named colour or #rrggbb
        #[arg(short, long)]
        color: Option<String>,
    },
    /// Edit an event (pass "" to clear an optional field)
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        date: Option<String>,
        #[arg(short, long)]
        end_date: Option<String>,
        #[arg(short, long)]
        time: Option<String>,
        #[arg(short = 'T', long)]
        end_time: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(short, long)]
        color: Option<String>,
    },
    /// Remove an event
    Remove {
        id: String,
    },
    /// Show the timeline
    Show {
        /// Also show past events
        #[arg(short, long)]
        past: bool,
    },
    /// Manage recurring templates
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },
    /// Show or set how many occurrences each template contributes (1-20)
    Lookahead {
        count: Option<i64>,
    },
    /// Sign in; later changes are synced for this user
    Login {
        user: String,
    },
    /// Sign out
    Logout,
    /// Reconcile local data with the cloud copy
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Reset local data (delete all events, templates and settings)
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        shell: Shell,
    },
    /// Print version information
    Version,
    /// Open interactive TUI
    Ui,
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// Add a new template
    Add {
        title: String,
        /// hour, day, week or month
        #[arg(short, long, default_value = "day")]
        every: String,
        /// Repeat every N units
        #[arg(short, long, default_value_t = 1)]
        interval: i64,
        #[arg(short, long)]
        time: Option<String>,
        #[arg(short = 'T', long)]
        end_time: Option<String>,
        /// First occurrence date (defaults to now)
        #[arg(short, long)]
        start: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(short, long)]
        color: Option<String>,
        /// Create hidden from the timeline
        #[arg(long)]
        hidden: bool,
    },
    /// List templates
    List,
    /// Edit a template
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        every: Option<String>,
        #[arg(short, long)]
        interval: Option<i64>,
        #[arg(short, long)]
        time: Option<String>,
        #[arg(short = 'T', long)]
        end_time: Option<String>,
        #[arg(short, long)]
        start: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(short, long)]
        color: Option<String>,
    },
    /// Remove a template
    Remove {
        id: String,
    },
    /// Show or hide a template's occurrences on the timeline
    Toggle {
        id: String,
    },
}

#[derive(Subcommand)]
enum SyncCommands {
    /// Compare local and cloud data
    Status,
    /// Keep local data and overwrite the cloud copy
    Push,
    /// Replace local data with the cloud copy
    Pull,
    /// Union both sides by id and write the result to both
    Merge,
}

fn init_logging(config: &Config, to_file: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_filter.as_str().into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if to_file {
        // The TUI owns the terminal, so log next to the data instead
        let file = fs::create_dir_all(&config.data_dir)
            .and_then(|_| OpenOptions::new().create(true).append(true).open(config.log_path()));
        match file {
            Ok(file) => builder.with_ansi(false).with_writer(Mutex::new(file)).init(),
            Err(_) => builder.with_writer(io::sink).init(),
        }
    } else {
        builder.with_writer(io::stderr).init();
    }
}

fn main() {
    let cli = Cli::parse();
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    init_logging(&config, matches!(cli.command, Some(Commands::Ui) | None));

    match cli.command {
        Some(Commands::Add { title, date, end_date, time, end_time, description, color }) => {
            let date = date.unwrap_or_else(|| chrono::Local::now().date_naive().to_string());
            let draft = EventDraft { date, end_date, time, end_time, title, description, color };
            cmd_add(&config, draft, false)
        }
        Some(Commands::Edit { id, title, date, end_date, time, end_time, description, color }) => {
            let patch = EventPatch { date, end_date, time, end_time, title, description, color };
            cmd_edit(&config, &id, patch, false)
        }
        Some(Commands::Remove { id }) => cmd_remove(&config, &id, false),
        Some(Commands::Show { past }) => cmd_show(&config, past),
        Some(Commands::Template { command }) => match command {
            TemplateCommands::Add { title, every, interval, time, end_time, start, description, color, hidden } => {
                let draft = TemplateDraft {
                    title,
                    description,
                    color,
                    time,
                    end_time,
                    start_date: start,
                    repeat_type: every,
                    repeat_interval: interval,
                    show_on_timeline: !hidden,
                };
                cmd_template_add(&config, draft, false)
            }
            TemplateCommands::List => cmd_template_list(&config),
            TemplateCommands::Edit { id, title, every, interval, time, end_time, start, description, color } => {
                let patch = TemplatePatch {
                    title,
                    description,
                    color,
                    time,
                    end_time,
                    start_date: start,
                    repeat_type: every,
                    repeat_interval: interval,
                };
                cmd_template_edit(&config, &id, patch, false)
            }
            TemplateCommands::Remove { id } => cmd_template_remove(&config, &id, false),
            TemplateCommands::Toggle { id } => cmd_template_toggle(&config, &id, false),
        },
        Some(Commands::Lookahead { count }) => cmd_lookahead(&config, count, false),
        Some(Commands::Login { user }) => cmd_login(&config, &user, false),
        Some(Commands::Logout) => cmd_logout(&config, false),
        Some(Commands::Sync { command }) => match command {
            SyncCommands::Status => cmd_sync_status(&config),
            SyncCommands::Push => cmd_sync(&config, SyncChoice::Local, false),
            SyncCommands::Pull => cmd_sync(&config, SyncChoice::Cloud, false),
            SyncCommands::Merge => cmd_sync(&config, SyncChoice::Merge, false),
        },
        Some(Commands::Reset { force }) => cmd_reset(&config, force),
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "timeliner", &mut io::stdout());
        }
        Some(Commands::Version) => cmd_version(),
        Some(Commands::Ui) | None => {
            if let Err(e) = run_tui(config) {
                eprintln!("Error running TUI: {}", e);
            }
        }
    }
}
