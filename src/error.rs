use thiserror::Error;

/// Errors surfaced by storage, sync and the command layer.
///
/// The timeline algorithms themselves never fail; only the host-side
/// plumbing around them does.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
    #[error("not signed in")]
    NotSignedIn,
    #[error("remote backend error: {0}")]
    Remote(String),
    #[error("{0} not found")]
    NotFound(String),
}

/// Form-level rejections raised before an event or template is constructed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("title is required")]
    MissingTitle,
    #[error("date is required")]
    MissingDate,
    #[error("invalid date '{0}', use YYYY-MM-DD")]
    BadDate(String),
    #[error("invalid time '{0}', use HH:mm")]
    BadTime(String),
    #[error("end date must be on or after the start date")]
    EndDateBeforeStart,
    #[error("end time must be later than the start time")]
    EndTimeNotAfterStart,
    #[error("repeat interval must be at least 1")]
    ZeroInterval,
    #[error("invalid repeat interval '{0}'")]
    BadInterval(String),
    #[error("unknown repeat type '{0}', use hour, day, week or month")]
    BadRepeatType(String),
    #[error("lookahead must be between {min} and {max}, got {got}")]
    LookaheadOutOfRange { got: i64, min: u8, max: u8 },
}

pub type Result<T> = std::result::Result<T, Error>;
