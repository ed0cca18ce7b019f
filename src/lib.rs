//! Core of `timeliner`: recurring-event expansion, the past / now / upcoming
//! timeline with its current-time marker, year and month grouping, and the
//! 14-day retention policy, plus the local store and remote sync that the
//! binary builds on.

pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod expand;
pub mod grouping;
pub mod merge;
pub mod models;
pub mod partition;
pub mod remote;
pub mod retention;
pub mod session;
pub mod state;
pub mod storage;
pub mod sync;
pub mod timeline;
pub mod tui;

pub use error::{Error, Result};
