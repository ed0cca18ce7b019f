use tracing::info;

use crate::error::{Error, Result};
use crate::storage::{KeyValueStore, AUTH_USER_KEY};

/// The signed-in user, if any. Remote sync is attempted only when one is present.
pub fn current_user<S: KeyValueStore + ?Sized>(store: &S) -> Option<String> {
    store
        .get(AUTH_USER_KEY)
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
}

pub fn require_user<S: KeyValueStore + ?Sized>(store: &S) -> Result<String> {
    current_user(store).ok_or(Error::NotSignedIn)
}

pub fn sign_in<S: KeyValueStore + ?Sized>(store: &S, user_id: &str) -> Result<()> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(Error::Remote("user id must not be empty".into()));
    }
    store.set(AUTH_USER_KEY, user_id)?;
    info!(user_id, "signed in");
    Ok(())
}

pub fn sign_out<S: KeyValueStore + ?Sized>(store: &S) -> Result<()> {
    store.remove(AUTH_USER_KEY)?;
    info!("signed out");
    Ok(())
}
