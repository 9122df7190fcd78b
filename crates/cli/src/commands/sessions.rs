//! Session maintenance commands.

use tower_sessions::session_store::ExpiredDeletion;

use super::{CommandError, connect, session_store};

/// Delete sessions whose expiry has passed.
///
/// # Errors
///
/// Returns an error if the database is unreachable or the delete fails.
pub async fn prune() -> Result<(), CommandError> {
    let store = session_store(connect().await?)?;

    store
        .delete_expired()
        .await
        .map_err(|e| CommandError::Session(e.to_string()))?;

    tracing::info!("Expired sessions deleted");
    Ok(())
}
