//! One-shot flash messages stored in the session.
//!
//! A message pushed before a redirect is shown on the next rendered page and
//! then removed.

use tower_sessions::Session;

use crate::models::{FlashMessage, session_keys};

/// Queue a message for the next rendered page.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn push_flash(
    session: &Session,
    message: FlashMessage,
) -> Result<(), tower_sessions::session::Error> {
    let mut pending: Vec<FlashMessage> = session
        .get(session_keys::FLASH)
        .await?
        .unwrap_or_default();
    pending.push(message);
    session.insert(session_keys::FLASH, pending).await
}

/// Take all pending messages, clearing them from the session.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn take_flash(
    session: &Session,
) -> Result<Vec<FlashMessage>, tower_sessions::session::Error> {
    Ok(session
        .remove::<Vec<FlashMessage>>(session_keys::FLASH)
        .await?
        .unwrap_or_default())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn test_flash_is_read_once() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        push_flash(&session, FlashMessage::error("Invalid email or password."))
            .await
            .unwrap();
        push_flash(&session, FlashMessage::info("Check your inbox."))
            .await
            .unwrap();

        let messages = take_flash(&session).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "Invalid email or password.");
        assert!(take_flash(&session).await.unwrap().is_empty());
    }
}
