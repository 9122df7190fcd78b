//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! emporium migrate
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! Application tables: `crates/storefront/migrations/`. The session table is
//! created by the session store itself.

use super::{CommandError, connect, session_store};

/// Run storefront migrations, then create the session table.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Creating session table...");
    session_store(pool)?
        .migrate()
        .await
        .map_err(CommandError::Database)?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}
