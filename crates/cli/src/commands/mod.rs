//! CLI command implementations.

pub mod migrate;
pub mod seed;
pub mod sessions;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;
use tower_sessions_sqlx_store::PostgresStore;

use emporium_storefront::db::{self, RepositoryError};
use emporium_storefront::services::auth::AuthError;

/// Environment variable holding the storefront connection string.
const DATABASE_URL_VAR: &str = "STOREFRONT_DATABASE_URL";

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection or query error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Store operation failed.
    #[error("Store error: {0}")]
    Repository(#[from] RepositoryError),

    /// Creating the owner account failed.
    #[error("Could not create owner: {0}")]
    Auth(#[from] AuthError),

    /// Session store error.
    #[error("Session store error: {0}")]
    Session(String),

    /// Invalid command arguments.
    #[error("{0}")]
    InvalidArgument(String),
}

/// Connect to the storefront database named by `STOREFRONT_DATABASE_URL`.
async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var(DATABASE_URL_VAR)
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar(DATABASE_URL_VAR))?;

    tracing::info!("Connecting to storefront database...");
    Ok(db::create_pool(&database_url).await?)
}

/// The session store used by the storefront binary.
fn session_store(pool: PgPool) -> Result<PostgresStore, CommandError> {
    PostgresStore::new(pool)
        .with_schema_name("storefront")
        .and_then(|store| store.with_table_name("session"))
        .map_err(CommandError::Session)
}
