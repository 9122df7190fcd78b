//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::db::{CartStore, CatalogStore, OrderStore, UserStore};
use crate::services::email::EmailService;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. Stores are trait objects so
/// the same router runs on `PostgreSQL` in production and in memory in tests.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    users: Arc<dyn UserStore>,
    catalog: Arc<dyn CatalogStore>,
    carts: Arc<dyn CartStore>,
    orders: Arc<dyn OrderStore>,
    mailer: Option<EmailService>,
}

impl AppState {
    /// Create a new application state over a store implementing every
    /// storage trait.
    #[must_use]
    pub fn new<S>(config: StorefrontConfig, store: Arc<S>, mailer: Option<EmailService>) -> Self
    where
        S: UserStore + CatalogStore + CartStore + OrderStore + 'static,
    {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                users: store.clone(),
                catalog: store.clone(),
                carts: store.clone(),
                orders: store,
                mailer,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Account storage.
    #[must_use]
    pub fn users(&self) -> &dyn UserStore {
        self.inner.users.as_ref()
    }

    /// Product storage.
    #[must_use]
    pub fn catalog(&self) -> &dyn CatalogStore {
        self.inner.catalog.as_ref()
    }

    /// Cart storage.
    #[must_use]
    pub fn carts(&self) -> &dyn CartStore {
        self.inner.carts.as_ref()
    }

    /// Order storage.
    #[must_use]
    pub fn orders(&self) -> &dyn OrderStore {
        self.inner.orders.as_ref()
    }

    /// The mailer, if SMTP is configured.
    #[must_use]
    pub fn mailer(&self) -> Option<&EmailService> {
        self.inner.mailer.as_ref()
    }
}
