//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::db::{OrderRepository, RepositoryError};
use crate::services::auth::GoogleOAuthClient;
use crate::services::backup::BackupService;
use crate::services::email::EmailService;
use crate::services::jobs::JobScheduler;
use crate::services::uploads::UploadStore;

/// How long the admin pending-orders badge may lag behind.
const PENDING_COUNT_TTL: Duration = Duration::from_secs(30);

/// Timeout for outgoing HTTP calls (Google, `SendGrid`).
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    email: EmailService,
    google: Option<GoogleOAuthClient>,
    uploads: UploadStore,
    jobs: JobScheduler,
    pending_orders: Cache<(), i64>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Background jobs are created but not started; call
    /// `state.jobs().start()` once the server is ready.
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the HTTP client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("gerinmah/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let email = EmailService::new(http.clone(), &config.email, &config.base_url);
        let google = config.google.clone().map(|google| {
            GoogleOAuthClient::new(http.clone(), google, config.google_redirect_uri())
        });
        let uploads = UploadStore::new(&config.storage);
        let backup = BackupService::new(pool.clone(), config.storage.backup_dir.clone());
        let pending_orders = Cache::builder()
            .max_capacity(1)
            .time_to_live(PENDING_COUNT_TTL)
            .build();
        let jobs = JobScheduler::new(backup, uploads.clone(), config.jobs, pending_orders.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                email,
                google,
                uploads,
                jobs,
                pending_orders,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }

    /// Google sign-in client, `None` when not configured.
    #[must_use]
    pub fn google(&self) -> Option<&GoogleOAuthClient> {
        self.inner.google.as_ref()
    }

    #[must_use]
    pub fn uploads(&self) -> &UploadStore {
        &self.inner.uploads
    }

    #[must_use]
    pub fn jobs(&self) -> &JobScheduler {
        &self.inner.jobs
    }

    /// Number of pending orders, cached for 30 seconds.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the count query fails.
    pub async fn pending_order_count(&self) -> Result<i64, RepositoryError> {
        if let Some(count) = self.inner.pending_orders.get(&()).await {
            return Ok(count);
        }

        let count = OrderRepository::new(&self.inner.pool).pending_count().await?;
        self.inner.pending_orders.insert((), count).await;
        Ok(count)
    }

    /// Drop the cached pending count after an order is created or changes status.
    pub async fn invalidate_pending_count(&self) {
        self.inner.pending_orders.invalidate(&()).await;
    }
}
