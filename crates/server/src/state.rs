//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::services::analytics::AnalyticsService;
use crate::services::email::EmailService;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    pool: PgPool,
    email: Option<Arc<EmailService>>,
    analytics: AnalyticsService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Email is disabled when SMTP is not configured or the relay cannot be
    /// set up.
    #[must_use]
    pub fn new(config: AppConfig, pool: PgPool) -> Self {
        let email = config.email.as_ref().and_then(|email_config| {
            match EmailService::new(email_config, &config.base_url) {
                Ok(service) => {
                    tracing::info!(smtp_host = %email_config.smtp_host, "Email enabled");
                    Some(Arc::new(service))
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to configure SMTP, email disabled");
                    None
                }
            }
        });
        if config.email.is_none() {
            tracing::info!("SMTP not configured, email disabled");
        }

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                email,
                analytics: AnalyticsService::new(),
            }),
        }
    }

    /// Get a reference to the application configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// The email sender, if email is enabled.
    #[must_use]
    pub fn email(&self) -> Option<Arc<EmailService>> {
        self.inner.email.clone()
    }

    /// The cached analytics service.
    #[must_use]
    pub fn analytics(&self) -> &AnalyticsService {
        &self.inner.analytics
    }
}
