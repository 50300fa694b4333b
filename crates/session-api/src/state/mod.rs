//! Application state
//!
//! Holds the shared state for the Axum application: the service context,
//! the per-client rate limiter and configuration.

use std::sync::Arc;

use session_common::AppConfig;
use session_service::ServiceContext;

use crate::rate_limit::RateLimiter;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Service context containing all dependencies
    service_context: Arc<ServiceContext>,
    /// Buckets shared by every rate-limited route
    rate_limiter: Arc<RateLimiter>,
    /// Application configuration
    config: Arc<AppConfig>,
}

impl AppState {
    /// Create a new AppState with a limiter sized from configuration
    pub fn new(service_context: ServiceContext, config: AppConfig) -> Self {
        let rate_limiter = RateLimiter::from_config(&config.rate_limit);
        Self::with_rate_limiter(service_context, config, Arc::new(rate_limiter))
    }

    /// Create a new AppState around an existing limiter
    pub fn with_rate_limiter(
        service_context: ServiceContext,
        config: AppConfig,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            service_context: Arc::new(service_context),
            rate_limiter,
            config: Arc::new(config),
        }
    }

    /// Get the service context
    pub fn service_context(&self) -> &ServiceContext {
        &self.service_context
    }

    /// Get the rate limiter
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Get the application configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("service_context", &"ServiceContext")
            .field("rate_limiter", &self.rate_limiter)
            .field("config", &"AppConfig")
            .finish()
    }
}
