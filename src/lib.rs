pub mod api;
pub mod billing;
pub mod config;
pub mod db;
pub mod notifications;
pub mod verification;

pub use db::DbPool;

use config::Config;
use std::sync::Arc;

use crate::api::rate_limit::RateLimiter;
use crate::notifications::{Dispatcher, Notifier};
use crate::verification::OtpPolicy;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub notifier: Arc<dyn Notifier>,
    pub rate_limiter: Arc<RateLimiter>,
    pub otp_policy: OtpPolicy,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let notifier: Arc<dyn Notifier> = Arc::new(Dispatcher::new(&config));
        Self::with_notifier(config, db, notifier)
    }

    /// Build state around a specific notifier (tests record instead of sending)
    pub fn with_notifier(config: Config, db: DbPool, notifier: Arc<dyn Notifier>) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let otp_policy = OtpPolicy::from(&config.verification);
        Self {
            config,
            db,
            notifier,
            rate_limiter,
            otp_policy,
        }
    }
}
