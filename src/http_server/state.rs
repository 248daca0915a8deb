//! Shared application state handed to every handler.

use std::sync::Arc;

use chrono::Duration;

use crate::auth::email::{create_email_sender, EmailSender};
use crate::auth::{AuthService, JwtConfig};
use crate::config::AppConfig;
use crate::store::Database;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub auth: Arc<AuthService>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// State with the mail transport chosen by the config
    pub fn new(db: Database, config: AppConfig) -> Self {
        let sender = create_email_sender(config.email.clone());
        Self::with_email_sender(db, config, sender)
    }

    /// State with an explicit mail transport
    pub fn with_email_sender(
        db: Database,
        config: AppConfig,
        sender: Arc<dyn EmailSender>,
    ) -> Self {
        let jwt = JwtConfig {
            secret: config.jwt_secret.clone(),
            ttl: Duration::days(config.jwt_expires_in_days),
        };
        Self {
            auth: Arc::new(AuthService::new(db.clone(), jwt, sender)),
            db,
            config: Arc::new(config),
        }
    }
}
