use std::sync::Arc;

use chrono::Duration;
use mongodb::Database;

use crate::config::Config;
use crate::mailer::Mailer;
use crate::store::{
    CartStore, MemoryCarts, MemoryPlants, MemoryUsers, MongoCarts, MongoPlants, MongoUsers,
    PlantStore, UserStore,
};
use crate::tokens::TokenIssuer;

/// Auth knobs the handlers need besides storage.
#[derive(Clone)]
pub struct AuthSettings {
    pub tokens: TokenIssuer,
    pub otp_ttl: Duration,
    pub admin_emails: Vec<String>,
    pub secure_cookies: bool,
}

impl AuthSettings {
    pub fn from_config(config: &Config) -> Self {
        AuthSettings {
            tokens: TokenIssuer::new(
                config.access_token_secret.clone(),
                config.access_token_ttl,
                config.refresh_token_secret.clone(),
                config.refresh_token_ttl,
            ),
            otp_ttl: config.otp_ttl,
            admin_emails: config.admin_emails.clone(),
            secure_cookies: config.secure_cookies,
        }
    }
}

/// Shared application state handed to every handler.
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub plants: Arc<dyn PlantStore>,
    pub carts: Arc<dyn CartStore>,
    pub mailer: Arc<dyn Mailer>,
    pub auth: AuthSettings,
}

impl AppState {
    pub fn mongo(db: &Database, mailer: Arc<dyn Mailer>, auth: AuthSettings) -> Self {
        AppState {
            users: Arc::new(MongoUsers::new(db)),
            plants: Arc::new(MongoPlants::new(db)),
            carts: Arc::new(MongoCarts::new(db)),
            mailer,
            auth,
        }
    }

    pub fn memory(mailer: Arc<dyn Mailer>, auth: AuthSettings) -> Self {
        AppState {
            users: Arc::new(MemoryUsers::new()),
            plants: Arc::new(MemoryPlants::new()),
            carts: Arc::new(MemoryCarts::new()),
            mailer,
            auth,
        }
    }
}
