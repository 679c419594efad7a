use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use log::{info, warn};

use plant_store::config::{Config, StorageBackend};
use plant_store::mailer::{LogMailer, Mailer};
use plant_store::state::{AppState, AuthSettings};
use plant_store::{configure, db};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok(); // Load environment variables from .env file
    env_logger::init();

    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let auth = AuthSettings::from_config(&config);
    let mailer: Arc<dyn Mailer> = Arc::new(LogMailer::new(config.mail_from.clone()));

    let state = match config.storage {
        StorageBackend::Mongo => {
            let database_url = config.database_url.as_deref().unwrap_or_default();
            let db = db::connect(database_url, &config.database_name)
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            AppState::mongo(&db, mailer, auth)
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage, data is lost on restart");
            AppState::memory(mailer, auth)
        }
    };
    let state = web::Data::new(state);

    let cors_origin = config.cors_origin.clone();
    info!("Listening on {}:{}", config.host, config.port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&cors_origin)
            .allow_any_method()
            .allow_any_header()
            .supports_credentials();

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .configure(|cfg| configure(cfg, state.clone()))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
