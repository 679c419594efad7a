use actix_web::web;

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod middleware;
pub mod models;
pub mod otp;
pub mod password;
pub mod response;
pub mod state;
pub mod store;
pub mod tokens;

use error::ApiError;
use handlers::{cart, health, plants, users};
use middleware::AuthMiddleware;
use state::AppState;

/// Malformed JSON bodies get the same envelope as every other error.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into())
}

/// Registers the `/api/v1` routes and their shared state.
pub fn configure(cfg: &mut web::ServiceConfig, state: web::Data<AppState>) {
    let auth = AuthMiddleware::new(state.auth.tokens.clone());

    cfg.app_data(state).app_data(json_config()).service(
        web::scope("/api/v1")
            .wrap(auth)
            .route("/healthcheck", web::get().to(health::healthcheck))
            .service(
                web::scope("/users")
                    .route("/register", web::post().to(users::register))
                    .route("/login", web::post().to(users::login))
                    .route("/send-otp", web::post().to(users::send_otp))
                    .route("/verify-otp", web::post().to(users::verify_otp))
                    .route("/logout", web::post().to(users::logout))
                    .route("/refresh-token", web::post().to(users::refresh_token))
                    .route("/change-password", web::post().to(users::change_password))
                    .route("/current-user", web::get().to(users::current_user))
                    .route("/update-account", web::patch().to(users::update_account)),
            )
            .service(
                web::scope("/auth")
                    .route("/request-otp", web::post().to(users::send_otp))
                    .route("/verify-otp", web::post().to(users::verify_otp)),
            )
            .service(
                web::scope("/plants")
                    .route("", web::post().to(plants::create_plant))
                    .route("", web::get().to(plants::list_plants))
                    .route("/{id}", web::get().to(plants::get_plant))
                    .route("/{id}", web::put().to(plants::update_plant))
                    .route("/{id}", web::delete().to(plants::delete_plant)),
            )
            .service(
                web::scope("/cart")
                    .route("", web::get().to(cart::get_cart))
                    .route("", web::delete().to(cart::clear_cart))
                    .route("/items", web::post().to(cart::add_to_cart))
                    .route("/items/{plant_id}", web::delete().to(cart::remove_from_cart)),
            ),
    );
}
