#![allow(dead_code, unused_macros)]

use std::sync::Arc;

use actix_web::web;
use async_trait::async_trait;
use chrono::Duration;

use plant_store::error::StoreResult;
use plant_store::mailer::MemoryMailer;
use plant_store::models::User;
use plant_store::otp::OtpCode;
use plant_store::state::{AppState, AuthSettings};
use plant_store::store::{MemoryUsers, ProfileUpdate, UserStore};
use plant_store::tokens::TokenIssuer;

pub const ADMIN_EMAIL: &str = "admin@plants.test";
pub const PASSWORD: &str = "correct horse battery";

fn auth_settings() -> AuthSettings {
    AuthSettings {
        tokens: TokenIssuer::new(
            "test-access-secret".to_string(),
            Duration::minutes(15),
            "test-refresh-secret".to_string(),
            Duration::days(10),
        ),
        otp_ttl: Duration::minutes(5),
        admin_emails: vec![ADMIN_EMAIL.to_string()],
        secure_cookies: false,
    }
}

pub fn test_state() -> (web::Data<AppState>, Arc<MemoryMailer>) {
    let mailer = Arc::new(MemoryMailer::new());
    let state = AppState::memory(mailer.clone(), auth_settings());
    (web::Data::new(state), mailer)
}

/// Like `test_state`, but user lookups take a database round-trip's worth of
/// time so concurrent requests interleave between read and write.
pub fn slow_state() -> (web::Data<AppState>, Arc<MemoryMailer>) {
    let mailer = Arc::new(MemoryMailer::new());
    let mut state = AppState::memory(mailer.clone(), auth_settings());
    state.users = Arc::new(SlowUsers(MemoryUsers::new()));
    (web::Data::new(state), mailer)
}

struct SlowUsers(MemoryUsers);

async fn round_trip() {
    actix_web::rt::time::sleep(std::time::Duration::from_millis(20)).await;
}

#[async_trait]
impl UserStore for SlowUsers {
    async fn insert(&self, user: &User) -> StoreResult<()> {
        self.0.insert(user).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        let user = self.0.find_by_id(id).await;
        round_trip().await;
        user
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = self.0.find_by_email(email).await;
        round_trip().await;
        user
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.0.find_by_username(username).await
    }

    async fn find_by_login(
        &self,
        email: Option<&str>,
        username: Option<&str>,
    ) -> StoreResult<Option<User>> {
        self.0.find_by_login(email, username).await
    }

    async fn set_refresh_token(&self, id: &str, token: Option<&str>) -> StoreResult<bool> {
        self.0.set_refresh_token(id, token).await
    }

    async fn rotate_refresh_token(
        &self,
        id: &str,
        expected: &str,
        next: &str,
    ) -> StoreResult<bool> {
        self.0.rotate_refresh_token(id, expected, next).await
    }

    async fn set_otp(&self, id: &str, otp: &OtpCode) -> StoreResult<bool> {
        self.0.set_otp(id, otp).await
    }

    async fn record_otp_failure(&self, id: &str, code: &str) -> StoreResult<Option<i32>> {
        self.0.record_otp_failure(id, code).await
    }

    async fn consume_otp(&self, id: &str, code: &str) -> StoreResult<bool> {
        self.0.consume_otp(id, code).await
    }

    async fn discard_otp(&self, id: &str, code: &str) -> StoreResult<()> {
        self.0.discard_otp(id, code).await
    }

    async fn set_password(&self, id: &str, hash: &str) -> StoreResult<bool> {
        self.0.set_password(id, hash).await
    }

    async fn update_profile(
        &self,
        id: &str,
        update: &ProfileUpdate,
    ) -> StoreResult<Option<User>> {
        self.0.update_profile(id, update).await
    }
}

/// Pulls the code out of "Your OTP is NNNNNN. It will expire ...".
pub fn otp_from_body(body: &str) -> String {
    body.split_whitespace()
        .nth(3)
        .map(|word| word.trim_end_matches('.').to_string())
        .unwrap_or_default()
}

macro_rules! app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new().configure(|cfg| plant_store::configure(cfg, $state.clone())),
        )
        .await
    };
}

/// Sends a `TestRequest` and returns `(status, json body)`.
macro_rules! call {
    ($app:expr, $req:expr) => {{
        let resp = actix_web::test::call_service(&$app, $req.to_request()).await;
        let status = resp.status();
        let body: serde_json::Value = actix_web::test::read_body_json(resp).await;
        (status, body)
    }};
}

/// Registers an account and logs it in, yielding the login response body.
macro_rules! signup {
    ($app:expr, $username:expr, $email:expr) => {{
        let (status, _) = call!(
            $app,
            actix_web::test::TestRequest::post()
                .uri("/api/v1/users/register")
                .set_json(serde_json::json!({
                    "fullName": "Test Gardener",
                    "email": $email,
                    "username": $username,
                    "password": common::PASSWORD,
                }))
        );
        assert_eq!(status, actix_web::http::StatusCode::CREATED);
        let (status, body) = call!(
            $app,
            actix_web::test::TestRequest::post()
                .uri("/api/v1/users/login")
                .set_json(serde_json::json!({ "email": $email, "password": common::PASSWORD }))
        );
        assert_eq!(status, actix_web::http::StatusCode::OK);
        body["data"].clone()
    }};
}

/// Access token of a freshly registered account.
macro_rules! token_for {
    ($app:expr, $username:expr, $email:expr) => {{
        let session = signup!($app, $username, $email);
        session["accessToken"].as_str().unwrap().to_string()
    }};
}

macro_rules! bearer {
    ($token:expr) => {
        (actix_web::http::header::AUTHORIZATION, format!("Bearer {}", $token))
    };
}
