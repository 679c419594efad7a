use actix_web::cookie::Cookie;
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use chrono::Utc;
use log::{debug, error, info, warn};
use rand::Rng;
use serde::Serialize;
use validator::Validate;

use crate::error::{ApiError, StoreError};
use crate::handlers::{non_blank, normalize};
use crate::mailer::Message;
use crate::middleware::{AuthUser, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::models::{
    ChangePasswordInput, LoginInput, RefreshInput, RegisterInput, Role, SendOtpInput,
    UpdateAccountInput, User, UserProfile, VerifyOtpInput,
};
use crate::otp::{OtpCode, OtpError};
use crate::password;
use crate::response::{self, ApiResponse};
use crate::state::AppState;
use crate::store::ProfileUpdate;
use crate::tokens::TokenPair;

/// Suffixed usernames tried before giving up on an OTP signup.
const USERNAME_ATTEMPTS: usize = 5;

#[derive(Serialize)]
struct Session {
    user: UserProfile,
    #[serde(flatten)]
    tokens: TokenPair,
}

fn session_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .secure(secure)
        .finish()
}

/// Writes `body` and sets both token cookies.
fn with_session<T: Serialize>(body: ApiResponse<T>, tokens: &TokenPair, secure: bool) -> HttpResponse {
    body.builder()
        .cookie(session_cookie(ACCESS_COOKIE, tokens.access_token.clone(), secure))
        .cookie(session_cookie(REFRESH_COOKIE, tokens.refresh_token.clone(), secure))
        .json(body)
}

fn issue_tokens(state: &AppState, user: &User) -> Result<TokenPair, ApiError> {
    state.auth.tokens.issue_pair(user).map_err(|e| {
        error!("Token generation failed for user {}: {}", user.id, e);
        ApiError::Internal("Something went wrong while generating tokens".to_string())
    })
}

/// Issues a token pair and makes its refresh token the only valid one.
async fn start_session(state: &AppState, user: &User) -> Result<TokenPair, ApiError> {
    let tokens = issue_tokens(state, user)?;
    if !state
        .users
        .set_refresh_token(&user.id, Some(&tokens.refresh_token))
        .await?
    {
        return Err(ApiError::not_found("User not found"));
    }
    Ok(tokens)
}

fn no_pending_otp() -> ApiError {
    ApiError::bad_request("No OTP found, please request again")
}

async fn load_user(state: &AppState, auth: &AuthUser) -> Result<User, ApiError> {
    state
        .users
        .find_by_id(auth.id())
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid access token"))
}

fn hash_password(plain: &str) -> Result<String, ApiError> {
    password::hash(plain).map_err(|e| {
        error!("Password hashing failed: {}", e);
        ApiError::internal()
    })
}

pub async fn register(
    state: web::Data<AppState>,
    input: web::Json<RegisterInput>,
) -> Result<HttpResponse, ApiError> {
    let mut input = input.into_inner();
    if [&input.full_name, &input.email, &input.username, &input.password]
        .iter()
        .any(|field| field.trim().is_empty())
    {
        return Err(ApiError::bad_request("All fields are required"));
    }
    input.email = normalize(&input.email);
    input.username = normalize(&input.username);
    input.validate()?;

    let existing = state
        .users
        .find_by_login(Some(&input.email), Some(&input.username))
        .await?;
    let taken = || ApiError::Conflict("User with email or username already exists".to_string());
    if existing.is_some() {
        return Err(taken());
    }

    let role = Role::for_email(&input.email, &state.auth.admin_emails);
    let mut user = User::new(
        input.username,
        input.email,
        input.full_name.trim().to_string(),
        role,
    );
    user.password = Some(hash_password(&input.password)?);

    state.users.insert(&user).await.map_err(|e| match e {
        StoreError::Duplicate(_) => taken(),
        e => e.into(),
    })?;
    info!("Registered user {} ({})", user.id, user.username);

    Ok(ApiResponse::created(user.profile(), "User registered successfully").into_response())
}

pub async fn login(
    state: web::Data<AppState>,
    input: web::Json<LoginInput>,
) -> Result<HttpResponse, ApiError> {
    let input = input.into_inner();
    let email = non_blank(input.email).map(|e| normalize(&e));
    let username = non_blank(input.username).map(|u| normalize(&u));
    if email.is_none() && username.is_none() {
        return Err(ApiError::bad_request("Username or email is required"));
    }

    let user = state
        .users
        .find_by_login(email.as_deref(), username.as_deref())
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let valid = user
        .password
        .as_deref()
        .map(|hash| password::verify(hash, &input.password))
        .unwrap_or(false);
    if !valid {
        warn!("Failed password login for user {}", user.id);
        return Err(ApiError::unauthorized("Wrong password"));
    }

    let tokens = start_session(&state, &user).await?;
    info!("User {} logged in", user.id);

    let body = ApiResponse::ok(
        Session {
            user: user.profile(),
            tokens: tokens.clone(),
        },
        "User logged in successfully",
    );
    Ok(with_session(body, &tokens, state.auth.secure_cookies))
}

async fn available_username(state: &AppState, base: &str) -> Result<String, ApiError> {
    if state.users.find_by_username(base).await?.is_none() {
        return Ok(base.to_string());
    }
    for _ in 0..USERNAME_ATTEMPTS {
        let suffix: u16 = rand::thread_rng().gen_range(1000..10000);
        let candidate = format!("{base}{suffix}");
        if state.users.find_by_username(&candidate).await?.is_none() {
            return Ok(candidate);
        }
    }
    Err(ApiError::Conflict(format!("Username {base} is not available")))
}

/// Creates a passwordless account for a first-time OTP login.
async fn create_passwordless(state: &AppState, input: SendOtpInput) -> Result<User, ApiError> {
    let local_part = input
        .email
        .split('@')
        .next()
        .unwrap_or_default()
        .to_string();
    let base = non_blank(input.username)
        .map(|u| normalize(&u))
        .unwrap_or_else(|| local_part.clone());
    let full_name = non_blank(input.full_name).unwrap_or(local_part);

    let username = available_username(state, &base).await?;
    let role = Role::for_email(&input.email, &state.auth.admin_emails);
    let user = User::new(username, input.email, full_name, role);
    state.users.insert(&user).await?;
    info!("Created passwordless user {} ({})", user.id, user.username);
    Ok(user)
}

pub async fn send_otp(
    state: web::Data<AppState>,
    input: web::Json<SendOtpInput>,
) -> Result<HttpResponse, ApiError> {
    let mut input = input.into_inner();
    input.email = normalize(&input.email);
    if input.email.is_empty() {
        return Err(ApiError::bad_request("Email is required"));
    }
    input.validate()?;

    let existing = state.users.find_by_email(&input.email).await?;
    let user = match existing {
        Some(user) => user,
        None => create_passwordless(&state, input).await?,
    };

    let otp = OtpCode::issue(state.auth.otp_ttl);
    if !state.users.set_otp(&user.id, &otp).await? {
        return Err(ApiError::not_found("User not found"));
    }
    let code = otp.code;

    let minutes = state.auth.otp_ttl.num_minutes().max(1);
    let message = Message {
        to: user.email.clone(),
        subject: "Your OTP Code".to_string(),
        body: format!("Your OTP is {code}. It will expire in {minutes} minutes."),
    };
    state.mailer.send(message).await.map_err(|e| {
        error!("Sending OTP to user {} failed: {}", user.id, e);
        ApiError::Internal("Failed to send OTP email".to_string())
    })?;
    info!("OTP issued for user {}", user.id);

    Ok(ApiResponse::ok(response::empty(), "OTP sent successfully").into_response())
}

pub async fn verify_otp(
    state: web::Data<AppState>,
    input: web::Json<VerifyOtpInput>,
) -> Result<HttpResponse, ApiError> {
    let input = input.into_inner();
    let email = normalize(&input.email);
    let code = input.otp.trim();
    if email.is_empty() || code.is_empty() {
        return Err(ApiError::bad_request("Email and OTP are required"));
    }

    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let otp = user.otp.clone().ok_or_else(no_pending_otp)?;

    if let Err(e) = otp.verify(code, Utc::now()) {
        let e = match e {
            OtpError::Mismatch => {
                match state.users.record_otp_failure(&user.id, &otp.code).await? {
                    Some(attempts) => OtpError::after_attempts(attempts),
                    None => return Err(no_pending_otp()),
                }
            }
            e => e,
        };
        if e != OtpError::Mismatch {
            state.users.discard_otp(&user.id, &otp.code).await?;
        }
        warn!("OTP check failed for user {}: {}", user.id, e);
        return Err(ApiError::bad_request(e.to_string()));
    }

    // A concurrent request may have used or locked this code since it was read.
    if !state.users.consume_otp(&user.id, &otp.code).await? {
        return Err(no_pending_otp());
    }
    let tokens = start_session(&state, &user).await?;
    info!("User {} logged in with OTP", user.id);

    let body = ApiResponse::ok(
        Session {
            user: user.profile(),
            tokens: tokens.clone(),
        },
        "OTP verified, login successful",
    );
    Ok(with_session(body, &tokens, state.auth.secure_cookies))
}

pub async fn logout(state: web::Data<AppState>, auth: AuthUser) -> Result<HttpResponse, ApiError> {
    if !state.users.set_refresh_token(auth.id(), None).await? {
        return Err(ApiError::unauthorized("Invalid access token"));
    }
    info!("User {} logged out", auth.id());

    let secure = state.auth.secure_cookies;
    let mut access = session_cookie(ACCESS_COOKIE, String::new(), secure);
    access.make_removal();
    let mut refresh = session_cookie(REFRESH_COOKIE, String::new(), secure);
    refresh.make_removal();

    Ok(HttpResponse::Ok()
        .cookie(access)
        .cookie(refresh)
        .json(ApiResponse::ok(response::empty(), "User logged out successfully")))
}

pub async fn refresh_token(
    state: web::Data<AppState>,
    req: HttpRequest,
    input: Option<web::Json<RefreshInput>>,
) -> Result<HttpResponse, ApiError> {
    let incoming = req
        .cookie(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| input.and_then(|body| non_blank(body.into_inner().refresh_token)))
        .ok_or_else(|| ApiError::unauthorized("Unauthorized request"))?;

    let claims = state.auth.tokens.verify_refresh(&incoming).map_err(|e| {
        debug!("Refresh token rejected: {}", e);
        ApiError::unauthorized("Invalid refresh token")
    })?;

    let user = state
        .users
        .find_by_id(&claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid refresh token"))?;

    let tokens = issue_tokens(&state, &user)?;
    if !state
        .users
        .rotate_refresh_token(&user.id, &incoming, &tokens.refresh_token)
        .await?
    {
        warn!("Stale refresh token presented for user {}", user.id);
        return Err(ApiError::unauthorized("Refresh token is expired or used"));
    }
    let body = ApiResponse::ok(tokens.clone(), "Access token refreshed");
    Ok(with_session(body, &tokens, state.auth.secure_cookies))
}

pub async fn change_password(
    state: web::Data<AppState>,
    auth: AuthUser,
    input: web::Json<ChangePasswordInput>,
) -> Result<HttpResponse, ApiError> {
    let input = input.into_inner();
    let user = load_user(&state, &auth).await?;

    let missing = || ApiError::bad_request("Old and new password are required");
    if input.new_password.trim().is_empty() {
        return Err(missing());
    }
    if let Some(current) = user.password.as_deref() {
        if input.old_password.trim().is_empty() {
            return Err(missing());
        }
        if !password::verify(current, &input.old_password) {
            warn!("Password change rejected for user {}", user.id);
            return Err(ApiError::bad_request("Invalid old password"));
        }
    }

    let hash = hash_password(&input.new_password)?;
    if !state.users.set_password(&user.id, &hash).await? {
        return Err(ApiError::unauthorized("Invalid access token"));
    }
    info!("User {} changed password", user.id);

    Ok(ApiResponse::ok(response::empty(), "Password changed successfully").into_response())
}

pub async fn current_user(
    state: web::Data<AppState>,
    auth: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let user = load_user(&state, &auth).await?;
    Ok(ApiResponse::ok(user.profile(), "Current user fetched successfully").into_response())
}

pub async fn update_account(
    state: web::Data<AppState>,
    auth: AuthUser,
    input: web::Json<UpdateAccountInput>,
) -> Result<HttpResponse, ApiError> {
    let mut input = input.into_inner();
    input.full_name = non_blank(input.full_name);
    input.email = non_blank(input.email).map(|e| normalize(&e));
    if input.full_name.is_none() && input.email.is_none() {
        return Err(ApiError::bad_request("At least one field is required"));
    }
    input.validate()?;

    let in_use = || ApiError::Conflict("Email is already in use".to_string());
    if let Some(email) = &input.email {
        let owner = state.users.find_by_email(email).await?;
        if owner.map_or(false, |owner| owner.id != auth.id()) {
            return Err(in_use());
        }
    }

    let update = ProfileUpdate {
        email: input.email,
        full_name: input.full_name,
    };
    let user = state
        .users
        .update_profile(auth.id(), &update)
        .await
        .map_err(|e| match e {
            StoreError::Duplicate(_) => in_use(),
            e => e.into(),
        })?
        .ok_or_else(|| ApiError::unauthorized("Invalid access token"))?;

    Ok(ApiResponse::ok(user.profile(), "Account updated successfully").into_response())
}
