use actix_service::{forward_ready, Service};
use actix_web::dev::{Payload, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::AUTHORIZATION;
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};
use futures::future::{ok, ready, LocalBoxFuture, Ready};
use log::debug;
use std::rc::Rc;

use crate::error::ApiError;
use crate::models::Role;
use crate::tokens::{AccessClaims, TokenIssuer};

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Left in request extensions when a token was presented but failed
/// verification.
#[derive(Debug, Clone)]
struct RejectedToken;

/// Verifies access tokens on every request. A valid token puts its claims in
/// the request extensions; handlers that need a caller ask for [`AuthUser`].
/// Public routes are unaffected by a missing or stale token.
pub struct AuthMiddleware {
    tokens: TokenIssuer,
}

impl AuthMiddleware {
    pub fn new(tokens: TokenIssuer) -> Self {
        AuthMiddleware { tokens }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthMiddlewareMiddleware<S>;
    type InitError = ();

    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddlewareMiddleware {
            service: Rc::new(service),
            tokens: self.tokens.clone(),
        })
    }
}

pub struct AuthMiddlewareMiddleware<S> {
    service: Rc<S>,
    tokens: TokenIssuer,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if let Some(token) = access_token(&req) {
            match self.tokens.verify_access(&token) {
                Ok(claims) => {
                    req.extensions_mut().insert(claims);
                }
                Err(e) => {
                    debug!("Rejected access token on {}: {}", req.path(), e);
                    req.extensions_mut().insert(RejectedToken);
                }
            }
        }

        let service = self.service.clone();
        Box::pin(async move { service.call(req).await })
    }
}

/// Bearer header first, then the `accessToken` cookie.
fn access_token(req: &ServiceRequest) -> Option<String> {
    let bearer = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());

    bearer.or_else(|| req.cookie(ACCESS_COOKIE).map(|c| c.value().to_string()))
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser(pub AccessClaims);

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.0.sub
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.0.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin access required".to_string()))
        }
    }
}

fn caller(req: &HttpRequest) -> Result<AuthUser, ApiError> {
    let extensions = req.extensions();
    let result = match extensions.get::<AccessClaims>() {
        Some(claims) => Ok(AuthUser(claims.clone())),
        None if extensions.get::<RejectedToken>().is_some() => {
            Err(ApiError::unauthorized("Invalid access token"))
        }
        None => Err(ApiError::unauthorized("Unauthorized request")),
    };
    result
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(caller(req))
    }
}

/// An authenticated caller with the admin role. Listed before the body
/// extractor, it rejects non-admins before any payload is parsed.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl AdminUser {
    pub fn id(&self) -> &str {
        self.0.id()
    }
}

impl FromRequest for AdminUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let result = caller(req).and_then(|user| {
            user.require_admin()?;
            Ok(AdminUser(user))
        });
        ready(result)
    }
}
