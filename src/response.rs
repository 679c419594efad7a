use actix_web::http::StatusCode;
use actix_web::{HttpResponse, HttpResponseBuilder};
use serde::Serialize;
use serde_json::json;

/// Envelope wrapped around every successful payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub status_code: u16,
    pub data: T,
    pub message: String,
    pub success: bool,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        ApiResponse {
            status_code: status.as_u16(),
            data,
            message: message.into(),
            success: status.is_success(),
        }
    }

    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, data, message)
    }

    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CREATED, data, message)
    }

    /// Starts a response builder carrying the envelope's status, for callers
    /// that need to attach cookies before writing the body.
    pub fn builder(&self) -> HttpResponseBuilder {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK))
    }

    pub fn into_response(self) -> HttpResponse {
        self.builder().json(self)
    }
}

/// `{}` payload for operations that return nothing.
pub fn empty() -> serde_json::Value {
    json!({})
}
