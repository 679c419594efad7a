use actix_web::HttpResponse;
use serde_json::json;

use crate::response::ApiResponse;

pub async fn healthcheck() -> HttpResponse {
    ApiResponse::ok(json!({ "status": "OK" }), "Service is healthy").into_response()
}
