use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

pub const NOT_ALLOWED: &str = "Not allowed by CORS";

/// Allow-list of browser origins permitted to call the API
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

impl OriginPolicy {
    pub fn new(allowed: Vec<String>) -> Self {
        OriginPolicy { allowed }
    }

    /// Requests without an `Origin` header are not from a browser page and pass.
    pub fn allows(&self, origin: Option<&str>) -> bool {
        match origin {
            None => true,
            Some(origin) => self.allowed.iter().any(|a| a == origin),
        }
    }

    /// CORS headers for allowed origins: `POST` only, `Content-Type` only.
    pub fn cors_layer(&self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .allowed
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    log::warn!("Ignoring unusable allowed origin {:?}", o);
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::POST])
            .allow_headers([header::CONTENT_TYPE])
    }
}

/// Origin guard middleware
///
/// Rejects any request whose `Origin` is not on the allow-list before it
/// reaches CORS handling, the rate limiter or a handler.
pub async fn guard_origin(
    State(policy): State<Arc<OriginPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .map(|v| v.to_str().unwrap_or("<non-ascii>").to_string());

    if policy.allows(origin.as_deref()) {
        return next.run(request).await;
    }

    log::warn!(
        "Blocked {} {} from origin {}",
        request.method(),
        request.uri().path(),
        origin.as_deref().unwrap_or("-")
    );
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "success": false, "error": NOT_ALLOWED })),
    )
        .into_response()
}
