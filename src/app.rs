use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, OriginalUri, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::{Config, RateLimitConfig, StoreConfig};
use crate::cors::{self, OriginPolicy};
use crate::error::SubmitError;
use crate::mailer::{self, NotificationQueue, SmtpNotifier};
use crate::rate_limit::{self, FixedWindowLimiter};
use crate::relay::SubmissionService;
use crate::sheets::{GoogleSheets, MemorySheet, SheetStore};
use crate::validator::FieldViolation;

/// Largest accepted request body
pub const BODY_LIMIT: usize = 100 * 1024;

const NOTIFICATION_QUEUE_CAPACITY: usize = 64;
/// How long shutdown waits for queued notifications to go out
const NOTIFICATION_DRAIN_LIMIT: Duration = Duration::from_secs(30);

pub struct AppState {
    pub service: SubmissionService,
}

/// Build the HTTP router
///
/// Layers, outermost first: security headers, origin guard, CORS, body
/// limit, then the rate limiter on everything under `/api`.
pub fn router(state: Arc<AppState>, origins: OriginPolicy, rate_limit: RateLimitConfig) -> Router {
    let limiter = Arc::new(FixedWindowLimiter::new(rate_limit));
    let cors_layer = origins.cors_layer();
    let policy = Arc::new(origins);

    // the limiter covers every /api path, unknown ones included
    let api = Router::new()
        .route("/submit-form", post(submit_form))
        .route("/health", get(health))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            limiter,
            rate_limit::limit_requests,
        ));

    Router::new()
        .nest("/api", api)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors_layer)
        .layer(middleware::from_fn_with_state(policy, cors::guard_origin))
        .layer(
            ServiceBuilder::new()
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("SAMEORIGIN"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::REFERRER_POLICY,
                    HeaderValue::from_static("no-referrer"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_DNS_PREFETCH_CONTROL,
                    HeaderValue::from_static("off"),
                )),
        )
        .with_state(state)
}

/// Start the relay with the given configuration
///
/// Verifies the backing store is reachable before binding, so a bad
/// credential stops the process at startup rather than on the first lead.
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store: Arc<dyn SheetStore> = match &config.store {
        StoreConfig::Google(google) => {
            log::info!(
                "Spreadsheet {} range {} as {}",
                google.spreadsheet_id,
                google.range,
                google.service_account_email
            );
            Arc::new(GoogleSheets::from_config(google)?)
        }
        StoreConfig::Memory => {
            log::warn!("Using the in-memory store; submissions are lost on restart");
            Arc::new(MemorySheet::with_header())
        }
    };

    log::info!("Testing {} connection...", store.kind());
    if let Err(e) = store.check_access().await {
        log::error!("Failed to connect to the backing store: {}", e);
        return Err(e.into());
    }
    log::info!("Connected to {}", store.kind());

    let (notifications, worker) = match &config.smtp {
        Some(smtp) => {
            let notifier = SmtpNotifier::new(smtp)?;
            let (queue, worker) =
                NotificationQueue::spawn(Arc::new(notifier), NOTIFICATION_QUEUE_CAPACITY);
            log::info!(
                "Notifications to {} via {}:{}",
                smtp.recipient,
                smtp.host,
                smtp.port
            );
            (Some(queue), Some(worker))
        }
        None => {
            log::warn!("EMAIL_USER/EMAIL_PASSWORD not set; email notifications disabled");
            (None, None)
        }
    };

    log::info!("Allowed origins: {}", config.allowed_origins.join(", "));

    let state = Arc::new(AppState {
        service: SubmissionService::new(store, notifications),
    });
    let app = router(
        state,
        OriginPolicy::new(config.allowed_origins.clone()),
        config.rate_limit,
    );

    let listener = TcpListener::bind(config.bind_addr).await?;
    log::info!("Server running on http://{}", listener.local_addr()?);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // the router owned the last queue handle, so the worker can now finish
    if let Some(worker) = worker {
        log::info!("Sending queued notifications");
        mailer::drain(worker, NOTIFICATION_DRAIN_LIMIT).await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down");
}

async fn submit_form(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return rejection.into_response();
        }
        Err(rejection) => {
            return SubmitError::Invalid(vec![FieldViolation::new(
                "body",
                "invalid_json",
                rejection.body_text(),
            )])
            .into_response();
        }
    };

    match state.service.submit(&body).await {
        Ok(submission) => Json(json!({
            "success": true,
            "submissionId": submission.id,
        }))
        .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let notifications = if state.service.notifications_enabled() {
        "enabled"
    } else {
        "disabled"
    };

    Json(json!({
        "status": "ok",
        "store": state.service.store_kind(),
        "notifications": notifications,
    }))
}

async fn not_found(OriginalUri(uri): OriginalUri) -> (StatusCode, Json<Value>) {
    log::info!("404 Not Found: {}", uri);
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "error": "Not found" })),
    )
}
