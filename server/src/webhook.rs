use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Form, Router};
use now_playing_common::notification::{PayloadError, PlaybackNotification};
use now_playing_poster::{Outcome, PipelineError, PosterPipeline};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

/// Plex attaches a thumbnail part to multipart webhooks.
const BODY_LIMIT: usize = 50 << 20;

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

pub struct AppState {
    pipeline: Arc<PosterPipeline>,
    /// Receipt counter; stamps every notification so stale renders lose.
    sequence: AtomicU64,
}

impl AppState {
    pub fn new(pipeline: Arc<PosterPipeline>) -> Self {
        Self {
            pipeline,
            sequence: AtomicU64::new(0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WebhookForm {
    #[serde(default)]
    payload: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /webhook — multipart or urlencoded form with a JSON `payload` field.
///
/// Responds 400 when the payload cannot be decoded. Render failures are
/// logged and still answered with 200; the published file is unchanged.
async fn handle_webhook(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let sequence = state.sequence.fetch_add(1, Ordering::Relaxed);

    let payload = match read_payload(request, &state).await {
        Ok(p) => p,
        Err(e) => return reject(e),
    };
    let notification = match PlaybackNotification::from_json(&payload, sequence) {
        Ok(n) => n,
        Err(e) => return reject(e),
    };

    match state.pipeline.handle(&notification).await {
        Ok(Outcome::Ignored) => debug!(sequence, "notification ignored"),
        Ok(outcome) => debug!(sequence, ?outcome, "notification handled"),
        Err(PipelineError::Fetch(e)) => error!(error = %e, sequence, "error fetching poster"),
        Err(e) => error!(error = %e, sequence, "error rendering poster"),
    }
    StatusCode::OK.into_response()
}

async fn read_payload(request: Request, state: &Arc<AppState>) -> Result<String, PayloadError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let payload = if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| PayloadError::MalformedForm(e.to_string()))?;
        let mut payload = None;
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| PayloadError::MalformedForm(e.to_string()))?
        {
            if field.name() == Some("payload") {
                let text = field
                    .text()
                    .await
                    .map_err(|e| PayloadError::MalformedForm(e.to_string()))?;
                payload = Some(text);
                break;
            }
        }
        payload.unwrap_or_default()
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(form) = Form::<WebhookForm>::from_request(request, state)
            .await
            .map_err(|e| PayloadError::MalformedForm(e.to_string()))?;
        form.payload
    } else {
        return Err(PayloadError::MalformedForm(format!(
            "unsupported content type {content_type:?}"
        )));
    };

    if payload.is_empty() {
        return Err(PayloadError::MissingPayload);
    }
    Ok(payload)
}

fn reject(err: PayloadError) -> Response {
    warn!(error = %err, "rejecting webhook");
    (StatusCode::BAD_REQUEST, err.to_string()).into_response()
}
