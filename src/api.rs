//! HTTP matching service: student interests in, ranked professors out.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::embedder::Embedder;
use crate::rag::retrieve;
use crate::store::{ProfessorMatch, ProfileStore};

/// Frontend origin allowed by default (local Next.js dev server).
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Bounds on how many matches one request may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchLimits {
    /// Used when the request omits `num_matches`.
    pub default_top_k: usize,
    /// Upper clamp for `num_matches`.
    pub max_top_k: usize,
}

impl Default for MatchLimits {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            max_top_k: 12,
        }
    }
}

impl MatchLimits {
    /// Requested count, defaulted and clamped to `1..=max_top_k`.
    pub fn clamp(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_top_k)
            .clamp(1, self.max_top_k.max(1))
    }
}

/// Body of `POST /api/matches`.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchRequest {
    /// Free-text research interests.
    pub interests: String,
    /// Caller's user id; logged only.
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Number of professors wanted.
    #[serde(default)]
    pub num_matches: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

/// Embedder and store shared by request handlers.
///
/// Both sit behind a mutex and are only touched from blocking tasks, so the
/// blocking HTTP and Postgres clients never run on the async executor.
pub struct MatchService<E, S> {
    embedder: Mutex<E>,
    store: Mutex<S>,
    limits: MatchLimits,
}

impl<E, S> MatchService<E, S>
where
    E: Embedder,
    S: ProfileStore,
{
    /// Wraps an embedder and store.
    pub fn new(embedder: E, store: S, limits: MatchLimits) -> Self {
        Self {
            embedder: Mutex::new(embedder),
            store: Mutex::new(store),
            limits,
        }
    }

    /// Request limits in use.
    pub fn limits(&self) -> MatchLimits {
        self.limits
    }

    /// Embeds `interests` and returns the `top_k` closest professors.
    pub fn find_matches(&self, interests: &str, top_k: usize) -> Result<Vec<ProfessorMatch>> {
        let embedder = self
            .embedder
            .lock()
            .map_err(|_| anyhow!("embedder lock poisoned"))?;
        let store = self
            .store
            .lock()
            .map_err(|_| anyhow!("store lock poisoned"))?;
        retrieve(interests, &*embedder, &*store, top_k)
    }
}

/// Routes `GET /healthz` and `POST /api/matches`.
pub fn router<E, S>(service: Arc<MatchService<E, S>>) -> Router
where
    E: Embedder + Send + 'static,
    S: ProfileStore + Send + 'static,
{
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/matches", post(match_handler::<E, S>))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// CORS policy admitting `origins` with credentials, as a browser frontend needs.
pub fn cors_layer<O: AsRef<str>>(origins: &[O]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin.as_ref())
                .with_context(|| format!("invalid CORS origin {:?}", origin.as_ref()))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true))
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn match_handler<E, S>(
    State(service): State<Arc<MatchService<E, S>>>,
    Json(request): Json<MatchRequest>,
) -> Result<Json<Vec<ProfessorMatch>>, (StatusCode, Json<ErrorBody>)>
where
    E: Embedder + Send + 'static,
    S: ProfileStore + Send + 'static,
{
    if request.interests.trim().is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "interests must not be empty".into(),
        ));
    }
    let top_k = service.limits().clamp(request.num_matches);
    tracing::info!(user_id = ?request.user_id, top_k, "match request");

    let matches = tokio::task::spawn_blocking(move || {
        service.find_matches(&request.interests, top_k)
    })
    .await
    .map_err(|err| anyhow!("match task join error: {err}"))
    .and_then(|result| result)
    .map_err(|err| {
        tracing::error!(error = %format!("{err:#}"), "match request failed");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
    })?;
    Ok(Json(matches))
}

fn error_response(status: StatusCode, detail: String) -> (StatusCode, Json<ErrorBody>) {
    (status, Json(ErrorBody { detail }))
}
