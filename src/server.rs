//! # HTTP surface
//!
//! JSON API consumed by the card pages:
//!
//! - `POST /api/generate` renders a card request to PNG
//! - `GET /api/search?query=` looks up employee records
//! - `POST /api/preview` returns the HTML overlay preview
//!
//! ```no_run
//! # #[cfg(feature = "cdp")]
//! # async fn example() -> cardsmith::Result<()> {
//! use cardsmith::search::{AirtableConfig, AirtableSearch};
//! use cardsmith::server::{serve, AppState, ServerConfig};
//! use std::sync::Arc;
//!
//! let generator = cardsmith::Generator::new(cardsmith::cdp::CdpLauncher, Default::default())?;
//! let search = Arc::new(AirtableSearch::new(AirtableConfig::default())?);
//! serve(ServerConfig::default(), AppState::new(generator, search)).await
//! # }
//! ```

use crate::capture::Launcher;
use crate::card::{CardData, CardRequest};
use crate::search::{RecordSearch, SearchResponse};
use crate::{preview, Error, Generator, Result};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3001".to_string(),
        }
    }
}

/// Shared handler state
pub struct AppState<L: Launcher + 'static> {
    pub generator: Generator<L>,
    pub search: Arc<dyn RecordSearch>,
}

impl<L: Launcher + 'static> AppState<L> {
    pub fn new(generator: Generator<L>, search: Arc<dyn RecordSearch>) -> Self {
        Self { generator, search }
    }
}

/// Error payload returned with every non-2xx response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub details: String,
}

fn error_response(status: StatusCode, details: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            details: details.into(),
        }),
    )
        .into_response()
}

fn rejection_response(rejection: JsonRejection) -> Response {
    error_response(StatusCode::BAD_REQUEST, rejection.body_text())
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
}

pub fn router<L: Launcher + 'static>(state: AppState<L>) -> Router {
    Router::new()
        .route("/api/generate", post(generate::<L>))
        .route("/api/search", get(search::<L>))
        .route("/api/preview", post(preview_card::<L>))
        .with_state(Arc::new(state))
}

/// Handle POST /api/generate
async fn generate<L: Launcher + 'static>(
    State(state): State<Arc<AppState<L>>>,
    payload: std::result::Result<Json<CardRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => return rejection_response(rejection),
    };

    match state.generator.generate_request(request).await {
        Ok(png) => (StatusCode::OK, [(header::CONTENT_TYPE, "image/png")], png).into_response(),
        Err(e) if e.is_validation() => {
            warn!("Rejected generate request: {}", e);
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => {
            error!("Card generation failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate image")
        }
    }
}

/// Handle GET /api/search
async fn search<L: Launcher + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Query(params): Query<SearchParams>,
) -> Response {
    match state.search.search(&params.query).await {
        Ok(records) => Json(SearchResponse { records }).into_response(),
        Err(e) => {
            error!("Search for '{}' failed: {}", params.query, e);
            error_response(StatusCode::BAD_GATEWAY, "search failed")
        }
    }
}

/// Handle POST /api/preview
async fn preview_card<L: Launcher + 'static>(
    State(_state): State<Arc<AppState<L>>>,
    payload: std::result::Result<Json<CardRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => return rejection_response(rejection),
    };

    match CardData::from_request(request).and_then(|card| preview::render_card(&card)) {
        Ok(html) => Html(html).into_response(),
        Err(e) if e.is_validation() => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e) => {
            error!("Preview failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to render preview")
        }
    }
}

/// Bind `config.listen_addr` and serve until the process exits.
pub async fn serve<L: Launcher + 'static>(config: ServerConfig, state: AppState<L>) -> Result<()> {
    let pages = state.generator.config().pages_base_url.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| Error::InitializationError(format!("Failed to bind to {}: {}", config.listen_addr, e)))?;

    info!("Listening on http://{} (card pages at {})", config.listen_addr, pages);

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::Other(format!("Server error: {}", e)))
}
