use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{FromRequest, Query, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use poolvr_shared::config::{ConfigMap, ConfigProfile, OverrideSource};
use poolvr_shared::protocol::{LogForm, LogResponse, WriteResponse, WriteTextForm};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::persist::{Payload, WriteDir};
use crate::render::{PageRenderer, RenderError};

/// Query parameter naming a saved override file.
const CONFIG_PARAM: &str = "config";
/// Query parameter selecting an alternate page version.
const VERSION_PARAM: &str = "version";
/// Query parameter naming the file `/write` stores into.
const FILE_PARAM: &str = "file";

/// Shared app state passed to each handler. Built once at start-up, read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    pub renderer: Arc<PageRenderer>,
    pub write_dir: Arc<WriteDir>,
}

/// Build the router. Anything not matched by a route is served from `site_root`.
pub fn router(state: AppState, site_root: &Path) -> Router {
    Router::new()
        .route("/", get(play_page))
        .route("/poolvr", get(play_page))
        .route("/poolvr/config", get(config_page).post(config_page))
        .route("/log", post(log_message))
        .route("/write", post(write_file))
        .fallback_service(ServeDir::new(site_root))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        let status = match &err {
            RenderError::TemplateNotFound(_) | RenderError::InvalidVersion(_) => {
                StatusCode::NOT_FOUND
            }
            RenderError::Scene(_) | RenderError::Json(_) => {
                tracing::error!("page render failed: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

fn resolve_logged(profile: &ConfigProfile, sources: &[OverrideSource]) -> ConfigMap {
    let resolution = profile.resolve(sources);
    for warning in &resolution.warnings {
        tracing::warn!("{}", warning);
    }
    resolution.config
}

/// Saved file first (if requested and readable), then the query itself.
async fn override_sources(state: &AppState, params: &[(String, String)]) -> Vec<OverrideSource> {
    let mut sources = Vec::with_capacity(2);
    if let Some(name) = param(params, CONFIG_PARAM).filter(|name| !name.is_empty()) {
        match state.write_dir.load_overrides(name).await {
            Ok(values) => sources.push(OverrideSource::File(values)),
            Err(err) => tracing::warn!("could not load requested configuration: {}", err),
        }
    }
    sources.push(OverrideSource::Query(params.to_vec()));
    sources
}

/// Serves the poolvr app HTML.
pub async fn play_page(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Html<String>, ApiError> {
    let variant = state.renderer.variant();
    let sources = override_sources(&state, &params).await;
    let config = resolve_logged(&variant.app_profile(), &sources);
    let webvr = variant.webvr_profile().map(|profile| {
        resolve_logged(&profile, &[OverrideSource::Query(params.clone())])
    });

    let page = state
        .renderer
        .render_play(config, webvr.as_ref(), param(&params, VERSION_PARAM))?;
    Ok(Html(page))
}

/// Serves the configurator HTML.
pub async fn config_page(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Html<String>, ApiError> {
    let sources = override_sources(&state, &params).await;
    let config = resolve_logged(&state.renderer.variant().app_profile(), &sources);
    let page = state
        .renderer
        .render_configurator(config, param(&params, VERSION_PARAM))?;
    Ok(Html(page))
}

/// Post message from client to the server log.
pub async fn log_message(Form(form): Form<LogForm>) -> Json<LogResponse> {
    tracing::info!("{}", form.msg);
    Json(LogResponse::ok())
}

/// Store a JSON body or a `text` form field in the write directory.
/// Failures are reported in the response body, never as an HTTP error.
pub async fn write_file(
    State(state): State<AppState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
    request: Request,
) -> Json<WriteResponse> {
    let result = match query {
        Ok(Query(params)) => save_request(&state, param(&params, FILE_PARAM), request).await,
        Err(rejection) => Err(rejection.body_text()),
    };
    let response = match result {
        Ok(path) => WriteResponse::Written {
            filename: path.display().to_string(),
        },
        Err(error) => {
            tracing::warn!("write failed: {}", error);
            WriteResponse::Failed { error }
        }
    };
    Json(response)
}

/// `application/json` or any `+json` media type, ignoring case and parameters.
fn is_json(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
    else {
        return false;
    };
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    media_type == "application/json" || media_type.ends_with("+json")
}

async fn save_request(
    state: &AppState,
    name: Option<&str>,
    request: Request,
) -> Result<PathBuf, String> {
    let name = name.ok_or_else(|| "missing file parameter".to_string())?;
    let payload = if is_json(request.headers()) {
        let Json(value) = Json::<Value>::from_request(request, &())
            .await
            .map_err(|rejection| rejection.body_text())?;
        Payload::Json(value)
    } else {
        let Form(form) = Form::<WriteTextForm>::from_request(request, &())
            .await
            .map_err(|rejection| rejection.body_text())?;
        Payload::Text(form.text)
    };
    state
        .write_dir
        .save(name, &payload)
        .await
        .map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    #[test]
    fn json_media_types_are_detected_case_insensitively() {
        for content_type in [
            "application/json",
            "Application/JSON",
            "application/json; charset=utf-8",
            "application/vnd.api+json",
        ] {
            assert!(is_json(&headers(content_type)), "{content_type}");
        }
    }

    #[test]
    fn other_media_types_are_forms() {
        assert!(!is_json(&headers("application/x-www-form-urlencoded")));
        assert!(!is_json(&headers("text/plain")));
        assert!(!is_json(&HeaderMap::new()));
    }

    #[test]
    fn first_query_value_wins() {
        let params = vec![
            ("file".to_string(), "a.txt".to_string()),
            ("file".to_string(), "b.txt".to_string()),
        ];
        assert_eq!(param(&params, FILE_PARAM), Some("a.txt"));
        assert_eq!(param(&params, CONFIG_PARAM), None);
    }
}
