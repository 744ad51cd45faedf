use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::info;

use crate::pipeline::PipelineResult;
use crate::settings;

use super::models::{ErrorResponse, LanguagesResponse, ProcessRequest, TranslationTarget};
use super::process::process_request;
use super::state::ServerState;

pub async fn run_server(settings: settings::Settings, addr: String) -> Result<()> {
    let state = Arc::new(ServerState {
        pipeline: crate::build_pipeline(&settings)?,
    });
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| "failed to bind server address")?;
    info!("server: listening on {}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/languages", get(languages))
        .route("/process", post(process))
        .with_state(state)
        .layer(axum::middleware::from_fn(cors_middleware))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type"),
    );
}

async fn languages(State(state): State<Arc<ServerState>>) -> Json<LanguagesResponse> {
    let registry = state.pipeline.registry();
    Json(LanguagesResponse {
        default_language: state.pipeline.default_language().code.clone(),
        broad_recipe: registry.broad_recipe(),
        languages: registry.profiles().to_vec(),
        translation_targets: registry
            .translation_targets()
            .map(|(code, name)| TranslationTarget {
                code: code.to_string(),
                name: name.to_string(),
            })
            .collect(),
    })
}

/// OCR and the system TTS block, so each request runs off the async workers.
async fn process(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<ProcessRequest>,
) -> Result<Json<PipelineResult>, (StatusCode, Json<ErrorResponse>)> {
    let handle = tokio::runtime::Handle::current();
    let result = tokio::task::spawn_blocking(move || {
        handle.block_on(process_request(state.as_ref(), payload))
    })
    .await
    .map_err(|err| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("server task failed: {}", err),
            }),
        )
    })?;

    match result {
        Ok(response) => Ok(Json(response)),
        Err(err) => Err((err.status, Json(ErrorResponse { error: err.message }))),
    }
}
