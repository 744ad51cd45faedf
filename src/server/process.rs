use axum::http::StatusCode;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::info;

use crate::data::{self, ImageInput};
use crate::pipeline::{PipelineInput, PipelineResult};

use super::models::ProcessRequest;
use super::state::ServerState;

#[derive(Debug)]
pub(crate) struct ServerError {
    pub(crate) status: StatusCode,
    pub(crate) message: String,
}

impl ServerError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

/// Accepts plain base64 or a `data:image/...;base64,` URL.
pub(crate) fn decode_image(request: &ProcessRequest) -> Result<ImageInput, ServerError> {
    let raw = request
        .image_base64
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ServerError::bad_request("image_base64 is required"))?;
    let payload = match raw.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, payload)| payload)
            .ok_or_else(|| ServerError::bad_request("malformed data URL"))?,
        None => raw,
    };
    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|err| ServerError::bad_request(format!("invalid base64 image: {}", err)))?;
    data::image_from_bytes(bytes, request.image_name.as_deref())
        .map_err(|err| ServerError::bad_request(err.to_string()))
}

pub(crate) async fn process_request(
    state: &ServerState,
    request: ProcessRequest,
) -> Result<PipelineResult, ServerError> {
    let image = decode_image(&request)?;
    info!(
        "server: processing {} ({} bytes)",
        image.mime,
        image.bytes.len()
    );
    let mut input =
        PipelineInput::new(&image).with_manual_language(request.source_lang.as_deref());
    if request.translate.unwrap_or(false) {
        input = input.with_translation(request.lang.as_deref());
    }
    Ok(state.pipeline.run(input).await)
}
