use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Serialize, Serializer};
use std::future::Future;
use std::pin::Pin;
use tracing::{info, warn};

use crate::data;
use crate::error::{Stage, StageError};

mod gtts;
mod system;

pub use gtts::GoogleTts;
pub use system::{NoSpeechEngine, SystemTts};

/// Raw synthesizer output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechAudio {
    pub bytes: Vec<u8>,
    pub mime: String,
}

pub type SynthesisFuture<'a> = Pin<Box<dyn Future<Output = Result<SpeechAudio>> + Send + 'a>>;

/// External speech synthesis. `language` is a speech-engine code.
pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize<'a>(&'a self, text: &'a str, language: &'a str) -> SynthesisFuture<'a>;
}

/// Audio handed back to the caller. Serialized with a base64 payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioArtifact {
    #[serde(rename = "data_base64", serialize_with = "serialize_base64")]
    pub bytes: Vec<u8>,
    pub mime: String,
    pub filename: String,
}

fn serialize_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&BASE64.encode(bytes))
}

/// Runs one synthesis call. `stem` names the artifact; the extension follows the MIME type.
pub async fn synthesize(
    synthesizer: &dyn SpeechSynthesizer,
    text: &str,
    speech_code: &str,
    stem: &str,
    stage: Stage,
) -> Result<AudioArtifact, StageError> {
    info!("speech: {} in '{}'", stage, speech_code);
    let audio = synthesizer
        .synthesize(text, speech_code)
        .await
        .map_err(|err| {
            let message = format!("{:#}", err);
            let err = if err.downcast_ref::<NoSpeechEngine>().is_some() {
                StageError::EngineUnavailable { stage, message }
            } else {
                StageError::SynthesisFailed { stage, message }
            };
            warn!("{}", err);
            err
        })?;

    if audio.bytes.is_empty() {
        let err = StageError::SynthesisFailed {
            stage,
            message: "synthesizer returned no audio".to_string(),
        };
        warn!("{}", err);
        return Err(err);
    }

    let ext = data::extension_from_mime(&audio.mime).unwrap_or("bin");
    info!("speech: {} produced {} bytes", stage, audio.bytes.len());
    Ok(AudioArtifact {
        bytes: audio.bytes,
        filename: format!("{}.{}", stem, ext),
        mime: audio.mime,
    })
}
