use anyhow::Result;
use tracing::{info, warn};

use crate::data::ImageInput;
use crate::error::{Stage, StageError};

mod preprocess;
mod tesseract;

pub use tesseract::TesseractEngine;

/// External text extraction. `recipe` is an OCR-engine language code, or
/// several joined with `+` for a multi-language request.
pub trait OcrEngine: Send + Sync {
    fn extract_text(&self, image: &ImageInput, recipe: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrPass {
    /// Union of the curated language models, only used to sample text for detection.
    Broad,
    /// Single model of the resolved language, produces the final text.
    Targeted,
}

impl OcrPass {
    pub fn stage(&self) -> Stage {
        match self {
            OcrPass::Broad => Stage::BroadOcr,
            OcrPass::Targeted => Stage::TargetedOcr,
        }
    }

    fn empty_message(&self) -> &'static str {
        match self {
            OcrPass::Broad => "no text could be extracted with the default OCR languages",
            OcrPass::Targeted => "no text found after using the resolved language",
        }
    }
}

/// Runs one OCR pass. Whitespace-only output is `NoTextDetected`; engine
/// errors become `EngineUnavailable`. Returned text is trimmed and non-empty.
pub fn extract(
    engine: &dyn OcrEngine,
    image: &ImageInput,
    recipe: &str,
    pass: OcrPass,
) -> Result<String, StageError> {
    let stage = pass.stage();
    info!("ocr: {} pass with '{}'", stage, recipe);
    let text = engine.extract_text(image, recipe).map_err(|err| {
        let err = StageError::EngineUnavailable {
            stage,
            message: format!("{:#}", err),
        };
        warn!("{}", err);
        err
    })?;

    let text = text.trim();
    if text.is_empty() {
        let err = StageError::NoTextDetected {
            stage,
            message: pass.empty_message().to_string(),
        };
        warn!("{}", err);
        return Err(err);
    }
    info!("ocr: {} pass extracted {} chars", stage, text.chars().count());
    Ok(text.to_string())
}
