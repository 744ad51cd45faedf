use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    BroadOcr,
    Resolve,
    TargetedOcr,
    Translate,
    SynthesizeOriginal,
    SynthesizeTranslated,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::BroadOcr => "broad_ocr",
            Stage::Resolve => "resolve",
            Stage::TargetedOcr => "targeted_ocr",
            Stage::Translate => "translate",
            Stage::SynthesizeOriginal => "synthesize_original",
            Stage::SynthesizeTranslated => "synthesize_translated",
        }
    }

    fn is_ocr(&self) -> bool {
        matches!(self, Stage::BroadOcr | Stage::TargetedOcr)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    NoTextDetected,
    DetectionFailed,
    UnsupportedLanguage,
    TranslationFailed,
    SynthesisFailed,
    EngineUnavailable,
}

/// Failure of one stage. Every external-call failure is converted into one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("{stage}: no text detected: {message}")]
    NoTextDetected { stage: Stage, message: String },
    #[error("{stage}: language detection failed: {message}")]
    DetectionFailed { stage: Stage, message: String },
    #[error("{stage}: unsupported language: {message}")]
    UnsupportedLanguage { stage: Stage, message: String },
    #[error("{stage}: translation failed: {message}")]
    TranslationFailed { stage: Stage, message: String },
    #[error("{stage}: speech synthesis failed: {message}")]
    SynthesisFailed { stage: Stage, message: String },
    #[error("{stage}: engine unavailable: {message}")]
    EngineUnavailable { stage: Stage, message: String },
}

impl StageError {
    pub fn kind(&self) -> WarningKind {
        match self {
            StageError::NoTextDetected { .. } => WarningKind::NoTextDetected,
            StageError::DetectionFailed { .. } => WarningKind::DetectionFailed,
            StageError::UnsupportedLanguage { .. } => WarningKind::UnsupportedLanguage,
            StageError::TranslationFailed { .. } => WarningKind::TranslationFailed,
            StageError::SynthesisFailed { .. } => WarningKind::SynthesisFailed,
            StageError::EngineUnavailable { .. } => WarningKind::EngineUnavailable,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            StageError::NoTextDetected { stage, .. }
            | StageError::DetectionFailed { stage, .. }
            | StageError::UnsupportedLanguage { stage, .. }
            | StageError::TranslationFailed { stage, .. }
            | StageError::SynthesisFailed { stage, .. }
            | StageError::EngineUnavailable { stage, .. } => *stage,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            StageError::NoTextDetected { message, .. }
            | StageError::DetectionFailed { message, .. }
            | StageError::UnsupportedLanguage { message, .. }
            | StageError::TranslationFailed { message, .. }
            | StageError::SynthesisFailed { message, .. }
            | StageError::EngineUnavailable { message, .. } => message,
        }
    }

    /// Without OCR text nothing downstream can run.
    pub fn is_terminal(&self) -> bool {
        match self {
            StageError::NoTextDetected { .. } => true,
            StageError::EngineUnavailable { stage, .. } => stage.is_ocr(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageWarning {
    pub kind: WarningKind,
    pub stage: Stage,
    pub message: String,
}

impl From<&StageError> for StageWarning {
    fn from(err: &StageError) -> Self {
        StageWarning {
            kind: err.kind(),
            stage: err.stage(),
            message: err.message().to_string(),
        }
    }
}

impl From<StageError> for StageWarning {
    fn from(err: StageError) -> Self {
        StageWarning::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_missing_text_and_ocr_engine_failures_are_terminal() {
        let no_text = StageError::NoTextDetected {
            stage: Stage::TargetedOcr,
            message: "empty".to_string(),
        };
        assert!(no_text.is_terminal());

        let ocr_down = StageError::EngineUnavailable {
            stage: Stage::BroadOcr,
            message: "tesseract missing".to_string(),
        };
        assert!(ocr_down.is_terminal());

        let tts_down = StageError::EngineUnavailable {
            stage: Stage::SynthesizeOriginal,
            message: "espeak missing".to_string(),
        };
        assert!(!tts_down.is_terminal());

        let translation = StageError::TranslationFailed {
            stage: Stage::Translate,
            message: "offline".to_string(),
        };
        assert!(!translation.is_terminal());
    }

    #[test]
    fn warning_projection_keeps_kind_stage_and_message() {
        let err = StageError::DetectionFailed {
            stage: Stage::Resolve,
            message: "too short".to_string(),
        };
        assert_eq!(err.to_string(), "resolve: language detection failed: too short");
        let warning = StageWarning::from(&err);
        assert_eq!(warning.kind, WarningKind::DetectionFailed);
        assert_eq!(warning.stage, Stage::Resolve);
        assert_eq!(warning.message, "too short");
        let value = serde_json::to_value(&warning).expect("serialize");
        assert_eq!(value["kind"], "detection_failed");
        assert_eq!(value["stage"], "resolve");
    }
}
