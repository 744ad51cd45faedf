use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::data::ImageInput;
use crate::error::{Stage, StageError, StageWarning};
use crate::languages::{LanguageProfile, LanguageRegistry};
use crate::ocr::{self, OcrEngine, OcrPass};
use crate::resolver::{LanguageResolver, ResolutionSource};
use crate::speech::{self, AudioArtifact, SpeechSynthesizer};
use crate::translation::{self, TextTranslator};

pub const ORIGINAL_AUDIO_STEM: &str = "original_audio";
pub const TRANSLATED_AUDIO_STEM: &str = "translated_audio";

/// One pipeline request. The image is borrowed for the duration of the run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineInput<'a> {
    pub image: &'a ImageInput,
    pub manual_language: Option<&'a str>,
    pub enable_translation: bool,
    /// Defaults to the pipeline's default translation target when absent.
    pub target_language: Option<&'a str>,
}

impl<'a> PipelineInput<'a> {
    pub fn new(image: &'a ImageInput) -> Self {
        Self {
            image,
            manual_language: None,
            enable_translation: false,
            target_language: None,
        }
    }

    pub fn with_manual_language(mut self, code: Option<&'a str>) -> Self {
        self.manual_language = code;
        self
    }

    pub fn with_translation(mut self, target: Option<&'a str>) -> Self {
        self.enable_translation = true;
        self.target_language = target;
        self
    }
}

/// Everything one run produced. Fields of stages that failed or never ran are
/// absent; a terminal run carries only its warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_source: Option<ResolutionSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation_target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation_target_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_audio: Option<AudioArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_audio: Option<AudioArtifact>,
    pub warnings: Vec<StageWarning>,
}

impl PipelineResult {
    fn terminated(warnings: Vec<StageWarning>) -> Self {
        Self {
            warnings,
            ..Self::default()
        }
    }
}

pub struct Pipeline {
    registry: Arc<LanguageRegistry>,
    resolver: LanguageResolver,
    ocr: Arc<dyn OcrEngine>,
    translator: Arc<dyn TextTranslator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    default_target: String,
}

impl Pipeline {
    pub fn new(
        registry: Arc<LanguageRegistry>,
        resolver: LanguageResolver,
        ocr: Arc<dyn OcrEngine>,
        translator: Arc<dyn TextTranslator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            registry,
            resolver,
            ocr,
            translator,
            synthesizer,
            default_target: "en".to_string(),
        }
    }

    pub fn with_default_target(mut self, code: impl Into<String>) -> Self {
        self.default_target = code.into();
        self
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    /// Language used when resolution finds nothing usable.
    pub fn default_language(&self) -> &LanguageProfile {
        self.resolver.default_profile()
    }

    /// Runs every stage once, in order. Never fails: stage failures become
    /// warnings, and missing OCR text ends the run early.
    pub async fn run(&self, input: PipelineInput<'_>) -> PipelineResult {
        let mut warnings: Vec<StageWarning> = Vec::new();

        let broad_recipe = self.registry.broad_recipe();
        let outcome = ocr::extract(self.ocr.as_ref(), input.image, &broad_recipe, OcrPass::Broad);
        let sample = match settle(&mut warnings, outcome) {
            Step::Done(text) => text,
            Step::Stop(done) => return done,
            // No text to continue with.
            Step::Skipped => return PipelineResult::terminated(warnings),
        };

        let resolution = self.resolver.resolve(&sample, input.manual_language);
        warnings.extend(resolution.warnings.iter().map(StageWarning::from));
        let profile = &resolution.profile;

        let outcome = ocr::extract(
            self.ocr.as_ref(),
            input.image,
            &profile.ocr_code,
            OcrPass::Targeted,
        );
        let text = match settle(&mut warnings, outcome) {
            Step::Done(text) => text,
            Step::Stop(done) => return done,
            Step::Skipped => return PipelineResult::terminated(warnings),
        };

        let mut result = PipelineResult {
            extracted_text: Some(text.clone()),
            language_code: Some(profile.code.clone()),
            language_name: Some(profile.name.clone()),
            language_source: Some(resolution.source()),
            detected_code: resolution.detected_code().map(str::to_string),
            ..PipelineResult::default()
        };

        let translation = if input.enable_translation {
            let target = input
                .target_language
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .unwrap_or(&self.default_target);
            let outcome = translation::translate(
                self.translator.as_ref(),
                &self.registry,
                &text,
                &profile.code,
                target,
            )
            .await;
            match settle(&mut warnings, outcome) {
                Step::Done(translation) => Some(translation),
                Step::Stop(done) => return done,
                Step::Skipped => None,
            }
        } else {
            None
        };

        let outcome = speech::synthesize(
            self.synthesizer.as_ref(),
            &text,
            &profile.speech_code,
            ORIGINAL_AUDIO_STEM,
            Stage::SynthesizeOriginal,
        )
        .await;
        match settle(&mut warnings, outcome) {
            Step::Done(audio) => result.original_audio = Some(audio),
            Step::Stop(done) => return done,
            Step::Skipped => {}
        }

        if let Some(translation) = translation {
            let speech_code = self.registry.speech_code_for(&translation.target);
            let outcome = speech::synthesize(
                self.synthesizer.as_ref(),
                &translation.text,
                &speech_code,
                TRANSLATED_AUDIO_STEM,
                Stage::SynthesizeTranslated,
            )
            .await;
            match settle(&mut warnings, outcome) {
                Step::Done(audio) => result.translated_audio = Some(audio),
                Step::Stop(done) => return done,
                Step::Skipped => {}
            }
            result.translation_target = Some(translation.target);
            result.translation_target_name = Some(translation.target_name);
            result.translated_text = Some(translation.text);
        }

        info!(
            "pipeline: finished in {} with {} warning(s)",
            profile.code,
            warnings.len()
        );
        result.warnings = warnings;
        result
    }
}

enum Step<T> {
    Done(T),
    /// The failure was recorded and the run goes on without this output.
    Skipped,
    Stop(PipelineResult),
}

/// Applies the failure policy to one stage outcome. Every failure becomes a
/// warning; terminal ones end the run with only the warnings gathered so far.
fn settle<T>(warnings: &mut Vec<StageWarning>, outcome: Result<T, StageError>) -> Step<T> {
    let err = match outcome {
        Ok(value) => return Step::Done(value),
        Err(err) => err,
    };
    let terminal = err.is_terminal();
    if terminal {
        info!("pipeline: stopped at {}", err.stage());
    }
    warnings.push(err.into());
    if terminal {
        Step::Stop(PipelineResult::terminated(std::mem::take(warnings)))
    } else {
        Step::Skipped
    }
}
