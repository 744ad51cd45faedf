use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub mod data;
pub mod detect;
pub mod error;
pub mod languages;
pub mod logging;
pub mod ocr;
pub mod pipeline;
pub mod providers;
pub mod resolver;
mod server;
pub mod settings;
pub mod speech;
#[cfg(test)]
mod test_util;
pub mod translation;

pub use error::{Stage, StageError, StageWarning, WarningKind};
pub use pipeline::{Pipeline, PipelineInput, PipelineResult};
pub use server::run_server;

use settings::{Settings, SpeechBackend, TranslationBackend};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub image: Option<String>,
    pub source_lang: Option<String>,
    pub translate: bool,
    pub lang: Option<String>,
    pub out_dir: Option<String>,
    pub json: bool,
    pub show_languages: bool,
    pub settings_path: Option<String>,
}

pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;

    if config.show_languages {
        let registry = languages::LanguageRegistry::load()?;
        return Ok(format_languages(&registry));
    }

    let image_path = config
        .image
        .as_deref()
        .ok_or_else(|| anyhow!("--image is required"))?;
    let image = data::load_image(Path::new(image_path))?;
    let pipeline = build_pipeline(&settings)?;

    let mut input = PipelineInput::new(&image).with_manual_language(config.source_lang.as_deref());
    if config.translate {
        input = input.with_translation(config.lang.as_deref());
    }
    let result = pipeline.run(input).await;

    let written = match config.out_dir.as_deref() {
        Some(dir) => write_audio(&result, Path::new(dir))?,
        None => Vec::new(),
    };

    if config.json {
        return serde_json::to_string_pretty(&result)
            .with_context(|| "failed to serialize pipeline result");
    }
    Ok(format_summary(&result, &written))
}

/// Wires the configured collaborators into a pipeline.
pub fn build_pipeline(settings: &Settings) -> Result<Pipeline> {
    let registry = Arc::new(
        languages::LanguageRegistry::load()?.with_broad_pass(&settings.ocr_broad_languages)?,
    );
    let detector = Arc::new(detect::TrigramDetector::new());
    let resolver = resolver::LanguageResolver::new(
        registry.clone(),
        detector,
        resolver::ResolverConfig::from_settings(settings),
    )?;
    let ocr = Arc::new(ocr::TesseractEngine::from_settings(settings));

    let translator: Arc<dyn translation::TextTranslator> = match settings.translation_backend {
        TranslationBackend::MyMemory => Arc::new(translation::MyMemoryTranslator::new(
            settings.translation_email.clone(),
        )),
        TranslationBackend::Llm => {
            let selection =
                providers::resolve_provider_selection(settings.translation_model.as_deref())?;
            let key =
                providers::resolve_key(selection.provider, settings.translation_api_key.as_deref())
                    .with_context(|| "no API key found for selected provider")?;
            info!("translate: using {} provider", selection.provider.as_str());
            let provider =
                providers::build_provider(selection.provider, key, selection.requested_model);
            Arc::new(translation::ProviderTranslator::new(provider, registry.clone()))
        }
    };

    let synthesizer: Arc<dyn speech::SpeechSynthesizer> = match settings.speech_backend {
        SpeechBackend::Gtts => Arc::new(speech::GoogleTts::from_settings(settings)),
        SpeechBackend::System => Arc::new(speech::SystemTts::new()),
    };

    Ok(Pipeline::new(registry, resolver, ocr, translator, synthesizer)
        .with_default_target(settings.default_translation_target.clone()))
}

fn write_audio(result: &PipelineResult, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output dir: {}", dir.display()))?;
    let mut written = Vec::new();
    for artifact in [&result.original_audio, &result.translated_audio]
        .into_iter()
        .flatten()
    {
        let path = dir.join(&artifact.filename);
        std::fs::write(&path, &artifact.bytes)
            .with_context(|| format!("failed to write audio: {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

fn format_languages(registry: &languages::LanguageRegistry) -> String {
    let mut lines = vec!["# OCR / speech languages".to_string()];
    for profile in registry.profiles() {
        lines.push(format!(
            "{}\t{}\tocr={}\tspeech={}",
            profile.code, profile.name, profile.ocr_code, profile.speech_code
        ));
    }
    lines.push(format!("# broad OCR pass: {}", registry.broad_recipe()));
    lines.push("# translation targets".to_string());
    for (code, name) in registry.translation_targets() {
        lines.push(format!("{}\t{}", code, name));
    }
    lines.join("\n")
}

fn format_summary(result: &PipelineResult, written: &[PathBuf]) -> String {
    let mut lines = Vec::new();
    if let (Some(code), Some(name)) = (&result.language_code, &result.language_name) {
        let source = result
            .language_source
            .map(|source| match source {
                resolver::ResolutionSource::Manual => "manually selected",
                resolver::ResolutionSource::Detected => "detected",
                resolver::ResolutionSource::Default => "fallback",
            })
            .unwrap_or("unknown");
        lines.push(format!("language: {} ({}, {})", name, code, source));
    }
    if let Some(text) = &result.extracted_text {
        lines.push("extracted text:".to_string());
        lines.push(text.clone());
    }
    if let Some(text) = &result.translated_text {
        let target = result
            .translation_target_name
            .as_deref()
            .or(result.translation_target.as_deref())
            .unwrap_or("target");
        lines.push(format!("translation ({}):", target));
        lines.push(text.clone());
    }
    for path in written {
        lines.push(format!("audio: {}", path.display()));
    }
    for warning in &result.warnings {
        lines.push(format!("warning: [{}] {}", warning.stage, warning.message));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Stage, WarningKind};
    use crate::speech::AudioArtifact;

    fn finished() -> PipelineResult {
        PipelineResult {
            extracted_text: Some("Bonjour le monde".to_string()),
            language_code: Some("fr".to_string()),
            language_name: Some("French".to_string()),
            language_source: Some(resolver::ResolutionSource::Detected),
            detected_code: Some("fr".to_string()),
            translation_target: Some("en".to_string()),
            translation_target_name: Some("English".to_string()),
            translated_text: Some("Hello world".to_string()),
            original_audio: Some(AudioArtifact {
                bytes: b"ID3".to_vec(),
                mime: data::MP3_MIME.to_string(),
                filename: "original_audio.mp3".to_string(),
            }),
            translated_audio: None,
            warnings: vec![StageWarning {
                kind: WarningKind::SynthesisFailed,
                stage: Stage::SynthesizeTranslated,
                message: "voice unavailable".to_string(),
            }],
        }
    }

    #[test]
    fn summary_lists_text_translation_and_warnings() {
        let summary = format_summary(&finished(), &[PathBuf::from("out/original_audio.mp3")]);
        insta::assert_snapshot!(summary, @r###"
        language: French (fr, detected)
        extracted text:
        Bonjour le monde
        translation (English):
        Hello world
        audio: out/original_audio.mp3
        warning: [synthesize_translated] voice unavailable
        "###);
    }

    #[test]
    fn writes_only_present_artifacts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("audio");
        let written = write_audio(&finished(), &out).expect("write");
        assert_eq!(written, vec![out.join("original_audio.mp3")]);
        assert_eq!(std::fs::read(&written[0]).expect("read"), b"ID3");
    }

    #[test]
    fn language_listing_includes_translation_only_targets() {
        let registry = languages::LanguageRegistry::load().expect("registry");
        let listing = format_languages(&registry);
        assert!(listing.contains("fr\tFrench\tocr=fra\tspeech=fr"));
        assert!(listing.contains("# broad OCR pass: eng+hin+mal+tam+ben"));
        assert!(listing.contains("\nja\tJapanese"));
    }

    #[test]
    fn configured_api_key_builds_llm_pipeline() {
        let mut settings = Settings::default();
        settings.translation_backend = TranslationBackend::Llm;
        settings.translation_model = Some("claude:claude-3-5-haiku-latest".to_string());
        settings.translation_api_key = Some("sk-local".to_string());
        assert!(build_pipeline(&settings).is_ok());
    }

    #[test]
    fn missing_image_is_an_error() {
        let result = test_util::with_temp_home(|_| {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .expect("runtime");
            runtime.block_on(run(Config::default()))
        });
        assert!(result.is_err());
    }
}
