use anyhow::Result;
use std::future::Future;
use std::pin::Pin;
use tracing::{info, warn};

use crate::error::{Stage, StageError};
use crate::languages::LanguageRegistry;

mod llm;
mod mymemory;

pub use llm::ProviderTranslator;
pub use mymemory::MyMemoryTranslator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub text: String,
    /// Resolved source language code. Backends may ignore it.
    pub source: String,
    pub target: String,
}

pub type TranslateFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// External translation capability. May fail on unsupported pairs or connectivity.
pub trait TextTranslator: Send + Sync {
    fn translate<'a>(&'a self, request: &'a TranslationRequest) -> TranslateFuture<'a>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub text: String,
    pub target: String,
    pub target_name: String,
}

/// Runs the translation stage once. The target must be in the registry's
/// translation-target set; an empty translation counts as a failure.
pub async fn translate(
    translator: &dyn TextTranslator,
    registry: &LanguageRegistry,
    text: &str,
    source: &str,
    target: &str,
) -> Result<Translation, StageError> {
    let target = target.trim().to_lowercase();
    let Some(target_name) = registry.translation_target_name(&target) else {
        let err = StageError::UnsupportedLanguage {
            stage: Stage::Translate,
            message: format!("'{}' is not a supported translation target", target),
        };
        warn!("{}", err);
        return Err(err);
    };
    let target_name = target_name.to_string();

    info!("translate: {} -> {}", source, target);
    let request = TranslationRequest {
        text: text.to_string(),
        source: source.to_string(),
        target: target.clone(),
    };
    let translated = translator.translate(&request).await.map_err(|err| {
        let err = StageError::TranslationFailed {
            stage: Stage::Translate,
            message: format!("{:#}", err),
        };
        warn!("{}", err);
        err
    })?;

    let translated = translated.trim();
    if translated.is_empty() {
        let err = StageError::TranslationFailed {
            stage: Stage::Translate,
            message: "translator returned an empty translation".to_string(),
        };
        warn!("{}", err);
        return Err(err);
    }
    info!("translate: received {} chars", translated.chars().count());
    Ok(Translation {
        text: translated.to_string(),
        target,
        target_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WarningKind;
    use crate::test_util::FakeTranslator;

    fn registry() -> LanguageRegistry {
        LanguageRegistry::load().expect("registry")
    }

    #[tokio::test]
    async fn returns_trimmed_translation_with_target_name() {
        let translator = FakeTranslator::returning("  Hello world \n");
        let translation = translate(&translator, &registry(), "Bonjour le monde", "fr", "EN")
            .await
            .expect("translation");
        assert_eq!(translation.text, "Hello world");
        assert_eq!(translation.target, "en");
        assert_eq!(translation.target_name, "English");

        let calls = translator.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].source, "fr");
        assert_eq!(calls[0].target, "en");
    }

    #[tokio::test]
    async fn targets_without_ocr_recipe_are_allowed() {
        let translator = FakeTranslator::returning("こんにちは");
        let translation = translate(&translator, &registry(), "Hello", "en", "ja")
            .await
            .expect("translation");
        assert_eq!(translation.target_name, "Japanese");
    }

    #[tokio::test]
    async fn unknown_target_is_rejected_without_calling_out() {
        let translator = FakeTranslator::returning("never");
        let err = translate(&translator, &registry(), "Hello", "en", "xx")
            .await
            .expect_err("unsupported");
        assert_eq!(err.kind(), WarningKind::UnsupportedLanguage);
        assert_eq!(err.stage(), Stage::Translate);
        assert!(translator.calls().is_empty());
    }

    #[tokio::test]
    async fn failures_and_blank_output_are_translation_failed() {
        let failing = FakeTranslator::failing("connection refused");
        let err = translate(&failing, &registry(), "Hola", "es", "en")
            .await
            .expect_err("failure");
        assert_eq!(err.kind(), WarningKind::TranslationFailed);
        assert!(err.message().contains("connection refused"));

        let blank = FakeTranslator::returning("   ");
        let err = translate(&blank, &registry(), "Hola", "es", "en")
            .await
            .expect_err("blank");
        assert_eq!(err.kind(), WarningKind::TranslationFailed);
    }
}
