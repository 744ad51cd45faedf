use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::data::{ImageInput, MP3_MIME};
use crate::detect::LanguageDetector;
use crate::ocr::OcrEngine;
use crate::speech::{NoSpeechEngine, SpeechAudio, SpeechSynthesizer, SynthesisFuture};
use crate::translation::{TextTranslator, TranslateFuture, TranslationRequest};

pub(crate) fn with_temp_home<F, R>(func: F) -> R
where
    F: FnOnce(&std::path::Path) -> R,
{
    static HOME_MUTEX: Mutex<()> = Mutex::new(());
    let _guard = HOME_MUTEX.lock().unwrap_or_else(|err| err.into_inner());
    let dir = tempfile::tempdir().expect("tempdir");
    let old_home = std::env::var("HOME").ok();
    // SAFETY: HOME is only mutated while HOME_MUTEX is held.
    unsafe { std::env::set_var("HOME", dir.path()) };
    let result = func(dir.path());
    match old_home {
        Some(old) => unsafe { std::env::set_var("HOME", old) },
        None => unsafe { std::env::remove_var("HOME") },
    }
    result
}

pub(crate) fn sample_image() -> ImageInput {
    ImageInput {
        bytes: b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec(),
        mime: "image/png".to_string(),
        name: Some("sample.png".to_string()),
    }
}

/// OCR engine answering per recipe. Unscripted recipes fail like a missing model.
#[derive(Default)]
pub(crate) struct FakeOcr {
    outputs: HashMap<String, Result<String, String>>,
    recipes: Mutex<Vec<String>>,
}

impl FakeOcr {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_text(mut self, recipe: &str, text: &str) -> Self {
        self.outputs
            .insert(recipe.to_string(), Ok(text.to_string()));
        self
    }

    pub(crate) fn with_error(mut self, recipe: &str, message: &str) -> Self {
        self.outputs
            .insert(recipe.to_string(), Err(message.to_string()));
        self
    }

    pub(crate) fn recipes(&self) -> Vec<String> {
        self.recipes.lock().expect("lock").clone()
    }
}

impl OcrEngine for FakeOcr {
    fn extract_text(&self, _image: &ImageInput, recipe: &str) -> Result<String> {
        self.recipes.lock().expect("lock").push(recipe.to_string());
        match self.outputs.get(recipe) {
            Some(Ok(text)) => Ok(text.clone()),
            Some(Err(message)) => Err(anyhow!("{}", message)),
            None => Err(anyhow!("no language model for recipe '{}'", recipe)),
        }
    }
}

pub(crate) struct FakeDetector {
    outcome: Result<String, String>,
    calls: AtomicUsize,
}

impl FakeDetector {
    pub(crate) fn returning(code: &str) -> Self {
        Self {
            outcome: Ok(code.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LanguageDetector for FakeDetector {
    fn detect(&self, _text: &str, _seed: u64) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone().map_err(|message| anyhow!("{}", message))
    }
}

pub(crate) struct FakeTranslator {
    outcome: Result<String, String>,
    calls: Mutex<Vec<TranslationRequest>>,
}

impl FakeTranslator {
    pub(crate) fn returning(text: &str) -> Self {
        Self {
            outcome: Ok(text.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<TranslationRequest> {
        self.calls.lock().expect("lock").clone()
    }
}

impl TextTranslator for FakeTranslator {
    fn translate<'a>(&'a self, request: &'a TranslationRequest) -> TranslateFuture<'a> {
        self.calls.lock().expect("lock").push(request.clone());
        let outcome = self.outcome.clone();
        Box::pin(async move { outcome.map_err(|message| anyhow!("{}", message)) })
    }
}

/// Synthesizer returning a tiny MP3 stub, with per-language failures.
pub(crate) struct FakeSynth {
    mime: String,
    failures: HashMap<String, String>,
    no_engine: bool,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeSynth {
    pub(crate) fn new() -> Self {
        Self {
            mime: MP3_MIME.to_string(),
            failures: HashMap::new(),
            no_engine: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_mime(mut self, mime: &str) -> Self {
        self.mime = mime.to_string();
        self
    }

    pub(crate) fn failing_for(mut self, language: &str, message: &str) -> Self {
        self.failures
            .insert(language.to_string(), message.to_string());
        self
    }

    pub(crate) fn without_engine(mut self) -> Self {
        self.no_engine = true;
        self
    }

    /// `(text, language)` pairs in call order.
    pub(crate) fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().expect("lock").clone()
    }
}

impl SpeechSynthesizer for FakeSynth {
    fn synthesize<'a>(&'a self, text: &'a str, language: &'a str) -> SynthesisFuture<'a> {
        self.calls
            .lock()
            .expect("lock")
            .push((text.to_string(), language.to_string()));
        let outcome = if self.no_engine {
            Err(NoSpeechEngine.into())
        } else if let Some(message) = self.failures.get(language) {
            Err(anyhow!("{}", message))
        } else {
            Ok(SpeechAudio {
                bytes: format!("ID3:{}:{}", language, text).into_bytes(),
                mime: self.mime.clone(),
            })
        };
        Box::pin(async move { outcome })
    }
}
