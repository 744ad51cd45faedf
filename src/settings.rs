use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationBackend {
    MyMemory,
    Llm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechBackend {
    Gtts,
    System,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub default_language: String,
    pub default_translation_target: String,
    pub detector_seed: u64,
    /// Detected code -> registry code collapses applied before lookup.
    pub language_aliases: HashMap<String, String>,
    pub ocr_broad_languages: Vec<String>,
    pub ocr_psm: u32,
    pub ocr_preprocess: bool,
    pub ocr_command: String,
    pub translation_backend: TranslationBackend,
    pub translation_model: Option<String>,
    pub translation_email: Option<String>,
    /// Overrides the provider's API key environment variable.
    pub translation_api_key: Option<String>,
    pub speech_backend: SpeechBackend,
    pub speech_tld: String,
    pub speech_slow: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let language_aliases = [("mr", "hi"), ("ur", "hi")]
            .into_iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
        Self {
            default_language: "en".to_string(),
            default_translation_target: "en".to_string(),
            detector_seed: 0,
            language_aliases,
            ocr_broad_languages: ["en", "hi", "ml", "ta", "bn"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            ocr_psm: 3,
            ocr_preprocess: true,
            ocr_command: "tesseract".to_string(),
            translation_backend: TranslationBackend::MyMemory,
            translation_model: None,
            translation_email: None,
            translation_api_key: None,
            speech_backend: SpeechBackend::Gtts,
            speech_tld: "com".to_string(),
            speech_slow: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    pipeline: Option<PipelineSettings>,
    detector: Option<DetectorSettings>,
    ocr: Option<OcrSettings>,
    translation: Option<TranslationSettings>,
    speech: Option<SpeechSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelineSettings {
    default_language: Option<String>,
    default_translation_target: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DetectorSettings {
    seed: Option<u64>,
    aliases: Option<HashMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    broad_languages: Option<Vec<String>>,
    psm: Option<u32>,
    preprocess: Option<bool>,
    command: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslationSettings {
    backend: Option<TranslationBackend>,
    model: Option<String>,
    email: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SpeechSettings {
    backend: Option<SpeechBackend>,
    tld: Option<String>,
    slow: Option<bool>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings.merge_str(&content).with_context(|| {
                format!("failed to parse settings: {}", path.display())
            })?;
        }
    }

    Ok(settings)
}

impl Settings {
    pub fn merge_str(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed);
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(pipeline) = incoming.pipeline {
            if let Some(code) = non_empty(pipeline.default_language) {
                self.default_language = code.to_lowercase();
            }
            if let Some(code) = non_empty(pipeline.default_translation_target) {
                self.default_translation_target = code.to_lowercase();
            }
        }
        if let Some(detector) = incoming.detector {
            if let Some(seed) = detector.seed {
                self.detector_seed = seed;
            }
            if let Some(aliases) = detector.aliases {
                for (from, to) in aliases {
                    let from = from.trim().to_lowercase();
                    let to = to.trim().to_lowercase();
                    if from.is_empty() {
                        continue;
                    }
                    // An empty target removes an inherited collapse.
                    if to.is_empty() {
                        self.language_aliases.remove(&from);
                    } else {
                        self.language_aliases.insert(from, to);
                    }
                }
            }
        }
        if let Some(ocr) = incoming.ocr {
            if let Some(languages) = ocr.broad_languages {
                let languages = languages
                    .into_iter()
                    .map(|code| code.trim().to_lowercase())
                    .filter(|code| !code.is_empty())
                    .collect::<Vec<_>>();
                if !languages.is_empty() {
                    self.ocr_broad_languages = languages;
                }
            }
            if let Some(psm) = ocr.psm {
                self.ocr_psm = psm;
            }
            if let Some(preprocess) = ocr.preprocess {
                self.ocr_preprocess = preprocess;
            }
            if let Some(command) = non_empty(ocr.command) {
                self.ocr_command = command;
            }
        }
        if let Some(translation) = incoming.translation {
            if let Some(backend) = translation.backend {
                self.translation_backend = backend;
            }
            if let Some(model) = non_empty(translation.model) {
                self.translation_model = Some(model);
            }
            if let Some(email) = non_empty(translation.email) {
                self.translation_email = Some(email);
            }
            if let Some(key) = non_empty(translation.api_key) {
                self.translation_api_key = Some(key);
            }
        }
        if let Some(speech) = incoming.speech {
            if let Some(backend) = speech.backend {
                self.speech_backend = backend;
            }
            if let Some(tld) = non_empty(speech.tld) {
                self.speech_tld = tld;
            }
            if let Some(slow) = speech.slow {
                self.speech_slow = slow;
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".ocr-speech-translator"))
        }
    })
}
