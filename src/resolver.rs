use anyhow::{Result, anyhow};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::detect::LanguageDetector;
use crate::error::{Stage, StageError};
use crate::languages::{LanguageProfile, LanguageRegistry, normalize_code};
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Manual,
    Detected,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedLanguage {
    Manual(LanguageProfile),
    Detected {
        detected_code: String,
        profile: LanguageProfile,
    },
    /// Detection failed or produced a code outside the registry.
    Unresolved { detected_code: Option<String> },
}

/// Outcome of one resolution. `profile` is always usable: an unresolved
/// language has the default profile substituted here, never later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub resolved: ResolvedLanguage,
    pub profile: LanguageProfile,
    pub warnings: Vec<StageError>,
}

impl Resolution {
    pub fn source(&self) -> ResolutionSource {
        match self.resolved {
            ResolvedLanguage::Manual(_) => ResolutionSource::Manual,
            ResolvedLanguage::Detected { .. } => ResolutionSource::Detected,
            ResolvedLanguage::Unresolved { .. } => ResolutionSource::Default,
        }
    }

    pub fn detected_code(&self) -> Option<&str> {
        match &self.resolved {
            ResolvedLanguage::Detected { detected_code, .. } => Some(detected_code),
            ResolvedLanguage::Unresolved { detected_code } => detected_code.as_deref(),
            ResolvedLanguage::Manual(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub seed: u64,
    pub default_code: String,
    /// Variant collapses, e.g. `mr -> hi`.
    pub aliases: HashMap<String, String>,
}

impl ResolverConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            seed: settings.detector_seed,
            default_code: settings.default_language.clone(),
            aliases: settings.language_aliases.clone(),
        }
    }
}

pub struct LanguageResolver {
    registry: Arc<LanguageRegistry>,
    detector: Arc<dyn LanguageDetector>,
    seed: u64,
    default_profile: LanguageProfile,
    aliases: HashMap<String, String>,
}

impl LanguageResolver {
    pub fn new(
        registry: Arc<LanguageRegistry>,
        detector: Arc<dyn LanguageDetector>,
        config: ResolverConfig,
    ) -> Result<Self> {
        let default_profile = registry
            .lookup(&config.default_code)
            .cloned()
            .ok_or_else(|| {
                anyhow!(
                    "default language '{}' is not in the language registry",
                    config.default_code
                )
            })?;
        let aliases = config
            .aliases
            .into_iter()
            .map(|(from, to)| (normalize_code(&from), normalize_code(&to)))
            .collect();
        Ok(Self {
            registry,
            detector,
            seed: config.seed,
            default_profile,
            aliases,
        })
    }

    pub fn default_profile(&self) -> &LanguageProfile {
        &self.default_profile
    }

    /// Collapses a detected variant onto its registry entry. Unmapped codes pass through.
    pub fn normalize(&self, code: &str) -> String {
        let code = normalize_code(code);
        self.aliases.get(&code).cloned().unwrap_or(code)
    }

    pub fn resolve(&self, sample_text: &str, manual_code: Option<&str>) -> Resolution {
        let mut warnings = Vec::new();

        if let Some(manual) = manual_code.map(str::trim).filter(|code| !code.is_empty()) {
            if let Some(profile) = self.registry.lookup(manual) {
                info!("resolve: using manually selected language {}", profile.name);
                return Resolution {
                    resolved: ResolvedLanguage::Manual(profile.clone()),
                    profile: profile.clone(),
                    warnings,
                };
            }
            let err = StageError::UnsupportedLanguage {
                stage: Stage::Resolve,
                message: format!(
                    "manually selected language '{}' has no OCR/speech recipe; detecting instead",
                    manual
                ),
            };
            warn!("{}", err);
            warnings.push(err);
        }

        let detected = match self.detector.detect(sample_text, self.seed) {
            Ok(code) => code,
            Err(err) => {
                let err = StageError::DetectionFailed {
                    stage: Stage::Resolve,
                    message: format!(
                        "{}; using {} as fallback",
                        err, self.default_profile.name
                    ),
                };
                warn!("{}", err);
                warnings.push(err);
                return self.fallback(None, warnings);
            }
        };
        info!("resolve: detected language code {}", detected);

        let normalized = self.normalize(&detected);
        match self.registry.lookup(&normalized) {
            Some(profile) => {
                info!("resolve: automatically detected language {}", profile.name);
                Resolution {
                    resolved: ResolvedLanguage::Detected {
                        detected_code: normalize_code(&detected),
                        profile: profile.clone(),
                    },
                    profile: profile.clone(),
                    warnings,
                }
            }
            None => {
                let err = StageError::UnsupportedLanguage {
                    stage: Stage::Resolve,
                    message: format!(
                        "detected language '{}' is not supported; using {} as fallback",
                        detected, self.default_profile.name
                    ),
                };
                warn!("{}", err);
                warnings.push(err);
                self.fallback(Some(normalize_code(&detected)), warnings)
            }
        }
    }

    fn fallback(&self, detected_code: Option<String>, warnings: Vec<StageError>) -> Resolution {
        Resolution {
            resolved: ResolvedLanguage::Unresolved { detected_code },
            profile: self.default_profile.clone(),
            warnings,
        }
    }
}
