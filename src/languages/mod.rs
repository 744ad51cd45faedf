use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Per-language recipe: which OCR model, which speech voice, and how to call it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageProfile {
    pub code: String,
    #[serde(rename = "ocr")]
    pub ocr_code: String,
    #[serde(rename = "speech")]
    pub speech_code: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    profiles: Vec<LanguageProfile>,
    index: HashMap<String, usize>,
    broad_pass: Vec<String>,
    translation_targets: BTreeMap<String, String>,
}

impl LanguageRegistry {
    pub fn load() -> Result<Self> {
        let raw = include_str!("registry.json");
        let parsed: RegistryData =
            serde_json::from_str(raw).with_context(|| "failed to parse language registry data")?;
        Self::from_parts(parsed.profiles, parsed.broad_pass, parsed.translation_targets)
    }

    fn from_parts(
        profiles: Vec<LanguageProfile>,
        broad_pass: Vec<String>,
        translation_targets: BTreeMap<String, String>,
    ) -> Result<Self> {
        let mut index = HashMap::new();
        for (idx, profile) in profiles.iter().enumerate() {
            if profile.ocr_code.trim().is_empty() || profile.speech_code.trim().is_empty() {
                return Err(anyhow!(
                    "language profile '{}' has an empty engine code",
                    profile.code
                ));
            }
            if index.insert(normalize_code(&profile.code), idx).is_some() {
                return Err(anyhow!("duplicate language profile '{}'", profile.code));
            }
        }
        let translation_targets = translation_targets
            .into_iter()
            .map(|(code, name)| (normalize_code(&code), name))
            .collect();
        let registry = LanguageRegistry {
            profiles,
            index,
            broad_pass: Vec::new(),
            translation_targets,
        };
        registry.with_broad_pass(&broad_pass)
    }

    /// Replaces the curated broad-pass subset. Every code must be a registry entry.
    pub fn with_broad_pass(mut self, codes: &[String]) -> Result<Self> {
        let mut broad_pass = Vec::new();
        for code in codes {
            let code = normalize_code(code);
            if !self.index.contains_key(&code) {
                return Err(anyhow!(
                    "broad OCR language '{}' is not in the language registry",
                    code
                ));
            }
            if !broad_pass.contains(&code) {
                broad_pass.push(code);
            }
        }
        if broad_pass.is_empty() {
            return Err(anyhow!("broad OCR language set is empty"));
        }
        self.broad_pass = broad_pass;
        Ok(self)
    }

    pub fn lookup(&self, code: &str) -> Option<&LanguageProfile> {
        self.index
            .get(&normalize_code(code))
            .map(|idx| &self.profiles[*idx])
    }

    pub fn profiles(&self) -> &[LanguageProfile] {
        &self.profiles
    }

    /// OCR recipe for the broad pass, e.g. `eng+hin+mal+tam+ben`.
    pub fn broad_recipe(&self) -> String {
        self.broad_pass
            .iter()
            .filter_map(|code| self.lookup(code))
            .map(|profile| profile.ocr_code.as_str())
            .collect::<Vec<_>>()
            .join("+")
    }

    pub fn translation_target_name(&self, code: &str) -> Option<&str> {
        self.translation_targets
            .get(&normalize_code(code))
            .map(String::as_str)
    }

    pub fn translation_targets(&self) -> impl Iterator<Item = (&str, &str)> {
        self.translation_targets
            .iter()
            .map(|(code, name)| (code.as_str(), name.as_str()))
    }

    /// Voice for speaking text in `code`: the registry speech code when known,
    /// otherwise the code itself.
    pub fn speech_code_for(&self, code: &str) -> String {
        self.lookup(code)
            .map(|profile| profile.speech_code.clone())
            .unwrap_or_else(|| normalize_code(code))
    }
}

pub(crate) fn normalize_code(code: &str) -> String {
    code.trim().to_lowercase()
}

#[derive(Debug, Deserialize)]
struct RegistryData {
    profiles: Vec<LanguageProfile>,
    broad_pass: Vec<String>,
    translation_targets: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_profile_has_engine_codes() {
        let registry = LanguageRegistry::load().expect("registry");
        assert_eq!(registry.profiles().len(), 12);
        for profile in registry.profiles() {
            let found = registry.lookup(&profile.code).expect("lookup is total");
            assert!(!found.ocr_code.is_empty());
            assert!(!found.speech_code.is_empty());
        }
    }

    #[test]
    fn lookup_normalizes_and_misses_unknown_codes() {
        let registry = LanguageRegistry::load().expect("registry");
        assert_eq!(registry.lookup(" FR ").map(|p| p.ocr_code.as_str()), Some("fra"));
        assert!(registry.lookup("mr").is_none());
        assert!(registry.lookup("").is_none());
    }

    #[test]
    fn broad_recipe_joins_curated_subset() {
        let registry = LanguageRegistry::load().expect("registry");
        assert_eq!(registry.broad_recipe(), "eng+hin+mal+tam+ben");

        let registry = registry
            .with_broad_pass(&["fr".to_string(), "de".to_string(), "fr".to_string()])
            .expect("override");
        assert_eq!(registry.broad_recipe(), "fra+deu");
    }

    #[test]
    fn broad_pass_rejects_unknown_codes() {
        let registry = LanguageRegistry::load().expect("registry");
        let err = registry
            .with_broad_pass(&["xx".to_string()])
            .expect_err("unknown code");
        assert!(err.to_string().contains("xx"));
    }

    #[test]
    fn translation_targets_are_independent_of_profiles() {
        let registry = LanguageRegistry::load().expect("registry");
        assert_eq!(registry.translation_target_name("ja"), Some("Japanese"));
        assert!(registry.lookup("ja").is_none());
        assert!(registry.lookup("pa").is_some());
        assert_eq!(registry.translation_target_name("pa"), None);
        assert_eq!(registry.translation_target_name("zh"), Some("Chinese"));
        assert_eq!(registry.speech_code_for("ja"), "ja");
        assert_eq!(registry.speech_code_for("fr"), "fr");
    }
}
