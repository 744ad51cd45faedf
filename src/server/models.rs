use serde::{Deserialize, Serialize};

use crate::languages::LanguageProfile;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct ProcessRequest {
    pub(crate) image_base64: Option<String>,
    pub(crate) image_name: Option<String>,
    pub(crate) source_lang: Option<String>,
    pub(crate) translate: Option<bool>,
    pub(crate) lang: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LanguagesResponse {
    pub(crate) default_language: String,
    pub(crate) broad_recipe: String,
    pub(crate) languages: Vec<LanguageProfile>,
    pub(crate) translation_targets: Vec<TranslationTarget>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TranslationTarget {
    pub(crate) code: String,
    pub(crate) name: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}
