use anyhow::{Context, Result, anyhow};
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

use super::OcrEngine;
use super::preprocess;
use crate::data::ImageInput;
use crate::settings::Settings;

#[derive(Debug, Clone)]
pub struct TesseractEngine {
    command: String,
    psm: u32,
    preprocess: bool,
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self {
            command: "tesseract".to_string(),
            psm: 3,
            preprocess: true,
        }
    }
}

impl TesseractEngine {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.ocr_command.clone())
            .with_psm(settings.ocr_psm)
            .with_preprocess(settings.ocr_preprocess)
    }

    pub fn with_psm(mut self, psm: u32) -> Self {
        self.psm = psm;
        self
    }

    pub fn with_preprocess(mut self, preprocess: bool) -> Self {
        self.preprocess = preprocess;
        self
    }

    pub fn list_languages(&self) -> Result<Vec<String>> {
        let output = Command::new(&self.command)
            .arg("--list-langs")
            .output()
            .with_context(|| format!("failed to run {} --list-langs", self.command))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("tesseract --list-langs failed: {}", stderr.trim()));
        }
        Ok(parse_language_list(&String::from_utf8_lossy(&output.stdout)))
    }

    fn resolve_recipe(&self, requested: &str) -> Result<String> {
        let available = match self.list_languages() {
            Ok(list) => list,
            Err(err) => {
                debug!("ocr: skipping language check: {:#}", err);
                let trimmed = requested.trim();
                if trimmed.is_empty() {
                    return Err(anyhow!("ocr recipe is empty"));
                }
                return Ok(trimmed.to_string());
            }
        };
        let (chosen, missing) = select_available(requested, &available)?;
        if !missing.is_empty() {
            warn!(
                "ocr: language model(s) not installed: {} (available: {})",
                missing.join(", "),
                available.join(", ")
            );
        }
        Ok(chosen)
    }

    fn run(&self, path: &Path, recipe: &str) -> Result<String> {
        let output = Command::new(&self.command)
            .arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(recipe)
            .arg("--psm")
            .arg(self.psm.to_string())
            .output()
            .with_context(|| "failed to run tesseract (is it installed?)")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("tesseract failed: {}", stderr.trim()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl OcrEngine for TesseractEngine {
    fn extract_text(&self, image: &ImageInput, recipe: &str) -> Result<String> {
        let recipe = self.resolve_recipe(recipe)?;
        let decoded = image::load_from_memory(&image.bytes)
            .with_context(|| "failed to decode image for OCR")?;
        let prepared = if self.preprocess {
            preprocess::prepare_for_ocr(decoded)
        } else {
            decoded
        };

        let mut tmp = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .with_context(|| "failed to create temp file for OCR")?;
        prepared
            .write_to(&mut tmp, image::ImageFormat::Png)
            .with_context(|| "failed to write temp image for OCR")?;
        tmp.flush().ok();

        self.run(tmp.path(), &recipe)
    }
}

fn parse_language_list(stdout: &str) -> Vec<String> {
    // First line is a "List of available languages" header.
    stdout
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keeps the installed models of a `+`-joined recipe, preserving order.
fn select_available(requested: &str, available: &[String]) -> Result<(String, Vec<String>)> {
    let mut chosen = Vec::new();
    let mut missing = Vec::new();
    for raw in requested.split(['+', ',', ' ']) {
        let lang = raw.trim();
        if lang.is_empty() {
            continue;
        }
        if available.iter().any(|value| value == lang) {
            chosen.push(lang.to_string());
        } else {
            missing.push(lang.to_string());
        }
    }

    if chosen.is_empty() {
        if missing.is_empty() {
            return Err(anyhow!("ocr recipe is empty"));
        }
        return Err(anyhow!(
            "ocr language(s) not available: {} (available: {})",
            missing.join(", "),
            available.join(", ")
        ));
    }
    Ok((chosen.join("+"), missing))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn installed() -> Vec<String> {
        ["eng", "hin", "fra", "osd"]
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn parses_list_langs_output() {
        let stdout = "List of available languages in \"/usr/share/tessdata/\" (3):\neng\nfra\n\nosd\n";
        assert_eq!(parse_language_list(stdout), vec!["eng", "fra", "osd"]);
    }

    #[test]
    fn drops_missing_models_from_recipe() {
        let (recipe, missing) = select_available("eng+hin+mal+tam", &installed()).expect("recipe");
        assert_eq!(recipe, "eng+hin");
        assert_eq!(missing, vec!["mal", "tam"]);
    }

    #[test]
    fn recipe_without_installed_models_fails() {
        let err = select_available("tam", &installed()).expect_err("missing");
        assert!(err.to_string().contains("not available: tam"));
        assert!(select_available(" + ", &installed()).is_err());
    }

    #[test]
    fn missing_binary_is_an_error() {
        let engine = TesseractEngine::new("/nonexistent/tesseract-binary");
        let image = ImageInput {
            bytes: Vec::new(),
            mime: "image/png".to_string(),
            name: None,
        };
        assert!(engine.extract_text(&image, "eng").is_err());
    }
}
