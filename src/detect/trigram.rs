use anyhow::{Result, anyhow};
use tracing::debug;
use whatlang::{Detector, Lang};

use super::LanguageDetector;

/// Languages the detector may answer with, as ISO 639-1 codes.
///
/// Wider than the registry: variants such as `mr` and `ur` collapse through
/// aliases later, and an unsupported language is reported by its own code
/// rather than the nearest supported one.
const LANGUAGES: &[(Lang, &str)] = &[
    (Lang::Eng, "en"),
    (Lang::Fra, "fr"),
    (Lang::Deu, "de"),
    (Lang::Spa, "es"),
    (Lang::Por, "pt"),
    (Lang::Ita, "it"),
    (Lang::Nld, "nl"),
    (Lang::Rus, "ru"),
    (Lang::Ell, "el"),
    (Lang::Hin, "hi"),
    (Lang::Mar, "mr"),
    (Lang::Nep, "ne"),
    (Lang::Ara, "ar"),
    (Lang::Urd, "ur"),
    (Lang::Pes, "fa"),
    (Lang::Ben, "bn"),
    (Lang::Pan, "pa"),
    (Lang::Guj, "gu"),
    (Lang::Tam, "ta"),
    (Lang::Tel, "te"),
    (Lang::Kan, "kn"),
    (Lang::Mal, "ml"),
    (Lang::Tha, "th"),
    (Lang::Kor, "ko"),
    (Lang::Jpn, "ja"),
    (Lang::Cmn, "zh"),
];

/// Character trigram language identifier backed by `whatlang`.
///
/// The script decides first; languages sharing a script are ranked by trigram
/// profile distance. Scoring is deterministic, so the seed never changes the
/// answer.
#[derive(Debug, Clone)]
pub struct TrigramDetector {
    detector: Detector,
}

impl Default for TrigramDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl TrigramDetector {
    pub fn new() -> Self {
        let allowlist = LANGUAGES.iter().map(|(lang, _)| *lang).collect();
        Self {
            detector: Detector::with_allowlist(allowlist),
        }
    }
}

impl LanguageDetector for TrigramDetector {
    fn detect(&self, text: &str, _seed: u64) -> Result<String> {
        let info = self
            .detector
            .detect(text)
            .ok_or_else(|| anyhow!("text has no letters of a known script"))?;
        let code = iso_code(info.lang())
            .ok_or_else(|| anyhow!("unmapped language '{}'", info.lang().code()))?;
        debug!(
            "detect: {} (confidence {:.2}, reliable {})",
            code,
            info.confidence(),
            info.is_reliable()
        );
        Ok(code.to_string())
    }
}

fn iso_code(lang: Lang) -> Option<&'static str> {
    LANGUAGES
        .iter()
        .find(|(candidate, _)| *candidate == lang)
        .map(|(_, code)| *code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(text: &str) -> String {
        TrigramDetector::default().detect(text, 0).expect("detect")
    }

    #[test]
    fn detects_latin_languages_from_ordinary_sentences() {
        assert_eq!(
            detect("Please remember to water my garden tomorrow morning before sunrise"),
            "en"
        );
        assert_eq!(
            detect("Nous avons mangé chez ma grand-mère hier soir, puis nous sommes rentrés tard"),
            "fr"
        );
        assert_eq!(
            detect("Wir fahren morgen früh zusammen nach München zurück, weil unser Urlaub leider vorbei geht"),
            "de"
        );
        assert_eq!(
            detect("Mañana temprano saldremos hacia Sevilla porque mi hermano cumple años"),
            "es"
        );
    }

    #[test]
    fn single_language_scripts_map_directly() {
        assert_eq!(detect("வணக்கம் உலகம்"), "ta");
        assert_eq!(detect("ഹലോ ലോകം"), "ml");
        assert_eq!(detect("ਸਤ ਸ੍ਰੀ ਅਕਾਲ"), "pa");
        assert_eq!(detect("こんにちは世界"), "ja");
        assert_eq!(detect("你好世界"), "zh");
    }

    #[test]
    fn separates_variants_sharing_a_script() {
        assert_eq!(
            detect("मुझे कल सुबह दिल्ली जाना पड़ेगा क्योंकि मेरी बहन की शादी होने वाली है"),
            "hi"
        );
        assert_eq!(
            detect("मला उद्या सकाळी पुण्याला जायचे आहे कारण माझ्या बहिणीचे लग्न आहे"),
            "mr"
        );
        assert_eq!(
            detect("میں کل صبح لاہور جاؤں گا کیونکہ میری بہن کی شادی ہے"),
            "ur"
        );
        assert_eq!(detect("سوف أسافر غدا إلى القاهرة لزيارة عائلتي الكبيرة"), "ar");
    }

    #[test]
    fn seed_does_not_change_the_answer() {
        let detector = TrigramDetector::new();
        let text = "Nous sommes rentrés tard hier soir";
        let first = detector.detect(text, 11).expect("detect");
        for seed in [0, 11, 42, u64::MAX] {
            assert_eq!(detector.detect(text, seed).expect("detect"), first);
        }
    }

    #[test]
    fn text_without_letters_fails() {
        let detector = TrigramDetector::default();
        assert!(detector.detect("12345 !!!", 0).is_err());
        assert!(detector.detect("   ", 0).is_err());
    }

    #[test]
    fn every_answer_is_a_two_letter_code() {
        for (lang, code) in LANGUAGES {
            assert_eq!(code.len(), 2, "{:?}", lang);
            assert_eq!(iso_code(*lang), Some(*code));
        }
    }
}
