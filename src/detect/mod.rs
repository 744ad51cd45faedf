use anyhow::Result;

mod trigram;

pub use trigram::TrigramDetector;

/// External language identification.
///
/// Implementations may be probabilistic, but given the same text and seed they
/// must return the same code: the OCR recipe chosen downstream depends on it.
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str, seed: u64) -> Result<String>;
}
