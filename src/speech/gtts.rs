use anyhow::{Context, Result, anyhow};
use tracing::debug;

use super::{SpeechAudio, SpeechSynthesizer, SynthesisFuture};
use crate::data::MP3_MIME;
use crate::settings::Settings;

/// Google Translate's TTS endpoint rejects longer inputs.
const MAX_CHUNK_CHARS: usize = 100;

/// Speech through the Google Translate TTS endpoint, the service behind gTTS.
#[derive(Debug, Clone)]
pub struct GoogleTts {
    client: reqwest::Client,
    tld: String,
    slow: bool,
}

impl Default for GoogleTts {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            tld: "com".to_string(),
            slow: false,
        }
    }
}

impl GoogleTts {
    pub fn new(tld: impl Into<String>, slow: bool) -> Self {
        let tld = tld.into();
        Self {
            tld: if tld.trim().is_empty() {
                "com".to_string()
            } else {
                tld.trim().trim_start_matches('.').to_string()
            },
            slow,
            ..Self::default()
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.speech_tld.clone(), settings.speech_slow)
    }

    fn endpoint(&self) -> String {
        format!("https://translate.google.{}/translate_tts", self.tld)
    }

    async fn fetch(&self, text: &str, language: &str) -> Result<SpeechAudio> {
        let chunks = split_text(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(anyhow!("no text to speak"));
        }
        let total = chunks.len().to_string();
        let speed = if self.slow { "0.3" } else { "1" };
        let mut bytes = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            debug!("speech: fetching chunk {}/{}", idx + 1, total);
            let idx = idx.to_string();
            let textlen = chunk.chars().count().to_string();
            let response = self
                .client
                .get(self.endpoint())
                .query(&[
                    ("ie", "UTF-8"),
                    ("q", chunk.as_str()),
                    ("tl", language),
                    ("client", "tw-ob"),
                    ("ttsspeed", speed),
                    ("total", total.as_str()),
                    ("idx", idx.as_str()),
                    ("textlen", textlen.as_str()),
                ])
                .send()
                .await
                .with_context(|| "failed to reach Google TTS")?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(anyhow!(
                    "Google TTS error ({}) for language '{}': {}",
                    status,
                    language,
                    body.chars().take(200).collect::<String>().trim()
                ));
            }
            let audio = response
                .bytes()
                .await
                .with_context(|| "failed to read Google TTS audio")?;
            bytes.extend_from_slice(&audio);
        }
        Ok(SpeechAudio {
            bytes,
            mime: MP3_MIME.to_string(),
        })
    }
}

impl SpeechSynthesizer for GoogleTts {
    fn synthesize<'a>(&'a self, text: &'a str, language: &'a str) -> SynthesisFuture<'a> {
        Box::pin(self.fetch(text, language))
    }
}

/// Splits on whitespace into chunks of at most `max_chars` characters.
/// Words longer than the limit are cut.
fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for word in text.split_whitespace() {
        let mut word = word;
        let mut word_len = word.chars().count();
        while word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let split_at = word
                .char_indices()
                .nth(max_chars)
                .map(|(idx, _)| idx)
                .unwrap_or(word.len());
            chunks.push(word[..split_at].to_string());
            word = &word[split_at..];
            word_len -= max_chars;
        }
        if word.is_empty() {
            continue;
        }
        let needed = if current.is_empty() {
            word_len
        } else {
            current_len + 1 + word_len
        };
        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_len = needed;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_text("Bonjour  le\nmonde", 100), vec!["Bonjour le monde"]);
        assert!(split_text(" \n ", 100).is_empty());
    }

    #[test]
    fn chunks_break_on_word_boundaries() {
        let text = "alpha beta gamma delta";
        assert_eq!(split_text(text, 11), vec!["alpha beta", "gamma delta"]);
        for chunk in split_text(&"lorem ipsum ".repeat(40), MAX_CHUNK_CHARS) {
            assert!(chunk.chars().count() <= MAX_CHUNK_CHARS);
        }
    }

    #[test]
    fn oversized_words_are_cut_on_char_boundaries() {
        let word = "அ".repeat(7);
        let chunks = split_text(&format!("ok {}", word), 3);
        assert_eq!(chunks, vec!["ok", "அஅஅ", "அஅஅ", "அ"]);
    }

    #[test]
    fn tld_is_normalized() {
        assert_eq!(
            GoogleTts::new(".co.in", false).endpoint(),
            "https://translate.google.co.in/translate_tts"
        );
        assert_eq!(
            GoogleTts::new("", true).endpoint(),
            "https://translate.google.com/translate_tts"
        );
    }
}
