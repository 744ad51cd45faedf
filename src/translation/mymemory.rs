use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::Value;

use super::{TextTranslator, TranslateFuture, TranslationRequest};

const ENDPOINT: &str = "https://api.mymemory.translated.net/get";

/// Free MyMemory translation API. `email` raises the anonymous daily quota.
#[derive(Debug, Clone)]
pub struct MyMemoryTranslator {
    client: reqwest::Client,
    email: Option<String>,
}

impl Default for MyMemoryTranslator {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            email: None,
        }
    }
}

impl MyMemoryTranslator {
    pub fn new(email: Option<String>) -> Self {
        Self {
            email: email.filter(|value| !value.trim().is_empty()),
            ..Self::default()
        }
    }

    async fn request(&self, request: &TranslationRequest) -> Result<String> {
        let langpair = format!("{}|{}", request.source, request.target);
        let mut query = vec![("q", request.text.as_str()), ("langpair", langpair.as_str())];
        if let Some(email) = self.email.as_deref() {
            query.push(("de", email));
        }

        let response = self
            .client
            .get(ENDPOINT)
            .query(&query)
            .send()
            .await
            .with_context(|| "failed to reach MyMemory")?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(anyhow!("MyMemory API error ({}): {}", status, body.trim()));
        }
        parse_response(&body)
    }
}

impl TextTranslator for MyMemoryTranslator {
    fn translate<'a>(&'a self, request: &'a TranslationRequest) -> TranslateFuture<'a> {
        Box::pin(self.request(request))
    }
}

#[derive(Debug, Deserialize)]
struct MyMemoryResponse {
    #[serde(rename = "responseData")]
    data: Option<MyMemoryData>,
    /// Number on success, sometimes a string on errors.
    #[serde(rename = "responseStatus", default)]
    status: Value,
    #[serde(rename = "responseDetails", default)]
    details: Value,
}

#[derive(Debug, Deserialize)]
struct MyMemoryData {
    #[serde(rename = "translatedText")]
    translated_text: Option<String>,
}

fn parse_response(body: &str) -> Result<String> {
    let payload: MyMemoryResponse =
        serde_json::from_str(body).with_context(|| "failed to parse MyMemory response JSON")?;
    let status = match &payload.status {
        Value::Number(value) => value.as_u64(),
        Value::String(value) => value.trim().parse::<u64>().ok(),
        _ => None,
    };
    if status != Some(200) {
        let details = match &payload.details {
            Value::String(value) if !value.trim().is_empty() => value.clone(),
            _ => payload
                .data
                .as_ref()
                .and_then(|data| data.translated_text.clone())
                .unwrap_or_else(|| "unknown error".to_string()),
        };
        return Err(anyhow!(
            "MyMemory rejected the request (status {}): {}",
            payload.status,
            details
        ));
    }

    payload
        .data
        .and_then(|data| data.translated_text)
        .ok_or_else(|| anyhow!("MyMemory response has no translatedText"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_translated_text() {
        let body = r#"{
            "responseData": {"translatedText": "Hello world", "match": 0.98},
            "responseStatus": 200,
            "responseDetails": ""
        }"#;
        assert_eq!(parse_response(body).expect("text"), "Hello world");
    }

    #[test]
    fn string_status_errors_use_details() {
        let body = r#"{
            "responseData": {"translatedText": "'XX' IS AN INVALID TARGET LANGUAGE"},
            "responseStatus": "403",
            "responseDetails": "'XX' IS AN INVALID TARGET LANGUAGE"
        }"#;
        let err = parse_response(body).expect_err("rejected");
        assert!(err.to_string().contains("status \"403\""));
        assert!(err.to_string().contains("INVALID TARGET LANGUAGE"));
    }

    #[test]
    fn quota_errors_fall_back_to_translated_text() {
        let body = r#"{
            "responseData": {"translatedText": "MYMEMORY WARNING: YOU USED ALL AVAILABLE FREE TRANSLATIONS FOR TODAY"},
            "responseStatus": 429
        }"#;
        let err = parse_response(body).expect_err("quota");
        assert!(err.to_string().contains("FREE TRANSLATIONS"));
    }
}
