use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tera::{Context as TeraContext, Tera};

use super::{TextTranslator, TranslateFuture, TranslationRequest};
use crate::languages::LanguageRegistry;
use crate::providers::{Provider, ToolSpec};

pub const TOOL_NAME: &str = "deliver_translation";

const SYSTEM_PROMPT: &str = include_str!("prompts/system_prompt.tera");

/// Translates through an LLM provider with a forced `deliver_translation` call.
#[derive(Clone)]
pub struct ProviderTranslator<P: Provider> {
    provider: P,
    registry: Arc<LanguageRegistry>,
}

impl<P: Provider + 'static> ProviderTranslator<P> {
    pub fn new(provider: P, registry: Arc<LanguageRegistry>) -> Self {
        Self { provider, registry }
    }

    async fn request(&self, request: &TranslationRequest) -> Result<String> {
        let system_prompt = render_system_prompt(&self.registry, request, TOOL_NAME)?;
        let response = self
            .provider
            .clone()
            .register_tool(tool_spec(TOOL_NAME))
            .append_system_input(system_prompt)
            .append_user_input(request.text.clone())
            .call_tool(TOOL_NAME)
            .await?;
        if let Some(model) = response.model.as_deref() {
            tracing::debug!("translate: answered by {}", model);
        }
        parse_tool_args(response.args, &request.target)
    }
}

impl<P: Provider + 'static> TextTranslator for ProviderTranslator<P> {
    fn translate<'a>(&'a self, request: &'a TranslationRequest) -> TranslateFuture<'a> {
        Box::pin(self.request(request))
    }
}

pub fn tool_spec(tool_name: &str) -> ToolSpec {
    ToolSpec {
        name: tool_name.to_string(),
        description: "Return the translated text.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "translation": {"type": "string"},
                "target_language": {"type": "string"}
            },
            "required": ["translation", "target_language"]
        }),
    }
}

fn language_name(registry: &LanguageRegistry, code: &str) -> String {
    registry
        .lookup(code)
        .map(|profile| profile.name.clone())
        .or_else(|| registry.translation_target_name(code).map(str::to_string))
        .unwrap_or_else(|| code.to_string())
}

pub fn render_system_prompt(
    registry: &LanguageRegistry,
    request: &TranslationRequest,
    tool_name: &str,
) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("source_lang", request.source.as_str());
    context.insert("source_name", &language_name(registry, &request.source));
    context.insert("target_lang", request.target.as_str());
    context.insert("target_name", &language_name(registry, &request.target));
    context.insert("tool_name", tool_name);
    Tera::one_off(SYSTEM_PROMPT, &context, false)
        .with_context(|| "failed to render system prompt")
}

#[derive(Debug, Deserialize)]
struct ToolArgs {
    translation: String,
    target_language: String,
}

fn parse_tool_args(value: Value, expected_target: &str) -> Result<String> {
    let args: ToolArgs =
        serde_json::from_value(value).with_context(|| "invalid deliver_translation arguments")?;
    if !args
        .target_language
        .trim()
        .eq_ignore_ascii_case(expected_target.trim())
    {
        return Err(anyhow!(
            "tool response target_language mismatch (expected '{}', got '{}')",
            expected_target,
            args.target_language
        ));
    }
    Ok(args.translation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ProviderFuture, ProviderResponse};
    use std::sync::Mutex;

    #[derive(Clone)]
    struct ScriptedProvider {
        reply: Value,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Provider for ScriptedProvider {
        fn append_system_input(self, input: String) -> Self {
            self.seen.lock().expect("lock").push(input);
            self
        }

        fn append_user_input(self, input: String) -> Self {
            self.seen.lock().expect("lock").push(input);
            self
        }

        fn register_tool(self, _tool: ToolSpec) -> Self {
            self
        }

        fn call_tool(self, _tool_name: &str) -> ProviderFuture {
            let args = self.reply.clone();
            Box::pin(async move {
                Ok(ProviderResponse {
                    args,
                    model: Some("scripted".to_string()),
                })
            })
        }
    }

    fn request() -> TranslationRequest {
        TranslationRequest {
            text: "Bonjour le monde".to_string(),
            source: "fr".to_string(),
            target: "en".to_string(),
        }
    }

    #[test]
    fn prompt_names_both_languages() {
        let registry = LanguageRegistry::load().expect("registry");
        let prompt = render_system_prompt(&registry, &request(), TOOL_NAME).expect("prompt");
        insta::assert_snapshot!(prompt, @r###"
        You are a translation engine for text extracted from images with OCR.
        Translate the user's text from French (fr) into English (en).
        The text may contain OCR artifacts such as broken line wraps or stray symbols. Join wrapped lines and ignore stray symbols, but do not add or drop content.
        Keep proper nouns, numbers and URLs as they are.
        Always answer by calling the `deliver_translation` tool. Put only the translated text in `translation` and set `target_language` to "en".
        "###);
    }

    #[tokio::test]
    async fn returns_tool_translation() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let provider = ScriptedProvider {
            reply: json!({"translation": "Hello world", "target_language": "EN"}),
            seen: seen.clone(),
        };
        let translator =
            ProviderTranslator::new(provider, Arc::new(LanguageRegistry::load().expect("registry")));
        let text = translator.translate(&request()).await.expect("translation");
        assert_eq!(text, "Hello world");
        let seen = seen.lock().expect("lock");
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], "Bonjour le monde");
    }

    #[test]
    fn target_mismatch_is_an_error() {
        let err = parse_tool_args(
            json!({"translation": "Hallo Welt", "target_language": "de"}),
            "en",
        )
        .expect_err("mismatch");
        assert!(err.to_string().contains("mismatch"));
        assert!(parse_tool_args(json!({"translation": "x"}), "en").is_err());
    }
}
