use async_trait::async_trait;

use crate::config::LlmConfig;
use crate::search::hybrid::QueryNormalizer;

/// Translates non-English queries to English through the chat model.
///
/// ASCII input is passed through untouched. Any failure returns the input.
pub struct LlmTranslator {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmTranslator {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl QueryNormalizer for LlmTranslator {
    async fn normalize(&self, text: &str) -> String {
        if !needs_translation(text) {
            return text.to_string();
        }

        let prompt = build_prompt(text);
        match crate::llm::chat::complete(&self.client, &self.config, &prompt).await {
            Ok(reply) => match clean_translation(&reply) {
                Some(translated) => translated,
                None => {
                    tracing::warn!("Empty translation for '{text}', using original");
                    text.to_string()
                }
            },
            Err(e) => {
                tracing::warn!("Translation failed, using original query: {e:#}");
                text.to_string()
            }
        }
    }
}

fn needs_translation(text: &str) -> bool {
    !text.trim().is_empty() && !text.is_ascii()
}

fn build_prompt(text: &str) -> String {
    format!(
        "Translate the following legal search query into English. Keep section numbers \
         and act names (IPC, BNS, IT Act) unchanged.\n\n\
         Query: \"{text}\"\n\n\
         Respond with ONLY the English translation. No explanation."
    )
}

/// Strip fences, quotes and labels the model may wrap around the answer.
fn clean_translation(reply: &str) -> Option<String> {
    let mut s = reply.trim();
    if let Some(inner) = s.strip_prefix("```") {
        s = inner.trim_start_matches(|c: char| c.is_ascii_alphabetic());
        s = s.strip_suffix("```").unwrap_or(s);
    }
    let s = s.lines().map(str::trim).find(|l| !l.is_empty())?;
    let s = s
        .strip_prefix("Translation:")
        .or_else(|| s.strip_prefix("English:"))
        .unwrap_or(s)
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '“' || c == '”')
        .trim();

    (!s.is_empty()).then(|| s.to_string())
}
