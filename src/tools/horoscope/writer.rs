/// Horoscope text generation.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::debug;

use super::HoroscopeError;
use super::zodiac::ZodiacSign;
use crate::core::config::OpenAiConfig;

/// Used when the API answers with empty content.
pub const FALLBACK_TEXT: &str = "Your stars shine bright today!";

const SYSTEM_PROMPT: &str = "You are a creative astrologer. Generate an inspiring, positive daily \
    horoscope in 2-4 sentences. Be specific and uplifting. Keep it concise for Instagram.";

/// Source of the horoscope text for a sign.
pub trait HoroscopeWriter: Send + Sync + 'static {
    fn write(&self, sign: ZodiacSign)
    -> impl Future<Output = Result<String, HoroscopeError>> + Send;
}

/// User prompt for one sign.
pub fn user_prompt(sign: ZodiacSign) -> String {
    format!("Generate a daily horoscope for {sign}. Make it inspiring and specific to today.")
}

/// OpenAI chat-completions client.
#[derive(Clone, Debug)]
pub struct OpenAiWriter {
    config: OpenAiConfig,
    client: Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl OpenAiWriter {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }
}

impl HoroscopeWriter for OpenAiWriter {
    async fn write(&self, sign: ZodiacSign) -> Result<String, HoroscopeError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(HoroscopeError::MissingApiKey)?;
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let prompt = user_prompt(sign);
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: 0.9,
            max_tokens: 150,
        };

        debug!(%sign, model = %self.config.model, "requesting horoscope text");
        let response: ChatResponse = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| HoroscopeError::UpstreamShape("no choices in completion".to_string()))?
            .message
            .content
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| FALLBACK_TEXT.to_string());
        Ok(text)
    }
}
