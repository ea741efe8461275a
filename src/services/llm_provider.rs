use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use tracing::warn;

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_API_ENDPOINT: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_MS: u64 = 60_000;
const MAX_RETRIES: usize = 3;
const BASE_BACKOFF_MS: u64 = 200;
const QUESTION_CONTEXT_CHARS: usize = 3000;
const SUMMARY_CONTEXT_CHARS: usize = 4000;

/// System prompt shared by all generation calls. Grounding rules keep the
/// model from inventing drugs or guidelines that are not in the source
/// chunks.
const MEDICAL_CONTENT_SYSTEM_PROMPT: &str = "\
You are generating summaries and MCQs for medical board-style exams.

CRITICAL RULES:
1. Only use the provided chunks/content
2. Do not invent new drug names or guidelines
3. Do not add information not present in the source material
4. If information is missing in the provided chunks, answer: \"INSUFFICIENT_SOURCE\"
5. Be precise and clinically accurate
6. Use evidence-based medical knowledge only from the provided context

Your responses must be traceable to the source material provided.";

#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_endpoint: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub model: Option<String>,
    pub choices: Vec<ChatChoice>,
    pub usage: Option<ChatUsage>,
}

impl ChatResponse {
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatUsage {
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
    pub total_tokens: Option<i64>,
}

#[derive(Debug, Error)]
pub enum LLMError {
    #[error("LLM not configured: {0}")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("empty response")]
    EmptyChoices,
}

/// MCQ shape the generation prompt asks for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub stem: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub correct_option: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedSummary {
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub high_yield_traps: Vec<HighYieldTrap>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighYieldTrap {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub clinical_pearl: String,
}

#[derive(Clone)]
pub struct LLMProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

impl LLMProvider {
    pub fn from_env() -> Self {
        let api_key = env_string("LLM_API_KEY").or_else(|| env_string("OPENAI_API_KEY"));
        let model = env_string("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let api_endpoint = normalize_endpoint(
            env_string("LLM_API_ENDPOINT")
                .or_else(|| env_string("OPENAI_BASE_URL"))
                .unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string()),
        );
        let timeout = Duration::from_millis(env_u64("LLM_TIMEOUT").unwrap_or(DEFAULT_TIMEOUT_MS));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config: LLMConfig {
                api_key,
                model,
                api_endpoint,
                timeout,
            },
            client,
        }
    }

    pub fn is_available(&self) -> bool {
        self.config
            .api_key
            .as_deref()
            .is_some_and(|v| !v.trim().is_empty())
            && !self.config.model.trim().is_empty()
            && !self.config.api_endpoint.trim().is_empty()
    }

    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatResponse, LLMError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(LLMError::NotConfigured("LLM_API_KEY"))?;

        let url = format!(
            "{}/chat/completions",
            self.config.api_endpoint.trim_end_matches('/')
        );
        let payload = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "stream": false
        });

        self.post_with_retry(&url, api_key, &payload).await
    }

    async fn complete_grounded(&self, user_prompt: String) -> Result<String, LLMError> {
        let messages = [
            ChatMessage {
                role: "system".into(),
                content: MEDICAL_CONTENT_SYSTEM_PROMPT.into(),
            },
            ChatMessage {
                role: "user".into(),
                content: user_prompt,
            },
        ];
        let response = self.chat(&messages).await?;
        response
            .first_content()
            .map(|s| s.to_string())
            .ok_or(LLMError::EmptyChoices)
    }

    /// Ask for `count` MCQs grounded in the topic's chunk text. The reply
    /// must be a bare JSON array; anything else is a decode error.
    pub async fn generate_questions(
        &self,
        topic_name: &str,
        chunks_text: &str,
        count: usize,
        difficulty: &str,
    ) -> Result<Vec<GeneratedQuestion>, LLMError> {
        let context = truncate_chars(chunks_text, QUESTION_CONTEXT_CHARS);
        let prompt = format!(
            "Topic: {topic_name}\n\n\
             Source Material:\n{context}\n\n\
             Generate {count} high-quality multiple choice questions based ONLY on the content provided above.\n\n\
             Requirements:\n\
             - Clinical vignette-style stems appropriate for medical board exams\n\
             - 4 options (A, B, C, D) per question\n\
             - Exactly one correct answer per question\n\
             - Brief explanation citing the source material\n\
             - {difficulty} difficulty level\n\n\
             IMPORTANT: Do not add information beyond what is in the source material.\n\n\
             Format response as a JSON array with structure:\n\
             [{{\"stem\": \"...\", \"option_a\": \"...\", \"option_b\": \"...\", \"option_c\": \"...\", \"option_d\": \"...\", \"correct_option\": \"A\", \"explanation\": \"...\"}}]\n\n\
             Respond ONLY with the JSON array."
        );

        let content = self.complete_grounded(prompt).await?;
        let mut questions: Vec<GeneratedQuestion> =
            serde_json::from_str(strip_code_fences(&content))?;
        questions.truncate(count);
        Ok(questions)
    }

    /// Summary plus key points and optional high-yield traps for one topic.
    pub async fn generate_summary(
        &self,
        topic_name: &str,
        chunks_text: &str,
        include_high_yield: bool,
    ) -> Result<GeneratedSummary, LLMError> {
        let context = truncate_chars(chunks_text, SUMMARY_CONTEXT_CHARS);
        let traps_line = if include_high_yield {
            "3. 3-5 high-yield clinical traps or pearls\n"
        } else {
            ""
        };
        let prompt = format!(
            "Topic: {topic_name}\n\n\
             Source Material:\n{context}\n\n\
             Create a comprehensive summary based ONLY on the provided source material.\n\n\
             Provide:\n\
             1. Concise summary (2-3 paragraphs)\n\
             2. 5-7 key clinical points\n\
             {traps_line}\n\
             IMPORTANT: Only use information from the source material above.\n\n\
             Format response as JSON:\n\
             {{\"summary\": \"...\", \"key_points\": [\"...\"], \"high_yield_traps\": [{{\"title\": \"...\", \"description\": \"...\", \"clinical_pearl\": \"...\"}}]}}\n\n\
             Respond ONLY with the JSON."
        );

        let content = self.complete_grounded(prompt).await?;
        Ok(serde_json::from_str(strip_code_fences(&content))?)
    }

    async fn post_with_retry(
        &self,
        url: &str,
        api_key: &str,
        payload: &serde_json::Value,
    ) -> Result<ChatResponse, LLMError> {
        let mut last_error: Option<LLMError> = None;

        for retry in 0..=MAX_RETRIES {
            match self
                .client
                .post(url)
                .bearer_auth(api_key)
                .json(payload)
                .send()
                .await
            {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let bytes = resp.bytes().await?;
                        match serde_json::from_slice(&bytes) {
                            Ok(v) => return Ok(v),
                            Err(e) => {
                                let body_str = String::from_utf8_lossy(&bytes);
                                tracing::error!(
                                    error = %e,
                                    body = %body_str,
                                    "failed to parse LLM response JSON"
                                );
                                return Err(LLMError::Json(e));
                            }
                        }
                    }
                    let body = resp.text().await.unwrap_or_default();
                    let err = LLMError::HttpStatus { status, body };
                    if retry < MAX_RETRIES && is_retryable(status) {
                        let backoff = Duration::from_millis(BASE_BACKOFF_MS * (1 << retry));
                        warn!(retry, ?status, "LLM request failed, retrying");
                        sleep(backoff).await;
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    let err = LLMError::Request(e);
                    if retry < MAX_RETRIES {
                        let backoff = Duration::from_millis(BASE_BACKOFF_MS * (1 << retry));
                        warn!(retry, "LLM request error, retrying");
                        sleep(backoff).await;
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
            }
        }
        Err(last_error.unwrap_or(LLMError::NotConfigured("unknown")))
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env_string(key)?.parse().ok()
}

fn normalize_endpoint(endpoint: String) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.ends_with("/v1") || trimmed.contains("/v1/") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/v1")
    }
}

fn is_retryable(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Models occasionally wrap JSON in markdown fences despite instructions.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_normalization() {
        assert_eq!(
            normalize_endpoint("https://api.openai.com".to_string()),
            "https://api.openai.com/v1"
        );
        assert_eq!(
            normalize_endpoint("https://api.openai.com/v1/".to_string()),
            "https://api.openai.com/v1"
        );
    }

    #[test]
    fn code_fences_are_stripped() {
        assert_eq!(strip_code_fences("```json\n[1,2]\n```"), "[1,2]");
        assert_eq!(strip_code_fences("[1,2]"), "[1,2]");
    }

    #[test]
    fn generated_question_parses_from_model_payload() {
        let payload = r#"[{"stem":"A 24-year-old presents with polyuria...","option_a":"DKA","option_b":"HHS","option_c":"Lactic acidosis","option_d":"Starvation ketosis","correct_option":"A","explanation":"Ketones plus acidosis."}]"#;
        let questions: Vec<GeneratedQuestion> = serde_json::from_str(payload).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].correct_option, "A");
    }
}
