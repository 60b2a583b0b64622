use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const CLAUDE_MODEL: &str = "claude-3-5-haiku-20241022";

/// Article content sent for summarization is capped at this many bytes.
const MAX_CONTENT_BYTES: usize = 10_000;

/// Truncate to at most `max_bytes`, backing up to a char boundary so
/// multibyte characters at the cut point never split.
fn truncate_utf8(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[derive(Debug, Serialize)]
struct MessageRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    system: Option<String>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    #[allow(dead_code)]
    content_type: String,
    text: Option<String>,
}

/// Structured result of free-text feedback analysis.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedbackAnalysis {
    #[serde(default)]
    pub liked: Vec<String>,
    #[serde(default)]
    pub disliked: Vec<String>,
}

pub struct Summarizer {
    client: Client,
    api_key: String,
}

impl Summarizer {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");
        Self { client, api_key }
    }

    pub async fn generate_summary(
        &self,
        article_title: &str,
        article_content: &str,
    ) -> Result<String> {
        let system_prompt = r#"You are a helpful assistant that summarizes crypto news articles.
Provide a concise, informative summary in 2-3 paragraphs.
Focus on the key facts, affected networks, and market implications.
Use clear, accessible language."#;

        // Truncate content if too long
        let content = truncate_utf8(article_content, MAX_CONTENT_BYTES);

        let user_message = format!(
            "Please summarize the following article:\n\nTitle: {}\n\nContent:\n{}",
            article_title, content
        );

        let text = self.complete(system_prompt, user_message).await?;
        Ok(text)
    }

    /// Ask the model to classify cover feedback into liked/disliked prompt
    /// fragments. Callers fall back to the regex extractor on any error.
    pub async fn analyze_feedback(&self, feedback: &str) -> Result<FeedbackAnalysis> {
        let system_prompt = r#"You analyze user feedback about AI-generated crypto cover images.
Extract short visual descriptors the user liked and disliked.
Respond with JSON only, in the form {"liked": ["..."], "disliked": ["..."]}."#;

        let text = self
            .complete(system_prompt, format!("Feedback: {}", feedback))
            .await?;

        // Models occasionally wrap the JSON in prose; take the outermost braces.
        let json = text
            .find('{')
            .and_then(|start| text.rfind('}').map(|end| &text[start..=end]))
            .ok_or_else(|| AppError::ClaudeApi("no JSON in feedback analysis".to_string()))?;

        let analysis: FeedbackAnalysis = serde_json::from_str(json)
            .map_err(|e| AppError::ClaudeApi(format!("bad feedback analysis: {}", e)))?;
        Ok(analysis)
    }

    async fn complete(&self, system_prompt: &str, user_message: String) -> Result<String> {
        let request = MessageRequest {
            model: CLAUDE_MODEL.to_string(),
            max_tokens: 1024,
            messages: vec![Message {
                role: "user".to_string(),
                content: user_message,
            }],
            system: Some(system_prompt.to_string()),
        };

        let response = self
            .client
            .post(CLAUDE_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::ClaudeApi(format!("API error: {}", error_text)));
        }

        let message_response: MessageResponse = response.json().await?;

        let text = message_response
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");

        Ok(text)
    }

    pub fn model_version(&self) -> &'static str {
        CLAUDE_MODEL
    }
}
