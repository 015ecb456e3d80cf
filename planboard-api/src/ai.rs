/// AI chat-completion client and prompt helpers
///
/// Handlers depend on the [`AiClient`] trait; production uses
/// [`OpenAiClient`], which speaks the OpenAI-compatible
/// `POST {base_url}/chat/completions` API. Calls are single-shot: no retries
/// and no streaming.

use std::time::Duration;

use async_trait::async_trait;
use planboard_shared::models::{comment::CommentWithAuthor, issue::Issue};
use serde::{Deserialize, Serialize};

use crate::config::AiConfig;

/// Most subtask suggestions returned for one issue
pub const MAX_SUGGESTIONS: usize = 10;

/// Comments beyond this many (newest kept) are left out of the prompt
const MAX_PROMPT_COMMENTS: usize = 50;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum AiClientError {
    #[error("AI request failed: {0}")]
    Request(String),

    #[error("AI provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("AI provider returned an empty completion")]
    EmptyResponse,
}

impl From<reqwest::Error> for AiClientError {
    fn from(err: reqwest::Error) -> Self {
        AiClientError::Request(err.to_string())
    }
}

#[async_trait]
pub trait AiClient: Send + Sync {
    /// Returns the assistant's reply to one system + user prompt pair
    async fn complete(&self, system: &str, user: &str) -> Result<String, AiClientError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// `reqwest` client for OpenAI-compatible providers
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    /// Returns `None` when no API key is configured
    pub fn from_config(config: &AiConfig) -> Result<Option<Self>, AiClientError> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };

        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Some(Self {
            http,
            base_url: config.base_url.clone(),
            api_key,
            model: config.model.clone(),
        }))
    }
}

#[async_trait]
impl AiClient for OpenAiClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, AiClientError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.3,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(500)
                .collect();
            return Err(AiClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(AiClientError::EmptyResponse)?;

        tracing::debug!(model = %self.model, chars = content.len(), "AI completion received");
        Ok(content)
    }
}

pub const SUMMARY_SYSTEM_PROMPT: &str = "You summarize issues from a project tracker. \
Write three to five sentences in plain prose covering the goal, the current state, \
and any open questions raised in the discussion. Do not invent details.";

pub const SUBTASK_SYSTEM_PROMPT: &str = "You break issues from a project tracker into \
concrete subtasks. Reply with one short imperative subtask title per line and nothing else. \
Suggest at most ten.";

fn issue_header(identifier: &str, issue: &Issue) -> String {
    let mut prompt = format!(
        "Issue {}: {}\nStatus: {}\nPriority: {}\n",
        identifier,
        issue.title,
        issue.status.as_str(),
        issue.priority.as_str()
    );
    if let Some(due) = issue.due_date {
        prompt.push_str(&format!("Due: {}\n", due));
    }
    if let Some(description) = issue.description.as_deref().filter(|d| !d.trim().is_empty()) {
        prompt.push_str("\nDescription:\n");
        prompt.push_str(description.trim());
        prompt.push('\n');
    }
    prompt
}

/// User prompt for summarizing an issue and its discussion
pub fn summary_prompt(identifier: &str, issue: &Issue, comments: &[CommentWithAuthor]) -> String {
    let mut prompt = issue_header(identifier, issue);

    let skip = comments.len().saturating_sub(MAX_PROMPT_COMMENTS);
    if comments.len() > skip {
        prompt.push_str("\nComments (oldest first):\n");
        for comment in &comments[skip..] {
            prompt.push_str(&format!(
                "- {} ({}): {}\n",
                comment.author_name.as_deref().unwrap_or("Former member"),
                comment.created_at.format("%Y-%m-%d"),
                comment.body.trim()
            ));
        }
    }

    prompt
}

/// User prompt for suggesting subtasks
pub fn subtask_prompt(identifier: &str, issue: &Issue, existing: &[String]) -> String {
    let mut prompt = issue_header(identifier, issue);
    if !existing.is_empty() {
        prompt.push_str("\nExisting subtasks (do not repeat):\n");
        for title in existing {
            prompt.push_str(&format!("- {}\n", title));
        }
    }
    prompt
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let line = line
        .strip_prefix("- [ ]")
        .or_else(|| line.strip_prefix("- [x]"))
        .or_else(|| line.strip_prefix(['-', '*', '•']))
        .unwrap_or(line)
        .trim_start();

    // "1." / "2)" numbering
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(['.', ')']) {
            return rest.trim_start();
        }
    }
    line
}

/// Turns a completion into subtask titles: one per line, list markers
/// stripped, blanks and duplicates dropped, at most [`MAX_SUGGESTIONS`]
pub fn parse_subtask_suggestions(completion: &str) -> Vec<String> {
    let mut titles: Vec<String> = Vec::new();

    for line in completion.lines() {
        let title = strip_list_marker(line).trim_matches('*').trim();
        if title.is_empty() || title.ends_with(':') {
            continue;
        }

        let title: String = title.chars().take(200).collect();
        if titles.iter().any(|t| t.eq_ignore_ascii_case(&title)) {
            continue;
        }

        titles.push(title);
        if titles.len() == MAX_SUGGESTIONS {
            break;
        }
    }

    titles
}
