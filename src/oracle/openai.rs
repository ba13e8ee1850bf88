//! Chat-completion backed oracles (OpenAI-compatible HTTP API).

use super::{CodeReviewOracle, RenameOracle, SchemeOracle, UsefulnessOracle};
use crate::config::OracleSettings;
use crate::error::{OracleError, OracleResult};
use crate::scheme::ClassificationScheme;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const SCHEME_PROMPT: &str = "You are an assistant that helps users organize their files. \
Based on the user's description, create a categorization scheme that maps file types to \
category names and subcategories. Use precise category names, for example, code files should \
be named 'Code' or 'Programming' instead of 'Text'. Respond with a single JSON object and \
nothing else. Keys are lower-case file extensions with a leading dot (\".pdf\"), full MIME \
types (\"text/plain\") or general MIME types (\"image\"). Values are arrays of strings: the \
main category followed by any subcategories.";

const RENAME_PROMPT: &str = "You are a helpful assistant that suggests concise and descriptive \
filenames based on file content. Suggest only the filename without any explanation or file \
extension. Max 20 characters.";

const USEFULNESS_PROMPT: &str = "You are an assistant that analyzes file content to determine \
if it's useless. Useless files: content in a non English language, anything associated with \
junk, installers. Respond with 'YES' if the content is useless or 'NO' if it might be valuable.";

const REVIEW_PROMPT: &str = "You are a code reviewer. Review the following code and provide a \
brief summary of its functionality.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
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
    #[serde(default)]
    content: Option<String>,
}

/// Blocking client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiClient {
    http: Client,
    endpoint: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl OpenAiClient {
    pub fn new(settings: &OracleSettings, api_key: String) -> OracleResult<Self> {
        let timeout = settings.timeout();
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Http(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!(
                "{}/chat/completions",
                settings.base_url.trim_end_matches('/')
            ),
            model: settings.model.clone(),
            api_key,
            timeout,
        })
    }

    /// Sends one system + user exchange and returns the trimmed reply text.
    fn chat(&self, system: &str, user: &str) -> OracleResult<String> {
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
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            return Err(OracleError::Http(format!("{status}: {preview}")));
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| OracleError::Malformed(e.to_string()))?;
        let reply = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| OracleError::Malformed("reply has no content".to_string()))?;

        debug!(model = %self.model, chars = reply.len(), "chat reply received");
        Ok(reply)
    }

    fn transport_error(&self, error: reqwest::Error) -> OracleError {
        if error.is_timeout() {
            OracleError::Timeout(self.timeout)
        } else {
            OracleError::Http(error.to_string())
        }
    }
}

impl SchemeOracle for OpenAiClient {
    fn generate_scheme(&self, description: &str) -> OracleResult<ClassificationScheme> {
        let reply = self.chat(
            SCHEME_PROMPT,
            &format!("Create a file categorization scheme based on this description: {description}"),
        )?;
        ClassificationScheme::from_oracle_reply(&reply)
    }
}

impl RenameOracle for OpenAiClient {
    fn suggest_name(&self, sample: &str) -> OracleResult<String> {
        let reply = self.chat(
            RENAME_PROMPT,
            &format!(
                "Suggest a concise and descriptive filename for a file with the following content:\n\n{sample}"
            ),
        )?;
        Ok(first_line_unquoted(&reply))
    }
}

impl UsefulnessOracle for OpenAiClient {
    fn is_useless(&self, sample: &str) -> OracleResult<bool> {
        let reply = self.chat(
            USEFULNESS_PROMPT,
            &format!("Is the following file content useless?\n\n{sample}"),
        )?;
        parse_yes_no(&reply)
    }
}

impl CodeReviewOracle for OpenAiClient {
    fn review_code(&self, code: &str) -> OracleResult<String> {
        self.chat(REVIEW_PROMPT, &format!("Review this code:\n\n{code}"))
    }
}

fn first_line_unquoted(reply: &str) -> String {
    reply
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .trim_matches(|c| matches!(c, '"' | '\'' | '`'))
        .to_string()
}

fn parse_yes_no(reply: &str) -> OracleResult<bool> {
    let answer = reply
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_uppercase();
    match answer.as_str() {
        "YES" => Ok(true),
        "NO" => Ok(false),
        _ => Err(OracleError::Malformed(format!(
            "expected YES or NO, got '{}'",
            reply.chars().take(40).collect::<String>()
        ))),
    }
}
