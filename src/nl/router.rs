use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use bevy::log::{debug, info, warn};
use serde_json::Value;

use super::params::SceneParameters;
use super::prompts::system_prompt;
use super::{current, SessionGuard};
use crate::config::{ConfigSource, LlmOverrides};
use crate::params::str_param;

pub const LLM_TIMEOUT: Duration = Duration::from_secs(15);

const TREE_TERMS: &[&str] = &["tree", "forest", "woods", "oak", "pine"];
const BUILDING_TERMS: &[&str] = &["skyscraper", "building", "tower", "highrise", "high-rise"];
const TRANSFORM_VERBS: &[&str] = &["replace", "transform", "change", "turn"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeSubtype {
    Skyscraper,
}

impl CodeSubtype {
    pub fn name(self) -> &'static str {
        match self {
            CodeSubtype::Skyscraper => "skyscraper",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    SimpleParameter,
    CodeGenerator(CodeSubtype),
}

impl RequestKind {
    pub fn name(self) -> &'static str {
        match self {
            RequestKind::SimpleParameter => "simple_parameter",
            RequestKind::CodeGenerator(_) => "code_generator",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteResult {
    SimpleParameter(SceneParameters),
    CodeGenerator {
        subtype: CodeSubtype,
        code: String,
        comments: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RouterError {
    #[error("no API key configured; set OPENAI_API_KEY or save one through /settings")]
    MissingCredential,
    #[error("a request is already being processed")]
    Busy,
    #[error("LLM request failed with status {status}: {message}")]
    Transport { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("LLM request timed out after {0} seconds")]
    Timeout(u64),
    #[error("could not parse LLM response: {0}")]
    Parse(String),
    #[error("LLM response is missing the {0} field")]
    Schema(&'static str),
}

/// Where a routed request currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RouterState {
    #[default]
    Idle,
    Classifying,
    AwaitingResponse,
    ParsingResponse,
}

/// One chat-completion call: a system prompt plus the user's text.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub system: String,
    pub user: String,
}

/// Returns the assistant message content of a JSON-mode completion.
pub trait ChatBackend: Send + Sync {
    fn complete(&self, request: ChatRequest) -> impl Future<Output = Result<String, RouterError>> + Send;
}

/// Whole-word match that also accepts simple inflections: plurals,
/// past tense and `-ing` forms ("trees", "turned", "changing").
fn word_matches(word: &str, term: &str) -> bool {
    if let Some(rest) = word.strip_prefix(term) {
        return matches!(rest, "" | "s" | "es" | "d" | "ed" | "ing");
    }
    term.strip_suffix('e')
        .and_then(|stem| word.strip_prefix(stem))
        .is_some_and(|rest| rest == "ing")
}

fn mentions(words: &[&str], terms: &[&str]) -> bool {
    words
        .iter()
        .any(|word| terms.iter().any(|term| word_matches(word, term)))
}

/// Lexical classification: the code path needs a tree term, a building
/// term and a transform verb together.
pub fn determine_request_type(text: &str) -> RequestKind {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .filter(|w| !w.is_empty())
        .collect();
    if mentions(&words, TREE_TERMS) && mentions(&words, BUILDING_TERMS) && mentions(&words, TRANSFORM_VERBS) {
        RequestKind::CodeGenerator(CodeSubtype::Skyscraper)
    } else {
        RequestKind::SimpleParameter
    }
}

/// Parses the response as a JSON object, retrying once on the outermost
/// `{...}` span when the model wrapped its answer in prose.
pub fn parse_llm_json(content: &str) -> Result<serde_json::Map<String, Value>, RouterError> {
    let first_err = match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(map)) => return Ok(map),
        Ok(other) => format!("expected a JSON object, got {other}"),
        Err(err) => err.to_string(),
    };
    let span = content
        .find('{')
        .zip(content.rfind('}'))
        .filter(|(start, end)| start < end)
        .map(|(start, end)| &content[start..=end]);
    match span.map(serde_json::from_str::<Value>) {
        Some(Ok(Value::Object(map))) => {
            debug!("[Sylvan nl] Recovered JSON object from wrapped response");
            Ok(map)
        }
        _ => Err(RouterError::Parse(first_err)),
    }
}

pub struct NaturalLanguageRouter<B> {
    backend: B,
    config: ConfigSource,
    timeout: Duration,
    state: Mutex<RouterState>,
}

impl<B: ChatBackend> NaturalLanguageRouter<B> {
    pub fn new(backend: B, config: ConfigSource) -> Self {
        Self {
            backend,
            config,
            timeout: LLM_TIMEOUT,
            state: Mutex::new(RouterState::Idle),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config(&self) -> &ConfigSource {
        &self.config
    }

    pub fn state(&self) -> RouterState {
        current(&self.state)
    }

    pub async fn route_command(&self, text: &str, overrides: &LlmOverrides) -> Result<RouteResult, RouterError> {
        let settings = self.config.llm(overrides);
        let Some(api_key) = settings.api_key.clone() else {
            warn!("[Sylvan nl] No API key configured");
            return Err(RouterError::MissingCredential);
        };
        let session = SessionGuard::begin(&self.state, RouterState::Classifying).ok_or(RouterError::Busy)?;

        let kind = determine_request_type(text);
        info!("[Sylvan nl] Routing request as {}", kind.name());

        session.advance(RouterState::AwaitingResponse);
        let request = ChatRequest {
            endpoint: settings.endpoint,
            api_key,
            model: settings.model,
            temperature: settings.temperature,
            top_p: settings.top_p,
            system: system_prompt(kind).to_string(),
            user: text.to_string(),
        };
        let content = tokio::time::timeout(self.timeout, self.backend.complete(request))
            .await
            .map_err(|_| RouterError::Timeout(self.timeout.as_secs()))??;

        session.advance(RouterState::ParsingResponse);
        let map = parse_llm_json(&content)?;
        match kind {
            RequestKind::SimpleParameter => Ok(RouteResult::SimpleParameter(SceneParameters::from_json(&map))),
            RequestKind::CodeGenerator(subtype) => {
                let code = str_param(&map, &["codeSnippet", "code_snippet", "code"])
                    .ok_or(RouterError::Schema("codeSnippet"))?;
                Ok(RouteResult::CodeGenerator {
                    subtype,
                    code,
                    comments: str_param(&map, &["comments"]),
                })
            }
        }
    }
}
