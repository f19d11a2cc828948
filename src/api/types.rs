use serde::{Deserialize, Serialize};

use crate::commands::{CommandParams, QueuedCommand};
use crate::environment::EnvironmentSnapshot;
use crate::nl::ProcessOutcome;
use crate::weather::{ParticleEffect, WeatherEffect};

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn ok() -> ApiResponse<String> {
        ApiResponse {
            ok: true,
            data: Some("ok".to_string()),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> ApiResponse<String> {
        ApiResponse {
            ok: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[derive(Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub params: CommandParams,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CommandResult {
    pub command: String,
    pub executed: bool,
}

#[derive(Deserialize)]
pub struct QueueRequest {
    #[serde(default)]
    pub commands: Vec<QueuedCommand>,
    /// Start draining once the commands are queued.
    #[serde(default)]
    pub drain: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct QueueStatus {
    pub length: usize,
    pub draining: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drain_started: Option<bool>,
}

#[derive(Deserialize)]
pub struct NlRequest {
    pub text: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

#[derive(Serialize)]
pub struct SpeechResponse {
    pub transcript: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    pub outcome: ProcessOutcome,
}

/// Settings update. A blank credential clears the stored one.
#[derive(Deserialize, Default)]
pub struct SettingsRequest {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub speech_api_key: Option<String>,
}

/// Effective settings as the router would resolve them. Credentials are
/// reported only as present or absent.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SettingsView {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub endpoint: String,
    pub has_api_key: bool,
    pub has_speech_api_key: bool,
}

#[derive(Deserialize, Default)]
pub struct EventsQuery {
    #[serde(default)]
    pub since: u64,
}

#[derive(Serialize, Debug, Clone)]
pub struct SceneSnapshot {
    pub sky_color: Option<String>,
    pub ambient_color: Option<String>,
    pub ground_color: Option<String>,
    pub player_color: Option<String>,
    pub weather: WeatherEffect,
    pub particles: ParticleEffect,
    pub environment: EnvironmentSnapshot,
    pub queue_length: usize,
    pub queue_draining: bool,
    pub commands: Vec<String>,
}
