use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use bevy::log::{info, warn};
use serde::Serialize;
use serde_json::{json, Value};

use super::params::SceneParameters;
use super::router::{ChatBackend, NaturalLanguageRouter, RouteResult, RouterError};
use super::{current, SessionGuard};
use crate::commands::registry::DEFAULT_TREE_TYPE;
use crate::commands::CommandParams;
use crate::config::LlmOverrides;
use crate::environment::DEFAULT_TREE_COUNT;
use crate::ground::DEFAULT_GROUND_COLOR;
use crate::sky::DEFAULT_SKY_COLOR;

pub const PROCESS_TIMEOUT: Duration = Duration::from_secs(20);

/// Runs scene commands on behalf of the processor.
pub trait SceneControl: Send + Sync {
    fn dispatch(&self, command: &str, params: CommandParams) -> impl Future<Output = Result<(), String>> + Send;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProcessError {
    #[error("input text is empty")]
    EmptyInput,
    #[error("already processing a request")]
    Busy,
    #[error("request timed out after {0} seconds")]
    Timeout(u64),
    #[error(transparent)]
    Router(#[from] RouterError),
    #[error("failed to apply: {0}")]
    Apply(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProcessorState {
    #[default]
    Idle,
    Processing,
    Applying,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedCommand {
    pub command: String,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub params: CommandParams,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessOutcome {
    pub kind: &'static str,
    pub applied: Vec<AppliedCommand>,
    /// True when the answer had no usable field and the default scene ran.
    pub defaulted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

fn command(name: String, params: Value) -> AppliedCommand {
    AppliedCommand {
        command: name,
        params: params.as_object().cloned().unwrap_or_default(),
    }
}

/// Commands for a parameter answer, in a fixed order.
pub fn parameter_commands(params: &SceneParameters) -> Vec<AppliedCommand> {
    let mut out = Vec::new();
    if let Some(color) = &params.sky_color {
        out.push(command(format!("set_sky_color:{color}"), json!({})));
    }
    if let Some(color) = &params.ground_color {
        out.push(command(format!("set_ground_color:{color}"), json!({})));
    }
    if let Some(color) = &params.ambient_light {
        out.push(command(format!("set_ambient_light:{color}"), json!({})));
    }
    if params.tree_type.is_some() || params.tree_count.is_some() {
        let tree_type = params.tree_type.as_deref().unwrap_or(DEFAULT_TREE_TYPE);
        let count = params.tree_count.unwrap_or(DEFAULT_TREE_COUNT);
        out.push(command(format!("spawn_trees:{tree_type}"), json!({ "count": count })));
    }
    if let Some(building) = &params.building_type {
        out.push(command(format!("spawn_building:{building}"), json!({})));
    }
    if let Some(weather) = &params.weather_effect {
        out.push(command(format!("set_weather:{weather}"), json!({})));
    }
    if let Some(particles) = &params.particle_effect {
        out.push(command(format!("set_particles:{particles}"), json!({})));
    }
    if let Some(color) = &params.player_color {
        out.push(command(format!("set_player_color:{color}"), json!({})));
    }
    if let Some(transform) = &params.tree_transform {
        out.push(command(
            "transform_trees_to_buildings".to_string(),
            json!({ "transform": transform }),
        ));
    }
    out
}

/// Light-blue sky, green ground and five oaks.
pub fn default_scene_commands() -> Vec<AppliedCommand> {
    vec![
        command(format!("set_sky_color:{DEFAULT_SKY_COLOR}"), json!({})),
        command(format!("set_ground_color:{DEFAULT_GROUND_COLOR}"), json!({})),
        command(
            format!("spawn_trees:{DEFAULT_TREE_TYPE}"),
            json!({ "count": DEFAULT_TREE_COUNT }),
        ),
    ]
}

pub struct NaturalLanguageProcessor<B, S> {
    router: NaturalLanguageRouter<B>,
    scene: S,
    timeout: Duration,
    state: Mutex<ProcessorState>,
}

impl<B: ChatBackend, S: SceneControl> NaturalLanguageProcessor<B, S> {
    pub fn new(router: NaturalLanguageRouter<B>, scene: S) -> Self {
        Self {
            router,
            scene,
            timeout: PROCESS_TIMEOUT,
            state: Mutex::new(ProcessorState::Idle),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn router(&self) -> &NaturalLanguageRouter<B> {
        &self.router
    }

    pub fn state(&self) -> ProcessorState {
        current(&self.state)
    }

    pub fn is_processing(&self) -> bool {
        self.state() != ProcessorState::Idle
    }

    /// Routes `text` and applies the result. The whole round trip is
    /// bounded by the processor timeout; on expiry the pending request is
    /// dropped and the session returns to idle.
    pub async fn process_input(&self, text: &str, overrides: &LlmOverrides) -> Result<ProcessOutcome, ProcessError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ProcessError::EmptyInput);
        }
        let session = SessionGuard::begin(&self.state, ProcessorState::Processing).ok_or(ProcessError::Busy)?;
        info!("[Sylvan nl] Processing: {text}");

        let result = tokio::time::timeout(self.timeout, self.run(text, overrides, &session)).await;
        match result {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("[Sylvan nl] Processing timed out after {}s", self.timeout.as_secs());
                Err(ProcessError::Timeout(self.timeout.as_secs()))
            }
        }
    }

    async fn run(
        &self,
        text: &str,
        overrides: &LlmOverrides,
        session: &SessionGuard<'_, ProcessorState>,
    ) -> Result<ProcessOutcome, ProcessError> {
        let routed = self.router.route_command(text, overrides).await?;
        session.advance(ProcessorState::Applying);

        match routed {
            RouteResult::SimpleParameter(params) => {
                let mut commands = parameter_commands(&params);
                let defaulted = commands.is_empty();
                if defaulted {
                    info!("[Sylvan nl] No recognized parameters; applying the default scene");
                    commands = default_scene_commands();
                }
                self.apply(&commands).await?;
                Ok(ProcessOutcome {
                    kind: "simple_parameter",
                    applied: commands,
                    defaulted,
                    comments: None,
                })
            }
            RouteResult::CodeGenerator { subtype, code, comments } => {
                info!("[Sylvan nl] Applying generated {} code", subtype.name());
                let commands = vec![command(
                    "transform_trees_to_skyscrapers".to_string(),
                    json!({ "code": code }),
                )];
                self.apply(&commands).await?;
                Ok(ProcessOutcome {
                    kind: "code_generator",
                    applied: commands,
                    defaulted: false,
                    comments,
                })
            }
        }
    }

    /// Dispatches every command; failures are collected, not short-circuited.
    async fn apply(&self, commands: &[AppliedCommand]) -> Result<(), ProcessError> {
        let mut failures = Vec::new();
        for cmd in commands {
            if let Err(err) = self.scene.dispatch(&cmd.command, cmd.params.clone()).await {
                warn!("[Sylvan nl] '{}' failed: {err}", cmd.command);
                failures.push(format!("{}: {err}", cmd.command));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ProcessError::Apply(failures.join("; ")))
        }
    }
}
