//! String-named scene commands: `name` or `name:parameter`, dispatched to
//! registered handlers that mutate the world.

pub mod queue;
pub mod registry;

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use bevy::prelude::*;
use serde_json::Value;

pub use queue::{drain_all, drain_one, CommandQueue, QueuedCommand, DEFAULT_COMMAND_DELAY_MS};
pub use registry::register_scene_commands;

pub type CommandParams = serde_json::Map<String, Value>;

pub type CommandHandler = Arc<dyn Fn(&mut World, &CommandParams) -> Result<(), String> + Send + Sync>;

pub struct CommandsPlugin;

impl Plugin for CommandsPlugin {
    fn build(&self, app: &mut App) {
        let mut dispatcher = CommandDispatcher::default();
        register_scene_commands(&mut dispatcher);
        app.insert_resource(dispatcher)
            .insert_resource(CommandQueue::default())
            .add_systems(Update, queue::tick_command_queue);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub parameter: Option<String>,
}

/// Splits on the first `:`. Both halves are trimmed; an empty parameter
/// counts as none. There is no escape for a literal colon.
pub fn parse_command_input(input: &str) -> ParsedCommand {
    match input.split_once(':') {
        Some((name, parameter)) => {
            let parameter = parameter.trim();
            ParsedCommand {
                name: name.trim().to_string(),
                parameter: (!parameter.is_empty()).then(|| parameter.to_string()),
            }
        }
        None => ParsedCommand {
            name: input.trim().to_string(),
            parameter: None,
        },
    }
}

/// Handler table. Registering an existing name replaces the old handler.
#[derive(Resource, Default)]
pub struct CommandDispatcher {
    handlers: HashMap<String, CommandHandler>,
}

impl CommandDispatcher {
    pub fn register(
        &mut self,
        name: &str,
        handler: impl Fn(&mut World, &CommandParams) -> Result<(), String> + Send + Sync + 'static,
    ) {
        if self.handlers.insert(name.to_string(), Arc::new(handler)).is_some() {
            debug!("[Sylvan commands] Replaced handler for '{name}'");
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    fn handler(&self, name: &str) -> Option<CommandHandler> {
        self.handlers.get(name).cloned()
    }
}

/// Reads the parsed `name:parameter` value from a handler's params.
pub fn parameter(params: &CommandParams) -> Option<&str> {
    params
        .get("parameter")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|p| !p.is_empty())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs `input` against the dispatcher in `world`. Unknown commands,
/// handler errors and handler panics are logged and return false.
pub fn execute_command(world: &mut World, input: &str, extra: &CommandParams) -> bool {
    let parsed = parse_command_input(input);
    let handler = world
        .get_resource::<CommandDispatcher>()
        .and_then(|dispatcher| dispatcher.handler(&parsed.name));
    let Some(handler) = handler else {
        warn!("[Sylvan commands] Command not found: '{}'", parsed.name);
        return false;
    };

    let mut params = extra.clone();
    match parsed.parameter {
        Some(parameter) => {
            params.insert("parameter".to_string(), Value::String(parameter));
        }
        None => {
            params.remove("parameter");
        }
    }

    match catch_unwind(AssertUnwindSafe(|| handler(world, &params))) {
        Ok(Ok(())) => {
            debug!("[Sylvan commands] Executed '{}'", parsed.name);
            true
        }
        Ok(Err(err)) => {
            warn!("[Sylvan commands] '{}' failed: {err}", parsed.name);
            false
        }
        Err(payload) => {
            error!(
                "[Sylvan commands] '{}' panicked: {}",
                parsed.name,
                panic_message(payload.as_ref())
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn parse_trims_and_splits_on_first_colon() {
        assert_eq!(
            parse_command_input("  set_sky_color :  #112233 "),
            ParsedCommand {
                name: "set_sky_color".to_string(),
                parameter: Some("#112233".to_string()),
            }
        );
        assert_eq!(parse_command_input("clear_all").parameter, None);
        assert_eq!(parse_command_input("clear_all:   ").parameter, None);
        assert_eq!(
            parse_command_input("remove_entity:a:b").parameter.as_deref(),
            Some("a:b")
        );
    }

    fn world_with(dispatcher: CommandDispatcher) -> World {
        let mut world = World::new();
        world.insert_resource(dispatcher);
        world
    }

    #[test]
    fn unknown_command_fails_without_panicking() {
        let mut world = world_with(CommandDispatcher::default());
        assert!(!execute_command(&mut world, "summon_dragon:red", &CommandParams::new()));
    }

    #[test]
    fn handler_receives_parameter_merged_into_extra_params() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = CommandDispatcher::default();
        let sink = seen.clone();
        dispatcher.register("echo", move |_, params| {
            sink.lock().unwrap().push(Value::Object(params.clone()));
            Ok(())
        });
        let mut world = world_with(dispatcher);

        let extra = json!({ "count": 3, "parameter": "stale" }).as_object().cloned().unwrap();
        assert!(execute_command(&mut world, "echo:pine", &extra));
        assert!(execute_command(&mut world, "echo", &extra));

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], json!({ "count": 3, "parameter": "pine" }));
        assert_eq!(seen[1], json!({ "count": 3 }));
    }

    #[test]
    fn last_registration_wins() {
        let mut dispatcher = CommandDispatcher::default();
        dispatcher.register("flip", |_, _| Err("old".to_string()));
        dispatcher.register("flip", |_, _| Ok(()));
        let mut world = world_with(dispatcher);
        assert!(execute_command(&mut world, "flip", &CommandParams::new()));
    }

    #[test]
    fn handler_errors_and_panics_become_failures() {
        let mut dispatcher = CommandDispatcher::default();
        dispatcher.register("fails", |_, _| Err("nope".to_string()));
        dispatcher.register("explodes", |_, _| panic!("boom"));
        let mut world = world_with(dispatcher);
        assert!(!execute_command(&mut world, "fails", &CommandParams::new()));
        assert!(!execute_command(&mut world, "explodes", &CommandParams::new()));
        // The dispatcher keeps working after a panic.
        assert!(!execute_command(&mut world, "fails", &CommandParams::new()));
    }
}
