use bevy::prelude::*;
use rhai::{Dynamic, Engine, Scope, Variant};

use crate::components::Primitive;
use crate::palette::parse_color;
use crate::scene::ObjectSpec;

use super::api::register_geometry_api;
use super::{
    DEFAULT_SNIPPET_MAX_CALL_LEVELS, DEFAULT_SNIPPET_MAX_OPERATIONS, MAX_SNIPPET_BYTES,
    MAX_SNIPPET_PARTS,
};

pub const FALLBACK_COLOR: &str = "#a8d8ea";
pub const FALLBACK_SIZE: Vec3 = Vec3::new(4.0, 20.0, 4.0);

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("snippet is empty")]
    Empty,
    #[error("snippet exceeds {MAX_SNIPPET_BYTES} bytes")]
    TooLarge,
    #[error("snippet failed: {0}")]
    Script(String),
    #[error("snippet produced {0}, not a renderable object")]
    NotRenderable(String),
}

/// Named values visible to a snippet as constants.
#[derive(Clone, Default)]
pub struct Bindings(Vec<(String, Dynamic)>);

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: Variant + Clone>(mut self, name: &str, value: T) -> Self {
        self.0.push((name.to_string(), Dynamic::from(value)));
        self
    }

    pub fn number(self, name: &str, value: f32) -> Self {
        self.with(name, value as rhai::FLOAT)
    }
}

/// The deterministic object substituted for any failed snippet: a tall
/// pastel box standing on the origin.
pub fn fallback_object() -> ObjectSpec {
    let color = parse_color(FALLBACK_COLOR).unwrap_or(Color::srgb(0.66, 0.85, 0.92));
    ObjectSpec::mesh(
        Primitive::Cuboid {
            width: FALLBACK_SIZE.x,
            height: FALLBACK_SIZE.y,
            depth: FALLBACK_SIZE.z,
        },
        color,
    )
    .at(Vec3::new(0.0, FALLBACK_SIZE.y / 2.0, 0.0))
}

/// Evaluates snippets against the geometry namespace. The engine has no
/// file, module or eval access and runs under operation limits.
pub struct CodeEvaluator {
    engine: Engine,
}

impl Default for CodeEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeEvaluator {
    pub fn new() -> Self {
        let mut engine = Engine::new();
        engine.set_max_operations(DEFAULT_SNIPPET_MAX_OPERATIONS);
        engine.set_max_call_levels(DEFAULT_SNIPPET_MAX_CALL_LEVELS);
        engine.set_max_expr_depths(64, 32);
        engine.set_max_string_size(4096);
        engine.set_max_array_size(MAX_SNIPPET_PARTS);
        engine.set_max_map_size(256);
        engine.disable_symbol("eval");
        engine.disable_symbol("import");
        engine.on_print(|_| {});
        engine.on_debug(|_, _, _| {});
        register_geometry_api(&mut engine);
        Self { engine }
    }

    fn run(&self, code: &str, bindings: &Bindings) -> Result<Dynamic, EvalError> {
        if code.trim().is_empty() {
            return Err(EvalError::Empty);
        }
        if code.len() > MAX_SNIPPET_BYTES {
            return Err(EvalError::TooLarge);
        }
        let mut scope = Scope::new();
        for (name, value) in &bindings.0 {
            scope.push_constant_dynamic(name.clone(), value.clone());
        }
        self.engine
            .eval_with_scope::<Dynamic>(&mut scope, code)
            .map_err(|err| EvalError::Script(err.to_string()))
    }

    /// Runs `code` and returns its value, or unit on any failure.
    pub fn evaluate(&self, code: &str, bindings: &Bindings) -> Dynamic {
        match self.run(code, bindings) {
            Ok(value) => value,
            Err(err) => {
                debug!("[Sylvan eval] {err}");
                Dynamic::UNIT
            }
        }
    }

    /// Runs `code` and requires a renderable object back.
    pub fn try_create_object(&self, code: &str, bindings: &Bindings) -> Result<ObjectSpec, EvalError> {
        let value = self.run(code, bindings)?;
        let type_name = value.type_name().to_string();
        match value.try_cast::<ObjectSpec>() {
            Some(object) if object.is_renderable() => Ok(object),
            Some(_) => Err(EvalError::NotRenderable("an empty group".to_string())),
            None => Err(EvalError::NotRenderable(type_name)),
        }
    }

    /// Never fails: any error yields `fallback_object()`.
    pub fn create_object_from_snippet(&self, code: &str, bindings: &Bindings) -> ObjectSpec {
        match self.try_create_object(code, bindings) {
            Ok(object) => object,
            Err(err) => {
                warn!("[Sylvan eval] Using fallback object: {err}");
                fallback_object()
            }
        }
    }
}
