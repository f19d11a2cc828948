pub mod api;
pub mod evaluator;

pub use evaluator::{fallback_object, Bindings, CodeEvaluator, EvalError};

pub const DEFAULT_SNIPPET_MAX_OPERATIONS: u64 = 200_000;
pub const DEFAULT_SNIPPET_MAX_CALL_LEVELS: usize = 16;
pub const MAX_SNIPPET_PARTS: usize = 512;
pub const MAX_SNIPPET_BYTES: usize = 16 * 1024;
