//! Lenient readers for JSON parameter bags. LLM output and HTTP bodies
//! use mixed key styles and loose types, so lookups accept a list of key
//! aliases and coerce strings/numbers where it is unambiguous.

use serde_json::{Map, Value};

pub type ParamMap = Map<String, Value>;

fn lookup<'a>(params: &'a ParamMap, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| params.get(*key))
        .find(|value| !value.is_null())
}

pub fn str_param(params: &ParamMap, keys: &[&str]) -> Option<String> {
    match lookup(params, keys)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A color value: strings pass through, integers are packed `0xRRGGBB`
/// and come back as `#rrggbb`.
pub fn color_param(params: &ParamMap, keys: &[&str]) -> Option<String> {
    match lookup(params, keys)? {
        Value::Number(n) => n
            .as_u64()
            .filter(|rgb| *rgb <= 0xff_ffff)
            .map(|rgb| format!("#{rgb:06x}")),
        _ => str_param(params, keys),
    }
}

pub fn f32_param(params: &ParamMap, keys: &[&str]) -> Option<f32> {
    let n = match lookup(params, keys)? {
        Value::Number(n) => n.as_f64()? as f32,
        Value::String(s) => s.trim().parse::<f32>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

pub fn usize_param(params: &ParamMap, keys: &[&str]) -> Option<usize> {
    let n = f32_param(params, keys)?;
    (n >= 0.0).then(|| n.round() as usize)
}

/// Truthy values: `true`, non-zero numbers, and strings other than
/// `""`, `"false"`, `"none"`, `"no"`, `"0"`.
pub fn bool_param(params: &ParamMap, keys: &[&str]) -> Option<bool> {
    Some(match lookup(params, keys)? {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "" | "false" | "none" | "no" | "0" | "off"
        ),
        Value::Object(_) => true,
        _ => return None,
    })
}

pub fn object_param<'a>(params: &'a ParamMap, keys: &[&str]) -> Option<&'a ParamMap> {
    lookup(params, keys)?.as_object()
}
