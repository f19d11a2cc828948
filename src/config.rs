//! Startup and service configuration.
//!
//! `scene.json` carries window and startup options; environment variables
//! override it. LLM and speech credentials resolve per request in the
//! order: explicit override > persisted `settings.json` > environment >
//! compiled default, so a credential re-entered through the settings
//! endpoint wins over a stale environment variable.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_ADDR: &str = "127.0.0.1:3100";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_LLM_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TOP_P: f32 = 1.0;
pub const DEFAULT_SPEECH_MODEL: &str = "saaras:v2";
pub const DEFAULT_SPEECH_ENDPOINT: &str = "https://api.sarvam.ai/speech-to-text-translate";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Environment lookup, injectable for tests.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Reads a variable, treating blank values as unset.
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn process_env() -> EnvLookup {
    Arc::new(env_var)
}

#[derive(Deserialize, Default, Clone, Debug, PartialEq)]
pub struct StartupConfig {
    pub window_title: Option<String>,
    pub window_width: Option<f32>,
    pub window_height: Option<f32>,
    pub api_addr: Option<String>,
    pub seed: Option<u64>,
    pub initial_tree_type: Option<String>,
    pub initial_tree_count: Option<usize>,
}

impl StartupConfig {
    pub fn load() -> Self {
        let path = env_var("SYLVAN_SCENE_CONFIG").unwrap_or_else(|| "scene.json".to_string());
        let mut config = Self::from_file(Path::new(&path));
        config.apply_env(&env_var);
        config
    }

    fn from_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<StartupConfig>(&contents) {
                Ok(config) => {
                    info!("[Sylvan] Loaded startup config from {}", path.display());
                    config
                }
                Err(err) => {
                    warn!("[Sylvan] Failed to parse {}: {err}", path.display());
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn apply_env(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("SYLVAN_API_ADDR") {
            self.api_addr = Some(addr);
        }
        if let Some(seed) = lookup("SYLVAN_SEED").and_then(|v| v.parse().ok()) {
            self.seed = Some(seed);
        }
    }

    pub fn api_addr(&self) -> String {
        self.api_addr.clone().unwrap_or_else(|| DEFAULT_API_ADDR.to_string())
    }
}

/// Values saved through the settings endpoint.
#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct PersistedSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sarvam_api_key: Option<String>,
}

/// JSON file holding `PersistedSettings`.
#[derive(Clone, Debug)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_env() -> Self {
        Self::new(env_var("SYLVAN_SETTINGS_PATH").unwrap_or_else(|| "settings.json".to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is empty settings; an unreadable one is logged and
    /// treated the same way.
    pub fn load(&self) -> PersistedSettings {
        match self.try_load() {
            Ok(settings) => settings,
            Err(err) => {
                warn!("[Sylvan config] Ignoring settings file: {err}");
                PersistedSettings::default()
            }
        }
    }

    fn try_load(&self) -> Result<PersistedSettings, ConfigError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(PersistedSettings::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.path.display().to_string(),
                    source,
                })
            }
        };
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, settings: &PersistedSettings) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, json).map_err(|source| ConfigError::Io {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Loads, applies `f`, saves, and returns the saved settings.
    pub fn update(&self, f: impl FnOnce(&mut PersistedSettings)) -> Result<PersistedSettings, ConfigError> {
        let mut settings = self.try_load()?;
        f(&mut settings);
        self.save(&settings)?;
        Ok(settings)
    }
}

/// Per-request values supplied by the caller.
#[derive(Clone, Debug, Default)]
pub struct LlmOverrides {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub endpoint: String,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn finite(value: Option<f32>) -> Option<f32> {
    value.filter(|v| v.is_finite())
}

impl LlmSettings {
    pub fn resolve(
        overrides: &LlmOverrides,
        env: &dyn Fn(&str) -> Option<String>,
        persisted: &PersistedSettings,
    ) -> Self {
        let api_key = non_blank(&overrides.api_key)
            .or_else(|| non_blank(&persisted.openai_api_key))
            .or_else(|| env("OPENAI_API_KEY"));
        let model = non_blank(&overrides.model)
            .or_else(|| non_blank(&persisted.model))
            .or_else(|| env("SYLVAN_LLM_MODEL"))
            .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string());
        let temperature = finite(overrides.temperature)
            .or(finite(persisted.temperature))
            .or_else(|| finite(env("SYLVAN_LLM_TEMPERATURE").and_then(|v| v.parse().ok())))
            .unwrap_or(DEFAULT_TEMPERATURE)
            .clamp(0.0, 2.0);
        let top_p = finite(persisted.top_p).unwrap_or(DEFAULT_TOP_P).clamp(0.0, 1.0);
        let endpoint = non_blank(&persisted.endpoint)
            .or_else(|| env("SYLVAN_LLM_ENDPOINT"))
            .unwrap_or_else(|| DEFAULT_LLM_ENDPOINT.to_string());
        Self {
            api_key,
            model,
            temperature,
            top_p,
            endpoint,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpeechSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub with_diarization: bool,
    pub endpoint: String,
}

impl SpeechSettings {
    pub fn resolve(env: &dyn Fn(&str) -> Option<String>, persisted: &PersistedSettings) -> Self {
        Self {
            api_key: non_blank(&persisted.sarvam_api_key).or_else(|| env("SARVAM_API_KEY")),
            model: DEFAULT_SPEECH_MODEL.to_string(),
            with_diarization: false,
            endpoint: env("SYLVAN_SPEECH_ENDPOINT").unwrap_or_else(|| DEFAULT_SPEECH_ENDPOINT.to_string()),
        }
    }
}

/// Where request-time settings come from. Cheap to clone; every
/// resolution re-reads the environment and the settings file.
#[derive(Clone)]
pub struct ConfigSource {
    store: SettingsStore,
    env: EnvLookup,
}

impl ConfigSource {
    pub fn new(store: SettingsStore, env: EnvLookup) -> Self {
        Self { store, env }
    }

    pub fn from_env() -> Self {
        Self::new(SettingsStore::from_env(), process_env())
    }

    pub fn store(&self) -> &SettingsStore {
        &self.store
    }

    pub fn llm(&self, overrides: &LlmOverrides) -> LlmSettings {
        LlmSettings::resolve(overrides, self.env.as_ref(), &self.store.load())
    }

    pub fn speech(&self) -> SpeechSettings {
        SpeechSettings::resolve(self.env.as_ref(), &self.store.load())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fake_env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn temp_settings_path() -> PathBuf {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        std::env::temp_dir().join(format!(
            "sylvan-settings-{}-{}.json",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::SeqCst)
        ))
    }

    #[test]
    fn llm_settings_follow_precedence() {
        let persisted = PersistedSettings {
            openai_api_key: Some("from-file".to_string()),
            model: Some("file-model".to_string()),
            temperature: Some(0.2),
            ..Default::default()
        };

        let defaults = LlmSettings::resolve(&LlmOverrides::default(), &fake_env(&[]), &PersistedSettings::default());
        assert_eq!(defaults.api_key, None);
        assert_eq!(defaults.model, DEFAULT_LLM_MODEL);
        assert_eq!(defaults.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(defaults.top_p, DEFAULT_TOP_P);

        let from_file = LlmSettings::resolve(&LlmOverrides::default(), &fake_env(&[]), &persisted);
        assert_eq!(from_file.api_key.as_deref(), Some("from-file"));
        assert_eq!(from_file.temperature, 0.2);

        let env = fake_env(&[
            ("OPENAI_API_KEY", "from-env"),
            ("SYLVAN_LLM_MODEL", "env-model"),
            ("SYLVAN_LLM_TEMPERATURE", "1.1"),
        ]);
        let from_env = LlmSettings::resolve(&LlmOverrides::default(), &env, &PersistedSettings::default());
        assert_eq!(from_env.api_key.as_deref(), Some("from-env"));
        assert_eq!(from_env.model, "env-model");
        assert_eq!(from_env.temperature, 1.1);

        let overrides = LlmOverrides {
            api_key: Some("explicit".to_string()),
            model: Some("  ".to_string()),
            temperature: Some(f32::NAN),
        };
        let explicit = LlmSettings::resolve(&overrides, &env, &persisted);
        assert_eq!(explicit.api_key.as_deref(), Some("explicit"));
        assert_eq!(explicit.model, "file-model");
        assert_eq!(explicit.temperature, 0.2);
    }

    #[test]
    fn re_entered_credential_beats_stale_environment() {
        let store = SettingsStore::new(temp_settings_path());
        let env = fake_env(&[("OPENAI_API_KEY", "stale"), ("SARVAM_API_KEY", "stale-speech")]);
        let source = ConfigSource::new(store.clone(), Arc::new(env));
        assert_eq!(source.llm(&LlmOverrides::default()).api_key.as_deref(), Some("stale"));

        store
            .update(|s| {
                s.openai_api_key = Some("fresh".to_string());
                s.model = Some("file-model".to_string());
                s.sarvam_api_key = Some("fresh-speech".to_string());
            })
            .expect("save settings");
        let llm = source.llm(&LlmOverrides::default());
        assert_eq!(llm.api_key.as_deref(), Some("fresh"));
        assert_eq!(llm.model, "file-model");
        assert_eq!(source.speech().api_key.as_deref(), Some("fresh-speech"));
        let _ = std::fs::remove_file(store.path());
    }

    #[test]
    fn settings_store_round_trips_and_tolerates_missing_file() {
        let store = SettingsStore::new(temp_settings_path());
        assert_eq!(store.load(), PersistedSettings::default());

        let saved = store
            .update(|s| s.openai_api_key = Some("sk-test".to_string()))
            .expect("save settings");
        assert_eq!(store.load(), saved);

        let source = ConfigSource::new(store.clone(), Arc::new(|_: &str| None));
        assert_eq!(source.llm(&LlmOverrides::default()).api_key.as_deref(), Some("sk-test"));
        let _ = std::fs::remove_file(store.path());
    }

    #[test]
    fn corrupt_settings_file_is_ignored() {
        let path = temp_settings_path();
        std::fs::write(&path, "{ not json").unwrap();
        let store = SettingsStore::new(&path);
        assert_eq!(store.load(), PersistedSettings::default());
        assert!(store.update(|_| {}).is_err());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn startup_env_overrides_file_values() {
        let mut config = StartupConfig {
            api_addr: Some("0.0.0.0:9000".to_string()),
            ..Default::default()
        };
        config.apply_env(&fake_env(&[("SYLVAN_SEED", "42"), ("SYLVAN_API_ADDR", "127.0.0.1:4000")]));
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.api_addr(), "127.0.0.1:4000");
        assert_eq!(StartupConfig::default().api_addr(), DEFAULT_API_ADDR);
    }

    #[test]
    fn speech_settings_default_model() {
        let speech = SpeechSettings::resolve(&fake_env(&[("SARVAM_API_KEY", "k")]), &PersistedSettings::default());
        assert_eq!(speech.model, "saaras:v2");
        assert!(!speech.with_diarization);
        assert_eq!(speech.api_key.as_deref(), Some("k"));
    }
}
