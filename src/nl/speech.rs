use std::time::Duration;

use bevy::log::info;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::ConfigSource;

const SPEECH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpeechError {
    #[error("no speech API key configured; set SARVAM_API_KEY or save one through /settings")]
    MissingCredential,
    #[error("audio payload is empty")]
    EmptyAudio,
    #[error("speech request failed with status {status}: {message}")]
    Transport { status: u16, message: String },
    #[error("speech network error: {0}")]
    Network(String),
    #[error("could not parse speech response: {0}")]
    Parse(String),
    #[error("speech service returned an empty transcript")]
    EmptyTranscript,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub transcript: String,
    #[serde(default)]
    pub language_code: Option<String>,
}

/// Speech-to-English client for the Sarvam translate endpoint.
#[derive(Clone)]
pub struct SpeechTranslator {
    client: Client,
    config: ConfigSource,
}

impl SpeechTranslator {
    pub fn new(config: ConfigSource) -> Self {
        let client = Client::builder()
            .timeout(SPEECH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, config }
    }

    pub async fn translate(&self, audio: Vec<u8>, mime: &str) -> Result<Transcript, SpeechError> {
        if audio.is_empty() {
            return Err(SpeechError::EmptyAudio);
        }
        let settings = self.config.speech();
        let api_key = settings.api_key.ok_or(SpeechError::MissingCredential)?;

        let part = Part::bytes(audio)
            .file_name(format!("recording.{}", extension_for(mime)))
            .mime_str(mime)
            .map_err(|err| SpeechError::Parse(err.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("model", settings.model)
            .text("with_diarization", settings.with_diarization.to_string());

        let response = self
            .client
            .post(&settings.endpoint)
            .header("api-subscription-key", api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|err| SpeechError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Transport {
                status: status.as_u16(),
                message: crate::nl::openai::error_message(&body),
            });
        }
        let body = response
            .text()
            .await
            .map_err(|err| SpeechError::Network(err.to_string()))?;
        let transcript = parse_transcript(&body)?;
        info!(
            "[Sylvan speech] Transcribed {} chars ({})",
            transcript.transcript.len(),
            transcript.language_code.as_deref().unwrap_or("unknown")
        );
        Ok(transcript)
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime.split(';').next().unwrap_or_default().trim() {
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/ogg" => "ogg",
        _ => "webm",
    }
}

pub(crate) fn parse_transcript(body: &str) -> Result<Transcript, SpeechError> {
    let mut parsed: Transcript = serde_json::from_str(body).map_err(|err| SpeechError::Parse(err.to_string()))?;
    parsed.transcript = parsed.transcript.trim().to_string();
    if parsed.transcript.is_empty() {
        return Err(SpeechError::EmptyTranscript);
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SettingsStore;
    use std::sync::Arc;

    #[test]
    fn transcript_must_be_present_and_non_empty() {
        let parsed = parse_transcript(r#"{"transcript":" make it snow ","language_code":"hi-IN"}"#).unwrap();
        assert_eq!(parsed.transcript, "make it snow");
        assert_eq!(parsed.language_code.as_deref(), Some("hi-IN"));
        assert_eq!(parse_transcript(r#"{"transcript":"  "}"#), Err(SpeechError::EmptyTranscript));
        assert!(matches!(parse_transcript("{}"), Err(SpeechError::Parse(_))));
    }

    #[test]
    fn extension_follows_the_audio_mime() {
        assert_eq!(extension_for("audio/wav"), "wav");
        assert_eq!(extension_for("audio/webm;codecs=opus"), "webm");
        assert_eq!(extension_for("application/octet-stream"), "webm");
    }

    #[tokio::test]
    async fn requests_without_audio_or_key_fail_locally() {
        let config = ConfigSource::new(
            SettingsStore::new(std::env::temp_dir().join("sylvan-speech-tests-missing.json")),
            Arc::new(|_: &str| None),
        );
        let translator = SpeechTranslator::new(config);
        assert_eq!(translator.translate(Vec::new(), "audio/wav").await, Err(SpeechError::EmptyAudio));
        assert_eq!(
            translator.translate(vec![1, 2, 3], "audio/wav").await,
            Err(SpeechError::MissingCredential)
        );
    }
}
