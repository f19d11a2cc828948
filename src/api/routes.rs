use super::*;
use crate::nl::{RouterError, SpeechError};

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<String>>)>;

fn channel_closed(err: String) -> (StatusCode, Json<ApiResponse<String>>) {
    (StatusCode::SERVICE_UNAVAILABLE, Json(ApiResponse::err(err)))
}

fn process_status(err: &ProcessError) -> StatusCode {
    match err {
        ProcessError::EmptyInput => StatusCode::BAD_REQUEST,
        ProcessError::Busy | ProcessError::Router(RouterError::Busy) => StatusCode::CONFLICT,
        ProcessError::Timeout(_) | ProcessError::Router(RouterError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
        ProcessError::Router(RouterError::MissingCredential) => StatusCode::PRECONDITION_FAILED,
        ProcessError::Router(_) => StatusCode::BAD_GATEWAY,
        ProcessError::Apply(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn speech_status(err: &SpeechError) -> StatusCode {
    match err {
        SpeechError::EmptyAudio | SpeechError::EmptyTranscript => StatusCode::BAD_REQUEST,
        SpeechError::MissingCredential => StatusCode::PRECONDITION_FAILED,
        SpeechError::Transport { .. } | SpeechError::Network(_) | SpeechError::Parse(_) => StatusCode::BAD_GATEWAY,
    }
}

pub(super) async fn health() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::success(serde_json::json!({
        "status": "ok",
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    })))
}

pub(super) async fn get_scene(State(state): State<AppState>) -> ApiResult<SceneSnapshot> {
    let snapshot = ask(&state.sender, SceneRequest::Snapshot).await.map_err(channel_closed)?;
    Ok(Json(ApiResponse::success(snapshot)))
}

pub(super) async fn post_command(
    State(state): State<AppState>,
    Json(req): Json<CommandRequest>,
) -> ApiResult<CommandResult> {
    let command = req.command.trim().to_string();
    if command.is_empty() {
        return Err((StatusCode::BAD_REQUEST, Json(ApiResponse::err("command is required"))));
    }
    let executed = ask(&state.sender, |reply| SceneRequest::Execute {
        command: command.clone(),
        params: req.params,
        reply,
    })
    .await
    .map_err(channel_closed)?;
    Ok(Json(ApiResponse::success(CommandResult { command, executed })))
}

pub(super) async fn post_queue(State(state): State<AppState>, Json(req): Json<QueueRequest>) -> ApiResult<QueueStatus> {
    let status = ask(&state.sender, |reply| SceneRequest::Enqueue {
        commands: req.commands,
        drain: req.drain,
        reply,
    })
    .await
    .map_err(channel_closed)?;
    Ok(Json(ApiResponse::success(status)))
}

pub(super) async fn clear_queue(State(state): State<AppState>) -> ApiResult<QueueStatus> {
    match ask(&state.sender, SceneRequest::ClearQueue).await.map_err(channel_closed)? {
        Ok(status) => Ok(Json(ApiResponse::success(status))),
        Err(err) => Err((StatusCode::CONFLICT, Json(ApiResponse::err(err)))),
    }
}

pub(super) async fn post_nl(State(state): State<AppState>, Json(req): Json<NlRequest>) -> ApiResult<crate::nl::ProcessOutcome> {
    let overrides = LlmOverrides {
        api_key: req.api_key,
        model: req.model,
        temperature: req.temperature,
    };
    match state.processor.process_input(&req.text, &overrides).await {
        Ok(outcome) => Ok(Json(ApiResponse::success(outcome))),
        Err(err) => Err((process_status(&err), Json(ApiResponse::err(err.to_string())))),
    }
}

pub(super) async fn post_speech(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> ApiResult<SpeechResponse> {
    let mime = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("audio/webm")
        .to_string();
    let transcript = state
        .speech
        .translate(body.to_vec(), &mime)
        .await
        .map_err(|err| (speech_status(&err), Json(ApiResponse::err(err.to_string()))))?;

    match state
        .processor
        .process_input(&transcript.transcript, &LlmOverrides::default())
        .await
    {
        Ok(outcome) => Ok(Json(ApiResponse::success(SpeechResponse {
            transcript: transcript.transcript,
            language_code: transcript.language_code,
            outcome,
        }))),
        Err(err) => Err((process_status(&err), Json(ApiResponse::err(err.to_string())))),
    }
}

fn settings_view(config: &ConfigSource) -> SettingsView {
    let llm = config.llm(&LlmOverrides::default());
    SettingsView {
        model: llm.model,
        temperature: llm.temperature,
        top_p: llm.top_p,
        endpoint: llm.endpoint,
        has_api_key: llm.api_key.is_some(),
        has_speech_api_key: config.speech().api_key.is_some(),
    }
}

pub(super) async fn get_settings(State(state): State<AppState>) -> Json<ApiResponse<SettingsView>> {
    Json(ApiResponse::success(settings_view(&state.config)))
}

fn blank_to_none(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub(super) async fn post_settings(
    State(state): State<AppState>,
    Json(req): Json<SettingsRequest>,
) -> ApiResult<SettingsView> {
    if req.temperature.is_some_and(|t| !t.is_finite() || !(0.0..=2.0).contains(&t)) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::err("temperature must be between 0 and 2")),
        ));
    }
    let saved = state.config.store().update(|settings| {
        if let Some(key) = req.api_key {
            settings.openai_api_key = blank_to_none(key);
        }
        if let Some(key) = req.speech_api_key {
            settings.sarvam_api_key = blank_to_none(key);
        }
        if let Some(model) = req.model {
            settings.model = blank_to_none(model);
        }
        if req.temperature.is_some() {
            settings.temperature = req.temperature;
        }
        if req.top_p.is_some() {
            settings.top_p = req.top_p;
        }
    });
    match saved {
        Ok(_) => {
            info!("[Sylvan API] Settings saved to {}", state.config.store().path().display());
            Ok(Json(ApiResponse::success(settings_view(&state.config))))
        }
        Err(err) => Err((StatusCode::INTERNAL_SERVER_ERROR, Json(ApiResponse::err(err.to_string())))),
    }
}

pub(super) async fn get_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Vec<SceneEvent>> {
    let events = ask(&state.sender, |reply| SceneRequest::Events {
        since: query.since,
        reply,
    })
    .await
    .map_err(channel_closed)?;
    Ok(Json(ApiResponse::success(events)))
}

pub(super) async fn subscribe_events(State(state): State<AppState>) -> impl IntoResponse {
    let sender = state.sender.clone();
    let stream = async_stream::stream! {
        let mut tick = tokio::time::interval(std::time::Duration::from_millis(100));
        let mut last_seq = 0u64;
        loop {
            tick.tick().await;
            let Ok(events) = ask(&sender, |reply| SceneRequest::Events { since: last_seq, reply }).await else {
                break;
            };
            for ev in events {
                last_seq = last_seq.max(ev.seq);
                let payload = serde_json::to_string(&ev).unwrap_or_else(|_| "{}".to_string());
                yield Ok::<SseEvent, Infallible>(SseEvent::default().event(ev.name.clone()).data(payload));
            }
        }
    };
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(5))
            .text("keep-alive"),
    )
}
