//! HTTP control surface. Handlers run on a Tokio runtime in a background
//! thread and reach the Bevy world through `SceneRequest`s.

mod router;
mod routes;
mod runtime;
mod security;
pub mod types;

use axum::{
    body::Bytes,
    extract::{Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use bevy::prelude::*;
use crossbeam_channel::{Receiver, Sender};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use crate::commands::{CommandParams, QueuedCommand};
use crate::config::{ConfigSource, LlmOverrides};
use crate::events::SceneEvent;
use crate::nl::{NaturalLanguageProcessor, NaturalLanguageRouter, OpenAiBackend, ProcessError, SpeechTranslator};
use router::build_router;
pub use runtime::{ApiChannels, ChannelSceneControl, SceneRequest};
use runtime::*;
use routes::*;
use security::*;
use types::*;

pub type SceneProcessor = NaturalLanguageProcessor<OpenAiBackend, ChannelSceneControl>;

#[derive(Clone)]
pub struct AppState {
    pub(crate) sender: Sender<SceneRequest>,
    pub(crate) processor: Arc<SceneProcessor>,
    pub(crate) speech: SpeechTranslator,
    pub(crate) config: ConfigSource,
}

impl AppState {
    pub fn new(sender: Sender<SceneRequest>, config: ConfigSource) -> Self {
        let router = NaturalLanguageRouter::new(OpenAiBackend::new(), config.clone());
        let processor = NaturalLanguageProcessor::new(router, ChannelSceneControl::new(sender.clone()));
        Self {
            speech: SpeechTranslator::new(config.clone()),
            sender,
            processor: Arc::new(processor),
            config,
        }
    }
}

pub struct ApiPlugin {
    pub addr: String,
}

impl Plugin for ApiPlugin {
    fn build(&self, app: &mut App) {
        let (tx, rx) = crossbeam_channel::unbounded::<SceneRequest>();
        app.insert_resource(ApiChannels { receiver: rx })
            .add_systems(Update, process_scene_requests);

        let state = AppState::new(tx, ConfigSource::from_env());
        let security = ApiSecurity::from_env();
        let addr = self.addr.clone();
        std::thread::spawn(move || {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(err) => {
                    error!("[Sylvan API] Failed to start runtime: {err}");
                    return;
                }
            };
            rt.block_on(async {
                let app = build_router(state, security);
                let listener = match tokio::net::TcpListener::bind(&addr).await {
                    Ok(listener) => listener,
                    Err(err) => {
                        error!("[Sylvan API] Failed to bind {addr}: {err}");
                        return;
                    }
                };
                info!("[Sylvan API] Listening on http://{addr}");
                if let Err(err) = axum::serve(listener, app).await {
                    error!("[Sylvan API] Server stopped: {err}");
                }
            });
        });
    }
}

/// Sends a request to the world and waits for its reply.
pub(crate) async fn ask<T>(
    sender: &Sender<SceneRequest>,
    make: impl FnOnce(oneshot::Sender<T>) -> SceneRequest,
) -> Result<T, String> {
    let (tx, rx) = oneshot::channel();
    sender
        .send(make(tx))
        .map_err(|_| "Channel closed".to_string())?;
    rx.await.map_err(|_| "Channel closed".to_string())
}
