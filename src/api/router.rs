use super::*;

pub(super) fn build_router(state: AppState, security: ApiSecurity) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/scene", get(get_scene))
        .route("/command", post(post_command))
        .route("/queue", post(post_queue).delete(clear_queue))
        .route("/nl", post(post_nl))
        .route("/speech", post(post_speech))
        .route("/settings", get(get_settings).post(post_settings))
        .route("/events", get(get_events))
        .route("/events/subscribe", get(subscribe_events))
        .with_state(state)
        .layer(middleware::from_fn_with_state(security, api_guard))
}
