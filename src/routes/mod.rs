//! API routes

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::conversation::{Message, PendingState, Role};
use crate::core::{SendOutcome, SessionHub, SharedSession, VisibilityState, WidgetSession};
use crate::render::{format_markdown, render_reply, RenderedReply};
use crate::AppState;

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("Unknown session: {0}")]
    SessionNotFound(Uuid),
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let status = match self {
            RouteError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    sessions: usize,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ViewBody {
    pub path: String,
    #[serde(default)]
    pub scroll_offset: f64,
}

#[derive(Debug, Serialize)]
pub struct MessageView {
    pub role: Role,
    pub content: String,
    /// Rendered body for assistant turns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
            html: match message.role {
                Role::Assistant => Some(format_markdown(&message.content)),
                Role::User => None,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VisibilityView {
    pub state: VisibilityState,
    pub launcher_visible: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub messages: Vec<MessageView>,
    pub pending: PendingState,
    pub draft: String,
    pub follow_ups: Vec<String>,
    pub visibility: VisibilityView,
}

impl SessionView {
    fn new(id: Uuid, session: &WidgetSession) -> Self {
        Self {
            session_id: id,
            messages: session.chat.messages().iter().map(MessageView::from).collect(),
            pending: session.chat.pending().clone(),
            draft: session.chat.draft().to_string(),
            follow_ups: session.chat.follow_ups().to_vec(),
            visibility: VisibilityView::new(session),
        }
    }
}

impl VisibilityView {
    fn new(session: &WidgetSession) -> Self {
        Self {
            state: session.visibility.state(),
            launcher_visible: session.visibility.launcher_visible(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub outcome: SendOutcome,
    pub session: SessionView,
}

async fn find(hub: &SessionHub, id: Uuid) -> Result<SharedSession, RouteError> {
    hub.get(id).await.ok_or(RouteError::SessionNotFound(id))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        sessions: state.hub.len().await,
    })
}

async fn render(State(state): State<AppState>, Json(body): Json<TextBody>) -> Json<RenderedReply> {
    let header = &state.hub.config().chat.follow_up_header;
    Json(render_reply(&body.text, header))
}

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionView>) {
    let (id, session) = state.hub.create().await;
    let session = session.lock().await;
    (StatusCode::CREATED, Json(SessionView::new(id, &session)))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, RouteError> {
    let session = find(&state.hub, id).await?;
    let session = session.lock().await;
    Ok(Json(SessionView::new(id, &session)))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, RouteError> {
    if state.hub.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(RouteError::SessionNotFound(id))
    }
}

async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<TextBody>,
) -> Result<Json<SendResponse>, RouteError> {
    send(&state.hub, id, Some(&body.text)).await
}

async fn submit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SendResponse>, RouteError> {
    send(&state.hub, id, None).await
}

async fn send(
    hub: &SessionHub,
    id: Uuid,
    text: Option<&str>,
) -> Result<Json<SendResponse>, RouteError> {
    let outcome = hub
        .dispatch(id, text)
        .await
        .ok_or(RouteError::SessionNotFound(id))?;

    let session = find(hub, id).await?;
    let session = session.lock().await;
    Ok(Json(SendResponse {
        outcome,
        session: SessionView::new(id, &session),
    }))
}

/// Lock a session, apply `f`, and return the updated view.
async fn update_session(
    hub: &SessionHub,
    id: Uuid,
    f: impl FnOnce(&mut WidgetSession),
) -> Result<Json<SessionView>, RouteError> {
    let session = find(hub, id).await?;
    let mut session = session.lock().await;
    f(&mut session);
    Ok(Json(SessionView::new(id, &session)))
}

async fn put_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<TextBody>,
) -> Result<Json<SessionView>, RouteError> {
    update_session(&state.hub, id, |s| s.chat.set_draft(body.text)).await
}

async fn clear_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, RouteError> {
    update_session(&state.hub, id, |s| s.chat.clear()).await
}

async fn dismiss_error(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, RouteError> {
    update_session(&state.hub, id, |s| s.chat.dismiss_error()).await
}

/// Lock a session, apply a visibility transition, and return the new state.
async fn update_visibility(
    hub: &SessionHub,
    id: Uuid,
    f: impl FnOnce(&mut WidgetSession),
) -> Result<Json<VisibilityView>, RouteError> {
    let session = find(hub, id).await?;
    let mut session = session.lock().await;
    f(&mut session);
    Ok(Json(VisibilityView::new(&session)))
}

async fn update_view(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ViewBody>,
) -> Result<Json<VisibilityView>, RouteError> {
    update_visibility(&state.hub, id, |s| {
        s.visibility.navigate(&body.path);
        s.visibility.scroll_to(body.scroll_offset);
    })
    .await
}

async fn open(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<VisibilityView>, RouteError> {
    update_visibility(&state.hub, id, |s| {
        s.visibility.open();
    })
    .await
}

async fn close(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<VisibilityView>, RouteError> {
    update_visibility(&state.hub, id, |s| {
        s.visibility.close();
    })
    .await
}

async fn minimize(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<VisibilityView>, RouteError> {
    update_visibility(&state.hub, id, |s| {
        s.visibility.minimize();
    })
    .await
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/v1/render", post(render))
        .route("/v1/sessions", post(create_session))
        .route("/v1/sessions/:id", get(get_session).delete(delete_session))
        .route(
            "/v1/sessions/:id/messages",
            post(send_message).delete(clear_messages),
        )
        .route("/v1/sessions/:id/submit", post(submit))
        .route("/v1/sessions/:id/draft", put(put_draft))
        .route("/v1/sessions/:id/dismiss-error", post(dismiss_error))
        .route("/v1/sessions/:id/view", post(update_view))
        .route("/v1/sessions/:id/open", post(open))
        .route("/v1/sessions/:id/close", post(close))
        .route("/v1/sessions/:id/minimize", post(minimize))
}

/// Shared state handle for the router.
pub fn state(hub: SessionHub) -> AppState {
    AppState { hub: Arc::new(hub) }
}
