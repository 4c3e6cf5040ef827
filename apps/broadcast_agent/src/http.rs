// Webhook and audio file server
//
// Twilio posts inbound WhatsApp messages as a form; the reply goes back as TwiML
// so it reaches the sender without a separate API call. News updates are only
// acknowledged here; their broadcast result is sent later as its own message.

use axum::{
    extract::{Form, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use phis_core::inbound::InboundHandler;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

pub const HEALTH_TEXT: &str = "✅ Agentic malaria AI is running!";

#[derive(Clone)]
struct AgentState {
    handler: Arc<InboundHandler>,
}

#[derive(Debug, Deserialize)]
struct InboundForm {
    #[serde(rename = "From", default)]
    from: String,
    #[serde(rename = "Body", default)]
    body: String,
}

pub fn router(handler: Arc<InboundHandler>, audio_dir: &Path) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/inbound", post(inbound_handler))
        .route("/twilio", post(inbound_handler))
        .nest_service("/audio", ServeDir::new(audio_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(AgentState { handler })
}

pub async fn serve(
    router: Router,
    port: u16,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(target: "broadcast_agent", addr = %addr, "HTTP server ready");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn health_handler() -> &'static str {
    HEALTH_TEXT
}

async fn inbound_handler(
    State(state): State<AgentState>,
    Form(form): Form<InboundForm>,
) -> impl IntoResponse {
    let sender = form.from.trim();
    if sender.is_empty() {
        return (StatusCode::BAD_REQUEST, "missing From").into_response();
    }
    let reply = state.handler.handle(sender, &form.body).await;
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml")],
        twiml_message(&reply),
    )
        .into_response()
}

fn twiml_message(reply: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{}</Message></Response>",
        quick_xml::escape::escape(reply)
    )
}
