//! ChatDock API server
//!
//! The single externally facing process. Handles:
//! - Tenant administration REST API under /api/v1
//! - WhatsApp webhook gateway (handshake + inbound messages)
//! - The retrieval/chat answering pipeline
//! - Observability (logging, metrics, health probes)

mod answer;
mod auth;
mod handlers;
mod middleware;
mod whatsapp;

use axum::{
    routing::{get, post},
    Router,
};
use chatdock_common::{
    config::AppConfig,
    convo::ConversationStore,
    db::DbPool,
    embeddings::{self, Embedder},
    llm::{self, ChatModel},
    metrics,
    vector::{self, VectorIndex},
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::answer::MessagePipeline;
use crate::whatsapp::WhatsAppClient;

/// Application state shared across handlers. Every client here is built once
/// at startup and cloned into requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub convo: ConversationStore,
    pub embedder: Arc<dyn Embedder>,
    pub chat: Arc<dyn ChatModel>,
    pub vectors: Arc<dyn VectorIndex>,
    pub whatsapp: WhatsAppClient,
}

impl AppState {
    /// The answering pipeline over this state's clients
    pub fn pipeline(&self) -> MessagePipeline {
        MessagePipeline::new(
            self.embedder.clone(),
            self.chat.clone(),
            self.vectors.clone(),
            self.convo.clone(),
            self.config.vector.top_k,
        )
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .json()
        .init();

    info!("Starting ChatDock server v{}", chatdock_common::VERSION);

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;

    let config = Arc::new(config);

    // Initialize metrics
    metrics::register_metrics();
    if config.observability.metrics_port > 0 {
        PrometheusBuilder::new()
            .with_http_listener(SocketAddr::from((
                [0, 0, 0, 0],
                config.observability.metrics_port,
            )))
            .install()?;
        info!(port = config.observability.metrics_port, "Metrics exporter started");
    }

    // Relational store
    let db = DbPool::new(&config.database).await?;
    db.init_schema().await?;

    // Conversation store
    let convo = ConversationStore::new(&config.document_store).await;
    if config.document_store.create_tables {
        convo.ensure_tables().await?;
    }

    // AI service clients
    let embedder = embeddings::create_embedder(&config.embedding)?;
    let chat = llm::create_chat_model(&config.chat)?;
    let vectors = vector::create_vector_index(&config.vector)?;

    // Outbound WhatsApp transport
    let whatsapp = WhatsAppClient::new(&config.whatsapp)?;

    let state = AppState {
        config: config.clone(),
        db,
        convo,
        embedder,
        chat,
        vectors,
        whatsapp,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let api_routes = Router::new()
        // Organization endpoints (creation is the only unauthenticated write)
        .route(
            "/organizations",
            post(handlers::organizations::create_organization),
        )
        .route(
            "/organizations/whatsapp-users",
            post(handlers::whatsapp_users::register_whatsapp_user)
                .get(handlers::whatsapp_users::list_whatsapp_users),
        )
        // WhatsApp user endpoints
        .route(
            "/whatsapp-users",
            get(handlers::whatsapp_users::list_whatsapp_users),
        )
        .route(
            "/whatsapp-users/{phone}",
            get(handlers::whatsapp_users::get_whatsapp_user),
        )
        // Knowledge base endpoints
        .route(
            "/knowledge-bases",
            post(handlers::knowledge_bases::create_knowledge_base)
                .get(handlers::knowledge_bases::list_knowledge_bases),
        )
        .route(
            "/knowledge-bases/{id}",
            get(handlers::knowledge_bases::get_knowledge_base),
        )
        // Usage metric endpoints
        .route(
            "/usage-metrics",
            post(handlers::usage_metrics::record_usage_metric)
                .get(handlers::usage_metrics::list_usage_metrics),
        )
        .route(
            "/usage-metrics/by-type/{metric_type}",
            get(handlers::usage_metrics::list_usage_metrics_by_type),
        )
        // Conversation endpoints
        .route(
            "/conversations",
            post(handlers::conversations::create_conversation),
        )
        .route(
            "/conversations/webhook",
            post(handlers::webhook::conversation_webhook),
        )
        .route(
            "/conversations/{id}/messages",
            post(handlers::conversations::create_message)
                .get(handlers::conversations::list_messages),
        )
        .route(
            "/conversations/{id}/{timestamp}",
            get(handlers::conversations::get_conversation),
        );

    let mut app = Router::new()
        .nest("/api/v1", api_routes)
        // Webhook gateway (handshake is unauthenticated by protocol)
        .route(
            "/webhook",
            get(handlers::webhook::verify_webhook).post(handlers::webhook::receive_webhook),
        )
        // Health probes
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready));

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            state.config.rate_limit.requests_per_minute,
            state.config.rate_limit.burst,
        );
        app = app.layer(axum::middleware::from_fn(
            move |req: axum::extract::Request, next: axum::middleware::Next| {
                let limiter = limiter.clone();
                async move {
                    middleware::rate_limit::rate_limit_middleware(req, next, limiter).await
                }
            },
        ));
    }

    app.layer(axum::middleware::from_fn(middleware::metrics::track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
