//! VocalScale Admin Gateway
//!
//! The JSON API behind the admin dashboard.
//! Handles:
//! - Request routing to the query layer and support desk
//! - Rate limiting
//! - Session token pass-through
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, info_span, warn};
use tracing_subscriber::EnvFilter;
use vocalscale_common::{
    cache::QueryCache,
    config::AppConfig,
    fixtures, metrics,
    queries::AdminQueries,
    store::{DataStore, PostgrestStore},
    support::{HttpKnowledgeProcessor, KnowledgeProcessor, SupportService},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DataStore>,
    pub queries: AdminQueries,
    pub support: SupportService,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire the query layer and support desk around one shared cache
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn DataStore>,
        processor: Arc<dyn KnowledgeProcessor>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let cache = QueryCache::new();
        let queries = AdminQueries::new(Arc::clone(&store), cache.clone(), config.cache.clone());
        let support = SupportService::new(
            Arc::clone(&store),
            processor,
            cache,
            config.cache.clone(),
        );

        Self {
            config,
            store,
            queries,
            support,
            metrics,
        }
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

async fn build_store(config: &AppConfig) -> Result<Arc<dyn DataStore>, Box<dyn std::error::Error>> {
    if config.store.in_memory {
        warn!("Serving the in-memory demo store");
        return Ok(Arc::new(fixtures::demo_store().await));
    }

    info!(url = %config.store.url, "Using hosted store");
    Ok(Arc::new(PostgrestStore::new(&config.store)?))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()
        .and_then(|config| config.validate().map(|()| config))
        .map_err(|e| {
            eprintln!("Failed to load configuration: {}", e);
            e
        })?;

    init_tracing(&config);
    info!(
        service = %config.observability.service_name,
        "Starting VocalScale Admin Gateway v{}",
        vocalscale_common::VERSION
    );

    let config = Arc::new(config);

    // Initialize metrics
    let metrics_handle = if config.observability.metrics_enabled {
        let handle = PrometheusBuilder::new().install_recorder()?;
        metrics::register_metrics();
        Some(handle)
    } else {
        None
    };

    let store = build_store(&config).await?;
    if let Err(e) = store.ping().await {
        warn!(error = %e, store = store.name(), "Store not reachable at startup");
    }

    let processor: Arc<dyn KnowledgeProcessor> =
        Arc::new(HttpKnowledgeProcessor::new(&config.processor)?);

    // Create app state
    let state = AppState::new(config.clone(), store, processor, metrics_handle);

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
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

    let service = state.config.observability.service_name.clone();
    let trace = TraceLayer::new_for_http().make_span_with(move |request: &Request<Body>| {
        info_span!(
            "http_request",
            service = %service,
            method = %request.method(),
            uri = %request.uri().path(),
        )
    });
    let timeout =
        TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, state.config.request_timeout());

    let support_routes = Router::new()
        .route("/tickets", get(handlers::support::list_tickets))
        .route(
            "/tickets/{id}/messages",
            get(handlers::support::list_messages).post(handlers::support::send_reply),
        )
        .route("/tickets/{id}/status", patch(handlers::support::update_status))
        .route("/tickets/{id}/draft", post(handlers::support::generate_draft))
        .route("/actions", post(handlers::support::execute_action))
        .route("/knowledge/search", post(handlers::support::search_knowledge))
        .route(
            "/knowledge/documents",
            get(handlers::support::list_documents).post(handlers::support::add_document),
        )
        .route("/processor/health", get(handlers::support::processor_health))
        .route("/processor/metrics", get(handlers::support::processor_metrics));

    let mut api_routes = Router::new()
        // Users
        .route("/users", get(handlers::users::list_users))
        .route("/users/{id}", get(handlers::users::get_user))

        // Entity lists
        .route("/businesses", get(handlers::lists::list_businesses))
        .route("/calls", get(handlers::lists::list_calls))
        .route("/reviews", get(handlers::lists::list_reviews))
        .route("/subscriptions", get(handlers::lists::list_subscriptions))
        .route("/plans", get(handlers::lists::list_plans))

        // Dashboard
        .route("/dashboard/stats", get(handlers::dashboard::stats))
        .route("/dashboard/calls-chart", get(handlers::dashboard::calls_chart))
        .route("/dashboard/recent-calls", get(handlers::dashboard::recent_calls))

        .nest("/support", support_routes);

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            state.config.rate_limit.requests_per_second,
            state.config.rate_limit.burst,
        );
        api_routes = api_routes.layer(from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    // Compose the app
    Router::new()
        // Health endpoints (no rate limit)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/metrics", get(handlers::health::metrics))
        .nest("/api", api_routes)
        .layer(timeout)
        .layer(from_fn(middleware::metrics::track_metrics))
        .layer(trace)
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
