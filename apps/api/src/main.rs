use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::{BookingCommitter, InMemoryBookingStore};
use conversation_cell::{ConversationEngine, OpenAiIntentExtractor, SessionManager};
use doctor_cell::services::registry::DoctorRegistry;
use doctor_cell::InMemoryDoctorRegistry;
use shared_config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting booking assistant API server");

    // Load configuration
    let config = AppConfig::from_env();
    if !config.is_configured() {
        warn!("No OpenAI credentials; chat extraction calls will fail");
    }

    // Wire up the cells
    let registry = Arc::new(InMemoryDoctorRegistry::from_seed_file(
        &config.doctor_seed_path,
    )?);
    info!(
        "Loaded {} doctors from {}",
        registry.all().len(),
        config.doctor_seed_path
    );

    let store = Arc::new(InMemoryBookingStore::new());
    let committer = Arc::new(BookingCommitter::new(store.clone()));
    let extractor = Arc::new(OpenAiIntentExtractor::new(&config));
    let engine = Arc::new(ConversationEngine::new(
        registry.clone(),
        committer.clone(),
        extractor,
        config.max_extraction_retries,
    ));
    let sessions = Arc::new(SessionManager::new(config.session_timeout_minutes));

    // Periodic cleanup of idle chat sessions
    {
        let sessions = sessions.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            loop {
                interval.tick().await;
                let swept = sessions.sweep_expired();
                if swept > 0 {
                    info!("Swept {} expired chat sessions", swept);
                }
            }
        });
    }

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(registry, store, committer, engine, sessions)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
