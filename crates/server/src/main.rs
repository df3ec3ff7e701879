//! Document request server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit, middleware};
use docreq_api::{middleware::AppState, router as api_router};
use docreq_common::{Config, LocalStorage, StorageBackend};
use docreq_core::{
    AuthService, Dispatcher, NoOpDispatcher, RequestService, RequestSettings, SmtpDispatcher,
    StudentService,
};
use docreq_db::repositories::{
    AttachmentRepository, PaymentRepository, RequestRepository, StaffRepository,
    StudentRepository,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Files accepted in a single request body, as a multiple of the per-file limit.
const FILES_PER_REQUEST: u64 = 5;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "docreq=debug,tower_http=debug".into());

    // DOCREQ_LOG_FORMAT=json switches to one JSON object per line
    if std::env::var("DOCREQ_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting docreq server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = docreq_db::init(&config).await?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    docreq_db::migrate(&db).await?;
    info!("Migrations completed");

    let db = Arc::new(db);

    // Notifications
    let dispatcher: Dispatcher = if config.email.enabled {
        info!(host = %config.email.host, port = config.email.port, "Email notifications enabled");
        Arc::new(SmtpDispatcher::from_config(&config.email, &config.server.url)?)
    } else {
        info!("Email notifications disabled");
        Arc::new(NoOpDispatcher)
    };

    // Uploads
    tokio::fs::create_dir_all(&config.storage.upload_dir).await?;
    let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::from_config(&config.storage));

    // Initialize repositories
    let request_repo = RequestRepository::new(Arc::clone(&db));
    let student_repo = StudentRepository::new(Arc::clone(&db));
    let staff_repo = StaffRepository::new(Arc::clone(&db));
    let payment_repo = PaymentRepository::new(Arc::clone(&db));
    let attachment_repo = AttachmentRepository::new(Arc::clone(&db));

    // Initialize services
    let settings = RequestSettings::from_config(&config)?;
    let auth_service = AuthService::new(student_repo.clone(), staff_repo);
    let student_service = StudentService::new(student_repo.clone(), request_repo.clone())
        .with_calendar(settings.calendar.clone(), settings.page_size);
    let request_service = RequestService::new(
        request_repo,
        student_repo,
        payment_repo,
        attachment_repo,
        storage,
        dispatcher,
    )
    .with_settings(settings);

    let state = AppState {
        auth_service,
        request_service,
        student_service,
    };

    let body_limit = usize::try_from(
        config
            .storage
            .max_file_size
            .saturating_mul(FILES_PER_REQUEST)
            .saturating_add(1024 * 1024),
    )
    .unwrap_or(usize::MAX);

    // Build router
    let mut app = Router::new().nest("/api", api_router());

    if config.storage.base_url.starts_with('/') && config.storage.base_url.len() > 1 {
        app = app.nest_service(
            config.storage.base_url.trim_end_matches('/'),
            ServeDir::new(&config.storage.upload_dir),
        );
    }

    let app = app
        .layer(middleware::from_fn_with_state(
            state.clone(),
            docreq_api::middleware::auth_middleware,
        ))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
