//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{Catalog, DbAdapter, DiskImageStore, GoogleOAuth, LogMailer, MemoryCache, ResendMailer},
    config::Config,
    error::ApiError,
    web::{
        build_router,
        rate_limit::spawn_sweeper,
        state::{Adapters, AppState},
        ApiDoc,
    },
};
use cookstack_core::{Mailer, OAuthProvider};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_adapter = Arc::new(DbAdapter::connect(&config.database_url).await?);
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| ApiError::Internal(format!("failed to build HTTP client: {}", e)))?;

    let mailer: Arc<dyn Mailer> = match &config.resend_api_key {
        Some(api_key) => Arc::new(ResendMailer::new(
            http.clone(),
            api_key.clone(),
            config.mail_from.clone(),
        )),
        None => {
            warn!("RESEND_API_KEY is not set; emails will only be logged");
            Arc::new(LogMailer::default())
        }
    };

    let google: Option<Arc<dyn OAuthProvider>> = match &config.google {
        Some(google) => Some(Arc::new(GoogleOAuth::new(http.clone(), google.clone()))),
        None => {
            info!("Google sign-in is not configured");
            None
        }
    };

    let cache = Arc::new(MemoryCache::new());
    let adapters = Adapters {
        credentials: db_adapter.clone(),
        content: db_adapter.clone(),
        mailer,
        images: Arc::new(DiskImageStore::new(
            config.image_dir.clone(),
            config.image_base_url.clone(),
        )),
        google,
        cache: cache.clone(),
        translator: Arc::new(Catalog::builtin()),
    };

    // --- 4. Build the Shared AppState ---
    let bind_address = config.bind_address;
    let app_state = Arc::new(AppState::new(config, adapters)?);

    // --- 5. Background Housekeeping ---
    spawn_sweeper(
        vec![app_state.auth_limiter.clone(), app_state.api_limiter.clone()],
        SWEEP_INTERVAL,
    );
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let purged = cache.purge_expired().await;
            if purged > 0 {
                debug!("Purged {} expired cache entries", purged);
            }
        }
    });

    // --- 6. Create the Web Router ---
    // Merge the API router with the Swagger UI router for a complete application.
    let app = build_router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", bind_address);
    info!("Swagger UI available at http://{}/swagger-ui", bind_address);
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
