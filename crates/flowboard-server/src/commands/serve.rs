use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::HeaderName;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use flowboard::gateway::GatewayClient;
use flowboard::tasks::PgTaskStore;

use crate::auth::AuthVerifier;
use crate::configuration;
use crate::routes;
use crate::state::AppState;

const GATEWAY_DEFAULT_URL: &str = "https://api.openai.com";
const GATEWAY_DEFAULT_MODEL: &str = "gpt-4o-mini";

pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let _guard = crate::logging::setup_logging("flowboardd")?;

    info!("starting flowboardd");

    let settings = configuration::Settings::new()?;
    info!("configuration loaded: {:?}", settings);

    // The gateway key may legitimately be absent in a fresh deployment; the
    // chat route reports it per request instead of failing the boot.
    let gateway = match std::env::var("GATEWAY_API_KEY") {
        Ok(api_key) => {
            let base_url = std::env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| GATEWAY_DEFAULT_URL.to_string());
            let model = std::env::var("GATEWAY_MODEL")
                .unwrap_or_else(|_| GATEWAY_DEFAULT_MODEL.to_string());
            Some(GatewayClient::new(&base_url, api_key, model)?)
        }
        Err(_) => {
            tracing::warn!("GATEWAY_API_KEY not set; chat requests will fail");
            None
        }
    };

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let store = PgTaskStore::connect(&database_url).await?;
    store.migrate().await?;
    info!("task store ready");

    let auth_base_url =
        std::env::var("AUTH_BASE_URL").context("AUTH_BASE_URL must be set")?;
    let auth_key = std::env::var("AUTH_PUBLISHABLE_KEY")
        .context("AUTH_PUBLISHABLE_KEY must be set")?;
    let verifier = AuthVerifier::new(auth_base_url, auth_key);

    let state = AppState::new(gateway, Arc::new(store), verifier);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            HeaderName::from_static("authorization"),
            HeaderName::from_static("content-type"),
            HeaderName::from_static("apikey"),
            HeaderName::from_static("x-client-info"),
        ]);

    let app = routes::configure(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(settings.socket_addr()).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
