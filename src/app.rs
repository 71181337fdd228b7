use crate::ai_config::{self, ConfigRecord};
use crate::cli::CommonArgs;
use crate::openai::AiError;
use crate::settings::{mask_secret, SettingsProvider, AI_SETTING_KEYS};
use crate::settings::{API_KEY, BASE_URL, MODEL};
use crate::AppState;
use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{prelude::*, Registry};
use tracing_tree::HierarchicalLayer;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Port to listen on
    #[arg(long, default_value_t = 3010)]
    port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigUpdate {
    pub introduce_text: String,
    pub prompt_template: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SettingUpdate {
    pub value: String,
}

/// Current AI settings, with the API key masked.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SettingsResponse {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

fn internal_error(e: impl std::fmt::Display) -> (StatusCode, String) {
    error!("Internal error: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// HTTP status reported to our own callers for an adapter failure.
pub fn ai_error_status(e: &AiError) -> StatusCode {
    match e {
        AiError::MissingSetting(_) | AiError::InvalidEndpoint { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        AiError::Settings(_) => StatusCode::INTERNAL_SERVER_ERROR,
        AiError::Transport { .. } => StatusCode::GATEWAY_TIMEOUT,
        AiError::Api { .. } | AiError::Parse { .. } => StatusCode::BAD_GATEWAY,
    }
}

// Health check endpoint
#[instrument]
pub async fn health_check() -> &'static str {
    debug!("Health check requested");
    "OK"
}

#[instrument(skip(state, request))]
async fn post_chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    if request.content.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "content is empty".to_string()));
    }

    let reply = state
        .ai
        .send_request(&request.content)
        .await
        .map_err(|e| (ai_error_status(&e), e.to_string()))?;

    Ok(Json(ChatResponse { reply }))
}

async fn get_latest_config(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ConfigRecord>, (StatusCode, String)> {
    let mut conn = state.db.get().map_err(internal_error)?;
    let record = ai_config::get_latest(&mut conn).map_err(internal_error)?;
    Ok(Json(record))
}

async fn get_all_configs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ConfigRecord>>, (StatusCode, String)> {
    let conn = state.db.get().map_err(internal_error)?;
    let records = ai_config::get_all(&conn).map_err(internal_error)?;
    Ok(Json(records))
}

async fn get_config_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ConfigRecord>, (StatusCode, String)> {
    let conn = state.db.get().map_err(internal_error)?;
    ai_config::get_by_id(&conn, id)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| {
            (StatusCode::NOT_FOUND, format!("AI config {} not found", id))
        })
}

async fn put_config(
    State(state): State<Arc<AppState>>,
    Json(update): Json<ConfigUpdate>,
) -> Result<Json<ConfigRecord>, (StatusCode, String)> {
    let mut conn = state.db.get().map_err(internal_error)?;
    let record = ai_config::upsert(
        &mut conn,
        &update.introduce_text,
        &update.prompt_template,
    )
    .map_err(internal_error)?;
    Ok(Json(record))
}

async fn delete_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteResponse>, (StatusCode, String)> {
    let conn = state.db.get().map_err(internal_error)?;
    let deleted = ai_config::delete_by_id(&conn, id).map_err(internal_error)?;
    Ok(Json(DeleteResponse { deleted }))
}

async fn get_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SettingsResponse>, (StatusCode, String)> {
    let read = |key: &str| state.settings.get(key).map_err(internal_error);
    Ok(Json(SettingsResponse {
        base_url: read(BASE_URL)?,
        api_key: read(API_KEY)?.map(|key| mask_secret(&key)),
        model: read(MODEL)?,
    }))
}

#[instrument(skip(state, update))]
async fn put_setting(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(update): Json<SettingUpdate>,
) -> Result<StatusCode, (StatusCode, String)> {
    if !AI_SETTING_KEYS.contains(&key.as_str()) {
        return Err((
            StatusCode::BAD_REQUEST,
            format!(
                "Unknown setting '{}', expected one of {}",
                key,
                AI_SETTING_KEYS.join(", ")
            ),
        ));
    }
    state
        .settings
        .set(&key, update.value.trim())
        .map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/ai/chat", post(post_chat))
        .route("/api/ai/config", get(get_latest_config).put(put_config))
        .route("/api/ai/config/all", get(get_all_configs))
        .route(
            "/api/ai/config/{id}",
            get(get_config_by_id).delete(delete_config),
        )
        .route("/api/settings", get(get_settings))
        .route("/api/settings/{key}", put(put_setting))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[instrument(level = "debug")]
fn check_db_directory(path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(anyhow::anyhow!(
                "Directory for database at '{}' does not exist. \
                 Please create it manually.",
                parent.display()
            ));
        }
    }
    Ok(())
}

pub async fn serve() -> Result<()> {
    // Initialize logging with tracing
    let subscriber = Registry::default()
        .with(
            HierarchicalLayer::new(2)
                .with_targets(true)
                .with_bracketed_fields(true),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        );

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    // Parse command line arguments
    let args = Args::parse();

    info!("Starting ai_relay service");

    check_db_directory(&args.common.db)?;
    let db_path = args.common.db.to_str().ok_or_else(|| {
        anyhow::anyhow!("Database path is not valid UTF-8")
    })?;
    let pool = crate::create_pool(db_path)?;
    {
        let mut conn = pool.get()?;
        crate::init_db(&mut conn)?;
        let record = ai_config::get_latest(&mut conn)?;
        info!("Active AI config id: {}", record.id);
    }

    let state = crate::create_app_state(crate::AppConfig {
        pool,
        connect_timeout: Duration::from_secs(args.common.connect_timeout_secs),
        timezone_str: args.common.timezone.clone(),
    })?;

    for (key, value) in args.common.setting_seeds() {
        state.settings.set(key, value.trim())?;
    }
    for key in AI_SETTING_KEYS {
        if state.settings.get(key)?.is_none() {
            warn!("Setting {} is not configured yet", key);
        }
    }

    let app = routes(state);
    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received CTRL-C, initiating shutdown");
            }
        })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
