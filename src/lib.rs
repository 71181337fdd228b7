use crate::openai::fake::FakeDispatcher;
use crate::openai::real::HttpDispatcher;
use crate::openai::service::AiService;
use crate::openai::Dispatcher;
use crate::settings::SqliteSettingsStore;
use anyhow::Result;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use rusqlite_migration::{Migrations, M};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing::instrument;

pub mod ai_config;
pub mod app;
pub mod cli;
pub mod openai;
pub mod prompts;
pub mod settings;
pub mod time_util;

pub mod test_utils;

// Define the AppState struct for both main app and testing
pub struct AppState {
    pub db: Pool<SqliteConnectionManager>,
    pub settings: Arc<SqliteSettingsStore>,
    pub ai: AiService,
    pub timezone: chrono_tz::Tz,
    // Keeps the test database alive until the state is dropped
    #[allow(dead_code)]
    temp_db_path: Option<tempfile::NamedTempFile>,
}

impl AppState {
    pub fn new_for_testing() -> Self {
        Self::new_for_testing_with_dispatcher(Arc::new(FakeDispatcher::new()))
    }

    // Create a new AppState for testing backed by a temporary database
    pub fn new_for_testing_with_dispatcher(
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        let temp_db_file = tempfile::NamedTempFile::new()
            .expect("Failed to create temporary database file");
        let db_path = temp_db_file
            .path()
            .to_str()
            .expect("Failed to get database temp file path")
            .to_string();

        let pool = create_pool(&db_path).expect("Failed to create pool");
        let mut conn = pool.get().expect("Failed to get connection");
        init_db(&mut conn).expect("Failed to initialize database");
        drop(conn);

        // Use Adelaide timezone for tests because it is an odd timezone,
        // being offset from UTC by 9.5 hours
        let timezone = chrono_tz::Australia::Adelaide;
        let settings = Arc::new(SqliteSettingsStore::new(pool.clone()));
        let ai = AiService::new(settings.clone(), dispatcher, timezone);

        Self {
            db: pool,
            settings,
            ai,
            timezone,
            temp_db_path: Some(temp_db_file),
        }
    }
}

// Create a config struct to hold AppState configuration
pub struct AppConfig {
    pub pool: Pool<SqliteConnectionManager>,
    pub connect_timeout: Duration,
    pub timezone_str: Option<String>,
}

// Function to create AppState from parameters
pub fn create_app_state(config: AppConfig) -> Result<Arc<AppState>> {
    let timezone =
        time_util::get_local_timezone(config.timezone_str.as_deref());

    let dispatcher = HttpDispatcher::new(config.connect_timeout)?;
    let settings = Arc::new(SqliteSettingsStore::new(config.pool.clone()));
    let ai = AiService::new(settings.clone(), Arc::new(dispatcher), timezone);

    Ok(Arc::new(AppState {
        db: config.pool,
        settings,
        ai,
        timezone,
        temp_db_path: None,
    }))
}

/// Applied to every pooled connection on checkout.
#[derive(Debug)]
struct ConnectionTuner {
    busy_timeout: Duration,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error>
    for ConnectionTuner
{
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        conn.busy_timeout(self.busy_timeout)
    }
}

pub fn create_pool(path: &str) -> Result<Pool<SqliteConnectionManager>> {
    let manager = SqliteConnectionManager::file(path);
    let pool = Pool::builder()
        .connection_customizer(Box::new(ConnectionTuner {
            busy_timeout: Duration::from_secs(5),
        }))
        .build(manager)?;
    Ok(pool)
}

fn migration_steps() -> Vec<M<'static>> {
    vec![M::up(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL       -- Unix timestamp of last write
        );

        CREATE TABLE IF NOT EXISTS ai_config (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            introduce_text TEXT NOT NULL,
            prompt_template TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        "#,
    )]
}

// Database initialization
#[instrument(skip(conn))]
pub fn init_db(conn: &mut Connection) -> Result<()> {
    info!("Initializing ai_relay database");
    conn.pragma_update(None, "journal_mode", "WAL")?;

    let migrations = Migrations::new(migration_steps());
    migrations.to_latest(conn)?;

    Ok(())
}
