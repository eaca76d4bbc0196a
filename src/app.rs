//! App Core for pinmark.
//!
//! Owns the database, the settings engine and the service graph. The tag
//! store is built first and handed to the API client; the graph is rebuilt
//! whenever a setting changes so the new values apply to the next call.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use crate::database::connection::Database;
use crate::managers::kv_store::SqliteKeyValueStore;
use crate::managers::recent_tag_memory::SqliteRecentTagMemory;
use crate::managers::tag_store::TagStore;
use crate::services::credentials::TokenCredentials;
use crate::services::http_transport::{HttpTransport, ReqwestTransport};
use crate::services::pinboard_client::PinboardClient;
use crate::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use crate::types::errors::SettingsError;
use crate::types::settings::PinmarkSettings;

/// The services built from one settings snapshot.
pub struct Services {
    pub tag_store: Arc<TagStore>,
    pub client: Arc<PinboardClient>,
    pub settings: PinmarkSettings,
}

/// Central application struct.
pub struct App {
    pub db: Arc<Database>,
    transport: Arc<dyn HttpTransport>,
    settings_engine: Mutex<SettingsEngine>,
    services: RwLock<Arc<Services>>,
}

impl App {
    /// Opens the database at `db_path`, loads settings from `settings_path`
    /// (or the platform default) and wires the services.
    pub fn new(db_path: &str, settings_path: Option<String>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut settings_engine = SettingsEngine::new(settings_path);
        let settings = settings_engine.load()?;

        let db = Arc::new(Database::open(db_path)?);
        let transport = Arc::new(ReqwestTransport::new(Duration::from_secs(
            settings.api.request_timeout_secs,
        ))?);

        Ok(Self::with_transport(db, settings_engine, transport))
    }

    /// Wires the services over an existing database and transport.
    pub fn with_transport(
        db: Arc<Database>,
        settings_engine: SettingsEngine,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let services = Self::build_services(&db, &transport, settings_engine.get_settings().clone());
        tracing::info!(config = %settings_engine.get_config_path(), "app_initialized");

        Self {
            db,
            transport,
            settings_engine: Mutex::new(settings_engine),
            services: RwLock::new(Arc::new(services)),
        }
    }

    fn build_services(
        db: &Arc<Database>,
        transport: &Arc<dyn HttpTransport>,
        settings: PinmarkSettings,
    ) -> Services {
        let tag_store = Arc::new(TagStore::new(
            Arc::new(SqliteKeyValueStore::new(db.clone())),
            Arc::new(SqliteRecentTagMemory::new(db.clone())),
            settings.tags.clone(),
        ));

        let client = Arc::new(PinboardClient::new(
            transport.clone(),
            Arc::new(TokenCredentials::from_settings(&settings.api)),
            tag_store.clone(),
            settings.clone(),
        ));

        Services {
            tag_store,
            client,
            settings,
        }
    }

    /// The current service graph.
    pub fn services(&self) -> Arc<Services> {
        self.services
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn settings(&self) -> PinmarkSettings {
        self.services().settings.clone()
    }

    /// Applies one dot-path setting, persists it and rebuilds the services.
    pub fn update_setting(&self, key: &str, value: serde_json::Value) -> Result<PinmarkSettings, SettingsError> {
        let settings = {
            let mut engine = self
                .settings_engine
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            engine.set_value(key, value)?;
            engine.get_settings().clone()
        };

        let services = Self::build_services(&self.db, &self.transport, settings.clone());
        *self
            .services
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(services);
        Ok(settings)
    }
}
