use crate::activity::ActivityLogger;
use crate::api::{CompletionService, OpenAICompatibleProvider};
use crate::chat::{ChatSession, GenerationSettings};
use crate::config::{self, AppConfig};
use crate::profile::ProfileManager;
use crate::schedule::ScheduleGenerator;
use crate::storage::StorageManager;
use anyhow::Context;
use std::sync::Arc;

// Core application state handed to every command
#[derive(Clone)]
pub struct AppState {
    pub storage: StorageManager,
    pub profiles: ProfileManager,
    pub chat: ChatSession,
    pub schedules: ScheduleGenerator,
    pub activity: ActivityLogger,
}

impl AppState {
    pub fn new(
        storage: StorageManager,
        api_provider: Arc<dyn CompletionService>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            profiles: ProfileManager::new(storage.clone()),
            chat: ChatSession::new(storage.clone(), api_provider.clone(), settings.clone()),
            schedules: ScheduleGenerator::new(storage.clone(), api_provider, settings),
            activity: ActivityLogger::new(storage.clone()),
            storage,
        }
    }

    /// Resolves the credential, opens the database and builds the
    /// completion client. Called once at startup.
    pub async fn initialize(config: &AppConfig) -> anyhow::Result<Self> {
        let api_key = config::get_api_key(&config.completion)
            .context("Completion service credential is not configured")?;
        let storage = StorageManager::open(&config.database_path).await?;

        let provider = OpenAICompatibleProvider::new(
            config.completion.api_url.as_str(),
            api_key,
            config.completion.model.as_str(),
        );
        log::info!("Using completion model {}", provider.model());

        let api_provider: Arc<dyn CompletionService> = Arc::new(provider);
        Ok(Self::new(
            storage,
            api_provider,
            GenerationSettings::from(&config.completion),
        ))
    }
}
