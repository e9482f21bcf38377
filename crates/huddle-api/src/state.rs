//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! Services are generic over repository/storage/credential traits, but AppState
//! pins them to the concrete infra implementations.

use std::path::PathBuf;
use std::sync::Arc;

use huddle_core::live::router::PresenceRouter;
use huddle_core::service::account::AccountService;
use huddle_core::service::conversation::ConversationManager;
use huddle_core::service::media::MediaService;
use huddle_infra::config::{load_config, media_dir, resolve_data_dir, staging_dir};
use huddle_infra::crypto::credentials::Argon2Credentials;
use huddle_infra::sqlite::chat::SqliteChatRepository;
use huddle_infra::sqlite::pool::{DatabasePool, database_url};
use huddle_infra::sqlite::token::SqliteTokenRepository;
use huddle_infra::sqlite::user::SqliteUserRepository;
use huddle_infra::storage::local::LocalObjectStore;
use huddle_types::config::ServerConfig;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteConversationManager =
    ConversationManager<SqliteChatRepository, SqliteUserRepository, LocalObjectStore>;

pub type ConcreteAccountService = AccountService<
    SqliteUserRepository,
    SqliteTokenRepository,
    LocalObjectStore,
    Argon2Credentials,
>;

/// Command-line overrides applied on top of `config.toml`.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub conversations: Arc<ConcreteConversationManager>,
    pub accounts: Arc<ConcreteAccountService>,
    pub presence: Arc<PresenceRouter>,
    pub users: SqliteUserRepository,
    pub chats: SqliteChatRepository,
    pub config: Arc<ServerConfig>,
    pub data_dir: PathBuf,
    pub media_dir: PathBuf,
    pub staging_dir: PathBuf,
}

impl AppState {
    /// Initialize the application state: load config, connect to DB, wire services.
    pub async fn init(overrides: ConfigOverrides) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let mut config = load_config(&data_dir).await;
        if let Some(host) = overrides.host {
            config.host = host;
        }
        if let Some(port) = overrides.port {
            config.port = port;
        }

        let media_dir = media_dir(&data_dir);
        let staging_dir = staging_dir(&data_dir);
        tokio::fs::create_dir_all(&media_dir).await?;
        tokio::fs::create_dir_all(&staging_dir).await?;

        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;

        let users = SqliteUserRepository::new(db_pool.clone());
        let chats = SqliteChatRepository::new(db_pool.clone());
        let tokens = SqliteTokenRepository::new(db_pool.clone());
        let store = LocalObjectStore::new(media_dir.clone(), config.base_url());
        let presence = Arc::new(PresenceRouter::new(config.live_channel_capacity));

        let conversations = ConversationManager::new(
            chats.clone(),
            users.clone(),
            MediaService::new(store.clone(), config.max_image_bytes),
            presence.clone(),
            config.default_group_photo.clone(),
        );

        let accounts = AccountService::new(
            users.clone(),
            tokens,
            MediaService::new(store, config.max_image_bytes),
            Argon2Credentials::new(),
            chrono::Duration::days(config.token_ttl_days),
            config.default_profile_photo.clone(),
        );

        tracing::debug!(data_dir = %data_dir.display(), "application state initialized");

        Ok(Self {
            conversations: Arc::new(conversations),
            accounts: Arc::new(accounts),
            presence,
            users,
            chats,
            config: Arc::new(config),
            data_dir,
            media_dir,
            staging_dir,
        })
    }
}
