//! Application state wiring the engine together.
//!
//! The core types are generic over repository traits; AppState pins them to
//! the SQLite implementations from tripwire-infra.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use secrecy::SecretString;
use tripwire_core::automation::collaborator::Collaborators;
use tripwire_core::automation::dispatcher::Dispatcher;
use tripwire_core::automation::engine::AutomationEngine;
use tripwire_core::automation::matcher::TriggerMatcher;
use tripwire_core::automation::registry::AgentRegistry;
use tripwire_infra::config::{load_config, resolve_data_dir, webhook_secret};
use tripwire_infra::outbound::build_collaborators;
use tripwire_infra::sqlite::agent::SqliteAgentRepository;
use tripwire_infra::sqlite::execution::SqliteExecutionRepository;
use tripwire_infra::sqlite::pool::DatabasePool;
use tripwire_infra::webhook::ingestor::{EventIngestor, IngestorSettings};
use tripwire_types::config::EngineConfig;

/// Concrete type aliases for the generics pinned to infra implementations.
pub type ConcreteRegistry = AgentRegistry<SqliteAgentRepository>;
pub type ConcreteEngine = AutomationEngine<SqliteAgentRepository, SqliteExecutionRepository>;
pub type ConcreteDispatcher = Dispatcher<SqliteAgentRepository, SqliteExecutionRepository>;

/// Shared application state.
///
/// Used by both CLI commands and REST handlers. The dispatcher starts out
/// inline; `serve` swaps in a queue-backed one.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ConcreteEngine>,
    pub dispatcher: Arc<ConcreteDispatcher>,
    pub ingestor: Arc<EventIngestor>,
    pub config: Arc<EngineConfig>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Resolve the data directory, load config, open the database, wire
    /// collaborators and load every agent.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        let config = load_config(&data_dir).await?;
        let collaborators = build_collaborators(&config)?;
        Self::build(&data_dir, config, collaborators, webhook_secret()).await
    }

    /// Wire state from explicit parts. Loading agents is fatal on failure.
    pub async fn build(
        data_dir: &Path,
        config: EngineConfig,
        collaborators: Collaborators,
        secret: Option<SecretString>,
    ) -> anyhow::Result<Self> {
        let db_pool = DatabasePool::open(data_dir).await?;

        let registry = Arc::new(AgentRegistry::new(
            SqliteAgentRepository::new(db_pool.clone()),
            TriggerMatcher::shared(),
        ));
        let loaded = registry.load().await?;
        tracing::info!(agents = loaded, data_dir = %data_dir.display(), "state initialized");

        let engine = Arc::new(AutomationEngine::new(
            registry,
            SqliteExecutionRepository::new(db_pool.clone()),
            collaborators,
        ));
        let ingestor = EventIngestor::new(IngestorSettings::from_config(&config.webhook, secret));

        Ok(Self {
            dispatcher: Arc::new(Dispatcher::inline(engine.clone())),
            engine,
            ingestor: Arc::new(ingestor),
            config: Arc::new(config),
            data_dir: data_dir.to_path_buf(),
            db_pool,
        })
    }

    pub fn registry(&self) -> &Arc<ConcreteRegistry> {
        self.engine.registry()
    }

    /// Replace the dispatcher, e.g. with one feeding a background queue.
    pub fn with_dispatcher(mut self, dispatcher: ConcreteDispatcher) -> Self {
        self.dispatcher = Arc::new(dispatcher);
        self
    }
}
