use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::approval::ApprovalService;
use crate::auth::{JwtService, SessionRegistry};
use crate::core::{Config, ServerError};
use crate::db::DocStore;
use crate::profile::{ProfileCache, ProfileResolver};
use crate::registration::RegistrationService;

/// Shared handles for request handlers. Cloning is cheap.
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub store: DocStore,
    pub approvals: ApprovalService,
    pub registrations: RegistrationService,
    pub profiles: ProfileResolver,
    pub sessions: SessionRegistry,
    pub jwt_service: Arc<JwtService>,
    pub shutdown: CancellationToken,
}

impl ServerState {
    /// Open the store under the configured path and wire the services
    pub fn initialize(config: &Config) -> Result<Self, ServerError> {
        let path = config.store_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = DocStore::open(&path)?.with_max_attempts(config.txn_max_attempts);
        tracing::info!(path = %path.display(), "Document store opened");
        Ok(Self::with_store(config.clone(), store))
    }

    /// Wire the services around an existing store
    pub fn with_store(config: Config, store: DocStore) -> Self {
        let sessions = SessionRegistry::new();
        let cache = ProfileCache::new(config.profile_cache_ttl());
        cache.attach(&store);
        let profiles = ProfileResolver::new(Arc::new(store.clone()), Arc::new(sessions.clone()), cache);
        let jwt_service = Arc::new(JwtService::with_config(config.jwt.clone()));

        Self {
            approvals: ApprovalService::new(store.clone()),
            registrations: RegistrationService::new(store.clone()),
            profiles,
            sessions,
            jwt_service,
            store,
            config,
            shutdown: CancellationToken::new(),
        }
    }
}
