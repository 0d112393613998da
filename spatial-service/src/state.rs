//! Application state for the spatial service.

use std::sync::Arc;
use std::time::Duration;

use common::config::{AppConfig, DatabaseSource};
use common::errors::AppResult;

use crate::connection_manager::{ConnectionManager, ExpiryPolicy, Provisioner};
use crate::executor::{QueryExecutor, SqlExecutor};
use crate::lakebase::LakebaseProvisioner;
use crate::postgres::StaticProvisioner;
use crate::service::SpatialService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub executor: Arc<dyn QueryExecutor>,
}

impl AppState {
    /// Builds the state with an executor for the configured database source.
    ///
    /// No connection is opened here; the first query does that.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
        let executor = match &config.database {
            DatabaseSource::Url(url) => {
                shared_executor(&config, StaticProvisioner::from_url(url, connect_timeout)?)
            }
            DatabaseSource::Lakebase(settings) => {
                shared_executor(&config, LakebaseProvisioner::new(settings.clone(), connect_timeout)?)
            }
        };
        Ok(Self::with_executor(config, executor))
    }

    pub fn with_executor(config: AppConfig, executor: Arc<dyn QueryExecutor>) -> Self {
        Self { config, executor }
    }

    pub fn spatial_service(&self) -> SpatialService {
        SpatialService::new(
            self.executor.clone(),
            self.config.spatial_schema.clone(),
            self.config.strict_identifiers,
        )
    }
}

fn shared_executor<P: Provisioner>(config: &AppConfig, provisioner: P) -> Arc<dyn QueryExecutor> {
    let policy = ExpiryPolicy::new(Duration::from_secs(config.connection_ttl_secs));
    let manager = ConnectionManager::new(provisioner, policy);
    Arc::new(SqlExecutor::new(manager, Duration::from_secs(config.query_timeout_secs)))
}
