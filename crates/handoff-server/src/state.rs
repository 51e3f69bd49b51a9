use anyhow::{Context, Result};
use handoff_core::{
    Application, BroadcastNotifier, CachedApplicationDirectory, Collaborators, FanoutNotifier,
    HandoffController, LauncherSessionStore, Notifier, ResolverSettings, SocialIdentityResolver,
    StorageApplicationDirectory, StorageAuthLog, StorageIdentityStore,
};
use handoff_providers::OAuthProfileExchanger;
use handoff_storage::{expiring_column_families, RocksDbStorage, Storage};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::centrifugo::CentrifugoNotifier;
use crate::config::Config;
use crate::hydra::HydraAdminClient;

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Application state shared across all handlers
pub struct AppState {
    pub config: Config,
    pub storage: Arc<RocksDbStorage>,
    pub controller: HandoffController<RocksDbStorage>,

    /// In-process channels backing the SSE endpoint
    pub events: Arc<BroadcastNotifier>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self> {
        let storage = Arc::new(RocksDbStorage::open(&config.database_path)?);

        let applications = Arc::new(StorageApplicationDirectory::new(Arc::clone(&storage)));
        if let Some(path) = &config.applications_file {
            seed_applications(&applications, path).await?;
        }
        let cached_applications = CachedApplicationDirectory::new(Arc::clone(&applications));
        cached_applications.watch(applications.subscribe_invalidations());

        let collaborators = Collaborators {
            authorization_server: Arc::new(HydraAdminClient::new(
                &config.auth_server_admin_url,
                config.auth_server_timeout,
            )?),
            applications: Arc::new(cached_applications),
            identities: Arc::new(StorageIdentityStore::new(Arc::clone(&storage))),
            auth_log: Arc::new(StorageAuthLog::new(Arc::clone(&storage))),
            provider_client: Arc::new(OAuthProfileExchanger::new(config.provider_timeout)?),
        };

        let events = Arc::new(BroadcastNotifier::new());
        let mut notifiers: Vec<Arc<dyn Notifier>> = vec![events.clone() as Arc<dyn Notifier>];
        if let Some(centrifugo) = &config.centrifugo {
            tracing::info!(addr = %centrifugo.addr, "Publishing launcher status to Centrifugo");
            notifiers.push(Arc::new(CentrifugoNotifier::new(centrifugo, PUBLISH_TIMEOUT)?));
        }

        let settings = ResolverSettings {
            exchange_timeout: config.provider_timeout,
            remember_for: config.remember_for,
            audit_failure_is_fatal: config.audit_failure_is_fatal,
        };

        Ok(Self::from_parts(
            config,
            storage,
            collaborators,
            settings,
            events,
            Arc::new(FanoutNotifier::new(notifiers)),
        ))
    }

    /// Wire the controller from already constructed collaborators
    pub fn from_parts(
        config: Config,
        storage: Arc<RocksDbStorage>,
        collaborators: Collaborators,
        settings: ResolverSettings,
        events: Arc<BroadcastNotifier>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let controller = HandoffController::new(
            LauncherSessionStore::new(Arc::clone(&storage)),
            SocialIdentityResolver::new(Arc::clone(&storage), collaborators, settings),
            notifier,
        );

        Self {
            config,
            storage,
            controller,
            events,
        }
    }

    /// Periodically remove expired sessions and tokens
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let storage = Arc::clone(&self.storage);
        let interval = self.config.sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                for cf in expiring_column_families() {
                    match storage.purge_expired(cf).await {
                        Ok(0) => {}
                        Ok(purged) => tracing::debug!(cf = cf, purged = purged, "Expired entries purged"),
                        Err(e) => tracing::warn!(cf = cf, error = %e, "Expired entry sweep failed"),
                    }
                }
            }
        })
    }
}

async fn seed_applications(
    directory: &StorageApplicationDirectory<RocksDbStorage>,
    path: &Path,
) -> Result<()> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let applications: Vec<Application> = serde_json::from_str(&contents)
        .with_context(|| format!("parsing {}", path.display()))?;

    for application in &applications {
        directory.save(application).await?;
    }

    tracing::info!(count = applications.len(), "Applications loaded");
    Ok(())
}
