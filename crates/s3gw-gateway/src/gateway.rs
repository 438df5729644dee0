//! Assembly of the running gateway from its configuration.

use std::sync::Arc;

use s3gw_authz::{KeySnapshot, PolicySnapshot, PolicySource, PolicyStore, RangerPolicyClient};
use tracing::info;

use crate::admin::{AdminClient, IdentitySource};
use crate::authorizer::RequestAuthorizer;
use crate::config::{GatewayConfig, GroupSource};
use crate::error::GatewayResult;
use crate::groups::{GroupResolver, NoGroups, SystemGroupResolver};
use crate::health::HealthChecker;
use crate::owner_cache::BucketOwnerCache;
use crate::refresher::BackgroundRefresher;
use crate::server::GatewayServer;
use crate::shutdown::ShutdownSignal;
use crate::tags::{S3TagClient, TagSource};

/// External sources the gateway reads trust data from.
pub struct Sources {
    /// Policy download source.
    pub policies: Arc<dyn PolicySource>,
    /// Access keys and bucket owners.
    pub identity: Arc<dyn IdentitySource>,
    /// Group memberships.
    pub groups: Arc<dyn GroupResolver>,
    /// Bucket tags, logged for authorized requests.
    pub tags: Option<Arc<dyn TagSource>>,
}

impl std::fmt::Debug for Sources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sources")
            .field("service", &self.policies.service_name())
            .field("tags", &self.tags.is_some())
            .finish_non_exhaustive()
    }
}

impl Sources {
    /// Network-backed sources described by `config`.
    pub fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        let policies: Arc<dyn PolicySource> =
            Arc::new(RangerPolicyClient::new(config.policy.client_config())?);
        let identity: Arc<dyn IdentitySource> = Arc::new(AdminClient::new(&config.identity)?);
        let groups: Arc<dyn GroupResolver> = match config.identity.group_source {
            GroupSource::System => Arc::new(SystemGroupResolver::default()),
            GroupSource::None => Arc::new(NoGroups),
        };
        let tags = if config.tags.enabled {
            let client: Arc<dyn TagSource> =
                Arc::new(S3TagClient::new(&config.tags, &config.server.backend_url)?);
            Some(client)
        } else {
            None
        };

        Ok(Self {
            policies,
            identity,
            groups,
            tags,
        })
    }
}

/// A fully wired gateway: server plus the refresher feeding its snapshots.
#[derive(Debug)]
pub struct Gateway {
    server: GatewayServer,
    refresher: BackgroundRefresher,
}

impl Gateway {
    /// Wire a gateway from configuration using network-backed sources.
    pub fn from_config(config: GatewayConfig) -> GatewayResult<Self> {
        let sources = Sources::from_config(&config)?;
        Self::with_sources(config, sources)
    }

    /// Wire a gateway from configuration and explicit sources.
    pub fn with_sources(config: GatewayConfig, sources: Sources) -> GatewayResult<Self> {
        let policies = Arc::new(PolicySnapshot::new(PolicyStore::empty(
            sources.policies.service_name(),
        )));
        let keys = Arc::new(KeySnapshot::default());

        let refresher = BackgroundRefresher::new(
            Arc::clone(&sources.policies),
            Arc::clone(&sources.identity),
            Arc::clone(&policies),
            Arc::clone(&keys),
            config.policy.refresh_interval,
        );

        let owners = Arc::new(BucketOwnerCache::new(
            Arc::clone(&sources.identity),
            config.identity.owner_cache_ttl,
        ));
        let mut authorizer =
            RequestAuthorizer::new(Arc::clone(&policies), Arc::clone(&keys), owners, sources.groups);
        if let Some(tags) = sources.tags {
            authorizer = authorizer.with_tags(tags);
        }

        let health = Arc::new(HealthChecker::new(policies, keys, refresher.state()));
        let server = GatewayServer::new(config, authorizer, health)?;

        Ok(Self { server, refresher })
    }

    /// Health checker of the wired server.
    pub fn health(&self) -> Arc<HealthChecker> {
        self.server.health()
    }

    /// Load trust data, start refreshing and serve on the configured address.
    pub async fn run(self, shutdown: ShutdownSignal) -> GatewayResult<()> {
        let listener = self.server.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Load trust data, start refreshing and serve on `listener`.
    ///
    /// Fails before accepting any connection if the initial load fails.
    pub async fn serve(
        self,
        listener: tokio::net::TcpListener,
        shutdown: ShutdownSignal,
    ) -> GatewayResult<()> {
        self.refresher.initial_load().await?;
        let refresh_task = self.refresher.spawn(shutdown.clone());

        let result = self.server.serve(listener, shutdown.clone()).await;

        shutdown.trigger();
        let _ = refresh_task.await;
        info!("Gateway stopped");
        result
    }
}
