//! CLI runner - executes discovery or sync

use crate::auth::{CachedToken, OAuthAuthenticator, OAuthConfig};
use crate::catalog::Catalog;
use crate::cli::commands::Cli;
use crate::config::{ConfigStore, TapConfig};
use crate::engine::{SyncEngine, SyncStats};
use crate::error::Result;
use crate::http::HttpClient;
use crate::output::MessageWriter;
use crate::state::StateManager;
use crate::streams::StreamRegistry;
use std::sync::Arc;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the requested mode
    pub async fn run(&self) -> Result<()> {
        let store = Arc::new(ConfigStore::load(&self.cli.config)?);
        let config = store.config()?;
        let registry = StreamRegistry::lightspeed()?;

        if self.cli.discover {
            return self.discover(&registry);
        }

        self.sync(store, config, registry).await?;
        Ok(())
    }

    /// Write the catalog to stdout
    fn discover(&self, registry: &StreamRegistry) -> Result<()> {
        let catalog = Catalog::discover(registry);
        let mut writer = MessageWriter::stdout();
        writer.write_catalog(&catalog)?;
        info!("Discovered {} streams", catalog.streams.len());
        Ok(())
    }

    /// Sync the selected streams to stdout
    async fn sync(
        &self,
        store: Arc<ConfigStore>,
        config: TapConfig,
        registry: StreamRegistry,
    ) -> Result<SyncStats> {
        let catalog = match &self.cli.catalog {
            Some(path) => Catalog::from_file(path)?,
            None => {
                info!("No catalog given, syncing every stream");
                Catalog::discover(&registry)
            }
        };

        let state = match &self.cli.state {
            Some(path) => StateManager::from_file(path)?,
            None => StateManager::in_memory(),
        };

        let client = build_client(store, &config).await;
        let mut engine = SyncEngine::new(
            client,
            registry,
            catalog,
            config,
            state,
            MessageWriter::stdout(),
        );
        engine.run().await
    }
}

/// HTTP client authenticated with the config's OAuth2 credentials
///
/// A still-valid `access_token` from the config is reused; every refreshed
/// token is written back through `store`.
pub async fn build_client(store: Arc<ConfigStore>, config: &TapConfig) -> HttpClient {
    let authenticator = OAuthAuthenticator::new(OAuthConfig::from(config)).with_observer(store);
    if let Some((token, expires_at)) = config.seeded_token() {
        authenticator
            .seed(CachedToken::new(token, Some(expires_at)))
            .await;
    }

    HttpClient::with_config(config.http_client_config())
        .with_authenticator(Arc::new(authenticator))
}
