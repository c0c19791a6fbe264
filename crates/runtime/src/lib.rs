use std::time::Duration;

use anyhow::{ensure, Context, Result};
use beacon_auth::Authenticator;
use beacon_config::AppConfig;
use beacon_hub::{Hub, HubHandle};
use tokio::task::JoinHandle;
use tracing::info;

/// How often expired sessions are swept from the authenticator.
pub const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60);

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::TRACE)
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// The running hub plus the authenticator that guards it.
pub struct HubServices {
    pub hub: HubHandle,
    pub authenticator: Authenticator,
    hub_task: JoinHandle<()>,
    purge_task: JoinHandle<()>,
}

impl HubServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        ensure!(
            config.hub.heartbeat_interval_ms > 0,
            "hub.heartbeat_interval_ms must be greater than zero"
        );

        let authenticator = Authenticator::new(config.auth.clone());
        let (hub, hub_task) = Hub::new(config.hub.clone()).spawn();
        let purge_task = tokio::spawn(purge_sessions(authenticator.clone()));

        info!(
            heartbeat_ms = config.hub.heartbeat_interval_ms,
            max_clients = config.hub.max_clients,
            static_tokens = config.auth.static_tokens.len(),
            "hub services ready"
        );

        Ok(Self {
            hub,
            authenticator,
            hub_task,
            purge_task,
        })
    }

    /// Close every connection and wait for the hub task to finish.
    pub async fn shutdown(self) -> Result<()> {
        self.hub.close().await;
        self.purge_task.abort();
        self.hub_task.await.context("hub task failed")?;
        info!("hub services stopped");
        Ok(())
    }
}

async fn purge_sessions(authenticator: Authenticator) {
    let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
    interval.tick().await;
    loop {
        interval.tick().await;
        authenticator.purge_expired().await;
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
