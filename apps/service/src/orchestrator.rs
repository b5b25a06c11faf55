/// Orchestrator - builds the monitoring components from a loaded configuration
///
/// There is exactly one registry, one tracker and one dispatcher per process.
/// They are created here and handed to the scheduler explicitly.
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::alert::{AlertDispatcher, SmsTransport, TwilioTransport};
use crate::config::Config;
use crate::monitoring::tracker::AlertPolicy;
use crate::monitoring::{ProbeExecutor, ProbeResult, Scheduler, ServiceProbe, StatusTracker};
use crate::registry::{Service, ServiceRegistry};

pub struct Orchestrator {
    registry: Arc<ServiceRegistry>,
    tracker: Arc<StatusTracker>,
    scheduler: Scheduler,
}

impl Orchestrator {
    /// Wire the engine with the real probes and the Twilio transport
    pub fn new(config: &Config) -> Result<Self> {
        let registry = Arc::new(
            ServiceRegistry::from_entries(&config.servers).context("invalid server configuration")?,
        );
        let probe: Arc<dyn ServiceProbe> =
            Arc::new(ProbeExecutor::new().context("failed to build HTTP client")?);
        let transport: Arc<dyn SmsTransport> = Arc::new(
            TwilioTransport::new(&config.twilio, config.general.timeout())
                .context("failed to build Twilio client")?,
        );

        Ok(Self::with_parts(config, registry, probe, transport))
    }

    /// Wire the engine around caller-supplied probe and transport
    pub fn with_parts(
        config: &Config,
        registry: Arc<ServiceRegistry>,
        probe: Arc<dyn ServiceProbe>,
        transport: Arc<dyn SmsTransport>,
    ) -> Self {
        let policy = AlertPolicy::from(&config.general);
        let tracker = Arc::new(StatusTracker::new(registry.clone(), policy));
        let dispatcher = Arc::new(AlertDispatcher::new(transport));
        let scheduler = Scheduler::new(
            registry.clone(),
            probe,
            tracker.clone(),
            dispatcher,
            config.general.interval(),
            config.general.timeout(),
        );

        Self { registry, tracker, scheduler }
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn tracker(&self) -> &Arc<StatusTracker> {
        &self.tracker
    }

    /// Monitor until shutdown is requested
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        info!("Monitoring {} services", self.registry.len());
        self.scheduler.run(shutdown).await?;
        info!("Monitoring stopped");
        Ok(())
    }

    /// One round of checks with no state changes and no alerts
    pub async fn check_once(&self) -> Vec<(Arc<Service>, ProbeResult)> {
        self.scheduler.probe_all().await
    }
}
