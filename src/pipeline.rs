//! Pipeline wiring.
//!
//! page source -> ConversationMonitor -> ThoughtFilter -> SyncClient -> service
//! service -> SyncClient -> DedupInjector -> InsightSink
//!
//! The monitor, the sync client and the injector each run in their own task.
//! They share the state store and talk through the sync handle and the
//! insight channel.

use std::sync::Arc;
use thoughtlink_adapters::AdapterRegistry;
use thoughtlink_core::Result;
use thoughtlink_monitor::{
    run_injector, AgentSettings, ConversationMonitor, DedupInjector, InsightSink, MonitorStats, PageSubscription,
};
use thoughtlink_store::StateStore;
use thoughtlink_sync::{CollectiveTransport, SyncClient, SyncHandle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const INSIGHT_BUFFER: usize = 64;

/// Everything a pipeline needs that outlives one run.
pub struct Pipeline {
    settings: AgentSettings,
    store: Arc<StateStore>,
    registry: Arc<AdapterRegistry>,
}

impl Pipeline {
    /// Open the on-disk store named by the settings.
    pub fn new(settings: AgentSettings) -> Result<Self> {
        let store = Arc::new(StateStore::open(&settings.paths.state_dir));
        Self::with_store(settings, store)
    }

    pub fn with_store(settings: AgentSettings, store: Arc<StateStore>) -> Result<Self> {
        Ok(Self {
            settings,
            store,
            registry: Arc::new(AdapterRegistry::with_defaults()?),
        })
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    /// Spawn the sync client, the injector and the monitor.
    pub fn start<S>(
        &self,
        transport: Arc<dyn CollectiveTransport>,
        subscription: PageSubscription,
        sink: S,
    ) -> Result<RunningPipeline>
    where
        S: InsightSink + 'static,
    {
        let (insight_tx, insight_rx) = mpsc::channel(INSIGHT_BUFFER);
        let (client, sync) = SyncClient::new(
            transport.clone(),
            self.store.clone(),
            self.settings.sync_config(),
            self.settings.backoff.clone(),
            insight_tx,
        );
        let monitor = ConversationMonitor::new(
            self.registry.clone(),
            self.store.clone(),
            Arc::new(sync.clone()),
            self.settings.monitor_config(),
        )?;

        info!(
            "Starting pipeline: transport={}, queue={}, level={}",
            transport.name(),
            self.store.queue_len(),
            self.store.config().contribution_level.get()
        );

        let page_cancel = subscription.cancel.clone();
        let injector_cancel = CancellationToken::new();
        let client_task = tokio::spawn(client.run());
        let injector_task = tokio::spawn(run_injector(insight_rx, DedupInjector::new(sink), injector_cancel.clone()));
        let monitor_task = tokio::spawn(monitor.run(subscription));

        Ok(RunningPipeline {
            sync,
            store: self.store.clone(),
            page_cancel,
            injector_cancel,
            monitor_task,
            client_task,
            injector_task,
        })
    }
}

/// Final counters of a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub monitor: MonitorStats,
    pub insights_injected: usize,
    /// Records still waiting for acknowledgement. They survive in the store.
    pub queue_remaining: usize,
}

pub struct RunningPipeline {
    sync: SyncHandle,
    store: Arc<StateStore>,
    page_cancel: CancellationToken,
    injector_cancel: CancellationToken,
    monitor_task: JoinHandle<MonitorStats>,
    client_task: JoinHandle<()>,
    injector_task: JoinHandle<usize>,
}

impl RunningPipeline {
    pub fn sync(&self) -> &SyncHandle {
        &self.sync
    }

    /// Stop in pipeline order: page source first, then delivery, then the
    /// injector once the insight channel has drained.
    pub async fn shutdown(self) -> PipelineReport {
        self.page_cancel.cancel();
        let monitor = match self.monitor_task.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Monitor task failed: {}", e);
                MonitorStats::default()
            }
        };

        self.sync.stop();
        if let Err(e) = self.client_task.await {
            warn!("Sync client task failed: {}", e);
        }

        // The client owned the only sender; the injector ends on its own once
        // buffered insights are delivered. The token covers a stuck sink.
        let injector_cancel = self.injector_cancel.clone();
        let insights_injected = match tokio::time::timeout(std::time::Duration::from_secs(5), self.injector_task).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                warn!("Injector task failed: {}", e);
                0
            }
            Err(_) => {
                injector_cancel.cancel();
                warn!("Injector did not drain in time");
                0
            }
        };

        let report = PipelineReport {
            monitor,
            insights_injected,
            queue_remaining: self.store.queue_len(),
        };
        info!("Pipeline stopped: {:?}", report);
        report
    }
}
