//! The console: every editor and session wired to one backend.
//!
//! A view constructs a [`Console`] once and drives its parts. All parts
//! share a single [`DirtyTracker`], each under its own source name, so
//! "unsaved changes" stays set until every part's edits are confirmed.

use std::sync::Arc;

use gateway_core::{BrowserTreeNode, ConsoleSettings, DirtyTracker};
use gateway_protocol::{GatewayInfo, PipelineMetrics, SystemHealth};
use tracing::{debug, info};

use crate::actions::{ActionError, GatewayActions};
use crate::browser::{AddOutcome, BrowseFailure, ResourceBrowser};
use crate::client::{paths, GatewayClient};
use crate::editor::{ModbusStore, NodeEditor, NodeStore, RegisterEditor};
use crate::notify::Notifier;
use crate::record::{EndpointStore, MqttSettingsEditor, PublishingModeEditor};
use crate::tail::TailSession;
use crate::transport::{HttpRemote, RemoteSync, TransportError};

/// Dashboard data fetched in one go.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub health: SystemHealth,
    pub metrics: PipelineMetrics,
    pub info: GatewayInfo,
}

pub struct Console {
    settings: ConsoleSettings,
    client: GatewayClient,
    dirty: DirtyTracker,
    registers: RegisterEditor,
    nodes: NodeEditor,
    publishing: PublishingModeEditor,
    mqtt: MqttSettingsEditor,
    browser: ResourceBrowser,
    tail: TailSession,
    actions: GatewayActions,
}

impl Console {
    /// Console over HTTP to `settings.base_url`.
    pub fn connect(
        settings: ConsoleSettings,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, TransportError> {
        let remote = HttpRemote::new(&settings)?;
        info!("Console using backend at {}", remote.base_url());
        Ok(Self::with_remote(settings, Arc::new(remote), notifier))
    }

    pub fn with_remote(
        settings: ConsoleSettings,
        remote: Arc<dyn RemoteSync>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let client = GatewayClient::new(remote);
        let dirty = DirtyTracker::new();
        let debounce = settings.debounce();

        let registers = RegisterEditor::new(
            "registers",
            ModbusStore::new(client.clone()),
            dirty.clone(),
            debounce,
        );
        let nodes = NodeEditor::new("nodes", NodeStore::new(client.clone()), dirty.clone(), debounce);
        let publishing = PublishingModeEditor::new(
            "publishing",
            EndpointStore::new(client.clone(), paths::OPCUA_PUBLISHING),
            dirty.clone(),
            debounce,
        );
        let mqtt = MqttSettingsEditor::new(
            "mqtt",
            EndpointStore::new(client.clone(), paths::MQTT_CONFIG),
            dirty.clone(),
            debounce,
        );
        let browser = ResourceBrowser::new(client.clone(), dirty.clone(), notifier.clone());
        let tail = TailSession::from_settings(client.clone(), notifier.clone(), &settings);
        let actions = GatewayActions::new(client.clone(), dirty.clone(), notifier);

        Self {
            settings,
            client,
            dirty,
            registers,
            nodes,
            publishing,
            mqtt,
            browser,
            tail,
            actions,
        }
    }

    pub fn settings(&self) -> &ConsoleSettings {
        &self.settings
    }

    pub fn client(&self) -> &GatewayClient {
        &self.client
    }

    pub fn dirty(&self) -> &DirtyTracker {
        &self.dirty
    }

    pub fn registers(&self) -> &RegisterEditor {
        &self.registers
    }

    pub fn nodes(&self) -> &NodeEditor {
        &self.nodes
    }

    pub fn publishing(&self) -> &PublishingModeEditor {
        &self.publishing
    }

    pub fn mqtt(&self) -> &MqttSettingsEditor {
        &self.mqtt
    }

    pub fn browser(&self) -> &ResourceBrowser {
        &self.browser
    }

    pub fn tail(&self) -> &TailSession {
        &self.tail
    }

    pub fn actions(&self) -> &GatewayActions {
        &self.actions
    }

    /// Load every editor from the backend.
    pub async fn load_all(&self) -> Result<(), TransportError> {
        let (registers, nodes, _, _) = futures::try_join!(
            self.registers.load(),
            self.nodes.load(),
            self.publishing.load(),
            self.mqtt.load(),
        )?;
        debug!("Loaded {} registers and {} nodes", registers.len(), nodes.len());
        Ok(())
    }

    /// Browse from the configured root.
    pub async fn open_browser(&self) -> Result<Vec<BrowserTreeNode>, BrowseFailure> {
        self.browser.load_root(&self.settings.browse_root).await
    }

    /// Add the browser selection to the node list, then refresh the node
    /// editor so it reflects the stored list.
    pub async fn add_selected_node(&self) -> Result<AddOutcome, ActionError> {
        let outcome = self.browser.add_selected_to_collection().await?;
        if outcome == AddOutcome::Added {
            self.nodes.load().await?;
        }
        Ok(outcome)
    }

    /// Save every editor that has a debounced save pending.
    ///
    /// Returns whether all of those saves were accepted.
    pub async fn flush_all(&self) -> bool {
        let (registers, nodes, publishing, mqtt) = futures::join!(
            flush_or_idle(self.registers.has_pending_save(), self.registers.flush()),
            flush_or_idle(self.nodes.has_pending_save(), self.nodes.flush()),
            flush_or_idle(self.publishing.has_pending_save(), self.publishing.flush()),
            flush_or_idle(self.mqtt.has_pending_save(), self.mqtt.flush()),
        );
        registers && nodes && publishing && mqtt
    }

    /// Flush pending saves and stop the tail.
    pub async fn shutdown(&self) {
        self.flush_all().await;
        self.tail.stop().await;
        info!("Console shut down");
    }

    pub async fn dashboard(&self) -> Result<DashboardSnapshot, TransportError> {
        let (health, metrics, info) = futures::try_join!(
            self.client.health(),
            self.client.pipeline_metrics(),
            self.client.gateway_info(),
        )?;
        Ok(DashboardSnapshot {
            health,
            metrics,
            info,
        })
    }
}

/// `flush()` result, or `true` when there was nothing to flush.
async fn flush_or_idle(pending: bool, flush: impl std::future::Future<Output = bool>) -> bool {
    if pending {
        flush.await
    } else {
        true
    }
}
