//! User-initiated gateway actions.
//!
//! Unlike background saves, every action here reports its outcome to the
//! user through the [`Notifier`], including transport failures.

use std::sync::Arc;

use gateway_core::{DirtyTracker, ModbusConnection, MqttSettings};
use gateway_protocol::{AgentStatus, ApplyResult, OpcuaProbe, TestOutcome};
use thiserror::Error;
use tracing::info;

use crate::client::GatewayClient;
use crate::notify::{NoticeLevel, Notifier};
use crate::transport::TransportError;

/// Failure of a user-initiated action.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The backend answered `ok: false`.
    #[error("{0}")]
    Rejected(String),
}

/// Config deployment, agent lifecycle and connection tests.
#[derive(Clone)]
pub struct GatewayActions {
    client: GatewayClient,
    dirty: DirtyTracker,
    notifier: Arc<dyn Notifier>,
}

impl GatewayActions {
    pub fn new(client: GatewayClient, dirty: DirtyTracker, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            client,
            dirty,
            notifier,
        }
    }

    /// Render the agent config from the stored sections and restart the agent.
    ///
    /// A generated config counts as applied even if the restart failed; the
    /// user is warned in that case.
    pub async fn apply_config(&self) -> Result<ApplyResult, ActionError> {
        let result = match self.client.apply_config().await {
            Ok(result) => result,
            Err(e) => {
                self.notify(NoticeLevel::Danger, format!("Failed to generate config: {e}"));
                return Err(e.into());
            }
        };

        if !result.ok {
            self.notify(NoticeLevel::Danger, "Failed to generate config.".to_string());
            return Err(ActionError::Rejected(
                result
                    .error
                    .clone()
                    .unwrap_or_else(|| "config generation failed".to_string()),
            ));
        }

        if result.restart_ok() {
            self.notify(
                NoticeLevel::Success,
                "Config applied and Telegraf restarted successfully.".to_string(),
            );
        } else {
            self.notify(
                NoticeLevel::Warning,
                format!(
                    "Config generated but Telegraf restart failed: {}",
                    result.restart_error()
                ),
            );
        }
        self.dirty.mark_all_synced();
        info!("Config applied (restart ok: {})", result.restart_ok());
        Ok(result)
    }

    /// Rendered agent config as it would be written.
    pub async fn preview_config(&self) -> Result<String, ActionError> {
        match self.client.preview_config().await {
            Ok(preview) => Ok(preview.config),
            Err(e) => {
                self.notify(NoticeLevel::Danger, format!("Failed to load preview: {e}"));
                Err(e.into())
            }
        }
    }

    pub async fn start_agent(&self) -> Result<(), ActionError> {
        self.lifecycle("start", self.client.start_agent().await)
    }

    pub async fn stop_agent(&self) -> Result<(), ActionError> {
        self.lifecycle("stop", self.client.stop_agent().await)
    }

    /// Agent state; polled by views, so it never notifies.
    pub async fn agent_status(&self) -> Result<AgentStatus, ActionError> {
        Ok(self.client.agent_status().await?)
    }

    fn lifecycle(
        &self,
        verb: &str,
        result: Result<gateway_protocol::Ack, TransportError>,
    ) -> Result<(), ActionError> {
        match result {
            Ok(ack) if ack.ok => {
                info!("Agent {} requested", verb);
                self.notify(NoticeLevel::Success, format!("Telegraf {verb} requested."));
                Ok(())
            }
            Ok(ack) => {
                let reason = ack.reason();
                self.notify(
                    NoticeLevel::Danger,
                    format!("Failed to {verb} Telegraf: {reason}"),
                );
                Err(ActionError::Rejected(reason))
            }
            Err(e) => {
                self.notify(
                    NoticeLevel::Danger,
                    format!("Failed to {verb} Telegraf: {e}"),
                );
                Err(e.into())
            }
        }
    }

    // ========================================================================
    // Connection tests
    // ========================================================================

    /// Probe the Modbus controller with the given (possibly unsaved) settings.
    pub async fn test_modbus_connection(
        &self,
        connection: &ModbusConnection,
    ) -> Result<TestOutcome, ActionError> {
        self.report("Modbus", self.client.test_modbus(connection).await)
    }

    /// Probe the OPC UA server; `endpoint` overrides the stored one.
    pub async fn test_opcua_connection(
        &self,
        endpoint: Option<String>,
    ) -> Result<TestOutcome, ActionError> {
        let probe = OpcuaProbe { endpoint };
        self.report("OPC UA", self.client.test_opcua(&probe).await)
    }

    pub async fn test_mqtt_connection(
        &self,
        settings: &MqttSettings,
    ) -> Result<TestOutcome, ActionError> {
        self.report("MQTT", self.client.test_mqtt(settings).await)
    }

    fn report(
        &self,
        target: &str,
        result: Result<TestOutcome, TransportError>,
    ) -> Result<TestOutcome, ActionError> {
        match result {
            Ok(outcome) if outcome.ok => {
                self.notify(NoticeLevel::Success, format!("{target}: {}", outcome.summary()));
                Ok(outcome)
            }
            Ok(outcome) => {
                self.notify(NoticeLevel::Danger, format!("{target}: {}", outcome.summary()));
                Ok(outcome)
            }
            Err(e) => {
                self.notify(NoticeLevel::Danger, format!("{target} test failed: {e}"));
                Err(e.into())
            }
        }
    }

    fn notify(&self, level: NoticeLevel, message: String) {
        self.notifier.notify(level, &message);
    }
}
