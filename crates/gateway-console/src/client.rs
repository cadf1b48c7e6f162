//! Typed access to the gateway REST API.

use std::sync::Arc;

use gateway_core::{ModbusConfig, ModbusConnection, MqttSettings, NodeDefinition};
use gateway_protocol::{
    decode_value, encode, Ack, AgentStatus, ApplyResult, BrowseResponse, DetailResponse,
    GatewayInfo, OpcuaProbe, PipelineMetrics, PreviewResponse, SystemHealth, TailStatus,
    TestOutcome,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::transport::{ApiRequest, RemoteSync, TransportError};

/// Endpoint paths relative to the API base.
pub mod paths {
    pub const MODBUS_CONFIG: &str = "modbus/config";
    pub const MODBUS_TEST: &str = "modbus/test-connection";
    pub const OPCUA_NODES: &str = "opcua/nodes";
    pub const OPCUA_PUBLISHING: &str = "opcua/publishing";
    pub const OPCUA_BROWSE: &str = "opcua/browse";
    pub const OPCUA_NODE_DETAILS: &str = "opcua/node-details";
    pub const OPCUA_TEST: &str = "opcua/test-connection";
    pub const MQTT_CONFIG: &str = "mqtt/config";
    pub const MQTT_TEST: &str = "mqtt/test-connection";
    pub const MQTT_TAIL: &str = "mqtt/tail";
    pub const MQTT_TAIL_START: &str = "mqtt/tail/start";
    pub const MQTT_TAIL_STOP: &str = "mqtt/tail/stop";
    pub const MQTT_MESSAGES_CLEAR: &str = "mqtt/messages/clear";
    pub const TELEGRAF_GENERATE: &str = "telegraf/generate";
    pub const TELEGRAF_PREVIEW: &str = "telegraf/preview";
    pub const TELEGRAF_START: &str = "telegraf/start";
    pub const TELEGRAF_STOP: &str = "telegraf/stop";
    pub const TELEGRAF_STATUS: &str = "telegraf/status";
    pub const DASHBOARD_HEALTH: &str = "dashboard/health";
    pub const DASHBOARD_METRICS: &str = "dashboard/telegraf-metrics";
    pub const DASHBOARD_GATEWAY_INFO: &str = "dashboard/gateway-info";
}

/// Cheaply cloneable handle to the backend API.
#[derive(Clone)]
pub struct GatewayClient {
    remote: Arc<dyn RemoteSync>,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient").finish_non_exhaustive()
    }
}

impl GatewayClient {
    pub fn new(remote: Arc<dyn RemoteSync>) -> Self {
        Self { remote }
    }

    /// GET a document and decode it.
    pub async fn fetch<T: DeserializeOwned>(&self, path: &'static str) -> Result<T, TransportError> {
        let value = self.remote.call(ApiRequest::get(path)).await?;
        Ok(decode_value(path, value)?)
    }

    /// POST a document as the full replacement of a stored section.
    pub async fn store<B: Serialize + ?Sized>(
        &self,
        path: &'static str,
        body: &B,
    ) -> Result<Ack, TransportError> {
        let body = encode(path, body)?;
        let value = self.remote.call(ApiRequest::post(path).with_body(body)).await?;
        Ok(decode_value(path, value)?)
    }

    /// POST without a body.
    async fn trigger<T: DeserializeOwned>(&self, path: &'static str) -> Result<T, TransportError> {
        let value = self.remote.call(ApiRequest::post(path)).await?;
        Ok(decode_value(path, value)?)
    }

    async fn get_with_node(
        &self,
        path: &'static str,
        node_id: &str,
    ) -> Result<Value, TransportError> {
        self.remote
            .call(ApiRequest::get(path).with_query("node_id", node_id))
            .await
    }

    // ========================================================================
    // Modbus
    // ========================================================================

    pub async fn modbus_config(&self) -> Result<ModbusConfig, TransportError> {
        self.fetch(paths::MODBUS_CONFIG).await
    }

    pub async fn save_modbus_config(&self, config: &ModbusConfig) -> Result<Ack, TransportError> {
        self.store(paths::MODBUS_CONFIG, config).await
    }

    // ========================================================================
    // OPC UA
    // ========================================================================

    /// Configured nodes; a backend that never stored any answers `null` or `{}`.
    pub async fn nodes(&self) -> Result<Vec<NodeDefinition>, TransportError> {
        let value = self.remote.call(ApiRequest::get(paths::OPCUA_NODES)).await?;
        if value.is_array() {
            Ok(decode_value(paths::OPCUA_NODES, value)?)
        } else {
            Ok(Vec::new())
        }
    }

    pub async fn save_nodes(&self, nodes: &[NodeDefinition]) -> Result<Ack, TransportError> {
        self.store(paths::OPCUA_NODES, nodes).await
    }

    pub async fn browse(&self, node_id: &str) -> Result<BrowseResponse, TransportError> {
        let value = self.get_with_node(paths::OPCUA_BROWSE, node_id).await?;
        Ok(decode_value(paths::OPCUA_BROWSE, value)?)
    }

    pub async fn node_details(&self, node_id: &str) -> Result<DetailResponse, TransportError> {
        let value = self.get_with_node(paths::OPCUA_NODE_DETAILS, node_id).await?;
        Ok(decode_value(paths::OPCUA_NODE_DETAILS, value)?)
    }

    // ========================================================================
    // MQTT
    // ========================================================================

    pub async fn tail_start(&self) -> Result<Ack, TransportError> {
        self.trigger(paths::MQTT_TAIL_START).await
    }

    pub async fn tail_stop(&self) -> Result<Ack, TransportError> {
        self.trigger(paths::MQTT_TAIL_STOP).await
    }

    pub async fn tail_status(&self) -> Result<TailStatus, TransportError> {
        self.fetch(paths::MQTT_TAIL).await
    }

    pub async fn clear_messages(&self) -> Result<Ack, TransportError> {
        self.trigger(paths::MQTT_MESSAGES_CLEAR).await
    }

    // ========================================================================
    // Telegraf agent
    // ========================================================================

    pub async fn apply_config(&self) -> Result<ApplyResult, TransportError> {
        self.trigger(paths::TELEGRAF_GENERATE).await
    }

    pub async fn preview_config(&self) -> Result<PreviewResponse, TransportError> {
        self.fetch(paths::TELEGRAF_PREVIEW).await
    }

    pub async fn start_agent(&self) -> Result<Ack, TransportError> {
        self.trigger(paths::TELEGRAF_START).await
    }

    pub async fn stop_agent(&self) -> Result<Ack, TransportError> {
        self.trigger(paths::TELEGRAF_STOP).await
    }

    pub async fn agent_status(&self) -> Result<AgentStatus, TransportError> {
        self.fetch(paths::TELEGRAF_STATUS).await
    }

    // ========================================================================
    // Connection tests
    // ========================================================================

    pub async fn test_modbus(&self, connection: &ModbusConnection) -> Result<TestOutcome, TransportError> {
        self.probe(paths::MODBUS_TEST, connection).await
    }

    pub async fn test_opcua(&self, probe: &OpcuaProbe) -> Result<TestOutcome, TransportError> {
        self.probe(paths::OPCUA_TEST, probe).await
    }

    pub async fn test_mqtt(&self, settings: &MqttSettings) -> Result<TestOutcome, TransportError> {
        self.probe(paths::MQTT_TEST, settings).await
    }

    async fn probe<B: Serialize>(&self, path: &'static str, body: &B) -> Result<TestOutcome, TransportError> {
        let body = encode(path, body)?;
        let value = self.remote.call(ApiRequest::post(path).with_body(body)).await?;
        Ok(decode_value(path, value)?)
    }

    // ========================================================================
    // Dashboard
    // ========================================================================

    pub async fn health(&self) -> Result<SystemHealth, TransportError> {
        self.fetch(paths::DASHBOARD_HEALTH).await
    }

    pub async fn pipeline_metrics(&self) -> Result<PipelineMetrics, TransportError> {
        self.fetch(paths::DASHBOARD_METRICS).await
    }

    pub async fn gateway_info(&self) -> Result<GatewayInfo, TransportError> {
        self.fetch(paths::DASHBOARD_GATEWAY_INFO).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRemote;
    use crate::transport::Method;
    use serde_json::json;

    #[tokio::test]
    async fn test_nodes_tolerates_missing_section() {
        let remote = Arc::new(MockRemote::new(|_| Ok(json!({}))));
        let client = GatewayClient::new(remote);
        assert!(client.nodes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_browse_sends_node_id() {
        let remote = Arc::new(MockRemote::new(|_| Ok(json!([]))));
        let client = GatewayClient::new(remote.clone());
        client.browse("ns=2;s=Line1").await.unwrap();

        let calls = remote.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, paths::OPCUA_BROWSE);
        assert_eq!(calls[0].query_param("node_id"), Some("ns=2;s=Line1"));
    }

    #[tokio::test]
    async fn test_save_nodes_posts_full_array() {
        let remote = Arc::new(MockRemote::new(|_| Ok(json!({"ok": true}))));
        let client = GatewayClient::new(remote.clone());
        let nodes = vec![NodeDefinition {
            name: "a".to_string(),
            ..Default::default()
        }];
        let ack = client.save_nodes(&nodes).await.unwrap();
        assert!(ack.ok);

        let call = &remote.calls()[0];
        assert_eq!(call.method, Method::Post);
        assert_eq!(call.body.as_ref().unwrap()[0]["name"], "a");
    }

    #[tokio::test]
    async fn test_decode_failure_is_typed() {
        let remote = Arc::new(MockRemote::new(|_| Ok(json!({"running": "maybe"}))));
        let client = GatewayClient::new(remote);
        let err = client.tail_status().await.unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));
    }
}
