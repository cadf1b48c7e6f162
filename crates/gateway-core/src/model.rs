//! Gateway configuration data model.
//!
//! These types mirror the JSON documents exchanged with the gateway backend:
//! - Modbus register maps and connection settings
//! - OPC UA node selections and the publishing mode singleton
//! - MQTT broker settings
//! - OPC UA address-space browse results and node details
//! - MQTT tail messages
//!
//! Records inside editable collections have no identity of their own; they are
//! addressed by their position in the owning sequence.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::duration::{is_valid_interval, parse_duration};

/// A record that can be partially updated in place.
pub trait Editable: Clone {
    /// Partial update; `None` fields leave the record untouched.
    type Patch;

    /// Apply a partial update.
    fn apply(&mut self, patch: Self::Patch);
}

/// A record that can report configuration problems for inline display.
pub trait Validate {
    /// Human-readable problems; empty when the record looks deployable.
    fn problems(&self) -> Vec<String>;
}

// ============================================================================
// Modbus
// ============================================================================

/// Modbus register table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterType {
    #[default]
    Holding,
    Input,
    Coil,
    Discrete,
}

/// Value encoding of a register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RegisterDataType {
    Uint16,
    Int16,
    Uint32,
    Int32,
    #[default]
    Float32,
    Float64,
    Bool,
}

/// Word/byte ordering of multi-register values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ByteOrder {
    #[default]
    Abcd,
    Dcba,
    Badc,
    Cdab,
}

/// A single Modbus register mapping.
///
/// Addresses are user supplied and may collide; nothing here enforces
/// uniqueness.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterDefinition {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub register_type: RegisterType,

    #[serde(default)]
    pub address: u32,

    #[serde(default)]
    pub data_type: RegisterDataType,

    #[serde(default)]
    pub byte_order: ByteOrder,
}

impl RegisterDefinition {
    /// A blank holding register at the given address.
    pub fn blank_at(address: u32) -> Self {
        Self {
            address,
            ..Default::default()
        }
    }

    /// Demo register map matching the bundled Modbus simulator.
    pub fn demo_set() -> Vec<Self> {
        ["temperature", "pressure", "motor_speed", "voltage", "current"]
            .iter()
            .enumerate()
            .map(|(i, name)| Self {
                name: name.to_string(),
                address: (i as u32) * 2,
                ..Default::default()
            })
            .collect()
    }
}

/// Partial update for a [`RegisterDefinition`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisterPatch {
    pub name: Option<String>,
    pub register_type: Option<RegisterType>,
    pub address: Option<u32>,
    pub data_type: Option<RegisterDataType>,
    pub byte_order: Option<ByteOrder>,
}

impl Editable for RegisterDefinition {
    type Patch = RegisterPatch;

    fn apply(&mut self, patch: RegisterPatch) {
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(register_type) = patch.register_type {
            self.register_type = register_type;
        }
        if let Some(address) = patch.address {
            self.address = address;
        }
        if let Some(data_type) = patch.data_type {
            self.data_type = data_type;
        }
        if let Some(byte_order) = patch.byte_order {
            self.byte_order = byte_order;
        }
    }
}

impl Validate for RegisterDefinition {
    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.name.trim().is_empty() {
            problems.push("register name is empty".to_string());
        }
        if self.address > u32::from(u16::MAX) {
            problems.push(format!("address {} exceeds 65535", self.address));
        }
        problems
    }
}

/// Modbus TCP connection block saved alongside the register map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModbusConnection {
    #[serde(default)]
    pub enabled: bool,

    /// Controller address as `host:port` (port defaults to 502 server-side).
    #[serde(default)]
    pub controller: String,

    #[serde(default = "default_slave_id")]
    pub slave_id: u8,

    #[serde(default = "default_modbus_timeout")]
    pub timeout: String,
}

fn default_slave_id() -> u8 {
    1
}

fn default_modbus_timeout() -> String {
    "5s".to_string()
}

impl Default for ModbusConnection {
    fn default() -> Self {
        Self {
            enabled: false,
            controller: String::new(),
            slave_id: default_slave_id(),
            timeout: default_modbus_timeout(),
        }
    }
}

impl ModbusConnection {
    /// Connection settings for the bundled demo server.
    pub fn demo() -> Self {
        Self {
            enabled: true,
            controller: "modbus-demo-server:502".to_string(),
            slave_id: 1,
            timeout: "5s".to_string(),
        }
    }
}

impl Validate for ModbusConnection {
    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.enabled && self.controller.trim().is_empty() {
            problems.push("controller address is required".to_string());
        }
        if !is_valid_interval(&self.timeout) {
            problems.push(format!("invalid timeout {:?}", self.timeout));
        }
        problems
    }
}

/// Full Modbus document: connection block plus register map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModbusConfig {
    #[serde(flatten)]
    pub connection: ModbusConnection,

    #[serde(default)]
    pub registers: Vec<RegisterDefinition>,
}

// ============================================================================
// OPC UA node selection
// ============================================================================

/// OPC UA node identifier encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentifierType {
    #[default]
    #[serde(rename = "s")]
    String,
    #[serde(rename = "i")]
    Numeric,
    #[serde(rename = "g")]
    Guid,
    #[serde(rename = "b")]
    Opaque,
}

/// How the agent samples a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMode {
    #[default]
    Polling,
    Subscription,
}

/// Deadband filter applied to subscriptions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeadbandType {
    #[default]
    None,
    Absolute,
    Percent,
}

/// A configured OPC UA node to sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub namespace: String,

    #[serde(default)]
    pub identifier: String,

    #[serde(default)]
    pub identifier_type: IdentifierType,

    #[serde(default)]
    pub sampling_mode: SamplingMode,

    #[serde(default = "default_node_interval")]
    pub interval: String,

    #[serde(default)]
    pub deadband_type: DeadbandType,

    #[serde(default)]
    pub deadband_value: f64,
}

fn default_node_interval() -> String {
    "1s".to_string()
}

impl NodeDefinition {
    /// Build a selection entry from a browsed node with default sampling.
    pub fn from_detail(detail: &NodeDetail) -> Self {
        Self {
            name: detail.display_name.clone(),
            namespace: detail.namespace.clone().unwrap_or_default(),
            identifier: detail.identifier.clone().unwrap_or_default(),
            identifier_type: detail.identifier_type.unwrap_or_default(),
            sampling_mode: SamplingMode::Polling,
            interval: default_node_interval(),
            deadband_type: DeadbandType::None,
            deadband_value: 0.0,
        }
    }

    /// Whether this entry addresses the same server node.
    pub fn same_node(&self, namespace: &str, identifier: &str) -> bool {
        self.namespace == namespace && self.identifier == identifier
    }
}

/// Partial update for a [`NodeDefinition`].
///
/// Namespace and identifier are not editable from the table; they come from
/// the browser.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePatch {
    pub name: Option<String>,
    pub sampling_mode: Option<SamplingMode>,
    pub interval: Option<String>,
    pub deadband_type: Option<DeadbandType>,
    pub deadband_value: Option<f64>,
}

impl Editable for NodeDefinition {
    type Patch = NodePatch;

    fn apply(&mut self, patch: NodePatch) {
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(sampling_mode) = patch.sampling_mode {
            self.sampling_mode = sampling_mode;
        }
        if let Some(interval) = patch.interval {
            self.interval = interval;
        }
        if let Some(deadband_type) = patch.deadband_type {
            self.deadband_type = deadband_type;
        }
        if let Some(deadband_value) = patch.deadband_value {
            self.deadband_value = if deadband_value.is_finite() {
                deadband_value
            } else {
                0.0
            };
        }
    }
}

impl Validate for NodeDefinition {
    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.name.trim().is_empty() {
            problems.push("node name is empty".to_string());
        }
        if self.identifier.is_empty() {
            problems.push("node identifier is empty".to_string());
        }
        if parse_duration(&self.interval).map_or(true, |d| d.is_zero()) {
            problems.push(format!("invalid interval {:?}", self.interval));
        }
        if self.deadband_value < 0.0 {
            problems.push("deadband value is negative".to_string());
        }
        if self.deadband_type == DeadbandType::Percent && self.deadband_value > 100.0 {
            problems.push("percent deadband exceeds 100".to_string());
        }
        problems
    }
}

/// Publishing mode of OPC UA samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishingMode {
    /// One message per sampled value.
    #[default]
    Individual,
    /// Samples batched per group interval.
    Grouped,
}

/// Gateway-wide publishing configuration (singleton).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishingConfig {
    #[serde(default)]
    pub mode: PublishingMode,

    #[serde(default = "default_group_interval")]
    pub group_interval: String,
}

fn default_group_interval() -> String {
    "10s".to_string()
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            mode: PublishingMode::Individual,
            group_interval: default_group_interval(),
        }
    }
}

impl PublishingConfig {
    /// The group interval only matters in grouped mode.
    pub fn is_grouped(&self) -> bool {
        self.mode == PublishingMode::Grouped
    }
}

impl Validate for PublishingConfig {
    fn problems(&self) -> Vec<String> {
        if self.is_grouped() && !is_valid_interval(&self.group_interval) {
            vec![format!("invalid group interval {:?}", self.group_interval)]
        } else {
            Vec::new()
        }
    }
}

// ============================================================================
// MQTT broker
// ============================================================================

/// Serialization format of published messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    #[default]
    Json,
    Influx,
}

/// MQTT output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MqttSettings {
    /// Broker URL, `mqtt://host:port` or `mqtts://host:port`.
    #[serde(default)]
    pub endpoint: String,

    /// Topic template; `{{ .Hostname }}`-style placeholders are expanded by the agent.
    #[serde(default = "default_topic_pattern")]
    pub topic_pattern: String,

    #[serde(default = "default_qos")]
    pub qos: u8,

    #[serde(default)]
    pub data_format: DataFormat,
}

fn default_topic_pattern() -> String {
    "iiot/gateway/{{ .Hostname }}/{{ .PluginName }}".to_string()
}

fn default_qos() -> u8 {
    1
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            topic_pattern: default_topic_pattern(),
            qos: default_qos(),
            data_format: DataFormat::Json,
        }
    }
}

impl MqttSettings {
    /// Settings for the bundled demo broker.
    pub fn demo() -> Self {
        Self {
            endpoint: "mqtt://mosquitto:1883".to_string(),
            topic_pattern: default_topic_pattern(),
            qos: 0,
            data_format: DataFormat::Json,
        }
    }
}

impl Validate for MqttSettings {
    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !self.endpoint.is_empty()
            && !(self.endpoint.starts_with("mqtt://") || self.endpoint.starts_with("mqtts://"))
        {
            problems.push("endpoint must start with mqtt:// or mqtts://".to_string());
        }
        if self.qos > 2 {
            problems.push(format!("qos {} is not 0, 1 or 2", self.qos));
        }
        problems
    }
}

// ============================================================================
// OPC UA address space
// ============================================================================

/// OPC UA node class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeClass {
    Object,
    Variable,
    Method,
    ObjectType,
    VariableType,
    ReferenceType,
    DataType,
    View,
    #[default]
    #[serde(other)]
    Unspecified,
}

/// One entry of a browsed tree level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserTreeNode {
    /// Opaque node id string, e.g. `ns=2;s=Temperature`.
    pub node_id: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub node_class: NodeClass,

    #[serde(default)]
    pub has_children: bool,
}

/// Point-in-time snapshot of a single node.
///
/// Object nodes carry no value, data type or identifier fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDetail {
    pub node_id: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub node_class: NodeClass,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,

    /// Namespace index; the backend sends it as a number.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub namespace: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub identifier: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier_type: Option<IdentifierType>,
}

impl NodeDetail {
    /// Only variables can be added to the sampled node list.
    pub fn is_variable(&self) -> bool {
        self.node_class == NodeClass::Variable
    }

    /// Display text of the current value, `-` when absent.
    pub fn value_text(&self) -> String {
        match &self.value {
            None | Some(serde_json::Value::Null) => "-".to_string(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// Accept strings, numbers and booleans as an optional string.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

// ============================================================================
// MQTT tail
// ============================================================================

/// A message captured by the backend's tail subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TailMessage {
    pub timestamp: DateTime<Utc>,

    pub topic: String,

    /// Raw payload, truncated by the backend; often JSON.
    #[serde(default)]
    pub payload: String,
}

impl TailMessage {
    /// RFC 3339 UTC timestamp with millisecond precision.
    pub fn utc_timestamp(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Pretty-printed JSON payload, or the raw payload if it is not JSON.
    pub fn pretty_payload(&self) -> String {
        serde_json::from_str::<serde_json::Value>(&self.payload)
            .ok()
            .and_then(|v| serde_json::to_string_pretty(&v).ok())
            .unwrap_or_else(|| self.payload.clone())
    }
}
