//! REST message types for the gateway backend.
//!
//! Every mutating endpoint answers with an `{ok, ...}` envelope. `ok: false`
//! is a normal answer carrying a reason, not a transport error. Collection
//! endpoints (`modbus/config`, `opcua/nodes`, `opcua/publishing`,
//! `mqtt/config`) exchange the model types from `gateway-core` directly.

use gateway_core::{BrowserTreeNode, NodeDetail, TailMessage};
use serde::{Deserialize, Serialize};

/// Acknowledgement of a mutating call.
///
/// The reason for a rejection is carried in `error`; some endpoints use
/// `message` or `detail` for the success text instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub ok: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Ack {
    /// Best available explanation, for rejections or success notices.
    pub fn reason(&self) -> String {
        self.error
            .as_ref()
            .or(self.message.as_ref())
            .or(self.detail.as_ref())
            .cloned()
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

// ============================================================================
// MQTT tail
// ============================================================================

/// Snapshot of the backend's tail subscriber (`GET mqtt/tail`).
///
/// `messages` is the whole buffer, newest first, capped by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TailStatus {
    /// Absent on the poll endpoint; present when the backend reports failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,

    #[serde(default)]
    pub running: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    #[serde(default)]
    pub messages: Vec<TailMessage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// OPC UA browsing
// ============================================================================

/// Answer of `GET opcua/browse`.
///
/// When the gateway has no usable OPC UA connection the backend answers with
/// an error object instead of a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BrowseResponse {
    Children(Vec<BrowserTreeNode>),
    Failed { error: String },
}

/// Answer of `GET opcua/node-details`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailResponse {
    Failed { error: String },
    Detail(NodeDetail),
}

// ============================================================================
// Telegraf agent
// ============================================================================

/// Answer of `POST telegraf/generate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyResult {
    #[serde(default)]
    pub ok: bool,

    /// Where the rendered agent config was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Outcome of restarting the agent with the new config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart: Option<Ack>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApplyResult {
    pub fn restart_ok(&self) -> bool {
        self.restart.as_ref().is_some_and(|r| r.ok)
    }

    /// Restart failure reason, `unknown` when the backend gave none.
    pub fn restart_error(&self) -> String {
        self.restart
            .as_ref()
            .and_then(|r| r.error.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Answer of `GET telegraf/preview`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviewResponse {
    #[serde(default)]
    pub config: String,
}

/// Answer of `GET telegraf/status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentStatus {
    #[serde(default)]
    pub ok: bool,

    #[serde(default)]
    pub running: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Connection tests
// ============================================================================

/// Answer of the `*/test-connection` endpoints.
///
/// Modbus reports success in `detail`, MQTT in `message` and OPC UA in
/// `server`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    #[serde(default)]
    pub ok: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestOutcome {
    /// One line describing the outcome.
    pub fn summary(&self) -> String {
        if self.ok {
            self.detail
                .as_ref()
                .or(self.message.as_ref())
                .map(|s| s.to_string())
                .or_else(|| self.server.as_ref().map(|s| format!("Server state: {s}")))
                .unwrap_or_else(|| "Connection OK".to_string())
        } else {
            self.error
                .as_ref()
                .or(self.detail.as_ref())
                .cloned()
                .unwrap_or_else(|| "Connection failed".to_string())
        }
    }
}

/// Overrides sent with `opcua/test-connection`; the backend merges them over
/// the stored OPC UA section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpcuaProbe {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::NodeClass;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ack_reason_fallbacks() {
        let ack: Ack = serde_json::from_str(r#"{"ok":false,"error":"busy"}"#).unwrap();
        assert_eq!(ack.reason(), "busy");

        let ack: Ack = serde_json::from_str(r#"{"ok":true,"message":"Already running"}"#).unwrap();
        assert_eq!(ack.reason(), "Already running");

        // Error-only bodies (e.g. HTTP 400) are rejections.
        let ack: Ack = serde_json::from_str(r#"{"error":"Expected a list of nodes"}"#).unwrap();
        assert!(!ack.ok);
    }

    #[test]
    fn test_browse_response_variants() {
        let ok: BrowseResponse = serde_json::from_str(
            r#"[{"node_id":"ns=2;s=Dev","display_name":"Dev","node_class":"Object","has_children":true}]"#,
        )
        .unwrap();
        match ok {
            BrowseResponse::Children(children) => {
                assert_eq!(children.len(), 1);
                assert_eq!(children[0].node_class, NodeClass::Object);
                assert!(children[0].has_children);
            }
            other => panic!("unexpected {other:?}"),
        }

        let empty: BrowseResponse = serde_json::from_str("[]").unwrap();
        assert_eq!(empty, BrowseResponse::Children(vec![]));

        let failed: BrowseResponse =
            serde_json::from_str(r#"{"error":"OPC UA endpoint not configured"}"#).unwrap();
        assert_eq!(
            failed,
            BrowseResponse::Failed {
                error: "OPC UA endpoint not configured".to_string()
            }
        );
    }

    #[test]
    fn test_detail_response_variants() {
        let detail: DetailResponse = serde_json::from_str(
            r#"{"node_id":"ns=2;s=Dev","display_name":"Dev","node_class":"Object"}"#,
        )
        .unwrap();
        assert!(matches!(detail, DetailResponse::Detail(d) if d.value.is_none()));

        let failed: DetailResponse = serde_json::from_str(r#"{"error":"timeout"}"#).unwrap();
        assert!(matches!(failed, DetailResponse::Failed { .. }));
    }

    #[test]
    fn test_apply_result_restart() {
        let applied: ApplyResult = serde_json::from_str(
            r#"{"ok":true,"path":"/etc/telegraf/telegraf.conf","restart":{"ok":true,"message":"Restarted 1 container(s)"}}"#,
        )
        .unwrap();
        assert!(applied.restart_ok());

        let partial: ApplyResult =
            serde_json::from_str(r#"{"ok":true,"restart":{"ok":false,"error":"docker down"}}"#).unwrap();
        assert!(!partial.restart_ok());
        assert_eq!(partial.restart_error(), "docker down");

        let missing: ApplyResult = serde_json::from_str(r#"{"ok":true}"#).unwrap();
        assert_eq!(missing.restart_error(), "unknown");
    }

    #[test]
    fn test_outcome_summary() {
        let modbus: TestOutcome =
            serde_json::from_str(r#"{"ok":true,"detail":"Connected to plc:502"}"#).unwrap();
        assert_eq!(modbus.summary(), "Connected to plc:502");

        let opcua: TestOutcome = serde_json::from_str(r#"{"ok":true,"server":"Running"}"#).unwrap();
        assert_eq!(opcua.summary(), "Server state: Running");

        let failed: TestOutcome =
            serde_json::from_str(r#"{"ok":false,"error":"Connection timeout"}"#).unwrap();
        assert_eq!(failed.summary(), "Connection timeout");
    }

    #[test]
    fn test_tail_status_without_ok() {
        let status: TailStatus = serde_json::from_str(
            r#"{"running":true,"topic":"iiot/#","messages":[{"timestamp":"2024-05-01T12:00:00+00:00","topic":"iiot/a","payload":"1"}]}"#,
        )
        .unwrap();
        assert_eq!(status.ok, None);
        assert!(status.running);
        assert_eq!(status.messages.len(), 1);
    }
}
