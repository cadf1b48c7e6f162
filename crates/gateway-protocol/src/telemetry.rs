//! Dashboard telemetry.
//!
//! Read-only snapshots served by the `dashboard/*` endpoints, plus the
//! metrics a dashboard derives from them. Every counter defaults to zero so a
//! backend that has not collected anything yet still decodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Host resource usage (`GET dashboard/health`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemHealth {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
    pub disk_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_sent: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_recv: Option<u64>,
}

/// Agent pipeline counters (`GET dashboard/telegraf-metrics`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineMetrics {
    pub opcua_gathered: u64,
    pub opcua_errors: u64,
    pub opcua_read_success: u64,
    pub opcua_read_error: u64,
    pub opcua_scan_time_ms: f64,

    pub modbus_gathered: u64,
    pub modbus_errors: u64,
    pub modbus_scan_time_ms: f64,

    pub mqtt_written: u64,
    pub mqtt_dropped: u64,
    pub mqtt_errors: u64,
    pub mqtt_buffer_size: u64,
    pub mqtt_buffer_limit: u64,

    /// Unix seconds of the last gather, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<f64>,
}

impl PipelineMetrics {
    /// Samples gathered by all inputs.
    pub fn total_gathered(&self) -> u64 {
        self.opcua_gathered + self.modbus_gathered
    }

    /// Errors reported by all inputs.
    pub fn input_errors(&self) -> u64 {
        self.opcua_errors + self.modbus_errors
    }

    /// Share of gathered samples that never reached MQTT.
    ///
    /// `None` when nothing has been gathered; never negative.
    pub fn loss_percent(&self) -> Option<f64> {
        let gathered = self.total_gathered();
        if gathered == 0 {
            return None;
        }
        let lost = gathered as f64 - self.mqtt_written as f64;
        Some((lost / gathered as f64 * 100.0).max(0.0))
    }

    /// OPC UA read success rate, `None` before the first read.
    pub fn read_success_rate(&self) -> Option<f64> {
        let total = self.opcua_read_success + self.opcua_read_error;
        if total == 0 {
            None
        } else {
            Some(self.opcua_read_success as f64 / total as f64 * 100.0)
        }
    }

    /// Output buffer fill level; 0 when the limit is unknown.
    pub fn buffer_fill_percent(&self) -> f64 {
        if self.mqtt_buffer_limit == 0 {
            0.0
        } else {
            self.mqtt_buffer_size as f64 / self.mqtt_buffer_limit as f64 * 100.0
        }
    }

    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        let secs = self.last_updated?;
        DateTime::from_timestamp_millis((secs * 1000.0) as i64)
    }
}

/// A container managed next to the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerStatus {
    pub name: String,
    pub service: String,
    pub status: String,
    pub is_demo: bool,
}

impl ContainerStatus {
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }
}

/// Gateway summary (`GET dashboard/gateway-info`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayInfo {
    pub uptime_seconds: u64,
    pub nodes_configured: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_config_applied: Option<String>,
    pub containers: Vec<ContainerStatus>,
}
