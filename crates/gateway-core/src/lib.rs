//! # gateway-core
//!
//! Core data model for the edge gateway console.
//!
//! This crate provides:
//! - Configuration record types (Modbus registers, OPC UA nodes, publishing mode, MQTT broker)
//! - OPC UA browse tree and node detail snapshots
//! - MQTT tail messages
//! - Telegraf-style duration string parsing
//! - Console settings with validation
//! - The shared unapplied-changes flag
//!
//! This crate is intentionally runtime-agnostic and contains no async code,
//! so the same types back the async console and any synchronous tooling.

pub mod config;
pub mod dirty;
pub mod duration;
pub mod model;

pub use config::{ConfigError, ConsoleSettings};
pub use dirty::DirtyTracker;
pub use duration::{parse_duration, DurationError};
pub use model::*;
