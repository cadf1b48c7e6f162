//! # gateway-console
//!
//! Client-side core of the edge gateway console.
//!
//! This crate provides:
//! - A request transport to the gateway REST API (`reqwest` in production)
//! - Debounced editors that keep local collections in sync with the backend
//! - A lazy OPC UA address-space browser with a single selection
//! - A bounded MQTT tail session with auto-stop
//! - User-initiated actions (apply config, agent lifecycle, connection tests)
//!
//! A view layer drives everything through method calls and reads state back
//! through accessors and `tokio::sync::watch` channels. All timers run on the
//! ambient tokio runtime.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod actions;
pub mod browser;
pub mod client;
pub mod console;
pub mod debounce;
pub mod editor;
pub mod notify;
pub mod record;
pub mod tail;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use actions::{ActionError, GatewayActions};
pub use browser::{
    AddOutcome, BrowseFailure, BrowserRow, ChildrenState, DetailState, ResourceBrowser,
    ToggleOutcome,
};
pub use client::GatewayClient;
pub use console::{Console, DashboardSnapshot};
pub use debounce::Debouncer;
pub use editor::{
    CollectionEditor, CollectionStore, EditError, ModbusStore, NodeEditor, NodeStore,
    RegisterEditor,
};
pub use gateway_core::DirtyTracker;
pub use notify::{NoticeLevel, Notifier, TracingNotifier};
pub use record::{EndpointStore, MqttSettingsEditor, PublishingModeEditor, RecordEditor, RecordStore};
pub use tail::{StopReason, TailSession, TailSnapshot, TailState};
pub use transport::{ApiRequest, HttpRemote, Method, RemoteSync, TransportError};

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
