//! Debounced collection editors.
//!
//! A [`CollectionEditor`] owns the local copy of one ordered collection
//! (Modbus registers, OPC UA nodes). Mutations apply locally at once and
//! schedule a debounced full-replace save through a [`CollectionStore`].
//!
//! Background saves are fire-and-forget: a failed or rejected save is logged
//! and otherwise dropped. Nothing is retried or rolled back; the next
//! mutation sends the whole collection again.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gateway_core::{
    DirtyTracker, Editable, ModbusConfig, ModbusConnection, NodeDefinition, RegisterDefinition,
};
use gateway_protocol::Ack;
use thiserror::Error;
use tracing::{debug, warn};

use crate::client::GatewayClient;
use crate::debounce::Debouncer;
use crate::lock;
use crate::transport::TransportError;

/// Errors from local edits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("Index {index} out of range for {len} records")]
    OutOfRange { index: usize, len: usize },
}

/// Remote home of a collection.
#[async_trait]
pub trait CollectionStore<T>: Send + Sync + 'static {
    async fn load(&self) -> Result<Vec<T>, TransportError>;

    /// Replace the stored collection with `items`.
    async fn save(&self, items: Vec<T>) -> Result<Ack, TransportError>;
}

/// Record the outcome of a background save.
///
/// Clears the `label` dirty source, and only when no newer edit is waiting
/// to be saved. Other sources are left alone.
pub(crate) fn settle_save(
    label: &str,
    result: Result<Ack, TransportError>,
    dirty: &DirtyTracker,
    debouncer: &Debouncer,
) -> bool {
    match result {
        Ok(ack) if ack.ok => {
            debug!("{} saved", label);
            if !debouncer.is_pending() {
                dirty.mark_synced(label);
            }
            true
        }
        Ok(ack) => {
            warn!("{} save rejected: {}", label, ack.reason());
            false
        }
        Err(e) => {
            warn!("{} save failed: {}", label, e);
            false
        }
    }
}

/// Editable ordered collection kept in sync with a remote store.
///
/// Records are addressed by index. Clones share the same collection.
pub struct CollectionEditor<T, S> {
    inner: Arc<EditorInner<T, S>>,
}

struct EditorInner<T, S> {
    label: &'static str,
    items: Mutex<Vec<T>>,
    store: S,
    dirty: DirtyTracker,
    debouncer: Debouncer,
}

impl<T, S> Clone for CollectionEditor<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, S> CollectionEditor<T, S>
where
    T: Editable + Send + Sync + 'static,
    S: CollectionStore<T>,
{
    pub fn new(label: &'static str, store: S, dirty: DirtyTracker, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(EditorInner {
                label,
                items: Mutex::new(Vec::new()),
                store,
                dirty,
                debouncer: Debouncer::new(debounce),
            }),
        }
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Replace the local collection with the authoritative one and return it.
    pub async fn load(&self) -> Result<Vec<T>, TransportError> {
        let items = self.inner.store.load().await?;
        *lock(&self.inner.items) = items.clone();
        debug!("{} loaded {} records", self.inner.label, items.len());
        Ok(items)
    }

    pub fn snapshot(&self) -> Vec<T> {
        lock(&self.inner.items).clone()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        lock(&self.inner.items).get(index).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.items).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a record. Returns its index.
    pub fn insert(&self, item: T) -> usize {
        let index = {
            let mut items = lock(&self.inner.items);
            items.push(item);
            items.len() - 1
        };
        self.touched();
        index
    }

    pub fn update_at(&self, index: usize, patch: T::Patch) -> Result<(), EditError> {
        {
            let mut items = lock(&self.inner.items);
            let len = items.len();
            let item = items
                .get_mut(index)
                .ok_or(EditError::OutOfRange { index, len })?;
            item.apply(patch);
        }
        self.touched();
        Ok(())
    }

    pub fn remove_at(&self, index: usize) -> Result<T, EditError> {
        let removed = {
            let mut items = lock(&self.inner.items);
            let len = items.len();
            if index >= len {
                return Err(EditError::OutOfRange { index, len });
            }
            items.remove(index)
        };
        self.touched();
        Ok(removed)
    }

    /// Remove every record and save immediately.
    pub async fn clear(&self) -> bool {
        lock(&self.inner.items).clear();
        self.inner.dirty.mark_dirty(self.inner.label);
        self.inner.debouncer.cancel();
        self.persist().await
    }

    /// Restart the debounce window. The save sends the collection as it is
    /// when the window elapses.
    pub fn schedule_persist(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.debouncer.schedule(move || async move {
            if let Some(inner) = weak.upgrade() {
                inner.persist().await;
            }
        });
        debug!("{} save scheduled", self.inner.label);
    }

    /// Send the whole collection now. Returns whether the backend accepted it.
    pub async fn persist(&self) -> bool {
        self.inner.persist().await
    }

    /// Save now if a debounced save is pending.
    pub async fn flush(&self) -> bool {
        if self.inner.debouncer.cancel() {
            self.persist().await
        } else {
            false
        }
    }

    pub fn has_pending_save(&self) -> bool {
        self.inner.debouncer.is_pending()
    }

    fn touched(&self) {
        self.inner.dirty.mark_dirty(self.inner.label);
        self.schedule_persist();
    }
}

impl<T, S> EditorInner<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: CollectionStore<T>,
{
    async fn persist(&self) -> bool {
        let items = lock(&self.items).clone();
        debug!("{} saving {} records", self.label, items.len());
        let result = self.store.save(items).await;
        settle_save(self.label, result, &self.dirty, &self.debouncer)
    }
}

// ============================================================================
// Modbus registers
// ============================================================================

/// Register map store; also carries the connection block saved with it.
pub struct ModbusStore {
    client: GatewayClient,
    connection: Mutex<ModbusConnection>,
}

impl ModbusStore {
    pub fn new(client: GatewayClient) -> Self {
        Self {
            client,
            connection: Mutex::new(ModbusConnection::default()),
        }
    }

    pub fn connection(&self) -> ModbusConnection {
        lock(&self.connection).clone()
    }
}

#[async_trait]
impl CollectionStore<RegisterDefinition> for ModbusStore {
    async fn load(&self) -> Result<Vec<RegisterDefinition>, TransportError> {
        let config = self.client.modbus_config().await?;
        *lock(&self.connection) = config.connection;
        Ok(config.registers)
    }

    async fn save(&self, registers: Vec<RegisterDefinition>) -> Result<Ack, TransportError> {
        let config = ModbusConfig {
            connection: self.connection(),
            registers,
        };
        self.client.save_modbus_config(&config).await
    }
}

pub type RegisterEditor = CollectionEditor<RegisterDefinition, ModbusStore>;

impl RegisterEditor {
    /// Append a blank register after the last one (address + 1, or 0).
    pub fn add_register(&self) -> usize {
        let address = lock(&self.inner.items)
            .last()
            .map_or(0, |last| last.address.saturating_add(1));
        self.insert(RegisterDefinition::blank_at(address))
    }

    pub fn connection(&self) -> ModbusConnection {
        self.inner.store.connection()
    }

    /// Edit the connection block; saved with the registers.
    pub fn update_connection(&self, edit: impl FnOnce(&mut ModbusConnection)) {
        edit(&mut *lock(&self.inner.store.connection));
        self.touched();
    }

    /// Apply demo connection settings, seed demo registers if there are
    /// none, and save immediately.
    pub async fn fill_demo(&self) -> bool {
        *lock(&self.inner.store.connection) = ModbusConnection::demo();
        {
            let mut items = lock(&self.inner.items);
            if items.is_empty() {
                *items = RegisterDefinition::demo_set();
            }
        }
        self.inner.dirty.mark_dirty(self.inner.label);
        self.inner.debouncer.cancel();
        self.persist().await
    }
}

// ============================================================================
// OPC UA nodes
// ============================================================================

/// Node selection store.
pub struct NodeStore {
    client: GatewayClient,
}

impl NodeStore {
    pub fn new(client: GatewayClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CollectionStore<NodeDefinition> for NodeStore {
    async fn load(&self) -> Result<Vec<NodeDefinition>, TransportError> {
        self.client.nodes().await
    }

    async fn save(&self, nodes: Vec<NodeDefinition>) -> Result<Ack, TransportError> {
        self.client.save_nodes(&nodes).await
    }
}

pub type NodeEditor = CollectionEditor<NodeDefinition, NodeStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::paths;
    use crate::mock::MockRemote;
    use crate::transport::{ApiRequest, Method};
    use gateway_core::{NodePatch, RegisterPatch, RegisterType, SamplingMode};
    use serde_json::{json, Value};
    use tokio::time::sleep;

    const DEBOUNCE: Duration = Duration::from_millis(800);

    fn ok_remote() -> Arc<MockRemote> {
        Arc::new(MockRemote::new(|req| match req.path.as_str() {
            paths::MODBUS_CONFIG if req.method == Method::Get => Ok(json!({
                "enabled": true,
                "controller": "plc:502",
                "slave_id": 2,
                "timeout": "3s",
                "registers": []
            })),
            paths::OPCUA_NODES if req.method == Method::Get => Ok(json!([])),
            _ => Ok(json!({"ok": true})),
        }))
    }

    fn register_editor(remote: &Arc<MockRemote>, dirty: &DirtyTracker) -> RegisterEditor {
        let client = GatewayClient::new(remote.clone());
        CollectionEditor::new("registers", ModbusStore::new(client), dirty.clone(), DEBOUNCE)
    }

    fn node_editor(remote: &Arc<MockRemote>, dirty: &DirtyTracker) -> NodeEditor {
        let client = GatewayClient::new(remote.clone());
        CollectionEditor::new("nodes", NodeStore::new(client), dirty.clone(), DEBOUNCE)
    }

    fn saves(remote: &MockRemote, path: &str) -> Vec<Value> {
        remote
            .calls()
            .into_iter()
            .filter(|c: &ApiRequest| c.method == Method::Post && c.path == path)
            .filter_map(|c| c.body)
            .collect()
    }

    fn node(name: &str) -> NodeDefinition {
        NodeDefinition {
            name: name.to_string(),
            identifier: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_coalesce_into_one_save() {
        let remote = ok_remote();
        let editor = node_editor(&remote, &DirtyTracker::new());

        editor.insert(node("a"));
        sleep(Duration::from_millis(300)).await;
        editor.insert(node("b"));
        sleep(Duration::from_millis(300)).await;
        editor
            .update_at(
                0,
                NodePatch {
                    sampling_mode: Some(SamplingMode::Subscription),
                    ..Default::default()
                },
            )
            .unwrap();

        sleep(Duration::from_millis(799)).await;
        assert!(saves(&remote, paths::OPCUA_NODES).is_empty());

        sleep(Duration::from_millis(10)).await;
        let saved = saves(&remote, paths::OPCUA_NODES);
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].as_array().unwrap().len(), 2);
        assert_eq!(saved[0][0]["sampling_mode"], "subscription");
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_reflects_state_when_timer_fires() {
        let remote = ok_remote();
        let editor = node_editor(&remote, &DirtyTracker::new());

        editor.insert(node("a"));
        editor.insert(node("b"));
        editor.remove_at(0).unwrap();

        sleep(Duration::from_secs(1)).await;
        let saved = saves(&remote, paths::OPCUA_NODES);
        assert_eq!(saved, vec![json!([node_json("b")])]);
    }

    fn node_json(name: &str) -> Value {
        serde_json::to_value(node(name)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_then_remove_persists_full_replacements() {
        let remote = ok_remote();
        let dirty = DirtyTracker::new();
        let editor = register_editor(&remote, &dirty);
        editor.load().await.unwrap();

        let index = editor.add_register();
        editor
            .update_at(
                index,
                RegisterPatch {
                    name: Some("temperature".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        sleep(Duration::from_secs(1)).await;

        editor.remove_at(index).unwrap();
        sleep(Duration::from_secs(1)).await;

        let saved = saves(&remote, paths::MODBUS_CONFIG);
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0]["registers"][0]["name"], "temperature");
        assert_eq!(saved[0]["registers"][0]["address"], 0);
        assert_eq!(saved[1]["registers"], json!([]));
        // Connection block loaded from the backend rides along.
        assert_eq!(saved[1]["controller"], "plc:502");
        assert_eq!(saved[1]["slave_id"], 2);
        assert!(!dirty.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_addresses_follow_last() {
        let remote = ok_remote();
        let editor = register_editor(&remote, &DirtyTracker::new());

        assert_eq!(editor.add_register(), 0);
        editor
            .update_at(
                0,
                RegisterPatch {
                    address: Some(40),
                    ..Default::default()
                },
            )
            .unwrap();
        let second = editor.add_register();
        let reg = editor.get(second).unwrap();
        assert_eq!(reg.address, 41);
        assert_eq!(reg.register_type, RegisterType::Holding);
        assert_eq!(reg.name, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_timer_after_removal_sends_remaining() {
        let remote = ok_remote();
        let editor = register_editor(&remote, &DirtyTracker::new());

        editor.add_register();
        editor.add_register();
        sleep(Duration::from_millis(400)).await;
        editor.remove_at(1).unwrap();

        sleep(Duration::from_secs(1)).await;
        let saved = saves(&remote, paths::MODBUS_CONFIG);
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0]["registers"].as_array().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_is_swallowed() {
        let remote = Arc::new(MockRemote::new(|req| {
            if req.method == Method::Post {
                Err(TransportError::Request {
                    path: req.path.clone(),
                    reason: "connection refused".to_string(),
                })
            } else {
                Ok(json!([]))
            }
        }));
        let dirty = DirtyTracker::new();
        let editor = node_editor(&remote, &dirty);

        editor.insert(node("a"));
        sleep(Duration::from_secs(1)).await;

        // No retry, no rollback; the edit stays local and unsynced.
        assert_eq!(remote.count(Method::Post, paths::OPCUA_NODES), 1);
        assert_eq!(editor.len(), 1);
        assert!(dirty.is_dirty());

        sleep(Duration::from_secs(10)).await;
        assert_eq!(remote.count(Method::Post, paths::OPCUA_NODES), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_save_keeps_dirty() {
        let remote = Arc::new(MockRemote::new(|_| Ok(json!({"ok": false, "error": "read-only"}))));
        let dirty = DirtyTracker::new();
        let editor = node_editor(&remote, &dirty);

        editor.insert(node("a"));
        sleep(Duration::from_secs(1)).await;
        assert!(dirty.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_edits() {
        let remote = ok_remote();
        let editor = node_editor(&remote, &DirtyTracker::new());
        assert_eq!(
            editor.remove_at(0),
            Err(EditError::OutOfRange { index: 0, len: 0 })
        );
        assert!(editor.update_at(3, NodePatch::default()).is_err());
        assert!(!editor.has_pending_save());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_saves_immediately() {
        let remote = ok_remote();
        let editor = node_editor(&remote, &DirtyTracker::new());
        editor.insert(node("a"));
        assert!(editor.has_pending_save());

        assert!(editor.clear().await);
        assert!(!editor.has_pending_save());
        assert_eq!(saves(&remote, paths::OPCUA_NODES), vec![json!([])]);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(remote.count(Method::Post, paths::OPCUA_NODES), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_sends_pending_edit() {
        let remote = ok_remote();
        let editor = node_editor(&remote, &DirtyTracker::new());

        assert!(!editor.flush().await);
        editor.insert(node("a"));
        assert!(editor.flush().await);
        assert_eq!(remote.count(Method::Post, paths::OPCUA_NODES), 1);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(remote.count(Method::Post, paths::OPCUA_NODES), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fill_demo_seeds_empty_map() {
        let remote = ok_remote();
        let editor = register_editor(&remote, &DirtyTracker::new());
        editor.load().await.unwrap();

        assert!(editor.fill_demo().await);
        let saved = saves(&remote, paths::MODBUS_CONFIG);
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0]["controller"], "modbus-demo-server:502");
        assert_eq!(saved[0]["registers"].as_array().unwrap().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_edit_schedules_save() {
        let remote = ok_remote();
        let editor = register_editor(&remote, &DirtyTracker::new());
        editor.load().await.unwrap();

        editor.update_connection(|c| c.timeout = "10s".to_string());
        assert_eq!(editor.connection().timeout, "10s");
        sleep(Duration::from_secs(1)).await;

        let saved = saves(&remote, paths::MODBUS_CONFIG);
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0]["timeout"], "10s");
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_returns_stored_collection() {
        let remote = Arc::new(MockRemote::new(|_| {
            Ok(json!([
                {"name": "flow", "namespace": "2", "identifier": "Flow"},
                {"name": "level", "namespace": "2", "identifier": "Level"}
            ]))
        }));
        let editor = node_editor(&remote, &DirtyTracker::new());
        editor.insert(node("local"));

        let loaded = editor.load().await.unwrap();
        let names: Vec<&str> = loaded.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["flow", "level"]);
        assert_eq!(editor.snapshot(), loaded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_editor_cancels_pending_save() {
        let remote = ok_remote();
        let editor = node_editor(&remote, &DirtyTracker::new());
        editor.insert(node("a"));
        drop(editor);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(remote.count(Method::Post, paths::OPCUA_NODES), 0);
    }
}
