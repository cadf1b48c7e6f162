//! Debounced single-record editors.
//!
//! [`RecordEditor`] is the single-record counterpart of
//! [`CollectionEditor`](crate::editor::CollectionEditor): same debounce
//! window, same fire-and-forget save, applied to a singleton document such
//! as the publishing mode or the MQTT broker settings.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gateway_core::{DirtyTracker, MqttSettings, PublishingConfig, PublishingMode, Validate};
use gateway_protocol::Ack;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::client::GatewayClient;
use crate::debounce::Debouncer;
use crate::editor::settle_save;
use crate::lock;
use crate::transport::TransportError;

/// Remote home of a singleton record.
#[async_trait]
pub trait RecordStore<T>: Send + Sync + 'static {
    async fn load(&self) -> Result<T, TransportError>;
    async fn save(&self, record: T) -> Result<Ack, TransportError>;
}

/// Record stored as a whole document at one endpoint (GET loads, POST saves).
pub struct EndpointStore<T> {
    client: GatewayClient,
    path: &'static str,
    _record: PhantomData<fn() -> T>,
}

impl<T> EndpointStore<T> {
    pub fn new(client: GatewayClient, path: &'static str) -> Self {
        Self {
            client,
            path,
            _record: PhantomData,
        }
    }
}

#[async_trait]
impl<T> RecordStore<T> for EndpointStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn load(&self) -> Result<T, TransportError> {
        self.client.fetch(self.path).await
    }

    async fn save(&self, record: T) -> Result<Ack, TransportError> {
        self.client.store(self.path, &record).await
    }
}

/// Editable singleton kept in sync with a remote store.
pub struct RecordEditor<T, S> {
    inner: Arc<RecordInner<T, S>>,
}

struct RecordInner<T, S> {
    label: &'static str,
    record: Mutex<T>,
    store: S,
    dirty: DirtyTracker,
    debouncer: Debouncer,
}

impl<T, S> Clone for RecordEditor<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, S> RecordEditor<T, S>
where
    T: Clone + Default + Send + Sync + 'static,
    S: RecordStore<T>,
{
    pub fn new(label: &'static str, store: S, dirty: DirtyTracker, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(RecordInner {
                label,
                record: Mutex::new(T::default()),
                store,
                dirty,
                debouncer: Debouncer::new(debounce),
            }),
        }
    }

    /// Replace the local record with the stored one and return it.
    pub async fn load(&self) -> Result<T, TransportError> {
        let record = self.inner.store.load().await?;
        *lock(&self.inner.record) = record.clone();
        debug!("{} loaded", self.inner.label);
        Ok(record)
    }

    pub fn get(&self) -> T {
        lock(&self.inner.record).clone()
    }

    /// Change the record locally and schedule a save.
    pub fn edit(&self, edit: impl FnOnce(&mut T)) {
        edit(&mut *lock(&self.inner.record));
        self.inner.dirty.mark_dirty(self.inner.label);
        self.schedule_persist();
    }

    /// Replace the record and save immediately.
    pub async fn replace_now(&self, record: T) -> bool {
        *lock(&self.inner.record) = record;
        self.inner.dirty.mark_dirty(self.inner.label);
        self.inner.debouncer.cancel();
        self.persist().await
    }

    pub fn schedule_persist(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.debouncer.schedule(move || async move {
            if let Some(inner) = weak.upgrade() {
                inner.persist().await;
            }
        });
        debug!("{} save scheduled", self.inner.label);
    }

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
}

impl<T: Validate, S> RecordEditor<T, S> {
    pub fn problems(&self) -> Vec<String> {
        lock(&self.inner.record).problems()
    }
}

impl<T, S> RecordInner<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: RecordStore<T>,
{
    async fn persist(&self) -> bool {
        let record = lock(&self.record).clone();
        debug!("{} saving", self.label);
        let result = self.store.save(record).await;
        settle_save(self.label, result, &self.dirty, &self.debouncer)
    }
}

// ============================================================================
// Publishing mode
// ============================================================================

pub type PublishingModeEditor = RecordEditor<PublishingConfig, EndpointStore<PublishingConfig>>;

impl PublishingModeEditor {
    /// Whether the group interval applies.
    pub fn is_group_mode_active(&self) -> bool {
        lock(&self.inner.record).is_grouped()
    }

    pub fn set_mode(&self, mode: PublishingMode) {
        self.edit(|config| config.mode = mode);
    }

    pub fn set_group_interval(&self, interval: impl Into<String>) {
        let interval = interval.into();
        self.edit(|config| config.group_interval = interval);
    }
}

// ============================================================================
// MQTT broker
// ============================================================================

pub type MqttSettingsEditor = RecordEditor<MqttSettings, EndpointStore<MqttSettings>>;

impl MqttSettingsEditor {
    /// Apply the demo broker settings and save immediately.
    pub async fn use_demo_broker(&self) -> bool {
        self.replace_now(MqttSettings::demo()).await
    }
}
