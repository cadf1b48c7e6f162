//! Lazy OPC UA address-space browser.
//!
//! Each tree node's children go through `Unloaded -> Loading -> Loaded |
//! Failed`. A `Loaded` level is cached for the lifetime of the browser;
//! collapsing a node only clears its expanded bit. A failed level is fetched
//! again the next time the node is expanded.
//!
//! Exactly one node can be selected. Selecting starts a detail fetch whose
//! answer is dropped if another node was selected in the meantime.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use gateway_core::{BrowserTreeNode, DirtyTracker, NodeDefinition, NodeDetail};
use gateway_protocol::{BrowseResponse, DetailResponse};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::actions::ActionError;
use crate::client::GatewayClient;
use crate::lock;
use crate::notify::{NoticeLevel, Notifier};

/// Dirty-tracker source for node additions made from the browser.
pub const DIRTY_SOURCE: &str = "browser";

/// Why a tree level could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrowseFailure {
    /// The backend answered but has no usable OPC UA connection.
    #[error("Not connected: {0}")]
    NotConnected(String),

    /// The backend itself could not be reached.
    #[error("Backend unreachable: {0}")]
    Unreachable(String),
}

impl BrowseFailure {
    /// Hint shown in place of the tree.
    pub fn remediation(&self) -> &'static str {
        match self {
            BrowseFailure::NotConnected(_) => {
                "Check the OPC UA endpoint settings and test the connection."
            }
            BrowseFailure::Unreachable(_) => {
                "Check that the gateway backend is running and reachable."
            }
        }
    }
}

/// Load state of one tree level.
#[derive(Debug, Clone, PartialEq)]
pub enum ChildrenState {
    Unloaded,
    Loading,
    /// Empty means the node genuinely has no children.
    Loaded(Vec<BrowserTreeNode>),
    Failed(BrowseFailure),
}

/// Detail pane of the selected node.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DetailState {
    #[default]
    Empty,
    Loading,
    Ready(NodeDetail),
    Failed(String),
}

/// Result of [`ResourceBrowser::toggle_expand`].
#[derive(Debug, Clone, PartialEq)]
pub enum ToggleOutcome {
    /// Children fetched for the first time (count).
    Loaded(usize),
    /// Cached children shown again.
    Expanded,
    Collapsed,
    /// A fetch for this node is already running.
    Pending,
    /// The node has no children to show.
    Leaf,
    /// The id is not part of the current tree.
    Unknown,
    Failed(BrowseFailure),
    /// A new root was loaded while the fetch was running.
    Superseded,
}

/// Result of [`ResourceBrowser::add_selected_to_collection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
    NothingSelected,
}

/// One visible line of the flattened tree.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserRow {
    pub depth: usize,
    pub node: BrowserTreeNode,
    pub expanded: bool,
    pub selected: bool,
    pub children: ChildrenState,
}

#[derive(Debug, Default)]
struct BrowserState {
    /// Bumped by every `load_root`; fetches from an older tree are dropped.
    tree_epoch: u64,
    root: Option<String>,
    levels: HashMap<String, ChildrenState>,
    nodes: HashMap<String, BrowserTreeNode>,
    expanded: HashSet<String>,
    selection: Option<String>,
    /// Bumped by every selection; detail answers for older ones are dropped.
    selection_seq: u64,
    detail: DetailState,
}

impl BrowserState {
    fn level(&self, node_id: &str) -> ChildrenState {
        self.levels
            .get(node_id)
            .cloned()
            .unwrap_or(ChildrenState::Unloaded)
    }

    fn store_level(&mut self, node_id: &str, result: &Result<Vec<BrowserTreeNode>, BrowseFailure>) {
        let state = match result {
            Ok(children) => {
                for child in children {
                    self.nodes.insert(child.node_id.clone(), child.clone());
                }
                ChildrenState::Loaded(children.clone())
            }
            Err(failure) => ChildrenState::Failed(failure.clone()),
        };
        self.levels.insert(node_id.to_string(), state);
    }
}

/// Lazy tree over the backend's OPC UA browse endpoint.
///
/// Cloning shares the same tree and selection.
#[derive(Clone)]
pub struct ResourceBrowser {
    client: GatewayClient,
    dirty: DirtyTracker,
    notifier: Arc<dyn Notifier>,
    state: Arc<Mutex<BrowserState>>,
}

impl ResourceBrowser {
    pub fn new(client: GatewayClient, dirty: DirtyTracker, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            client,
            dirty,
            notifier,
            state: Arc::new(Mutex::new(BrowserState::default())),
        }
    }

    // ========================================================================
    // Tree
    // ========================================================================

    /// Reset the tree and selection, then fetch the children of `root_id`.
    pub async fn load_root(&self, root_id: &str) -> Result<Vec<BrowserTreeNode>, BrowseFailure> {
        let epoch = {
            let mut state = lock(&self.state);
            let next_epoch = state.tree_epoch + 1;
            let next_seq = state.selection_seq + 1;
            *state = BrowserState {
                tree_epoch: next_epoch,
                selection_seq: next_seq,
                root: Some(root_id.to_string()),
                ..Default::default()
            };
            state
                .levels
                .insert(root_id.to_string(), ChildrenState::Loading);
            next_epoch
        };

        let result = self.fetch_children(root_id).await;

        let mut state = lock(&self.state);
        if state.tree_epoch == epoch {
            state.store_level(root_id, &result);
        }
        match &result {
            Ok(children) => info!("Browsed {} ({} children)", root_id, children.len()),
            Err(failure) => warn!("Browse of {} failed: {}", root_id, failure),
        }
        result
    }

    /// Expand or collapse a node, fetching its children on first expansion.
    pub async fn toggle_expand(&self, node_id: &str) -> ToggleOutcome {
        let epoch = {
            let mut state = lock(&self.state);
            let Some(node) = state.nodes.get(node_id) else {
                return ToggleOutcome::Unknown;
            };
            if !node.has_children {
                return ToggleOutcome::Leaf;
            }
            if state.expanded.remove(node_id) {
                return ToggleOutcome::Collapsed;
            }
            state.expanded.insert(node_id.to_string());
            match state.level(node_id) {
                ChildrenState::Loaded(_) => return ToggleOutcome::Expanded,
                ChildrenState::Loading => return ToggleOutcome::Pending,
                ChildrenState::Unloaded | ChildrenState::Failed(_) => {
                    state
                        .levels
                        .insert(node_id.to_string(), ChildrenState::Loading);
                }
            }
            state.tree_epoch
        };

        debug!("Fetching children of {}", node_id);
        let result = self.fetch_children(node_id).await;

        let mut state = lock(&self.state);
        if state.tree_epoch != epoch {
            return ToggleOutcome::Superseded;
        }
        state.store_level(node_id, &result);
        match result {
            Ok(children) => ToggleOutcome::Loaded(children.len()),
            Err(failure) => ToggleOutcome::Failed(failure),
        }
    }

    async fn fetch_children(&self, node_id: &str) -> Result<Vec<BrowserTreeNode>, BrowseFailure> {
        match self.client.browse(node_id).await {
            Ok(BrowseResponse::Children(children)) => Ok(children),
            Ok(BrowseResponse::Failed { error }) => Err(BrowseFailure::NotConnected(error)),
            Err(e) => Err(BrowseFailure::Unreachable(e.to_string())),
        }
    }

    pub fn root(&self) -> Option<String> {
        lock(&self.state).root.clone()
    }

    /// State of the root level, `Unloaded` before the first `load_root`.
    pub fn root_state(&self) -> ChildrenState {
        let state = lock(&self.state);
        match &state.root {
            Some(root) => state.level(root),
            None => ChildrenState::Unloaded,
        }
    }

    pub fn children_of(&self, node_id: &str) -> ChildrenState {
        lock(&self.state).level(node_id)
    }

    pub fn is_expanded(&self, node_id: &str) -> bool {
        lock(&self.state).expanded.contains(node_id)
    }

    /// Flatten the tree into the rows a view shows: root children first, then
    /// the children of every expanded, loaded node beneath it.
    ///
    /// A node reachable from itself is shown once per path and not descended
    /// into again.
    pub fn visible_rows(&self) -> Vec<BrowserRow> {
        let state = lock(&self.state);
        let mut rows = Vec::new();
        let Some(root) = state.root.clone() else {
            return rows;
        };
        if let ChildrenState::Loaded(children) = state.level(&root) {
            let mut path = HashSet::from([root]);
            flatten(&state, &children, 0, &mut path, &mut rows);
        }
        rows
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Select a node and fetch its detail.
    ///
    /// Returns `false` when another selection superseded this one before the
    /// detail arrived; the late answer is discarded.
    pub async fn select_node(&self, node_id: &str) -> bool {
        let seq = {
            let mut state = lock(&self.state);
            state.selection_seq += 1;
            state.selection = Some(node_id.to_string());
            state.detail = DetailState::Loading;
            state.selection_seq
        };

        let detail = match self.client.node_details(node_id).await {
            Ok(DetailResponse::Detail(detail)) => DetailState::Ready(detail),
            Ok(DetailResponse::Failed { error }) => DetailState::Failed(error),
            Err(e) => DetailState::Failed(e.to_string()),
        };

        let mut state = lock(&self.state);
        if state.selection_seq != seq {
            debug!("Discarding stale detail for {}", node_id);
            return false;
        }
        state.detail = detail;
        true
    }

    pub fn selection(&self) -> Option<String> {
        lock(&self.state).selection.clone()
    }

    pub fn detail(&self) -> DetailState {
        lock(&self.state).detail.clone()
    }

    /// Whether the selected node can be sampled (only variables carry values).
    pub fn can_add_selected(&self) -> bool {
        matches!(&lock(&self.state).detail, DetailState::Ready(detail) if detail.is_variable())
    }

    /// Number of nodes currently configured on the backend.
    pub async fn selected_count(&self) -> Result<usize, ActionError> {
        Ok(self.client.nodes().await?.len())
    }

    /// Append the selected node to the configured node list.
    ///
    /// Re-reads the list from the backend first and skips nodes whose
    /// `(namespace, identifier)` is already present. The whole list is saved
    /// on success.
    pub async fn add_selected_to_collection(&self) -> Result<AddOutcome, ActionError> {
        let detail = match &lock(&self.state).detail {
            DetailState::Ready(detail) => detail.clone(),
            _ => {
                self.notifier
                    .notify(NoticeLevel::Info, "Select a node first");
                return Ok(AddOutcome::NothingSelected);
            }
        };

        match self.append_node(&detail).await {
            Ok(AddOutcome::AlreadyPresent) => {
                self.notifier
                    .notify(NoticeLevel::Warning, "Node already in selection");
                Ok(AddOutcome::AlreadyPresent)
            }
            Ok(outcome) => {
                self.notifier.notify(
                    NoticeLevel::Success,
                    &format!("Added \"{}\" to selection", detail.display_name),
                );
                Ok(outcome)
            }
            Err(e) => {
                self.notifier
                    .notify(NoticeLevel::Danger, &format!("Failed to add node: {e}"));
                Err(e)
            }
        }
    }

    async fn append_node(&self, detail: &NodeDetail) -> Result<AddOutcome, ActionError> {
        let mut nodes = self.client.nodes().await?;
        let candidate = NodeDefinition::from_detail(detail);
        if nodes
            .iter()
            .any(|n| n.same_node(&candidate.namespace, &candidate.identifier))
        {
            return Ok(AddOutcome::AlreadyPresent);
        }

        nodes.push(candidate);
        self.dirty.mark_dirty(DIRTY_SOURCE);
        let ack = self.client.save_nodes(&nodes).await?;
        if !ack.ok {
            return Err(ActionError::Rejected(ack.reason()));
        }
        self.dirty.mark_synced(DIRTY_SOURCE);
        info!("Added {} to node selection", detail.node_id);
        Ok(AddOutcome::Added)
    }
}

fn flatten(
    state: &BrowserState,
    children: &[BrowserTreeNode],
    depth: usize,
    path: &mut HashSet<String>,
    rows: &mut Vec<BrowserRow>,
) {
    for child in children {
        let expanded = state.expanded.contains(&child.node_id);
        let level = state.level(&child.node_id);
        rows.push(BrowserRow {
            depth,
            node: child.clone(),
            expanded,
            selected: state.selection.as_deref() == Some(child.node_id.as_str()),
            children: level.clone(),
        });
        if !expanded || path.contains(&child.node_id) {
            continue;
        }
        if let ChildrenState::Loaded(grandchildren) = level {
            path.insert(child.node_id.clone());
            flatten(state, &grandchildren, depth + 1, path, rows);
            path.remove(&child.node_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::paths;
    use crate::mock::{MockRemote, RecordingNotifier};
    use crate::transport::{ApiRequest, Method, TransportError};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::time::sleep;

    fn tree(req: &ApiRequest) -> Result<Value, TransportError> {
        let node_id = req.query_param("node_id").unwrap_or_default();
        match (req.method, req.path.as_str()) {
            (Method::Get, paths::OPCUA_BROWSE) => Ok(match node_id {
                "ns=0;i=85" => json!([
                    {"node_id": "ns=2;s=Line1", "display_name": "Line1", "node_class": "Object", "has_children": true},
                    {"node_id": "ns=2;s=Empty", "display_name": "Empty", "node_class": "Object", "has_children": true},
                    {"node_id": "ns=2;s=Leaf", "display_name": "Leaf", "node_class": "Variable", "has_children": false}
                ]),
                "ns=2;s=Line1" => json!([
                    {"node_id": "ns=2;s=Line1.Temp", "display_name": "Temp", "node_class": "Variable", "has_children": false},
                    {"node_id": "ns=2;s=Line1", "display_name": "Loop", "node_class": "Object", "has_children": true}
                ]),
                _ => json!([]),
            }),
            (Method::Get, paths::OPCUA_NODE_DETAILS) => {
                let short = node_id.rsplit('=').next().unwrap_or(node_id);
                let class = if node_id.contains("Line1.") { "Variable" } else { "Object" };
                Ok(json!({
                    "node_id": node_id,
                    "display_name": short,
                    "node_class": class,
                    "namespace": 2,
                    "identifier": short,
                    "identifier_type": "s",
                    "value": 21.5
                }))
            }
            (Method::Get, paths::OPCUA_NODES) => Ok(json!([
                {"name": "Existing", "namespace": "2", "identifier": "Line1.Existing", "identifier_type": "s"}
            ])),
            _ => Ok(json!({"ok": true})),
        }
    }

    fn new_browser(remote: Arc<MockRemote>) -> (ResourceBrowser, Arc<RecordingNotifier>, DirtyTracker) {
        let notifier = Arc::new(RecordingNotifier::default());
        let dirty = DirtyTracker::new();
        let browser = ResourceBrowser::new(GatewayClient::new(remote), dirty.clone(), notifier.clone());
        (browser, notifier, dirty)
    }

    #[tokio::test]
    async fn test_children_fetched_once_across_toggles() {
        let remote = Arc::new(MockRemote::new(tree));
        let (browser, _, _) = new_browser(remote.clone());
        browser.load_root("ns=0;i=85").await.unwrap();

        assert_eq!(browser.toggle_expand("ns=2;s=Line1").await, ToggleOutcome::Loaded(2));
        assert_eq!(browser.toggle_expand("ns=2;s=Line1").await, ToggleOutcome::Collapsed);
        assert_eq!(browser.toggle_expand("ns=2;s=Line1").await, ToggleOutcome::Expanded);

        let line_fetches = remote
            .calls()
            .iter()
            .filter(|c| c.query_param("node_id") == Some("ns=2;s=Line1"))
            .count();
        assert_eq!(line_fetches, 1);
    }

    #[tokio::test]
    async fn test_leaf_and_unknown_nodes_never_fetch() {
        let remote = Arc::new(MockRemote::new(tree));
        let (browser, _, _) = new_browser(remote.clone());
        browser.load_root("ns=0;i=85").await.unwrap();

        assert_eq!(browser.toggle_expand("ns=2;s=Leaf").await, ToggleOutcome::Leaf);
        assert_eq!(browser.toggle_expand("ns=9;s=Nope").await, ToggleOutcome::Unknown);
        assert_eq!(remote.count(Method::Get, paths::OPCUA_BROWSE), 1);
    }

    #[tokio::test]
    async fn test_empty_level_is_loaded() {
        let remote = Arc::new(MockRemote::new(tree));
        let (browser, _, _) = new_browser(remote);
        browser.load_root("ns=0;i=85").await.unwrap();

        assert_eq!(browser.toggle_expand("ns=2;s=Empty").await, ToggleOutcome::Loaded(0));
        assert_eq!(browser.children_of("ns=2;s=Empty"), ChildrenState::Loaded(vec![]));
    }

    #[tokio::test]
    async fn test_root_failure_kinds() {
        let remote = Arc::new(MockRemote::new(|_| Ok(json!({"error": "OPC UA endpoint not configured"}))));
        let (browser, _, _) = new_browser(remote);
        let failure = browser.load_root("ns=0;i=85").await.unwrap_err();
        assert!(matches!(failure, BrowseFailure::NotConnected(ref msg) if msg.contains("not configured")));
        assert_eq!(browser.root_state(), ChildrenState::Failed(failure));

        let remote = Arc::new(MockRemote::new(|req| {
            Err(TransportError::Request {
                path: req.path.clone(),
                reason: "connection refused".to_string(),
            })
        }));
        let (browser, _, _) = new_browser(remote);
        let failure = browser.load_root("ns=0;i=85").await.unwrap_err();
        assert!(matches!(failure, BrowseFailure::Unreachable(_)));
        assert!(failure.remediation().contains("backend"));
    }

    #[tokio::test]
    async fn test_failed_level_retried_on_next_expand() {
        let fail = Arc::new(std::sync::atomic::AtomicBool::new(true));
        let flag = fail.clone();
        let remote = Arc::new(MockRemote::new(move |req| {
            if req.query_param("node_id") == Some("ns=2;s=Line1")
                && flag.swap(false, std::sync::atomic::Ordering::SeqCst)
            {
                return Ok(json!({"error": "session closed"}));
            }
            tree(req)
        }));
        let (browser, _, _) = new_browser(remote);
        browser.load_root("ns=0;i=85").await.unwrap();

        assert!(matches!(
            browser.toggle_expand("ns=2;s=Line1").await,
            ToggleOutcome::Failed(BrowseFailure::NotConnected(_))
        ));
        assert_eq!(browser.toggle_expand("ns=2;s=Line1").await, ToggleOutcome::Collapsed);
        assert_eq!(browser.toggle_expand("ns=2;s=Line1").await, ToggleOutcome::Loaded(2));
    }

    #[tokio::test]
    async fn test_visible_rows_follow_expansion_and_stop_at_cycles() {
        let remote = Arc::new(MockRemote::new(tree));
        let (browser, _, _) = new_browser(remote);
        browser.load_root("ns=0;i=85").await.unwrap();
        assert_eq!(browser.visible_rows().len(), 3);

        browser.toggle_expand("ns=2;s=Line1").await;
        let rows = browser.visible_rows();
        let names: Vec<(usize, &str)> = rows
            .iter()
            .map(|r| (r.depth, r.node.display_name.as_str()))
            .collect();
        // Line1 lists itself as a child; it is shown but not descended into.
        assert_eq!(
            names,
            vec![(0, "Line1"), (1, "Temp"), (1, "Loop"), (0, "Empty"), (0, "Leaf")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_detail_for_old_selection_is_discarded() {
        let remote = Arc::new(MockRemote::new(tree).with_delay(|req| {
            (req.query_param("node_id") == Some("ns=2;s=Line1")).then(|| Duration::from_secs(3))
        }));
        let (browser, _, _) = new_browser(remote);
        browser.load_root("ns=0;i=85").await.unwrap();

        let slow = {
            let browser = browser.clone();
            tokio::spawn(async move { browser.select_node("ns=2;s=Line1").await })
        };
        sleep(Duration::from_millis(10)).await;
        assert!(browser.select_node("ns=2;s=Line1.Temp").await);
        assert!(!slow.await.unwrap());

        assert_eq!(browser.selection().as_deref(), Some("ns=2;s=Line1.Temp"));
        match browser.detail() {
            DetailState::Ready(detail) => assert_eq!(detail.node_id, "ns=2;s=Line1.Temp"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_load_root_resets_selection() {
        let remote = Arc::new(MockRemote::new(tree));
        let (browser, _, _) = new_browser(remote);
        browser.load_root("ns=0;i=85").await.unwrap();
        browser.select_node("ns=2;s=Line1").await;
        browser.toggle_expand("ns=2;s=Line1").await;

        browser.load_root("ns=0;i=85").await.unwrap();
        assert_eq!(browser.selection(), None);
        assert_eq!(browser.detail(), DetailState::Empty);
        assert!(!browser.is_expanded("ns=2;s=Line1"));
    }

    #[tokio::test]
    async fn test_add_selected_appends_with_defaults() {
        let remote = Arc::new(MockRemote::new(tree));
        let (browser, notifier, dirty) = new_browser(remote.clone());
        browser.load_root("ns=0;i=85").await.unwrap();
        browser.select_node("ns=2;s=Line1.Temp").await;
        assert!(browser.can_add_selected());

        assert_eq!(browser.add_selected_to_collection().await.unwrap(), AddOutcome::Added);
        let saved: Vec<Value> = remote
            .calls()
            .into_iter()
            .filter(|c| c.method == Method::Post && c.path == paths::OPCUA_NODES)
            .filter_map(|c| c.body)
            .collect();
        assert_eq!(saved.len(), 1);
        let list = saved[0].as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(
            list[1],
            json!({
                "name": "Line1.Temp",
                "namespace": "2",
                "identifier": "Line1.Temp",
                "identifier_type": "s",
                "sampling_mode": "polling",
                "interval": "1s",
                "deadband_type": "None",
                "deadband_value": 0.0
            })
        );
        assert_eq!(notifier.last().unwrap().0, NoticeLevel::Success);
        assert!(!dirty.is_dirty());
    }

    #[tokio::test]
    async fn test_failed_add_stays_dirty_and_spares_other_sources() {
        let remote = Arc::new(MockRemote::new(|req| match (req.method, req.path.as_str()) {
            (Method::Post, paths::OPCUA_NODES) => Ok(json!({"error": "disk full"})),
            _ => tree(req),
        }));
        let (browser, notifier, dirty) = new_browser(remote);
        dirty.mark_dirty("registers");
        browser.load_root("ns=0;i=85").await.unwrap();
        browser.select_node("ns=2;s=Line1.Temp").await;

        let err = browser.add_selected_to_collection().await.unwrap_err();
        assert!(matches!(err, ActionError::Rejected(ref reason) if reason == "disk full"));
        assert!(dirty.is_source_dirty(DIRTY_SOURCE));
        assert!(dirty.is_source_dirty("registers"));
        assert_eq!(notifier.last().unwrap().0, NoticeLevel::Danger);
    }

    #[tokio::test]
    async fn test_successful_add_keeps_other_sources_dirty() {
        let remote = Arc::new(MockRemote::new(tree));
        let (browser, _, dirty) = new_browser(remote);
        dirty.mark_dirty("nodes");
        browser.load_root("ns=0;i=85").await.unwrap();
        browser.select_node("ns=2;s=Line1.Temp").await;

        assert_eq!(browser.add_selected_to_collection().await.unwrap(), AddOutcome::Added);
        assert!(!dirty.is_source_dirty(DIRTY_SOURCE));
        assert_eq!(dirty.dirty_sources(), vec!["nodes".to_string()]);
    }

    #[tokio::test]
    async fn test_add_selected_skips_duplicates() {
        let remote = Arc::new(MockRemote::new(tree));
        let (browser, notifier, _) = new_browser(remote.clone());
        browser.load_root("ns=0;i=85").await.unwrap();
        browser.select_node("ns=2;s=Line1.Existing").await;

        assert_eq!(
            browser.add_selected_to_collection().await.unwrap(),
            AddOutcome::AlreadyPresent
        );
        assert_eq!(remote.count(Method::Post, paths::OPCUA_NODES), 0);
        assert_eq!(
            notifier.last(),
            Some((NoticeLevel::Warning, "Node already in selection".to_string()))
        );
    }

    #[tokio::test]
    async fn test_add_without_selection() {
        let remote = Arc::new(MockRemote::new(tree));
        let (browser, _, _) = new_browser(remote.clone());
        assert_eq!(
            browser.add_selected_to_collection().await.unwrap(),
            AddOutcome::NothingSelected
        );
        assert!(remote.calls().is_empty());
        assert!(!browser.can_add_selected());
    }

    #[tokio::test]
    async fn test_selected_count() {
        let remote = Arc::new(MockRemote::new(tree));
        let (browser, _, _) = new_browser(remote);
        assert_eq!(browser.selected_count().await.unwrap(), 1);
    }
}
