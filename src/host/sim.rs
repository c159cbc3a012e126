//! In-memory host used by the `simulate` command and by tests.
//!
//! Destruction follows the deferred model: `destroy` only flags a node, which
//! stops reporting alive immediately, and the node is dropped from the tree in
//! [`SimUi::end_frame`]. Inventory requests queue up until [`SimInventory::settle`]
//! answers them, so tests control exactly when completions arrive.

use std::collections::{BTreeMap, VecDeque};

use super::{
    CatalogSource, HostContext, InventoryService, NodeId, NodeKind, NodeRect, NodeSpec, UiHost,
    WindowKind,
};
use crate::core::coordinator::Completer;
use crate::error::{PanelError, PanelResult};

#[derive(Debug, Clone)]
struct SimNode {
    parent: Option<NodeId>,
    name: String,
    kind: NodeKind,
    rect: NodeRect,
    text: Option<String>,
    active: bool,
    pending_destroy: bool,
}

/// Window tree with deferred destruction.
#[derive(Debug, Default)]
pub struct SimUi {
    next_id: u64,
    nodes: BTreeMap<NodeId, SimNode>,
    /// Open windows: (window node, anchor node)
    windows: BTreeMap<WindowKind, (NodeId, NodeId)>,
    frames: u64,
}

impl SimUi {
    fn insert(&mut self, parent: Option<NodeId>, spec: NodeSpec) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.nodes.insert(
            id,
            SimNode {
                parent,
                name: spec.name,
                kind: spec.kind,
                rect: spec.rect,
                text: spec.text,
                active: true,
                pending_destroy: false,
            },
        );
        id
    }

    /// Open `window` and return its anchor. Opening an open window is a no-op.
    pub fn open_window(&mut self, window: WindowKind) -> NodeId {
        if let Some((_, anchor)) = self.windows.get(&window) {
            return *anchor;
        }
        let root = self.insert(
            None,
            NodeSpec::new(
                format!("window/{}", window),
                NodeKind::Window,
                NodeRect::new(0.0, 0.0, 800.0, 600.0),
            ),
        );
        let anchor = self.insert(
            Some(root),
            NodeSpec::new(
                format!("{}/anchor", window),
                NodeKind::Anchor,
                NodeRect::new(0.0, 0.0, 800.0, 600.0),
            ),
        );
        self.windows.insert(window, (root, anchor));
        anchor
    }

    /// Close `window`, destroying its subtree at the end of the frame.
    pub fn close_window(&mut self, window: WindowKind) -> bool {
        match self.windows.remove(&window) {
            Some((root, _)) => {
                self.destroy(root);
                true
            }
            None => false,
        }
    }

    /// Tear down and reopen `window` without any host event, the way a host
    /// may rebuild its UI behind the integration's back.
    pub fn rebuild_window(&mut self, window: WindowKind) -> NodeId {
        self.close_window(window);
        self.open_window(window)
    }

    pub fn close_all_windows(&mut self) {
        let open: Vec<WindowKind> = self.windows.keys().copied().collect();
        for window in open {
            self.close_window(window);
        }
    }

    pub fn is_open(&self, window: WindowKind) -> bool {
        self.windows.contains_key(&window)
    }

    /// Drop every node destroyed during this frame. Returns how many went.
    pub fn end_frame(&mut self) -> usize {
        let dead: Vec<NodeId> = self
            .nodes
            .keys()
            .copied()
            .filter(|id| !self.is_alive(*id))
            .collect();
        for id in &dead {
            self.nodes.remove(id);
        }
        self.frames += 1;
        dead.len()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Nodes still in the tree, including those waiting for end of frame
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn live_node_count(&self) -> usize {
        self.nodes.keys().filter(|id| self.is_alive(**id)).count()
    }

    /// Live nodes named `name`
    pub fn count_named(&self, name: &str) -> usize {
        self.nodes
            .iter()
            .filter(|(id, node)| node.name == name && self.is_alive(**id))
            .count()
    }

    /// Live nodes named `name` that are also visible
    pub fn count_shown(&self, name: &str) -> usize {
        self.nodes
            .iter()
            .filter(|(id, node)| node.name == name && self.is_visible(**id))
            .count()
    }

    pub fn count_kind(&self, kind: NodeKind) -> usize {
        self.nodes
            .iter()
            .filter(|(id, node)| node.kind == kind && self.is_alive(**id))
            .count()
    }

    /// Alive and every node up to the window is active.
    pub fn is_visible(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            match self.nodes.get(&id) {
                Some(n) if n.active && !n.pending_destroy => current = n.parent,
                _ => return false,
            }
        }
        true
    }
}

#[cfg(test)]
impl SimUi {
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(id, node)| node.name == name && self.is_alive(**id))
            .map(|(id, _)| *id)
    }

    pub fn children(&self, parent: NodeId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(id, node)| node.parent == Some(parent) && self.is_alive(**id))
            .map(|(id, _)| *id)
            .collect()
    }
}

impl UiHost for SimUi {
    fn resolve_anchor(&self, window: WindowKind) -> Option<NodeId> {
        self.windows.get(&window).map(|(_, anchor)| *anchor)
    }

    fn is_alive(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            match self.nodes.get(&current) {
                Some(n) if !n.pending_destroy => match n.parent {
                    Some(parent) => current = parent,
                    None => return true,
                },
                _ => return false,
            }
        }
    }

    fn spawn(&mut self, parent: NodeId, spec: NodeSpec) -> PanelResult<NodeId> {
        if !self.is_alive(parent) {
            return Err(PanelError::InvalidParent(parent));
        }
        Ok(self.insert(Some(parent), spec))
    }

    fn destroy(&mut self, node: NodeId) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.pending_destroy = true;
        }
    }

    fn rect(&self, node: NodeId) -> Option<NodeRect> {
        self.nodes.get(&node).map(|n| n.rect)
    }

    fn set_rect(&mut self, node: NodeId, rect: NodeRect) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.rect = rect;
        }
    }

    fn set_active(&mut self, node: NodeId, active: bool) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.active = active;
        }
    }

    fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.text = Some(text.to_string());
        }
    }

    fn text(&self, node: NodeId) -> Option<String> {
        self.nodes.get(&node).and_then(|n| n.text.clone())
    }
}

#[derive(Debug)]
enum SimOp {
    Resize { offset: i64, done: Completer },
    Spawn { item_id: String, done: Completer },
}

/// Player inventory whose requests resolve on [`SimInventory::settle`].
///
/// Spawns fail once every slot is filled; resizes fail when the result would
/// drop below one slot or cut into occupied slots.
#[derive(Debug, Default)]
pub struct SimInventory {
    size: Option<i64>,
    items: Vec<String>,
    queued: VecDeque<SimOp>,
    next_instance: i64,
    calls: usize,
}

impl SimInventory {
    pub fn new(size: i64) -> Self {
        Self {
            size: Some(size),
            ..Self::default()
        }
    }

    /// No player loaded yet
    pub fn unloaded() -> Self {
        Self::default()
    }

    pub fn load(&mut self, size: i64) {
        self.size = Some(size);
    }

    pub fn size(&self) -> Option<i64> {
        self.size
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Collaborator calls received so far
    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn queued(&self) -> usize {
        self.queued.len()
    }

    /// Answer every queued request in order. Returns how many were answered.
    pub fn settle(&mut self) -> usize {
        self.settle_some(usize::MAX)
    }

    pub fn settle_some(&mut self, limit: usize) -> usize {
        let mut answered = 0;
        while answered < limit {
            let Some(op) = self.queued.pop_front() else {
                break;
            };
            self.answer(op);
            answered += 1;
        }
        answered
    }

    /// Lose every queued request without answering.
    pub fn drop_pending(&mut self) -> usize {
        let dropped = self.queued.len();
        self.queued.clear();
        dropped
    }

    fn answer(&mut self, op: SimOp) {
        match op {
            SimOp::Resize { offset, done } => {
                let Some(size) = self.size else {
                    done.fail("no inventory loaded");
                    return;
                };
                let target = size + offset;
                if target < 1 {
                    done.fail(format!("cannot shrink to {} slots", target));
                } else if target < self.items.len() as i64 {
                    done.fail(format!("{} slots are occupied", self.items.len()));
                } else {
                    self.size = Some(target);
                    done.succeed(target);
                }
            }
            SimOp::Spawn { item_id, done } => match self.size {
                None => done.fail("no inventory loaded"),
                Some(size) if self.items.len() as i64 >= size => done.fail("inventory full"),
                Some(_) => {
                    self.items.push(item_id);
                    self.next_instance += 1;
                    done.succeed(self.next_instance);
                }
            },
        }
    }
}

impl InventoryService for SimInventory {
    fn current_quantity(&self) -> Option<i64> {
        self.size
    }

    fn request_quantity_change(&mut self, offset: i64, done: Completer) {
        self.calls += 1;
        self.queued.push_back(SimOp::Resize { offset, done });
    }

    fn request_spawn(&mut self, item_id: &str, done: Completer) {
        self.calls += 1;
        self.queued.push_back(SimOp::Spawn {
            item_id: item_id.to_string(),
            done,
        });
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimCatalog {
    entries: Vec<(String, String)>,
}

impl SimCatalog {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(id, label)| (id.into(), label.into()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CatalogSource for SimCatalog {
    fn list_catalog_entries(&self) -> Vec<(String, String)> {
        self.entries.clone()
    }
}

/// Every collaborator in one place.
#[derive(Debug, Default)]
pub struct SimHost {
    pub ui: SimUi,
    pub inventory: SimInventory,
    pub catalog: SimCatalog,
}

impl SimHost {
    pub fn new(inventory: SimInventory, catalog: SimCatalog) -> Self {
        Self {
            ui: SimUi::default(),
            inventory,
            catalog,
        }
    }

    pub fn context(&mut self) -> HostContext<'_> {
        HostContext::new(&mut self.ui, &mut self.inventory, &self.catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::coordinator::{Origin, Outcome, RequestCoordinator};
    use crate::panels::Generation;
    use std::time::{Duration, Instant};

    #[test]
    fn test_destroy_is_deferred_until_end_of_frame() {
        let mut ui = SimUi::default();
        let anchor = ui.open_window(WindowKind::Equipment);
        let panel = ui
            .spawn(anchor, NodeSpec::new("panel", NodeKind::Panel, NodeRect::default()))
            .unwrap();
        let label = ui
            .spawn(panel, NodeSpec::new("label", NodeKind::Label, NodeRect::default()))
            .unwrap();

        ui.destroy(panel);
        assert!(!ui.is_alive(panel));
        assert!(!ui.is_alive(label));
        assert!(ui.is_alive(anchor));
        // Still in the tree until the frame ends
        assert_eq!(ui.node_count(), 4);

        assert_eq!(ui.end_frame(), 2);
        assert_eq!(ui.node_count(), 2);
    }

    #[test]
    fn test_rebuild_window_orphans_old_anchor() {
        let mut ui = SimUi::default();
        let old = ui.open_window(WindowKind::Equipment);
        let new = ui.rebuild_window(WindowKind::Equipment);

        assert_ne!(old, new);
        assert!(!ui.is_alive(old));
        assert_eq!(ui.resolve_anchor(WindowKind::Equipment), Some(new));
        assert!(matches!(
            ui.spawn(old, NodeSpec::new("x", NodeKind::Label, NodeRect::default())),
            Err(PanelError::InvalidParent(_))
        ));
    }

    #[test]
    fn test_visibility_follows_ancestors() {
        let mut ui = SimUi::default();
        let anchor = ui.open_window(WindowKind::Container);
        let panel = ui
            .spawn(anchor, NodeSpec::new("panel", NodeKind::Panel, NodeRect::default()))
            .unwrap();
        assert!(ui.is_visible(panel));

        ui.set_active(anchor, false);
        assert!(!ui.is_visible(panel));
        assert!(ui.is_alive(panel));
    }

    #[test]
    fn test_inventory_resolves_on_settle() {
        let mut inventory = SimInventory::new(10);
        let mut coordinator = RequestCoordinator::new(Duration::from_secs(5));
        let origin = Origin::Session(Generation::from_raw(1));
        let now = Instant::now();

        coordinator.submit_quantity_change(origin, 10, 3, &mut inventory, now);
        coordinator.submit_spawn_batch(origin, "Iron", 5, &mut inventory, now);
        assert_eq!(inventory.calls(), 6);
        assert!(coordinator.process(now, |_| true).is_empty());

        assert_eq!(inventory.settle(), 6);
        let resolved = coordinator.process(now, |_| true);
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].outcome, Outcome::Succeeded(3));
        match resolved[1].outcome {
            Outcome::Batch(tally) => {
                assert_eq!(tally.succeeded, 3);
                assert_eq!(tally.failed, 2);
            }
            ref other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(inventory.items().len(), 3);
    }

    #[test]
    fn test_shrink_below_one_slot_fails() {
        let mut inventory = SimInventory::new(4);
        let mut coordinator = RequestCoordinator::new(Duration::from_secs(5));
        let now = Instant::now();

        coordinator.submit_quantity_change(
            Origin::Session(Generation::from_raw(1)),
            4,
            0,
            &mut inventory,
            now,
        );
        inventory.settle();
        let resolved = coordinator.process(now, |_| true);
        assert!(matches!(resolved[0].outcome, Outcome::Failed(_)));
        assert_eq!(inventory.size(), Some(4));
    }
}
