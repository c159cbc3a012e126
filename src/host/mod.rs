//! Host boundary
//!
//! The host application owns the window tree, the inventory and the item
//! definitions. The core only reaches it through the narrow traits below;
//! the integration layer translates host-specific hooks into [`HostEvent`]s.

pub mod events;
pub mod script;
pub mod sim;

pub use events::HostEvent;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::coordinator::Completer;
use crate::error::PanelResult;

/// Opaque identity of a host UI node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Host windows a panel can be anchored beneath
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    Equipment,
    Container,
    Crafting,
}

impl WindowKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            WindowKind::Equipment => "equipment",
            WindowKind::Container => "container",
            WindowKind::Crafting => "crafting",
        }
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Window,
    Anchor,
    Panel,
    Label,
    Input,
    Button,
    ScrollRegion,
    Viewport,
    Content,
    Scrollbar,
    ScrollbarHandle,
    Cell,
}

/// Position relative to the parent node plus size, in host pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NodeRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl NodeRect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Everything needed to allocate one node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub name: String,
    pub kind: NodeKind,
    pub rect: NodeRect,
    pub text: Option<String>,
}

impl NodeSpec {
    pub fn new(name: impl Into<String>, kind: NodeKind, rect: NodeRect) -> Self {
        Self {
            name: name.into(),
            kind,
            rect,
            text: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// Window tree operations plus anchor resolution.
///
/// `destroy` is a request: the host may keep the node around until the end of
/// its frame, but `is_alive` must report false for it immediately.
pub trait UiHost {
    /// Node a panel for `window` attaches beneath, if that window is open.
    fn resolve_anchor(&self, window: WindowKind) -> Option<NodeId>;

    /// True while the node and all of its ancestors are attached to the tree.
    fn is_alive(&self, node: NodeId) -> bool;

    /// Allocate a node under `parent`. Fails with `InvalidParent` when the
    /// parent is not alive.
    fn spawn(&mut self, parent: NodeId, spec: NodeSpec) -> PanelResult<NodeId>;

    fn destroy(&mut self, node: NodeId);

    fn rect(&self, node: NodeId) -> Option<NodeRect>;

    fn set_rect(&mut self, node: NodeId, rect: NodeRect);

    fn set_active(&mut self, node: NodeId, active: bool);

    fn set_text(&mut self, node: NodeId, text: &str);

    fn text(&self, node: NodeId) -> Option<String>;
}

/// Player inventory operations. Completion arrives later through the
/// [`Completer`], possibly after the panel that asked is gone.
pub trait InventoryService {
    fn current_quantity(&self) -> Option<i64>;

    /// Grow or shrink by a signed slot offset. Succeeds with the new size.
    fn request_quantity_change(&mut self, offset: i64, done: Completer);

    /// Spawn one unit of `item_id`. Succeeds with the new instance id.
    fn request_spawn(&mut self, item_id: &str, done: Completer);
}

/// Source of spawnable item definitions as `(id, display label)` pairs.
pub trait CatalogSource {
    fn list_catalog_entries(&self) -> Vec<(String, String)>;
}

/// Borrowed view of every collaborator one core call may need.
pub struct HostContext<'a> {
    pub ui: &'a mut dyn UiHost,
    pub inventory: &'a mut dyn InventoryService,
    pub catalog: &'a dyn CatalogSource,
}

impl<'a> HostContext<'a> {
    pub fn new(
        ui: &'a mut dyn UiHost,
        inventory: &'a mut dyn InventoryService,
        catalog: &'a dyn CatalogSource,
    ) -> Self {
        Self {
            ui,
            inventory,
            catalog,
        }
    }
}
