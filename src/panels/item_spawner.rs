//! Item spawner panel: a scrollable list of catalog entries, a quantity field
//! and a spawn button.

use tracing::debug;

use super::catalog::CatalogEntry;
use crate::error::PanelResult;
use crate::host::{NodeId, NodeKind, NodeRect, NodeSpec, UiHost};
use crate::layout::{ScrollContainer, ScrollSpec, ScrollUpdate};

pub const NO_SELECTION_TEXT: &str = "No item selected";
pub const EMPTY_LIST_TEXT: &str = "No items found.";
const MARGIN: f32 = 10.0;
const ROW_HEIGHT: f32 = 24.0;
const LIST_TOP: f32 = MARGIN + ROW_HEIGHT + 6.0;

#[derive(Debug)]
pub struct ItemSpawnerView {
    selected_label: NodeId,
    list: ScrollContainer,
    rows: Vec<(CatalogEntry, NodeId)>,
    placeholder: Option<NodeId>,
    quantity: NodeId,
    button: NodeId,
    status: NodeId,
    selected: Option<CatalogEntry>,
}

impl ItemSpawnerView {
    pub fn frame(spec: &ScrollSpec) -> NodeRect {
        let width = spec.grid.content_width() + spec.style.reserved_track() + 2.0 * MARGIN;
        let height = LIST_TOP + spec.viewport_height + 2.0 * (ROW_HEIGHT + 6.0) + MARGIN;
        NodeRect::new(MARGIN, MARGIN, width.max(300.0), height)
    }

    pub fn build(
        host: &mut dyn UiHost,
        root: NodeId,
        spec: ScrollSpec,
        entries: &[CatalogEntry],
    ) -> PanelResult<Self> {
        let controls_top = LIST_TOP + spec.viewport_height + 6.0;
        let selected_label = host.spawn(
            root,
            NodeSpec::new("spawner/selected", NodeKind::Label, NodeRect::new(MARGIN, MARGIN, 280.0, ROW_HEIGHT))
                .with_text(NO_SELECTION_TEXT),
        )?;
        let list = ScrollContainer::build(host, root, "spawner/list", (MARGIN, LIST_TOP), spec, 0)?;
        let quantity = host.spawn(
            root,
            NodeSpec::new(
                "spawner/quantity",
                NodeKind::Input,
                NodeRect::new(MARGIN, controls_top, 80.0, ROW_HEIGHT),
            )
            .with_text("1"),
        )?;
        let button = host.spawn(
            root,
            NodeSpec::new(
                "spawner/spawn",
                NodeKind::Button,
                NodeRect::new(MARGIN + 90.0, controls_top, 80.0, ROW_HEIGHT),
            )
            .with_text("Spawn"),
        )?;
        let status = host.spawn(
            root,
            NodeSpec::new(
                "spawner/status",
                NodeKind::Label,
                NodeRect::new(MARGIN, controls_top + ROW_HEIGHT + 6.0, 280.0, ROW_HEIGHT),
            )
            .with_text(""),
        )?;

        let mut view = Self {
            selected_label,
            list,
            rows: Vec::new(),
            placeholder: None,
            quantity,
            button,
            status,
            selected: None,
        };
        view.populate(host, entries)?;
        Ok(view)
    }

    /// Replace the list rows with `entries`, keeping the list container.
    pub fn populate(&mut self, host: &mut dyn UiHost, entries: &[CatalogEntry]) -> PanelResult<ScrollUpdate> {
        for (_, row) in self.rows.drain(..) {
            host.destroy(row);
        }
        if let Some(placeholder) = self.placeholder.take() {
            host.destroy(placeholder);
        }

        let update = self.list.update(host, entries.len())?;
        let grid = *self.list.state().grid();
        let content = self.list.content();

        if entries.is_empty() {
            let (x, y) = grid.cell_origin(0);
            self.placeholder = Some(host.spawn(
                content,
                NodeSpec::new(
                    "spawner/empty",
                    NodeKind::Label,
                    NodeRect::new(x, y, grid.cell.width, grid.cell.height),
                )
                .with_text(EMPTY_LIST_TEXT),
            )?);
        }
        for (index, entry) in entries.iter().enumerate() {
            let (x, y) = grid.cell_origin(index);
            let row = host.spawn(
                content,
                NodeSpec::new(
                    format!("spawner/item/{}", entry.id),
                    NodeKind::Button,
                    NodeRect::new(x, y, grid.cell.width, grid.cell.height),
                )
                .with_text(entry.label.as_str()),
            )?;
            self.rows.push((entry.clone(), row));
        }

        if let Some(selected) = &self.selected {
            if !entries.iter().any(|e| e.id == selected.id) {
                debug!("Selected item '{}' left the catalog", selected.id);
                self.selected = None;
                host.set_text(self.selected_label, NO_SELECTION_TEXT);
            }
        }
        Ok(update)
    }

    /// Select the row for `item_id`. Returns the entry when it is listed.
    pub fn select(&mut self, host: &mut dyn UiHost, item_id: &str) -> Option<&CatalogEntry> {
        let entry = self
            .rows
            .iter()
            .find(|(entry, _)| entry.id == item_id)
            .map(|(entry, _)| entry.clone())?;
        host.set_text(self.selected_label, &format!("Selected: {}", entry.label));
        self.selected = Some(entry);
        self.selected.as_ref()
    }

    pub fn selected(&self) -> Option<&CatalogEntry> {
        self.selected.as_ref()
    }

    /// Requested unit count, at least 1 and at most `max`. Anything
    /// unparseable or non-positive resets the field to 1; a count above
    /// `max` is written back clamped.
    pub fn read_quantity(&self, host: &mut dyn UiHost, max: usize) -> usize {
        let raw = host.text(self.quantity).unwrap_or_default();
        let max = max.max(1);
        match raw.trim().parse::<usize>() {
            Ok(count) if count > max => {
                debug!("Spawn quantity {} above limit, clamped to {}", count, max);
                host.set_text(self.quantity, &max.to_string());
                max
            }
            Ok(count) if count >= 1 => count,
            _ => {
                debug!("Spawn quantity '{}' is not a positive number, using 1", raw);
                host.set_text(self.quantity, "1");
                1
            }
        }
    }

    pub fn set_quantity(&self, host: &mut dyn UiHost, text: &str) {
        host.set_text(self.quantity, text);
    }

    pub fn set_status(&self, host: &mut dyn UiHost, text: &str) {
        host.set_text(self.status, text);
    }

    pub fn status(&self, host: &dyn UiHost) -> String {
        host.text(self.status).unwrap_or_default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn has_placeholder(&self) -> bool {
        self.placeholder.is_some()
    }

    pub fn list(&self) -> &ScrollContainer {
        &self.list
    }

    pub fn scroll_by(&mut self, host: &mut dyn UiHost, delta: f32) -> f32 {
        self.list.scroll_by(host, delta)
    }

    pub fn button(&self) -> NodeId {
        self.button
    }

    pub fn selected_label(&self) -> NodeId {
        self.selected_label
    }
}
