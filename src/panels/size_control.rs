//! Size control panel: a numeric input that resizes the player's inventory,
//! above a scrollable grid with one cell per inventory slot.

use crate::error::{PanelError, PanelResult};
use crate::host::{NodeId, NodeKind, NodeRect, NodeSpec, UiHost};
use crate::layout::{ScrollContainer, ScrollSpec, ScrollUpdate};

const TITLE: &str = "Backpack Size:";
const APPLY_LABEL: &str = "Set Size";
const MARGIN: f32 = 10.0;
const ROW_HEIGHT: f32 = 24.0;
const GRID_TOP: f32 = MARGIN + 2.0 * (ROW_HEIGHT + 6.0);

#[derive(Debug)]
pub struct SizeControlView {
    input: NodeId,
    button: NodeId,
    status: NodeId,
    grid: ScrollContainer,
    cells: Vec<NodeId>,
}

impl SizeControlView {
    /// Panel rect that fits the controls and a grid built from `spec`.
    pub fn frame(spec: &ScrollSpec) -> NodeRect {
        let width = spec.grid.content_width() + spec.style.reserved_track() + 2.0 * MARGIN;
        let height = GRID_TOP + spec.viewport_height + MARGIN;
        NodeRect::new(MARGIN, MARGIN, width.max(300.0), height)
    }

    pub fn build(
        host: &mut dyn UiHost,
        root: NodeId,
        spec: ScrollSpec,
        quantity: Option<i64>,
    ) -> PanelResult<Self> {
        host.spawn(
            root,
            NodeSpec::new("size/title", NodeKind::Label, NodeRect::new(MARGIN, MARGIN, 110.0, ROW_HEIGHT))
                .with_text(TITLE),
        )?;
        let input = host.spawn(
            root,
            NodeSpec::new("size/input", NodeKind::Input, NodeRect::new(125.0, MARGIN, 80.0, ROW_HEIGHT))
                .with_text(quantity.map(|q| q.to_string()).unwrap_or_default()),
        )?;
        let button = host.spawn(
            root,
            NodeSpec::new("size/apply", NodeKind::Button, NodeRect::new(215.0, MARGIN, 80.0, ROW_HEIGHT))
                .with_text(APPLY_LABEL),
        )?;
        let status = host.spawn(
            root,
            NodeSpec::new(
                "size/status",
                NodeKind::Label,
                NodeRect::new(MARGIN, MARGIN + ROW_HEIGHT + 6.0, 285.0, ROW_HEIGHT),
            )
            .with_text(""),
        )?;

        let slots = quantity.map(|q| q.max(0) as usize).unwrap_or(0);
        let grid = ScrollContainer::build(host, root, "size/grid", (MARGIN, GRID_TOP), spec, slots)?;

        let mut view = Self {
            input,
            button,
            status,
            grid,
            cells: Vec::new(),
        };
        view.fill_cells(host, slots)?;
        Ok(view)
    }

    /// Parse the input as a slot count inside `min..=max`.
    pub fn read_target(&self, host: &dyn UiHost, min: i64, max: i64) -> PanelResult<i64> {
        let raw = host.text(self.input).unwrap_or_default();
        let value: i64 = raw
            .trim()
            .parse()
            .map_err(|_| PanelError::InvalidNumber(raw.trim().to_string()))?;
        if value < min || value > max {
            return Err(PanelError::QuantityOutOfRange { value, min, max });
        }
        Ok(value)
    }

    pub fn show_quantity(&self, host: &mut dyn UiHost, quantity: i64) {
        host.set_text(self.input, &quantity.to_string());
    }

    pub fn set_input(&self, host: &mut dyn UiHost, text: &str) {
        host.set_text(self.input, text);
    }

    pub fn set_status(&self, host: &mut dyn UiHost, text: &str) {
        host.set_text(self.status, text);
    }

    pub fn status(&self, host: &dyn UiHost) -> String {
        host.text(self.status).unwrap_or_default()
    }

    /// Resize the slot grid in place to `slots` cells.
    pub fn sync_slots(&mut self, host: &mut dyn UiHost, slots: usize) -> PanelResult<ScrollUpdate> {
        let update = self.grid.update(host, slots)?;
        self.fill_cells(host, slots)?;
        Ok(update)
    }

    fn fill_cells(&mut self, host: &mut dyn UiHost, slots: usize) -> PanelResult<()> {
        let grid = *self.grid.state().grid();
        while self.cells.len() > slots {
            if let Some(cell) = self.cells.pop() {
                host.destroy(cell);
            }
        }
        while self.cells.len() < slots {
            let index = self.cells.len();
            let (x, y) = grid.cell_origin(index);
            let cell = host.spawn(
                self.grid.content(),
                NodeSpec::new(
                    format!("size/slot/{}", index),
                    NodeKind::Cell,
                    NodeRect::new(x, y, grid.cell.width, grid.cell.height),
                ),
            )?;
            self.cells.push(cell);
        }
        Ok(())
    }

    pub fn input(&self) -> NodeId {
        self.input
    }

    pub fn button(&self) -> NodeId {
        self.button
    }

    pub fn grid(&self) -> &ScrollContainer {
        &self.grid
    }

    pub fn scroll_by(&mut self, host: &mut dyn UiHost, delta: f32) -> f32 {
        self.grid.scroll_by(host, delta)
    }

    pub fn slot_count(&self) -> usize {
        self.cells.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::sim::SimUi;
    use crate::host::WindowKind;
    use crate::layout::{GridSpec, Padding, ScrollStyle, Size, Spacing};

    fn spec() -> ScrollSpec {
        ScrollSpec::new(
            GridSpec::new(6, Size::new(50.0, 50.0), Spacing::new(2.0, 2.0), Padding::default()),
            ScrollStyle::default(),
            400.0,
        )
    }

    fn build(quantity: Option<i64>) -> (SimUi, SizeControlView) {
        let mut ui = SimUi::default();
        let anchor = ui.open_window(WindowKind::Equipment);
        let view = SizeControlView::build(&mut ui, anchor, spec(), quantity).unwrap();
        (ui, view)
    }

    #[test]
    fn test_build_seeds_input_and_grid() {
        let (ui, view) = build(Some(54));
        assert_eq!(ui.text(view.input()).as_deref(), Some("54"));
        assert_eq!(ui.text(view.button()).as_deref(), Some("Set Size"));
        assert_eq!(view.slot_count(), 54);
        assert!(view.grid().scrollbar().is_some());
    }

    #[test]
    fn test_read_target_validates_input() {
        let (mut ui, view) = build(Some(24));

        view.set_input(&mut ui, " 80 ");
        assert_eq!(view.read_target(&ui, 1, 1000).unwrap(), 80);

        view.set_input(&mut ui, "lots");
        assert_eq!(
            view.read_target(&ui, 1, 1000),
            Err(PanelError::InvalidNumber("lots".to_string()))
        );

        view.set_input(&mut ui, "0");
        assert!(matches!(
            view.read_target(&ui, 1, 1000),
            Err(PanelError::QuantityOutOfRange { value: 0, .. })
        ));
    }

    #[test]
    fn test_sync_slots_grows_and_shrinks_in_place() {
        let (mut ui, mut view) = build(Some(24));
        let content = view.grid().content();

        assert_eq!(view.sync_slots(&mut ui, 54).unwrap(), ScrollUpdate::ScrollbarAdded);
        assert_eq!(ui.children(content).len(), 54);
        assert_eq!(view.grid().content(), content);

        assert_eq!(view.sync_slots(&mut ui, 12).unwrap(), ScrollUpdate::ScrollbarRemoved);
        assert_eq!(ui.children(content).len(), 12);
    }

    #[test]
    fn test_unloaded_inventory_builds_empty_grid() {
        let (ui, view) = build(None);
        assert_eq!(ui.text(view.input()).as_deref(), Some(""));
        assert_eq!(view.slot_count(), 0);
        assert!(view.grid().scrollbar().is_none());
    }
}
