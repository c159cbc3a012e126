//! Grid geometry for scrollable panel content.
//!
//! Everything here is a pure function of its inputs. The scroll container in
//! [`scroll`] is the only consumer that touches host nodes.

pub mod scroll;

pub use scroll::{ScrollContainer, ScrollSpec, ScrollStyle, ScrollUpdate};

use serde::{Deserialize, Serialize};

use crate::error::{PanelError, PanelResult};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Spacing {
    pub x: f32,
    pub y: f32,
}

impl Spacing {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Padding {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Padding {
    pub const fn uniform(value: f32) -> Self {
        Self {
            top: value,
            bottom: value,
            left: value,
            right: value,
        }
    }

    /// Total padding along the scroll axis
    pub fn vertical(&self) -> f32 {
        self.top + self.bottom
    }

    /// Total padding across the scroll axis
    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }
}

/// Fixed-column grid that grows along the vertical scroll axis only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub columns: usize,
    pub cell: Size,
    #[serde(default)]
    pub spacing: Spacing,
    #[serde(default)]
    pub padding: Padding,
}

impl GridSpec {
    pub fn new(columns: usize, cell: Size, spacing: Spacing, padding: Padding) -> Self {
        Self {
            columns,
            cell,
            spacing,
            padding,
        }
    }

    /// Reject grids the primitives cannot lay out.
    pub fn validate(&self) -> PanelResult<()> {
        if self.columns == 0 {
            return Err(PanelError::InvalidLayoutParameter(
                "columns must be at least 1".to_string(),
            ));
        }

        let scalars = [
            ("cell width", self.cell.width),
            ("cell height", self.cell.height),
            ("horizontal spacing", self.spacing.x),
            ("vertical spacing", self.spacing.y),
            ("top padding", self.padding.top),
            ("bottom padding", self.padding.bottom),
            ("left padding", self.padding.left),
            ("right padding", self.padding.right),
        ];
        for (name, value) in scalars {
            if !value.is_finite() || value < 0.0 {
                return Err(PanelError::InvalidLayoutParameter(format!(
                    "{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }

    pub fn rows_for(&self, item_count: usize) -> PanelResult<usize> {
        compute_rows(item_count, self.columns)
    }

    pub fn content_extent(&self, item_count: usize) -> PanelResult<f32> {
        let rows = self.rows_for(item_count)?;
        Ok(compute_content_extent(
            rows,
            self.cell,
            self.spacing,
            self.padding,
        ))
    }

    /// Extent across the scroll axis; independent of the item count.
    pub fn content_width(&self) -> f32 {
        let columns = self.columns as f32;
        columns * self.cell.width
            + (columns - 1.0).max(0.0) * self.spacing.x
            + self.padding.horizontal()
    }

    /// Top-left offset of the cell at `index` inside the content node.
    pub fn cell_origin(&self, index: usize) -> (f32, f32) {
        let columns = self.columns.max(1);
        let row = (index / columns) as f32;
        let col = (index % columns) as f32;
        (
            self.padding.left + col * (self.cell.width + self.spacing.x),
            self.padding.top + row * (self.cell.height + self.spacing.y),
        )
    }
}

/// `ceil(item_count / columns)`; zero items always yields zero rows.
pub fn compute_rows(item_count: usize, columns: usize) -> PanelResult<usize> {
    if columns == 0 {
        return Err(PanelError::InvalidLayoutParameter(
            "columns must be at least 1".to_string(),
        ));
    }
    Ok(item_count.div_ceil(columns))
}

/// Scroll-axis size of `rows` rows. Spacing sits only between rows.
pub fn compute_content_extent(rows: usize, cell: Size, spacing: Spacing, padding: Padding) -> f32 {
    if rows == 0 {
        return padding.vertical();
    }
    let rows = rows as f32;
    rows * (cell.height + spacing.y) - spacing.y + padding.vertical()
}

/// Strict: content that exactly fits does not scroll.
pub fn compute_scrollbar_needed(content_extent: f32, viewport_extent: f32) -> bool {
    content_extent > viewport_extent
}

/// Fraction of the track covered by the scrollbar handle, in `(0, 1]`.
pub fn compute_handle_ratio(viewport_extent: f32, content_extent: f32) -> f32 {
    if content_extent <= 0.0 || viewport_extent >= content_extent {
        return 1.0;
    }
    (viewport_extent / content_extent).clamp(f32::EPSILON, 1.0)
}

/// Layout bookkeeping for one scrollable content region.
///
/// Only the inputs are stored; the content extent is recomputed whenever an
/// input changes and the scrollbar decision is derived on every read.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollLayoutState {
    grid: GridSpec,
    item_count: usize,
    rows: usize,
    content_extent: f32,
    viewport_extent: f32,
}

impl ScrollLayoutState {
    pub fn new(grid: GridSpec, item_count: usize, viewport_extent: f32) -> PanelResult<Self> {
        grid.validate()?;
        let rows = grid.rows_for(item_count)?;
        Ok(Self {
            grid,
            item_count,
            rows,
            content_extent: compute_content_extent(rows, grid.cell, grid.spacing, grid.padding),
            viewport_extent,
        })
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn content_extent(&self) -> f32 {
        self.content_extent
    }

    pub fn viewport_extent(&self) -> f32 {
        self.viewport_extent
    }

    /// Returns true when the content extent changed.
    pub fn set_item_count(&mut self, item_count: usize) -> PanelResult<bool> {
        let rows = self.grid.rows_for(item_count)?;
        let extent =
            compute_content_extent(rows, self.grid.cell, self.grid.spacing, self.grid.padding);
        let changed = extent != self.content_extent;
        self.item_count = item_count;
        self.rows = rows;
        self.content_extent = extent;
        Ok(changed)
    }

    pub fn set_viewport_extent(&mut self, viewport_extent: f32) {
        self.viewport_extent = viewport_extent;
    }

    pub fn scrollbar_needed(&self) -> bool {
        compute_scrollbar_needed(self.content_extent, self.viewport_extent)
    }

    pub fn handle_ratio(&self) -> f32 {
        compute_handle_ratio(self.viewport_extent, self.content_extent)
    }

    /// Largest scroll offset that still keeps the viewport filled.
    pub fn max_scroll_offset(&self) -> f32 {
        (self.content_extent - self.viewport_extent).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory_grid() -> GridSpec {
        GridSpec::new(
            6,
            Size::new(50.0, 50.0),
            Spacing::new(2.0, 2.0),
            Padding::default(),
        )
    }

    #[test]
    fn test_compute_rows_is_ceiling_division() {
        for columns in 1..=8 {
            assert_eq!(compute_rows(0, columns).unwrap(), 0);
            for items in 1..=100usize {
                let expected = (items + columns - 1) / columns;
                assert_eq!(compute_rows(items, columns).unwrap(), expected);
            }
        }
    }

    #[test]
    fn test_zero_columns_rejected() {
        assert!(matches!(
            compute_rows(10, 0),
            Err(PanelError::InvalidLayoutParameter(_))
        ));

        let mut grid = inventory_grid();
        grid.columns = 0;
        assert!(matches!(
            ScrollLayoutState::new(grid, 10, 400.0),
            Err(PanelError::InvalidLayoutParameter(_))
        ));
    }

    #[test]
    fn test_negative_geometry_rejected() {
        let mut grid = inventory_grid();
        grid.cell.height = -1.0;
        assert!(grid.validate().is_err());

        let mut grid = inventory_grid();
        grid.spacing.y = f32::NAN;
        assert!(grid.validate().is_err());
    }

    #[test]
    fn test_large_inventory_needs_scrollbar() {
        let state = ScrollLayoutState::new(inventory_grid(), 54, 400.0).unwrap();
        assert_eq!(state.rows(), 9);
        assert_eq!(state.content_extent(), 466.0);
        assert!(state.scrollbar_needed());
    }

    #[test]
    fn test_small_inventory_fits_viewport() {
        let state = ScrollLayoutState::new(inventory_grid(), 24, 400.0).unwrap();
        assert_eq!(state.rows(), 4);
        assert_eq!(state.content_extent(), 206.0);
        assert!(!state.scrollbar_needed());
    }

    #[test]
    fn test_exact_fit_does_not_scroll() {
        assert!(!compute_scrollbar_needed(400.0, 400.0));
        assert!(compute_scrollbar_needed(400.5, 400.0));
        assert_eq!(
            compute_scrollbar_needed(466.0, 400.0),
            compute_scrollbar_needed(466.0, 400.0)
        );
    }

    #[test]
    fn test_scrollbar_decision_is_monotonic_in_item_count() {
        let mut state = ScrollLayoutState::new(inventory_grid(), 0, 400.0).unwrap();
        let mut seen_needed = false;
        for items in 0..=300 {
            state.set_item_count(items).unwrap();
            let needed = state.scrollbar_needed();
            assert!(!(seen_needed && !needed), "flipped back at {} items", items);
            seen_needed |= needed;
        }
        assert!(seen_needed);
    }

    #[test]
    fn test_padding_counts_towards_extent() {
        let grid = GridSpec::new(1, Size::new(260.0, 30.0), Spacing::new(0.0, 2.0), Padding::uniform(5.0));
        assert_eq!(grid.content_extent(0).unwrap(), 10.0);
        // 3 * 32 - 2 + 10
        assert_eq!(grid.content_extent(3).unwrap(), 104.0);
    }

    #[test]
    fn test_set_item_count_reports_extent_changes() {
        let mut state = ScrollLayoutState::new(inventory_grid(), 24, 400.0).unwrap();
        // 25 and 30 items both fill five rows
        assert!(state.set_item_count(25).unwrap());
        assert!(!state.set_item_count(30).unwrap());
        assert_eq!(state.item_count(), 30);
        assert_eq!(state.rows(), 5);
    }

    #[test]
    fn test_handle_ratio_is_clamped() {
        assert_eq!(compute_handle_ratio(400.0, 200.0), 1.0);
        assert_eq!(compute_handle_ratio(400.0, 0.0), 1.0);
        assert_eq!(compute_handle_ratio(400.0, 800.0), 0.5);
        let tiny = compute_handle_ratio(0.0, 800.0);
        assert!(tiny > 0.0 && tiny <= 1.0);
    }

    #[test]
    fn test_cell_origin_walks_rows() {
        let grid = inventory_grid();
        assert_eq!(grid.cell_origin(0), (0.0, 0.0));
        assert_eq!(grid.cell_origin(5), (260.0, 0.0));
        assert_eq!(grid.cell_origin(6), (0.0, 52.0));
        assert_eq!(grid.content_width(), 310.0);
    }
}
