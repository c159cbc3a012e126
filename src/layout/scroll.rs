//! Scroll region built from host nodes.
//!
//! A container is three nested nodes: the region (attached to the caller's
//! parent), a clipping viewport, and the content node that grows along the
//! scroll axis. The scrollbar is a fourth, optional child of the region that
//! exists only while the content overflows the viewport.
//!
//! The viewport always leaves room for the scrollbar track so that attaching
//! or removing the bar never moves the content sideways.

use serde::{Deserialize, Serialize};

use super::{GridSpec, ScrollLayoutState};
use crate::error::{PanelError, PanelResult};
use crate::host::{NodeId, NodeKind, NodeRect, NodeSpec, UiHost};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackSide {
    #[default]
    Left,
    Right,
}

/// Scrollbar track geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollStyle {
    pub track_width: f32,
    /// Gap between the track and the viewport
    pub gutter: f32,
    pub track_side: TrackSide,
    /// Smallest handle height, in pixels
    pub min_handle: f32,
}

impl Default for ScrollStyle {
    fn default() -> Self {
        Self {
            track_width: 20.0,
            gutter: 5.0,
            track_side: TrackSide::Left,
            min_handle: 20.0,
        }
    }
}

impl ScrollStyle {
    pub fn validate(&self) -> PanelResult<()> {
        let scalars = [
            ("track width", self.track_width),
            ("gutter", self.gutter),
            ("minimum handle height", self.min_handle),
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

    /// Horizontal space the viewport gives up for the track
    pub fn reserved_track(&self) -> f32 {
        self.track_width + self.gutter
    }
}

/// Static inputs for one scroll region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollSpec {
    pub grid: GridSpec,
    pub style: ScrollStyle,
    pub viewport_height: f32,
}

impl ScrollSpec {
    pub fn new(grid: GridSpec, style: ScrollStyle, viewport_height: f32) -> Self {
        Self {
            grid,
            style,
            viewport_height,
        }
    }

    fn validate(&self) -> PanelResult<()> {
        self.grid.validate()?;
        self.style.validate()?;
        if !self.viewport_height.is_finite() || self.viewport_height <= 0.0 {
            return Err(PanelError::InvalidLayoutParameter(format!(
                "viewport height must be a positive number, got {}",
                self.viewport_height
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scrollbar {
    pub node: NodeId,
    pub handle: NodeId,
    /// Viewport / content, in `(0, 1]`
    pub ratio: f32,
}

/// What an [`ScrollContainer::update`] call changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollUpdate {
    Unchanged,
    /// Content extent changed; scrollbar presence did not
    Resized,
    ScrollbarAdded,
    ScrollbarResized,
    ScrollbarRemoved,
}

#[derive(Debug)]
pub struct ScrollContainer {
    region: NodeId,
    viewport: NodeId,
    content: NodeId,
    scrollbar: Option<Scrollbar>,
    state: ScrollLayoutState,
    style: ScrollStyle,
    scroll_offset: f32,
}

impl ScrollContainer {
    /// Allocate a fresh region under `parent` at `origin`.
    ///
    /// All inputs are validated before anything is allocated. If the host
    /// rejects a node part-way through, the partial region is destroyed.
    pub fn build(
        host: &mut dyn UiHost,
        parent: NodeId,
        name: &str,
        origin: (f32, f32),
        spec: ScrollSpec,
        item_count: usize,
    ) -> PanelResult<Self> {
        if !host.is_alive(parent) {
            return Err(PanelError::InvalidParent(parent));
        }
        spec.validate()?;
        let state = ScrollLayoutState::new(spec.grid, item_count, spec.viewport_height)?;

        let content_width = spec.grid.content_width();
        let region = host.spawn(
            parent,
            NodeSpec::new(
                name,
                NodeKind::ScrollRegion,
                NodeRect::new(
                    origin.0,
                    origin.1,
                    content_width + spec.style.reserved_track(),
                    spec.viewport_height,
                ),
            ),
        )?;

        match Self::populate(host, region, name, state, spec.style) {
            Ok(container) => {
                tracing::debug!(
                    "Scroll region '{}': {} items, {} rows, extent {} / viewport {}, scrollbar {}",
                    name,
                    item_count,
                    container.state.rows(),
                    container.state.content_extent(),
                    container.state.viewport_extent(),
                    container.scrollbar.is_some()
                );
                Ok(container)
            }
            Err(e) => {
                tracing::warn!("Scroll region '{}' aborted: {}", name, e);
                host.destroy(region);
                Err(e)
            }
        }
    }

    fn populate(
        host: &mut dyn UiHost,
        region: NodeId,
        name: &str,
        mut state: ScrollLayoutState,
        style: ScrollStyle,
    ) -> PanelResult<Self> {
        let content_width = state.grid().content_width();
        let viewport_x = match style.track_side {
            TrackSide::Left => style.reserved_track(),
            TrackSide::Right => 0.0,
        };

        let viewport = host.spawn(
            region,
            NodeSpec::new(
                format!("{}/viewport", name),
                NodeKind::Viewport,
                NodeRect::new(viewport_x, 0.0, content_width, state.viewport_extent()),
            ),
        )?;
        // The host may clamp the requested size; trust what it reports
        if let Some(rect) = host.rect(viewport) {
            state.set_viewport_extent(rect.height);
        }

        let content = host.spawn(
            viewport,
            NodeSpec::new(
                format!("{}/content", name),
                NodeKind::Content,
                NodeRect::new(0.0, 0.0, content_width, state.content_extent()),
            ),
        )?;

        let mut container = Self {
            region,
            viewport,
            content,
            scrollbar: None,
            state,
            style,
            scroll_offset: 0.0,
        };
        if container.state.scrollbar_needed() {
            container.scrollbar = Some(container.attach_scrollbar(host)?);
        }
        Ok(container)
    }

    /// Apply a new item count in place.
    ///
    /// Only the content height and the scrollbar are touched; the region,
    /// viewport and content nodes keep their identity.
    pub fn update(&mut self, host: &mut dyn UiHost, item_count: usize) -> PanelResult<ScrollUpdate> {
        if !host.is_alive(self.region) {
            return Err(PanelError::InvalidParent(self.region));
        }

        if let Some(rect) = host.rect(self.viewport) {
            self.state.set_viewport_extent(rect.height);
        }
        let extent_changed = self.state.set_item_count(item_count)?;
        if extent_changed {
            if let Some(mut rect) = host.rect(self.content) {
                rect.height = self.state.content_extent();
                host.set_rect(self.content, rect);
            }
        }
        self.clamp_offset(host);

        let update = match (self.state.scrollbar_needed(), self.scrollbar.take()) {
            (true, None) => {
                self.scrollbar = Some(self.attach_scrollbar(host)?);
                ScrollUpdate::ScrollbarAdded
            }
            (true, Some(mut bar)) => {
                let ratio = self.state.handle_ratio();
                let resized = ratio != bar.ratio;
                bar.ratio = ratio;
                self.place_handle(host, &bar);
                self.scrollbar = Some(bar);
                if resized {
                    ScrollUpdate::ScrollbarResized
                } else if extent_changed {
                    ScrollUpdate::Resized
                } else {
                    ScrollUpdate::Unchanged
                }
            }
            (false, Some(bar)) => {
                host.destroy(bar.node);
                ScrollUpdate::ScrollbarRemoved
            }
            (false, None) if extent_changed => ScrollUpdate::Resized,
            (false, None) => ScrollUpdate::Unchanged,
        };

        if update != ScrollUpdate::Unchanged {
            tracing::debug!(
                "Scroll region {}: {} items -> {:?} (extent {})",
                self.region,
                item_count,
                update,
                self.state.content_extent()
            );
        }
        Ok(update)
    }

    /// Move the content by `delta` pixels, clamped to the scrollable range.
    /// Returns the resulting offset.
    pub fn scroll_by(&mut self, host: &mut dyn UiHost, delta: f32) -> f32 {
        self.scroll_offset = (self.scroll_offset + delta).clamp(0.0, self.state.max_scroll_offset());
        self.place_content(host);
        if let Some(bar) = self.scrollbar {
            self.place_handle(host, &bar);
        }
        self.scroll_offset
    }

    fn clamp_offset(&mut self, host: &mut dyn UiHost) {
        let clamped = self.scroll_offset.min(self.state.max_scroll_offset());
        if clamped != self.scroll_offset {
            self.scroll_offset = clamped;
            self.place_content(host);
        }
    }

    fn place_content(&self, host: &mut dyn UiHost) {
        if let Some(mut rect) = host.rect(self.content) {
            rect.y = -self.scroll_offset;
            host.set_rect(self.content, rect);
        }
    }

    fn attach_scrollbar(&self, host: &mut dyn UiHost) -> PanelResult<Scrollbar> {
        let viewport_height = self.state.viewport_extent();
        let track_x = match self.style.track_side {
            TrackSide::Left => 0.0,
            TrackSide::Right => self.state.grid().content_width() + self.style.gutter,
        };

        let node = host.spawn(
            self.region,
            NodeSpec::new(
                "scrollbar",
                NodeKind::Scrollbar,
                NodeRect::new(track_x, 0.0, self.style.track_width, viewport_height),
            ),
        )?;
        let bar = match host.spawn(
            node,
            NodeSpec::new(
                "scrollbar/handle",
                NodeKind::ScrollbarHandle,
                NodeRect::new(0.0, 0.0, self.style.track_width, viewport_height),
            ),
        ) {
            Ok(handle) => Scrollbar {
                node,
                handle,
                ratio: self.state.handle_ratio(),
            },
            Err(e) => {
                host.destroy(node);
                return Err(e);
            }
        };
        self.place_handle(host, &bar);
        Ok(bar)
    }

    fn place_handle(&self, host: &mut dyn UiHost, bar: &Scrollbar) {
        let track = self.state.viewport_extent();
        let height = (track * bar.ratio).max(self.style.min_handle).min(track);
        let max_offset = self.state.max_scroll_offset();
        let progress = if max_offset > 0.0 {
            self.scroll_offset / max_offset
        } else {
            0.0
        };
        host.set_rect(
            bar.handle,
            NodeRect::new(0.0, (track - height) * progress, self.style.track_width, height),
        );
    }

    pub fn region(&self) -> NodeId {
        self.region
    }

    pub fn viewport(&self) -> NodeId {
        self.viewport
    }

    pub fn content(&self) -> NodeId {
        self.content
    }

    pub fn scrollbar(&self) -> Option<&Scrollbar> {
        self.scrollbar.as_ref()
    }

    pub fn state(&self) -> &ScrollLayoutState {
        &self.state
    }

    pub fn scroll_offset(&self) -> f32 {
        self.scroll_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::sim::SimUi;
    use crate::host::WindowKind;
    use crate::layout::{Padding, Size, Spacing};

    fn inventory_spec() -> ScrollSpec {
        ScrollSpec::new(
            GridSpec::new(
                6,
                Size::new(50.0, 50.0),
                Spacing::new(2.0, 2.0),
                Padding::default(),
            ),
            ScrollStyle::default(),
            400.0,
        )
    }

    fn setup() -> (SimUi, NodeId) {
        let mut ui = SimUi::default();
        let anchor = ui.open_window(WindowKind::Equipment);
        (ui, anchor)
    }

    #[test]
    fn test_build_without_overflow_has_no_scrollbar() {
        let (mut ui, anchor) = setup();
        let container =
            ScrollContainer::build(&mut ui, anchor, "grid", (0.0, 0.0), inventory_spec(), 24).unwrap();

        assert!(container.scrollbar().is_none());
        assert_eq!(ui.count_named("scrollbar"), 0);
        assert_eq!(ui.rect(container.content()).unwrap().height, 206.0);
        // Track space is reserved even without a bar
        assert_eq!(ui.rect(container.viewport()).unwrap().x, 25.0);
    }

    #[test]
    fn test_build_with_overflow_attaches_scrollbar() {
        let (mut ui, anchor) = setup();
        let container =
            ScrollContainer::build(&mut ui, anchor, "grid", (0.0, 0.0), inventory_spec(), 54).unwrap();

        let bar = container.scrollbar().copied().unwrap();
        assert!(ui.is_alive(bar.node));
        assert!(ui.is_alive(bar.handle));
        assert!((bar.ratio - 400.0 / 466.0).abs() < 1e-6);
        assert_eq!(ui.rect(container.viewport()).unwrap().x, 25.0);
    }

    #[test]
    fn test_build_on_dead_parent_allocates_nothing() {
        let (mut ui, anchor) = setup();
        ui.close_window(WindowKind::Equipment);
        let before = ui.node_count();

        let result = ScrollContainer::build(&mut ui, anchor, "grid", (0.0, 0.0), inventory_spec(), 54);
        assert!(matches!(result, Err(PanelError::InvalidParent(id)) if id == anchor));
        assert_eq!(ui.node_count(), before);
    }

    #[test]
    fn test_build_rejects_bad_grid_before_allocating() {
        let (mut ui, anchor) = setup();
        let before = ui.node_count();
        let mut spec = inventory_spec();
        spec.grid.columns = 0;

        let result = ScrollContainer::build(&mut ui, anchor, "grid", (0.0, 0.0), spec, 10);
        assert!(matches!(result, Err(PanelError::InvalidLayoutParameter(_))));
        assert_eq!(ui.node_count(), before);
    }

    #[test]
    fn test_update_walks_every_scrollbar_transition() {
        let (mut ui, anchor) = setup();
        let mut container =
            ScrollContainer::build(&mut ui, anchor, "grid", (0.0, 0.0), inventory_spec(), 24).unwrap();
        let viewport = container.viewport();
        let content = container.content();

        assert_eq!(container.update(&mut ui, 24).unwrap(), ScrollUpdate::Unchanged);
        assert_eq!(container.update(&mut ui, 30).unwrap(), ScrollUpdate::Resized);

        assert_eq!(container.update(&mut ui, 54).unwrap(), ScrollUpdate::ScrollbarAdded);
        let bar = container.scrollbar().copied().unwrap();
        assert_eq!(container.viewport(), viewport);
        assert_eq!(container.content(), content);

        assert_eq!(container.update(&mut ui, 120).unwrap(), ScrollUpdate::ScrollbarResized);
        assert_eq!(container.scrollbar().unwrap().node, bar.node);

        assert_eq!(container.update(&mut ui, 24).unwrap(), ScrollUpdate::ScrollbarRemoved);
        assert!(container.scrollbar().is_none());
        assert!(!ui.is_alive(bar.node));

        assert_eq!(container.update(&mut ui, 24).unwrap(), ScrollUpdate::Unchanged);
    }

    #[test]
    fn test_update_with_same_count_keeps_scrollbar_identity() {
        let (mut ui, anchor) = setup();
        let mut container =
            ScrollContainer::build(&mut ui, anchor, "grid", (0.0, 0.0), inventory_spec(), 54).unwrap();
        let bar = container.scrollbar().copied().unwrap();
        let nodes = ui.node_count();

        for _ in 0..3 {
            assert_eq!(container.update(&mut ui, 54).unwrap(), ScrollUpdate::Unchanged);
        }
        assert_eq!(container.scrollbar().copied(), Some(bar));
        assert_eq!(ui.node_count(), nodes);
    }

    #[test]
    fn test_scroll_offset_clamps_when_content_shrinks() {
        let (mut ui, anchor) = setup();
        let mut container =
            ScrollContainer::build(&mut ui, anchor, "grid", (0.0, 0.0), inventory_spec(), 120).unwrap();

        assert_eq!(container.scroll_by(&mut ui, -50.0), 0.0);
        let max = container.state().max_scroll_offset();
        assert_eq!(container.scroll_by(&mut ui, 10_000.0), max);
        assert_eq!(ui.rect(container.content()).unwrap().y, -max);

        container.update(&mut ui, 60).unwrap();
        let max = container.state().max_scroll_offset();
        assert_eq!(container.scroll_offset(), max);
        assert_eq!(ui.rect(container.content()).unwrap().y, -max);
    }

    #[test]
    fn test_right_track_leaves_viewport_at_origin() {
        let (mut ui, anchor) = setup();
        let mut spec = inventory_spec();
        spec.style.track_side = TrackSide::Right;

        let container = ScrollContainer::build(&mut ui, anchor, "grid", (0.0, 0.0), spec, 54).unwrap();
        assert_eq!(ui.rect(container.viewport()).unwrap().x, 0.0);
        let bar = container.scrollbar().unwrap();
        assert_eq!(ui.rect(bar.node).unwrap().x, 315.0);
    }
}
