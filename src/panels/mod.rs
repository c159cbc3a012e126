//! Overlay panels and their lifecycle.
//!
//! Each panel kind has one [`OverlayManager`] which owns the live instance
//! (if any) and the generation counter. The generation moves on every create
//! and every destroy, so any callback that captured an older value can tell
//! that the instance it was aimed at is gone.

pub mod catalog;
pub mod item_spawner;
pub mod size_control;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::error::{PanelError, PanelResult};
use crate::host::{NodeId, NodeKind, NodeRect, NodeSpec, UiHost, WindowKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelKind {
    SizeControl,
    ItemSpawner,
}

impl PanelKind {
    pub const ALL: [PanelKind; 2] = [PanelKind::SizeControl, PanelKind::ItemSpawner];

    pub fn display_name(&self) -> &'static str {
        match self {
            PanelKind::SizeControl => "size control",
            PanelKind::ItemSpawner => "item spawner",
        }
    }

    /// Config table key and node name stem
    pub fn key(&self) -> &'static str {
        match self {
            PanelKind::SizeControl => "size_control",
            PanelKind::ItemSpawner => "item_spawner",
        }
    }

    pub fn node_name(&self) -> String {
        format!("overlay/{}", self.key())
    }
}

impl fmt::Display for PanelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Generation(u64);

impl Generation {
    #[cfg(test)]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}

/// One live instance of a panel.
#[derive(Debug, Clone)]
pub struct PanelHandle {
    pub root: NodeId,
    /// Anchor the root was attached beneath
    pub parent: NodeId,
    pub visible: bool,
    pub generation: Generation,
    pub created_at: DateTime<Local>,
}

#[derive(Debug)]
enum PanelState<V> {
    Absent,
    Live { handle: PanelHandle, view: V },
}

/// Absent/Live state machine for one panel kind.
///
/// `V` is the panel's content view, built fresh on every create.
#[derive(Debug)]
pub struct OverlayManager<V> {
    kind: PanelKind,
    window: WindowKind,
    frame: NodeRect,
    state: PanelState<V>,
    generation: Generation,
    want_visible: bool,
}

impl<V> OverlayManager<V> {
    pub fn new(kind: PanelKind, window: WindowKind, frame: NodeRect, visible: bool) -> Self {
        Self {
            kind,
            window,
            frame,
            state: PanelState::Absent,
            generation: Generation::default(),
            want_visible: visible,
        }
    }

    pub fn kind(&self) -> PanelKind {
        self.kind
    }

    pub fn window(&self) -> WindowKind {
        self.window
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Visibility the next instance will start with
    pub fn want_visible(&self) -> bool {
        self.want_visible
    }

    pub fn is_live(&self) -> bool {
        matches!(self.state, PanelState::Live { .. })
    }

    pub fn is_visible(&self) -> bool {
        self.handle().is_some_and(|h| h.visible)
    }

    pub fn handle(&self) -> Option<&PanelHandle> {
        match &self.state {
            PanelState::Live { handle, .. } => Some(handle),
            PanelState::Absent => None,
        }
    }

    pub fn view(&self) -> Option<&V> {
        match &self.state {
            PanelState::Live { view, .. } => Some(view),
            PanelState::Absent => None,
        }
    }

    pub fn view_mut(&mut self) -> Option<&mut V> {
        match &mut self.state {
            PanelState::Live { view, .. } => Some(view),
            PanelState::Absent => None,
        }
    }

    pub fn live_generation(&self) -> Option<Generation> {
        self.handle().map(|h| h.generation)
    }

    /// True only while the instance created at `generation` is still live.
    #[cfg(test)]
    pub fn is_current(&self, generation: Generation) -> bool {
        self.live_generation() == Some(generation)
    }

    /// Create the panel, replacing any live instance.
    ///
    /// `build` fills the freshly spawned root. On any failure the state is
    /// left `Absent` and nothing allocated by this call survives.
    pub fn show<F>(&mut self, host: &mut dyn UiHost, build: F) -> PanelResult<Generation>
    where
        F: FnOnce(&mut dyn UiHost, NodeId) -> PanelResult<V>,
    {
        self.reconcile(host);
        if self.is_live() {
            self.hide(host, "recreate");
        }

        let anchor = host
            .resolve_anchor(self.window)
            .ok_or(PanelError::HostAnchorUnavailable {
                panel: self.kind,
                window: self.window,
            })?;
        if !host.is_alive(anchor) {
            return Err(PanelError::InvalidParent(anchor));
        }

        let root = host.spawn(
            anchor,
            NodeSpec::new(self.kind.node_name(), NodeKind::Panel, self.frame),
        )?;
        let view = match build(host, root) {
            Ok(view) => view,
            Err(e) => {
                host.destroy(root);
                return Err(e);
            }
        };
        host.set_active(root, self.want_visible);

        self.generation = self.generation.next();
        let handle = PanelHandle {
            root,
            parent: anchor,
            visible: self.want_visible,
            generation: self.generation,
            created_at: Local::now(),
        };
        info!(
            "{} panel created under {} ({}, visible: {})",
            self.kind, anchor, self.generation, handle.visible
        );
        self.state = PanelState::Live { handle, view };
        Ok(self.generation)
    }

    /// Destroy the live instance. Returns false when there was none.
    ///
    /// The generation moves immediately even though the host may keep the
    /// nodes until the end of its frame.
    pub fn hide(&mut self, host: &mut dyn UiHost, reason: &str) -> bool {
        match std::mem::replace(&mut self.state, PanelState::Absent) {
            PanelState::Live { handle, .. } => {
                host.destroy(handle.root);
                self.generation = self.generation.next();
                info!(
                    "{} panel destroyed ({}), {} -> {}",
                    self.kind, reason, handle.generation, self.generation
                );
                true
            }
            PanelState::Absent => false,
        }
    }

    /// Forget an instance the host tore down without telling us.
    pub fn reconcile(&mut self, host: &dyn UiHost) -> bool {
        let orphaned = self.handle().is_some_and(|h| !host.is_alive(h.root));
        if orphaned {
            self.state = PanelState::Absent;
            self.generation = self.generation.next();
            warn!(
                "{} panel lost its host nodes, now {}",
                self.kind, self.generation
            );
        }
        orphaned
    }

    /// Visibility only: never creates or destroys. When absent, the value is
    /// remembered for the next create.
    pub fn set_visibility(&mut self, host: &mut dyn UiHost, visible: bool) {
        self.want_visible = visible;
        if let PanelState::Live { handle, .. } = &mut self.state {
            handle.visible = visible;
            host.set_active(handle.root, visible);
            debug!("{} panel visibility -> {}", self.kind, visible);
        } else {
            debug!("{} panel absent, remembering visibility {}", self.kind, visible);
        }
    }

    /// Flip visibility; returns the new value.
    pub fn toggle_visibility(&mut self, host: &mut dyn UiHost) -> bool {
        let visible = match self.handle() {
            Some(handle) => !handle.visible,
            None => !self.want_visible,
        };
        self.set_visibility(host, visible);
        visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::sim::SimUi;

    fn manager() -> OverlayManager<NodeId> {
        OverlayManager::new(
            PanelKind::SizeControl,
            WindowKind::Equipment,
            NodeRect::new(10.0, 10.0, 200.0, 100.0),
            true,
        )
    }

    fn label(host: &mut dyn UiHost, root: NodeId) -> PanelResult<NodeId> {
        host.spawn(root, NodeSpec::new("label", NodeKind::Label, NodeRect::default()))
    }

    #[test]
    fn test_show_twice_leaves_one_live_instance() {
        let mut ui = SimUi::default();
        ui.open_window(WindowKind::Equipment);
        let mut panel = manager();
        let name = PanelKind::SizeControl.node_name();

        let first = panel.show(&mut ui, label).unwrap();
        let first_root = panel.handle().unwrap().root;
        let second = panel.show(&mut ui, label).unwrap();

        assert!(second > first);
        assert_ne!(panel.handle().unwrap().root, first_root);
        assert!(!ui.is_alive(first_root));
        assert_eq!(ui.count_named(&name), 1);
        assert!(!panel.is_current(first));
        assert!(panel.is_current(second));

        ui.end_frame();
        assert_eq!(ui.count_named(&name), 1);
        assert_eq!(ui.count_named("label"), 1);
    }

    #[test]
    fn test_hide_bumps_generation_immediately() {
        let mut ui = SimUi::default();
        ui.open_window(WindowKind::Equipment);
        let mut panel = manager();

        let generation = panel.show(&mut ui, label).unwrap();
        assert!(panel.hide(&mut ui, "window closed"));
        assert_eq!(panel.generation(), generation.next());
        assert!(!panel.is_current(generation));
        assert!(panel.handle().is_none());
        assert!(!panel.hide(&mut ui, "again"));
    }

    #[test]
    fn test_missing_anchor_leaves_panel_absent() {
        let mut ui = SimUi::default();
        let mut panel = manager();

        let result = panel.show(&mut ui, label);
        assert!(matches!(
            result,
            Err(PanelError::HostAnchorUnavailable {
                panel: PanelKind::SizeControl,
                window: WindowKind::Equipment,
            })
        ));
        assert!(!panel.is_live());
        assert_eq!(panel.generation(), Generation::default());
    }

    #[test]
    fn test_failed_build_destroys_root() {
        let mut ui = SimUi::default();
        ui.open_window(WindowKind::Equipment);
        let mut panel: OverlayManager<NodeId> = manager();

        let result = panel.show(&mut ui, |_, _| {
            Err(PanelError::InvalidLayoutParameter("columns must be at least 1".into()))
        });
        assert!(result.is_err());
        assert!(!panel.is_live());
        assert_eq!(ui.count_named(&PanelKind::SizeControl.node_name()), 0);
    }

    #[test]
    fn test_visibility_preference_survives_absence() {
        let mut ui = SimUi::default();
        ui.open_window(WindowKind::Equipment);
        let mut panel = manager();

        assert!(!panel.toggle_visibility(&mut ui));
        assert!(!panel.is_live());

        panel.show(&mut ui, label).unwrap();
        let root = panel.handle().unwrap().root;
        assert!(!panel.is_visible());
        assert!(!ui.is_visible(root));

        assert!(panel.toggle_visibility(&mut ui));
        assert!(ui.is_visible(root));
        assert!(panel.want_visible());
    }

    #[test]
    fn test_visibility_toggle_keeps_generation() {
        let mut ui = SimUi::default();
        ui.open_window(WindowKind::Equipment);
        let mut panel = manager();

        let generation = panel.show(&mut ui, label).unwrap();
        panel.toggle_visibility(&mut ui);
        panel.toggle_visibility(&mut ui);
        assert!(panel.is_current(generation));
    }

    #[test]
    fn test_reconcile_after_out_of_band_rebuild() {
        let mut ui = SimUi::default();
        ui.open_window(WindowKind::Equipment);
        let mut panel = manager();

        let generation = panel.show(&mut ui, label).unwrap();
        let new_anchor = ui.rebuild_window(WindowKind::Equipment);
        assert!(panel.reconcile(&ui));
        assert!(!panel.is_current(generation));

        let recreated = panel.show(&mut ui, label).unwrap();
        assert_eq!(panel.handle().unwrap().parent, new_anchor);
        assert!(recreated > generation);
    }
}
