//! Host lifecycle events consumed by the panel system.
//!
//! The integration layer translates whatever hooks the host exposes (method
//! postfixes, signals, callbacks) into this enum so the core only reacts to a
//! fixed, named set of events.

use serde::{Deserialize, Serialize};

use super::WindowKind;

/// Push events raised by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    /// A host window finished opening
    WindowOpened { window: WindowKind },
    /// A host window is closing
    WindowClosed { window: WindowKind },
    /// The host closed every window at once
    AllWindowsClosed,
    /// A player controller spawned; `local` is true for the owning player
    PlayerSpawned { local: bool },
    /// The host redrew the player inventory with `slots` slots
    InventoryRefreshed { slots: usize },
    /// The integration is being unloaded
    Unloading,
}

impl HostEvent {
    pub fn window_opened(window: WindowKind) -> Self {
        Self::WindowOpened { window }
    }

    pub fn window_closed(window: WindowKind) -> Self {
        Self::WindowClosed { window }
    }

    pub fn all_windows_closed() -> Self {
        Self::AllWindowsClosed
    }

    pub fn player_spawned(local: bool) -> Self {
        Self::PlayerSpawned { local }
    }

    pub fn inventory_refreshed(slots: usize) -> Self {
        Self::InventoryRefreshed { slots }
    }

    /// Short name used in log lines
    pub fn name(&self) -> &'static str {
        match self {
            HostEvent::WindowOpened { .. } => "window_opened",
            HostEvent::WindowClosed { .. } => "window_closed",
            HostEvent::AllWindowsClosed => "all_windows_closed",
            HostEvent::PlayerSpawned { .. } => "player_spawned",
            HostEvent::InventoryRefreshed { .. } => "inventory_refreshed",
            HostEvent::Unloading => "unloading",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let opened = HostEvent::window_opened(WindowKind::Equipment);
        assert!(matches!(
            opened,
            HostEvent::WindowOpened {
                window: WindowKind::Equipment
            }
        ));
        assert_eq!(opened.name(), "window_opened");

        let refreshed = HostEvent::inventory_refreshed(60);
        assert!(matches!(refreshed, HostEvent::InventoryRefreshed { slots: 60 }));

        assert!(matches!(
            HostEvent::all_windows_closed(),
            HostEvent::AllWindowsClosed
        ));
    }

    #[test]
    fn test_events_parse_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            events: Vec<HostEvent>,
        }

        let parsed: Wrapper = toml::from_str(
            r#"
            events = [
                { event = "window_opened", window = "equipment" },
                { event = "all_windows_closed" },
                { event = "player_spawned", local = true },
            ]
            "#,
        )
        .unwrap();

        assert_eq!(
            parsed.events,
            vec![
                HostEvent::window_opened(WindowKind::Equipment),
                HostEvent::AllWindowsClosed,
                HostEvent::player_spawned(true),
            ]
        );
    }
}
