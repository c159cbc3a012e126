//! Scripted host sessions.
//!
//! A scenario is a TOML file describing the in-memory host (inventory size,
//! catalog) and a list of steps: host events and user actions. The runner
//! applies each step to a [`PanelSystem`], ticks it, ends the host frame and
//! reports the resulting panel states.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use super::sim::{SimCatalog, SimHost, SimInventory};
use super::{HostEvent, WindowKind};
use crate::config::Config;
use crate::core::coordinator::Resolution;
use crate::core::{PanelSnapshot, PanelSystem};
use crate::panels::PanelKind;

pub const DEFAULT_SCENARIO: &str = include_str!("../../defaults/scenario.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub host: ScenarioHost,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioHost {
    /// `None` starts without a loaded inventory
    pub inventory_size: Option<i64>,
    #[serde(default)]
    pub catalog: Vec<ScenarioItem>,
}

impl Default for ScenarioHost {
    fn default() -> Self {
        Self {
            inventory_size: Some(24),
            catalog: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioItem {
    pub id: String,
    #[serde(default)]
    pub label: String,
}

fn default_local() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    OpenWindow { window: WindowKind },
    CloseWindow { window: WindowKind },
    CloseAllWindows,
    /// Tear down and reopen a window without raising any event
    RebuildWindow { window: WindowKind },
    PlayerSpawned {
        #[serde(default = "default_local")]
        local: bool,
    },
    /// Defaults to the current inventory size
    InventoryRefreshed { slots: Option<usize> },
    /// The player inventory becomes available with `slots` slots
    LoadInventory { slots: i64 },
    Unload,
    Toggle { panel: PanelKind },
    SetVisibility { panel: PanelKind, visible: bool },
    Shortcut { keys: String },
    SetSize { value: String },
    Select { item: String },
    Spawn {
        item: Option<String>,
        #[serde(default)]
        quantity: Option<String>,
    },
    RefreshCatalog,
    /// Scroll a panel's grid by `delta` pixels
    Scroll { panel: PanelKind, delta: f32 },
    Advance { ms: u64 },
    /// Answer up to `count` queued inventory requests (all when omitted)
    Settle { count: Option<usize> },
    /// The inventory loses every queued request without answering
    DropRequests,
}

impl Step {
    pub fn describe(&self) -> String {
        match self {
            Step::OpenWindow { window } => format!("open {} window", window),
            Step::CloseWindow { window } => format!("close {} window", window),
            Step::CloseAllWindows => "close all windows".to_string(),
            Step::RebuildWindow { window } => format!("host rebuilds {} window", window),
            Step::PlayerSpawned { local } => {
                format!("{} player spawned", if *local { "local" } else { "remote" })
            }
            Step::InventoryRefreshed { slots } => match slots {
                Some(slots) => format!("inventory refreshed ({} slots)", slots),
                None => "inventory refreshed".to_string(),
            },
            Step::LoadInventory { slots } => format!("inventory loaded ({} slots)", slots),
            Step::Unload => "unload".to_string(),
            Step::Toggle { panel } => format!("toggle {} panel", panel),
            Step::SetVisibility { panel, visible } => {
                format!("set {} panel visible={}", panel, visible)
            }
            Step::Shortcut { keys } => format!("press {}", keys),
            Step::SetSize { value } => format!("set size '{}'", value),
            Step::Select { item } => format!("select {}", item),
            Step::Spawn { item, quantity } => format!(
                "spawn {}x {}",
                quantity.as_deref().unwrap_or("?"),
                item.as_deref().unwrap_or("<selected>")
            ),
            Step::RefreshCatalog => "refresh catalog".to_string(),
            Step::Scroll { panel, delta } => format!("scroll {} panel by {}", panel, delta),
            Step::Advance { ms } => format!("advance {}ms", ms),
            Step::Settle { count } => match count {
                Some(count) => format!("settle {} requests", count),
                None => "settle requests".to_string(),
            },
            Step::DropRequests => "inventory drops queued requests".to_string(),
        }
    }
}

impl Scenario {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let scenario: Scenario = toml::from_str(contents).context("Failed to parse scenario")?;
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .context(format!("Failed to read scenario file: {:?}", path))?;
        Self::from_toml_str(&contents).context(format!("Invalid scenario file: {:?}", path))
    }

    pub fn embedded_default() -> Result<Self> {
        Self::from_toml_str(DEFAULT_SCENARIO)
    }

    fn build_host(&self) -> SimHost {
        let inventory = match self.host.inventory_size {
            Some(size) => SimInventory::new(size),
            None => SimInventory::unloaded(),
        };
        let catalog = SimCatalog::new(
            self.host
                .catalog
                .iter()
                .map(|item| (item.id.clone(), item.label.clone())),
        );
        SimHost::new(inventory, catalog)
    }
}

/// What one step did
#[derive(Debug, Clone)]
pub struct StepReport {
    pub index: usize,
    pub description: String,
    /// Simulated time since the session started
    pub elapsed: Duration,
    /// `Err` carries the message the panel showed for a rejected action
    pub outcome: std::result::Result<String, String>,
    pub resolutions: usize,
    pub panels: Vec<PanelSnapshot>,
    /// Panel roots as the host tree sees them, in `panels` order
    pub host_panels: Vec<HostPanelNodes>,
}

/// Host-side count of one panel kind's root nodes after the frame ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostPanelNodes {
    pub kind: PanelKind,
    pub instances: usize,
    pub shown: usize,
}

pub struct ScenarioRunner {
    host: SimHost,
    system: PanelSystem,
    start: Instant,
    elapsed: Duration,
    steps_run: usize,
}

impl ScenarioRunner {
    pub fn new(scenario: &Scenario, config: Config) -> Self {
        let start = Instant::now();
        let mut system = PanelSystem::new(config, start);
        system.on_refresh(Box::new(|resolution: &Resolution| {
            tracing::info!(
                "{} resolved for {:?}: {:?}",
                resolution.id,
                resolution.origin,
                resolution.outcome
            );
        }));
        Self {
            host: scenario.build_host(),
            system,
            start,
            elapsed: Duration::ZERO,
            steps_run: 0,
        }
    }

    pub fn host(&self) -> &SimHost {
        &self.host
    }

    pub fn system(&self) -> &PanelSystem {
        &self.system
    }

    fn now(&self) -> Instant {
        self.start + self.elapsed
    }

    /// Apply one step, tick the panel system and end the host frame.
    pub fn run_step(&mut self, step: &Step) -> StepReport {
        let outcome = self.apply(step);
        let now = self.now();
        let resolutions = self.system.tick(&mut self.host.context(), now).len();
        self.host.ui.end_frame();

        let report = StepReport {
            index: self.steps_run,
            description: step.describe(),
            elapsed: self.elapsed,
            outcome,
            resolutions,
            panels: PanelKind::ALL
                .iter()
                .map(|kind| self.system.snapshot(*kind))
                .collect(),
            host_panels: PanelKind::ALL
                .iter()
                .map(|kind| {
                    let name = kind.node_name();
                    HostPanelNodes {
                        kind: *kind,
                        instances: self.host.ui.count_named(&name),
                        shown: self.host.ui.count_shown(&name),
                    }
                })
                .collect(),
        };
        self.steps_run += 1;
        report
    }

    fn apply(&mut self, step: &Step) -> std::result::Result<String, String> {
        let now = self.now();
        let host = &mut self.host;
        let system = &mut self.system;

        match step {
            Step::OpenWindow { window } => {
                host.ui.open_window(*window);
                system.handle_event(&mut host.context(), &HostEvent::window_opened(*window), now);
                Ok(String::new())
            }
            Step::CloseWindow { window } => {
                host.ui.close_window(*window);
                system.handle_event(&mut host.context(), &HostEvent::window_closed(*window), now);
                Ok(String::new())
            }
            Step::CloseAllWindows => {
                host.ui.close_all_windows();
                system.handle_event(&mut host.context(), &HostEvent::all_windows_closed(), now);
                Ok(String::new())
            }
            Step::RebuildWindow { window } => {
                if !host.ui.is_open(*window) {
                    return Err(format!("no {} window is open", window));
                }
                host.ui.rebuild_window(*window);
                Ok(String::new())
            }
            Step::PlayerSpawned { local } => {
                system.handle_event(&mut host.context(), &HostEvent::player_spawned(*local), now);
                Ok(format!("session {}", system.session()))
            }
            Step::InventoryRefreshed { slots } => {
                let slots = slots
                    .or_else(|| host.inventory.size().and_then(|s| usize::try_from(s).ok()))
                    .unwrap_or(0);
                system.handle_event(&mut host.context(), &HostEvent::inventory_refreshed(slots), now);
                Ok(format!("{} slots", slots))
            }
            Step::LoadInventory { slots } => {
                host.inventory.load(*slots);
                Ok(String::new())
            }
            Step::Unload => {
                system.handle_event(&mut host.context(), &HostEvent::Unloading, now);
                Ok(String::new())
            }
            Step::Toggle { panel } => system
                .toggle_panel(&mut host.context(), *panel)
                .map(|shown| (if shown { "shown" } else { "closed" }).to_string())
                .map_err(|e| e.to_string()),
            Step::SetVisibility { panel, visible } => {
                system.set_visibility(&mut host.ui, *panel, *visible);
                Ok(String::new())
            }
            Step::Shortcut { keys } => match system.handle_shortcut(&mut host.context(), keys) {
                Some(kind) => Ok(format!("{} panel visible: {}", kind, system.is_visible(kind))),
                None => Err(format!("'{}' is not bound", keys)),
            },
            Step::SetSize { value } => {
                system
                    .enter_size_text(&mut host.ui, value)
                    .map_err(|e| e.to_string())?;
                system
                    .apply_size_from_input(&mut host.context(), now)
                    .map(|ticket| ticket.id.to_string())
                    .map_err(|e| e.to_string())
            }
            Step::Select { item } => system
                .select_item(&mut host.ui, item)
                .map(|entry| entry.label)
                .map_err(|e| e.to_string()),
            Step::Spawn { item, quantity } => {
                if let Some(item) = item {
                    system
                        .select_item(&mut host.ui, item)
                        .map_err(|e| e.to_string())?;
                }
                if let Some(quantity) = quantity {
                    system
                        .enter_spawn_quantity(&mut host.ui, quantity)
                        .map_err(|e| e.to_string())?;
                }
                system
                    .spawn_from_input(&mut host.context(), now)
                    .map(|ticket| ticket.id.to_string())
                    .map_err(|e| e.to_string())
            }
            Step::RefreshCatalog => system
                .refresh_catalog(&mut host.context())
                .map(|count| format!("{} entries", count))
                .map_err(|e| e.to_string()),
            Step::Scroll { panel, delta } => system
                .scroll(&mut host.ui, *panel, *delta)
                .map(|offset| format!("offset {}", offset))
                .map_err(|e| e.to_string()),
            Step::Advance { ms } => {
                self.elapsed += Duration::from_millis(*ms);
                Ok(String::new())
            }
            Step::Settle { count } => {
                let answered = match count {
                    Some(count) => host.inventory.settle_some(*count),
                    None => host.inventory.settle(),
                };
                Ok(format!("{} answered", answered))
            }
            Step::DropRequests => Ok(format!("{} dropped", host.inventory.drop_pending())),
        }
    }

    /// Replay every step, pacing them `pace` apart on the tokio timer.
    pub async fn play<F>(&mut self, steps: &[Step], pace: Duration, mut on_report: F)
    where
        F: FnMut(&StepReport),
    {
        let mut ticker = (!pace.is_zero()).then(|| tokio::time::interval(pace));
        for step in steps {
            match ticker.as_mut() {
                Some(ticker) => {
                    ticker.tick().await;
                }
                None => tokio::task::yield_now().await,
            }
            let report = self.run_step(step);
            on_report(&report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scenario_parses() {
        let scenario = Scenario::embedded_default().unwrap();
        assert_eq!(scenario.host.inventory_size, Some(24));
        assert_eq!(scenario.host.catalog.len(), 4);
        assert_eq!(scenario.steps[0], Step::PlayerSpawned { local: true });
        assert!(scenario.steps.contains(&Step::Advance { ms: 2000 }));
    }

    #[test]
    fn test_default_scenario_runs_to_completion() {
        let scenario = Scenario::embedded_default().unwrap();
        let mut runner = ScenarioRunner::new(&scenario, Config::default());

        let reports: Vec<StepReport> = scenario
            .steps
            .iter()
            .map(|step| runner.run_step(step))
            .collect();

        // Default size, the 54-slot resize, the spawn batch, the dropped resize
        let delivered: usize = reports.iter().map(|r| r.resolutions).sum();
        assert_eq!(delivered, 4);
        assert_eq!(runner.system().coordinator().discarded_count(), 1);
        assert_eq!(runner.host().inventory.size(), Some(80));
        assert_eq!(runner.host().inventory.items().len(), 5);

        let rejected: Vec<&str> = reports
            .iter()
            .filter(|r| r.outcome.is_err())
            .map(|r| r.description.as_str())
            .collect();
        assert_eq!(
            rejected,
            vec!["set size 'lots'", "spawn 3x <selected>", "toggle size control panel"]
        );

        let last = reports.last().unwrap();
        assert!(last.panels.iter().all(|p| !p.live));
        assert!(last.host_panels.iter().all(|h| h.instances == 0));
    }

    #[test]
    fn test_dropped_request_fails_on_the_panel() {
        let scenario = Scenario::from_toml_str(
            r#"
            # No inventory until the load step
            [host]
            catalog = []

            [[step]]
            action = "open_window"
            window = "equipment"

            [[step]]
            action = "set_size"
            value = "30"

            [[step]]
            action = "load_inventory"
            slots = 20

            [[step]]
            action = "set_size"
            value = "30"

            [[step]]
            action = "drop_requests"
            "#,
        )
        .unwrap();
        let mut runner = ScenarioRunner::new(&scenario, Config::default());
        let reports: Vec<StepReport> = scenario
            .steps
            .iter()
            .map(|step| runner.run_step(step))
            .collect();

        assert!(reports[1].outcome.is_err());
        assert!(reports[3].outcome.is_ok());
        assert_eq!(reports[4].outcome, Ok("1 dropped".to_string()));
        assert_eq!(reports[4].resolutions, 1);
        assert_eq!(runner.host().inventory.size(), Some(20));

        let size = &reports[4].panels[0];
        assert_eq!(size.kind, PanelKind::SizeControl);
        assert!(size.status.starts_with("ERROR:"));
        assert_eq!(
            reports[4].host_panels[0],
            HostPanelNodes {
                kind: PanelKind::SizeControl,
                instances: 1,
                shown: 1,
            }
        );
    }

    #[test]
    fn test_scroll_step_reports_offset() {
        let scenario = Scenario::from_toml_str(
            r#"
            [host]
            inventory_size = 54

            [[step]]
            action = "scroll"
            panel = "size_control"
            delta = 30.0

            [[step]]
            action = "open_window"
            window = "equipment"

            [[step]]
            action = "scroll"
            panel = "size_control"
            delta = 30.0
            "#,
        )
        .unwrap();
        let mut runner = ScenarioRunner::new(&scenario, Config::default());
        let reports: Vec<StepReport> = scenario
            .steps
            .iter()
            .map(|step| runner.run_step(step))
            .collect();

        assert!(reports[0].outcome.is_err());
        assert_eq!(reports[2].outcome, Ok("offset 30".to_string()));
        assert_eq!(reports[2].panels[0].content, "54 slots, scrolled 30px");
    }

    #[test]
    fn test_rebuild_of_closed_window_is_rejected() {
        let scenario = Scenario::from_toml_str(
            r#"
            [[step]]
            action = "rebuild_window"
            window = "equipment"
            "#,
        )
        .unwrap();
        let mut runner = ScenarioRunner::new(&scenario, Config::default());
        let report = runner.run_step(&scenario.steps[0]);
        assert_eq!(report.outcome, Err("no equipment window is open".to_string()));
    }

    #[test]
    fn test_play_reports_every_step() {
        let scenario = Scenario::from_toml_str(
            r#"
            [host]
            inventory_size = 10

            [[step]]
            action = "open_window"
            window = "equipment"

            [[step]]
            action = "toggle"
            panel = "size_control"
            "#,
        )
        .unwrap();
        let mut runner = ScenarioRunner::new(&scenario, Config::default());
        let mut seen = Vec::new();

        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(runner.play(&scenario.steps, Duration::ZERO, |report| {
            seen.push(report.outcome.clone())
        }));

        assert_eq!(seen, vec![Ok(String::new()), Ok("closed".to_string())]);
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let result = Scenario::from_toml_str(
            r#"
            [[step]]
            action = "explode"
            "#,
        );
        assert!(result.is_err());
    }
}
