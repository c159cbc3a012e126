//! Configuration loader/writer plus strongly typed settings structures.
//!
//! The shipped `defaults/config.toml` is embedded at compile time and
//! extracted to `~/.overlay-panels/config.toml` on first run. Every field has a
//! serde default so partial files keep loading after upgrades.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::host::WindowKind;
use crate::layout::{Padding, ScrollSpec, ScrollStyle, Size, Spacing, GridSpec};
use crate::panels::PanelKind;

pub mod shortcut_validator;

// Embed default configuration at compile time
const DEFAULT_CONFIG: &str = include_str!("../defaults/config.toml");

/// Top-level configuration object
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub panels: PanelsConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(skip)] // Set at runtime to the file this config came from
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Inventory size applied automatically after the player spawns
    pub default_quantity: i64,
    pub auto_set_on_spawn: bool,
    pub auto_set_delay_ms: u64,
    pub catalog_warmup_delay_ms: u64,
    pub min_quantity: i64,
    pub max_quantity: i64,
    pub request_timeout_ms: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_quantity: 100,
            auto_set_on_spawn: true,
            auto_set_delay_ms: 2000,
            catalog_warmup_delay_ms: 5000,
            min_quantity: 1,
            max_quantity: 1000,
            request_timeout_ms: 10_000,
        }
    }
}

impl GeneralConfig {
    pub fn auto_set_delay(&self) -> Duration {
        Duration::from_millis(self.auto_set_delay_ms)
    }

    pub fn catalog_warmup_delay(&self) -> Duration {
        Duration::from_millis(self.catalog_warmup_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Force `1 <= min <= default <= max`. Returns a note per adjustment.
    pub fn normalize_quantities(&mut self) -> Vec<String> {
        let mut notes = Vec::new();
        if self.min_quantity < 1 {
            notes.push(format!("min_quantity {} raised to 1", self.min_quantity));
            self.min_quantity = 1;
        }
        if self.max_quantity < self.min_quantity {
            notes.push(format!(
                "max_quantity {} raised to min_quantity {}",
                self.max_quantity, self.min_quantity
            ));
            self.max_quantity = self.min_quantity;
        }
        let clamped = self
            .default_quantity
            .clamp(self.min_quantity, self.max_quantity);
        if clamped != self.default_quantity {
            notes.push(format!(
                "default_quantity {} clamped to {}",
                self.default_quantity, clamped
            ));
            self.default_quantity = clamped;
        }
        notes
    }
}

/// Per-panel behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelConfig {
    /// Visibility of the first instance before any toggle
    pub visible_by_default: bool,
    /// Create the panel whenever its anchor window opens
    pub show_on_window_open: bool,
    pub toggle_shortcut: String,
    pub anchor_window: WindowKind,
}

impl PanelConfig {
    pub fn default_for(kind: PanelKind) -> Self {
        match kind {
            PanelKind::SizeControl => Self {
                visible_by_default: true,
                show_on_window_open: true,
                toggle_shortcut: "ctrl+shift+b".to_string(),
                anchor_window: WindowKind::Equipment,
            },
            PanelKind::ItemSpawner => Self {
                visible_by_default: false,
                show_on_window_open: true,
                toggle_shortcut: "ctrl+i".to_string(),
                anchor_window: WindowKind::Equipment,
            },
        }
    }

    fn size_control_default() -> Self {
        Self::default_for(PanelKind::SizeControl)
    }

    fn item_spawner_default() -> Self {
        Self::default_for(PanelKind::ItemSpawner)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelsConfig {
    #[serde(default = "PanelConfig::size_control_default")]
    pub size_control: PanelConfig,
    #[serde(default = "PanelConfig::item_spawner_default")]
    pub item_spawner: PanelConfig,
}

impl Default for PanelsConfig {
    fn default() -> Self {
        Self {
            size_control: PanelConfig::size_control_default(),
            item_spawner: PanelConfig::item_spawner_default(),
        }
    }
}

impl PanelsConfig {
    pub fn get(&self, kind: PanelKind) -> &PanelConfig {
        match kind {
            PanelKind::SizeControl => &self.size_control,
            PanelKind::ItemSpawner => &self.item_spawner,
        }
    }

    pub fn get_mut(&mut self, kind: PanelKind) -> &mut PanelConfig {
        match kind {
            PanelKind::SizeControl => &mut self.size_control,
            PanelKind::ItemSpawner => &mut self.item_spawner,
        }
    }

    /// Panel whose toggle shortcut matches `pressed`, in canonical form.
    pub fn panel_for_shortcut(&self, pressed: &str) -> Option<PanelKind> {
        let pressed = shortcut_validator::normalize_shortcut(pressed)?;
        PanelKind::ALL.into_iter().find(|kind| {
            shortcut_validator::normalize_shortcut(&self.get(*kind).toggle_shortcut).as_deref()
                == Some(pressed.as_str())
        })
    }
}

/// Geometry of one scrollable grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridLayoutConfig {
    pub columns: usize,
    pub cell: Size,
    #[serde(default)]
    pub spacing: Spacing,
    #[serde(default)]
    pub padding: Padding,
    pub viewport_height: f32,
}

impl GridLayoutConfig {
    fn inventory_default() -> Self {
        Self {
            columns: 6,
            cell: Size::new(50.0, 50.0),
            spacing: Spacing::new(2.0, 2.0),
            padding: Padding::default(),
            viewport_height: 400.0,
        }
    }

    fn item_list_default() -> Self {
        Self {
            columns: 1,
            cell: Size::new(260.0, 30.0),
            spacing: Spacing::new(0.0, 2.0),
            padding: Padding::uniform(5.0),
            viewport_height: 300.0,
        }
    }

    pub fn grid(&self) -> GridSpec {
        GridSpec::new(self.columns, self.cell, self.spacing, self.padding)
    }

    pub fn scroll_spec(&self, style: ScrollStyle) -> ScrollSpec {
        ScrollSpec::new(self.grid(), style, self.viewport_height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "GridLayoutConfig::inventory_default")]
    pub inventory_grid: GridLayoutConfig,
    #[serde(default = "GridLayoutConfig::item_list_default")]
    pub item_list: GridLayoutConfig,
    #[serde(default)]
    pub scrollbar: ScrollStyle,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            inventory_grid: GridLayoutConfig::inventory_default(),
            item_list: GridLayoutConfig::item_list_default(),
            scrollbar: ScrollStyle::default(),
        }
    }
}

impl LayoutConfig {
    pub fn inventory_spec(&self) -> ScrollSpec {
        self.inventory_grid.scroll_spec(self.scrollbar)
    }

    pub fn item_list_spec(&self) -> ScrollSpec {
        self.item_list.scroll_spec(self.scrollbar)
    }
}

impl Config {
    /// Load from `path`, or from the profile config (extracting the shipped
    /// defaults on first run) when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                Self::extract_defaults()?;
                Self::config_path()?
            }
        };

        let contents = fs::read_to_string(&config_path)
            .context(format!("Failed to read config file: {:?}", config_path))?;
        let mut config = Self::from_toml_str(&contents)
            .context(format!("Failed to parse config file: {:?}", config_path))?;
        config.source = Some(config_path);
        Ok(config)
    }

    /// Parse, normalise and auto-fix a config document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(contents)?;

        for note in config.general.normalize_quantities() {
            tracing::warn!("Config: {}", note);
        }

        // Validate and auto-fix panel shortcuts. A restored default can clash
        // with another panel's custom shortcut, so check once more after fixing.
        for _ in 0..2 {
            let validation = shortcut_validator::validate_shortcuts(&config.panels);
            if !validation.has_errors() {
                break;
            }
            tracing::warn!(
                "Shortcut validation found {} errors",
                validation.errors().len()
            );
            for error in validation.errors() {
                tracing::warn!("  {}", error.message());
            }

            let fixed = shortcut_validator::auto_fix_shortcuts(&mut config.panels, &validation.issues);
            if fixed > 0 {
                tracing::info!("Auto-fixed {} shortcut issues", fixed);
            }
        }

        Ok(config)
    }

    /// The shipped defaults, parsed.
    pub fn embedded_default() -> Result<Self> {
        Self::from_toml_str(DEFAULT_CONFIG).context("Failed to parse embedded default config")
    }

    pub fn save(&self) -> Result<()> {
        let config_path = match &self.source {
            Some(path) => path.clone(),
            None => Self::config_path()?,
        };

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, contents).context("Failed to write config file")?;
        Ok(())
    }

    /// Write the shipped config if the profile has none yet
    fn extract_defaults() -> Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir).context(format!("Failed to create {:?}", dir))?;

        let config_path = dir.join("config.toml");
        if !config_path.exists() {
            fs::write(&config_path, DEFAULT_CONFIG).context("Failed to write config.toml")?;
            tracing::info!("Extracted config.toml to {:?}", config_path);
        }
        Ok(())
    }

    /// Get the base directory (~/.overlay-panels/)
    /// Can be overridden with OVERLAY_PANELS_DIR environment variable
    fn config_dir() -> Result<PathBuf> {
        if let Ok(custom_dir) = std::env::var("OVERLAY_PANELS_DIR") {
            return Ok(PathBuf::from(custom_dir));
        }

        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".overlay-panels"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn log_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("overlay-panels.log"))
    }

    pub fn validate(&self) -> shortcut_validator::ValidationResult {
        shortcut_validator::validate_shortcuts(&self.panels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_default_matches_code_defaults() {
        let config = Config::embedded_default().unwrap();
        let general = GeneralConfig::default();
        assert_eq!(config.general.default_quantity, general.default_quantity);
        assert_eq!(config.general.auto_set_delay_ms, general.auto_set_delay_ms);
        assert_eq!(config.panels, PanelsConfig::default());
        assert_eq!(config.layout, LayoutConfig::default());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = Config::from_toml_str(
            r#"
            [general]
            default_quantity = 60

            [panels.item_spawner]
            visible_by_default = true
            show_on_window_open = false
            toggle_shortcut = "F7"
            anchor_window = "crafting"
            "#,
        )
        .unwrap();

        assert_eq!(config.general.default_quantity, 60);
        assert_eq!(config.general.max_quantity, 1000);
        assert_eq!(config.panels.size_control, PanelConfig::default_for(PanelKind::SizeControl));
        assert_eq!(config.panels.item_spawner.anchor_window, WindowKind::Crafting);
        assert_eq!(config.layout.inventory_grid.columns, 6);
    }

    #[test]
    fn test_quantities_are_normalized() {
        let mut general = GeneralConfig {
            default_quantity: 5000,
            min_quantity: 0,
            max_quantity: 1000,
            ..GeneralConfig::default()
        };
        let notes = general.normalize_quantities();
        assert_eq!(notes.len(), 2);
        assert_eq!(general.min_quantity, 1);
        assert_eq!(general.default_quantity, 1000);
    }

    #[test]
    fn test_blank_shortcut_is_restored_on_load() {
        let config = Config::from_toml_str(
            r#"
            [panels.size_control]
            visible_by_default = true
            show_on_window_open = true
            toggle_shortcut = ""
            anchor_window = "equipment"
            "#,
        )
        .unwrap();
        assert_eq!(config.panels.size_control.toggle_shortcut, "ctrl+shift+b");
    }

    #[test]
    fn test_shared_shortcut_is_fixed_so_both_hotkeys_work() {
        let config = Config::from_toml_str(
            r#"
            [panels.item_spawner]
            visible_by_default = false
            show_on_window_open = true
            toggle_shortcut = "Shift+Ctrl+B"
            anchor_window = "equipment"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.panels.panel_for_shortcut("ctrl+shift+b"),
            Some(PanelKind::SizeControl)
        );
        assert_eq!(
            config.panels.panel_for_shortcut("ctrl+i"),
            Some(PanelKind::ItemSpawner)
        );
    }

    #[test]
    fn test_restored_default_clash_is_fixed_too() {
        let config = Config::from_toml_str(
            r#"
            [panels.size_control]
            visible_by_default = true
            show_on_window_open = true
            toggle_shortcut = ""
            anchor_window = "equipment"

            [panels.item_spawner]
            visible_by_default = false
            show_on_window_open = true
            toggle_shortcut = "ctrl+shift+b"
            anchor_window = "equipment"
            "#,
        )
        .unwrap();

        assert!(!config.validate().has_errors());
        assert_eq!(config.panels.item_spawner.toggle_shortcut, "ctrl+i");
    }

    #[test]
    fn test_panel_for_shortcut_ignores_case_and_order() {
        let panels = PanelsConfig::default();
        assert_eq!(panels.panel_for_shortcut("Shift+Ctrl+B"), Some(PanelKind::SizeControl));
        assert_eq!(panels.panel_for_shortcut("CTRL+I"), Some(PanelKind::ItemSpawner));
        assert_eq!(panels.panel_for_shortcut("ctrl+j"), None);
    }

    #[test]
    fn test_inventory_spec_matches_layout() {
        let spec = LayoutConfig::default().inventory_spec();
        assert_eq!(spec.grid.columns, 6);
        assert_eq!(spec.viewport_height, 400.0);
        assert_eq!(spec.style.reserved_track(), 25.0);
    }
}
