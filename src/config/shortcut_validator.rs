//! Panel shortcut validator
//!
//! Every panel needs a usable toggle shortcut, and no two panels may share
//! one. Missing, malformed or shared shortcuts are restored to their defaults.

use std::collections::BTreeMap;

use crate::config::{PanelConfig, PanelsConfig};
use crate::panels::PanelKind;

const MODIFIERS: [&str; 3] = ["ctrl", "alt", "shift"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingShortcut {
        panel: PanelKind,
        default: String,
    },
    MalformedShortcut {
        panel: PanelKind,
        value: String,
        default: String,
    },
    DuplicateShortcut {
        shortcut: String,
        panels: Vec<PanelKind>,
    },
}

impl ValidationIssue {
    pub fn message(&self) -> String {
        match self {
            ValidationIssue::MissingShortcut { panel, default } => {
                format!(
                    "The {} panel has no toggle shortcut. Default: {}",
                    panel, default
                )
            }
            ValidationIssue::MalformedShortcut {
                panel,
                value,
                default,
            } => {
                format!(
                    "The {} panel shortcut '{}' is not a key combination. Default: {}",
                    panel, value, default
                )
            }
            ValidationIssue::DuplicateShortcut { shortcut, panels } => {
                let names: Vec<&str> = panels.iter().map(|p| p.display_name()).collect();
                format!(
                    "Shortcut '{}' toggles more than one panel: {}",
                    shortcut,
                    names.join(", ")
                )
            }
        }
    }
}

/// Every issue is an error: each one is auto-fixed on load.
pub struct ValidationResult {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn has_errors(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn errors(&self) -> &[ValidationIssue] {
        &self.issues
    }
}

/// Canonical form of a key combination: lowercase, modifiers first in
/// `ctrl`, `alt`, `shift` order, then exactly one key.
///
/// `"Shift+Ctrl+B"` and `"ctrl + shift + b"` both become `"ctrl+shift+b"`.
pub fn normalize_shortcut(raw: &str) -> Option<String> {
    let mut modifiers = [false; 3];
    let mut key: Option<String> = None;

    for part in raw.split('+') {
        let part = part.trim().to_ascii_lowercase();
        let modifier = match part.as_str() {
            "" => return None,
            "ctrl" | "control" => Some(0),
            "alt" | "option" => Some(1),
            "shift" => Some(2),
            _ => None,
        };
        match modifier {
            Some(index) => modifiers[index] = true,
            None if key.is_none() => key = Some(part),
            None => return None,
        }
    }

    let key = key?;
    let mut parts: Vec<&str> = MODIFIERS
        .iter()
        .zip(modifiers)
        .filter(|(_, held)| *held)
        .map(|(name, _)| *name)
        .collect();
    parts.push(&key);
    Some(parts.join("+"))
}

/// Validate the toggle shortcuts of every panel
pub fn validate_shortcuts(panels: &PanelsConfig) -> ValidationResult {
    let mut issues = Vec::new();
    let mut seen: BTreeMap<String, Vec<PanelKind>> = BTreeMap::new();

    for kind in PanelKind::ALL {
        let value = &panels.get(kind).toggle_shortcut;
        let default = PanelConfig::default_for(kind).toggle_shortcut;

        if value.trim().is_empty() {
            issues.push(ValidationIssue::MissingShortcut {
                panel: kind,
                default,
            });
            continue;
        }
        match normalize_shortcut(value) {
            Some(shortcut) => seen.entry(shortcut).or_default().push(kind),
            None => issues.push(ValidationIssue::MalformedShortcut {
                panel: kind,
                value: value.clone(),
                default,
            }),
        }
    }

    for (shortcut, panels) in seen {
        if panels.len() > 1 {
            issues.push(ValidationIssue::DuplicateShortcut { shortcut, panels });
        }
    }

    ValidationResult { issues }
}

/// Restore defaults for missing or malformed shortcuts.
///
/// For a shared shortcut, every panel in the clash that no longer uses its
/// own default is reset; defaults never collide with each other.
pub fn auto_fix_shortcuts(panels: &mut PanelsConfig, issues: &[ValidationIssue]) -> usize {
    let mut fixed_count = 0;

    for issue in issues {
        match issue {
            ValidationIssue::MissingShortcut { panel, default }
            | ValidationIssue::MalformedShortcut { panel, default, .. } => {
                panels.get_mut(*panel).toggle_shortcut = default.clone();
                fixed_count += 1;
            }
            ValidationIssue::DuplicateShortcut { shortcut, panels: clashing } => {
                for kind in clashing {
                    let default = PanelConfig::default_for(*kind).toggle_shortcut;
                    if normalize_shortcut(&default).as_deref() != Some(shortcut.as_str()) {
                        panels.get_mut(*kind).toggle_shortcut = default;
                        fixed_count += 1;
                    }
                }
            }
        }
    }

    fixed_count
}
