//! Core panel logic
//!
//! Everything here runs on the single UI thread and reaches the host only
//! through [`crate::host::HostContext`]. No rendering or host-specific code.

pub mod app_core;
pub mod coordinator;
pub mod tasks;

pub use app_core::{PanelSnapshot, PanelSystem};
