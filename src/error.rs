//! Typed errors for panel lifecycle, layout and request handling.
//!
//! Every variant aborts only the operation that raised it; the panel state
//! machine is always left in its prior well-defined state.

use thiserror::Error;

use crate::host::{NodeId, WindowKind};
use crate::panels::PanelKind;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PanelError {
    #[error("Invalid layout parameter: {0}")]
    InvalidLayoutParameter(String),

    #[error("Attach point {0} is missing or destroyed")]
    InvalidParent(NodeId),

    #[error("No {window} window is open to anchor the {panel} panel")]
    HostAnchorUnavailable { panel: PanelKind, window: WindowKind },

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("'{0}' is not a whole number")]
    InvalidNumber(String),

    #[error("{value} is outside the allowed range {min}..={max}")]
    QuantityOutOfRange { value: i64, min: i64, max: i64 },

    #[error("Select an item first")]
    NoSelection,

    #[error("The {0} panel is not open")]
    PanelNotLive(PanelKind),

    #[error("{0} is not available right now")]
    CollaboratorUnavailable(&'static str),
}

pub type PanelResult<T> = Result<T, PanelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_context() {
        let err = PanelError::HostAnchorUnavailable {
            panel: PanelKind::SizeControl,
            window: WindowKind::Equipment,
        };
        assert_eq!(
            err.to_string(),
            "No equipment window is open to anchor the size control panel"
        );

        let err = PanelError::QuantityOutOfRange {
            value: 2000,
            min: 1,
            max: 1000,
        };
        assert_eq!(err.to_string(), "2000 is outside the allowed range 1..=1000");
    }
}
