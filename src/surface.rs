//! Trait seams over the browser-automation collaborator.
//!
//! The engine never talks to a browser directly. It drives a
//! [`ControlSurface`] (the chat input element) and a [`SessionDriver`] (the
//! surrounding browser session), both provided by the collaborator that owns
//! browser bootstrap and lifecycle. Keeping these object-safe keeps the
//! engine testable without any browser dependency.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::error::SurfaceError;

/// Keyboard combination issued to the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCombo {
    /// Select the entire field content.
    SelectAll,
    /// Delete the current selection.
    Delete,
    /// Select-all followed by delete; the forced-clear sequence.
    SelectAllDelete,
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SelectAll => "select-all",
            Self::Delete => "delete",
            Self::SelectAllDelete => "select-all+delete",
        };
        f.write_str(name)
    }
}

/// The UI text-input element driven by the engine.
///
/// All methods act on live browser state; `read` is the only side-effect-free
/// operation and is the engine's sole source of truth for residual detection
/// and post-send verification.
#[async_trait]
pub trait ControlSurface: Send + Sync {
    /// Read the current value of the input field verbatim.
    async fn read(&self) -> Result<String, SurfaceError>;

    /// Invoke the standard clear capability of the element.
    async fn clear(&self) -> Result<(), SurfaceError>;

    /// Type text into the field.
    async fn send_keys(&self, text: &str) -> Result<(), SurfaceError>;

    /// Issue a keyboard combination.
    async fn send_key_combo(&self, combo: KeyCombo) -> Result<(), SurfaceError>;

    /// Trigger the submit action.
    async fn submit(&self) -> Result<(), SurfaceError>;
}

/// The browser session surrounding the control surface.
#[async_trait]
pub trait SessionDriver: Send + Sync {
    /// Locate the input field, waiting up to `timeout` for it to render.
    async fn locate_input_field(
        &self,
        timeout: Duration,
    ) -> Result<Arc<dyn ControlSurface>, SurfaceError>;

    /// Reload and reinitialize the underlying session. Used only at the
    /// final recovery level.
    async fn reload(&self) -> Result<(), SurfaceError>;

    /// Wait for the remote agent's reply to the last submitted message.
    async fn await_reply(&self, timeout: Duration) -> Result<String, SurfaceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_combo_display() {
        assert_eq!(KeyCombo::SelectAllDelete.to_string(), "select-all+delete");
        assert_eq!(KeyCombo::SelectAll.to_string(), "select-all");
        assert_eq!(KeyCombo::Delete.to_string(), "delete");
    }
}
