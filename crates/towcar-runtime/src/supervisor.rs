//! [`ModeSupervisor`] – operator-driven pipeline selection.
//!
//! The tow car runs exactly one pipeline per frame.  The operator switches
//! between them with discrete commands; there are no automatic transitions.
//!
//! Commands are latched rather than applied immediately: whatever arrives
//! between two frames is applied when the next frame starts, with the last
//! command winning.  The mode returned by [`ModeSupervisor::begin_frame`] is
//! therefore stable for the whole frame even if input arrives mid-frame.
//!
//! # Example
//!
//! ```rust
//! use towcar_runtime::supervisor::ModeSupervisor;
//! use towcar_types::{OperatingMode, OperatorCommand};
//!
//! let mut sup = ModeSupervisor::new();
//! assert_eq!(sup.begin_frame(), OperatingMode::Marshal);
//!
//! sup.request(OperatorCommand::Docking);
//! assert_eq!(sup.mode(), OperatingMode::Marshal); // not applied yet
//! assert_eq!(sup.begin_frame(), OperatingMode::Docking);
//! ```

use tracing::{debug, info};

use towcar_types::{OperatingMode, OperatorCommand};

// ─────────────────────────────────────────────────────────────────────────────
// ModeSupervisor
// ─────────────────────────────────────────────────────────────────────────────

/// Two-state machine over [`OperatingMode`], starting in `MARSHAL`.
#[derive(Debug, Clone, Default)]
pub struct ModeSupervisor {
    mode: OperatingMode,
    /// Most recent command not yet applied.
    pending: Option<OperatorCommand>,
}

impl ModeSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch `command`; it replaces any command still pending.
    pub fn request(&mut self, command: OperatorCommand) {
        debug!(?command, "operator command latched");
        self.pending = Some(command);
    }

    /// Apply the latched command, if any, and return the mode for the frame
    /// that is starting.
    pub fn begin_frame(&mut self) -> OperatingMode {
        if let Some(command) = self.pending.take() {
            let next = command.target_mode();
            if next != self.mode {
                info!(from = %self.mode, to = %next, "operating mode changed");
                self.mode = next;
            }
        }
        self.mode
    }

    /// The mode applied at the start of the current frame.
    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    pub fn pending(&self) -> Option<OperatorCommand> {
        self.pending
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
