//! Single-breakpoint bookkeeping.
//!
//! The loop arms exactly one breakpoint per session. The slot validates arm and clear
//! requests before anything is sent to the target, and is only updated once the
//! monitor has acknowledged the command.

use super::{Breakpoint, BreakpointHandle};
use crate::common::MonitorError;

/// Tracks the one armed breakpoint of a session.
#[derive(Debug)]
pub struct BreakpointSlot {
    active: Option<(BreakpointHandle, Breakpoint)>,
    next_id: u32,
}

impl BreakpointSlot {
    /// Creates an empty slot.
    pub const fn new() -> Self {
        Self {
            active: None,
            next_id: 1,
        }
    }

    /// Fails with `BreakpointConflict` if a breakpoint is already armed.
    pub const fn check_free(&self, requested: &Breakpoint) -> Result<(), MonitorError> {
        match &self.active {
            Some((handle, _)) => Err(MonitorError::BreakpointConflict {
                active: handle.addr,
                requested: requested.addr,
            }),
            None => Ok(()),
        }
    }

    /// Records `breakpoint` as armed and returns its handle.
    pub const fn commit(&mut self, breakpoint: Breakpoint) -> BreakpointHandle {
        let handle = BreakpointHandle {
            id: self.next_id,
            addr: breakpoint.addr,
        };
        self.next_id = self.next_id.wrapping_add(1);
        self.active = Some((handle, breakpoint));
        handle
    }

    /// Returns the armed breakpoint if `handle` refers to it.
    ///
    /// # Returns
    ///
    /// `NoActiveBreakpoint` when nothing is armed, `StaleBreakpoint` when `handle`
    /// belongs to an earlier breakpoint.
    pub const fn check_active(&self, handle: BreakpointHandle) -> Result<Breakpoint, MonitorError> {
        match &self.active {
            None => Err(MonitorError::NoActiveBreakpoint),
            Some((armed, breakpoint)) if armed.id == handle.id => Ok(*breakpoint),
            Some(_) => Err(MonitorError::StaleBreakpoint(handle.id)),
        }
    }

    /// Forgets the armed breakpoint.
    pub const fn release(&mut self) {
        self.active = None;
    }

    /// The armed breakpoint, if any.
    pub const fn active(&self) -> Option<&Breakpoint> {
        match &self.active {
            Some((_, breakpoint)) => Some(breakpoint),
            None => None,
        }
    }
}

impl Default for BreakpointSlot {
    fn default() -> Self {
        Self::new()
    }
}
