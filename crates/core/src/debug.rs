// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! The seam between the interpreter and a remote debugger.
//!
//! The interpreter owns a [`Debugger`] and calls it before every instruction;
//! the debugger drives the interpreter back through [`DebugTarget`].

use crate::{SimResult, SimulationError};
use serde::{Deserialize, Serialize};

/// Number of PC breakpoints a core can hold.
pub const MAX_BREAKPOINTS: usize = 16;

/// Signal number reported when the core stops on a breakpoint or step.
pub const SIGTRAP: u8 = 5;

/// Register block exchanged with the debugger: R0-R14, PC and CPSR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoreRegisters {
    pub r: [u32; 15],
    pub pc: u32,
    pub cpsr: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BreakpointError {
    #[error("all {0} breakpoint slots are in use")]
    NoSlot(usize),
}

/// Bounded, insertion-ordered set of PC breakpoints. The index of an address
/// is its slot number.
#[derive(Debug, Clone, Default)]
pub struct BreakpointSet {
    addrs: Vec<u32>,
}

impl BreakpointSet {
    pub fn new() -> Self {
        Self {
            addrs: Vec::with_capacity(MAX_BREAKPOINTS),
        }
    }

    /// Insert `addr`, returning its slot. Inserting an address twice returns the
    /// slot it already occupies.
    pub fn insert(&mut self, addr: u32) -> Result<usize, BreakpointError> {
        if let Some(slot) = self.slot_of(addr) {
            return Ok(slot);
        }
        if self.addrs.len() >= MAX_BREAKPOINTS {
            return Err(BreakpointError::NoSlot(MAX_BREAKPOINTS));
        }
        self.addrs.push(addr);
        Ok(self.addrs.len() - 1)
    }

    /// Remove `addr`; absent addresses are ignored. Returns whether it was present.
    pub fn remove(&mut self, addr: u32) -> bool {
        match self.slot_of(addr) {
            Some(slot) => {
                self.addrs.remove(slot);
                true
            }
            None => false,
        }
    }

    pub fn slot_of(&self, addr: u32) -> Option<usize> {
        self.addrs.iter().position(|&a| a == addr)
    }

    #[inline]
    pub fn contains(&self, addr: u32) -> bool {
        self.addrs.contains(&addr)
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    pub fn clear(&mut self) {
        self.addrs.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.addrs.iter().copied()
    }
}

/// What a debugger may do to a halted core.
pub trait DebugTarget {
    fn read_registers(&self) -> CoreRegisters;
    fn write_registers(&mut self, regs: &CoreRegisters);

    /// Move the PC. When it actually changes, the pending instruction is discarded
    /// and the pipeline refilled from the new address.
    fn set_pc(&mut self, pc: u32);

    /// Arm (or disarm) a stop after the next instruction.
    fn set_single_step(&mut self, enabled: bool);

    fn insert_breakpoint(&mut self, addr: u32) -> Result<usize, BreakpointError>;
    fn remove_breakpoint(&mut self, addr: u32);

    fn insert_watchpoint(&mut self, _addr: u32, _len: u32) -> SimResult<()> {
        Err(SimulationError::Unimplemented("DebugTarget::insert_watchpoint"))
    }

    fn remove_watchpoint(&mut self, _addr: u32, _len: u32) -> SimResult<()> {
        Err(SimulationError::Unimplemented("DebugTarget::remove_watchpoint"))
    }

    /// Untimed memory access that bypasses the fault machinery.
    fn read_memory(&mut self, addr: u32, buf: &mut [u8]) -> SimResult<()>;
    fn write_memory(&mut self, addr: u32, data: &[u8]) -> SimResult<()>;
}

/// A debugger front end polled by the interpreter loop.
pub trait Debugger: Send {
    /// Accept a pending connection if there is one (a newly attached client is
    /// served until it resumes the core). Returns whether a client is attached.
    fn check_remote(&mut self, target: &mut dyn DebugTarget) -> bool;

    /// True once per received stop request.
    fn check_ctrl_c(&mut self) -> bool;

    /// Report `signal` (0 reports nothing) and serve commands until the client
    /// resumes the core or goes away.
    fn handle_signal(&mut self, target: &mut dyn DebugTarget, signal: u8);

    /// Tell the client the program exited with `code`.
    fn end(&mut self, code: u8);
}
