// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{SimResult, SimulationError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Timing model of the platform around the core.
pub trait Host: Send {
    /// Internal cycles consumed by the instruction that just retired.
    fn exec_cycles(&mut self, _cycles: u64) -> SimResult<()> {
        Err(SimulationError::Unimplemented("Host::exec_cycles"))
    }

    /// The core executed wait-for-interrupt.
    fn idle(&mut self) -> SimResult<()> {
        Err(SimulationError::Unimplemented("Host::idle"))
    }
}

/// A host with no timing model; every hook reports itself unimplemented.
#[derive(Debug, Default)]
pub struct UnboundHost;

impl Host for UnboundHost {}

/// Accumulates what the core reports. Clones share the counters, so one copy can
/// be handed to the core and another kept for inspection.
#[derive(Debug, Clone, Default)]
pub struct CycleCountingHost {
    internal_cycles: Arc<AtomicU64>,
    idle_requests: Arc<AtomicU64>,
}

impl CycleCountingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn internal_cycles(&self) -> u64 {
        self.internal_cycles.load(Ordering::Relaxed)
    }

    pub fn idle_requests(&self) -> u64 {
        self.idle_requests.load(Ordering::Relaxed)
    }
}

impl Host for CycleCountingHost {
    fn exec_cycles(&mut self, cycles: u64) -> SimResult<()> {
        self.internal_cycles.fetch_add(cycles, Ordering::Relaxed);
        Ok(())
    }

    fn idle(&mut self) -> SimResult<()> {
        self.idle_requests.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
