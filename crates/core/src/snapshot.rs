// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::config::CoreConfig;
use crate::cpu::{ArmCore, CycleCounters, Mode};
use crate::memory::MemoryPort;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CoreSnapshot {
    /// r0-r14 of the active bank.
    pub registers: Vec<u32>,
    pub pc: u32,
    pub cpsr: u32,
    /// `None` for a mode encoding that is not architected.
    pub mode: Option<Mode>,
    /// SPSR of the active bank; equals the CPSR in User and System mode.
    pub spsr: u32,
    pub thumb: bool,
    pub counters: CycleCounters,
    pub config: CoreConfig,
}

impl<M: MemoryPort> ArmCore<M> {
    pub fn snapshot(&self) -> CoreSnapshot {
        CoreSnapshot {
            registers: self.regs.regs[..15].to_vec(),
            pc: self.pc(),
            cpsr: self.regs.cpsr(),
            mode: Mode::try_from(self.regs.mode()).ok(),
            spsr: self.regs.current_spsr(),
            thumb: self.regs.t,
            counters: self.counters,
            config: self.config.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::FlatMemory;

    #[test]
    fn test_snapshot_after_reset() {
        let core = ArmCore::new(CoreConfig::arm920t(), FlatMemory::new(0x4100_9200));
        let snap = core.snapshot();
        assert_eq!(snap.registers.len(), 15);
        assert_eq!(snap.pc, 0);
        assert_eq!(snap.mode, Some(Mode::Supervisor));
        assert!(!snap.thumb);

        let json = serde_json::to_string(&snap).unwrap();
        let back: CoreSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }
}
