// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::modes::{Mode, MODE_BITS};
use super::registers::{INT_BITS, I_BIT, T_BIT};
use serde::{Deserialize, Serialize};

/// Exception vectors, as offsets from the vector base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Vector {
    Reset = 0x00,
    Undefined = 0x04,
    Swi = 0x08,
    PrefetchAbort = 0x0C,
    DataAbort = 0x10,
    /// 26-bit address exception; never raised.
    AddressException = 0x14,
    Irq = 0x18,
    Fiq = 0x1C,
}

impl Vector {
    pub fn offset(self) -> u32 {
        self as u32
    }

    pub fn target_mode(self) -> Mode {
        match self {
            Vector::Reset | Vector::Swi | Vector::AddressException => Mode::Supervisor,
            Vector::Undefined => Mode::Undefined,
            Vector::PrefetchAbort | Vector::DataAbort => Mode::Abort,
            Vector::Irq => Mode::Irq,
            Vector::Fiq => Mode::Fiq,
        }
    }

    /// Interrupt-disable bits set on entry.
    pub fn mask_bits(self) -> u32 {
        match self {
            Vector::Reset | Vector::Fiq => INT_BITS,
            _ => I_BIT,
        }
    }

    /// Amount subtracted from the pipelined PC (`pc + 2 * isize`) to form LR.
    ///
    /// In Thumb state prefetch aborts and interrupts use no adjustment and data
    /// aborts use a negative one, so the handler can return with the same
    /// `SUBS PC, LR, #n` in both states.
    pub fn link_offset(self, thumb: bool) -> i64 {
        let isize: i64 = if thumb { 2 } else { 4 };
        let esize: i64 = if thumb { 0 } else { 4 };
        let e2size: i64 = if thumb { -4 } else { 0 };
        match self {
            Vector::Reset | Vector::AddressException => 0,
            Vector::Undefined | Vector::Swi => isize,
            Vector::PrefetchAbort | Vector::Irq | Vector::Fiq => esize,
            Vector::DataAbort => e2size,
        }
    }
}

/// New CPSR on exception entry: target mode, mask bits, ARM state.
pub fn entry_cpsr(cpsr: u32, vector: Vector) -> u32 {
    (cpsr & !(MODE_BITS | T_BIT)) | vector.mask_bits() | vector.target_mode().bits()
}
