// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Processor modes and the mode to register-bank mapping.

use serde::{Deserialize, Serialize};

pub const MODE_BITS: u32 = 0x1F;

/// The seven architected 32-bit processor modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Mode {
    User = 0x10,
    Fiq = 0x11,
    Irq = 0x12,
    Supervisor = 0x13,
    Abort = 0x17,
    Undefined = 0x1B,
    System = 0x1F,
}

impl Mode {
    pub const ALL: [Mode; 7] = [
        Mode::User,
        Mode::Fiq,
        Mode::Irq,
        Mode::Supervisor,
        Mode::Abort,
        Mode::Undefined,
        Mode::System,
    ];

    pub fn bits(self) -> u32 {
        self as u32
    }

    pub fn bank(self) -> Bank {
        mode_to_bank(self.bits())
    }
}

impl TryFrom<u32> for Mode {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value & MODE_BITS {
            0x10 => Ok(Mode::User),
            0x11 => Ok(Mode::Fiq),
            0x12 => Ok(Mode::Irq),
            0x13 => Ok(Mode::Supervisor),
            0x17 => Ok(Mode::Abort),
            0x1B => Ok(Mode::Undefined),
            0x1F => Ok(Mode::System),
            other => Err(other),
        }
    }
}

/// Shadow register banks. `Dummy` absorbs every mode encoding that is not architected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bank {
    User = 0,
    Fiq = 1,
    Irq = 2,
    Svc = 3,
    Abort = 4,
    Undef = 5,
    Dummy = 6,
}

pub const NUM_BANKS: usize = 7;

impl Bank {
    pub fn index(self) -> usize {
        self as usize
    }

    /// User, System and the dummy bank have no SPSR.
    pub fn has_spsr(self) -> bool {
        !matches!(self, Bank::User | Bank::Dummy)
    }
}

const BANK_OF_MODE: [Bank; 32] = {
    let mut table = [Bank::Dummy; 32];
    table[0x10] = Bank::User;
    table[0x11] = Bank::Fiq;
    table[0x12] = Bank::Irq;
    table[0x13] = Bank::Svc;
    table[0x17] = Bank::Abort;
    table[0x1B] = Bank::Undef;
    table[0x1F] = Bank::User;
    table
};

/// Map any 5-bit mode field onto its register bank.
#[inline]
pub fn mode_to_bank(mode: u32) -> Bank {
    BANK_OF_MODE[(mode & MODE_BITS) as usize]
}
