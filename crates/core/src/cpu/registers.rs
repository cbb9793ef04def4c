// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::modes::{mode_to_bank, Bank, Mode, MODE_BITS, NUM_BANKS};

// PSR bits
pub const N_BIT: u32 = 1 << 31;
pub const Z_BIT: u32 = 1 << 30;
pub const C_BIT: u32 = 1 << 29;
pub const V_BIT: u32 = 1 << 28;
pub const Q_BIT: u32 = 1 << 27;
pub const I_BIT: u32 = 1 << 7;
pub const F_BIT: u32 = 1 << 6;
pub const T_BIT: u32 = 1 << 5;
pub const INT_BITS: u32 = I_BIT | F_BIT;

/// Programmer-visible register state with the banked shadow copies.
///
/// `n`, `z`, `c`, `v`, `q`, `t` and `int_bits` mirror the CPSR for fast ALU access;
/// [`RegisterFile::cpsr`] composes them back and [`RegisterFile::set_cpsr`]
/// resynchronises them (together with the active bank).
#[derive(Debug, Clone)]
pub struct RegisterFile {
    pub regs: [u32; 16],
    bank: [[u32; 16]; NUM_BANKS],
    spsr: [u32; NUM_BANKS],
    mode: u32,
    current_bank: Bank,
    pub n: bool,
    pub z: bool,
    pub c: bool,
    pub v: bool,
    /// Sticky saturation flag (CPSR bit 27) of the v5e DSP instructions.
    pub q: bool,
    pub t: bool,
    /// I and F bits, kept in their CPSR positions (bits 7:6).
    pub int_bits: u32,
}

impl Default for RegisterFile {
    fn default() -> Self {
        let mut rf = Self {
            regs: [0; 16],
            bank: [[0; 16]; NUM_BANKS],
            spsr: [0; NUM_BANKS],
            mode: Mode::Supervisor.bits(),
            current_bank: Bank::Svc,
            n: false,
            z: false,
            c: false,
            v: false,
            q: false,
            t: false,
            int_bits: INT_BITS,
        };
        rf.set_cpsr(INT_BITS | Mode::Supervisor.bits());
        rf
    }
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw 5-bit mode field currently in effect.
    pub fn mode(&self) -> u32 {
        self.mode
    }

    pub fn current_bank(&self) -> Bank {
        self.current_bank
    }

    pub fn cpsr(&self) -> u32 {
        self.ecc() | self.int_bits | ((self.t as u32) << 5) | self.mode
    }

    /// Condition flags plus Q, as they appear in the top bits of the CPSR.
    pub fn ecc(&self) -> u32 {
        ((self.n as u32) << 31)
            | ((self.z as u32) << 30)
            | ((self.c as u32) << 29)
            | ((self.v as u32) << 28)
            | ((self.q as u32) << 27)
    }

    pub fn set_cpsr(&mut self, value: u32) {
        self.apply_cpsr(value);
    }

    /// Resynchronise the active bank and the cached flags from a freshly written CPSR.
    fn apply_cpsr(&mut self, cpsr: u32) {
        let new_mode = cpsr & MODE_BITS;
        if self.mode != new_mode {
            self.switch_mode(self.mode, new_mode);
        }
        self.int_bits = cpsr & INT_BITS;
        self.n = cpsr & N_BIT != 0;
        self.z = cpsr & Z_BIT != 0;
        self.c = cpsr & C_BIT != 0;
        self.v = cpsr & V_BIT != 0;
        self.q = cpsr & Q_BIT != 0;
        self.t = cpsr & T_BIT != 0;
    }

    pub fn spsr(&self, mode: u32) -> u32 {
        let bank = mode_to_bank(mode);
        if bank.has_spsr() {
            self.spsr[bank.index()]
        } else {
            self.cpsr()
        }
    }

    pub fn set_spsr(&mut self, mode: u32, value: u32) {
        let bank = mode_to_bank(mode);
        if bank.has_spsr() {
            self.spsr[bank.index()] = value;
        }
    }

    /// SPSR of the active bank.
    pub fn current_spsr(&self) -> u32 {
        self.spsr(self.mode)
    }

    pub fn get_reg(&self, mode: u32, idx: usize) -> u32 {
        debug_assert!(idx < 16);
        let mode = mode & MODE_BITS;
        if mode == self.mode {
            return self.regs[idx];
        }
        match self.shadow_slot(mode_to_bank(mode), idx) {
            Some((Bank::Dummy, _)) => 0,
            Some((bank, i)) => self.bank[bank.index()][i],
            None => self.regs[idx],
        }
    }

    pub fn set_reg(&mut self, mode: u32, idx: usize, value: u32) {
        debug_assert!(idx < 16);
        let mode = mode & MODE_BITS;
        if mode == self.mode {
            self.regs[idx] = value;
            return;
        }
        match self.shadow_slot(mode_to_bank(mode), idx) {
            Some((Bank::Dummy, _)) => {}
            Some((bank, i)) => self.bank[bank.index()][i] = value,
            None => self.regs[idx] = value,
        }
    }

    /// Where register `idx` of `bank` lives while `self.current_bank` is active.
    /// `None` means it is the visible copy.
    fn shadow_slot(&self, bank: Bank, idx: usize) -> Option<(Bank, usize)> {
        let current = self.current_bank;
        if bank == current {
            return None;
        }
        match idx {
            8..=12 => match (bank, current) {
                (Bank::Dummy, _) => Some((Bank::Dummy, idx)),
                (Bank::Fiq, _) => Some((Bank::Fiq, idx)),
                (_, Bank::Fiq) | (_, Bank::Dummy) => Some((Bank::User, idx)),
                _ => None,
            },
            13 | 14 => Some((bank, idx)),
            _ => None,
        }
    }

    /// Move banked registers between the visible set and the shadow storage.
    pub fn switch_mode(&mut self, old_mode: u32, new_mode: u32) -> u32 {
        let old_bank = mode_to_bank(old_mode);
        let new_bank = mode_to_bank(new_mode);
        self.current_bank = new_bank;
        self.mode = new_mode & MODE_BITS;

        if old_bank == new_bank {
            return self.mode;
        }

        match old_bank {
            Bank::Fiq => {
                self.bank[Bank::Fiq.index()][8..15].copy_from_slice(&self.regs[8..15]);
            }
            Bank::Dummy => {
                self.bank[Bank::Dummy.index()][8..15].fill(0);
            }
            _ => {
                if new_bank == Bank::Fiq {
                    self.bank[Bank::User.index()][8..13].copy_from_slice(&self.regs[8..13]);
                }
                self.bank[old_bank.index()][13] = self.regs[13];
                self.bank[old_bank.index()][14] = self.regs[14];
            }
        }

        match new_bank {
            Bank::Fiq => {
                self.regs[8..15].copy_from_slice(&self.bank[Bank::Fiq.index()][8..15]);
            }
            Bank::Dummy => {
                self.regs[8..15].fill(0);
            }
            _ => {
                if old_bank == Bank::Fiq {
                    self.regs[8..13].copy_from_slice(&self.bank[Bank::User.index()][8..13]);
                }
                self.regs[13] = self.bank[new_bank.index()][13];
                self.regs[14] = self.bank[new_bank.index()][14];
            }
        }

        self.mode
    }

    /// MSR to CPSR: write the fields selected by bits 19:16 of the instruction.
    /// Outside User mode the control, extension and status fields are writable;
    /// the flag field always is.
    pub fn fix_cpsr(&mut self, instr: u32, rhs: u32) {
        let mut cpsr = self.cpsr();
        let mask = psr_field_mask(instr, self.mode != Mode::User.bits());
        cpsr = (cpsr & !mask) | (rhs & mask);
        self.set_cpsr(cpsr);
    }

    /// MSR to SPSR of the active bank.
    pub fn fix_spsr(&mut self, instr: u32, rhs: u32) {
        let bank = self.current_bank;
        if bank.has_spsr() {
            let mask = psr_field_mask(instr, true);
            let spsr = &mut self.spsr[bank.index()];
            *spsr = (*spsr & !mask) | (rhs & mask);
        }
    }
}

fn psr_field_mask(instr: u32, privileged: bool) -> u32 {
    let mut mask = 0;
    if privileged {
        if instr & (1 << 16) != 0 {
            mask |= 0x0000_00FF;
        }
        if instr & (1 << 17) != 0 {
            mask |= 0x0000_FF00;
        }
        if instr & (1 << 18) != 0 {
            mask |= 0x00FF_0000;
        }
    }
    if instr & (1 << 19) != 0 {
        mask |= 0xFF00_0000;
    }
    mask
}
