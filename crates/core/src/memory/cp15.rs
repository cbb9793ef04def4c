// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! CP15 system control coprocessor without address translation.

use super::Fault;
use tracing::warn;

const CONTROL_FIXED_ONES: u32 = 0x0005_0078;
const CONTROL_MASK: u32 = 0x0005_F3FF;
const CONTROL_ALIGN: u32 = 1 << 1;
const CONTROL_VECTOR: u32 = 1 << 13;
const CACHE_TYPE: u32 = 0x1D0D_2112;
const TTB_MASK: u32 = 0xFFFF_C000;
const FCSE_MASK: u32 = 0xFE00_0000;
pub const HIGH_VECTOR_BASE: u32 = 0xFFFF_0000;

/// Effect of a successful CP15 write that the memory port must forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cp15Effect {
    None,
    WaitForInterrupt,
}

#[derive(Debug, Clone)]
pub struct SystemControl {
    pub device_id: u32,
    control: u32,
    translation_table_base: u32,
    domain_access_control: u32,
    fault_status: u32,
    fault_address: u32,
    fcse_pid: u32,
}

fn fields(instr: u32) -> (u32, u32, u32) {
    let crn = (instr >> 16) & 0xF;
    let opc2 = (instr >> 5) & 0x7;
    let crm = instr & 0xF;
    (crn, opc2, crm)
}

impl SystemControl {
    pub fn new(device_id: u32) -> Self {
        Self {
            device_id,
            control: CONTROL_FIXED_ONES,
            translation_table_base: 0,
            domain_access_control: 0,
            fault_status: 0,
            fault_address: 0,
            fcse_pid: 0,
        }
    }

    pub fn control(&self) -> u32 {
        (self.control | CONTROL_FIXED_ONES) & CONTROL_MASK
    }

    pub fn alignment_check(&self) -> bool {
        self.control & CONTROL_ALIGN != 0
    }

    pub fn set_high_vectors(&mut self, enabled: bool) {
        if enabled {
            self.control |= CONTROL_VECTOR;
        } else {
            self.control &= !CONTROL_VECTOR;
        }
    }

    pub fn vector_base(&self) -> u32 {
        if self.control & CONTROL_VECTOR != 0 {
            HIGH_VECTOR_BASE
        } else {
            0
        }
    }

    pub fn fault_status(&self) -> u32 {
        self.fault_status
    }

    pub fn fault_address(&self) -> u32 {
        self.fault_address
    }

    pub fn set_fault(&mut self, fault: Fault, address: u32) {
        self.fault_status = fault.code() & 0xFF;
        self.fault_address = address;
    }

    pub fn read(&self, instr: u32) -> Result<u32, ()> {
        let (crn, opc2, _) = fields(instr);
        let value = match crn {
            0 => match opc2 {
                0 => self.device_id,
                1 => CACHE_TYPE,
                2 => 0,
                _ => return not_implemented(crn, opc2),
            },
            1 => self.control(),
            2 => self.translation_table_base & TTB_MASK,
            3 => self.domain_access_control,
            5 if opc2 == 0 => self.fault_status & 0xFF,
            6 => self.fault_address,
            13 => self.fcse_pid,
            _ => return not_implemented(crn, opc2),
        };
        Ok(value)
    }

    pub fn write(&mut self, instr: u32, value: u32) -> Result<Cp15Effect, ()> {
        let (crn, opc2, crm) = fields(instr);
        match crn {
            1 => self.control = (value | CONTROL_FIXED_ONES) & CONTROL_MASK,
            2 => self.translation_table_base = value & TTB_MASK,
            3 => self.domain_access_control = value,
            5 => match opc2 {
                0 => self.fault_status = value & 0xFF,
                1 => warn!("cp15: instruction fault status write ignored"),
                _ => return not_implemented(crn, opc2),
            },
            6 => self.fault_address = value,
            7 => return cache_op(opc2, crm),
            8 => return tlb_op(opc2, crm),
            9 => warn!("cp15: cache lockdown ignored"),
            13 if opc2 == 0 => self.fcse_pid = value & FCSE_MASK,
            _ => return not_implemented(crn, opc2),
        }
        Ok(Cp15Effect::None)
    }
}

fn not_implemented<T>(crn: u32, opc2: u32) -> Result<T, ()> {
    warn!("cp15: register c{} opc2={} not implemented", crn, opc2);
    Err(())
}

fn cache_op(opc2: u32, crm: u32) -> Result<Cp15Effect, ()> {
    match (opc2, crm) {
        (4, 0) => Ok(Cp15Effect::WaitForInterrupt),
        (0, 5..=7) | (1, 5) | (2, 5) | (1, 13) | (1, 6) | (2, 6) => Ok(Cp15Effect::None),
        (1, 10) | (2, 10) | (3, 10) | (4, 10) => Ok(Cp15Effect::None),
        (1, 14) | (2, 14) | (3, 14) => Ok(Cp15Effect::None),
        _ => not_implemented(7, opc2),
    }
}

fn tlb_op(opc2: u32, crm: u32) -> Result<Cp15Effect, ()> {
    match (opc2, crm) {
        (0 | 1, 5..=7) => Ok(Cp15Effect::None),
        _ => not_implemented(8, opc2),
    }
}
