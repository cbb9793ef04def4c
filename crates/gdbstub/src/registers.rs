// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! `g`/`G` register block: r0-r12, sp, lr, pc, eight 12-byte FPA registers,
//! FPS, CPSR. All words little-endian; the FPA bank reads as zeros.

use gdbstub::arch::Registers;
use gdbstub_arch::arm::reg::ArmCoreRegs;
use labwired_iss_core::debug::CoreRegisters;

/// Bytes in a serialized register block.
pub const REGISTER_BLOCK_LEN: usize = 16 * 4 + 8 * 12 + 4 + 4;

fn to_arch(regs: &CoreRegisters) -> ArmCoreRegs {
    let mut r = [0u32; 13];
    r.copy_from_slice(&regs.r[..13]);
    ArmCoreRegs {
        r,
        sp: regs.r[13],
        lr: regs.r[14],
        pc: regs.pc,
        cpsr: regs.cpsr,
    }
}

fn from_arch(arch: &ArmCoreRegs) -> CoreRegisters {
    let mut r = [0u32; 15];
    r[..13].copy_from_slice(&arch.r);
    r[13] = arch.sp;
    r[14] = arch.lr;
    CoreRegisters {
        r,
        pc: arch.pc,
        cpsr: arch.cpsr,
    }
}

pub fn serialize(regs: &CoreRegisters) -> Vec<u8> {
    let mut out = Vec::with_capacity(REGISTER_BLOCK_LEN);
    to_arch(regs).gdb_serialize(|byte| out.push(byte.unwrap_or(0)));
    out
}

/// `None` unless `bytes` is exactly one register block.
pub fn deserialize(bytes: &[u8]) -> Option<CoreRegisters> {
    if bytes.len() != REGISTER_BLOCK_LEN {
        return None;
    }
    let mut arch = ArmCoreRegs::default();
    arch.gdb_deserialize(bytes).ok()?;
    Some(from_arch(&arch))
}
