// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Thumb (ARMv5T) to ARM translation.
//!
//! Data processing and transfers are rewritten into the equivalent ARM encoding
//! and handed back to the executor. Branches are executed here because their
//! offsets are relative to the Thumb PC.

use super::{ThumbBridge, ThumbOutcome, ThumbState};

/// Register-offset transfers indexed by bits 11:9 (formats 7 and 8).
const REG_OFFSET_TRANSFERS: [u32; 8] = [
    0xE780_0000, // STR
    0xE180_00B0, // STRH
    0xE7C0_0000, // STRB
    0xE190_00D0, // LDRSB
    0xE790_0000, // LDR
    0xE190_00B0, // LDRH
    0xE7D0_0000, // LDRB
    0xE190_00F0, // LDRSH
];

/// Format 4 ALU operations, indexed by bits 9:6. The operand layout differs per
/// row and is filled in by [`alu`].
const ALU_OPS: [u32; 16] = [
    0xE010_0000, // AND
    0xE030_0000, // EOR
    0xE1B0_0010, // LSL
    0xE1B0_0030, // LSR
    0xE1B0_0050, // ASR
    0xE0B0_0000, // ADC
    0xE0D0_0000, // SBC
    0xE1B0_0070, // ROR
    0xE110_0000, // TST
    0xE270_0000, // NEG
    0xE150_0000, // CMP
    0xE170_0000, // CMN
    0xE190_0000, // ORR
    0xE010_0090, // MUL
    0xE1D0_0000, // BIC
    0xE1F0_0000, // MVN
];

#[derive(Debug, Clone)]
pub struct ThumbTranslator {
    is_v5: bool,
}

impl ThumbTranslator {
    pub fn new(is_v5: bool) -> Self {
        Self { is_v5 }
    }
}

#[inline]
fn low_reg(t: u32, shift: u32) -> u32 {
    (t >> shift) & 7
}

/// Formats 1 and 2: shift by immediate, three-operand add/subtract.
fn shift_or_add_sub(t: u32) -> u32 {
    let rd = low_reg(t, 0);
    let rs = low_reg(t, 3);
    if (t >> 11) & 3 != 3 {
        let shift = (t >> 11) & 3;
        let imm5 = (t >> 6) & 0x1F;
        return 0xE1B0_0000 | (rd << 12) | (imm5 << 7) | (shift << 5) | rs;
    }
    let mut ainstr = if t & (1 << 9) != 0 {
        0xE050_0000
    } else {
        0xE090_0000
    };
    if t & (1 << 10) != 0 {
        ainstr |= 1 << 25;
    }
    ainstr | (rs << 16) | (rd << 12) | low_reg(t, 6)
}

/// Format 3: MOV/CMP/ADD/SUB with an 8-bit immediate.
fn imm8_op(t: u32) -> u32 {
    let rd = low_reg(t, 8);
    let imm = t & 0xFF;
    match (t >> 11) & 3 {
        0 => 0xE3B0_0000 | (rd << 12) | imm,
        1 => 0xE350_0000 | (rd << 16) | imm,
        2 => 0xE290_0000 | (rd << 16) | (rd << 12) | imm,
        _ => 0xE250_0000 | (rd << 16) | (rd << 12) | imm,
    }
}

/// Format 4: two-operand ALU operations on low registers.
fn alu(t: u32) -> u32 {
    let rd = low_reg(t, 0);
    let rs = low_reg(t, 3);
    let op = (t >> 6) & 0xF;
    let base = ALU_OPS[op as usize];
    match op {
        // MOVS rd, rd, <shift> rs
        0x2 | 0x3 | 0x4 | 0x7 => base | (rd << 12) | (rs << 8) | rd,
        0x8 | 0xA | 0xB => base | (rd << 16) | rs,
        0x9 => base | (rs << 16) | (rd << 12),
        0xD => base | (rd << 16) | (rd << 8) | rs,
        0xF => base | (rd << 12) | rs,
        _ => base | (rd << 16) | (rd << 12) | rs,
    }
}

impl ThumbTranslator {
    /// Format 5: high register operations and BX/BLX.
    fn hi_reg(&self, t: u32) -> ThumbOutcome {
        let h1 = (t >> 7) & 1;
        let rd = low_reg(t, 0) | (h1 << 3);
        let rs = (t >> 3) & 0xF;
        let ainstr = match (t >> 8) & 3 {
            0 => 0xE080_0000 | (rd << 16) | (rd << 12) | rs,
            1 => 0xE150_0000 | (rd << 16) | rs,
            2 => 0xE1A0_0000 | (rd << 12) | rs,
            _ if h1 == 0 => 0xE12F_FF10 | rs,
            _ if self.is_v5 => 0xE12F_FF30 | rs,
            _ => return ThumbOutcome::Undefined,
        };
        ThumbOutcome::Decoded(ainstr)
    }

    /// 0xBxxx: stack adjust, PUSH/POP and BKPT.
    fn misc(&self, t: u32) -> ThumbOutcome {
        let ainstr = match (t >> 8) & 0xF {
            0x0 if t & 0x80 != 0 => 0xE24D_DF00 | (t & 0x7F),
            0x0 => 0xE28D_DF00 | (t & 0x7F),
            0x4 | 0x5 => {
                let lr = if t & 0x100 != 0 { 1 << 14 } else { 0 };
                0xE92D_0000 | (t & 0xFF) | lr
            }
            0xC | 0xD => {
                let pc = if t & 0x100 != 0 { 1 << 15 } else { 0 };
                0xE8BD_0000 | (t & 0xFF) | pc
            }
            0xE if self.is_v5 => 0xE120_0070 | ((t & 0xF0) << 4) | (t & 0xF),
            _ => return ThumbOutcome::Undefined,
        };
        ThumbOutcome::Decoded(ainstr)
    }
}

impl ThumbBridge for ThumbTranslator {
    fn decode(
        &mut self,
        cpu: &mut dyn ThumbState,
        pc: u32,
        tinstr: u16,
        _lookahead: u16,
    ) -> ThumbOutcome {
        let t = tinstr as u32;
        let load = t & (1 << 11) != 0;
        let decoded = match t >> 11 {
            0x00..=0x03 => shift_or_add_sub(t),
            0x04..=0x07 => imm8_op(t),
            0x08 if t & (1 << 10) == 0 => alu(t),
            0x08 => return self.hi_reg(t),
            // LDR rd, [PC, #imm8 * 4]
            0x09 => 0xE59F_0000 | (low_reg(t, 8) << 12) | ((t & 0xFF) << 2),
            0x0A | 0x0B => {
                REG_OFFSET_TRANSFERS[((t >> 9) & 7) as usize]
                    | (low_reg(t, 3) << 16)
                    | (low_reg(t, 0) << 12)
                    | low_reg(t, 6)
            }
            0x0C..=0x0F => {
                let byte = t & (1 << 12) != 0;
                let imm5 = (t >> 6) & 0x1F;
                let (base, offset) = match (byte, load) {
                    (false, false) => (0xE580_0000, imm5 << 2),
                    (false, true) => (0xE590_0000, imm5 << 2),
                    (true, false) => (0xE5C0_0000, imm5),
                    (true, true) => (0xE5D0_0000, imm5),
                };
                base | (low_reg(t, 3) << 16) | (low_reg(t, 0) << 12) | offset
            }
            0x10 | 0x11 => {
                let offset = ((t >> 6) & 0x1F) << 1;
                let base = if load { 0xE1D0_00B0 } else { 0xE1C0_00B0 };
                base | (low_reg(t, 3) << 16)
                    | (low_reg(t, 0) << 12)
                    | ((offset & 0xF0) << 4)
                    | (offset & 0xF)
            }
            0x12 | 0x13 => {
                let base = if load { 0xE59D_0000 } else { 0xE58D_0000 };
                base | (low_reg(t, 8) << 12) | ((t & 0xFF) << 2)
            }
            // ADD rd, PC|SP, #imm8 * 4
            0x14 | 0x15 => {
                let base = if load { 0xE28D_0F00 } else { 0xE28F_0F00 };
                base | (low_reg(t, 8) << 12) | (t & 0xFF)
            }
            0x16 | 0x17 => return self.misc(t),
            0x18 | 0x19 => {
                let base = if load { 0xE8B0_0000 } else { 0xE8A0_0000 };
                base | (low_reg(t, 8) << 16) | (t & 0xFF)
            }
            0x1A | 0x1B => {
                let cond = (t >> 8) & 0xF;
                match cond {
                    0xF => 0xEF00_0000 | (t & 0xFF),
                    0xE => return ThumbOutcome::Undefined,
                    _ => {
                        if cpu.condition_passed(cond) {
                            let offset = (((t & 0xFF) as u8 as i8 as i32) << 1) as u32;
                            cpu.branch(pc.wrapping_add(4).wrapping_add(offset));
                        }
                        return ThumbOutcome::AlreadyHandled;
                    }
                }
            }
            0x1C => {
                let offset = ((((t & 0x7FF) << 21) as i32) >> 20) as u32;
                cpu.branch(pc.wrapping_add(4).wrapping_add(offset));
                return ThumbOutcome::AlreadyHandled;
            }
            // BLX suffix
            0x1D => {
                if !self.is_v5 || t & 1 != 0 {
                    return ThumbOutcome::Undefined;
                }
                let dest = cpu.reg(14).wrapping_add((t & 0x7FF) << 1) & !3;
                cpu.set_reg(14, pc.wrapping_add(2) | 1);
                cpu.exit_thumb();
                cpu.branch(dest);
                return ThumbOutcome::AlreadyHandled;
            }
            // BL prefix
            0x1E => {
                let offset = ((((t & 0x7FF) << 21) as i32) >> 9) as u32;
                cpu.set_reg(14, pc.wrapping_add(4).wrapping_add(offset));
                return ThumbOutcome::AlreadyHandled;
            }
            // BL suffix
            _ => {
                let dest = cpu.reg(14).wrapping_add((t & 0x7FF) << 1);
                cpu.set_reg(14, pc.wrapping_add(2) | 1);
                cpu.branch(dest);
                return ThumbOutcome::AlreadyHandled;
            }
        };
        ThumbOutcome::Decoded(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::registers::RegisterFile;

    #[derive(Default)]
    struct MockState {
        regs: RegisterFile,
        branched_to: Option<u32>,
        left_thumb: bool,
    }

    impl ThumbState for MockState {
        fn reg(&self, idx: usize) -> u32 {
            self.regs.regs[idx]
        }
        fn set_reg(&mut self, idx: usize, value: u32) {
            self.regs.regs[idx] = value;
        }
        fn condition_passed(&self, cond: u32) -> bool {
            self.regs.condition_passed(cond)
        }
        fn branch(&mut self, dest: u32) {
            self.branched_to = Some(dest);
        }
        fn exit_thumb(&mut self) {
            self.left_thumb = true;
        }
    }

    fn translate(tinstr: u16) -> ThumbOutcome {
        let mut state = MockState::default();
        ThumbTranslator::new(true).decode(&mut state, 0x1000, tinstr, 0)
    }

    #[test]
    fn test_data_processing_translations() {
        // LSLS r1, r2, #3
        assert_eq!(translate(0x00D1), ThumbOutcome::Decoded(0xE1B0_1182));
        // ADDS r0, r1, r2
        assert_eq!(translate(0x1888), ThumbOutcome::Decoded(0xE091_0002));
        // SUBS r0, r1, #1
        assert_eq!(translate(0x1E48), ThumbOutcome::Decoded(0xE251_0001));
        // MOVS r3, #0x42
        assert_eq!(translate(0x2342), ThumbOutcome::Decoded(0xE3B0_3042));
        // CMP r2, #7
        assert_eq!(translate(0x2A07), ThumbOutcome::Decoded(0xE352_0007));
        // NEGS r0, r1
        assert_eq!(translate(0x4248), ThumbOutcome::Decoded(0xE271_0000));
        // MULS r0, r1
        assert_eq!(translate(0x4348), ThumbOutcome::Decoded(0xE010_0091));
        // LSLS r0, r1 (register shift)
        assert_eq!(translate(0x4088), ThumbOutcome::Decoded(0xE1B0_0110));
    }

    #[test]
    fn test_high_register_and_exchange() {
        // MOV r8, r1
        assert_eq!(translate(0x4688), ThumbOutcome::Decoded(0xE1A0_8001));
        // BX lr
        assert_eq!(translate(0x4770), ThumbOutcome::Decoded(0xE12F_FF1E));
        // BLX r3
        assert_eq!(translate(0x4798), ThumbOutcome::Decoded(0xE12F_FF33));
        let mut state = MockState::default();
        let v4 = ThumbTranslator::new(false).decode(&mut state, 0, 0x4798, 0);
        assert_eq!(v4, ThumbOutcome::Undefined);
    }

    #[test]
    fn test_transfer_translations() {
        // LDR r0, [pc, #8]
        assert_eq!(translate(0x4802), ThumbOutcome::Decoded(0xE59F_0008));
        // LDRSH r0, [r1, r2]
        assert_eq!(translate(0x5E88), ThumbOutcome::Decoded(0xE191_00F2));
        // STR r0, [r1, #4]
        assert_eq!(translate(0x6048), ThumbOutcome::Decoded(0xE581_0004));
        // LDRB r0, [r1, #3]
        assert_eq!(translate(0x78C8), ThumbOutcome::Decoded(0xE5D1_0003));
        // LDRH r0, [r1, #0x12]
        assert_eq!(translate(0x8A48), ThumbOutcome::Decoded(0xE1D1_01B2));
        // PUSH {r4, lr}
        assert_eq!(translate(0xB510), ThumbOutcome::Decoded(0xE92D_4010));
        // POP {r4, pc}
        assert_eq!(translate(0xBD10), ThumbOutcome::Decoded(0xE8BD_8010));
        // SUB sp, #16
        assert_eq!(translate(0xB084), ThumbOutcome::Decoded(0xE24D_DF04));
        // LDMIA r2!, {r0, r1}
        assert_eq!(translate(0xCA03), ThumbOutcome::Decoded(0xE8B2_0003));
    }

    #[test]
    fn test_branches_are_executed() {
        let mut t = ThumbTranslator::new(true);
        let mut state = MockState::default();
        // B . (offset -4)
        assert_eq!(
            t.decode(&mut state, 0x1000, 0xE7FE, 0),
            ThumbOutcome::AlreadyHandled
        );
        assert_eq!(state.branched_to, Some(0x1000));

        // BEQ +8 with Z clear does not branch
        let mut state = MockState::default();
        t.decode(&mut state, 0x1000, 0xD004, 0);
        assert_eq!(state.branched_to, None);
        state.regs.z = true;
        t.decode(&mut state, 0x1000, 0xD004, 0);
        assert_eq!(state.branched_to, Some(0x100C));
    }

    #[test]
    fn test_bl_pair() {
        let mut t = ThumbTranslator::new(true);
        let mut state = MockState::default();
        // BL +0x1000 from 0x2000: prefix 0xF001, suffix 0xF800
        t.decode(&mut state, 0x2000, 0xF001, 0xF800);
        assert_eq!(state.regs.regs[14], 0x3004);
        assert_eq!(state.branched_to, None);
        t.decode(&mut state, 0x2002, 0xF800, 0);
        assert_eq!(state.branched_to, Some(0x3004));
        assert_eq!(state.regs.regs[14], 0x2005);

        // BLX suffix leaves Thumb and word-aligns the target
        let mut state = MockState::default();
        state.regs.regs[14] = 0x4002;
        t.decode(&mut state, 0x2002, 0xE800, 0);
        assert!(state.left_thumb);
        assert_eq!(state.branched_to, Some(0x4000));
        assert_eq!(t.decode(&mut state, 0x2002, 0xE801, 0), ThumbOutcome::Undefined);
    }

    #[test]
    fn test_swi_and_undefined() {
        assert_eq!(translate(0xDF12), ThumbOutcome::Decoded(0xEF00_0012));
        assert_eq!(translate(0xDE00), ThumbOutcome::Undefined);
        assert_eq!(translate(0xB100), ThumbOutcome::Undefined);
        assert_eq!(translate(0xBE01), ThumbOutcome::Decoded(0xE120_0071));
    }
}
