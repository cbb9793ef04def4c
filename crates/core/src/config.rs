// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

/// Architecture variant and policy knobs of an interpreter instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    pub is_v4: bool,
    /// Enables BLX, CLZ, BKPT, PLD, LDRD/STRD and LDR-to-PC interworking.
    pub is_v5: bool,
    /// Enables the DSP multiply and saturating arithmetic extension.
    pub is_v5e: bool,
    /// Old abort model: a faulting load/store keeps its base writeback.
    pub base_updated_abort: bool,
    pub big_endian: bool,
    /// Value of the CP15 main ID register.
    pub device_id: u32,
    /// Lowest coprocessor number that may be accessed; lower numbers are undefined.
    pub coprocessor_min: u32,
}

impl CoreConfig {
    pub fn arm926ejs() -> Self {
        Self {
            is_v4: true,
            is_v5: true,
            is_v5e: true,
            base_updated_abort: false,
            big_endian: false,
            device_id: 0x4106_9260,
            coprocessor_min: 14,
        }
    }

    pub fn arm920t() -> Self {
        Self {
            is_v4: true,
            is_v5: false,
            is_v5e: false,
            base_updated_abort: false,
            big_endian: false,
            device_id: 0x4100_9200,
            coprocessor_min: 14,
        }
    }

    /// Look up a preset by its core name.
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "arm926ejs" | "arm926ej-s" => Some(Self::arm926ejs()),
            "arm920t" => Some(Self::arm920t()),
            _ => None,
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::arm926ejs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let c = CoreConfig::by_name("ARM926EJ-S").unwrap();
        assert!(c.is_v5e && !c.base_updated_abort);
        assert_eq!(c.device_id, 0x4106_9260);
        let c = CoreConfig::by_name("arm920t").unwrap();
        assert!(c.is_v4 && !c.is_v5);
        assert!(CoreConfig::by_name("cortex-m3").is_none());
    }

    #[test]
    fn test_config_serializes() {
        let json = serde_json::to_string(&CoreConfig::arm920t()).unwrap();
        let back: CoreConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CoreConfig::arm920t());
    }
}
