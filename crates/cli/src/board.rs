// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use labwired_iss_config::{AbortModel, BoardManifest, CoreKind, GdbConfig, RegionSpec};
use labwired_iss_core::host::CycleCountingHost;
use labwired_iss_core::{ArmCore, CoreConfig, FlatMemory, ProgramImage};
use tracing::info;

/// RAM mapped at address 0 when no board manifest is given.
pub const DEFAULT_RAM_SIZE: usize = 64 << 20;

/// Everything needed to build a machine, after manifest and command-line
/// settings have been merged.
#[derive(Debug, Clone)]
pub struct BoardSpec {
    pub name: String,
    pub core: CoreKind,
    pub abort_model: Option<AbortModel>,
    pub regions: Vec<RegionSpec>,
    pub entry: Option<u32>,
    pub vector_high: bool,
    pub gdb: GdbConfig,
}

pub struct Board {
    pub core: ArmCore<FlatMemory>,
    /// Shares its counters with the host installed in `core`.
    pub host: CycleCountingHost,
}

impl BoardSpec {
    /// A single RAM region at 0.
    pub fn bare(core: CoreKind) -> Self {
        Self {
            name: "bare".to_string(),
            core,
            abort_model: None,
            regions: vec![RegionSpec {
                base: 0,
                size: DEFAULT_RAM_SIZE,
            }],
            entry: None,
            vector_high: false,
            gdb: GdbConfig::default(),
        }
    }

    pub fn from_manifest(manifest: &BoardManifest) -> Result<Self> {
        Ok(Self {
            name: manifest.name.clone().unwrap_or_else(|| "board".to_string()),
            core: manifest.core,
            abort_model: manifest.abort_model,
            regions: manifest.regions()?,
            entry: manifest.entry.map(|e| e as u32),
            vector_high: manifest.vector_high,
            gdb: manifest.gdb.clone(),
        })
    }

    pub fn core_config(&self) -> CoreConfig {
        let mut config = self.core.core_config();
        if let Some(model) = self.abort_model {
            config.base_updated_abort = model == AbortModel::BaseUpdated;
        }
        config
    }

    /// Map memory, load `image` and point the core at the entry address.
    pub fn assemble(&self, image: &ProgramImage) -> Result<Board> {
        let mut config = self.core_config();
        config.big_endian |= image.big_endian;

        let mut mem = FlatMemory::new(config.device_id);
        for region in &self.regions {
            mem.add_region(region.base, region.size);
        }
        mem.big_endian = config.big_endian;
        mem.cp15.set_high_vectors(self.vector_high);
        mem.load_image(image)
            .with_context(|| format!("Failed to load image into board '{}'", self.name))?;

        let entry = self.entry.unwrap_or(image.entry_point);
        info!(
            "Board '{}': {:?}, {} region(s), entry {:#010x}{}",
            self.name,
            self.core,
            self.regions.len(),
            entry,
            if config.big_endian { ", big-endian" } else { "" }
        );

        let host = CycleCountingHost::new();
        let mut core = ArmCore::new(config, mem).with_host(host.clone());
        core.set_pc(entry);
        Ok(Board { core, host })
    }
}
