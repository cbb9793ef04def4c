// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use labwired_iss_core::CoreConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    "1.0".to_string()
}

fn default_gdb_port() -> u16 {
    12345
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoreKind {
    #[serde(alias = "arm926ej-s", alias = "arm926")]
    Arm926ejs,
    #[serde(alias = "arm920")]
    Arm920t,
}

impl CoreKind {
    /// Accepts the same spellings as the manifest.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "arm926ejs" | "arm926ej-s" | "arm926" => Some(Self::Arm926ejs),
            "arm920t" | "arm920" => Some(Self::Arm920t),
            _ => None,
        }
    }

    pub fn core_config(self) -> CoreConfig {
        match self {
            CoreKind::Arm926ejs => CoreConfig::arm926ejs(),
            CoreKind::Arm920t => CoreConfig::arm920t(),
        }
    }
}

/// What a faulting load/store leaves in its base register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AbortModel {
    /// Writeback happens despite the abort.
    BaseUpdated,
    /// The base keeps its pre-instruction value.
    BaseRestored,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MemoryRange {
    pub base: u64,
    pub size: String, // e.g. "64MB"
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GdbConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_gdb_port")]
    pub port: u16,
    /// Hold the core at reset until a client attaches.
    #[serde(default)]
    pub wait_for_attach: bool,
}

impl Default for GdbConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_gdb_port(),
            wait_for_attach: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct BoardManifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    pub name: Option<String>,
    pub core: CoreKind,
    #[serde(default)]
    pub abort_model: Option<AbortModel>,
    pub memory: Vec<MemoryRange>,
    /// Overrides the image's entry point.
    #[serde(default)]
    pub entry: Option<u64>,
    /// Exception vectors at 0xFFFF0000 instead of 0.
    #[serde(default)]
    pub vector_high: bool,
    #[serde(default)]
    pub gdb: GdbConfig,
}

/// A validated memory region in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionSpec {
    pub base: u32,
    pub size: usize,
}

impl BoardManifest {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open board manifest at {:?}", path.as_ref()))?;
        let manifest: Self =
            serde_yaml::from_reader(f).context("Failed to parse Board Manifest YAML")?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let manifest: Self =
            serde_yaml::from_str(yaml).context("Failed to parse Board Manifest YAML")?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        if self.memory.is_empty() {
            anyhow::bail!("Board must declare at least one 'memory' region");
        }

        let mut regions = self.regions()?;
        regions.sort_by_key(|r| r.base);
        for pair in regions.windows(2) {
            let end = pair[0].base as u64 + pair[0].size as u64;
            if end > pair[1].base as u64 {
                anyhow::bail!(
                    "Memory regions at {:#010x} and {:#010x} overlap",
                    pair[0].base,
                    pair[1].base
                );
            }
        }

        if let Some(entry) = self.entry {
            if entry > u32::MAX as u64 {
                anyhow::bail!("Entry point {:#x} is outside the 32-bit address space", entry);
            }
        }

        if self.gdb.port == 0 {
            anyhow::bail!("GDB 'port' must be non-zero");
        }

        Ok(())
    }

    /// Memory regions with their sizes parsed and bounds checked.
    pub fn regions(&self) -> Result<Vec<RegionSpec>> {
        self.memory
            .iter()
            .map(|range| {
                let size = parse_size(&range.size)
                    .with_context(|| format!("Region at {:#x}", range.base))?;
                if size == 0 {
                    anyhow::bail!("Memory region at {:#x} has zero size", range.base);
                }
                if range.base.saturating_add(size) > 1 << 32 {
                    anyhow::bail!(
                        "Memory region at {:#x} ({} bytes) exceeds the 32-bit address space",
                        range.base,
                        size
                    );
                }
                Ok(RegionSpec {
                    base: range.base as u32,
                    size: size as usize,
                })
            })
            .collect()
    }

    /// Core preset with the manifest's abort model applied.
    pub fn core_config(&self) -> CoreConfig {
        let mut config = self.core.core_config();
        if let Some(model) = self.abort_model {
            config.base_updated_abort = model == AbortModel::BaseUpdated;
        }
        config
    }
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_manifest() {
        let yaml = r#"
name: "versatile"
core: arm926ejs
memory:
  - base: 0x0
    size: "64MiB"
  - base: 0x10000000
    size: "4KiB"
entry: 0x8000
gdb:
  enabled: true
  wait_for_attach: true
"#;
        let board = BoardManifest::from_yaml(yaml).unwrap();
        assert_eq!(board.core, CoreKind::Arm926ejs);
        assert_eq!(board.entry, Some(0x8000));
        assert!(!board.vector_high);
        assert_eq!(board.gdb.port, 12345);
        assert!(board.gdb.wait_for_attach);
        assert_eq!(
            board.regions().unwrap(),
            vec![
                RegionSpec {
                    base: 0,
                    size: 64 << 20
                },
                RegionSpec {
                    base: 0x1000_0000,
                    size: 4096
                },
            ]
        );
        assert!(!board.core_config().base_updated_abort);
    }

    #[test]
    fn test_abort_model_override() {
        let yaml = r#"
core: arm920t
abort_model: base-updated
memory:
  - base: 0x0
    size: "1MiB"
"#;
        let board = BoardManifest::from_yaml(yaml).unwrap();
        let config = board.core_config();
        assert!(config.base_updated_abort);
        assert!(!config.is_v5);
        assert_eq!(config.device_id, 0x4100_9200);
    }

    #[test]
    fn test_invalid_version() {
        let yaml = r#"
schema_version: "2.0"
core: arm926ejs
memory:
  - base: 0x0
    size: "1MiB"
"#;
        let err = BoardManifest::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("Unsupported schema_version"));
    }

    #[test]
    fn test_overlapping_regions() {
        let yaml = r#"
core: arm926ejs
memory:
  - base: 0x100000
    size: "1MiB"
  - base: 0x0
    size: "2MiB"
"#;
        let err = BoardManifest::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("overlap"), "{}", err);
    }

    #[test]
    fn test_empty_and_oversized_memory() {
        let err = BoardManifest::from_yaml("core: arm926ejs\nmemory: []\n").unwrap_err();
        assert!(err.to_string().contains("at least one"));

        let yaml = r#"
core: arm926ejs
memory:
  - base: 0xFFFF0000
    size: "1MiB"
"#;
        let err = BoardManifest::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("32-bit"), "{}", err);
    }

    #[test]
    fn test_zero_gdb_port() {
        let yaml = r#"
core: arm926ejs
memory:
  - base: 0x0
    size: "1MiB"
gdb:
  enabled: true
  port: 0
"#;
        let err = BoardManifest::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn test_unknown_core_is_rejected() {
        let yaml = "core: cortex-m3\nmemory:\n  - base: 0x0\n    size: \"1MiB\"\n";
        assert!(BoardManifest::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_core_names() {
        assert_eq!(CoreKind::from_name("ARM926EJ-S"), Some(CoreKind::Arm926ejs));
        assert_eq!(CoreKind::from_name("arm920t"), Some(CoreKind::Arm920t));
        assert_eq!(CoreKind::from_name("cortex-m3"), None);
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4KiB").unwrap(), 4096);
        assert_eq!(parse_size("1MB").unwrap(), 1_000_000);
        assert!(parse_size("lots").is_err());
    }
}
