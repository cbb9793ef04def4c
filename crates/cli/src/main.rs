// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

mod board;
mod trace;

use anyhow::{Context, Result};
use board::{Board, BoardSpec};
use clap::Parser;
use labwired_iss_config::{BoardManifest, CoreKind};
use labwired_iss_core::snapshot::CoreSnapshot;
use labwired_iss_gdbstub::{RspServer, DEFAULT_PORT};
use labwired_iss_loader::SymbolTable;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};
use trace::TraceObserver;

const EXIT_PASS: u8 = 0;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

const SNAPSHOT_SCHEMA_VERSION: &str = "1.0";
const DEFAULT_MAX_STEPS: u64 = 20_000;

fn parse_u32_addr(s: &str) -> Result<u32, String> {
    let trimmed = s.trim();
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex address '{}': {}", s, e))
    } else {
        u32::from_str(trimmed).map_err(|e| format!("Invalid address '{}': {}", s, e))
    }
}

fn parse_core(s: &str) -> Result<CoreKind, String> {
    CoreKind::from_name(s)
        .ok_or_else(|| format!("Unknown core '{}'. Supported cores: arm926ejs, arm920t", s))
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "LabWired ARM instruction-set simulator",
    long_about = None
)]
struct Cli {
    /// Firmware image: an ARM ELF file or a raw binary
    #[arg(short, long)]
    firmware: PathBuf,

    /// Path to the board manifest (YAML)
    #[arg(short, long)]
    board: Option<PathBuf>,

    /// Core variant, overriding the manifest (arm926ejs, arm920t)
    #[arg(long, value_parser = parse_core)]
    core: Option<CoreKind>,

    /// Start a GDB server, optionally on a specific port
    #[arg(long, num_args = 0..=1, default_missing_value = "12345")]
    gdb: Option<u16>,

    /// Hold the core at reset until a GDB client attaches
    #[arg(long)]
    wait_for_attach: bool,

    /// Faulting loads/stores keep their base register writeback
    #[arg(long)]
    base_updated_abort: bool,

    /// Load address for raw binaries (default: 0)
    #[arg(long, value_parser = parse_u32_addr)]
    load_address: Option<u32>,

    /// Maximum number of steps to execute; 0 runs until interrupted.
    /// Defaults to 20000, or unlimited with a GDB server.
    #[arg(long)]
    max_steps: Option<u64>,

    /// Log every executed instruction
    #[arg(short, long)]
    trace: bool,

    /// Write the final core state (JSON) to this path
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

impl Cli {
    /// Merge the manifest (if any) with command-line overrides.
    fn board_spec(&self) -> Result<BoardSpec> {
        let mut spec = match &self.board {
            Some(path) => BoardSpec::from_manifest(&BoardManifest::from_file(path)?)?,
            None => BoardSpec::bare(CoreKind::Arm926ejs),
        };
        if let Some(core) = self.core {
            spec.core = core;
        }
        if self.base_updated_abort {
            spec.abort_model = Some(labwired_iss_config::AbortModel::BaseUpdated);
        }
        if let Some(port) = self.gdb {
            if port == 0 {
                anyhow::bail!("GDB port must be non-zero");
            }
            spec.gdb.enabled = true;
            spec.gdb.port = port;
        }
        if self.wait_for_attach {
            spec.gdb.enabled = true;
            spec.gdb.wait_for_attach = true;
        }
        Ok(spec)
    }

    fn step_budget(&self, gdb_enabled: bool) -> u64 {
        match self.max_steps {
            Some(0) => u64::MAX,
            Some(n) => n,
            None if gdb_enabled => u64::MAX,
            None => DEFAULT_MAX_STEPS,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RunSnapshot {
    snapshot_schema_version: String,
    firmware: PathBuf,
    firmware_hash: String,
    board: String,
    steps_executed: u64,
    host_internal_cycles: u64,
    host_idle_requests: u64,
    core: CoreSnapshot,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    info!("Starting LabWired ISS");

    let (spec, mut board) = match prepare(&cli) {
        Ok(prepared) => prepared,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    match run(&cli, &spec, &mut board) {
        Ok(()) => ExitCode::from(EXIT_PASS),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}

fn prepare(cli: &Cli) -> Result<(BoardSpec, Board)> {
    let spec = cli.board_spec()?;

    info!("Loading firmware: {:?}", cli.firmware);
    let image = labwired_iss_loader::load_firmware(&cli.firmware, cli.load_address)?;
    info!(
        "Firmware Loaded: {} segment(s), entry {:#x}",
        image.segments.len(),
        image.entry_point
    );

    let board = spec.assemble(&image)?;
    Ok((spec, board))
}

fn run(cli: &Cli, spec: &BoardSpec, board: &mut Board) -> Result<()> {
    let core = &mut board.core;

    if cli.trace {
        let symbols = SymbolTable::from_file(&cli.firmware).unwrap_or_else(|e| {
            debug!("No symbols for trace: {:#}", e);
            SymbolTable::default()
        });
        core.add_observer(Arc::new(TraceObserver::new(symbols)));
    }

    if spec.gdb.enabled {
        let server = RspServer::bind(spec.gdb.port, spec.gdb.wait_for_attach)
            .with_context(|| format!("Failed to start GDB server on port {}", spec.gdb.port))?;
        if spec.gdb.port != DEFAULT_PORT {
            info!("Connect with: target remote :{}", spec.gdb.port);
        }
        core.attach_debugger(Box::new(server));
    }

    let budget = cli.step_budget(spec.gdb.enabled);
    if budget == u64::MAX {
        info!("Running until interrupted...");
    } else {
        info!("Running for {} steps...", budget);
    }

    let started = Instant::now();
    let steps = core.run(budget);
    let elapsed = started.elapsed();

    if let Some(mut debugger) = core.detach_debugger() {
        debugger.end(0);
    }

    info!("Simulation loop finished.");
    info!("Final PC: {:#x}", core.pc());
    info!("Total Instructions: {}", core.counters.num_instrs);
    info!("Total Cycles: {}", core.counters.total());
    if elapsed.as_secs_f64() > 0.0 {
        info!(
            "Average IPS: {:.2}",
            core.counters.num_instrs as f64 / elapsed.as_secs_f64()
        );
    }

    if let Some(path) = &cli.snapshot {
        let snapshot = RunSnapshot {
            snapshot_schema_version: SNAPSHOT_SCHEMA_VERSION.to_string(),
            firmware: cli.firmware.clone(),
            firmware_hash: firmware_hash(&cli.firmware)?,
            board: spec.name.clone(),
            steps_executed: steps,
            host_internal_cycles: board.host.internal_cycles(),
            host_idle_requests: board.host.idle_requests(),
            core: board.core.snapshot(),
        };
        write_snapshot(path, &snapshot)?;
        info!("Snapshot written to {:?}", path);
    }

    Ok(())
}

fn firmware_hash(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to hash firmware {:?}", path))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

fn write_snapshot(path: &Path, snapshot: &RunSnapshot) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create snapshot directory {:?}", parent))?;
    }
    let json = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write snapshot {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_u32_addr() {
        assert_eq!(parse_u32_addr("0x8000"), Ok(0x8000));
        assert_eq!(parse_u32_addr(" 4096 "), Ok(4096));
        assert!(parse_u32_addr("0x1_0000_0000").is_err());
    }

    #[test]
    fn test_command_line_overrides() {
        let cli = Cli::parse_from([
            "labwired-iss",
            "--firmware",
            "app.bin",
            "--core",
            "arm920t",
            "--gdb",
            "--base-updated-abort",
        ]);
        let spec = cli.board_spec().unwrap();
        assert_eq!(spec.core, CoreKind::Arm920t);
        assert!(spec.core_config().base_updated_abort);
        assert!(spec.gdb.enabled);
        assert_eq!(spec.gdb.port, DEFAULT_PORT);
        assert_eq!(cli.step_budget(spec.gdb.enabled), u64::MAX);
    }

    #[test]
    fn test_gdb_port_and_step_budget() {
        let cli = Cli::parse_from([
            "labwired-iss",
            "-f",
            "app.elf",
            "--gdb",
            "3333",
            "--max-steps",
            "10",
        ]);
        let spec = cli.board_spec().unwrap();
        assert_eq!(spec.gdb.port, 3333);
        assert_eq!(cli.step_budget(true), 10);

        let cli = Cli::parse_from(["labwired-iss", "-f", "app.elf"]);
        assert!(!cli.board_spec().unwrap().gdb.enabled);
        assert_eq!(cli.step_budget(false), DEFAULT_MAX_STEPS);
    }

    #[test]
    fn test_unknown_core_is_a_usage_error() {
        let result = Cli::try_parse_from(["labwired-iss", "-f", "a.bin", "--core", "cortex-m3"]);
        assert!(result.is_err());
    }
}
