// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use labwired_iss_config::{BoardManifest, CoreKind};
use std::io::Write;

#[test]
fn test_manifest_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
schema_version: "1.0"
name: "integrator"
core: arm926ejs
memory:
  - base: 0x0
    size: "128KB"
vector_high: true
gdb:
  enabled: true
  port: 3333
"#
    )
    .unwrap();

    let board = BoardManifest::from_file(file.path()).unwrap();
    assert_eq!(board.name.as_deref(), Some("integrator"));
    assert_eq!(board.core, CoreKind::Arm926ejs);
    assert!(board.vector_high);
    assert!(board.gdb.enabled);
    assert_eq!(board.gdb.port, 3333);
    assert!(!board.gdb.wait_for_attach);
    assert_eq!(board.regions().unwrap().len(), 1);
}

#[test]
fn test_missing_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");
    let err = BoardManifest::from_file(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("absent.yaml"));
}

#[test]
fn test_unknown_fields_are_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "core: arm926ejs\nmemory:\n  - base: 0x0\n    size: \"1MiB\"\nperipherals: []"
    )
    .unwrap();
    assert!(BoardManifest::from_file(file.path()).is_err());
}
