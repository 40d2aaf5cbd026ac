//! Integration tests for amlctl.
//!
//! Each test runs the built binary against files written to its own
//! directory under the system temp dir.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const PLATFORM: &str = r#"
scope = '\_SB'

[table]
oem_id = "HADRON"
oem_table_id = "ITEST"
oem_revision = 1

[[device]]
name = "COM0"
hid = "PNP0501"
uid = 0
io = [{ base = 0x3F8, length = 8 }]
interrupt = [{ irqs = [4], edge_triggered = true }]

[[device]]
name = "RTC0"
hid = "PNP0B00"
memory = [{ base = 0xFED00000, length = 0x400, writable = false }]
"#;

/// Fresh scratch directory for one test.
fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("amlctl-{}-{name}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("could not create scratch directory");
    dir
}

fn amlctl(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_amlctl"))
        .args(args)
        .output()
        .expect("failed to execute amlctl")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Writes the platform description and generates a table from it.
fn generate(dir: &Path) -> PathBuf {
    let config = dir.join("platform.toml");
    let table = dir.join("ssdt.aml");
    fs::write(&config, PLATFORM).unwrap();
    let output = amlctl(&["generate", config.to_str().unwrap(), "-o", table.to_str().unwrap()]);
    assert!(output.status.success(), "generate failed:\n{}", stderr(&output));
    table
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn generated_table_round_trips() {
    let dir = scratch("roundtrip");
    let table = generate(&dir);
    let bytes = fs::read(&table).unwrap();
    assert_eq!(&bytes[..4], b"SSDT");

    let copy = dir.join("copy.aml");
    let output = amlctl(&["roundtrip", table.to_str().unwrap(), "-o", copy.to_str().unwrap()]);
    assert!(output.status.success(), "roundtrip failed:\n{}", stderr(&output));
    assert!(stdout(&output).contains("identical"));
    assert_eq!(fs::read(&copy).unwrap(), bytes);
}

#[test]
fn inspects_generated_table() {
    let dir = scratch("inspect");
    let table = generate(&dir);
    let table = table.to_str().unwrap();

    let output = amlctl(&["dump", table]);
    assert!(output.status.success(), "dump failed:\n{}", stderr(&output));
    let dump = stdout(&output);
    assert!(dump.starts_with("DefinitionBlock SSDT \"HADRON\" \"ITEST\""));
    assert!(dump.contains("Device COM0"));
    assert!(dump.contains("Device RTC0"));

    let output = amlctl(&["namespace", table]);
    assert!(output.status.success());
    let names = stdout(&output);
    assert!(names.contains("\\_SB_.COM0._CRS"));
    assert!(names.contains("\\_SB_.RTC0._HID"));

    let output = amlctl(&["find", table, "\\_SB.COM0._HID"]);
    assert!(output.status.success(), "find failed:\n{}", stderr(&output));
    let found = stdout(&output);
    assert!(found.starts_with("\\_SB_.COM0._HID"));
    assert!(found.contains("EisaId (\"PNP0501\")"));
}

#[test]
fn missing_path_fails() {
    let dir = scratch("missing");
    let table = generate(&dir);
    let output = amlctl(&["find", table.to_str().unwrap(), "\\_SB.NONE"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("not found"));
}

#[test]
fn corrupted_checksum_is_reported() {
    let dir = scratch("checksum");
    let table = generate(&dir);
    let mut bytes = fs::read(&table).unwrap();
    bytes[9] = bytes[9].wrapping_add(1);
    fs::write(&table, &bytes).unwrap();
    let table = table.to_str().unwrap();

    let output = amlctl(&["roundtrip", table]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("checksum"));

    // Accepted on request, but the rewritten checksum no longer matches.
    let output = amlctl(&["--no-checksum", "roundtrip", table]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("offset 0x9"));
}
