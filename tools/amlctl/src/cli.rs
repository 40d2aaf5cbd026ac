//! Command-line interface definitions for amlctl.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// ACPI definition block inspector and generator.
#[derive(Parser)]
#[command(name = "amlctl", version, about)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Increase log output (`-v` debug, `-vv` trace).
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Accept tables whose checksum does not match.
    #[arg(long, global = true)]
    pub no_checksum: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Print the node tree of a table.
    Dump(TableArgs),
    /// Parse and re-serialize a table and compare the bytes.
    Roundtrip(RoundtripArgs),
    /// Resolve an ASL path and print the object it names.
    Find(FindArgs),
    /// List every named object with its absolute path.
    Namespace(TableArgs),
    /// Build an SSDT from a TOML platform description.
    Generate(GenerateArgs),
}

/// A single table argument.
#[derive(Parser)]
pub struct TableArgs {
    /// DSDT or SSDT binary.
    pub table: PathBuf,
}

/// Arguments for the `roundtrip` subcommand.
#[derive(Parser)]
pub struct RoundtripArgs {
    /// DSDT or SSDT binary.
    pub table: PathBuf,

    /// Also write the re-serialized table here.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

/// Arguments for the `find` subcommand.
#[derive(Parser)]
pub struct FindArgs {
    /// DSDT or SSDT binary.
    pub table: PathBuf,

    /// ASL path, e.g. `\_SB.PCI0._CRS`. Relative paths start at the root.
    pub path: String,
}

/// Arguments for the `generate` subcommand.
#[derive(Parser)]
pub struct GenerateArgs {
    /// Platform description.
    pub config: PathBuf,

    /// Output table.
    #[arg(long, short = 'o')]
    pub output: PathBuf,
}
