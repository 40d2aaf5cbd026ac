//! ACPI definition block tool.
//!
//! Parses DSDT/SSDT binaries into an AML tree to dump, query or round-trip
//! them, and generates SSDTs from a TOML platform description.

mod cli;
mod config;
mod logger;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use hadron_aml::{
    AmlTree, AmlValue, NodeId, ParseConfig, TreeDisplay, parse_definition_block_with, parse_resource_template,
    serialize_definition_block,
};

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    logger::init(logger::level(cli.verbose, cli.quiet)).context("installing logger")?;

    let parse = ParseConfig { verify_checksum: !cli.no_checksum, ..ParseConfig::default() };
    match cli.command {
        cli::Command::Dump(ref args) => cmd_dump(&args.table, &parse),
        cli::Command::Roundtrip(ref args) => cmd_roundtrip(args, &parse),
        cli::Command::Find(ref args) => cmd_find(args, &parse),
        cli::Command::Namespace(ref args) => cmd_namespace(&args.table, &parse),
        cli::Command::Generate(ref args) => cmd_generate(args),
    }
}

// ===========================================================================
// Table loading
// ===========================================================================

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn load(path: &Path, parse: &ParseConfig) -> Result<(AmlTree, NodeId)> {
    let bytes = read(path)?;
    let tree = parse_definition_block_with(&bytes, parse).with_context(|| format!("parsing {}", path.display()))?;
    let Some(root) = tree.root() else {
        bail!("{} has no definition block", path.display());
    };
    Ok((tree, root))
}

// ===========================================================================
// Commands
// ===========================================================================

fn cmd_dump(path: &Path, parse: &ParseConfig) -> Result<()> {
    let (tree, root) = load(path, parse)?;
    print!("{}", TreeDisplay::new(&tree, root));
    Ok(())
}

fn cmd_roundtrip(args: &cli::RoundtripArgs, parse: &ParseConfig) -> Result<()> {
    let original = read(&args.table)?;
    let tree = parse_definition_block_with(&original, parse)
        .with_context(|| format!("parsing {}", args.table.display()))?;
    let bytes = serialize_definition_block(&tree).context("serializing")?;

    if let Some(output) = &args.output {
        fs::write(output, &bytes).with_context(|| format!("writing {}", output.display()))?;
    }
    if bytes != original {
        let offset = bytes.iter().zip(&original).position(|(a, b)| a != b).unwrap_or(bytes.len().min(original.len()));
        bail!(
            "re-serialized table differs at offset {offset:#x} ({} bytes in, {} bytes out)",
            original.len(),
            bytes.len(),
        );
    }
    println!("{}: identical ({} bytes, {} nodes)", args.table.display(), bytes.len(), tree.len());
    Ok(())
}

fn cmd_find(args: &cli::FindArgs, parse: &ParseConfig) -> Result<()> {
    let (tree, root) = load(&args.table, parse)?;
    let Some(node) = tree.find_node(root, &args.path).with_context(|| format!("resolving {}", args.path))? else {
        bail!("{} not found", args.path);
    };

    println!("{}", tree.absolute_path(node)?);
    if let Ok(value) = tree.name_op_value(node) {
        print_value(&value);
    }
    print!("{}", TreeDisplay::new(&tree, node));
    Ok(())
}

fn print_value(value: &AmlValue) {
    match value {
        AmlValue::Integer(v) => println!("value: {v:#X}"),
        AmlValue::EisaId(id) => println!("value: EisaId (\"{id}\")"),
        AmlValue::String(s) => println!("value: \"{s}\""),
        AmlValue::Buffer(bytes) => {
            println!("value: Buffer ({} bytes)", bytes.len());
            for resource in parse_resource_template(bytes) {
                println!("  {resource:?}");
            }
        }
        AmlValue::Package(count) => println!("value: Package ({count} elements)"),
        AmlValue::Unresolved => println!("value: <needs evaluation>"),
    }
}

fn cmd_namespace(path: &Path, parse: &ParseConfig) -> Result<()> {
    let (tree, _) = load(path, parse)?;
    for entry in tree.namespace_entries()? {
        println!("{:<40} {:?}", entry.path.to_string(), entry.kind);
    }
    Ok(())
}

fn cmd_generate(args: &cli::GenerateArgs) -> Result<()> {
    let text = fs::read_to_string(&args.config).with_context(|| format!("reading {}", args.config.display()))?;
    let platform = config::Platform::from_toml(&text)?;
    let tree = platform.build()?;
    let bytes = serialize_definition_block(&tree).context("serializing")?;
    fs::write(&args.output, &bytes).with_context(|| format!("writing {}", args.output.display()))?;
    log::info!("wrote {} ({} bytes)", args.output.display(), bytes.len());
    Ok(())
}
