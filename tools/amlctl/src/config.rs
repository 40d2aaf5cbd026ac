//! TOML platform descriptions for `amlctl generate`.
//!
//! ```toml
//! scope = '\_SB'
//!
//! [table]
//! oem_id = "HADRON"
//! oem_table_id = "PLATFORM"
//!
//! [[device]]
//! name = "COM0"
//! hid = "PNP0501"
//! uid = 0
//! io = [{ base = 0x3F8, length = 8 }]
//! interrupt = [{ irqs = [4], edge_triggered = true }]
//! ```

use anyhow::{Context, Result};
use hadron_aml::{AmlTree, EisaId, NodeId};
use serde::Deserialize;

/// A whole platform description.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Platform {
    /// Table identity.
    pub table: TableConfig,
    /// Scope the devices are declared in.
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Devices, in declaration order.
    #[serde(default, rename = "device")]
    pub devices: Vec<DeviceConfig>,
}

/// Definition block header fields.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableConfig {
    /// `SSDT` or `DSDT`.
    #[serde(default = "default_signature")]
    pub signature: String,
    /// Up to 6 ASCII characters.
    pub oem_id: String,
    /// Up to 8 ASCII characters.
    pub oem_table_id: String,
    /// OEM revision.
    #[serde(default)]
    pub oem_revision: u32,
}

/// One `Device` and its standard objects.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// 1 to 4 character device name.
    pub name: String,
    /// `_HID`: an EISA ID such as `PNP0501`, or any other string.
    pub hid: Option<String>,
    /// `_UID`.
    pub uid: Option<u64>,
    /// `Memory32Fixed` ranges of `_CRS`.
    #[serde(default)]
    pub memory: Vec<MemoryConfig>,
    /// Fixed `IO` ranges of `_CRS`.
    #[serde(default)]
    pub io: Vec<IoConfig>,
    /// `Interrupt` descriptors of `_CRS`.
    #[serde(default)]
    pub interrupt: Vec<InterruptConfig>,
}

/// A fixed 32-bit memory range.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Base address.
    pub base: u32,
    /// Length in bytes.
    pub length: u32,
    /// `ReadWrite` rather than `ReadOnly`.
    #[serde(default = "default_true")]
    pub writable: bool,
}

/// A fixed IO port range.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IoConfig {
    /// First port.
    pub base: u16,
    /// Number of ports.
    pub length: u8,
    /// Base alignment.
    #[serde(default = "default_alignment")]
    pub alignment: u8,
}

/// An extended interrupt descriptor.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterruptConfig {
    /// Global system interrupts.
    pub irqs: Vec<u32>,
    /// Edge rather than level triggered.
    #[serde(default)]
    pub edge_triggered: bool,
    /// Active low rather than active high.
    #[serde(default)]
    pub active_low: bool,
    /// Shared rather than exclusive.
    #[serde(default)]
    pub shared: bool,
}

fn default_scope() -> String {
    "\\_SB".into()
}

fn default_signature() -> String {
    "SSDT".into()
}

fn default_true() -> bool {
    true
}

fn default_alignment() -> u8 {
    1
}

impl Platform {
    /// Parses a TOML description.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid platform description")
    }

    /// Builds the definition block tree.
    pub fn build(&self) -> Result<AmlTree> {
        let mut tree = AmlTree::new();
        let table = &self.table;
        let root = tree
            .definition_block(&table.signature, &table.oem_id, &table.oem_table_id, table.oem_revision)
            .context("table header")?;
        let scope = tree
            .scope(&self.scope, Some(root))
            .with_context(|| format!("scope {}", self.scope))?;
        for device in &self.devices {
            device
                .build(&mut tree, scope)
                .with_context(|| format!("device {}", device.name))?;
        }
        log::debug!("generated {} devices under {}", self.devices.len(), self.scope);
        Ok(tree)
    }
}

impl DeviceConfig {
    fn build(&self, tree: &mut AmlTree, scope: NodeId) -> Result<()> {
        let device = tree.device(&self.name, Some(scope))?;
        if let Some(hid) = &self.hid {
            if hid.parse::<EisaId>().is_ok() {
                tree.name_eisa_id("_HID", hid, Some(device))?;
            } else {
                tree.name_string("_HID", hid, Some(device)).context("_HID")?;
            }
        }
        if let Some(uid) = self.uid {
            tree.name_integer("_UID", uid, Some(device))?;
        }
        if self.memory.is_empty() && self.io.is_empty() && self.interrupt.is_empty() {
            return Ok(());
        }

        let crs = tree.name_resource_template("_CRS", Some(device))?;
        for range in &self.memory {
            tree.rd_memory32_fixed(range.writable, range.base, range.length, Some(crs))
                .context("memory range")?;
        }
        for range in &self.io {
            tree.rd_io(true, range.base, range.base, range.alignment, range.length, Some(crs))
                .context("IO range")?;
        }
        for irq in &self.interrupt {
            tree.rd_interrupt(true, irq.edge_triggered, irq.active_low, irq.shared, &irq.irqs, Some(crs))
                .context("interrupt")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hadron_aml::{AmlValue, parse_definition_block, serialize_definition_block};

    const UART: &str = r#"
        scope = '\_SB'

        [table]
        oem_id = "HADRON"
        oem_table_id = "PLATFORM"
        oem_revision = 3

        [[device]]
        name = "COM0"
        hid = "PNP0501"
        uid = 0
        io = [{ base = 0x3F8, length = 8 }]
        interrupt = [{ irqs = [4], edge_triggered = true }]

        [[device]]
        name = "GED0"
        hid = "ACPI0013"
    "#;

    #[test]
    fn builds_devices() {
        let platform = Platform::from_toml(UART).unwrap();
        assert_eq!(platform.table.signature, "SSDT");
        assert_eq!(platform.devices.len(), 2);

        let tree = platform.build().unwrap();
        let bytes = serialize_definition_block(&tree).unwrap();
        let parsed = parse_definition_block(&bytes).unwrap();
        let root = parsed.root().unwrap();

        let hid = parsed.find_node(root, "\\_SB.COM0._HID").unwrap().unwrap();
        assert_eq!(parsed.name_op_value(hid).unwrap(), AmlValue::EisaId("PNP0501".parse().unwrap()));
        let crs = parsed.find_node(root, "\\_SB.COM0._CRS").unwrap().unwrap();
        let AmlValue::Buffer(template) = parsed.name_op_value(crs).unwrap() else {
            panic!("_CRS is not a buffer");
        };
        assert_eq!(hadron_aml::parse_resource_template(&template).count(), 2);

        let hid = parsed.find_node(root, "\\_SB.GED0._HID").unwrap().unwrap();
        assert_eq!(parsed.name_op_get_string(hid), Ok("ACPI0013"));
        assert_eq!(parsed.find_node(root, "\\_SB.GED0._CRS"), Ok(None));
    }

    #[test]
    fn rejects_unknown_keys() {
        let text = "[table]\noem_id = \"A\"\noem_table_id = \"B\"\nrevision = 1\n";
        assert!(Platform::from_toml(text).is_err());
    }

    #[test]
    fn reports_the_failing_device() {
        let text = "[table]\noem_id = \"A\"\noem_table_id = \"B\"\n[[device]]\nname = \"TOOLONG\"\n";
        let err = Platform::from_toml(text).unwrap().build().unwrap_err();
        assert!(format!("{err:#}").contains("device TOOLONG"));
    }
}
