//! Builders for common ASL constructs.
//!
//! Every builder validates its arguments before allocating, builds a
//! detached branch, and attaches it to `parent` when one is given. The new
//! handle is always returned; a branch that is never attached is released
//! with the tree or by [`AmlTree::delete_tree`]. A failing builder leaves
//! nothing behind.
//!
//! ```text
//! DefinitionBlock ("", "SSDT", 2, "OEMID", "TABLEID", 1) {
//!     Scope (_SB) {
//!         Device (CPU0) {
//!             Name (_UID, 0)
//!         }
//!     }
//! }
//! ```
//!
//! is built with [`AmlTree::definition_block`], [`AmlTree::scope`],
//! [`AmlTree::device`] and [`AmlTree::name_integer`].

mod package;
mod resource;

pub use package::{CpcEntry, CpcInfo, CsdEntry, CstState, LpiEntryMethod, LpiState, PssState};
pub use resource::{AddressFlags, AddressRange, GenericAddress, IoFlags, MemoryFlags, UartConfig};

use alloc::vec::Vec;

use log::debug;

use crate::AmlError;
use crate::name::NameString;
use crate::node::{AmlTree, DataType, NodeId};
use crate::opcode::{
    AmlByteEncoding, BUFFER_OP, DEVICE_OP, DWORD_OP, METHOD_INVOCATION_OP, METHOD_OP, NAME_OP,
    NAME_REFERENCE_OP, PACKAGE_OP, RETURN_OP, SCOPE_OP, THERMAL_ZONE_OP,
};
use crate::resource as rd;
use crate::sdt::SdtHeader;
use crate::value::EisaId;

/// Highest `SyncLevel` of a serialized method.
pub const MAX_SYNC_LEVEL: u8 = 15;
/// Highest argument count of a method or method call.
pub const MAX_METHOD_ARGS: u8 = 7;

/// End Tag with a zero checksum.
const END_TAG: [u8; 2] = [rd::END_TAG, 0x00];

fn asl_name(name: &str) -> Result<NameString, AmlError> {
    NameString::from_asl(name)
}

fn method_flags(num_args: u8, serialized: bool, sync_level: u8) -> Result<u8, AmlError> {
    if num_args > MAX_METHOD_ARGS || sync_level > MAX_SYNC_LEVEL {
        return Err(AmlError::OutOfRange);
    }
    Ok(num_args | (u8::from(serialized) << 3) | (sync_level << 4))
}

impl AmlTree {
    // ─── Shared construction steps ──────────────────────────────────────────

    /// Attaches `node` to `parent` if one is given, deleting `node` when the
    /// attach fails.
    pub(crate) fn link(&mut self, node: NodeId, parent: Option<NodeId>) -> Result<NodeId, AmlError> {
        if let Some(parent) = parent {
            self.adopt_variable(parent, node)?;
        }
        Ok(node)
    }

    /// Places the detached `child` in a fixed slot, deleting it on failure.
    pub(crate) fn adopt_fixed(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<(), AmlError> {
        self.with_cleanup(child, |tree| tree.set_fixed_argument(parent, index, child))
    }

    /// Object whose first fixed argument is `name`.
    pub(crate) fn new_named(
        &mut self,
        encoding: &'static AmlByteEncoding,
        name: &NameString,
    ) -> Result<NodeId, AmlError> {
        let id = self.new_object(encoding)?;
        self.with_cleanup(id, |tree| {
            let name = tree.new_name_string(name)?;
            tree.adopt_fixed(id, 0, name)
        })?;
        Ok(id)
    }

    /// `Name (name, value)`. `value` is consumed even on failure.
    pub(crate) fn new_name_op(&mut self, name: &NameString, value: NodeId) -> Result<NodeId, AmlError> {
        self.with_cleanup(value, |tree| {
            let id = tree.new_named(&NAME_OP, name)?;
            tree.with_cleanup(id, |tree| tree.set_fixed_argument(id, 1, value))?;
            Ok(id)
        })
    }

    /// Empty `Package () {}`.
    pub(crate) fn new_package(&mut self) -> Result<NodeId, AmlError> {
        let id = self.new_object(&PACKAGE_OP)?;
        self.with_cleanup(id, |tree| {
            let count = tree.new_data(DataType::UInt, &[0])?;
            tree.adopt_fixed(id, 0, count)
        })?;
        Ok(id)
    }

    /// `Buffer () {}` with a computed size.
    pub(crate) fn new_buffer(&mut self) -> Result<NodeId, AmlError> {
        let id = self.new_object(&BUFFER_OP)?;
        self.with_cleanup(id, |tree| {
            let size = tree.new_integer(0)?;
            tree.adopt_fixed(id, 0, size)
        })?;
        Ok(id)
    }

    /// Buffer holding `bytes` as one raw byte list.
    pub(crate) fn new_raw_buffer(&mut self, bytes: &[u8]) -> Result<NodeId, AmlError> {
        let id = self.new_buffer()?;
        self.with_cleanup(id, |tree| {
            let data = tree.new_data(DataType::Raw, bytes)?;
            tree.adopt_variable(id, data)
        })?;
        Ok(id)
    }

    /// `ResourceTemplate () {}`: a buffer holding only an End Tag.
    pub(crate) fn new_resource_template(&mut self) -> Result<NodeId, AmlError> {
        let id = self.new_buffer()?;
        self.with_cleanup(id, |tree| {
            let end = tree.new_data(DataType::ResourceData, &END_TAG)?;
            tree.adopt_variable(id, end)
        })?;
        Ok(id)
    }

    /// Bare name used as a term.
    pub(crate) fn new_name_reference(&mut self, name: &NameString) -> Result<NodeId, AmlError> {
        self.new_named(&NAME_REFERENCE_OP, name)
    }

    // ─── Definition block and scopes ────────────────────────────────────────

    /// `DefinitionBlock ("", signature, 2, oem_id, oem_table_id, oem_revision)`.
    ///
    /// Creates the root of this tree. OEM identifiers longer than their
    /// field are truncated and shorter ones are NUL-padded.
    ///
    /// # Errors
    ///
    /// - [`AmlError::InvalidHeader`] unless `signature` is `DSDT` or `SSDT`
    ///   and the identifiers are printable ASCII.
    /// - [`AmlError::RootExists`] if the tree already has a root.
    pub fn definition_block(
        &mut self,
        signature: &str,
        oem_id: &str,
        oem_table_id: &str,
        oem_revision: u32,
    ) -> Result<NodeId, AmlError> {
        let signature: [u8; 4] = signature.as_bytes().try_into().map_err(|_| AmlError::InvalidHeader)?;
        let header = SdtHeader::new_definition_block(signature, oem_id, oem_table_id, oem_revision)?;
        let root = self.new_root(header)?;
        debug!("aml: new {} definition block", core::str::from_utf8(&signature).unwrap_or("????"));
        Ok(root)
    }

    /// `Scope (name) {}`.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidNameString`] for a malformed name, or an
    /// attach error from [`AmlTree::attach_node`].
    pub fn scope(&mut self, name: &str, parent: Option<NodeId>) -> Result<NodeId, AmlError> {
        let name = asl_name(name)?;
        let id = self.new_named(&SCOPE_OP, &name)?;
        self.link(id, parent)
    }

    /// `Device (name) {}`.
    ///
    /// # Errors
    ///
    /// As [`AmlTree::scope`].
    pub fn device(&mut self, name: &str, parent: Option<NodeId>) -> Result<NodeId, AmlError> {
        let name = asl_name(name)?;
        let id = self.new_named(&DEVICE_OP, &name)?;
        self.link(id, parent)
    }

    /// `ThermalZone (name) {}`.
    ///
    /// # Errors
    ///
    /// As [`AmlTree::scope`].
    pub fn thermal_zone(&mut self, name: &str, parent: Option<NodeId>) -> Result<NodeId, AmlError> {
        let name = asl_name(name)?;
        let id = self.new_named(&THERMAL_ZONE_OP, &name)?;
        self.link(id, parent)
    }

    // ─── Named objects ──────────────────────────────────────────────────────

    /// `Name (name, value)` with the smallest integer encoding.
    ///
    /// # Errors
    ///
    /// As [`AmlTree::scope`].
    pub fn name_integer(&mut self, name: &str, value: u64, parent: Option<NodeId>) -> Result<NodeId, AmlError> {
        let name = asl_name(name)?;
        let value = self.new_integer(value)?;
        let id = self.new_name_op(&name, value)?;
        self.link(id, parent)
    }

    /// `Name (name, "text")`.
    ///
    /// # Errors
    ///
    /// [`AmlError::OutOfRange`] if `text` is not ASCII or holds a NUL,
    /// otherwise as [`AmlTree::scope`].
    pub fn name_string(&mut self, name: &str, text: &str, parent: Option<NodeId>) -> Result<NodeId, AmlError> {
        let name = asl_name(name)?;
        let value = self.new_string(text)?;
        let id = self.new_name_op(&name, value)?;
        self.link(id, parent)
    }

    /// `Name (name, Unicode ("text"))`: a buffer of NUL-terminated UTF-16LE.
    ///
    /// # Errors
    ///
    /// [`AmlError::OutOfRange`] if `text` holds a NUL, otherwise as
    /// [`AmlTree::scope`].
    pub fn name_unicode_string(
        &mut self,
        name: &str,
        text: &str,
        parent: Option<NodeId>,
    ) -> Result<NodeId, AmlError> {
        let name = asl_name(name)?;
        if text.contains('\0') {
            return Err(AmlError::OutOfRange);
        }
        let mut bytes = Vec::new();
        bytes.try_reserve_exact((text.encode_utf16().count() + 1) * 2)?;
        for unit in text.encode_utf16().chain([0]) {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let value = self.new_raw_buffer(&bytes)?;
        let id = self.new_name_op(&name, value)?;
        self.link(id, parent)
    }

    /// `Name (name, EisaId ("PNP0A03"))`. The ID is always a `DWordConst`.
    ///
    /// # Errors
    ///
    /// [`AmlError::OutOfRange`] for a malformed EISA ID, otherwise as
    /// [`AmlTree::scope`].
    pub fn name_eisa_id(&mut self, name: &str, eisa_id: &str, parent: Option<NodeId>) -> Result<NodeId, AmlError> {
        let name = asl_name(name)?;
        let id: EisaId = eisa_id.parse()?;
        let value = self.new_object(&DWORD_OP)?;
        self.with_cleanup(value, |tree| {
            let raw = tree.new_data(DataType::UInt, &id.raw.to_le_bytes())?;
            tree.adopt_fixed(value, 0, raw)
        })?;
        let node = self.new_name_op(&name, value)?;
        self.link(node, parent)
    }

    /// `Name (name, Package () {})`. Elements are added by attaching to the
    /// package, reachable through [`AmlTree::name_op_value_node`].
    ///
    /// # Errors
    ///
    /// As [`AmlTree::scope`].
    pub fn name_package(&mut self, name: &str, parent: Option<NodeId>) -> Result<NodeId, AmlError> {
        let name = asl_name(name)?;
        let value = self.new_package()?;
        let id = self.new_name_op(&name, value)?;
        self.link(id, parent)
    }

    /// `Name (name, ResourceTemplate () {})`. Descriptors are added with the
    /// `rd_*` builders.
    ///
    /// # Errors
    ///
    /// As [`AmlTree::scope`].
    pub fn name_resource_template(&mut self, name: &str, parent: Option<NodeId>) -> Result<NodeId, AmlError> {
        let name = asl_name(name)?;
        let value = self.new_resource_template()?;
        let id = self.new_name_op(&name, value)?;
        self.link(id, parent)
    }

    // ─── Methods ────────────────────────────────────────────────────────────

    /// `Method (name, flags) { Return (value) }`. `value` is consumed even
    /// on failure.
    fn method_returning(&mut self, name: &NameString, flags: u8, value: NodeId) -> Result<NodeId, AmlError> {
        let ret = self.with_cleanup(value, |tree| {
            let ret = tree.new_object(&RETURN_OP)?;
            tree.with_cleanup(ret, |tree| tree.set_fixed_argument(ret, 0, value))?;
            Ok(ret)
        })?;
        self.with_cleanup(ret, |tree| {
            let method = tree.new_named(&METHOD_OP, name)?;
            tree.with_cleanup(method, |tree| {
                let flags = tree.new_data(DataType::UInt, &[flags])?;
                tree.adopt_fixed(method, 1, flags)?;
                tree.attach_node(method, ret)
            })?;
            Ok(method)
        })
    }

    /// `Method (name, num_args, Serialized|NotSerialized, sync_level) {
    /// Return (value) }`.
    ///
    /// # Errors
    ///
    /// [`AmlError::OutOfRange`] if `num_args` exceeds 7 or `sync_level`
    /// exceeds 15, otherwise as [`AmlTree::scope`].
    pub fn method_ret_integer(
        &mut self,
        name: &str,
        value: u64,
        num_args: u8,
        serialized: bool,
        sync_level: u8,
        parent: Option<NodeId>,
    ) -> Result<NodeId, AmlError> {
        let flags = method_flags(num_args, serialized, sync_level)?;
        let name = asl_name(name)?;
        let value = self.new_integer(value)?;
        let id = self.method_returning(&name, flags, value)?;
        self.link(id, parent)
    }

    /// As [`AmlTree::method_ret_integer`], returning a reference to the
    /// object named `return_name`.
    ///
    /// # Errors
    ///
    /// As [`AmlTree::method_ret_integer`].
    pub fn method_ret_name_string(
        &mut self,
        name: &str,
        return_name: &str,
        num_args: u8,
        serialized: bool,
        sync_level: u8,
        parent: Option<NodeId>,
    ) -> Result<NodeId, AmlError> {
        let flags = method_flags(num_args, serialized, sync_level)?;
        let name = asl_name(name)?;
        let return_name = asl_name(return_name)?;
        let value = self.new_name_reference(&return_name)?;
        let id = self.method_returning(&name, flags, value)?;
        self.link(id, parent)
    }

    /// `name (args...)`: a call of the method `name`. The detached `args`
    /// become the call's arguments, in order.
    ///
    /// # Errors
    ///
    /// - [`AmlError::OutOfRange`] for more than 7 arguments.
    /// - [`AmlError::NodeAttached`] if an argument already has a parent.
    /// - Otherwise as [`AmlTree::scope`].
    pub fn invoke_method(&mut self, name: &str, args: &[NodeId], parent: Option<NodeId>) -> Result<NodeId, AmlError> {
        if args.len() > usize::from(MAX_METHOD_ARGS) {
            return Err(AmlError::OutOfRange);
        }
        let name = asl_name(name)?;
        for &arg in args {
            if self.parent(arg)?.is_some() {
                return Err(AmlError::NodeAttached);
            }
        }
        let id = self.new_named(&METHOD_INVOCATION_OP, &name)?;
        let mut adopted = 0;
        let mut result = Ok(());
        for &arg in args {
            result = self.attach_node(id, arg);
            if result.is_err() {
                break;
            }
            adopted += 1;
        }
        if let (Ok(()), Some(parent)) = (&result, parent) {
            result = self.attach_node(parent, id);
        }
        if let Err(err) = result {
            // The caller keeps its argument nodes.
            for &arg in &args[..adopted] {
                self.detach_node(arg)?;
            }
            self.delete_tree(id)?;
            return Err(err);
        }
        Ok(id)
    }
}
