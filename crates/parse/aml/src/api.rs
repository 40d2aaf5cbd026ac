//! In-place updates and typed queries on well-known object shapes.
//!
//! These helpers take a handle to an object that has already been located
//! (typically with [`AmlTree::find_node`]) and read or rewrite the payload
//! of the right child, checking that the stored type matches.

use alloc::string::String;
use alloc::vec::Vec;

use crate::AmlError;
use crate::name::{NameSeg, NameString};
use crate::node::{AmlTree, DataType, NodeId};
use crate::opcode::{BUFFER_OP, DEVICE_OP, DWORD_OP, NAME_OP, PACKAGE_OP, STRING_OP, VAR_PACKAGE_OP};
use crate::resource::{self, EXTENDED_IRQ_TAG, QWORD_ADDRESS_TAG};
use crate::tree::{ArgPosition, string_payload};
use crate::value::{AmlValue, EisaId};

/// Offset of the first interrupt number in an Extended Interrupt descriptor.
const EXTENDED_IRQ_FIRST_OFFSET: usize = 5;
/// Offset of the minimum address in a QWord address space descriptor.
const QWORD_MIN_OFFSET: usize = 14;
/// Offset of the maximum address in a QWord address space descriptor.
const QWORD_MAX_OFFSET: usize = 22;
/// Offset of the range length in a QWord address space descriptor.
const QWORD_LENGTH_OFFSET: usize = 38;

impl AmlTree {
    fn check_encoding(
        &self,
        node: NodeId,
        expected: &crate::opcode::AmlByteEncoding,
    ) -> Result<(), AmlError> {
        if self.encoding(node)? == expected { Ok(()) } else { Err(AmlError::TypeMismatch) }
    }

    /// Value object (second fixed argument) of a `Name` object.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::TypeMismatch`] if `name_op` is not a `Name`.
    pub fn name_op_value_node(&self, name_op: NodeId) -> Result<NodeId, AmlError> {
        self.check_encoding(name_op, &NAME_OP)?;
        self.fixed_argument(name_op, 1)?.ok_or(AmlError::TypeMismatch)
    }

    /// Renames a `Device`.
    ///
    /// # Errors
    ///
    /// - [`AmlError::TypeMismatch`] if `device` is not a `Device`.
    /// - [`AmlError::InvalidNameString`] if `name` is not a valid ASL name.
    pub fn device_op_update_name(&mut self, device: NodeId, name: &str) -> Result<(), AmlError> {
        self.check_encoding(device, &DEVICE_OP)?;
        let encoded = NameString::from_asl(name)?.encode()?;
        let slot = self.fixed_argument(device, 0)?.ok_or(AmlError::TypeMismatch)?;
        let data = self.data_mut(slot)?;
        if data.data_type() != DataType::NameString {
            return Err(AmlError::TypeMismatch);
        }
        data.buffer = encoded;
        Ok(())
    }

    /// Sets the value of an integer `Name`, re-encoding it in the smallest
    /// form. The value node keeps its handle.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::TypeMismatch`] unless `name_op` is a `Name` whose
    /// value is already an integer.
    pub fn name_op_update_integer(&mut self, name_op: NodeId, value: u64) -> Result<(), AmlError> {
        let node = self.name_op_value_node(name_op)?;
        self.set_integer_value(node, value)
    }

    /// Sets the value of a string `Name`.
    ///
    /// # Errors
    ///
    /// - [`AmlError::TypeMismatch`] unless `name_op` is a `Name` whose value
    ///   is already a string.
    /// - [`AmlError::OutOfRange`] if `text` is not ASCII or contains a NUL.
    pub fn name_op_update_string(&mut self, name_op: NodeId, text: &str) -> Result<(), AmlError> {
        let node = self.name_op_value_node(name_op)?;
        self.check_encoding(node, &STRING_OP)?;
        let payload = string_payload(text)?;
        let slot = self.fixed_argument(node, 0)?.ok_or(AmlError::TypeMismatch)?;
        self.data_mut(slot)?.buffer = payload;
        Ok(())
    }

    /// Integer value of a `Name`.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::TypeMismatch`] unless the value is an integer.
    pub fn name_op_get_integer(&self, name_op: NodeId) -> Result<u64, AmlError> {
        self.integer_value(self.name_op_value_node(name_op)?)
    }

    /// String value of a `Name`.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::TypeMismatch`] unless the value is a string.
    pub fn name_op_get_string(&self, name_op: NodeId) -> Result<&str, AmlError> {
        let node = self.name_op_value_node(name_op)?;
        self.check_encoding(node, &STRING_OP)?;
        let slot = self.fixed_argument(node, 0)?.ok_or(AmlError::TypeMismatch)?;
        self.data(slot)?.string().ok_or(AmlError::TypeMismatch)
    }

    /// Typed value of a `Name`. `_HID` and `_CID` DWords that decode as
    /// EISA IDs are reported as [`AmlValue::EisaId`].
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::TypeMismatch`] if `name_op` is not a `Name`.
    pub fn name_op_value(&self, name_op: NodeId) -> Result<AmlValue, AmlError> {
        let node = self.name_op_value_node(name_op)?;
        let encoding = self.encoding(node)?;

        if encoding.is_integer() {
            let value = self.integer_value(node)?;
            let seg = self.defined_seg(name_op)?;
            if *encoding == DWORD_OP && (seg == NameSeg(*b"_HID") || seg == NameSeg(*b"_CID")) {
                let id = EisaId { raw: value as u32 };
                if id.is_well_formed() {
                    return Ok(AmlValue::EisaId(id));
                }
            }
            return Ok(AmlValue::Integer(value));
        }
        if *encoding == STRING_OP {
            let text = self.name_op_get_string(name_op)?;
            let mut owned = String::new();
            owned.try_reserve_exact(text.len())?;
            owned.push_str(text);
            return Ok(AmlValue::String(owned));
        }
        if *encoding == BUFFER_OP {
            let mut bytes = Vec::new();
            for &child in self.variable_args(node)? {
                let data = self.data(child)?.buffer();
                bytes.try_reserve(data.len())?;
                bytes.extend_from_slice(data);
            }
            return Ok(AmlValue::Buffer(bytes));
        }
        if *encoding == PACKAGE_OP || *encoding == VAR_PACKAGE_OP {
            return Ok(AmlValue::Package(self.variable_args(node)?.len()));
        }
        Ok(AmlValue::Unresolved)
    }

    // ─── Resource data ──────────────────────────────────────────────────────

    /// First resource descriptor of a `Name (_CRS, ResourceTemplate () {...})`.
    ///
    /// Returns `Ok(None)` for an empty template. The End Tag is never
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::TypeMismatch`] unless `name_op` is a `Name` whose
    /// value is a Buffer holding resource descriptors.
    pub fn name_op_get_first_rd_node(&self, name_op: NodeId) -> Result<Option<NodeId>, AmlError> {
        let buffer = self.name_op_value_node(name_op)?;
        self.check_encoding(buffer, &BUFFER_OP)?;
        match self.variable_args(buffer)?.first() {
            Some(&first) => self.rd_or_end(first),
            None => Ok(None),
        }
    }

    /// Resource descriptor following `rd_node`, or `Ok(None)` when the next
    /// one is the End Tag or there is none.
    ///
    /// # Errors
    ///
    /// - [`AmlError::TypeMismatch`] if `rd_node` is not a resource
    ///   descriptor.
    /// - [`AmlError::NodeNotAttached`] if it is not in a byte list.
    pub fn name_op_get_next_rd_node(&self, rd_node: NodeId) -> Result<Option<NodeId>, AmlError> {
        if self.data(rd_node)?.data_type() != DataType::ResourceData {
            return Err(AmlError::TypeMismatch);
        }
        let Some((parent, ArgPosition::Variable(index))) = self.argument_position(rd_node)? else {
            return Err(AmlError::NodeNotAttached);
        };
        match self.variable_args(parent)?.get(index + 1) {
            Some(&next) => self.rd_or_end(next),
            None => Ok(None),
        }
    }

    fn rd_or_end(&self, node: NodeId) -> Result<Option<NodeId>, AmlError> {
        let data = self.data(node)?;
        if data.data_type() != DataType::ResourceData {
            return Err(AmlError::TypeMismatch);
        }
        Ok((!resource::is_end_tag(data.buffer())).then_some(node))
    }

    fn rd_buffer_mut(&mut self, rd_node: NodeId, tag: u8, min_len: usize) -> Result<&mut [u8], AmlError> {
        let data = self.data_mut(rd_node)?;
        if data.data_type != DataType::ResourceData
            || data.buffer.first() != Some(&tag)
            || data.buffer.len() < min_len
        {
            return Err(AmlError::TypeMismatch);
        }
        Ok(&mut data.buffer)
    }

    /// Sets the first interrupt number of an Extended Interrupt descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::TypeMismatch`] if `rd_node` is not an Extended
    /// Interrupt descriptor.
    pub fn update_rd_interrupt(&mut self, rd_node: NodeId, irq: u32) -> Result<(), AmlError> {
        let end = EXTENDED_IRQ_FIRST_OFFSET + 4;
        let buffer = self.rd_buffer_mut(rd_node, EXTENDED_IRQ_TAG, end)?;
        buffer[EXTENDED_IRQ_FIRST_OFFSET..end].copy_from_slice(&irq.to_le_bytes());
        Ok(())
    }

    /// Moves a QWord address space descriptor to `base` with `length` bytes:
    /// minimum, maximum and length are rewritten.
    ///
    /// # Errors
    ///
    /// - [`AmlError::TypeMismatch`] if `rd_node` is not a QWord descriptor.
    /// - [`AmlError::OutOfRange`] for a zero length or a range past 2^64.
    pub fn update_rd_qword(&mut self, rd_node: NodeId, base: u64, length: u64) -> Result<(), AmlError> {
        let max = length
            .checked_sub(1)
            .and_then(|span| base.checked_add(span))
            .ok_or(AmlError::OutOfRange)?;
        let buffer = self.rd_buffer_mut(rd_node, QWORD_ADDRESS_TAG, QWORD_LENGTH_OFFSET + 8)?;
        buffer[QWORD_MIN_OFFSET..QWORD_MIN_OFFSET + 8].copy_from_slice(&base.to_le_bytes());
        buffer[QWORD_MAX_OFFSET..QWORD_MAX_OFFSET + 8].copy_from_slice(&max.to_le_bytes());
        buffer[QWORD_LENGTH_OFFSET..QWORD_LENGTH_OFFSET + 8].copy_from_slice(&length.to_le_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_definition_block;
    use crate::resource::{AcpiResource, decode_descriptor};
    use crate::sdt::{self, SSDT_SIGNATURE, SdtHeader};
    use crate::serialize::serialize_definition_block;
    use std::string::ToString;
    use std::vec;

    fn table(body: &[u8]) -> Vec<u8> {
        let mut header = SdtHeader::new_definition_block(SSDT_SIGNATURE, "HADRON", "TEST", 1).unwrap();
        header.length = (SdtHeader::SIZE + body.len()) as u32;
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend_from_slice(body);
        sdt::update_checksum(&mut bytes);
        bytes
    }

    // Device (COM0) {
    //     Name (_HID, EisaId ("PNP0501"))
    //     Name (_UID, 1)
    //     Name (_STR, "UART")
    //     Name (_CRS, ResourceTemplate () { IO (...), IRQNoFlags () {4} })
    // }
    fn com0() -> (AmlTree, NodeId) {
        let mut body = vec![0x5B, 0x82, 0x00, b'C', b'O', b'M', b'0'];
        body.extend_from_slice(&[0x08, b'_', b'H', b'I', b'D', 0x0C, 0x41, 0xD0, 0x05, 0x01]);
        body.extend_from_slice(&[0x08, b'_', b'U', b'I', b'D', 0x01]);
        body.extend_from_slice(&[0x08, b'_', b'S', b'T', b'R', 0x0D, b'U', b'A', b'R', b'T', 0x00]);
        body.extend_from_slice(&[
            0x08, b'_', b'C', b'R', b'S', 0x11, 0x10, 0x0A, 0x0D, //
            0x47, 0x01, 0xF8, 0x03, 0xF8, 0x03, 0x01, 0x08, //
            0x22, 0x10, 0x00, 0x79, 0x00,
        ]);
        body[2] = (body.len() - 2) as u8;
        let tree = parse_definition_block(&table(&body)).unwrap();
        let device = tree.variable_args(tree.root().unwrap()).unwrap()[0];
        (tree, device)
    }

    #[test]
    fn typed_getters() {
        let (tree, device) = com0();
        let hid = tree.find_node(device, "_HID").unwrap().unwrap();
        let uid = tree.find_node(device, "_UID").unwrap().unwrap();
        let name = tree.find_node(device, "_STR").unwrap().unwrap();
        assert_eq!(tree.name_op_value(hid).unwrap(), AmlValue::EisaId("PNP0501".parse().unwrap()));
        assert_eq!(tree.name_op_get_integer(uid), Ok(1));
        assert_eq!(tree.name_op_value(uid), Ok(AmlValue::Integer(1)));
        assert_eq!(tree.name_op_get_string(name), Ok("UART"));
        assert_eq!(tree.name_op_value(name), Ok(AmlValue::String("UART".to_string())));
        assert_eq!(tree.name_op_get_string(uid), Err(AmlError::TypeMismatch));
        assert_eq!(tree.name_op_get_integer(device), Err(AmlError::TypeMismatch));
    }

    #[test]
    fn updates_in_place() {
        let (mut tree, device) = com0();
        let uid = tree.find_node(device, "_UID").unwrap().unwrap();
        let value = tree.name_op_value_node(uid).unwrap();
        tree.name_op_update_integer(uid, 0x1_0000).unwrap();
        assert_eq!(tree.name_op_value_node(uid), Ok(value));
        assert_eq!(tree.name_op_get_integer(uid), Ok(0x1_0000));

        let name = tree.find_node(device, "_STR").unwrap().unwrap();
        assert_eq!(tree.name_op_update_integer(name, 3), Err(AmlError::TypeMismatch));
        tree.name_op_update_string(name, "COM PORT").unwrap();
        assert_eq!(tree.name_op_get_string(name), Ok("COM PORT"));
        assert_eq!(tree.name_op_update_string(uid, "X"), Err(AmlError::TypeMismatch));

        tree.device_op_update_name(device, "COM1").unwrap();
        let root = tree.root().unwrap();
        assert_eq!(tree.find_node(root, "\\COM1._UID"), Ok(Some(uid)));
        assert_eq!(tree.device_op_update_name(device, "com1"), Err(AmlError::InvalidNameString));

        // The edited tree still serializes to a parseable table.
        let bytes = serialize_definition_block(&tree).unwrap();
        let reparsed = parse_definition_block(&bytes).unwrap();
        let uid = reparsed.find_node(reparsed.root().unwrap(), "\\COM1._UID").unwrap().unwrap();
        assert_eq!(reparsed.name_op_get_integer(uid), Ok(0x1_0000));
    }

    #[test]
    fn resource_iteration_skips_end_tag() {
        let (tree, device) = com0();
        let crs = tree.find_node(device, "_CRS").unwrap().unwrap();
        let first = tree.name_op_get_first_rd_node(crs).unwrap().unwrap();
        let second = tree.name_op_get_next_rd_node(first).unwrap().unwrap();
        assert_eq!(tree.name_op_get_next_rd_node(second), Ok(None));
        assert_eq!(
            decode_descriptor(tree.data(first).unwrap().buffer()),
            Some(AcpiResource::Io { base: 0x3F8, length: 8 })
        );
        let uid = tree.find_node(device, "_UID").unwrap().unwrap();
        assert_eq!(tree.name_op_get_first_rd_node(uid), Err(AmlError::TypeMismatch));
    }

    #[test]
    fn descriptor_updates_check_tags() {
        let (mut tree, device) = com0();
        let crs = tree.find_node(device, "_CRS").unwrap().unwrap();
        let io = tree.name_op_get_first_rd_node(crs).unwrap().unwrap();
        assert_eq!(tree.update_rd_interrupt(io, 5), Err(AmlError::TypeMismatch));
        assert_eq!(tree.update_rd_qword(io, 0, 0x1000), Err(AmlError::TypeMismatch));

        let mut qword = vec![QWORD_ADDRESS_TAG, 0x2B, 0x00, 0x00, 0x0C, 0x03];
        qword.resize(46, 0);
        let rd = tree.new_data(DataType::ResourceData, &qword).unwrap();
        assert_eq!(tree.update_rd_qword(rd, 0x8000_0000, 0), Err(AmlError::OutOfRange));
        tree.update_rd_qword(rd, 0x8000_0000, 0x1000).unwrap();
        assert_eq!(
            decode_descriptor(tree.data(rd).unwrap().buffer()),
            Some(AcpiResource::Memory64 { base: 0x8000_0000, length: 0x1000, writable: true })
        );

        let irq = [EXTENDED_IRQ_TAG, 0x06, 0x00, 0x0B, 0x01, 0x20, 0x00, 0x00, 0x00];
        let rd = tree.new_data(DataType::ResourceData, &irq).unwrap();
        tree.update_rd_interrupt(rd, 0x45).unwrap();
        assert_eq!(&tree.data(rd).unwrap().buffer()[5..9], &[0x45, 0, 0, 0]);
    }
}
