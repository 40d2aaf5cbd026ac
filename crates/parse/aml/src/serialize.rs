//! AML serializer.
//!
//! Serialization runs in two passes over the branch being written:
//!
//! 1. A post-order size pass fills a table, indexed by arena slot, with the
//!    encoded size of every node.
//! 2. A pre-order emit pass writes opcode bytes, PkgLengths taken from the
//!    size table, then fixed and variable arguments in order.
//!
//! The output buffer is reserved once at the exact total size.

use alloc::vec;
use alloc::vec::Vec;

use log::debug;

use crate::AmlError;
use crate::node::{AmlNode, AmlTree, NodeId};
use crate::opcode::OpAttributes;
use crate::sdt::{self, SdtHeader};
use crate::stream::AmlStreamMut;
use crate::visitor::{AmlVisitor, WalkAction};

/// Largest value a 4-byte PkgLength can hold.
pub const MAX_PKG_LENGTH: usize = 0x0FFF_FFFF;

/// Width in bytes of the PkgLength for `content` bytes of body, no smaller
/// than `min_width`.
///
/// # Errors
///
/// Returns [`AmlError::PkgLengthOverflow`] if the length does not fit in
/// 28 bits.
pub fn pkg_length_width(content: usize, min_width: u8) -> Result<u8, AmlError> {
    let limits = [(1u8, 0x3F), (2, 0xFFF), (3, 0xF_FFFF), (4, MAX_PKG_LENGTH)];
    limits
        .into_iter()
        .find(|&(width, limit)| width >= min_width && content + usize::from(width) <= limit)
        .map(|(width, _)| width)
        .ok_or(AmlError::PkgLengthOverflow)
}

/// Encodes `value`, which already counts its own width, as a PkgLength of
/// `width` bytes.
fn encode_pkg_length(value: usize, width: u8) -> ([u8; 4], usize) {
    let mut raw = [0u8; 4];
    if width == 1 {
        raw[0] = value as u8;
    } else {
        raw[0] = ((width - 1) << 6) | (value & 0x0F) as u8;
        for (i, byte) in raw[1..usize::from(width)].iter_mut().enumerate() {
            *byte = (value >> (4 + 8 * i)) as u8;
        }
    }
    (raw, usize::from(width))
}

/// Serializes the tree's root into a complete definition block, with the
/// header length and checksum recomputed.
///
/// # Errors
///
/// - [`AmlError::InvalidNode`] if the tree has no root.
/// - [`AmlError::PkgLengthOverflow`] if a scope is too large to encode.
/// - [`AmlError::OutOfResources`] if the output cannot be allocated.
pub fn serialize_definition_block(tree: &AmlTree) -> Result<Vec<u8>, AmlError> {
    let root = tree.root().ok_or(AmlError::InvalidNode)?;
    serialize_node(tree, root)
}

/// Serializes the branch at `node`.
///
/// For the root this is the complete definition block; any other node
/// yields its AML encoding alone.
///
/// # Errors
///
/// As [`serialize_definition_block`].
pub fn serialize_node(tree: &AmlTree, node: NodeId) -> Result<Vec<u8>, AmlError> {
    let mut sizer = Sizer { sizes: Vec::new(), error: None };
    sizer.sizes.try_reserve_exact(tree.slot_count())?;
    sizer.sizes.resize(tree.slot_count(), 0);
    tree.walk(node, &mut sizer)?;
    if let Some(err) = sizer.error {
        return Err(err);
    }
    let total = sizer.sizes[node.index()];

    let mut out = Vec::new();
    out.try_reserve_exact(total)?;
    out.resize(total, 0);

    let mut emitter = Emitter {
        out: AmlStreamMut::new(&mut out),
        sizes: &sizer.sizes,
        error: None,
    };
    tree.walk(node, &mut emitter)?;
    if let Some(err) = emitter.error {
        return Err(err);
    }
    if emitter.out.position() != total {
        return Err(AmlError::BufferTooSmall);
    }

    if matches!(tree.node(node)?, AmlNode::Root(_)) {
        let length = u32::try_from(total).map_err(|_| AmlError::BufferTooSmall)?;
        out[4..8].copy_from_slice(&length.to_le_bytes());
        sdt::update_checksum(&mut out);
    }
    debug!("aml: serialized {} bytes", total);
    Ok(out)
}

/// Post-order size pass.
struct Sizer {
    sizes: Vec<usize>,
    error: Option<AmlError>,
}

impl Sizer {
    fn children_size(&self, tree: &AmlTree, node: NodeId) -> Result<usize, AmlError> {
        tree.node(node)?
            .children()
            .try_fold(0usize, |sum, child| sum.checked_add(self.sizes[child.index()]))
            .ok_or(AmlError::BufferTooSmall)
    }

    fn size_of(&self, tree: &AmlTree, node: NodeId) -> Result<usize, AmlError> {
        let content = self.children_size(tree, node)?;
        match tree.node(node)? {
            AmlNode::Data(data) => Ok(data.buffer().len()),
            AmlNode::Root(_) => Ok(SdtHeader::SIZE + content),
            AmlNode::Object(object) => {
                let encoding = object.encoding();
                let mut size = encoding.opcode_size() + content;
                if encoding.attributes.contains(OpAttributes::HAS_PKG_LENGTH) {
                    size += usize::from(pkg_length_width(content, object.pkg_len_hint())?);
                }
                Ok(size)
            }
        }
    }
}

impl AmlVisitor for Sizer {
    fn enter(&mut self, _tree: &AmlTree, _node: NodeId, _depth: usize) -> WalkAction {
        if self.error.is_some() { WalkAction::Stop } else { WalkAction::Continue }
    }

    fn exit(&mut self, tree: &AmlTree, node: NodeId, _depth: usize) {
        if self.error.is_some() {
            return;
        }
        match self.size_of(tree, node) {
            Ok(size) => self.sizes[node.index()] = size,
            Err(err) => self.error = Some(err),
        }
    }
}

/// Pre-order emit pass.
struct Emitter<'a> {
    out: AmlStreamMut<'a>,
    sizes: &'a [usize],
    error: Option<AmlError>,
}

impl Emitter<'_> {
    fn emit(&mut self, tree: &AmlTree, node: NodeId) -> Result<(), AmlError> {
        match tree.node(node)? {
            AmlNode::Data(data) => self.out.write_bytes(data.buffer()),
            // Length and checksum are patched once the body is written.
            AmlNode::Root(root) => self.out.write_bytes(&root.header.to_bytes()),
            AmlNode::Object(object) => {
                let encoding = object.encoding();
                match encoding.opcode_size() {
                    0 => {}
                    1 => self.out.write_byte(encoding.op)?,
                    _ => self.out.write_bytes(&[encoding.op, encoding.sub_op])?,
                }
                if encoding.attributes.contains(OpAttributes::HAS_PKG_LENGTH) {
                    let content = tree
                        .node(node)?
                        .children()
                        .map(|child| self.sizes[child.index()])
                        .sum::<usize>();
                    let width = pkg_length_width(content, object.pkg_len_hint())?;
                    let (raw, len) = encode_pkg_length(content + usize::from(width), width);
                    self.out.write_bytes(&raw[..len])?;
                }
                Ok(())
            }
        }
    }
}

impl AmlVisitor for Emitter<'_> {
    fn enter(&mut self, tree: &AmlTree, node: NodeId, _depth: usize) -> WalkAction {
        match self.emit(tree, node) {
            Ok(()) => WalkAction::Continue,
            Err(err) => {
                self.error = Some(err);
                WalkAction::Stop
            }
        }
    }
}

/// Encodes a field-element PkgLength (a bit count that does not count its
/// own bytes) in the smallest width.
///
/// # Errors
///
/// Returns [`AmlError::PkgLengthOverflow`] for values above 2^28 - 1.
pub fn encode_field_length(value: usize) -> Result<Vec<u8>, AmlError> {
    let width: u8 = match value {
        0..=0x3F => 1,
        0x40..=0xFFF => 2,
        0x1000..=0xF_FFFF => 3,
        0x10_0000..=MAX_PKG_LENGTH => 4,
        _ => return Err(AmlError::PkgLengthOverflow),
    };
    let (raw, len) = encode_pkg_length(value, width);
    let mut bytes = vec![];
    bytes.try_reserve_exact(len)?;
    bytes.extend_from_slice(&raw[..len]);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::NameString;
    use crate::opcode::NAME_OP;
    use crate::parser::{self, read_pkg_length};
    use crate::sdt::SSDT_SIGNATURE;
    use crate::stream::AmlStream;

    fn table(body: &[u8]) -> Vec<u8> {
        let mut header = SdtHeader::new_definition_block(SSDT_SIGNATURE, "HADRON", "TEST", 1).unwrap();
        header.length = (SdtHeader::SIZE + body.len()) as u32;
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend_from_slice(body);
        sdt::update_checksum(&mut bytes);
        bytes
    }

    fn round_trip(body: &[u8]) {
        let bytes = table(body);
        let tree = parser::parse_definition_block(&bytes).unwrap();
        assert_eq!(serialize_definition_block(&tree).unwrap(), bytes);
    }

    #[test]
    fn pkg_length_widths() {
        assert_eq!(pkg_length_width(0x3E, 0), Ok(1));
        assert_eq!(pkg_length_width(0x3F, 0), Ok(2));
        assert_eq!(pkg_length_width(0x10, 3), Ok(3));
        assert_eq!(pkg_length_width(0xFFD, 1), Ok(2));
        assert_eq!(pkg_length_width(0xFFE, 1), Ok(3));
        assert_eq!(pkg_length_width(0x0FFF_FFFB, 1), Ok(4));
        assert_eq!(pkg_length_width(0x0FFF_FFFC, 1), Err(AmlError::PkgLengthOverflow));
    }

    #[test]
    fn pkg_length_encoding_matches_decoder() {
        for (value, width) in [(0x05, 1), (0x1A, 2), (0x0ABC_DEF0, 4), (0x07, 2)] {
            let (raw, len) = encode_pkg_length(value, width);
            let mut stream = AmlStream::new(&raw[..len]);
            assert_eq!(read_pkg_length(&mut stream), Ok((value, width)));
        }
        assert_eq!(encode_field_length(8).unwrap(), [0x08]);
        assert_eq!(encode_field_length(0x100).unwrap(), [0x40, 0x10]);
    }

    #[test]
    fn round_trips() {
        // Scope (\_SB) { Device (CPU0) { Name (_UID, Zero) } }
        round_trip(&[
            0x10, 0x13, b'\\', b'_', b'S', b'B', b'_', 0x5B, 0x82, 0x0B, b'C', b'P', b'U', b'0', 0x08,
            b'_', b'U', b'I', b'D', 0x00,
        ]);
        // Non-minimal PkgLength: Scope (\_SB) {} with a 2-byte length.
        round_trip(&[0x10, 0x47, 0x00, b'\\', b'_', b'S', b'B', b'_']);
        // Name (_HID, "ACPI0007"), Method (_STA) { Return (0x0F) }
        round_trip(&[
            0x08, b'_', b'H', b'I', b'D', 0x0D, b'A', b'C', b'P', b'I', b'0', b'0', b'0', b'7', 0x00,
            0x14, 0x09, b'_', b'S', b'T', b'A', 0x00, 0xA4, 0x0A, 0x0F,
        ]);
        // Name (_CRS, ResourceTemplate () { IRQNoFlags () {4} })
        round_trip(&[0x08, b'_', b'C', b'R', b'S', 0x11, 0x08, 0x0A, 0x05, 0x22, 0x10, 0x00, 0x79, 0x00]);
    }

    #[test]
    fn large_buffers_use_wider_lengths() {
        // Name (BLOB, Buffer (0x50) { ... }) needs a 2-byte PkgLength.
        let mut body = vec![0x08, b'B', b'L', b'O', b'B', 0x11, 0x44, 0x05, 0x0A, 0x50];
        body.extend(core::iter::repeat_n(0xA5, 0x50));
        round_trip(&body);
    }

    #[test]
    fn single_nodes() {
        let mut tree = AmlTree::new();
        let name = tree.new_object(&NAME_OP).unwrap();
        let seg = tree.new_name_string(&NameString::from_asl("_UID").unwrap()).unwrap();
        tree.set_fixed_argument(name, 0, seg).unwrap();
        let value = tree.new_integer(0x1234).unwrap();
        tree.set_fixed_argument(name, 1, value).unwrap();
        assert_eq!(serialize_node(&tree, name).unwrap(), [0x08, b'_', b'U', b'I', b'D', 0x0B, 0x34, 0x12]);
        assert_eq!(serialize_definition_block(&tree), Err(AmlError::InvalidNode));
    }
}
