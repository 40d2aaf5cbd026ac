//! Human-readable tree dumps.

use core::fmt::{self, Write};

use crate::name::NameString;
use crate::node::{AmlNode, AmlTree, DataType, NodeId};
use crate::opcode::{NAME_REFERENCE_OP, STRING_OP};
use crate::resource;
use crate::visitor::{AmlVisitor, WalkAction};

/// Indented outline of a branch, one object per line.
///
/// ```text
/// DefinitionBlock SSDT "HADRON" "TEST" rev 2
///   Device COM0
///     Name _HID
///       DWordConst 0x0105D041
/// ```
#[derive(Clone, Copy)]
pub struct TreeDisplay<'a> {
    tree: &'a AmlTree,
    node: NodeId,
}

impl<'a> TreeDisplay<'a> {
    /// Dumps the branch rooted at `node`.
    #[must_use]
    pub fn new(tree: &'a AmlTree, node: NodeId) -> Self {
        Self { tree, node }
    }
}

impl fmt::Display for TreeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut printer = Printer { out: f, result: Ok(()), stale: false };
        if self.tree.walk(self.node, &mut printer).is_err() || printer.stale {
            return printer.out.write_str("<invalid node>\n");
        }
        printer.result
    }
}

struct Printer<'a, 'b> {
    out: &'a mut fmt::Formatter<'b>,
    result: fmt::Result,
    stale: bool,
}

impl Printer<'_, '_> {
    fn line(&mut self, tree: &AmlTree, node: NodeId, depth: usize) -> fmt::Result {
        write!(self.out, "{:width$}", "", width = depth * 2)?;
        match tree.node(node).map_err(|_| fmt::Error)? {
            AmlNode::Root(root) => {
                let h = &root.header;
                let sig = h.signature();
                write!(
                    self.out,
                    "DefinitionBlock {} \"{}\" \"{}\" rev {}",
                    ascii(&sig),
                    ascii(&h.oem_id),
                    ascii(&h.oem_table_id),
                    h.revision,
                )?;
            }
            AmlNode::Object(object) => {
                let encoding = object.encoding();
                self.out.write_str(encoding.name)?;
                if let Ok(name) = tree.defined_name(node) {
                    write!(self.out, " {name}")?;
                } else if encoding.is_integer() {
                    if let Ok(value) = tree.integer_value(node) {
                        write!(self.out, " {value:#X}")?;
                    }
                } else if *encoding == STRING_OP || *encoding == NAME_REFERENCE_OP || encoding.is_pseudo() {
                    if let Some(Ok(arg)) = object.fixed_argument(0).map(|arg| tree.data(arg)) {
                        match arg.data_type() {
                            DataType::String => write!(self.out, " \"{}\"", arg.string().unwrap_or(""))?,
                            DataType::NameString => {
                                if let Ok(name) = NameString::from_aml(arg.buffer()) {
                                    write!(self.out, " {name}")?;
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
            AmlNode::Data(data) => match data.data_type() {
                DataType::ResourceData => match resource::decode_descriptor(data.buffer()) {
                    Some(decoded) => write!(self.out, "{decoded:?}")?,
                    None => write!(self.out, "ResourceData {:02X?}", data.buffer())?,
                },
                _ => write!(self.out, "{:?} {:02X?}", data.data_type(), data.buffer())?,
            },
        }
        self.out.write_char('\n')
    }
}

impl AmlVisitor for Printer<'_, '_> {
    fn enter(&mut self, tree: &AmlTree, node: NodeId, depth: usize) -> WalkAction {
        let Ok(entry) = tree.node(node) else {
            self.stale = true;
            return WalkAction::Stop;
        };
        // Scalar arguments are already shown on their object's line.
        if let AmlNode::Data(data) = entry {
            if !matches!(data.data_type(), DataType::ResourceData | DataType::Raw) {
                return WalkAction::SkipChildren;
            }
        }
        self.result = self.line(tree, node, depth);
        if self.result.is_err() {
            return WalkAction::Stop;
        }
        match entry {
            // Integer and string payloads were printed inline.
            AmlNode::Object(object) if object.encoding().is_integer() || *object.encoding() == STRING_OP => {
                WalkAction::SkipChildren
            }
            _ => WalkAction::Continue,
        }
    }
}

fn ascii(bytes: &[u8]) -> &str {
    core::str::from_utf8(bytes).unwrap_or("????").trim_end_matches(['\0', ' '])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::{DEVICE_OP, NAME_OP};
    use crate::sdt::{SSDT_SIGNATURE, SdtHeader};
    use std::string::ToString;

    #[test]
    fn dumps_outline() {
        let mut tree = AmlTree::new();
        let root = tree
            .new_root(SdtHeader::new_definition_block(SSDT_SIGNATURE, "HADRON", "TEST", 1).unwrap())
            .unwrap();
        let device = tree.new_object(&DEVICE_OP).unwrap();
        let name = tree.new_name_string(&NameString::from_asl("COM0").unwrap()).unwrap();
        tree.set_fixed_argument(device, 0, name).unwrap();
        tree.attach_node(root, device).unwrap();

        let uid = tree.new_object(&NAME_OP).unwrap();
        let seg = tree.new_name_string(&NameString::from_asl("_UID").unwrap()).unwrap();
        let value = tree.new_integer(0x12).unwrap();
        tree.set_fixed_argument(uid, 0, seg).unwrap();
        tree.set_fixed_argument(uid, 1, value).unwrap();
        tree.attach_node(device, uid).unwrap();

        let text = TreeDisplay::new(&tree, root).to_string();
        let lines: std::vec::Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "DefinitionBlock SSDT \"HADRON\" \"TEST\" rev 2");
        assert_eq!(lines[1], "  Device COM0");
        assert_eq!(lines[2], "    Name _UID");
        assert_eq!(lines[3], "      ByteConst 0x12");
        assert_eq!(lines.len(), 4);
    }
}
