//! Structural edits: attach, detach, replace, clone, import and delete.
//!
//! Every operation validates its inputs before touching the tree, so a
//! failed call leaves the tree exactly as it was.
//!
//! Adding or removing a variable argument keeps the parent's declared size
//! in step: a `Package` NumElements byte, and the BufferSize or VarPackage
//! size when it is an integer constant.

use alloc::vec::Vec;

use crate::AmlError;
use crate::name::NameString;
use crate::node::{AmlNode, AmlTree, DataType, NodeId};
use crate::opcode::{
    self, AmlByteEncoding, BUFFER_OP, ONE_OP, OpAttributes, PACKAGE_OP, ParseFormat,
    STRING_OP, VAR_PACKAGE_OP, ZERO_OP,
};

/// Where a node sits inside its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgPosition {
    /// Fixed-argument slot index.
    Fixed(usize),
    /// Index in the variable-argument list.
    Variable(usize),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Terms,
    Bytes,
    Fields,
}

/// Returns the smallest integer opcode for `value` and its payload width.
pub(crate) fn integer_encoding_for(value: u64) -> (&'static AmlByteEncoding, Option<usize>) {
    match value {
        0 => (&ZERO_OP, None),
        1 => (&ONE_OP, None),
        v if v <= u64::from(u8::MAX) => (&opcode::BYTE_OP, Some(1)),
        v if v <= u64::from(u16::MAX) => (&opcode::WORD_OP, Some(2)),
        v if v <= u64::from(u32::MAX) => (&opcode::DWORD_OP, Some(4)),
        _ => (&opcode::QWORD_OP, Some(8)),
    }
}

impl AmlTree {
    // ─── Queries ────────────────────────────────────────────────────────────

    /// Returns the parent of `node` and the slot it occupies there.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidNode`] for stale handles.
    pub fn argument_position(&self, node: NodeId) -> Result<Option<(NodeId, ArgPosition)>, AmlError> {
        let Some(parent) = self.parent(node)? else {
            return Ok(None);
        };
        let position = match self.node(parent)? {
            AmlNode::Root(root) => root.children.iter().position(|&c| c == node).map(ArgPosition::Variable),
            AmlNode::Object(object) => object
                .fixed_args()
                .iter()
                .position(|&c| c == Some(node))
                .map(ArgPosition::Fixed)
                .or_else(|| object.variable_args.iter().position(|&c| c == node).map(ArgPosition::Variable)),
            AmlNode::Data(_) => None,
        };
        position.map(|p| Some((parent, p))).ok_or(AmlError::InvalidNode)
    }

    /// Returns `true` if `ancestor` is `node` or one of its ancestors.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidNode`] for stale handles.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> Result<bool, AmlError> {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return Ok(true);
            }
            current = self.parent(id)?;
        }
        Ok(false)
    }

    /// Value of an integer object (`Zero`, `One`, `Ones`, `ByteConst`, ...).
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::TypeMismatch`] if `node` is not an integer object.
    pub fn integer_value(&self, node: NodeId) -> Result<u64, AmlError> {
        let object = self.object(node)?;
        let encoding = object.encoding();
        if !encoding.is_integer() {
            return Err(AmlError::TypeMismatch);
        }
        match encoding.op {
            0x00 => Ok(0),
            0x01 => Ok(1),
            0xFF => Ok(u64::MAX),
            _ => {
                let data = object.fixed_argument(0).ok_or(AmlError::TypeMismatch)?;
                self.data(data)?.integer().ok_or(AmlError::TypeMismatch)
            }
        }
    }

    // ─── Node constructors ──────────────────────────────────────────────────

    /// Creates a detached integer object in its smallest encoding.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::OutOfResources`] if allocation fails.
    pub fn new_integer(&mut self, value: u64) -> Result<NodeId, AmlError> {
        let (encoding, width) = integer_encoding_for(value);
        let id = self.new_object(encoding)?;
        if let Some(width) = width {
            self.with_cleanup(id, |tree| {
                let data = tree.new_data(DataType::UInt, &value.to_le_bytes()[..width])?;
                tree.set_fixed_argument(id, 0, data)
            })?;
        }
        Ok(id)
    }

    /// Creates a detached `String` object holding a copy of `text`.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::OutOfRange`] if `text` is not ASCII or contains a
    /// NUL.
    pub fn new_string(&mut self, text: &str) -> Result<NodeId, AmlError> {
        let payload = string_payload(text)?;
        let id = self.new_object(&STRING_OP)?;
        self.with_cleanup(id, |tree| {
            let data = tree.new_data(DataType::String, &payload)?;
            tree.set_fixed_argument(id, 0, data)
        })?;
        Ok(id)
    }

    /// Creates a detached NameString data node.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::OutOfResources`] if allocation fails.
    pub fn new_name_string(&mut self, name: &NameString) -> Result<NodeId, AmlError> {
        let encoded = name.encode()?;
        self.new_data(DataType::NameString, &encoded)
    }

    /// Runs `build` on a freshly created detached branch, deleting the branch
    /// if `build` fails.
    pub(crate) fn with_cleanup<T>(
        &mut self,
        branch: NodeId,
        build: impl FnOnce(&mut Self) -> Result<T, AmlError>,
    ) -> Result<T, AmlError> {
        match build(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                if self.parent(branch) == Ok(None) {
                    self.delete_tree(branch)?;
                }
                Err(err)
            }
        }
    }

    /// Rewrites an integer object in place with the smallest encoding of
    /// `value`. The handle stays valid. `Ones` is never produced.
    ///
    /// Allocation happens before the node changes, so on error the node is
    /// left as it was.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::TypeMismatch`] if `node` is not an integer object.
    pub fn set_integer_value(&mut self, node: NodeId, value: u64) -> Result<(), AmlError> {
        let object = self.object(node)?;
        if !object.encoding().is_integer() {
            return Err(AmlError::TypeMismatch);
        }
        let current = object.fixed_argument(0);
        let (encoding, width) = integer_encoding_for(value);
        let bytes = value.to_le_bytes();

        match (current, width) {
            (Some(data), Some(width)) => {
                let data = self.data_mut(data)?;
                data.buffer.try_reserve_exact(width.saturating_sub(data.buffer.len()))?;
                data.buffer.clear();
                data.buffer.extend_from_slice(&bytes[..width]);
                self.object_mut(node)?.encoding = encoding;
            }
            (None, Some(width)) => {
                let data = self.new_data(DataType::UInt, &bytes[..width])?;
                self.set_parent(data, Some(node))?;
                let object = self.object_mut(node)?;
                object.encoding = encoding;
                object.fixed_args[0] = Some(data);
            }
            (Some(data), None) => {
                self.release(data)?;
                let object = self.object_mut(node)?;
                object.encoding = encoding;
                object.fixed_args[0] = None;
            }
            (None, None) => self.object_mut(node)?.encoding = encoding,
        }
        Ok(())
    }

    // ─── Validation ─────────────────────────────────────────────────────────

    fn list_kind(&self, parent: NodeId) -> Result<ListKind, AmlError> {
        match self.node(parent)? {
            AmlNode::Root(_) => Ok(ListKind::Terms),
            AmlNode::Object(object) => {
                let attrs = object.encoding().attributes;
                if attrs.contains(OpAttributes::HAS_CHILD_OBJ) {
                    Ok(ListKind::Terms)
                } else if attrs.contains(OpAttributes::HAS_BYTE_LIST) {
                    Ok(ListKind::Bytes)
                } else if attrs.contains(OpAttributes::HAS_FIELD_LIST) {
                    Ok(ListKind::Fields)
                } else {
                    Err(AmlError::NotVariableArgumentParent)
                }
            }
            AmlNode::Data(_) => Err(AmlError::NotVariableArgumentParent),
        }
    }

    fn check_detached(&self, child: NodeId) -> Result<(), AmlError> {
        if self.parent(child)?.is_some() {
            return Err(AmlError::NodeAttached);
        }
        if matches!(self.node(child)?, AmlNode::Root(_)) {
            return Err(AmlError::TypeMismatch);
        }
        Ok(())
    }

    fn check_variable_child(&self, parent: NodeId, child: NodeId) -> Result<(), AmlError> {
        let kind = self.list_kind(parent)?;
        self.check_detached(child)?;
        let fits = match (kind, self.node(child)?) {
            (ListKind::Terms, AmlNode::Object(object)) => !object.encoding().is_field_element(),
            (ListKind::Fields, AmlNode::Object(object)) => object.encoding().is_field_element(),
            (ListKind::Bytes, AmlNode::Data(data)) => {
                matches!(data.data_type(), DataType::ResourceData | DataType::Raw)
            }
            _ => false,
        };
        if !fits {
            return Err(AmlError::TypeMismatch);
        }
        if self.is_ancestor_or_self(child, parent)? {
            return Err(AmlError::WouldCycle);
        }
        Ok(())
    }

    fn check_fixed_child(&self, format: ParseFormat, child: NodeId) -> Result<(), AmlError> {
        let fits = match (format, self.node(child)?) {
            (ParseFormat::Object | ParseFormat::Reference, AmlNode::Object(object)) => {
                !object.encoding().is_field_element()
            }
            (ParseFormat::Name, AmlNode::Data(data)) => data.data_type() == DataType::NameString,
            (ParseFormat::String, AmlNode::Data(data)) => data.data_type() == DataType::String,
            (ParseFormat::FieldPkgLen, AmlNode::Data(data)) => {
                data.data_type() == DataType::FieldPkgLen
            }
            (format, AmlNode::Data(data)) => {
                data.data_type() == DataType::UInt
                    && format.integer_width() == Some(data.buffer().len())
            }
            _ => false,
        };
        if fits { Ok(()) } else { Err(AmlError::TypeMismatch) }
    }

    /// Brings the declared size of `parent` in line after `added` enters
    /// and/or `removed` leaves its variable arguments.
    ///
    /// Callers run this before touching the list and only make infallible
    /// changes afterwards, so an error here leaves the tree unchanged.
    fn adjust_counts(
        &mut self,
        parent: NodeId,
        added: Option<NodeId>,
        removed: Option<NodeId>,
    ) -> Result<(), AmlError> {
        let Ok(object) = self.object(parent) else {
            return Ok(());
        };
        let encoding = object.encoding();
        let Some(count_node) = object.fixed_argument(0) else {
            return Ok(());
        };

        let delta: i128 = if *encoding == BUFFER_OP {
            let len = |id: Option<NodeId>| -> Result<i128, AmlError> {
                Ok(match id {
                    Some(id) => self.data(id)?.buffer().len() as i128,
                    None => 0,
                })
            };
            len(added)? - len(removed)?
        } else if *encoding == PACKAGE_OP || *encoding == VAR_PACKAGE_OP {
            i128::from(added.is_some()) - i128::from(removed.is_some())
        } else {
            return Ok(());
        };
        if delta == 0 {
            return Ok(());
        }

        if *encoding == PACKAGE_OP {
            let data = self.data_mut(count_node)?;
            let current = *data.buffer.first().ok_or(AmlError::TypeMismatch)?;
            let next = (i128::from(current) + delta).max(0);
            data.buffer[0] = u8::try_from(next).map_err(|_| AmlError::OutOfRange)?;
            return Ok(());
        }

        // Computed sizes (Arg0, SizeOf(...)) are left alone.
        if !self.object(count_node).is_ok_and(|o| o.encoding().is_integer()) {
            return Ok(());
        }
        let current = self.integer_value(count_node)?;
        let next = (i128::from(current) + delta).max(0);
        let next = u64::try_from(next).map_err(|_| AmlError::OutOfRange)?;
        self.set_integer_value(count_node, next)
    }

    // ─── Attach ─────────────────────────────────────────────────────────────

    fn insert_variable(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<(), AmlError> {
        self.check_variable_child(parent, child)?;
        let list = self
            .node_mut(parent)?
            .variable_args_mut()
            .ok_or(AmlError::NotVariableArgumentParent)?;
        if index > list.len() {
            return Err(AmlError::OutOfRange);
        }
        list.try_reserve(1)?;
        self.adjust_counts(parent, Some(child), None)?;
        if let Some(list) = self.node_mut(parent)?.variable_args_mut() {
            list.insert(index, child);
        }
        self.set_parent(child, Some(parent))
    }

    /// Appends a detached `child` to the variable arguments of `parent`.
    ///
    /// `parent` must be the root or an object that takes a term list, byte
    /// list or field list, and `child` must be of the matching kind.
    ///
    /// # Errors
    ///
    /// - [`AmlError::NotVariableArgumentParent`] if `parent` takes no list.
    /// - [`AmlError::NodeAttached`] if `child` already has a parent.
    /// - [`AmlError::TypeMismatch`] if `child` does not fit the list.
    /// - [`AmlError::WouldCycle`] if `parent` lies inside `child`'s branch.
    /// - [`AmlError::OutOfRange`] if a `Package` would exceed 255 elements.
    pub fn attach_node(&mut self, parent: NodeId, child: NodeId) -> Result<(), AmlError> {
        let len = self.variable_args(parent)?.len();
        self.insert_variable(parent, len, child)
    }

    /// Inserts a detached `child` at the front of `parent`'s variable
    /// arguments.
    ///
    /// # Errors
    ///
    /// As [`AmlTree::attach_node`].
    pub fn prepend_node(&mut self, parent: NodeId, child: NodeId) -> Result<(), AmlError> {
        self.insert_variable(parent, 0, child)
    }

    fn sibling_slot(&self, sibling: NodeId) -> Result<(NodeId, usize), AmlError> {
        match self.argument_position(sibling)? {
            Some((parent, ArgPosition::Variable(index))) => Ok((parent, index)),
            Some((_, ArgPosition::Fixed(_))) => Err(AmlError::FixedArgument),
            None => Err(AmlError::NodeNotAttached),
        }
    }

    /// Inserts a detached `child` just before `sibling`, a variable argument.
    ///
    /// # Errors
    ///
    /// [`AmlError::FixedArgument`] or [`AmlError::NodeNotAttached`] if
    /// `sibling` is not a variable argument, otherwise as
    /// [`AmlTree::attach_node`].
    pub fn insert_before(&mut self, sibling: NodeId, child: NodeId) -> Result<(), AmlError> {
        let (parent, index) = self.sibling_slot(sibling)?;
        self.insert_variable(parent, index, child)
    }

    /// Inserts a detached `child` just after `sibling`, a variable argument.
    ///
    /// # Errors
    ///
    /// As [`AmlTree::insert_before`].
    pub fn insert_after(&mut self, sibling: NodeId, child: NodeId) -> Result<(), AmlError> {
        let (parent, index) = self.sibling_slot(sibling)?;
        self.insert_variable(parent, index + 1, child)
    }

    // ─── Detach / replace ───────────────────────────────────────────────────

    /// Removes `node` from its parent's variable arguments.
    ///
    /// The node and its branch stay in the arena, detached.
    ///
    /// # Errors
    ///
    /// - [`AmlError::FixedArgument`] if `node` sits in a fixed slot.
    /// - [`AmlError::NodeNotAttached`] for the root and detached nodes.
    pub fn detach_node(&mut self, node: NodeId) -> Result<(), AmlError> {
        let (parent, index) = self.sibling_slot(node)?;
        self.adjust_counts(parent, None, Some(node))?;
        if let Some(list) = self.node_mut(parent)?.variable_args_mut() {
            list.remove(index);
        }
        self.set_parent(node, None)
    }

    /// Puts the detached `new` in the slot `old` occupies and detaches
    /// `old`. This is the only way to change a fixed argument.
    ///
    /// # Errors
    ///
    /// - [`AmlError::NodeNotAttached`] if `old` has no parent.
    /// - [`AmlError::NodeAttached`] if `new` already has a parent.
    /// - [`AmlError::TypeMismatch`] if `new` does not fit the slot.
    /// - [`AmlError::WouldCycle`] if the slot lies inside `new`'s branch.
    pub fn replace_argument(&mut self, old: NodeId, new: NodeId) -> Result<(), AmlError> {
        let (parent, position) = self.argument_position(old)?.ok_or(AmlError::NodeNotAttached)?;
        self.check_detached(new)?;
        if self.is_ancestor_or_self(new, parent)? {
            return Err(AmlError::WouldCycle);
        }

        match position {
            ArgPosition::Fixed(index) => {
                let format = self.encoding(parent)?.formats[index];
                self.check_fixed_child(format, new)?;
                self.object_mut(parent)?.fixed_args[index] = Some(new);
            }
            ArgPosition::Variable(index) => {
                let kind = self.list_kind(parent)?;
                let fits = match self.node(new)? {
                    AmlNode::Object(object) => {
                        (kind == ListKind::Fields) == object.encoding().is_field_element()
                            && kind != ListKind::Bytes
                    }
                    AmlNode::Data(data) => {
                        kind == ListKind::Bytes
                            && matches!(data.data_type(), DataType::ResourceData | DataType::Raw)
                    }
                    AmlNode::Root(_) => false,
                };
                if !fits {
                    return Err(AmlError::TypeMismatch);
                }
                self.adjust_counts(parent, Some(new), Some(old))?;
                if let Some(list) = self.node_mut(parent)?.variable_args_mut() {
                    list[index] = new;
                }
            }
        }
        self.set_parent(old, None)?;
        self.set_parent(new, Some(parent))
    }

    // ─── Copy / delete ──────────────────────────────────────────────────────

    /// Deep-copies the branch at `node` into a new detached branch.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::TypeMismatch`] for the root (copy the whole
    /// [`AmlTree`] instead) and [`AmlError::OutOfResources`] if allocation
    /// fails, in which case nothing is left behind.
    pub fn clone_node(&mut self, node: NodeId) -> Result<NodeId, AmlError> {
        let mut scratch = Self::new();
        let copy = scratch.import(self, node)?;
        self.import(&scratch, copy)
    }

    /// Deep-copies the branch at `node` of `source` into this tree, detached.
    ///
    /// # Errors
    ///
    /// As [`AmlTree::clone_node`].
    pub fn import(&mut self, source: &Self, node: NodeId) -> Result<NodeId, AmlError> {
        let mut created = Vec::new();
        match self.copy_branch(source, node, &mut created) {
            Ok(copy) => Ok(copy),
            Err(err) => {
                for id in created {
                    self.release(id)?;
                }
                Err(err)
            }
        }
    }

    fn copy_branch(
        &mut self,
        source: &Self,
        node: NodeId,
        created: &mut Vec<NodeId>,
    ) -> Result<NodeId, AmlError> {
        created.try_reserve(1)?;
        match source.node(node)? {
            AmlNode::Root(_) => Err(AmlError::TypeMismatch),
            AmlNode::Data(data) => {
                let copy = self.new_data(data.data_type(), data.buffer())?;
                created.push(copy);
                Ok(copy)
            }
            AmlNode::Object(object) => {
                let copy = self.new_object(object.encoding())?;
                created.push(copy);
                self.object_mut(copy)?.pkg_len_hint = object.pkg_len_hint();
                for (index, slot) in object.fixed_args().iter().enumerate() {
                    if let Some(child) = *slot {
                        let child = self.copy_branch(source, child, created)?;
                        self.set_fixed_argument(copy, index, child)?;
                    }
                }
                for &child in object.variable_args() {
                    let child = self.copy_branch(source, child, created)?;
                    self.push_variable_argument(copy, child)?;
                }
                Ok(copy)
            }
        }
    }

    /// Frees the branch at `node`.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::NodeAttached`] unless `node` is detached or the
    /// root.
    pub fn delete_tree(&mut self, node: NodeId) -> Result<(), AmlError> {
        if self.parent(node)?.is_some() {
            return Err(AmlError::NodeAttached);
        }
        let mut pending = Vec::new();
        let mut branch = Vec::new();
        pending.try_reserve(1)?;
        pending.push(node);
        while let Some(id) = pending.pop() {
            branch.try_reserve(1)?;
            branch.push(id);
            let children = self.node(id)?.children();
            pending.try_reserve(children.clone().count())?;
            pending.extend(children);
        }
        for id in branch {
            self.release(id)?;
        }
        Ok(())
    }
}

/// Validates `text` for a String payload and appends the terminating NUL.
pub(crate) fn string_payload(text: &str) -> Result<Vec<u8>, AmlError> {
    if !text.is_ascii() || text.bytes().any(|b| b == 0) {
        return Err(AmlError::OutOfRange);
    }
    let mut payload = Vec::new();
    payload.try_reserve_exact(text.len() + 1)?;
    payload.extend_from_slice(text.as_bytes());
    payload.push(0);
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::{DEVICE_OP, NAME_OP, RESERVED_FIELD_OP, SCOPE_OP};
    use crate::sdt::{SSDT_SIGNATURE, SdtHeader};

    fn tree_with_root() -> (AmlTree, NodeId) {
        let mut tree = AmlTree::new();
        let header = SdtHeader::new_definition_block(SSDT_SIGNATURE, "OEM", "TEST", 1).unwrap();
        let root = tree.new_root(header).unwrap();
        (tree, root)
    }

    fn named(tree: &mut AmlTree, encoding: &'static AmlByteEncoding, name: &str) -> NodeId {
        let id = tree.new_object(encoding).unwrap();
        let name = tree.new_name_string(&NameString::from_asl(name).unwrap()).unwrap();
        tree.set_fixed_argument(id, 0, name).unwrap();
        id
    }

    fn package(tree: &mut AmlTree, count: u8) -> NodeId {
        let pkg = tree.new_object(&PACKAGE_OP).unwrap();
        let num = tree.new_data(DataType::UInt, &[count]).unwrap();
        tree.set_fixed_argument(pkg, 0, num).unwrap();
        pkg
    }

    #[test]
    fn attach_and_detach_are_inverse() {
        let (mut tree, root) = tree_with_root();
        let scope = named(&mut tree, &SCOPE_OP, "_SB");
        tree.attach_node(root, scope).unwrap();
        let before = tree.variable_args(root).unwrap().to_vec();

        let device = named(&mut tree, &DEVICE_OP, "CPU0");
        tree.attach_node(root, device).unwrap();
        assert_eq!(tree.variable_args(root).unwrap(), [scope, device]);
        tree.detach_node(device).unwrap();
        assert_eq!(tree.variable_args(root).unwrap(), before.as_slice());
        assert_eq!(tree.parent(device), Ok(None));
    }

    #[test]
    fn fixed_slots_cannot_be_detached() {
        let (mut tree, root) = tree_with_root();
        let device = named(&mut tree, &DEVICE_OP, "CPU0");
        tree.attach_node(root, device).unwrap();
        let name = tree.fixed_argument(device, 0).unwrap().unwrap();
        assert_eq!(tree.detach_node(name), Err(AmlError::FixedArgument));
        assert_eq!(tree.parent(name), Ok(Some(device)));
        assert_eq!(tree.detach_node(root), Err(AmlError::NodeNotAttached));
    }

    #[test]
    fn attach_rules() {
        let (mut tree, root) = tree_with_root();
        let name = named(&mut tree, &NAME_OP, "FOO");
        let device = named(&mut tree, &DEVICE_OP, "DEV0");
        assert_eq!(tree.attach_node(name, device), Err(AmlError::NotVariableArgumentParent));

        let raw = tree.new_data(DataType::Raw, &[1]).unwrap();
        assert_eq!(tree.attach_node(device, raw), Err(AmlError::TypeMismatch));
        let field = tree.new_object(&RESERVED_FIELD_OP).unwrap();
        assert_eq!(tree.attach_node(root, field), Err(AmlError::TypeMismatch));
        assert_eq!(tree.attach_node(device, root), Err(AmlError::TypeMismatch));

        let inner = named(&mut tree, &DEVICE_OP, "DEV1");
        tree.attach_node(device, inner).unwrap();
        assert_eq!(tree.attach_node(inner, device), Err(AmlError::WouldCycle));
        assert_eq!(tree.attach_node(root, inner), Err(AmlError::NodeAttached));
    }

    #[test]
    fn sibling_insertion() {
        let (mut tree, root) = tree_with_root();
        let a = named(&mut tree, &DEVICE_OP, "A");
        let b = named(&mut tree, &DEVICE_OP, "B");
        let c = named(&mut tree, &DEVICE_OP, "C");
        let d = named(&mut tree, &DEVICE_OP, "D");
        tree.attach_node(root, b).unwrap();
        tree.insert_before(b, a).unwrap();
        tree.insert_after(b, d).unwrap();
        tree.insert_before(d, c).unwrap();
        assert_eq!(tree.variable_args(root).unwrap(), [a, b, c, d]);

        let name = tree.fixed_argument(a, 0).unwrap().unwrap();
        let e = named(&mut tree, &DEVICE_OP, "E");
        assert_eq!(tree.insert_after(name, e), Err(AmlError::FixedArgument));
        tree.prepend_node(root, e).unwrap();
        assert_eq!(tree.variable_args(root).unwrap()[0], e);
    }

    #[test]
    fn package_count_follows_elements() {
        let mut tree = AmlTree::new();
        let pkg = package(&mut tree, 0);
        let one = tree.new_integer(1).unwrap();
        let two = tree.new_integer(2).unwrap();
        tree.attach_node(pkg, one).unwrap();
        tree.attach_node(pkg, two).unwrap();
        let count = tree.fixed_argument(pkg, 0).unwrap().unwrap();
        assert_eq!(tree.data(count).unwrap().integer(), Some(2));
        tree.detach_node(one).unwrap();
        assert_eq!(tree.data(count).unwrap().integer(), Some(1));

        let full = package(&mut tree, 255);
        let three = tree.new_integer(3).unwrap();
        assert_eq!(tree.attach_node(full, three), Err(AmlError::OutOfRange));
        assert!(tree.variable_args(full).unwrap().is_empty());
        assert_eq!(tree.parent(three), Ok(None));
    }

    #[test]
    fn buffer_size_follows_bytes() {
        let mut tree = AmlTree::new();
        let buffer = tree.new_object(&BUFFER_OP).unwrap();
        let size = tree.new_integer(0).unwrap();
        tree.set_fixed_argument(buffer, 0, size).unwrap();
        let bytes = tree.new_data(DataType::Raw, &[0xAA; 300]).unwrap();
        tree.attach_node(buffer, bytes).unwrap();
        assert_eq!(tree.integer_value(size), Ok(300));
        assert_eq!(tree.encoding(size), Ok(&opcode::WORD_OP));
        tree.detach_node(bytes).unwrap();
        assert_eq!(tree.integer_value(size), Ok(0));
        assert_eq!(tree.encoding(size), Ok(&ZERO_OP));
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn failed_size_update_leaves_buffer_unchanged() {
        let mut tree = AmlTree::new();
        let buffer = tree.new_object(&BUFFER_OP).unwrap();
        let size = tree.new_integer(u64::MAX).unwrap();
        tree.set_fixed_argument(buffer, 0, size).unwrap();
        let bytes = tree.new_data(DataType::Raw, &[0xAA; 4]).unwrap();
        let before = tree.len();

        assert_eq!(tree.attach_node(buffer, bytes), Err(AmlError::OutOfRange));
        assert!(tree.variable_args(buffer).unwrap().is_empty());
        assert_eq!(tree.parent(bytes), Ok(None));
        assert_eq!(tree.integer_value(size), Ok(u64::MAX));
        assert_eq!(tree.encoding(size), Ok(&opcode::QWORD_OP));
        assert_eq!(tree.len(), before);

        // The same bytes fit once the size leaves room for them.
        tree.set_integer_value(size, 0).unwrap();
        tree.attach_node(buffer, bytes).unwrap();
        assert_eq!(tree.integer_value(size), Ok(4));
        assert_eq!(tree.encoding(size), Ok(&opcode::BYTE_OP));
        let data = tree.fixed_argument(size, 0).unwrap().unwrap();
        assert_eq!(tree.parent(data), Ok(Some(size)));
    }

    #[test]
    fn integer_reencoding_keeps_handle() {
        let mut tree = AmlTree::new();
        let int = tree.new_integer(0).unwrap();
        for value in [1, 0x80, 0x1234, 0xDEAD_BEEF, 0x1_0000_0000, 0] {
            tree.set_integer_value(int, value).unwrap();
            assert_eq!(tree.integer_value(int), Ok(value));
        }
        assert_eq!(tree.len(), 1);
        let text = tree.new_string("HI").unwrap();
        assert_eq!(tree.set_integer_value(text, 3), Err(AmlError::TypeMismatch));
    }

    #[test]
    fn clone_is_independent() {
        let (mut tree, root) = tree_with_root();
        let device = named(&mut tree, &DEVICE_OP, "CPU0");
        let int = tree.new_integer(5).unwrap();
        let name = named(&mut tree, &NAME_OP, "_UID");
        tree.set_fixed_argument(name, 1, int).unwrap();
        tree.attach_node(device, name).unwrap();
        tree.attach_node(root, device).unwrap();

        let copy = tree.clone_node(device).unwrap();
        assert_eq!(tree.parent(copy), Ok(None));
        let copied_name = tree.variable_args(copy).unwrap()[0];
        let copied_int = tree.fixed_argument(copied_name, 1).unwrap().unwrap();
        assert_ne!(copied_int, int);
        tree.set_integer_value(copied_int, 9).unwrap();
        assert_eq!(tree.integer_value(int), Ok(5));
        assert_eq!(tree.clone_node(root), Err(AmlError::TypeMismatch));
    }

    #[test]
    fn replace_fixed_argument() {
        let (mut tree, root) = tree_with_root();
        let name = named(&mut tree, &NAME_OP, "FOO");
        let value = tree.new_integer(1).unwrap();
        tree.set_fixed_argument(name, 1, value).unwrap();
        tree.attach_node(root, name).unwrap();

        let text = tree.new_string("BAR").unwrap();
        tree.replace_argument(value, text).unwrap();
        assert_eq!(tree.fixed_argument(name, 1), Ok(Some(text)));
        assert_eq!(tree.parent(value), Ok(None));

        let raw = tree.new_data(DataType::Raw, &[0]).unwrap();
        assert_eq!(tree.replace_argument(text, raw), Err(AmlError::TypeMismatch));
    }

    #[test]
    fn delete_requires_detached() {
        let (mut tree, root) = tree_with_root();
        let device = named(&mut tree, &DEVICE_OP, "CPU0");
        tree.attach_node(root, device).unwrap();
        assert_eq!(tree.delete_tree(device), Err(AmlError::NodeAttached));
        tree.detach_node(device).unwrap();
        tree.delete_tree(device).unwrap();
        assert_eq!(tree.node(device), Err(AmlError::InvalidNode));
        assert_eq!(tree.len(), 1);
        tree.delete_tree(root).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.root(), None);
    }
}
